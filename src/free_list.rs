//! Segregated free lists.
//!
//! One singly linked list per bin, threaded through the `next` field of the
//! free blocks' headers and kept in ascending size order, so the first fit
//! found in a bin is also the smallest one that bin can offer.

use crate::{
  bin::{BIN_COUNT, bin_index},
  block::Block,
};

/// A free block as seen from outside the heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeBlock {
  /// Address of the block header.
  pub addr: usize,
  /// Usable payload bytes.
  pub size: usize,
}

impl FreeBlock {
  /// One past the last byte covered by the block (header included).
  #[must_use]
  pub const fn end(&self) -> usize {
    self.addr + crate::HEADER_SIZE + self.size
  }
}

pub(crate) struct FreeLists {
  heads: [Option<Block>; BIN_COUNT],
}

impl FreeLists {
  pub const fn new() -> Self {
    Self {
      heads: [None; BIN_COUNT],
    }
  }

  /// Links `block` into the bin matching its size, before the first block
  /// that is not smaller.
  pub fn insert(
    &mut self,
    block: Block,
  ) {
    debug_assert!(!block.is_allocated());

    let index = bin_index(block.size());
    let mut prev: Option<Block> = None;
    let mut current = self.heads[index];

    while let Some(node) = current {
      if block.size() <= node.size() {
        break;
      }
      prev = Some(node);
      current = node.next();
    }

    block.set_next(current);
    match prev {
      Some(prev) => prev.set_next(Some(block)),
      None => self.heads[index] = Some(block),
    }
  }

  /// Unlinks and returns the first block in `bin` with at least `min_size`
  /// payload bytes.
  pub fn remove_fit(
    &mut self,
    bin: usize,
    min_size: usize,
  ) -> Option<Block> {
    self.unlink_first(bin, |node| node.size() >= min_size)
  }

  /// Unlinks and returns a free block whose range touches `block`'s range on
  /// either side, searching every bin.
  pub fn remove_adjacent(
    &mut self,
    block: Block,
  ) -> Option<Block> {
    (0..BIN_COUNT).find_map(|bin| {
      self.unlink_first(bin, |node| {
        node != block && (node.end() == block.start() || block.end() == node.start())
      })
    })
  }

  fn unlink_first(
    &mut self,
    bin: usize,
    mut predicate: impl FnMut(Block) -> bool,
  ) -> Option<Block> {
    let mut prev: Option<Block> = None;
    let mut current = self.heads[bin];

    while let Some(node) = current {
      if predicate(node) {
        match prev {
          Some(prev) => prev.set_next(node.next()),
          None => self.heads[bin] = node.next(),
        }
        node.set_next(None);
        return Some(node);
      }
      prev = Some(node);
      current = node.next();
    }

    None
  }

  pub fn iter(
    &self,
    bin: usize,
  ) -> FreeListIter {
    FreeListIter {
      current: self.heads[bin],
    }
  }
}

/// Walks one bin's free list from head to tail.
pub struct FreeListIter {
  current: Option<Block>,
}

impl Iterator for FreeListIter {
  type Item = FreeBlock;

  fn next(&mut self) -> Option<Self::Item> {
    let block = self.current?;
    self.current = block.next();

    Some(FreeBlock {
      addr: block.start(),
      size: block.size(),
    })
  }
}
