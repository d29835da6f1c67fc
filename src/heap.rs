//! The allocator context: allocation, splitting, release and coalescing.

use std::{ops::Range, ptr::NonNull};

use log::{Level, debug, log_enabled, trace, warn};

use crate::{
  ALIGNMENT, align,
  arena::{ArenaProvider, BoundedArena},
  bin::{BIN_COUNT, bin_index},
  block::{Block, HEADER_SIZE, MAX_BLOCK_SIZE},
  config::HeapConfig,
  error::AllocError,
  free_list::{FreeBlock, FreeListIter, FreeLists},
  stats::HeapStats,
};

/// A segregated-fit heap growing on top of an [`ArenaProvider`].
///
/// The heap is a single-owner context: it is neither `Send` nor `Sync`, and
/// independent heaps never share blocks.
pub struct Heap<A: ArenaProvider> {
  arena: A,
  free: FreeLists,
  config: HeapConfig,
  bounds: Option<Range<usize>>,
  stats: HeapStats,
}

impl<A: ArenaProvider> Heap<A> {
  /// Creates an empty heap with the default configuration. Nothing is
  /// requested from `arena` until the first allocation.
  pub fn new(arena: A) -> Self {
    Self {
      arena,
      free: FreeLists::new(),
      config: HeapConfig::default(),
      bounds: None,
      stats: HeapStats::default(),
    }
  }

  /// Creates a heap with `config`, performing the initial reservation if one
  /// is configured.
  pub fn with_config(
    arena: A,
    config: HeapConfig,
  ) -> Result<Self, AllocError> {
    let initial_reserve = config.initial_reserve;
    let mut heap = Self {
      config,
      ..Self::new(arena)
    };

    if initial_reserve > 0 {
      heap.reserve(initial_reserve)?;
    }

    Ok(heap)
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub fn arena(&self) -> &A {
    &self.arena
  }

  pub fn stats(&self) -> HeapStats {
    self.stats
  }

  /// Allocates at least `size` bytes and returns the payload address.
  ///
  /// The payload is [`ALIGNMENT`]-aligned and uninitialized. Bins are searched
  /// from the one matching `size` upwards; the arena only grows when no bin
  /// holds a large enough block.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    Self::check_size(size)?;

    let block = match self.find(size) {
      Some(block) => block,
      None => self.extend(size)?,
    };

    let block = self.split(block, size);
    block.set_allocated(true);

    self.stats.live_allocations += 1;
    self.stats.live_bytes += block.size();

    trace!(
      "allocate({size}) -> {:?}, {} usable bytes",
      block.payload(),
      block.size()
    );

    Ok(block.payload())
  }

  /// Returns the block behind `payload` to the heap, merging it with every
  /// adjacent free block. A null pointer is ignored.
  ///
  /// Misaligned or foreign pointers and blocks that are already free are
  /// rejected with an error as far as they can be recognized.
  ///
  /// # Safety
  ///
  /// A non-null `payload` must have been returned by [`Heap::allocate`] on
  /// this heap. The payload must not be used after it was released.
  pub unsafe fn release(
    &mut self,
    payload: *mut u8,
  ) -> Result<(), AllocError> {
    let Some(payload) = NonNull::new(payload) else {
      return Ok(());
    };

    let block = unsafe { self.block_of(payload) }?;

    if !block.is_allocated() {
      warn!("release({payload:?}): block is already free");
      return Err(AllocError::DoubleFree {
        addr: payload.addr().get(),
      });
    }

    let size = block.size();
    block.set_allocated(false);

    self.stats.live_allocations -= 1;
    self.stats.live_bytes -= size;

    let block = self.coalesce(block);
    self.free.insert(block);

    trace!(
      "release({payload:?}) -> free block at {:#x}, {} bytes",
      block.start(),
      block.size()
    );

    Ok(())
  }

  /// Grows the arena by one block of at least `size` payload bytes and files
  /// it as free, merged with an adjacent free block if there is one.
  pub fn reserve(
    &mut self,
    size: usize,
  ) -> Result<(), AllocError> {
    Self::check_size(size)?;

    let block = self.extend(size)?;
    let block = self.coalesce(block);
    self.free.insert(block);

    Ok(())
  }

  /// Usable payload bytes of a live allocation, which may exceed the size
  /// that was requested.
  ///
  /// # Safety
  ///
  /// Same contract as [`Heap::release`]: `payload` must be a live allocation
  /// of this heap.
  pub unsafe fn usable_size(
    &self,
    payload: NonNull<u8>,
  ) -> Result<usize, AllocError> {
    let block = unsafe { self.block_of(payload) }?;

    if !block.is_allocated() {
      return Err(AllocError::InvalidPointer {
        addr: payload.addr().get(),
      });
    }

    Ok(block.size())
  }

  /// Free blocks of one bin, in list order (ascending size).
  ///
  /// # Panics
  ///
  /// Panics if `bin >= BIN_COUNT`.
  pub fn free_blocks(
    &self,
    bin: usize,
  ) -> FreeListIter {
    self.free.iter(bin)
  }

  /// Free blocks of every bin, bin by bin.
  pub fn all_free_blocks(&self) -> impl Iterator<Item = FreeBlock> + '_ {
    (0..BIN_COUNT).flat_map(move |bin| self.free.iter(bin))
  }

  /// Writes the current bin contents and counters to the `debug` log.
  pub fn log_layout(&self) {
    if !log_enabled!(Level::Debug) {
      return;
    }

    debug!("heap: {}", self.stats);
    for bin in 0..BIN_COUNT {
      for free in self.free.iter(bin) {
        debug!("  bin {bin}: {:#x}..{:#x} ({} bytes)", free.addr, free.end(), free.size);
      }
    }
  }

  fn check_size(size: usize) -> Result<(), AllocError> {
    if size == 0 {
      return Err(AllocError::ZeroSize);
    }

    if size > MAX_BLOCK_SIZE {
      return Err(AllocError::TooLarge { requested: size });
    }

    Ok(())
  }

  /// Takes the first fitting block from the matching bin or any larger one.
  fn find(
    &mut self,
    size: usize,
  ) -> Option<Block> {
    (bin_index(size)..BIN_COUNT).find_map(|bin| self.free.remove_fit(bin, size))
  }

  /// Requests a fresh block from the arena. The block is free but not yet in
  /// any list.
  fn extend(
    &mut self,
    size: usize,
  ) -> Result<Block, AllocError> {
    let size = align!(size);
    let bytes = size + HEADER_SIZE;

    let Some(region) = self.arena.extend(bytes) else {
      warn!("arena refused to grow by {bytes} bytes");
      return Err(AllocError::OutOfMemory { requested: bytes });
    };

    debug_assert_eq!(region.addr().get() % ALIGNMENT, 0);

    let start = region.addr().get();
    let end = start + bytes;
    self.bounds = Some(match self.bounds.take() {
      Some(bounds) => bounds.start.min(start)..bounds.end.max(end),
      None => start..end,
    });

    self.stats.arena_bytes += bytes;
    self.stats.grow_calls += 1;
    debug!("arena grew by {bytes} bytes at {region:?}");

    // SAFETY: the provider handed out `bytes` fresh, aligned bytes.
    Ok(unsafe { Block::init(region, size, false) })
  }

  /// Shrinks `block` to `requested` bytes and files the tail as a new free
  /// block, unless the tail would be smaller than the configured minimum.
  fn split(
    &mut self,
    block: Block,
    requested: usize,
  ) -> Block {
    let size = align!(requested);

    let Some(remainder) = block.size().checked_sub(size + HEADER_SIZE) else {
      return block;
    };

    if remainder < self.config.min_remainder {
      return block;
    }

    block.set_meta(size, false);

    // SAFETY: the tail lies inside the memory `block` covered before shrinking.
    let tail = unsafe { Block::init(block.following(), remainder, false) };
    self.free.insert(tail);

    self.stats.splits += 1;
    debug!(
      "split block at {:#x}: kept {size} bytes, {remainder} bytes free at {:#x}",
      block.start(),
      tail.start()
    );

    block
  }

  /// Merges `block` with adjacent free blocks until none is left. The result
  /// is not in any list.
  fn coalesce(
    &mut self,
    mut block: Block,
  ) -> Block {
    while let Some(neighbor) = self.free.remove_adjacent(block) {
      let size = block.size() + HEADER_SIZE + neighbor.size();

      if neighbor.start() < block.start() {
        block = neighbor;
      }
      block.set_meta(size, false);

      self.stats.coalesces += 1;
      debug!("coalesced into {size} bytes at {:#x}", block.start());
    }

    block
  }

  /// Recovers the block of `payload` after checking that the address can
  /// belong to this heap.
  unsafe fn block_of(
    &self,
    payload: NonNull<u8>,
  ) -> Result<Block, AllocError> {
    let addr = payload.addr().get();
    let invalid = AllocError::InvalidPointer { addr };

    let within = |bounds: &Range<usize>| {
      addr % ALIGNMENT == 0 && addr >= bounds.start + HEADER_SIZE && addr < bounds.end
    };
    let Some(bounds) = self.bounds.as_ref().filter(|bounds| within(*bounds)) else {
      warn!("{payload:?} is not a payload of this heap");
      return Err(invalid);
    };

    let block = unsafe { Block::from_payload(payload) };

    if block.end() > bounds.end {
      warn!("{payload:?} has a header running past the heap");
      return Err(invalid);
    }

    Ok(block)
  }
}

impl Heap<BoundedArena> {
  /// A heap over a fresh [`BoundedArena`] of `capacity` bytes.
  pub fn bounded(capacity: usize) -> Result<Self, AllocError> {
    Ok(Self::new(BoundedArena::new(capacity)?))
  }
}
