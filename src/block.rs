//! Block header codec.
//!
//! Every block starts with a [`BlockHeader`] placed immediately before its
//! payload:
//!
//! ```text
//!   ┌──────────────────────────────┬──────────────────────────────┐
//!   │         BlockHeader          │           payload            │
//!   │  meta: size << 4 | allocated │                              │
//!   │  next: free-list link        │        size bytes            │
//!   └──────────────────────────────┴──────────────────────────────┘
//!   ▲ start                        ▲ payload            end ▲
//! ```
//!
//! The `next` link is only meaningful while the block sits in a free list.

use std::{mem, ptr, ptr::NonNull};

use bitfield_struct::bitfield;

use crate::ALIGNMENT;

const SIZE_BITS: u32 = 60;

/// Largest payload size a header can describe.
pub const MAX_BLOCK_SIZE: usize = {
  let limit = (1u64 << SIZE_BITS) - ALIGNMENT as u64;
  if limit > isize::MAX as u64 {
    isize::MAX as usize & !(ALIGNMENT - 1)
  } else {
    limit as usize
  }
};

/// Size of the header placed in front of every payload.
pub const HEADER_SIZE: usize = mem::size_of::<BlockHeader>();

/// Packed metadata word of a block.
///
/// | Bits  | Field       |
/// |-------|-------------|
/// | 0     | `allocated` |
/// | 1..=3 | reserved    |
/// | 4..   | `size`      |
///
/// Numerically the word is `size << 4 | allocated`.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct BlockMeta {
  /// Set while the block is owned by a caller.
  pub allocated: bool,

  #[bits(3)]
  __: u8,

  #[bits(60)]
  raw_size: u64,
}

impl BlockMeta {
  /// Packs `size` and `allocated` into a metadata word.
  ///
  /// `size` must be a multiple of [`ALIGNMENT`] no larger than [`MAX_BLOCK_SIZE`].
  #[must_use]
  pub fn encode(
    size: usize,
    allocated: bool,
  ) -> Self {
    debug_assert_eq!(size % ALIGNMENT, 0, "unaligned block size {size}");
    debug_assert!(size <= MAX_BLOCK_SIZE);

    Self::new()
      .with_allocated(allocated)
      .with_raw_size(size as u64)
  }

  /// Unpacks the word into `(size, allocated)`.
  #[must_use]
  pub fn decode(self) -> (usize, bool) {
    (self.size(), self.allocated())
  }

  /// Payload size in bytes.
  #[must_use]
  pub fn size(self) -> usize {
    self.raw_size() as usize
  }
}

#[repr(C, align(16))]
pub(crate) struct BlockHeader {
  meta: BlockMeta,
  next: *mut BlockHeader,
}

/// Typed view over a block header living in heap memory.
///
/// A `Block` always points at an initialized header inside memory owned by the
/// heap; the unsafe constructors are where that promise is made.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Block(NonNull<BlockHeader>);

impl Block {
  /// Writes a fresh, unlinked header at `addr`.
  ///
  /// # Safety
  ///
  /// `addr` must be [`ALIGNMENT`]-aligned and valid for writes of
  /// `HEADER_SIZE + size` bytes owned by the heap.
  pub unsafe fn init(
    addr: NonNull<u8>,
    size: usize,
    allocated: bool,
  ) -> Self {
    let header = addr.cast::<BlockHeader>();

    unsafe {
      header.write(BlockHeader {
        meta: BlockMeta::encode(size, allocated),
        next: ptr::null_mut(),
      });
    }

    Self(header)
  }

  /// Recovers the block owning `payload` (`header_of`).
  ///
  /// # Safety
  ///
  /// `payload` must have been produced by [`Block::payload`] on a block that
  /// is still part of the heap.
  pub unsafe fn from_payload(payload: NonNull<u8>) -> Self {
    Self(unsafe { payload.sub(HEADER_SIZE) }.cast())
  }

  /// Address of the payload following the header (`payload_of`).
  pub fn payload(self) -> NonNull<u8> {
    // SAFETY: the payload is inside the same heap region as the header.
    unsafe { self.0.cast::<u8>().add(HEADER_SIZE) }
  }

  pub fn meta(self) -> BlockMeta {
    // SAFETY: `self` points at an initialized header.
    unsafe { (*self.0.as_ptr()).meta }
  }

  pub fn size(self) -> usize {
    self.meta().size()
  }

  pub fn is_allocated(self) -> bool {
    self.meta().allocated()
  }

  pub fn set_meta(
    self,
    size: usize,
    allocated: bool,
  ) {
    // SAFETY: `self` points at an initialized header.
    unsafe { (*self.0.as_ptr()).meta = BlockMeta::encode(size, allocated) }
  }

  pub fn set_allocated(
    self,
    allocated: bool,
  ) {
    self.set_meta(self.size(), allocated);
  }

  pub fn next(self) -> Option<Block> {
    // SAFETY: links are only ever set to other live headers or null.
    NonNull::new(unsafe { (*self.0.as_ptr()).next }).map(Block)
  }

  pub fn set_next(
    self,
    next: Option<Block>,
  ) {
    let raw = next.map_or(ptr::null_mut(), |block| block.0.as_ptr());
    // SAFETY: `self` points at an initialized header.
    unsafe { (*self.0.as_ptr()).next = raw }
  }

  /// First byte of the block's occupied range (the header).
  pub fn start(self) -> usize {
    self.0.as_ptr().addr()
  }

  /// One past the last byte of the block's occupied range.
  pub fn end(self) -> usize {
    self.start() + HEADER_SIZE + self.size()
  }

  /// Address of the header that would follow this block in memory.
  pub fn following(self) -> NonNull<u8> {
    // SAFETY: callers only use this to carve a remainder inside the block.
    unsafe { self.payload().add(self.size()) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[repr(C, align(16))]
  struct Storage([u8; 256]);

  #[test]
  fn test_header_size() {
    assert_eq!(HEADER_SIZE, 16);
    assert_eq!(HEADER_SIZE % ALIGNMENT, 0);
  }

  #[test]
  fn test_encode_decode() {
    for size in [0, 16, 32, 112, 1024, 4096, MAX_BLOCK_SIZE] {
      for allocated in [false, true] {
        assert_eq!((size, allocated), BlockMeta::encode(size, allocated).decode());
      }
    }
  }

  #[test]
  fn test_encoding_is_shifted_size_plus_flag() {
    assert_eq!(BlockMeta::encode(112, true).into_bits(), 112 << 4 | 1);
    assert_eq!(BlockMeta::encode(64, false).into_bits(), 64 << 4);
    assert_eq!(BlockMeta::from_bits(64 << 4 | 1).decode(), (64, true));
  }

  #[test]
  fn test_payload_header_round_trip() {
    let mut storage = Storage([0; 256]);
    let addr = NonNull::from(&mut storage.0).cast::<u8>();

    unsafe {
      let block = Block::init(addr, 64, false);

      assert_eq!(block.payload().as_ptr(), addr.as_ptr().add(HEADER_SIZE));
      assert_eq!(Block::from_payload(block.payload()), block);
      assert_eq!(block.end() - block.start(), HEADER_SIZE + 64);
      assert_eq!(block.following().addr().get(), block.end());
    }
  }

  #[test]
  fn test_flag_flips_keep_size() {
    let mut storage = Storage([0; 256]);
    let addr = NonNull::from(&mut storage.0).cast::<u8>();

    let block = unsafe { Block::init(addr, 96, false) };
    assert!(!block.is_allocated());

    block.set_allocated(true);
    assert!(block.is_allocated());
    assert_eq!(block.size(), 96);

    block.set_allocated(false);
    assert_eq!(block.meta().decode(), (96, false));
  }
}
