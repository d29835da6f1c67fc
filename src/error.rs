use std::alloc::LayoutError;

/// Failures reported across the allocator boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
  /// The arena provider could not supply the memory for a new block.
  #[error("out of memory: the arena cannot grow to fit a {requested} byte block")]
  OutOfMemory { requested: usize },

  #[error("zero-sized allocations are not supported")]
  ZeroSize,

  #[error("a {requested} byte block cannot be described by a block header")]
  TooLarge { requested: usize },

  /// The pointer is misaligned or lies outside any region this heap obtained.
  #[error("{addr:#x} was not returned by this heap")]
  InvalidPointer { addr: usize },

  #[error("the block at {addr:#x} is already free")]
  DoubleFree { addr: usize },

  #[error("cannot reserve a {capacity} byte arena")]
  ArenaCapacity { capacity: usize },

  #[error("invalid arena layout")]
  Layout(#[from] LayoutError),
}
