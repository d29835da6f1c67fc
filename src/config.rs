/// Default smallest remainder worth splitting off a block.
pub const MIN_REMAINDER: usize = 32;

/// Configuration for a [`Heap`](crate::Heap). All fields have sensible defaults.
/// Set at construction time via [`Heap::with_config`](crate::Heap::with_config).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeapConfig {
  /// A block is only split when the leftover, after carving out the request
  /// and a new header, holds at least this many payload bytes.
  /// Default: 32.
  pub min_remainder: usize,

  /// Bytes obtained from the arena when the heap is created and filed as a
  /// single free block, so early allocations skip arena growth.
  /// Default: 0 (grow on demand).
  pub initial_reserve: usize,
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self {
      min_remainder: MIN_REMAINDER,
      initial_reserve: 0,
    }
  }
}

impl HeapConfig {
  #[must_use]
  pub fn with_min_remainder(
    mut self,
    min_remainder: usize,
  ) -> Self {
    self.min_remainder = min_remainder;
    self
  }

  #[must_use]
  pub fn with_initial_reserve(
    mut self,
    initial_reserve: usize,
  ) -> Self {
    self.initial_reserve = initial_reserve;
    self
  }
}
