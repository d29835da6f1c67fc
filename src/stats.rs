//! Bookkeeping counters, updated inline by the heap.

use std::fmt;

/// Snapshot of a heap's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
  /// Bytes obtained from the arena provider so far.
  pub arena_bytes: usize,
  /// Successful arena growth requests.
  pub grow_calls: usize,
  /// Allocations handed out and not yet released.
  pub live_allocations: usize,
  /// Payload bytes held by live allocations (block capacity, not request size).
  pub live_bytes: usize,
  /// Blocks split to carve out an allocation.
  pub splits: usize,
  /// Merges of two adjacent free blocks.
  pub coalesces: usize,
}

impl fmt::Display for HeapStats {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(
      f,
      "arena = {} bytes in {} grows, live = {} allocations / {} bytes, splits = {}, coalesces = {}",
      self.arena_bytes, self.grow_calls, self.live_allocations, self.live_bytes, self.splits, self.coalesces
    )
  }
}
