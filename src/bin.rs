//! Size classes.
//!
//! ```text
//!   bin 0        bin 1         bin 2          bin 3
//!   [0, 128)     [128, 512)    [512, 1024)    [1024, ∞)
//! ```

/// Number of size-class bins.
pub const BIN_COUNT: usize = 4;

/// Exclusive upper bounds of bins `0..BIN_COUNT - 1`; the last bin is unbounded.
pub const BIN_LIMITS: [usize; BIN_COUNT - 1] = [128, 512, 1024];

/// Returns the bin a block of `size` payload bytes belongs to.
#[must_use]
pub const fn bin_index(size: usize) -> usize {
  let mut index = 0;
  while index < BIN_LIMITS.len() {
    if size < BIN_LIMITS[index] {
      return index;
    }
    index += 1;
  }
  BIN_COUNT - 1
}
