//! Arena providers: where the heap gets its memory from.
//!
//! The heap only ever asks for more memory and never gives any back. A
//! provider hands out fresh, [`ALIGNMENT`]-aligned regions on request or
//! reports that it cannot.

use std::{alloc, ptr::NonNull};

use log::debug;

use crate::{ALIGNMENT, error::AllocError};

/// Source of fresh heap memory.
pub trait ArenaProvider {
  /// Grows the arena by `bytes` (a non-zero multiple of [`ALIGNMENT`]) and
  /// returns the start of the new region, or `None` if the request cannot be
  /// satisfied.
  ///
  /// The returned region must be [`ALIGNMENT`]-aligned, valid for reads and
  /// writes of `bytes` bytes and stay valid for as long as the provider lives.
  fn extend(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>>;
}

/// Grows the process heap by moving the program break with `sbrk(2)`.
///
/// ```text
///   ──────────────┬─────────┬───────────────────────┐
///     previous    │ padding │   new region (bytes)  │
///   ──────────────┴─────────┴───────────────────────┘
///                 ▲ old break                       ▲ new break
/// ```
///
/// Other code in the process may move the break too, so consecutive regions
/// are not guaranteed to be contiguous.
#[cfg(unix)]
#[derive(Debug, Default)]
pub struct SbrkArena {
  _private: (),
}

#[cfg(unix)]
impl SbrkArena {
  pub const fn new() -> Self {
    Self { _private: () }
  }

  /// Current program break.
  pub fn program_break() -> *mut u8 {
    unsafe { libc::sbrk(0) as *mut u8 }
  }
}

#[cfg(unix)]
impl ArenaProvider for SbrkArena {
  fn extend(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    let current = Self::program_break().addr();
    let padding = crate::align_to!(current, ALIGNMENT) - current;
    let increment = libc::intptr_t::try_from(bytes.checked_add(padding)?).ok()?;

    let address = unsafe { libc::sbrk(increment) };

    if address == usize::MAX as *mut libc::c_void {
      return None;
    }

    let start = unsafe { (address as *mut u8).add(padding) };
    debug!("sbrk: moved program break by {increment} bytes, region at {start:?}");

    NonNull::new(start)
  }
}

/// A fixed-capacity arena carved front to back out of one region reserved
/// up front.
///
/// Consecutive regions are always contiguous, which makes heap layouts fully
/// deterministic. Once `capacity` is used up every further request fails.
#[derive(Debug)]
pub struct BoundedArena {
  base: NonNull<u8>,
  layout: alloc::Layout,
  used: usize,
}

impl BoundedArena {
  /// Reserves `capacity` bytes (rounded up to [`ALIGNMENT`]).
  pub fn new(capacity: usize) -> Result<Self, AllocError> {
    let size = capacity
      .checked_add(ALIGNMENT - 1)
      .map(|value| value & !(ALIGNMENT - 1))
      .ok_or(AllocError::ArenaCapacity { capacity })?
      .max(ALIGNMENT);
    let layout = alloc::Layout::from_size_align(size, ALIGNMENT)?;

    let base = NonNull::new(unsafe { alloc::alloc(layout) })
      .ok_or(AllocError::ArenaCapacity { capacity })?;

    Ok(Self {
      base,
      layout,
      used: 0,
    })
  }

  /// Total bytes the arena can hand out.
  pub fn capacity(&self) -> usize {
    self.layout.size()
  }

  /// Bytes handed out so far.
  pub fn used(&self) -> usize {
    self.used
  }

  /// First byte of the reserved region.
  pub fn base(&self) -> NonNull<u8> {
    self.base
  }
}

impl ArenaProvider for BoundedArena {
  fn extend(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    let end = self.used.checked_add(bytes)?;

    if end > self.capacity() {
      return None;
    }

    let start = unsafe { self.base.add(self.used) };
    self.used = end;

    Some(start)
  }
}

impl Drop for BoundedArena {
  fn drop(&mut self) {
    unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_bounded_arena_is_contiguous() {
    let mut arena = BoundedArena::new(256).unwrap();

    let first = arena.extend(64).unwrap();
    let second = arena.extend(32).unwrap();

    assert_eq!(first, arena.base());
    assert_eq!(second.as_ptr(), unsafe { first.as_ptr().add(64) });
    assert_eq!(arena.used(), 96);
    assert_eq!(first.as_ptr().addr() % ALIGNMENT, 0);
  }

  #[test]
  fn test_bounded_arena_exhaustion() {
    let mut arena = BoundedArena::new(128).unwrap();

    assert!(arena.extend(112).is_some());
    assert!(arena.extend(32).is_none());
    assert!(arena.extend(16).is_some());
    assert!(arena.extend(16).is_none());
    assert_eq!(arena.used(), arena.capacity());
  }

  #[test]
  fn test_bounded_arena_rounds_capacity() {
    assert_eq!(BoundedArena::new(100).unwrap().capacity(), 112);
    assert_eq!(BoundedArena::new(0).unwrap().capacity(), ALIGNMENT);
  }

  #[test]
  fn test_bounded_arena_rejects_absurd_capacity() {
    assert!(BoundedArena::new(usize::MAX).is_err());
  }

  #[cfg(unix)]
  #[test]
  fn test_sbrk_arena_moves_program_break() {
    let mut arena = SbrkArena::new();

    let region = arena.extend(64).unwrap();

    assert_eq!(region.as_ptr().addr() % ALIGNMENT, 0);
    assert!(SbrkArena::program_break().addr() >= region.as_ptr().addr() + 64);

    unsafe {
      region.as_ptr().write_bytes(0xAB, 64);
      assert_eq!(*region.as_ptr().add(63), 0xAB);
    }
  }
}
