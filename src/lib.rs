//! # segalloc - A Segregated-Fit Heap Allocator
//!
//! This crate provides a general-purpose **segregated free-list allocator**
//! that manages a single, growable heap obtained from an arena provider
//! (by default the program break, via `sbrk`).
//!
//! ## Overview
//!
//! Free blocks are filed into four size-class bins. Each bin is a singly
//! linked list threaded through the free blocks themselves and kept in
//! ascending size order:
//!
//! ```text
//!   Segregated Free Lists:
//!
//!   bins[0]  [0, 128)     ──► 32 ──► 48 ──► 112 ──► ∅
//!   bins[1]  [128, 512)   ──► 144 ──► 400 ──► ∅
//!   bins[2]  [512, 1024)  ──► ∅
//!   bins[3]  [1024, ∞)    ──► 2048 ──► ∅
//! ```
//!
//! An allocation takes the first block large enough in the request's bin, or
//! in the next non-empty larger bin, and only grows the arena when none
//! fits. Oversized blocks are split and the tail goes back to a bin:
//!
//! ```text
//!   Splitting (request = 100 → 112 bytes):
//!
//!   before ┌────┬──────────────────────────────────────────────┐
//!          │ H  │                    1024                      │
//!          └────┴──────────────────────────────────────────────┘
//!   after  ┌────┬─────────┬────┬─────────────────────────────────┐
//!          │ H  │   112   │ H  │              896 (free)         │
//!          └────┴─────────┴────┴─────────────────────────────────┘
//! ```
//!
//! Releasing a block merges it with every free block that touches it in
//! memory, whatever bin that neighbor is filed in, so no two free blocks are
//! ever adjacent once a release returns:
//!
//! ```text
//!   Coalescing (release B):
//!
//!   ┌──────────┬──────────┬──────────┐        ┌────────────────────────────┐
//!   │ A (free) │ B (used) │ C (free) │  ───►  │       A + B + C (free)     │
//!   └──────────┴──────────┴──────────┘        └────────────────────────────┘
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   segalloc
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── arena      - ArenaProvider trait, SbrkArena, BoundedArena
//!   ├── bin        - Size classes
//!   ├── block      - Block header codec (internal)
//!   ├── config     - HeapConfig
//!   ├── error      - AllocError
//!   ├── free_list  - Segregated free lists (internal)
//!   ├── heap       - Heap: allocate / release
//!   └── stats      - HeapStats
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use segalloc::{BoundedArena, Heap};
//!
//! let mut heap = Heap::new(BoundedArena::new(64 * 1024).unwrap());
//!
//! let payload = heap.allocate(100).unwrap();
//!
//! unsafe {
//!     payload.as_ptr().write_bytes(0x2A, 100);
//!     heap.release(payload.as_ptr()).unwrap();
//! }
//!
//! // The released block is handed out again instead of growing the arena.
//! assert_eq!(heap.allocate(90).unwrap(), payload);
//! ```
//!
//! ## Block Layout
//!
//! ```text
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │         User Data              │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ size << 4 | A   │  │  ┌──────────────────────────┐  │
//!   │  │ next (if free)  │  │  │     N bytes usable       │  │
//!   │  └─────────────────┘  │  └──────────────────────────┘  │
//!   │      16 bytes         │                                │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to user (16-byte aligned)
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: a [`Heap`] is a plain context object with no
//!   synchronization; wrap it in a mutex to share it.
//! - **Never shrinks**: memory obtained from the arena is never given back.
//! - **Best-effort validation**: `release` rejects foreign pointers and
//!   blocks that are already free when it can tell, but a corrupted header
//!   goes unnoticed.
//!
//! ## Safety
//!
//! Releasing memory requires `unsafe`: the heap trusts that a pointer passed
//! to [`Heap::release`] came from the same heap and is not used afterwards.

pub mod align;
mod arena;
mod bin;
mod block;
mod config;
mod error;
mod free_list;
mod heap;
mod stats;

/// Alignment of every block size and payload address.
pub const ALIGNMENT: usize = 16;

#[cfg(unix)]
pub use arena::SbrkArena;
pub use arena::{ArenaProvider, BoundedArena};
pub use bin::{BIN_COUNT, BIN_LIMITS, bin_index};
pub use block::{BlockMeta, HEADER_SIZE, MAX_BLOCK_SIZE};
pub use config::{HeapConfig, MIN_REMAINDER};
pub use error::AllocError;
pub use free_list::{FreeBlock, FreeListIter};
pub use heap::Heap;
pub use stats::HeapStats;
