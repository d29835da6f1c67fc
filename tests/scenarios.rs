use std::ptr::NonNull;

use segalloc::{AllocError, BIN_COUNT, BoundedArena, HEADER_SIZE, Heap, bin_index};

/// Small deterministic xorshift generator so failures are reproducible.
struct Rng(u64);

impl Rng {
  fn next(&mut self) -> u64 {
    self.0 ^= self.0 << 13;
    self.0 ^= self.0 >> 7;
    self.0 ^= self.0 << 17;
    self.0
  }

  fn below(
    &mut self,
    bound: u64,
  ) -> usize {
    (self.next() % bound) as usize
  }
}

struct Live {
  payload: NonNull<u8>,
  size: usize,
  fill: u8,
}

fn check_bins(heap: &Heap<BoundedArena>) {
  for bin in 0..BIN_COUNT {
    let sizes: Vec<_> = heap.free_blocks(bin).map(|free| free.size).collect();

    assert!(sizes.windows(2).all(|pair| pair[0] <= pair[1]), "bin {bin} unsorted: {sizes:?}");
    assert!(sizes.iter().all(|&size| bin_index(size) == bin), "bin {bin} misfiled: {sizes:?}");
  }
}

fn check_no_adjacent_free(heap: &Heap<BoundedArena>) {
  let mut blocks: Vec<_> = heap.all_free_blocks().collect();
  blocks.sort_by_key(|free| free.addr);

  for pair in blocks.windows(2) {
    assert!(pair[0].end() < pair[1].addr, "free blocks touch or overlap: {pair:?}");
  }
}

fn check_disjoint(
  heap: &Heap<BoundedArena>,
  live: &[Live],
) {
  let mut ranges: Vec<_> = live
    .iter()
    .map(|entry| {
      let start = entry.payload.addr().get() - HEADER_SIZE;
      (start, entry.payload.addr().get() + entry.size)
    })
    .chain(heap.all_free_blocks().map(|free| (free.addr, free.end())))
    .collect();
  ranges.sort_unstable();

  for pair in ranges.windows(2) {
    assert!(pair[0].1 <= pair[1].0, "blocks overlap: {pair:?}");
  }
}

#[test]
fn allocations_are_disjoint_and_reuse_released_space() {
  let mut heap = Heap::bounded(4096).unwrap();

  let a = heap.allocate(100).unwrap();
  let b = heap.allocate(50).unwrap();

  assert_ne!(a, b);
  assert!(a.addr().get() + 100 <= b.addr().get() - HEADER_SIZE);

  let grown = heap.stats().arena_bytes;
  unsafe { heap.release(a.as_ptr()).unwrap() };

  let c = heap.allocate(90).unwrap();
  assert_eq!(c, a);
  assert_eq!(heap.stats().arena_bytes, grown);
}

#[test]
fn large_request_lands_in_unbounded_bin() {
  let mut heap = Heap::bounded(8192).unwrap();

  let big = heap.allocate(2000).unwrap();
  assert_eq!(heap.stats().grow_calls, 1);
  assert!(unsafe { heap.usable_size(big) }.unwrap() >= 2000);

  unsafe { heap.release(big.as_ptr()).unwrap() };

  let filed: Vec<_> = heap.free_blocks(BIN_COUNT - 1).collect();
  assert_eq!(filed.len(), 1);
  assert_eq!(filed[0].addr, big.addr().get() - HEADER_SIZE);
}

#[test]
fn single_release_then_reuse() {
  let mut heap = Heap::bounded(4096).unwrap();

  let x = heap.allocate(200).unwrap();
  unsafe { heap.release(x.as_ptr()).unwrap() };

  let y = heap.allocate(200).unwrap();
  assert_eq!(x, y);

  unsafe {
    y.as_ptr().write_bytes(0x5A, 200);
    assert_eq!(*y.as_ptr().add(199), 0x5A);
    heap.release(y.as_ptr()).unwrap();
  }

  assert_eq!(heap.stats().live_allocations, 0);
  assert_eq!(heap.stats().grow_calls, 1);
}

#[test]
fn exhausted_arena_reports_out_of_memory() {
  let mut heap = Heap::bounded(1024).unwrap();
  let mut payloads = Vec::new();

  let error = loop {
    match heap.allocate(100) {
      Ok(payload) => payloads.push(payload),
      Err(error) => break error,
    }
  };

  assert_eq!(error, AllocError::OutOfMemory { requested: 112 + HEADER_SIZE });
  assert_eq!(payloads.len(), 1024 / (112 + HEADER_SIZE));

  unsafe { heap.release(payloads[3].as_ptr()).unwrap() };
  assert_eq!(heap.allocate(100), Ok(payloads[3]));
}

#[test]
fn random_workload_keeps_invariants() {
  let mut heap = Heap::bounded(4 * 1024 * 1024).unwrap();
  let mut rng = Rng(0x9E37_79B9_7F4A_7C15);
  let mut live: Vec<Live> = Vec::new();

  for step in 0..4000 {
    let release = !live.is_empty() && rng.below(100) < 45;

    if release {
      let entry = live.swap_remove(rng.below(live.len() as u64));

      unsafe {
        let bytes = std::slice::from_raw_parts(entry.payload.as_ptr(), entry.size);
        assert!(bytes.iter().all(|&byte| byte == entry.fill), "payload clobbered at step {step}");
        heap.release(entry.payload.as_ptr()).unwrap();
      }

      check_no_adjacent_free(&heap);
    } else {
      let size = match rng.below(10) {
        0 => 1024 + rng.below(3000),
        1..=3 => 128 + rng.below(896),
        _ => 1 + rng.below(127),
      };
      let payload = heap.allocate(size).unwrap();
      let fill = (step % 251) as u8;

      assert_eq!(payload.addr().get() % segalloc::ALIGNMENT, 0);
      assert!(unsafe { heap.usable_size(payload) }.unwrap() >= size);

      unsafe { payload.as_ptr().write_bytes(fill, size) };
      live.push(Live { payload, size, fill });
    }

    check_bins(&heap);
    check_disjoint(&heap, &live);
  }

  assert_eq!(heap.stats().live_allocations, live.len());

  for entry in live.drain(..) {
    unsafe { heap.release(entry.payload.as_ptr()).unwrap() };
  }

  check_no_adjacent_free(&heap);
  assert_eq!(heap.all_free_blocks().count(), 1);
  assert_eq!(heap.stats().live_bytes, 0);
}
