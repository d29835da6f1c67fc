use std::{io::Read, ptr::NonNull};

use segalloc::{Heap, SbrkArena};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break = {:?}",
    label,
    std::process::id(),
    SbrkArena::program_break(),
  );
}

fn print_alloc(
  heap: &Heap<SbrkArena>,
  size: usize,
  payload: NonNull<u8>,
) {
  println!(
    "Allocated {} bytes, address = {:?}, usable = {:?}, program break = {:?}",
    size,
    payload,
    unsafe { heap.usable_size(payload) },
    SbrkArena::program_break(),
  );
}

fn print_bins(heap: &Heap<SbrkArena>) {
  for bin in 0..segalloc::BIN_COUNT {
    let blocks: Vec<_> = heap.free_blocks(bin).map(|free| free.size).collect();
    println!("    bin {bin}: {blocks:?}");
  }
  println!("    {}", heap.stats());
}

fn main() -> Result<(), segalloc::AllocError> {
  let mut heap = Heap::new(SbrkArena::new());

  print_program_break("start");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Three small allocations. Every one of them grows the arena, since
  //    the bins start out empty.
  // --------------------------------------------------------------------
  let first = heap.allocate(64)?;
  print_alloc(&heap, 64, first);
  let second = heap.allocate(64)?;
  print_alloc(&heap, 64, second);
  let third = heap.allocate(64)?;
  print_alloc(&heap, 64, third);
  let guard = heap.allocate(16)?;
  print_bins(&heap);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Release the outer two, then the middle one. The middle release
  //    merges all three into a single free block.
  // --------------------------------------------------------------------
  unsafe {
    heap.release(first.as_ptr())?;
    heap.release(third.as_ptr())?;
    println!("\n[2] Released first and third");
    print_bins(&heap);

    heap.release(second.as_ptr())?;
    println!("[2] Released second, neighbors coalesced");
    print_bins(&heap);
  }

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) A small request is carved out of the merged block; the remainder
  //    stays free. The program break does not move.
  // --------------------------------------------------------------------
  print_program_break("before reuse");
  let reused = heap.allocate(32)?;
  print_alloc(&heap, 32, reused);
  println!(
    "[3] reused == first? {}",
    if reused == first { "Yes, it reused the freed block" } else { "No" }
  );
  print_bins(&heap);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) A 64 KiB request fits no bin and grows the arena.
  // --------------------------------------------------------------------
  let big = heap.allocate(64 * 1024)?;
  print_alloc(&heap, 64 * 1024, big);
  print_program_break("after large alloc");

  unsafe {
    heap.release(big.as_ptr())?;
    heap.release(reused.as_ptr())?;
    heap.release(guard.as_ptr())?;
  }
  print_bins(&heap);

  println!("\n[5] End of walkthrough. The arena never shrinks; the OS reclaims it on exit.");

  Ok(())
}
