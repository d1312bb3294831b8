// Basic usage walkthrough for bitrange-alloc

use bitrange_alloc::LockFreeAllocator;
use std::sync::Arc;
use std::thread;

fn main() {
    println!("=== bitrange-alloc Basic Example ===\n");

    // Example 1: Simple single-bit allocation
    println!("1. Simple Allocation:");
    let a: LockFreeAllocator<u64> = LockFreeAllocator::new(64);
    println!("   Created allocator with {} bits", a.size());

    let bit = a.alloc(1).expect("Should allocate a bit");
    println!("   Allocated bit: {}", bit);
    println!("   Currently allocated: {} bits", a.usage());

    a.free(bit, 1);
    println!("   Freed bit: {}", bit);
    println!("   Currently allocated: {} bits\n", a.usage());

    // Example 2: Multi-bit run allocations
    println!("2. Multiple Run Allocations:");
    let a: LockFreeAllocator<u64> = LockFreeAllocator::new(16);
    let mut runs = Vec::new();

    for size in [3, 5, 2] {
        if let Ok(start) = a.alloc(size) {
            runs.push((start, size));
            println!("   Allocated {} bits at {}", size, start);
        }
    }

    println!("   Total allocated: {} bits", a.usage());

    // Free the last run
    if let Some((start, size)) = runs.pop() {
        a.free(start, size);
    }
    println!("   After freeing one run: {} bits allocated\n", a.usage());

    // Example 3: Concurrent allocation
    println!("3. Concurrent Allocation (8 threads):");
    let a = Arc::new(LockFreeAllocator::<u64>::new(1024));
    let mut handles = vec![];

    for thread_id in 0..8 {
        let a = Arc::clone(&a);
        handles.push(thread::spawn(move || {
            let mut allocated = Vec::new();

            for _ in 0..50 {
                if let Ok(bit) = a.alloc(1) {
                    allocated.push(bit);
                }
            }

            println!(
                "   Thread {} allocated {} bits (first: {}, last: {})",
                thread_id,
                allocated.len(),
                allocated.first().unwrap_or(&0),
                allocated.last().unwrap_or(&0)
            );

            for bit in allocated {
                a.free(bit, 1);
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    println!("   Final allocated bits: {}", a.usage());
    println!("   All threads completed successfully\n");

    // Example 4: Exhaustion handling
    println!("4. Allocator Exhaustion:");
    let a: LockFreeAllocator<u64> = LockFreeAllocator::new(8);
    let mut bits = Vec::new();

    for _ in 0..8 {
        if let Ok(bit) = a.alloc(1) {
            bits.push(bit);
        }
    }

    println!("   Allocated all {} bits", bits.len());

    match a.alloc(1) {
        Ok(bit) => println!("   Unexpectedly got bit: {}", bit),
        Err(e) => println!("   Correctly failed: {}", e),
    }

    if let Some(bit) = bits.pop() {
        a.free(bit, 1);
        println!("   Freed bit: {}", bit);
    }

    match a.alloc(1) {
        Ok(bit) => println!("   Successfully allocated bit: {}", bit),
        Err(e) => println!("   Failed to allocate: {}", e),
    }

    println!("\n=== Example Complete ===");
}
