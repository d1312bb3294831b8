// Literal boundary scenarios for sequential allocation, gap reuse,
// multi-word claims, and out-of-space/invalid-argument handling,
// adapted from `test_st.cpp`'s `simple_tests_uint8`.

use bitrange_alloc::{AllocError, LockFreeAllocator, SerializedAllocator};

#[test]
fn s1_sequential_first_fit_allocations() {
    let a: LockFreeAllocator<u8> = LockFreeAllocator::new(16);

    assert_eq!(a.alloc(2).unwrap(), 0);
    assert_eq!(a.alloc(1).unwrap(), 2);
    assert_eq!(a.alloc(5).unwrap(), 3);
    assert_eq!(a.usage(), 8);
}

#[test]
fn s2_free_then_first_fit_reuses_gap() {
    let a: LockFreeAllocator<u8> = LockFreeAllocator::new(16);
    a.alloc(2).unwrap();
    a.alloc(1).unwrap();
    a.alloc(5).unwrap();

    a.free(0, 2);
    assert_eq!(a.usage(), 6);

    assert_eq!(a.alloc(2).unwrap(), 0);
    assert_eq!(a.usage(), 8);
}

#[test]
fn s3_multi_word_claim_and_out_of_space() {
    let a: LockFreeAllocator<u8> = LockFreeAllocator::new(16);
    a.alloc(8).unwrap(); // fills word 0
    a.free(3, 5);
    assert_eq!(a.usage(), 3);

    assert_eq!(a.alloc(16), Err(AllocError::OutOfSpace { requested: 16 }));

    let p = a.alloc(13).unwrap();
    assert_eq!(p, 3);
    assert_eq!(a.usage(), 16);
}

#[test]
fn s3_24bit_capacity_variant() {
    let a: LockFreeAllocator<u8> = LockFreeAllocator::new(24);
    a.alloc(8).unwrap();
    a.free(3, 5);

    let p = a.alloc(16).unwrap();
    assert_eq!(p, 3);
    assert_eq!(a.usage(), 19);
}

#[test]
fn s4_16bit_word_gap_reuse() {
    let a: LockFreeAllocator<u16> = LockFreeAllocator::new(48);

    assert_eq!(a.alloc(5).unwrap(), 0);
    assert_eq!(a.alloc(2).unwrap(), 5);
    assert_eq!(a.alloc(9).unwrap(), 7);

    a.free(5, 2);
    assert_eq!(a.alloc(2).unwrap(), 5);
}

#[test]
fn s5_32bit_word_fills_and_reclaims_leading_run() {
    let a: LockFreeAllocator<u32> = LockFreeAllocator::new(64);

    assert_eq!(a.alloc(17).unwrap(), 0);
    assert_eq!(a.alloc(7).unwrap(), 17);
    assert_eq!(a.alloc(8).unwrap(), 24);

    a.free(0, 17);
    assert_eq!(a.alloc(17).unwrap(), 0);
}

#[test]
fn s6_alloc_zero_is_invalid_argument_on_any_state() {
    let a: LockFreeAllocator<u8> = LockFreeAllocator::new(16);
    assert_eq!(a.alloc(0), Err(AllocError::InvalidArgument));

    a.alloc(4).unwrap();
    assert_eq!(a.alloc(0), Err(AllocError::InvalidArgument));
}

#[test]
fn last_bit_of_word_aligned_capacity_does_not_panic() {
    let a: LockFreeAllocator<u8> = LockFreeAllocator::new(8);
    a.alloc(7).unwrap();
    assert_eq!(a.alloc(1).unwrap(), 7);
    assert_eq!(a.usage(), 8);
}

#[test]
fn serialized_allocator_last_bit_of_word_aligned_capacity() {
    let a: SerializedAllocator<u8> = SerializedAllocator::new(8);
    a.alloc(7).unwrap();
    assert_eq!(a.alloc(1).unwrap(), 7);
    assert_eq!(a.usage(), 8);
}

#[test]
fn serialized_allocator_matches_same_scenarios() {
    let a: SerializedAllocator<u8> = SerializedAllocator::new(16);

    assert_eq!(a.alloc(2).unwrap(), 0);
    assert_eq!(a.alloc(1).unwrap(), 2);
    assert_eq!(a.alloc(5).unwrap(), 3);
    a.free(0, 2);
    assert_eq!(a.alloc(2).unwrap(), 0);
    assert_eq!(a.usage(), 8);
}
