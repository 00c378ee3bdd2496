// Arena edge-case integration tests
//
// These tests drive the public API the way a caller would: growth,
// reset/reuse, release, zero-sized requests and the metric identities
// that must hold after every operation.

use std::mem::MaybeUninit;

use strata_arena::{Arena, ArenaFactory, DEFAULT_CHUNK_SIZE, Error, WORD_SIZE};

fn assert_metrics_consistent(arena: &Arena) {
    let metrics = arena.metrics();
    assert!(metrics.size_in_use <= metrics.capacity);
    assert_eq!(metrics.num_chunks, arena.num_chunks());
    assert!((0.0..=1.0).contains(&metrics.utilization));
    if arena.is_released() {
        assert_eq!(metrics.capacity, 0);
    } else {
        assert!(metrics.num_chunks >= 1);
        assert!(metrics.capacity >= arena.chunk_size());
    }
}

/// `new(1024)`, then 100 bytes, then 2000 bytes: two chunks.
#[test]
fn test_documented_growth_scenario() {
    let arena = Arena::new(1024);

    let first = arena.alloc_bytes(100).unwrap();
    assert_eq!(first.len(), 100);

    let second = arena.alloc_bytes(2000).unwrap();
    assert_eq!(second.len(), 2000);

    assert_eq!(arena.num_chunks(), 2);
    assert_metrics_consistent(&arena);
}

#[test]
fn test_zero_chunk_size_uses_default() {
    let arena = Arena::new(0);
    assert_eq!(arena.chunk_size(), 65536);
    assert_eq!(DEFAULT_CHUNK_SIZE, 65536);
    assert_eq!(ArenaFactory::new(0).create_arena().chunk_size(), 65536);
}

#[test]
fn test_exact_chunk_fill_then_overflow() {
    let arena = Arena::new(64);

    arena.alloc_bytes(64).unwrap();
    assert_eq!(arena.num_chunks(), 1);
    assert_eq!(arena.utilization(), 1.0);

    arena.alloc_bytes(1).unwrap();
    assert_eq!(arena.num_chunks(), 2);
    assert_eq!(arena.capacity(), 128);
    assert_metrics_consistent(&arena);
}

#[test]
fn test_alignment_across_chunk_boundaries() {
    let arena = Arena::new(100);
    for n in (1..=60).step_by(7) {
        let bytes = arena.alloc_bytes(n).unwrap();
        assert_eq!(bytes.as_ptr() as usize % WORD_SIZE, 0, "size {n}");
    }
    assert!(arena.num_chunks() > 1);
    assert_metrics_consistent(&arena);
}

#[test]
fn test_writes_do_not_bleed_between_allocations() {
    let arena = Arena::new(128);
    let mut regions: Vec<&mut [MaybeUninit<u8>]> = Vec::new();
    for (i, n) in [5usize, 17, 40, 3, 200, 9].into_iter().enumerate() {
        let region = arena.alloc_bytes(n).unwrap();
        for byte in region.iter_mut() {
            byte.write(i as u8 + 1);
        }
        regions.push(region);
    }

    for (i, region) in regions.iter().enumerate() {
        // SAFETY: every byte was written above.
        assert!(region.iter().all(|b| unsafe { b.assume_init() } == i as u8 + 1));
    }
}

#[test]
fn test_reset_then_regrow_reuses_every_chunk() {
    let mut arena = Arena::new(256);
    let sizes = [200usize, 200, 1000, 50, 256];

    for &n in &sizes {
        arena.alloc_bytes(n).unwrap();
    }
    let chunks = arena.num_chunks();
    let capacity = arena.capacity();

    for _ in 0..5 {
        arena.reset().unwrap();
        assert_eq!(arena.size_in_use(), 0);
        for &n in &sizes {
            arena.alloc_bytes(n).unwrap();
        }
        assert_eq!(arena.num_chunks(), chunks);
        assert_eq!(arena.capacity(), capacity);
    }
}

#[test]
fn test_ensure_capacity_then_allocate_without_growth() {
    let arena = Arena::new(512);
    arena.alloc_bytes(500).unwrap();

    arena.ensure_capacity(300).unwrap();
    let chunks = arena.num_chunks();
    assert_eq!(chunks, 2);

    arena.alloc_bytes(300).unwrap();
    assert_eq!(arena.num_chunks(), chunks);
}

#[test]
fn test_ensure_capacity_after_reset_prefers_retained_chunks() {
    let mut arena = Arena::new(256);
    arena.alloc_bytes(256).unwrap();
    arena.alloc_bytes(4096).unwrap();
    arena.reset().unwrap();

    arena.ensure_capacity(4096).unwrap();
    assert_eq!(arena.num_chunks(), 2);
    arena.alloc_bytes(4096).unwrap();
    assert_eq!(arena.num_chunks(), 2);
}

#[test]
fn test_zero_sized_requests_leave_state_untouched() {
    let arena = Arena::new(64);
    arena.alloc_bytes(64).unwrap();
    let before = arena.metrics();

    assert!(arena.alloc_bytes(0).unwrap().is_empty());
    assert!(arena.alloc_slice::<u64>(0).unwrap().is_empty());
    assert!(arena.alloc_slice_zeroed::<u32>(0).unwrap().is_empty());
    assert!(arena.alloc_slice_copy::<u8>(&[]).unwrap().is_empty());
    arena.ensure_capacity(0).unwrap();

    assert_eq!(arena.metrics(), before);
}

#[test]
fn test_failed_requests_do_not_change_metrics() {
    let arena = Arena::new(128);
    arena.alloc_bytes(40).unwrap();
    let before = arena.metrics();

    let huge = isize::MAX as usize;
    assert!(matches!(
        arena.alloc_bytes(huge).unwrap_err(),
        Error::OutOfMemory { .. } | Error::CapacityOverflow
    ));
    assert_eq!(arena.ensure_capacity(usize::MAX), Err(Error::CapacityOverflow));
    assert_eq!(
        arena.alloc_slice_zeroed::<u64>(usize::MAX / 4),
        Err(Error::CapacityOverflow)
    );
    assert_eq!(arena.metrics(), before);
    assert_metrics_consistent(&arena);

    // The arena is still usable and keeps bumping the same chunk.
    let next = arena.alloc_bytes(16).unwrap();
    assert_eq!(next.len(), 16);
    assert_eq!(arena.num_chunks(), 1);
    assert_eq!(arena.size_in_use(), 56);
}

#[test]
fn test_every_operation_after_release() {
    let mut arena = Arena::new(64);
    arena.alloc_bytes(32).unwrap();
    arena.release();

    assert_eq!(arena.alloc_bytes(1).unwrap_err(), Error::UseAfterRelease);
    assert_eq!(arena.alloc_bytes(0).unwrap_err(), Error::UseAfterRelease);
    assert_eq!(arena.alloc::<u64>(), Err(Error::UseAfterRelease));
    assert_eq!(arena.alloc_zeroed::<u64>(), Err(Error::UseAfterRelease));
    assert!(arena.alloc_uninit::<u64>().is_err());
    assert!(arena.alloc_slice::<u64>(3).is_err());
    assert_eq!(arena.alloc_slice_zeroed::<u8>(3), Err(Error::UseAfterRelease));
    assert_eq!(arena.ensure_capacity(1), Err(Error::UseAfterRelease));
    assert_eq!(arena.reset(), Err(Error::UseAfterRelease));

    // Metrics keep working.
    assert_eq!(arena.size_in_use(), 0);
    assert_eq!(arena.capacity(), 0);
    assert_eq!(arena.num_chunks(), 0);
    assert_eq!(arena.chunk_size(), 64);
    assert_eq!(arena.utilization(), 0.0);
    assert_metrics_consistent(&arena);

    // Release stays a no-op.
    arena.release();
    assert!(arena.is_released());
}

#[test]
fn test_use_after_release_is_quiet_at_default_level() {
    let mut arena = Arena::new(64);
    arena.release();

    // Rejections are reported through the error value, and only logged at
    // debug, which the default filter drops.
    for _ in 0..100 {
        assert_eq!(arena.alloc_bytes(8).unwrap_err(), Error::UseAfterRelease);
    }
    assert_eq!(strata_log::logger().level(), strata_log::Level::Warn);
    assert!(!strata_log::logger().enabled(strata_log::Level::Debug));
}

#[test]
fn test_arena_moves_to_another_thread() {
    let arena = Arena::new(256);
    arena.alloc_value(1u64).unwrap();

    let used = std::thread::spawn(move || {
        arena.alloc_value(2u64).unwrap();
        arena.size_in_use()
    })
    .join()
    .unwrap();

    assert_eq!(used, 16);
}

#[test]
fn test_error_messages_are_readable() {
    let mut arena = Arena::new(64);
    arena.release();
    let err = arena.alloc_bytes(1).unwrap_err();
    assert_eq!(err.to_string(), "arena used after release");

    let boxed: Box<dyn std::error::Error> = Box::new(err);
    assert!(boxed.to_string().contains("release"));
}
