//! Ring bit buffer invariants from spec §8, driven through its public API.

use circuitry::RingBitBuffer;

#[test]
fn failed_plus_successful_always_equals_recorded() {
    let buf = RingBitBuffer::new(16);
    for i in 0..100u32 {
        buf.record(i % 7 == 0);
        let snap = buf.snapshot();
        assert_eq!(
            snap.number_of_failed_calls + snap.number_of_successful_calls,
            snap.number_of_recorded_calls
        );
        assert!(snap.number_of_recorded_calls <= snap.capacity);
    }
}

#[test]
fn reflects_exactly_the_last_n_outcomes_after_overflow() {
    let buf = RingBitBuffer::new(4);
    // Fill with failures, then overwrite all of them with successes.
    for _ in 0..4 {
        buf.record(true);
    }
    assert_eq!(buf.snapshot().failure_rate, 100.0);

    for _ in 0..4 {
        buf.record(false);
    }
    let snap = buf.snapshot();
    assert_eq!(snap.failure_rate, 0.0);
    assert_eq!(snap.number_of_failed_calls, 0);
    assert_eq!(snap.number_of_successful_calls, 4);
}

#[test]
fn not_full_reports_sentinel_rate() {
    let buf = RingBitBuffer::new(10);
    for _ in 0..9 {
        assert_eq!(buf.record(true), -1.0);
    }
    assert!(!buf.is_full());
}

#[test]
fn concurrent_records_preserve_the_invariant() {
    use std::sync::Arc;

    let buf = Arc::new(RingBitBuffer::new(50));
    std::thread::scope(|scope| {
        for t in 0..8 {
            let buf = buf.clone();
            scope.spawn(move || {
                for i in 0..200u32 {
                    buf.record((i + t) % 3 == 0);
                }
            });
        }
    });

    let snap = buf.snapshot();
    assert_eq!(
        snap.number_of_failed_calls + snap.number_of_successful_calls,
        snap.number_of_recorded_calls
    );
    assert_eq!(snap.number_of_recorded_calls, snap.capacity);
}
