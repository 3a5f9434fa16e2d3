use counter::{Counter, ManualClock};
use proptest::prelude::*;
use std::time::{Duration, SystemTime};

const RESOLUTION_MS: u64 = 100;
const BUCKETS: u64 = 8;

fn quantum(elapsed_ms: u64) -> u64 {
    elapsed_ms / RESOLUTION_MS
}

// sum of everything added in the `BUCKETS` most recent quanta
fn expected(events: &[(u64, u64)], now_ms: u64) -> u64 {
    let now_q = quantum(now_ms);
    events
        .iter()
        .filter(|(ms, _)| quantum(*ms) + BUCKETS > now_q)
        .map(|(_, n)| n)
        .sum()
}

proptest! {
    #[test]
    fn matches_reference_model(
        steps in prop::collection::vec((0u64..1500, 0u64..10_000), 1..64),
        read_delay in 0u64..2000,
    ) {
        let clock = ManualClock::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000));
        let counter = Counter::with_clock(
            Duration::from_millis(RESOLUTION_MS * BUCKETS),
            Duration::from_millis(RESOLUTION_MS),
            clock.clone(),
        ).unwrap();
        // milliseconds since the clock's starting point
        let mut now_ms = 0;
        let mut events = Vec::new();
        for (delay, n) in steps {
            now_ms += delay;
            clock.advance(Duration::from_millis(delay));
            counter.add(n);
            events.push((now_ms, n));
            prop_assert_eq!(counter.get(), expected(&events, now_ms));
        }
        now_ms += read_delay;
        clock.advance(Duration::from_millis(read_delay));
        let first = counter.get();
        prop_assert_eq!(first, expected(&events, now_ms));
        prop_assert_eq!(counter.get(), first);
    }
}
