//! Property-based tests for the reconnect schedule

use feedlink::client::realtime::Backoff;
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #[test]
    fn test_delays_never_decrease(
        base_ms in 1u64..5_000,
        cap_ms in 1u64..120_000,
        attempts in 1u32..64,
    ) {
        let backoff = Backoff::new(Duration::from_millis(base_ms), Duration::from_millis(cap_ms));
        let mut previous = Duration::ZERO;
        for attempt in 1..=attempts {
            let delay = backoff.delay(attempt);
            prop_assert!(delay >= previous);
            prop_assert!(delay <= backoff.cap());
            prop_assert!(delay >= backoff.base());
            previous = delay;
        }
    }

    #[test]
    fn test_delay_doubles_below_cap(base_ms in 1u64..1_000, attempt in 1u32..10) {
        let backoff = Backoff::new(Duration::from_millis(base_ms), Duration::from_secs(3_600));
        let expected = Duration::from_millis(base_ms * (1u64 << (attempt - 1)));
        prop_assert_eq!(backoff.delay(attempt), expected);
    }
}
