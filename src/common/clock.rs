use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Issues UTC timestamps at millisecond precision that strictly increase
/// within a process, so creation order and `updated_at` never tie.
#[derive(Debug, Default)]
pub struct Clock {
    last_millis: AtomicI64,
}

impl Clock {
    pub const fn new() -> Self {
        Self {
            last_millis: AtomicI64::new(0),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_millis();
        let mut last = self.last_millis.load(Ordering::Acquire);
        loop {
            let next = wall.max(last + 1);
            match self.last_millis.compare_exchange_weak(
                last,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return DateTime::from_timestamp_millis(next).unwrap_or_else(Utc::now),
                Err(actual) => last = actual,
            }
        }
    }
}

/// The stamp to record on a mutation: `now`, unless that would not move
/// past `previous`, in which case one millisecond after `previous`.
pub fn after(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let now = now.trunc_subsecs(3);
    if now > previous {
        now
    } else {
        previous.trunc_subsecs(3) + TimeDelta::milliseconds(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_strictly_increasing() {
        let clock = Clock::new();
        let mut previous = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next > previous, "{next} should be after {previous}");
            previous = next;
        }
    }

    #[test]
    fn test_clock_has_millisecond_precision() {
        let stamp = Clock::new().now();
        assert_eq!(stamp.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_after_moves_past_future_previous() {
        let now = DateTime::parse_from_rfc3339("2024-03-01T10:00:00.000Z")
            .unwrap()
            .to_utc();
        let future = DateTime::parse_from_rfc3339("2030-01-01T00:00:00.000Z")
            .unwrap()
            .to_utc();

        assert_eq!(after(future, now), future + TimeDelta::milliseconds(1));
        assert_eq!(after(now - TimeDelta::days(1), now), now);
    }
}
