//! Brute-force lockout policy: pure decision functions over account state.
//!
//! The durable store owns the failed-attempt counter and lock timestamp;
//! this module only computes transitions. A locked account is rejected
//! before any password check runs, so the lock window never leaks whether
//! the submitted password was correct.

use chrono::{DateTime, Duration, Utc};

pub const MAX_FAILED_ATTEMPTS: i32 = 5;
pub const LOCK_DURATION_MINUTES: i64 = 10;

/// Minutes remaining in the lock window, rounded up and never below 1.
/// `None` means the account is not locked (no lock set, or it has passed).
pub fn remaining_minutes(
    lock_until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<i64> {
    let until = lock_until?;
    if until <= now {
        return None;
    }
    let secs = (until - now).num_seconds();
    Some(((secs + 59) / 60).max(1))
}

/// Counter and lock transition after a failed password check. The lock is
/// set exactly when the incremented counter reaches the threshold.
pub fn after_failure(
    failed_attempts: i32,
    now: DateTime<Utc>,
) -> (i32, Option<DateTime<Utc>>) {
    let attempts = failed_attempts + 1;
    let lock_until = (attempts >= MAX_FAILED_ATTEMPTS)
        .then(|| now + Duration::minutes(LOCK_DURATION_MINUTES));
    (attempts, lock_until)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlocked_when_no_lock_is_set() {
        assert_eq!(remaining_minutes(None, Utc::now()), None);
    }

    #[test]
    fn unlocked_once_the_window_has_passed() {
        let now = Utc::now();
        assert_eq!(remaining_minutes(Some(now - Duration::seconds(1)), now), None);
        assert_eq!(remaining_minutes(Some(now), now), None);
    }

    #[test]
    fn remaining_time_rounds_up_to_at_least_one_minute() {
        let now = Utc::now();
        assert_eq!(remaining_minutes(Some(now + Duration::seconds(5)), now), Some(1));
        assert_eq!(remaining_minutes(Some(now + Duration::seconds(61)), now), Some(2));
        assert_eq!(
            remaining_minutes(Some(now + Duration::minutes(10)), now),
            Some(10)
        );
    }

    #[test]
    fn lock_engages_exactly_at_the_threshold() {
        let now = Utc::now();
        for attempts in 0..MAX_FAILED_ATTEMPTS - 1 {
            let (count, lock) = after_failure(attempts, now);
            assert_eq!(count, attempts + 1);
            if count < MAX_FAILED_ATTEMPTS {
                assert!(lock.is_none(), "no lock before the threshold");
            }
        }

        let (count, lock) = after_failure(MAX_FAILED_ATTEMPTS - 1, now);
        assert_eq!(count, MAX_FAILED_ATTEMPTS);
        assert_eq!(lock, Some(now + Duration::minutes(LOCK_DURATION_MINUTES)));
    }
}
