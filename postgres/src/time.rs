use std::sync::LazyLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Number of seconds between the UNIX epoch and the Postgres epoch (2000-01-01 00:00:00 UTC).
const POSTGRES_EPOCH_OFFSET_SECS: u64 = 946_684_800;

/// The Postgres epoch, used as the origin of timestamps in replication status updates.
pub static POSTGRES_EPOCH: LazyLock<SystemTime> =
    LazyLock::new(|| UNIX_EPOCH + Duration::from_secs(POSTGRES_EPOCH_OFFSET_SECS));

/// Returns microseconds elapsed since [`POSTGRES_EPOCH`] at `at`.
///
/// Instants before the epoch clamp to zero.
pub fn micros_since_postgres_epoch(at: SystemTime) -> i64 {
    at.duration_since(*POSTGRES_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_micros()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_is_zero_micros() {
        assert_eq!(micros_since_postgres_epoch(*POSTGRES_EPOCH), 0);
    }

    #[test]
    fn one_second_after_epoch() {
        let at = *POSTGRES_EPOCH + Duration::from_secs(1);
        assert_eq!(micros_since_postgres_epoch(at), 1_000_000);
    }

    #[test]
    fn before_epoch_clamps_to_zero() {
        assert_eq!(micros_since_postgres_epoch(UNIX_EPOCH), 0);
    }
}
