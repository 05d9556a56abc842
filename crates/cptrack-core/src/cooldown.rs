//! Per-(user, platform) refresh throttling.
//!
//! On-demand refreshes are gated on the time since the most recent snapshot,
//! whatever created it; a scheduled capture pushes the window out exactly
//! like a manual one.

use chrono::{DateTime, Duration, Utc};

/// Minimum gap between snapshots before another on-demand refresh may run.
pub const REFRESH_COOLDOWN_SECS: i64 = 300;

/// Outcome of a cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownStatus {
    pub allowed: bool,
    /// Seconds until the next refresh is allowed, rounded up so a caller
    /// told to wait never retries a moment too early. 0 when allowed.
    pub remaining_seconds: i64,
}

impl CooldownStatus {
    /// Remaining wait in whole minutes, rounded up, for human-facing text.
    #[must_use]
    pub fn remaining_minutes(&self) -> i64 {
        (self.remaining_seconds + 59) / 60
    }
}

/// Checks whether enough time has passed since the last snapshot.
///
/// `None` means the pair has never been snapshotted, which always allows a
/// refresh. Exactly `REFRESH_COOLDOWN_SECS` elapsed is allowed; one second
/// less is not.
#[must_use]
pub fn check(last_snapshot_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> CooldownStatus {
    let Some(last) = last_snapshot_at else {
        return CooldownStatus {
            allowed: true,
            remaining_seconds: 0,
        };
    };
    let remaining_ms =
        (Duration::seconds(REFRESH_COOLDOWN_SECS) - (now - last)).num_milliseconds();
    if remaining_ms <= 0 {
        return CooldownStatus {
            allowed: true,
            remaining_seconds: 0,
        };
    }
    CooldownStatus {
        allowed: false,
        remaining_seconds: (remaining_ms + 999) / 1000,
    }
}
