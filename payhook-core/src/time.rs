use std::cmp::Ordering;
use std::convert::TryFrom;
use std::fmt::{self, Display};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use serde::{de, Deserialize, Deserializer, Serialize};

/// The number of seconds since the [`UNIX_EPOCH`], as carried in webhook
/// payloads' `created` field and in each record's `last_event_created_at`.
///
/// Represented as a non-negative [`i64`] (rather than `u64`) to match how
/// most payment providers encode this field on the wire.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[cfg_attr(any(test, feature = "test-utils"), derive(proptest_derive::Arbitrary))]
pub struct UnixTime(
    #[cfg_attr(
        any(test, feature = "test-utils"),
        proptest(strategy = "0..i64::MAX")
    )]
    i64,
);

impl UnixTime {
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Returns the current time. Panics if the system clock is set before
    /// the epoch, which should never happen in practice.
    pub fn now() -> Self {
        Self::try_from(SystemTime::now()).expect("Current time is before 1970")
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }

    /// Saturating subtraction, returning the duration between two instants.
    /// Returns `Duration::ZERO` if `self` is before `earlier`.
    pub fn saturating_duration_since(self, earlier: Self) -> Duration {
        let diff = self.0 - earlier.0;
        if diff <= 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(diff as u64)
        }
    }

    pub fn checked_add(self, duration: Duration) -> Option<Self> {
        i64::try_from(duration.as_secs())
            .ok()
            .and_then(|secs| self.0.checked_add(secs))
            .map(Self)
    }

    pub fn checked_sub(self, duration: Duration) -> Option<Self> {
        i64::try_from(duration.as_secs())
            .ok()
            .and_then(|secs| self.0.checked_sub(secs))
            .map(Self)
    }
}

impl Ord for UnixTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}
impl PartialOrd for UnixTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for UnixTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl TryFrom<SystemTime> for UnixTime {
    type Error = anyhow::Error;
    fn try_from(system_time: SystemTime) -> anyhow::Result<Self> {
        system_time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .map(i64::try_from)
            .map(|res| res.map(Self))
            .context("Current time is before January 1st, 1970")?
            .context("Current time is too far past the epoch")
    }
}

impl From<UnixTime> for SystemTime {
    fn from(ts: UnixTime) -> Self {
        let secs = u64::try_from(ts.0).expect("Non-negative invariant was violated");
        UNIX_EPOCH + Duration::from_secs(secs)
    }
}

/// Enforces that the inner `i64` is non-negative.
impl<'de> Deserialize<'de> for UnixTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = i64::deserialize(deserializer)?;
        if value >= 0 {
            Ok(UnixTime(value))
        } else {
            Err(de::Error::invalid_value(
                de::Unexpected::Signed(value),
                &"Unix timestamp must be non-negative",
            ))
        }
    }
}
