// ── Refresh interval ──

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the snapshot gets refreshed, in the backend's integer encoding.
///
/// `-1` means the backend pushes on its own schedule, `0` means refreshes
/// are paused, and a positive value is the client-driven poll period in
/// seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub struct RefreshInterval(i64);

impl RefreshInterval {
    pub const AUTOMATIC: Self = Self(-1);
    pub const PAUSED: Self = Self(0);

    pub fn from_secs(secs: u64) -> Self {
        Self(i64::try_from(secs).unwrap_or(i64::MAX))
    }

    /// Value sent with `set-interval`.
    pub fn as_wire(self) -> i64 {
        self.0
    }

    pub fn is_automatic(self) -> bool {
        self.0 < 0
    }

    pub fn is_paused(self) -> bool {
        self.0 == 0
    }

    /// Client-driven poll period, if any.
    pub fn poll_period(self) -> Option<Duration> {
        u64::try_from(self.0)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for RefreshInterval {
    fn default() -> Self {
        Self::AUTOMATIC
    }
}

/// Any negative value the backend sends is treated as automatic.
impl From<i64> for RefreshInterval {
    fn from(value: i64) -> Self {
        if value < 0 { Self::AUTOMATIC } else { Self(value) }
    }
}

impl From<RefreshInterval> for i64 {
    fn from(interval: RefreshInterval) -> Self {
        interval.0
    }
}

impl fmt::Display for RefreshInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.poll_period() {
            Some(period) => write!(f, "every {}", humantime::format_duration(period)),
            None if self.is_paused() => f.write_str("paused"),
            None => f.write_str("automatic"),
        }
    }
}

/// Accepts `auto`, `pause`, a bare number of seconds, or a humantime
/// duration such as `90s` or `5m`.
impl FromStr for RefreshInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "automatic" | "-1" => Ok(Self::AUTOMATIC),
            "pause" | "paused" | "off" | "0" => Ok(Self::PAUSED),
            other => {
                if let Ok(secs) = other.parse::<u64>() {
                    return Ok(Self::from_secs(secs));
                }
                let period = humantime::parse_duration(other)
                    .map_err(|e| format!("invalid refresh interval '{s}': {e}"))?;
                if period < Duration::from_secs(1) {
                    return Err(format!("refresh interval '{s}' is shorter than one second"));
                }
                Ok(Self::from_secs(period.as_secs()))
            }
        }
    }
}
