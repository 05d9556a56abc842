//! Platform identifiers and their rating reference bounds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A supported competitive-programming platform.
///
/// Stored in the database as its lowercase string form (`as_str`), which is
/// also the form used in URLs and query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Codeforces,
    Leetcode,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Codeforces, Platform::Leetcode];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Codeforces => "codeforces",
            Platform::Leetcode => "leetcode",
        }
    }

    /// Reference rating range used to map this platform's native scale
    /// onto the shared 0–100 scale.
    #[must_use]
    pub fn rating_bounds(self) -> RatingBounds {
        match self {
            Platform::Codeforces => RatingBounds {
                min: 800.0,
                max: 3500.0,
            },
            Platform::Leetcode => RatingBounds {
                min: 1000.0,
                max: 3000.0,
            },
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "codeforces" => Ok(Platform::Codeforces),
            "leetcode" => Ok(Platform::Leetcode),
            other => Err(UnknownPlatform(other.to_owned())),
        }
    }
}

/// Inclusive rating range a platform realistically spans.
///
/// `min` maps to 0 and `max` to 100 on the normalized scale; ratings outside
/// the range clamp to the endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for RatingBounds {
    /// Fallback range for a platform without calibrated bounds.
    fn default() -> Self {
        RatingBounds {
            min: 0.0,
            max: 5000.0,
        }
    }
}

/// Selects either one platform or the cross-platform "overall" view.
///
/// Used by the history, topics, compare and leaderboard query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Codeforces,
    Leetcode,
    Overall,
}

impl Scope {
    /// The single platform this scope selects, or `None` for `Overall`.
    #[must_use]
    pub fn platform(self) -> Option<Platform> {
        match self {
            Scope::Codeforces => Some(Platform::Codeforces),
            Scope::Leetcode => Some(Platform::Leetcode),
            Scope::Overall => None,
        }
    }
}

impl From<Platform> for Scope {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Codeforces => Scope::Codeforces,
            Platform::Leetcode => Scope::Leetcode,
        }
    }
}

impl FromStr for Scope {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "overall" {
            return Ok(Scope::Overall);
        }
        s.parse::<Platform>().map(Scope::from)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.platform() {
            Some(p) => f.write_str(p.as_str()),
            None => f.write_str("overall"),
        }
    }
}
