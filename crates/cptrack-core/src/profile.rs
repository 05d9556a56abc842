//! The adapter-neutral view of a platform account.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::platform::Platform;

/// What a platform adapter reports about one account at one moment.
///
/// Fields a platform cannot supply stay `None`/empty rather than failing the
/// whole fetch: Codeforces has no solve counts in its profile endpoint, and
/// LeetCode has no rating until the account has contest history.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformProfile {
    pub platform: Platform,
    pub handle: String,
    pub rating: Option<i32>,
    pub max_rating: Option<i32>,
    pub rank: Option<String>,
    pub total_solved: Option<i64>,
    pub solved_by_difficulty: Option<SolvedByDifficulty>,
    /// Topic name to solved-problem count. Empty when the breakdown was not
    /// fetched or the platform returned nothing.
    pub topics: BTreeMap<String, i64>,
}

impl PlatformProfile {
    /// A profile carrying only identity, with every stat unset.
    #[must_use]
    pub fn bare(platform: Platform, handle: impl Into<String>) -> Self {
        PlatformProfile {
            platform,
            handle: handle.into(),
            rating: None,
            max_rating: None,
            rank: None,
            total_solved: None,
            solved_by_difficulty: None,
            topics: BTreeMap::new(),
        }
    }
}

/// Solve counts split by problem difficulty (LeetCode only).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SolvedByDifficulty {
    pub easy: i64,
    pub medium: i64,
    pub hard: i64,
}
