//! Conversion of LeetCode wire types into the shared domain types.

use std::collections::BTreeMap;

use cptrack_core::platform::Platform;
use cptrack_core::profile::{PlatformProfile, SolvedByDifficulty};

use crate::types::{ContestRanking, MatchedUser, SubmitStats, TagProblemCounts};

/// Builds a [`PlatformProfile`] from the profile and contest-ranking query
/// results.
///
/// `ranking` is `None` for accounts that never attended a rated contest;
/// such profiles carry solve counts but no rating. Contest ratings arrive
/// as floats and are rounded to the nearest integer.
#[must_use]
pub fn profile_from_parts(user: &MatchedUser, ranking: Option<&ContestRanking>) -> PlatformProfile {
    let mut profile = PlatformProfile::bare(Platform::Leetcode, user.username.clone());
    #[allow(clippy::cast_possible_truncation)]
    {
        profile.rating = ranking.map(|r| r.rating.round() as i32);
    }
    profile.total_solved = total_solved(user.submit_stats_global.as_ref());
    profile.solved_by_difficulty = difficulty_split(user.submit_stats_global.as_ref());
    if let Some(tags) = &user.tag_problem_counts {
        profile.topics = merge_topic_buckets(tags);
    }
    profile
}

/// The `All` entry of `acSubmissionNum`, i.e. distinct accepted problems.
#[must_use]
pub fn total_solved(stats: Option<&SubmitStats>) -> Option<i64> {
    stats?
        .ac_submission_num
        .iter()
        .find(|c| c.difficulty == "All")
        .map(|c| c.count)
}

/// Splits accepted counts into easy/medium/hard buckets.
#[must_use]
pub fn difficulty_split(stats: Option<&SubmitStats>) -> Option<SolvedByDifficulty> {
    let stats = stats?;
    let mut split = SolvedByDifficulty::default();
    let mut any = false;
    for entry in &stats.ac_submission_num {
        match entry.difficulty.as_str() {
            "Easy" => {
                split.easy = entry.count;
                any = true;
            }
            "Medium" => {
                split.medium = entry.count;
                any = true;
            }
            "Hard" => {
                split.hard = entry.count;
                any = true;
            }
            _ => {}
        }
    }
    any.then_some(split)
}

/// Flattens the three topic tiers into a single tag → count map.
///
/// Tiers are disjoint on LeetCode today, but counts are summed rather than
/// overwritten in case a tag ever appears in more than one.
#[must_use]
pub fn merge_topic_buckets(tags: &TagProblemCounts) -> BTreeMap<String, i64> {
    let mut merged: BTreeMap<String, i64> = BTreeMap::new();
    for bucket in [&tags.advanced, &tags.intermediate, &tags.fundamental] {
        for tag in bucket {
            *merged.entry(tag.tag_name.clone()).or_insert(0) += tag.problems_solved;
        }
    }
    merged
}
