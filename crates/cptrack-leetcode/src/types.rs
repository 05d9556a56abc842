//! Wire types for the LeetCode GraphQL API.
//!
//! Responses follow the usual GraphQL shape: a `data` object mirroring the
//! query plus an optional `errors` array. An unknown username shows up
//! either as a null `matchedUser` or as a "user does not exist" error,
//! depending on the query; the client folds both into `None`.

use serde::Deserialize;

/// Top-level GraphQL response envelope.
#[derive(Debug, Deserialize)]
pub struct GraphqlResponse<T> {
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlError {
    pub message: String,
}

/// `data` payload of the profile query.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedUserData {
    pub matched_user: Option<MatchedUser>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedUser {
    pub username: String,
    #[serde(default)]
    pub profile: Option<UserProfile>,
    #[serde(default)]
    pub submit_stats_global: Option<SubmitStats>,
    #[serde(default)]
    pub tag_problem_counts: Option<TagProblemCounts>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub about_me: Option<String>,
    #[serde(default)]
    pub ranking: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitStats {
    #[serde(default)]
    pub ac_submission_num: Vec<DifficultyCount>,
}

/// One `{difficulty, count}` pair; difficulty is `All`, `Easy`, `Medium`
/// or `Hard`.
#[derive(Debug, Clone, Deserialize)]
pub struct DifficultyCount {
    pub difficulty: String,
    pub count: i64,
}

/// Tag counts bucketed by LeetCode's own topic tiers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagProblemCounts {
    #[serde(default)]
    pub advanced: Vec<TagCount>,
    #[serde(default)]
    pub intermediate: Vec<TagCount>,
    #[serde(default)]
    pub fundamental: Vec<TagCount>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagCount {
    pub tag_name: String,
    pub problems_solved: i64,
}

/// `data` payload of the contest-ranking query.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestRankingData {
    pub user_contest_ranking: Option<ContestRanking>,
}

/// Null for accounts that never attended a rated contest.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestRanking {
    pub rating: f64,
    #[serde(default)]
    pub attended_contests_count: i64,
    #[serde(default)]
    pub global_ranking: Option<i64>,
}
