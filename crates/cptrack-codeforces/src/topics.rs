//! Topic breakdown derived from raw submissions.

use std::collections::{BTreeMap, HashSet};

use crate::types::Submission;

/// Counts solved problems per topic tag.
///
/// Only accepted submissions (`verdict == "OK"`) count, and a problem counts
/// once no matter how often it was re-submitted: submissions are deduplicated
/// by `(problem.contest_id, problem.name)` before tags are tallied. A problem
/// carrying several tags contributes to each of them.
#[must_use]
pub fn topic_breakdown(submissions: &[Submission]) -> BTreeMap<String, i64> {
    let mut seen: HashSet<(Option<i64>, &str)> = HashSet::new();
    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    for submission in submissions {
        if submission.verdict.as_deref() != Some("OK") {
            continue;
        }
        let key = (submission.problem.contest_id, submission.problem.name.as_str());
        if !seen.insert(key) {
            continue;
        }
        for tag in &submission.problem.tags {
            *counts.entry(tag.clone()).or_insert(0) += 1;
        }
    }
    counts
}
