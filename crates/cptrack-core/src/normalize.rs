//! Cross-platform rating normalization.
//!
//! Every platform rates on its own scale, so values are projected onto a
//! shared 0–100 scale before they are compared or averaged. The projection
//! is linear between the platform's reference bounds and clamps outside
//! them, so an 800-rated Codeforces account and a 1000-rated LeetCode
//! account both sit at 0.

use crate::platform::{Platform, RatingBounds};

/// Maps a platform-native rating onto the shared 0–100 scale.
#[must_use]
pub fn normalize(rating: i32, platform: Platform) -> f64 {
    normalize_with(rating, platform.rating_bounds())
}

/// [`normalize`] against explicit bounds. `bounds.min` maps to 0,
/// `bounds.max` to 100, values outside clamp to the endpoints.
#[must_use]
pub fn normalize_with(rating: i32, bounds: RatingBounds) -> f64 {
    let rating = f64::from(rating);
    if rating <= bounds.min {
        return 0.0;
    }
    if rating >= bounds.max {
        return 100.0;
    }
    (rating - bounds.min) / (bounds.max - bounds.min) * 100.0
}

/// Averages two normalized platform values into one overall value.
///
/// A user linked on only one platform keeps that platform's value unhalved;
/// the average only kicks in when both platforms contribute.
#[must_use]
pub fn combine_overall(codeforces: Option<f64>, leetcode: Option<f64>) -> Option<f64> {
    match (codeforces, leetcode) {
        (Some(a), Some(b)) => Some((a + b) / 2.0),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}
