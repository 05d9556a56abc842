//! Conversion of Codeforces wire types into the shared domain types.

use chrono::DateTime;
use cptrack_core::platform::Platform;
use cptrack_core::profile::PlatformProfile;
use cptrack_core::series::RatingPoint;

use crate::types::{RatingUpdate, UserInfo};

/// Builds a [`PlatformProfile`] from a `user.info` record.
///
/// Codeforces exposes no solve counts through `user.info`, so
/// `total_solved` and the difficulty split stay unset; the topic breakdown
/// is filled in separately from `user.status`.
#[must_use]
pub fn profile_from_user(user: &UserInfo) -> PlatformProfile {
    let mut profile = PlatformProfile::bare(Platform::Codeforces, user.handle.clone());
    profile.rating = user.rating;
    profile.max_rating = user.max_rating;
    profile.rank = user.rank.clone();
    profile
}

/// Converts `user.rating` entries into rating points, oldest first.
///
/// Each point carries the post-contest rating at the contest's update time.
/// Entries with a timestamp outside the representable range are skipped.
#[must_use]
pub fn history_points(updates: &[RatingUpdate]) -> Vec<RatingPoint> {
    updates
        .iter()
        .filter_map(|u| {
            let at = DateTime::from_timestamp(u.rating_update_time_seconds, 0)?;
            Some(RatingPoint {
                rating: u.new_rating,
                at,
            })
        })
        .collect()
}
