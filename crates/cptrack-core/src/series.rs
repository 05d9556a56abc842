//! Series alignment for charts.
//!
//! Derived series (friends average, overall) are aligned by POSITION, not by
//! timestamp: point i of every input contributes to point i of the output.
//! Snapshot cadence is close enough across accounts that positional
//! alignment reads correctly on a chart, and it keeps the math free of
//! interpolation. Inputs must already be ordered oldest-first.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::normalize::{combine_overall, normalize};
use crate::platform::Platform;

/// A raw platform-native rating observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingPoint {
    pub rating: i32,
    pub at: DateTime<Utc>,
}

/// One chart-ready point of a derived series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub value: f64,
    pub at: DateTime<Utc>,
}

/// Converts one platform's raw points into a chart series.
///
/// Values stay on the platform's native scale; normalization only applies
/// when platforms are mixed.
#[must_use]
pub fn platform_series(points: &[RatingPoint]) -> Vec<SeriesPoint> {
    points
        .iter()
        .map(|p| SeriesPoint {
            value: f64::from(p.rating),
            at: p.at,
        })
        .collect()
}

/// Merges a user's two platform histories into one overall series.
///
/// Each index normalizes whatever platforms have a point there and averages
/// them; an index where only one platform reaches keeps that platform's
/// normalized value unhalved. The output is as long as the longer input.
/// When both platforms contribute to an index, the Codeforces timestamp
/// labels the point.
#[must_use]
pub fn overall_series(codeforces: &[RatingPoint], leetcode: &[RatingPoint]) -> Vec<SeriesPoint> {
    let len = codeforces.len().max(leetcode.len());
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let cf = codeforces.get(i);
        let lc = leetcode.get(i);
        let value = combine_overall(
            cf.map(|p| normalize(p.rating, Platform::Codeforces)),
            lc.map(|p| normalize(p.rating, Platform::Leetcode)),
        );
        let (Some(value), Some(source)) = (value, cf.or(lc)) else {
            continue;
        };
        out.push(SeriesPoint {
            value,
            at: source.at,
        });
    }
    out
}

/// Averages several friends' series index-by-index.
///
/// The output is as long as the longest input; at each index the average
/// runs over however many friends still have a point there, so the
/// denominator shrinks as shorter histories run out. The timestamp comes
/// from the first contributing friend at that index.
#[must_use]
pub fn friends_average(friends: &[Vec<SeriesPoint>]) -> Vec<SeriesPoint> {
    let len = friends.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let contributing: Vec<&SeriesPoint> = friends.iter().filter_map(|s| s.get(i)).collect();
        if contributing.is_empty() {
            continue;
        }
        let sum: f64 = contributing.iter().map(|p| p.value).sum();
        #[allow(clippy::cast_precision_loss)]
        let value = sum / contributing.len() as f64;
        out.push(SeriesPoint {
            value,
            at: contributing[0].at,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const EPS: f64 = 1e-9;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, 12, 0, 0).unwrap()
    }

    fn raw(rating: i32, day: u32) -> RatingPoint {
        RatingPoint {
            rating,
            at: at(day),
        }
    }

    fn pt(value: f64, day: u32) -> SeriesPoint {
        SeriesPoint {
            value,
            at: at(day),
        }
    }

    #[test]
    fn platform_series_keeps_native_scale() {
        let series = platform_series(&[raw(1500, 1), raw(1622, 2)]);
        assert_eq!(series, vec![pt(1500.0, 1), pt(1622.0, 2)]);
    }

    #[test]
    fn overall_series_single_platform_is_not_halved() {
        let cf = [raw(800, 1), raw(2150, 2), raw(3500, 3)];
        let series = overall_series(&cf, &[]);
        assert_eq!(series.len(), 3);
        assert!((series[0].value - 0.0).abs() < EPS);
        assert!((series[1].value - 50.0).abs() < EPS);
        assert!((series[2].value - 100.0).abs() < EPS);
        assert_eq!(series[2].at, at(3));
    }

    #[test]
    fn overall_series_averages_where_both_platforms_reach() {
        // Index 0: cf 2150 -> 50, lc 2000 -> 50, average 50.
        // Index 1: only cf 3500 -> 100, kept unhalved.
        let cf = [raw(2150, 1), raw(3500, 2)];
        let lc = [raw(2000, 5)];
        let series = overall_series(&cf, &lc);
        assert_eq!(series.len(), 2);
        assert!((series[0].value - 50.0).abs() < EPS);
        assert!((series[1].value - 100.0).abs() < EPS);
    }

    #[test]
    fn overall_series_prefers_codeforces_timestamp() {
        let cf = [raw(2150, 1)];
        let lc = [raw(2000, 9)];
        let series = overall_series(&cf, &lc);
        assert_eq!(series[0].at, at(1));

        // Without a Codeforces point the LeetCode timestamp labels the point.
        let series = overall_series(&[], &lc);
        assert_eq!(series[0].at, at(9));
    }

    #[test]
    fn overall_series_of_nothing_is_empty() {
        assert!(overall_series(&[], &[]).is_empty());
    }

    #[test]
    fn friends_average_denominator_shrinks_with_shorter_histories() {
        // One friend with 5 points, one with 3: five output points, the last
        // two carrying the longer friend's values untouched.
        let long = vec![
            pt(10.0, 1),
            pt(20.0, 2),
            pt(30.0, 3),
            pt(40.0, 4),
            pt(50.0, 5),
        ];
        let short = vec![pt(30.0, 1), pt(40.0, 2), pt(50.0, 3)];
        let avg = friends_average(&[long, short]);
        assert_eq!(avg.len(), 5);
        assert!((avg[0].value - 20.0).abs() < EPS);
        assert!((avg[1].value - 30.0).abs() < EPS);
        assert!((avg[2].value - 40.0).abs() < EPS);
        assert!((avg[3].value - 40.0).abs() < EPS);
        assert!((avg[4].value - 50.0).abs() < EPS);
    }

    #[test]
    fn friends_average_timestamp_comes_from_first_contributor() {
        let a = vec![pt(1.0, 3)];
        let b = vec![pt(3.0, 7)];
        let avg = friends_average(&[a, b]);
        assert_eq!(avg.len(), 1);
        assert!((avg[0].value - 2.0).abs() < EPS);
        assert_eq!(avg[0].at, at(3));
    }

    #[test]
    fn friends_average_of_no_friends_is_empty() {
        assert!(friends_average(&[]).is_empty());
        assert!(friends_average(&[Vec::new(), Vec::new()]).is_empty());
    }
}
