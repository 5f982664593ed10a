//! Event-volume velocity and acceleration from 5-minute buckets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Width of one timestamp bucket in seconds
pub const BUCKET_SECS: i64 = 5 * 60;

/// Buckets counted as "recent" (the newest 15 minutes of activity)
pub const RECENT_BUCKETS: usize = 3;

/// Events per side used by the acceleration comparison
const ACCELERATION_SPAN: usize = 50;

/// Fewer events than this yields zero acceleration
const MIN_ACCELERATION_EVENTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    EscalatingRapidly,
    Escalating,
    Stable,
    Decreasing,
}

impl Trend {
    /// Classify a velocity in events/hour
    pub fn from_velocity(velocity: f64) -> Self {
        if velocity > 30.0 {
            Trend::EscalatingRapidly
        } else if velocity > 10.0 {
            Trend::Escalating
        } else if velocity < -10.0 {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::EscalatingRapidly => "escalating_rapidly",
            Trend::Escalating => "escalating",
            Trend::Stable => "stable",
            Trend::Decreasing => "decreasing",
        }
    }
}

/// Velocity (events/hour) and trend for a set of event timestamps
///
/// Timestamps are counted into 5-minute buckets. The last three non-empty
/// buckets form the recent rate (`recent / 15` per minute); any earlier
/// buckets form the older rate. Velocity is the difference of the two rates
/// scaled to an hour, or just the recent rate when there is no older data.
pub fn calculate_velocity(timestamps: &[DateTime<Utc>]) -> (f64, Trend) {
    if timestamps.len() < 2 {
        return (0.0, Trend::Stable);
    }

    let mut buckets: BTreeMap<i64, usize> = BTreeMap::new();
    for ts in timestamps {
        *buckets.entry(ts.timestamp().div_euclid(BUCKET_SECS)).or_default() += 1;
    }

    if buckets.len() < 2 {
        return (0.0, Trend::Stable);
    }

    let counts: Vec<usize> = buckets.into_values().collect();
    let split = counts.len().saturating_sub(RECENT_BUCKETS);
    let recent: usize = counts[split..].iter().sum();
    let older: usize = counts[..split].iter().sum();

    let recent_minutes = (RECENT_BUCKETS as i64 * BUCKET_SECS / 60) as f64;
    let recent_rate = recent as f64 / recent_minutes;

    let velocity = if counts.len() > RECENT_BUCKETS {
        let older_minutes = ((counts.len() - RECENT_BUCKETS) as i64 * BUCKET_SECS / 60) as f64;
        let older_rate = older as f64 / older_minutes;
        (recent_rate - older_rate) * 60.0
    } else {
        recent_rate * 60.0
    };

    (velocity, Trend::from_velocity(velocity))
}

/// Change in velocity between the newest 50 events and the (up to) 50 before them
///
/// With 50 or fewer events there is nothing "before" the recent span, so the
/// older side is the first half of the window instead.
pub fn calculate_acceleration(timestamps: &[DateTime<Utc>]) -> f64 {
    let n = timestamps.len();
    if n < MIN_ACCELERATION_EVENTS {
        return 0.0;
    }

    let recent = &timestamps[n.saturating_sub(ACCELERATION_SPAN)..];
    let older = if n > ACCELERATION_SPAN {
        &timestamps[n.saturating_sub(2 * ACCELERATION_SPAN)..n - ACCELERATION_SPAN]
    } else {
        &timestamps[..n / 2]
    };

    calculate_velocity(recent).0 - calculate_velocity(older).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        // Aligned to a bucket boundary
        Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap()
    }

    /// `counts[i]` events placed inside the i-th consecutive 5-minute bucket
    fn bucketed(counts: &[usize]) -> Vec<DateTime<Utc>> {
        counts
            .iter()
            .enumerate()
            .flat_map(|(i, &count)| {
                let start = base() + Duration::minutes(5 * i as i64);
                (0..count).map(move |j| start + Duration::seconds(j as i64 % 290))
            })
            .collect()
    }

    #[test]
    fn test_too_few_events_is_stable() {
        assert_eq!(calculate_velocity(&[]), (0.0, Trend::Stable));
        assert_eq!(calculate_velocity(&[base()]), (0.0, Trend::Stable));
    }

    #[test]
    fn test_single_bucket_is_stable() {
        let timestamps = vec![base(); 40];
        assert_eq!(calculate_velocity(&timestamps), (0.0, Trend::Stable));
    }

    #[test]
    fn test_recent_only_velocity() {
        // 3 buckets, 30 events -> 2/min -> 120/hour
        let (velocity, trend) = calculate_velocity(&bucketed(&[10, 10, 10]));
        assert!((velocity - 120.0).abs() < 1e-9);
        assert_eq!(trend, Trend::EscalatingRapidly);
    }

    #[test]
    fn test_surge_in_last_bucket() {
        // recent = 2 + 2 + 40 = 44 over 15 min, older = 8 over 20 min
        let (velocity, trend) = calculate_velocity(&bucketed(&[2, 2, 2, 2, 2, 2, 40]));
        let expected = (44.0 / 15.0 - 8.0 / 20.0) * 60.0;
        assert!((velocity - expected).abs() < 1e-9);
        assert_eq!(trend, Trend::EscalatingRapidly);
    }

    #[test]
    fn test_declining_volume() {
        // older: 60 over 10 min = 6/min, recent: 3 over 15 min = 0.2/min
        let (velocity, trend) = calculate_velocity(&bucketed(&[30, 30, 1, 1, 1]));
        assert!((velocity - (0.2 - 6.0) * 60.0).abs() < 1e-9);
        assert_eq!(trend, Trend::Decreasing);
    }

    #[test]
    fn test_out_of_order_timestamps_bucket_identically() {
        let mut timestamps = bucketed(&[3, 1, 4, 1, 5]);
        let (expected, _) = calculate_velocity(&timestamps);
        timestamps.reverse();
        assert_eq!(calculate_velocity(&timestamps).0, expected);
    }

    #[test]
    fn test_trend_thresholds() {
        assert_eq!(Trend::from_velocity(30.1), Trend::EscalatingRapidly);
        assert_eq!(Trend::from_velocity(30.0), Trend::Escalating);
        assert_eq!(Trend::from_velocity(10.0), Trend::Stable);
        assert_eq!(Trend::from_velocity(-10.0), Trend::Stable);
        assert_eq!(Trend::from_velocity(-10.1), Trend::Decreasing);
    }

    #[test]
    fn test_acceleration_requires_ten_events() {
        assert_eq!(calculate_acceleration(&bucketed(&[1, 1, 1, 1, 1, 1, 1, 1, 1])), 0.0);
    }

    #[test]
    fn test_acceleration_compares_halves() {
        // 20 events: older half spans two sparse buckets, recent half is a burst
        let timestamps = bucketed(&[5, 5, 0, 0, 0, 0, 10]);
        let (recent, _) = calculate_velocity(&timestamps);
        let (older, _) = calculate_velocity(&timestamps[..10]);
        assert_eq!(calculate_acceleration(&timestamps), recent - older);
    }

    #[test]
    fn test_acceleration_partial_older_span() {
        // 70 events: recent is the last 50, older the 20 before them
        let timestamps = bucketed(&[10, 10, 0, 0, 0, 0, 50]);
        let expected = calculate_velocity(&timestamps[20..]).0 - calculate_velocity(&timestamps[..20]).0;
        assert_eq!(calculate_acceleration(&timestamps), expected);
    }

    #[test]
    fn test_acceleration_uses_last_hundred() {
        let timestamps = bucketed(&[40, 40, 40, 40]);
        let n = timestamps.len();
        let expected = calculate_velocity(&timestamps[n - 50..]).0
            - calculate_velocity(&timestamps[n - 100..n - 50]).0;
        assert_eq!(calculate_acceleration(&timestamps), expected);
    }
}
