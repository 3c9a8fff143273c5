use chrono::{DateTime, Utc};
use models::{Band, Satellite, Sector};

/// Multiplier over the expected interval beyond which a delta counts as a gap.
pub const DEFAULT_TOLERANCE: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Gap {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: f64,
    pub expected_frames: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CoverageStats {
    pub coverage_percent: f64,
    pub gap_count: usize,
    pub total_frames: usize,
    pub expected_frames: i64,
    pub time_range: Option<TimeRange>,
    pub gaps: Vec<Gap>,
}

/// Slide a 2-wide window over ascending capture times; a gap exists when the
/// delta exceeds `expected_interval × tolerance`.
pub fn find_gaps(timestamps: &[DateTime<Utc>], expected_interval: f64, tolerance: f64) -> Vec<Gap> {
    if timestamps.len() < 2 || expected_interval <= 0.0 {
        return Vec::new();
    }
    let threshold = expected_interval * tolerance;

    timestamps
        .windows(2)
        .filter_map(|pair| {
            let delta_minutes = (pair[1] - pair[0]).num_seconds() as f64 / 60.0;
            if delta_minutes <= threshold {
                return None;
            }
            let expected_frames = ((delta_minutes / expected_interval) as i64 - 1).max(1);
            Some(Gap {
                start: pair[0],
                end: pair[1],
                duration_minutes: (delta_minutes * 10.0).round() / 10.0,
                expected_frames,
            })
        })
        .collect()
}

/// Coverage percentage and gap descriptors over the given capture times.
/// Empty and single-frame inputs yield zero gaps and 0% coverage.
pub fn coverage_stats(
    timestamps: &[DateTime<Utc>],
    expected_interval: f64,
    tolerance: f64,
) -> CoverageStats {
    let gaps = find_gaps(timestamps, expected_interval, tolerance);

    let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) else {
        return CoverageStats {
            coverage_percent: 0.0,
            gap_count: 0,
            total_frames: 0,
            expected_frames: 0,
            time_range: None,
            gaps: Vec::new(),
        };
    };

    let total_minutes = (*last - *first).num_seconds() as f64 / 60.0;
    if total_minutes <= 0.0 {
        return CoverageStats {
            coverage_percent: 0.0,
            gap_count: 0,
            total_frames: timestamps.len(),
            expected_frames: 0,
            time_range: Some(TimeRange {
                start: *first,
                end: *last,
            }),
            gaps: Vec::new(),
        };
    }

    let gap_minutes: f64 = gaps.iter().map(|g| g.duration_minutes).sum();
    let covered = total_minutes - gap_minutes;
    let coverage = (covered / total_minutes * 100.0).clamp(0.0, 100.0);
    let expected_frames = if expected_interval > 0.0 {
        (total_minutes / expected_interval) as i64 + 1
    } else {
        timestamps.len() as i64
    };

    CoverageStats {
        coverage_percent: (coverage * 10.0).round() / 10.0,
        gap_count: gaps.len(),
        total_frames: timestamps.len(),
        expected_frames,
        time_range: Some(TimeRange {
            start: *first,
            end: *last,
        }),
        gaps,
    }
}

/// Run gap detection over catalogued frames matching the filters.
pub async fn detect(
    pool: &sqlx::PgPool,
    satellite: Option<Satellite>,
    band: Option<Band>,
    sector: Option<Sector>,
    expected_interval: f64,
    tolerance: f64,
) -> sqlx::Result<CoverageStats> {
    let timestamps = crate::frames::capture_times(pool, satellite, band, sector).await?;
    Ok(coverage_stats(&timestamps, expected_interval, tolerance))
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn minutes_after(base: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
        base + chrono::Duration::minutes(minutes)
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap()
    }

    #[test]
    fn empty_and_single_inputs_have_no_gaps() {
        let stats = coverage_stats(&[], 10.0, DEFAULT_TOLERANCE);
        assert_eq!(stats.gap_count, 0);
        assert_eq!(stats.coverage_percent, 0.0);
        assert!(stats.time_range.is_none());

        let stats = coverage_stats(&[base()], 10.0, DEFAULT_TOLERANCE);
        assert_eq!(stats.gap_count, 0);
        assert_eq!(stats.coverage_percent, 0.0);
        assert_eq!(stats.total_frames, 1);
    }

    #[test]
    fn uniform_cadence_is_full_coverage() {
        let timestamps: Vec<_> = (0..10).map(|i| minutes_after(base(), i * 10)).collect();
        let stats = coverage_stats(&timestamps, 10.0, DEFAULT_TOLERANCE);
        assert_eq!(stats.gap_count, 0);
        assert_eq!(stats.coverage_percent, 100.0);
        assert_eq!(stats.expected_frames, 10);
    }

    #[test]
    fn fifty_minute_hole_in_ten_minute_cadence() {
        // 10 frames at 10-minute cadence, a 50-minute hole, then 5 more.
        let mut timestamps: Vec<_> = (0..10).map(|i| minutes_after(base(), i * 10)).collect();
        let resume = minutes_after(base(), 90 + 50);
        timestamps.extend((0..5).map(|i| minutes_after(resume, i * 10)));

        let stats = coverage_stats(&timestamps, 10.0, DEFAULT_TOLERANCE);
        assert_eq!(stats.gap_count, 1);

        let gap = &stats.gaps[0];
        assert_eq!(gap.duration_minutes, 50.0);
        assert_eq!(gap.expected_frames, 4);

        let total_span: f64 = 90.0 + 50.0 + 40.0;
        let expected_coverage = ((total_span - 50.0) / total_span * 1000.0).round() / 10.0;
        assert_eq!(stats.coverage_percent, expected_coverage);
    }

    #[test]
    fn delta_just_inside_tolerance_is_not_a_gap() {
        // 15 minutes == 10 × 1.5 exactly; a gap requires strictly greater.
        let timestamps = vec![base(), minutes_after(base(), 15)];
        assert!(find_gaps(&timestamps, 10.0, DEFAULT_TOLERANCE).is_empty());

        let timestamps = vec![base(), minutes_after(base(), 16)];
        assert_eq!(find_gaps(&timestamps, 10.0, DEFAULT_TOLERANCE).len(), 1);
    }

    #[test]
    fn tiny_gap_still_expects_at_least_one_frame() {
        let timestamps = vec![base(), minutes_after(base(), 16)];
        let gaps = find_gaps(&timestamps, 10.0, DEFAULT_TOLERANCE);
        assert_eq!(gaps[0].expected_frames, 1);
    }
}
