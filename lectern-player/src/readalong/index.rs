//! Sorted segment index with time lookup
//!
//! Lookup rule for a time `t`, in order:
//! 1. the segment whose `[start, end)` contains `t`
//! 2. the first segment whose interval widened by the tolerance contains `t`
//! 3. the last segment with `start <= t` (keeps the highlight stable in gaps)
//! 4. nothing
//!
//! Segments are sorted by start time once; lookups are two binary searches.
//! The binary search relies on non-overlapping segments (then end times are
//! sorted as well); overlaps are reported as warnings at load time.

use lectern_common::models::{ReadAlongSegment, SegmentType};
use lectern_common::ReadAlongData;

#[derive(Debug, Clone, Default)]
pub struct SegmentIndex {
    segments: Vec<ReadAlongSegment>,
    tolerance: f64,
}

impl SegmentIndex {
    pub fn new(mut segments: Vec<ReadAlongSegment>, tolerance: f64) -> Self {
        segments.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        Self {
            segments,
            tolerance: tolerance.max(0.0),
        }
    }

    /// Index of all segments of `segment_type` in `data`
    pub fn of_type(data: &ReadAlongData, segment_type: SegmentType, tolerance: f64) -> Self {
        Self::new(data.segments_of(segment_type).cloned().collect(), tolerance)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[ReadAlongSegment] {
        &self.segments
    }

    /// Segment at a sorted position
    pub fn get(&self, position: usize) -> Option<&ReadAlongSegment> {
        self.segments.get(position)
    }

    /// Sorted position of the segment active at `time` (full lookup rule)
    pub fn active_position(&self, time: f64) -> Option<usize> {
        if time.is_nan() {
            return None;
        }
        let candidate = self.last_started(time);
        self.contained(time, candidate)
            .or_else(|| self.within_tolerance(time))
            .or(candidate)
    }

    /// Sorted position of the segment containing `time`, without gap stickiness
    pub fn containing_position(&self, time: f64) -> Option<usize> {
        if time.is_nan() {
            return None;
        }
        let candidate = self.last_started(time);
        self.contained(time, candidate)
            .or_else(|| self.within_tolerance(time))
    }

    /// `segment_index` of the segment active at `time`
    pub fn active_segment_index(&self, time: f64) -> Option<usize> {
        self.active_position(time)
            .map(|pos| self.segments[pos].segment_index)
    }

    pub fn position_of(&self, segment_index: usize) -> Option<usize> {
        self.segments
            .iter()
            .position(|s| s.segment_index == segment_index)
    }

    pub fn by_segment_index(&self, segment_index: usize) -> Option<&ReadAlongSegment> {
        self.position_of(segment_index).map(|pos| &self.segments[pos])
    }

    /// Start time of the segment with `segment_index`
    pub fn start_time_of(&self, segment_index: usize) -> Option<f64> {
        self.by_segment_index(segment_index).map(|s| s.start_time)
    }

    /// Last position whose start is `<= time`
    fn last_started(&self, time: f64) -> Option<usize> {
        self.segments
            .partition_point(|s| s.start_time <= time)
            .checked_sub(1)
    }

    fn contained(&self, time: f64, candidate: Option<usize>) -> Option<usize> {
        candidate.filter(|&pos| time < self.segments[pos].end_time)
    }

    /// First position whose widened interval contains `time`
    fn within_tolerance(&self, time: f64) -> Option<usize> {
        let first_open = self
            .segments
            .partition_point(|s| s.end_time + self.tolerance <= time);
        self.segments
            .get(first_open)
            .filter(|s| s.start_time - self.tolerance <= time)
            .map(|_| first_open)
    }

    /// Reference implementation of the lookup rule (linear scan)
    #[cfg(test)]
    pub(crate) fn linear_active_position(&self, time: f64) -> Option<usize> {
        if time.is_nan() {
            return None;
        }
        let tol = self.tolerance;
        self.segments
            .iter()
            .position(|s| s.start_time <= time && time < s.end_time)
            .or_else(|| {
                self.segments
                    .iter()
                    .position(|s| s.start_time - tol <= time && time < s.end_time + tol)
            })
            .or_else(|| self.segments.iter().rposition(|s| s.start_time <= time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn abc() -> SegmentIndex {
        SegmentIndex::new(
            vec![
                ReadAlongSegment::sentence(0, 0.0, 5.0, "A"),
                ReadAlongSegment::sentence(1, 5.0, 12.0, "B"),
                ReadAlongSegment::sentence(2, 12.0, 20.0, "C"),
            ],
            0.05,
        )
    }

    #[test]
    fn test_gap_stability_examples() {
        let index = abc();
        assert_eq!(index.active_segment_index(7.0), Some(1));
        assert_eq!(index.active_segment_index(20.0), Some(2));
        assert_eq!(index.active_segment_index(-1.0), None);
        assert_eq!(index.active_segment_index(4.98), Some(0));
    }

    #[test]
    fn test_boundaries_are_inclusive_start_exclusive_end() {
        let index = abc();
        assert_eq!(index.active_segment_index(0.0), Some(0));
        assert_eq!(index.active_segment_index(5.0), Some(1));
        assert_eq!(index.active_segment_index(12.0), Some(2));
    }

    #[test]
    fn test_gap_keeps_previous_segment() {
        let index = SegmentIndex::new(
            vec![
                ReadAlongSegment::sentence(0, 0.0, 5.0, "A"),
                ReadAlongSegment::sentence(1, 6.0, 10.0, "B"),
            ],
            0.05,
        );
        assert_eq!(index.active_segment_index(5.5), Some(0));
        // tolerance pulls in the next segment just before it starts
        assert_eq!(index.active_segment_index(5.96), Some(1));
        assert_eq!(index.containing_position(5.5), None);
    }

    #[test]
    fn test_tolerance_before_first_segment() {
        let index = SegmentIndex::new(vec![ReadAlongSegment::sentence(0, 1.0, 2.0, "A")], 0.05);
        assert_eq!(index.active_segment_index(0.97), Some(0));
        assert_eq!(index.active_segment_index(0.9), None);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let index = SegmentIndex::new(
            vec![
                ReadAlongSegment::sentence(2, 12.0, 20.0, "C"),
                ReadAlongSegment::sentence(0, 0.0, 5.0, "A"),
                ReadAlongSegment::sentence(1, 5.0, 12.0, "B"),
            ],
            0.05,
        );
        assert_eq!(index.active_segment_index(6.0), Some(1));
        assert_eq!(index.start_time_of(2), Some(12.0));
        assert_eq!(index.start_time_of(9), None);
    }

    #[test]
    fn test_empty_and_nan() {
        let empty = SegmentIndex::default();
        assert_eq!(empty.active_position(3.0), None);
        assert_eq!(abc().active_position(f64::NAN), None);
    }

    /// Random non-overlapping segment lists with gaps, touching edges and
    /// queries placed on and around every boundary.
    #[test]
    fn test_binary_search_matches_linear_scan() {
        let mut rng = StdRng::seed_from_u64(0x5eed_1ec7);

        for _ in 0..500 {
            let count = rng.gen_range(0..25);
            let tolerance = [0.0, 0.05, 0.3][rng.gen_range(0..3)];
            let mut cursor = rng.gen_range(0.0..2.0);
            let mut segments = Vec::with_capacity(count);

            for i in 0..count {
                if rng.gen_bool(0.4) {
                    cursor += rng.gen_range(0.0..1.5);
                }
                let start = cursor;
                let end = start + rng.gen_range(0.01..4.0);
                segments.push(ReadAlongSegment::sentence(i, start, end, format!("s{}", i)));
                cursor = end;
            }

            let index = SegmentIndex::new(segments, tolerance);
            let mut probes: Vec<f64> = (0..40).map(|_| rng.gen_range(-2.0..cursor + 2.0)).collect();
            for s in index.segments() {
                for edge in [s.start_time, s.end_time] {
                    probes.extend([edge, edge - tolerance, edge + tolerance, edge - 1e-9, edge + 1e-9]);
                }
            }

            for t in probes {
                assert_eq!(
                    index.active_position(t),
                    index.linear_active_position(t),
                    "mismatch at t={} (tolerance {}) in {:?}",
                    t,
                    tolerance,
                    index.segments()
                );
            }
        }
    }
}
