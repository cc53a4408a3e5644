//! Timestamp selection over the newest sample of every timeline.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use contracts::{TimelineId, TimelineKind, Timestamp};

/// Newest timestamp reported by one timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub id: TimelineId,
    pub timestamp: Timestamp,
}

impl Candidate {
    pub fn new(id: TimelineId, timestamp: Timestamp) -> Self {
        Self { id, timestamp }
    }
}

/// Timelines taking part in a round, one index set per kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InclusionSet {
    frames: BTreeSet<usize>,
    matrices: BTreeSet<usize>,
}

impl InclusionSet {
    pub fn insert(&mut self, id: TimelineId) {
        match id.kind {
            TimelineKind::Frame => self.frames.insert(id.index),
            TimelineKind::Matrix => self.matrices.insert(id.index),
        };
    }

    #[inline]
    pub fn contains(&self, kind: TimelineKind, index: usize) -> bool {
        self.indices(kind).contains(&index)
    }

    #[inline]
    pub fn indices(&self, kind: TimelineKind) -> &BTreeSet<usize> {
        match kind {
            TimelineKind::Frame => &self.frames,
            TimelineKind::Matrix => &self.matrices,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len() + self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of a selection
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Oldest timestamp among included timelines
    pub instant: Timestamp,
    /// Newest timestamp overall
    pub newest: Timestamp,
    pub included: InclusionSet,
    /// Number of timelines that had data
    pub candidates: usize,
}

impl Selection {
    /// Distance between the newest and the selected instant
    #[inline]
    pub fn spread(&self) -> f64 {
        self.newest - self.instant
    }
}

/// Pick the synchronization instant
///
/// A timeline is included iff `newest - ts < tolerance`; the instant is
/// the oldest included timestamp. Returns `None` when no timeline has
/// data or when nothing fits in the window (non-positive tolerance).
pub fn select(candidates: &[Candidate], tolerance: Timestamp) -> Option<Selection> {
    let newest = candidates
        .iter()
        .map(|c| c.timestamp)
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))?;

    let mut included = InclusionSet::default();
    let mut instant: Option<Timestamp> = None;

    for candidate in candidates {
        if newest - candidate.timestamp < tolerance {
            included.insert(candidate.id);
            instant = Some(match instant {
                Some(current) => current.min(candidate.timestamp),
                None => candidate.timestamp,
            });
        }
    }

    instant.map(|instant| Selection {
        instant,
        newest,
        included,
        candidates: candidates.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: usize, ts: Timestamp) -> Candidate {
        Candidate::new(TimelineId::frame(index), ts)
    }

    fn matrix(index: usize, ts: Timestamp) -> Candidate {
        Candidate::new(TimelineId::matrix(index), ts)
    }

    #[test]
    fn test_no_candidates() {
        assert!(select(&[], 500.0).is_none());
    }

    #[test]
    fn test_single_timeline() {
        let selection = select(&[matrix(0, 200.0)], 500.0).unwrap();
        assert_eq!(selection.instant, 200.0);
        assert!(selection.included.contains(TimelineKind::Matrix, 0));
        assert!(!selection.included.contains(TimelineKind::Frame, 0));
    }

    #[test]
    fn test_tolerance_boundary_excluded() {
        let tolerance = 30.0;
        let selection = select(&[frame(0, 100.0), frame(1, 100.0 - tolerance)], tolerance).unwrap();

        assert_eq!(selection.instant, 100.0);
        assert!(selection.included.contains(TimelineKind::Frame, 0));
        assert!(!selection.included.contains(TimelineKind::Frame, 1));
    }

    #[test]
    fn test_tolerance_boundary_included() {
        let tolerance = 30.0;
        let selection = select(
            &[frame(0, 100.0), frame(1, 100.0 - tolerance + 1.0)],
            tolerance,
        )
        .unwrap();

        assert_eq!(selection.instant, 71.0);
        assert_eq!(selection.included.len(), 2);
        assert_eq!(selection.spread(), 29.0);
    }

    #[test]
    fn test_instant_is_oldest_included() {
        let selection = select(&[frame(0, 1000.0), matrix(0, 1480.0)], 500.0).unwrap();

        assert_eq!(selection.instant, 1000.0);
        assert_eq!(selection.newest, 1480.0);
        assert_eq!(selection.included.len(), 2);
    }

    #[test]
    fn test_separate_index_spaces() {
        let selection = select(&[frame(0, 10.0), matrix(0, 1000.0)], 500.0).unwrap();

        assert!(selection.included.contains(TimelineKind::Matrix, 0));
        assert!(!selection.included.contains(TimelineKind::Frame, 0));
        assert_eq!(selection.candidates, 2);
    }

    #[test]
    fn test_non_positive_tolerance() {
        assert!(select(&[frame(0, 10.0)], 0.0).is_none());
        assert!(select(&[frame(0, 10.0)], -1.0).is_none());
    }
}
