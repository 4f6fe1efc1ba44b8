//! crates/enrollment_core/src/conflict.rs
//!
//! The schedule conflict detector: pure, synchronous pairwise screening of a
//! candidate set of time windows. No I/O and no suspension points live here.

use crate::domain::TimeWindow;

/// Where a window in the candidate set came from, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSource {
    /// An activity the student is already enrolled in.
    Existing,
    /// An activity requested in the current batch.
    Requested,
}

/// One labelled window in the candidate set.
#[derive(Debug, Clone)]
pub struct CandidateWindow {
    pub activity_id: String,
    pub title: String,
    pub window: TimeWindow,
    pub source: WindowSource,
}

/// A reported overlap between two members of the candidate set. Carries both
/// identities so the caller can tell the user "X conflicts with Y", plus the
/// shared sub-interval.
#[derive(Debug, Clone)]
pub struct ConflictPair {
    pub first: CandidateWindow,
    pub second: CandidateWindow,
    pub overlap: TimeWindow,
}

/// Screens every unordered pair in the candidate set and returns all
/// conflicting pairs; an empty result means the set is admissible.
///
/// Intentionally O(n²): a student enrolls in at most a handful of activities
/// per event, so the simple scan beats an interval tree here. Callers must
/// reject malformed windows and duplicate activity ids before building the
/// candidate set; `TimeWindow` construction already makes zero-length windows
/// unrepresentable.
pub fn find_conflicts(candidates: &[CandidateWindow]) -> Vec<ConflictPair> {
    let mut conflicts = Vec::new();
    for (i, a) in candidates.iter().enumerate() {
        for b in &candidates[i + 1..] {
            if let Some(overlap) = overlapping(a, b) {
                conflicts.push(ConflictPair {
                    first: a.clone(),
                    second: b.clone(),
                    overlap,
                });
            }
        }
    }
    conflicts
}

fn overlapping(a: &CandidateWindow, b: &CandidateWindow) -> Option<TimeWindow> {
    a.window.overlaps(&b.window).then(|| {
        // Overlapping half-open intervals always have a non-empty
        // intersection, so this cannot fail.
        a.window
            .intersection(&b.window)
            .unwrap_or(a.window)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, hour, min, 0).unwrap()
    }

    fn candidate(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> CandidateWindow {
        CandidateWindow {
            activity_id: id.to_string(),
            title: id.to_string(),
            window: TimeWindow::new(start, end).unwrap(),
            source: WindowSource::Requested,
        }
    }

    #[test]
    fn overlap_is_symmetric() {
        let a = candidate("a", at(9, 0), at(11, 0));
        let b = candidate("b", at(10, 0), at(12, 0));
        assert!(a.window.overlaps(&b.window));
        assert!(b.window.overlaps(&a.window));

        let forward = find_conflicts(&[a.clone(), b.clone()]);
        let reverse = find_conflicts(&[b, a]);
        assert_eq!(forward.len(), 1);
        assert_eq!(reverse.len(), 1);
    }

    #[test]
    fn back_to_back_windows_do_not_conflict() {
        let morning = candidate("a", at(9, 0), at(11, 0));
        let afternoon = candidate("b", at(11, 0), at(13, 0));
        assert!(find_conflicts(&[morning, afternoon]).is_empty());
    }

    #[test]
    fn containment_counts_as_overlap() {
        let outer = candidate("outer", at(9, 0), at(17, 0));
        let inner = candidate("inner", at(12, 0), at(13, 0));
        let found = find_conflicts(&[outer, inner]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].overlap.start(), at(12, 0));
        assert_eq!(found[0].overlap.end(), at(13, 0));
    }

    #[test]
    fn all_conflicting_pairs_are_reported() {
        // Three mutually-overlapping windows: 3 pairs.
        let set = vec![
            candidate("a", at(9, 0), at(12, 0)),
            candidate("b", at(10, 0), at(13, 0)),
            candidate("c", at(11, 0), at(14, 0)),
        ];
        assert_eq!(find_conflicts(&set).len(), 3);
    }

    #[test]
    fn disjoint_set_is_admissible() {
        let set = vec![
            candidate("a", at(9, 0), at(10, 0)),
            candidate("b", at(10, 0), at(11, 0)),
            candidate("c", at(14, 0), at(15, 0)),
        ];
        assert!(find_conflicts(&set).is_empty());
    }

    #[test]
    fn overlap_window_is_the_shared_interval() {
        let a = candidate("a", at(9, 0), at(11, 0));
        let b = candidate("b", at(10, 30), at(12, 0));
        let found = find_conflicts(&[a, b]);
        assert_eq!(found[0].overlap.start(), at(10, 30));
        assert_eq!(found[0].overlap.end(), at(11, 0));
    }
}
