//! Dynamic time warping and the sliding-window matcher

use crate::analysis::IntervalPoint;
use crate::config::{AlignmentMode, MatchingConfig};
use ndarray::Array2;

/// Sliding-window parameters for one query/candidate comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowParams {
    /// Slack added to the query length to form the window width
    pub window_size: usize,
    pub alignment: AlignmentMode,
}

impl Default for WindowParams {
    fn default() -> Self {
        Self {
            window_size: 5,
            alignment: AlignmentMode::Subsequence,
        }
    }
}

impl From<&MatchingConfig> for WindowParams {
    fn from(config: &MatchingConfig) -> Self {
        Self {
            window_size: config.window_size,
            alignment: config.alignment,
        }
    }
}

/// DTW cost between `query` and `window` with Euclidean point cost.
///
/// In [`AlignmentMode::Subsequence`] the whole query must be consumed but the path
/// may start and end at any window position. Returns `f64::INFINITY` for empty
/// input, or as soon as every cell of a row exceeds `abandon_above`.
pub fn dtw_distance(
    query: &[IntervalPoint],
    window: &[IntervalPoint],
    alignment: AlignmentMode,
    abandon_above: f64,
) -> f64 {
    let (n, m) = (query.len(), window.len());
    if n == 0 || m == 0 {
        return f64::INFINITY;
    }

    let mut acc = Array2::<f64>::from_elem((n, m), f64::INFINITY);

    for i in 0..n {
        let mut row_min = f64::INFINITY;
        for j in 0..m {
            let cost = query[i].distance(&window[j]);
            let best_prev = if i == 0 {
                match alignment {
                    AlignmentMode::Subsequence => 0.0,
                    AlignmentMode::Full if j == 0 => 0.0,
                    AlignmentMode::Full => acc[[0, j - 1]],
                }
            } else if j == 0 {
                acc[[i - 1, 0]]
            } else {
                acc[[i - 1, j]]
                    .min(acc[[i, j - 1]])
                    .min(acc[[i - 1, j - 1]])
            };
            let total = cost + best_prev;
            acc[[i, j]] = total;
            row_min = row_min.min(total);
        }
        if row_min > abandon_above {
            return f64::INFINITY;
        }
    }

    match alignment {
        AlignmentMode::Full => acc[[n - 1, m - 1]],
        AlignmentMode::Subsequence => acc
            .row(n - 1)
            .iter()
            .cloned()
            .fold(f64::INFINITY, f64::min),
    }
}

/// Window width and last start offset for a comparison, or `None` when no
/// alignment is possible (empty input or a query longer than the candidate).
///
/// Windows are `query_len + window_size` wide and start at every offset from 0 to
/// `candidate_len - query_len - window_size`. A candidate shorter than one full
/// window is compared as a single window covering all of it.
pub fn window_layout(query_len: usize, candidate_len: usize, window_size: usize) -> Option<(usize, usize)> {
    if query_len == 0 || candidate_len == 0 || query_len > candidate_len {
        return None;
    }
    let width = (query_len + window_size).min(candidate_len);
    Some((width, candidate_len - width))
}

/// Minimum DTW cost of `query` over all windows of `candidate`.
///
/// `f64::INFINITY` means no valid alignment exists.
pub fn windowed_distance(
    query: &[IntervalPoint],
    candidate: &[IntervalPoint],
    params: WindowParams,
) -> f64 {
    let Some((width, last_offset)) = window_layout(query.len(), candidate.len(), params.window_size)
    else {
        return f64::INFINITY;
    };

    let mut min_distance = f64::INFINITY;
    for offset in 0..=last_offset {
        let window = &candidate[offset..offset + width];
        let distance = dtw_distance(query, window, params.alignment, min_distance);
        if distance < min_distance {
            min_distance = distance;
            if min_distance == 0.0 {
                break;
            }
        }
    }
    min_distance
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(pairs: &[(f64, i32)]) -> Vec<IntervalPoint> {
        pairs.iter().map(|&(p, n)| IntervalPoint::new(p, n)).collect()
    }

    #[test]
    fn test_identical_sequences_cost_nothing() {
        let a = points(&[(1.0, 2), (1.0, -1), (1.0, 3)]);
        for mode in [AlignmentMode::Full, AlignmentMode::Subsequence] {
            assert_eq!(dtw_distance(&a, &a, mode, f64::INFINITY), 0.0);
        }
    }

    #[test]
    fn test_full_alignment_known_cost() {
        let q = points(&[(0.0, 0), (0.0, 1)]);
        let w = points(&[(0.0, 0), (0.0, 2), (0.0, 1)]);
        // (0,0)->0, (1,2)->1, (1,1)->0
        assert!((dtw_distance(&q, &w, AlignmentMode::Full, f64::INFINITY) - 1.0).abs() < 1e-12);
        assert_eq!(dtw_distance(&q, &w, AlignmentMode::Subsequence, f64::INFINITY), 1.0);
    }

    #[test]
    fn test_subsequence_ignores_window_edges() {
        let q = points(&[(1.0, 2), (1.0, -1)]);
        let w = points(&[(1.0, 9), (1.0, 2), (1.0, -1), (1.0, 7)]);
        assert_eq!(dtw_distance(&q, &w, AlignmentMode::Subsequence, f64::INFINITY), 0.0);
        assert!(dtw_distance(&q, &w, AlignmentMode::Full, f64::INFINITY) > 0.0);
    }

    #[test]
    fn test_abandon_returns_infinity() {
        let q = points(&[(0.0, 10)]);
        let w = points(&[(0.0, 0)]);
        assert_eq!(dtw_distance(&q, &w, AlignmentMode::Full, 5.0), f64::INFINITY);
        assert_eq!(dtw_distance(&q, &w, AlignmentMode::Full, 20.0), 10.0);
    }

    #[test]
    fn test_window_layout() {
        assert_eq!(window_layout(2, 4, 1), Some((3, 1)));
        assert_eq!(window_layout(3, 3, 5), Some((3, 0)));
        assert_eq!(window_layout(4, 3, 0), None);
        assert_eq!(window_layout(0, 3, 0), None);
    }

    #[test]
    fn test_exact_match_inside_candidate() {
        let query = points(&[(1.0, 2), (1.0, -1)]);
        let candidate = points(&[(1.0, 5), (1.0, 2), (1.0, -1), (1.0, 0)]);
        let params = WindowParams {
            window_size: 1,
            alignment: AlignmentMode::Subsequence,
        };
        assert_eq!(windowed_distance(&query, &candidate, params), 0.0);
    }

    #[test]
    fn test_reports_minimum_over_offsets() {
        let query = points(&[(1.0, 4), (1.0, 4)]);
        let candidate = points(&[
            (1.0, 0),
            (1.0, 0),
            (1.0, 0),
            (1.0, 3),
            (1.0, 4),
            (1.0, 4),
        ]);
        let params = WindowParams {
            window_size: 0,
            alignment: AlignmentMode::Full,
        };

        let brute = (0..=4)
            .map(|o| dtw_distance(&query, &candidate[o..o + 2], AlignmentMode::Full, f64::INFINITY))
            .fold(f64::INFINITY, f64::min);
        assert_eq!(brute, 0.0);
        assert_eq!(windowed_distance(&query, &candidate, params), brute);
    }

    #[test]
    fn test_longer_query_has_no_alignment() {
        let query = points(&[(1.0, 1), (1.0, 1), (1.0, 1)]);
        let candidate = points(&[(1.0, 1), (1.0, 1)]);
        assert_eq!(
            windowed_distance(&query, &candidate, WindowParams::default()),
            f64::INFINITY
        );
        assert_eq!(
            windowed_distance(&[], &candidate, WindowParams::default()),
            f64::INFINITY
        );
    }
}
