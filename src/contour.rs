//! Contour encoding: pitch-normalized first differences of a note list

use crate::analysis::{IntervalPoint, IntervalVector, ParsedNote};

/// Encode one note list as an interval vector.
///
/// Pitches are shifted so the lowest becomes 0, then consecutive
/// `(position, pitch)` pairs are differenced. Output length is `len - 1`; lists
/// with fewer than two notes have no usable contour.
pub fn encode(notes: &[ParsedNote]) -> IntervalVector {
    let Some(min_pitch) = notes.iter().map(|n| n.pitch as i32).min() else {
        return Vec::new();
    };

    notes
        .windows(2)
        .map(|w| {
            let (a, b) = (&w[0], &w[1]);
            IntervalPoint {
                delta_position: b.index_position - a.index_position,
                delta_pitch: (b.pitch as i32 - min_pitch) - (a.pitch as i32 - min_pitch),
            }
        })
        .collect()
}

/// Encode a query and a candidate, each normalized by its own minimum pitch
pub fn encode_pair(query: &[ParsedNote], candidate: &[ParsedNote]) -> (IntervalVector, IntervalVector) {
    (encode(query), encode(candidate))
}
