//! Pass 2: Segmentation

use crate::analysis::{NoteEvent, RefinedNote, Segment};
use crate::audio::TranscriptionState;
use crate::config::{Config, SegmentConfig};
use crate::error::Result as HumErrorResult;
use crate::passes::pass_0::bpm_to_microseconds_per_quarter;

/// Run segmentation on the refined notes
pub fn run(state: &mut TranscriptionState, config: &Config) -> HumErrorResult<()> {
    let bpm = state.bpm(config);
    let segment = segment_notes(
        &state.refined_notes,
        bpm,
        state.frame_duration_sec,
        config.midi.ticks_per_quarter,
        &config.segment,
    );
    log::info!("Segmented {} notes", segment.len());
    state.segment = Some(segment);
    Ok(())
}

/// Relative error of an f32 frame duration widened to f64
const FRAME_PRECISION: f64 = 1e-6;

/// Maps frame positions onto the MIDI tick grid
#[derive(Debug, Clone, Copy)]
pub struct TickGrid {
    ticks_per_frame: f64,
}

impl TickGrid {
    pub fn new(bpm: f32, frame_duration_sec: f32, ticks_per_quarter: u16) -> Self {
        let ticks_per_sec = bpm as f64 / 60.0 * ticks_per_quarter as f64;
        Self {
            ticks_per_frame: (frame_duration_sec as f64 * ticks_per_sec).max(0.0),
        }
    }

    /// Tick at the start of `frame`; non-decreasing in `frame`.
    ///
    /// Floored, so `tick(n)` stays within [`TickGrid::span`] of `n` frames and note
    /// durations (differences of ticks) sum to at most that span.
    pub fn tick(&self, frame: usize) -> u32 {
        // f32 durations such as 0.01 sit a hair below their decimal value
        let exact = frame as f64 * self.ticks_per_frame * (1.0 + FRAME_PRECISION);
        exact.floor().min(u32::MAX as f64) as u32
    }

    /// Ticks covered by `n_frames` frames, before flooring
    pub fn span(&self, n_frames: usize) -> f64 {
        n_frames as f64 * self.ticks_per_frame
    }
}

/// Note being accumulated, in frame units
#[derive(Debug, Clone, Copy)]
struct OpenNote {
    pitch: u8,
    start_frame: usize,
    end_frame: usize,
}

/// Group refined frames into note events on the tick grid.
///
/// Consecutive voiced frames of one pitch form a note; a rest, a pitch change,
/// a flagged onset or a hole in the frame indices closes it. Notes shorter than
/// `min_note_duration_sec`, or that round to zero ticks, are dropped.
pub fn segment_notes(
    notes: &[RefinedNote],
    bpm: f32,
    frame_duration_sec: f32,
    ticks_per_quarter: u16,
    config: &SegmentConfig,
) -> Segment {
    let grid = TickGrid::new(bpm, frame_duration_sec, ticks_per_quarter);
    let mut segment = Segment::new(bpm_to_microseconds_per_quarter(bpm));
    let mut open: Option<OpenNote> = None;

    let close = |note: OpenNote, segment: &mut Segment| {
        let duration_sec = (note.end_frame - note.start_frame) as f32 * frame_duration_sec;
        if duration_sec + 1e-6 < config.min_note_duration_sec {
            return;
        }
        let start_tick = grid.tick(note.start_frame);
        let end_tick = grid.tick(note.end_frame);
        if end_tick <= start_tick {
            return;
        }
        if let Some(last) = segment.notes.last() {
            if start_tick < last.end_tick() {
                return;
            }
        }
        segment.notes.push(NoteEvent {
            start_tick,
            duration_ticks: end_tick - start_tick,
            pitch: note.pitch.min(127),
        });
    };

    for frame in notes {
        let Some(pitch) = frame.pitch else {
            if let Some(note) = open.take() {
                close(note, &mut segment);
            }
            continue;
        };

        match open.as_mut() {
            Some(note)
                if note.pitch == pitch && !frame.onset && note.end_frame == frame.frame_index =>
            {
                note.end_frame += 1;
            }
            _ => {
                if let Some(note) = open.take() {
                    close(note, &mut segment);
                }
                open = Some(OpenNote {
                    pitch,
                    start_frame: frame.frame_index,
                    end_frame: frame.frame_index + 1,
                });
            }
        }
    }

    if let Some(note) = open.take() {
        close(note, &mut segment);
    }

    segment
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refined(pitches: &[Option<u8>]) -> Vec<RefinedNote> {
        pitches
            .iter()
            .enumerate()
            .map(|(i, &pitch)| RefinedNote {
                frame_index: i,
                pitch,
                onset: false,
            })
            .collect()
    }

    fn no_minimum() -> SegmentConfig {
        SegmentConfig {
            min_note_duration_sec: 0.0,
        }
    }

    #[test]
    fn test_tick_grid() {
        // 120 BPM, 480 tpq -> 960 ticks/s, 10 ms frames -> 9.6 ticks/frame
        let grid = TickGrid::new(120.0, 0.01, 480);
        assert_eq!(grid.tick(0), 0);
        assert_eq!(grid.tick(10), 96);
        assert_eq!(grid.tick(100), 960);
    }

    #[test]
    fn test_durations_stay_within_frame_span() {
        // 9.6 ticks per frame: rounding would give 10 ticks for one frame
        let grid = TickGrid::new(120.0, 0.01, 480);
        for n_frames in 1..200 {
            let segment = segment_notes(
                &refined(&vec![Some(60); n_frames]),
                120.0,
                0.01,
                480,
                &no_minimum(),
            );
            let total = segment.total_duration_ticks() as f64;
            assert!(
                total <= grid.span(n_frames) * (1.0 + FRAME_PRECISION),
                "{} frames -> {} ticks, span {:.3}",
                n_frames,
                total,
                grid.span(n_frames)
            );
        }
        assert_eq!(grid.tick(1), 9);
        assert_eq!(grid.tick(3), 28);
    }

    #[test]
    fn test_basic_segmentation() {
        let mut pitches = vec![None; 2];
        pitches.extend(vec![Some(60); 10]);
        pitches.extend(vec![Some(62); 10]);
        pitches.extend(vec![None; 3]);

        let segment = segment_notes(&refined(&pitches), 120.0, 0.01, 480, &no_minimum());
        assert_eq!(segment.tempo, 500_000);
        assert_eq!(segment.len(), 2);
        assert_eq!(
            segment.notes[0],
            NoteEvent {
                start_tick: 19,
                duration_ticks: 96,
                pitch: 60
            }
        );
        assert_eq!(segment.notes[1].start_tick, segment.notes[0].end_tick());
        assert_eq!(segment.notes[1].pitch, 62);
    }

    #[test]
    fn test_short_notes_discarded() {
        let mut pitches = vec![Some(60); 2];
        pitches.extend(vec![Some(64); 20]);
        let config = SegmentConfig {
            min_note_duration_sec: 0.05,
        };
        let segment = segment_notes(&refined(&pitches), 120.0, 0.01, 480, &config);
        assert_eq!(segment.pitches(), vec![64]);
    }

    #[test]
    fn test_open_note_closed_at_end() {
        let segment = segment_notes(&refined(&[Some(67); 30]), 120.0, 0.01, 480, &no_minimum());
        assert_eq!(segment.len(), 1);
        assert_eq!(segment.notes[0].duration_ticks, 288);
    }

    #[test]
    fn test_onset_splits_repeated_pitch() {
        let mut notes = refined(&[Some(60); 20]);
        notes[10].onset = true;
        let segment = segment_notes(&notes, 120.0, 0.01, 480, &no_minimum());
        assert_eq!(segment.pitches(), vec![60, 60]);
        assert!(segment.notes[1].start_tick > segment.notes[0].start_tick);
    }

    #[test]
    fn test_all_rests_yield_empty_segment() {
        let segment = segment_notes(&refined(&[None; 50]), 120.0, 0.01, 480, &no_minimum());
        assert!(segment.is_empty());
    }
}
