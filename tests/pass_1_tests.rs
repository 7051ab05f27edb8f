//! Validation tests for Pass 1: Note Refinement

use hum2midi::analysis::RawMelodyFrame;
use hum2midi::audio::TranscriptionState;
use hum2midi::config::{Config, RefineConfig};
use hum2midi::passes::pass_1::{self, refine_notes};

/// Build frames from (pitch, frame count) pairs, adding a little vibrato
fn sung_frames(notes: &[(Option<f32>, usize)]) -> Vec<RawMelodyFrame> {
    let mut frames = Vec::new();
    for &(pitch, count) in notes {
        for k in 0..count {
            let i = frames.len();
            frames.push(match pitch {
                Some(p) => {
                    let vibrato = 0.3 * (k as f32 * 0.7).sin();
                    RawMelodyFrame::voiced(i, p + vibrato, 0.8)
                }
                None => RawMelodyFrame::unvoiced(i),
            });
        }
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_matches_input_frames() {
        let frames = sung_frames(&[(None, 5), (Some(62.0), 20), (None, 5)]);
        let notes = refine_notes(&frames, 120.0, 0.01, &RefineConfig::default());

        assert_eq!(notes.len(), frames.len());
        for (frame, note) in frames.iter().zip(&notes) {
            assert_eq!(frame.frame_index, note.frame_index);
        }
        assert!(notes[..5].iter().all(|n| n.is_rest()));
        assert!(notes[5..25].iter().all(|n| n.pitch == Some(62)));
        assert!(notes[25..].iter().all(|n| n.is_rest()));
    }

    #[test]
    fn test_glide_absorbed_into_previous_note() {
        // 60 -> brief 61 glide -> 64
        let frames = sung_frames(&[(Some(60.0), 20), (Some(61.0), 3), (Some(64.0), 20)]);
        let notes = refine_notes(&frames, 120.0, 0.01, &RefineConfig::default());

        assert!(notes[..23].iter().all(|n| n.pitch == Some(60)));
        assert!(notes[23..].iter().all(|n| n.pitch == Some(64)));
    }

    #[test]
    fn test_long_notes_survive_slow_tempo_threshold() {
        // At 40 BPM the spike threshold is 18 frames; a 30-frame note stays
        let frames = sung_frames(&[(Some(60.0), 30), (Some(67.0), 30), (Some(60.0), 30)]);
        let notes = refine_notes(&frames, 40.0, 0.01, &RefineConfig::default());
        assert_eq!(notes[45].pitch, Some(67));
    }

    #[test]
    fn test_refinement_is_deterministic() {
        let frames = sung_frames(&[
            (Some(57.0), 12),
            (None, 1),
            (Some(57.0), 12),
            (Some(69.0), 2),
            (Some(59.0), 15),
        ]);
        let config = RefineConfig::default();
        let a = refine_notes(&frames, 96.0, 0.01, &config);
        let b = refine_notes(&frames, 96.0, 0.01, &config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_run_requires_frame_duration() {
        let config = Config::default();
        let mut state = TranscriptionState::from_samples(vec![0.0; 10], 16000);
        state.raw_frames = sung_frames(&[(Some(60.0), 10)]);
        assert!(pass_1::run(&mut state, &config).is_err());

        state.frame_duration_sec = 0.01;
        pass_1::run(&mut state, &config).unwrap();
        assert_eq!(state.refined_notes.len(), 10);
    }
}
