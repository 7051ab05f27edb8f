//! Pass 1: Note Refinement
//!
//! Turns the raw frame-level melody estimate into one semitone (or rest) per frame:
//! voicing gate, semitone snapping, octave-error folding, dropout bridging and
//! transient collapse, in that order.

use crate::analysis::{RawMelodyFrame, RefinedNote};
use crate::audio::TranscriptionState;
use crate::config::{Config, RefineConfig};
use crate::error::{HumError, Result as HumErrorResult};

/// Run note refinement on the predictor output
pub fn run(state: &mut TranscriptionState, config: &Config) -> HumErrorResult<()> {
    if state.frame_duration_sec <= 0.0 {
        return Err(HumError::ProcessingPipelineError(
            "Melody frames missing a frame duration".to_string(),
        ));
    }

    let bpm = state.bpm(config);
    state.refined_notes = refine_notes(
        &state.raw_frames,
        bpm,
        state.frame_duration_sec,
        &config.refine,
    );

    let voiced = state.refined_notes.iter().filter(|n| !n.is_rest()).count();
    log::debug!(
        "Refined {} frames ({} voiced)",
        state.refined_notes.len(),
        voiced
    );
    Ok(())
}

/// Maximal stretch of frames sharing one pitch (or rest)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    start: usize,
    len: usize,
    pitch: Option<u8>,
}

impl Run {
    fn end(&self) -> usize {
        self.start + self.len
    }
}

fn runs(pitches: &[Option<u8>]) -> Vec<Run> {
    let mut out: Vec<Run> = Vec::new();
    for (i, &pitch) in pitches.iter().enumerate() {
        match out.last_mut() {
            Some(run) if run.pitch == pitch => run.len += 1,
            _ => out.push(Run {
                start: i,
                len: 1,
                pitch,
            }),
        }
    }
    out
}

fn fill(pitches: &mut [Option<u8>], run: &Run, pitch: Option<u8>) {
    for p in &mut pitches[run.start..run.end()] {
        *p = pitch;
    }
}

/// Number of frames in the longest transient that gets collapsed at this tempo
pub fn spike_frames(bpm: f32, frame_duration_sec: f32, config: &RefineConfig) -> usize {
    if !(bpm > 0.0 && frame_duration_sec > 0.0) {
        return 0;
    }
    let beat_sec = 60.0 / bpm;
    (config.spike_max_beats * beat_sec / frame_duration_sec).floor() as usize
}

/// Refine raw frames into per-frame semitones.
///
/// Deterministic; output has one entry per input frame, in input order.
pub fn refine_notes(
    frames: &[RawMelodyFrame],
    bpm: f32,
    frame_duration_sec: f32,
    config: &RefineConfig,
) -> Vec<RefinedNote> {
    let mut pitches: Vec<Option<u8>> = frames.iter().map(|f| quantize(f, config)).collect();
    let onsets: Vec<bool> = frames.iter().map(|f| f.onset).collect();
    let max_spike = spike_frames(bpm, frame_duration_sec, config);

    if config.fold_octave_errors {
        fold_octave_errors(&mut pitches, max_spike.max(1) * 2);
    }
    bridge_gaps(&mut pitches, &onsets, config.max_gap_frames);
    if max_spike > 0 {
        collapse_spikes(&mut pitches, max_spike);
    }

    frames
        .iter()
        .zip(pitches)
        .map(|(frame, pitch)| RefinedNote {
            frame_index: frame.frame_index,
            pitch,
            onset: frame.onset && pitch.is_some(),
        })
        .collect()
}

/// Voicing gate and semitone snapping for one frame
fn quantize(frame: &RawMelodyFrame, config: &RefineConfig) -> Option<u8> {
    let pitch = frame.pitch?;
    if !pitch.is_finite() || frame.confidence < config.min_confidence {
        return None;
    }
    let snapped = pitch.round();
    if snapped < config.min_pitch as f32 || snapped > config.max_pitch as f32 {
        return None;
    }
    Some(snapped as u8)
}

/// Fold short runs sitting a whole number of octaves away from the note before them
fn fold_octave_errors(pitches: &mut [Option<u8>], max_len: usize) {
    let runs = runs(pitches);
    for w in runs.windows(2) {
        let (prev, run) = (w[0], w[1]);
        let (Some(a), Some(b)) = (prev.pitch, run.pitch) else {
            continue;
        };
        let diff = b as i32 - a as i32;
        if diff != 0 && diff % 12 == 0 && run.len < prev.len && run.len <= max_len {
            fill(pitches, &run, Some(a));
        }
    }
}

/// Fill short unvoiced dropouts between two runs of the same pitch
fn bridge_gaps(pitches: &mut [Option<u8>], onsets: &[bool], max_gap: usize) {
    if max_gap == 0 {
        return;
    }
    let runs = runs(pitches);
    for w in runs.windows(3) {
        let (prev, gap, next) = (w[0], w[1], w[2]);
        if gap.pitch.is_none()
            && gap.len <= max_gap
            && prev.pitch.is_some()
            && prev.pitch == next.pitch
            && !onsets[next.start]
        {
            fill(pitches, &gap, prev.pitch);
        }
    }
}

/// Absorb short voiced runs flanked by voiced runs into the preceding note
fn collapse_spikes(pitches: &mut [Option<u8>], max_len: usize) {
    let runs = runs(pitches);
    let mut held: Option<u8> = None;
    for (i, run) in runs.iter().enumerate() {
        let next_voiced = runs.get(i + 1).is_some_and(|r| r.pitch.is_some());
        if run.pitch.is_some() && run.len <= max_len && held.is_some() && next_voiced {
            fill(pitches, run, held);
            continue;
        }
        held = run.pitch;
    }
}
