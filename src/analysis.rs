//! Melody data model and report export

use crate::error::HumError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One analysis window of the external melody estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMelodyFrame {
    pub frame_index: usize,
    /// Fractional MIDI note number; `None` when unvoiced
    pub pitch: Option<f32>,
    pub confidence: f32,
    /// Onset activation from predictors that emit one
    #[serde(default)]
    pub onset: bool,
}

impl RawMelodyFrame {
    pub fn voiced(frame_index: usize, pitch: f32, confidence: f32) -> Self {
        Self {
            frame_index,
            pitch: Some(pitch),
            confidence,
            onset: false,
        }
    }

    pub fn unvoiced(frame_index: usize) -> Self {
        Self {
            frame_index,
            pitch: None,
            confidence: 0.0,
            onset: false,
        }
    }
}

/// Frame after refinement: a snapped semitone or an explicit rest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinedNote {
    pub frame_index: usize,
    /// `None` marks a rest
    pub pitch: Option<u8>,
    /// Forces a note boundary at this frame
    pub onset: bool,
}

impl RefinedNote {
    pub fn rest(frame_index: usize) -> Self {
        Self {
            frame_index,
            pitch: None,
            onset: false,
        }
    }

    pub fn is_rest(&self) -> bool {
        self.pitch.is_none()
    }
}

/// A single monophonic note in MIDI ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub start_tick: u32,
    pub duration_ticks: u32,
    pub pitch: u8,
}

impl NoteEvent {
    pub fn end_tick(&self) -> u32 {
        self.start_tick + self.duration_ticks
    }
}

/// Largest delta-time a MIDI track event can carry (28-bit variable-length quantity)
pub const MAX_TICK_DELTA: u32 = 0x0FFF_FFFF;

/// Ordered notes plus the tempo used to place them in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub notes: Vec<NoteEvent>,
    /// Microseconds per quarter note
    pub tempo: u32,
}

impl Segment {
    pub fn new(tempo: u32) -> Self {
        Self {
            notes: Vec::new(),
            tempo,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn pitches(&self) -> Vec<u8> {
        self.notes.iter().map(|n| n.pitch).collect()
    }

    pub fn total_duration_ticks(&self) -> u64 {
        self.notes.iter().map(|n| n.duration_ticks as u64).sum()
    }

    /// Check monophonic ordering, non-zero durations and the MIDI pitch range
    pub fn validate(&self) -> crate::HumErrorResult<()> {
        if self.tempo == 0 || self.tempo > 0x00FF_FFFF {
            return Err(HumError::MidiExportError(format!(
                "Tempo {} us/quarter does not fit a tempo meta event",
                self.tempo
            )));
        }

        let mut previous_end = 0u32;
        for (i, note) in self.notes.iter().enumerate() {
            if note.duration_ticks == 0 {
                return Err(HumError::MidiExportError(format!(
                    "Note {} has zero duration",
                    i
                )));
            }
            if note.pitch > 127 {
                return Err(HumError::MidiExportError(format!(
                    "Note {} pitch {} is outside 0-127",
                    i, note.pitch
                )));
            }
            if note.start_tick.checked_add(note.duration_ticks).is_none() {
                return Err(HumError::MidiExportError(format!(
                    "Note {} ends past the tick range",
                    i
                )));
            }
            if note.start_tick < previous_end {
                return Err(HumError::MidiExportError(format!(
                    "Note {} starts at tick {} before the previous note ends at {}",
                    i, note.start_tick, previous_end
                )));
            }
            if note.start_tick - previous_end > MAX_TICK_DELTA || note.duration_ticks > MAX_TICK_DELTA
            {
                return Err(HumError::MidiExportError(format!(
                    "Note {} needs a tick delta above {}",
                    i, MAX_TICK_DELTA
                )));
            }
            previous_end = note.end_tick();
        }
        Ok(())
    }
}

/// Note reconstructed from a MIDI file at an ordinal position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParsedNote {
    /// Synthetic counter scaled by tempo, not wall-clock time
    pub index_position: f64,
    pub pitch: u8,
}

pub type ParsedNoteList = Vec<ParsedNote>;

/// First difference between consecutive pitch-normalized notes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalPoint {
    pub delta_position: f64,
    pub delta_pitch: i32,
}

impl IntervalPoint {
    pub fn new(delta_position: f64, delta_pitch: i32) -> Self {
        Self {
            delta_position,
            delta_pitch,
        }
    }

    /// Euclidean distance in the (position, pitch) plane
    pub fn distance(&self, other: &IntervalPoint) -> f64 {
        let dp = self.delta_position - other.delta_position;
        let dn = (self.delta_pitch - other.delta_pitch) as f64;
        (dp * dp + dn * dn).sqrt()
    }
}

pub type IntervalVector = Vec<IntervalPoint>;

/// Distance of one candidate file to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub file: String,
    pub distance: f64,
}

/// Ranked search payload handed to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    pub query_file: String,
    pub results: Vec<MatchResult>,
    /// Seconds spent producing `results`
    pub execution_time: f64,
    /// False when the corpus contained no candidate files
    pub corpus_found: bool,
}

/// Write a search report as pretty JSON
pub fn export_report(report: &SearchReport, path: &Path) -> crate::HumErrorResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;

    log::info!(
        "Exported {} match results to {}",
        report.results.len(),
        path.display()
    );
    Ok(())
}
