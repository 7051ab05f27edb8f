//! Melody predictor capability
//!
//! The pitch-estimation model lives outside this crate. Anything that turns audio
//! samples into per-frame melody estimates can drive transcription by implementing
//! [`MelodyPredictor`].

use crate::analysis::RawMelodyFrame;
use crate::error::{HumError, Result as HumErrorResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Audio to per-frame melody estimate
pub trait MelodyPredictor: Send + Sync {
    /// Duration covered by one output frame
    fn frame_duration_sec(&self) -> f32;

    /// Predict the melody of a mono clip, one frame per analysis window
    fn predict(&self, samples: &[f32], sample_rate: u32) -> HumErrorResult<Vec<RawMelodyFrame>>;
}

/// Unit of the `pitch` field in a melody dump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitchUnit {
    /// Fractional MIDI note number
    #[default]
    Midi,
    /// Fundamental frequency, converted with [`hz_to_midi`] on load
    Hz,
}

/// On-disk dump of an external model's output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MelodyDump {
    pub frame_duration_sec: f32,
    #[serde(default)]
    pub pitch_unit: PitchUnit,
    pub frames: Vec<RawMelodyFrame>,
}

/// Replays a melody estimate computed ahead of time by the external model
#[derive(Debug, Clone)]
pub struct JsonMelodyPredictor {
    dump: MelodyDump,
}

impl JsonMelodyPredictor {
    pub fn new(mut dump: MelodyDump) -> HumErrorResult<Self> {
        if !(dump.frame_duration_sec.is_finite() && dump.frame_duration_sec > 0.0) {
            return Err(HumError::PredictorError(format!(
                "Invalid frame duration {}",
                dump.frame_duration_sec
            )));
        }
        if dump.frames.is_empty() {
            return Err(HumError::PredictorError(
                "Melody dump contains no frames".to_string(),
            ));
        }

        if dump.pitch_unit == PitchUnit::Hz {
            for frame in &mut dump.frames {
                frame.pitch = frame.pitch.and_then(hz_to_midi);
            }
            dump.pitch_unit = PitchUnit::Midi;
        }
        Ok(Self { dump })
    }

    /// Load a `{ "frame_duration_sec": .., "pitch_unit": "midi" | "hz", "frames": [..] }`
    /// JSON dump; `pitch_unit` defaults to `midi`
    pub fn from_file<P: AsRef<Path>>(path: P) -> HumErrorResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let dump: MelodyDump = serde_json::from_str(&content)
            .map_err(|e| HumError::PredictorError(format!("Invalid melody dump: {}", e)))?;
        Self::new(dump)
    }
}

impl MelodyPredictor for JsonMelodyPredictor {
    fn frame_duration_sec(&self) -> f32 {
        self.dump.frame_duration_sec
    }

    fn predict(&self, samples: &[f32], sample_rate: u32) -> HumErrorResult<Vec<RawMelodyFrame>> {
        if sample_rate > 0 && !samples.is_empty() {
            let audio_sec = samples.len() as f32 / sample_rate as f32;
            let dump_sec = self.dump.frames.len() as f32 * self.dump.frame_duration_sec;
            if (audio_sec - dump_sec).abs() > 1.0 {
                log::warn!(
                    "Melody dump covers {:.2}s but audio is {:.2}s",
                    dump_sec,
                    audio_sec
                );
            }
        }
        Ok(self.dump.frames.clone())
    }
}

/// Frequency in Hz to fractional MIDI note number
pub fn hz_to_midi(hz: f32) -> Option<f32> {
    if hz.is_finite() && hz > 0.0 {
        Some(69.0 + 12.0 * (hz / 440.0).log2())
    } else {
        None
    }
}
