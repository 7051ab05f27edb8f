//! Audio I/O and per-run transcription state

use crate::analysis::{RawMelodyFrame, RefinedNote, Segment};
use crate::config::Config;
use crate::error::{HumError, Result as HumErrorResult};
use crate::passes::pass_0::TempoEstimate;
use hound::WavReader;
use std::path::Path;

/// State of one transcription run, filled in pass by pass
#[derive(Debug, Clone)]
pub struct TranscriptionState {
    /// Audio samples (mono, normalized to [-1, 1])
    pub y: Vec<f32>,
    /// Sample rate in Hz
    pub sr: u32,

    /// Melody estimate from the external predictor
    pub raw_frames: Vec<RawMelodyFrame>,
    /// Duration of one predictor frame in seconds
    pub frame_duration_sec: f32,

    // Pass 0: Tempo estimation
    pub tempo: Option<TempoEstimate>,

    // Pass 1: Note refinement
    pub refined_notes: Vec<RefinedNote>,

    // Pass 2: Segmentation
    pub segment: Option<Segment>,
}

impl TranscriptionState {
    /// Load audio file and create initial state
    pub fn load<P: AsRef<Path>>(path: P, config: &Config) -> HumErrorResult<Self> {
        let (y, sr) = load_audio_file(path)?;
        check_audio(&y, sr, config)?;
        Ok(Self::from_samples(y, sr))
    }

    /// Create a state from in-memory samples
    pub fn from_samples(samples: Vec<f32>, sr: u32) -> Self {
        TranscriptionState {
            y: samples,
            sr,
            raw_frames: Vec::new(),
            frame_duration_sec: 0.0,
            tempo: None,
            refined_notes: Vec::new(),
            segment: None,
        }
    }

    /// Get audio duration in seconds
    pub fn duration_sec(&self) -> f32 {
        if self.sr == 0 {
            return 0.0;
        }
        self.y.len() as f32 / self.sr as f32
    }

    /// Tempo in BPM, or the configured default before pass 0 ran
    pub fn bpm(&self, config: &Config) -> f32 {
        self.tempo
            .as_ref()
            .map(|t| t.bpm)
            .unwrap_or(config.tempo.default_bpm)
    }
}

/// Load audio file and return mono samples with sample rate
pub fn load_audio_file<P: AsRef<Path>>(path: P) -> HumErrorResult<(Vec<f32>, u32)> {
    let path = path.as_ref();

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "wav" | "wave" => load_wav_file(path),
        _ => Err(HumError::InvalidAudioFormat(format!(
            "Unsupported audio format: {}",
            extension
        ))),
    }
}

/// Load WAV file
fn load_wav_file<P: AsRef<Path>>(path: P) -> HumErrorResult<(Vec<f32>, u32)> {
    let mut reader = WavReader::open(path).map_err(|e| HumError::AudioFileError(e.to_string()))?;
    let spec = reader.spec();

    if spec.channels == 0 {
        return Err(HumError::InvalidAudioFormat(
            "WAV header declares zero channels".to_string(),
        ));
    }

    if spec.bits_per_sample > 32 {
        return Err(HumError::InvalidAudioFormat(format!(
            "Unsupported bit depth: {}",
            spec.bits_per_sample
        )));
    }

    let sr = spec.sample_rate;
    let mut samples: Vec<f32> = Vec::with_capacity(reader.len() as usize);

    match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            for sample in reader.samples::<i32>() {
                let sample = sample.map_err(|e| HumError::AudioFileError(e.to_string()))? as f32
                    / max_value;
                samples.push(sample);
            }
        }
        hound::SampleFormat::Float => {
            for sample in reader.samples::<f32>() {
                samples.push(sample.map_err(|e| HumError::AudioFileError(e.to_string()))?);
            }
        }
    }

    Ok((downmix(&samples, spec.channels as usize), sr))
}

/// Average interleaved channels into one
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Validate audio file format and content
pub fn validate_audio_file<P: AsRef<Path>>(path: P, config: &Config) -> HumErrorResult<()> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(HumError::InputValidationError(format!(
            "Audio file does not exist: {}",
            path.display()
        )));
    }

    let (samples, sr) = load_audio_file(path)?;
    check_audio(&samples, sr, config)
}

/// Sample-rate, emptiness and length checks shared by loading and validation
fn check_audio(samples: &[f32], sr: u32, config: &Config) -> HumErrorResult<()> {
    if samples.is_empty() {
        return Err(HumError::InputValidationError(
            "Audio file contains no samples".to_string(),
        ));
    }

    let [sr_min, sr_max] = config.validation.sample_rate_range;
    if !(sr_min..=sr_max).contains(&sr) {
        return Err(HumError::UnsupportedSampleRate(sr));
    }

    let duration_sec = samples.len() as f32 / sr as f32;
    if duration_sec > config.validation.max_duration_sec {
        return Err(HumError::InputValidationError(format!(
            "Audio file too long: {:.1}s (maximum {:.0}s)",
            duration_sec, config.validation.max_duration_sec
        )));
    }

    let peak = samples.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
    if peak > 0.99 {
        log::warn!("Audio may be clipped (peak = {:.3})", peak);
    }

    Ok(())
}
