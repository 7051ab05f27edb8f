//! Pass 0: Tempo Estimation

use crate::audio::TranscriptionState;
use crate::config::{Config, TempoConfig};
use crate::error::Result as HumErrorResult;
use crate::spectral::onset_strength;
use serde::{Deserialize, Serialize};

/// Single tempo for a whole clip
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoEstimate {
    pub bpm: f32,
    pub confidence: f32,
    /// True when the configured default was used instead of an estimate
    pub is_fallback: bool,
}

impl TempoEstimate {
    pub fn fallback(bpm: f32) -> Self {
        Self {
            bpm,
            confidence: 0.0,
            is_fallback: true,
        }
    }

    pub fn microseconds_per_quarter(&self) -> u32 {
        bpm_to_microseconds_per_quarter(self.bpm)
    }
}

/// Tempo in BPM to MIDI tempo (microseconds per quarter note)
pub fn bpm_to_microseconds_per_quarter(bpm: f32) -> u32 {
    if !(bpm.is_finite() && bpm > 0.0) {
        return 500_000;
    }
    (60_000_000.0 / bpm as f64).round().clamp(1.0, 16_777_215.0) as u32
}

/// MIDI tempo (microseconds per quarter note) to BPM
pub fn microseconds_per_quarter_to_bpm(tempo: u32) -> f32 {
    if tempo == 0 {
        return 120.0;
    }
    (60_000_000.0 / tempo as f64) as f32
}

/// Run tempo estimation on the loaded audio
pub fn run(state: &mut TranscriptionState, config: &Config) -> HumErrorResult<()> {
    let estimate = estimate_tempo(&state.y, state.sr, &config.tempo);
    if estimate.is_fallback {
        log::warn!(
            "Tempo estimation failed, using default {:.1} BPM",
            estimate.bpm
        );
    } else {
        log::info!(
            "Estimated tempo {:.1} BPM (confidence {:.2})",
            estimate.bpm,
            estimate.confidence
        );
    }
    state.tempo = Some(estimate);
    Ok(())
}

/// Estimate one tempo from onset-strength periodicity.
///
/// Never fails: clips that are too short, silent or aperiodic get
/// `config.default_bpm` with `is_fallback` set.
pub fn estimate_tempo(y: &[f32], sr: u32, config: &TempoConfig) -> TempoEstimate {
    let fallback = TempoEstimate::fallback(config.default_bpm);

    if sr == 0 || config.hop_length == 0 || config.min_bpm <= 0.0 {
        return fallback;
    }
    let duration_sec = y.len() as f32 / sr as f32;
    if duration_sec < config.min_duration_sec {
        return fallback;
    }

    let mut env = onset_strength(y, config.n_fft, config.hop_length, sr);
    if env.len() < 4 || env.iter().all(|&v| v <= 0.0) {
        return fallback;
    }

    let mean = env.iter().sum::<f32>() / env.len() as f32;
    for v in env.iter_mut() {
        *v -= mean;
    }

    let odf_sr = sr as f32 / config.hop_length as f32;
    let min_lag = ((60.0 * odf_sr / config.max_bpm).ceil() as usize).max(1);
    let max_lag = ((60.0 * odf_sr / config.min_bpm).floor() as usize).min(env.len() - 1);
    if max_lag <= min_lag {
        return fallback;
    }

    // Prior-weighted autocorrelation, indexed by lag
    let mut scores = vec![0.0f32; max_lag + 2];
    for lag in min_lag..=(max_lag + 1).min(env.len() - 1) {
        let n = env.len() - lag;
        let ac = env[..n]
            .iter()
            .zip(&env[lag..])
            .map(|(a, b)| a * b)
            .sum::<f32>()
            / n as f32;
        let bpm = 60.0 * odf_sr / lag as f32;
        scores[lag] = ac * tempo_prior(bpm, config);
    }

    let mut best_lag = 0;
    let mut best_score = 0.0f32;
    for (lag, &score) in scores.iter().enumerate().take(max_lag + 1).skip(min_lag) {
        if score > best_score {
            best_score = score;
            best_lag = lag;
        }
    }
    if best_lag == 0 || !best_score.is_finite() {
        return fallback;
    }

    let lag = interpolate_peak(&scores, best_lag);
    let bpm = (60.0 * odf_sr / lag).clamp(config.min_bpm, config.max_bpm);
    if !bpm.is_finite() {
        return fallback;
    }

    let total: f32 = scores[min_lag..=max_lag].iter().filter(|&&s| s > 0.0).sum();
    let confidence = if total > 0.0 {
        (best_score / total).min(1.0)
    } else {
        0.0
    };

    TempoEstimate {
        bpm,
        confidence,
        is_fallback: false,
    }
}

/// Log-normal preference for tempi near `prior_center_bpm`
fn tempo_prior(bpm: f32, config: &TempoConfig) -> f32 {
    let octaves = (bpm / config.prior_center_bpm).log2() / config.prior_octave_width;
    (-0.5 * octaves * octaves).exp()
}

/// Parabolic interpolation around a local maximum
fn interpolate_peak(values: &[f32], peak: usize) -> f32 {
    if peak == 0 || peak + 1 >= values.len() {
        return peak as f32;
    }
    let (y0, y1, y2) = (values[peak - 1], values[peak], values[peak + 1]);
    let denom = y0 - 2.0 * y1 + y2;
    if denom.abs() < f32::EPSILON {
        return peak as f32;
    }
    let offset = (0.5 * (y0 - y2) / denom).clamp(-0.5, 0.5);
    peak as f32 + offset
}
