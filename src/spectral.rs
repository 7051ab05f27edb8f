//! Spectral processing utilities (STFT, onset strength)

use ndarray::Array2;
use rustfft::{num_complex::Complex32, FftPlanner};

/// STFT data structure
#[derive(Debug, Clone)]
pub struct StftData {
    pub s: Array2<Complex32>,
    pub freqs: Vec<f32>,
    pub times: Vec<f32>,
}

impl StftData {
    pub fn n_frames(&self) -> usize {
        self.s.shape()[1]
    }
}

/// Compute STFT of audio signal
///
/// Signals shorter than one window produce zero frames.
pub fn stft(y: &[f32], n_fft: usize, hop_length: usize, window: &str, sample_rate: u32) -> StftData {
    let n_frames = if n_fft == 0 || hop_length == 0 || y.len() < n_fft {
        0
    } else {
        (y.len() - n_fft) / hop_length + 1
    };
    let n_bins = n_fft / 2 + 1;
    let mut s = Array2::<Complex32>::zeros((n_bins, n_frames));

    if n_frames > 0 {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n_fft);
        let window_fn = generate_window(window, n_fft);

        for frame_idx in 0..n_frames {
            let start = frame_idx * hop_length;

            let mut frame: Vec<Complex32> = y[start..start + n_fft]
                .iter()
                .zip(&window_fn)
                .map(|(&sample, &win)| Complex32::new(sample * win, 0.0))
                .collect();

            fft.process(&mut frame);

            for (i, &val) in frame[..n_bins].iter().enumerate() {
                s[[i, frame_idx]] = val;
            }
        }
    }

    let freqs: Vec<f32> = (0..n_bins)
        .map(|i| i as f32 * sample_rate as f32 / n_fft.max(1) as f32)
        .collect();

    let times: Vec<f32> = (0..n_frames)
        .map(|i| i as f32 * hop_length as f32 / sample_rate.max(1) as f32)
        .collect();

    StftData { s, freqs, times }
}

/// Generate window function
fn generate_window(window_type: &str, size: usize) -> Vec<f32> {
    match window_type {
        "hann" if size > 1 => (0..size)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
            })
            .collect(),
        _ => vec![1.0; size],
    }
}

/// Compute magnitude spectrogram
pub fn magnitude_spectrogram(stft_data: &StftData) -> Array2<f32> {
    stft_data.s.map(|c| c.norm())
}

/// Compute spectral flux (half-wave rectified, per frame)
pub fn spectral_flux(mag_spec: &Array2<f32>) -> Vec<f32> {
    let n_frames = mag_spec.shape()[1];
    let mut flux = vec![0.0; n_frames];

    for t in 1..n_frames {
        let mut frame_flux = 0.0;
        for f in 0..mag_spec.shape()[0] {
            let diff = mag_spec[[f, t]] - mag_spec[[f, t - 1]];
            if diff > 0.0 {
                frame_flux += diff;
            }
        }
        flux[t] = frame_flux;
    }

    flux
}

/// Onset strength envelope: log-compressed spectral flux, normalized to peak 1
pub fn onset_strength(y: &[f32], n_fft: usize, hop_length: usize, sample_rate: u32) -> Vec<f32> {
    let stft_data = stft(y, n_fft, hop_length, "hann", sample_rate);
    let mag = magnitude_spectrogram(&stft_data).map(|m| (1.0 + 100.0 * m).ln());
    let mut flux = spectral_flux(&mag);

    let peak = flux.iter().cloned().fold(0.0f32, f32::max);
    if peak > 0.0 {
        for v in flux.iter_mut() {
            *v /= peak;
        }
    }
    flux
}
