//! Configuration system for the hum-to-MIDI processor

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub tempo: TempoConfig,
    pub refine: RefineConfig,
    pub segment: SegmentConfig,
    pub midi: MidiConfig,
    pub matching: MatchingConfig,
    pub validation: ValidationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            tempo: TempoConfig::default(),
            refine: RefineConfig::default(),
            segment: SegmentConfig::default(),
            midi: MidiConfig::default(),
            matching: MatchingConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

/// Tempo estimation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    /// Tempo used whenever estimation fails
    pub default_bpm: f32,
    pub min_bpm: f32,
    pub max_bpm: f32,
    pub n_fft: usize,
    pub hop_length: usize,
    /// Clips shorter than this fall back to `default_bpm`
    pub min_duration_sec: f32,
    pub prior_center_bpm: f32,
    /// Standard deviation of the tempo prior, in octaves
    pub prior_octave_width: f32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            default_bpm: 120.0,
            min_bpm: 50.0,
            max_bpm: 220.0,
            n_fft: 2048,
            hop_length: 512,
            min_duration_sec: 1.0,
            prior_center_bpm: 120.0,
            prior_octave_width: 1.0,
        }
    }
}

/// Note refinement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Frames below this confidence are treated as unvoiced
    pub min_confidence: f32,
    pub min_pitch: u8,
    pub max_pitch: u8,
    /// Longest transient (in beats) collapsed into its neighbours
    pub spike_max_beats: f32,
    /// Longest unvoiced gap (in frames) bridged between identical pitches
    pub max_gap_frames: usize,
    pub fold_octave_errors: bool,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            min_pitch: 21,
            max_pitch: 108,
            spike_max_beats: 0.125,
            max_gap_frames: 1,
            fold_octave_errors: true,
        }
    }
}

/// Segmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Notes shorter than this are discarded as noise
    pub min_note_duration_sec: f32,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_note_duration_sec: 0.08,
        }
    }
}

/// MIDI export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    pub ticks_per_quarter: u16,
    pub velocity: u8,
    pub channel: u8,
    pub track_name: String,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            ticks_per_quarter: 480,
            velocity: 100,
            channel: 0,
            track_name: "Melody".to_string(),
        }
    }
}

/// How the query is aligned against one candidate window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentMode {
    /// Query fully consumed; window entered and left at any position
    Subsequence,
    /// Query and window aligned end to end
    Full,
}

/// Melody matching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Slack added to the query length to form the sliding window width
    pub window_size: usize,
    /// Finite stand-in for "no valid alignment"
    pub sentinel_distance: f64,
    pub alignment: AlignmentMode,
    pub parallel: bool,
    /// Candidate file extension (without the dot)
    pub extension: String,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            sentinel_distance: 1e9,
            alignment: AlignmentMode::Subsequence,
            parallel: true,
            extension: "mid".to_string(),
        }
    }
}

/// Input validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub sample_rate_range: [u32; 2],
    pub max_duration_sec: f32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            sample_rate_range: [8000, 192000],
            max_duration_sec: 1800.0,
        }
    }
}

/// Validate configuration parameters
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    let tempo = &config.tempo;
    if !(tempo.min_bpm > 0.0 && tempo.default_bpm > 0.0) {
        anyhow::bail!("tempo bpm values must be positive");
    }
    if tempo.min_bpm >= tempo.max_bpm {
        anyhow::bail!("tempo.min_bpm must be < tempo.max_bpm");
    }
    if tempo.n_fft == 0 || tempo.hop_length == 0 {
        anyhow::bail!("tempo.n_fft and tempo.hop_length must be non-zero");
    }
    if tempo.prior_octave_width <= 0.0 {
        anyhow::bail!("tempo.prior_octave_width must be positive");
    }

    let refine = &config.refine;
    if refine.min_pitch > refine.max_pitch || refine.max_pitch > 127 {
        anyhow::bail!("refine pitch bounds must satisfy min_pitch <= max_pitch <= 127");
    }
    if !(0.0..=1.0).contains(&refine.min_confidence) {
        anyhow::bail!("refine.min_confidence must be within [0, 1]");
    }
    if refine.spike_max_beats < 0.0 {
        anyhow::bail!("refine.spike_max_beats must not be negative");
    }

    if config.segment.min_note_duration_sec < 0.0 {
        anyhow::bail!("segment.min_note_duration_sec must not be negative");
    }

    let midi = &config.midi;
    if midi.ticks_per_quarter == 0 || midi.ticks_per_quarter > 0x7FFF {
        anyhow::bail!("midi.ticks_per_quarter must be within 1..=32767");
    }
    if midi.velocity == 0 || midi.velocity > 127 {
        anyhow::bail!("midi.velocity must be within 1..=127");
    }
    if midi.channel > 15 {
        anyhow::bail!("midi.channel must be within 0..=15");
    }

    let matching = &config.matching;
    if !(matching.sentinel_distance.is_finite() && matching.sentinel_distance > 0.0) {
        anyhow::bail!("matching.sentinel_distance must be a positive finite number");
    }
    if matching.extension.is_empty() {
        anyhow::bail!("matching.extension must not be empty");
    }

    let [sr_min, sr_max] = config.validation.sample_rate_range;
    if sr_min == 0 || sr_min > sr_max {
        anyhow::bail!("validation.sample_rate_range must be a non-empty positive range");
    }

    Ok(())
}

/// Load configuration from JSON file
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Save configuration to JSON file
pub fn save_config<P: AsRef<std::path::Path>>(config: &Config, path: P) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
