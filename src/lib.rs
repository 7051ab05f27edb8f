//! Hum-to-MIDI Transcription and Melody Search
//!
//! Converts a sung recording into a quantized MIDI melody, and ranks a corpus of
//! MIDI melodies against a query by windowed DTW over pitch-interval contours.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod contour;
pub mod dtw;
pub mod error;
pub mod midi;
pub mod passes;
pub mod predictor;
pub mod search;
pub mod spectral;
pub mod workspace;

pub use analysis::{MatchResult, SearchReport, Segment};
pub use audio::TranscriptionState;
pub use config::Config;
pub use error::{HumError, Result as HumErrorResult};
pub use predictor::MelodyPredictor;
pub use search::{MelodySearch, SearchOutcome};

use std::path::{Path, PathBuf};
use std::time::Instant;
use workspace::RequestWorkspace;

/// Main processing pipeline for transcription and search
pub struct HumToMidi {
    config: Config,
}

impl HumToMidi {
    /// Create a new processor with the given configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Transcribe in-memory mono audio into a segment
    pub fn transcribe_samples(
        &self,
        samples: Vec<f32>,
        sr: u32,
        predictor: &dyn MelodyPredictor,
    ) -> HumErrorResult<Segment> {
        let mut state = TranscriptionState::from_samples(samples, sr);
        self.run_pipeline(&mut state, predictor)?;
        state.segment.ok_or_else(|| {
            HumError::ProcessingPipelineError("Segmentation produced no segment".to_string())
        })
    }

    /// Transcribe an audio file and write `<stem>.mid` into `output_dir`
    pub fn transcribe_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        predictor: &dyn MelodyPredictor,
        output_dir: Q,
    ) -> HumErrorResult<PathBuf> {
        let input_path = input_path.as_ref();
        let mut state = TranscriptionState::load(input_path, &self.config)?;
        self.run_pipeline(&mut state, predictor)?;

        let segment = state.segment.as_ref().ok_or_else(|| {
            HumError::ProcessingPipelineError("Segmentation produced no segment".to_string())
        })?;

        let stem = input_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "transcription".to_string());
        let midi_path = output_dir.as_ref().join(format!("{}.mid", stem));
        midi::export_midi(segment, &midi_path, &self.config.midi)?;
        Ok(midi_path)
    }

    /// Transcribe many files; one failure does not stop the others
    pub fn transcribe_batch<P: AsRef<Path>>(
        &self,
        inputs: &[PathBuf],
        predictor: &dyn MelodyPredictor,
        output_dir: P,
    ) -> Vec<HumErrorResult<PathBuf>> {
        let results: Vec<HumErrorResult<PathBuf>> = inputs
            .iter()
            .map(|input| {
                let result = self.transcribe_file(input, predictor, output_dir.as_ref());
                if let Err(e) = &result {
                    log::warn!("Failed to transcribe {}: {}", input.display(), e);
                }
                result
            })
            .collect();

        let ok = results.iter().filter(|r| r.is_ok()).count();
        log::info!("Transcribed {}/{} files", ok, inputs.len());
        results
    }

    /// Rank the MIDI files in `corpus_dir` against a query MIDI file
    pub fn search<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        query_midi: P,
        corpus_dir: Q,
    ) -> HumErrorResult<SearchReport> {
        let query_midi = query_midi.as_ref();
        let start = Instant::now();

        let search = MelodySearch::new(&self.config.matching);
        let outcome = search.search_corpus(
            query_midi,
            corpus_dir.as_ref(),
            &self.config.matching.extension,
        )?;

        Ok(SearchReport {
            query_file: display_name(query_midi),
            corpus_found: !outcome.is_empty_corpus(),
            results: outcome.into_results(),
            execution_time: start.elapsed().as_secs_f64(),
        })
    }

    /// Transcribe a sung query and rank the corpus against it.
    ///
    /// The upload and the intermediate MIDI live in a request workspace that is
    /// removed before returning, whatever the outcome.
    pub fn query_by_humming<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        audio_path: P,
        predictor: &dyn MelodyPredictor,
        corpus_dir: Q,
    ) -> HumErrorResult<SearchReport> {
        let audio_path = audio_path.as_ref();
        let start = Instant::now();

        let workspace = RequestWorkspace::new()?;
        let staged = workspace.stage_upload(audio_path)?;
        let query_midi = self.transcribe_file(&staged, predictor, workspace.path())?;
        let mut report = self.search(&query_midi, corpus_dir)?;
        workspace.close()?;

        report.query_file = display_name(audio_path);
        report.execution_time = start.elapsed().as_secs_f64();
        Ok(report)
    }

    /// Execute prediction and the transcription passes
    fn run_pipeline(
        &self,
        state: &mut TranscriptionState,
        predictor: &dyn MelodyPredictor,
    ) -> HumErrorResult<()> {
        state.raw_frames = predictor.predict(&state.y, state.sr)?;
        state.frame_duration_sec = predictor.frame_duration_sec();
        log::debug!(
            "Predictor returned {} frames of {:.3}s",
            state.raw_frames.len(),
            state.frame_duration_sec
        );

        // Pass 0: Tempo Estimation
        passes::pass_0::run(state, &self.config)?;

        // Pass 1: Note Refinement
        passes::pass_1::run(state, &self.config)?;

        // Pass 2: Segmentation
        passes::pass_2::run(state, &self.config)?;

        Ok(())
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Validate configuration and input files
pub fn validate_input<P: AsRef<Path>>(input_path: P, config: &Config) -> HumErrorResult<()> {
    config::validate_config(config)
        .map_err(|e| HumError::ConfigValidationFailed(e.to_string()))?;
    audio::validate_audio_file(input_path, config)?;
    Ok(())
}
