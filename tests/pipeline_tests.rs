//! End-to-end tests for transcription and query-by-humming

use hum2midi::analysis::{NoteEvent, RawMelodyFrame, Segment};
use hum2midi::config::MidiConfig;
use hum2midi::midi::{export_midi, parse_midi_file};
use hum2midi::predictor::{JsonMelodyPredictor, MelodyDump, PitchUnit};
use hum2midi::{Config, HumError, HumErrorResult, HumToMidi, MelodyPredictor};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FRAME_SEC: f32 = 0.02;
const MELODY: [u8; 5] = [60, 62, 64, 65, 67];

/// Predictor that returns a fixed melody whatever the audio
struct ScriptedPredictor {
    frames: Vec<RawMelodyFrame>,
}

impl ScriptedPredictor {
    /// Each pitch held for `frames_per_note` frames, with slight drift
    fn new(pitches: &[u8], frames_per_note: usize) -> Self {
        let mut frames = Vec::new();
        for &pitch in pitches {
            for k in 0..frames_per_note {
                let drift = if k % 2 == 0 { 0.2 } else { -0.2 };
                frames.push(RawMelodyFrame::voiced(frames.len(), pitch as f32 + drift, 0.9));
            }
        }
        Self { frames }
    }
}

impl MelodyPredictor for ScriptedPredictor {
    fn frame_duration_sec(&self) -> f32 {
        FRAME_SEC
    }

    fn predict(&self, _samples: &[f32], _sample_rate: u32) -> HumErrorResult<Vec<RawMelodyFrame>> {
        Ok(self.frames.clone())
    }
}

/// Predictor that always fails
struct BrokenPredictor;

impl MelodyPredictor for BrokenPredictor {
    fn frame_duration_sec(&self) -> f32 {
        FRAME_SEC
    }

    fn predict(&self, _samples: &[f32], _sample_rate: u32) -> HumErrorResult<Vec<RawMelodyFrame>> {
        Err(HumError::PredictorError("model unavailable".to_string()))
    }
}

/// Write a silent 16-bit mono WAV
fn write_silent_wav(dir: &Path, name: &str, sr: u32, seconds: f32) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: sr,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for _ in 0..(sr as f32 * seconds) as usize {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();
    path
}

fn write_corpus_melody(dir: &Path, name: &str, pitches: &[u8]) {
    let mut segment = Segment::new(500_000);
    segment.notes = pitches
        .iter()
        .enumerate()
        .map(|(i, &pitch)| NoteEvent {
            start_tick: i as u32 * 480,
            duration_ticks: 360,
            pitch,
        })
        .collect();
    export_midi(&segment, &dir.join(name), &MidiConfig::default()).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcribe_samples() {
        let processor = HumToMidi::new(Config::default());
        let predictor = ScriptedPredictor::new(&MELODY, 25);

        let segment = processor
            .transcribe_samples(vec![0.0; 16000 * 3], 16000, &predictor)
            .unwrap();

        // Silence gives no tempo evidence: 120 BPM default
        assert_eq!(segment.tempo, 500_000);
        assert_eq!(segment.pitches(), MELODY.to_vec());
        // 25 frames of 20 ms = one beat
        for (i, note) in segment.notes.iter().enumerate() {
            assert_eq!(note.start_tick, i as u32 * 480);
            assert_eq!(note.duration_ticks, 480);
        }
    }

    #[test]
    fn test_transcribe_file_writes_midi() {
        let dir = TempDir::new().unwrap();
        let input = write_silent_wav(dir.path(), "hum.wav", 16000, 3.0);
        let output_dir = dir.path().join("out");

        let processor = HumToMidi::new(Config::default());
        let predictor = ScriptedPredictor::new(&MELODY, 25);
        let midi_path = processor
            .transcribe_file(&input, &predictor, &output_dir)
            .unwrap();

        assert_eq!(midi_path, output_dir.join("hum.mid"));
        let parsed = parse_midi_file(&midi_path).unwrap();
        let pitches: Vec<u8> = parsed.notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, MELODY.to_vec());
        assert_eq!(parsed.tempo, 500_000);
    }

    #[test]
    fn test_transcribe_with_json_dump() {
        let dir = TempDir::new().unwrap();
        let input = write_silent_wav(dir.path(), "take.wav", 16000, 3.0);
        let scripted = ScriptedPredictor::new(&[57, 59, 60], 30);
        let dump = MelodyDump {
            frame_duration_sec: FRAME_SEC,
            pitch_unit: PitchUnit::Midi,
            frames: scripted.frames,
        };
        let dump_path = dir.path().join("take.json");
        std::fs::write(&dump_path, serde_json::to_string(&dump).unwrap()).unwrap();

        let predictor = JsonMelodyPredictor::from_file(&dump_path).unwrap();
        let processor = HumToMidi::new(Config::default());
        let midi_path = processor
            .transcribe_file(&input, &predictor, dir.path())
            .unwrap();

        let parsed = parse_midi_file(&midi_path).unwrap();
        let pitches: Vec<u8> = parsed.notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![57, 59, 60]);
    }

    #[test]
    fn test_predictor_failure_propagates() {
        let processor = HumToMidi::new(Config::default());
        let result = processor.transcribe_samples(vec![0.0; 16000], 16000, &BrokenPredictor);
        assert!(matches!(result, Err(HumError::PredictorError(_))));
    }

    #[test]
    fn test_batch_continues_after_failure() {
        let dir = TempDir::new().unwrap();
        let good = write_silent_wav(dir.path(), "good.wav", 16000, 3.0);
        let missing = dir.path().join("missing.wav");
        let wrong_format = dir.path().join("notes.txt");
        std::fs::write(&wrong_format, "not audio").unwrap();
        let low_rate = write_silent_wav(dir.path(), "low.wav", 4000, 3.0);

        let processor = HumToMidi::new(Config::default());
        let predictor = ScriptedPredictor::new(&MELODY, 25);
        let output_dir = dir.path().join("midi");
        let results = processor.transcribe_batch(
            &[good, missing, wrong_format, low_rate],
            &predictor,
            &output_dir,
        );

        assert_eq!(results.len(), 4);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(matches!(results[2], Err(HumError::InvalidAudioFormat(_))));
        assert!(matches!(results[3], Err(HumError::UnsupportedSampleRate(4000))));
        assert!(output_dir.join("good.mid").exists());
    }

    #[test]
    fn test_query_by_humming_ranks_transposed_copy_first() {
        let dir = TempDir::new().unwrap();
        let corpus = dir.path().join("corpus");
        std::fs::create_dir_all(&corpus).unwrap();
        write_corpus_melody(&corpus, "anthem.mid", &[67, 64, 60, 64, 67, 72]);
        let transposed: Vec<u8> = MELODY.iter().map(|p| p + 5).collect();
        write_corpus_melody(&corpus, "target.mid", &transposed);
        write_corpus_melody(&corpus, "waltz.mid", &[55, 59, 62, 59, 55, 50, 55]);

        let input = write_silent_wav(dir.path(), "hum.wav", 16000, 3.0);
        let processor = HumToMidi::new(Config::default());
        let predictor = ScriptedPredictor::new(&MELODY, 25);
        let report = processor
            .query_by_humming(&input, &predictor, &corpus)
            .unwrap();

        assert_eq!(report.query_file, "hum.wav");
        assert!(report.corpus_found);
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.results[0].file, "target.mid");
        assert_eq!(report.results[0].distance, 0.0);
        assert!(report.results[1].distance > 0.0);
        // Nothing written next to the upload
        assert!(!dir.path().join("hum.mid").exists());
    }

    #[test]
    fn test_query_by_humming_missing_corpus() {
        let dir = TempDir::new().unwrap();
        let input = write_silent_wav(dir.path(), "hum.wav", 16000, 3.0);
        let processor = HumToMidi::new(Config::default());
        let predictor = ScriptedPredictor::new(&MELODY, 25);

        let err = processor
            .query_by_humming(&input, &predictor, dir.path().join("nope"))
            .unwrap_err();
        assert!(matches!(err, HumError::CorpusError(_)));
    }

    #[test]
    fn test_report_export() {
        let dir = TempDir::new().unwrap();
        let corpus = dir.path().join("corpus");
        std::fs::create_dir_all(&corpus).unwrap();
        write_corpus_melody(&corpus, "a.mid", &MELODY);
        let query = dir.path().join("query.mid");
        write_corpus_melody(dir.path(), "query.mid", &MELODY);

        let report = HumToMidi::new(Config::default())
            .search(&query, &corpus)
            .unwrap();
        let report_path = dir.path().join("report.json");
        hum2midi::analysis::export_report(&report, &report_path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(json["query_file"], "query.mid");
        assert_eq!(json["results"][0]["file"], "a.mid");
        assert_eq!(json["results"][0]["distance"], 0.0);
    }
}
