//! MIDI export and parsing

use crate::analysis::{ParsedNote, ParsedNoteList, Segment};
use crate::config::MidiConfig;
use crate::error::HumError;
use crate::passes::pass_0::microseconds_per_quarter_to_bpm;
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// MIDI tempo used when a file carries no tempo meta event (120 BPM)
pub const DEFAULT_TEMPO: u32 = 500_000;

/// Resolution assumed when the header does not use metrical timing
pub const DEFAULT_TICKS_PER_QUARTER: u16 = 480;

/// Write a segment to a MIDI file, creating parent directories as needed
pub fn export_midi(
    segment: &Segment,
    midi_path: &Path,
    config: &MidiConfig,
) -> crate::HumErrorResult<()> {
    if let Some(parent) = midi_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let midi_data = segment_to_midi(segment, config)?;

    let mut file = File::create(midi_path)?;
    file.write_all(&midi_data)?;

    if segment.is_empty() {
        log::warn!("Exported MIDI without notes to {}", midi_path.display());
    } else {
        log::info!(
            "Exported {} notes to {}",
            segment.len(),
            midi_path.display()
        );
    }
    Ok(())
}

/// Serialize a segment as a single-track standard MIDI file.
///
/// The track holds the tempo meta event followed by one note-on/note-off pair
/// per note. An empty segment yields a valid file with no notes.
pub fn segment_to_midi(segment: &Segment, config: &MidiConfig) -> crate::HumErrorResult<Vec<u8>> {
    segment.validate()?;
    if config.ticks_per_quarter == 0 || config.ticks_per_quarter > 0x7FFF {
        return Err(HumError::MidiExportError(format!(
            "Invalid ticks per quarter note: {}",
            config.ticks_per_quarter
        )));
    }

    let channel = u4::from(config.channel.min(15));
    let velocity = u7::from(config.velocity.clamp(1, 127));

    let mut track_events = Vec::with_capacity(segment.len() * 2 + 4);

    if !config.track_name.is_empty() {
        track_events.push(TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(config.track_name.as_bytes())),
        });
    }

    track_events.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(segment.tempo))),
    });

    track_events.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::TimeSignature(4, 2, 24, 8)),
    });

    let mut current_tick = 0u32;
    for note in &segment.notes {
        let key = u7::from(note.pitch);

        track_events.push(TrackEvent {
            delta: u28::from(note.start_tick - current_tick),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn { key, vel: velocity },
            },
        });
        track_events.push(TrackEvent {
            delta: u28::from(note.duration_ticks),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key,
                    vel: u7::from(0),
                },
            },
        });
        current_tick = note.end_tick();
    }

    track_events.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let header = Header {
        format: Format::SingleTrack,
        timing: Timing::Metrical(u15::from(config.ticks_per_quarter)),
    };

    let smf = Smf {
        header,
        tracks: vec![track_events],
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| HumError::MidiExportError(format!("Failed to write MIDI data: {:?}", e)))?;
    Ok(bytes)
}

/// Note list and timing recovered from a MIDI file
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMidi {
    pub notes: ParsedNoteList,
    pub seconds_per_tick: f64,
    /// Microseconds per quarter note
    pub tempo: u32,
    pub ticks_per_quarter: u16,
}

/// Parse a MIDI file from disk
pub fn parse_midi_file<P: AsRef<Path>>(path: P) -> crate::HumErrorResult<ParsedMidi> {
    let data = std::fs::read(path.as_ref())?;
    parse_midi(&data)
}

/// Parse MIDI bytes into an ordinal note list.
///
/// Every note-on with non-zero velocity, in file order (track by track), gets the
/// next position `index * 1e6 / tempo`; real tick times are ignored so matching
/// sees melodic order rather than performed rhythm. The tempo is the first tempo
/// meta event in the file, or [`DEFAULT_TEMPO`].
pub fn parse_midi(data: &[u8]) -> crate::HumErrorResult<ParsedMidi> {
    let smf = Smf::parse(data)?;

    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(tpq) if tpq.as_int() > 0 => tpq.as_int(),
        _ => {
            log::debug!("Non-metrical MIDI timing, assuming {} tpq", DEFAULT_TICKS_PER_QUARTER);
            DEFAULT_TICKS_PER_QUARTER
        }
    };

    let mut tempo: Option<u32> = None;
    let mut pitches: Vec<u8> = Vec::new();

    for track in &smf.tracks {
        for event in track {
            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(t)) => {
                    if tempo.is_none() && t.as_int() > 0 {
                        tempo = Some(t.as_int());
                    }
                }
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { key, vel },
                    ..
                } => {
                    if vel.as_int() > 0 {
                        pitches.push(key.as_int());
                    }
                }
                _ => {}
            }
        }
    }

    let tempo = tempo.unwrap_or(DEFAULT_TEMPO);
    log::debug!(
        "Parsed {} notes at {:.1} BPM, {} tpq",
        pitches.len(),
        microseconds_per_quarter_to_bpm(tempo),
        ticks_per_quarter
    );
    let step = 1_000_000.0 / tempo as f64;
    let notes = pitches
        .into_iter()
        .enumerate()
        .map(|(i, pitch)| ParsedNote {
            index_position: i as f64 * step,
            pitch,
        })
        .collect();

    Ok(ParsedMidi {
        notes,
        seconds_per_tick: tempo as f64 / 1_000_000.0 / ticks_per_quarter as f64,
        tempo,
        ticks_per_quarter,
    })
}
