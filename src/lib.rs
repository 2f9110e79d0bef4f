//! Partwise - MusicXML to JSON converter for piano practice tooling
//!
//! This library provides:
//! - Parsing of MusicXML `score-partwise` documents
//! - Temporal reconstruction into a flat, time-ordered note list
//! - Measure-range and pitch editing of the emitted list
//! - SoundFont playback of the converted song
//!
//! # Example
//!
//! ```no_run
//! use partwise::{parse_score_data, SongBuilder};
//!
//! let xml = std::fs::read_to_string("score.musicxml").unwrap();
//! let score = parse_score_data(&xml).unwrap();
//! let song = SongBuilder::new().build_for_score(&score).unwrap();
//! let json = serde_json::to_string_pretty(&song).unwrap();
//! ```

pub mod audio;
pub mod config;
pub mod convert;
pub mod edit;
pub mod error;
pub mod parser;

// Re-export main types for convenience
pub use audio::{
    midi_builder::MidiBuilder,
    midi_event::{MidiEvent, MidiEventType},
    midi_player::MidiPlayer,
    midi_sequencer::MidiSequencer,
    FIRST_TICK, QUARTER_TIME,
};
pub use convert::song_builder::{Song, SongBuilder, TimedNote, Timing};
pub use convert::{DEFAULT_BPM, DEFAULT_DIVISIONS, DEFAULT_VELOCITY};
pub use edit::SongEditor;
pub use error::ScoreError;
pub use parser::score_parser::{parse_score_data, ScorePartwise};
