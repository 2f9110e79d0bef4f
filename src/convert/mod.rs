pub mod pitch;
pub mod quantize;
pub mod song_builder;

/// Fixed velocity of emitted notes, MusicXML rarely encodes one
pub const DEFAULT_VELOCITY: i32 = 80;

/// Tempo of the output schema, never derived from the input
pub const DEFAULT_BPM: u32 = 120;

/// Divisions per quarter note before any attributes declaration
pub const DEFAULT_DIVISIONS: u32 = 24;
