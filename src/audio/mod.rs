pub mod midi_builder;
pub mod midi_event;
pub mod midi_player;
pub mod midi_sequencer;

/// First tick of a song
pub const FIRST_TICK: u32 = 1;

/// 1 quarter note = 960 ticks
pub const QUARTER_TIME: u32 = 960;
