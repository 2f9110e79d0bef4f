#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MidiEvent {
    /// The tick at which the event occurs.
    pub tick: u32,
    /// The type of the event.
    pub event: MidiEventType,
}

impl MidiEvent {
    pub const fn new_note_on(tick: u32, key: i32, velocity: i32) -> Self {
        Self {
            tick,
            event: MidiEventType::NoteOn(key, velocity),
        }
    }

    pub const fn new_note_off(tick: u32, key: i32) -> Self {
        Self {
            tick,
            event: MidiEventType::NoteOff(key),
        }
    }

    pub const fn is_note_on(&self) -> bool {
        matches!(self.event, MidiEventType::NoteOn(_, _))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum MidiEventType {
    NoteOn(i32, i32), // key, velocity
    NoteOff(i32),     // key
}
