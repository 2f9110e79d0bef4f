use crate::audio::midi_event::MidiEvent;
use crate::audio::{FIRST_TICK, QUARTER_TIME};
use crate::convert::song_builder::Song;

/// Turns a converted song into a tick-sorted MIDI event schedule.
pub struct MidiBuilder {
    events: Vec<MidiEvent>, // events accumulated during build
}

impl MidiBuilder {
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit note on/off pairs for every note and sort by tick.
    pub fn build_for_song(mut self, song: &Song) -> Vec<MidiEvent> {
        log::debug!("building events for {} notes", song.notes.len());
        for note in &song.notes {
            let start = FIRST_TICK + beat_to_tick(note.timing.beat);
            let duration = beat_to_tick(note.timing.duration);
            self.add_note(start, duration, note.pitch, note.velocity);
        }
        // Sort events by tick
        self.events.sort_by_key(|event| event.tick);
        self.events
    }

    fn add_note(&mut self, start: u32, duration: u32, key: i32, velocity: i32) {
        self.add_event(MidiEvent::new_note_on(start, key, velocity));
        if duration > 0 {
            let tick = start + duration;
            self.add_event(MidiEvent::new_note_off(tick, key));
        }
    }

    fn add_event(&mut self, event: MidiEvent) {
        self.events.push(event);
    }
}

impl Default for MidiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn beat_to_tick(beat: f64) -> u32 {
    (beat * f64::from(QUARTER_TIME)) as u32
}
