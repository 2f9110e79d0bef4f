use crate::audio::midi_event::MidiEvent;
use std::time::Instant;

const QUARTER_TIME: f32 = 960.0; // 1 quarter note = 960 ticks

/// Walks a tick-sorted MIDI event schedule against wall-clock time.
pub struct MidiSequencer {
    current_tick: u32,             // current Midi tick
    last_tick: u32,                // last Midi tick
    last_time: Instant,            // last advance time
    sorted_events: Vec<MidiEvent>, // sorted Midi events
}

impl MidiSequencer {
    pub fn new(sorted_events: Vec<MidiEvent>) -> Self {
        // events are sorted by tick
        assert!(sorted_events
            .as_slice()
            .windows(2)
            .all(|w| w[0].tick <= w[1].tick));
        Self {
            current_tick: 0,
            last_tick: 0,
            last_time: Instant::now(),
            sorted_events,
        }
    }

    #[allow(clippy::missing_const_for_fn)]
    pub fn events(&self) -> &[MidiEvent] {
        &self.sorted_events
    }

    pub const fn get_tick(&self) -> u32 {
        self.current_tick
    }

    pub const fn get_last_tick(&self) -> u32 {
        self.last_tick
    }

    pub fn reset_last_time(&mut self) {
        self.last_time = Instant::now();
    }

    #[allow(clippy::missing_const_for_fn)]
    pub fn reset_ticks(&mut self) {
        self.current_tick = 0;
        self.last_tick = 0;
    }

    /// Events in `(last_tick, current_tick]`, `None` once the schedule is
    /// exhausted.
    pub fn get_next_events(&self) -> Option<&[MidiEvent]> {
        // do not return events if tick did not change
        if self.last_tick == self.current_tick {
            return Some(&[]);
        }

        assert!(self.last_tick <= self.current_tick);

        // get all events between last tick and next tick using binary search
        let start_index = match self
            .sorted_events
            .binary_search_by_key(&self.last_tick, |event| event.tick)
        {
            Ok(position) => position + 1,
            Err(position) => {
                // exit if end reached
                if position == self.sorted_events.len() {
                    return None;
                }
                position
            }
        };

        let end_index = match self.sorted_events[start_index..]
            .binary_search_by_key(&self.current_tick, |event| event.tick)
        {
            Ok(next_position) => start_index + next_position,
            Err(next_position) => {
                if next_position == 0 {
                    // no matching elements
                    return Some(&[]);
                }
                // return slice until the last event
                start_index + next_position - 1
            }
        };
        Some(&self.sorted_events[start_index..=end_index])
    }

    /// Advance the tick cursor by the wall-clock time elapsed since the
    /// previous advance, scaled by the tempo.
    pub fn advance(&mut self, tempo: u32) {
        // init sequencer on first advance after reset
        if self.current_tick == self.last_tick {
            self.current_tick += 1;
            self.last_time = Instant::now();
            return;
        }

        let now = Instant::now();
        let elapsed_secs = now.duration_since(self.last_time).as_secs_f32();
        let tick_increase = tick_increase(tempo, elapsed_secs);
        self.last_time = now;
        self.last_tick = self.current_tick;
        self.current_tick += tick_increase;
    }

    #[cfg(test)]
    #[allow(clippy::missing_const_for_fn)]
    pub fn advance_tick(&mut self, tick: u32) {
        self.last_tick = self.current_tick;
        self.current_tick += tick;
    }
}

fn tick_increase(tempo_bpm: u32, elapsed_seconds: f32) -> u32 {
    let tempo_bps = tempo_bpm as f32 / 60.0;
    let bump = QUARTER_TIME * tempo_bps * elapsed_seconds;
    bump as u32
}
