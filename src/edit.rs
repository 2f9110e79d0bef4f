//! Editing operations over the emitted song schema.
//!
//! Everything here is pure arithmetic on the output of the conversion:
//! slicing by measure range (for practicing a passage) and filtering by
//! pitch bounds (for practicing one hand at a time).

use crate::convert::song_builder::Song;

/// Beats per measure assumed when the caller does not say otherwise.
pub const DEFAULT_BEATS_PER_MEASURE: u32 = 4;

/// Pitch threshold splitting left and right hand, middle C by default.
pub const DEFAULT_HAND_THRESHOLD: i32 = 60;

pub struct SongEditor {
    song: Song,
}

impl SongEditor {
    pub const fn new(song: Song) -> Self {
        Self { song }
    }

    /// Hand the song back untouched.
    pub fn into_song(self) -> Song {
        self.song
    }

    /// Extract an inclusive 1-based measure range, rebasing retained beats
    /// to the start of the range.
    pub fn extract_measures(&self, start_measure: u32, end_measure: u32, beats_per_measure: u32) -> Song {
        let start_beat = f64::from(start_measure.saturating_sub(1) * beats_per_measure);
        let end_beat = f64::from(end_measure * beats_per_measure);

        let notes = self
            .song
            .notes
            .iter()
            .filter(|note| note.timing.beat >= start_beat && note.timing.beat < end_beat)
            .map(|note| {
                let mut note = note.clone();
                note.timing.beat -= start_beat;
                note
            })
            .collect();

        Song {
            title: format!("{} (measures {start_measure}-{end_measure})", self.song.title),
            bpm: self.song.bpm,
            notes,
        }
    }

    /// Keep notes with `min <= pitch <= max`, either bound optional.
    pub fn filter_pitch(&self, min_pitch: Option<i32>, max_pitch: Option<i32>) -> Song {
        let notes = self
            .song
            .notes
            .iter()
            .filter(|note| min_pitch.is_none_or(|min| note.pitch >= min))
            .filter(|note| max_pitch.is_none_or(|max| note.pitch <= max))
            .cloned()
            .collect();

        let mut bounds = Vec::new();
        if let Some(min) = min_pitch {
            bounds.push(format!(">={min}"));
        }
        if let Some(max) = max_pitch {
            bounds.push(format!("<={max}"));
        }
        let title = if bounds.is_empty() {
            self.song.title.clone()
        } else {
            format!("{} ({})", self.song.title, bounds.join(", "))
        };

        Song {
            title,
            bpm: self.song.bpm,
            notes,
        }
    }

    /// Upper part: pitches at or above the threshold.
    pub fn right_hand(&self, threshold: i32) -> Song {
        let mut song = self.filter_pitch(Some(threshold), None);
        song.title = format!("{} (right hand)", self.song.title);
        song
    }

    /// Lower part: pitches strictly below the threshold.
    pub fn left_hand(&self, threshold: i32) -> Song {
        let mut song = self.filter_pitch(None, Some(threshold - 1));
        song.title = format!("{} (left hand)", self.song.title);
        song
    }
}
