use crate::convert::pitch::midi_pitch;
use crate::convert::quantize::quantize_beat;
use crate::convert::{DEFAULT_BPM, DEFAULT_DIVISIONS, DEFAULT_VELOCITY};
use crate::parser::score_parser::{Measure, MeasureElement, NoteElement, ScorePartwise};
use crate::ScoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One independent timing track within a part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VoiceKey {
    voice: String,
    staff: i32,
}

/// One open tie chain. Two notes of the same pitch in different voices or
/// staves never tie to each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TieKey {
    pitch: i32,
    voice: String,
    staff: i32,
}

/// A note with resolved absolute timing, before final quantization.
#[derive(Debug, Clone, PartialEq)]
struct Note {
    pitch: i32,
    beat: f64,
    duration: f64,
    velocity: i32,
    voice: String,
    staff: i32,
}

impl Note {
    fn tie_key(&self) -> TieKey {
        TieKey {
            pitch: self.pitch,
            voice: self.voice.clone(),
            staff: self.staff,
        }
    }
}

/// The emitted song in the output schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub title: String,
    pub bpm: u32,
    pub notes: Vec<TimedNote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedNote {
    pub pitch: i32,
    pub timing: Timing,
    pub velocity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub beat: f64,
    pub duration: f64,
}

/// Temporal reconstruction of a parsed partwise document.
///
/// All conversion state lives here and dies with the builder: construct a
/// fresh one per conversion, never share one across conversions.
pub struct SongBuilder {
    divisions: u32,                     // per quarter note, prospective only
    current_beat: f64,                  // part-wide cursor
    voice_beats: HashMap<VoiceKey, f64>, // one cursor per (voice, staff)
    active_ties: HashMap<TieKey, Note>, // owns pending notes until resolution
    chord_start_beat: f64,
    notes: Vec<Note>, // notes accumulated during build
}

impl SongBuilder {
    pub fn new() -> Self {
        Self {
            divisions: DEFAULT_DIVISIONS,
            current_beat: 0.0,
            voice_beats: HashMap::new(),
            active_ties: HashMap::new(),
            chord_start_beat: 0.0,
            notes: Vec::new(),
        }
    }

    /// Walk the document and emit the flat, time-ordered song.
    pub fn build_for_score(mut self, score: &ScorePartwise) -> Result<Song, ScoreError> {
        for part in &score.parts {
            log::debug!("building notes for part {}", part.id);
            // parts are independent timelines
            self.current_beat = 0.0;
            self.voice_beats.clear();
            self.chord_start_beat = 0.0;
            for measure in &part.measures {
                self.process_measure(measure)?;
            }
            self.drain_open_ties();
        }

        let mut notes: Vec<TimedNote> = self
            .notes
            .iter()
            .map(|note| TimedNote {
                pitch: note.pitch,
                timing: Timing {
                    beat: quantize_beat(note.beat),
                    duration: quantize_beat(note.duration),
                },
                velocity: note.velocity,
            })
            .collect();
        // stable sort: equal-beat notes keep their emission order
        notes.sort_by(|a, b| a.timing.beat.total_cmp(&b.timing.beat));

        let title = score
            .title
            .clone()
            .unwrap_or_else(|| "Untitled".to_string());
        Ok(Song {
            title,
            bpm: DEFAULT_BPM,
            notes,
        })
    }

    /// A tie left open at a part boundary stops extending, but its anchor
    /// still belongs to the output.
    fn drain_open_ties(&mut self) {
        self.notes
            .extend(self.active_ties.drain().map(|(_, note)| note));
    }

    fn process_measure(&mut self, measure: &Measure) -> Result<(), ScoreError> {
        let measure_start_beat = self.current_beat;
        // longest advance observed relative to measure start
        let mut longest_advance = 0.0_f64;

        for element in &measure.elements {
            match element {
                MeasureElement::Attributes { divisions } => {
                    if let Some(divisions) = divisions {
                        if *divisions > 0 {
                            self.divisions = *divisions;
                        }
                    }
                }
                MeasureElement::Note(note) => {
                    let Some(duration) = note.duration else {
                        // tolerated degenerate case: no advance, no emission
                        continue;
                    };
                    let duration_beats = self.to_beats(duration);
                    self.process_note_element(note, duration_beats)?;
                    if !note.chord {
                        longest_advance =
                            longest_advance.max(self.current_beat - measure_start_beat);
                    }
                }
                MeasureElement::Backup { duration } => {
                    // rewinds the shared cursor to the measure start, not a
                    // single voice's cursor and not by its stated duration
                    if duration.is_some() {
                        self.current_beat = measure_start_beat;
                    }
                }
                MeasureElement::Forward { duration } => {
                    if let Some(duration) = duration {
                        self.current_beat += self.to_beats(*duration);
                    }
                }
            }
        }

        // trailing backups must not leak into the next measure
        if longest_advance > 0.0 {
            self.current_beat = measure_start_beat + longest_advance;
        }
        Ok(())
    }

    fn process_note_element(
        &mut self,
        note: &NoteElement,
        duration_beats: f64,
    ) -> Result<(), ScoreError> {
        let key = VoiceKey {
            voice: note.voice().to_string(),
            staff: note.staff(),
        };
        // voices introduced mid-part inherit the prevailing position
        let cursor = match self.voice_beats.get(&key) {
            Some(beat) => *beat,
            None => {
                self.voice_beats.insert(key.clone(), self.current_beat);
                self.current_beat
            }
        };

        if !note.chord {
            self.chord_start_beat = cursor;
        }

        // rests occupy time but never produce a note
        if !note.rest {
            if let Some(pitch) = &note.pitch {
                let pitch_number = midi_pitch(&pitch.step, pitch.alter, pitch.octave)?;
                let onset = if note.chord {
                    self.chord_start_beat
                } else {
                    cursor
                };
                let emitted = Note {
                    pitch: pitch_number,
                    beat: onset,
                    duration: duration_beats,
                    velocity: DEFAULT_VELOCITY,
                    voice: key.voice.clone(),
                    staff: key.staff,
                };
                self.merge_or_emit(note, emitted);
            }
        }

        if !note.chord {
            self.voice_beats.insert(key, cursor + duration_beats);
            self.current_beat = self
                .voice_beats
                .values()
                .copied()
                .fold(0.0_f64, f64::max);
        }
        Ok(())
    }

    /// Tie resolution. Takes ownership of `note` and either appends it,
    /// registers it as an open tie anchor, or folds its duration into an
    /// existing anchor (continuation notes are never emitted separately).
    fn merge_or_emit(&mut self, element: &NoteElement, note: Note) {
        let key = note.tie_key();

        if element.tie_stop {
            if let Some(mut open) = self.active_ties.remove(&key) {
                open.duration += note.duration;
                if element.tie_start {
                    // multi-note chain continues through this note
                    self.active_ties.insert(key, open);
                } else {
                    // chain closed, ownership moves into the output
                    self.notes.push(open);
                }
                return;
            }
            // no matching open tie: emit unmerged below
        }

        if element.tie_start {
            // a displaced stale anchor stops extending but stays emitted
            if let Some(stale) = self.active_ties.insert(key, note) {
                self.notes.push(stale);
            }
        } else {
            self.notes.push(note);
        }
    }

    fn to_beats(&self, duration: u32) -> f64 {
        f64::from(duration) / f64::from(self.divisions)
    }
}

impl Default for SongBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::score_parser_tests::parse_fixture;

    fn convert(xml: &str) -> Song {
        SongBuilder::new()
            .build_for_score(&parse_fixture(xml))
            .unwrap()
    }

    fn timings(song: &Song) -> Vec<(i32, f64, f64)> {
        song.notes
            .iter()
            .map(|n| (n.pitch, n.timing.beat, n.timing.duration))
            .collect()
    }

    #[test]
    fn two_sequential_quarter_notes() {
        let song = convert(
            r#"<score-partwise>
                 <part id="P1">
                   <measure number="1">
                     <attributes><divisions>24</divisions></attributes>
                     <note><pitch><step>C</step><octave>4</octave></pitch><duration>24</duration></note>
                     <note><pitch><step>C</step><octave>4</octave></pitch><duration>24</duration></note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        assert_eq!(song.title, "Untitled");
        assert_eq!(song.bpm, 120);
        assert_eq!(timings(&song), vec![(60, 0.0, 1.0), (60, 1.0, 1.0)]);
        assert!(song.notes.iter().all(|n| n.velocity == 80));
    }

    #[test]
    fn tied_pair_merges_into_one_note() {
        let song = convert(
            r#"<score-partwise>
                 <part id="P1">
                   <measure number="1">
                     <attributes><divisions>24</divisions></attributes>
                     <note>
                       <pitch><step>C</step><octave>4</octave></pitch>
                       <duration>24</duration>
                       <tie type="start"/>
                     </note>
                     <note>
                       <pitch><step>C</step><octave>4</octave></pitch>
                       <duration>24</duration>
                       <tie type="stop"/>
                     </note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        assert_eq!(timings(&song), vec![(60, 0.0, 2.0)]);
    }

    #[test]
    fn tie_chain_spans_measures() {
        // start, stop+start, stop: one note over three measures
        let song = convert(
            r#"<score-partwise>
                 <part id="P1">
                   <measure number="1">
                     <attributes><divisions>4</divisions></attributes>
                     <note>
                       <pitch><step>G</step><octave>4</octave></pitch>
                       <duration>16</duration>
                       <tie type="start"/>
                     </note>
                   </measure>
                   <measure number="2">
                     <note>
                       <pitch><step>G</step><octave>4</octave></pitch>
                       <duration>16</duration>
                       <tie type="stop"/>
                       <tie type="start"/>
                     </note>
                   </measure>
                   <measure number="3">
                     <note>
                       <pitch><step>G</step><octave>4</octave></pitch>
                       <duration>8</duration>
                       <tie type="stop"/>
                     </note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        assert_eq!(timings(&song), vec![(67, 0.0, 10.0)]);
    }

    #[test]
    fn tie_requires_matching_pitch_voice_and_staff() {
        // same pitch in another voice must not extend the open tie
        let song = convert(
            r#"<score-partwise>
                 <part id="P1">
                   <measure number="1">
                     <attributes><divisions>24</divisions></attributes>
                     <note>
                       <pitch><step>C</step><octave>4</octave></pitch>
                       <duration>24</duration>
                       <voice>1</voice>
                       <tie type="start"/>
                     </note>
                     <note>
                       <pitch><step>C</step><octave>4</octave></pitch>
                       <duration>24</duration>
                       <voice>2</voice>
                       <tie type="stop"/>
                     </note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        // anchor leaks unextended, the cross-voice stop emits unmerged
        assert_eq!(song.notes.len(), 2);
        assert!(song
            .notes
            .iter()
            .all(|n| (n.timing.duration - 1.0).abs() < f64::EPSILON));
    }

    #[test]
    fn tie_stop_without_open_tie_emits_unmerged() {
        let song = convert(
            r#"<score-partwise>
                 <part id="P1">
                   <measure number="1">
                     <attributes><divisions>24</divisions></attributes>
                     <note>
                       <pitch><step>D</step><octave>4</octave></pitch>
                       <duration>24</duration>
                       <tie type="stop"/>
                     </note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        assert_eq!(timings(&song), vec![(62, 0.0, 1.0)]);
    }

    #[test]
    fn chord_notes_share_the_anchor_beat() {
        let song = convert(
            r#"<score-partwise>
                 <part id="P1">
                   <measure number="1">
                     <attributes><divisions>24</divisions></attributes>
                     <note><pitch><step>C</step><octave>4</octave></pitch><duration>24</duration></note>
                     <note><chord/><pitch><step>E</step><octave>4</octave></pitch><duration>24</duration></note>
                     <note><chord/><pitch><step>G</step><octave>4</octave></pitch><duration>24</duration></note>
                     <note><pitch><step>F</step><octave>4</octave></pitch><duration>24</duration></note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        assert_eq!(
            timings(&song),
            vec![
                (60, 0.0, 1.0),
                (64, 0.0, 1.0),
                (67, 0.0, 1.0),
                // chord members advance no cursor
                (65, 1.0, 1.0),
            ]
        );
    }

    #[test]
    fn rest_advances_time_without_a_note() {
        let song = convert(
            r#"<score-partwise>
                 <part id="P1">
                   <measure number="1">
                     <attributes><divisions>24</divisions></attributes>
                     <note><rest/><duration>24</duration></note>
                     <note><pitch><step>C</step><octave>4</octave></pitch><duration>24</duration></note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        assert_eq!(timings(&song), vec![(60, 1.0, 1.0)]);
    }

    #[test]
    fn backup_rewinds_shared_cursor_to_measure_start() {
        // Known quirk, preserved for compatibility: backup ignores its own
        // duration and resets the shared cursor to the measure start, so a
        // second voice entered after backup starts at the measure boundary.
        let song = convert(
            r#"<score-partwise>
                 <part id="P1">
                   <measure number="1">
                     <attributes><divisions>24</divisions></attributes>
                     <note><pitch><step>C</step><octave>5</octave></pitch><duration>24</duration><voice>1</voice></note>
                     <note><pitch><step>D</step><octave>5</octave></pitch><duration>24</duration><voice>1</voice></note>
                     <backup><duration>48</duration></backup>
                     <note><pitch><step>C</step><octave>3</octave></pitch><duration>48</duration><voice>2</voice></note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        assert_eq!(
            timings(&song),
            vec![(72, 0.0, 1.0), (48, 0.0, 2.0), (74, 1.0, 1.0)]
        );
    }

    #[test]
    fn partial_backup_still_rewinds_to_measure_start() {
        // the quirky half of the behavior: a backup of half the elapsed
        // duration behaves exactly like a full rewind
        let song = convert(
            r#"<score-partwise>
                 <part id="P1">
                   <measure number="1">
                     <attributes><divisions>24</divisions></attributes>
                     <note><pitch><step>C</step><octave>5</octave></pitch><duration>24</duration><voice>1</voice></note>
                     <note><pitch><step>D</step><octave>5</octave></pitch><duration>24</duration><voice>1</voice></note>
                     <backup><duration>24</duration></backup>
                     <note><pitch><step>C</step><octave>3</octave></pitch><duration>24</duration><voice>2</voice></note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        let bass = song.notes.iter().find(|n| n.pitch == 48).unwrap();
        assert_eq!(bass.timing.beat, 0.0);
    }

    #[test]
    fn forward_advances_shared_cursor_only() {
        let song = convert(
            r#"<score-partwise>
                 <part id="P1">
                   <measure number="1">
                     <attributes><divisions>24</divisions></attributes>
                     <note><pitch><step>C</step><octave>4</octave></pitch><duration>24</duration><voice>1</voice></note>
                     <forward><duration>24</duration></forward>
                     <note><pitch><step>E</step><octave>4</octave></pitch><duration>24</duration><voice>2</voice></note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        // voice 2 is seeded from the forwarded shared cursor
        assert_eq!(timings(&song), vec![(60, 0.0, 1.0), (64, 2.0, 1.0)]);
    }

    #[test]
    fn divisions_change_applies_prospectively() {
        let song = convert(
            r#"<score-partwise>
                 <part id="P1">
                   <measure number="1">
                     <attributes><divisions>24</divisions></attributes>
                     <note><pitch><step>C</step><octave>4</octave></pitch><duration>24</duration></note>
                   </measure>
                   <measure number="2">
                     <attributes><divisions>48</divisions></attributes>
                     <note><pitch><step>D</step><octave>4</octave></pitch><duration>24</duration></note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        // the first note keeps its 24/24 conversion, the second is 24/48
        assert_eq!(timings(&song), vec![(60, 0.0, 1.0), (62, 1.0, 0.5)]);
    }

    #[test]
    fn default_divisions_without_attributes() {
        let song = convert(
            r#"<score-partwise>
                 <part id="P1">
                   <measure number="1">
                     <note><pitch><step>C</step><octave>4</octave></pitch><duration>24</duration></note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        assert_eq!(timings(&song), vec![(60, 0.0, 1.0)]);
    }

    #[test]
    fn note_without_duration_is_skipped() {
        let song = convert(
            r#"<score-partwise>
                 <part id="P1">
                   <measure number="1">
                     <attributes><divisions>24</divisions></attributes>
                     <note><pitch><step>C</step><octave>4</octave></pitch></note>
                     <note><pitch><step>D</step><octave>4</octave></pitch><duration>24</duration></note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        // no emission and no timing advance for the degenerate note
        assert_eq!(timings(&song), vec![(62, 0.0, 1.0)]);
    }

    #[test]
    fn unknown_pitch_step_is_an_error() {
        let score = parse_fixture(
            r#"<score-partwise>
                 <part id="P1">
                   <measure number="1">
                     <attributes><divisions>24</divisions></attributes>
                     <note><pitch><step>H</step><octave>4</octave></pitch><duration>24</duration></note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        let result = SongBuilder::new().build_for_score(&score);
        assert!(matches!(result, Err(ScoreError::InvalidPitchStep(_))));
    }

    #[test]
    fn staves_are_independent_timing_tracks() {
        let song = convert(
            r#"<score-partwise>
                 <part id="P1">
                   <measure number="1">
                     <attributes><divisions>24</divisions></attributes>
                     <note><pitch><step>C</step><octave>5</octave></pitch><duration>48</duration><voice>1</voice><staff>1</staff></note>
                     <backup><duration>48</duration></backup>
                     <note><pitch><step>C</step><octave>3</octave></pitch><duration>24</duration><voice>1</voice><staff>2</staff></note>
                     <note><pitch><step>G</step><octave>3</octave></pitch><duration>24</duration><voice>1</voice><staff>2</staff></note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        assert_eq!(
            timings(&song),
            vec![(72, 0.0, 2.0), (48, 0.0, 1.0), (55, 1.0, 1.0)]
        );
    }

    #[test]
    fn parts_restart_at_beat_zero() {
        let song = convert(
            r#"<score-partwise>
                 <work><work-title>Duet</work-title></work>
                 <part id="P1">
                   <measure number="1">
                     <attributes><divisions>24</divisions></attributes>
                     <note><pitch><step>C</step><octave>4</octave></pitch><duration>24</duration></note>
                   </measure>
                 </part>
                 <part id="P2">
                   <measure number="1">
                     <note><pitch><step>A</step><octave>3</octave></pitch><duration>24</duration></note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        assert_eq!(song.title, "Duet");
        // both parts start at zero; divisions persist across parts
        assert_eq!(timings(&song), vec![(60, 0.0, 1.0), (57, 0.0, 1.0)]);
    }

    #[test]
    fn tie_left_open_at_part_end_is_still_emitted() {
        let song = convert(
            r#"<score-partwise>
                 <part id="P1">
                   <measure number="1">
                     <attributes><divisions>24</divisions></attributes>
                     <note>
                       <pitch><step>C</step><octave>4</octave></pitch>
                       <duration>24</duration>
                       <tie type="start"/>
                     </note>
                   </measure>
                 </part>
                 <part id="P2">
                   <measure number="1">
                     <note>
                       <pitch><step>C</step><octave>4</octave></pitch>
                       <duration>24</duration>
                       <tie type="stop"/>
                     </note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        // ties never cross part boundaries: both notes emitted unmerged
        assert_eq!(song.notes.len(), 2);
        assert!(song
            .notes
            .iter()
            .all(|n| n.timing.beat == 0.0 && n.timing.duration == 1.0));
    }

    #[test]
    fn restarted_tie_anchor_displaces_the_stale_one() {
        // two starts with no stop in between: the first anchor is kept
        // as-is and the second becomes the open entry
        let song = convert(
            r#"<score-partwise>
                 <part id="P1">
                   <measure number="1">
                     <attributes><divisions>24</divisions></attributes>
                     <note>
                       <pitch><step>C</step><octave>4</octave></pitch>
                       <duration>24</duration>
                       <tie type="start"/>
                     </note>
                     <note>
                       <pitch><step>C</step><octave>4</octave></pitch>
                       <duration>24</duration>
                       <tie type="start"/>
                     </note>
                     <note>
                       <pitch><step>C</step><octave>4</octave></pitch>
                       <duration>24</duration>
                       <tie type="stop"/>
                     </note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        let mut durations: Vec<f64> = song.notes.iter().map(|n| n.timing.duration).collect();
        durations.sort_by(f64::total_cmp);
        assert_eq!(durations, vec![1.0, 2.0]);
    }

    #[test]
    fn notes_are_sorted_by_beat_across_parts() {
        let song = convert(
            r#"<score-partwise>
                 <part id="P1">
                   <measure number="1">
                     <attributes><divisions>24</divisions></attributes>
                     <note><pitch><step>C</step><octave>4</octave></pitch><duration>48</duration></note>
                     <note><pitch><step>D</step><octave>4</octave></pitch><duration>24</duration></note>
                   </measure>
                 </part>
                 <part id="P2">
                   <measure number="1">
                     <note><pitch><step>A</step><octave>2</octave></pitch><duration>24</duration></note>
                     <note><pitch><step>B</step><octave>2</octave></pitch><duration>24</duration></note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        let beats: Vec<f64> = song.notes.iter().map(|n| n.timing.beat).collect();
        assert!(beats.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn triplet_timing_survives_quantization() {
        // divisions=12, eighth-note triplet: durations of 4/12 beat each
        let song = convert(
            r#"<score-partwise>
                 <part id="P1">
                   <measure number="1">
                     <attributes><divisions>12</divisions></attributes>
                     <note><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration></note>
                     <note><pitch><step>D</step><octave>4</octave></pitch><duration>4</duration></note>
                     <note><pitch><step>E</step><octave>4</octave></pitch><duration>4</duration></note>
                   </measure>
                 </part>
               </score-partwise>"#,
        );
        let third = 1.0 / 3.0;
        assert_eq!(song.notes.len(), 3);
        assert!((song.notes[1].timing.beat - third).abs() < 1e-9);
        assert!((song.notes[2].timing.beat - 2.0 * third).abs() < 1e-9);
    }
}
