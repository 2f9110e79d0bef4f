use crate::ScoreError;

/// Semitone offset of each diatonic step letter within one octave.
fn semitone_offset(step: &str) -> Option<i32> {
    match step {
        "C" => Some(0),
        "D" => Some(2),
        "E" => Some(4),
        "F" => Some(5),
        "G" => Some(7),
        "A" => Some(9),
        "B" => Some(11),
        _ => None,
    }
}

/// Resolve a spelled pitch to its MIDI note number.
///
/// Octave 4 starts at MIDI 60 (middle C). The result is not range checked,
/// extreme octaves or alterations pass through as written.
pub fn midi_pitch(step: &str, alter: i32, octave: i32) -> Result<i32, ScoreError> {
    let offset = semitone_offset(step)
        .ok_or_else(|| ScoreError::InvalidPitchStep(step.to_string()))?;
    Ok((octave + 1) * 12 + offset + alter)
}
