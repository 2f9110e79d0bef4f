use crate::ScoreError;
use roxmltree::{Document, Node};

// MusicXML partwise reference at <https://www.w3.org/2021/06/musicxml40/musicxml-reference/elements/score-partwise/>

/// Voice identifier assumed when a note names none.
pub const DEFAULT_VOICE: &str = "1";
/// Staff identifier assumed when a note names none.
pub const DEFAULT_STAFF: i32 = 1;

/// A parsed `score-partwise` document, reduced to the elements the
/// conversion consumes.
#[derive(Debug, PartialEq, Default)]
pub struct ScorePartwise {
    pub title: Option<String>,
    pub parts: Vec<Part>,
}

#[derive(Debug, PartialEq, Default)]
pub struct Part {
    pub id: String,
    pub measures: Vec<Measure>,
}

#[derive(Debug, PartialEq, Default)]
pub struct Measure {
    pub number: Option<String>,
    pub elements: Vec<MeasureElement>,
}

/// Measure children in document order. Document order is significant: it is
/// the only thing that sequences timing within a measure.
#[derive(Debug, PartialEq)]
pub enum MeasureElement {
    Attributes { divisions: Option<u32> },
    Note(NoteElement),
    Backup { duration: Option<u32> },
    Forward { duration: Option<u32> },
}

#[derive(Debug, PartialEq, Default)]
pub struct NoteElement {
    pub pitch: Option<Pitch>,
    pub rest: bool,
    pub chord: bool,
    pub duration: Option<u32>,
    pub voice: Option<String>,
    pub staff: Option<i32>,
    pub tie_start: bool,
    pub tie_stop: bool,
}

impl NoteElement {
    pub fn voice(&self) -> &str {
        self.voice.as_deref().unwrap_or(DEFAULT_VOICE)
    }

    pub fn staff(&self) -> i32 {
        self.staff.unwrap_or(DEFAULT_STAFF)
    }
}

/// Spelled pitch as written in the document, not yet resolved to a number.
#[derive(Debug, PartialEq)]
pub struct Pitch {
    pub step: String,
    pub alter: i32,
    pub octave: i32,
}

/// Parse a MusicXML `score-partwise` document.
///
/// A structurally broken document is a fatal error; anything else the
/// converter does not understand is dropped element by element.
pub fn parse_score_data(xml: &str) -> Result<ScorePartwise, ScoreError> {
    let document = Document::parse(xml)
        .map_err(|err| ScoreError::ParsingError(format!("invalid MusicXML document: {err}")))?;
    let root = document.root_element();
    if root.tag_name().name() != "score-partwise" {
        return Err(ScoreError::ParsingError(format!(
            "expected score-partwise root, found <{}>",
            root.tag_name().name()
        )));
    }

    let title = root
        .children()
        .find(|node| node.has_tag_name("work"))
        .and_then(|work| child_text(&work, "work-title"));

    let parts: Vec<Part> = root
        .children()
        .filter(|node| node.has_tag_name("part"))
        .map(|node| parse_part(&node))
        .collect();
    log::debug!("parsed {} parts", parts.len());

    Ok(ScorePartwise { title, parts })
}

fn parse_part(node: &Node) -> Part {
    let id = node.attribute("id").unwrap_or_default().to_string();
    let measures = node
        .children()
        .filter(|child| child.has_tag_name("measure"))
        .map(|child| parse_measure(&child))
        .collect();
    Part { id, measures }
}

fn parse_measure(node: &Node) -> Measure {
    let number = node.attribute("number").map(ToString::to_string);
    let elements = node
        .children()
        .filter_map(|child| parse_measure_element(&child))
        .collect();
    Measure { number, elements }
}

fn parse_measure_element(node: &Node) -> Option<MeasureElement> {
    match node.tag_name().name() {
        "attributes" => Some(MeasureElement::Attributes {
            divisions: child_u32(node, "divisions"),
        }),
        "note" => Some(MeasureElement::Note(parse_note(node))),
        "backup" => Some(MeasureElement::Backup {
            duration: child_u32(node, "duration"),
        }),
        "forward" => Some(MeasureElement::Forward {
            duration: child_u32(node, "duration"),
        }),
        // directions, barlines, harmony etc. carry no timing
        _ => None,
    }
}

fn parse_note(node: &Node) -> NoteElement {
    let mut tie_start = false;
    let mut tie_stop = false;
    for tie in node.children().filter(|child| child.has_tag_name("tie")) {
        match tie.attribute("type") {
            Some("start") => tie_start = true,
            Some("stop") => tie_stop = true,
            _ => {}
        }
    }

    NoteElement {
        pitch: node
            .children()
            .find(|child| child.has_tag_name("pitch"))
            .and_then(|child| parse_pitch(&child)),
        rest: has_child(node, "rest"),
        chord: has_child(node, "chord"),
        duration: child_u32(node, "duration"),
        voice: child_text(node, "voice"),
        staff: child_i32(node, "staff"),
        tie_start,
        tie_stop,
    }
}

/// A pitch without a readable step or octave counts as absent pitch
/// information, the note then behaves like an unpitched element.
fn parse_pitch(node: &Node) -> Option<Pitch> {
    let step = child_text(node, "step")?;
    let octave = child_i32(node, "octave")?;
    let alter = child_i32(node, "alter").unwrap_or(0);
    Some(Pitch {
        step,
        alter,
        octave,
    })
}

fn has_child(node: &Node, name: &str) -> bool {
    node.children().any(|child| child.has_tag_name(name))
}

fn child_text(node: &Node, name: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(name))
        .and_then(|child| child.text())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn child_i32(node: &Node, name: &str) -> Option<i32> {
    child_text(node, name).and_then(|text| text.parse().ok())
}

fn child_u32(node: &Node, name: &str) -> Option<u32> {
    child_text(node, name).and_then(|text| text.parse().ok())
}
