use clap::Parser;
use partwise::config::Config;
use partwise::edit::{DEFAULT_BEATS_PER_MEASURE, DEFAULT_HAND_THRESHOLD};
use partwise::{parse_score_data, MidiPlayer, ScoreError, Song, SongBuilder, SongEditor};
use std::path::PathBuf;

fn main() {
    let result = main_result();
    std::process::exit(match result {
        Ok(()) => 0,
        Err(err) => {
            // use Display instead of Debug for user friendly error messages
            log::error!("{err}");
            1
        }
    });
}

pub fn main_result() -> Result<(), ScoreError> {
    // setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("partwise=info"))
        .init();

    // args
    let args = CliArgs::parse();

    // convert
    let xml = std::fs::read_to_string(&args.input)?;
    let score = parse_score_data(&xml)?;
    let song = SongBuilder::new().build_for_score(&score)?;
    log::info!(
        "Converted {:?}: \"{}\", {} notes",
        args.input,
        song.title,
        song.notes.len()
    );

    // edit
    let song = apply_edits(&args, song);

    // serialize
    let json = serde_json::to_string_pretty(&song)
        .map_err(|err| ScoreError::ConfigError(format!("Could not serialize song: {err}")))?;
    if let Some(output) = &args.output {
        std::fs::write(output, json)?;
        log::info!("Wrote {output:?}");
    } else if !args.play {
        println!("{json}");
    }

    // play
    if args.play {
        let sound_font_file = resolve_sound_font(&args)?;
        log::info!("Playing with sound font {sound_font_file:?}");
        let player = MidiPlayer::new(&song, &sound_font_file)?;
        player.play_blocking()?;
    }
    Ok(())
}

fn apply_edits(args: &CliArgs, song: Song) -> Song {
    let mut song = song;
    if let Some(range) = &args.measures {
        let editor = SongEditor::new(song);
        song = editor.extract_measures(range[0], range[1], args.beats_per_measure);
        log::info!("Extracted measures {}-{}: {} notes", range[0], range[1], song.notes.len());
    }
    let editor = SongEditor::new(song);
    if args.right_hand {
        editor.right_hand(args.threshold)
    } else if args.left_hand {
        editor.left_hand(args.threshold)
    } else if args.min_pitch.is_some() || args.max_pitch.is_some() {
        editor.filter_pitch(args.min_pitch, args.max_pitch)
    } else {
        editor.into_song()
    }
}

fn resolve_sound_font(args: &CliArgs) -> Result<PathBuf, ScoreError> {
    let sound_font_file = match &args.sound_font_file {
        Some(path) => Some(PathBuf::from(path)),
        None => Config::read_config()?.get_sound_font_file(),
    };
    let Some(sound_font_file) = sound_font_file else {
        return Err(ScoreError::ConfigError(
            "no sound font configured; pass --sound-font-file".to_string(),
        ));
    };
    if !sound_font_file.exists() {
        return Err(ScoreError::ConfigError(format!(
            "Sound font file not found {sound_font_file:?}"
        )));
    }
    Ok(sound_font_file)
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the MusicXML score to convert.
    input: PathBuf,
    /// Output JSON file; printed to stdout when absent.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Extract an inclusive 1-based measure range.
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    measures: Option<Vec<u32>>,
    /// Beats per measure used by --measures.
    #[arg(long, default_value_t = DEFAULT_BEATS_PER_MEASURE)]
    beats_per_measure: u32,
    /// Keep only notes at or above this MIDI pitch.
    #[arg(long)]
    min_pitch: Option<i32>,
    /// Keep only notes at or below this MIDI pitch.
    #[arg(long)]
    max_pitch: Option<i32>,
    /// Keep only the right hand part (pitch >= threshold).
    #[arg(long, default_value_t = false, conflicts_with_all = ["left_hand", "min_pitch", "max_pitch"])]
    right_hand: bool,
    /// Keep only the left hand part (pitch < threshold).
    #[arg(long, default_value_t = false, conflicts_with_all = ["min_pitch", "max_pitch"])]
    left_hand: bool,
    /// MIDI pitch splitting the hands.
    #[arg(long, default_value_t = DEFAULT_HAND_THRESHOLD)]
    threshold: i32,
    /// Play the converted song after editing.
    #[arg(long, default_value_t = false)]
    play: bool,
    /// Sound font used for playback; falls back to the local config.
    #[arg(long)]
    sound_font_file: Option<String>,
}
