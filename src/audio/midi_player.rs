use crate::audio::midi_builder::MidiBuilder;
use crate::audio::midi_event::MidiEventType;
use crate::audio::midi_sequencer::MidiSequencer;
use crate::convert::song_builder::Song;
use crate::ScoreError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100; // number of samples per second

/// Piano playback runs on a single channel.
const CHANNEL: i32 = 0;

/// Renders a converted song through a SoundFont synthesizer.
pub struct MidiPlayer {
    tempo: u32,
    sequencer: Arc<Mutex<MidiSequencer>>,        // shared with the audio thread
    synthesizer: Arc<Mutex<Synthesizer>>,        // synthesizer for audio output
    finished: Arc<AtomicBool>,                   // schedule exhausted
}

impl MidiPlayer {
    pub fn new(song: &Song, sound_font_file: &Path) -> Result<Self, ScoreError> {
        let events = MidiBuilder::new().build_for_song(song);
        log::debug!("prepared {} events for playback", events.len());

        let mut sf2 = File::open(sound_font_file)?;
        let sound_font = SoundFont::new(&mut sf2)
            .map_err(|err| ScoreError::ConfigError(format!("could not load sound font: {err}")))?;
        let sound_font = Arc::new(sound_font);

        let synthesizer_settings = SynthesizerSettings::new(SAMPLE_RATE as i32);
        let synthesizer = Synthesizer::new(&sound_font, &Arc::new(synthesizer_settings))
            .map_err(|err| ScoreError::AudioError(format!("could not build synthesizer: {err}")))?;

        Ok(Self {
            tempo: song.bpm,
            sequencer: Arc::new(Mutex::new(MidiSequencer::new(events))),
            synthesizer: Arc::new(Mutex::new(synthesizer)),
            finished: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Play the whole schedule, blocking until it is exhausted.
    pub fn play_blocking(&self) -> Result<(), ScoreError> {
        if self.sequencer.lock().unwrap().events().is_empty() {
            log::warn!("nothing to play");
            return Ok(());
        }

        self.sequencer.lock().unwrap().reset_last_time();
        let stream = self.new_output_stream()?;

        while !self.finished.load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(100));
        }
        // let the last notes release before tearing the stream down
        std::thread::sleep(Duration::from_millis(500));

        self.synthesizer.lock().unwrap().note_off_all(false);
        stream
            .pause()
            .map_err(|err| ScoreError::AudioError(format!("could not stop stream: {err}")))?;
        Ok(())
    }

    /// Create the output stream feeding sequenced events into the
    /// synthesizer and rendering interleaved stereo.
    fn new_output_stream(&self) -> Result<cpal::Stream, ScoreError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| ScoreError::AudioError("no audio output device".to_string()))?;
        let config = device
            .default_output_config()
            .map_err(|err| ScoreError::AudioError(format!("no output config: {err}")))?;
        assert!(
            config.sample_format().is_float(),
            "{}",
            format!("Unsupported sample format {}", config.sample_format())
        );
        let stream_config: cpal::StreamConfig = config.into();

        let channels_count = stream_config.channels as usize;
        assert_eq!(channels_count, 2);
        assert_eq!(stream_config.sample_rate.0, SAMPLE_RATE);

        // 4410 samples at 44100 Hz is 0.1 second
        let mono_sample_count = 4410;

        // reuse buffers for left and right channels across all calls
        let mut left: Vec<f32> = vec![0_f32; mono_sample_count];
        let mut right: Vec<f32> = vec![0_f32; mono_sample_count];

        let tempo = self.tempo;
        let sequencer = self.sequencer.clone();
        let synthesizer = self.synthesizer.clone();
        let finished = self.finished.clone();

        let err_fn = |err| log::error!("an error occurred on stream: {err}");

        let stream = device
            .build_output_stream(
                &stream_config,
                move |output: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut sequencer_guard = sequencer.lock().unwrap();
                    sequencer_guard.advance(tempo);
                    let mut synthesizer_guard = synthesizer.lock().unwrap();
                    // process midi events for current tick
                    match sequencer_guard.get_next_events() {
                        Some(events) => {
                            for midi_event in events {
                                match midi_event.event {
                                    MidiEventType::NoteOn(key, velocity) => {
                                        log::debug!("Note on: key={key}, velocity={velocity}");
                                        synthesizer_guard.note_on(CHANNEL, key, velocity);
                                    }
                                    MidiEventType::NoteOff(key) => {
                                        log::debug!("Note off: key={key}");
                                        synthesizer_guard.note_off(CHANNEL, key);
                                    }
                                }
                            }
                        }
                        None => finished.store(true, Ordering::Relaxed),
                    }

                    // Split buffer in two channels (left and right)
                    let channel_len = output.len() / 2;
                    if left.len() < channel_len || right.len() < channel_len {
                        log::warn!("Buffer too small, skipping audio rendering");
                        return;
                    }

                    // Render the waveform.
                    synthesizer_guard.render(&mut left[..channel_len], &mut right[..channel_len]);

                    drop(sequencer_guard);
                    drop(synthesizer_guard);

                    // Interleave the left and right channels into the output buffer.
                    for (i, (l, r)) in left.iter().zip(right.iter()).take(channel_len).enumerate() {
                        output[i * 2] = *l;
                        output[i * 2 + 1] = *r;
                    }
                },
                err_fn,
                None, // blocking stream
            )
            .map_err(|err| ScoreError::AudioError(format!("could not build stream: {err}")))?;
        stream
            .play()
            .map_err(|err| ScoreError::AudioError(format!("could not start stream: {err}")))?;
        Ok(stream)
    }
}
