//! Completion chime.
//!
//! With the `sound` feature the chime goes through the default audio output.
//! Without it (or when no output device exists) the terminal bell is used.

use std::io::{self, Write};

#[cfg(feature = "sound")]
use rodio::{OutputStream, OutputStreamHandle, Sink};
use thiserror::Error;
#[cfg(feature = "sound")]
use tracing::warn;

#[derive(Error, Debug)]
pub enum AudioError {
    #[cfg(feature = "sound")]
    #[error("Failed to initialize audio output: {0}")]
    Stream(#[from] rodio::StreamError),
    #[cfg(feature = "sound")]
    #[error("Failed to play audio: {0}")]
    Play(#[from] rodio::PlayError),
    #[error("Failed to ring terminal bell: {0}")]
    Bell(#[from] io::Error),
}

pub struct AudioPlayer {
    #[cfg(feature = "sound")]
    output: Option<(OutputStream, OutputStreamHandle)>,
}

impl AudioPlayer {
    /// Creates a player, falling back to the bell if no output is available.
    pub fn new() -> Self {
        #[cfg(feature = "sound")]
        {
            let output = match OutputStream::try_default() {
                Ok(output) => Some(output),
                Err(e) => {
                    warn!(error = %e, "no audio output, using terminal bell");
                    None
                }
            };
            Self { output }
        }
        #[cfg(not(feature = "sound"))]
        {
            Self {}
        }
    }

    /// Plays the completion chime.
    pub fn play_chime(&self) -> Result<(), AudioError> {
        #[cfg(feature = "sound")]
        if let Some((_, handle)) = &self.output {
            return Self::play_tone(handle);
        }
        ring_bell(&mut io::stderr())
    }

    /// Plays a pleasant two-tone chime.
    #[cfg(feature = "sound")]
    fn play_tone(handle: &OutputStreamHandle) -> Result<(), AudioError> {
        use rodio::source::{SineWave, Source, Zero};
        use std::time::Duration;

        let sink = Sink::try_new(handle)?;

        // 880 Hz (A5) for 150ms, a short pause, then 1046.5 Hz (C6) for 200ms
        let tone1 = SineWave::new(880.0)
            .take_duration(Duration::from_millis(150))
            .amplify(0.3);
        let silence = Zero::<f32>::new(1, 44100).take_duration(Duration::from_millis(50));
        let tone2 = SineWave::new(1046.5)
            .take_duration(Duration::from_millis(200))
            .amplify(0.3);

        sink.append(tone1);
        sink.append(silence);
        sink.append(tone2);
        sink.detach();
        Ok(())
    }
}

impl Default for AudioPlayer {
    fn default() -> Self {
        Self::new()
    }
}

fn ring_bell<W: Write>(out: &mut W) -> Result<(), AudioError> {
    out.write_all(b"\x07")?;
    out.flush()?;
    Ok(())
}
