use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};

use crate::{
    alarm::ToneId,
    config::{Config, Tone},
    error::{Error, Result},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackOptions {
    pub looping: bool,
    /// 0.0 to 1.0
    pub volume: f32,
    pub autoplay: bool,
    /// cut playback off after this long
    pub duration: Option<Duration>,
}

impl PlaybackOptions {
    /// loops until unloaded
    #[must_use]
    pub const fn alarm(volume: f32) -> Self {
        Self {
            looping: true,
            volume,
            autoplay: true,
            duration: None,
        }
    }

    /// plays once, for at most `length`
    #[must_use]
    pub const fn preview(length: Duration) -> Self {
        Self {
            looping: false,
            volume: 1.0,
            autoplay: true,
            duration: Some(length),
        }
    }
}

/// The platform audio service.
pub trait AudioBackend {
    type Handle;

    fn load_sound(&mut self, asset: &Path, options: &PlaybackOptions) -> Result<Self::Handle>;

    /// stops the sound and frees it
    fn unload(&mut self, handle: Self::Handle);
}

/// Plays through the default output device. The device is opened on first use
/// so that a machine without one only fails when something has to be played.
#[derive(Default)]
pub struct RodioBackend {
    stream: Option<OutputStream>,
}

impl RodioBackend {
    #[must_use]
    pub const fn new() -> Self {
        Self { stream: None }
    }

    fn stream(&mut self) -> Result<&OutputStream> {
        if self.stream.is_none() {
            let stream = OutputStreamBuilder::open_default_stream()
                .map_err(|e| Error::PlaybackFailure(format!("no audio output: {e}")))?;
            self.stream = Some(stream);
        }
        self.stream
            .as_ref()
            .ok_or_else(|| Error::PlaybackFailure("no audio output".to_string()))
    }
}

impl AudioBackend for RodioBackend {
    type Handle = Sink;

    fn load_sound(&mut self, asset: &Path, options: &PlaybackOptions) -> Result<Sink> {
        let file = File::open(asset).map_err(|e| {
            Error::PlaybackFailure(format!("couldn't open sound file {}: {e}", asset.display()))
        })?;
        let source = Decoder::new(BufReader::new(file)).map_err(|e| {
            Error::PlaybackFailure(format!("couldn't decode {}: {e}", asset.display()))
        })?;
        let sink = Sink::connect_new(self.stream()?.mixer());
        sink.set_volume(options.volume);
        if !options.autoplay {
            sink.pause();
        }
        match (options.looping, options.duration) {
            (true, Some(length)) => sink.append(source.repeat_infinite().take_duration(length)),
            (true, None) => sink.append(source.repeat_infinite()),
            (false, Some(length)) => sink.append(source.take_duration(length)),
            (false, None) => sink.append(source),
        }
        Ok(sink)
    }

    fn unload(&mut self, handle: Sink) {
        handle.stop();
    }
}

/// Where each tone's audio file is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToneLibrary {
    tones: Vec<Tone>,
}

impl ToneLibrary {
    #[must_use]
    pub const fn new(tones: Vec<Tone>) -> Self {
        Self { tones }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.tones.clone())
    }

    pub fn asset(&self, tone: ToneId) -> Result<&Path> {
        self.tones
            .iter()
            .find(|t| t.id == tone)
            .map(|t| t.path.as_path())
            .ok_or_else(|| Error::UnknownTone(tone.number()))
    }

    /// tones whose file is missing
    #[must_use]
    pub fn missing(&self) -> Vec<(ToneId, PathBuf)> {
        self.tones
            .iter()
            .filter(|t| !t.path.exists())
            .map(|t| (t.id, t.path.clone()))
            .collect()
    }
}

/// Short previews while picking a tone. Independent of alarm playback, but
/// like it never keeps more than one sound loaded.
pub struct TonePreview<A: AudioBackend> {
    backend: A,
    library: ToneLibrary,
    length: Duration,
    current: Option<A::Handle>,
}

impl<A: AudioBackend> TonePreview<A> {
    pub const fn new(backend: A, library: ToneLibrary, length: Duration) -> Self {
        Self {
            backend,
            library,
            length,
            current: None,
        }
    }

    /// Replaces whatever preview is playing with `tone`.
    pub fn play_tone(&mut self, tone: ToneId) -> Result<()> {
        self.stop();
        let asset = self.library.asset(tone)?;
        log::debug!("previewing tone {tone} from {}", asset.display());
        let handle = self
            .backend
            .load_sound(asset, &PlaybackOptions::preview(self.length))?;
        self.current = Some(handle);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.current.take() {
            self.backend.unload(handle);
        }
    }

    #[must_use]
    pub const fn is_playing(&self) -> bool {
        self.current.is_some()
    }

    pub const fn length(&self) -> Duration {
        self.length
    }

    pub const fn backend(&self) -> &A {
        &self.backend
    }
}

impl<A: AudioBackend> Drop for TonePreview<A> {
    fn drop(&mut self) {
        self.stop();
    }
}
