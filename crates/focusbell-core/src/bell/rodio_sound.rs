//! In-process alert playback through rodio.
//!
//! rodio's output stream is not `Send`, so the stream and sink live on a
//! dedicated audio thread and [`RodioSound`] talks to it over a channel.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

use super::{AlertSound, PlaybackStatus};
use crate::error::{PlaybackError, ReleaseError};

type Reply<T> = mpsc::Sender<T>;

enum Request {
    Play(Reply<Result<(), PlaybackError>>),
    Reload(Reply<Result<(), PlaybackError>>),
    Ready(Reply<bool>),
    Suspended(Reply<bool>),
    ResumeOutput(Reply<Result<(), PlaybackError>>),
    Status(Reply<PlaybackStatus>),
    Stop(Reply<()>),
}

#[derive(Debug)]
pub struct RodioSound {
    path: PathBuf,
    requests: mpsc::Sender<Request>,
}

impl RodioSound {
    /// Start the audio thread. The file is read on first play.
    pub fn new(path: impl Into<PathBuf>, volume: u8) -> Result<Self, PlaybackError> {
        let path = path.into();
        let (tx, rx) = mpsc::channel();
        let thread_path = path.clone();
        let volume = f32::from(volume.min(100)) / 100.0;
        std::thread::Builder::new()
            .name("focusbell-audio".into())
            .spawn(move || {
                // The output stream is not Send, so the player is built here.
                let mut player = Player {
                    path: thread_path,
                    volume,
                    data: None,
                    output: None,
                    sink: None,
                };
                player.run(rx)
            })
            .map_err(|e| PlaybackError::NoOutput(e.to_string()))?;
        Ok(Self { path, requests: tx })
    }

    fn call<T>(&self, request: impl FnOnce(Reply<T>) -> Request) -> Option<T> {
        let (tx, rx) = mpsc::channel();
        self.requests.send(request(tx)).ok()?;
        rx.recv().ok()
    }

    fn thread_gone(&self) -> PlaybackError {
        PlaybackError::NoOutput(format!("audio thread for {} stopped", self.path.display()))
    }
}

impl AlertSound for RodioSound {
    fn play(&mut self) -> Result<(), PlaybackError> {
        self.call(Request::Play)
            .unwrap_or_else(|| Err(self.thread_gone()))
    }

    fn reload(&mut self) -> Result<(), PlaybackError> {
        self.call(Request::Reload)
            .unwrap_or_else(|| Err(self.thread_gone()))
    }

    fn is_ready(&self) -> bool {
        self.call(Request::Ready).unwrap_or(false)
    }

    fn output_suspended(&self) -> Option<bool> {
        self.call(Request::Suspended)
    }

    fn resume_output(&mut self) -> Result<(), PlaybackError> {
        self.call(Request::ResumeOutput)
            .unwrap_or_else(|| Err(self.thread_gone()))
    }

    fn status(&mut self) -> PlaybackStatus {
        self.call(Request::Status)
            .unwrap_or(PlaybackStatus::Errored)
    }

    fn stop(&mut self) -> Result<(), ReleaseError> {
        self.call(Request::Stop)
            .ok_or_else(|| ReleaseError::Audio("audio thread stopped".into()))
    }
}

struct Player {
    path: PathBuf,
    volume: f32,
    data: Option<Arc<[u8]>>,
    output: Option<(OutputStream, OutputStreamHandle)>,
    sink: Option<Sink>,
}

impl Player {
    fn run(&mut self, requests: mpsc::Receiver<Request>) {
        if let Err(e) = self.open_output() {
            tracing::warn!("audio output unavailable: {}", e);
        }
        // Ends when the owning RodioSound is dropped.
        while let Ok(request) = requests.recv() {
            // A dropped reply receiver only means the caller stopped waiting.
            let _ = match request {
                Request::Play(reply) => reply.send(self.play()),
                Request::Reload(reply) => reply.send(self.reload()),
                Request::Ready(reply) => reply.send(self.data.is_some() && self.output.is_some()),
                Request::Suspended(reply) => reply.send(self.output.is_none()),
                Request::ResumeOutput(reply) => reply.send(self.open_output()),
                Request::Status(reply) => reply.send(self.status()),
                Request::Stop(reply) => {
                    self.stop();
                    reply.send(())
                }
            };
        }
        self.stop();
    }

    fn open_output(&mut self) -> Result<(), PlaybackError> {
        if self.output.is_none() {
            let output = OutputStream::try_default()
                .map_err(|e| PlaybackError::NoOutput(e.to_string()))?;
            self.output = Some(output);
        }
        Ok(())
    }

    fn load(&mut self) -> Result<Arc<[u8]>, PlaybackError> {
        if let Some(data) = &self.data {
            return Ok(data.clone());
        }
        let bytes = std::fs::read(&self.path).map_err(|e| PlaybackError::LoadFailed {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        let data: Arc<[u8]> = bytes.into();
        self.data = Some(data.clone());
        Ok(data)
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        self.stop();
        let data = self.load()?;
        let Some((_, handle)) = &self.output else {
            return Err(PlaybackError::NoOutput("audio output is not open".into()));
        };
        let source = Decoder::new(Cursor::new(data)).map_err(|e| PlaybackError::LoadFailed {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        let sink = Sink::try_new(handle).map_err(|e| PlaybackError::Refused(e.to_string()))?;
        sink.set_volume(self.volume);
        sink.append(source);
        self.sink = Some(sink);
        Ok(())
    }

    fn reload(&mut self) -> Result<(), PlaybackError> {
        self.stop();
        self.data = None;
        self.load()?;
        // Output failure here is left to the resume strategy.
        if let Err(e) = self.open_output() {
            tracing::debug!("audio output unavailable after reload: {}", e);
        }
        Ok(())
    }

    fn status(&self) -> PlaybackStatus {
        match &self.sink {
            None => PlaybackStatus::Stopped,
            Some(sink) if sink.empty() => PlaybackStatus::Ended,
            Some(_) => PlaybackStatus::Playing,
        }
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}
