//! Boundary to whatever performs the actual speech recognition.
//!
//! The scorer never touches a raw capture API; an adapter implements
//! [`SpeechCapture`] and delivers [`SpeechEvent`]s over a channel handed to it
//! at construction. One final transcript is expected per capture session.

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    #[error("no speech detected")]
    NoSpeech,
    #[error("audio capture failed")]
    AudioCapture,
    #[error("recognition service unavailable")]
    ServiceUnavailable,
    #[error("capture aborted")]
    Aborted,
}

#[derive(Debug, Clone)]
pub enum SpeechEvent {
    /// Finalized transcript for the utterance, fired once per session.
    Final(String),
    Error(SpeechError),
}

/// Channel pair connecting a capture adapter to its consumer.
pub fn event_channel(buffer: usize) -> (mpsc::Sender<SpeechEvent>, mpsc::Receiver<SpeechEvent>) {
    mpsc::channel(buffer)
}

pub trait SpeechCapture: Send {
    /// Begin recognizing in the given language (BCP 47 tag, e.g. "en-US").
    fn start(&mut self, lang: &str) -> anyhow::Result<()>;

    /// Stop the in-flight capture; the adapter should still emit a final
    /// event (transcript or [`SpeechError::Aborted`]) for the session.
    fn stop(&mut self);
}
