use thiserror::Error;

/// Failures surfaced by the voice-tracking session.
///
/// These are delivered as events, never panics: the playback loop runs every
/// frame and must survive any speech-side failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeechError {
    /// No speech-recognition capability is available. Non-retryable; the
    /// caller is expected to fall back to a non-voice mode.
    #[error("speech recognition is not available")]
    Unsupported,

    /// Microphone (or input source) access was denied. Non-retryable.
    #[error("speech input permission denied")]
    PermissionDenied,

    /// The recognition session ended while we still wanted it running.
    /// Retryable with backoff.
    #[error("speech session ended unexpectedly")]
    SessionEnded,

    /// Automatic restarts were exhausted; the engine has given up.
    #[error("speech session recovery exhausted after {attempts} attempts")]
    RecoveryExhausted { attempts: u32 },
}

impl SpeechError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SpeechError::SessionEnded)
    }
}
