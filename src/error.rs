use std::fmt;

#[derive(Debug)]
pub enum EnvelopeError {
    InvalidState(InvalidState),
    Settings(serde_json::Error),
}

/// Controller calls made out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidState {
    AlreadyStarted,
    NotStarted,
    AlreadyReleased,
    ReleaseNotCalled,
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeError::InvalidState(e) => write!(f, "Invalid state: {e}"),
            EnvelopeError::Settings(e) => write!(f, "Settings error: {e}"),
        }
    }
}

impl std::error::Error for EnvelopeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EnvelopeError::InvalidState(e) => Some(e),
            EnvelopeError::Settings(e) => Some(e),
        }
    }
}

impl fmt::Display for InvalidState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidState::AlreadyStarted => write!(f, "Envelope has already been started."),
            InvalidState::NotStarted => write!(f, "Envelope has not been started."),
            InvalidState::AlreadyReleased => write!(f, "Release has already been called."),
            InvalidState::ReleaseNotCalled => write!(f, "Release has not been called."),
        }
    }
}

impl std::error::Error for InvalidState {}

impl From<InvalidState> for EnvelopeError {
    fn from(e: InvalidState) -> Self {
        EnvelopeError::InvalidState(e)
    }
}

impl From<serde_json::Error> for EnvelopeError {
    fn from(e: serde_json::Error) -> Self {
        EnvelopeError::Settings(e)
    }
}
