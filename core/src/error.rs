// Copyright (c) 2022-2023 The MobileCoin Foundation

use calypso_apdu::{response::StatusWord, ApduError};

/// Card primitive errors
///
/// Everything except [CardError::Transport] is recoverable and absorbed
/// at the smallest scope (file, application instance, AID prefix).
#[derive(Clone, PartialEq, Debug, thiserror::Error)]
pub enum CardError {
    /// Application or file selection rejected by the card
    #[error("selection failed (status: {0})")]
    SelectionFailed(StatusWord),

    /// Command rejected by the card
    #[error("command failed (status: {0})")]
    CommandFailed(StatusWord),

    /// Requested data object not available
    #[error("tag unavailable (status: {0})")]
    TagUnavailable(StatusWord),

    /// Malformed command or response
    #[error("APDU encoding error: {0}")]
    Apdu(ApduError),

    /// Reader / transport failure, the channel is no longer usable
    #[error("transport error: {0}")]
    Transport(String),
}

impl CardError {
    /// Check whether discovery may continue past this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CardError::Transport(_))
    }
}

impl From<ApduError> for CardError {
    fn from(e: ApduError) -> Self {
        CardError::Apdu(e)
    }
}

/// Document and run level errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Document could not be read or written
    #[error("document I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document could not be encoded or decoded
    #[error("document JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unrecoverable card failure
    #[error(transparent)]
    Card(#[from] CardError),
}
