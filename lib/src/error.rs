// Copyright (c) 2022-2023 The MobileCoin Foundation

use calypso_card_core::CardError;

/// Calypso card API Error Type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// PC/SC context or reader error
    #[cfg(feature = "transport_pcsc")]
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// No reader matched the selection pattern
    #[error("No reader matching '{0}'")]
    ReaderNotFound(String),

    /// Invalid reader selection pattern
    #[error("Invalid reader pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Reader available but no card inserted
    #[error("No card present in reader '{0}'")]
    NoCard(String),

    /// Document or discovery error
    #[error(transparent)]
    Core(#[from] calypso_card_core::Error),

    /// Card communication error
    #[error(transparent)]
    Card(#[from] CardError),
}
