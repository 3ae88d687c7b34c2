// Copyright (c) 2022-2023 The MobileCoin Foundation

//! PC/SC transport for contact and contactless readers

use async_trait::async_trait;
use log::trace;

use calypso_card_core::{channel::Exchange, CardError};

/// PC/SC connected card
pub struct PcscTransport {
    card: pcsc::Card,
    reader: String,
}

impl PcscTransport {
    pub fn new(card: pcsc::Card, reader: &str) -> Self {
        Self {
            card,
            reader: reader.to_string(),
        }
    }

    /// Name of the reader this card is connected through
    pub fn reader(&self) -> &str {
        &self.reader
    }
}

/// Implementation of [Exchange] for PC/SC cards, hiding transport error types
#[async_trait]
impl Exchange for PcscTransport {
    async fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>, CardError> {
        let mut buff = [0u8; pcsc::MAX_BUFFER_SIZE];

        trace!("{}: {}", self.reader, hex::encode_upper(command));

        let r = self
            .card
            .transmit(command, &mut buff)
            .map_err(|e| CardError::Transport(format!("PC/SC: {e}")))?;

        Ok(r.to_vec())
    }
}
