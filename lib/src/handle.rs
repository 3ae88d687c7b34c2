// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Handle for connected cards
//!
//! This provides the card primitives used by discovery and verification
//! and is generic over [Exchange] transports.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use encdec::DecodeOwned;
use log::debug;
use tokio::sync::Mutex;

use calypso_apdu::{
    encode_command,
    get_data::{GetDataReq, TraceabilityInfo},
    read_record::ReadRecordReq,
    response::{ApduResponse, StatusWord},
    select_application::{ApplicationFci, FileOccurrence, SelectApplicationReq},
    select_file::{FileHeader, SelectFileControl, SelectFileReq},
    ApduReq, Instruction, CLA_ISO,
};
use calypso_card_core::{
    application::ProductType,
    channel::{CardChannel, Exchange, FileTable, SelectedApplication},
    CardError,
};

/// Calypso handle for a connected card.
///
/// This is generic over [Exchange] types to support different
/// underlying transports / readers
#[derive(Clone)]
pub struct CardHandle<T: Exchange> {
    /// Transport for communication
    t: Arc<Mutex<T>>,
    /// Timeout for APDU requests
    request_timeout_s: usize,
    /// Class byte for file commands, set on application selection
    cla: u8,
}

/// Create a [CardHandle] wrapper from a type implementing [Exchange]
impl<T: Exchange> From<T> for CardHandle<T> {
    fn from(t: T) -> Self {
        Self {
            t: Arc::new(Mutex::new(t)),
            request_timeout_s: 2,
            cla: CLA_ISO,
        }
    }
}

impl<T: Exchange + Send> CardHandle<T> {
    /// Set the APDU request timeout
    pub fn with_request_timeout(mut self, seconds: usize) -> Self {
        self.request_timeout_s = seconds;
        self
    }

    /// Helper to fetch APDU request timeout
    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_s as u64)
    }

    /// Class byte used for file commands
    pub fn cla(&self) -> u8 {
        self.cla
    }

    /// Exchange a raw command, splitting the response status word
    async fn transmit(&self, command: &[u8]) -> Result<ApduResponse, CardError> {
        let mut t = self.t.lock().await;

        let r = tokio::time::timeout(self.request_timeout(), t.exchange(command))
            .await
            .map_err(|_| CardError::Transport("timeout waiting for card response".to_string()))??;

        let r = ApduResponse::parse(&r)?;

        debug!(
            "Command: {} response: {} ({})",
            hex::encode_upper(command),
            hex::encode_upper(&r.data),
            r.status
        );

        Ok(r)
    }

    /// Issue a request, handling `6Cxx` re-issue and `61xx` GET RESPONSE
    async fn request(&self, req: &(impl ApduReq + Sync)) -> Result<ApduResponse, CardError> {
        let mut command = encode_command(req)?;
        let mut resp = self.transmit(&command).await?;

        // Re-issue with the exact expected length
        if let (Some(le), Some(_)) = (resp.status.wrong_length(), req.le()) {
            if let Some(b) = command.last_mut() {
                *b = le;
            }
            resp = self.transmit(&command).await?;
        }

        // Fetch pending response data
        let mut data = std::mem::take(&mut resp.data);
        while let Some(n) = resp.status.bytes_available() {
            resp = self
                .transmit(&[CLA_ISO, Instruction::GetResponse as u8, 0x00, 0x00, n])
                .await?;
            data.append(&mut resp.data);
        }
        resp.data = data;

        Ok(resp)
    }
}

#[async_trait]
impl<T: Exchange + Send> CardChannel for CardHandle<T> {
    async fn select_application(
        &mut self,
        aid: &[u8],
        occurrence: FileOccurrence,
    ) -> Result<SelectedApplication, CardError> {
        debug!(
            "Selecting application {} ({})",
            hex::encode_upper(aid),
            occurrence
        );

        let resp = self
            .request(&SelectApplicationReq::new(aid, occurrence))
            .await?;

        let invalidated = match resp.status {
            StatusWord::SUCCESS => false,
            StatusWord::INVALIDATED => true,
            sw => return Err(CardError::SelectionFailed(sw)),
        };

        let (fci, _) = ApplicationFci::decode_owned(&resp.data)?;

        // File commands use the legacy class for revision 2 applications
        self.cla =
            ProductType::from_application_type(fci.startup_info.application_type).cla();

        Ok(SelectedApplication {
            response: resp.data,
            fci,
            invalidated,
        })
    }

    async fn select_file(
        &mut self,
        control: SelectFileControl,
        table: &FileTable,
    ) -> Result<FileTable, CardError> {
        let resp = self.request(&SelectFileReq::new(self.cla, control)).await?;

        if !resp.status.is_success() {
            return Err(CardError::SelectionFailed(resp.status));
        }

        let (header, _) = FileHeader::decode_owned(&resp.data)?;

        Ok(table.clone().update(header))
    }

    async fn read_record(&mut self, sfi: u8, index: u8) -> Result<Vec<u8>, CardError> {
        let resp = self
            .request(&ReadRecordReq::new(self.cla, sfi, index))
            .await?;

        match resp.status.is_success() {
            true => Ok(resp.data),
            false => Err(CardError::CommandFailed(resp.status)),
        }
    }

    async fn get_traceability(&mut self) -> Result<Vec<u8>, CardError> {
        let resp = self.request(&GetDataReq::traceability(self.cla)).await?;

        if !resp.status.is_success() {
            return Err(CardError::TagUnavailable(resp.status));
        }

        let (info, _) = TraceabilityInfo::decode_owned(&resp.data)?;

        Ok(info.0)
    }
}
