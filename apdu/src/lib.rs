// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Protocol / APDU definitions for Calypso card file structure discovery
//!
//! This module provides the subset of the Calypso card command set required to walk
//! the file structure of a card application: application selection, file selection
//! (first / next EF and current DF), record reads, and traceability data retrieval.
//!
//! Requests implement [ApduReq] and [encdec::Encode] for their command body, responses
//! implement [encdec::DecodeOwned] from the response data (status word removed), see
//! [response::ApduResponse] for splitting raw responses.
//!
//! All multi-byte fields are big-endian, as is the way of ISO 7816.
//!

#![no_std]

extern crate alloc;

use alloc::vec::Vec;
use core::fmt::{Debug, Display};

pub use encdec::{DecodeOwned, Encode};

pub mod get_data;
pub mod read_record;
pub mod response;
pub mod select_application;
pub mod select_file;
pub mod tlv;

/// ISO class byte, used for application selection and revision 3 cards
pub const CLA_ISO: u8 = 0x00;

/// Legacy Calypso class byte, used by revision 1 and 2 cards
pub const CLA_LEGACY: u8 = 0x94;

/// Calypso APDU instruction codes
#[derive(Copy, Clone, Debug, PartialEq, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum Instruction {
    /// Select application (by DF name) or file (by relative position)
    Select = 0xA4,

    /// Read one or more records from an EF
    ReadRecords = 0xB2,

    /// Fetch a data object by tag
    GetData = 0xCA,

    /// Fetch pending response bytes (T=0)
    GetResponse = 0xC0,
}

/// APDU command header
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct ApduHeader {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
}

/// Request APDU, encodes a command body via [Encode] and provides the matching header
pub trait ApduReq: Encode<Error = ApduError> {
    /// Fetch the command header for this request
    fn header(&self) -> ApduHeader;

    /// Expected response length, `None` where no response data is expected
    fn le(&self) -> Option<u8> {
        Some(0x00)
    }
}

/// Encode a request into a complete command APDU (header, Lc, body, Le)
pub fn encode_command(req: &impl ApduReq) -> Result<Vec<u8>, ApduError> {
    let h = req.header();
    let n = req.encode_len()?;

    // Short APDUs only
    if n > 0xFF {
        return Err(ApduError::InvalidLength);
    }

    let mut buff = Vec::with_capacity(n + 6);
    buff.extend_from_slice(&[h.cla, h.ins, h.p1, h.p2]);

    if n > 0 {
        buff.push(n as u8);

        let start = buff.len();
        buff.resize(start + n, 0);
        req.encode(&mut buff[start..])?;
    }

    if let Some(le) = req.le() {
        buff.push(le);
    }

    Ok(buff)
}

/// Parsed command APDU, used by card-side implementations to dispatch requests
#[derive(Clone, PartialEq, Debug)]
pub struct ApduCommand<'a> {
    pub header: ApduHeader,
    pub data: &'a [u8],
    pub le: Option<u8>,
}

impl<'a> ApduCommand<'a> {
    /// Parse a short command APDU
    pub fn parse(buff: &'a [u8]) -> Result<Self, ApduError> {
        if buff.len() < 4 {
            return Err(ApduError::InvalidLength);
        }

        let header = ApduHeader {
            cla: buff[0],
            ins: buff[1],
            p1: buff[2],
            p2: buff[3],
        };

        let (data, le) = match buff.len() {
            // Case 1
            4 => (&buff[4..4], None),
            // Case 2
            5 => (&buff[4..4], Some(buff[4])),
            // Case 3 / 4
            _ => {
                let lc = buff[4] as usize;
                let body = &buff[5..];

                match body.len() {
                    n if n == lc => (body, None),
                    n if n == lc + 1 => (&body[..lc], Some(body[lc])),
                    _ => return Err(ApduError::InvalidLength),
                }
            }
        };

        Ok(Self { header, data, le })
    }
}

/// APDU encoding / decoding errors
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum ApduError {
    /// Buffer or field length invalid
    InvalidLength,

    /// Field value could not be decoded
    InvalidEncoding,

    /// Expected BER-TLV tag missing from response
    MissingTag(u16),
}

impl Display for ApduError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ApduError::InvalidLength => write!(f, "invalid length"),
            ApduError::InvalidEncoding => write!(f, "invalid encoding"),
            ApduError::MissingTag(t) => write!(f, "missing tag {t:02X}h"),
        }
    }
}

impl From<encdec::Error> for ApduError {
    fn from(e: encdec::Error) -> Self {
        match e {
            encdec::Error::Length => ApduError::InvalidLength,
            #[allow(unreachable_patterns)]
            _ => ApduError::InvalidEncoding,
        }
    }
}
