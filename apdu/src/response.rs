// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Response APDUs and status words

use alloc::vec::Vec;
use core::fmt::Display;

use super::ApduError;

/// ISO 7816 status word
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct StatusWord(pub u16);

impl StatusWord {
    /// Command successful
    pub const SUCCESS: Self = Self(0x9000);

    /// Selected application is invalidated (accepted for selection)
    pub const INVALIDATED: Self = Self(0x6283);

    /// Wrong length (Lc / command length)
    pub const WRONG_LENGTH: Self = Self(0x6700);

    /// Conditions of use not satisfied (no current selection)
    pub const CONDITIONS_NOT_SATISFIED: Self = Self(0x6985);

    /// Security conditions not satisfied
    pub const SECURITY_NOT_SATISFIED: Self = Self(0x6982);

    /// File / application not found, or no next EF
    pub const FILE_NOT_FOUND: Self = Self(0x6A82);

    /// Record not found
    pub const RECORD_NOT_FOUND: Self = Self(0x6A83);

    /// Referenced data object not found
    pub const DATA_NOT_FOUND: Self = Self(0x6A88);

    /// Incorrect P1 / P2
    pub const WRONG_P1P2: Self = Self(0x6B00);

    /// Instruction not supported
    pub const INS_NOT_SUPPORTED: Self = Self(0x6D00);

    /// Class not supported
    pub const CLA_NOT_SUPPORTED: Self = Self(0x6E00);

    /// Check whether the status indicates success
    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS
    }

    /// Number of bytes available via GET RESPONSE (`61xx`)
    pub fn bytes_available(&self) -> Option<u8> {
        match self.0 >> 8 {
            0x61 => Some(self.0 as u8),
            _ => None,
        }
    }

    /// Exact length to re-issue the command with (`6Cxx`)
    pub fn wrong_length(&self) -> Option<u8> {
        match self.0 >> 8 {
            0x6C => Some(self.0 as u8),
            _ => None,
        }
    }

    /// Fetch status word bytes
    pub fn to_bytes(&self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl Display for StatusWord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04X}h", self.0)
    }
}

/// Response APDU, split into data and trailing status word
#[derive(Clone, PartialEq, Debug)]
pub struct ApduResponse {
    pub data: Vec<u8>,
    pub status: StatusWord,
}

impl ApduResponse {
    /// Create a new response
    pub fn new(data: Vec<u8>, status: StatusWord) -> Self {
        Self { data, status }
    }

    /// Create a status-only response
    pub fn status(status: StatusWord) -> Self {
        Self {
            data: Vec::new(),
            status,
        }
    }

    /// Parse a raw response (data followed by `SW1 SW2`)
    pub fn parse(buff: &[u8]) -> Result<Self, ApduError> {
        if buff.len() < 2 {
            return Err(ApduError::InvalidLength);
        }

        let n = buff.len() - 2;
        let status = StatusWord(u16::from_be_bytes([buff[n], buff[n + 1]]));

        Ok(Self {
            data: buff[..n].to_vec(),
            status,
        })
    }

    /// Encode to raw response bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut b = Vec::with_capacity(self.data.len() + 2);
        b.extend_from_slice(&self.data);
        b.extend_from_slice(&self.status.to_bytes());
        b
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_response() {
        let r = ApduResponse::parse(&[0x01, 0x02, 0x90, 0x00]).unwrap();
        assert_eq!(r.data, &[0x01, 0x02]);
        assert!(r.status.is_success());

        let r = ApduResponse::parse(&[0x61, 0x1D]).unwrap();
        assert!(r.data.is_empty());
        assert_eq!(r.status.bytes_available(), Some(0x1D));
        assert_eq!(r.status.wrong_length(), None);

        assert_eq!(ApduResponse::parse(&[0x90]), Err(ApduError::InvalidLength));
    }
}
