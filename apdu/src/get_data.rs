// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Get data APDUs, used to fetch card traceability information

use alloc::vec::Vec;

use encdec::{DecodeOwned, Encode};

use super::{ApduError, ApduHeader, ApduReq, Instruction};

/// Traceability information data object tag
pub const TAG_TRACEABILITY_INFORMATION: u16 = 0x0185;

/// Get data request APDU
///
/// ## Encoding:
/// ```text
/// <CLA> CA <TAG_HI> <TAG_LO> 00
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct GetDataReq {
    /// Class byte for the selected application
    pub cla: u8,
    /// Data object tag
    pub tag: u16,
}

impl GetDataReq {
    /// Create a new traceability information [GetDataReq] APDU
    pub fn traceability(cla: u8) -> Self {
        Self {
            cla,
            tag: TAG_TRACEABILITY_INFORMATION,
        }
    }
}

impl ApduReq for GetDataReq {
    fn header(&self) -> ApduHeader {
        let [p1, p2] = self.tag.to_be_bytes();

        ApduHeader {
            cla: self.cla,
            ins: Instruction::GetData as u8,
            p1,
            p2,
        }
    }
}

impl Encode for GetDataReq {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(0)
    }

    fn encode(&self, _buff: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }
}

/// Traceability information response
///
/// ## Encoding:
/// ```text
/// 01 85 <len> <traceability information...>
/// ```
///
/// Responses without the tag header are accepted as raw traceability information.
#[derive(Clone, PartialEq, Debug)]
pub struct TraceabilityInfo(pub Vec<u8>);

impl Encode for TraceabilityInfo {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(self.0.len() + 3)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        let n = self.0.len();

        if n > 0xFF || buff.len() < n + 3 {
            return Err(ApduError::InvalidLength);
        }

        buff[..2].copy_from_slice(&TAG_TRACEABILITY_INFORMATION.to_be_bytes());
        buff[2] = n as u8;
        buff[3..][..n].copy_from_slice(&self.0);

        Ok(n + 3)
    }
}

impl DecodeOwned for TraceabilityInfo {
    type Output = Self;

    type Error = ApduError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        match buff {
            [0x01, 0x85, n, value @ ..] => {
                let n = *n as usize;
                if value.len() < n {
                    return Err(ApduError::InvalidLength);
                }
                Ok((Self(value[..n].to_vec()), n + 3))
            }
            _ => Ok((Self(buff.to_vec()), buff.len())),
        }
    }
}
