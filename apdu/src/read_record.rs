// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Record read APDUs

use encdec::Encode;

use super::{ApduError, ApduHeader, ApduReq, Instruction};

/// P2 mode bits for reading a single record
const READ_ONE_RECORD: u8 = 0x04;

/// Read record request APDU, reads a single record from an EF addressed by SFI
///
/// ## Encoding:
/// ```text
/// <CLA> B2 <RECORD> <SFI << 3 | 04> 00
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct ReadRecordReq {
    /// Class byte for the selected application
    pub cla: u8,
    /// Short file identifier
    pub sfi: u8,
    /// Record index (1-based)
    pub record: u8,
}

impl ReadRecordReq {
    /// Create a new [ReadRecordReq] APDU
    pub fn new(cla: u8, sfi: u8, record: u8) -> Self {
        Self { cla, sfi, record }
    }

    /// Resolve a single record read from a command header, `None` for other read modes
    pub fn from_header(h: &ApduHeader) -> Option<Self> {
        if h.ins != Instruction::ReadRecords as u8 || h.p2 & 0x07 != READ_ONE_RECORD {
            return None;
        }

        Some(Self {
            cla: h.cla,
            sfi: h.p2 >> 3,
            record: h.p1,
        })
    }
}

impl ApduReq for ReadRecordReq {
    fn header(&self) -> ApduHeader {
        ApduHeader {
            cla: self.cla,
            ins: Instruction::ReadRecords as u8,
            p1: self.record,
            p2: (self.sfi << 3) | READ_ONE_RECORD,
        }
    }
}

impl Encode for ReadRecordReq {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(0)
    }

    fn encode(&self, _buff: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{test::encode_apdu, CLA_ISO};

    #[test]
    fn read_record_req_apdu() {
        let apdu = ReadRecordReq::new(CLA_ISO, 0x07, 0x02);

        let buff = encode_apdu(&apdu);
        assert_eq!(hex::encode_upper(&buff), "00B2023C00");

        assert_eq!(ReadRecordReq::from_header(&apdu.header()), Some(apdu));
    }
}
