// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Application selection APDUs

use alloc::vec::Vec;

use encdec::{DecodeOwned, Encode};
use strum::Display;

use super::{tlv, ApduError, ApduHeader, ApduReq, Instruction, CLA_ISO};

/// Select by DF name
const SELECT_BY_NAME: u8 = 0x04;

/// Minimum AID (or AID prefix) length
pub const AID_MIN_LEN: usize = 5;

/// Maximum AID length
pub const AID_MAX_LEN: usize = 16;

/// FCI template tag
pub const TAG_FCI_TEMPLATE: u16 = 0x6F;

/// DF name tag
pub const TAG_DF_NAME: u16 = 0x84;

/// FCI proprietary template tag
pub const TAG_FCI_PROPRIETARY: u16 = 0xA5;

/// FCI issuer discretionary data tag
pub const TAG_FCI_DISCRETIONARY: u16 = 0xBF0C;

/// Application serial number tag
pub const TAG_SERIAL_NUMBER: u16 = 0xC7;

/// Discretionary data (startup information) tag
pub const TAG_STARTUP_INFO: u16 = 0x53;

/// Occurrence for selection of applications sharing an AID prefix
#[derive(Copy, Clone, PartialEq, Debug, Default, Display)]
pub enum FileOccurrence {
    /// Select the first application matching the AID
    #[default]
    First,
    /// Select the next application matching the AID
    Next,
}

impl FileOccurrence {
    /// Fetch the P2 value for this occurrence
    pub fn p2(&self) -> u8 {
        match self {
            FileOccurrence::First => 0x00,
            FileOccurrence::Next => 0x02,
        }
    }

    /// Resolve occurrence from P2, `None` for unsupported values
    pub fn from_p2(p2: u8) -> Option<Self> {
        match p2 & 0x03 {
            0x00 => Some(FileOccurrence::First),
            0x02 => Some(FileOccurrence::Next),
            _ => None,
        }
    }
}

/// Select application request APDU
///
/// ## Encoding:
/// ```text
/// 00 A4 04 <P2> <Lc> <AID...> 00
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct SelectApplicationReq<'a> {
    /// Full AID or AID prefix
    pub aid: &'a [u8],
    /// Occurrence to select
    pub occurrence: FileOccurrence,
}

impl<'a> SelectApplicationReq<'a> {
    /// Create a new [SelectApplicationReq] APDU
    pub fn new(aid: &'a [u8], occurrence: FileOccurrence) -> Self {
        Self { aid, occurrence }
    }
}

impl<'a> ApduReq for SelectApplicationReq<'a> {
    fn header(&self) -> ApduHeader {
        ApduHeader {
            cla: CLA_ISO,
            ins: Instruction::Select as u8,
            p1: SELECT_BY_NAME,
            p2: self.occurrence.p2(),
        }
    }
}

impl<'a> Encode for SelectApplicationReq<'a> {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(self.aid.len())
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        let n = self.aid.len();

        if !(AID_MIN_LEN..=AID_MAX_LEN).contains(&n) || buff.len() < n {
            return Err(ApduError::InvalidLength);
        }

        buff[..n].copy_from_slice(self.aid);

        Ok(n)
    }
}

bitflags::bitflags! {
    /// Application type flags (startup information byte 2)
    pub struct ApplicationTypeFlags: u8 {
        /// PIN feature available
        const PIN = 1 << 0;
        /// Stored value feature available
        const STORED_VALUE = 1 << 1;
        /// Ratification command required
        const RATIFICATION = 1 << 2;
        /// Revision 3.2 mode supported
        const REV32_MODE = 1 << 3;
        /// Revision 3.3 PKI mode supported
        const PKI_MODE = 1 << 4;
    }
}

/// Calypso startup information, from the FCI discretionary data
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct StartupInfo {
    /// Session buffer size indicator
    pub session_modification: u8,
    /// Platform (chip type)
    pub platform: u8,
    /// Application type
    pub application_type: u8,
    /// Application subtype
    pub application_subtype: u8,
    /// Software issuer
    pub software_issuer: u8,
    /// Software version
    pub software_version: u8,
    /// Software revision
    pub software_revision: u8,
}

impl StartupInfo {
    /// Encoded startup information length
    pub const LEN: usize = 7;

    /// Decode startup information, trailing bytes are ignored
    pub fn from_bytes(buff: &[u8]) -> Result<Self, ApduError> {
        if buff.len() < Self::LEN {
            return Err(ApduError::InvalidLength);
        }

        Ok(Self {
            session_modification: buff[0],
            platform: buff[1],
            application_type: buff[2],
            application_subtype: buff[3],
            software_issuer: buff[4],
            software_version: buff[5],
            software_revision: buff[6],
        })
    }

    /// Encode startup information
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        [
            self.session_modification,
            self.platform,
            self.application_type,
            self.application_subtype,
            self.software_issuer,
            self.software_version,
            self.software_revision,
        ]
    }

    /// Fetch application type flags
    pub fn flags(&self) -> ApplicationTypeFlags {
        ApplicationTypeFlags::from_bits_truncate(self.application_type)
    }
}

/// Select application response (FCI)
///
/// ## Encoding:
/// ```text
/// 6F <len>
///    84 <len> <DF name>
///    A5 <len>
///       BF0C <len>
///          C7 08 <serial number>
///          53 07 <startup information>
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct ApplicationFci {
    /// DF name (full AID)
    pub df_name: Vec<u8>,
    /// Application serial number
    pub serial_number: [u8; 8],
    /// Startup information
    pub startup_info: StartupInfo,
}

impl ApplicationFci {
    /// Create a new [ApplicationFci]
    pub fn new(df_name: &[u8], serial_number: [u8; 8], startup_info: StartupInfo) -> Self {
        Self {
            df_name: df_name.to_vec(),
            serial_number,
            startup_info,
        }
    }

    /// Build the encoded FCI
    pub fn to_vec(&self) -> Vec<u8> {
        let mut discretionary = Vec::new();
        tlv::write(&mut discretionary, TAG_SERIAL_NUMBER, &self.serial_number);
        tlv::write(
            &mut discretionary,
            TAG_STARTUP_INFO,
            &self.startup_info.to_bytes(),
        );

        let mut proprietary = Vec::new();
        tlv::write(&mut proprietary, TAG_FCI_DISCRETIONARY, &discretionary);

        let mut template = Vec::new();
        tlv::write(&mut template, TAG_DF_NAME, &self.df_name);
        tlv::write(&mut template, TAG_FCI_PROPRIETARY, &proprietary);

        let mut fci = Vec::new();
        tlv::write(&mut fci, TAG_FCI_TEMPLATE, &template);

        fci
    }
}

impl Encode for ApplicationFci {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(self.to_vec().len())
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        let fci = self.to_vec();

        if buff.len() < fci.len() {
            return Err(ApduError::InvalidLength);
        }

        buff[..fci.len()].copy_from_slice(&fci);

        Ok(fci.len())
    }
}

impl DecodeOwned for ApplicationFci {
    type Output = Self;

    type Error = ApduError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        let df_name =
            tlv::find(buff, TAG_DF_NAME).ok_or(ApduError::MissingTag(TAG_DF_NAME))?;

        // Serial numbers shorter than 8 bytes are right-aligned
        let serial = tlv::find(buff, TAG_SERIAL_NUMBER)
            .ok_or(ApduError::MissingTag(TAG_SERIAL_NUMBER))?;
        if serial.len() > 8 {
            return Err(ApduError::InvalidLength);
        }
        let mut serial_number = [0u8; 8];
        serial_number[8 - serial.len()..].copy_from_slice(serial);

        let startup = tlv::find(buff, TAG_STARTUP_INFO)
            .ok_or(ApduError::MissingTag(TAG_STARTUP_INFO))?;
        let startup_info = StartupInfo::from_bytes(startup)?;

        Ok((
            Self {
                df_name: df_name.to_vec(),
                serial_number,
                startup_info,
            },
            buff.len(),
        ))
    }
}
