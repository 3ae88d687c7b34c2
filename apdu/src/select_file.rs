// Copyright (c) 2022-2023 The MobileCoin Foundation

//! File selection APDUs and proprietary file headers

use alloc::vec::Vec;

use byteorder::{BigEndian, ByteOrder};
use encdec::{DecodeOwned, Encode};
use num_enum::TryFromPrimitive;
use strum::Display;

use super::{tlv, ApduError, ApduHeader, ApduReq, Instruction};

/// Proprietary information tag
pub const TAG_PROPRIETARY_INFO: u16 = 0x85;

/// EF type code for binary files
pub const EF_TYPE_BINARY: u8 = 0x01;

/// EF type code for linear record files
pub const EF_TYPE_LINEAR: u8 = 0x02;

/// Relative file selection mode
#[derive(Copy, Clone, PartialEq, Debug, Display)]
pub enum SelectFileControl {
    /// Select the first EF of the current DF
    FirstEf,
    /// Select the EF following the current EF
    NextEf,
    /// Select the current DF
    CurrentDf,
}

impl SelectFileControl {
    /// Fetch `(P1, P2)` for this selection mode
    pub fn p1p2(&self) -> (u8, u8) {
        match self {
            SelectFileControl::FirstEf => (0x02, 0x00),
            SelectFileControl::NextEf => (0x02, 0x02),
            SelectFileControl::CurrentDf => (0x09, 0x00),
        }
    }

    /// Resolve selection mode from `(P1, P2)`
    pub fn from_p1p2(p1: u8, p2: u8) -> Option<Self> {
        match (p1, p2) {
            (0x02, 0x00) => Some(SelectFileControl::FirstEf),
            (0x02, 0x02) => Some(SelectFileControl::NextEf),
            (0x09, 0x00) => Some(SelectFileControl::CurrentDf),
            _ => None,
        }
    }
}

/// Select file request APDU
///
/// ## Encoding:
/// ```text
/// <CLA> A4 <P1> <P2> 02 00 00 00
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct SelectFileReq {
    /// Class byte for the selected application
    pub cla: u8,
    /// Selection mode
    pub control: SelectFileControl,
}

impl SelectFileReq {
    /// Create a new [SelectFileReq] APDU
    pub fn new(cla: u8, control: SelectFileControl) -> Self {
        Self { cla, control }
    }
}

impl ApduReq for SelectFileReq {
    fn header(&self) -> ApduHeader {
        let (p1, p2) = self.control.p1p2();

        ApduHeader {
            cla: self.cla,
            ins: Instruction::Select as u8,
            p1,
            p2,
        }
    }
}

impl Encode for SelectFileReq {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(2)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        if buff.len() < 2 {
            return Err(ApduError::InvalidLength);
        }

        // Relative selection carries an empty (zero) LID
        buff[..2].copy_from_slice(&[0x00, 0x00]);

        Ok(2)
    }
}

/// File type, from proprietary information byte 1
#[derive(Copy, Clone, PartialEq, Debug, Display, TryFromPrimitive)]
#[repr(u8)]
pub enum FileType {
    Mf = 0x01,
    Df = 0x02,
    Ef = 0x04,
}

/// Elementary file header
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct EfHeader {
    /// Short file identifier
    pub sfi: u8,
    /// Local file identifier
    pub lid: u16,
    /// Raw EF type code
    pub ef_type: u8,
    /// Record size (or file size for binary files)
    pub record_size: u16,
    /// Number of records
    pub record_count: u8,
    /// Access conditions, groups 0..3
    pub access_conditions: [u8; 4],
    /// Key levels, groups 0..3
    pub key_levels: [u8; 4],
    /// Shared data reference
    pub shared_reference: u16,
}

/// Directory (DF) header
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct DirectoryHeader {
    /// Local file identifier
    pub lid: u16,
    /// Access conditions, groups 0..3
    pub access_conditions: [u8; 4],
    /// Key levels, groups 0..3
    pub key_levels: [u8; 4],
    /// DF status
    pub status: u8,
    /// Key version for personalization, load and debit levels
    pub kvc: [u8; 3],
    /// Key identifier for personalization, load and debit levels
    pub kif: [u8; 3],
}

/// File header returned on file selection
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum FileHeader {
    Directory(DirectoryHeader),
    Elementary(EfHeader),
}

/// Proprietary information layout
mod offsets {
    pub const SFI: usize = 0;
    pub const TYPE: usize = 1;
    pub const EF_TYPE: usize = 2;
    pub const REC_SIZE: usize = 3;
    pub const NUM_REC: usize = 4;
    pub const AC: usize = 5;
    pub const NKEY: usize = 9;
    pub const DF_STATUS: usize = 13;
    pub const KVCS: usize = 14;
    pub const KIFS: usize = 17;
    pub const DATA_REF: usize = 19;
    pub const LID: usize = 21;
    pub const LEN: usize = 23;
}

impl FileHeader {
    /// Encoded proprietary information length
    pub const LEN: usize = offsets::LEN;

    /// Decode a header from proprietary information
    pub fn from_proprietary_info(info: &[u8]) -> Result<Self, ApduError> {
        use offsets::*;

        if info.len() < LEN {
            return Err(ApduError::InvalidLength);
        }

        let file_type = match FileType::try_from(info[TYPE]) {
            Ok(v) => v,
            Err(_) => {
                #[cfg(feature = "log")]
                log::debug!("unsupported file type: {:02x}", info[TYPE]);

                return Err(ApduError::InvalidEncoding);
            }
        };

        let mut access_conditions = [0u8; 4];
        access_conditions.copy_from_slice(&info[AC..][..4]);

        let mut key_levels = [0u8; 4];
        key_levels.copy_from_slice(&info[NKEY..][..4]);

        let lid = BigEndian::read_u16(&info[LID..]);

        let h = match file_type {
            FileType::Mf | FileType::Df => {
                let mut kvc = [0u8; 3];
                kvc.copy_from_slice(&info[KVCS..][..3]);

                let mut kif = [0u8; 3];
                kif.copy_from_slice(&info[KIFS..][..3]);

                FileHeader::Directory(DirectoryHeader {
                    lid,
                    access_conditions,
                    key_levels,
                    status: info[DF_STATUS],
                    kvc,
                    kif,
                })
            }
            FileType::Ef => {
                let ef_type = info[EF_TYPE];

                // Binary files carry a 16-bit size in place of record size / count
                let (record_size, record_count) = match ef_type {
                    EF_TYPE_BINARY => (BigEndian::read_u16(&info[REC_SIZE..]), 1),
                    _ => (info[REC_SIZE] as u16, info[NUM_REC]),
                };

                FileHeader::Elementary(EfHeader {
                    sfi: info[SFI],
                    lid,
                    ef_type,
                    record_size,
                    record_count,
                    access_conditions,
                    key_levels,
                    shared_reference: BigEndian::read_u16(&info[DATA_REF..]),
                })
            }
        };

        Ok(h)
    }

    /// Encode header to proprietary information
    pub fn to_proprietary_info(&self) -> [u8; offsets::LEN] {
        use offsets::*;

        let mut info = [0u8; LEN];

        match self {
            FileHeader::Directory(d) => {
                info[TYPE] = FileType::Df as u8;
                info[AC..][..4].copy_from_slice(&d.access_conditions);
                info[NKEY..][..4].copy_from_slice(&d.key_levels);
                info[DF_STATUS] = d.status;
                info[KVCS..][..3].copy_from_slice(&d.kvc);
                info[KIFS..][..3].copy_from_slice(&d.kif);
                BigEndian::write_u16(&mut info[LID..], d.lid);
            }
            FileHeader::Elementary(e) => {
                info[SFI] = e.sfi;
                info[TYPE] = FileType::Ef as u8;
                info[EF_TYPE] = e.ef_type;
                match e.ef_type {
                    EF_TYPE_BINARY => BigEndian::write_u16(&mut info[REC_SIZE..], e.record_size),
                    _ => {
                        info[REC_SIZE] = e.record_size as u8;
                        info[NUM_REC] = e.record_count;
                    }
                }
                info[AC..][..4].copy_from_slice(&e.access_conditions);
                info[NKEY..][..4].copy_from_slice(&e.key_levels);
                BigEndian::write_u16(&mut info[DATA_REF..], e.shared_reference);
                BigEndian::write_u16(&mut info[LID..], e.lid);
            }
        }

        info
    }

    /// Build the encoded select file response (`85 17 <info>`)
    pub fn to_vec(&self) -> Vec<u8> {
        let mut buff = Vec::with_capacity(offsets::LEN + 2);
        tlv::write(&mut buff, TAG_PROPRIETARY_INFO, &self.to_proprietary_info());
        buff
    }
}

impl Encode for FileHeader {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(offsets::LEN + 2)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        let b = self.to_vec();

        if buff.len() < b.len() {
            return Err(ApduError::InvalidLength);
        }

        buff[..b.len()].copy_from_slice(&b);

        Ok(b.len())
    }
}

impl DecodeOwned for FileHeader {
    type Output = Self;

    type Error = ApduError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        let info = tlv::find(buff, TAG_PROPRIETARY_INFO)
            .ok_or(ApduError::MissingTag(TAG_PROPRIETARY_INFO))?;

        let h = Self::from_proprietary_info(info)?;

        Ok((h, buff.len()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{test::encode_apdu, CLA_ISO, CLA_LEGACY};

    #[test]
    fn select_file_req_apdu() {
        let apdu = SelectFileReq::new(CLA_ISO, SelectFileControl::FirstEf);
        assert_eq!(hex::encode_upper(encode_apdu(&apdu)), "00A4020002000000");

        let apdu = SelectFileReq::new(CLA_LEGACY, SelectFileControl::NextEf);
        assert_eq!(hex::encode_upper(encode_apdu(&apdu)), "94A4020202000000");

        let apdu = SelectFileReq::new(CLA_ISO, SelectFileControl::CurrentDf);
        assert_eq!(hex::encode_upper(encode_apdu(&apdu)), "00A4090002000000");
    }

    #[test]
    fn decode_ef_header() {
        // Linear EF 2010h, SFI 07h, 3 records of 29 bytes, data ref 2020h
        let resp = hex::decode(concat!(
            "8517",
            "0704021D03",
            "1F101F1F",
            "00010100",
            "00",
            "0000000000",
            "2020",
            "2010"
        ))
        .unwrap();

        let (h, _) = FileHeader::decode_owned(&resp).unwrap();

        let e = match h {
            FileHeader::Elementary(e) => e,
            _ => panic!("expected EF header"),
        };

        assert_eq!(e.sfi, 0x07);
        assert_eq!(e.lid, 0x2010);
        assert_eq!(e.ef_type, 0x02);
        assert_eq!(e.record_size, 29);
        assert_eq!(e.record_count, 3);
        assert_eq!(e.access_conditions, [0x1F, 0x10, 0x1F, 0x1F]);
        assert_eq!(e.key_levels, [0x00, 0x01, 0x01, 0x00]);
        assert_eq!(e.shared_reference, 0x2020);

        assert_eq!(h.to_vec(), resp);
    }

    #[test]
    fn decode_binary_header() {
        let h = FileHeader::Elementary(EfHeader {
            sfi: 0x1A,
            lid: 0x2F10,
            ef_type: EF_TYPE_BINARY,
            record_size: 0x0140,
            record_count: 1,
            ..Default::default()
        });

        let (d, _) = FileHeader::decode_owned(&h.to_vec()).unwrap();
        assert_eq!(d, h);
    }

    #[test]
    fn decode_df_header() {
        let h = FileHeader::Directory(DirectoryHeader {
            lid: 0x2000,
            access_conditions: [0x10, 0x10, 0x10, 0x10],
            key_levels: [0x01, 0x02, 0x03, 0x01],
            status: 0x00,
            kvc: [0x79, 0x79, 0x79],
            kif: [0x21, 0x27, 0x30],
        });

        let (d, _) = FileHeader::decode_owned(&h.to_vec()).unwrap();
        assert_eq!(d, h);
    }

    #[test]
    fn decode_invalid_file_type() {
        let mut info = [0u8; FileHeader::LEN];
        info[1] = 0x03;

        assert_eq!(
            FileHeader::from_proprietary_info(&info),
            Err(ApduError::InvalidEncoding)
        );
        assert_eq!(
            FileHeader::from_proprietary_info(&info[..10]),
            Err(ApduError::InvalidLength)
        );
    }
}
