// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Elementary file descriptors

use calypso_apdu::select_file::EfHeader;
use num_enum::{FromPrimitive, IntoPrimitive};
use strum::Display;

use crate::access::AccessRuleSet;

/// Elementary file type
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum EfType {
    Binary = 0x01,
    Linear = 0x02,
    Cyclic = 0x04,
    SimulatedCounters = 0x08,
    Counters = 0x09,
    #[num_enum(default)]
    Unknown = 0x00,
}

impl EfType {
    /// Short name, as used in report tables
    pub fn short_name(&self) -> &'static str {
        match self {
            EfType::Binary => "Bin ",
            EfType::Linear => "Lin ",
            EfType::Cyclic => "Cycl",
            EfType::SimulatedCounters => "SimC",
            EfType::Counters => "Cnt ",
            EfType::Unknown => "--",
        }
    }

    /// Long name
    pub fn long_name(&self) -> &'static str {
        match self {
            EfType::Binary => "Binary",
            EfType::Linear => "Linear",
            EfType::Cyclic => "Cyclic",
            EfType::SimulatedCounters => "SimulatedCounter",
            EfType::Counters => "Counter",
            EfType::Unknown => "--",
        }
    }
}

/// Record content read from a file
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Record {
    /// Record index (1-based)
    pub index: u8,
    pub data: Vec<u8>,
}

/// Normalised description of a single EF
#[derive(Clone, PartialEq, Debug)]
pub struct FileDescriptor {
    pub lid: u16,
    /// Short file identifier, 0 where the file is not directly addressable
    pub sfi: u8,
    pub ef_type: EfType,
    pub record_count: u8,
    pub record_size: u16,
    pub access: AccessRuleSet,
    /// Shared data reference, `None` where absent (zero)
    pub shared_reference: Option<u16>,
    /// Records read from the file, empty unless the content was readable
    pub records: Vec<Record>,
}

impl FileDescriptor {
    /// Check whether record content should be read for this file
    ///
    /// Binary files, files protected by a PIN or confidential session
    /// on group 0, and files without an SFI are never read.
    pub fn is_readable(&self) -> bool {
        self.ef_type != EfType::Binary && !self.access.group(0).rule().is_protected() && self.sfi != 0
    }
}

impl From<&EfHeader> for FileDescriptor {
    fn from(h: &EfHeader) -> Self {
        Self {
            lid: h.lid,
            sfi: h.sfi,
            ef_type: EfType::from(h.ef_type),
            record_count: h.record_count,
            record_size: h.record_size,
            access: AccessRuleSet::new(h.access_conditions, h.key_levels),
            shared_reference: match h.shared_reference {
                0 => None,
                v => Some(v),
            },
            records: Vec::new(),
        }
    }
}
