// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Application structures and metadata derived from startup information

use calypso_apdu::{
    select_application::{ApplicationFci, ApplicationTypeFlags, StartupInfo},
    select_file::DirectoryHeader,
    CLA_ISO, CLA_LEGACY,
};
use strum::{Display, EnumString};

use crate::{access::AccessRuleSet, file::FileDescriptor};

/// Calypso product type, derived from the application type byte
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, EnumString)]
pub enum ProductType {
    #[strum(serialize = "PRIME_REVISION_2")]
    PrimeRevision2,
    #[strum(serialize = "PRIME_REVISION_3")]
    PrimeRevision3,
    #[strum(serialize = "LIGHT")]
    Light,
    #[strum(serialize = "BASIC")]
    Basic,
    #[strum(serialize = "UNKNOWN")]
    Unknown,
}

impl ProductType {
    /// Resolve the product type for an application type
    pub fn from_application_type(application_type: u8) -> Self {
        match application_type {
            0x00 | 0xFF => ProductType::Unknown,
            0x01..=0x1F => ProductType::PrimeRevision2,
            0x90..=0x97 => ProductType::Light,
            0x98..=0x9F => ProductType::Basic,
            _ => ProductType::PrimeRevision3,
        }
    }

    /// Class byte to use for file commands
    pub fn cla(&self) -> u8 {
        match self {
            ProductType::PrimeRevision2 => CLA_LEGACY,
            _ => CLA_ISO,
        }
    }
}

/// Session buffer size in bytes for a session modification byte, 0 where unknown
pub fn session_buffer_size(session_modification: u8) -> u16 {
    match session_modification {
        6 => 215,
        7 => 256,
        8 => 304,
        9 => 362,
        10 => 430,
        11 => 512,
        12 => 608,
        13 => 724,
        14 => 861,
        15 => 1024,
        _ => 0,
    }
}

/// Software issuer name for an issuer byte
pub fn issuer_name(issuer: u8) -> &'static str {
    match issuer {
        0x00 => "Paragon Id",
        0x01 => "Intec",
        0x02 | 0x2E => "Calypso",
        0x04 => "Thales",
        0x05 | 0x0A => "Idemia",
        0x06 => "Axalto",
        0x07 => "Bull",
        0x08 => "Spirtech",
        0x09 => "BMS",
        0x0B => "Gemplus",
        0x0C => "Magnadata",
        0x0D => "Calmell",
        0x0E => "Mecstar",
        0x0F => "ACG Identification",
        0x10 => "STMicroelectronics",
        0x11 | 0x20 => "CNA",
        0x12 => "G&D",
        0x13 => "OTI",
        0x14 => "Gemalto",
        0x15 => "Watchdata",
        0x16 => "Alios",
        0x17 => "S-P-S",
        0x18 => "ISRA",
        0x19 => "Trust Electronics",
        0x1A => "Trusted Labs",
        0x1B => "Neowave",
        0x1C => "Digital People",
        0x1D => "ABNote Europe",
        0x1E => "Twinlinx",
        0x1F => "Inteligensa",
        0x21 => "Innovatron",
        0x22 => "Austria Card",
        0x23 => "Carta+",
        0x24 => "Impimerie Nationale",
        0x25 | 0x29 => "HID Global",
        0x26 => "Card Project",
        0x27 => "PosteMobile",
        0x28 => "HB Technologies",
        0x2A => "ANY Security Printing",
        0x2B => "SELP",
        0x2C => "Future Card",
        0x2D => "iQuantics",
        0x2F => "Aruba PEC",
        _ => "--",
    }
}

/// A single selected application instance and its files
#[derive(Clone, PartialEq, Debug)]
pub struct ApplicationStructure {
    /// Raw select application response
    pub fci: Vec<u8>,
    /// DF name (full AID)
    pub aid: Vec<u8>,
    /// Application serial number
    pub serial_number: [u8; 8],
    /// Startup information (session, platform, type, issuer, version)
    pub startup: StartupInfo,
    /// Directory header from current DF selection
    pub directory: DirectoryHeader,
    /// Elementary files in discovery order
    pub files: Vec<FileDescriptor>,
}

impl ApplicationStructure {
    /// Create a new application structure from the selection response and directory header
    pub fn new(fci: Vec<u8>, decoded: &ApplicationFci, directory: DirectoryHeader) -> Self {
        Self {
            fci,
            aid: decoded.df_name.clone(),
            serial_number: decoded.serial_number,
            startup: decoded.startup_info,
            directory,
            files: Vec::new(),
        }
    }

    /// Serial number as a big-endian unsigned integer
    pub fn serial_number_value(&self) -> u64 {
        u64::from_be_bytes(self.serial_number)
    }

    pub fn product_type(&self) -> ProductType {
        ProductType::from_application_type(self.startup.application_type)
    }

    pub fn buffer_size(&self) -> u16 {
        session_buffer_size(self.startup.session_modification)
    }

    pub fn issuer_name(&self) -> &'static str {
        issuer_name(self.startup.software_issuer)
    }

    pub fn application_flags(&self) -> ApplicationTypeFlags {
        self.startup.flags()
    }

    /// Directory level access conditions
    pub fn access(&self) -> AccessRuleSet {
        AccessRuleSet::new(self.directory.access_conditions, self.directory.key_levels)
    }

    /// Check whether all non-zero SFIs in the file list are distinct
    pub fn has_distinct_sfis(&self) -> bool {
        let mut sfis: Vec<_> = self.files.iter().map(|f| f.sfi).filter(|s| *s != 0).collect();
        let n = sfis.len();
        sfis.sort_unstable();
        sfis.dedup();
        sfis.len() == n
    }
}
