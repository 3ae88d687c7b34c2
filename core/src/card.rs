// Copyright (c) 2022-2023 The MobileCoin Foundation

use chrono::{DateTime, Local};

use crate::application::ApplicationStructure;

/// Discovered card structure
#[derive(Clone, PartialEq, Debug)]
pub struct CardStructure {
    /// Document identifier, assigned once the structure is complete
    pub id: String,
    /// Creation time
    pub date: DateTime<Local>,
    /// Traceability marker
    pub traceability: Vec<u8>,
    /// Discovered application instances
    pub applications: Vec<ApplicationStructure>,
}

impl CardStructure {
    /// Create a new card structure, assigning the document identifier
    pub fn new(
        traceability: Vec<u8>,
        applications: Vec<ApplicationStructure>,
        date: DateTime<Local>,
    ) -> Self {
        let mut s = Self {
            id: String::new(),
            date,
            traceability,
            applications,
        };
        s.id = s.file_name();
        s
    }

    /// Report file name, `<yyyyMMdd>_CardData_<serial number>.json`
    ///
    /// The serial number is that of the first application, zero where no
    /// application is present.
    pub fn file_name(&self) -> String {
        let serial = self
            .applications
            .first()
            .map(|a| a.serial_number_value())
            .unwrap_or_default();

        format!("{}_CardData_{}.json", self.date.format("%Y%m%d"), serial)
    }
}
