// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Scripted in-memory card channel for discovery and verification tests

use async_trait::async_trait;

use calypso_apdu::{
    response::StatusWord,
    select_application::{ApplicationFci, FileOccurrence, StartupInfo},
    select_file::{DirectoryHeader, EfHeader, FileHeader, SelectFileControl},
};

use crate::{
    channel::{CardChannel, FileTable, SelectedApplication},
    CardError,
};

pub fn aid(s: &str) -> Vec<u8> {
    hex::decode(s).unwrap()
}

/// Build an EF header with fixed groups 1..3 (`S2`, `C3`, `NN`)
pub fn ef(sfi: u8, lid: u16, ef_type: u8, ac0: u8, record_count: u8) -> EfHeader {
    EfHeader {
        sfi,
        lid,
        ef_type,
        record_size: 29,
        record_count,
        access_conditions: [ac0, 0x10, 0x14, 0x00],
        key_levels: [0x00, 0x02, 0x03, 0x00],
        shared_reference: 0,
    }
}

pub struct MockApplication {
    pub fci: ApplicationFci,
    pub directory: DirectoryHeader,
    pub files: Vec<(EfHeader, Vec<Vec<u8>>)>,
}

impl MockApplication {
    pub fn new(aid: Vec<u8>, serial_number: u64) -> Self {
        let startup = StartupInfo {
            session_modification: 0x0A,
            platform: 0x3C,
            application_type: 0x23,
            application_subtype: 0x11,
            software_issuer: 0x14,
            software_version: 0x01,
            software_revision: 0x01,
        };

        Self {
            fci: ApplicationFci::new(&aid, serial_number.to_be_bytes(), startup),
            directory: DirectoryHeader {
                lid: 0x2000,
                access_conditions: [0x10, 0x10, 0x10, 0x10],
                key_levels: [0x01, 0x02, 0x03, 0x01],
                status: 0x00,
                kvc: [0x79, 0x7A, 0x7B],
                kif: [0x21, 0x27, 0x30],
            },
            files: vec![],
        }
    }

    pub fn with_file(mut self, header: EfHeader, records: Vec<Vec<u8>>) -> Self {
        self.files.push((header, records));
        self
    }

    pub fn with_application_type(mut self, application_type: u8) -> Self {
        self.fci.startup_info.application_type = application_type;
        self
    }
}

pub struct MockCard {
    apps: Vec<MockApplication>,
    selected: Option<usize>,
    cursor: Option<usize>,
    wrap: bool,
    traceability: Option<Vec<u8>>,
    failing_reads: Vec<(u8, u8)>,
    connected: bool,
    /// Record read attempts as `(sfi, index)`
    pub reads: Vec<(u8, u8)>,
    /// File table sizes after each successful EF selection
    pub table_sizes: Vec<usize>,
}

impl MockCard {
    pub fn new(apps: Vec<MockApplication>) -> Self {
        Self {
            apps,
            selected: None,
            cursor: None,
            wrap: false,
            traceability: None,
            failing_reads: vec![],
            connected: true,
            reads: vec![],
            table_sizes: vec![],
        }
    }

    /// Wrap to the first EF after the last one instead of failing
    pub fn wrap_around(mut self, wrap: bool) -> Self {
        self.wrap = wrap;
        self
    }

    pub fn with_traceability(mut self, v: Vec<u8>) -> Self {
        self.traceability = Some(v);
        self
    }

    pub fn fail_read(mut self, sfi: u8, index: u8) -> Self {
        self.failing_reads.push((sfi, index));
        self
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    fn check_connected(&self) -> Result<(), CardError> {
        match self.connected {
            true => Ok(()),
            false => Err(CardError::Transport("card removed".to_string())),
        }
    }

    fn app(&self) -> Result<&MockApplication, CardError> {
        self.selected
            .and_then(|i| self.apps.get(i))
            .ok_or(CardError::CommandFailed(StatusWord(0x6985)))
    }
}

#[async_trait]
impl CardChannel for MockCard {
    async fn select_application(
        &mut self,
        aid: &[u8],
        occurrence: FileOccurrence,
    ) -> Result<SelectedApplication, CardError> {
        self.check_connected()?;

        let start = match occurrence {
            FileOccurrence::First => 0,
            FileOccurrence::Next => self.selected.map(|i| i + 1).unwrap_or(0),
        };

        let index = (start..self.apps.len())
            .find(|i| self.apps[*i].fci.df_name.starts_with(aid))
            .ok_or(CardError::SelectionFailed(StatusWord::FILE_NOT_FOUND))?;

        self.selected = Some(index);
        self.cursor = None;

        let fci = self.apps[index].fci.clone();
        Ok(SelectedApplication {
            response: fci.to_vec(),
            fci,
            invalidated: false,
        })
    }

    async fn select_file(
        &mut self,
        control: SelectFileControl,
        table: &FileTable,
    ) -> Result<FileTable, CardError> {
        self.check_connected()?;

        let app = self.app()?;
        let n = app.files.len();

        let header = match control {
            SelectFileControl::CurrentDf => {
                return Ok(table.clone().update(FileHeader::Directory(app.directory)))
            }
            SelectFileControl::FirstEf if n > 0 => 0,
            SelectFileControl::NextEf => match self.cursor {
                Some(c) if c + 1 < n => c + 1,
                Some(_) if self.wrap => 0,
                _ => return Err(CardError::SelectionFailed(StatusWord::FILE_NOT_FOUND)),
            },
            _ => return Err(CardError::SelectionFailed(StatusWord::FILE_NOT_FOUND)),
        };

        let t = table.clone().update(FileHeader::Elementary(app.files[header].0));

        self.cursor = Some(header);
        self.table_sizes.push(t.len());

        Ok(t)
    }

    async fn read_record(&mut self, sfi: u8, index: u8) -> Result<Vec<u8>, CardError> {
        self.check_connected()?;

        self.reads.push((sfi, index));

        if self.failing_reads.contains(&(sfi, index)) {
            return Err(CardError::CommandFailed(StatusWord::SECURITY_NOT_SATISFIED));
        }

        self.app()?
            .files
            .iter()
            .find(|(h, _)| h.sfi == sfi)
            .and_then(|(_, r)| r.get(index as usize - 1))
            .cloned()
            .ok_or(CardError::CommandFailed(StatusWord::RECORD_NOT_FOUND))
    }

    async fn get_traceability(&mut self) -> Result<Vec<u8>, CardError> {
        self.check_connected()?;

        self.app()?;

        self.traceability
            .clone()
            .ok_or(CardError::TagUnavailable(StatusWord::DATA_NOT_FOUND))
    }
}
