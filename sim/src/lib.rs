// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Virtual Calypso card
//!
//! [VirtualCard] answers command APDUs from an in-memory application layout
//! and implements [Exchange], so the complete host stack (APDU encoding,
//! status word handling, discovery and verification) can be exercised
//! without a reader.
//!
//! Layouts are built directly via [VirtualApplication] or loaded from a
//! previously saved card document with [VirtualCard::from_document].

use anyhow::anyhow;
use async_trait::async_trait;
use log::debug;

use calypso_apdu::{
    get_data::TAG_TRACEABILITY_INFORMATION,
    read_record::ReadRecordReq,
    response::{ApduResponse, StatusWord},
    select_application::{ApplicationFci, FileOccurrence, StartupInfo},
    select_file::{DirectoryHeader, EfHeader, FileHeader, SelectFileControl},
    tlv, ApduCommand, ApduHeader, Instruction,
};
use calypso_card_core::{
    application::ProductType,
    channel::Exchange,
    document::{AccessConditionsDocument, ApplicationDocument, CardDocument, FileDocument},
    CardError,
};

/// Elementary file with its records
#[derive(Clone, PartialEq, Debug)]
pub struct VirtualFile {
    pub header: EfHeader,
    /// Record contents, record `n` at index `n - 1`
    pub records: Vec<Vec<u8>>,
}

/// Application instance on a [VirtualCard]
#[derive(Clone, PartialEq, Debug)]
pub struct VirtualApplication {
    pub fci: ApplicationFci,
    pub directory: DirectoryHeader,
    pub files: Vec<VirtualFile>,
    /// Selection returns `6283` in place of `9000`
    pub invalidated: bool,
}

impl VirtualApplication {
    pub fn new(
        aid: &[u8],
        serial_number: [u8; 8],
        startup_info: StartupInfo,
        directory: DirectoryHeader,
    ) -> Self {
        Self {
            fci: ApplicationFci::new(aid, serial_number, startup_info),
            directory,
            files: vec![],
            invalidated: false,
        }
    }

    /// Add an elementary file
    pub fn with_file(mut self, header: EfHeader, records: Vec<Vec<u8>>) -> Self {
        self.files.push(VirtualFile { header, records });
        self
    }

    /// Mark the application as invalidated
    pub fn invalidated(mut self) -> Self {
        self.invalidated = true;
        self
    }

    /// Class byte accepted for file commands
    fn cla(&self) -> u8 {
        ProductType::from_application_type(self.fci.startup_info.application_type).cla()
    }

    /// Build an application from a card document entry
    ///
    /// The AID is required, other absent fields default to zero.
    pub fn from_document(d: &ApplicationDocument) -> anyhow::Result<Self> {
        let aid = d
            .aid
            .as_ref()
            .ok_or_else(|| anyhow!("application AID missing"))?;

        // Serial numbers shorter than 8 bytes are right-aligned
        let mut serial_number = [0u8; 8];
        if let Some(csn) = &d.csn {
            if csn.len() > serial_number.len() {
                return Err(anyhow!("invalid serial number length: {}", csn.len()));
            }
            serial_number[8 - csn.len()..].copy_from_slice(csn);
        }

        let startup = StartupInfo {
            session_modification: d.session_modif.unwrap_or_default() as u8,
            platform: d.platform.unwrap_or_default(),
            application_type: d.application_type.unwrap_or_default(),
            application_subtype: d.application_subtype.unwrap_or_default(),
            software_issuer: d.issuer.as_ref().and_then(|i| i.value).unwrap_or_default(),
            software_version: d.version.unwrap_or_default(),
            software_revision: d.revision.unwrap_or_default(),
        };

        let (access_conditions, key_levels) = access_bytes(d.access_conditions.as_ref());
        let directory = DirectoryHeader {
            lid: d.lid.unwrap_or_default(),
            access_conditions,
            key_levels,
            status: d.status.unwrap_or_default(),
            kvc: [
                d.kvc1.unwrap_or_default(),
                d.kvc2.unwrap_or_default(),
                d.kvc3.unwrap_or_default(),
            ],
            kif: [
                d.kif1.unwrap_or_default(),
                d.kif2.unwrap_or_default(),
                d.kif3.unwrap_or_default(),
            ],
        };

        let mut a = Self::new(aid, serial_number, startup, directory);
        for f in d.file_list.iter().flatten() {
            a = a.with_file(file_header(f), file_records(f)?);
        }

        Ok(a)
    }
}

fn access_bytes(a: Option<&AccessConditionsDocument>) -> ([u8; 4], [u8; 4]) {
    let (mut conditions, mut key_levels) = ([0u8; 4], [0u8; 4]);

    let groups = a.map(|a| a.groups()).unwrap_or_default();
    for (i, g) in groups.iter().enumerate() {
        if let Some(g) = g {
            conditions[i] = g.access_condition.unwrap_or_default();
            key_levels[i] = g.key_level.unwrap_or_default();
        }
    }

    (conditions, key_levels)
}

fn file_header(f: &FileDocument) -> EfHeader {
    let (access_conditions, key_levels) = access_bytes(f.access_conditions.as_ref());

    EfHeader {
        sfi: f.sfi,
        lid: f.lid.unwrap_or_default(),
        ef_type: f.ef_type.unwrap_or_default(),
        record_size: f.rec_size.unwrap_or_default(),
        record_count: f.num_rec.unwrap_or_default(),
        access_conditions,
        key_levels,
        shared_reference: f.data_ref.unwrap_or_default(),
    }
}

fn file_records(f: &FileDocument) -> anyhow::Result<Vec<Vec<u8>>> {
    let mut records: Vec<Vec<u8>> = vec![];

    for r in &f.record_data_list {
        let i = (r.index as usize)
            .checked_sub(1)
            .ok_or_else(|| anyhow!("invalid record index 0 for SFI {:02X}", f.sfi))?;

        if records.len() <= i {
            records.resize(i + 1, vec![]);
        }
        records[i] = r.value.clone();
    }

    Ok(records)
}

/// Virtual Calypso card
#[derive(Clone, Debug, Default)]
pub struct VirtualCard {
    applications: Vec<VirtualApplication>,
    traceability: Option<Vec<u8>>,
    wrap_around: bool,
    t0: bool,
    exact_le: bool,
    failing_reads: Vec<(u8, u8)>,
    removed: bool,

    selected: Option<usize>,
    cursor: Option<usize>,
    pending: Option<Vec<u8>>,

    /// Command APDUs received, in order
    pub commands: Vec<Vec<u8>>,
}

impl VirtualCard {
    pub fn new(applications: Vec<VirtualApplication>) -> Self {
        Self {
            applications,
            ..Default::default()
        }
    }

    /// Build a card from a saved card document
    pub fn from_document(d: &CardDocument) -> anyhow::Result<Self> {
        let applications = d
            .application_list
            .iter()
            .map(VirtualApplication::from_document)
            .collect::<Result<Vec<_>, _>>()?;

        let mut c = Self::new(applications);
        c.traceability = d.traceability.clone().filter(|t| !t.is_empty());

        Ok(c)
    }

    /// Set traceability information returned via GET DATA
    pub fn with_traceability(mut self, v: Vec<u8>) -> Self {
        self.traceability = Some(v);
        self
    }

    /// Return to the first EF after the last one on next EF selection,
    /// in place of failing with `6A82`
    pub fn wrap_around(mut self, enabled: bool) -> Self {
        self.wrap_around = enabled;
        self
    }

    /// Return response data via `61xx` / GET RESPONSE
    pub fn t0_responses(mut self, enabled: bool) -> Self {
        self.t0 = enabled;
        self
    }

    /// Reject record reads with `Le = 00` using `6Cxx`
    pub fn exact_le(mut self, enabled: bool) -> Self {
        self.exact_le = enabled;
        self
    }

    /// Fail reads of the specified record with `6982`
    pub fn fail_read(mut self, sfi: u8, record: u8) -> Self {
        self.failing_reads.push((sfi, record));
        self
    }

    /// Remove the card, subsequent exchanges fail at the transport
    pub fn remove(&mut self) {
        self.removed = true;
    }

    pub fn applications(&self) -> &[VirtualApplication] {
        &self.applications
    }

    /// Process a command APDU
    pub fn process(&mut self, command: &[u8]) -> ApduResponse {
        let c = match ApduCommand::parse(command) {
            Ok(c) => c,
            Err(_) => return ApduResponse::status(StatusWord::WRONG_LENGTH),
        };

        let h = c.header;

        let ins = match Instruction::try_from(h.ins) {
            Ok(v) => v,
            Err(_) => return ApduResponse::status(StatusWord::INS_NOT_SUPPORTED),
        };

        // Pending response data is only available to the next command
        if ins != Instruction::GetResponse {
            self.pending = None;
        }

        match ins {
            Instruction::Select if h.p1 == 0x04 => self.select_application(c.data, h.p2),
            Instruction::Select => self.select_file(&h),
            Instruction::ReadRecords => self.read_record(&c),
            Instruction::GetData => self.get_data(&h),
            Instruction::GetResponse => match self.pending.take() {
                Some(d) => ApduResponse::new(d, StatusWord::SUCCESS),
                None => ApduResponse::status(StatusWord::CONDITIONS_NOT_SATISFIED),
            },
        }
    }

    fn respond(&mut self, data: Vec<u8>, status: StatusWord) -> ApduResponse {
        if self.t0 && status.is_success() && !data.is_empty() {
            let n = data.len() as u8;
            self.pending = Some(data);
            return ApduResponse::status(StatusWord(0x6100 | n as u16));
        }

        ApduResponse::new(data, status)
    }

    /// Fetch the selected application, checking the class byte
    fn application(&self, cla: u8) -> Result<&VirtualApplication, StatusWord> {
        let a = self
            .selected
            .and_then(|i| self.applications.get(i))
            .ok_or(StatusWord::CONDITIONS_NOT_SATISFIED)?;

        match a.cla() == cla {
            true => Ok(a),
            false => Err(StatusWord::CLA_NOT_SUPPORTED),
        }
    }

    fn select_application(&mut self, aid: &[u8], p2: u8) -> ApduResponse {
        let occurrence = match FileOccurrence::from_p2(p2) {
            Some(o) => o,
            None => return ApduResponse::status(StatusWord::WRONG_P1P2),
        };

        let start = match occurrence {
            FileOccurrence::First => 0,
            FileOccurrence::Next => self.selected.map(|i| i + 1).unwrap_or(0),
        };

        let index = match (start..self.applications.len())
            .find(|i| self.applications[*i].fci.df_name.starts_with(aid))
        {
            Some(i) => i,
            None => return ApduResponse::status(StatusWord::FILE_NOT_FOUND),
        };

        self.selected = Some(index);
        self.cursor = None;

        let a = &self.applications[index];
        let status = match a.invalidated {
            true => StatusWord::INVALIDATED,
            false => StatusWord::SUCCESS,
        };
        let fci = a.fci.to_vec();

        self.respond(fci, status)
    }

    fn select_file(&mut self, h: &ApduHeader) -> ApduResponse {
        let control = match SelectFileControl::from_p1p2(h.p1, h.p2) {
            Some(c) => c,
            None => return ApduResponse::status(StatusWord::WRONG_P1P2),
        };

        let a = match self.application(h.cla) {
            Ok(a) => a,
            Err(sw) => return ApduResponse::status(sw),
        };
        let n = a.files.len();

        let index = match control {
            SelectFileControl::CurrentDf => {
                let d = FileHeader::Directory(a.directory).to_vec();
                return self.respond(d, StatusWord::SUCCESS);
            }
            SelectFileControl::FirstEf if n > 0 => 0,
            SelectFileControl::NextEf => match self.cursor {
                Some(c) if c + 1 < n => c + 1,
                Some(_) if self.wrap_around => 0,
                _ => return ApduResponse::status(StatusWord::FILE_NOT_FOUND),
            },
            _ => return ApduResponse::status(StatusWord::FILE_NOT_FOUND),
        };

        let d = FileHeader::Elementary(a.files[index].header).to_vec();
        self.cursor = Some(index);

        self.respond(d, StatusWord::SUCCESS)
    }

    fn read_record(&mut self, c: &ApduCommand) -> ApduResponse {
        let req = match ReadRecordReq::from_header(&c.header) {
            Some(r) => r,
            None => return ApduResponse::status(StatusWord::WRONG_P1P2),
        };

        let a = match self.application(req.cla) {
            Ok(a) => a,
            Err(sw) => return ApduResponse::status(sw),
        };

        if self.failing_reads.contains(&(req.sfi, req.record)) {
            return ApduResponse::status(StatusWord::SECURITY_NOT_SATISFIED);
        }

        let file = match a.files.iter().find(|f| f.header.sfi == req.sfi) {
            Some(f) if req.sfi != 0 => f,
            _ => return ApduResponse::status(StatusWord::FILE_NOT_FOUND),
        };

        let data = match (req.record as usize)
            .checked_sub(1)
            .and_then(|i| file.records.get(i))
        {
            Some(d) => d.clone(),
            None => return ApduResponse::status(StatusWord::RECORD_NOT_FOUND),
        };

        if self.exact_le && c.le == Some(0) && !data.is_empty() {
            return ApduResponse::status(StatusWord(0x6C00 | data.len() as u16));
        }

        self.respond(data, StatusWord::SUCCESS)
    }

    fn get_data(&mut self, h: &ApduHeader) -> ApduResponse {
        if let Err(sw) = self.application(h.cla) {
            return ApduResponse::status(sw);
        }

        let tag = u16::from_be_bytes([h.p1, h.p2]);
        let v = match &self.traceability {
            Some(v) if tag == TAG_TRACEABILITY_INFORMATION => v.clone(),
            _ => return ApduResponse::status(StatusWord::DATA_NOT_FOUND),
        };

        let mut d = vec![];
        tlv::write(&mut d, TAG_TRACEABILITY_INFORMATION, &v);

        self.respond(d, StatusWord::SUCCESS)
    }
}

#[async_trait]
impl Exchange for VirtualCard {
    async fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>, CardError> {
        if self.removed {
            return Err(CardError::Transport("card removed".to_string()));
        }

        self.commands.push(command.to_vec());

        let r = self.process(command);

        debug!(
            "{} -> {}",
            hex::encode_upper(command),
            hex::encode_upper(r.to_bytes())
        );

        Ok(r.to_bytes())
    }
}
