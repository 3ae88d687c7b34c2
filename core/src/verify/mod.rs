// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Card verification against a reference document
//!
//! Reference documents are sparse, only populated fields are compared.
//! Each reference application is matched by AID (prefix) against the discovered
//! application instances, a reference without an AID matches every instance.
//! Discrepancies are collected rather than returned as errors so a single run
//! reports every mismatch on the card.

use std::fmt::Display;

use log::{debug, info};

use calypso_apdu::select_application::ApplicationTypeFlags;

use crate::{
    access::{AC_CONFIDENTIAL, AC_CONFIDENTIAL_PIN, AC_SESSION},
    application::ApplicationStructure,
    card::CardStructure,
    channel::CardChannel,
    discovery::walk_applications,
    document::{
        AccessConditionsDocument, ApplicationDocument, CardDocument, FileDocument, HexField,
    },
    CardError,
};

mod resolver;
pub use resolver::{FileReference, ReferenceResolver, Resolution};

/// Application type values compared exactly rather than per flag
const APPLICATION_TYPE_EXACT: core::ops::RangeInclusive<u8> = 0x06..=0x1F;

/// Application type flags compared individually
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ApplicationFlag {
    Pin,
    StoredValue,
    Rev32Mode,
    PkiMode,
}

impl ApplicationFlag {
    /// Flags in comparison order
    pub const ALL: [ApplicationFlag; 4] = [
        ApplicationFlag::Pin,
        ApplicationFlag::StoredValue,
        ApplicationFlag::Rev32Mode,
        ApplicationFlag::PkiMode,
    ];

    /// Fetch the application type bit for this flag
    pub fn mask(&self) -> u8 {
        let f = match self {
            ApplicationFlag::Pin => ApplicationTypeFlags::PIN,
            ApplicationFlag::StoredValue => ApplicationTypeFlags::STORED_VALUE,
            ApplicationFlag::Rev32Mode => ApplicationTypeFlags::REV32_MODE,
            ApplicationFlag::PkiMode => ApplicationTypeFlags::PKI_MODE,
        };
        f.bits()
    }
}

impl Display for ApplicationFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ApplicationFlag::Pin => "PIN configuration",
            ApplicationFlag::StoredValue => "SV configuration",
            ApplicationFlag::Rev32Mode => "Rev 3.2 mode support configuration",
            ApplicationFlag::PkiMode => "Rev 3.3 PKI mode support configuration",
        };
        write!(f, "{s}")
    }
}

/// Verification mismatch kinds
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Mismatch {
    /// No application matches the reference AID
    ApplicationNotPresent,
    /// More than one application matches the reference AID
    AmbiguousApplication(usize),
    /// Scalar field mismatch, values as encoded in documents
    Field {
        name: &'static str,
        expected: String,
        actual: String,
    },
    /// Application type flag mismatch
    Flag {
        flag: ApplicationFlag,
        expected: bool,
        actual: bool,
    },
    /// Access condition mismatch for a group
    AccessCondition { group: usize, expected: u8, actual: u8 },
    /// Key level mismatch for a group
    KeyLevel { group: usize, expected: u8, actual: u8 },
    /// Reference access condition requires a key level but none is provided
    MissingKeyLevel { group: usize, condition: u8 },
    /// Number of files mismatch
    FileCount { expected: usize, actual: usize },
    /// No discovered file with the reference SFI
    FileNotFound(u8),
    /// Reference expects a shared data reference the card does not provide
    DataRefNotPresent,
    /// Linked files report different shared data references
    DataRefMismatch {
        lid: u16,
        value: u16,
        linked_lid: u16,
        linked_value: u16,
    },
    /// Shared data reference without a linked counterpart
    UnresolvedReference { lid: u16, linked_lid: u16 },
}

impl Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mismatch::ApplicationNotPresent => write!(f, "Application not present in card"),
            Mismatch::AmbiguousApplication(n) => write!(
                f,
                "Found ({n}) applications for the given AID, skipping application analysis"
            ),
            Mismatch::Field {
                name,
                expected,
                actual,
            } => write!(f, "Expected {name} to be [{expected}] and found [{actual}]"),
            Mismatch::Flag {
                flag,
                expected,
                actual,
            } => write!(
                f,
                "Incorrect value for {flag} flag, expected ({expected}) and got ({actual})"
            ),
            Mismatch::AccessCondition {
                group,
                expected,
                actual,
            } => write!(
                f,
                "Group {group}: expected access condition to be [{expected:02X}] and found [{actual:02X}]"
            ),
            Mismatch::KeyLevel {
                group,
                expected,
                actual,
            } => write!(
                f,
                "Group {group}: expected key level to be [{expected:02X}] and found [{actual:02X}]"
            ),
            Mismatch::MissingKeyLevel { group, condition } => write!(
                f,
                "Group {group}: reference error, access condition [{condition:02X}] requires an associated key level"
            ),
            Mismatch::FileCount { expected, actual } => write!(
                f,
                "Expected application to have ({expected}) file(s) and found ({actual})"
            ),
            Mismatch::FileNotFound(sfi) => {
                write!(f, "No matching file found for SFI ({sfi:02X})")
            }
            Mismatch::DataRefNotPresent => write!(f, "DataRef field not present in the card"),
            Mismatch::DataRefMismatch {
                lid,
                value,
                linked_lid,
                linked_value,
            } => write!(
                f,
                "DataRef for file {lid:04X} [{value:04X}] doesn't match the value of the linked file {linked_lid:04X} [{linked_value:04X}]"
            ),
            Mismatch::UnresolvedReference { lid, linked_lid } => write!(
                f,
                "No/incorrect data ref found for file {lid:04X}, should be linked with file {linked_lid:04X}"
            ),
        }
    }
}

/// Verification discrepancy, a [Mismatch] with the application and file it was found in
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Discrepancy {
    /// Reference AID, `None` for references without an AID and for cross-application findings
    pub aid: Option<Vec<u8>>,
    /// File SFI, `None` for application level findings
    pub sfi: Option<u8>,
    pub kind: Mismatch,
}

impl Display for Discrepancy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(aid) = &self.aid {
            write!(f, "[{}] ", hex::encode_upper(aid))?;
        }
        if let Some(sfi) = self.sfi {
            write!(f, "SFI {sfi:02X}: ")?;
        }
        write!(f, "{}", self.kind)
    }
}

/// Verification engine
///
/// Accumulates discrepancies and shared references across applications,
/// call [Verifier::finish] once every reference application has been checked.
#[derive(Clone, Debug, Default)]
pub struct Verifier {
    resolver: ReferenceResolver,
    findings: Vec<Discrepancy>,
    aid: Option<Vec<u8>>,
}

impl Verifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discrepancies found so far
    pub fn findings(&self) -> &[Discrepancy] {
        &self.findings
    }

    /// Check a reference application against discovered applications
    ///
    /// Exactly one discovered application must match the reference AID (prefix).
    pub fn check_application(
        &mut self,
        reference: &ApplicationDocument,
        discovered: &[ApplicationStructure],
    ) {
        self.aid = reference.aid.clone();

        let prefix = reference.aid.as_deref().unwrap_or_default();
        let matches: Vec<_> = discovered
            .iter()
            .filter(|a| a.aid.starts_with(prefix))
            .collect();

        info!("Checking application: {}", hex::encode_upper(prefix));

        match matches.as_slice() {
            [] => self.report(None, Mismatch::ApplicationNotPresent),
            [a] => self.compare_application(reference, &ApplicationDocument::from(*a)),
            m => self.report(None, Mismatch::AmbiguousApplication(m.len())),
        }
    }

    /// Complete verification, reporting unresolved shared references
    pub fn finish(mut self) -> Vec<Discrepancy> {
        let unresolved: Vec<_> = self
            .resolver
            .unresolved()
            .map(|r| Mismatch::UnresolvedReference {
                lid: r.lid,
                linked_lid: r.linked_lid,
            })
            .collect();

        self.aid = None;
        for m in unresolved {
            self.report(None, m);
        }

        self.findings
    }

    fn report(&mut self, sfi: Option<u8>, kind: Mismatch) {
        let d = Discrepancy {
            aid: self.aid.clone(),
            sfi,
            kind,
        };

        debug!("{}", d);

        self.findings.push(d);
    }

    /// Compare a reference field if populated
    fn check<T: PartialEq>(
        &mut self,
        sfi: Option<u8>,
        name: &'static str,
        expected: &Option<T>,
        actual: &Option<T>,
        encode: impl Fn(&T) -> String,
    ) {
        let e = match expected {
            Some(v) => v,
            None => return,
        };

        if Some(e) != actual.as_ref() {
            self.report(
                sfi,
                Mismatch::Field {
                    name,
                    expected: encode(e),
                    actual: actual.as_ref().map(&encode).unwrap_or_default(),
                },
            );
        }
    }

    fn compare_application(&mut self, r: &ApplicationDocument, d: &ApplicationDocument) {
        self.check(None, "Calypso Revision", &r.calypso_revision, &d.calypso_revision, String::clone);
        self.check(None, "Session Modifications", &r.session_modif, &d.session_modif, u16::encode_hex);

        if let (Some(e), Some(a)) = (r.application_type, d.application_type) {
            self.compare_application_type(e, a);
        }

        self.check(
            None,
            "Application Subtype",
            &r.application_subtype,
            &d.application_subtype,
            u8::encode_hex,
        );

        self.compare_access(None, r.access_conditions.as_ref(), d.access_conditions.as_ref());

        self.check(None, "KIF1", &r.kif1, &d.kif1, u8::encode_hex);
        self.check(None, "KIF2", &r.kif2, &d.kif2, u8::encode_hex);
        self.check(None, "KIF3", &r.kif3, &d.kif3, u8::encode_hex);
        self.check(None, "KVC1", &r.kvc1, &d.kvc1, u8::encode_hex);
        self.check(None, "KVC2", &r.kvc2, &d.kvc2, u8::encode_hex);
        self.check(None, "KVC3", &r.kvc3, &d.kvc3, u8::encode_hex);
        self.check(None, "LID", &r.lid, &d.lid, u16::encode_hex);

        let (files, discovered) = match (&r.file_list, &d.file_list) {
            (Some(f), Some(d)) => (f, d.as_slice()),
            (Some(f), None) => (f, &[][..]),
            _ => return,
        };

        if files.len() != discovered.len() {
            self.report(
                None,
                Mismatch::FileCount {
                    expected: files.len(),
                    actual: discovered.len(),
                },
            );
        }

        for f in files {
            self.compare_file(f, discovered);
        }
    }

    fn compare_application_type(&mut self, expected: u8, actual: u8) {
        if APPLICATION_TYPE_EXACT.contains(&expected) {
            if expected != actual {
                self.report(
                    None,
                    Mismatch::Field {
                        name: "Application Type",
                        expected: expected.encode_hex(),
                        actual: actual.encode_hex(),
                    },
                );
            }
            return;
        }

        for flag in ApplicationFlag::ALL {
            let (e, a) = (expected & flag.mask() != 0, actual & flag.mask() != 0);
            if e != a {
                self.report(
                    None,
                    Mismatch::Flag {
                        flag,
                        expected: e,
                        actual: a,
                    },
                );
            }
        }
    }

    fn compare_access(
        &mut self,
        sfi: Option<u8>,
        reference: Option<&AccessConditionsDocument>,
        discovered: Option<&AccessConditionsDocument>,
    ) {
        let reference = match reference {
            Some(r) => r.groups(),
            None => return,
        };
        let discovered = discovered.map(|d| d.groups()).unwrap_or_default();

        for (group, (r, d)) in reference.iter().zip(discovered.iter()).enumerate() {
            let expected = match r.and_then(|r| r.access_condition) {
                Some(c) => c,
                None => continue,
            };
            let actual = d.and_then(|d| d.access_condition);

            if Some(expected) != actual {
                self.report(
                    sfi,
                    Mismatch::AccessCondition {
                        group,
                        expected,
                        actual: actual.unwrap_or_default(),
                    },
                );
            }

            if !matches!(expected, AC_SESSION | AC_CONFIDENTIAL | AC_CONFIDENTIAL_PIN) {
                continue;
            }

            let actual = d.and_then(|d| d.key_level);
            match r.and_then(|r| r.key_level) {
                None => self.report(
                    sfi,
                    Mismatch::MissingKeyLevel {
                        group,
                        condition: expected,
                    },
                ),
                Some(e) if Some(e) != actual => self.report(
                    sfi,
                    Mismatch::KeyLevel {
                        group,
                        expected: e,
                        actual: actual.unwrap_or_default(),
                    },
                ),
                _ => (),
            }
        }
    }

    fn compare_file(&mut self, r: &FileDocument, discovered: &[FileDocument]) {
        let sfi = Some(r.sfi);

        debug!("Checking file with SFI ({:02X})", r.sfi);

        let d = match discovered.iter().find(|d| d.sfi == r.sfi) {
            Some(d) => d,
            None => {
                self.report(sfi, Mismatch::FileNotFound(r.sfi));
                return;
            }
        };

        self.check(sfi, "LID", &r.lid, &d.lid, u16::encode_hex);
        self.check(sfi, "EF Type", &r.ef_type, &d.ef_type, u8::encode_hex);
        self.check(sfi, "Record Size", &r.rec_size, &d.rec_size, |v| format!("{v:04}"));
        self.check(sfi, "Number of Records", &r.num_rec, &d.num_rec, u8::encode_hex);

        self.compare_access(sfi, r.access_conditions.as_ref(), d.access_conditions.as_ref());

        // Reference data ref names the linked file LID
        let linked_lid = match r.data_ref {
            Some(v) if v != 0 => v,
            _ => return,
        };

        let value = match d.data_ref {
            Some(v) if v != 0 => v,
            _ => {
                self.report(sfi, Mismatch::DataRefNotPresent);
                return;
            }
        };

        let lid = r.lid.or(d.lid).unwrap_or_default();

        if let Resolution::Mismatch(c) =
            self.resolver.add(FileReference::new(lid, linked_lid, value))
        {
            self.report(
                sfi,
                Mismatch::DataRefMismatch {
                    lid,
                    value,
                    linked_lid: c.lid,
                    linked_value: c.value,
                },
            );
        }
    }
}

/// Verify a discovered card structure against a reference document
pub fn verify_structure(reference: &CardDocument, discovered: &CardStructure) -> Vec<Discrepancy> {
    let mut v = Verifier::new();

    for a in &reference.application_list {
        v.check_application(a, &discovered.applications);
    }

    v.finish()
}

/// Verify a card against a reference document
///
/// Only applications named by the reference are read from the card,
/// each reference AID is used as the selection prefix.
pub async fn verify_card<C: CardChannel + ?Sized>(
    channel: &mut C,
    reference: &CardDocument,
) -> Result<Vec<Discrepancy>, CardError> {
    let mut v = Verifier::new();

    for a in &reference.application_list {
        let prefix = a.aid.as_deref().unwrap_or_default();
        let apps = walk_applications(channel, prefix).await?;

        v.check_application(a, &apps);
    }

    Ok(v.finish())
}
