// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Persisted card structure documents
//!
//! Documents are written after discovery and read back as the reference
//! structure for verification. Every field except a file's `sfi` is optional
//! on input, reference documents only specify what should be checked.

use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    access::{AccessCondition, AccessRuleSet},
    application::ApplicationStructure,
    card::CardStructure,
    file::{FileDescriptor, Record},
    Error,
};

mod fields;
pub use fields::HexField;
use fields::{dec_padded, hex_opt, hex_value};

/// Software name written to documents
pub const SOFTWARE_NAME: &str = "Calypso Card Analyzer";

/// Software information written to documents
pub const SOFTWARE_INFORMATION: &str = "AnalyzeCardFileStructure";

/// Document format version
pub const DOCUMENT_VERSION: u32 = 2;

/// Transaction counter placeholder, the counter is not read during discovery
pub const TRANSACTION_COUNTER_UNAVAILABLE: &str = "Not available";

/// Document date format
const DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Top level card document
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infos: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software: Option<String>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub traceability: Option<Vec<u8>>,

    #[serde(default)]
    pub application_list: Vec<ApplicationDocument>,
}

/// Software issuer
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct IssuerDocument {
    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub value: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Access condition for one group
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessConditionDocument {
    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub access_condition: Option<u8>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub key_level: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Access conditions for the four access groups
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct AccessConditionsDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group0: Option<AccessConditionDocument>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group1: Option<AccessConditionDocument>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group2: Option<AccessConditionDocument>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group3: Option<AccessConditionDocument>,
}

impl AccessConditionsDocument {
    /// Fetch groups in order
    pub fn groups(&self) -> [Option<&AccessConditionDocument>; 4] {
        [
            self.group0.as_ref(),
            self.group1.as_ref(),
            self.group2.as_ref(),
            self.group3.as_ref(),
        ]
    }
}

/// Application instance
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDocument {
    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub fci: Option<Vec<u8>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calypso_revision: Option<String>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub aid: Option<Vec<u8>>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub csn: Option<Vec<u8>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csn_dec: Option<u64>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub session_modif: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_modif_dec: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<u16>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub platform: Option<u8>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub application_type: Option<u8>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub application_subtype: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<IssuerDocument>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub version: Option<u8>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub revision: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_counter: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_counter_dec: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_conditions: Option<AccessConditionsDocument>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub status: Option<u8>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub kif1: Option<u8>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub kif2: Option<u8>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub kif3: Option<u8>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub kvc1: Option<u8>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub kvc2: Option<u8>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub kvc3: Option<u8>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub lid: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_list: Option<Vec<FileDocument>>,
}

/// Elementary file
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDocument {
    /// Short file identifier, mandatory as files are matched by SFI
    #[serde(with = "hex_value")]
    pub sfi: u8,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub lid: Option<u16>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub ef_type: Option<u8>,

    /// Shared data reference, `0000` where absent
    #[serde(
        rename = "ref",
        default,
        with = "hex_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub data_ref: Option<u16>,

    #[serde(default, with = "dec_padded", skip_serializing_if = "Option::is_none")]
    pub rec_size: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rec_size_dec: Option<u16>,

    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub num_rec: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_rec_dec: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_conditions: Option<AccessConditionsDocument>,

    #[serde(default)]
    pub record_data_list: Vec<RecordDocument>,
}

/// Record content
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct RecordDocument {
    #[serde(with = "hex_value")]
    pub index: u8,

    #[serde(with = "hex_value")]
    pub value: Vec<u8>,
}

impl From<&AccessCondition> for AccessConditionDocument {
    fn from(c: &AccessCondition) -> Self {
        Self {
            access_condition: Some(c.condition),
            key_level: Some(c.key_level),
            description: Some(c.rule().long_name()),
        }
    }
}

impl From<&AccessRuleSet> for AccessConditionsDocument {
    fn from(s: &AccessRuleSet) -> Self {
        Self {
            group0: Some(s.group(0).into()),
            group1: Some(s.group(1).into()),
            group2: Some(s.group(2).into()),
            group3: Some(s.group(3).into()),
        }
    }
}

impl From<&Record> for RecordDocument {
    fn from(r: &Record) -> Self {
        Self {
            index: r.index,
            value: r.data.clone(),
        }
    }
}

impl From<&FileDescriptor> for FileDocument {
    fn from(f: &FileDescriptor) -> Self {
        Self {
            sfi: f.sfi,
            lid: Some(f.lid),
            ef_type: Some(f.ef_type.into()),
            data_ref: Some(f.shared_reference.unwrap_or_default()),
            rec_size: Some(f.record_size),
            rec_size_dec: Some(f.record_size),
            num_rec: Some(f.record_count),
            num_rec_dec: Some(f.record_count),
            access_conditions: Some((&f.access).into()),
            record_data_list: f.records.iter().map(RecordDocument::from).collect(),
        }
    }
}

impl From<&ApplicationStructure> for ApplicationDocument {
    fn from(a: &ApplicationStructure) -> Self {
        let s = &a.startup;
        let d = &a.directory;

        Self {
            fci: Some(a.fci.clone()),
            calypso_revision: Some(a.product_type().to_string()),
            aid: Some(a.aid.clone()),
            csn: Some(a.serial_number.to_vec()),
            csn_dec: Some(a.serial_number_value()),
            session_modif: Some(s.session_modification as u16),
            session_modif_dec: Some(s.session_modification),
            buffer_size: Some(a.buffer_size()),
            platform: Some(s.platform),
            application_type: Some(s.application_type),
            application_subtype: Some(s.application_subtype),
            issuer: Some(IssuerDocument {
                value: Some(s.software_issuer),
                name: Some(a.issuer_name().to_string()),
            }),
            version: Some(s.software_version),
            revision: Some(s.software_revision),
            transaction_counter: Some(TRANSACTION_COUNTER_UNAVAILABLE.to_string()),
            transaction_counter_dec: Some(0),
            access_conditions: Some((&a.access()).into()),
            status: Some(d.status),
            kif1: Some(d.kif[0]),
            kif2: Some(d.kif[1]),
            kif3: Some(d.kif[2]),
            kvc1: Some(d.kvc[0]),
            kvc2: Some(d.kvc[1]),
            kvc3: Some(d.kvc[2]),
            lid: Some(d.lid),
            file_list: Some(a.files.iter().map(FileDocument::from).collect()),
        }
    }
}

impl From<&CardStructure> for CardDocument {
    fn from(c: &CardStructure) -> Self {
        Self {
            id: Some(c.id.clone()),
            infos: Some(SOFTWARE_INFORMATION.to_string()),
            date: Some(c.date.format(DATE_FORMAT).to_string()),
            version: Some(DOCUMENT_VERSION),
            software: Some(SOFTWARE_NAME.to_string()),
            traceability: Some(c.traceability.clone()),
            application_list: c.applications.iter().map(ApplicationDocument::from).collect(),
        }
    }
}

impl CardDocument {
    /// Load a document from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();

        debug!("Loading document from '{}'", path.display());

        let s = std::fs::read_to_string(path)?;
        let d = serde_json::from_str(&s)?;

        Ok(d)
    }

    /// Write the document to a pretty-printed JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();

        debug!("Writing document to '{}'", path.display());

        let s = serde_json::to_string_pretty(self)?;
        std::fs::write(path, s)?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn load_sparse_reference() {
        let s = r#"{
            "applicationList": [
                {
                    "aid": "A000000291",
                    "fileList": [
                        { "sfi": "01", "lid": "0000", "recSize": "0000", "numRec": "00" }
                    ]
                }
            ]
        }"#;

        let d: CardDocument = serde_json::from_str(s).unwrap();

        assert_eq!(d.id, None);
        assert_eq!(d.application_list.len(), 1);

        let a = &d.application_list[0];
        assert_eq!(a.aid, Some(vec![0xA0, 0x00, 0x00, 0x02, 0x91]));
        assert_eq!(a.lid, None);
        assert_eq!(a.access_conditions, None);

        let f = &a.file_list.as_ref().unwrap()[0];
        assert_eq!(f.sfi, 0x01);
        assert_eq!(f.lid, Some(0x0000));
        assert_eq!(f.rec_size, Some(0));
        assert_eq!(f.num_rec, Some(0));
        assert_eq!(f.data_ref, None);
        assert!(f.record_data_list.is_empty());
    }

    #[test]
    fn load_missing_sfi_fails() {
        let s = r#"{ "applicationList": [ { "fileList": [ { "lid": "2010" } ] } ] }"#;
        assert!(serde_json::from_str::<CardDocument>(s).is_err());
    }

    #[test]
    fn load_invalid_hex_fails() {
        let s = r#"{ "applicationList": [ { "lid": "20G0" } ] }"#;
        assert!(serde_json::from_str::<CardDocument>(s).is_err());
    }

    #[test]
    fn encode_file_fields() {
        let f = FileDocument {
            sfi: 0x07,
            lid: Some(0x2010),
            ef_type: Some(0x02),
            data_ref: Some(0x0000),
            rec_size: Some(29),
            rec_size_dec: Some(29),
            num_rec: Some(3),
            num_rec_dec: Some(3),
            access_conditions: Some(AccessConditionsDocument::from(&AccessRuleSet::new(
                [0x1F, 0x10, 0x14, 0x00],
                [0x00, 0x02, 0x03, 0x00],
            ))),
            record_data_list: vec![RecordDocument {
                index: 1,
                value: vec![0xCA, 0xFE],
            }],
        };

        let v = serde_json::to_value(&f).unwrap();

        assert_eq!(v["sfi"], "07");
        assert_eq!(v["lid"], "2010");
        assert_eq!(v["efType"], "02");
        assert_eq!(v["ref"], "0000");
        assert_eq!(v["recSize"], "0029");
        assert_eq!(v["recSizeDec"], 29);
        assert_eq!(v["numRec"], "03");
        assert_eq!(v["accessConditions"]["group1"]["accessCondition"], "10");
        assert_eq!(v["accessConditions"]["group1"]["keyLevel"], "02");
        assert_eq!(v["accessConditions"]["group1"]["description"], "Session2");
        assert_eq!(v["recordDataList"][0]["index"], "01");
        assert_eq!(v["recordDataList"][0]["value"], "CAFE");

        let d: FileDocument = serde_json::from_value(v).unwrap();
        assert_eq!(d, f);
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");

        let d = CardDocument {
            id: Some("20230407_CardData_1.json".to_string()),
            version: Some(DOCUMENT_VERSION),
            traceability: Some(vec![0x01, 0x02]),
            ..Default::default()
        };

        d.save(&path).unwrap();
        assert_eq!(CardDocument::load(&path).unwrap(), d);

        assert!(matches!(
            CardDocument::load(dir.path().join("missing.json")),
            Err(Error::Io(_))
        ));
    }
}
