// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Operator-facing structure and discrepancy reports, written to the log

use log::{debug, info};

use calypso_card_core::{
    access::AccessRule,
    document::{
        AccessConditionsDocument, ApplicationDocument, CardDocument, FileDocument, HexField,
    },
    file::EfType,
    verify::Discrepancy,
};

const SEPARATOR_LINE: &str = "========================================================================================================";

const FILE_SEPARATOR_LINE: &str = "----------------------------------------------------------";

fn hex<T: HexField>(v: &Option<T>) -> String {
    v.as_ref()
        .map(|v| v.encode_hex())
        .unwrap_or_else(|| "--".to_string())
}

fn opt<T: ToString>(v: &Option<T>) -> String {
    v.as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "--".to_string())
}

/// Short access rule names for each group
fn group_names(a: Option<&AccessConditionsDocument>) -> [String; 4] {
    let groups = a.map(|a| a.groups()).unwrap_or_default();

    groups.map(|g| {
        g.map(|g| {
            AccessRule::decode(
                g.access_condition.unwrap_or_default(),
                g.key_level.unwrap_or_default(),
            )
            .short_name()
        })
        .unwrap_or_else(|| "--".to_string())
    })
}

/// Render a card document as report lines
pub fn card_lines(d: &CardDocument) -> Vec<String> {
    let mut lines = vec![
        SEPARATOR_LINE.to_string(),
        format!("= Id:: {}", opt(&d.id)),
        format!("= Date:: {}", opt(&d.date)),
        format!("= Version:: {:03}", d.version.unwrap_or_default()),
        format!("= Software:: {}", opt(&d.software)),
        format!("= Traceability:: {}", hex(&d.traceability)),
    ];

    for a in &d.application_list {
        lines.extend(application_lines(a));
    }

    lines.push(SEPARATOR_LINE.to_string());

    lines
}

/// Render an application as report lines
pub fn application_lines(a: &ApplicationDocument) -> Vec<String> {
    let [g0, g1, g2, g3] = group_names(a.access_conditions.as_ref());

    let mut lines = vec![
        SEPARATOR_LINE.to_string(),
        "| AID                             | LID  | KVC1 | KVC2 | KVC3 | KIF1 | KIF2 | KIF3 | G0 | G1 | G2 | G3 |".to_string(),
        format!(
            "|{:>32} | {} |  {}  |  {}  |  {}  |  {}  |  {}  |  {}  | {} | {} | {} | {} |",
            hex(&a.aid),
            hex(&a.lid),
            hex(&a.kvc1),
            hex(&a.kvc2),
            hex(&a.kvc3),
            hex(&a.kif1),
            hex(&a.kif2),
            hex(&a.kif3),
            g0,
            g1,
            g2,
            g3
        ),
        SEPARATOR_LINE.to_string(),
        format!("= FCI:: {}", hex(&a.fci)),
        format!("= Serial Number:: {} ({})", hex(&a.csn), opt(&a.csn_dec)),
        format!("= Transaction Counter:: {}", opt(&a.transaction_counter_dec)),
        format!("= Revision:: {}", opt(&a.calypso_revision)),
        format!("= Session Buffer Size:: {} bytes", opt(&a.buffer_size)),
        format!("= Platform (Chip Type):: {}", hex(&a.platform)),
    ];

    match &a.issuer {
        Some(i) => lines.push(format!("= Issuer:: {} ({})", opt(&i.name), hex(&i.value))),
        None => lines.push("= Issuer:: --".to_string()),
    }

    lines.extend([
        format!("= Software Version:: {}.{}", opt(&a.version), opt(&a.revision)),
        format!("= Application Type:: {}", hex(&a.application_type)),
        format!("= Application Subtype:: {}", hex(&a.application_subtype)),
        format!("= DF Status:: {}", hex(&a.status)),
        SEPARATOR_LINE.to_string(),
        "| LID  | Type | SID | #R | Size | G0 | G1 | G2 | G3 | DRef |".to_string(),
        FILE_SEPARATOR_LINE.to_string(),
    ]);

    for f in a.file_list.iter().flatten() {
        lines.extend(file_lines(f));
    }

    lines
}

/// Render a file and its records as report lines
pub fn file_lines(f: &FileDocument) -> Vec<String> {
    let [g0, g1, g2, g3] = group_names(f.access_conditions.as_ref());
    let ef_type = f.ef_type.map(EfType::from).unwrap_or(EfType::Unknown);

    let mut lines = vec![format!(
        "| {} | {} | {}  | {:02} | {:04} | {} | {} | {} | {}| {} |",
        hex(&f.lid),
        ef_type.short_name(),
        f.sfi.encode_hex(),
        f.num_rec.unwrap_or_default(),
        f.rec_size.unwrap_or_default(),
        g0,
        g1,
        g2,
        g3,
        hex(&f.data_ref)
    )];

    for r in &f.record_data_list {
        lines.push(format!("+ #{}:{}", r.index, r.value.encode_hex()));
    }

    lines
}

/// Log a card document
pub fn log_card(d: &CardDocument) {
    for l in card_lines(d) {
        info!("{}", l);
    }
}

/// Log verification findings
pub fn log_discrepancies(findings: &[Discrepancy]) {
    if findings.is_empty() {
        debug!("No discrepancies found");
        return;
    }

    for d in findings {
        info!("{}", d);
    }

    info!("{} discrepancies found", findings.len());
}

#[cfg(test)]
mod test {
    use super::*;

    fn document() -> CardDocument {
        serde_json::from_str(
            r#"{
                "id": "20230407_CardData_4660.json",
                "version": 2,
                "traceability": "CAFE",
                "applicationList": [ {
                    "aid": "A000000291",
                    "lid": "2000",
                    "kvc1": "79",
                    "accessConditions": { "group0": { "accessCondition": "10", "keyLevel": "01" } },
                    "fileList": [ {
                        "sfi": "07", "lid": "2010", "efType": "02", "recSize": "0029", "numRec": "02",
                        "ref": "0000",
                        "accessConditions": {
                            "group0": { "accessCondition": "1F", "keyLevel": "00" },
                            "group1": { "accessCondition": "14", "keyLevel": "03" }
                        },
                        "recordDataList": [ { "index": "01", "value": "AABB" } ]
                    } ]
                } ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn card_report() {
        let lines = card_lines(&document());

        assert_eq!(lines[1], "= Id:: 20230407_CardData_4660.json");
        assert_eq!(lines[3], "= Version:: 002");
        assert_eq!(lines[5], "= Traceability:: CAFE");
        assert_eq!(lines.last().map(String::as_str), Some(SEPARATOR_LINE));
    }

    #[test]
    fn application_report() {
        let d = document();
        let lines = application_lines(&d.application_list[0]);

        assert_eq!(
            lines[2],
            "|                      A000000291 | 2000 |  79  |  --  |  --  |  --  |  --  |  --  | S1 | -- | -- | -- |"
        );
        assert!(lines.contains(&"= Issuer:: --".to_string()));
    }

    #[test]
    fn file_report() {
        let d = document();
        let f = &d.application_list[0].file_list.as_ref().unwrap()[0];

        assert_eq!(
            file_lines(f),
            vec![
                "| 2010 | Lin  | 07  | 02 | 0029 | AA | C3 | -- | --| 0000 |".to_string(),
                "+ #1:AABB".to_string(),
            ]
        );
    }
}
