// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Card file structure discovery
//!
//! Discovery walks every application matching a list of AID prefixes,
//! enumerates the elementary files of each instance via first / next EF
//! selection and reads record content where access conditions permit.
//!
//! Selection and read failures are absorbed at the smallest scope (file,
//! application instance, AID prefix), only transport failures are returned.

use chrono::Local;
use const_decoder::Decoder;
use log::{debug, info, warn};
use strum::Display;

use calypso_apdu::{select_application::FileOccurrence, select_file::{EfHeader, SelectFileControl}};

use crate::{
    application::ApplicationStructure,
    card::CardStructure,
    channel::{CardChannel, FileTable},
    file::{FileDescriptor, Record},
    CardError,
};

const AID_GEN_RT_91: [u8; 10] = Decoder::Hex.decode(b"A0000004040125009101");
const AID_GEN_RT_TEST: [u8; 7] = Decoder::Hex.decode(b"A000000291FF91");
const AID_GEN_SV_TEST: [u8; 7] = Decoder::Hex.decode(b"A000000291FF92");
const AID_HOPLINK: [u8; 10] = Decoder::Hex.decode(b"A000000291A000000191");
const AID_NDEF: [u8; 5] = Decoder::Hex.decode(b"D276000085");
const AID_MF: [u8; 5] = Decoder::Hex.decode(b"334D54522E");
const AID_RT: [u8; 5] = Decoder::Hex.decode(b"315449432E");
const AID_SV: [u8; 5] = Decoder::Hex.decode(b"304554502E");
const AID_GEN: [u8; 5] = Decoder::Hex.decode(b"A000000291");

/// AID prefixes probed for traceability and discovery, in order
pub const AID_PREFIXES: &[&[u8]] = &[
    &AID_GEN_RT_91,
    &AID_GEN_RT_TEST,
    &AID_GEN_SV_TEST,
    &AID_HOPLINK,
    &AID_NDEF,
    &AID_MF,
    &AID_RT,
    &AID_SV,
    &AID_GEN,
];

/// Upper bound on instances collected for a single AID prefix
const MAX_OCCURRENCES: usize = 32;

/// File enumeration state
#[derive(Copy, Clone, PartialEq, Debug, Display)]
enum EnumState {
    /// No file selected
    Empty,
    /// First EF selected
    HasFirst,
    /// Subsequent EF selected, table holds N files
    HasNext(usize),
    /// Enumeration complete
    Done,
}

/// Enumerate the elementary files of the selected application
///
/// Each successful next EF selection must grow the file table by exactly one
/// entry, otherwise the reader has wrapped around and enumeration stops.
pub async fn enumerate_files<C: CardChannel + ?Sized>(
    channel: &mut C,
    mut table: FileTable,
) -> Result<FileTable, CardError> {
    let mut state = EnumState::Empty;

    loop {
        let (control, expected) = match state {
            EnumState::Empty => (SelectFileControl::FirstEf, 1),
            EnumState::HasFirst | EnumState::HasNext(_) => {
                (SelectFileControl::NextEf, table.len() + 1)
            }
            EnumState::Done => break,
        };

        state = match channel.select_file(control, &table).await {
            Ok(t) => {
                let n = t.len();
                table = t;

                match (state, n == expected) {
                    (EnumState::Empty, true) => EnumState::HasFirst,
                    (_, true) => EnumState::HasNext(n),
                    (_, false) => {
                        debug!("File table size {} (expected {}), stopping", n, expected);
                        EnumState::Done
                    }
                }
            }
            Err(e) if e.is_recoverable() => {
                debug!("{} selection failed: {}", control, e);
                EnumState::Done
            }
            Err(e) => return Err(e),
        };

        debug!("Enumeration state: {}", state);
    }

    Ok(table)
}

/// Build a file descriptor, reading record content where permitted
///
/// A failed record read stops reading that file, records already read are kept.
pub async fn read_file<C: CardChannel + ?Sized>(
    channel: &mut C,
    header: &EfHeader,
) -> Result<FileDescriptor, CardError> {
    let mut file = FileDescriptor::from(header);

    if !file.is_readable() {
        debug!("Skipping content for file {:04X} (SFI {:02X})", file.lid, file.sfi);
        return Ok(file);
    }

    for index in 1..=file.record_count {
        match channel.read_record(file.sfi, index).await {
            Ok(data) => file.records.push(Record { index, data }),
            Err(e) if e.is_recoverable() => {
                warn!(
                    "Failed to read record {} of file {:04X} (SFI {:02X}): {}",
                    index, file.lid, file.sfi, e
                );
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(file)
}

/// Select an application by AID and read its complete structure
///
/// Returns `None` where the application or its directory cannot be selected.
pub async fn read_application<C: CardChannel + ?Sized>(
    channel: &mut C,
    aid: &[u8],
) -> Result<Option<ApplicationStructure>, CardError> {
    let selected = match channel.select_application(aid, FileOccurrence::First).await {
        Ok(s) => s,
        Err(e) if e.is_recoverable() => {
            warn!("Failed to select application {}: {}", hex::encode_upper(aid), e);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let table = match channel
        .select_file(SelectFileControl::CurrentDf, &FileTable::new())
        .await
    {
        Ok(t) => t,
        Err(e) if e.is_recoverable() => {
            warn!("Failed to select DF for {}: {}", hex::encode_upper(aid), e);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let directory = match table.directory() {
        Some(d) => *d,
        None => {
            warn!("No directory header for {}", hex::encode_upper(aid));
            return Ok(None);
        }
    };

    let table = enumerate_files(channel, table).await?;

    let mut app = ApplicationStructure::new(selected.response, &selected.fci, directory);
    for h in table.files() {
        app.files.push(read_file(channel, h).await?);
    }

    debug!(
        "Read application {} ({} files)",
        hex::encode_upper(&app.aid),
        app.files.len()
    );

    Ok(Some(app))
}

/// Read every application instance matching an AID prefix
///
/// Instance AIDs are collected first via first / next occurrence selection,
/// each instance is then re-selected by full AID and read.
pub async fn walk_applications<C: CardChannel + ?Sized>(
    channel: &mut C,
    prefix: &[u8],
) -> Result<Vec<ApplicationStructure>, CardError> {
    let mut aids = vec![];
    let mut occurrence = FileOccurrence::First;

    while aids.len() < MAX_OCCURRENCES {
        match channel.select_application(prefix, occurrence).await {
            Ok(s) => aids.push(s.fci.df_name),
            Err(e) if e.is_recoverable() => break,
            Err(e) => return Err(e),
        }
        occurrence = FileOccurrence::Next;
    }

    debug!(
        "Found {} instance(s) for AID prefix {}",
        aids.len(),
        hex::encode_upper(prefix)
    );

    let mut apps = Vec::with_capacity(aids.len());
    for aid in &aids {
        if let Some(a) = read_application(channel, aid).await? {
            apps.push(a);
        }
    }

    Ok(apps)
}

/// Fetch the card traceability marker
///
/// Prefixes are probed in order. Returns the marker from the first application
/// providing one, an empty marker where applications were selected but none
/// provided the tag, or `None` where no application could be selected.
pub async fn read_traceability<C: CardChannel + ?Sized>(
    channel: &mut C,
    prefixes: &[&[u8]],
) -> Result<Option<Vec<u8>>, CardError> {
    let mut selected = false;

    for prefix in prefixes {
        match channel.select_application(prefix, FileOccurrence::First).await {
            Ok(_) => selected = true,
            Err(e) if e.is_recoverable() => continue,
            Err(e) => return Err(e),
        }

        match channel.get_traceability().await {
            Ok(v) => return Ok(Some(v)),
            Err(e) if e.is_recoverable() => {
                warn!("Traceability information tag not available: {}", e);
            }
            Err(e) => return Err(e),
        }
    }

    match selected {
        true => Ok(Some(vec![])),
        false => Ok(None),
    }
}

/// Discover the complete card structure
///
/// Returns `None` where no application is found on the card.
pub async fn discover<C: CardChannel + ?Sized>(
    channel: &mut C,
    prefixes: &[&[u8]],
) -> Result<Option<CardStructure>, CardError> {
    let traceability = match read_traceability(channel, prefixes).await? {
        Some(v) => v,
        None => {
            info!("No applications found.");
            return Ok(None);
        }
    };

    let mut apps = vec![];
    for prefix in prefixes {
        apps.extend(walk_applications(channel, prefix).await?);
    }

    if apps.is_empty() {
        info!("No applications found.");
        return Ok(None);
    }

    Ok(Some(CardStructure::new(traceability, apps, Local::now())))
}

#[cfg(test)]
mod test {
    use calypso_apdu::select_file::EF_TYPE_BINARY;

    use super::*;
    use crate::mock::{aid, ef, MockApplication, MockCard};

    #[tokio::test]
    async fn enumerate_stops_on_wrap_around() {
        let app = MockApplication::new(aid("A000000291"), 1)
            .with_file(ef(0x07, 0x2010, 0x02, 0x1F, 1), vec![])
            .with_file(ef(0x08, 0x2020, 0x02, 0x1F, 1), vec![])
            .with_file(ef(0x09, 0x2030, 0x02, 0x1F, 1), vec![]);

        // Reader wraps to the first EF, table sizes 1, 2, 3, 3
        let mut card = MockCard::new(vec![app]).wrap_around(true);
        card.select_application(&aid("A000000291"), FileOccurrence::First)
            .await
            .unwrap();

        let t = enumerate_files(&mut card, FileTable::new()).await.unwrap();

        assert_eq!(t.len(), 3);
        assert_eq!(card.table_sizes, vec![1, 2, 3, 3]);
    }

    #[tokio::test]
    async fn enumerate_stops_on_failure() {
        let app = MockApplication::new(aid("A000000291"), 1)
            .with_file(ef(0x07, 0x2010, 0x02, 0x1F, 1), vec![])
            .with_file(ef(0x08, 0x2020, 0x02, 0x1F, 1), vec![]);

        let mut card = MockCard::new(vec![app]);
        card.select_application(&aid("A000000291"), FileOccurrence::First)
            .await
            .unwrap();

        let t = enumerate_files(&mut card, FileTable::new()).await.unwrap();
        assert_eq!(t.len(), 2);
    }

    #[tokio::test]
    async fn enumerate_empty_application() {
        let mut card = MockCard::new(vec![MockApplication::new(aid("A000000291"), 1)]);
        card.select_application(&aid("A000000291"), FileOccurrence::First)
            .await
            .unwrap();

        let t = enumerate_files(&mut card, FileTable::new()).await.unwrap();
        assert!(t.is_empty());
    }

    #[tokio::test]
    async fn read_policy_attempts() {
        let tests = [
            // (ef type, ac0, sfi, expected attempts)
            (0x02, 0x1F, 0x07, 3),
            (0x04, 0x10, 0x07, 3),
            (EF_TYPE_BINARY, 0x1F, 0x07, 0),
            (0x02, 0x01, 0x07, 0),
            (0x02, 0x14, 0x07, 0),
            (0x02, 0x15, 0x07, 0),
            (0x02, 0x1F, 0x00, 0),
        ];

        for (ef_type, ac0, sfi, attempts) in tests {
            let h = ef(sfi, 0x2010, ef_type, ac0, 3);
            let app = MockApplication::new(aid("A000000291"), 1)
                .with_file(h, vec![vec![0x01], vec![0x02], vec![0x03]]);

            let mut card = MockCard::new(vec![app]);
            card.select_application(&aid("A000000291"), FileOccurrence::First)
                .await
                .unwrap();

            let f = read_file(&mut card, &h).await.unwrap();

            assert_eq!(card.reads.len(), attempts, "type {ef_type:02x} ac {ac0:02x} sfi {sfi:02x}");
            assert_eq!(f.records.len(), attempts);
        }
    }

    #[tokio::test]
    async fn read_failure_keeps_records() {
        let h = ef(0x07, 0x2010, 0x02, 0x1F, 4);
        let app = MockApplication::new(aid("A000000291"), 1)
            .with_file(h, vec![vec![0x01], vec![0x02], vec![0x03], vec![0x04]]);

        let mut card = MockCard::new(vec![app]).fail_read(0x07, 3);
        card.select_application(&aid("A000000291"), FileOccurrence::First)
            .await
            .unwrap();

        let f = read_file(&mut card, &h).await.unwrap();

        assert_eq!(card.reads, vec![(0x07, 1), (0x07, 2), (0x07, 3)]);
        assert_eq!(
            f.records,
            vec![
                Record { index: 1, data: vec![0x01] },
                Record { index: 2, data: vec![0x02] },
            ]
        );
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let h = ef(0x07, 0x2010, 0x02, 0x1F, 2);
        let app = MockApplication::new(aid("A000000291"), 1).with_file(h, vec![vec![0x01]; 2]);

        let mut card = MockCard::new(vec![app]);
        card.select_application(&aid("A000000291"), FileOccurrence::First)
            .await
            .unwrap();
        card.disconnect();

        assert!(matches!(
            read_file(&mut card, &h).await,
            Err(CardError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn walk_multiple_instances() {
        let apps = vec![
            MockApplication::new(aid("A000000291A00000019101"), 1)
                .with_file(ef(0x07, 0x2010, 0x02, 0x1F, 1), vec![vec![0xAA]]),
            MockApplication::new(aid("315449432E494341"), 2),
            MockApplication::new(aid("A000000291A00000019102"), 3),
        ];

        let mut card = MockCard::new(apps);

        let found = walk_applications(&mut card, &aid("A000000291")).await.unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].aid, aid("A000000291A00000019101"));
        assert_eq!(found[0].files.len(), 1);
        assert_eq!(found[0].files[0].records.len(), 1);
        assert_eq!(found[1].aid, aid("A000000291A00000019102"));
        assert_eq!(found[1].serial_number_value(), 3);

        let none = walk_applications(&mut card, &aid("D276000085")).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn traceability_probe() {
        // No applications
        let mut card = MockCard::new(vec![]);
        assert_eq!(read_traceability(&mut card, AID_PREFIXES).await.unwrap(), None);

        // Application without traceability tag
        let mut card = MockCard::new(vec![MockApplication::new(aid("315449432E494341"), 1)]);
        assert_eq!(
            read_traceability(&mut card, AID_PREFIXES).await.unwrap(),
            Some(vec![])
        );

        // Application with traceability tag
        let mut card = MockCard::new(vec![MockApplication::new(aid("315449432E494341"), 1)])
            .with_traceability(vec![0xCA, 0xFE]);
        assert_eq!(
            read_traceability(&mut card, AID_PREFIXES).await.unwrap(),
            Some(vec![0xCA, 0xFE])
        );
    }

    #[tokio::test]
    async fn discover_card() {
        let apps = vec![
            MockApplication::new(aid("315449432E494341"), 0x1234)
                .with_file(ef(0x07, 0x2010, 0x02, 0x1F, 2), vec![vec![0x01], vec![0x02]])
                .with_file(ef(0x1D, 0x2F10, 0x02, 0x14, 1), vec![vec![0x03]]),
        ];

        let mut card = MockCard::new(apps).with_traceability(vec![0x01, 0x02]);

        let s = discover(&mut card, AID_PREFIXES).await.unwrap().unwrap();

        assert_eq!(s.traceability, vec![0x01, 0x02]);
        assert_eq!(s.applications.len(), 1);
        assert!(s.id.ends_with("_CardData_4660.json"));

        let a = &s.applications[0];
        assert_eq!(a.files.len(), 2);
        assert_eq!(a.files[0].records.len(), 2);
        assert!(a.files[1].records.is_empty());
        assert!(a.has_distinct_sfis());

        // Nothing found
        let mut card = MockCard::new(vec![]);
        assert_eq!(discover(&mut card, AID_PREFIXES).await.unwrap(), None);
    }
}
