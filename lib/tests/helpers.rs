// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::str::FromStr;

use log::LevelFilter;
use simplelog::SimpleLogger;

use calypso_apdu::{
    select_application::StartupInfo,
    select_file::{DirectoryHeader, EfHeader, EF_TYPE_BINARY, EF_TYPE_LINEAR},
};
use calypso_card::CardHandle;
use calypso_sim::{VirtualApplication, VirtualCard};

/// Revision 3 application with linear, binary and protected files
pub const AID_REV3: &str = "A0000002910A01";

/// Revision 2 application, file commands use the legacy class
pub const AID_REV2: &str = "A0000002910A02";

// Setup logging for tests
pub fn setup() {
    let log_level = match std::env::var("LOG_LEVEL").map(|v| LevelFilter::from_str(&v)) {
        Ok(Ok(l)) => l,
        _ => LevelFilter::Debug,
    };

    let _ = SimpleLogger::init(log_level, simplelog::Config::default());
}

/// Wrap a virtual card in a handle
pub fn handle(card: VirtualCard) -> CardHandle<VirtualCard> {
    CardHandle::from(card)
}

fn startup(application_type: u8) -> StartupInfo {
    StartupInfo {
        session_modification: 0x0A,
        platform: 0x3C,
        application_type,
        application_subtype: 0x11,
        software_issuer: 0x00,
        software_version: 0x02,
        software_revision: 0x01,
    }
}

#[allow(unused)]
pub fn ef(sfi: u8, lid: u16, ef_type: u8, ac0: u8, record_count: u8) -> EfHeader {
    EfHeader {
        sfi,
        lid,
        ef_type,
        record_size: 29,
        record_count,
        access_conditions: [ac0, 0x10, 0x14, 0x00],
        key_levels: [0x00, 0x01, 0x03, 0x00],
        shared_reference: 0,
    }
}

/// Two application card with a traceability marker
pub fn card() -> VirtualCard {
    let rev3 = VirtualApplication::new(
        &hex::decode(AID_REV3).unwrap(),
        [0, 0, 0, 0, 0, 0, 0x30, 0x39],
        startup(0x23),
        DirectoryHeader {
            lid: 0x2000,
            access_conditions: [0x1F, 0x10, 0x10, 0x10],
            key_levels: [0x00, 0x01, 0x02, 0x03],
            status: 0x00,
            kvc: [0x79, 0x7A, 0x7B],
            kif: [0x21, 0x27, 0x30],
        },
    )
    .with_file(
        ef(0x07, 0x2010, EF_TYPE_LINEAR, 0x1F, 2),
        vec![vec![0x11; 29], vec![0x22; 29]],
    )
    .with_file(ef(0x08, 0x2020, EF_TYPE_BINARY, 0x1F, 1), vec![vec![0x33; 29]])
    .with_file(ef(0x09, 0x2030, EF_TYPE_LINEAR, 0x14, 1), vec![vec![0x44; 29]]);

    let rev2 = VirtualApplication::new(
        &hex::decode(AID_REV2).unwrap(),
        [0, 0, 0, 0, 0, 0, 0x30, 0x3A],
        startup(0x06),
        DirectoryHeader {
            lid: 0x3000,
            ..Default::default()
        },
    )
    .with_file(ef(0x1D, 0x3010, EF_TYPE_LINEAR, 0x1F, 1), vec![vec![0x55; 29]]);

    VirtualCard::new(vec![rev3, rev2]).with_traceability(vec![0xCA, 0xFE, 0x00, 0x01])
}
