// Copyright (c) 2022-2023 The MobileCoin Foundation

use calypso_card_core::{
    application::ProductType,
    discovery::{discover, AID_PREFIXES},
    file::EfType,
    CardError,
};
use calypso_sim::VirtualCard;

mod helpers;
use helpers::{card, handle, setup, AID_REV2, AID_REV3};

#[tokio::test(flavor = "multi_thread")]
async fn discover_card() -> anyhow::Result<()> {
    setup();

    let mut h = handle(card());
    let s = discover(&mut h, AID_PREFIXES)
        .await?
        .expect("no applications found");

    assert_eq!(s.traceability, vec![0xCA, 0xFE, 0x00, 0x01]);
    assert!(s.id.ends_with("_CardData_12345.json"));

    let aids: Vec<_> = s.applications.iter().map(|a| hex::encode_upper(&a.aid)).collect();
    assert_eq!(aids, vec![AID_REV3, AID_REV2]);

    // Revision 3 application
    let a = &s.applications[0];
    assert_eq!(a.product_type(), ProductType::PrimeRevision3);
    assert_eq!(a.directory.lid, 0x2000);
    assert_eq!(a.directory.kvc, [0x79, 0x7A, 0x7B]);

    let lids: Vec<_> = a.files.iter().map(|f| f.lid).collect();
    assert_eq!(lids, vec![0x2010, 0x2020, 0x2030]);

    // Linear file with free access is read in full
    assert_eq!(a.files[0].ef_type, EfType::Linear);
    assert_eq!(a.files[0].records.len(), 2);
    assert_eq!(a.files[0].records[1].index, 2);
    assert_eq!(a.files[0].records[1].data, vec![0x22; 29]);

    // Binary and confidential files are not read
    assert!(a.files[1].records.is_empty());
    assert!(a.files[2].records.is_empty());

    // Revision 2 application is read with the legacy class
    let b = &s.applications[1];
    assert_eq!(b.product_type(), ProductType::PrimeRevision2);
    assert_eq!(b.files.len(), 1);
    assert_eq!(b.files[0].records[0].data, vec![0x55; 29]);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn discover_with_response_chaining() -> anyhow::Result<()> {
    setup();

    let expected = discover(&mut handle(card()), AID_PREFIXES).await?.unwrap();

    // `61xx` responses and `6Cxx` record length corrections are handled by the handle
    let mut h = handle(card().t0_responses(true).exact_le(true));
    let s = discover(&mut h, AID_PREFIXES).await?.unwrap();

    assert_eq!(s.traceability, expected.traceability);
    assert_eq!(s.applications, expected.applications);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn discover_stops_on_wrap_around() -> anyhow::Result<()> {
    setup();

    let mut h = handle(card().wrap_around(true));
    let s = discover(&mut h, AID_PREFIXES).await?.unwrap();

    assert_eq!(s.applications[0].files.len(), 3);
    assert_eq!(s.applications[1].files.len(), 1);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn discover_keeps_partial_records() -> anyhow::Result<()> {
    setup();

    let mut h = handle(card().fail_read(0x07, 2));
    let s = discover(&mut h, AID_PREFIXES).await?.unwrap();

    let f = &s.applications[0].files[0];
    assert_eq!(f.records.len(), 1);
    assert_eq!(f.records[0].data, vec![0x11; 29]);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn discover_empty_card() -> anyhow::Result<()> {
    setup();

    let mut h = handle(VirtualCard::new(vec![]));
    assert!(discover(&mut h, AID_PREFIXES).await?.is_none());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn discover_card_removed() {
    setup();

    let mut c = card();
    c.remove();

    let r = discover(&mut handle(c), AID_PREFIXES).await;
    assert!(matches!(r, Err(CardError::Transport(_))));
}
