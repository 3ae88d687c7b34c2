// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Calypso card file structure core
//!
//! This provides file structure [discovery][discovery] for Calypso cards, the
//! [document][document] model used to persist discovered structures, and
//! [verification][verify] of a card against a reference document.
//!
//! Card interactions are performed via the [CardChannel][channel::CardChannel]
//! trait, see [calypso_apdu] for APDU objects and wire encodings.
//!
//! ## Operations
//!
//! ### Discovery
//!
//! [discover][discovery::discover] probes the card for each of the known
//! [AID prefixes][discovery::AID_PREFIXES], collecting every application instance
//! matching each prefix via first / next occurrence selection. For each instance
//! the directory header is read, elementary files are enumerated via first / next
//! EF selection, and records are read where access conditions permit.
//!
//! ### Verification
//!
//! [Verifier][verify::Verifier] compares a (possibly sparse) reference
//! [CardDocument][document::CardDocument] against discovered applications,
//! reporting a [Discrepancy][verify::Discrepancy] for each mismatching field
//! and for shared data references that do not resolve between linked files.
//!

pub use calypso_apdu::{self as apdu};

pub mod access;
pub mod application;
pub mod card;
pub mod channel;
pub mod discovery;
pub mod document;
pub mod file;
pub mod verify;

mod error;
pub use error::{CardError, Error};

#[cfg(test)]
mod mock;
