// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Calypso Card File Structure Library (and CLI)
//!
//! Connects to cards through PC/SC readers, discovers application and file
//! structures and verifies them against reference documents.
//!

use std::{
    fmt::Debug,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use log::{debug, info};

pub use calypso_card_core::channel::{CardChannel, Exchange};

/// Re-export `calypso-apdu` for consumers
pub use calypso_apdu::{self as apdu};

use calypso_card_core::{
    discovery::{discover, AID_PREFIXES},
    document::CardDocument,
    verify::{verify_card, Discrepancy},
};

/// Re-export transports for consumer use
#[cfg(feature = "transport_pcsc")]
pub mod transport;
#[cfg(feature = "transport_pcsc")]
use transport::PcscTransport;

mod handle;
pub use handle::CardHandle;

mod error;
pub use error::Error;

pub mod report;

/// Default reader selection pattern
pub const DEFAULT_READER_PATTERN: &str = ".*(ASK.*|Identiv.*2|ACS ACR122U|SCR3310).*";

/// Card presence in a reader
#[derive(Copy, Clone, Debug, PartialEq, strum::Display)]
pub enum CardPresence {
    Present,
    Empty,
    Unknown,
}

/// Reader information for listing, used by connect
#[derive(Clone, Debug, PartialEq)]
pub struct ReaderInfo {
    pub name: String,
    pub card: CardPresence,
}

impl std::fmt::Display for ReaderInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:48} (card: {})", self.name, self.card)
    }
}

/// Select the first reader whose name matches the provided pattern
pub fn match_reader<'a>(readers: &'a [ReaderInfo], pattern: &str) -> Result<&'a ReaderInfo, Error> {
    let r = regex::Regex::new(pattern)?;

    readers
        .iter()
        .find(|i| r.is_match(&i.name))
        .ok_or_else(|| Error::ReaderNotFound(pattern.to_string()))
}

/// Card provider manages PC/SC readers and connections
#[cfg(feature = "transport_pcsc")]
pub struct CardProvider {
    ctx: pcsc::Context,
}

#[cfg(feature = "transport_pcsc")]
impl CardProvider {
    /// Create a new card provider, establishing a PC/SC context
    pub fn new() -> Result<Self, Error> {
        let ctx = pcsc::Context::establish(pcsc::Scope::User)?;

        Ok(Self { ctx })
    }

    /// List available readers
    pub fn list_readers(&self) -> Result<Vec<ReaderInfo>, Error> {
        let names = match self.ctx.list_readers_owned() {
            Ok(v) => v,
            Err(pcsc::Error::NoReadersAvailable) => vec![],
            Err(e) => return Err(e.into()),
        };

        // Query current reader states without waiting
        let mut states: Vec<_> = names
            .into_iter()
            .map(|n| pcsc::ReaderState::new(n, pcsc::State::UNAWARE))
            .collect();

        if !states.is_empty() {
            self.ctx
                .get_status_change(std::time::Duration::ZERO, &mut states)?;
        }

        let readers: Vec<_> = states
            .iter()
            .map(|s| {
                let e = s.event_state();
                let card = if e.contains(pcsc::State::PRESENT) {
                    CardPresence::Present
                } else if e.contains(pcsc::State::EMPTY) {
                    CardPresence::Empty
                } else {
                    CardPresence::Unknown
                };

                ReaderInfo {
                    name: s.name().to_string_lossy().to_string(),
                    card,
                }
            })
            .collect();

        debug!("Found {} readers: {:?}", readers.len(), readers);

        Ok(readers)
    }

    /// Find the first reader matching the provided pattern
    pub fn find_reader(&self, pattern: &str) -> Result<ReaderInfo, Error> {
        let readers = self.list_readers()?;

        match_reader(&readers, pattern).cloned()
    }
}

/// Connect trait for supported transports
#[async_trait]
pub trait Connect<T: Exchange> {
    type Options: Debug;

    /// Connect to the card in the specified reader
    async fn connect(&self, opts: &Self::Options) -> Result<CardHandle<T>, Error>;
}

/// Connect implementation for PC/SC readers
#[cfg(feature = "transport_pcsc")]
#[async_trait]
impl Connect<PcscTransport> for CardProvider {
    type Options = ReaderInfo;

    async fn connect(&self, opts: &Self::Options) -> Result<CardHandle<PcscTransport>, Error> {
        let name = std::ffi::CString::new(opts.name.as_str())
            .map_err(|_| Error::ReaderNotFound(opts.name.clone()))?;

        // Connect to card, the channel stays open until the handle is dropped
        let card = match self
            .ctx
            .connect(&name, pcsc::ShareMode::Shared, pcsc::Protocols::ANY)
        {
            Ok(c) => c,
            Err(pcsc::Error::NoSmartcard) | Err(pcsc::Error::RemovedCard) => {
                return Err(Error::NoCard(opts.name.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(CardHandle::from(PcscTransport::new(card, &opts.name)))
    }
}

/// Discover the card structure and write it to a document in `output_dir`
///
/// Returns the document path, or `None` where no application is found.
pub async fn analyze_card<C: CardChannel>(
    channel: &mut C,
    output_dir: &Path,
) -> Result<Option<PathBuf>, Error> {
    let s = match discover(channel, AID_PREFIXES).await? {
        Some(s) => s,
        None => return Ok(None),
    };

    let d = CardDocument::from(&s);
    report::log_card(&d);

    let path = output_dir.join(&s.id);
    d.save(&path)?;

    info!("Card structure written to '{}'", path.display());

    Ok(Some(path))
}

/// Verify the card against the reference document at `reference`
///
/// Each discrepancy is logged, an empty result is a clean run.
pub async fn check_card<C: CardChannel>(
    channel: &mut C,
    reference: &Path,
) -> Result<Vec<Discrepancy>, Error> {
    let d = CardDocument::load(reference)?;

    info!(
        "Checking card against '{}' ({} application(s))",
        reference.display(),
        d.application_list.len()
    );

    let findings = verify_card(channel, &d).await?;

    report::log_discrepancies(&findings);

    Ok(findings)
}
