// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Command line utility for analysing and checking Calypso card file structures

use std::path::PathBuf;

use clap::Parser;
use log::{debug, error, info, LevelFilter};

use calypso_card::{
    analyze_card, check_card, transport::PcscTransport, CardChannel, CardProvider, Connect,
    DEFAULT_READER_PATTERN,
};

/// Calypso card file structure utility
#[derive(Clone, PartialEq, Debug, Parser)]
struct Options {
    /// Regular expression for reader selection (first match is used)
    #[clap(long, default_value = DEFAULT_READER_PATTERN)]
    reader: String,

    /// Subcommand to execute
    #[clap(subcommand)]
    cmd: Actions,

    /// Enable verbose logging
    #[clap(long, default_value = "info")]
    log_level: LevelFilter,
}

#[derive(Clone, PartialEq, Debug, Parser)]
#[non_exhaustive]
enum Actions {
    /// List available readers
    List,

    /// Discover the card structure and write it to a JSON document
    Analyze {
        /// Directory for the card document
        #[clap(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Check the card structure against a reference JSON document
    Check {
        /// Reference document
        reference: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Options::parse();

    // Setup logging
    let _ = simplelog::SimpleLogger::init(args.log_level, simplelog::Config::default());

    // Setup PC/SC context
    let p = CardProvider::new()?;

    // Handle list command
    if args.cmd == Actions::List {
        let readers = p.list_readers()?;
        if readers.is_empty() {
            return Err(anyhow::anyhow!("No readers found"));
        }

        info!("Readers:");
        for (i, r) in readers.iter().enumerate() {
            info!("  {}: {}", i, r);
        }

        return Ok(());
    }

    // Select reader by pattern
    let reader = p.find_reader(&args.reader)?;

    debug!("Using reader: {}", reader);

    // Connect to the card in the selected reader
    let mut t = match Connect::<PcscTransport>::connect(&p, &reader).await {
        Ok(v) => v,
        Err(e) => {
            error!("Failed to connect to card in reader: {}", reader.name);
            return Err(e.into());
        }
    };

    // Execute command
    execute(&mut t, args.cmd).await?;

    Ok(())
}

/// Execute a command against a connected card
async fn execute<C: CardChannel>(t: &mut C, cmd: Actions) -> anyhow::Result<()> {
    debug!("Executing command: {:?}", cmd);

    match cmd {
        Actions::Analyze { output_dir } => {
            if !output_dir.is_dir() {
                return Err(anyhow::anyhow!(
                    "Output directory '{}' does not exist",
                    output_dir.display()
                ));
            }

            if analyze_card(t, &output_dir).await?.is_none() {
                info!("No applications found.");
            }
        }
        Actions::Check { reference } => {
            let findings = check_card(t, &reference).await?;

            debug!("Check complete ({} findings)", findings.len());
        }
        _ => unreachable!(),
    }

    Ok(())
}
