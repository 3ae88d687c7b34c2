// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Card channel abstractions
//!
//! [Exchange] moves raw APDUs to and from a card, [CardChannel] provides the
//! selection and read primitives used by discovery. Calls are strictly
//! sequential, each selection changes the card state the next call depends on.

use async_trait::async_trait;

use calypso_apdu::{
    select_application::{ApplicationFci, FileOccurrence},
    select_file::{DirectoryHeader, EfHeader, FileHeader, SelectFileControl},
};

use crate::CardError;

/// Raw APDU exchange with a card
#[async_trait]
pub trait Exchange {
    /// Send a command APDU and return the raw response (data and status word)
    async fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>, CardError>;
}

/// Result of a successful application selection
#[derive(Clone, PartialEq, Debug)]
pub struct SelectedApplication {
    /// Raw select application response
    pub response: Vec<u8>,
    /// Decoded FCI
    pub fci: ApplicationFci,
    /// Application was selected with the invalidated status (`6283`)
    pub invalidated: bool,
}

/// Headers collected through file selection for the current application
///
/// Threaded explicitly through [CardChannel::select_file], each call returns
/// a table updated with the selected header.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct FileTable {
    directory: Option<DirectoryHeader>,
    files: Vec<EfHeader>,
}

impl FileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of elementary files in the table
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Directory header, where the current DF has been selected
    pub fn directory(&self) -> Option<&DirectoryHeader> {
        self.directory.as_ref()
    }

    /// Elementary file headers in selection order
    pub fn files(&self) -> &[EfHeader] {
        &self.files
    }

    /// Return the table updated with a newly selected header
    ///
    /// Directory headers replace the directory slot, EF headers replace an
    /// entry with the same SFI (or the same LID where the SFI is zero) and
    /// are otherwise appended.
    pub fn update(mut self, header: FileHeader) -> Self {
        match header {
            FileHeader::Directory(d) => self.directory = Some(d),
            FileHeader::Elementary(e) => {
                let existing = self.files.iter_mut().find(|f| match e.sfi {
                    0 => f.sfi == 0 && f.lid == e.lid,
                    sfi => f.sfi == sfi,
                });

                match existing {
                    Some(f) => *f = e,
                    None => self.files.push(e),
                }
            }
        }

        self
    }
}

/// Card primitives consumed by discovery
#[async_trait]
pub trait CardChannel: Send {
    /// Select an application by full AID or AID prefix
    async fn select_application(
        &mut self,
        aid: &[u8],
        occurrence: FileOccurrence,
    ) -> Result<SelectedApplication, CardError>;

    /// Select a file relative to the current selection, returning the updated table
    async fn select_file(
        &mut self,
        control: SelectFileControl,
        table: &FileTable,
    ) -> Result<FileTable, CardError>;

    /// Read a single record from the file with the provided SFI
    async fn read_record(&mut self, sfi: u8, index: u8) -> Result<Vec<u8>, CardError>;

    /// Fetch traceability information for the selected application
    async fn get_traceability(&mut self) -> Result<Vec<u8>, CardError>;
}

#[cfg(test)]
mod test {
    use super::*;

    fn ef(sfi: u8, lid: u16) -> FileHeader {
        FileHeader::Elementary(EfHeader {
            sfi,
            lid,
            ..Default::default()
        })
    }

    #[test]
    fn table_update() {
        let t = FileTable::new()
            .update(FileHeader::Directory(DirectoryHeader {
                lid: 0x2000,
                ..Default::default()
            }))
            .update(ef(0x07, 0x2010))
            .update(ef(0x08, 0x2020));

        assert_eq!(t.len(), 2);
        assert_eq!(t.directory().map(|d| d.lid), Some(0x2000));

        // Re-selection of a known file does not grow the table
        let t = t.update(ef(0x07, 0x2010));
        assert_eq!(t.len(), 2);

        // Files without SFI are keyed by LID
        let t = t.update(ef(0x00, 0x2F10)).update(ef(0x00, 0x2F11));
        assert_eq!(t.len(), 4);
        let t = t.update(ef(0x00, 0x2F10));
        assert_eq!(t.len(), 4);

        assert_eq!(
            t.files().iter().map(|f| f.lid).collect::<Vec<_>>(),
            vec![0x2010, 0x2020, 0x2F10, 0x2F11]
        );
    }
}
