// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Cross-file shared reference resolution
//!
//! Files with a shared data reference are expected to pair up: file A names
//! file B as its linked file, file B names file A, and both must report the
//! same reference value. Pairing is order independent, either file may be
//! visited first, and spans every application checked in a verification run.

use std::collections::HashMap;

/// Shared reference expectation for a single file
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FileReference {
    /// LID of the file holding the reference
    pub lid: u16,
    /// LID of the file this one should be linked with
    pub linked_lid: u16,
    /// Reference value read from the card
    pub value: u16,
    /// Set once a matching counterpart has been found
    pub resolved: bool,
}

impl FileReference {
    pub fn new(lid: u16, linked_lid: u16, value: u16) -> Self {
        Self {
            lid,
            linked_lid,
            value,
            resolved: false,
        }
    }
}

/// Outcome of adding a reference to the resolver
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Resolution {
    /// Counterpart found with a matching value, both entries are resolved
    Resolved(FileReference),
    /// Counterpart found with a different value, left unresolved
    Mismatch(FileReference),
    /// No counterpart yet, the reference is pending
    Pending,
}

/// Accumulates file references across a verification run
#[derive(Clone, Debug, Default)]
pub struct ReferenceResolver {
    entries: Vec<FileReference>,
    /// Entry indices keyed by linked LID, in insertion order
    by_linked: HashMap<u16, Vec<usize>>,
}

impl ReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reference, pairing it with the first unresolved entry linked to its LID
    ///
    /// Paired references are not stored. On a value mismatch the counterpart
    /// stays unresolved.
    pub fn add(&mut self, r: FileReference) -> Resolution {
        let counterpart = self.by_linked.get(&r.lid).and_then(|v| {
            v.iter()
                .copied()
                .find(|i| !self.entries[*i].resolved)
        });

        if let Some(i) = counterpart {
            let e = &mut self.entries[i];

            if e.value != r.value {
                return Resolution::Mismatch(e.clone());
            }

            e.resolved = true;
            return Resolution::Resolved(e.clone());
        }

        self.by_linked
            .entry(r.linked_lid)
            .or_default()
            .push(self.entries.len());
        self.entries.push(r);

        Resolution::Pending
    }

    /// References without a matching counterpart, in insertion order
    pub fn unresolved(&self) -> impl Iterator<Item = &FileReference> {
        self.entries.iter().filter(|e| !e.resolved)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn symmetric_pair() {
        let mut r = ReferenceResolver::new();

        assert_eq!(r.add(FileReference::new(0x2010, 0x2020, 0x1234)), Resolution::Pending);
        assert!(matches!(
            r.add(FileReference::new(0x2020, 0x2010, 0x1234)),
            Resolution::Resolved(FileReference { lid: 0x2010, .. })
        ));

        assert_eq!(r.unresolved().count(), 0);
    }

    #[test]
    fn order_independent() {
        let mut a = ReferenceResolver::new();
        a.add(FileReference::new(0x2010, 0x2020, 0x1234));
        a.add(FileReference::new(0x2020, 0x2010, 0x1234));

        let mut b = ReferenceResolver::new();
        b.add(FileReference::new(0x2020, 0x2010, 0x1234));
        b.add(FileReference::new(0x2010, 0x2020, 0x1234));

        assert_eq!(a.unresolved().count(), 0);
        assert_eq!(b.unresolved().count(), 0);
    }

    #[test]
    fn missing_counterpart() {
        let mut r = ReferenceResolver::new();
        r.add(FileReference::new(0x2010, 0x2020, 0x1234));

        let u: Vec<_> = r.unresolved().collect();
        assert_eq!(u.len(), 1);
        assert_eq!(u[0].lid, 0x2010);
        assert_eq!(u[0].linked_lid, 0x2020);
    }

    #[test]
    fn value_mismatch() {
        let mut r = ReferenceResolver::new();
        r.add(FileReference::new(0x2010, 0x2020, 0x1234));

        assert_eq!(
            r.add(FileReference::new(0x2020, 0x2010, 0x4321)),
            Resolution::Mismatch(FileReference::new(0x2010, 0x2020, 0x1234))
        );

        // Counterpart remains unresolved, the mismatching entry is not stored
        let u: Vec<_> = r.unresolved().map(|e| e.lid).collect();
        assert_eq!(u, vec![0x2010]);
    }

    #[test]
    fn first_unresolved_entry_wins() {
        let mut r = ReferenceResolver::new();
        r.add(FileReference::new(0x2010, 0x2030, 0x0001));
        r.add(FileReference::new(0x2020, 0x2030, 0x0002));

        // Pairs with the first entry linked to 2030
        assert!(matches!(
            r.add(FileReference::new(0x2030, 0x2010, 0x0001)),
            Resolution::Resolved(FileReference { lid: 0x2010, .. })
        ));

        // Then with the next unresolved one
        assert!(matches!(
            r.add(FileReference::new(0x2030, 0x2020, 0x0002)),
            Resolution::Resolved(FileReference { lid: 0x2020, .. })
        ));

        assert_eq!(r.unresolved().count(), 0);
    }
}
