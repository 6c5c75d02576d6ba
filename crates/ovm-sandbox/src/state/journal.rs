use alloy_primitives::{Address, B256};

use super::Account;

/// A position in the state journal. Reverting to it undoes every write made after it was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Checkpoint(usize);

/// A write, recorded with the value it replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JournalEntry {
    Account { address: Address, previous: Account },
    Storage { address: Address, key: B256, previous: B256 },
}

/// The undo log of the current transaction.
#[derive(Debug, Default)]
pub(crate) struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.entries.len())
    }

    pub(crate) fn record(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }

    /// Removes the entries recorded after `checkpoint`, newest first.
    pub(crate) fn unwind(&mut self, checkpoint: Checkpoint) -> impl Iterator<Item = JournalEntry> + '_ {
        let start = checkpoint.0.min(self.entries.len());
        self.entries.drain(start..).rev()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
