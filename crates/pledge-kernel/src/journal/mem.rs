use super::{Journal, JournalEntry, JournalError, JournalSeq, OwnedJournalEntry};

/// Simple in-memory journal for unit tests and single-process harnesses.
#[derive(Debug, Default)]
pub struct MemJournal {
    entries: Vec<OwnedJournalEntry>,
}

impl MemJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[OwnedJournalEntry] {
        &self.entries
    }
}

impl Journal for MemJournal {
    fn append(&mut self, entry: JournalEntry<'_>) -> Result<JournalSeq, JournalError> {
        let seq = self.entries.len() as JournalSeq;
        self.entries.push(OwnedJournalEntry {
            seq,
            kind: entry.kind,
            payload: entry.payload.to_vec(),
        });
        Ok(seq)
    }

    fn load_from(&self, from: JournalSeq) -> Result<Vec<OwnedJournalEntry>, JournalError> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.seq >= from)
            .cloned()
            .collect())
    }

    fn next_seq(&self) -> JournalSeq {
        self.entries.len() as JournalSeq
    }
}

#[cfg(test)]
mod tests {
    use super::super::JournalKind;
    use super::*;

    #[test]
    fn append_and_load_round_trip() {
        let mut journal = MemJournal::new();
        journal
            .append(JournalEntry::new(JournalKind::Receipt, b"first"))
            .unwrap();
        journal
            .append(JournalEntry::new(JournalKind::Outcome, b"second"))
            .unwrap();

        let all = journal.load_from(0).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].seq, 0);
        assert_eq!(all[0].payload, b"first");
        assert_eq!(all[1].kind, JournalKind::Outcome);

        let tail = journal.load_from(1).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].payload, b"second");
    }
}
