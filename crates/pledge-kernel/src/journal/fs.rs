use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use pledge_cbor::to_canonical_cbor;

use super::{Journal, JournalEntry, JournalError, JournalSeq, OwnedJournalEntry};

const JOURNAL_DIR: &str = "journal";
const JOURNAL_FILE: &str = "receipts.log";

/// Filesystem-backed journal storing length-prefixed canonical CBOR
/// records. The append handle stays open for the journal's lifetime and
/// every append is fsynced, so a replaying collaborator sees a prefix of
/// the log after a crash, never a torn suffix that parses.
#[derive(Debug)]
pub struct FsJournal {
    path: PathBuf,
    writer: File,
    next_seq: JournalSeq,
}

impl FsJournal {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, JournalError> {
        let journal_dir = root.as_ref().join(JOURNAL_DIR);
        fs::create_dir_all(&journal_dir)?;
        let path = journal_dir.join(JOURNAL_FILE);
        let next_seq = match read_all_records(&path) {
            Ok(entries) => entries.last().map(|entry| entry.seq + 1).unwrap_or(0),
            Err(JournalError::Io(err)) if err.kind() == ErrorKind::NotFound => 0,
            Err(err) => return Err(err),
        };
        let writer = OpenOptions::new().append(true).create(true).open(&path)?;
        Ok(Self {
            path,
            writer,
            next_seq,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Journal for FsJournal {
    fn append(&mut self, entry: JournalEntry<'_>) -> Result<JournalSeq, JournalError> {
        let seq = self.next_seq;
        let record = super::DiskRecord {
            seq,
            kind: entry.kind,
            payload: entry.payload,
        };
        let bytes = to_canonical_cbor(&record)?;
        let len = u32::try_from(bytes.len())
            .map_err(|_| JournalError::Corrupt("entry larger than 4GiB".into()))?;
        self.writer.write_all(&len.to_le_bytes())?;
        self.writer.write_all(&bytes)?;
        self.writer.sync_all()?;
        self.next_seq += 1;
        Ok(seq)
    }

    fn load_from(&self, from: JournalSeq) -> Result<Vec<OwnedJournalEntry>, JournalError> {
        let mut entries = read_all_records(&self.path)?;
        entries.retain(|entry| entry.seq >= from);
        Ok(entries)
    }

    fn next_seq(&self) -> JournalSeq {
        self.next_seq
    }
}

fn read_all_records(path: &Path) -> Result<Vec<OwnedJournalEntry>, JournalError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    loop {
        // A clean log ends exactly on a record boundary; anything short of
        // four header bytes is a torn write.
        let mut len_buf = [0u8; 4];
        let mut filled = 0;
        while filled < len_buf.len() {
            let n = reader.read(&mut len_buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            break;
        }
        if filled < len_buf.len() {
            return Err(JournalError::Corrupt(format!(
                "truncated length header (read {filled} bytes)"
            )));
        }
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        if let Err(err) = reader.read_exact(&mut buf) {
            if err.kind() == ErrorKind::UnexpectedEof {
                return Err(JournalError::Corrupt("truncated entry payload".into()));
            }
            return Err(err.into());
        }
        let entry: OwnedJournalEntry = serde_cbor::from_slice(&buf)?;
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::super::JournalKind;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_and_recovers_entries() {
        let tmp = TempDir::new().unwrap();
        let mut journal = FsJournal::open(tmp.path()).unwrap();
        assert_eq!(journal.next_seq(), 0);
        journal
            .append(JournalEntry::new(JournalKind::Receipt, b"a"))
            .unwrap();
        journal
            .append(JournalEntry::new(JournalKind::Outcome, b"b"))
            .unwrap();

        let again = FsJournal::open(tmp.path()).unwrap();
        assert_eq!(again.next_seq(), 2);
        let entries = again.load_from(0).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].seq, 0);
        assert_eq!(entries[0].payload, b"a");
        assert_eq!(entries[1].kind, JournalKind::Outcome);
    }

    #[test]
    fn load_from_filters_sequence() {
        let tmp = TempDir::new().unwrap();
        let mut journal = FsJournal::open(tmp.path()).unwrap();
        for payload in [b"one".as_ref(), b"two", b"three"] {
            journal
                .append(JournalEntry::new(JournalKind::Receipt, payload))
                .unwrap();
        }
        let entries = journal.load_from(2).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].payload, b"three");
    }

    #[test]
    fn detects_truncated_entry() {
        let tmp = TempDir::new().unwrap();
        {
            let mut journal = FsJournal::open(tmp.path()).unwrap();
            journal
                .append(JournalEntry::new(JournalKind::Receipt, b"payload"))
                .unwrap();
        }

        let log_path = tmp.path().join(JOURNAL_DIR).join(JOURNAL_FILE);
        let len = std::fs::metadata(&log_path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&log_path).unwrap();
        file.set_len(len - 1).unwrap();

        let err = FsJournal::open(tmp.path()).unwrap_err();
        assert!(matches!(err, JournalError::Corrupt(_)));
    }
}
