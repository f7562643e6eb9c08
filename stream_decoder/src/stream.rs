//! Access to the entry log.
//!
//! The log itself (storage, transport) lives behind [`EntryReader`] and
//! [`EntryWriter`]. [`MemoryStream`] is a complete in-memory log used by the
//! generator tests and anywhere a throwaway log is enough.

use std::collections::HashMap;

use crate::{
    entry::{Entry, EntryType},
    error::WireError,
};

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("entry {0} not found")]
    EntryNotFound(u64),
    #[error("bookmark 0x{} not found", hex::encode(.0))]
    BookmarkNotFound(Vec<u8>),
    #[error("malformed entry at offset {offset}: {source}")]
    Wire {
        offset: u64,
        #[source]
        source: WireError,
    },
    #[error("entry numbering is not contiguous: expected {expected}, found {found}")]
    Numbering { expected: u64, found: u64 },
    #[error("cannot truncate at entry {number}, log has {total} entries")]
    TruncateBeyondEnd { number: u64, total: u64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Random access to committed entries.
#[cfg_attr(test, mockall::automock)]
pub trait EntryReader {
    /// Number of committed entries. Entries are numbered `0..total_entries()`.
    fn total_entries(&self) -> u64;

    fn get_entry(&self, number: u64) -> Result<Entry, StreamError>;

    /// Returns the entry that immediately follows the first bookmark entry
    /// whose payload equals `bookmark`.
    fn first_entry_after_bookmark(&self, bookmark: &[u8]) -> Result<Entry, StreamError>;
}

/// Append side of the log. Appended entries become visible to readers only
/// after [`EntryWriter::commit`].
pub trait EntryWriter {
    /// Appends an entry and returns the number it was assigned.
    fn append_entry(&mut self, entry_type: EntryType, data: Vec<u8>) -> Result<u64, StreamError>;

    fn append_bookmark(&mut self, bookmark: Vec<u8>) -> Result<u64, StreamError> {
        self.append_entry(EntryType::BookMark, bookmark)
    }

    fn commit(&mut self) -> Result<(), StreamError>;

    /// Removes every entry numbered `number` or above, together with the
    /// bookmarks they carry. Uncommitted entries are discarded.
    fn truncate(&mut self, number: u64) -> Result<(), StreamError>;
}

/// Bookmark payload to entry number, first occurrence wins.
#[derive(Debug, Default, Clone)]
pub struct BookmarkIndex {
    entries: HashMap<Vec<u8>, u64>,
}

impl BookmarkIndex {
    pub fn record(&mut self, entry: &Entry) {
        if entry.entry_type == EntryType::BookMark {
            self.entries
                .entry(entry.data.clone())
                .or_insert(entry.number);
        }
    }

    pub fn get(&self, bookmark: &[u8]) -> Option<u64> {
        self.entries.get(bookmark).copied()
    }

    /// Forgets bookmarks stored at `number` or above.
    pub fn truncate(&mut self, number: u64) {
        self.entries.retain(|_, at| *at < number);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStream {
    entries: Vec<Entry>,
    pending: Vec<Entry>,
    bookmarks: BookmarkIndex,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Builds a committed log from already numbered entries.
    pub fn from_entries(entries: Vec<Entry>) -> Result<Self, StreamError> {
        let mut stream = Self::new();
        for (expected, entry) in (0u64..).zip(entries) {
            if entry.number != expected {
                return Err(StreamError::Numbering {
                    expected,
                    found: entry.number,
                });
            }
            stream.bookmarks.record(&entry);
            stream.entries.push(entry);
        }
        Ok(stream)
    }
}

impl EntryReader for MemoryStream {
    fn total_entries(&self) -> u64 {
        self.entries.len() as u64
    }

    fn get_entry(&self, number: u64) -> Result<Entry, StreamError> {
        usize::try_from(number)
            .ok()
            .and_then(|index| self.entries.get(index))
            .cloned()
            .ok_or(StreamError::EntryNotFound(number))
    }

    fn first_entry_after_bookmark(&self, bookmark: &[u8]) -> Result<Entry, StreamError> {
        let at = self
            .bookmarks
            .get(bookmark)
            .ok_or_else(|| StreamError::BookmarkNotFound(bookmark.to_vec()))?;
        self.get_entry(at + 1)
    }
}

impl EntryWriter for MemoryStream {
    fn append_entry(&mut self, entry_type: EntryType, data: Vec<u8>) -> Result<u64, StreamError> {
        let number = (self.entries.len() + self.pending.len()) as u64;
        self.pending.push(Entry::new(number, entry_type, data));
        Ok(number)
    }

    fn commit(&mut self) -> Result<(), StreamError> {
        for entry in self.pending.drain(..) {
            self.bookmarks.record(&entry);
            self.entries.push(entry);
        }
        Ok(())
    }

    fn truncate(&mut self, number: u64) -> Result<(), StreamError> {
        let total = self.total_entries();
        if number > total {
            return Err(StreamError::TruncateBeyondEnd { number, total });
        }
        self.pending.clear();
        self.entries.truncate(number as usize);
        self.bookmarks.truncate(number);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_visible_after_commit() {
        let mut stream = MemoryStream::new();
        assert_eq!(stream.append_bookmark(vec![1]).unwrap(), 0);
        assert_eq!(stream.append_entry(EntryType::BatchStart, vec![]).unwrap(), 1);
        assert_eq!(stream.total_entries(), 0);
        assert!(matches!(
            stream.get_entry(0),
            Err(StreamError::EntryNotFound(0))
        ));

        stream.commit().unwrap();
        assert_eq!(stream.total_entries(), 2);
        assert_eq!(
            stream.first_entry_after_bookmark(&[1]).unwrap().entry_type,
            EntryType::BatchStart
        );
    }

    #[test]
    fn first_bookmark_occurrence_wins() {
        let mut stream = MemoryStream::new();
        stream.append_bookmark(vec![7]).unwrap();
        stream.append_entry(EntryType::L2Block, vec![1]).unwrap();
        stream.append_bookmark(vec![7]).unwrap();
        stream.append_entry(EntryType::L2Block, vec![2]).unwrap();
        stream.commit().unwrap();

        assert_eq!(stream.first_entry_after_bookmark(&[7]).unwrap().number, 1);
    }

    #[test]
    fn truncate_drops_entries_and_their_bookmarks() {
        let mut stream = MemoryStream::new();
        stream.append_bookmark(vec![1]).unwrap();
        stream.append_entry(EntryType::BatchStart, vec![]).unwrap();
        stream.append_bookmark(vec![2]).unwrap();
        stream.append_entry(EntryType::BatchStart, vec![]).unwrap();
        stream.commit().unwrap();

        stream.truncate(2).unwrap();
        assert_eq!(stream.total_entries(), 2);
        assert!(stream.first_entry_after_bookmark(&[1]).is_ok());
        assert!(matches!(
            stream.first_entry_after_bookmark(&[2]),
            Err(StreamError::BookmarkNotFound(_))
        ));
        assert!(matches!(
            stream.truncate(5),
            Err(StreamError::TruncateBeyondEnd { number: 5, total: 2 })
        ));

        // numbering continues from the cut
        assert_eq!(stream.append_bookmark(vec![3]).unwrap(), 2);
    }

    #[test]
    fn from_entries_rejects_gaps() {
        let entries = vec![
            Entry::new(0, EntryType::BookMark, vec![]),
            Entry::new(2, EntryType::BatchStart, vec![]),
        ];
        assert!(matches!(
            MemoryStream::from_entries(entries),
            Err(StreamError::Numbering {
                expected: 1,
                found: 2
            })
        ));
    }
}
