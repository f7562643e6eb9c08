//! An entry log stored in a single file of consecutive serialized entries.
//!
//! Opening a file indexes the offset of every entry and every bookmark, so
//! random reads cost one seek. Appended entries are buffered until
//! [`EntryWriter::commit`], which writes and syncs them in one go.

use std::{
    fs::{File, OpenOptions},
    io::{Read as _, Seek as _, SeekFrom, Write as _},
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use stream_decoder::{
    BookmarkIndex, Entry, EntryReader, EntryType, EntryWriter, StreamError, WireError,
};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct StreamFile {
    path: PathBuf,
    file: Mutex<File>,
    /// Offset of every committed entry.
    offsets: Vec<u64>,
    /// Offset just past the last committed entry.
    end: u64,
    bookmarks: BookmarkIndex,
    pending: Vec<Entry>,
}

impl StreamFile {
    /// Opens the log at `path`, creating an empty one if there is none.
    pub fn create(path: &Path) -> Result<Self, StreamError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Self::index(path, file, true)
    }

    /// Opens an existing log for reading. An incomplete entry at the end of
    /// the file is skipped and left on disk.
    pub fn open(path: &Path) -> Result<Self, StreamError> {
        let file = OpenOptions::new().read(true).open(path)?;
        Self::index(path, file, false)
    }

    /// Opens an existing log for appending and truncation. An incomplete entry
    /// at the end of the file is removed.
    pub fn open_writable(path: &Path) -> Result<Self, StreamError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Self::index(path, file, true)
    }

    fn index(path: &Path, mut file: File, writable: bool) -> Result<Self, StreamError> {
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let mut offsets = Vec::new();
        let mut bookmarks = BookmarkIndex::default();
        let mut offset = 0usize;
        while offset < bytes.len() {
            let (entry, used) = match Entry::decode(&bytes[offset..]) {
                Ok(decoded) => decoded,
                Err(WireError::Truncated { needed, available }) if writable => {
                    warn!(
                        path = %path.display(),
                        offset,
                        needed,
                        available,
                        "discarding an incomplete entry at the end of the file"
                    );
                    file.set_len(offset as u64)?;
                    file.sync_data()?;
                    break;
                }
                Err(WireError::Truncated { needed, available }) => {
                    warn!(
                        path = %path.display(),
                        offset,
                        needed,
                        available,
                        "ignoring an incomplete entry at the end of the file"
                    );
                    break;
                }
                Err(source) => {
                    return Err(StreamError::Wire {
                        offset: offset as u64,
                        source,
                    })
                }
            };

            let expected = offsets.len() as u64;
            if entry.number != expected {
                return Err(StreamError::Numbering {
                    expected,
                    found: entry.number,
                });
            }
            bookmarks.record(&entry);
            offsets.push(offset as u64);
            offset += used;
        }

        info!(
            path = %path.display(),
            entries = offsets.len(),
            bookmarks = bookmarks.len(),
            "stream file opened"
        );
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            offsets,
            end: offset as u64,
            bookmarks,
            pending: Vec::new(),
        })
    }

    /// The serialized form of entry `number`, as stored in the file.
    pub fn raw_entry(&self, number: u64) -> Result<Vec<u8>, StreamError> {
        let index = usize::try_from(number).map_err(|_| StreamError::EntryNotFound(number))?;
        let start = *self
            .offsets
            .get(index)
            .ok_or(StreamError::EntryNotFound(number))?;
        let stop = self.offsets.get(index + 1).copied().unwrap_or(self.end);

        let mut bytes = vec![0; (stop - start) as usize];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut bytes)?;
        Ok(bytes)
    }
}

impl EntryReader for StreamFile {
    fn total_entries(&self) -> u64 {
        self.offsets.len() as u64
    }

    fn get_entry(&self, number: u64) -> Result<Entry, StreamError> {
        let bytes = self.raw_entry(number)?;
        let (entry, _) = Entry::decode(&bytes).map_err(|source| StreamError::Wire {
            offset: self.offsets[number as usize],
            source,
        })?;
        Ok(entry)
    }

    fn first_entry_after_bookmark(&self, bookmark: &[u8]) -> Result<Entry, StreamError> {
        let at = self
            .bookmarks
            .get(bookmark)
            .ok_or_else(|| StreamError::BookmarkNotFound(bookmark.to_vec()))?;
        self.get_entry(at + 1)
    }
}

impl EntryWriter for StreamFile {
    fn append_entry(&mut self, entry_type: EntryType, data: Vec<u8>) -> Result<u64, StreamError> {
        let number = (self.offsets.len() + self.pending.len()) as u64;
        self.pending.push(Entry::new(number, entry_type, data));
        Ok(number)
    }

    fn commit(&mut self) -> Result<(), StreamError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let mut bytes = Vec::new();
        let mut offsets = Vec::with_capacity(self.pending.len());
        for entry in &self.pending {
            offsets.push(self.end + bytes.len() as u64);
            entry.encode_into(&mut bytes);
        }

        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(self.end))?;
            file.write_all(&bytes)?;
            file.sync_data()?;
        }

        for entry in self.pending.drain(..) {
            self.bookmarks.record(&entry);
        }
        self.offsets.extend(offsets);
        self.end += bytes.len() as u64;
        debug!(entries = self.offsets.len(), end = self.end, "committed");
        Ok(())
    }

    fn truncate(&mut self, number: u64) -> Result<(), StreamError> {
        let total = self.total_entries();
        if number > total {
            return Err(StreamError::TruncateBeyondEnd { number, total });
        }
        self.pending.clear();

        let end = self
            .offsets
            .get(number as usize)
            .copied()
            .unwrap_or(self.end);
        {
            let file = self.file.lock();
            file.set_len(end)?;
            file.sync_data()?;
        }

        self.offsets.truncate(number as usize);
        self.bookmarks.truncate(number);
        self.end = end;
        info!(path = %self.path.display(), entries = number, "stream file truncated");
        Ok(())
    }
}
