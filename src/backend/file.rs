use std::fs;
use std::fs::{File, OpenOptions};
use std::io;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use super::StorageBackend;
use crate::error::Result;

/// the data file used when none is given
pub const DATA_FILE_PATH: &str = "/var/tmp/aesdsocketdata";

/// A command log kept in a plain file that grows forever.
///
/// Every command ever appended is retained. By default the file is deleted when the backend is
/// closed, so the log only lives as long as the server.
#[derive(Debug)]
pub struct FileBackend {
    // path to the data file
    path: PathBuf,

    // appending writer into the data file
    writer: BufWriterWithPos<File>,

    // keep the data file around after `close`
    persistent: bool,
}

impl FileBackend {
    /// opens (creating it if needed) the data file at `path` for appending. Existing contents
    /// are kept and replayed to clients like any other command.
    #[instrument]
    pub fn open(path: &Path) -> Result<FileBackend> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let writer = BufWriterWithPos::new(file)?;
        info!(size = writer.pos, "opened data file");

        Ok(FileBackend {
            path: path.to_path_buf(),
            writer,
            persistent: false,
        })
    }

    /// keep the data file when the backend is closed
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// the path of the data file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// number of bytes in the data file
    pub fn len(&self) -> u64 {
        self.writer.pos
    }

    /// `true` if nothing was written to the data file yet
    pub fn is_empty(&self) -> bool {
        self.writer.pos == 0
    }
}

impl StorageBackend for FileBackend {
    type Reader = File;

    fn name(&self) -> &'static str {
        "file"
    }

    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.writer.flush()?;
        debug!(appended = bytes.len(), size = self.writer.pos, "appended to data file");
        Ok(())
    }

    fn open_reader(&self) -> Result<File> {
        Ok(File::open(&self.path)?)
    }

    fn wants_timestamps(&self) -> bool {
        true
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        if !self.persistent {
            match fs::remove_file(&self.path) {
                Ok(()) => debug!(path = ?self.path, "removed data file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(path = ?self.path, "data file already removed")
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// A buffered writer that keeps track of how many bytes the underlying file holds
#[derive(Debug)]
struct BufWriterWithPos<W: Write + Seek> {
    writer: BufWriter<W>,
    pos: u64,
}

impl<W: Write + Seek> BufWriterWithPos<W> {
    fn new(mut inner: W) -> Result<Self> {
        // append mode writes always land at the end
        let pos = inner.seek(SeekFrom::End(0))?;
        Ok(BufWriterWithPos {
            writer: BufWriter::new(inner),
            pos,
        })
    }
}

impl<W: Write + Seek> Write for BufWriterWithPos<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = self.writer.write(buf)?;
        self.pos += len as u64;
        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
