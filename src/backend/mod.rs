//! This module provides the storage backends a server can keep its command log in.
//! The two backends that are implemented are a plain, ever growing [`FileBackend`], and a
//! [`CharDevice`] that only retains the most recent commands, the way the `aesdchar` character
//! device does.
use std::io::{Read, Seek};

use crate::error::{AesdError, Result};

/// A trait for the storage a server appends commands to and replays them from.
///
/// Appending takes `&mut self`, so a backend shared between threads has to sit behind a lock.
/// That lock is the server's shared write lock. Readers are independent of the backend once
/// opened, so replaying the log to a client never holds it.
pub trait StorageBackend: Send + 'static {
    /// a cursor over the stored bytes, starting at the first byte of the log
    type Reader: Read + Seek + Send;

    /// short name of the backend, used in log messages and errors
    fn name(&self) -> &'static str;

    /// appends one complete command to the log
    fn append(&mut self, bytes: &[u8]) -> Result<()>;

    /// opens a new cursor positioned at the start of the log
    fn open_reader(&self) -> Result<Self::Reader>;

    /// Moves `reader` to byte `write_cmd_offset` of command `write_cmd` (0 is the oldest
    /// retained command) without reading anything. Returns the new absolute position.
    ///
    /// # Errors
    /// Backends that don't keep track of individual commands return
    /// [`AesdError::SeekUnsupported`], which is the default.
    fn seek_to(
        &self,
        reader: &mut Self::Reader,
        write_cmd: u32,
        write_cmd_offset: u32,
    ) -> Result<u64> {
        let _ = (reader, write_cmd, write_cmd_offset);
        Err(AesdError::SeekUnsupported(self.name()))
    }

    /// `true` if the periodic timestamp commands should be written into this backend
    fn wants_timestamps(&self) -> bool {
        false
    }

    /// releases the backend at server shutdown, removing any storage that isn't meant to
    /// outlive the process
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

mod device;
mod file;

pub use self::device::{CharDevice, DeviceHandle};
pub use self::file::{FileBackend, DATA_FILE_PATH};
