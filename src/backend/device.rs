use std::io;
use std::io::{Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use super::StorageBackend;
use crate::assembler::PartialAssembler;
use crate::circular_buffer::BoundedCommandLog;
use crate::error::{AesdError, Result};

/// An in-process model of the `aesdchar` character device.
///
/// The device retains only the most recent `capacity` commands. Writes may carry any number of
/// bytes: complete commands go into the log, a trailing partial command stays buffered on the
/// device until a later write completes it. Each [`DeviceHandle`] opened on the device has its
/// own file position.
///
/// Cloning a `CharDevice` yields another reference to the same device.
#[derive(Debug, Clone)]
pub struct CharDevice {
    state: Arc<Mutex<DeviceState>>,
}

#[derive(Debug)]
struct DeviceState {
    log: BoundedCommandLog,
    partial: PartialAssembler,
}

impl CharDevice {
    /// creates a device that retains at most `capacity` commands
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        CharDevice {
            state: Arc::new(Mutex::new(DeviceState {
                log: BoundedCommandLog::new(capacity),
                partial: PartialAssembler::new(),
            })),
        }
    }

    /// Writes `buf` into the device, returning the number of bytes consumed (always all of
    /// them). Every command completed by this write is added to the log, evicting the oldest
    /// commands as needed.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut state = lock(&self.state)?;
        let DeviceState { log, partial } = &mut *state;

        partial.feed(buf)?;
        while let Some(entry) = partial.next_command() {
            trace!(?entry, "storing command");
            if let Some(evicted) = log.add_entry(entry) {
                evicted.release();
            }
        }
        debug!(
            written = buf.len(),
            entries = log.len(),
            pending = partial.pending().len(),
            "device write"
        );
        Ok(buf.len())
    }

    /// opens a new handle on the device, positioned at offset 0
    pub fn open(&self) -> DeviceHandle {
        DeviceHandle {
            state: Arc::clone(&self.state),
            pos: 0,
        }
    }

    /// the retained commands, oldest first
    pub fn entries(&self) -> Result<Vec<Vec<u8>>> {
        let state = lock(&self.state)?;
        Ok(state.log.iter().map(|e| e.as_bytes().to_vec()).collect())
    }

    /// the concatenation of all retained commands
    pub fn contents(&self) -> Result<Vec<u8>> {
        Ok(lock(&self.state)?.log.contents())
    }

    /// the total size of all retained commands
    pub fn size(&self) -> Result<u64> {
        Ok(lock(&self.state)?.log.total_size() as u64)
    }
}

impl StorageBackend for CharDevice {
    type Reader = DeviceHandle;

    fn name(&self) -> &'static str {
        "device"
    }

    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.write(bytes).map(|_| ())
    }

    fn open_reader(&self) -> Result<DeviceHandle> {
        Ok(self.open())
    }

    fn seek_to(
        &self,
        reader: &mut DeviceHandle,
        write_cmd: u32,
        write_cmd_offset: u32,
    ) -> Result<u64> {
        reader.seek_to(write_cmd, write_cmd_offset)
    }
}

/// An open handle on a [`CharDevice`], with its own file position
#[derive(Debug)]
pub struct DeviceHandle {
    state: Arc<Mutex<DeviceState>>,
    pos: u64,
}

impl DeviceHandle {
    /// Moves the file position to byte `write_cmd_offset` of command `write_cmd`, where 0 is the
    /// oldest command retained by the device. Returns the new position.
    ///
    /// # Errors
    /// returns [`AesdError::OutOfRange`] if the device holds no such command or byte. The file
    /// position is left unchanged.
    pub fn seek_to(&mut self, write_cmd: u32, write_cmd_offset: u32) -> Result<u64> {
        let state = lock(&self.state)?;
        self.pos = state
            .log
            .translate_command_offset(write_cmd, write_cmd_offset)?;
        debug!(write_cmd, write_cmd_offset, pos = self.pos, "seek to command");
        Ok(self.pos)
    }

    /// the current file position
    pub fn position(&self) -> u64 {
        self.pos
    }
}

impl Read for DeviceHandle {
    /// reads at most the rest of the one command the file position falls into
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let state = lock(&self.state).map_err(to_io)?;
        let (entry, offset) = match state.log.find_entry_for_offset(self.pos as usize) {
            Some(found) => found,
            None => return Ok(0),
        };

        let available = &entry.as_bytes()[offset..];
        let len = available.len().min(buf.len());
        buf[..len].copy_from_slice(&available[..len]);
        self.pos += len as u64;
        Ok(len)
    }
}

impl Seek for DeviceHandle {
    /// seeks relative to the start, the current position, or the end of the retained data.
    /// Positions before the start or past the end are rejected.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let size = lock(&self.state).map_err(to_io)?.log.total_size() as i128;
        let target = match pos {
            SeekFrom::Start(n) => n as i128,
            SeekFrom::Current(n) => self.pos as i128 + n as i128,
            SeekFrom::End(n) => size + n as i128,
        };
        if target < 0 || target > size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek target {} is outside of 0..={}", target, size),
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

fn lock(state: &Mutex<DeviceState>) -> Result<MutexGuard<'_, DeviceState>> {
    state.lock().map_err(|_| AesdError::LockPoisoned)
}

fn to_io(e: AesdError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}
