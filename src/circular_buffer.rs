use tracing::debug;

use crate::command::{CommandEntry, Evicted};
use crate::error::{AesdError, Result};

/// the number of commands a device retains by default
pub const AESDCHAR_MAX_WRITE_OPERATIONS_SUPPORTED: usize = 10;

/// A fixed capacity, circular store of the most recently added commands.
///
/// Once the log is full, every new entry overwrites the oldest one (FIFO). Byte offsets into the
/// log are "logical": offset 0 is always the first byte of the oldest retained command, and the
/// log reads as the concatenation of all retained commands in insertion order.
#[derive(Debug)]
pub struct BoundedCommandLog {
    // the entry slots, `None` until first written
    slots: Box<[Option<CommandEntry>]>,

    // slot the next entry is written into
    in_offs: usize,

    // slot holding the oldest retained entry
    out_offs: usize,

    // number of valid entries
    count: usize,

    // running command number of the oldest retained entry
    first_index: u64,

    // sum of the lengths of all valid entries
    total_size: usize,
}

impl BoundedCommandLog {
    /// creates an empty log that will hold at most `capacity` commands
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "a command log needs room for at least one entry");
        BoundedCommandLog {
            slots: (0..capacity).map(|_| None).collect(),
            in_offs: 0,
            out_offs: 0,
            count: 0,
            first_index: 0,
            total_size: 0,
        }
    }

    /// Inserts `entry` as the newest command.
    ///
    /// If the log was already full, the oldest command is overwritten and returned to the
    /// caller, who becomes its only owner.
    #[must_use = "an overwritten entry must be released"]
    pub fn add_entry(&mut self, entry: CommandEntry) -> Option<Evicted> {
        self.total_size += entry.len();
        let old = self.slots[self.in_offs].replace(entry);
        self.in_offs = (self.in_offs + 1) % self.capacity();

        if self.count < self.capacity() {
            self.count += 1;
            return None;
        }

        // the slot just written held the oldest entry
        self.out_offs = self.in_offs;
        self.first_index += 1;
        old.map(|old| {
            self.total_size -= old.len();
            debug!(first_index = self.first_index, evicted = ?old, "evicted oldest command");
            Evicted::new(old)
        })
    }

    /// Finds the entry holding the byte at logical offset `pos`.
    ///
    /// Returns the entry together with the offset of `pos` within it, or `None` once `pos` is
    /// at or beyond [`total_size`](#method.total_size). That simply means there is no more data.
    pub fn find_entry_for_offset(&self, pos: usize) -> Option<(&CommandEntry, usize)> {
        let mut start = 0;
        for entry in self.iter() {
            if pos < start + entry.len() {
                return Some((entry, pos - start));
            }
            start += entry.len();
        }
        None
    }

    /// Translates a command index (0 is the oldest retained command) and an offset within that
    /// command into an absolute logical byte offset.
    ///
    /// # Errors
    /// returns [`AesdError::OutOfRange`] if there is no command `write_cmd`, or if that command
    /// is not longer than `write_cmd_offset`
    pub fn translate_command_offset(&self, write_cmd: u32, write_cmd_offset: u32) -> Result<u64> {
        let out_of_range = || AesdError::OutOfRange {
            write_cmd,
            write_cmd_offset,
        };
        let index = write_cmd as usize;
        let target = self.get(index).ok_or_else(out_of_range)?;
        if write_cmd_offset as usize >= target.len() {
            return Err(out_of_range());
        }

        let preceding: usize = self.iter().take(index).map(CommandEntry::len).sum();
        Ok((preceding + write_cmd_offset as usize) as u64)
    }

    /// the entry `index` positions after the oldest retained one
    pub fn get(&self, index: usize) -> Option<&CommandEntry> {
        if index >= self.count {
            return None;
        }
        self.slots[(self.out_offs + index) % self.capacity()].as_ref()
    }

    /// iterates over the retained entries, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &CommandEntry> + '_ {
        (0..self.count).filter_map(move |i| self.get(i))
    }

    /// sum of the lengths of all retained entries
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// number of retained entries
    pub fn len(&self) -> usize {
        self.count
    }

    /// `true` if no entry was added yet
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// `true` once the next insertion will evict the oldest entry
    pub fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    /// the maximum number of retained entries
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// the running number of the oldest retained entry, i.e. how many entries were evicted so far
    pub fn first_index(&self) -> u64 {
        self.first_index
    }

    /// the concatenation of all retained entries, oldest first
    pub fn contents(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_size);
        for entry in self.iter() {
            out.extend_from_slice(entry.as_bytes());
        }
        out
    }
}
