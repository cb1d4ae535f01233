use crate::command::{CommandEntry, DELIMITER};
use crate::error::Result;

/// Reassembles a stream of arbitrarily sized chunks into complete commands.
///
/// Bytes are accumulated until a [`DELIMITER`] shows up. Everything up to and including the
/// delimiter then becomes one [`CommandEntry`]; whatever follows it stays buffered as the start
/// of the next command.
#[derive(Debug, Default)]
pub struct PartialAssembler {
    pending: Vec<u8>,
}

impl PartialAssembler {
    /// creates an assembler with an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// appends `bytes` to the accumulator
    ///
    /// # Errors
    /// returns [`AesdError::Alloc`] if the accumulator could not grow
    ///
    /// [`AesdError::Alloc`]: ./enum.AesdError.html#variant.Alloc
    pub fn feed(&mut self, bytes: &[u8]) -> Result<()> {
        self.pending.try_reserve(bytes.len())?;
        self.pending.extend_from_slice(bytes);
        Ok(())
    }

    /// removes and returns the oldest complete command, if there is one
    pub fn next_command(&mut self) -> Option<CommandEntry> {
        let end = self.pending.iter().position(|&b| b == DELIMITER)?;
        let command: Vec<u8> = self.pending.drain(..=end).collect();
        Some(CommandEntry::from_delimited(command))
    }

    /// removes and returns every complete command, in the order they were received
    pub fn drain_commands(&mut self) -> Vec<CommandEntry> {
        std::iter::from_fn(|| self.next_command()).collect()
    }

    /// the buffered bytes of the incomplete next command
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// `true` if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// discards any buffered partial command
    pub fn clear(&mut self) {
        self.pending.clear();
        self.pending.shrink_to_fit();
    }
}
