use std::collections::TryReserveError;
use std::io;
use thiserror::Error;

/// type alias for all operations in this crate that could fail with an [`AesdError`]
pub type Result<T> = std::result::Result<T, AesdError>;

/// The Error variants used by the command log, its backends and the server.
#[derive(Error, Debug)]
pub enum AesdError {
    /// variant for errors caused by socket or file IO
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// a seek target that does not name a stored command, or a byte inside it
    #[error("seek target out of range: command {write_cmd}, offset {write_cmd_offset}")]
    OutOfRange {
        /// index of the command, relative to the oldest retained command
        write_cmd: u32,
        /// zero referenced offset within that command
        write_cmd_offset: u32,
    },

    /// the seek command prefix was present but its arguments could not be parsed
    #[error("malformed seek command: {0}")]
    MalformedSeek(String),

    /// the storage backend has no notion of individual commands
    #[error("seek is not supported by the {0} backend")]
    SeekUnsupported(&'static str),

    /// growing a connection buffer failed
    #[error("could not grow buffer: {0}")]
    Alloc(#[from] TryReserveError),

    /// a thread panicked while holding the shared write lock
    #[error("the shared write lock was poisoned")]
    LockPoisoned,

    /// invalid command line options
    #[error("{0}")]
    Parsing(String),

    /// an error with a free form message
    #[error("{0}")]
    StringErr(String),
}
