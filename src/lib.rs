#![deny(missing_docs)]
//! A bounded, append-only command log (aesd) that is shared by many clients over TCP.
//!
//! This crate provides the [`AesdServer`] itself, the [`StorageBackend`]s it keeps its log in,
//! as well as an [`aesd-client`] and [`aesdsocket`] executable that can be used to talk to it.
//! Clients send newline terminated text commands; the server stores them and replies with the
//! contents of the log.
//!
//! ## Supported Commands
//! The server supports two types of commands:
//!
//! - a plain command: any text ending in a newline. It is appended to the log, and the reply is
//! the entire log, every stored command concatenated in the order they were stored.
//! - a seek command: `AESDCHAR_IOCSEEKTO:<write_cmd>,<write_cmd_offset>` followed by a newline.
//! Nothing is appended, the reply is the log starting at byte `write_cmd_offset` of the
//! `write_cmd`th stored command (0 is the oldest). An out of range or malformed seek closes the
//! connection without a reply.
//!
//! See the [`Request`] type for more information on how commands are recognized.
//!
//! ## BoundedCommandLog
//! [`BoundedCommandLog`] is a fixed capacity circular store of commands. Once it is full, each
//! new command overwrites the oldest one, which is handed back to the caller as an [`Evicted`]
//! value that must be released exactly once.
//! It also translates between logical byte offsets and (command, offset) pairs, which is how
//! reads and seeks find their data.
//!
//! ## Partial writes
//! Commands may arrive in any number of pieces. A [`PartialAssembler`] buffers the pieces and
//! hands out a [`CommandEntry`] for every newline it sees, keeping whatever follows the newline
//! for the next command.
//!
//! ## Storage Backends
//! - [`FileBackend`] keeps every command in a plain file (by default `/var/tmp/aesdsocketdata`),
//! and receives a `timestamp:` command every 10 seconds from a [`PeriodicAnnotator`].
//! - [`CharDevice`] models the `aesdchar` character device: it retains only the last N commands
//! (10 by default) and supports seeking to a command.
//!
//! ## Client / Server
//! The server runs one thread per connection, tracked by a [`ThreadRegistry`]. All appends are
//! serialized by one shared write lock; replies are sent without holding it, so a reply may
//! include commands other clients stored in the meantime.
//! A [`Shutdown`] token (triggered by SIGINT / SIGTERM in the server executable) stops the accept
//! loop, after which every worker is joined and the backend is closed.
//!
//! [`aesdsocket`]: ./aesdsocket.rs
//! [`aesd-client`]: ./aesd-client.rs
//! [`AesdServer`]: ./struct.AesdServer.html
//! [`StorageBackend`]: ./backend/trait.StorageBackend.html
//! [`Request`]: ./enum.Request.html

pub use annotator::{timestamp_entry, PeriodicAnnotator, TIMESTAMP_INTERVAL};
pub use assembler::PartialAssembler;
pub use backend::{CharDevice, DeviceHandle, FileBackend, StorageBackend};
pub use circular_buffer::{BoundedCommandLog, AESDCHAR_MAX_WRITE_OPERATIONS_SUPPORTED};
pub use client::AesdClient;
pub use command::{CommandEntry, Evicted, Request, DELIMITER, SEEK_PREFIX};
pub use daemon::daemonize;
pub use error::{AesdError, Result};
pub use registry::{ThreadRegistry, WorkerId};
pub use server::{AesdServer, Context, ServerConfig, DEFAULT_PORT};
pub use shutdown::Shutdown;

mod annotator;
mod assembler;
pub mod backend;
mod circular_buffer;
mod client;
mod command;
mod daemon;
mod error;
mod registry;
mod server;
mod shutdown;
