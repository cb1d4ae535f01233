use std::fmt;
use std::str;

use crate::error::{AesdError, Result};

/// the byte that terminates every command
pub const DELIMITER: u8 = b'\n';

/// prefix of the seek command: `AESDCHAR_IOCSEEKTO:<write_cmd>,<write_cmd_offset>\n`
pub const SEEK_PREFIX: &[u8] = b"AESDCHAR_IOCSEEKTO:";

/// One complete command, always terminated by [`DELIMITER`].
///
/// Entries are immutable once built. They are moved into a [`BoundedCommandLog`] on insertion
/// and handed back, wrapped in an [`Evicted`], when they are overwritten.
///
/// [`BoundedCommandLog`]: ./struct.BoundedCommandLog.html
#[derive(Clone, PartialEq, Eq)]
pub struct CommandEntry {
    bytes: Box<[u8]>,
}

impl CommandEntry {
    /// builds an entry from `bytes`, which must end with exactly one [`DELIMITER`]
    ///
    /// # Errors
    /// returns [`AesdError::StringErr`] if `bytes` is not a single delimited command
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        match bytes.iter().position(|&b| b == DELIMITER) {
            Some(pos) if pos + 1 == bytes.len() => Ok(Self::from_delimited(bytes)),
            _ => Err(AesdError::StringErr(format!(
                "a command must contain exactly one trailing delimiter: {:?}",
                String::from_utf8_lossy(&bytes)
            ))),
        }
    }

    /// the caller guarantees `bytes` ends with the delimiter and holds no other
    pub(crate) fn from_delimited(bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.last(), Some(&DELIMITER));
        CommandEntry {
            bytes: bytes.into_boxed_slice(),
        }
    }

    /// the raw command bytes, including the trailing delimiter
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// number of bytes in this command, including the delimiter. Never zero.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// always `false`, a command holds at least its delimiter
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// consumes the entry, returning its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes.into_vec()
    }
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CommandEntry")
            .field(&String::from_utf8_lossy(&self.bytes))
            .finish()
    }
}

impl AsRef<[u8]> for CommandEntry {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// An entry that was overwritten by a newer one.
///
/// It is the only way an entry ever leaves a log, so every overwritten entry is handed to exactly
/// one owner. That owner must consume it, either with [`release`] or [`into_inner`].
///
/// [`release`]: #method.release
/// [`into_inner`]: #method.into_inner
#[must_use = "an evicted entry must be released or taken with into_inner()"]
#[derive(Debug, PartialEq, Eq)]
pub struct Evicted(CommandEntry);

impl Evicted {
    pub(crate) fn new(entry: CommandEntry) -> Self {
        Evicted(entry)
    }

    /// frees the evicted entry
    pub fn release(self) {
        drop(self.0)
    }

    /// takes ownership of the evicted entry
    pub fn into_inner(self) -> CommandEntry {
        self.0
    }
}

/// The two kinds of commands a client can send
#[derive(Debug, PartialEq, Eq)]
pub enum Request {
    /// append the command to the log, then reply with the whole log
    Store(CommandEntry),
    /// don't append anything, reply with the log starting at the given command and offset
    SeekTo {
        /// index of the command, relative to the oldest retained command
        write_cmd: u32,
        /// zero referenced offset within that command
        write_cmd_offset: u32,
    },
}

impl Request {
    /// classifies a complete command as either a seek or a store request
    ///
    /// # Errors
    /// returns [`AesdError::MalformedSeek`] if the command starts with [`SEEK_PREFIX`] but its
    /// arguments are not two comma separated, unsigned decimal integers
    pub fn parse(entry: CommandEntry) -> Result<Request> {
        match entry.as_bytes().strip_prefix(SEEK_PREFIX) {
            Some(args) => parse_seek_args(args),
            None => Ok(Request::Store(entry)),
        }
    }
}

/// parses `<write_cmd>,<write_cmd_offset>\n`
fn parse_seek_args(args: &[u8]) -> Result<Request> {
    let malformed = || AesdError::MalformedSeek(String::from_utf8_lossy(args).into_owned());

    let args = args.strip_suffix(&[DELIMITER]).ok_or_else(malformed)?;
    let args = str::from_utf8(args).map_err(|_| malformed())?;
    let (cmd, offset) = args.split_once(',').ok_or_else(malformed)?;

    Ok(Request::SeekTo {
        write_cmd: parse_u32(cmd).ok_or_else(malformed)?,
        write_cmd_offset: parse_u32(offset).ok_or_else(malformed)?,
    })
}

// plain digits only, `u32::from_str` would also accept a leading '+'
fn parse_u32(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(s: &str) -> CommandEntry {
        CommandEntry::new(s).unwrap()
    }

    #[test]
    fn entry_requires_a_single_trailing_delimiter() {
        assert!(CommandEntry::new("abc\n").is_ok());
        assert!(CommandEntry::new("abc").is_err());
        assert!(CommandEntry::new("a\nb\n").is_err());
        assert!(CommandEntry::new("").is_err());
        assert_eq!(entry("\n").len(), 1);
    }

    #[test]
    fn plain_text_is_a_store_request() {
        assert_eq!(
            Request::parse(entry("hello world\n")).unwrap(),
            Request::Store(entry("hello world\n"))
        );
    }

    #[test]
    fn seek_command_is_parsed() {
        assert_eq!(
            Request::parse(entry("AESDCHAR_IOCSEEKTO:1,1\n")).unwrap(),
            Request::SeekTo {
                write_cmd: 1,
                write_cmd_offset: 1
            }
        );
        assert_eq!(
            Request::parse(entry("AESDCHAR_IOCSEEKTO:12,034\n")).unwrap(),
            Request::SeekTo {
                write_cmd: 12,
                write_cmd_offset: 34
            }
        );
    }

    #[test]
    fn malformed_seek_arguments_are_rejected() {
        for bad in [
            "AESDCHAR_IOCSEEKTO:\n",
            "AESDCHAR_IOCSEEKTO:1\n",
            "AESDCHAR_IOCSEEKTO:1,\n",
            "AESDCHAR_IOCSEEKTO:,1\n",
            "AESDCHAR_IOCSEEKTO:-1,0\n",
            "AESDCHAR_IOCSEEKTO:+1,0\n",
            "AESDCHAR_IOCSEEKTO:1,2,3\n",
            "AESDCHAR_IOCSEEKTO: 1,2\n",
            "AESDCHAR_IOCSEEKTO:99999999999,0\n",
        ] {
            assert!(
                matches!(Request::parse(entry(bad)), Err(AesdError::MalformedSeek(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn lowercase_prefix_is_just_a_command() {
        assert!(matches!(
            Request::parse(entry("aesdchar_iocseekto:1,1\n")).unwrap(),
            Request::Store(_)
        ));
    }
}
