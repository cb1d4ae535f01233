use std::fmt::Display;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use crossbeam::channel;
use crossbeam::channel::Sender;
use crossbeam::select;
use tracing::{debug, error};

use crate::backend::StorageBackend;
use crate::command::CommandEntry;
use crate::error::Result;
use crate::server::Context;

/// how often a timestamp is written by default
pub const TIMESTAMP_INTERVAL: Duration = Duration::from_secs(10);

/// Periodically appends a timestamp command to the log.
///
/// The timestamp is appended under the same shared write lock the workers use, so it always lands
/// between two complete client commands. The background thread stops when [`stop`] is called or
/// when the annotator is dropped.
///
/// [`stop`]: #method.stop
#[derive(Debug)]
pub struct PeriodicAnnotator {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicAnnotator {
    /// starts a thread that appends a timestamp to `ctx`'s backend every `interval`
    pub fn spawn<B: StorageBackend>(ctx: Arc<Context<B>>, interval: Duration) -> Result<Self> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let ticker = channel::tick(interval);

        let handle = thread::Builder::new()
            .name("timestamp".into())
            .spawn(move || loop {
                select! {
                    recv(ticker) -> _ => {
                        if let Err(e) = annotate(&ctx) {
                            error!("could not append timestamp: {}", e);
                        }
                    }
                    recv(stop_rx) -> _ => break,
                }
            })?;

        debug!(?interval, "started timestamp thread");
        Ok(PeriodicAnnotator {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// stops the timestamp thread and waits for it to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // dropping the sender disconnects the channel, which wakes the thread
        drop(self.stop_tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("timestamp thread panicked");
            }
        }
    }
}

impl Drop for PeriodicAnnotator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn annotate<B: StorageBackend>(ctx: &Context<B>) -> Result<()> {
    let entry = timestamp_entry(&Local::now());
    let mut backend = ctx.lock_backend()?;
    backend.append(entry.as_bytes())?;
    debug!(?entry, "appended timestamp");
    Ok(())
}

/// formats `now` as a `timestamp:` command, e.g. `timestamp:Tue, 02 Jan 2024 03:04:05 +0000\n`
pub fn timestamp_entry<Tz>(now: &DateTime<Tz>) -> CommandEntry
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let text = now.format("timestamp:%a, %d %b %Y %T %z\n").to_string();
    CommandEntry::from_delimited(text.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn timestamp_is_an_rfc2822_style_command() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            timestamp_entry(&now).as_bytes(),
            b"timestamp:Tue, 02 Jan 2024 03:04:05 +0000\n"
        );
    }

    #[test]
    fn timestamp_carries_the_local_offset() {
        let offset = FixedOffset::west_opt(7 * 3600).unwrap();
        let now = offset.with_ymd_and_hms(2025, 2, 11, 23, 59, 0).unwrap();
        assert_eq!(
            timestamp_entry(&now).as_bytes(),
            b"timestamp:Tue, 11 Feb 2025 23:59:00 -0700\n"
        );
    }
}
