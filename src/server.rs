use std::io;
use std::io::{BufWriter, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::annotator::{PeriodicAnnotator, TIMESTAMP_INTERVAL};
use crate::assembler::PartialAssembler;
use crate::backend::StorageBackend;
use crate::command::Request;
use crate::error::{AesdError, Result};
use crate::registry::ThreadRegistry;
use crate::shutdown::Shutdown;

/// the port the server listens on by default
pub const DEFAULT_PORT: u16 = 9000;

// size of a single receive from a client
const RECV_CHUNK: usize = 512;

/// Tunables of an [`AesdServer`]
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// keep a connection open for further commands after a reply was sent. By default every
    /// connection serves a single command and is then closed.
    pub keep_alive: bool,

    /// how often a timestamp command is appended, `None` or a zero interval disables timestamps.
    /// Only backends that want timestamps get them.
    pub timestamp_interval: Option<Duration>,

    /// how long a worker waits for client data before checking whether the server is shutting
    /// down
    pub poll_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            keep_alive: false,
            timestamp_interval: Some(TIMESTAMP_INTERVAL),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// State shared by the accept loop, every worker and the timestamp thread.
///
/// The backend sits behind the one shared write lock. The lock is taken to append a command,
/// to open a reader, or to position it, but never while a reply is being sent.
#[derive(Debug)]
pub struct Context<B: StorageBackend> {
    backend: Mutex<B>,
    shutdown: Shutdown,
}

impl<B: StorageBackend> Context<B> {
    /// wraps `backend` and the cancellation token into a shared context
    pub fn new(backend: B, shutdown: Shutdown) -> Self {
        Context {
            backend: Mutex::new(backend),
            shutdown,
        }
    }

    /// acquires the shared write lock
    pub fn lock_backend(&self) -> Result<MutexGuard<'_, B>> {
        self.backend.lock().map_err(|_| AesdError::LockPoisoned)
    }

    /// `true` once termination was requested
    pub fn is_exiting(&self) -> bool {
        self.shutdown.is_triggered()
    }
}

/// A TCP server that appends the commands its clients send to a shared, bounded command log and
/// replies with the log's contents.
///
/// Every connection is served on its own thread. Commands are newline terminated and may arrive
/// in arbitrarily sized pieces. A plain command is appended to the log and answered with the
/// whole log; a seek command (`AESDCHAR_IOCSEEKTO:<cmd>,<offset>`) appends nothing and is answered
/// with the log starting at the requested command and offset.
///
/// # Example
/// Serve a device backend that keeps the last 10 commands on port 9000, until SIGINT or SIGTERM
/// ```rust
/// use aesd::{AesdServer, CharDevice, ServerConfig};
/// # fn main() -> aesd::Result<()> {
/// let server = AesdServer::new(CharDevice::new(10), ServerConfig::default());
/// server.shutdown_handle().install_signal_handler()?;
/// //server.run("0.0.0.0:9000")?;
/// # Ok(())
/// # }
/// ```
pub struct AesdServer<B: StorageBackend> {
    ctx: Arc<Context<B>>,
    config: ServerConfig,
}

impl<B: StorageBackend> AesdServer<B> {
    /// Create a new `AesdServer` storing commands in `backend`.
    pub fn new(backend: B, config: ServerConfig) -> Self {
        AesdServer {
            ctx: Arc::new(Context::new(backend, Shutdown::new())),
            config,
        }
    }

    /// the cancellation token that stops this server
    pub fn shutdown_handle(&self) -> Shutdown {
        self.ctx.shutdown.clone()
    }

    /// Binds to `addr` and serves clients until shutdown is requested.
    ///
    /// # Errors
    /// returns [`AesdError`] if the socket could not be bound, or if accepting a connection failed
    /// for any other reason than a shutdown
    pub fn run<A: ToSocketAddrs>(self, addr: A) -> Result<()> {
        let listener = match TcpListener::bind(addr) {
            Ok(listener) => listener,
            Err(e) => {
                self.close_backend()?;
                return Err(e.into());
            }
        };
        self.run_listener(listener)
    }

    /// Serves clients on an already bound `listener` until shutdown is requested. On the way out
    /// every worker is joined and the backend is closed, also when a worker panicked.
    pub fn run_listener(self, listener: TcpListener) -> Result<()> {
        // everything that can fail happens before the listener is handed to the shutdown token
        let setup = listener
            .local_addr()
            .map_err(AesdError::from)
            .and_then(|addr| {
                info!("Listening on {}", addr);
                self.start_annotator()
            });
        let annotator = match setup {
            Ok(annotator) => annotator,
            Err(e) => {
                self.close_backend()?;
                return Err(e);
            }
        };

        let shutdown = self.shutdown_handle();
        shutdown.watch(&listener);
        let mut registry = ThreadRegistry::new();
        let result = self.accept_loop(&listener, &mut registry);
        shutdown.unwatch();
        drop(listener);

        let joined = registry.drain_all();
        info!(joined, "all workers finished");
        if let Some(annotator) = annotator {
            annotator.stop();
        }
        let closed = self.close_backend();
        result.and(closed)
    }

    fn start_annotator(&self) -> Result<Option<PeriodicAnnotator>> {
        let interval = match self.config.timestamp_interval {
            Some(interval) if !interval.is_zero() => interval,
            Some(_) => {
                warn!("a zero timestamp interval disables timestamps");
                return Ok(None);
            }
            None => return Ok(None),
        };
        if !self.ctx.lock_backend()?.wants_timestamps() {
            return Ok(None);
        }
        PeriodicAnnotator::spawn(Arc::clone(&self.ctx), interval).map(Some)
    }

    /// closes the backend, even if a worker panicked while holding the write lock
    fn close_backend(&self) -> Result<()> {
        let mut backend = self.ctx.backend.lock().unwrap_or_else(|poisoned| {
            warn!("closing the backend after a worker panicked with the write lock held");
            poisoned.into_inner()
        });
        backend.close()
    }

    fn accept_loop(&self, listener: &TcpListener, registry: &mut ThreadRegistry) -> Result<()> {
        while !self.ctx.is_exiting() {
            match listener.accept() {
                Ok((stream, peer)) => {
                    info!("Accepted connection from {}", peer.ip());
                    let ctx = Arc::clone(&self.ctx);
                    let config = self.config.clone();
                    registry.register(peer, move || {
                        if let Err(e) = serve(&ctx, &config, stream, peer) {
                            error!("Error on serving client {}: {}", peer, e);
                        }
                        info!("Closed connection from {}", peer.ip());
                    })?;
                }
                Err(_) if self.ctx.is_exiting() => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("Connection failed: {}", e);
                    return Err(e.into());
                }
            }
            registry.reap_completed();
        }
        Ok(())
    }
}

/// Serves a single client connection.
///
/// Received bytes are assembled into commands. For every complete command the reply is streamed
/// back before the next command is looked at. Unless `keep_alive` is configured, the connection
/// is closed once the commands completed by one receive have been answered.
///
/// Any error aborts the connection without sending anything more; in particular a malformed or
/// out of range seek command gets no reply at all.
fn serve<B: StorageBackend>(
    ctx: &Context<B>,
    config: &ServerConfig,
    tcp: TcpStream,
    peer: SocketAddr,
) -> Result<()> {
    tcp.set_read_timeout(Some(config.poll_interval))?;
    let mut stream_reader = &tcp;
    let mut stream_writer = BufWriter::new(&tcp);
    let mut assembler = PartialAssembler::new();
    let mut buf = [0u8; RECV_CHUNK];

    loop {
        let len = match stream_reader.read(&mut buf) {
            Ok(0) => {
                debug!(%peer, pending = assembler.pending().len(), "client closed the connection");
                return Ok(());
            }
            Ok(len) => len,
            Err(e) if is_timeout(&e) => {
                if ctx.is_exiting() {
                    debug!(%peer, "server is shutting down, closing idle connection");
                    return Ok(());
                }
                continue;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        assembler.feed(&buf[..len])?;

        let commands = assembler.drain_commands();
        if commands.is_empty() {
            continue;
        }
        for command in commands {
            debug!(%peer, ?command, "received command");
            let mut reader = match Request::parse(command)? {
                Request::Store(entry) => {
                    let mut backend = ctx.lock_backend()?;
                    backend.append(entry.as_bytes())?;
                    backend.open_reader()?
                }
                Request::SeekTo {
                    write_cmd,
                    write_cmd_offset,
                } => {
                    let backend = ctx.lock_backend()?;
                    let mut reader = backend.open_reader()?;
                    backend.seek_to(&mut reader, write_cmd, write_cmd_offset)?;
                    reader
                }
            };

            // the write lock is released here, so the reply may include commands that other
            // clients appended since
            let sent = io::copy(&mut reader, &mut stream_writer)?;
            stream_writer.flush()?;
            debug!(%peer, sent, "reply sent");
        }

        if !config.keep_alive {
            if !assembler.is_empty() {
                warn!(%peer, discarded = assembler.pending().len(), "discarding partial command");
            }
            return Ok(());
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
