//! this binary starts the aesd socket server
//! to see the list of options, type: `aesdsocket --help`

use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;

use aesd::backend::DATA_FILE_PATH;
use aesd::{
    daemonize, AesdError, AesdServer, CharDevice, FileBackend, Result, ServerConfig,
    StorageBackend,
};
use clap::{arg_enum, crate_version, value_t, App, Arg};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

arg_enum! {
    #[allow(non_camel_case_types)]
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    enum Backend {
        file,
        device
    }
}

const DEFAULT_ADDRESS: &str = "0.0.0.0:9000";
const DEFAULT_BACKEND: Backend = Backend::file;
const DEFAULT_CAPACITY: &str = "10";
const DEFAULT_TIMESTAMP_INTERVAL: &str = "10";

/// ['Opt'] holds parsed and validated options from the command line
#[derive(Debug)]
struct Opt {
    addr: SocketAddr,
    backend: Backend,
    data_file: PathBuf,
    capacity: usize,
    timestamp_interval: Option<Duration>,
    keep_alive: bool,
    daemon: bool,
}

impl Opt {
    /// validates the raw option values
    /// returns `Ok<Opt>` if everything is valid
    /// # Errors
    /// returns [`AesdError::Parsing`] if one of the parameters is invalid
    ///
    fn build(
        addr: &str,
        backend: Backend,
        data_file: &str,
        capacity: &str,
        timestamp_interval: &str,
    ) -> Result<Opt> {
        let addr: SocketAddr = addr.parse().map_err(|_| {
            AesdError::Parsing(format!("could not parse {} into an IP address and port", addr))
        })?;

        let capacity = match capacity.parse::<usize>() {
            Ok(capacity) if capacity > 0 => capacity,
            _ => {
                return Err(AesdError::Parsing(format!(
                    "the capacity must be a positive integer, got: {}",
                    capacity
                )))
            }
        };

        // 0 turns timestamps off
        let timestamp_interval = match timestamp_interval.parse::<u64>() {
            Ok(0) => None,
            Ok(secs) => Some(Duration::from_secs(secs)),
            Err(_) => {
                return Err(AesdError::Parsing(format!(
                    "the timestamp interval must be a number of seconds, got: {}",
                    timestamp_interval
                )))
            }
        };

        Ok(Opt {
            addr,
            backend,
            data_file: PathBuf::from(data_file),
            capacity,
            timestamp_interval,
            keep_alive: false,
            daemon: false,
        })
    }
}

fn main() {
    let matches = App::new("aesdsocket")
        .version(crate_version!())
        .author("strohs <strohs1@gmail.com>")
        .about("a multi-threaded, bounded command log server")
        .arg(Arg::with_name("daemon")
            .short("d")
            .long("daemon")
            .help("runs the server as a daemon, once the socket is bound"))
        .arg(Arg::with_name("addr")
            .long("addr")
            .value_name("IP_ADDR:PORT")
            .help("sets the IP_ADDR:PORT that the server listens on")
            .default_value(DEFAULT_ADDRESS))
        .arg(Arg::with_name("backend")
            .long("backend")
            .value_name("BACKEND")
            .help("sets the storage backend to use, either 'file' or 'device'")
            .possible_values(&Backend::variants())
            .default_value("file"))
        .arg(Arg::with_name("data-file")
            .long("data-file")
            .value_name("PATH")
            .help("sets the data file used by the 'file' backend")
            .default_value(DATA_FILE_PATH))
        .arg(Arg::with_name("capacity")
            .long("capacity")
            .value_name("COMMANDS")
            .help("sets how many commands the 'device' backend retains")
            .default_value(DEFAULT_CAPACITY))
        .arg(Arg::with_name("timestamp-interval")
            .long("timestamp-interval")
            .value_name("SECONDS")
            .help("sets how often a timestamp is written by the 'file' backend, 0 disables it")
            .default_value(DEFAULT_TIMESTAMP_INTERVAL))
        .arg(Arg::with_name("keep-alive")
            .long("keep-alive")
            .help("keeps connections open for more commands after a reply"))
        .arg(Arg::with_name("verbose")
            .short("v")
            .long("verbose")
            .help("logs every event, not just connections and errors"))
        .get_matches();

    // set up a tracing subscriber to log to STDERR
    subscriber_config(matches.is_present("verbose"));

    let backend = value_t!(matches, "backend", Backend).unwrap_or(DEFAULT_BACKEND);
    let opt = Opt::build(
        matches.value_of("addr").unwrap_or(DEFAULT_ADDRESS),
        backend,
        matches.value_of("data-file").unwrap_or(DATA_FILE_PATH),
        matches.value_of("capacity").unwrap_or(DEFAULT_CAPACITY),
        matches.value_of("timestamp-interval").unwrap_or(DEFAULT_TIMESTAMP_INTERVAL),
    )
    .map(|opt| Opt {
        keep_alive: matches.is_present("keep-alive"),
        daemon: matches.is_present("daemon"),
        ..opt
    });
    let opt = match opt {
        Ok(opt) => opt,
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    };

    // start the server
    if let Err(e) = run(opt) {
        error!("{}", e);
        eprintln!("{}", e);
        exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    info!("aesdsocket {}", env!("CARGO_PKG_VERSION"));
    info!("Storage backend: {}", opt.backend);

    match opt.backend {
        Backend::file => run_with_backend(FileBackend::open(&opt.data_file)?, &opt),
        Backend::device => run_with_backend(CharDevice::new(opt.capacity), &opt),
    }
}

fn run_with_backend<B: StorageBackend>(mut backend: B, opt: &Opt) -> Result<()> {
    let listener = match TcpListener::bind(opt.addr) {
        Ok(listener) => listener,
        Err(e) => {
            backend.close()?;
            return Err(e.into());
        }
    };

    // the fork has to happen before any thread is started
    if opt.daemon {
        if let Err(e) = daemonize() {
            backend.close()?;
            return Err(e);
        }
    }

    let config = ServerConfig {
        keep_alive: opt.keep_alive,
        timestamp_interval: opt.timestamp_interval,
        ..ServerConfig::default()
    };
    let server = AesdServer::new(backend, config);
    server.shutdown_handle().install_signal_handler()?;
    server.run_listener(listener)?;
    info!("server stopped");
    Ok(())
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config(verbose: bool) {
    let level = if verbose { Level::TRACE } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        // all spans/events at `level` or more severe will be written
        .with_max_level(level)
        // log to stderr instead of stdout
        .with_writer(std::io::stderr)
        // completes the builder.
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting tracing default subscriber failed: {}", e);
    }
}
