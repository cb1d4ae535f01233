//! The aesd-client executable supports the following command line arguments:
//!
//! `aesd-client send <TEXT> [--addr IP-PORT]`
//!
//!     Append TEXT (and a newline) to the server's log and print the whole log.
//!     --addr accepts an IP address, either v4 or v6, and a port number, with the format IP:PORT. If --addr is not specified then connect on 127.0.0.1:9000.
//!     Print an error and return a non-zero exit code on a connection error, or if IP-PORT does not parse as an address.
//!
//! `aesd-client seek <COMMAND> <OFFSET> [--addr IP-PORT]`
//!
//!     Print the server's log, starting at byte OFFSET of the COMMANDth stored command (0 is the oldest).
//!     An empty reply means the server rejected the position, this is reported as an error.
//!
//! `aesd-client -V`
//!
//!     Print the version.

use std::io::Write;
use std::net::SocketAddr;

use aesd::{AesdClient, AesdError, Request, Result};
use clap::{crate_version, App, AppSettings, Arg, ArgMatches, SubCommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

const DEFAULT_ADDRESS: &str = "127.0.0.1:9000";

/// ['Opt'] holds parsed and validated options from the command line
#[derive(Debug)]
struct Opt {
    /// the server's ip:port
    addr: SocketAddr,
    req: Request,
}

impl Opt {
    /// validates the `addr` parameter is a valid IP address and PORT
    /// returns `Ok<Opt>` if everything is valid
    /// # Errors
    /// returns [`AesdError::Parsing`] if one of the parameters is invalid
    ///
    fn build(addr: &str, req: Request) -> Result<Opt> {
        let addr: SocketAddr = addr.parse().map_err(|_| {
            AesdError::Parsing(format!("could not parse {} into an IP address and port", addr))
        })?;

        Ok(Opt { addr, req })
    }
}

fn main() -> Result<()> {
    // configure a subscriber that will log messages to STDERR
    subscriber_config();

    let matches = App::new("aesd-client")
        .version(crate_version!())
        .author("strohs <strohs1@gmail.com>")
        .about("a client for the aesd command log server")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommands(vec![
            SubCommand::with_name("send")
                .about("Append a command to the log and print the whole log")
                .arg(Arg::with_name("TEXT").required(true).index(1)),
            SubCommand::with_name("seek")
                .about("Print the log starting at a stored command and offset")
                .arg(Arg::with_name("COMMAND").required(true).index(1))
                .arg(Arg::with_name("OFFSET").required(true).index(2)),
        ])
        .arg(Arg::with_name("addr")
            .long("addr")
            .value_name("IP_ADDR:PORT")
            .help("sets the IP_ADDR:PORT of the server to connect to")
            .default_value(DEFAULT_ADDRESS))
        .get_matches();

    let opt = parse_options(&matches)?;
    run(opt)
}

/// sends the specified request to the server and prints the reply to STDOUT
fn run(opt: Opt) -> Result<()> {
    let client = AesdClient::new(opt.addr);
    let reply = match opt.req {
        Request::Store(entry) => client.request(entry.as_bytes())?,
        Request::SeekTo {
            write_cmd,
            write_cmd_offset,
        } => {
            let reply = client.seek_to(write_cmd, write_cmd_offset)?;
            if reply.is_empty() {
                return Err(AesdError::StringErr(format!(
                    "the server rejected seek position {},{}",
                    write_cmd, write_cmd_offset
                )));
            }
            reply
        }
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    out.write_all(&reply)?;
    out.flush()?;
    Ok(())
}

/// parses the matches from the command line into an [`Opt`] struct
fn parse_options(matches: &ArgMatches) -> Result<Opt> {
    let addr = matches.value_of("addr").unwrap_or(DEFAULT_ADDRESS);
    match matches.subcommand() {
        ("send", Some(args)) => {
            let mut text = args.value_of("TEXT").unwrap_or_default().to_string();
            if text.contains('\n') {
                return Err(AesdError::Parsing("TEXT must be a single line".to_string()));
            }
            text.push('\n');
            Opt::build(addr, Request::parse(aesd::CommandEntry::new(text)?)?)
        }
        ("seek", Some(args)) => {
            let write_cmd = parse_u32(args.value_of("COMMAND"), "COMMAND")?;
            let write_cmd_offset = parse_u32(args.value_of("OFFSET"), "OFFSET")?;
            Opt::build(
                addr,
                Request::SeekTo {
                    write_cmd,
                    write_cmd_offset,
                },
            )
        }
        _ => Err(AesdError::Parsing("unknown command received".to_string())),
    }
}

fn parse_u32(value: Option<&str>, name: &str) -> Result<u32> {
    let value = value.unwrap_or_default();
    value.parse().map_err(|_| {
        AesdError::Parsing(format!("{} must be an unsigned integer, got: {}", name, value))
    })
}

/// configures a tracing subscriber that will log warnings and errors to STDERR
fn subscriber_config() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        // log to stderr instead of stdout
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting tracing default subscriber failed: {}", e);
    }
}
