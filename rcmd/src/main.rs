//! `rcmd` command-line front end.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgGroup, Args, Parser, Subcommand};
use log::debug;

use rcmd::check;
use rcmd::driver::config::MAX_TIMEOUT_SECS;
use rcmd::inventory::{Device, Inventory, ToolConfig, select};
use rcmd::transport::ConnectionMethod;
use rcmd::{DeviceType, Error, Result, Transcript};

/// Run scripted CLI sessions on network devices.
#[derive(Parser, Debug)]
#[command(name = "rcmd", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a command file on one device
    Run(RunArgs),
    /// Find a working connection method and detect the device OS
    Discover(DiscoverArgs),
    /// Print a device's inventory record
    Info(InfoArgs),
    /// Audit an inventory record against the device
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Config file
    #[arg(short = 'i', long = "cfgfile")]
    config: PathBuf,

    /// Command file, one directive per line
    #[arg(short = 'c', long = "cmdfile")]
    commands: PathBuf,

    /// Mirror all device output and log at debug level
    #[arg(short, long)]
    debug: bool,

    /// Per-command timeout in seconds (default from config)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS))]
    timeout: Option<u64>,

    /// Write command output to this file instead of stdout
    #[arg(short = 'l', long = "logfile")]
    logfile: Option<PathBuf>,

    /// Detect the device OS even when the inventory has a type
    #[arg(long)]
    detect: bool,

    /// Device as hostname,ip,devicetype,connmethod,proxyid,authid
    #[arg(long, conflicts_with_all = ["host", "search"])]
    custom_host: Option<String>,

    /// Pick from inventory hosts whose name contains every term
    #[arg(short, long, value_name = "TERMS", conflicts_with = "host")]
    search: Option<String>,

    /// Inventory hostname
    #[arg(required_unless_present_any = ["custom_host", "search"])]
    host: Option<String>,
}

#[derive(Args, Debug)]
struct DiscoverArgs {
    /// Config file
    #[arg(short = 'i', long = "cfgfile")]
    config: PathBuf,

    /// Hostname of the device
    #[arg(long)]
    host: String,

    /// Management IP of the device
    #[arg(long)]
    ip: String,

    /// Proxy to try; repeat to cycle through several (default: direct)
    #[arg(short, long)]
    proxy: Vec<u32>,

    /// Auth id to use
    #[arg(short, long, default_value_t = 1)]
    auth: u32,

    /// Mirror all device output and log at debug level
    #[arg(short, long)]
    debug: bool,

    /// Per-command timeout in seconds (default from config)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS))]
    timeout: Option<u64>,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Config file
    #[arg(short = 'i', long = "cfgfile")]
    config: PathBuf,

    /// Print JSON
    #[arg(short, long)]
    json: bool,

    /// Pick from inventory hosts whose name contains every term
    #[arg(short, long, value_name = "TERMS", conflicts_with = "host")]
    search: Option<String>,

    /// Inventory hostname
    #[arg(required_unless_present = "search")]
    host: Option<String>,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("audit").required(true).args(["dtype", "hostname", "ip"])))]
struct CheckArgs {
    /// Config file
    #[arg(short = 'i', long = "cfgfile")]
    config: PathBuf,

    /// Compare the recorded device type with the detected one
    #[arg(long)]
    dtype: bool,

    /// Compare the recorded hostname with the device prompt
    #[arg(long)]
    hostname: bool,

    /// Compare the recorded management IP with this address
    #[arg(short = 'm', long, value_name = "MGMT_IP")]
    ip: Option<String>,

    /// Mirror all device output and log at debug level
    #[arg(short, long)]
    debug: bool,

    /// Per-command timeout in seconds (default from config)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS))]
    timeout: Option<u64>,

    /// Pick from inventory hosts whose name contains every term
    #[arg(short, long, value_name = "TERMS", conflicts_with = "host")]
    search: Option<String>,

    /// Inventory hostname
    #[arg(required_unless_present = "search")]
    host: Option<String>,
}

impl Command {
    fn debug(&self) -> bool {
        match self {
            Command::Run(args) => args.debug,
            Command::Discover(args) => args.debug,
            Command::Info(_) => false,
            Command::Check(args) => args.debug,
        }
    }

    /// Name used in error diagnostics.
    fn label(&self) -> String {
        let (host, alternative) = match self {
            Command::Run(args) => (&args.host, args.custom_host.as_ref().or(args.search.as_ref())),
            Command::Discover(args) => return args.host.clone(),
            Command::Info(args) => (&args.host, args.search.as_ref()),
            Command::Check(args) => (&args.host, args.search.as_ref()),
        };
        host.as_ref().or(alternative).cloned().unwrap_or_default()
    }
}

fn init_logging(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if debug {
        builder.filter_module("rcmd", log::LevelFilter::Debug);
    }
    builder.init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.command.debug());

    let label = cli.command.label();
    if label.starts_with(['#', '!']) {
        println!("Skipping - {}", label);
        return ExitCode::FAILURE;
    }

    let result = match &cli.command {
        Command::Run(args) => run(args).await,
        Command::Discover(args) => discover(args).await,
        Command::Info(args) => info(args),
        Command::Check(args) => audit(args).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("ERROR: {} - {}", e, label);
            ExitCode::FAILURE
        }
    }
}

fn command_timeout(config: &ToolConfig, timeout: Option<u64>) -> Duration {
    timeout.map(Duration::from_secs).unwrap_or(config.timeout())
}

/// Look a device up by hostname, or by search terms with a numbered menu.
fn inventory_device(
    config: &ToolConfig,
    host: Option<&str>,
    search: Option<&str>,
) -> Result<Device> {
    let inventory = config.load_inventory()?;
    match (host, search) {
        (Some(host), _) => inventory.lookup(host),
        (None, Some(terms)) => {
            let terms: Vec<&str> = terms.split_whitespace().collect();
            select(&inventory, &terms, io::stdin().lock(), io::stdout())
        }
        (None, None) => Err(Error::config("no host given")),
    }
}

async fn run(args: &RunArgs) -> Result<ExitCode> {
    let config = ToolConfig::load(&args.config)?;
    let device = match &args.custom_host {
        Some(record) => Device::parse_custom(record)?,
        None => inventory_device(&config, args.host.as_deref(), args.search.as_deref())?,
    };

    let script = std::fs::read_to_string(&args.commands).map_err(|e| {
        Error::config(format!(
            "Unable to open cmdfile {}: {}",
            args.commands.display(),
            e
        ))
    })?;

    let sink: Box<dyn Write> = match &args.logfile {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    };
    let mut transcript = Transcript::new(sink);

    let session_config = config
        .session_config()
        .with_command_timeout(command_timeout(&config, args.timeout));
    let mut session = config
        .session_builder(&device)?
        .config(session_config)
        .detect_os(args.detect)
        .debug(args.debug)
        .connect()
        .await?;

    let outcome = session
        .execute_script(script.lines(), |exchange| {
            transcript.record(exchange).map_err(Error::from)
        })
        .await;
    session.disconnect().await;
    outcome?;

    transcript.finish(&session.target())?;
    Ok(ExitCode::SUCCESS)
}

async fn discover(args: &DiscoverArgs) -> Result<ExitCode> {
    let config = ToolConfig::load(&args.config)?;
    let session_config = config
        .session_config()
        .with_command_timeout(command_timeout(&config, args.timeout));
    let proxies = if args.proxy.is_empty() {
        vec![0]
    } else {
        args.proxy.clone()
    };

    for proxy in proxies {
        for method in [ConnectionMethod::Ssh, ConnectionMethod::Telnet] {
            let device = Device::new(
                &args.host,
                &args.ip,
                DeviceType::Unknown,
                method,
                proxy,
                args.auth,
            );
            if args.debug {
                println!(
                    "!!! Connecting to {} ({}) using {} ({}) !!!",
                    device.hostname,
                    device.ip,
                    method.name(),
                    proxy
                );
            }

            let attempt = config
                .session_builder(&device)?
                .config(session_config.clone())
                .detect_os(true)
                .debug(args.debug)
                .connect()
                .await;

            match attempt {
                Ok(mut session) => {
                    let provided = device.hostname.to_lowercase();
                    let detected = session
                        .detected_hostname()
                        .unwrap_or(&device.hostname)
                        .to_lowercase();
                    if detected != provided {
                        print!(
                            "Hostname mismatch (Provided == {} but detected == {}) - ",
                            provided, detected
                        );
                    }
                    let found = Device::new(
                        detected,
                        device.ip,
                        session.device_type(),
                        method,
                        proxy,
                        args.auth,
                    );
                    println!("{}", found);
                    session.disconnect().await;
                    return Ok(ExitCode::SUCCESS);
                }
                Err(Error::UnknownDeviceType) => return Err(Error::UnknownDeviceType),
                Err(e) => {
                    debug!("{} via {} ({}): {}", args.host, method.name(), proxy, e);
                    if args.debug {
                        println!("ERROR: {} - {} {} ({})", e, args.host, args.ip, proxy);
                    }
                }
            }
        }
    }

    eprintln!("ERROR: Unable to discover {} - {}", args.host, args.ip);
    Ok(ExitCode::FAILURE)
}

fn info(args: &InfoArgs) -> Result<ExitCode> {
    let config = ToolConfig::load(&args.config)?;
    let device = inventory_device(&config, args.host.as_deref(), args.search.as_deref())?;

    if args.json {
        let json = serde_json::to_string_pretty(&device)
            .map_err(|e| Error::config(format!("Failed to serialize device: {}", e)))?;
        println!("{}", json);
    } else {
        println!("{}", device.hostname);
        println!("{}", device.ip);
        println!("{}", device.type_code);
        println!("{}", device.connection);
        println!("{}", device.proxy_id);
        println!("{}", device.auth_id);
    }
    Ok(ExitCode::SUCCESS)
}

async fn audit(args: &CheckArgs) -> Result<ExitCode> {
    let config = ToolConfig::load(&args.config)?;
    let device = inventory_device(&config, args.host.as_deref(), args.search.as_deref())?;

    let result = match &args.ip {
        Some(ip) => check::management_ip(&device, ip),
        None => {
            let session_config = config
                .session_config()
                .with_command_timeout(command_timeout(&config, args.timeout));
            let mut session = config
                .session_builder(&device)?
                .config(session_config)
                .detect_os(args.dtype)
                .debug(args.debug)
                .connect()
                .await?;
            let result = if args.dtype {
                check::device_type(&device, session.device_type())
            } else {
                check::hostname(&device, session.detected_hostname())
            };
            session.disconnect().await;
            result
        }
    };

    println!("{}", result);
    Ok(if result.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
