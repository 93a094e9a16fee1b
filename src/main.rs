//! wg-bridge: `WireGuard` key tool and tunnel self-test
//!
//! This is the command-line entry point.
//!
//! # Usage
//!
//! ```bash
//! # Generate a private key and derive its public key
//! wg-bridge genkey | tee private.key | wg-bridge pubkey
//!
//! # Validate a key
//! wg-bridge check-key "$(cat private.key)"
//!
//! # Run a two-peer handshake and packet exchange in memory
//! WG_BRIDGE_LOG_LEVEL=debug wg-bridge -c /path/to/config.json selftest
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

use wg_bridge::config::{
    apply_env_overrides, create_default_config, load_config_with_env, BridgeConfig,
};
use wg_bridge::tunnel::ResultEnvelope;
use wg_bridge::{Bridge, BoringtunEngine, ResultStatus};

/// Subcommand
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Print a new private key
    GenKey,
    /// Read a private key on stdin, print its public key
    PubKey,
    /// Validate a base64 key
    CheckKey(String),
    /// In-memory two-peer exchange
    SelfTest,
}

/// Command-line arguments
struct Args {
    /// Configuration file path
    config_path: PathBuf,
    /// Generate default configuration
    generate_config: bool,
    /// Check configuration only
    check_config: bool,
    /// Subcommand to run
    command: Option<Command>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config_path = PathBuf::from("/etc/wg-bridge/config.json");
        let mut generate_config = false;
        let mut check_config = false;
        let mut command = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-c" | "--config" => {
                    if let Some(path) = args.next() {
                        config_path = PathBuf::from(path);
                    }
                }
                "-g" | "--generate-config" => {
                    generate_config = true;
                }
                "--check" => {
                    check_config = true;
                }
                "-h" | "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "-v" | "--version" => {
                    println!("wg-bridge v{}", wg_bridge::VERSION);
                    std::process::exit(0);
                }
                "genkey" => command = Some(Command::GenKey),
                "pubkey" => command = Some(Command::PubKey),
                "selftest" => command = Some(Command::SelfTest),
                "check-key" => {
                    let Some(key) = args.next() else {
                        eprintln!("check-key requires a key argument");
                        std::process::exit(1);
                    };
                    command = Some(Command::CheckKey(key));
                }
                _ => {
                    eprintln!("Unknown argument: {arg}");
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        Self {
            config_path,
            generate_config,
            check_config,
            command,
        }
    }
}

fn print_help() {
    println!(
        r#"wg-bridge v{}

WireGuard tunnel sessions over boringtun, as a key tool and self-test.

USAGE:
    wg-bridge [OPTIONS] <COMMAND>

COMMANDS:
    genkey                  Print a new base64 private key
    pubkey                  Read a private key on stdin, print its public key
    check-key <KEY>         Exit 0 if KEY is a base64 X25519 key, 1 otherwise
    selftest                Run a two-peer handshake and packet exchange in memory

OPTIONS:
    -c, --config <PATH>     Configuration file path [default: /etc/wg-bridge/config.json]
    -g, --generate-config   Generate default configuration and exit
    --check                 Check configuration and exit
    -h, --help              Print help information
    -v, --version           Print version information

ENVIRONMENT:
    WG_BRIDGE_BUFFER_CAPACITY   Override output buffer capacity
    WG_BRIDGE_INDEX_POLICY      Override peer index policy (any_i32, positive_only)
    WG_BRIDGE_LOG_LEVEL         Override log level (trace, debug, info, warn, error)
"#,
        wg_bridge::VERSION
    );
}

/// Initialize logging on stderr, keeping stdout for command output
fn init_logging(config: &BridgeConfig) {
    let level = match config.log.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    if let Ok(directive) = "boringtun=warn".parse() {
        filter = filter.add_directive(directive);
    }

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.log.target)
        .with_writer(std::io::stderr);

    if config.log.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Load the configuration file, or defaults when it does not exist
fn load_or_default(path: &Path) -> Result<BridgeConfig> {
    if path.exists() {
        return load_config_with_env(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()));
    }

    let mut config = BridgeConfig::default();
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())
        .context("Invalid environment override")?;
    Ok(config)
}

fn describe(envelope: &ResultEnvelope) -> String {
    serde_json::to_string(envelope).unwrap_or_else(|_| envelope.status().to_string())
}

/// Expect a status, or fail the self-test
fn expect_status(step: &str, envelope: &ResultEnvelope, expected: ResultStatus) -> Result<()> {
    info!("{step}: {}", describe(envelope));
    if envelope.status() != expected {
        bail!("{step}: expected {expected}, got {}", envelope.status());
    }
    Ok(())
}

/// Minimal IPv4 header carrying no payload
fn probe_packet() -> Vec<u8> {
    let mut packet = vec![0u8; 20];
    packet[0] = 0x45;
    packet[3] = 20;
    packet[8] = 64;
    packet[12..16].copy_from_slice(&[10, 0, 0, 1]);
    packet[16..20].copy_from_slice(&[10, 0, 0, 2]);
    packet
}

fn selftest(bridge: &Bridge<BoringtunEngine>) -> Result<()> {
    let start = Instant::now();
    let a = bridge.generate_key_pair();
    let b = bridge.generate_key_pair();

    let mut initiator = bridge.create_session(&a.private_key, &b.public_key, "", 25, 1)?;
    let mut responder = bridge.create_session(&b.private_key, &a.public_key, "", 25, 2)?;

    let init = initiator.force_handshake()?;
    expect_status("initiation", &init, ResultStatus::WriteToNetwork)?;

    let response = responder.read(init.data().unwrap_or_default())?;
    expect_status("response", &response, ResultStatus::WriteToNetwork)?;

    let keepalive = initiator.read(response.data().unwrap_or_default())?;
    expect_status("keepalive", &keepalive, ResultStatus::WriteToNetwork)?;

    let confirmed = responder.read(keepalive.data().unwrap_or_default())?;
    expect_status("confirm", &confirmed, ResultStatus::Done)?;

    let packet = probe_packet();
    let sealed = initiator.write(&packet)?;
    expect_status("encapsulate", &sealed, ResultStatus::WriteToNetwork)?;

    let opened = responder.read(sealed.data().unwrap_or_default())?;
    expect_status("decapsulate", &opened, ResultStatus::WriteToTunnelIpv4)?;
    if opened.data() != Some(packet.as_slice()) {
        bail!("decapsulated packet differs from the original");
    }

    debug!("initiator stats: {:?}", initiator.stats());
    initiator.close();
    responder.close();

    println!("selftest passed in {:?}", start.elapsed());
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.generate_config {
        create_default_config(&args.config_path)?;
        println!("Generated default configuration at {:?}", args.config_path);
        return Ok(());
    }

    let config = load_or_default(&args.config_path)?;

    if args.check_config {
        println!("Configuration is valid");
        return Ok(());
    }

    init_logging(&config);
    debug!("wg-bridge v{}", wg_bridge::VERSION);

    let bridge = Bridge::boringtun(config)?;

    match args.command {
        None => {
            print_help();
            std::process::exit(1);
        }
        Some(Command::GenKey) => {
            println!("{}", bridge.generate_secret_key_base64());
        }
        Some(Command::PubKey) => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read private key from stdin")?;
            println!("{}", bridge.public_key_from_base64(input.trim())?);
        }
        Some(Command::CheckKey(key)) => {
            if bridge.check_base64_encoded_x25519_key(key.trim()) {
                println!("valid");
            } else {
                println!("invalid");
                std::process::exit(1);
            }
        }
        Some(Command::SelfTest) => selftest(&bridge)?,
    }

    Ok(())
}
