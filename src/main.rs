use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};

use metawear::domain::models::{BoardEvent, GattStatus};
use metawear::domain::settings::{BoardConfig, SettingsService};
use metawear::infrastructure::bluetooth::gatt::NOTIFY_CHAR;
use metawear::infrastructure::bluetooth::recording::RecordingTransport;
use metawear::infrastructure::bluetooth::{MetaWearBoard, TransportEvent};
use metawear::infrastructure::logging::init_logger;
use metawear::protocol::catalog::Module;
use metawear::protocol::wire::{parse_hex, to_hex};
use metawear::protocol::{CommandEncoder, Dispatcher, RegisterCatalog};

#[derive(Parser)]
#[command(name = "metawear-cli")]
#[command(about = "Encode, decode and replay MetaWear register traffic")]
struct Cli {
    /// Log level, overrides the configured one
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the bytes of a register command
    Encode {
        /// Module name or id (`led`, `2`, `0x02`)
        module: String,
        /// Register name or id
        register: String,
        /// Build a read instead of a write
        #[arg(long)]
        read: bool,
        /// Parameter bytes in hex
        params: Vec<String>,
    },
    /// Decode one inbound buffer
    Decode {
        /// Buffer in hex, e.g. `04 81 00 64`
        hex: String,
    },
    /// Feed a capture file through a board and print every event
    Replay {
        /// One hex buffer per line, `#` starts a comment
        file: PathBuf,
        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// List the register catalog
    Modules,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = SettingsService::new().unwrap_or_else(|e| {
        eprintln!("Failed to load settings, using defaults: {}", e);
        SettingsService::with_path(PathBuf::from("settings.json"))
    });
    let mut log_settings = settings.get().log_settings.clone();
    if let Some(level) = cli.log_level {
        log_settings.level = level;
    }
    let _guard = init_logger(&log_settings)?;

    let config = settings.board_config();
    let catalog = Arc::new(RegisterCatalog::standard().context("register catalog is invalid")?);

    match cli.command {
        Commands::Encode {
            module,
            register,
            read,
            params,
        } => encode(&catalog, &config, &module, &register, read, &params),
        Commands::Decode { hex } => decode(&catalog, &hex),
        Commands::Replay { file, json } => replay(catalog, config, &file, json),
        Commands::Modules => {
            list_modules(&catalog);
            Ok(())
        }
    }
}

fn encode(
    catalog: &Arc<RegisterCatalog>,
    config: &BoardConfig,
    module: &str,
    register: &str,
    read: bool,
    params: &[String],
) -> anyhow::Result<()> {
    let module = resolve_module(catalog, module)?;
    let register = resolve_register(module, register)?;
    let params = parse_hex(&params.join(" "))?;

    let encoder = CommandEncoder::new(catalog.clone(), config.max_command_len);
    let command = if read {
        encoder.read(module.id(), register, &params)
    } else {
        encoder.write(module.id(), register, &params)
    }?;
    println!("{}", command);
    Ok(())
}

fn decode(catalog: &Arc<RegisterCatalog>, hex: &str) -> anyhow::Result<()> {
    let bytes = parse_hex(hex)?;
    match Dispatcher::new(catalog.clone()).decode(&bytes) {
        Ok(Some(event)) => println!("{:?}", event),
        Ok(None) => println!("no payload"),
        Err(reason) => bail!("dropped: {:?}", reason),
    }
    Ok(())
}

/// Runs a board over a recording transport, treats every line of the file
/// as a notification and completes every operation the board starts.
fn replay(
    catalog: Arc<RegisterCatalog>,
    config: BoardConfig,
    file: &PathBuf,
    json: bool,
) -> anyhow::Result<()> {
    let capture = fs::read_to_string(file)
        .with_context(|| format!("failed to read capture {}", file.display()))?;

    let transport = RecordingTransport::new();
    let (events, mut rx) = mpsc::unbounded_channel();
    let mut board = MetaWearBoard::with_catalog(transport.clone(), catalog, config, events);

    board.handle(TransportEvent::Connected {
        device: file.display().to_string(),
    });
    board.handle(TransportEvent::ServicesDiscovered {
        notifiable: vec![NOTIFY_CHAR],
    });
    complete_operations(&mut board, &transport);

    let mut buffers = 0;
    for (number, line) in capture.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let bytes = match parse_hex(line) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Skipping line {}: {}", number + 1, e);
                continue;
            }
        };
        buffers += 1;
        board.handle(TransportEvent::CharacteristicChanged {
            characteristic: NOTIFY_CHAR,
            value: bytes,
        });
        complete_operations(&mut board, &transport);

        while let Ok(event) = rx.try_recv() {
            print_event(&event, json)?;
        }
    }

    board.disconnect();
    while let Ok(event) = rx.try_recv() {
        print_event(&event, json)?;
    }
    info!("Replayed {} buffer(s) from {}", buffers, file.display());
    Ok(())
}

fn complete_operations(board: &mut MetaWearBoard<RecordingTransport>, transport: &RecordingTransport) {
    use metawear::infrastructure::bluetooth::recording::TransportCall;

    loop {
        let calls = transport.take_calls();
        if calls.is_empty() {
            return;
        }
        for call in calls {
            info!("-> {}", call);
            let completion = match call {
                TransportCall::EnableNotifications(characteristic) => {
                    TransportEvent::DescriptorWritten {
                        characteristic,
                        status: GattStatus::Success,
                    }
                }
                TransportCall::Write { characteristic, .. } => TransportEvent::CharacteristicWritten {
                    characteristic,
                    status: GattStatus::Success,
                },
                TransportCall::Read(characteristic) => TransportEvent::CharacteristicRead {
                    characteristic,
                    status: GattStatus::Success,
                    value: Vec::new(),
                },
                TransportCall::Disconnect => continue,
            };
            board.handle(completion);
        }
    }
}

fn print_event(event: &BoardEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else if let BoardEvent::Dropped { bytes, reason } = event {
        println!("dropped [{}]: {:?}", to_hex(bytes), reason);
    } else {
        println!("{:?}", event);
    }
    Ok(())
}

fn list_modules(catalog: &RegisterCatalog) {
    for module in catalog.modules() {
        println!("{:#04x} {}", module.id(), module.name());
        for register in module.registers() {
            println!(
                "    {:#04x} {:<28} write {:<10} read {}",
                register.id,
                register.name,
                register.write.describe(),
                register.read.describe()
            );
        }
    }
}

fn parse_id(s: &str) -> Option<u8> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn resolve_module<'a>(catalog: &'a RegisterCatalog, name: &str) -> anyhow::Result<&'a Module> {
    parse_id(name)
        .and_then(|id| catalog.module(id))
        .or_else(|| catalog.module_by_name(name))
        .ok_or_else(|| anyhow!("unknown module '{}'", name))
}

fn resolve_register(module: &Module, name: &str) -> anyhow::Result<u8> {
    if let Some(id) = parse_id(name) {
        return Ok(id);
    }
    module
        .registers()
        .into_iter()
        .find(|r| r.name.eq_ignore_ascii_case(name))
        .map(|r| r.id)
        .ok_or_else(|| anyhow!("module {} has no register '{}'", module.name(), name))
}
