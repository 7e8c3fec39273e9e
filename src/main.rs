use clap::{ArgAction, Parser, Subcommand};
use env_logger::Builder;
use log::{info, LevelFilter};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use vsensor::config::{BLOCK_SIZE, IMAGE_DIR};
use vsensor::{HostReader, StorageReader};

#[derive(Parser)]
#[command(name = "vsensor", about = "Virtual camera sensor: stream pre-loaded JPEGs from an SD card in fixed-size blocks")]
struct Cli {
    /// Directory acting as the SD card root (must contain images/)
    #[arg(short, long, default_value = ".")]
    card: PathBuf,
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalogued images
    List {
        /// Emit the catalogue as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one catalogue entry, checksum included
    Info {
        index: usize,
    },
    /// Stream an image block by block
    Stream {
        index: usize,
        /// Write the reassembled image here
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Re-read these blocks after the sequential pass, as for NACKs
        #[arg(long, num_args = 1..)]
        resend: Vec<u32>,
    },
    /// Hex-dump a single block
    Block {
        index: usize,
        block: u32,
    },
    /// Fletcher-16 of one image, or of all of them
    Checksum {
        index: Option<usize>,
    },
    /// One wake cycle: mount, report, unmount
    Cycle,
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    Builder::new()
        .format(|buf, record| {
            writeln!(buf, "[{} {}] {}", buf.timestamp_seconds(), record.level(), record.args())
        })
        .filter(None, level)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if std::env::var("RUST_LOG").is_err() {
        init_logger(cli.verbose);
    } else {
        env_logger::init();
    }

    let mut reader = StorageReader::host(&cli.card);
    let result = run(&mut reader, cli.command);
    // The card never stays powered past the command, whatever happened.
    reader.unmount();
    result
}

fn run(reader: &mut HostReader, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { json } => {
            reader.mount()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reader.manifest())?);
            } else {
                println!("{:>3}  {:<40} {:>10} {:>7}", "#", "Path", "Size", "Blocks");
                for (i, e) in reader.entries().enumerate() {
                    println!("{:>3}  {:<40} {:>10} {:>7}", i, e.path, e.file_size, e.total_blocks);
                }
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { index } => {
            reader.mount()?;
            let e = reader.entry_with_checksum(index)?;
            if let Some(card) = reader.card_info() {
                println!("  Card           {} ({} MB)", card.kind, card.size_mb());
            }
            println!("  Path           {}", e.path);
            println!("  Size           {} B", e.file_size);
            println!("  Blocks         {} x {} B", e.total_blocks, BLOCK_SIZE);
            println!("  Fletcher-16    0x{:04X}", e.checksum);
        }

        // ── Stream ───────────────────────────────────────────────────────────
        Commands::Stream { index, output, resend } => {
            reader.mount()?;
            reader.open_stream(index)?;
            let mut sink = match &output {
                Some(path) => Some(File::create(path)?),
                None       => None,
            };
            let mut bytes = 0usize;
            while let Some(block) = reader.read_next_block()? {
                bytes += block.length;
                if let Some(f) = sink.as_mut() {
                    f.write_all(block.payload())?;
                }
                if block.is_last {
                    println!("  last block {} ({} B)", block.block_index, block.length);
                }
            }
            for k in resend {
                let block = reader.read_block_at(k)?;
                println!("  resent block {} ({} B)", block.block_index, block.length);
            }
            reader.close_stream();
            println!("Streamed {bytes} bytes");
            if let Some(path) = output {
                println!("Written to: {}", path.display());
            }
        }

        // ── Block ────────────────────────────────────────────────────────────
        Commands::Block { index, block } => {
            reader.mount()?;
            reader.open_stream(index)?;
            let b = reader.read_block_at(block)?;
            reader.close_stream();
            println!("block {} len={} last={}", b.block_index, b.length, b.is_last);
            for (row, chunk) in b.payload().chunks(32).enumerate() {
                println!("{:08x}  {}", block as usize * BLOCK_SIZE + row * 32, hex::encode(chunk));
            }
        }

        // ── Checksum ─────────────────────────────────────────────────────────
        Commands::Checksum { index } => {
            reader.mount()?;
            let indices: Vec<usize> = match index {
                Some(i) => vec![i],
                None    => (0..reader.count()).collect(),
            };
            for i in indices {
                let e = reader.entry_with_checksum(i)?;
                println!("0x{:04X}  {}", e.checksum, e.path);
            }
        }

        // ── Cycle ────────────────────────────────────────────────────────────
        Commands::Cycle => cycle(reader)?,
    }

    Ok(())
}

/// Mirrors a single wake-up of the field device.
fn cycle(reader: &mut HostReader) -> Result<(), Box<dyn std::error::Error>> {
    info!("Wake: mounting card");
    if let Err(e) = reader.mount() {
        eprintln!("SD mount failed: {e}");
        eprintln!("Check {IMAGE_DIR}/ exists with .jpg files");
        return Err(e.into());
    }

    println!("SD card OK, images: {}", reader.count());
    if let Ok(first) = reader.entry_at(0) {
        println!("First image: {}", first.path);
        println!("Size: {} bytes", first.file_size);
        println!("Blocks: {} x {} B", first.total_blocks, BLOCK_SIZE);
    }

    reader.unmount();
    info!("Cycle done, card released");
    Ok(())
}
