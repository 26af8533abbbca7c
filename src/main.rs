use clap::{Parser, Subcommand};
use stemstore::append::{append, AppendOptions, AppendOutcome, Overwrite};
use stemstore::codec::CodecId;
use stemstore::file::{Mode, StemFile, WriteOptions};
use stemstore::index::{count_objects, Selector};
use stemstore::manifest::load_manifest;
use stemstore::objects::MemMode;
use stemstore::read::{read, ReadOptions, ReadOutcome, ReadRequest};
use stemstore::topgroup::{create_container, topgroup_names, topgroup_version, DEFAULT_TOPGROUP};
use stemstore::tree::DType;
use stemstore::StemError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stemstore", about = "Versioned containers for 4D-STEM data objects")]
struct Cli {
    /// Debug-level logging (overrides STEMSTORE_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty container with one or more topgroups
    Create {
        file: PathBuf,
        #[arg(short, long = "topgroup", default_value = DEFAULT_TOPGROUP)]
        topgroup: Vec<String>,
        /// Body codec: zstd (default) or none
        #[arg(short, long, default_value = "zstd")]
        codec: String,
        #[arg(short, long, default_value = "3")]
        level: i32,
    },
    /// Append the objects of a JSON batch manifest
    Append {
        file: PathBuf,
        #[arg(short, long)]
        input: PathBuf,
        /// 0 = refuse conflicts, 1 = soft, 2 = hard overwrite
        #[arg(short, long, default_value = "0")]
        overwrite: u8,
        /// Target topgroup; picked automatically when the file holds only one
        #[arg(short, long)]
        topgroup: Option<String>,
    },
    /// Print the object table, or fetch objects / metadata
    Read {
        file: PathBuf,
        /// Index, name or JSON list; repeat for several objects
        #[arg(short, long = "data-id")]
        data_id: Vec<String>,
        #[arg(short, long)]
        topgroup: Option<String>,
        #[arg(long)]
        metadata: bool,
        /// RAM or MEMMAP
        #[arg(long, default_value = "RAM")]
        mem: String,
        #[arg(long, default_value = "1")]
        binfactor: usize,
        /// Element kind of binned datacubes
        #[arg(long)]
        dtype: Option<String>,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show container metadata
    Info {
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {

        // ── Create ───────────────────────────────────────────────────────────
        Commands::Create { file, topgroup, codec, level } => {
            let codec = parse_codec(&codec)?;
            create_container(&file, &topgroup, WriteOptions { codec, level })?;
            println!("Created: {} ({})", file.display(), topgroup.join(", "));
        }

        // ── Append ───────────────────────────────────────────────────────────
        Commands::Append { file, input, overwrite, topgroup } => {
            let items = load_manifest(&input)?;
            let opts = AppendOptions { overwrite: Overwrite::try_from(overwrite)?, topgroup };
            match append(&file, items, &opts)? {
                AppendOutcome::Saved { written, metadata } => {
                    if metadata {
                        println!("  saved   metadata");
                    }
                    for (ty, name) in &written {
                        println!("  saved   {ty} '{name}'");
                    }
                }
                AppendOutcome::Rejected { conflicts } => {
                    println!("One or more objects already exist in this file with the same type and name:");
                    println!();
                    for (ty, name) in &conflicts {
                        println!("{ty} '{name}'");
                    }
                    println!();
                    println!("Either rename these objects, or pass --overwrite 1 or --overwrite 2.");
                    println!("No objects saved.");
                }
                AppendOutcome::NeedsDisambiguation(candidates) => print_topgroups(&candidates),
            }
        }

        // ── Read ─────────────────────────────────────────────────────────────
        Commands::Read { file, data_id, topgroup, metadata, mem, binfactor, dtype, json } => {
            let request = if metadata {
                ReadRequest::Metadata
            } else if data_id.is_empty() {
                ReadRequest::Summary
            } else {
                ReadRequest::Data(Selector::from_args(data_id.as_slice())?)
            };
            let opts = ReadOptions {
                topgroup,
                mem: mem.parse::<MemMode>()?,
                binfactor,
                dtype: dtype.as_deref().map(parse_dtype).transpose()?,
            };
            match read(&file, &request, &opts)? {
                ReadOutcome::Summary(summary) if json => println!("{}", serde_json::to_string_pretty(&summary)?),
                ReadOutcome::Summary(summary) => print!("{summary}"),
                ReadOutcome::Data(selection) => {
                    let objects = selection.into_vec();
                    if json {
                        println!("{}", serde_json::to_string_pretty(&objects)?);
                    } else {
                        for obj in &objects {
                            println!("{} '{}'", obj.object_type(), obj.name());
                        }
                    }
                }
                ReadOutcome::Metadata(md) => println!("{}", serde_json::to_string_pretty(&md)?),
                ReadOutcome::NeedsDisambiguation(candidates) => print_topgroups(&candidates),
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { file } => {
            let f  = StemFile::open(&file, Mode::Read)?;
            let sb = f.superblock();

            println!("── stemstore container ──────────────────────────────────");
            println!("  Path           {}", file.display());
            println!("  Format version {}", sb.format_version);
            println!("  UUID           {}", sb.file_uuid);
            println!("  Codec          {} (level {})", sb.codec.name(), sb.level);
            println!("  Body size      {} B", sb.body_size);
            println!("  Created        {}", sb.created_at_rfc3339());
            println!("  Tree digest    {}", hex::encode(f.root().digest()));
            let names = topgroup_names(f.root());
            println!("  Topgroups ({}):", names.len());
            for name in &names {
                let Some(tg) = f.root().group(name) else { continue };
                let version = topgroup_version(tg, name)
                    .map(|v| v.to_string())
                    .unwrap_or_else(|_| "unknown".into());
                let counts = count_objects(tg);
                println!("    {name} (v{version}, {} objects)", counts.total());
                for (ty, n) in counts.iter().filter(|(_, n)| *n > 0) {
                    println!("      {:<18} {n}", ty.name());
                }
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("STEMSTORE_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_topgroups(candidates: &[String]) {
    println!("This file contains the following topgroups -- please specify one with --topgroup:");
    println!();
    for tg in candidates {
        println!("{tg}");
    }
}

fn parse_codec(s: &str) -> Result<CodecId, StemError> {
    CodecId::from_name(s).ok_or_else(|| StemError::InvalidOption(format!("unknown codec '{s}'")))
}

fn parse_dtype(s: &str) -> Result<DType, StemError> {
    DType::from_name(s).ok_or_else(|| StemError::InvalidOption(format!("unknown dtype '{s}'")))
}
