//! Tortilla CLI
//!
//! Create, inspect, extract from and compile Tortilla containers.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tortilla::{Config, ContainerReader, IdPolicy, ItemId, ItemRef, Sample};
use tracing_subscriber::{fmt, EnvFilter};

/// Tortilla container tool
#[derive(Parser, Debug)]
#[command(name = "tortilla")]
#[command(about = "Pack files into cloud-optimized containers and read them back by range")]
#[command(version)]
struct Args {
    /// Parallel range readers
    #[arg(short, long, default_value = "4", global = true)]
    workers: usize,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "60", global = true)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pack files into a new container
    Create {
        /// Output container path
        #[arg(short, long)]
        output: PathBuf,

        /// Data format tag stored in the footer (e.g. GTiff)
        #[arg(short, long, default_value = "")]
        format: String,

        /// Split into parts of at most this size (e.g. 20GB)
        #[arg(long)]
        max_part_size: Option<String>,

        /// Input files, in item order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print a container's index
    Info {
        /// Path, URL, or `<stem>*.tortilla` part pattern
        locator: String,
    },

    /// Write one item's bytes to a file
    Extract {
        /// Path or URL of the container
        locator: String,

        /// Item id, or `#N` for position N
        item: String,

        /// Destination file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Copy selected items into a new container
    Compile {
        /// Path or URL of the source container
        locator: String,

        /// Output container path
        #[arg(short, long)]
        output: PathBuf,

        /// Keep source ids instead of renumbering
        #[arg(long)]
        preserve_ids: bool,

        /// Item ids, or `#N` for position N, in output order
        #[arg(required = true)]
        selection: Vec<String>,
    },
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tortilla=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{} ({:?})", e, e.category());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> tortilla::Result<()> {
    let mut builder = Config::builder()
        .workers(args.workers)
        .http_timeout_ms(args.timeout * 1000);

    match args.command {
        Commands::Create {
            output,
            format,
            max_part_size,
            files,
        } => {
            builder = builder.file_format(format);
            if let Some(size) = max_part_size {
                builder = builder.max_part_size(tortilla::parse_size(&size)?);
            }
            let config = builder.build();

            let samples: Vec<Sample> = files.into_iter().map(Sample::new).collect();
            for summary in tortilla::create_parts(&samples, &output, &config)? {
                println!(
                    "{}\t{} items\t{}",
                    summary.path.display(),
                    summary.item_count(),
                    tortilla::format_size(summary.total_size)
                );
            }
        }

        Commands::Info { locator } => {
            let config = builder.build();
            for reader in tortilla::load_parts(&locator, &config)? {
                print_index(&reader);
            }
        }

        Commands::Extract {
            locator,
            item,
            output,
        } => {
            let config = builder.build();
            let reader = ContainerReader::load_with_config(&locator, &config)?;
            let mut out = BufWriter::new(File::create(&output)?);
            let n = reader.copy_item_to(parse_item_ref(&item), &mut out)?;
            println!("{}\t{}", output.display(), tortilla::format_size(n));
        }

        Commands::Compile {
            locator,
            output,
            preserve_ids,
            selection,
        } => {
            if preserve_ids {
                builder = builder.id_policy(IdPolicy::Preserve);
            }
            let config = builder.build();
            let reader = ContainerReader::load_with_config(&locator, &config)?;
            let selection: Vec<ItemRef> = selection.iter().map(|s| parse_item_ref(s)).collect();
            let summary = tortilla::compile(&reader, &selection, &output, &config)?;
            println!(
                "{}\t{} items\t{}",
                summary.path.display(),
                summary.item_count(),
                tortilla::format_size(summary.total_size)
            );
        }
    }

    Ok(())
}

/// `#3` → position 3, `3` → integer id, anything else → string id
fn parse_item_ref(s: &str) -> ItemRef {
    if let Some(pos) = s.strip_prefix('#').and_then(|p| p.parse::<usize>().ok()) {
        return ItemRef::Position(pos);
    }
    match s.parse::<u64>() {
        Ok(n) => ItemRef::Id(ItemId::Int(n)),
        Err(_) => ItemRef::Id(ItemId::from(s)),
    }
}

fn print_index(reader: &ContainerReader) {
    let index = reader.index();
    println!(
        "{}\tformat={:?}\tpart {}/{}\t{} items",
        reader.locator(),
        index.file_format(),
        index.part_index() + 1,
        index.part_count(),
        index.len()
    );
    println!("#\tid\toffset\tlength\tname\tmetadata");
    for (pos, item) in index.iter().enumerate() {
        let metadata: Vec<String> = item
            .metadata
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            pos,
            item.id,
            item.offset,
            item.length,
            item.name,
            metadata.join(",")
        );
    }
}
