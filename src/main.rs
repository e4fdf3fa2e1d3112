//! xtfs-stripe
//!
//! Drives the client core against local stand-ins for the servers: a
//! directory per OSD for striped files, and a local directory tree for
//! readdir.
//!
//! ```text
//! xtfs-stripe write --osd-root /tmp/osds --input big.iso --width 5 --parity-width 2
//! xtfs-stripe read  --osd-root /tmp/osds --output copy.iso --failed-osd 0 --failed-osd 3
//! xtfs-stripe ls    --root /srv/data --path /photos --entries-per-call 64
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use xtfs_client::dir::LocalVolume;
use xtfs_client::osd::LocalObjectStore;
use xtfs_client::{
    ClientMetrics, ClientOptions, DirectoryReader, ObjectStore, StripedFile, StripingPolicy,
    TranslatorRegistry, UserCredentials, WordSize,
};

/// Manifest stored next to the OSD directories.
const LAYOUT_FILE: &str = "layout.json";

// =============================================================================
// CLI Arguments
// =============================================================================

/// XtreemFS client core: striping, erasure coding and chunked readdir
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Client options file (JSON)
    #[arg(long, env = "XTFS_CONFIG")]
    config: Option<PathBuf>,

    /// Galois field word size for Reed-Solomon coding (8 or 16)
    #[arg(long, env = "XTFS_WORD_SIZE")]
    word_size: Option<u32>,

    /// Print Prometheus metrics after the command
    #[arg(long)]
    print_metrics: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stripe a local file over per-OSD directories
    Write {
        /// Directory holding one subdirectory per OSD
        #[arg(long)]
        osd_root: PathBuf,
        /// File to stripe
        #[arg(long)]
        input: PathBuf,
        /// Stripe size in kB
        #[arg(long, default_value = "128")]
        stripe_size_kb: u32,
        /// OSDs per line, parity included
        #[arg(long, default_value = "3")]
        width: u32,
        /// Parity OSDs per line (0 selects RAID0)
        #[arg(long, default_value = "1")]
        parity_width: u32,
    },
    /// Reassemble a striped file, optionally with OSDs treated as failed
    Read {
        #[arg(long)]
        osd_root: PathBuf,
        /// Destination file
        #[arg(long)]
        output: PathBuf,
        /// OSD slot to treat as unreachable (repeatable)
        #[arg(long = "failed-osd")]
        failed_osds: Vec<usize>,
    },
    /// List a directory through the chunked readdir protocol
    Ls {
        /// Local directory acting as the volume root
        #[arg(long)]
        root: PathBuf,
        /// Directory inside the volume
        #[arg(long, default_value = "/")]
        path: String,
        /// Entries the simulated kernel buffer takes per readdir call
        #[arg(long, default_value = "128")]
        entries_per_call: usize,
        /// Entries per ReadDir RPC (overrides the options file)
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Show inode, mode and size
        #[arg(long, short = 'l')]
        long: bool,
    },
}

/// What `write` records so `read` can find the file again.
#[derive(Debug, Serialize, Deserialize)]
struct Layout {
    size: u64,
    policies: Vec<StripingPolicy>,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    let mut options = match &args.config {
        Some(path) => ClientOptions::from_json_file(path)
            .with_context(|| format!("loading options from {}", path.display()))?,
        None => ClientOptions::default(),
    };
    if let Some(bits) = args.word_size {
        options.word_size = WordSize::from_bits(bits)?;
    }

    let metrics = ClientMetrics::new()?;

    match args.command {
        Command::Write {
            osd_root,
            input,
            stripe_size_kb,
            width,
            parity_width,
        } => {
            let policy = if parity_width == 0 {
                StripingPolicy::raid0(stripe_size_kb, width)
            } else {
                StripingPolicy::erasure_coded(stripe_size_kb, width, parity_width)
            };
            write_file(&osd_root, &input, policy, &options, &metrics).await?;
        }
        Command::Read {
            osd_root,
            output,
            failed_osds,
        } => {
            read_file(&osd_root, &output, &failed_osds, &options, &metrics).await?;
        }
        Command::Ls {
            root,
            path,
            entries_per_call,
            chunk_size,
            long,
        } => {
            if let Some(chunk_size) = chunk_size {
                options.readdir_chunk_size = chunk_size;
            }
            list_directory(root, &path, entries_per_call, long, options, &metrics).await?;
        }
    }

    if args.print_metrics {
        print!("{}", metrics.render()?);
    }
    Ok(())
}

// =============================================================================
// Commands
// =============================================================================

async fn write_file(
    osd_root: &Path,
    input: &Path,
    policy: StripingPolicy,
    options: &ClientOptions,
    metrics: &ClientMetrics,
) -> anyhow::Result<()> {
    policy.validate()?;
    tokio::fs::create_dir_all(osd_root).await?;
    let content = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;

    // Objects the new file does not overwrite would corrupt degraded reads.
    let store = Arc::new(LocalObjectStore::new(osd_root));
    match tokio::fs::remove_file(osd_root.join(LAYOUT_FILE)).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
        _ => {}
    }
    store.clear().await?;

    let registry = TranslatorRegistry::with_defaults(options.word_size);
    let file = StripedFile::new(store.clone(), &registry, vec![policy.clone()])?
        .with_metrics(metrics.clone());

    file.write(&content, 0).await?;

    let layout = Layout {
        size: content.len() as u64,
        policies: vec![policy],
    };
    tokio::fs::write(osd_root.join(LAYOUT_FILE), serde_json::to_vec_pretty(&layout)?).await?;

    let stats = store.stats();
    info!(
        bytes = content.len(),
        objects = stats.object_count,
        "Striped {}",
        input.display()
    );
    Ok(())
}

async fn read_file(
    osd_root: &Path,
    output: &Path,
    failed_osds: &[usize],
    options: &ClientOptions,
    metrics: &ClientMetrics,
) -> anyhow::Result<()> {
    let raw = tokio::fs::read(osd_root.join(LAYOUT_FILE))
        .await
        .with_context(|| format!("no striped file under {}", osd_root.display()))?;
    let layout: Layout = serde_json::from_slice(&raw)?;

    let store = Arc::new(LocalObjectStore::new(osd_root));
    for &osd in failed_osds {
        store.mark_offline(osd);
    }

    let registry = TranslatorRegistry::with_defaults(options.word_size);
    let file = StripedFile::new(store, &registry, layout.policies)?.with_metrics(metrics.clone());

    let size = usize::try_from(layout.size)?;
    let mut buf = vec![0u8; file.aligned_read_len(size)?];
    let valid = file.read(&mut buf, 0).await?;
    if valid < size {
        bail!("only {} of {} bytes could be read", valid, size);
    }
    buf.truncate(size);

    tokio::fs::write(output, &buf)
        .await
        .with_context(|| format!("writing {}", output.display()))?;
    info!(bytes = size, failed = ?failed_osds, "Reassembled into {}", output.display());
    Ok(())
}

async fn list_directory(
    root: PathBuf,
    path: &str,
    entries_per_call: usize,
    long: bool,
    options: ClientOptions,
    metrics: &ClientMetrics,
) -> anyhow::Result<()> {
    let volume = Arc::new(LocalVolume::new(root));
    let reader = DirectoryReader::new(volume, options)?.with_metrics(metrics.clone());
    let entries = reader
        .list(&UserCredentials::default(), path, entries_per_call)
        .await?;

    for entry in &entries {
        match (&entry.stat, long) {
            (Some(stat), true) => println!("{:>10} {:o} {:>12} {}", stat.ino, stat.mode, stat.size, entry.name),
            _ => println!("{}", entry.name),
        }
    }
    info!(
        entries = entries.len(),
        rpcs = metrics.readdir_rpcs.get(),
        cache_hits = metrics.readdir_cache_hits.get(),
        "Listed {}",
        path
    );
    Ok(())
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
