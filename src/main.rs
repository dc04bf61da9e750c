use clap::{Parser, Subcommand};
use mediaforge::actions::MediaTranscoder;
use mediaforge::imaging::RustBackend;
use mediaforge::metadata::FsExtractor;
use mediaforge::{config, logging, output, pipeline};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediaforge")]
#[command(about = "Incremental thumbnail and preview builder for photo and video folders")]
#[command(long_about = "\
Incremental thumbnail and preview builder for photo and video folders

The input folder is never modified. Everything mediaforge produces lands in
the output folder, next to an index that remembers what was already built.

Output layout (structure = \"folders\"):

  output/
  ├── index.db                     # Persistent index
  ├── index-deleted.db             # Tombstones for files that disappeared
  └── media/
      ├── thumb/2021/IMG_0042.jpg  # Square thumbnail
      ├── small/2021/IMG_0042.jpg  # Small preview
      ├── large/2021/IMG_0042.jpg  # Large preview
      ├── converted/2021/...       # Web-safe copies of HEIC, RAW, MOV
      └── original/2021/...        # Originals (copy, symlink or hardlink)

Files are identified by name and logical date, so renames and moves keep
their identity. Files named like 'photo.jpg__copy.jpg' or 'photo (1).jpg'
next to 'photo.jpg' are skipped as duplicates.

Run 'mediaforge gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Folder with the original photos and videos
    #[arg(long, default_value = ".", global = true)]
    input: PathBuf,

    /// Folder that receives the index and all artifacts
    #[arg(long, default_value = "dist", global = true)]
    output: PathBuf,

    /// Config file (defaults apply when absent)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Maximum number of jobs in flight (overrides processing.concurrency)
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Plan and report jobs without writing any artifact
    #[arg(long, global = true)]
    dry_run: bool,

    /// Log level for diagnostics on stderr; RUST_LOG takes precedence
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Update the index and build every missing or stale artifact
    Build,
    /// Show index size and pending changes without building
    Status,
    /// Recompute logical dates from stored metadata
    RefreshDates,
    /// Compact the index database
    Vacuum,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(&cli.log_level)?;

    match cli.command {
        Command::Build => {
            let build_config = resolve_config(&cli)?;
            println!(
                "==> Building {} → {}",
                cli.input.display(),
                cli.output.display()
            );
            let transcoder = MediaTranscoder::new(RustBackend::new());
            let summary = pipeline::build(
                &cli.input,
                &cli.output,
                &build_config,
                &FsExtractor,
                &transcoder,
                &mut |event| output::print_build_event(event),
            )?;
            println!();
            output::print_build_summary(&summary);
        }
        Command::Status => {
            let build_config = resolve_config(&cli)?;
            let report = pipeline::status(&cli.input, &cli.output, &build_config)?;
            output::print_status(&report);
        }
        Command::RefreshDates => {
            let build_config = resolve_config(&cli)?;
            let mut index = pipeline::open_index(&cli.output, &build_config)?;
            let changed = index.refresh_dates()?;
            output::print_refreshed_dates(&changed);
        }
        Command::Vacuum => {
            let build_config = resolve_config(&cli)?;
            let index = pipeline::open_index(&cli.output, &build_config)?;
            index.vacuum()?;
            println!(
                "==> Vacuumed {}",
                build_config.index_path(&cli.output).display()
            );
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load the config file and apply CLI overrides on top.
fn resolve_config(cli: &Cli) -> Result<config::BuildConfig, config::ConfigError> {
    let mut build_config = config::load_config(cli.config.as_deref())?;
    if let Some(n) = cli.concurrency {
        build_config.processing.concurrency = Some(n);
    }
    if cli.dry_run {
        build_config.output.dry_run = true;
    }
    build_config.validate()?;
    Ok(build_config)
}
