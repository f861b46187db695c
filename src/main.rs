use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thyme::config::{self, DeriveBackend, ThymeConfig};
use thyme::metadata::ExifExtractor;
use thyme::store::Library;
use thyme::thumbs::deriver::Deriver;
use thyme::thumbs::{BuiltinDeriver, ThumbCache, VipsDeriver};
use thyme::types::SetId;
use thyme::{link, output, scan, thumbs, views};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "thyme")]
#[command(version)]
#[command(about = "Index a photo library and keep thumbnails for it")]
#[command(long_about = "\
Index a photo library and keep thumbnails for it

Photos are grouped into sets by the name of the directory holding them and
ordered by capture time within each set. Thumbnails are cached on disk,
named after a hash of the photo's path:

  <thumbs dir>/<sha256(path)>_big.jpg     long edge 1000px
  <thumbs dir>/<sha256(path)>_small.jpg   200px square crop

Typical run:

  thyme scan ~/Pictures      # ingest new photos, rebuild ordering
  thyme thumbs               # derive missing thumbnails
  thyme sets                 # list sets as JSON

Logging goes to stderr and is controlled with RUST_LOG (default: info).
Run 'thyme gen-config' to generate a documented thyme.toml.")]
struct Cli {
    /// Config file [default: ./thyme.toml if present]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest photos under the given directories, then rebuild ordering
    Scan {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Derive missing thumbnails for every photo in the library
    Thumbs,
    /// Print all sets as JSON, most recent first
    Sets,
    /// Print the photos of one set as JSON, in capture order
    Photos { set_id: i64 },
    /// Print a stock thyme.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Command::Scan { paths } => {
            let config = load_config(cli.config.as_deref())?;
            let mut library = Library::open(&config.library.database)?;
            let report = scan::scan(
                &library,
                &ExifExtractor::new(),
                &paths,
                &config.scan.extensions,
            )?;
            output::print_scan_report(&report);
            let linked = link::link(&mut library)?;
            output::print_link_report(&linked);
        }
        Command::Thumbs => {
            let config = load_config(cli.config.as_deref())?;
            let library = Library::open(&config.library.database)?;
            let cache = ThumbCache::new(&config.thumbs)?;
            let deriver = make_deriver(&config);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_thumb_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let report = thumbs::run_pool(
                &library,
                &cache,
                deriver.as_ref(),
                config.processing.workers,
                Some(tx),
            )?;
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;
            output::print_thumb_summary(&report);
        }
        Command::Sets => {
            let config = load_config(cli.config.as_deref())?;
            let library = Library::open(&config.library.database)?;
            let sets: Vec<views::SetView> = library.sets()?.iter().map(views::set_view).collect();
            println!("{}", serde_json::to_string_pretty(&sets)?);
        }
        Command::Photos { set_id } => {
            let config = load_config(cli.config.as_deref())?;
            let library = Library::open(&config.library.database)?;
            let set_id = SetId(set_id);
            if library.set(set_id)?.is_none() {
                return Err(format!("no set with id {set_id}").into());
            }
            let photos: Vec<views::PhotoView> = library
                .photos_in_set(set_id)?
                .iter()
                .map(|p| views::photo_view(p, config.thumbs.big_size))
                .collect();
            println!("{}", serde_json::to_string_pretty(&photos)?);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Structured logs to stderr; `RUST_LOG` overrides the `info` default.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// An explicit `--config` must exist; the default file is optional.
fn load_config(path: Option<&std::path::Path>) -> Result<ThymeConfig, config::ConfigError> {
    match path {
        Some(path) => config::load_config(path, true),
        None => config::load_config(std::path::Path::new(config::DEFAULT_CONFIG_FILE), false),
    }
}

fn make_deriver(config: &ThymeConfig) -> Box<dyn Deriver> {
    match config.derive.backend {
        DeriveBackend::Vips => Box::new(VipsDeriver::new(&config.derive)),
        DeriveBackend::Builtin => Box::new(BuiltinDeriver::new()),
    }
}
