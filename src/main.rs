use clap::{Parser, Subcommand};
use imgpipe::codec::{Codec, ImageCodec, parse_format};
use imgpipe::config::{self, CONFIG_FILE_NAME};
use imgpipe::context::InvocationContext;
use imgpipe::job::{self, JobRequest};
use imgpipe::ops::{self, ExecEnv};
use imgpipe::output;
use imgpipe::pipeline::{self, StepSpec};
use imgpipe::storage::LocalStore;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "imgpipe")]
#[command(about = "Run named sequences of image operations over source images")]
#[command(long_about = "\
Run named sequences of image operations over source images

A job is a JSON document naming a source image and the steps to apply:

  {
    \"source\": \"photos/cat.jpg\",
    \"operations\": [
      { \"name\": \"rotate\", \"params\": { \"angle\": 90 } },
      [\"resize\", { \"target_width\": 800, \"target_height\": 600 }],
      { \"name\": \"details\" }
    ]
  }

Operations:
  details                                  report width, height, mode, channels
  rotate      angle = 90 | 180 | 270       clockwise quarter turns
  resize      target_width, target_height  exact box, aspect not preserved
  grayscale                                single-channel luminance
  brightness  delta = 1..100               50 leaves the image unchanged
  transform   target_format                encode/decode round trip

Unknown operations and invalid parameters are reported per step and never
stop a job. Locators are resolved against --root (or storage.root).

Run 'imgpipe gen-config' to generate a documented imgpipe.toml.")]
#[command(version)]
struct Cli {
    /// Config file (optional; stock defaults when missing)
    #[arg(long, default_value = CONFIG_FILE_NAME, global = true)]
    config: PathBuf,

    /// Storage root directory (overrides storage.root)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Log debug detail to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run job request files (directories are searched for *.json)
    Run {
        /// Request files or directories
        #[arg(required = true)]
        requests: Vec<PathBuf>,

        /// Print each report as JSON instead of a tree
        #[arg(long)]
        json: bool,
    },
    /// Print the attributes of a single image file
    Details {
        image: PathBuf,
    },
    /// Apply steps to a local file without a request document
    Apply {
        input: PathBuf,
        output: PathBuf,

        /// Step as name[:key=value,...]; repeat for more steps
        #[arg(short = 's', long = "step")]
        steps: Vec<StepSpec>,

        /// Output encoding (defaults to the output file's extension)
        #[arg(long)]
        format: Option<String>,
    },
    /// Print a stock imgpipe.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let codec = ImageCodec::new();

    match cli.command {
        Command::Run { requests, json } => {
            let config = config::load_config(&cli.config, &codec)?;
            init_thread_pool(&config.processing);
            let root = cli
                .root
                .unwrap_or_else(|| PathBuf::from(&config.storage.root));
            let store = LocalStore::new(root);
            let ctx = InvocationContext::new();

            let files = collect_requests(&requests);
            if files.is_empty() {
                return Err("no request files found".into());
            }
            let results: Vec<_> = files
                .par_iter()
                .map(|path| {
                    let report = JobRequest::from_file(path).and_then(|request| {
                        job::run_job(&codec, &store, &ctx, &config, &request)
                            .map(|report| (request, report))
                    });
                    (path, report)
                })
                .collect();

            let mut failed = 0;
            for (path, result) in &results {
                match result {
                    Ok((_, report)) if json => {
                        println!("{}", serde_json::to_string_pretty(report)?);
                    }
                    Ok((request, report)) => output::print_job_report(&request.source, report),
                    Err(e) => {
                        failed += 1;
                        output::print_job_error(&path.display().to_string(), e);
                    }
                }
            }
            if !json {
                output::print_batch_summary(results.len() - failed, failed);
            }
            if failed > 0 {
                return Err(format!("{failed} job(s) failed").into());
            }
        }
        Command::Details { image } => {
            let bytes = std::fs::read(&image)?;
            let raster = codec.decode(&bytes)?;
            let applied = ops::details::apply(&raster);
            output::print_details(&image.display().to_string(), &applied.attributes);
        }
        Command::Apply {
            input,
            output: output_path,
            steps,
            format,
        } => {
            let config = config::load_config(&cli.config, &codec)?;
            let format = match format {
                Some(name) => parse_format(&name).ok_or(format!("unknown format '{name}'"))?,
                None => output_path
                    .extension()
                    .and_then(|e| e.to_str())
                    .and_then(parse_format)
                    .unwrap_or_else(|| config.output_format()),
            };
            let raster = codec.decode(&std::fs::read(&input)?)?;
            let env = ExecEnv::new(&codec).with_resize_filter(config.resize_filter());
            let outcome = pipeline::run(raster, &steps, env);
            let bytes = codec.encode(&outcome.raster, format)?;
            if let Some(parent) = output_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&output_path, bytes)?;
            output::print_apply(
                &input.display().to_string(),
                &output_path.display().to_string(),
                &outcome.results,
            );
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Expand the `run` arguments: files are taken as given, directories are
/// searched recursively for `*.json`, sorted for stable output.
fn collect_requests(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_json(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    files
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}
