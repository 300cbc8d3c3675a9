//! tfresume CLI - Inspect and maintain trial-factoring checkpoints.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tfresume::{CheckpointRecord, CheckpointStore, Config, Int96, RunParams};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "tfresume")]
#[command(version)]
#[command(about = "Checkpoint persistence and recovery for trial-factoring runs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "tfresume.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Identifies the run a checkpoint belongs to.
#[derive(clap::Args)]
struct RunArgs {
    /// Exponent under test
    #[arg(short, long)]
    exponent: u32,

    /// Lower bit level of the run
    #[arg(long)]
    bit_min: i32,

    /// Upper bit level of the run
    #[arg(long)]
    bit_max: i32,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a checkpoint (recovering from the backup if needed) and print it
    Show {
        #[command(flatten)]
        run: RunArgs,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a checkpoint record
    Save {
        #[command(flatten)]
        run: RunArgs,

        /// Last completed class
        #[arg(long)]
        class: i64,

        /// Milliseconds spent at the current bit level
        #[arg(long, default_value = "0")]
        elapsed_ms: u64,

        /// Factor found so far (repeatable, decimal)
        #[arg(short, long = "factor")]
        factors: Vec<String>,
    },

    /// Remove the checkpoint files of a finished job
    Delete {
        /// Exponent under test
        #[arg(short, long)]
        exponent: u32,
    },

    /// List quarantined checkpoint files
    Quarantine {
        /// Exponent under test
        #[arg(short, long)]
        exponent: u32,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbosity: u8, verbose: bool) {
    let level = match (verbose, verbosity) {
        (true, _) => Level::DEBUG,
        (false, 0) => Level::ERROR,
        (false, 1) => Level::INFO,
        (false, _) => Level::DEBUG,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn print_example_config() {
    let example = r#"# tfresume configuration file

# 0 = silent, 1 = informational, 2 = verbose
verbosity = 1

# 4620 sieve classes (true) or 420 (false)
more_classes = true

[checkpoint]
# Directory for M<exponent>.ckp files, ${VAR} is expanded
dir = "."
# 0 = disabled, 1 = every delay_secs, N > 1 = every N classes
interval = 1
delay_secs = 300
# version = "tfresume-0.1.0"
"#;
    println!("{example}");
}

fn run_params(config: &Config, run: &RunArgs) -> RunParams {
    RunParams::new(run.exponent, run.bit_min, run.bit_max, config.num_classes())
}

fn print_record(record: &CheckpointRecord) {
    println!("Exponent:    M{}", record.exponent);
    println!("Bit range:   {}-{}", record.bit_min, record.bit_max);
    println!(
        "Class:       {} / {}",
        record.current_class, record.num_classes
    );
    println!("Elapsed:     {:.1}s", record.elapsed_ms as f64 / 1000.0);
    println!("Version:     {}", record.version);
    println!("Factors:     {}", record.num_factors);
    for factor in record.factors.iter() {
        println!("  {factor}");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Example = cli.command {
        print_example_config();
        return Ok(());
    }

    let config = Config::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    setup_logging(config.verbosity, cli.verbose);
    let store = CheckpointStore::from_config(&config);

    match cli.command {
        Commands::Example => {}

        Commands::Validate => {
            config.validate().context("Invalid configuration")?;

            info!("Configuration is valid");
            info!("  Checkpoint dir: {}", store.dir().display());
            info!("  Classes:        {}", config.num_classes());
            match config.checkpoint.interval {
                0 => info!("  Checkpoints:    disabled"),
                1 => info!("  Checkpoints:    every {}s", config.checkpoint.delay_secs),
                n => info!("  Checkpoints:    every {n} classes"),
            }
        }

        Commands::Show { run, json } => {
            let params = run_params(&config, &run);
            let Some(record) = store.read(&params) else {
                bail!("No usable checkpoint for M{}", params.exponent);
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_record(&record);
            }
        }

        Commands::Save {
            run,
            class,
            elapsed_ms,
            factors,
        } => {
            config.validate().context("Invalid configuration")?;
            let mut record =
                CheckpointRecord::new(run_params(&config, &run), config.checkpoint.version.clone());
            record.current_class = class;
            record.elapsed_ms = elapsed_ms;
            for factor in &factors {
                record
                    .record_factor(Int96::decode(factor))
                    .with_context(|| format!("Invalid factor {factor:?}"))?;
            }

            if !store.write(&record) {
                bail!("Checkpoint for M{} was not written", record.exponent);
            }
            println!("{}", store.files(record.exponent).primary.display());
        }

        Commands::Delete { exponent } => {
            store.delete(exponent);
            info!(exponent, "Checkpoint files removed");
        }

        Commands::Quarantine { exponent } => {
            for path in store.quarantined(exponent)? {
                println!("{}", path.display());
            }
        }
    }

    Ok(())
}
