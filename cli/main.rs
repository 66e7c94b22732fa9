#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::{Args, Parser, Subcommand};
use debias::config::DEFAULT_COVARIATE_COLUMN;
use debias::{DebiasConfig, DebiasStrategy, Debiaser};
use std::path::{Path, PathBuf};
use std::process;

mod table;

use table::{read_table, write_table};

#[derive(Parser)]
#[command(
    name = "debias",
    about = "Remove covariate-correlated bias from a table of scaled depths",
    long_about = "Sorts positions by a covariate such as GC content, removes the bias with the \
                 selected strategy and writes the table back in its original order. Input values \
                 are expected to be scaled already."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TableArgs {
    /// Tab-separated table: identifier columns, a covariate column and one column per sample
    #[arg(value_name = "TABLE")]
    input: PathBuf,

    /// Path for the debiased table
    #[arg(long, short)]
    output: PathBuf,

    /// Column holding the per-position covariate
    #[arg(long, default_value = DEFAULT_COVARIATE_COLUMN)]
    covariate_column: String,

    /// Number of leading identifier columns copied through unchanged
    #[arg(long, default_value = "0")]
    id_columns: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Subtract a moving median computed in covariate order
    #[command(about = "Subtract a covariate-ordered moving median from each sample")]
    MovingMedian {
        #[command(flatten)]
        table: TableArgs,

        /// Number of rows in the moving-median window
        #[arg(long, value_name = "ROWS")]
        window: usize,
    },

    /// Divide covariate chunks by their median
    #[command(about = "Divide each covariate chunk of each sample by its median")]
    ChunkedRatio {
        #[command(flatten)]
        table: TableArgs,

        /// Covariate span covered by one chunk
        #[arg(long, value_name = "SPAN")]
        score_window: f64,
    },

    /// Zero the dominant SVD components
    #[command(about = "Remove leading SVD components above a variance share")]
    VarianceTruncation {
        #[command(flatten)]
        table: TableArgs,

        /// Minimum variance share, in percent, for a component to be removed
        #[arg(long, value_name = "PCT")]
        min_variance_pct: f64,
    },

    /// Debias using a TOML configuration file
    #[command(about = "Debias with the strategy and columns given in a TOML config")]
    Run {
        #[arg(value_name = "TABLE")]
        input: PathBuf,

        /// TOML configuration file
        #[arg(long, value_name = "PATH")]
        config: PathBuf,

        /// Path for the debiased table
        #[arg(long, short)]
        output: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::MovingMedian { table, window } => {
            run_with_table_args(table, DebiasStrategy::MovingMedian { window })
        }
        Commands::ChunkedRatio {
            table,
            score_window,
        } => run_with_table_args(table, DebiasStrategy::ChunkedRatio { score_window }),
        Commands::VarianceTruncation {
            table,
            min_variance_pct,
        } => run_with_table_args(
            table,
            DebiasStrategy::VarianceTruncation { min_variance_pct },
        ),
        Commands::Run {
            input,
            config,
            output,
        } => run_with_config(&input, &config, &output),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_with_table_args(
    args: TableArgs,
    strategy: DebiasStrategy,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = DebiasConfig {
        covariate_column: args.covariate_column,
        id_columns: args.id_columns,
        strategy,
    };
    debias_table(&args.input, &config, &args.output)
}

fn run_with_config(
    input: &Path,
    config_path: &Path,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = DebiasConfig::load(config_path)?;
    log::info!("loaded configuration from {}", config_path.display());
    debias_table(input, &config, output)
}

fn debias_table(
    input: &Path,
    config: &DebiasConfig,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut table = read_table(input, &config.covariate_column, config.id_columns)?;
    log::info!(
        "read {} positions x {} samples from {}",
        table.samples.nrows(),
        table.samples.ncols(),
        input.display()
    );

    let mut debiaser = Debiaser::new(config.strategy, table.covariate.clone())?;
    debiaser.apply(&mut table.samples)?;

    write_table(&table, output)?;
    log::info!("debiased table written to {}", output.display());
    Ok(())
}
