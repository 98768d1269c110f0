//! lumen - explain building-sensor anomalies
//!
//! Usage:
//!   lumen generate --weeks 4 --sensors 3 --output payload.json
//!   lumen prototypes --input payload.json --anomaly 1 --strategy shapelets
//!   lumen attribution --input payload.json --anomaly 1 --method averaged
//!   lumen routes

use clap::{Parser, Subcommand, ValueEnum};
use lumen_cli::commands::{self, CommandOutput};
use lumen_cli::synth::SynthConfig;
use lumen_core::{AttributionStrategy, PrototypeStrategy, metrics};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "lumen")]
#[command(about = "Post-hoc explanations for building-sensor anomalies")]
struct Cli {
    /// Print Prometheus metrics after the command
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build comparison windows for an anomaly
    Prototypes {
        /// Detector payload (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// 1-based anomaly index
        #[arg(short, long)]
        anomaly: i64,

        /// Prototype strategy
        #[arg(short, long)]
        strategy: Option<StrategyArg>,

        /// Explanation config (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Hours of context on each side of the anomaly
        #[arg(long)]
        padding_hours: Option<usize>,
    },

    /// Per-sensor percentage contributions for an anomaly
    Attribution {
        /// Detector payload (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// 1-based anomaly index
        #[arg(short, long)]
        anomaly: i64,

        /// Attribution method
        #[arg(short, long, default_value = "point")]
        method: MethodArg,

        /// Re-score through a remote detector at this base URL
        #[arg(long)]
        remote: Option<String>,

        /// Explanation config (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Generate a synthetic building dataset
    Generate {
        /// Weeks of history
        #[arg(short, long, default_value = "4")]
        weeks: usize,

        /// Number of sensors
        #[arg(short, long, default_value = "3")]
        sensors: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Sampling step in minutes
        #[arg(long, default_value = "15")]
        step_minutes: i64,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List available operations
    Routes,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Local,
    FixedStride,
    WeekdayMask,
    Shapelets,
}

impl From<StrategyArg> for PrototypeStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Local => Self::Local,
            StrategyArg::FixedStride => Self::FixedStride,
            StrategyArg::WeekdayMask => Self::WeekdayMask,
            StrategyArg::Shapelets => Self::Shapelets,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum MethodArg {
    Point,
    Midpoint,
    Averaged,
    Median,
}

impl From<MethodArg> for AttributionStrategy {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Point => Self::Point,
            MethodArg::Midpoint => Self::Midpoint,
            MethodArg::Averaged => Self::Averaged,
            MethodArg::Median => Self::Median,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries the JSON result
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let output = match cli.command {
        Commands::Prototypes {
            input,
            anomaly,
            strategy,
            config,
            padding_hours,
        } => {
            let strategy = strategy.map(Into::into);
            match commands::load_config(config.as_deref(), strategy, padding_hours) {
                Ok(config) => commands::prototypes(&input, anomaly, &config),
                Err(e) => config_error(&e),
            }
        }
        Commands::Attribution {
            input,
            anomaly,
            method,
            remote,
            config,
        } => match commands::load_config(config.as_deref(), None, None) {
            Ok(config) => {
                commands::attribution(&input, anomaly, method.into(), remote.as_deref(), &config)
                    .await
            }
            Err(e) => config_error(&e),
        },
        Commands::Generate {
            weeks,
            sensors,
            seed,
            step_minutes,
            output,
        } => {
            let config = SynthConfig {
                weeks,
                sensors,
                seed,
                step_minutes,
                ..Default::default()
            };
            commands::generate(config, output.as_deref())
        }
        Commands::Routes => commands::routes(),
    };

    emit(&output);
    if cli.metrics {
        eprintln!("{}", metrics::render());
    }
    ExitCode::from(output.exit_code())
}

/// Config problems carry their own message; they are local, not a service response
fn config_error(err: &lumen_core::ExplainError) -> CommandOutput {
    CommandOutput {
        status: 500,
        body: serde_json::json!({ "detail": err.to_string() }),
    }
}

fn emit(output: &CommandOutput) {
    let text = serde_json::to_string_pretty(&output.body).unwrap_or_default();
    if output.is_success() {
        println!("{}", text);
    } else {
        eprintln!("{}", text);
    }
}
