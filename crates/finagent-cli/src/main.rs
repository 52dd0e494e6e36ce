//! Command-line interface for finagent
//!
//! ```bash
//! export ALPHA_VANTAGE_API_KEY=...
//! export OPENAI_API_KEY=...        # optional: quality gate
//! export ANTHROPIC_API_KEY=...     # optional: insights
//!
//! finagent analyze NVDA --name NVIDIA
//! finagent batch AAPL MSFT GOOGL --json
//! finagent validate BRK.B
//! finagent health
//! ```

mod render;

use anyhow::bail;
use clap::{Parser, Subcommand};
use finagent_pipeline::{
    AnalysisOutcome, ExecutionMode, Pipeline, PipelineConfig, SymbolValidator,
};
use finagent_utils::{AppConfig, LogFormat};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "finagent", version)]
#[command(about = "Multi-stage stock analysis with recommendation and quality gate", long_about = None)]
struct Cli {
    /// Log line format (pretty or json); overrides FINAGENT_LOG_FORMAT
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a single symbol
    Analyze {
        /// Ticker symbol, e.g. AAPL
        symbol: String,

        /// Company name, used as a hint for news matching
        #[arg(long)]
        name: Option<String>,

        /// Run the six producers at the same time
        #[arg(long)]
        concurrent: bool,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Analyze up to ten symbols, each independently
    Batch {
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Run each symbol's producers at the same time
        #[arg(long)]
        concurrent: bool,

        /// Print the batch report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that a symbol resolves to prices or a company profile
    Validate {
        symbol: String,

        #[arg(long)]
        json: bool,
    },

    /// Show which external services are configured
    Health {
        #[arg(long)]
        json: bool,
    },
}

fn pipeline_config(concurrent: bool) -> anyhow::Result<PipelineConfig> {
    let mode = if concurrent {
        ExecutionMode::Concurrent
    } else {
        ExecutionMode::Sequential
    };

    Ok(PipelineConfig::builder()
        .with_env_keys()
        .execution_mode(mode)
        .build()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut app_config = AppConfig::from_env()?;
    if let Some(format) = cli.log_format {
        app_config = app_config.with_log_format(format);
    }
    finagent_utils::init_tracing_with(&app_config);

    info!(
        app = %app_config.app_name,
        environment = %app_config.environment,
        "Starting finagent"
    );

    match cli.command {
        Command::Analyze {
            symbol,
            name,
            concurrent,
            json,
        } => {
            let pipeline = Pipeline::from_config(pipeline_config(concurrent)?)?;
            let symbol = symbol.trim().to_uppercase();
            let outcome = pipeline.analyze(&symbol, name.as_deref()).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            }

            match outcome {
                AnalysisOutcome::Report(record) => {
                    if !json {
                        println!("{}", render::record_report(&record));
                    }
                }
                AnalysisOutcome::Failed(report) => {
                    bail!("Analysis failed for {}: {}", report.identifier, report.error)
                }
            }
        }
        Command::Batch {
            symbols,
            concurrent,
            json,
        } => {
            let pipeline = Pipeline::from_config(pipeline_config(concurrent)?)?;
            let report = pipeline.analyze_batch(&symbols).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", render::batch_table(&report));
            }
        }
        Command::Validate { symbol, json } => {
            let validator = SymbolValidator::live(&pipeline_config(false)?);
            let validation = validator.validate(&symbol).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&validation)?);
            } else {
                println!("{}", render::validation_table(&validation));
            }
            if !validation.valid {
                bail!("{} is not a valid symbol", validation.symbol);
            }
        }
        Command::Health { json } => {
            let status = pipeline_config(false)?.config_status();

            if json {
                let body = serde_json::json!({
                    "status": "healthy",
                    "services": status,
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                println!("{}", render::status_table(&status));
            }
        }
    }

    Ok(())
}
