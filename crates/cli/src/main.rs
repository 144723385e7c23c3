mod check_command;
mod output;
mod replay;
mod run_command;

use std::{path::PathBuf, time::Duration};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::{output::JsonLines, replay::Script};

#[derive(Parser)]
#[command(name = "chatmux", about = "chatmux: shared chat connections for speaker and auditor nodes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./chatmux.* and the user config dir).
    #[arg(long, global = true, env = "CHATMUX_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured node against a replay script, printing node
    /// status, node output and transport sends as JSON lines.
    Run {
        /// Replay script (JSON).
        #[arg(long)]
        script: PathBuf,
        /// How long to keep nodes open after the last scripted step.
        #[arg(long, default_value_t = 100)]
        linger_ms: u64,
        /// Print collected metrics in Prometheus text format after the run.
        #[arg(long, default_value_t = false)]
        dump_metrics: bool,
    },
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

/// Initialise tracing. Logs go to stderr so stdout stays JSON lines.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<chatmux_config::ChatmuxConfig> {
    match cli.config.as_deref() {
        Some(path) => chatmux_config::load_config(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(chatmux_config::discover_and_load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "chatmux starting");

    match &cli.command {
        Commands::Run {
            script,
            linger_ms,
            dump_metrics,
        } => {
            let config = load_config(&cli)?;
            #[cfg(feature = "metrics")]
            let metrics = chatmux_metrics::init_metrics(chatmux_metrics::MetricsRecorderConfig {
                enabled: config.metrics.enabled || *dump_metrics,
                global_labels: Vec::new(),
            })?;
            #[cfg(not(feature = "metrics"))]
            if *dump_metrics {
                tracing::warn!("built without metrics support; --dump-metrics ignored");
            }

            let script = Script::load(script)?;
            let summary = run_command::run(
                &config,
                script,
                Duration::from_millis(*linger_ms),
                JsonLines::stdout(),
            )
            .await?;
            info!(
                nodes = summary.nodes_started,
                failed = summary.nodes_failed,
                inputs_sent = summary.inputs_sent,
                "run finished"
            );

            #[cfg(feature = "metrics")]
            if *dump_metrics {
                print!("{}", metrics.render());
            }
            Ok(())
        },
        Commands::Check { verbose } => {
            if !check_command::check(cli.config.as_deref(), *verbose)? {
                std::process::exit(1);
            }
            Ok(())
        },
    }
}
