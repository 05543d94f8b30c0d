// Pricing Run — submit one panel configuration and print its chart data
//
// Usage:
//   cargo run --bin pricing-run                                   # simulate with defaults
//   cargo run --bin pricing-run -- --mode optimize --add-packages 2
//   cargo run --bin pricing-run -- --set price=150 --set pct_5g=   # derive the 5G share
//   cargo run --bin pricing-run -- --offline --json                # synthetic engine, raw view
//   PRICING_ENGINE_URL=http://engine:8000 cargo run --bin pricing-run

mod report;

use std::error::Error;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pricing_panel::http::{EngineConfig, HttpTransport, ENDPOINT_ENV};
use pricing_panel::synthetic::SyntheticEngine;
use pricing_panel::{Mode, PricingPanel, RunOutcome, Transport};

// ─── CLI Parsing ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Simulate,
    Optimize,
}

impl From<ModeArg> for Mode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Simulate => Mode::Simulate,
            ModeArg::Optimize => Mode::Optimize,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "pricing-run", version, about = "Submit one pricing simulation and print its chart data")]
struct Cli {
    /// Engine base address
    #[arg(long, env = ENDPOINT_ENV)]
    endpoint: Option<String>,

    #[arg(long, value_enum, default_value_t = ModeArg::Simulate)]
    mode: ModeArg,

    /// Edit one field, e.g. `--set N0=20000` or `--set packages[1].price=80`
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Packages to append to the portfolio before editing
    #[arg(long, default_value_t = 0)]
    add_packages: u32,

    /// Answer locally with the synthetic engine instead of calling out
    #[arg(long)]
    offline: bool,

    /// Print the canonical view as JSON instead of the report
    #[arg(long)]
    json: bool,
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pricing_panel=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: could not start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    if cli.offline {
        info!("using synthetic engine");
        return drive(PricingPanel::new(SyntheticEngine), &cli).await;
    }
    let config = EngineConfig::with_base_url(cli.endpoint.as_deref());
    info!(url = %config.base_url, "using engine");
    drive(PricingPanel::new(HttpTransport::new(config)?), &cli).await
}

async fn drive<T: Transport>(panel: PricingPanel<T>, cli: &Cli) -> Result<ExitCode, Box<dyn Error>> {
    panel.set_mode(cli.mode.into());
    for _ in 0..cli.add_packages {
        panel.add_package();
    }
    for edit in &cli.set {
        let (key, value) = edit
            .split_once('=')
            .ok_or_else(|| format!("--set expects KEY=VALUE, got `{}`", edit))?;
        panel.set_field(key.trim(), value)?;
    }

    match panel.submit().await {
        Err(errors) => {
            eprintln!("\n  Request rejected ({} problem(s)):", errors.len());
            for e in &errors {
                eprintln!("    {}", e);
            }
            Ok(ExitCode::from(2))
        }
        Ok(RunOutcome::Success(view)) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(view.as_ref())?);
            } else {
                report::print(&view);
            }
            Ok(ExitCode::SUCCESS)
        }
        Ok(RunOutcome::Failed(msg)) => {
            eprintln!("error: {}", msg);
            Ok(ExitCode::FAILURE)
        }
        Ok(RunOutcome::Discarded) => Ok(ExitCode::FAILURE),
    }
}
