mod cli;
mod config;
mod run;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use config::FileConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    attest_logging::init_logging(attest_logging::LogConfig {
        app_name: "attestor",
        verbose: cli.verbose,
    })?;

    let config = FileConfig::load(&cli.config)?;

    let outcome = run::run_control(&cli.specification, &cli.manifest, &config, cli.dry_run).await?;
    let report = &outcome.report;

    if cli.dry_run && report.verdict != attest_protocol::Verdict::Error {
        println!("{}", outcome.compiled_sql);
        return Ok(());
    }

    println!(
        "{} verdict={} population={} exceptions={} rate={}%",
        report.control_id,
        report.verdict,
        report.total_population,
        report.exception_count,
        report.exception_rate_percent
    );
    if let Some(message) = &report.error_message {
        println!("  {message}");
    }

    if report.verdict == attest_protocol::Verdict::Error {
        std::process::exit(1);
    }
    if report.verdict == attest_protocol::Verdict::Fail {
        std::process::exit(2);
    }
    Ok(())
}
