use clap::Parser;
use oapi_contract::cli::{run, Cli};
use oapi_contract::logging::{init_logging_with_config, LogConfig, LogFormat};
use std::io::Write;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env();
    if cli.verbose {
        log_config.log_level = "debug".to_string();
        log_config.format = LogFormat::Pretty;
    } else if std::env::var("OAPI_LOG_LEVEL").is_err() {
        log_config.log_level = "warn".to_string();
    }
    let _guard = init_logging_with_config(&log_config)?;

    let mut report = Vec::new();
    let ok = run(&cli, &mut report).await?;
    std::io::stdout().write_all(&report)?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
