use brrtnav::cli::{run_cli, Cli};
use brrtnav::telemetry::{init_logging_with_config, LogConfig, LogFormat};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = LogConfig::from_env();
    config.log_level = cli.log_level.clone();
    if std::env::var("BRRTNAV_LOG_FORMAT").is_err() {
        config.format = LogFormat::Pretty;
    }
    let _guard = init_logging_with_config(&config)?;

    run_cli(cli)
}
