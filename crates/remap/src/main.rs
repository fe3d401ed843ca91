pub(crate) mod cli;
mod format;

use clap::Parser;

use cli::{Cli, Config};
use remap_agent::{RemapAgent, RemapError, RunOutcome, ShellServiceControl};
use remap_crypto::Ed25519Signer;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = match cli.verbose {
        0 => cli.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let config = Config::from_cli(&cli);

    let code = {
        // Hold the non-blocking guards until the report is printed so logs
        // flush before the process exits.
        let _log_guards = init_logging(env_filter, cli.log_file.as_deref())?;
        let result = run(&config);
        report(&result, config.json);
        match &result {
            Ok(_) => 0,
            Err(e) => e.exit_code(),
        }
    };

    std::process::exit(code);
}

fn run(config: &Config) -> Result<RunOutcome, RemapError> {
    let services = ShellServiceControl::new(config.stop_cmd.clone(), config.start_cmd.clone());
    let mut agent = RemapAgent::new(config.agent.clone(), Ed25519Signer, services);
    agent.run()
}

fn report(result: &Result<RunOutcome, RemapError>, json: bool) {
    match (result, json) {
        (Ok(outcome), true) => println!("{}", format::outcome_json(outcome)),
        (Ok(outcome), false) => println!("{}", format::outcome_text(outcome)),
        (Err(e), true) => println!("{}", format::error_json(e)),
        (Err(e), false) => {
            tracing::error!(kind = ?e.kind(), error = %e, "Remap failed");
            eprintln!("Error: {e}");
        }
    }
}

/// Stderr logging, plus an appending file layer when `log_file` is set.
pub(crate) fn init_logging(
    env_filter: tracing_subscriber::EnvFilter,
    log_file: Option<&std::path::Path>,
) -> anyhow::Result<Vec<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::prelude::*;

    let (nb_stderr, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(nb_stderr);

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
        return Ok(vec![stderr_guard]);
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let (nb_file, file_guard) = tracing_appender::non_blocking(file);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(nb_file);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(vec![stderr_guard, file_guard])
}
