use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

use remap_agent::{AgentConfig, DEFAULT_COORDINATOR};
use remap_client::{Timeouts, CONNECT_TIMEOUT, READ_TIMEOUT};
use remap_common::Ia;

#[derive(Parser, Debug)]
#[command(
    name = "remap",
    version,
    about = "Re-establish a SCION AS identity with the Coordinator and install its new configuration"
)]
pub struct Cli {
    /// AS identity to remap (e.g. "17-ffaa:0:1"); default: first line of $SC/gen/ia
    #[arg(long, env = "REMAP_IA", value_parser = parse_ia)]
    pub ia: Option<Ia>,

    /// SCION installation root
    #[arg(long, env = "SC", value_name = "PATH")]
    pub sc: Option<PathBuf>,

    /// Coordinator base URL
    #[arg(long, env = "SCION_COORD_URL", default_value = DEFAULT_COORDINATOR)]
    pub coordinator: String,

    /// Directory holding the AS signing keys (*.seed); default: the beacon server's keys/
    #[arg(long, value_name = "PATH")]
    pub key_dir: Option<PathBuf>,

    /// TCP connect timeout
    #[arg(long, value_name = "SECONDS", default_value_t = CONNECT_TIMEOUT.as_secs())]
    pub connect_timeout: u64,

    /// Read timeout per request (bundle generation can be slow)
    #[arg(long, value_name = "SECONDS", default_value_t = READ_TIMEOUT.as_secs())]
    pub read_timeout: u64,

    /// Shell command run before the configuration is swapped
    #[arg(long, env = "REMAP_STOP_CMD", value_name = "CMD")]
    pub stop_cmd: Option<String>,

    /// Shell command run after the configuration is swapped
    #[arg(long, env = "REMAP_START_CMD", value_name = "CMD")]
    pub start_cmd: Option<String>,

    /// Do not take the $SC/.remap.lock advisory lock
    #[arg(long)]
    pub no_lock: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "REMAP_LOG", default_value = "info")]
    pub log_level: String,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Write logs to file (in addition to stderr)
    #[arg(long, env = "REMAP_LOG_FILE", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Output JSON instead of human-readable text
    #[arg(long)]
    pub json: bool,
}

fn parse_ia(s: &str) -> Result<Ia, String> {
    Ia::parse(s).map_err(|e| e.to_string())
}

/// Everything the run needs, resolved from flags, environment and
/// defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub agent: AgentConfig,
    pub stop_cmd: Option<String>,
    pub start_cmd: Option<String>,
    pub json: bool,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Self {
        let sc_root = cli.sc.clone().unwrap_or_else(remap_common::paths::sc_root);
        let mut agent = AgentConfig::new(sc_root);
        agent.ia = cli.ia;
        agent.key_dir = cli.key_dir.clone();
        agent.coordinator = cli.coordinator.clone();
        agent.timeouts = Timeouts {
            connect: Duration::from_secs(cli.connect_timeout),
            read: Duration::from_secs(cli.read_timeout),
        };
        agent.lock = !cli.no_lock;

        Self {
            agent,
            stop_cmd: non_empty(cli.stop_cmd.as_deref()),
            start_cmd: non_empty(cli.start_cmd.as_deref()),
            json: cli.json,
        }
    }
}

fn non_empty(cmd: Option<&str>) -> Option<String> {
    cmd.map(str::trim).filter(|c| !c.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["remap"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_map_onto_agent_config() {
        let cli = parse(&[
            "--ia",
            "17-ffaa:0:1",
            "--sc",
            "/opt/scion",
            "--coordinator",
            "https://coord.example/",
            "--read-timeout",
            "5",
            "--no-lock",
            "--stop-cmd",
            "systemctl stop scionlab.target",
        ]);
        let config = Config::from_cli(&cli);

        assert_eq!(config.agent.ia.unwrap().to_string(), "17-ffaa:0:1");
        assert_eq!(config.agent.sc_root, PathBuf::from("/opt/scion"));
        assert_eq!(config.agent.coordinator, "https://coord.example/");
        assert_eq!(config.agent.timeouts.read, Duration::from_secs(5));
        assert_eq!(config.agent.timeouts.connect, CONNECT_TIMEOUT);
        assert!(!config.agent.lock);
        assert_eq!(
            config.stop_cmd.as_deref(),
            Some("systemctl stop scionlab.target")
        );
        assert!(config.start_cmd.is_none());
    }

    #[test]
    fn invalid_ia_is_rejected_by_parser() {
        let result = Cli::try_parse_from(["remap", "--ia", "not-an-ia"]);
        assert!(result.is_err());
    }

    #[test]
    fn blank_hook_commands_are_ignored() {
        let cli = parse(&["--sc", "/opt/scion", "--start-cmd", "  "]);
        let config = Config::from_cli(&cli);
        assert!(config.start_cmd.is_none());
    }

    #[test]
    fn verbosity_counts() {
        let cli = parse(&["--sc", "/opt/scion", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }
}
