//! Command-line interface definition using clap
//!
//! Provides structured argument parsing with automatic help generation.
//! Flags override the config file; the config file overrides built-in
//! defaults.

use crate::config::Config;
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::warn;

/// Remote KVM bridge server
#[derive(Parser, Debug, Default)]
#[command(name = "okvm-server")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Server port
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Bind listening address (IPv4 or IPv6 literal)
    #[arg(short = 'B', long, value_name = "ADDR")]
    pub bind: Option<IpAddr>,

    /// MJPG-Streamer root path (default: resolve via system environment path)
    #[arg(long, value_name = "DIR")]
    pub mjpg_root: Option<PathBuf>,

    /// Server log file path (default: stdout and stderr)
    #[arg(long, value_name = "FILE")]
    pub logfile: Option<PathBuf>,

    /// Log level 0..5 (FATAL ERROR WARN INFO DEBUG TRACE)
    #[arg(long, value_name = "LEVEL", value_parser = clap::value_parser!(u8).range(..=5))]
    pub log_level: Option<u8>,

    /// MJPG-Streamer log file path (default: inherit stdout)
    #[arg(long, value_name = "FILE")]
    pub mjpg_logfile: Option<PathBuf>,
}

/// Effective settings after merging CLI over config over defaults
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub bind: IpAddr,
    pub mjpg_root: PathBuf,
    pub logfile: Option<PathBuf>,
    pub log_level: u8,
    pub mjpg_logfile: Option<PathBuf>,
}

impl Settings {
    pub fn merge(cli: Cli, config: Config) -> Self {
        let bind = cli.bind.unwrap_or_else(|| {
            config.server.bind.parse().unwrap_or_else(|_| {
                warn!(
                    "Configured bind address \"{}\" is not an IP literal, using {}",
                    config.server.bind,
                    crate::constants::DEFAULT_BIND
                );
                crate::constants::DEFAULT_BIND.parse().unwrap()
            })
        });
        Self {
            port: cli.port.unwrap_or(config.server.port),
            bind,
            mjpg_root: cli
                .mjpg_root
                .unwrap_or_else(|| PathBuf::from(config.mjpg.root)),
            logfile: cli.logfile.or(non_empty_path(config.logs.file)),
            log_level: cli.log_level.unwrap_or(config.logs.level),
            mjpg_logfile: cli.mjpg_logfile.or(non_empty_path(config.mjpg.logfile)),
        }
    }
}

fn non_empty_path(s: String) -> Option<PathBuf> {
    if s.is_empty() {
        None
    } else {
        Some(PathBuf::from(s))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DEFAULT_LOG_LEVEL, DEFAULT_PORT};

    #[test]
    fn test_cli_parse_defaults() {
        let cli = Cli::parse_from(["okvm-server"]);
        assert!(cli.port.is_none());
        assert!(cli.bind.is_none());
        assert!(cli.mjpg_root.is_none());
        assert!(cli.logfile.is_none());
        assert!(cli.log_level.is_none());
        assert!(cli.mjpg_logfile.is_none());
    }

    #[test]
    fn test_cli_parse_positional_port() {
        let cli = Cli::parse_from(["okvm-server", "7200"]);
        assert_eq!(cli.port, Some(7200));
    }

    #[test]
    fn test_cli_rejects_port_zero() {
        assert!(Cli::try_parse_from(["okvm-server", "0"]).is_err());
    }

    #[test]
    fn test_cli_parse_bind_v4_and_v6() {
        let cli = Cli::parse_from(["okvm-server", "-B", "127.0.0.1"]);
        assert_eq!(cli.bind, Some("127.0.0.1".parse().unwrap()));
        let cli = Cli::parse_from(["okvm-server", "--bind", "::1"]);
        assert_eq!(cli.bind, Some("::1".parse().unwrap()));
    }

    #[test]
    fn test_cli_rejects_bad_bind_literal() {
        assert!(Cli::try_parse_from(["okvm-server", "-B", "localhost"]).is_err());
    }

    #[test]
    fn test_cli_rejects_log_level_out_of_range() {
        assert!(Cli::try_parse_from(["okvm-server", "--log-level", "6"]).is_err());
    }

    #[test]
    fn test_cli_parse_paths() {
        let cli = Cli::parse_from([
            "okvm-server",
            "--mjpg-root",
            "/opt/mjpg",
            "--logfile",
            "/tmp/okvm.log",
            "--mjpg-logfile",
            "/tmp/mjpg.log",
        ]);
        assert_eq!(cli.mjpg_root, Some(PathBuf::from("/opt/mjpg")));
        assert_eq!(cli.logfile, Some(PathBuf::from("/tmp/okvm.log")));
        assert_eq!(cli.mjpg_logfile, Some(PathBuf::from("/tmp/mjpg.log")));
    }

    #[test]
    fn test_settings_merge_prefers_cli() {
        let cli = Cli::parse_from(["okvm-server", "8000", "-B", "::", "--log-level", "5"]);
        let mut config = Config::default();
        config.server.port = 7200;
        config.logs.level = 1;
        let settings = Settings::merge(cli, config);
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.bind, "::".parse::<IpAddr>().unwrap());
        assert_eq!(settings.log_level, 5);
    }

    #[test]
    fn test_settings_merge_falls_back_to_config_then_defaults() {
        let cli = Cli::parse_from(["okvm-server"]);
        let mut config = Config::default();
        config.server.port = 7200;
        config.logs.file = "/var/log/okvm.log".into();
        let settings = Settings::merge(cli, config);
        assert_eq!(settings.port, 7200);
        assert_eq!(settings.logfile, Some(PathBuf::from("/var/log/okvm.log")));
        assert_eq!(settings.log_level, DEFAULT_LOG_LEVEL);

        let settings = Settings::merge(Cli::parse_from(["okvm-server"]), Config::default());
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.bind, "::1".parse::<IpAddr>().unwrap());
        assert_eq!(settings.logfile, None);
        assert_eq!(settings.mjpg_logfile, None);
    }

    #[test]
    fn test_settings_merge_bad_config_bind_falls_back() {
        let cli = Cli::parse_from(["okvm-server"]);
        let mut config = Config::default();
        config.server.bind = "not-an-ip".into();
        let settings = Settings::merge(cli, config);
        assert_eq!(settings.bind, "::1".parse::<IpAddr>().unwrap());
    }
}
