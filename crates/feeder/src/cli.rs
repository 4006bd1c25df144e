//! Command line flags

use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug, Clone)]
#[command(
    version,
    about = "Fetches pair prices from a set of exchanges and writes them to the aggregator contract when they change"
)]
pub struct Args {
    /// Main TOML configuration file
    #[arg(long, default_value = "config/config.toml")]
    pub config: PathBuf,

    /// Log filter directives, e.g. `info` or `info,oracle_executor=debug`. RUST_LOG wins when set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Plain log output without ANSI colors
    #[arg(long)]
    pub disable_ansi_color: bool,

    /// Directory relative paths are resolved against
    #[arg(long)]
    pub working_directory: Option<PathBuf>,
}

impl Args {
    /// Resolve a path against the working directory, if one was given
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        match &self.working_directory {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.resolve(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["price-feeder"]);
        assert_eq!(args.config, PathBuf::from("config/config.toml"));
        assert_eq!(args.log_level, "info");
        assert!(!args.log_json);
        assert!(!args.disable_ansi_color);
        assert_eq!(args.config_path(), PathBuf::from("config/config.toml"));
    }

    #[test]
    fn test_working_directory_resolves_relative_paths() {
        let args = Args::parse_from([
            "price-feeder",
            "--working-directory",
            "/srv/oracle",
            "--config",
            "cfg/feeder.toml",
        ]);
        assert_eq!(args.config_path(), PathBuf::from("/srv/oracle/cfg/feeder.toml"));
        assert_eq!(args.resolve("keys/oracle.key"), PathBuf::from("/srv/oracle/keys/oracle.key"));
        assert_eq!(args.resolve("/etc/oracle.key"), PathBuf::from("/etc/oracle.key"));
    }

    #[test]
    fn test_logging_flags() {
        let args = Args::parse_from([
            "price-feeder",
            "--log-level",
            "debug,hyper=warn",
            "--log-json",
            "--disable-ansi-color",
        ]);
        assert_eq!(args.log_level, "debug,hyper=warn");
        assert!(args.log_json);
        assert!(args.disable_ansi_color);
    }
}
