//! CLI argument definitions for surveyor-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.
//! Flags take precedence over environment variables and the config file.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use surveyor_core::config::SurveyorConfig;

/// Surveyor attack-surface discovery daemon.
///
/// Seeds the configured scope domains, expands them through DNS
/// discovery until nothing new is found, then exits.
#[derive(Parser, Debug, Default)]
#[command(name = "surveyor-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to surveyor.toml configuration file.
    ///
    /// Without it, built-in defaults plus `SURVEYOR_*` environment variables are used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Additional scope domain to seed (repeatable).
    #[arg(short, long = "domain", value_name = "DOMAIN")]
    pub domains: Vec<String>,

    /// Enable active enumeration (widest IP sweeps).
    #[arg(long)]
    pub active: bool,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without running discovery.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut SurveyorConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if self.active {
            config.engine.active = true;
        }
        for domain in &self.domains {
            if !config
                .scope
                .domains
                .iter()
                .any(|d| d.eq_ignore_ascii_case(domain))
            {
                config.scope.domains.push(domain.clone());
            }
        }
    }

    /// Load the configuration file (or defaults), apply overrides and validate.
    ///
    /// Precedence: CLI flags > environment > file > defaults.
    pub async fn load_config(&self) -> Result<SurveyorConfig> {
        let mut config = match &self.config {
            Some(path) => SurveyorConfig::from_file(path).await.map_err(|e| {
                anyhow::anyhow!("failed to load config {}: {}", path.display(), e)
            })?,
            None => SurveyorConfig::default(),
        };
        config.apply_env_overrides();
        self.apply_overrides(&mut config);
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repeated_domains() {
        // Given: Two --domain flags and one short -d flag
        let cli = DaemonCli::try_parse_from([
            "surveyor-daemon",
            "--domain",
            "example.com",
            "-d",
            "example.org",
            "--active",
        ])
        .expect("arguments should parse");

        // Then: All domains are collected in order
        assert_eq!(cli.domains, vec!["example.com", "example.org"]);
        assert!(cli.active);
        assert!(cli.config.is_none());
        assert!(!cli.validate);
    }

    #[test]
    fn test_overrides_take_precedence() {
        // Given: A config with its own log settings and one scope domain
        let mut config = SurveyorConfig::default();
        config.scope.domains = vec!["example.com".to_owned()];
        let cli = DaemonCli {
            log_level: Some("debug".to_owned()),
            log_format: Some("pretty".to_owned()),
            active: true,
            domains: vec!["EXAMPLE.com".to_owned(), "example.net".to_owned()],
            ..DaemonCli::default()
        };

        // When: Applying overrides
        cli.apply_overrides(&mut config);

        // Then: Flags win and duplicate domains are not added twice
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "pretty");
        assert!(config.engine.active);
        assert_eq!(config.scope.domains, vec!["example.com", "example.net"]);
    }

    #[test]
    fn test_unset_flags_leave_config_untouched() {
        let mut config = SurveyorConfig::default();
        DaemonCli::default().apply_overrides(&mut config);

        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert!(!config.engine.active);
        assert!(config.scope.domains.is_empty());
    }
}
