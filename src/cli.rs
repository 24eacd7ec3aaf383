use std::path::PathBuf;

use clap::Parser;

use crate::config::{AttainmentConfig, CONFIG_ENV};

/// JSON-lines sidecar computing CO/PO attainment from marks sheets.
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Attainment config (threshold, CO->PO table, layout rules). Built-in defaults when absent.
    #[arg(long, value_name = "PATH", env = CONFIG_ENV)]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn load_config(&self) -> anyhow::Result<AttainmentConfig> {
        match &self.config {
            Some(p) => AttainmentConfig::from_file(p),
            None => Ok(AttainmentConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_flag_forms() {
        let a = Args::try_parse_from(["coattaind", "--config", "/tmp/x.json"]).expect("parse");
        assert_eq!(a.config, Some(PathBuf::from("/tmp/x.json")));
        let a = Args::try_parse_from(["coattaind", "--config=/tmp/y.json"]).expect("parse");
        assert_eq!(a.config, Some(PathBuf::from("/tmp/y.json")));
    }

    #[test]
    fn unknown_or_incomplete_flags_are_rejected() {
        assert!(Args::try_parse_from(["coattaind", "--cofig", "/etc/x.json"]).is_err());
        assert!(Args::try_parse_from(["coattaind", "--config"]).is_err());
        assert!(Args::try_parse_from(["coattaind", "stray"]).is_err());
    }

    #[test]
    fn missing_config_file_fails_to_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = Args {
            config: Some(dir.path().join("absent.json")),
        };
        assert!(args.load_config().is_err());
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let p = dir.path().join("cfg.json");
        std::fs::write(&p, r#"{ "threshold": 0.5 }"#).expect("write config");
        let args = Args { config: Some(p) };
        let cfg = args.load_config().expect("load");
        assert_eq!(cfg.threshold, 0.5);
        assert_eq!(cfg.co_po_mapping.len(), 7);
    }
}
