//! INI file configuration adapter.

use crate::domain::error::StonksError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, StonksError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| StonksError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, StonksError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| StonksError::ConfigParse {
                file: "<inline>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key).filter(|v| !v.is_empty())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[data]
provider = csv
csv_dir = fixtures/prices
cache_hours = 4
stale_fallback = no

[strategy]
name = Golden Cross
short_window = 20
long_window = 100

[backtest]
initial_capital = 25000.5
commission = 0.0005
"#;

    #[test]
    fn from_string_reads_all_sections() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(adapter.get_string("data", "provider"), Some("csv".to_string()));
        assert_eq!(
            adapter.get_string("strategy", "name"),
            Some("Golden Cross".to_string())
        );
        assert_eq!(adapter.get_int("strategy", "short_window", 50), 20);
        assert_eq!(adapter.get_int("data", "cache_hours", 1), 4);
        assert_eq!(
            adapter.get_double("backtest", "initial_capital", 10_000.0),
            25000.5
        );
        assert!(!adapter.get_bool("data", "stale_fallback", true));
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let adapter = FileConfigAdapter::from_string("[strategy]\n").unwrap();
        assert_eq!(adapter.get_string("strategy", "name"), None);
        assert_eq!(adapter.get_string("nowhere", "name"), None);
        assert_eq!(adapter.get_int("strategy", "long_window", 200), 200);
        assert_eq!(adapter.get_double("backtest", "commission", 0.001), 0.001);
        assert!(adapter.get_bool("data", "stale_fallback", true));
    }

    #[test]
    fn non_numeric_values_fall_back_to_defaults() {
        let adapter = FileConfigAdapter::from_string(
            "[strategy]\nshort_window = fast\n[backtest]\ncommission = cheap\n",
        )
        .unwrap();
        assert_eq!(adapter.get_int("strategy", "short_window", 50), 50);
        assert_eq!(adapter.get_double("backtest", "commission", 0.001), 0.001);
    }

    #[test]
    fn empty_value_reads_as_missing() {
        let adapter = FileConfigAdapter::from_string("[strategy]\nname =\n").unwrap();
        assert_eq!(adapter.get_string("strategy", "name"), None);
    }

    #[test]
    fn bool_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[flags]\na = YES\nb = off\nc = 1\nd = maybe\n",
        )
        .unwrap();
        assert!(adapter.get_bool("flags", "a", false));
        assert!(!adapter.get_bool("flags", "b", true));
        assert!(adapter.get_bool("flags", "c", false));
        assert!(adapter.get_bool("flags", "d", true));
        assert!(!adapter.get_bool("flags", "d", false));
    }

    #[test]
    fn from_file_loads_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", SAMPLE).unwrap();

        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_int("strategy", "long_window", 200), 100);
    }

    #[test]
    fn from_file_missing_is_parse_error() {
        let err = FileConfigAdapter::from_file("/nonexistent/stonks.ini").unwrap_err();
        match err {
            StonksError::ConfigParse { file, .. } => {
                assert!(file.contains("stonks.ini"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
