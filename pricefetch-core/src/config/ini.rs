//! INI file layer.
//!
//! Sections (`[general]`, `[mariadb]`, `[gnucash]`, `[data]`, `[yahoo]`)
//! only group keys for the reader; every key is collected into one flat
//! layer. Keys match the long CLI option names, with `-` and `_`
//! interchangeable.

use super::layer::PartialConfig;
use super::period::Period;
use super::ConfigError;
use chrono::NaiveDate;
use configparser::ini::Ini;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config.ini";

type IniMap = HashMap<String, HashMap<String, Option<String>>>;

/// Load the file layer.
///
/// A missing file yields an empty layer unless the path was given
/// explicitly, in which case it is an error.
pub fn load_file(path: &Path, explicit: bool) -> Result<PartialConfig, ConfigError> {
    if !path.exists() {
        if explicit {
            return Err(ConfigError::ConfigFile {
                path: path.to_path_buf(),
                reason: "file not found".into(),
            });
        }
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(PartialConfig::default());
    }

    let mut ini = Ini::new();
    let map = ini.load(path).map_err(|reason| ConfigError::ConfigFile {
        path: path.to_path_buf(),
        reason,
    })?;
    tracing::debug!(path = %path.display(), sections = map.len(), "loaded config file");
    from_map(map, &path.display().to_string())
}

/// Parse INI text into a layer. `source_name` is used in error messages.
pub fn parse_str(content: &str, source_name: &str) -> Result<PartialConfig, ConfigError> {
    let mut ini = Ini::new();
    let map = ini
        .read(content.to_string())
        .map_err(|reason| ConfigError::ConfigFile {
            path: PathBuf::from(source_name),
            reason,
        })?;
    from_map(map, source_name)
}

fn from_map(map: IniMap, source_name: &str) -> Result<PartialConfig, ConfigError> {
    let mut layer = PartialConfig::default();
    let mut seen: HashMap<String, String> = HashMap::new();

    let mut sections: Vec<_> = map.into_iter().collect();
    sections.sort_by(|a, b| a.0.cmp(&b.0));

    for (section, entries) in sections {
        let mut entries: Vec<_> = entries.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (raw_key, value) in entries {
            let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
            else {
                continue;
            };
            let key = normalize_key(&raw_key);
            if let Some(previous) = seen.insert(key.clone(), section.clone()) {
                tracing::warn!(
                    key = %key,
                    first = %previous,
                    using = %section,
                    "option set in more than one config section"
                );
            }
            apply(&mut layer, &key, &value, source_name)?;
        }
    }

    Ok(layer)
}

fn normalize_key(key: &str) -> String {
    let key = key.trim().to_ascii_lowercase().replace('-', "_");
    match key.as_str() {
        "start_date" => "start".to_string(),
        "end_date" => "end".to_string(),
        _ => key,
    }
}

fn apply(
    layer: &mut PartialConfig,
    key: &str,
    value: &str,
    source_name: &str,
) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        source_name: source_name.to_string(),
        reason: reason.to_string(),
    };

    let flag = || parse_bool(value).ok_or_else(|| invalid("expected a boolean"));
    let date = || parse_date(value).ok_or_else(|| invalid("expected YYYY-MM-DD"));

    match key {
        "silent" => layer.silent = Some(flag()?),
        "host" => layer.host = Some(value.to_string()),
        "port" => {
            let port = value
                .parse::<u16>()
                .map_err(|_| invalid("expected a port number"))?;
            layer.port = Some(port);
        }
        "user" => layer.user = Some(value.to_string()),
        "pwd" => layer.pwd = Some(value.to_string()),
        "database" => layer.database = Some(value.to_string()),
        "currency" => layer.currency = Some(value.to_ascii_uppercase()),
        "to_mdb" => layer.to_mdb = Some(flag()?),
        "to_csv" => layer.to_csv = Some(flag()?),
        "output_path" => layer.output_path = Some(PathBuf::from(value)),
        "overwrite_csv" => layer.overwrite_csv = Some(flag()?),
        "period" => {
            let period = value
                .parse::<Period>()
                .map_err(|e| invalid(&e.to_string()))?;
            layer.period = Some(period);
        }
        "start" => layer.start = Some(date()?),
        "end" => layer.end = Some(date()?),
        other => {
            tracing::warn!(key = %other, source = %source_name, "ignoring unknown config option")
        }
    }
    Ok(())
}

/// Booleans as written by hand in INI files.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[general]
silent = true

[mariadb]
host = db.local
port = 3307
user = alice
pwd = s3cret

[gnucash]
database = books/home.gnucash
currency = usd

[data]
to-mdb = True
to_csv = false
output-path = out/prices.csv
overwrite_csv = yes

[yahoo]
period = 1mo
start_date = 2024-01-02
end-date = 2024-02-01
"#;

    #[test]
    fn collects_keys_from_every_section() {
        let layer = parse_str(SAMPLE, "sample.ini").unwrap();
        assert_eq!(layer.silent, Some(true));
        assert_eq!(layer.host.as_deref(), Some("db.local"));
        assert_eq!(layer.port, Some(3307));
        assert_eq!(layer.user.as_deref(), Some("alice"));
        assert_eq!(layer.pwd.as_deref(), Some("s3cret"));
        assert_eq!(layer.database.as_deref(), Some("books/home.gnucash"));
        assert_eq!(layer.currency.as_deref(), Some("USD"));
        assert_eq!(layer.to_mdb, Some(true));
        assert_eq!(layer.to_csv, Some(false));
        assert_eq!(layer.output_path, Some(PathBuf::from("out/prices.csv")));
        assert_eq!(layer.overwrite_csv, Some(true));
        assert_eq!(layer.period, Some(Period::Month1));
        assert_eq!(layer.start, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(layer.end, NaiveDate::from_ymd_opt(2024, 2, 1));
    }

    #[test]
    fn empty_values_are_not_provided() {
        let layer = parse_str("[mariadb]\npwd =\nhost = \n", "t.ini").unwrap();
        assert!(layer.pwd.is_none());
        assert!(layer.host.is_none());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let layer = parse_str("[general]\nppprocedure = cleanup\nport = 1\n", "t.ini").unwrap();
        assert_eq!(layer.port, Some(1));
    }

    #[test]
    fn invalid_values_name_key_and_source() {
        let err = parse_str("[mariadb]\nport = lots\n", "bad.ini").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("port"), "{msg}");
        assert!(msg.contains("bad.ini"), "{msg}");

        assert!(parse_str("[yahoo]\nperiod = fortnight\n", "bad.ini").is_err());
        assert!(parse_str("[yahoo]\nstart = 02/01/2024\n", "bad.ini").is_err());
        assert!(parse_str("[data]\nto_csv = maybe\n", "bad.ini").is_err());
    }

    #[test]
    fn missing_default_file_is_empty_layer() {
        let dir = tempfile::tempdir().unwrap();
        let layer = load_file(&dir.path().join("config.ini"), false).unwrap();
        assert_eq!(layer, PartialConfig::default());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_file(&dir.path().join("other.ini"), true).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigFile { .. }));
    }

    #[test]
    fn loads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let layer = load_file(file.path(), true).unwrap();
        assert_eq!(layer.port, Some(3307));
        assert_eq!(layer.period, Some(Period::Month1));
    }

    #[test]
    fn bool_spellings() {
        for s in ["true", "TRUE", "yes", "1", "on"] {
            assert_eq!(parse_bool(s), Some(true), "{s}");
        }
        for s in ["false", "False", "no", "0", "off"] {
            assert_eq!(parse_bool(s), Some(false), "{s}");
        }
        assert_eq!(parse_bool("y"), None);
    }
}
