use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{HealthError, Result};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    /// TrueType font for chart text.
    pub chart_font: Option<PathBuf>,
}

impl Config {
    /// Reads the process environment, falling back to `env_file` or a `.env` found from the
    /// working directory upwards. Process variables win over file entries.
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        Self::load_with(env_file, |key| std::env::var(key).ok())
    }

    pub fn load_with(
        env_file: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let file_values = read_env_file(env_file)?;
        Self::from_lookup(|key| lookup(key).or_else(|| file_values.get(key).cloned()))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| HealthError::config("DATABASE_URL must be set to a Postgres instance"))?;

        let max_connections = match lookup("HEALTH_DB_MAX_CONNECTIONS") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => raw.trim().parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| {
                HealthError::config(format!(
                    "HEALTH_DB_MAX_CONNECTIONS must be a positive integer, got {raw:?}"
                ))
            })?,
        };

        let chart_font = lookup("HEALTH_CHART_FONT")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            database_url,
            max_connections,
            chart_font,
        })
    }
}

/// An explicit file must exist; the implicit `.env` is optional.
fn read_env_file(env_file: Option<&Path>) -> Result<HashMap<String, String>> {
    let entries = match env_file {
        Some(path) => dotenvy::from_path_iter(path).map_err(|err| {
            HealthError::config(format!("cannot read env file {}: {err}", path.display()))
        })?,
        None => match dotenvy::dotenv_iter() {
            Ok(entries) => entries,
            Err(err) if err.not_found() => return Ok(HashMap::new()),
            Err(err) => return Err(HealthError::config(format!("cannot read .env: {err}"))),
        },
    };
    entries
        .map(|entry| entry.map_err(|err| HealthError::config(format!("malformed env file: {err}"))))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn database_url_is_required() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, HealthError::Config(_)));
        assert!(err.to_string().contains("DATABASE_URL"));

        let blank = Config::from_lookup(lookup_from(&[("DATABASE_URL", "  ")]));
        assert!(blank.is_err());
    }

    #[test]
    fn defaults_pool_size() {
        let config =
            Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/health")]))
                .unwrap();
        assert_eq!(config.database_url, "postgres://localhost/health");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.chart_font, None);
    }

    #[test]
    fn reads_optional_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/health"),
            ("HEALTH_DB_MAX_CONNECTIONS", "2"),
            ("HEALTH_CHART_FONT", "/opt/fonts/Inter.ttf"),
        ]))
        .unwrap();
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.chart_font, Some(PathBuf::from("/opt/fonts/Inter.ttf")));
    }

    #[test]
    fn rejects_bad_pool_size() {
        for raw in ["zero", "0", "-1"] {
            let result = Config::from_lookup(lookup_from(&[
                ("DATABASE_URL", "postgres://localhost/health"),
                ("HEALTH_DB_MAX_CONNECTIONS", raw),
            ]));
            assert!(matches!(result, Err(HealthError::Config(_))), "{raw}");
        }
    }

    fn env_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn env_file_values_reach_config() {
        let file = env_file(
            "# local settings\n\
             DATABASE_URL=postgres://localhost/from_file\n\
             HEALTH_DB_MAX_CONNECTIONS=3\n",
        );
        let config = Config::load_with(Some(file.path()), lookup_from(&[])).unwrap();
        assert_eq!(config.database_url, "postgres://localhost/from_file");
        assert_eq!(config.max_connections, 3);
    }

    #[test]
    fn process_variables_override_env_file() {
        let file = env_file(
            "DATABASE_URL=postgres://localhost/from_file\n\
             HEALTH_DB_MAX_CONNECTIONS=3\n",
        );
        let config = Config::load_with(
            Some(file.path()),
            lookup_from(&[("DATABASE_URL", "postgres://db.internal/health")]),
        )
        .unwrap();
        assert_eq!(config.database_url, "postgres://db.internal/health");
        assert_eq!(config.max_connections, 3);
    }

    #[test]
    fn missing_explicit_env_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.env");
        let result = Config::load_with(
            Some(absent.as_path()),
            lookup_from(&[("DATABASE_URL", "postgres://localhost/health")]),
        );
        assert!(matches!(result, Err(HealthError::Config(_))));
    }
}
