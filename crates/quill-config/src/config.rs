use std::{
    fs,
    path::{Path, PathBuf},
    sync::{LazyLock, PoisonError, RwLock},
};

use documented::{Documented, DocumentedFields};
use serde::{Deserialize, Serialize};
use toml_edit::DocumentMut;
use tracing::{debug, info};

use crate::{
    annotations::annotate_toml_table,
    error::{ConfigError, Result},
};

/// quill configuration
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, Documented, DocumentedFields)]
#[serde(default)]
pub struct Config {
    /// Placeholder style for bound parameters: "?" or "?NNN".
    /// Default: "?"
    pub placeholder: String,

    /// SQLite database that `quill apply` writes to.
    /// Default: $XDG_DATA_HOME/quill/quill.db
    pub database: Option<String>,

    /// Enables `PRAGMA foreign_keys` on every opened database.
    /// Default: true
    pub foreign_keys: Option<bool>,

    /// Prints every compiled statement.
    /// Default: false
    pub log_sql: Option<bool>,

    /// Table declarations read when no file is given on the command line.
    pub schema: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

pub static CONFIG: LazyLock<RwLock<Option<Config>>> = LazyLock::new(|| RwLock::new(None));

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/"))
}

fn xdg_dir(var: &str, fallback: &str) -> PathBuf {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(fallback))
}

/// Expands a leading `~` and `$VAR`/`${VAR}` references.
fn resolve_path(path: &str) -> PathBuf {
    let path = match path.strip_prefix('~') {
        Some(rest) => format!("{}{rest}", home_dir().display()),
        None => path.to_string(),
    };

    let mut out = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }
        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if braced && chars.peek() == Some(&'}') {
            chars.next();
        }
        if name.is_empty() {
            out.push('$');
        } else {
            out.push_str(&std::env::var(&name).unwrap_or_default());
        }
    }
    PathBuf::from(out)
}

/// `$QUILL_CONFIG`, or `$XDG_CONFIG_HOME/quill/config.toml`.
pub fn config_path() -> PathBuf {
    match std::env::var("QUILL_CONFIG") {
        Ok(path) => PathBuf::from(path),
        Err(_) => xdg_dir("XDG_CONFIG_HOME", ".config")
            .join("quill")
            .join("config.toml"),
    }
}

/// Loads the configuration file into [`CONFIG`].
pub fn init() -> Result<()> {
    let config = Config::new()?;
    set_config(config);
    Ok(())
}

pub fn set_config(config: Config) {
    let mut guard = CONFIG.write().unwrap_or_else(PoisonError::into_inner);
    *guard = Some(config);
}

/// The process-wide configuration, defaulted when [`init`] never ran.
pub fn get_config() -> Config {
    if let Some(config) = CONFIG
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        return config.clone();
    }

    let mut guard = CONFIG.write().unwrap_or_else(PoisonError::into_inner);
    guard.get_or_insert_with(Config::default_config).clone()
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            placeholder: "?".to_string(),
            database: Some(format!(
                "{}/quill/quill.db",
                xdg_dir("XDG_DATA_HOME", ".local/share").display()
            )),
            foreign_keys: Some(true),
            log_sql: Some(false),
            schema: None,
        }
    }

    /// Loads the configuration file, falling back to defaults when it does
    /// not exist.
    pub fn new() -> Result<Self> {
        Self::load(&config_path())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut config: Config = match fs::read_to_string(path) {
            Ok(content) => {
                debug!("loading configuration from {}", path.display());
                toml::from_str(&content)?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default_config(),
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.resolve()?;
        Ok(config)
    }

    pub fn resolve(&mut self) -> Result<()> {
        match self.placeholder.trim() {
            "?" | "?NNN" | "?nnn" => {}
            other => return Err(ConfigError::InvalidPlaceholder(other.to_string())),
        }

        self.foreign_keys.get_or_insert(true);
        self.log_sql.get_or_insert(false);
        Ok(())
    }

    pub fn get_database_path(&self) -> PathBuf {
        if let Ok(env_path) = std::env::var("QUILL_DATABASE") {
            return resolve_path(&env_path);
        }
        match &self.database {
            Some(database) => resolve_path(database),
            None => xdg_dir("XDG_DATA_HOME", ".local/share")
                .join("quill")
                .join("quill.db"),
        }
    }

    pub fn get_schema_path(&self) -> Option<PathBuf> {
        self.schema.as_deref().map(resolve_path)
    }

    pub fn foreign_keys(&self) -> bool {
        self.foreign_keys.unwrap_or(true)
    }

    pub fn log_sql(&self) -> bool {
        self.log_sql.unwrap_or(false)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serialized)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    pub fn to_annotated_document(&self) -> Result<DocumentMut> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut doc = toml_string.parse::<DocumentMut>()?;
        annotate_toml_table::<Config>(doc.as_table_mut(), true)?;
        Ok(doc)
    }
}

/// The default configuration with every field documented.
pub fn default_config_document() -> Result<DocumentMut> {
    Config::default_config().to_annotated_document()
}

/// Writes the annotated default configuration to `path`, or to
/// [`config_path`], refusing to overwrite an existing file.
pub fn generate_default_config(path: Option<&Path>) -> Result<PathBuf> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    if path.exists() {
        return Err(ConfigError::ConfigAlreadyExists(path.display().to_string()));
    }

    let doc = default_config_document()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, doc.to_string())?;
    info!(
        "Default configuration file generated with documentation at: {}",
        path.display()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::tempdir;

    use super::*;
    use crate::test_utils::with_env;

    #[test]
    fn test_default_config_creation() {
        let config = Config::default_config();

        assert_eq!(config.placeholder, "?");
        assert!(config.foreign_keys());
        assert!(!config.log_sql());
        assert!(config.schema.is_none());
    }

    #[test]
    fn test_resolve_rejects_unknown_placeholder() {
        let mut config = Config::default_config();
        config.placeholder = "$1".to_string();

        let result = config.resolve();
        assert!(matches!(result, Err(ConfigError::InvalidPlaceholder(_))));
    }

    #[test]
    fn test_resolve_sets_defaults() {
        let mut config = Config::default_config();
        config.foreign_keys = None;
        config.log_sql = None;
        config.placeholder = "?NNN".to_string();

        config.resolve().unwrap();

        assert_eq!(config.foreign_keys, Some(true));
        assert_eq!(config.log_sql, Some(false));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "placeholder = \"?NNN\"\nlog_sql = true\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.placeholder, "?NNN");
        assert!(config.log_sql());
        assert!(config.foreign_keys());
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "placeholder = [").unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::TomlDeError(_))
        ));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default_config());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default_config();
        let serialized = toml::to_string(&config).unwrap();

        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_annotated_document() {
        let doc = default_config_document().unwrap().to_string();

        assert!(doc.contains("# Placeholder style for bound parameters"));
        assert!(doc.contains("# Default: true"));
        assert!(doc.contains("placeholder = \"?\""));

        let parsed: Config = toml::from_str(&doc).unwrap();
        assert_eq!(parsed.placeholder, "?");
    }

    #[test]
    fn test_generate_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quill").join("config.toml");

        let written = generate_default_config(Some(&path)).unwrap();
        assert_eq!(written, path);
        assert!(path.exists());

        assert!(matches!(
            generate_default_config(Some(&path)),
            Err(ConfigError::ConfigAlreadyExists(_))
        ));
    }

    #[test]
    #[serial]
    fn test_config_path_env_override() {
        with_env(vec![("QUILL_CONFIG", Some("/custom/quill.toml"))], || {
            assert_eq!(config_path(), PathBuf::from("/custom/quill.toml"));
        });

        with_env(
            vec![("QUILL_CONFIG", None), ("XDG_CONFIG_HOME", Some("/xdg"))],
            || {
                assert_eq!(config_path(), PathBuf::from("/xdg/quill/config.toml"));
            },
        );
    }

    #[test]
    #[serial]
    fn test_database_path_resolution() {
        with_env(
            vec![("QUILL_DATABASE", None), ("QUILL_TEST_ROOT", Some("/srv"))],
            || {
                let mut config = Config::default_config();
                config.database = Some("${QUILL_TEST_ROOT}/app.db".to_string());
                assert_eq!(config.get_database_path(), PathBuf::from("/srv/app.db"));

                config.database = Some("$QUILL_TEST_ROOT/data/app.db".to_string());
                assert_eq!(
                    config.get_database_path(),
                    PathBuf::from("/srv/data/app.db")
                );
            },
        );

        with_env(vec![("QUILL_DATABASE", Some("/tmp/override.db"))], || {
            let config = Config::default_config();
            assert_eq!(
                config.get_database_path(),
                PathBuf::from("/tmp/override.db")
            );
        });
    }

    #[test]
    #[serial]
    fn test_global_config() {
        let mut config = Config::default_config();
        config.log_sql = Some(true);
        set_config(config);

        assert!(get_config().log_sql());
        set_config(Config::default_config());
        assert!(!get_config().log_sql());
    }
}
