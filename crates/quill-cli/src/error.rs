use miette::Diagnostic;
use quill_config::error::ConfigError;
use quill_db::DbError;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Db(#[from] DbError),

    #[error("IO error on {path}: {source}")]
    #[diagnostic(code(quill::io))]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse declarations: {0}")]
    #[diagnostic(
        code(quill::declarations_syntax),
        help("Check the [[table]] entries of the declarations file")
    )]
    Toml(#[from] toml::de::Error),

    #[error("Invalid declaration of `{table}`: {reason}")]
    #[diagnostic(code(quill::declaration))]
    Declaration { table: String, reason: String },

    #[error("No declarations file given")]
    #[diagnostic(
        code(quill::no_schema),
        help("Pass a file or set `schema` in the configuration")
    )]
    NoSchema,

    #[error("JSON serialization error: {0}")]
    #[diagnostic(code(quill::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn declaration(table: impl Into<String>, reason: impl Into<String>) -> Self {
        CliError::Declaration {
            table: table.into(),
            reason: reason.into(),
        }
    }
}

pub type CliResult<T> = std::result::Result<T, CliError>;

pub trait IoContext<T> {
    fn with_path(self, path: &std::path::Path) -> CliResult<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn with_path(self, path: &std::path::Path) -> CliResult<T> {
        self.map_err(|source| CliError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}
