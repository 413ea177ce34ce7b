use blockframe_core::{BackendError, StoreError};

use snafu::Snafu;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("Series config not found or not readable: {path}"))]
    ReadConfig {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Invalid series config {path}: {source}"))]
    ParseConfig {
        path: String,
        source: serde_json::Error,
    },

    #[snafu(display(
        "Failed to open SQLite database at {path}. \
         Ensure the directory exists and is writable."
    ))]
    OpenDatabase {
        path: String,
        source: BackendError,
    },

    #[snafu(display("Failed to create block table '{table}': {source}"))]
    CreateTable {
        table: String,
        #[snafu(source(from(StoreError, Box::new)))]
        source: Box<StoreError>,
    },

    #[snafu(display("{source}"))]
    Store {
        #[snafu(source(from(StoreError, Box::new)))]
        source: Box<StoreError>,
    },

    #[snafu(display("Failed to render output: {source}"))]
    Render { source: serde_json::Error },
}

impl From<StoreError> for CliError {
    fn from(source: StoreError) -> Self {
        CliError::Store {
            source: Box::new(source),
        }
    }
}
