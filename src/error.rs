use thiserror::Error;

pub type Result<T> = std::result::Result<T, GeoError>;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Reference is missing a label")]
    MissingLabel,
    #[error("Duplicate reference label '{0}'")]
    DuplicateLabel(String),
    #[error("'{0}' is a reserved property")]
    ReservedLabel(String),
    #[error("Failed to parse id '{value}': {source}")]
    InvalidId {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Invalid reference '{0}', expected label=id[,id...]")]
    InvalidReference(String),
    #[error("Nothing to update")]
    NothingToUpdate,

    #[error("Record '{0}' not found")]
    NotFound(String),
    #[error("I/O error accessing '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP error for '{url}': {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unexpected HTTP status {status} for '{url}'")]
    HttpStatus { url: String, status: u16 },
    #[error("Unsupported store scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("Invalid store URI '{uri}': {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Store '{0}' is read-only")]
    ReadOnly(String),

    #[error("Failed to decode '{path}': {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Invalid geometry for '{path}': {reason}")]
    InvalidGeometry { path: String, reason: String },
    #[error("Record '{path}' is missing property '{property}'")]
    MissingProperty { path: String, property: String },
    #[error("Failed to patch '{path}': {reason}")]
    Patch { path: String, reason: String },
    #[error("Default geometry is not defined")]
    MissingDefaultGeometry,
    #[error("Failed to derive alt label from '{0}'")]
    InvalidAltLabel(String),

    #[error("Error joining concurrent task: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

impl GeoError {
    pub fn decode(path: impl Into<String>, source: serde_json::Error) -> Self {
        GeoError::Decode {
            path: path.into(),
            source,
        }
    }

    pub fn missing_property(path: impl Into<String>, property: impl Into<String>) -> Self {
        GeoError::MissingProperty {
            path: path.into(),
            property: property.into(),
        }
    }
}
