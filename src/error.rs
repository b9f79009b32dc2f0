//! Error types for the invoice pipeline.

use thiserror::Error;

/// Why one link parameter could not be used. Never escapes decoding:
/// the field falls back to its default and the reason is logged.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("parameter `{param}` is not valid JSON: {source}")]
    Json {
        param: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("parameter `{param}` has the wrong shape: {reason}")]
    Shape { param: &'static str, reason: String },

    #[error("parameter `{param}` has unknown value `{value}`")]
    UnknownValue { param: &'static str, value: String },

    #[error("invalid link: {0}")]
    Link(String),
}

/// Failure to inline a single image.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("fetch of {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("cannot read asset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot resolve relative asset {0}: no asset directory or base URL configured")]
    Unresolvable(String),
}

/// Anything that stops the export from producing its PDF.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("cannot set up image fetching: {0}")]
    Fetcher(#[from] AssetError),

    #[error("renderer `{0}` is not installed")]
    RendererMissing(String),

    #[error("renderer failed: {0}")]
    Render(String),

    #[error("malformed inlined image: {0}")]
    DataUri(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("prompt cancelled: {0}")]
    Prompt(#[from] inquire::InquireError),
}
