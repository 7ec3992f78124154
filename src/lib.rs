//! fara-principals: foreign principal registrations from the FARA e-file registry
//!
//! The registry only exposes its data through an interactive report widget, so
//! this crate replays the widget's postback protocol: it scrapes session tokens
//! out of hidden form fields, toggles the country column, walks the paged result
//! table and attaches exhibit document links to every registration record.

pub mod config;
pub mod crawler;
pub mod markup;
pub mod output;
pub mod state;

use thiserror::Error;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum FaraError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Protocol drift at {url}: expected {expectation}")]
    ProtocolDrift {
        expectation: &'static str,
        url: String,
    },

    #[error("Invalid registration date '{value}': {source}")]
    DateParse {
        value: String,
        source: chrono::ParseError,
    },

    #[error("Missing column {column} in row on {url}")]
    MissingColumn { column: &'static str, url: String },

    #[error("Exhibit listing at {url} spans more than one page")]
    UnsupportedMultiPageExhibits { url: String },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Invalid header {name}: {message}")]
    InvalidHeader { name: String, message: String },

    #[error("Markup error: {0}")]
    Markup(#[from] MarkupError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CrawlState,
        to: state::CrawlState,
    },

    #[error("Exhibit task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl FaraError {
    /// Stable reason code, logged when a run terminates early
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::ProtocolDrift { .. } => "protocol_drift",
            Self::DateParse { .. } | Self::MissingColumn { .. } => "parse_failure",
            Self::UnsupportedMultiPageExhibits { .. } => "unsupported_multi_page_exhibits",
            Self::Http { .. } | Self::HttpStatus { .. } | Self::Reqwest(_) => "transport",
            Self::InvalidHeader { .. } | Self::UrlParse(_) => "request",
            Self::Markup(_) => "markup",
            Self::Output(_) => "output",
            Self::InvalidTransition { .. } | Self::Task(_) => "internal",
        }
    }

    /// Returns true if the error only invalidates a single table row
    pub fn is_row_local(&self) -> bool {
        matches!(self, Self::DateParse { .. } | Self::MissingColumn { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Markup selection errors
#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, FaraError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for markup operations
pub type MarkupResult<T> = std::result::Result<T, MarkupError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{crawl, Coordinator, Record};
pub use state::{CrawlContext, CrawlState};
