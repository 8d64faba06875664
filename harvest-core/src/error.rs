use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Reddit API error: {0}")]
    RedditApi(#[from] RedditApiError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Failed to fetch page of r/{collection} (after={}): {source}", .cursor.as_deref().unwrap_or("<first page>"))]
    PageFetch {
        collection: String,
        cursor: Option<String>,
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    /// Attaches listing context to a failure raised while fetching one page.
    pub fn page_fetch(collection: &str, cursor: Option<&str>, source: CoreError) -> Self {
        CoreError::PageFetch {
            collection: collection.to_string(),
            cursor: cursor.map(str::to_string),
            source: Box::new(source),
        }
    }

    /// The innermost error, with page context stripped.
    pub fn root(&self) -> &CoreError {
        match self {
            CoreError::PageFetch { source, .. } => source.root(),
            other => other,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum RedditApiError {
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Invalid OAuth token")]
    InvalidToken,

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Subreddit not found: {subreddit}")]
    SubredditNotFound { subreddit: String },

    #[error("Request timeout: {endpoint}")]
    RequestTimeout { endpoint: String },

    #[error("Server error {status_code} from {endpoint}")]
    ServerError { status_code: u16, endpoint: String },

    #[error("Unexpected status {status_code} from {endpoint}")]
    UnexpectedStatus { status_code: u16, endpoint: String },

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to move export into place at {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration format: {details}")]
    InvalidFormat { details: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
