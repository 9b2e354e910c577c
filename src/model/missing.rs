//! Missing-post ledger types
use std::fmt;

/// Why a targeted post id could not be ingested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissingStatus {
    /// The post does not exist (404, or the page came back without it).
    /// Permanently excluded from gap repair.
    NotFound,

    /// Upstream refused access (403)
    Forbidden,

    /// Any other client-class HTTP status
    HttpError,

    /// Anything else that went wrong while processing the id
    Error,
}

impl MissingStatus {
    /// Maps a client-class HTTP status code to a ledger status
    pub fn from_http_status(status: u16) -> Self {
        match status {
            404 => Self::NotFound,
            403 => Self::Forbidden,
            _ => Self::HttpError,
        }
    }

    /// Returns true if the id should never be retried by gap repair
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::HttpError => "http_error",
            Self::Error => "error",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "not_found" => Some(Self::NotFound),
            "forbidden" => Some(Self::Forbidden),
            "http_error" => Some(Self::HttpError),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn all() -> [Self; 4] {
        [Self::NotFound, Self::Forbidden, Self::HttpError, Self::Error]
    }
}

impl fmt::Display for MissingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// A row of the missing-post ledger
#[derive(Debug, Clone)]
pub struct MissingRecord {
    pub channel: String,
    pub post_id: i64,
    pub status: MissingStatus,
    /// Number of failed attempts; never reset
    pub tries: u32,
    pub last_checked_at: Option<String>,
    pub note: Option<String>,
}
