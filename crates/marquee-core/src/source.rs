use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    NoMedia,
    ParseError,
    Timeout,
    NetworkError,
    Unknown,
}

impl FailureReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoMedia => "no_media",
            Self::ParseError => "parse_error",
            Self::Timeout => "timeout",
            Self::NetworkError => "network_error",
            Self::Unknown => "unknown",
        }
    }

    pub const fn description(&self) -> &'static str {
        match self {
            Self::NoMedia => "No media files found",
            Self::ParseError => "Parse error",
            Self::Timeout => "Request timeout",
            Self::NetworkError => "Network error",
            Self::Unknown => "Unknown error",
        }
    }

    /// Directory failures that a later crawl can plausibly fix.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::NetworkError | Self::Unknown)
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FailureReason {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no_media" => Ok(Self::NoMedia),
            "parse_error" => Ok(Self::ParseError),
            "timeout" => Ok(Self::Timeout),
            "network_error" => Ok(Self::NetworkError),
            "unknown" => Ok(Self::Unknown),
            _ => Err(crate::Error::InvalidFailureReason(s.to_string())),
        }
    }
}

/// Root listing URL and when it was last crawled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlSource {
    pub base_url: String,
    pub last_crawled_at: Option<DateTime<Utc>>,
}

/// Listing timestamp cache used to skip unchanged directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawledDirectory {
    pub url: String,
    pub remote_modified_at: Option<DateTime<Utc>>,
    pub last_crawled_at: DateTime<Utc>,
    pub movie_count: i64,
}

/// A listing entry that could not be turned into a movie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedParse {
    pub name: String,
    pub url: String,
    pub reason: FailureReason,
    pub raw_text: String,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub retry_count: i64,
}
