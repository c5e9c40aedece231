use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured metadata carried by a rate-limit failure, as reported by the
/// backend's 429 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Unix seconds at which the current window resets.
    pub reset: i64,
    /// Seconds the caller should wait before retrying.
    pub retry_after: u64,
}

impl RateLimitInfo {
    /// Whole minutes until `reset`, rounded up, never below 1.
    pub fn minutes_until_reset(&self, now: i64) -> i64 {
        let secs = (self.reset - now).max(0);
        ((secs + 59) / 60).max(1)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Rate limit exceeded, retry after {}s", .0.retry_after)]
    RateLimited(RateLimitInfo),

    #[error("Selector server unavailable: {0}")]
    ServerUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_until_reset_rounds_up() {
        let info = RateLimitInfo {
            limit: 100,
            remaining: 0,
            reset: 1_000_120,
            retry_after: 120,
        };
        assert_eq!(info.minutes_until_reset(1_000_000), 2);
        // Partial minutes round up
        assert_eq!(info.minutes_until_reset(1_000_059), 2);
        assert_eq!(info.minutes_until_reset(1_000_061), 1);
    }

    #[test]
    fn minutes_until_reset_floor_is_one() {
        let info = RateLimitInfo {
            limit: 100,
            remaining: 0,
            reset: 1_000_000,
            retry_after: 0,
        };
        // Reset already in the past still reads as "1 minute"
        assert_eq!(info.minutes_until_reset(1_000_500), 1);
    }
}
