use crate::error::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest page Reddit will serve for a listing request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// One post flattened to the fixed export shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub title: String,
    pub body_text: String,
    pub upvote_count: i64,
    pub downvote_count: i64,
    pub category_label: Option<String>,
    pub upvote_ratio: f64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub url: String,
    pub permalink: String,
    pub author: Option<String>,
}

/// Listing order accepted by `/r/{subreddit}/{sort}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    Hot,
    #[default]
    New,
    Top,
    Rising,
    Controversial,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Hot => "hot",
            SortMode::New => "new",
            SortMode::Top => "top",
            SortMode::Rising => "rising",
            SortMode::Controversial => "controversial",
        }
    }

    /// Only `top` and `controversial` honour the `t` parameter.
    pub fn accepts_time_filter(&self) -> bool {
        matches!(self, SortMode::Top | SortMode::Controversial)
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hot" => Ok(SortMode::Hot),
            "new" => Ok(SortMode::New),
            "top" => Ok(SortMode::Top),
            "rising" => Ok(SortMode::Rising),
            "controversial" => Ok(SortMode::Controversial),
            other => Err(CoreError::InvalidInput {
                message: format!("unknown sort mode '{}'", other),
            }),
        }
    }
}

/// Period for `top` / `controversial` listings (the `t` query parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFilter {
    Hour,
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFilter::Hour => "hour",
            TimeFilter::Day => "day",
            TimeFilter::Week => "week",
            TimeFilter::Month => "month",
            TimeFilter::Year => "year",
            TimeFilter::All => "all",
        }
    }
}

impl fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeFilter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hour" => Ok(TimeFilter::Hour),
            "day" => Ok(TimeFilter::Day),
            "week" => Ok(TimeFilter::Week),
            "month" => Ok(TimeFilter::Month),
            "year" => Ok(TimeFilter::Year),
            "all" => Ok(TimeFilter::All),
            other => Err(CoreError::InvalidInput {
                message: format!("unknown time filter '{}'", other),
            }),
        }
    }
}

/// Parameters for a paginated walk over one subreddit listing.
///
/// The walk starts at `start_bound` and moves backwards in time until the
/// newest-seen post is at or before `end_bound`, so `start_bound` must not be
/// earlier than `end_bound`.
#[derive(Debug, Clone, PartialEq)]
pub struct PostQuery {
    pub collection: String,
    pub sort: SortMode,
    pub page_size: u32,
    pub start_bound: DateTime<Utc>,
    pub end_bound: DateTime<Utc>,
    pub time_filter: Option<TimeFilter>,
    pub max_pages: Option<u32>,
}

impl PostQuery {
    pub fn new(
        collection: impl Into<String>,
        start_bound: DateTime<Utc>,
        end_bound: DateTime<Utc>,
    ) -> Self {
        Self {
            collection: collection.into(),
            sort: SortMode::default(),
            page_size: MAX_PAGE_SIZE,
            start_bound,
            end_bound,
            time_filter: None,
            max_pages: None,
        }
    }

    pub fn with_sort(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_time_filter(mut self, time_filter: Option<TimeFilter>) -> Self {
        self.time_filter = time_filter;
        self
    }

    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.collection.trim().is_empty() {
            return Err(CoreError::InvalidInput {
                message: "subreddit name must not be empty".to_string(),
            });
        }
        if self.page_size == 0 {
            return Err(CoreError::InvalidInput {
                message: "page size must be positive".to_string(),
            });
        }
        if self.start_bound < self.end_bound {
            return Err(CoreError::InvalidInput {
                message: format!(
                    "start bound {} is earlier than end bound {}",
                    self.start_bound, self.end_bound
                ),
            });
        }
        Ok(())
    }
}
