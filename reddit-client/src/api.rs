use chrono::{DateTime, TimeZone, Utc};
use harvest_core::{CoreError, PostQuery, PostRecord, RedditApiError};
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub dist: Option<u32>,
}

impl<T> RedditListingData<T> {
    /// The cursor for the following page; Reddit signals the end with `null`,
    /// and an empty string is read the same way.
    pub fn next_cursor(&self) -> Option<&str> {
        self.after.as_deref().filter(|after| !after.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub title: String,
    pub selftext: String,
    pub author: Option<String>,
    pub url: String,
    pub permalink: String,
    pub created_utc: f64,
    pub num_comments: i64,
    pub ups: i64,
    pub downs: i64,
    pub upvote_ratio: f64,
    pub link_flair_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RedditApiClient {
    http_client: Client,
    base_url: String,
}

impl RedditApiClient {
    pub fn new(http_client: Client, base_url: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let mut request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token);

        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }

        info!("Making Reddit API request: {} {}", method, endpoint);
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    return Err(CoreError::RedditApi(RedditApiError::RequestTimeout {
                        endpoint: endpoint.to_string(),
                    }));
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {} {}", status, endpoint);
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        let endpoint = endpoint.to_string();
        let api_error = match status.as_u16() {
            401 => RedditApiError::InvalidToken,
            403 => RedditApiError::Forbidden { resource: endpoint },
            code if status.is_server_error() => RedditApiError::ServerError {
                status_code: code,
                endpoint,
            },
            code => RedditApiError::UnexpectedStatus {
                status_code: code,
                endpoint,
            },
        };
        Err(CoreError::RedditApi(api_error))
    }

    /// Fetches one page of `query.collection`, starting after `after` when set.
    pub async fn get_subreddit_posts(
        &self,
        access_token: &str,
        query: &PostQuery,
        after: Option<&str>,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let subreddit = query.collection.as_str();
        let endpoint = format!("/r/{}/{}", subreddit, query.sort);
        let limit_str = query.page_size.to_string();

        let mut params = Vec::with_capacity(3);
        params.push(("limit", limit_str.as_str()));
        if let Some(after_val) = after {
            params.push(("after", after_val));
        }
        if let Some(time_filter) = query.time_filter {
            if query.sort.accepts_time_filter() {
                params.push(("t", time_filter.as_str()));
            } else {
                warn!(
                    "Ignoring time filter '{}' for sort '{}'",
                    time_filter, query.sort
                );
            }
        }

        let response = self
            .make_request(Method::GET, &endpoint, access_token, Some(params.as_slice()))
            .await
            .map_err(|e| match e {
                CoreError::RedditApi(RedditApiError::UnexpectedStatus {
                    status_code: 404, ..
                }) => CoreError::RedditApi(RedditApiError::SubredditNotFound {
                    subreddit: subreddit.to_string(),
                }),
                other => other,
            })?;

        let body = response.bytes().await?;
        let listing: RedditListing<RedditPostData> = serde_json::from_slice(&body).map_err(|e| {
            error!("Failed to parse subreddit posts: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse posts for r/{}: {}", subreddit, e),
            })
        })?;

        info!(
            "Retrieved {} posts from r/{}",
            listing.data.children.len(),
            subreddit
        );
        Ok(listing)
    }
}

/// Converts Reddit's fractional epoch seconds into a UTC timestamp.
pub fn utc_from_epoch(created_utc: f64) -> Result<DateTime<Utc>, CoreError> {
    let invalid = || {
        CoreError::RedditApi(RedditApiError::InvalidResponse {
            details: format!("created_utc {} is not a valid timestamp", created_utc),
        })
    };
    if !created_utc.is_finite() {
        return Err(invalid());
    }

    let secs = created_utc.trunc() as i64;
    let nanos = ((created_utc.fract().abs()) * 1_000_000_000.0) as u32;
    Utc.timestamp_opt(secs, nanos).single().ok_or_else(invalid)
}

// Flattens a listing item into the export shape; text fields are lowercased.
impl TryFrom<RedditPostData> for PostRecord {
    type Error = CoreError;

    fn try_from(post_data: RedditPostData) -> Result<Self, Self::Error> {
        Ok(Self {
            title: post_data.title.to_lowercase(),
            body_text: post_data.selftext.to_lowercase(),
            upvote_count: post_data.ups,
            downvote_count: post_data.downs,
            category_label: post_data.link_flair_text,
            upvote_ratio: post_data.upvote_ratio,
            comment_count: post_data.num_comments,
            created_at: utc_from_epoch(post_data.created_utc)?,
            url: post_data.url,
            permalink: post_data.permalink,
            author: post_data.author,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post() -> RedditPostData {
        RedditPostData {
            title: "Test Post ÀBC".to_string(),
            selftext: "This is TEST content".to_string(),
            author: Some("test_user".to_string()),
            url: "https://reddit.com/r/test/comments/test123".to_string(),
            permalink: "/r/test/comments/test123".to_string(),
            created_utc: 1640995200.0,
            num_comments: 5,
            ups: 45,
            downs: 3,
            upvote_ratio: 0.93,
            link_flair_text: None,
        }
    }

    #[test]
    fn test_post_record_conversion() {
        let record = PostRecord::try_from(sample_post()).unwrap();
        assert_eq!(record.title, "test post àbc");
        assert_eq!(record.body_text, "this is test content");
        assert_eq!(record.upvote_count, 45);
        assert_eq!(record.downvote_count, 3);
        assert_eq!(record.comment_count, 5);
        assert_eq!(record.created_at.timestamp(), 1640995200);
        assert_eq!(record.author.as_deref(), Some("test_user"));
        assert!(record.category_label.is_none());
    }

    #[test]
    fn test_lowercasing_is_idempotent() {
        let once = PostRecord::try_from(sample_post()).unwrap();
        let mut again = sample_post();
        again.title = once.title.clone();
        again.selftext = once.body_text.clone();
        let twice = PostRecord::try_from(again).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_invalid_timestamp_rejected() {
        let mut post = sample_post();
        post.created_utc = f64::NAN;
        assert!(matches!(
            PostRecord::try_from(post),
            Err(CoreError::RedditApi(RedditApiError::InvalidResponse { .. }))
        ));
    }

    #[test]
    fn test_fractional_epoch() {
        let ts = utc_from_epoch(1640995200.5).unwrap();
        assert_eq!(ts.timestamp(), 1640995200);
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_missing_field_fails_decoding() {
        let body = serde_json::json!({
            "kind": "Listing",
            "data": {
                "after": null,
                "before": null,
                "children": [{ "kind": "t3", "data": { "title": "no body" } }]
            }
        });
        let parsed: Result<RedditListing<RedditPostData>, _> = serde_json::from_value(body);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_next_cursor() {
        let mut data: RedditListingData<RedditPostData> = RedditListingData {
            children: Vec::new(),
            after: Some("t3_next".to_string()),
            before: None,
            dist: None,
        };
        assert_eq!(data.next_cursor(), Some("t3_next"));

        data.after = Some(String::new());
        assert_eq!(data.next_cursor(), None);

        data.after = None;
        assert_eq!(data.next_cursor(), None);
    }
}
