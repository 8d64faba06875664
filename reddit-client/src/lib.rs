pub mod api;
pub mod auth;

#[cfg(test)]
mod tests;

pub use api::{RedditApiClient, RedditListing, RedditListingData, RedditPostData};
pub use auth::TokenSession;

use harvest_core::{
    AppConfig, ConfigError, CoreError, PostQuery, PostRecord, DEFAULT_API_BASE_URL,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TOKEN_URL,
};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct RedditOAuth2Config {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub token_url: String,
    pub api_base_url: String,
    pub request_timeout: Duration,
}

impl RedditOAuth2Config {
    pub fn new(client_id: String, client_secret: String, user_agent: String) -> Self {
        Self {
            client_id,
            client_secret,
            user_agent,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let credentials = config.credentials()?;
        Ok(Self::new(
            credentials.client_id,
            credentials.client_secret,
            config.user_agent.clone(),
        )
        .with_token_url(&config.token_url)
        .with_api_base_url(&config.api_base_url)
        .with_request_timeout(Duration::from_secs(config.request_timeout_secs)))
    }

    pub fn with_token_url(mut self, token_url: &str) -> Self {
        self.token_url = token_url.to_string();
        self
    }

    pub fn with_api_base_url(mut self, api_base_url: &str) -> Self {
        self.api_base_url = api_base_url.to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

pub struct RedditClient {
    session: TokenSession,
    api: RedditApiClient,
}

impl RedditClient {
    pub fn new(config: RedditOAuth2Config) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .build()?;

        let session = TokenSession::new(
            &config.client_id,
            &config.client_secret,
            &config.token_url,
            http_client.clone(),
        )?;
        let api = RedditApiClient::new(http_client, &config.api_base_url);

        Ok(Self { session, api })
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Requests the bearer token if the session has none yet.
    pub async fn fetch_token(&self) -> Result<&str, CoreError> {
        self.session.fetch_token().await
    }

    /// Walks the listing described by `query` page by page.
    ///
    /// The walk stops when the last post of a page is at or before
    /// `query.end_bound`, when Reddit returns no further cursor, when a page
    /// comes back empty, or after `query.max_pages` pages. Every post of the
    /// final page is kept, so the result may reach slightly past the end
    /// bound. Posts are returned in the order Reddit delivered them.
    ///
    /// A failed request aborts the walk; posts from earlier pages are dropped.
    pub async fn fetch_posts(&self, query: &PostQuery) -> Result<Vec<PostRecord>, CoreError> {
        query.validate()?;
        info!(
            "Fetching r/{} ({}, {} per page) from {} back to {}",
            query.collection, query.sort, query.page_size, query.start_bound, query.end_bound
        );

        let access_token = self.fetch_token().await?;

        let mut posts = Vec::new();
        let mut cursor: Option<String> = None;
        let mut current = query.start_bound;
        let mut pages_fetched: u32 = 0;

        while current > query.end_bound {
            if query.max_pages.is_some_and(|max| pages_fetched >= max) {
                info!("Reached page limit of {}", pages_fetched);
                break;
            }

            let listing = self
                .api
                .get_subreddit_posts(access_token, query, cursor.as_deref())
                .await
                .map_err(|e| CoreError::page_fetch(&query.collection, cursor.as_deref(), e))?;
            pages_fetched += 1;

            let data = listing.data;
            if data.children.is_empty() {
                info!("Page {} came back empty, stopping", pages_fetched);
                break;
            }

            let next_cursor = data.next_cursor().map(str::to_string);
            for child in data.children {
                let record = PostRecord::try_from(child.data)
                    .map_err(|e| CoreError::page_fetch(&query.collection, cursor.as_deref(), e))?;
                current = record.created_at;
                posts.push(record);
            }
            debug!(
                "Page {} done, {} posts so far, reached {}",
                pages_fetched,
                posts.len(),
                current
            );

            match next_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    info!("No more pages for r/{}", query.collection);
                    break;
                }
            }
        }

        info!(
            "Fetched {} posts from r/{} across {} pages",
            posts.len(),
            query.collection,
            pages_fetched
        );
        Ok(posts)
    }
}
