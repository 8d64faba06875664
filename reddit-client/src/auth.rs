use harvest_core::{ConfigError, CoreError, RedditApiError};
use oauth2::basic::{BasicClient, BasicErrorResponse};
use oauth2::{
    AuthType, AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RequestTokenError,
    TokenResponse, TokenUrl,
};
use reqwest::Client;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

const REDDIT_AUTHORIZE_URL: &str = "https://www.reddit.com/api/v1/authorize";

/// Application-only session: exchanges client credentials for a bearer token
/// once and keeps it in memory until the session is dropped.
pub struct TokenSession {
    oauth_client: BasicClient,
    http_client: Client,
    token_url: String,
    token: OnceCell<String>,
}

impl TokenSession {
    pub fn new(
        client_id: &str,
        client_secret: &str,
        token_url: &str,
        http_client: Client,
    ) -> Result<Self, CoreError> {
        let auth_url = AuthUrl::new(REDDIT_AUTHORIZE_URL.to_string()).map_err(|_| {
            ConfigError::InvalidValue {
                field: "auth_url".to_string(),
                value: REDDIT_AUTHORIZE_URL.to_string(),
            }
        })?;
        let parsed_token_url =
            TokenUrl::new(token_url.to_string()).map_err(|_| ConfigError::InvalidValue {
                field: "token_url".to_string(),
                value: token_url.to_string(),
            })?;

        let oauth_client = BasicClient::new(
            ClientId::new(client_id.to_string()),
            Some(ClientSecret::new(client_secret.to_string())),
            auth_url,
            Some(parsed_token_url),
        )
        .set_auth_type(AuthType::BasicAuth);

        Ok(Self {
            oauth_client,
            http_client,
            token_url: token_url.to_string(),
            token: OnceCell::new(),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.initialized()
    }

    /// Returns the session token, requesting it on first use.
    ///
    /// Concurrent callers wait on the same request; a failed request leaves
    /// the session unauthenticated so a later call tries again.
    pub async fn fetch_token(&self) -> Result<&str, CoreError> {
        self.token
            .get_or_try_init(|| self.request_token())
            .await
            .map(String::as_str)
    }

    async fn request_token(&self) -> Result<String, CoreError> {
        info!("Fetching access token from {}", self.token_url);
        let http_client = &self.http_client;

        let response = self
            .oauth_client
            .exchange_client_credentials()
            .request_async(|request| send_oauth_request(http_client, request))
            .await
            .map_err(|e| {
                let reason = describe_token_error(&e);
                error!("Access token request failed: {}", reason);
                CoreError::RedditApi(RedditApiError::AuthenticationFailed { reason })
            })?;

        let token = response.access_token().secret().clone();
        if token.is_empty() {
            return Err(CoreError::RedditApi(
                RedditApiError::AuthenticationFailed {
                    reason: "token response carried an empty access_token".to_string(),
                },
            ));
        }

        info!("Access token fetched");
        Ok(token)
    }
}

fn describe_token_error(error: &RequestTokenError<reqwest::Error, BasicErrorResponse>) -> String {
    match error {
        RequestTokenError::ServerResponse(response) => {
            format!("token endpoint rejected the credentials: {}", response)
        }
        RequestTokenError::Request(e) => format!("token request failed: {}", e),
        RequestTokenError::Parse(e, body) => format!(
            "unexpected token response ({}): {}",
            e,
            String::from_utf8_lossy(body)
        ),
        RequestTokenError::Other(message) => message.clone(),
    }
}

/// Runs an oauth2 request through the shared client so the token call carries
/// the same User-Agent and timeout as listing calls.
async fn send_oauth_request(
    client: &Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    debug!("POST {}", request.url);
    let response = client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}
