use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::error::Error;
use crate::optimistic::{VoteRequest, VoteTransport};
use crate::session::IdentityVerifier;
use crate::types::{EntityId, EntityKind, User};
use crate::vote::{UserVote, VoteState};

const ME_QUERY: &str = "query Me { me { id username email } }";

const VOTE_MUTATION: &str = "\
mutation Vote($objectId: ID!, $modelName: String!, $voteType: String!) {
  vote(objectId: $objectId, modelName: $modelName, voteType: $voteType) {
    post { id upvotes userVote }
    comment { id upvotes userVote }
  }
}";

const TOKEN_AUTH_MUTATION: &str = "\
mutation Login($username: String!, $password: String!) {
  tokenAuth(username: $username, password: $password) {
    token
    refreshToken
    user { id username email }
  }
}";

const REFRESH_TOKEN_MUTATION: &str = "\
mutation Refresh($refreshToken: String!) {
  refreshToken(refreshToken: $refreshToken) { token refreshToken }
}";

/// Redbit API configuration.
///
/// ```rust,ignore
/// use redbit_client::ClientConfig;
///
/// let config = ClientConfig::new("https://api.redbit.app/graphql/".parse()?)
///     .with_auth_scheme("Bearer");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) endpoint: Url,
    pub(crate) auth_scheme: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(
            "http://localhost:8000/graphql/"
                .parse()
                .expect("valid default URL"),
        )
    }
}

impl ClientConfig {
    /// Config for `endpoint` with the default `JWT` scheme.
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            auth_scheme: "JWT".into(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Optional env vars
    /// - `REDBIT_API_URL`: GraphQL endpoint (default `http://localhost:8000/graphql/`)
    /// - `REDBIT_AUTH_SCHEME`: `Authorization` header scheme (default `JWT`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `REDBIT_API_URL` is not a valid URL.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = match std::env::var("REDBIT_API_URL") {
            Ok(url_str) => Self::new(
                url_str
                    .parse()
                    .map_err(|e| Error::Config(format!("REDBIT_API_URL: {e}")))?,
            ),
            Err(_) => Self::default(),
        };

        if let Ok(scheme) = std::env::var("REDBIT_AUTH_SCHEME") {
            let scheme = scheme.trim();
            if scheme.is_empty() {
                return Err(Error::Config("REDBIT_AUTH_SCHEME is empty".into()));
            }
            config = config.with_auth_scheme(scheme);
        }

        Ok(config)
    }

    /// Override the `Authorization` header scheme (default `JWT`).
    #[must_use]
    pub fn with_auth_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.auth_scheme = scheme.into();
        self
    }

    /// GraphQL endpoint every operation is posted to.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Prefix of the `Authorization` header value.
    #[must_use]
    pub fn auth_scheme(&self) -> &str {
        &self.auth_scheme
    }

    /// `Authorization` header value for `token`.
    #[must_use]
    pub fn authorization(&self, token: &str) -> String {
        format!("{} {token}", self.auth_scheme)
    }
}

/// Credentials returned by the login mutation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct AuthPayload {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: User,
}

/// Tokens returned by the refresh mutation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct RefreshPayload {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

impl<T> Envelope<T> {
    fn into_data(self, operation: &'static str) -> Result<T, Error> {
        if !self.errors.is_empty() {
            let detail = self
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::GraphQl { operation, detail });
        }
        self.data.ok_or(Error::MissingData(operation))
    }
}

#[derive(Debug, Deserialize)]
struct MeData {
    me: Option<User>,
}

#[derive(Debug, Deserialize)]
struct VoteData {
    vote: Option<VotePayload>,
}

#[derive(Debug, Deserialize)]
struct VotePayload {
    post: Option<VotedEntity>,
    comment: Option<VotedEntity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VotedEntity {
    id: EntityId,
    upvotes: i64,
    #[serde(default)]
    user_vote: UserVote,
}

impl From<VotedEntity> for VoteState {
    fn from(e: VotedEntity) -> Self {
        VoteState::new(e.id, e.upvotes, e.user_vote)
    }
}

impl VotePayload {
    fn into_state(self, kind: EntityKind) -> Option<VoteState> {
        match kind {
            EntityKind::Post => self.post,
            EntityKind::Comment => self.comment,
        }
        .map(Into::into)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenAuthData {
    token_auth: Option<AuthPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshData {
    refresh_token: Option<RefreshPayload>,
}

/// GraphQL client for the Redbit API.
#[derive(Debug, Clone)]
pub struct GraphqlClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl GraphqlClient {
    /// Client with a default `reqwest::Client`.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or timeouts).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Config this client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch the identity behind `token`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or [`Error::GraphQl`] if
    /// the server rejects the token.
    pub async fn me(&self, token: &str) -> Result<User, Error> {
        let data: MeData = self
            .execute("me", ME_QUERY, json!({}), Some(token))
            .await?;
        data.me.ok_or_else(|| Error::GraphQl {
            operation: "me",
            detail: "not authenticated".into(),
        })
    }

    /// Cast or toggle a vote and return the entity's authoritative state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, [`Error::GraphQl`] if the
    /// mutation fails, or [`Error::MissingData`] if the entity is absent from
    /// the response.
    pub async fn vote(&self, token: Option<&str>, request: &VoteRequest) -> Result<VoteState, Error> {
        let variables = json!({
            "objectId": request.entity_id,
            "modelName": request.kind.as_str(),
            "voteType": request.action.as_str(),
        });
        let data: VoteData = self.execute("vote", VOTE_MUTATION, variables, token).await?;

        data.vote
            .and_then(|payload| payload.into_state(request.kind))
            .ok_or(Error::MissingData("vote"))
    }

    /// Exchange username and password for credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or [`Error::GraphQl`] for
    /// bad credentials.
    pub async fn token_auth(&self, username: &str, password: &str) -> Result<AuthPayload, Error> {
        let variables = json!({ "username": username, "password": password });
        let data: TokenAuthData = self
            .execute("tokenAuth", TOKEN_AUTH_MUTATION, variables, None)
            .await?;
        data.token_auth.ok_or(Error::MissingData("tokenAuth"))
    }

    /// Trade a refresh token for a new token pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or [`Error::GraphQl`] if
    /// the refresh token is expired or revoked.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshPayload, Error> {
        let variables = json!({ "refreshToken": refresh_token });
        let data: RefreshData = self
            .execute("refreshToken", REFRESH_TOKEN_MUTATION, variables, None)
            .await?;
        data.refresh_token.ok_or(Error::MissingData("refreshToken"))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        query: &str,
        variables: serde_json::Value,
        token: Option<&str>,
    ) -> Result<T, Error> {
        let mut request = self
            .http
            .post(self.config.endpoint.clone())
            .json(&json!({ "query": query, "variables": variables }));
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, self.config.authorization(token));
        }

        let response = request.send().await?;
        let response = Self::ensure_success(response, operation).await?;
        response
            .json::<Envelope<T>>()
            .await?
            .into_data(operation)
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::GraphQl {
            operation,
            detail: format!("HTTP {status}: {body}"),
        })
    }
}

impl IdentityVerifier for GraphqlClient {
    async fn verify(&self, token: &str) -> Result<User, Error> {
        self.me(token).await
    }
}

impl VoteTransport for GraphqlClient {
    async fn vote(&self, token: Option<&str>, request: &VoteRequest) -> Result<VoteState, Error> {
        GraphqlClient::vote(self, token, request).await
    }
}
