use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{Value, json};
use url::Url;

use crate::error::extract_detail;
use crate::{
    AuthorizeResponseShape, ConnectConfig, ConnectError, Credentials, Integration, RemoteItem,
    RequestFormat,
};

/// The three backend calls a connection flow relies on.
#[async_trait]
pub trait IntegrationBackend: Send + Sync {
    fn integration(&self) -> &dyn Integration;

    /// Starts the OAuth handshake and returns the URL the user must visit.
    async fn authorize(&self, user_id: &str, org_id: &str) -> Result<String, ConnectError>;

    /// Returns `None` when the backend holds no credentials for the pair.
    async fn credentials(
        &self,
        user_id: &str,
        org_id: &str,
    ) -> Result<Option<Credentials>, ConnectError>;

    async fn fetch_items(&self, credentials: &Credentials)
    -> Result<Vec<RemoteItem>, ConnectError>;
}

#[derive(Debug, Clone)]
pub struct IntegrationClient<I: Integration> {
    integration: I,
    config: ConnectConfig,
    http: Client,
}

impl<I: Integration> IntegrationClient<I> {
    pub fn new(integration: I, config: ConnectConfig) -> Result<Self, ConnectError> {
        config.validate()?;
        let mut builder = Client::builder();
        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self {
            integration,
            config,
            http,
        })
    }

    pub fn with_http_client(integration: I, config: ConnectConfig, http: Client) -> Self {
        Self {
            integration,
            config,
            http,
        }
    }

    pub fn config(&self) -> &ConnectConfig {
        &self.config
    }

    async fn post_identity(
        &self,
        url: Url,
        user_id: &str,
        org_id: &str,
    ) -> Result<Response, reqwest::Error> {
        let mut payload = HashMap::new();
        payload.insert("user_id", user_id);
        payload.insert("org_id", org_id);

        let builder = self.http.post(url);
        match self.integration.request_format() {
            RequestFormat::Json => builder.json(&payload).send().await,
            RequestFormat::Form => builder.form(&payload).send().await,
        }
    }
}

#[async_trait]
impl<I: Integration> IntegrationBackend for IntegrationClient<I> {
    fn integration(&self) -> &dyn Integration {
        &self.integration
    }

    async fn authorize(&self, user_id: &str, org_id: &str) -> Result<String, ConnectError> {
        let integration = self.integration.id();
        tracing::debug!(integration, user_id, org_id, "requesting authorization url");

        let url = self.config.endpoint(&self.integration.authorize_path())?;
        let response = self
            .post_identity(url, user_id, org_id)
            .await
            .map_err(|err| {
                tracing::warn!(integration, error = %err, "authorize request failed");
                ConnectError::AuthorizeRequestFailed {
                    status: None,
                    detail: None,
                }
            })?;
        let (status, body) = read_body(response).await.map_err(|status| {
            ConnectError::AuthorizeRequestFailed {
                status,
                detail: None,
            }
        })?;
        if !status.is_success() {
            return Err(ConnectError::AuthorizeRequestFailed {
                status: Some(status.as_u16()),
                detail: extract_detail(&body),
            });
        }

        parse_authorization_url(&body, self.integration.authorize_response_shape())
    }

    async fn credentials(
        &self,
        user_id: &str,
        org_id: &str,
    ) -> Result<Option<Credentials>, ConnectError> {
        let integration = self.integration.id();
        tracing::debug!(integration, user_id, org_id, "exchanging for credentials");

        let url = self.config.endpoint(&self.integration.credentials_path())?;
        let response = self
            .post_identity(url, user_id, org_id)
            .await
            .map_err(|err| {
                tracing::warn!(integration, error = %err, "credential request failed");
                ConnectError::CredentialExchangeFailed {
                    status: None,
                    detail: None,
                }
            })?;
        let (status, body) = read_body(response).await.map_err(|status| {
            ConnectError::CredentialExchangeFailed {
                status,
                detail: None,
            }
        })?;
        if !status.is_success() {
            return Err(ConnectError::CredentialExchangeFailed {
                status: Some(status.as_u16()),
                detail: extract_detail(&body),
            });
        }

        Ok(Credentials::from_response_body(&body))
    }

    async fn fetch_items(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<RemoteItem>, ConnectError> {
        let integration = self.integration.id();
        tracing::debug!(integration, "fetching items");

        let url = self.config.endpoint(&self.integration.items_path())?;
        let response = self
            .http
            .post(url)
            .json(&json!({ "credentials": credentials }))
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(integration, error = %err, "item request failed");
                ConnectError::ItemFetchFailed {
                    status: None,
                    detail: None,
                }
            })?;
        let (status, body) = read_body(response)
            .await
            .map_err(|status| ConnectError::ItemFetchFailed {
                status,
                detail: None,
            })?;
        if !status.is_success() {
            return Err(ConnectError::ItemFetchFailed {
                status: Some(status.as_u16()),
                detail: extract_detail(&body),
            });
        }

        parse_items(&body)
    }
}

/// Reads the body as text; on failure yields the status for the caller's error.
async fn read_body(response: Response) -> Result<(reqwest::StatusCode, String), Option<u16>> {
    let status = response.status();
    match response.text().await {
        Ok(body) => Ok((status, body)),
        Err(err) => {
            tracing::warn!(status = status.as_u16(), error = %err, "failed to read response body");
            Err(Some(status.as_u16()))
        }
    }
}

pub(crate) fn parse_authorization_url(
    body: &str,
    shape: AuthorizeResponseShape,
) -> Result<String, ConnectError> {
    let body = body.trim();
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    let raw = || match &parsed {
        Some(Value::String(url)) => Some(url.clone()),
        Some(_) => None,
        None => (!body.is_empty()).then(|| body.to_string()),
    };
    let field = || match &parsed {
        Some(Value::Object(map)) => map.get("url").and_then(Value::as_str).map(str::to_string),
        _ => None,
    };

    let url = match shape {
        AuthorizeResponseShape::Raw => raw(),
        AuthorizeResponseShape::UrlField => field(),
        AuthorizeResponseShape::Auto => raw().or_else(field),
    };

    let Some(url) = url else {
        tracing::warn!(?shape, "authorize response carried no authorization url");
        return Err(ConnectError::AuthorizeRequestFailed {
            status: None,
            detail: None,
        });
    };

    Url::parse(&url).map_err(|err| {
        tracing::warn!(%url, error = %err, "authorization url is not a valid url");
        ConnectError::AuthorizeRequestFailed {
            status: None,
            detail: None,
        }
    })?;
    Ok(url)
}

pub(crate) fn parse_items(body: &str) -> Result<Vec<RemoteItem>, ConnectError> {
    let value: Value =
        serde_json::from_str(body).map_err(|err| ConnectError::InvalidResponseShape {
            message: format!("item list is not json: {err}"),
        })?;
    let Value::Array(entries) = value else {
        return Err(ConnectError::InvalidResponseShape {
            message: format!("expected a list of items, got {}", json_kind(&value)),
        });
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            serde_json::from_value(entry).map_err(|err| ConnectError::InvalidResponseShape {
                message: format!("item {index}: {err}"),
            })
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
