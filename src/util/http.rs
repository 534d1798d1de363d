pub use reqwest::StatusCode;

use std::time::Duration;

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to build client: {0}")]
    Request(String),

    #[error("server replied with status: {0}")]
    Response(StatusCode),

    #[error(transparent)]
    Client(reqwest::Error),

    #[error(transparent)]
    Server(reqwest::Error),
}

/// Minimal JSON-over-HTTP client.
///
/// Owns the connect and overall request timeouts so callers only deal in
/// typed payloads. Status callers construct a second instance with much
/// shorter timeouts; see [`Client::new`].
#[derive(Debug, Clone)]
pub struct Client {
    client: reqwest::Client,
}

impl Client {
    /// Creates a client with the given connect timeout and, optionally,
    /// an overall per-request deadline covering connect + read.
    pub fn new(connect_timeout: Duration, timeout: Option<Duration>) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder().connect_timeout(connect_timeout);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Request(e.to_string()))?;
        Ok(Self { client })
    }

    pub async fn get<Response>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Response, ClientError>
    where
        Response: DeserializeOwned,
    {
        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        self.send(request).await?.json().await.map_err(ClientError::Server)
    }

    pub async fn post<Payload, Response>(
        &self,
        url: &str,
        payload: &Payload,
    ) -> Result<Response, ClientError>
    where
        Payload: Serialize + ?Sized,
        Response: DeserializeOwned,
    {
        self.send(self.client.post(url).json(payload))
            .await?
            .json()
            .await
            .map_err(ClientError::Server)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = request.send().await.map_err(ClientError::Client)?;
        match response.status() {
            status if status.is_success() => Ok(response),
            status => Err(ClientError::Response(status)),
        }
    }
}
