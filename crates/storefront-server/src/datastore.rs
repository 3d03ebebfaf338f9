//! REST client for the primary data store, and the factory that feeds it into
//! the connection pool.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;
use storefront_pool::{BoxError, ConnectionFactory, PoolError};
use url::Url;

use crate::config::DataStoreConfig;

#[derive(Debug, thiserror::Error)]
pub enum DataStoreError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("Data store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Data store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid data store URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid data store header: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

/// One authenticated client for the data store's REST interface.
#[derive(Debug, Clone)]
pub struct DataStoreClient {
    http: reqwest::Client,
    rest_url: Url,
}

impl DataStoreClient {
    pub fn new(config: &DataStoreConfig) -> Result<Self, DataStoreError> {
        let mut base = Url::parse(&config.url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let rest_url = base.join("rest/v1/")?;

        let mut headers = HeaderMap::new();
        if let Some(key) = &config.service_key {
            let mut apikey = HeaderValue::from_str(key)?;
            apikey.set_sensitive(true);
            let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))?;
            bearer.set_sensitive(true);
            headers.insert("apikey", apikey);
            headers.insert(AUTHORIZATION, bearer);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self { http, rest_url })
    }

    /// Checks that the REST endpoint answers.
    pub async fn ping(&self) -> Result<(), DataStoreError> {
        let resp = self.http.get(self.rest_url.clone()).send().await?;
        check_status(resp).await.map(|_| ())
    }

    /// Reads rows from `table`. `query` holds filter/select pairs such as
    /// `("category", "eq.meals")`.
    pub async fn select(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Value, DataStoreError> {
        let url = self.rest_url.join(table)?;
        let resp = self.http.get(url).query(query).send().await?;
        Ok(check_status(resp).await?.json().await?)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, DataStoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(DataStoreError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Builds [`DataStoreClient`]s for the connection pool.
#[derive(Debug, Clone)]
pub struct DataStoreFactory {
    config: DataStoreConfig,
}

impl DataStoreFactory {
    pub fn new(config: DataStoreConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConnectionFactory for DataStoreFactory {
    type Handle = DataStoreClient;

    async fn connect(&self) -> Result<DataStoreClient, BoxError> {
        let client = DataStoreClient::new(&self.config)?;
        tracing::debug!(url = %self.config.url, "data store client created");
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str, key: Option<&str>) -> DataStoreConfig {
        DataStoreConfig {
            url: url.to_string(),
            service_key: key.map(str::to_string),
            timeout_ms: 2000,
        }
    }

    #[tokio::test]
    async fn test_select_sends_credentials_and_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/products"))
            .and(query_param("category", "eq.meals"))
            .and(header("apikey", "secret"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .expect(1)
            .mount(&server)
            .await;

        let client = DataStoreClient::new(&config(&server.uri(), Some("secret"))).unwrap();
        let rows = client
            .select("products", &[("category", "eq.meals".to_string())])
            .await
            .unwrap();

        assert_eq!(rows, json!([{"id": 1}]));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/orders"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let client = DataStoreClient::new(&config(&server.uri(), None)).unwrap();
        let err = client.select("orders", &[]).await.unwrap_err();

        match err {
            DataStoreError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_ping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = DataStoreClient::new(&config(&server.uri(), None)).unwrap();
        client.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_factory_rejects_unusable_key() {
        let factory = DataStoreFactory::new(config("http://localhost:54321", Some("bad\nkey")));
        assert!(factory.connect().await.is_err());
    }

    #[tokio::test]
    async fn test_base_path_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/proxy/rest/v1/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let base = format!("{}/proxy", server.uri());
        let client = DataStoreClient::new(&config(&base, None)).unwrap();
        assert_eq!(client.select("products", &[]).await.unwrap(), json!([]));
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            DataStoreClient::new(&config("not a url", None)),
            Err(DataStoreError::InvalidUrl(_))
        ));
    }
}
