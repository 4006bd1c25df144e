//! HTTP and GraphQL transports used by the fetchers

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::trace;

use oracle_core::{PriceFeedError, PriceFeedResult};

const USER_AGENT: &str = concat!("price-feeder/", env!("CARGO_PKG_VERSION"));

/// Plain HTTP GET returning a JSON document
#[async_trait]
pub trait ResponseGetter: Send + Sync {
    async fn get(&self, url: &str) -> PriceFeedResult<Value>;
}

/// GraphQL POST returning the JSON response document
#[async_trait]
pub trait GraphqlGetter: Send + Sync {
    async fn query(&self, url: &str, query: &str, variables: Value) -> PriceFeedResult<Value>;
}

fn build_client(timeout: Duration) -> PriceFeedResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| PriceFeedError::Transport(format!("failed to create HTTP client: {}", e)))
}

async fn read_json(response: reqwest::Response) -> PriceFeedResult<Value> {
    let status = response.status();
    if !status.is_success() {
        return Err(PriceFeedError::Transport(format!("HTTP status {}", status)));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| PriceFeedError::Transport(format!("invalid JSON body: {}", e)))
}

/// reqwest-backed [`ResponseGetter`]
#[derive(Debug, Clone)]
pub struct HttpResponseGetter {
    client: reqwest::Client,
}

impl HttpResponseGetter {
    pub fn new(timeout: Duration) -> PriceFeedResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl ResponseGetter for HttpResponseGetter {
    async fn get(&self, url: &str) -> PriceFeedResult<Value> {
        trace!(url = %url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PriceFeedError::Transport(e.to_string()))?;
        read_json(response).await
    }
}

/// reqwest-backed [`GraphqlGetter`]
#[derive(Debug, Clone)]
pub struct GraphqlResponseGetter {
    client: reqwest::Client,
}

impl GraphqlResponseGetter {
    pub fn new(timeout: Duration) -> PriceFeedResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl GraphqlGetter for GraphqlResponseGetter {
    async fn query(&self, url: &str, query: &str, variables: Value) -> PriceFeedResult<Value> {
        trace!(url = %url, "GraphQL query");
        let body = json!({ "query": query, "variables": variables });
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PriceFeedError::Transport(e.to_string()))?;

        let document = read_json(response).await?;
        if let Some(errors) = document.get("errors").filter(|e| !e.is_null()) {
            return Err(PriceFeedError::Transport(format!("GraphQL errors: {}", errors)));
        }
        Ok(document)
    }
}
