use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::trace;

use crate::{
    config::{CollectorConfig, USER_AGENT},
    errors::DeliveryError,
};

/// Delivers one batch of newline-terminated result lines.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, input: &str) -> Result<(), DeliveryError>;
}

/// Form-encoded `POST` of `username`, `password` and `input` to the collector.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    cfg: CollectorConfig,
}

impl HttpTransport {
    pub fn new(cfg: CollectorConfig) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(cfg.http_timeout)
            .build()?;
        Ok(Self { client, cfg })
    }

    fn encode(&self, input: &str) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("username", &self.cfg.username)
            .append_pair("password", &self.cfg.password)
            .append_pair("input", input)
            .finish()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, input: &str) -> Result<(), DeliveryError> {
        let body = self.encode(input);
        trace!(target: "pcr.deliver.post", url = %self.cfg.url, bytes = body.len(), "posting");

        let response = self
            .client
            .post(&self.cfg.url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
