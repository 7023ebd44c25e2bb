//! Outbound email relay
//! Composes SparkPost transmissions from contact messages and posts them to
//! the transmissions API with open and click tracking disabled.

use async_trait::async_trait;
use contact_shared::{Mailbox, OutboundMessage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SparkPostConfig;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("HTTP request failed: {0}")]
    Request(String),
    #[error("provider rejected transmission ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("provider request timed out")]
    Timeout,
}

/// Anything that can deliver a composed contact message.
#[async_trait]
pub trait EmailRelay: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), RelayError>;
}

/// Transmission request body for `POST /transmissions`
#[derive(Debug, Clone, Serialize)]
pub struct Transmission<'a> {
    pub options: TransmissionOptions,
    pub content: TransmissionContent<'a>,
    pub recipients: Vec<Recipient<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransmissionOptions {
    pub open_tracking: bool,
    pub click_tracking: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransmissionContent<'a> {
    pub from: &'a Mailbox,
    pub reply_to: &'a str,
    pub subject: &'a str,
    pub text: &'a str,
    pub html: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recipient<'a> {
    pub address: &'a Mailbox,
}

impl<'a> Transmission<'a> {
    pub fn from_message(message: &'a OutboundMessage) -> Self {
        Transmission {
            options: TransmissionOptions {
                open_tracking: false,
                click_tracking: false,
            },
            content: TransmissionContent {
                from: &message.from,
                reply_to: &message.reply_to,
                subject: &message.subject,
                text: &message.text,
                html: &message.html,
            },
            recipients: vec![Recipient {
                address: &message.to,
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    message: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SuccessEnvelope {
    results: TransmissionResults,
}

#[derive(Debug, Deserialize)]
struct TransmissionResults {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    total_accepted_recipients: u64,
}

/// SparkPost transmissions client. The configured timeout covers each
/// request from connect to the end of the response body.
pub struct SparkPostRelay {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl SparkPostRelay {
    pub fn new(config: &SparkPostConfig) -> Result<Self, RelayError> {
        let client = reqwest::ClientBuilder::new()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RelayError::Request(e.to_string()))?;

        Ok(SparkPostRelay {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    fn transmissions_url(&self) -> String {
        format!("{}/transmissions", self.endpoint)
    }
}

#[async_trait]
impl EmailRelay for SparkPostRelay {
    async fn send(&self, message: &OutboundMessage) -> Result<(), RelayError> {
        let url = self.transmissions_url();
        debug!(subject = %message.subject, "Posting transmission to {}", url);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .json(&Transmission::from_message(message))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RelayError::Timeout
                } else {
                    RelayError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = provider_error_message(&body);
            warn!(status = status.as_u16(), %message, "SparkPost rejected transmission");
            return Err(RelayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        match response.json::<SuccessEnvelope>().await {
            Ok(envelope) => info!(
                transmission_id = envelope.results.id.as_deref().unwrap_or("unknown"),
                accepted = envelope.results.total_accepted_recipients,
                "Transmission accepted"
            ),
            Err(e) => debug!("Transmission accepted with unexpected body: {}", e),
        }

        Ok(())
    }
}

/// Pull the first provider error out of a failure body, falling back to the
/// raw text when it is not the documented envelope.
fn provider_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.errors.into_iter().next() {
            Some(ProviderError {
                message,
                description: Some(description),
            }) => format!("{message}: {description}"),
            Some(ProviderError { message, .. }) => message,
            None => "unknown provider error".to_string(),
        },
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}
