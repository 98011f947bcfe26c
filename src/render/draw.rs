use async_trait::async_trait;
use axum::body::Bytes;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::value::RawValue;
use tracing::debug;

use super::{Ballot, DrawBackend, RenderError};

const ERROR_BODY_LIMIT: usize = 512;

/// Body the draw service answers with.
///
/// `pdfb64` is the standard base64 PDF; `bubbles` is passed through byte for
/// byte.
#[derive(Deserialize)]
struct DrawResponse {
    pdfb64: String,
    bubbles: Box<RawValue>,
}

/// Draw backend reached over HTTP: the election JSON is POSTed as-is.
#[derive(Clone)]
pub struct HttpDrawBackend {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl HttpDrawBackend {
    /// `None` keeps the server running without a draw service; every render
    /// then fails.
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.filter(|url| !url.trim().is_empty()),
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }
}

#[async_trait]
impl DrawBackend for HttpDrawBackend {
    async fn render(&self, election_json: &str) -> Result<Ballot, RenderError> {
        let endpoint = self.endpoint.as_deref().ok_or(RenderError::NotConfigured)?;

        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(election_json.to_owned())
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let body: String = String::from_utf8_lossy(&body)
                .chars()
                .take(ERROR_BODY_LIMIT)
                .collect();
            return Err(RenderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: DrawResponse = serde_json::from_slice(&body)?;
        let pdf = STANDARD.decode(parsed.pdfb64.as_bytes())?;
        if pdf.is_empty() {
            return Err(RenderError::EmptyPdf);
        }

        debug!(pdf_bytes = pdf.len(), bubbles_bytes = parsed.bubbles.get().len(), "draw backend rendered ballot");

        Ok(Ballot {
            pdf: Bytes::from(pdf),
            bubbles: Bytes::from(parsed.bubbles.get().to_owned()),
        })
    }
}
