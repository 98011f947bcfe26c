//! Election JSON → PDF + bubbles → PNG.
//!
//! Both stages run outside this process: the draw backend is an HTTP service
//! and rasterizing goes through `pdftoppm`. Neither stage retries; a failed
//! render is retried by the next request for the same artifact.

mod draw;
mod png;

use async_trait::async_trait;
use axum::body::Bytes;
use thiserror::Error;

pub use draw::HttpDrawBackend;
pub use png::Pdftoppm;

/// PDF and bubble map produced together by one draw call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ballot {
    pub pdf: Bytes,
    pub bubbles: Bytes,
}

impl Ballot {
    pub fn size_bytes(&self) -> usize {
        self.pdf.len() + self.bubbles.len()
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no draw backend configured")]
    NotConfigured,
    #[error("draw backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("draw backend answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed draw response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("draw response pdf is not base64: {0}")]
    PdfEncoding(#[from] base64::DecodeError),
    #[error("draw response has an empty pdf")]
    EmptyPdf,
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("could not run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("rasterizer i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("rasterizer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("rasterizer produced no output")]
    EmptyOutput,
}

/// Turns an election document into its printable ballot.
#[async_trait]
pub trait DrawBackend: Send + Sync {
    async fn render(&self, election_json: &str) -> Result<Ballot, RenderError>;
}

/// Deterministic PDF → PNG conversion of the first page.
#[async_trait]
pub trait PdfRasterizer: Send + Sync {
    async fn to_png(&self, pdf: &[u8]) -> Result<Bytes, ConversionError>;
}
