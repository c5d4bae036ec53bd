#![cfg(feature = "recognize-http")]

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use url::Url;

use crate::frame::NormalizedImage;
use crate::normalize::encode_jpeg;
use crate::recognize::backend::RecognitionBackend;

const UPLOAD_JPEG_QUALITY: u8 = 90;
const MAX_RESPONSE_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    text: String,
}

/// HTTP recognition backend.
///
/// POSTs each image as `image/jpeg` to the endpoint and expects a JSON body
/// of the form `{"text": "..."}`. Any non-2xx status is an error.
pub struct HttpRecognizer {
    endpoint: Url,
    agent: ureq::Agent,
}

impl HttpRecognizer {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint).context("parse recognizer endpoint")?;
        match endpoint.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported recognizer scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self { endpoint, agent })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl RecognitionBackend for HttpRecognizer {
    fn name(&self) -> &'static str {
        "http"
    }

    fn recognize(&self, image: &NormalizedImage) -> Result<String> {
        let rgb = image.as_rgb();
        let jpeg = encode_jpeg(rgb.as_raw(), rgb.width(), rgb.height(), UPLOAD_JPEG_QUALITY)?;

        let response = self
            .agent
            .post(self.endpoint.as_str())
            .set("Content-Type", "image/jpeg")
            .send_bytes(&jpeg)
            .with_context(|| format!("post image to {}", self.endpoint))?;

        let mut body = String::new();
        std::io::Read::read_to_string(
            &mut std::io::Read::take(response.into_reader(), MAX_RESPONSE_BYTES),
            &mut body,
        )
        .context("read recognizer response")?;

        let parsed: RecognizeResponse =
            serde_json::from_str(&body).context("invalid recognizer response")?;
        Ok(parsed.text)
    }
}
