use crate::error::{FetchError, Result};
use crate::transport::{Method, Request, RequestTransport, Response};
use async_trait::async_trait;

/// Production transport over HTTP. Timeouts are enforced by the fetch engine,
/// not here, so a superseded request can be abandoned uniformly.
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

#[async_trait]
impl RequestTransport for HttpTransport {
    async fn request(&self, request: Request) -> Result<Response> {
        let url = format!("{}{}", self.base_url, request.endpoint);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let body = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(err) => {
                    // Error statuses often carry HTML or plain-text bodies
                    // (proxy error pages); keep the status so the caller can
                    // classify the failure by it.
                    if (200..300).contains(&status) {
                        return Err(FetchError::Decode(err.to_string()));
                    }
                    serde_json::Value::String(text)
                }
            }
        };

        Ok(Response { status, body })
    }
}
