use crate::config::ApiConfig;
use crate::error::TransportError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The last step of every request: put JSON on the wire, get status and body back.
/// Non-2xx statuses are not errors at this level.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> Result<Self, TransportError> {
        let builder = reqwest::Client::builder();

        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(config.request_timeout());

        let client = builder.build().map_err(|e| TransportError::Request {
            url: config.base_url.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse, TransportError> {
        let mut request = self.client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    url: url.to_string(),
                }
            } else {
                TransportError::Request {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TransportError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(HttpResponse { status, body })
    }
}
