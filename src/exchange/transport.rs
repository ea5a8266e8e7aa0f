use async_trait::async_trait;
use reqwest::Client;
use std::fmt;
use tracing::debug;

use crate::auth::CONTENT_TYPE_FORM;
use crate::config::Environment;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// POST carries parameters in the body, the others in the query string.
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully built request: `url` already holds any query string and `body` is
/// a form-encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Places `payload` in the query string or the body depending on the method.
    pub fn new(method: HttpMethod, base: &str, path: &str, payload: &str) -> Self {
        let mut url = format!("{}{}", base, path);
        let mut body = None;
        if method.has_body() {
            body = Some(payload.to_string());
        } else if !payload.is_empty() {
            url.push('?');
            url.push_str(payload);
        }
        Self {
            method,
            url,
            headers: Vec::new(),
            body,
        }
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The form payload, wherever it was placed.
    pub fn payload(&self) -> &str {
        match &self.body {
            Some(body) => body,
            None => self.url.split_once('?').map(|(_, q)| q).unwrap_or(""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// Sends one HTTP request and returns the raw response.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    log_bodies: bool,
}

impl ReqwestTransport {
    pub fn new(env: &Environment) -> Result<Self> {
        let client = Client::builder()
            .timeout(env.timeout())
            .danger_accept_invalid_certs(env.insecure)
            .build()?;
        Ok(Self {
            client,
            log_bodies: env.logs_bodies(),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!("{} {}", request.method, request.url);

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE_FORM)
                .body(body);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        if self.log_bodies {
            debug!("{} response: {}", status, body);
        } else {
            debug!("{} response, {} bytes", status, body.len());
        }

        Ok(HttpResponse { status, body })
    }
}
