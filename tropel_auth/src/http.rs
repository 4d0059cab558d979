//! HTTP plumbing: a request description, a response snapshot and the
//! [`Transport`] that turns one into the other.
use std::{collections::HashMap, future::Future};

use reqwest::{header::COOKIE, Client, Url};
use tropel::{BoxError, Identity};

use crate::{
    config::HttpConfig,
    error::{Error, Result},
};

pub const CSRF_HEADER: &str = "Csrf";
pub const ACCESS_TOKEN_COOKIE: &str = "JWT-ACCESS-TOKEN";
pub const REFRESH_TOKEN_COOKIE: &str = "JWT-REFRESH-TOKEN";

/// A body-less POST against the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub path: String,
    pub basic_auth: Option<Identity>,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
}

impl Request {
    pub fn post(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn basic_auth(mut self, identity: &Identity) -> Self {
        self.basic_auth = Some(identity.clone());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }
}

/// What behaviors get to check. Header names are stored lower case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}

/// Sends requests to the service under test.
pub trait Transport: Send + Sync + 'static {
    fn post(&self, request: Request) -> impl Future<Output = Result<Response, BoxError>> + Send;
}

/// [`Transport`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| Error::BaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        let mut builder = Client::builder()
            .danger_accept_invalid_certs(config.insecure_skip_tls_verify)
            .timeout(config.timeout());
        if config.no_connection_reuse {
            builder = builder.pool_max_idle_per_host(0);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl Transport for HttpTransport {
    async fn post(&self, request: Request) -> Result<Response, BoxError> {
        let url = self.base_url.join(&request.path)?;
        let mut builder = self.client.post(url);

        if let Some(identity) = &request.basic_auth {
            builder = builder.basic_auth(&identity.username, Some(&identity.password));
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.cookies.is_empty() {
            let cookies = request
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(COOKIE, cookies);
        }

        let response = builder.send().await?;
        let mut snapshot = Response::new(response.status().as_u16());
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                snapshot.headers.insert(name.as_str().to_string(), value.to_string());
            }
        }
        for cookie in response.cookies() {
            snapshot
                .cookies
                .insert(cookie.name().to_string(), cookie.value().to_string());
        }

        // Drain the body so the connection can go back to the pool.
        response.bytes().await?;
        Ok(snapshot)
    }
}
