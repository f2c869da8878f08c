// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use shopkeep_app::{Product, ProductId};
use std::time::Duration;
use url::Url;

// One uniform failure kind for all four collection operations: network
// trouble and non-success statuses collapse into it, and callers never
// branch on which it was.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{method} {url} failed: {source}")]
    Request {
        method: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {url} returned status {status}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },
    #[error("decode {method} {url} response: {source}")]
    Decode {
        method: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl TransportError {
    fn request(method: &'static str, url: &str, source: reqwest::Error) -> Self {
        Self::Request {
            method,
            url: url.to_owned(),
            source,
        }
    }

    fn status(method: &'static str, url: &str, status: reqwest::StatusCode) -> Self {
        Self::Status {
            method,
            url: url.to_owned(),
            status: status.as_u16(),
        }
    }

    fn decode(method: &'static str, url: &str, source: reqwest::Error) -> Self {
        Self::Decode {
            method,
            url: url.to_owned(),
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("remote base_url must not be empty");
        }

        let parsed = Url::parse(&base_url)
            .with_context(|| format!("invalid remote base_url {base_url:?}"))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            bail!(
                "remote base_url {base_url:?} must use http or https, got {:?}",
                parsed.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn list(&self) -> Result<Vec<Product>, TransportError> {
        let url = self.base_url.clone();
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|error| TransportError::request("GET", &url, error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::status("GET", &url, status));
        }

        response
            .json()
            .map_err(|error| TransportError::decode("GET", &url, error))
    }

    pub fn create(&self, product: &Product) -> Result<(), TransportError> {
        let url = self.base_url.clone();
        let response = self
            .http
            .post(&url)
            .json(product)
            .send()
            .map_err(|error| TransportError::request("POST", &url, error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::status("POST", &url, status));
        }
        Ok(())
    }

    pub fn update(&self, id: ProductId, product: &Product) -> Result<(), TransportError> {
        let url = self.item_url(id);
        let response = self
            .http
            .put(&url)
            .json(product)
            .send()
            .map_err(|error| TransportError::request("PUT", &url, error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::status("PUT", &url, status));
        }
        Ok(())
    }

    pub fn delete(&self, id: ProductId) -> Result<(), TransportError> {
        let url = self.item_url(id);
        // The JSON content-type goes out on DELETE too, matching the
        // collection service's existing consumers.
        let response = self
            .http
            .delete(&url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .map_err(|error| TransportError::request("DELETE", &url, error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::status("DELETE", &url, status));
        }
        Ok(())
    }

    fn item_url(&self, id: ProductId) -> String {
        format!("{}/{}", self.base_url, id.get())
    }
}
