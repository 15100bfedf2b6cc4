//! Consul HTTP Client
//!
//! reqwest-based implementation of [`CoordinationClient`] against the
//! Consul session and KV endpoints. Every call carries the configured
//! request timeout and, when set, preemptive basic auth.

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use std::time::Duration;

use super::protocol::{lock_holder, KvPair, SessionCreateRequest, SessionCreateResponse};
use super::{CoordinationClient, Role, SessionId};
use crate::config::ConsulConfig;
use crate::error::{Error, Result};

/// HTTP client for a Consul-compatible coordination service
pub struct ConsulClient {
    http: reqwest::Client,
    base_url: String,
    auth: Option<(String, String)>,
}

impl ConsulClient {
    /// Create a client from configuration
    pub fn new(config: &ConsulConfig) -> Result<Self> {
        Self::with_timeout(config, Duration::from_secs(config.request_timeout_secs))
    }

    /// Create a client with an explicit per-request timeout
    pub fn with_timeout(config: &ConsulConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        let auth = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        };

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some((user, pass)) => request.basic_auth(user, Some(pass)),
            None => request,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn lock_url(&self, role: &Role) -> String {
        self.url(&format!("v1/kv/{}", role.lock_path()))
    }

    /// PUT on the lock key with an `acquire`/`release` command; Consul
    /// answers with a bare `true` or `false` body.
    async fn lock_command(&self, role: &Role, command: &str, session: &SessionId) -> Result<bool> {
        let url = format!("{}?{}={}", self.lock_url(role), command, session);
        tracing::debug!("PUT {}", url);

        let response = self.with_auth(self.http.put(&url)).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(Error::Protocol {
                status: status.as_u16(),
                body,
            });
        }

        match body.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(Error::Protocol {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

#[async_trait]
impl CoordinationClient for ConsulClient {
    async fn create_session(
        &self,
        role: &Role,
        ttl_secs: u64,
        lock_delay_secs: u64,
    ) -> Result<SessionId> {
        let url = self.url("v1/session/create");
        let request = SessionCreateRequest::new(role.service_name(), ttl_secs, lock_delay_secs);
        tracing::debug!("PUT {} body={:?}", url, request);

        let response = self
            .with_auth(self.http.put(&url))
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(Error::Protocol {
                status: status.as_u16(),
                body,
            });
        }

        let created: SessionCreateResponse =
            serde_json::from_str(&body).map_err(|_| Error::Protocol {
                status: status.as_u16(),
                body,
            })?;
        Ok(SessionId(created.id))
    }

    async fn renew_session(&self, session: &SessionId) -> Result<bool> {
        let url = self.url(&format!("v1/session/renew/{}", session));
        tracing::debug!("PUT {}", url);

        let response = self.with_auth(self.http.put(&url)).send().await?;
        let renewed = response.status() == StatusCode::OK;
        tracing::debug!("Session {} renewed={}", session, renewed);
        Ok(renewed)
    }

    async fn get_lock_holder(&self, role: &Role) -> Result<Option<SessionId>> {
        let url = self.lock_url(role);
        tracing::debug!("GET {}", url);

        let response = self.with_auth(self.http.get(&url)).send().await?;
        let status = response.status();

        // An absent lock key reads as 404
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(Error::Protocol {
                status: status.as_u16(),
                body,
            });
        }

        let pairs: Vec<KvPair> = serde_json::from_str(&body).map_err(|_| Error::Protocol {
            status: status.as_u16(),
            body,
        })?;
        Ok(lock_holder(&pairs).map(|id| SessionId(id.to_string())))
    }

    async fn acquire_lock(&self, role: &Role, session: &SessionId) -> Result<bool> {
        self.lock_command(role, "acquire", session).await
    }

    async fn release_lock(&self, role: &Role, session: &SessionId) -> Result<bool> {
        self.lock_command(role, "release", session).await
    }

    async fn destroy_session(&self, session: &SessionId) -> Result<bool> {
        let url = self.url(&format!("v1/session/destroy/{}", session));
        tracing::debug!("PUT {}", url);

        let response = self.with_auth(self.http.put(&url)).send().await?;
        Ok(response.status() == StatusCode::OK)
    }
}
