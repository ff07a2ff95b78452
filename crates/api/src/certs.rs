//! Fly.io API integration for SSL certificates
//!
//! Once a custom domain's ownership is verified, a certificate is requested
//! via Fly.io's GraphQL API; `check_certificate` reports whether one is
//! actively serving. Certificate state is advisory observability data, not
//! a routing gate.

use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

/// Fly.io GraphQL API endpoint
const FLY_API_URL: &str = "https://api.fly.io/graphql";

#[derive(Debug, Serialize)]
struct GraphQlRequest {
    query: &'static str,
    variables: Value,
}

/// Certificate status as reported by the edge
#[derive(Debug, Clone, Copy)]
pub struct CertificateStatus {
    /// The edge has accepted the hostname and is provisioning
    pub configured: bool,
    /// A certificate is issued and serving
    pub ready: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error("Certificate API request failed: {0}")]
    Request(String),
    #[error("Certificate API error: {0}")]
    Api(String),
}

/// Client for the edge certificate API
#[derive(Clone)]
pub struct CertClient {
    client: Client,
    api_token: String,
    app_name: String,
}

impl CertClient {
    pub fn new(api_token: String, app_name: String) -> Self {
        Self {
            client: Client::new(),
            api_token,
            app_name,
        }
    }

    /// Create from environment config, returns None if not configured
    pub fn from_config(api_token: Option<String>, app_name: Option<String>) -> Option<Self> {
        match (api_token, app_name) {
            (Some(token), Some(app)) if !token.is_empty() && !app.is_empty() => {
                Some(Self::new(token, app))
            }
            _ => {
                warn!("Certificate API not configured - custom domain SSL will not be auto-provisioned");
                None
            }
        }
    }

    /// Request a certificate for a hostname.
    ///
    /// Issuance is asynchronous on the Let's Encrypt side; this only
    /// initiates the process. An already-existing certificate is success.
    pub async fn add_certificate(&self, hostname: &str) -> Result<(), CertError> {
        const MUTATION: &str = r#"
            mutation($appId: ID!, $hostname: String!) {
                addCertificate(appId: $appId, hostname: $hostname) {
                    certificate {
                        id
                        hostname
                        configured
                    }
                }
            }
        "#;

        let data = self
            .post(
                MUTATION,
                json!({ "appId": self.app_name, "hostname": hostname }),
            )
            .await;

        match data {
            Ok(_) => {
                info!(hostname = %hostname, "Certificate provisioning initiated");
                Ok(())
            }
            Err(CertError::Api(msg)) if msg.contains("already exists") => {
                info!(hostname = %hostname, "Certificate already exists");
                Ok(())
            }
            Err(err) => {
                error!(hostname = %hostname, error = %err, "Certificate provisioning failed");
                Err(err)
            }
        }
    }

    /// Report whether a certificate is actively serving the hostname
    pub async fn check_certificate(&self, hostname: &str) -> Result<CertificateStatus, CertError> {
        const QUERY: &str = r#"
            query($appName: String!, $hostname: String!) {
                app(name: $appName) {
                    certificate(filter: $hostname) {
                        configured
                        clientStatus
                    }
                }
            }
        "#;

        let data = self
            .post(
                QUERY,
                json!({ "appName": self.app_name, "hostname": hostname }),
            )
            .await?;

        let cert = &data["app"]["certificate"];
        if cert.is_null() {
            return Ok(CertificateStatus {
                configured: false,
                ready: false,
            });
        }

        Ok(CertificateStatus {
            configured: cert["configured"].as_bool().unwrap_or(false),
            ready: cert["clientStatus"].as_str() == Some("Ready"),
        })
    }

    async fn post(&self, query: &'static str, variables: Value) -> Result<Value, CertError> {
        let request = GraphQlRequest { query, variables };

        let response = self
            .client
            .post(FLY_API_URL)
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| CertError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CertError::Api(format!("{} - {}", status, body)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| CertError::Request(format!("Invalid response body: {}", e)))?;

        if let Some(errors) = body["errors"].as_array() {
            let message = errors
                .iter()
                .filter_map(|e| e["message"].as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(CertError::Api(message));
        }

        Ok(body["data"].clone())
    }
}
