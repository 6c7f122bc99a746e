//! AWS Secrets Manager backend
//!
//! Calls the `GetSecretValue` JSON API directly over HTTPS, signing each
//! request with AWS Signature Version 4.
//!
//! Reference parameters:
//! - `version_stage` - staging label such as `AWSCURRENT`
//! - `version_id` - exact secret version

use super::traits::{BackendParams, SecretBackend};
use super::http_client;
use crate::domain::errors::BackendError;
use crate::secrets::{secret_string, SecretString};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "secretsmanager";
const TARGET: &str = "secretsmanager.GetSecretValue";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Static AWS credentials
#[derive(Clone)]
pub struct AwsCredentials {
    access_key_id: String,
    secret_access_key: SecretString,
    session_token: Option<SecretString>,
}

impl AwsCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_string(secret_access_key.into()),
            session_token: None,
        }
    }

    /// Adds a temporary session token
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(secret_string(token.into()));
        self
    }

    /// Reads `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and the optional
    /// `AWS_SESSION_TOKEN`
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Authentication`] when either key is unset.
    pub fn from_env() -> Result<Self, BackendError> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| BackendError::Authentication("AWS_ACCESS_KEY_ID is not set".to_string()))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").map_err(|_| {
            BackendError::Authentication("AWS_SECRET_ACCESS_KEY is not set".to_string())
        })?;

        let credentials = Self::new(access_key_id, secret_access_key);
        Ok(match std::env::var("AWS_SESSION_TOKEN") {
            Ok(token) if !token.is_empty() => credentials.with_session_token(token),
            _ => credentials,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GetSecretValueResponse {
    #[serde(rename = "SecretString")]
    secret_string: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AwsErrorBody {
    #[serde(rename = "__type", default)]
    error_type: String,
    #[serde(alias = "Message", default)]
    message: String,
}

/// AWS Secrets Manager backend
pub struct AwsSecretsBackend {
    region: String,
    endpoint: String,
    credentials: Option<AwsCredentials>,
}

impl AwsSecretsBackend {
    /// Creates a backend for `region`, credentials read from the environment
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            endpoint: format!("https://{SERVICE}.{region}.amazonaws.com"),
            credentials: None,
        }
    }

    /// Overrides the service endpoint (VPC endpoints, LocalStack, tests)
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    /// Uses fixed credentials instead of the environment
    pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    fn credentials(&self) -> Result<AwsCredentials, BackendError> {
        match &self.credentials {
            Some(credentials) => Ok(credentials.clone()),
            None => AwsCredentials::from_env(),
        }
    }

    fn host(&self) -> Result<String, BackendError> {
        let parsed = url::Url::parse(&self.endpoint).map_err(|e| {
            BackendError::Configuration(format!("invalid endpoint '{}': {e}", self.endpoint))
        })?;
        let host = parsed.host_str().ok_or_else(|| {
            BackendError::Configuration(format!("endpoint '{}' has no host", self.endpoint))
        })?;
        Ok(match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }
}

fn hmac(key: &[u8], data: &str) -> Result<Vec<u8>, BackendError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| BackendError::Configuration(format!("HMAC key rejected: {e}")))?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

/// SigV4 headers for one `GetSecretValue` call
///
/// `amz_date` is the request timestamp in `YYYYMMDDTHHMMSSZ` form. Returns
/// the headers to send, `Authorization` included.
fn sign(
    credentials: &AwsCredentials,
    region: &str,
    host: &str,
    amz_date: &str,
    payload: &str,
) -> Result<Vec<(&'static str, String)>, BackendError> {
    let date = amz_date.get(..8).ok_or_else(|| {
        BackendError::Configuration(format!("malformed request timestamp '{amz_date}'"))
    })?;

    let mut headers: Vec<(&'static str, String)> = vec![
        ("content-type", CONTENT_TYPE.to_string()),
        ("host", host.to_string()),
        ("x-amz-date", amz_date.to_string()),
        ("x-amz-target", TARGET.to_string()),
    ];
    if let Some(token) = &credentials.session_token {
        headers.push(("x-amz-security-token", token.expose_secret().as_str().to_string()));
    }
    headers.sort_by(|a, b| a.0.cmp(b.0));

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{}\n", value.trim()))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "POST\n/\n\n{canonical_headers}\n{signed_headers}\n{}",
        sha256_hex(payload)
    );

    let scope = format!("{date}/{region}/{SERVICE}/aws4_request");
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
        sha256_hex(&canonical_request)
    );

    let secret = format!("AWS4{}", credentials.secret_access_key.expose_secret().as_str());
    let k_date = hmac(secret.as_bytes(), date)?;
    let k_region = hmac(&k_date, region)?;
    let k_service = hmac(&k_region, SERVICE)?;
    let k_signing = hmac(&k_service, "aws4_request")?;
    let signature = hex::encode(hmac(&k_signing, &string_to_sign)?);

    headers.push((
        "authorization",
        format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            credentials.access_key_id
        ),
    ));
    // reqwest derives Host from the URL
    headers.retain(|(name, _)| *name != "host");
    Ok(headers)
}

fn classify_error(status: reqwest::StatusCode, key: &str, body: &str) -> BackendError {
    let parsed: Option<AwsErrorBody> = serde_json::from_str(body).ok();
    let (error_type, message) = parsed
        .map(|b| (b.error_type, b.message))
        .unwrap_or_else(|| (String::new(), body.to_string()));

    if error_type.contains("ResourceNotFoundException") {
        BackendError::NotFound(format!("secret '{key}' not found"))
    } else if status == reqwest::StatusCode::FORBIDDEN
        || status == reqwest::StatusCode::UNAUTHORIZED
        || error_type.contains("UnrecognizedClient")
        || error_type.contains("InvalidSignature")
        || error_type.contains("AccessDenied")
        || error_type.contains("ExpiredToken")
    {
        BackendError::Authentication(format!("{error_type} {message}").trim().to_string())
    } else {
        BackendError::Transport(format!("HTTP {status}: {error_type} {message}").trim().to_string())
    }
}

#[async_trait]
impl SecretBackend for AwsSecretsBackend {
    fn kind(&self) -> &'static str {
        "aws"
    }

    async fn resolve(&self, key: &str, params: &BackendParams) -> Result<String, BackendError> {
        let credentials = self.credentials()?;
        let host = self.host()?;

        let mut request = serde_json::Map::new();
        request.insert("SecretId".to_string(), key.into());
        if let Some(stage) = params.get("version_stage") {
            request.insert("VersionStage".to_string(), stage.as_str().into());
        }
        if let Some(id) = params.get("version_id") {
            request.insert("VersionId".to_string(), id.as_str().into());
        }
        let payload = serde_json::Value::Object(request).to_string();

        let amz_date = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let headers = sign(&credentials, &self.region, &host, &amz_date, &payload)?;

        tracing::debug!(region = %self.region, key = %key, "Reading secret from AWS Secrets Manager");

        let mut builder = http_client()?.post(format!("{}/", self.endpoint));
        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .body(payload)
            .send()
            .await
            .map_err(|e| BackendError::Transport(format!("Secrets Manager request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(classify_error(status, key, &body));
        }

        let parsed: GetSecretValueResponse = serde_json::from_str(&body)
            .map_err(|e| BackendError::InvalidResponse(format!("GetSecretValue body: {e}")))?;
        parsed.secret_string.ok_or_else(|| {
            BackendError::InvalidResponse(format!(
                "secret '{key}' has no SecretString (binary secrets are not supported)"
            ))
        })
    }
}
