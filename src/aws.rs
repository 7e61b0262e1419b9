//! Signed HTTP access to AWS service endpoints.
//!
//! Requests are signed with Signature Version 4 using credentials resolved from
//! the standard `AWS_*` environment variables. Service clients (Textract,
//! Rekognition, S3) share one [`AwsClient`] and only differ in how they build
//! the request and decode the response.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Method, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::debug;

use crate::config::AwsSettings;

const DEFAULT_REGION: &str = "us-east-1";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const AMZ_JSON: &str = "application/x-amz-json-1.1";

/// Errors raised by any remote service call.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("missing AWS credentials: {0} not set")]
    Credentials(&'static str),
    #[error("invalid {service} request: {reason}")]
    InvalidRequest { service: &'static str, reason: String },
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} API error ({status}) {code}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        code: String,
        message: String,
    },
    #[error("failed to decode {service} response: {source}")]
    Decode {
        service: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected {service} response: {reason}")]
    InvalidResponse { service: &'static str, reason: String },
}

impl ServiceError {
    /// Build an `Api` error from an AWS JSON-protocol error body
    /// (`{"__type": "...#Code", "message": "..."}`).
    pub fn from_json_body(service: &'static str, status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            #[serde(rename = "__type", default)]
            kind: Option<String>,
            #[serde(alias = "Message", default)]
            message: Option<String>,
        }

        let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
        let code = parsed
            .as_ref()
            .and_then(|b| b.kind.as_deref())
            .and_then(|k| k.rsplit('#').next())
            .unwrap_or("Unknown")
            .to_string();
        let message = parsed
            .and_then(|b| b.message)
            .unwrap_or_else(|| body.to_string());

        Self::Api {
            service,
            status,
            code,
            message,
        }
    }

    /// Build an `Api` error from an S3 XML error body.
    pub fn from_xml_body(service: &'static str, status: u16, body: &str) -> Self {
        Self::Api {
            service,
            status,
            code: xml_tag(body, "Code").unwrap_or("Unknown").to_string(),
            message: xml_tag(body, "Message").unwrap_or_default().to_string(),
        }
    }
}

fn xml_tag<'a>(body: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(&body[start..end])
}

/// Static credentials, as resolved from the environment.
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }

    pub fn from_env() -> Result<Self, ServiceError> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| ServiceError::Credentials("AWS_ACCESS_KEY_ID"))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| ServiceError::Credentials("AWS_SECRET_ACCESS_KEY"))?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();
        Ok(Self::new(access_key_id, secret_access_key, session_token))
    }
}

/// HTTP client that signs every request for a given region.
#[derive(Clone)]
pub struct AwsClient {
    http: reqwest::Client,
    credentials: Credentials,
    region: String,
    endpoint_url: Option<String>,
}

impl AwsClient {
    pub fn new(
        http: reqwest::Client,
        credentials: Credentials,
        region: impl Into<String>,
        endpoint_url: Option<String>,
    ) -> Self {
        Self {
            http,
            credentials,
            region: region.into(),
            endpoint_url: endpoint_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    /// Resolve credentials, region and endpoint override. Settings from the
    /// config file win over `AWS_REGION` / `AWS_DEFAULT_REGION` / `AWS_ENDPOINT_URL`.
    pub fn from_env(settings: &AwsSettings) -> Result<Self, ServiceError> {
        let credentials = Credentials::from_env()?;
        let region = settings
            .region
            .clone()
            .or_else(|| std::env::var("AWS_REGION").ok())
            .or_else(|| std::env::var("AWS_DEFAULT_REGION").ok())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let endpoint_url = settings
            .endpoint_url
            .clone()
            .or_else(|| std::env::var("AWS_ENDPOINT_URL").ok());

        debug!(
            "AwsClient: region={} endpoint_override={:?} key={}",
            region, endpoint_url, credentials.access_key_id
        );
        Ok(Self::new(
            reqwest::Client::new(),
            credentials,
            region,
            endpoint_url,
        ))
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint_override(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }

    /// Base URL for a service (`https://{service}.{region}.amazonaws.com`).
    pub fn service_url(&self, service: &str) -> String {
        match &self.endpoint_url {
            Some(url) => url.clone(),
            None => format!("https://{}.{}.amazonaws.com", service, self.region),
        }
    }

    /// Invoke an AWS JSON 1.1 operation and decode its response.
    pub async fn call_json<Req, Resp>(
        &self,
        service: &'static str,
        target: &str,
        body: &Req,
    ) -> Result<Resp, ServiceError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body).map_err(|e| ServiceError::InvalidRequest {
            service,
            reason: e.to_string(),
        })?;

        let url = format!("{}/", self.service_url(service));
        let headers = vec![
            ("content-type", AMZ_JSON.to_string()),
            ("x-amz-target", target.to_string()),
        ];
        let response = self.send(service, Method::POST, &url, headers, payload).await?;

        let status = response.status();
        let raw_text = response
            .text()
            .await
            .map_err(|source| ServiceError::Transport { service, source })?;

        if !status.is_success() {
            return Err(ServiceError::from_json_body(service, status.as_u16(), &raw_text));
        }

        debug!(
            "{}: raw response ({} bytes): {}",
            target,
            raw_text.len(),
            raw_text.chars().take(500).collect::<String>()
        );
        serde_json::from_str(&raw_text).map_err(|source| ServiceError::Decode { service, source })
    }

    /// Sign and send a request. `headers` are signed alongside `host`,
    /// `x-amz-date`, `x-amz-content-sha256` and the session token.
    pub async fn send(
        &self,
        service: &'static str,
        method: Method,
        url: &str,
        headers: Vec<(&str, String)>,
        body: Vec<u8>,
    ) -> Result<reqwest::Response, ServiceError> {
        let url = Url::parse(url).map_err(|e| ServiceError::InvalidRequest {
            service,
            reason: format!("bad url {}: {}", url, e),
        })?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(ServiceError::InvalidRequest {
                    service,
                    reason: format!("url has no host: {}", url),
                })
            }
        };

        let now = Utc::now();
        let payload_hash = hex::encode(Sha256::digest(&body));

        let mut signed_headers: Vec<(String, String)> = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
        signed_headers.push(("host".to_string(), host));
        signed_headers.push(("x-amz-content-sha256".to_string(), payload_hash.clone()));
        signed_headers.push(("x-amz-date".to_string(), amz_date(&now)));
        if let Some(token) = &self.credentials.session_token {
            signed_headers.push(("x-amz-security-token".to_string(), token.clone()));
        }

        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let request = CanonicalRequest {
            method: method.as_str(),
            path: url.path(),
            query: &query,
            headers: &signed_headers,
            payload_hash: &payload_hash,
        };
        let authorization = authorization_header(&self.credentials, &request, &self.region, service, &now);

        debug!("{}: {} {}", service, method, url);

        let mut builder = self.http.request(method, url.clone());
        for (name, value) in &signed_headers {
            // reqwest derives Host from the URL
            if name != "host" {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        builder
            .header("authorization", authorization)
            .body(body)
            .send()
            .await
            .map_err(|source| ServiceError::Transport { service, source })
    }
}

// ============================================================================
// Signature Version 4
// ============================================================================

/// Inputs of the canonical request. `path` must already be URI-encoded.
pub(crate) struct CanonicalRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a [(String, String)],
    pub headers: &'a [(String, String)],
    pub payload_hash: &'a str,
}

impl CanonicalRequest<'_> {
    /// Returns the canonical request string and the `SignedHeaders` list.
    fn render(&self) -> (String, String) {
        let mut query: Vec<(String, String)> = self
            .query
            .iter()
            .map(|(k, v)| (urlencoding::encode(k).into_owned(), urlencoding::encode(v).into_owned()))
            .collect();
        query.sort();
        let canonical_query = query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(k, v)| {
                let value = v.split_whitespace().collect::<Vec<_>>().join(" ");
                (k.to_ascii_lowercase(), value)
            })
            .collect();
        headers.sort();

        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();
        let signed_headers = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let path = if self.path.is_empty() { "/" } else { self.path };
        let canonical = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            self.method, path, canonical_query, canonical_headers, signed_headers, self.payload_hash
        );
        (canonical, signed_headers)
    }
}

fn amz_date(now: &DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub(crate) fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

pub(crate) fn authorization_header(
    credentials: &Credentials,
    request: &CanonicalRequest<'_>,
    region: &str,
    service: &str,
    now: &DateTime<Utc>,
) -> String {
    let date = now.format("%Y%m%d").to_string();
    let scope = format!("{}/{}/{}/aws4_request", date, region, service);
    let (canonical, signed_headers) = request.render();

    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date(now),
        scope,
        hex::encode(Sha256::digest(canonical.as_bytes()))
    );
    let key = signing_key(&credentials.secret_access_key, &date, region, service);
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

    format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, credentials.access_key_id, scope, signed_headers, signature
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    fn example_headers() -> Vec<(String, String)> {
        vec![
            (
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded; charset=utf-8".to_string(),
            ),
            ("Host".to_string(), "iam.amazonaws.com".to_string()),
            ("X-Amz-Date".to_string(), "20150830T123600Z".to_string()),
        ]
    }

    fn example_query() -> Vec<(String, String)> {
        vec![
            ("Version".to_string(), "2010-05-08".to_string()),
            ("Action".to_string(), "ListUsers".to_string()),
        ]
    }

    const EMPTY_HASH: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_signing_key_vector() {
        let key = signing_key(SECRET, "20150830", "us-east-1", "iam");
        assert_eq!(
            hex::encode(key),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );
    }

    #[test]
    fn test_canonical_request_layout() {
        let headers = example_headers();
        let query = example_query();
        let request = CanonicalRequest {
            method: "GET",
            path: "/",
            query: &query,
            headers: &headers,
            payload_hash: EMPTY_HASH,
        };
        let (canonical, signed) = request.render();
        assert_eq!(signed, "content-type;host;x-amz-date");
        assert_eq!(
            canonical,
            "GET\n/\nAction=ListUsers&Version=2010-05-08\n\
             content-type:application/x-www-form-urlencoded; charset=utf-8\n\
             host:iam.amazonaws.com\n\
             x-amz-date:20150830T123600Z\n\n\
             content-type;host;x-amz-date\n\
             e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_authorization_header_vector() {
        let credentials = Credentials::new("AKIDEXAMPLE", SECRET, None);
        let headers = example_headers();
        let query = example_query();
        let request = CanonicalRequest {
            method: "GET",
            path: "/",
            query: &query,
            headers: &headers,
            payload_hash: EMPTY_HASH,
        };
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();

        let header = authorization_header(&credentials, &request, "us-east-1", "iam", &now);
        assert_eq!(
            header,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/iam/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date, \
             Signature=5d672d79c15b13162d9279b0855cfba6789a8edb4c82c400e06b5924a6f2b5d7"
        );
    }

    #[test]
    fn test_json_error_body() {
        let body = r#"{"__type":"com.amazonaws.textract#InvalidS3ObjectException","message":"Unable to get object"}"#;
        match ServiceError::from_json_body("textract", 400, body) {
            ServiceError::Api { code, message, status, .. } => {
                assert_eq!(code, "InvalidS3ObjectException");
                assert_eq!(message, "Unable to get object");
                assert_eq!(status, 400);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_xml_error_body() {
        let body = "<?xml version=\"1.0\"?><Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message></Error>";
        match ServiceError::from_xml_body("s3", 404, body) {
            ServiceError::Api { code, message, .. } => {
                assert_eq!(code, "NoSuchKey");
                assert_eq!(message, "The specified key does not exist.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_service_url() {
        let creds = Credentials::new("AKID", "secret", None);
        let client = AwsClient::new(reqwest::Client::new(), creds.clone(), "sa-east-1", None);
        assert_eq!(client.service_url("textract"), "https://textract.sa-east-1.amazonaws.com");

        let local = AwsClient::new(
            reqwest::Client::new(),
            creds,
            "sa-east-1",
            Some("http://localhost:4566/".to_string()),
        );
        assert_eq!(local.service_url("rekognition"), "http://localhost:4566");
    }
}
