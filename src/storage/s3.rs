//! S3 REST client (GetObject / PutObject).

use super::{ObjectLocation, ObjectStore};
use crate::aws::{AwsClient, ServiceError};
use reqwest::Method;
use tracing::info;

const SERVICE: &str = "s3";

pub struct S3Client {
    aws: AwsClient,
}

impl S3Client {
    pub fn new(aws: AwsClient) -> Self {
        Self { aws }
    }

    /// Virtual-hosted URL, or path style when an endpoint override is set.
    fn object_url(&self, location: &ObjectLocation) -> String {
        let key = encode_key(&location.key);
        match self.aws.endpoint_override() {
            Some(endpoint) => format!("{}/{}/{}", endpoint, location.bucket, key),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                location.bucket,
                self.aws.region(),
                key
            ),
        }
    }
}

/// URI-encode each path segment, keeping the `/` separators.
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

async fn error_from(response: reqwest::Response) -> ServiceError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ServiceError::from_xml_body(SERVICE, status, &body)
}

#[async_trait::async_trait]
impl ObjectStore for S3Client {
    async fn get_object(&self, location: &ObjectLocation) -> Result<Vec<u8>, ServiceError> {
        let url = self.object_url(location);
        let response = self
            .aws
            .send(SERVICE, Method::GET, &url, Vec::new(), Vec::new())
            .await?;

        if !response.status().is_success() {
            return Err(error_from(response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| ServiceError::Transport {
                service: SERVICE,
                source,
            })?;
        info!("S3Client: downloaded {} ({} bytes)", location, bytes.len());
        Ok(bytes.to_vec())
    }

    async fn put_object(
        &self,
        location: &ObjectLocation,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ServiceError> {
        let url = self.object_url(location);
        let size = body.len();
        let headers = vec![("content-type", content_type.to_string())];
        let response = self.aws.send(SERVICE, Method::PUT, &url, headers, body).await?;

        if !response.status().is_success() {
            return Err(error_from(response).await);
        }

        info!("S3Client: uploaded {} ({} bytes, {})", location, size, content_type);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::Credentials;

    fn client(endpoint: Option<&str>) -> S3Client {
        let aws = AwsClient::new(
            reqwest::Client::new(),
            Credentials::new("AKID", "secret", None),
            "us-east-2",
            endpoint.map(str::to_string),
        );
        S3Client::new(aws)
    }

    #[test]
    fn test_encode_key_keeps_separators() {
        assert_eq!(encode_key("input/contora.jpg"), "input/contora.jpg");
        assert_eq!(encode_key("fotos/são paulo.jpg"), "fotos/s%C3%A3o%20paulo.jpg");
    }

    #[test]
    fn test_virtual_hosted_url() {
        let location = ObjectLocation::new("bkt-fotos", "input/contora.jpg");
        assert_eq!(
            client(None).object_url(&location),
            "https://bkt-fotos.s3.us-east-2.amazonaws.com/input/contora.jpg"
        );
    }

    #[test]
    fn test_path_style_url_with_endpoint() {
        let location = ObjectLocation::new("bkt-fotos", "results/a b.jpg");
        assert_eq!(
            client(Some("http://localhost:4566")).object_url(&location),
            "http://localhost:4566/bkt-fotos/results/a%20b.jpg"
        );
    }
}
