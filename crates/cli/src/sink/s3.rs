//! S3-compatible object-store destination
//!
//! Uploads with the legacy AWS HMAC-SHA1 request signature, which
//! S3-compatible stores accept for simple object PUTs.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use scheduler::{ArchiveSink, SinkError};
use sha1::Sha1;
use tracing::{debug, info};

type HmacSha1 = Hmac<Sha1>;

const CONTENT_TYPE: &str = "application/x-gzip";

pub struct S3Sink {
    http: reqwest::Client,
    access_key: String,
    secret_key: String,
    endpoint: String,
    bucket: String,
}

impl S3Sink {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
        }
    }

    fn object_url(&self, name: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, name)
    }

    fn resource(&self, name: &str) -> String {
        format!("/{}/{}", self.bucket, name)
    }
}

/// The canonical request summary the signature covers
fn string_to_sign(date: &str, resource: &str) -> String {
    format!(
        "PUT\n\n{}\n{}\nx-amz-acl:private\n{}",
        CONTENT_TYPE, date, resource
    )
}

/// Legacy AWS signature: base64(HMAC-SHA1(secret, string-to-sign))
fn sign(secret_key: &str, string_to_sign: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(secret_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(string_to_sign.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

#[async_trait]
impl ArchiveSink for S3Sink {
    async fn store(&self, name: &str, bytes: Vec<u8>) -> Result<(), SinkError> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let signature = sign(&self.secret_key, &string_to_sign(&date, &self.resource(name)));
        let url = self.object_url(name);
        debug!(url = %url, "uploading archive");

        let response = self
            .http
            .put(&url)
            .header("Date", date)
            .header("Content-Type", CONTENT_TYPE)
            .header("x-amz-acl", "private")
            .header(
                "Authorization",
                format!("AWS {}:{}", self.access_key, signature),
            )
            .body(bytes)
            .send()
            .await
            .map_err(|error| SinkError::WriteFailed(error.to_string()))?;

        if !response.status().is_success() {
            return Err(SinkError::WriteFailed(format!(
                "{} responded with status {}",
                url,
                response.status()
            )));
        }

        info!(name = %name, bucket = %self.bucket, "wrote archive to bucket");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_to_sign_layout() {
        let s = string_to_sign(
            "Fri, 07 Aug 2026 10:00:00 GMT",
            "/archives/prod-2026-08-07T10:00:00Z.tar.gz",
        );
        assert_eq!(
            s,
            "PUT\n\napplication/x-gzip\nFri, 07 Aug 2026 10:00:00 GMT\n\
             x-amz-acl:private\n/archives/prod-2026-08-07T10:00:00Z.tar.gz"
        );
    }

    #[test]
    fn signature_is_base64_of_a_sha1_mac() {
        let signature = sign("secret", "PUT\n\napplication/x-gzip\ndate\n/b/k");
        let raw = BASE64.decode(&signature).unwrap();
        assert_eq!(raw.len(), 20);
    }

    #[test]
    fn signature_depends_on_the_secret() {
        let payload = "PUT\n\napplication/x-gzip\ndate\n/b/k";
        assert_ne!(sign("secret-a", payload), sign("secret-b", payload));
        assert_eq!(sign("secret-a", payload), sign("secret-a", payload));
    }

    #[test]
    fn object_url_is_path_style() {
        let sink = S3Sink::new("AKID", "secret", "https://s3.amazonaws.com/", "archives");
        assert_eq!(
            sink.object_url("prod-2026-08-07T10:00:00Z.tar.gz"),
            "https://s3.amazonaws.com/archives/prod-2026-08-07T10:00:00Z.tar.gz"
        );
        assert_eq!(
            sink.resource("prod-2026-08-07T10:00:00Z.tar.gz"),
            "/archives/prod-2026-08-07T10:00:00Z.tar.gz"
        );
    }
}
