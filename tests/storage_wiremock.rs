//! `ObjectStore` is a thin wrapper over `aws-sdk-s3`; these tests point it
//! at a `wiremock` HTTP server instead of a real S3/MinIO endpoint,
//! exercising `force_path_style` + `endpoint_url` the way a local MinIO
//! deployment would be configured.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use keyscribe::config::Config;
use keyscribe::storage::ObjectStore;

fn config_for(endpoint: &str) -> Config {
    Config {
        database_url: String::new(),
        server_address: "127.0.0.1:0".to_string(),
        tmp_dir: std::env::temp_dir().to_string_lossy().into_owned(),
        s3_endpoint: Some(endpoint.to_string()),
        s3_region: "us-east-1".to_string(),
        s3_bucket: "keyscribe-test".to_string(),
        s3_access_key_id: "test".to_string(),
        s3_secret_access_key: "test".to_string(),
        s3_force_path_style: true,
        sample_threshold: 0.08,
        dedup_correlation_threshold: 0.97,
        job_poll_interval: std::time::Duration::from_secs(5),
        job_max_retries: 3,
        job_retry_base_delay: std::time::Duration::from_secs(60),
        ocr_languages: "eng".to_string(),
        ocr_fallback_language: "eng".to_string(),
        max_upload_size_mb: 2048,
        default_presign_ttl_secs: 900,
    }
}

#[tokio::test]
async fn upload_bytes_puts_object_at_the_expected_key() {
    let mock_server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/keyscribe-test/videos/abc/source.mp4"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server.uri());
    let storage = ObjectStore::from_config(&config).await.expect("build object store");

    storage
        .upload_bytes("videos/abc/source.mp4", b"frame bytes".to_vec(), "video/mp4")
        .await
        .expect("upload should succeed against the mock endpoint");
}

#[tokio::test]
async fn download_bytes_returns_not_found_on_missing_key() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/keyscribe-test/videos/missing.mp4"))
        .respond_with(
            ResponseTemplate::new(404).set_body_string(
                r#"<?xml version="1.0" encoding="UTF-8"?>
                <Error><Code>NoSuchKey</Code><Message>not found</Message></Error>"#,
            ),
        )
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server.uri());
    let storage = ObjectStore::from_config(&config).await.expect("build object store");

    let result = storage.download_bytes("videos/missing.mp4").await;
    assert!(matches!(result, Err(keyscribe::storage::StorageError::NotFound(_))));
}

/// Presigning never hits the network, so this doesn't need the mock
/// server running at all; it just checks the generated URL carries the
/// key and an expiry derived from the requested TTL.
#[tokio::test]
async fn presign_get_embeds_key_and_expiry() {
    let config = config_for("http://127.0.0.1:1");
    let storage = ObjectStore::from_config(&config).await.expect("build object store");

    let url = storage
        .presign_get("videos/abc/frame_0001.jpg", std::time::Duration::from_secs(120))
        .await
        .expect("presign should succeed without any network call");

    assert!(url.contains("videos/abc/frame_0001.jpg"));
    assert!(url.contains("X-Amz-Expires=120"));
}
