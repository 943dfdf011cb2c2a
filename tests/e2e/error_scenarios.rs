//! Error Scenario E2E Tests
//!
//! Each failure must surface with the stage that produced it and the root
//! cause kind, and must stop the flow before the next stage.

#[cfg(test)]
mod tests {
    use crate::e2e::common::*;
    use asset_uploadr::associate::associate_asset_with_product;
    use asset_uploadr::retry::RetryPolicy;
    use asset_uploadr::upload::upload_asset;
    use asset_uploadr::{ErrorKind, UploadStage};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn allowed() -> Vec<String> {
        vec!["image/jpeg".to_string()]
    }

    async fn mount_confirm(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path(format!("/api/v1/assets/{}/uploaded", ASSET_ID)))
            .respond_with(ResponseTemplate::new(201))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_disallowed_mime_type_fails_before_any_request() {
        let server = MockServer::start().await;
        let client = test_client(&server, Arc::new(RecordingSleeper::default()));

        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        std::io::Write::write_all(&mut file, b"plain text").unwrap();

        let err = upload_asset(file.path(), &allowed(), &client)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(UploadStage::OpenAsset));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let server = MockServer::start().await;
        let client = test_client(&server, Arc::new(RecordingSleeper::default()));

        let err = upload_asset("/definitely/not/here.jpg", &allowed(), &client)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(UploadStage::OpenAsset));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[tokio::test]
    async fn test_zero_length_chunk_rejected() {
        let server = MockServer::start().await;
        let client = test_client(&server, Arc::new(RecordingSleeper::default()));
        let fixture = generate_asset(100);

        mount_metadata(&server, &[(0, 50), (50, 50)]).await;
        mount_confirm(&server, 0).await;

        let err = upload_asset(fixture.path(), &allowed(), &client)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(UploadStage::CreateMetadata));
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("zero-length partition"));

        let requests = server.received_requests().await.unwrap();
        assert!(requests.iter().all(|r| r.method.as_str() != "PUT"));
    }

    #[tokio::test]
    async fn test_duplicate_part_number_rejected() {
        let server = MockServer::start().await;
        let client = test_client(&server, Arc::new(RecordingSleeper::default()));
        let fixture = generate_asset(100);

        let url = format!("{}/presigned/part-1", server.uri());
        Mock::given(method("POST"))
            .and(path("/api/v1/assets/signed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": ASSET_ID,
                "upload_id": UPLOAD_ID,
                "urls": [
                    {"part": 1, "start": 0, "end": 50, "url": url},
                    {"part": 1, "start": 50, "end": 100, "url": url}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;
        mount_confirm(&server, 0).await;

        let err = upload_asset(fixture.path(), &allowed(), &client)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(UploadStage::CreateMetadata));
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("partition #1 more than once"));

        let requests = server.received_requests().await.unwrap();
        assert!(requests.iter().all(|r| r.method.as_str() != "PUT"));
    }

    #[tokio::test]
    async fn test_metadata_without_partitions_rejected() {
        let server = MockServer::start().await;
        let client = test_client(&server, Arc::new(RecordingSleeper::default()));
        let fixture = generate_asset(100);

        mount_metadata(&server, &[]).await;
        mount_confirm(&server, 0).await;

        let err = upload_asset(fixture.path(), &allowed(), &client)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(UploadStage::CreateMetadata));
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("no partitions"));
    }

    #[tokio::test]
    async fn test_partial_coverage_rejected() {
        let server = MockServer::start().await;
        let client = test_client(&server, Arc::new(RecordingSleeper::default()));
        let fixture = generate_asset(100);

        mount_metadata(&server, &[(0, 40), (40, 80)]).await;
        mount_confirm(&server, 0).await;

        let err = upload_asset(fixture.path(), &allowed(), &client)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(UploadStage::CreateMetadata));
        assert!(err.to_string().contains("cover 80 of 100 bytes"));
    }

    #[tokio::test]
    async fn test_metadata_server_error_is_not_retried() {
        let server = MockServer::start().await;
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = test_client(&server, sleeper.clone());
        let fixture = generate_asset(100);

        Mock::given(method("POST"))
            .and(path("/api/v1/assets/signed"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let err = upload_asset(fixture.path(), &allowed(), &client)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(UploadStage::CreateMetadata));
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("expected HTTP status code 200, got 500"));
        assert!(sleeper.delays.lock().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limited_metadata_recovers() {
        let server = MockServer::start().await;
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = test_client(&server, sleeper.clone());
        let fixture = generate_asset(100);

        Mock::given(method("POST"))
            .and(path("/api/v1/assets/signed"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        mount_metadata(&server, &[(0, 100)]).await;
        mount_part(&server, 1).await;
        mount_confirm(&server, 1).await;

        let asset = upload_asset(fixture.path(), &allowed(), &client)
            .await
            .unwrap();
        assert_eq!(asset.id.as_deref(), Some(ASSET_ID));

        let delays = sleeper.delays.lock();
        assert_eq!(delays.len(), 1);
        // unit * (e - 1)
        assert!(delays[0] > Duration::from_millis(17) && delays[0] < Duration::from_millis(18));
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion() {
        let server = MockServer::start().await;
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = test_client(&server, sleeper.clone());
        let fixture = generate_asset(100);

        Mock::given(method("POST"))
            .and(path("/api/v1/assets/signed"))
            .respond_with(ResponseTemplate::new(429))
            .expect(4)
            .mount(&server)
            .await;

        let err = upload_asset(fixture.path(), &allowed(), &client)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(UploadStage::CreateMetadata));
        assert_eq!(err.kind(), ErrorKind::Protocol);

        let delays = sleeper.delays.lock();
        assert_eq!(delays.len(), 3);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(delays[2], Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_failed_part_prevents_confirmation() {
        let server = MockServer::start().await;
        let client = test_client(&server, Arc::new(RecordingSleeper::default()));
        let fixture = generate_asset(300);

        mount_metadata(&server, &chunk_ranges(300, 3)).await;
        mount_part(&server, 1).await;
        mount_part(&server, 3).await;
        Mock::given(method("PUT"))
            .and(path("/presigned/part-2"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        mount_confirm(&server, 0).await;

        let err = upload_asset(fixture.path(), &allowed(), &client)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(UploadStage::UploadParts));
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("partition #2"));
    }

    #[tokio::test]
    async fn test_missing_etag_is_protocol_error() {
        let server = MockServer::start().await;
        let client = test_client(&server, Arc::new(RecordingSleeper::default()));
        let fixture = generate_asset(100);

        mount_metadata(&server, &[(0, 100)]).await;
        Mock::given(method("PUT"))
            .and(path("/presigned/part-1"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        mount_confirm(&server, 0).await;

        let err = upload_asset(fixture.path(), &allowed(), &client)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(UploadStage::UploadParts));
        assert!(err.to_string().contains("ETag header is empty"));
    }

    #[tokio::test]
    async fn test_confirmation_rejected() {
        let server = MockServer::start().await;
        let client = test_client(&server, Arc::new(RecordingSleeper::default()));
        let fixture = generate_asset(100);

        mount_metadata(&server, &[(0, 100)]).await;
        mount_part(&server, 1).await;
        Mock::given(method("POST"))
            .and(path(format!("/api/v1/assets/{}/uploaded", ASSET_ID)))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "bad parts"})))
            .expect(1)
            .mount(&server)
            .await;

        let err = upload_asset(fixture.path(), &allowed(), &client)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(UploadStage::ConfirmUpload));
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn test_product_never_appears() {
        let server = MockServer::start().await;
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = test_client(&server, sleeper.clone());

        Mock::given(method("GET"))
            .and(path("/api/v1/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(product_page(&[1, 2], None)))
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/api/v1/assets/{}/attach", ASSET_ID)))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let policy = RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        };
        let err = associate_asset_with_product(ASSET_ID, "42", &client, &policy, sleeper.as_ref())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("cannot find product"));
        assert_eq!(sleeper.delays.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_product_id_sends_nothing() {
        let server = MockServer::start().await;
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = test_client(&server, sleeper.clone());

        let err = associate_asset_with_product(
            ASSET_ID,
            "not-a-number",
            &client,
            &RetryPolicy::default(),
            sleeper.as_ref(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attach_rejected() {
        let server = MockServer::start().await;
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = test_client(&server, sleeper.clone());

        Mock::given(method("GET"))
            .and(path("/api/v1/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(product_page(&[42], None)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/api/v1/assets/{}/attach", ASSET_ID)))
            .respond_with(ResponseTemplate::new(422))
            .expect(1)
            .mount(&server)
            .await;

        let err = associate_asset_with_product(ASSET_ID, "42", &client, &RetryPolicy::default(), sleeper.as_ref())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("cannot associate product with asset"));
    }
}
