//! Drafts API client integration tests against a mock HTTP server

use std::sync::Arc;

use fieldops_gateway::{
    DraftId, DraftPatch, GatewayClient, GatewayConfig, GatewayError, SearchStatus,
    StaticCredentials, UploadBatch, UploadFile,
};
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, token: Option<&str>) -> GatewayClient {
    GatewayClient::new(
        GatewayConfig {
            base_url: format!("{}/api", server.uri()),
            timeout_secs: 5,
        },
        Arc::new(StaticCredentials::new(token.map(str::to_string))),
    )
    .expect("client builds")
}

fn sample_patch() -> DraftPatch {
    DraftPatch {
        nom: "Jean".into(),
        prenom: "Dupont".into(),
        location: "1 Rue X".into(),
        description: "Fuite en toiture".into(),
        observations: String::new(),
        status: SearchStatus::Draft,
    }
}

// =============================================================================
// Drafts
// =============================================================================

#[tokio::test]
async fn test_create_draft_sends_bearer_and_reads_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/searches/draft"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Brouillon créé",
            "search": { "id": "draft-42", "status": "DRAFT", "location": "" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("tok-1"));
    let id = client.create_draft().await.unwrap();

    assert_eq!(id, DraftId::from("draft-42"));
}

#[tokio::test]
async fn test_empty_draft_id_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/searches/draft"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "" })))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("tok"));
    let err = client.create_draft().await.unwrap_err();

    assert!(matches!(err, GatewayError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_missing_credential_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    assert!(!client.has_credentials());

    let err = client.create_draft().await.unwrap_err();
    assert!(matches!(err, GatewayError::AuthMissing));
}

#[tokio::test]
async fn test_update_draft_sends_projection() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/searches/draft-42"))
        .and(body_json(json!({
            "nom": "Jean",
            "prenom": "Dupont",
            "location": "1 Rue X",
            "description": "Fuite en toiture",
            "observations": "",
            "status": "DRAFT"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Recherche mise à jour"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("tok"));
    client
        .update_draft(&DraftId::from("draft-42"), &sample_patch())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_vanished_draft_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/searches/gone"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"detail": "Recherche introuvable"})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, Some("tok"));
    let err = client
        .update_draft(&DraftId::from("gone"), &sample_patch())
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_server_error_keeps_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("tok"));
    let err = client
        .update_draft(&DraftId::from("d"), &sample_patch())
        .await
        .unwrap_err();

    match err {
        GatewayError::Server { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_list_drafts_filters_by_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/searches"))
        .and(query_param("status", "DRAFT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "a", "status": "DRAFT", "location": "1 Rue X" },
            { "id": "b", "status": "DRAFT", "photos": null }
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("tok"));
    let drafts = client.list_drafts(SearchStatus::Draft).await.unwrap();

    assert_eq!(drafts.len(), 2);
    assert_eq!(drafts[0].location.as_deref(), Some("1 Rue X"));
    assert!(drafts[1].photos().is_empty());
}

#[tokio::test]
async fn test_delete_draft() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/searches/draft-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Brouillon supprimé définitivement"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("tok"));
    client.delete_draft(&DraftId::from("draft-42")).await.unwrap();
}

// =============================================================================
// Photos
// =============================================================================

#[tokio::test]
async fn test_upload_photos_single_multipart_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/searches/draft-42/photos"))
        .and(body_string_contains("name=\"section_id\""))
        .and(body_string_contains("observations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "3 photo(s) uploadée(s)",
            "photos": [
                {
                    "filename": "f1.jpg",
                    "url": "https://cdn/f1.jpg",
                    "section_id": "observations",
                    "number": 1
                },
                {
                    "filename": "f2.jpg",
                    "url": "https://cdn/f2.jpg",
                    "section_id": "observations",
                    "number": 2
                },
                {
                    "filename": "f3.jpg",
                    "url": "https://cdn/f3.jpg",
                    "section_id": "observations",
                    "number": 3
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let files = (1..=3)
        .map(|i| UploadFile {
            file_name: format!("photo{i}.jpg"),
            content_type: "image/jpeg".into(),
            bytes: format!("jpeg-bytes-{i}").into_bytes(),
        })
        .collect();

    let client = client_for(&server, Some("tok"));
    let photos = client
        .upload_photos(
            &DraftId::from("draft-42"),
            UploadBatch {
                section_id: "observations".into(),
                is_profile: false,
                files,
            },
        )
        .await
        .unwrap();

    assert_eq!(photos.len(), 3);
    assert!(photos.iter().all(|p| p.section_id.as_deref() == Some("observations")));
}

#[tokio::test]
async fn test_upload_profile_photo_sets_flag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/searches/d/photos"))
        .and(body_string_contains("name=\"is_profile\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "photos": [{
                "filename": "p.jpg",
                "url": "https://cdn/p.jpg",
                "section_id": "profile",
                "is_profile": true
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("tok"));
    let photos = client
        .upload_photos(
            &DraftId::from("d"),
            UploadBatch {
                section_id: "profile".into(),
                is_profile: true,
                files: vec![UploadFile {
                    file_name: "me.png".into(),
                    content_type: "image/png".into(),
                    bytes: b"png-bytes".to_vec(),
                }],
            },
        )
        .await
        .unwrap();

    assert!(photos[0].is_profile);
}

#[tokio::test]
async fn test_short_confirmation_returns_records_that_came_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/searches/d/photos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "photos": [{
                "filename": "f1.jpg",
                "url": "https://cdn/f1.jpg",
                "original_name": "a.jpg"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let file = |name: &str| UploadFile {
        file_name: name.into(),
        content_type: "image/jpeg".into(),
        bytes: vec![1],
    };
    let client = client_for(&server, Some("tok"));
    let photos = client
        .upload_photos(
            &DraftId::from("d"),
            UploadBatch {
                section_id: "description".into(),
                is_profile: false,
                files: vec![file("a.jpg"), file("b.jpg")],
            },
        )
        .await
        .unwrap();

    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].filename, "f1.jpg");
}

#[tokio::test]
async fn test_delete_photo_by_filename() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/searches/d/photos/f1.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Photo supprimée",
            "remaining_photos": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("tok"));
    client
        .delete_photo(&DraftId::from("d"), "f1.jpg")
        .await
        .unwrap();
}
