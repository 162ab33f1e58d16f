use std::collections::BTreeMap;
use std::time::Duration;

use batchpoll_engine::{
    ApiError, ApiSettings, Entity, FileSummary, JobStatus, ProcessingApi, ReqwestProcessingApi,
    Sentiment, UploadedFile,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> ReqwestProcessingApi {
    ReqwestProcessingApi::new(ApiSettings {
        base_url: server.uri(),
        ..ApiSettings::default()
    })
    .expect("valid settings")
}

#[tokio::test]
async fn lists_files() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 3,
                "filename": "call.wav",
                "filetype": "wav",
                "size": 2048,
                "created_at": "2024-11-25T07:45:00"
            },
            {
                "id": 7,
                "filename": "notes.txt",
                "filetype": "txt",
                "size": null,
                "created_at": "2024-11-26T10:00:00"
            }
        ])))
        .mount(&server)
        .await;

    let files = api_for(&server).list_files().await.expect("list ok");
    assert_eq!(
        files[0],
        FileSummary {
            id: 3,
            filename: "call.wav".to_string(),
            filetype: Some("wav".to_string()),
            size: Some(2048),
            created_at: Some("2024-11-25T07:45:00".to_string()),
        }
    );
    assert_eq!(files[1].size, None);
}

#[tokio::test]
async fn submits_batch_and_returns_queued_ids() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/process/batch"))
        .and(body_json(json!({ "file_ids": [3, 7, 9] })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "queued_files": [3, 7] })))
        .expect(1)
        .mount(&server)
        .await;

    let queued = api_for(&server)
        .submit_batch(&[3, 7, 9])
        .await
        .expect("submit ok");
    assert_eq!(queued, vec![3, 7]);
}

#[tokio::test]
async fn error_body_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/process/batch"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "queue full" })))
        .mount(&server)
        .await;

    let err = api_for(&server).submit_batch(&[1]).await.unwrap_err();
    assert_eq!(
        err,
        ApiError::HttpStatus {
            status: 500,
            message: Some("queue full".to_string())
        }
    );
    assert_eq!(err.server_message(), Some("queue full"));
}

#[tokio::test]
async fn unauthorized_is_distinguished() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/process/status"))
        .respond_with(ResponseTemplate::new(401).set_body_string("login required"))
        .mount(&server)
        .await;

    let err = api_for(&server).fetch_status().await.unwrap_err();
    assert_eq!(err, ApiError::Unauthorized { message: None });
}

#[tokio::test]
async fn status_map_parses_string_keys_and_unknown_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/process/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "3": { "status": "processing" },
            "7": { "status": "failed", "error": "decoder crashed" },
            "9": { "status": "archived" }
        })))
        .mount(&server)
        .await;

    let statuses = api_for(&server).fetch_status().await.expect("status ok");
    assert_eq!(statuses[&3].status, JobStatus::Processing);
    assert_eq!(statuses[&7].status, JobStatus::Failed);
    assert_eq!(statuses[&7].error.as_deref(), Some("decoder crashed"));
    assert_eq!(statuses[&9].status, JobStatus::Unknown);
}

#[tokio::test]
async fn malformed_status_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/process/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = api_for(&server).fetch_status().await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)), "got {err:?}");
}

#[tokio::test]
async fn slow_status_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/process/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_json(json!({})),
        )
        .mount(&server)
        .await;

    let api = ReqwestProcessingApi::new(ApiSettings {
        base_url: server.uri(),
        request_timeout: Duration::from_millis(50),
        ..ApiSettings::default()
    })
    .unwrap();
    let err = api.fetch_status().await.unwrap_err();
    assert_eq!(err, ApiError::Timeout);
}

#[tokio::test]
async fn oversized_response_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/files"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[                    ]"))
        .mount(&server)
        .await;

    let api = ReqwestProcessingApi::new(ApiSettings {
        base_url: server.uri(),
        max_bytes: 10,
        ..ApiSettings::default()
    })
    .unwrap();
    let err = api.list_files().await.unwrap_err();
    assert_eq!(err, ApiError::TooLarge { max_bytes: 10 });
}

#[tokio::test]
async fn session_cookie_and_base_path_are_honoured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/app/api/files"))
        .and(header("cookie", "session=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let api = ReqwestProcessingApi::new(ApiSettings {
        base_url: format!("{}/app", server.uri()),
        session_cookie: Some("session=abc".to_string()),
        ..ApiSettings::default()
    })
    .unwrap();
    assert!(api.list_files().await.unwrap().is_empty());
}

#[test]
fn invalid_base_url_is_rejected() {
    let err = ReqwestProcessingApi::new(ApiSettings {
        base_url: "not a url".to_string(),
        ..ApiSettings::default()
    })
    .unwrap_err();
    assert!(matches!(err, ApiError::InvalidBaseUrl(_)));
}

#[tokio::test]
async fn uploads_file_as_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/files"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .and(body_string_contains("filename=\"call.wav\""))
        .and(body_string_contains("RIFF"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 12,
            "filename": "call.wav",
            "size": "4.0 B",
            "type": "wav",
            "created_at": "2024-11-25T07:45:00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uploaded = api_for(&server)
        .upload_file("call.wav", b"RIFF".to_vec())
        .await
        .expect("upload ok");
    assert_eq!(
        uploaded,
        UploadedFile {
            id: 12,
            filename: "call.wav".to_string(),
            size: Some("4.0 B".to_string()),
            filetype: Some("wav".to_string()),
            created_at: Some("2024-11-25T07:45:00".to_string()),
        }
    );
}

#[tokio::test]
async fn disallowed_upload_never_reaches_the_service() {
    let server = MockServer::start().await;

    let err = api_for(&server)
        .upload_file("movie.mkv", vec![0; 16])
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::UploadRejected(_)), "got {err:?}");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn upload_error_body_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/files"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({ "error": "Upload failed: disk full" })),
        )
        .mount(&server)
        .await;

    let err = api_for(&server)
        .upload_file("notes.txt", b"hello".to_vec())
        .await
        .unwrap_err();
    assert_eq!(err.server_message(), Some("Upload failed: disk full"));
}

#[tokio::test]
async fn deletes_file() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/files/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "File deleted" })))
        .expect(1)
        .mount(&server)
        .await;

    api_for(&server).delete_file(7).await.expect("delete ok");
}

#[tokio::test]
async fn deleting_foreign_file_is_forbidden() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/files/8"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "error": "Unauthorized" })))
        .mount(&server)
        .await;

    let err = api_for(&server).delete_file(8).await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Forbidden {
            message: Some("Unauthorized".to_string())
        }
    );
}

#[tokio::test]
async fn processes_single_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/process/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transcript": "Thanks for calling Acme.",
            "sentiment": { "neg": 0.0, "neu": 0.5, "pos": 0.5, "compound": 0.44 },
            "entities": [ { "text": "Acme", "label": "ORG", "start": 19, "end": 23 } ],
            "speakers": { "speaker_0": [0.0, 1.5], "speaker_1": [3.0] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let analysis = api_for(&server).process_file(3).await.expect("process ok");
    assert_eq!(analysis.transcript, "Thanks for calling Acme.");
    assert_eq!(
        analysis.sentiment,
        Sentiment {
            neg: 0.0,
            neu: 0.5,
            pos: 0.5,
            compound: 0.44
        }
    );
    assert_eq!(
        analysis.entities,
        vec![Entity {
            text: "Acme".to_string(),
            label: "ORG".to_string(),
            start: 19,
            end: 23
        }]
    );
    assert_eq!(
        analysis.speakers,
        Some(BTreeMap::from([
            ("speaker_0".to_string(), vec![0.0, 1.5]),
            ("speaker_1".to_string(), vec![3.0]),
        ]))
    );
}

#[tokio::test]
async fn text_file_analysis_has_no_speakers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/process/4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transcript": "plain text",
            "sentiment": { "neg": 0, "neu": 1, "pos": 0, "compound": 0 },
            "entities": [],
            "speakers": null
        })))
        .mount(&server)
        .await;

    let analysis = api_for(&server).process_file(4).await.expect("process ok");
    assert_eq!(analysis.speakers, None);
    assert_eq!(analysis.sentiment.neu, 1.0);
}

#[tokio::test]
async fn processing_uses_its_own_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/process/5"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(150))
                .set_body_json(json!({ "transcript": "late but fine" })),
        )
        .mount(&server)
        .await;

    let api = ReqwestProcessingApi::new(ApiSettings {
        base_url: server.uri(),
        request_timeout: Duration::from_millis(50),
        process_timeout: Duration::from_secs(5),
        ..ApiSettings::default()
    })
    .unwrap();
    let analysis = api.process_file(5).await.expect("process ok");
    assert_eq!(analysis.transcript, "late but fine");
    assert_eq!(analysis.sentiment, Sentiment::default());
}
