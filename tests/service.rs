//! HTTP-level tests for the conversion service.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot` and an
//! in-memory raster backend, so no pdfium library is needed.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{document, multipart_request, pdf_upload, FakeBackend, Part, TestApp};
use http_body_util::BodyExt;
use pdf2zip::ErrorResponse;
use std::io::{Cursor, Read};
use std::time::Duration;
use tower::ServiceExt;

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn error_body(response: axum::response::Response) -> ErrorResponse {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn three_page_pdf_returns_zip_of_pages() {
    let t = TestApp::new();
    let response = t
        .app
        .clone()
        .oneshot(pdf_upload(&document(3, None)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "application/zip");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"converted_"));
    assert!(disposition.ends_with(".zip\""));

    let bytes = body_bytes(response).await;
    assert_eq!(
        headers[header::CONTENT_LENGTH].to_str().unwrap(),
        bytes.len().to_string()
    );

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    assert_eq!(names, vec!["page-1.png", "page-2.png", "page-3.png"]);

    for name in &names {
        let mut png = Vec::new();
        archive.by_name(name).unwrap().read_to_end(&mut png).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!((img.width(), img.height()), (600, 600));
    }

    assert_eq!(t.rasterize_calls(), 3);
    assert!(t.scratch_is_empty(), "scratch directories must be empty");
}

#[tokio::test]
async fn entries_follow_page_order_not_completion_order() {
    let t = TestApp::with_backend(FakeBackend::staggered(Duration::from_millis(5)), 12);
    let response = t
        .app
        .clone()
        .oneshot(pdf_upload(&document(12, None)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Later pages finished first.
    let completed = t.backend.completion_order();
    assert_eq!(completed.len(), 12);
    assert!(
        completed.first() > completed.last(),
        "renders were not reordered: {completed:?}"
    );

    let archive = zip::ZipArchive::new(Cursor::new(body_bytes(response).await)).unwrap();
    let names: Vec<&str> = archive.file_names().collect();
    let expected: Vec<String> = (1..=12).map(|n| format!("page-{n}.png")).collect();
    assert_eq!(names, expected);
    assert!(t.scratch_is_empty());
}

#[tokio::test]
async fn header_after_leading_bytes_is_converted() {
    let t = TestApp::new();
    let response = t
        .app
        .clone()
        .oneshot(pdf_upload(b"\xEF\xBB\xBF\r\n%PDF-test\npages: 2\n"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let archive = zip::ZipArchive::new(Cursor::new(body_bytes(response).await)).unwrap();
    assert_eq!(archive.len(), 2);
    assert!(t.scratch_is_empty());
}

#[tokio::test]
async fn empty_upload_is_rejected_without_rendering() {
    let t = TestApp::new();
    let response = t.app.clone().oneshot(pdf_upload(b"")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let err = error_body(response).await;
    assert!(err.error.contains("empty"), "unexpected message: {}", err.error);
    assert_eq!(t.rasterize_calls(), 0);
    assert!(t.scratch_is_empty());
}

#[tokio::test]
async fn non_pdf_upload_is_rejected() {
    let t = TestApp::new();
    let response = t
        .app
        .clone()
        .oneshot(pdf_upload(b"GIF89a not a pdf"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(t.rasterize_calls(), 0);
    assert!(t.scratch_is_empty());
}

#[tokio::test]
async fn missing_pdf_field_is_bad_request() {
    let t = TestApp::new();
    let request = multipart_request(&[Part {
        name: "attachment",
        file_name: Some("doc.pdf"),
        body: &document(1, None),
    }]);
    let response = t.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let err = error_body(response).await;
    assert_eq!(err.error, "Please upload a PDF file.");
    assert!(t.scratch_is_empty());
}

#[tokio::test]
async fn extra_fields_before_the_pdf_are_skipped() {
    let t = TestApp::new();
    let doc = document(2, None);
    let request = multipart_request(&[
        Part {
            name: "note",
            file_name: None,
            body: b"hello",
        },
        Part {
            name: "pdf",
            file_name: Some("doc.pdf"),
            body: &doc,
        },
    ]);
    let response = t.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let archive = zip::ZipArchive::new(Cursor::new(body_bytes(response).await)).unwrap();
    assert_eq!(archive.len(), 2);
    assert!(t.scratch_is_empty());
}

#[tokio::test]
async fn non_multipart_request_is_bad_request() {
    let t = TestApp::new();
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let err = error_body(response).await;
    assert!(!err.error.is_empty());
}

#[tokio::test]
async fn failing_page_yields_server_error_and_no_leftovers() {
    let t = TestApp::new();
    let response = t
        .app
        .clone()
        .oneshot(pdf_upload(&document(5, Some(2))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let err = error_body(response).await;
    assert_eq!(err.error, "Failed to convert PDF to images.");
    // Every page was attempted before the job was abandoned.
    assert_eq!(t.rasterize_calls(), 5);
    assert!(t.scratch_is_empty());
}

#[tokio::test]
async fn dropped_download_still_cleans_up() {
    let t = TestApp::new();
    let response = t
        .app
        .clone()
        .oneshot(pdf_upload(&document(4, None)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!t.scratch_is_empty(), "archive lives until it is streamed");

    drop(response);
    assert!(t.scratch_is_empty());
}

#[tokio::test]
async fn concurrent_jobs_do_not_interfere() {
    let t = TestApp::new();
    let (a, b) = tokio::join!(
        t.app.clone().oneshot(pdf_upload(&document(2, None))),
        t.app.clone().oneshot(pdf_upload(&document(3, None))),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);

    let name_a = a.headers()[header::CONTENT_DISPOSITION].clone();
    let name_b = b.headers()[header::CONTENT_DISPOSITION].clone();
    assert_ne!(name_a, name_b);

    let zip_a = zip::ZipArchive::new(Cursor::new(body_bytes(a).await)).unwrap();
    let zip_b = zip::ZipArchive::new(Cursor::new(body_bytes(b).await)).unwrap();
    assert_eq!(zip_a.len(), 2);
    assert_eq!(zip_b.len(), 3);
    assert!(t.scratch_is_empty());
}

#[tokio::test]
async fn health_reports_version() {
    let t = TestApp::new();
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}
