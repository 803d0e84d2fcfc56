//! Integration tests for the conversion and download endpoints.

mod common;

use common::{b64, convert_image, pdf_fixture, png_fixture, post_json, TestHarness};
use serde_json::json;
use sq_core::config::Config;

fn ratio_value(body: &serde_json::Value) -> f64 {
    body["ratio"]
        .as_str()
        .unwrap()
        .trim_end_matches('%')
        .parse()
        .unwrap()
}

#[tokio::test]
async fn large_png_to_jpeg_at_high_compression() {
    let (h, addr) = TestHarness::with_server().await;
    let input = png_fixture(1000, 1000);

    let (status, body) = convert_image(addr, &input, "jpeg", "high").await;
    assert_eq!(status, 200, "body: {body}");

    assert_eq!(body["original_size"], input.len());
    assert_eq!(body["content_type"], "image/jpeg");
    assert_eq!(body["file_name"], "fixture.jpg");
    assert!(body["ratio"].as_str().unwrap().ends_with('%'));
    assert!(ratio_value(&body) > 0.0);

    let id = body["id"].as_str().unwrap();
    assert_eq!(body["download_url"], format!("/api/download/{id}"));
    assert_eq!(h.ctx.store.len(), 1);

    let resp = reqwest::get(format!("http://{addr}/api/download/{id}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "image/jpeg");
    assert_eq!(resp.headers()["cache-control"], "no-store");
    assert!(resp.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .contains("fixture.jpg"));

    let bytes = resp.bytes().await.unwrap();
    assert_eq!(bytes.len() as u64, body["result_size"].as_u64().unwrap());
    assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Jpeg);
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (1000, 1000));
}

#[tokio::test]
async fn every_output_format_round_trips() {
    let (_h, addr) = TestHarness::with_server().await;
    let input = png_fixture(48, 32);

    for (format, mime) in [
        ("jpg", "image/jpeg"),
        ("png", "image/png"),
        ("webp", "image/webp"),
        ("avif", "image/avif"),
    ] {
        let (status, body) = convert_image(addr, &input, format, "medium").await;
        assert_eq!(status, 200, "{format}: {body}");
        assert_eq!(body["content_type"], mime);
    }
}

#[tokio::test]
async fn data_url_and_max_dimension_are_honoured() {
    let (_h, addr) = TestHarness::with_server().await;
    let data_url = format!("data:image/png;base64,{}", b64(&png_fixture(400, 200)));

    let (status, body) = post_json(
        addr,
        "/api/convert/image",
        json!({ "data": data_url, "format": "png", "max_dimension": 100 }),
    )
    .await;
    assert_eq!(status, 200, "body: {body}");
    assert_eq!(body["file_name"], "image.png");

    let bytes = reqwest::get(format!("http://{addr}{}", body["download_url"].as_str().unwrap()))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (100, 50));
}

#[tokio::test]
async fn pdf_is_compressed() {
    let (_h, addr) = TestHarness::with_server().await;
    let input = pdf_fixture();

    let (status, body) = post_json(
        addr,
        "/api/convert/pdf",
        json!({ "data": b64(&input), "compression": "high", "file_name": "report.pdf" }),
    )
    .await;
    assert_eq!(status, 200, "body: {body}");
    assert_eq!(body["content_type"], "application/pdf");
    assert_eq!(body["file_name"], "report.pdf");
    assert!(body["result_size"].as_u64().unwrap() < input.len() as u64);
    assert!(ratio_value(&body) > 0.0);

    let bytes = reqwest::get(format!("http://{addr}{}", body["download_url"].as_str().unwrap()))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
    let doc = lopdf::Document::load_mem(&bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
}

#[tokio::test]
async fn download_twice_within_grace_succeeds() {
    let (_h, addr) = TestHarness::with_server().await;
    let (_, body) = convert_image(addr, &png_fixture(16, 16), "webp", "low").await;
    let url = format!("http://{addr}{}", body["download_url"].as_str().unwrap());

    assert_eq!(reqwest::get(&url).await.unwrap().status(), 200);
    assert_eq!(reqwest::get(&url).await.unwrap().status(), 200);
}

#[tokio::test]
async fn download_after_grace_is_gone() {
    let mut config = Config::default();
    config.artifacts.grace_secs = 0;
    let (h, addr) = TestHarness::with_server_config(config).await;

    let (_, body) = convert_image(addr, &png_fixture(16, 16), "png", "medium").await;
    let url = format!("http://{addr}{}", body["download_url"].as_str().unwrap());

    assert_eq!(reqwest::get(&url).await.unwrap().status(), 200);
    let second = reqwest::get(&url).await.unwrap();
    assert_eq!(second.status(), 404);
    assert!(h.ctx.store.is_empty());
}

#[tokio::test]
async fn fabricated_id_is_404() {
    let (_h, addr) = TestHarness::with_server().await;

    for id in ["00000000-0000-0000-0000-000000000000", "definitely-not-an-id"] {
        let resp = reqwest::get(format!("http://{addr}/api/download/{id}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "not_found");
        assert!(body["request_id"].is_string());
    }
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let (h, addr) = TestHarness::with_server().await;

    let (status, body) = post_json(addr, "/api/convert/image", json!({ "data": "", "format": "png" })).await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "validation_error");

    let (status, _) = post_json(addr, "/api/convert/image", json!({ "format": "png" })).await;
    assert_eq!(status, 400);

    let (status, _) = post_json(addr, "/api/convert/image", json!({ "data": "%%%", "format": "png" })).await;
    assert_eq!(status, 400);

    let (status, body) = convert_image(addr, &png_fixture(8, 8), "tiff", "medium").await;
    assert_eq!(status, 415);
    assert_eq!(body["code"], "unsupported_format");

    assert!(h.ctx.store.is_empty());
}

#[tokio::test]
async fn unrecognised_input_is_415() {
    let (_h, addr) = TestHarness::with_server().await;

    let (status, body) = convert_image(addr, b"just some text", "png", "medium").await;
    assert_eq!(status, 415, "body: {body}");

    let (status, _) = post_json(
        addr,
        "/api/convert/pdf",
        json!({ "data": b64(&png_fixture(8, 8)) }),
    )
    .await;
    assert_eq!(status, 415);
}

#[tokio::test]
async fn corrupt_image_is_codec_failure() {
    let (h, addr) = TestHarness::with_server().await;
    let mut data = png_fixture(64, 64);
    data.truncate(50);

    let (status, body) = convert_image(addr, &data, "jpeg", "medium").await;
    assert_eq!(status, 500);
    assert_eq!(body["code"], "codec_failure");
    assert!(h.ctx.store.is_empty());
}

#[tokio::test]
async fn oversized_payload_is_413() {
    let mut config = Config::default();
    config.uploads.max_bytes = 1024;
    let (_h, addr) = TestHarness::with_server_config(config).await;

    let (status, body) = convert_image(addr, &vec![7u8; 5000], "jpeg", "medium").await;
    assert_eq!(status, 413, "body: {body}");
    assert_eq!(body["code"], "size_limit_exceeded");
}

#[tokio::test]
async fn concurrent_conversions_get_distinct_ids() {
    let (h, addr) = TestHarness::with_server().await;
    let input = png_fixture(64, 64);

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..10 {
        let input = input.clone();
        tasks.spawn(async move { convert_image(addr, &input, "webp", "medium").await });
    }

    let mut ids = std::collections::HashSet::new();
    while let Some(joined) = tasks.join_next().await {
        let (status, body) = joined.unwrap();
        assert_eq!(status, 200);
        ids.insert(body["id"].as_str().unwrap().to_string());
    }
    assert_eq!(ids.len(), 10);
    assert_eq!(h.ctx.store.len(), 10);
}
