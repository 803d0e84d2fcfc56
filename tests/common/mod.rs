//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which builds a full [`AppContext`] from a
//! config, and [`TestHarness::with_server`], which serves it on a random
//! port for HTTP-level testing. Fixtures are generated in-process.

#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::StreamExt;
use image::{ImageFormat, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use sq_core::config::Config;
use sq_server::context::AppContext;
use sq_server::router::build_router;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Test harness wrapping a fully-constructed [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            ctx: AppContext::new(config),
        }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::with_server_config(Config::default()).await
    }

    /// Start an Axum server with custom config on a random port.
    pub async fn with_server_config(config: Config) -> (Self, SocketAddr) {
        let harness = Self::with_config(config);
        let app = build_router(harness.ctx.clone(), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A smooth RGB gradient encoded as PNG.
pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .expect("encode png fixture");
    out.into_inner()
}

/// A one-page PDF with a long, uncompressed content stream.
pub fn pdf_fixture() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 10.into()]),
    ];
    for line in 0..300 {
        operations.push(Operation::new("Td", vec![0.into(), (-12).into()]));
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(format!("Quarterly report line {line}"))],
        ));
    }
    operations.push(Operation::new("ET", vec![]));
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("encode content"),
    ));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save pdf fixture");
    out
}

pub fn b64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

/// POST a conversion request and return `(status, body)`.
pub async fn post_json(addr: SocketAddr, path: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("http://{addr}{path}"))
        .json(&body)
        .send()
        .await
        .expect("request failed");
    let status = resp.status().as_u16();
    let body = resp.json().await.unwrap_or(Value::Null);
    (status, body)
}

pub async fn convert_image(addr: SocketAddr, data: &[u8], format: &str, compression: &str) -> (u16, Value) {
    post_json(
        addr,
        "/api/convert/image",
        json!({
            "data": b64(data),
            "format": format,
            "compression": compression,
            "file_name": "fixture.png",
        }),
    )
    .await
}

// ---------------------------------------------------------------------------
// WebSocket helpers
// ---------------------------------------------------------------------------

pub async fn ws_connect(addr: SocketAddr, token: Option<&str>) -> WsStream {
    let url = match token {
        Some(token) => format!("ws://{addr}/api/ws?token={token}"),
        None => format!("ws://{addr}/api/ws"),
    };
    let (ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("websocket connect failed");
    ws
}

/// Next JSON text message, skipping control frames.
pub async fn next_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(30), ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("websocket closed")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("message is not JSON");
        }
    }
}

/// Collect progress payloads up to and including the terminal one.
pub async fn collect_until_terminal(ws: &mut WsStream) -> Vec<Value> {
    let mut events = Vec::new();
    loop {
        let msg = next_json(ws).await;
        if msg["type"] != "progress" {
            continue;
        }
        let data = msg["data"].clone();
        let terminal = data.get("error").is_some() || data["progress"].as_f64() == Some(100.0);
        events.push(data);
        if terminal {
            return events;
        }
    }
}
