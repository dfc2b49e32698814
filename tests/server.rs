//! End-to-end tests: a real server on a loopback socket, driven with raw HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pathmux::context::Context;
use pathmux::http::{Method, StatusCode};
use pathmux::server::{self, Server};
use pathmux::{Dispatcher, rest};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

fn app(blog_hits: Arc<AtomicUsize>) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    dispatcher
        .static_route(
            "/blog/",
            move |ctx: &mut Context| {
                blog_hits.fetch_add(1, Ordering::SeqCst);
                ctx.write("blog");
            },
            &[Method::Get],
        )
        .static_route("/panic/", |_: &mut Context| panic!("always"), &[Method::Get])
        .static_route(
            "/json/",
            rest::wrap(|ctx: &mut Context| {
                let name = rest::json_map(ctx)
                    .ok()
                    .and_then(|map| map.get("name").and_then(|v| v.as_str()).map(str::to_owned));
                match name {
                    Some(name) => (StatusCode::CREATED, Some(serde_json::json!({ "hello": name }))),
                    None => (StatusCode::BAD_REQUEST, None),
                }
            }),
            &[Method::Post],
        );
    dispatcher
        .pattern_route(
            r"^/users/(?P<name>[a-z]+)/$",
            |ctx: &mut Context| {
                let name = ctx.param("name").unwrap_or_default().to_owned();
                ctx.write(name);
            },
            &[Method::Get],
        )
        .unwrap();
    dispatcher
}

async fn start() -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let listener = server::http_listener("127.0.0.1", 0).await.unwrap();
    let server = Server::new(listener);
    let addr = server.local_addr().unwrap();
    let dispatcher = app(Arc::clone(&hits));
    tokio::spawn(server.serve(dispatcher));
    (addr, hits)
}

async fn roundtrip<S>(mut stream: S, raw: &str) -> String
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

async fn get(addr: SocketAddr, target: &str) -> String {
    let stream = TcpStream::connect(addr).await.unwrap();
    roundtrip(stream, &format!("GET {target} HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n")).await
}

#[tokio::test]
async fn named_capture_end_to_end() {
    let (addr, _) = start().await;

    let ok = get(addr, "/users/alice/").await;
    assert!(ok.starts_with("HTTP/1.1 200 OK\r\n"), "{ok}");
    assert!(ok.ends_with("\r\n\r\nalice"));

    let missing = get(addr, "/users/Alice/").await;
    assert!(missing.starts_with("HTTP/1.1 404 Not Found\r\n"), "{missing}");
}

#[tokio::test]
async fn canonical_redirect_skips_handler() {
    let (addr, hits) = start().await;

    let out = get(addr, "/blog?page=2").await;
    assert!(out.starts_with("HTTP/1.1 301 Moved Permanently\r\n"), "{out}");
    assert!(out.contains("Location: /blog/?page=2\r\n"));
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    get(addr, "/blog/").await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn server_keeps_serving_after_panic() {
    let (addr, _) = start().await;

    let out = get(addr, "/panic/").await;
    assert!(out.starts_with("HTTP/1.1 500 Internal Server Error\r\n"), "{out}");
    assert_eq!(out.matches("HTTP/1.1").count(), 1);

    let out = get(addr, "/blog/").await;
    assert!(out.ends_with("blog"));
}

#[tokio::test]
async fn keep_alive_serves_several_requests() {
    let (addr, _) = start().await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let out = roundtrip(
        stream,
        "GET /blog/ HTTP/1.1\r\n\r\nGET /users/bob/ HTTP/1.1\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(out.matches("HTTP/1.1 200 OK").count(), 2);
    assert!(out.ends_with("bob"));
}

#[tokio::test]
async fn json_round_trip() {
    let (addr, _) = start().await;

    let body = r#"{"name":"carol"}"#;
    let stream = TcpStream::connect(addr).await.unwrap();
    let out = roundtrip(
        stream,
        &format!(
            "POST /json/ HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ),
    )
    .await;
    assert!(out.starts_with("HTTP/1.1 201 Created\r\n"), "{out}");
    assert!(out.contains("Content-Type: application/json\r\n"));
    assert!(out.ends_with(r#"{"hello":"carol"}"#));
}

#[cfg(unix)]
#[tokio::test]
async fn serves_over_unix_socket() {
    let path = std::env::temp_dir().join(format!("pathmux-it-{}.sock", std::process::id()));
    let listener = server::unix_listener(&path, 0o600).await.unwrap();
    let server = Server::new(listener);
    assert!(server.local_addr().is_none());
    tokio::spawn(server.serve(app(Arc::new(AtomicUsize::new(0)))));

    let stream = tokio::net::UnixStream::connect(&path).await.unwrap();
    let out = roundtrip(stream, "GET /users/dave/ HTTP/1.1\r\nConnection: close\r\n\r\n").await;
    assert!(out.ends_with("dave"), "{out}");

    std::fs::remove_file(&path).unwrap();
}
