//! Unit tests for the HTTP token fetcher
//!
//! Each test serves a single canned response from a local socket.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use ftoken::{FetchError, FetchRequest, HttpTokenFetcher, TokenFetcher};

/// Serves one response and returns the raw request it received
async fn serve_once(
    status_line: &'static str,
    body: &'static str,
) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let response = format!(
            "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;

        String::from_utf8_lossy(&request).to_lowercase()
    });

    (format!("http://{}", addr), handle)
}

/// Local requests must not go through an ambient proxy
fn fetcher() -> HttpTokenFetcher {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .no_proxy()
        .build()
        .unwrap();
    HttpTokenFetcher::with_client(client)
}

fn request(base: &str, wrap: &str) -> FetchRequest {
    FetchRequest {
        token_field_id: "fieldA".to_string(),
        url: format!("{}/ftoken/abc123/fieldA/formA", base),
        wrap: wrap.to_string(),
    }
}

#[tokio::test]
async fn test_fetch_success() {
    let (base, server) = serve_once(
        "HTTP/1.1 200 OK",
        r#"{"name": "ftoken.1700000240", "value": "tok", "fetch_id": "fieldA", "form_id": "formA"}"#,
    )
    .await;
    let fetcher = fetcher();

    let token = fetcher.fetch(&request(&base, "wrapA")).await.unwrap();

    assert_eq!(token.name, "ftoken.1700000240");
    assert_eq!(token.value, "tok");

    let raw = server.await.unwrap();
    assert!(raw.starts_with("get /ftoken/abc123/fielda/forma http/1.1"));
    assert!(raw.contains("x-requested-with: xmlhttprequest"));
    assert!(raw.contains("x-ftoken-wrap: wrapa"));
}

#[tokio::test]
async fn test_fetch_without_wrap_omits_header() {
    let (base, server) =
        serve_once("HTTP/1.1 200 OK", r#"{"name": "ftoken.1", "value": "tok"}"#).await;
    let fetcher = fetcher();

    fetcher.fetch(&request(&base, "")).await.unwrap();

    let raw = server.await.unwrap();
    assert!(!raw.contains("x-ftoken-wrap"));
}

#[tokio::test]
async fn test_fetch_forbidden() {
    let (base, _server) = serve_once("HTTP/1.1 403 Forbidden", "{}").await;
    let fetcher = fetcher();

    let result = fetcher.fetch(&request(&base, "")).await;

    assert_eq!(result, Err(FetchError::Status(403)));
}

#[tokio::test]
async fn test_fetch_malformed_body() {
    let (base, _server) = serve_once("HTTP/1.1 200 OK", "<div>nope</div>").await;
    let fetcher = fetcher();

    let result = fetcher.fetch(&request(&base, "")).await;

    assert!(matches!(result, Err(FetchError::Decode(_))));
}

#[tokio::test]
async fn test_fetch_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let fetcher = fetcher();

    let result = fetcher.fetch(&request(&base, "")).await;

    assert!(matches!(result, Err(FetchError::Transport(_))));
}
