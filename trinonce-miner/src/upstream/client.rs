//! HTTP client for the puzzle server.
//!
//! The server exposes exactly two endpoints, `GET /next` and `POST /add`,
//! both JSON. Requests go out as HTTP/1.0 with an explicit `Host` header,
//! which rules out chunked responses and keep-alive: the response body is
//! whatever arrives before the server closes the connection. Every request
//! opens a fresh connection and runs under a hard timeout.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::tracing::prelude::*;
use crate::upstream::messages::{Block, PuzzleHeader};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for one upstream puzzle server.
pub struct UpstreamClient {
    /// Authority component of the base url, sent as the `Host` header.
    authority: String,
    /// Socket address to connect to, with the port made explicit.
    addr: String,
    /// Optional path prefix in front of the endpoint paths.
    base_path: String,
}

impl UpstreamClient {
    /// Parse a base url of the form `http://host[:port][/path]`.
    pub fn new(url: &str) -> Result<Self> {
        let (authority, addr, base_path) = parse_base_url(url)?;
        Ok(Self {
            authority,
            addr,
            base_path,
        })
    }

    /// Fetch the header the server wants mined next.
    pub async fn next_header(&self) -> Result<PuzzleHeader> {
        debug!(addr = %self.addr, "Fetching next header");
        let response = self.request("GET", "/next", None).await?;
        if response.status != 200 {
            return Err(Error::Upstream(format!(
                "GET /next returned status {}: {}",
                response.status,
                String::from_utf8_lossy(&response.body).trim()
            )));
        }
        serde_json::from_slice(&response.body)
            .map_err(|e| Error::Header(format!("GET /next returned malformed JSON: {}", e)))
    }

    /// Submit a solved block. Returns the server's reply text.
    pub async fn submit(&self, block: &Block) -> Result<String> {
        let body = serde_json::to_vec(block)
            .map_err(|e| Error::Upstream(format!("failed to encode block: {}", e)))?;

        debug!(addr = %self.addr, "Submitting solved block");
        let response = self.request("POST", "/add", Some(&body)).await?;
        let reply = String::from_utf8_lossy(&response.body).trim().to_string();
        if response.status != 200 {
            return Err(Error::Upstream(format!(
                "POST /add returned status {}: {}",
                response.status, reply
            )));
        }
        Ok(reply)
    }

    async fn request(&self, method: &str, path: &str, body: Option<&[u8]>) -> Result<HttpResponse> {
        let exchange = self.exchange(method, path, body);
        tokio::time::timeout(REQUEST_TIMEOUT, exchange)
            .await
            .map_err(|_| Error::Upstream(format!("{} {} timed out", method, path)))?
    }

    async fn exchange(&self, method: &str, path: &str, body: Option<&[u8]>) -> Result<HttpResponse> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| Error::Upstream(format!("connect {}: {}", self.addr, e)))?;

        let full_path = format!("{}{}", self.base_path, path);
        let request = build_request(method, &full_path, &self.authority, body);
        stream
            .write_all(&request)
            .await
            .map_err(|e| Error::Upstream(format!("send {} {}: {}", method, path, e)))?;

        let mut raw = Vec::new();
        stream
            .read_to_end(&mut raw)
            .await
            .map_err(|e| Error::Upstream(format!("read {} {}: {}", method, path, e)))?;

        parse_response(&raw)
    }
}

struct HttpResponse {
    status: u16,
    body: Vec<u8>,
}

fn parse_base_url(url: &str) -> Result<(String, String, String)> {
    let rest = url
        .strip_prefix("http://")
        .ok_or_else(|| Error::Upstream(format!("unsupported upstream url: {}", url)))?;

    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], rest[i..].trim_end_matches('/')),
        None => (rest, ""),
    };
    if authority.is_empty() {
        return Err(Error::Upstream(format!("upstream url has no host: {}", url)));
    }

    let addr = if authority.contains(':') {
        authority.to_string()
    } else {
        format!("{}:80", authority)
    };
    Ok((authority.to_string(), addr, path.to_string()))
}

fn build_request(method: &str, path: &str, host: &str, body: Option<&[u8]>) -> Vec<u8> {
    let mut request = format!(
        "{} {} HTTP/1.0\r\nHost: {}\r\nAccept: application/json\r\n",
        method, path, host
    )
    .into_bytes();

    if let Some(body) = body {
        request.extend_from_slice(
            format!(
                "Content-Type: application/json\r\nContent-Length: {}\r\n",
                body.len()
            )
            .as_bytes(),
        );
    }
    request.extend_from_slice(b"\r\n");
    if let Some(body) = body {
        request.extend_from_slice(body);
    }
    request
}

fn parse_response(raw: &[u8]) -> Result<HttpResponse> {
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or_else(|| Error::Upstream("response missing header terminator".to_string()))?;
    let body = raw[split + 4..].to_vec();

    let head = &raw[..split];
    let status_line = head.split(|&b| b == b'\r').next().unwrap_or(head);
    let status_line = std::str::from_utf8(status_line)
        .map_err(|_| Error::Upstream("response status line is not UTF-8".to_string()))?;

    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| Error::Upstream(format!("malformed status line: {}", status_line)))?;

    Ok(HttpResponse { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HeaderPrefix, Triple};
    use tokio::net::TcpListener;

    #[test]
    fn test_base_url_parsing() {
        let (authority, addr, base_path) =
            parse_base_url("http://coin.example.edu:8080").unwrap();
        assert_eq!(authority, "coin.example.edu:8080");
        assert_eq!(addr, "coin.example.edu:8080");
        assert_eq!(base_path, "");

        // Default port and a trailing slash.
        let (authority, addr, base_path) = parse_base_url("http://coin.example.edu/").unwrap();
        assert_eq!(authority, "coin.example.edu");
        assert_eq!(addr, "coin.example.edu:80");
        assert_eq!(base_path, "");

        let (_, _, base_path) = parse_base_url("http://coin.example.edu/testnet").unwrap();
        assert_eq!(base_path, "/testnet");

        assert!(parse_base_url("https://coin.example.edu").is_err());
        assert!(parse_base_url("coin.example.edu").is_err());
        assert!(parse_base_url("http:///next").is_err());
    }

    #[test]
    fn test_request_formatting() {
        let get = build_request("GET", "/next", "coin.example.edu:8080", None);
        let get = String::from_utf8(get).unwrap();
        assert!(get.starts_with("GET /next HTTP/1.0\r\n"));
        assert!(get.contains("Host: coin.example.edu:8080\r\n"));
        assert!(get.ends_with("\r\n\r\n"));
        assert!(!get.contains("Content-Length"));

        let post = build_request("POST", "/add", "coin.example.edu", Some(b"{\"a\":1}"));
        let post = String::from_utf8(post).unwrap();
        assert!(post.starts_with("POST /add HTTP/1.0\r\n"));
        assert!(post.contains("Content-Type: application/json\r\n"));
        assert!(post.contains("Content-Length: 7\r\n"));
        assert!(post.ends_with("\r\n\r\n{\"a\":1}"));
    }

    #[test]
    fn test_response_parsing() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"x\":1}";
        let response = parse_response(raw).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"{\"x\":1}");

        let raw = b"HTTP/1.0 400 Bad Request\r\n\r\nheader too old";
        let response = parse_response(raw).unwrap();
        assert_eq!(response.status, 400);
        assert_eq!(response.body, b"header too old");

        // Empty body is a complete response.
        let response = parse_response(b"HTTP/1.0 200 OK\r\n\r\n").unwrap();
        assert!(response.body.is_empty());

        assert!(parse_response(b"HTTP/1.0 200 OK\r\n").is_err());
        assert!(parse_response(b"garbage\r\n\r\n").is_err());
    }

    /// Serve one canned HTTP response on a loopback listener, returning the
    /// raw request bytes that arrived.
    async fn serve_once(listener: TcpListener, status_line: &str, body: &str) -> String {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 4096];
        let n = stream.read(&mut buf).await.unwrap();

        let response = format!(
            "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();

        String::from_utf8_lossy(&buf[..n]).to_string()
    }

    #[tokio::test]
    async fn test_next_header_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let body = format!(
            "{{\"parentid\":\"{}\",\"root\":\"{}\",\"difficulty\":36,\
             \"timestamp\":1461000000000000000,\"nonces\":[0,0,0],\"version\":0}}",
            "ab".repeat(32),
            "cd".repeat(32)
        );
        let server = tokio::spawn(async move { serve_once(listener, "HTTP/1.0 200 OK", &body).await });

        let client = UpstreamClient::new(&format!("http://{}", addr)).unwrap();
        let header = client.next_header().await.unwrap();
        assert_eq!(header.difficulty, 36);
        assert_eq!(header.parentid, "ab".repeat(32));

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /next HTTP/1.0\r\n"));
    }

    #[tokio::test]
    async fn test_submit_surfaces_rejection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            serve_once(listener, "HTTP/1.0 400 Bad Request", "difficulty too low").await
        });

        let prefix = HeaderPrefix {
            parent_id: [0; 32],
            root: [0; 32],
            difficulty: 1,
            timestamp: 0,
            version: 0,
        };
        let triple = Triple {
            nonce_a: 1,
            nonce_b: 2,
            nonce_c: 3,
        };
        let block = Block {
            header: PuzzleHeader::from_solution(&prefix, &triple),
            block: "test".to_string(),
        };

        let client = UpstreamClient::new(&format!("http://{}", addr)).unwrap();
        let err = client.submit(&block).await.unwrap_err();
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("difficulty too low"));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /add HTTP/1.0\r\n"));
        assert!(request.contains("Content-Length:"));
    }
}
