use super::{Transport, TransportError};
use async_trait::async_trait;
use log::debug;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::Client;
use serde_json::Value;

// reqwest-backed transport talking to `<server>/api`
pub struct HttpTransport {
    client: Client,
    api_root: String,
}

impl HttpTransport {
    pub fn new(server: &str, token: &str) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&bearer(token))
            .map_err(|e| TransportError::Other(format!("token is not a valid header value: {}", e)))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("youtrack-votes/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_root: api_root(server),
        })
    }
}

// Permanent tokens are sent as `perm:<token>`
fn bearer(token: &str) -> String {
    if token.starts_with("perm:") {
        format!("Bearer {}", token)
    } else {
        format!("Bearer perm:{}", token)
    }
}

fn api_root(server: &str) -> String {
    let server = server.trim_end_matches('/');
    if server.ends_with("/api") {
        server.to_string()
    } else {
        format!("{}/api", server)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> Result<Value, TransportError> {
        let url = format!("{}{}", self.api_root, path);
        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() || e.is_request() {
                TransportError::Connection(e.to_string())
            } else {
                TransportError::Other(e.to_string())
            }
        })?;

        let status = response.status();
        // A dropped connection while streaming the body is still a connectivity problem
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        debug!("{} -> {} ({} bytes)", url, status, body.len());

        serde_json::from_str(&body).map_err(|e| {
            TransportError::Other(format!("HTTP {} with non-JSON body from {}: {}", status, url, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    // Serve one canned HTTP response on a local port, return the server URL
    fn serve_once(status: &str, content_type: &str, body: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            content_type,
            body.len(),
            body
        );
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn closed_port_is_a_connection_error() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let transport = HttpTransport::new(&format!("http://{}", addr), "token").unwrap();

        let err = transport.get("/issues/ABC-1").await.unwrap_err();
        assert!(matches!(err, TransportError::Connection(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn error_status_with_json_body_passes_through() {
        let server = serve_once("404 Not Found", "application/json", r#"{"error":"missing"}"#);
        let transport = HttpTransport::new(&server, "token").unwrap();

        let value = transport.get("/issues/NOPE-1").await.unwrap();
        assert_eq!(value["error"], "missing");
    }

    #[tokio::test]
    async fn non_json_body_fails_fast() {
        let server = serve_once("502 Bad Gateway", "text/html", "<html><body>bad gateway</body></html>");
        let transport = HttpTransport::new(&server, "token").unwrap();

        let err = transport.get("/issues/ABC-1").await.unwrap_err();
        match err {
            TransportError::Other(msg) => assert!(msg.contains("502"), "{}", msg),
            other => panic!("expected a non-retryable error, got {:?}", other),
        }
    }

    #[test]
    fn api_root_is_appended_once() {
        assert_eq!(api_root("https://youtrack.jetbrains.com"), "https://youtrack.jetbrains.com/api");
        assert_eq!(api_root("https://youtrack.jetbrains.com/"), "https://youtrack.jetbrains.com/api");
        assert_eq!(api_root("https://yt.example.com/api/"), "https://yt.example.com/api");
    }

    #[test]
    fn bearer_adds_perm_prefix_when_missing() {
        assert_eq!(bearer("abc"), "Bearer perm:abc");
        assert_eq!(bearer("perm:abc"), "Bearer perm:abc");
    }

    #[test]
    fn rejects_token_with_newline() {
        assert!(HttpTransport::new("https://yt.example.com", "bad\ntoken").is_err());
    }
}
