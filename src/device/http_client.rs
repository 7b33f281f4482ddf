//! Blocking HTTP client for a gateway's `/authorize` and `/event` endpoints.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::client::{AuthorityClient, ClientError};
use crate::config::GatewayEndpoint;
use crate::protocol::{AuthorizationRequest, AuthorizationResponse, EventAck, EventNotification};

pub struct HttpAuthorityClient {
    site_id: String,
    authorize_url: String,
    event_url: String,
    client: Client,
}

impl HttpAuthorityClient {
    /// Creates a client whose every request is bounded by `timeout`.
    pub fn new(endpoint: &GatewayEndpoint, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|_| ClientError::Transport)?;
        Ok(Self {
            site_id: endpoint.site_id.clone(),
            authorize_url: format!("{}/authorize", endpoint.url),
            event_url: format!("{}/event", endpoint.url),
            client,
        })
    }

    fn post_json<B: Serialize, R: DeserializeOwned>(&self, url: &str, body: &B) -> Result<R, ClientError> {
        let resp = self.client.post(url).json(body).send().map_err(map_send_error)?;
        if !resp.status().is_success() {
            log::debug!("[{}] {} -> {}", self.site_id, url, resp.status());
            return Err(ClientError::Rejected);
        }
        resp.json::<R>().map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout
            } else {
                ClientError::InvalidResponse
            }
        })
    }
}

fn map_send_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Transport
    }
}

impl AuthorityClient for HttpAuthorityClient {
    fn site_id(&self) -> &str {
        &self.site_id
    }

    fn authorize(&self, request: &AuthorizationRequest) -> Result<AuthorizationResponse, ClientError> {
        self.post_json(&self.authorize_url, request)
    }

    fn send_event(&self, event: &EventNotification) -> Result<EventAck, ClientError> {
        self.post_json(&self.event_url, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serves exactly one canned HTTP response on a loopback port.
    fn one_shot_server(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                let reply = format!(
                    "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = stream.write_all(reply.as_bytes());
            }
        });
        format!("http://{}", addr)
    }

    /// Accepts one connection and never answers.
    fn silent_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                thread::sleep(Duration::from_secs(3));
                drop(stream);
            }
        });
        format!("http://{}", addr)
    }

    fn request() -> AuthorizationRequest {
        AuthorizationRequest {
            dev_id: "esp32-001".into(),
            ts: 1,
            sig: "00".into(),
        }
    }

    #[test]
    fn test_urls() {
        let client = HttpAuthorityClient::new(
            &GatewayEndpoint::new("A", "http://gw:8080/"),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.site_id(), "A");
        assert_eq!(client.authorize_url, "http://gw:8080/authorize");
        assert_eq!(client.event_url, "http://gw:8080/event");
    }

    #[test]
    fn test_granted_response() {
        let url = one_shot_server("200 OK", r#"{"ok":true,"site":"A","share_b64":"AQID"}"#);
        let client = HttpAuthorityClient::new(&GatewayEndpoint::new("A", &url), Duration::from_secs(5)).unwrap();
        let resp = client.authorize(&request()).unwrap();
        assert_eq!(resp.share().unwrap().as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn test_rejection_status() {
        let url = one_shot_server("403 Forbidden", r#"{"ok":false,"error":"authorization denied"}"#);
        let client = HttpAuthorityClient::new(&GatewayEndpoint::new("A", &url), Duration::from_secs(5)).unwrap();
        assert_eq!(client.authorize(&request()).unwrap_err(), ClientError::Rejected);
    }

    #[test]
    fn test_timeout() {
        let url = silent_server();
        let client = HttpAuthorityClient::new(&GatewayEndpoint::new("A", &url), Duration::from_millis(200)).unwrap();
        assert_eq!(client.authorize(&request()).unwrap_err(), ClientError::Timeout);
    }

    #[test]
    fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = HttpAuthorityClient::new(
            &GatewayEndpoint::new("A", &format!("http://{}", addr)),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.authorize(&request()).unwrap_err(), ClientError::Transport);
    }

    #[test]
    fn test_event_acknowledged() {
        let url = one_shot_server("200 OK", r#"{"ok":true}"#);
        let client = HttpAuthorityClient::new(&GatewayEndpoint::new("B", &url), Duration::from_secs(5)).unwrap();
        let evt = EventNotification {
            dev_id: "esp32-001".into(),
            event_type: "BOOT_LOCKED".into(),
            ts: 1,
            sig: "00".into(),
        };
        assert_eq!(client.send_event(&evt).unwrap(), EventAck { ok: true });
    }

    #[cfg(feature = "server")]
    #[test]
    fn test_round_trip_against_gateway_router() {
        use crate::config::GatewayConfig;
        use crate::gateway::{http, Gateway};
        use crate::mac::SigningSecret;
        use crate::notify::MemoryNotifier;
        use crate::protocol::EventType;
        use crate::sharing::KeyShare;
        use std::sync::Arc;

        let secret = SigningSecret::from("s3cret");
        let share = KeyShare::new(vec![7u8; 32]).unwrap();
        let notes = Arc::new(MemoryNotifier::new());
        let config = GatewayConfig::new("A", secret.clone())
            .allow("esp32-001")
            .with_share(share.clone());
        let app = http::router(Arc::new(Gateway::new(config).with_notifier(notes.clone())));

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, app).await.unwrap();
            });
        });

        let client = HttpAuthorityClient::new(
            &GatewayEndpoint::new("A", &format!("http://{}", addr)),
            Duration::from_secs(5),
        )
        .unwrap();

        let req = AuthorizationRequest::signed(&secret, "esp32-001", 10, "A").unwrap();
        assert_eq!(client.authorize(&req).unwrap().share().unwrap(), share);

        let intruder = AuthorizationRequest::signed(&secret, "esp32-999", 10, "A").unwrap();
        assert_eq!(client.authorize(&intruder).unwrap_err(), ClientError::Rejected);

        let evt = EventNotification::signed(&secret, "esp32-001", EventType::MountOk, 11, "A").unwrap();
        assert_eq!(client.send_event(&evt).unwrap(), EventAck { ok: true });

        let forged = EventNotification::signed(&SigningSecret::from("x"), "esp32-001", EventType::MountOk, 11, "A").unwrap();
        assert_eq!(client.send_event(&forged).unwrap_err(), ClientError::Rejected);

        assert!(notes.messages().iter().any(|m| m.contains("- type: MOUNT_OK")));
    }
}
