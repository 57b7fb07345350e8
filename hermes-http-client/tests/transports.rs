//! Integration tests running both transports against a mock server.

use hermes_http_client::prelude::*;
use hermes_http_client::{PreparedRequest, TransportErrorKind};
use serde_json::json;
use std::io::Write;
use std::time::Duration;
use wiremock::matchers::{body_json, body_string, header, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TRANSPORTS: [TransportKind; 2] = [TransportKind::Direct, TransportKind::Delegating];

fn client(server: &MockServer, kind: TransportKind) -> Client {
    let options = OptionSet::builder().base_uri(server.uri()).build();
    Client::builder().options(options).transport(kind).build()
}

// =============================================================================
// Request Mapping
// =============================================================================

#[tokio::test]
async fn test_get_appends_query() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/p"))
            .and(query_param("token", "123456"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client(&server, kind);
        client.configure(|b| Ok(b.query_param("token", "123456"))).unwrap();

        let response = client.get("/p").await.unwrap();
        assert_eq!(response.status_code(), 200, "{kind}");
        assert_eq!(response.text().unwrap(), "ok");
        assert_eq!(response.diagnostics().transport, kind);
        assert!(response.url().unwrap().ends_with("/p?token=123456"));
    }
}

#[tokio::test]
async fn test_json_body_with_implicit_headers() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/post"))
            .and(header("content-type", "application/json"))
            .and(header("accept", "application/json"))
            .and(body_json(json!({"os": "macOS"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"saved": true})))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client(&server, kind);
        let response = client
            .post_with("/post", |b| b.json(&json!({"os": "macOS"})))
            .await
            .unwrap();

        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["saved"], true, "{kind}");
    }
}

#[tokio::test]
async fn test_form_body() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("name=hermes&lang=rust"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client(&server, kind);
        let response = client
            .put_with("/form", |b| Ok(b.form([("name", "hermes"), ("lang", "rust")])))
            .await
            .unwrap();
        assert_eq!(response.status_code(), 204, "{kind}");
    }
}

#[tokio::test]
async fn test_multipart_body() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header_regex("content-type", "^multipart/form-data; ?boundary="))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client(&server, kind);
        let response = client
            .post_with("/upload", |b| {
                Ok(b.multipart([
                    MultipartField::text("title", "report"),
                    MultipartField::file("file", "report.txt", "contents").content_type("text/plain"),
                ]))
            })
            .await
            .unwrap();
        assert_eq!(response.status_code(), 201, "{kind}");
    }
}

#[tokio::test]
async fn test_cookies_sent_as_single_header() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("cookie", "username=alice; theme=dark"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client(&server, kind);
        client
            .configure(|b| Ok(b.cookies([("username", "alice"), ("theme", "dark")])))
            .unwrap();
        assert_eq!(client.get("/").await.unwrap().status_code(), 200, "{kind}");
    }
}

#[tokio::test]
async fn test_cookie_file_read() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("cookie", "jar=value"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# Netscape HTTP Cookie File").unwrap();
        writeln!(file, "127.0.0.1\tFALSE\t/\tFALSE\t0\tjar\tvalue").unwrap();

        let mut client = client(&server, kind);
        client.configure(|b| b.cookie_file(file.path())).unwrap();
        assert_eq!(client.get("/").await.unwrap().status_code(), 200, "{kind}");
    }
}

#[tokio::test]
async fn test_caller_cookie_header_merged_with_cookies() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("cookie", "a=1; username=alice"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client(&server, kind);
        client
            .configure(|b| Ok(b.header("Cookie", "a=1").cookie("username", "alice")))
            .unwrap();
        assert_eq!(client.get("/").await.unwrap().status_code(), 200, "{kind}");
    }
}

#[tokio::test]
async fn test_cookie_file_written_back_by_direct_only() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "fresh=1; Path=/"))
            .expect(1)
            .mount(&server)
            .await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# Netscape HTTP Cookie File").unwrap();
        writeln!(file, "127.0.0.1\tFALSE\t/\tFALSE\t0\tjar\tvalue").unwrap();
        file.flush().unwrap();
        let before = std::fs::read_to_string(file.path()).unwrap();

        let mut client = client(&server, kind);
        client.configure(|b| b.cookie_file(file.path())).unwrap();
        assert_eq!(client.get("/login").await.unwrap().status_code(), 200, "{kind}");

        let after = std::fs::read_to_string(file.path()).unwrap();
        match kind {
            TransportKind::Direct => {
                assert!(after.contains("\tfresh\t1"), "{after}");
                assert!(after.contains("\tjar\tvalue"), "{after}");
            }
            TransportKind::Delegating => assert_eq!(after, before),
        }
    }
}

#[tokio::test]
async fn test_raw_body_content_type() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("content-type", "application/octet-stream"))
            .and(body_string("raw payload"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client(&server, kind);
        let response = client
            .post_with("/upload", |b| Ok(b.body("raw payload")))
            .await
            .unwrap();
        assert_eq!(response.status_code(), 200, "{kind}");
    }
}

#[tokio::test]
async fn test_basic_auth() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client(&server, kind);
        client.configure(|b| Ok(b.basic_auth("user", "pass"))).unwrap();
        assert_eq!(client.get("/").await.unwrap().status_code(), 200, "{kind}");
    }
}

#[tokio::test]
async fn test_interceptor_runs_for_every_transport() {
    struct Stamp;

    #[async_trait::async_trait]
    impl Interceptor for Stamp {
        async fn before_dispatch(&self, request: &mut PreparedRequest) -> Result<()> {
            request.headers.set("X-Stamp", "hermes");
            Ok(())
        }
    }

    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(header("x-stamp", "hermes"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client(&server, kind)
            .with_interceptor(Stamp)
            .with_interceptor(LoggingInterceptor::new().with_headers());
        assert_eq!(client.get("/").await.unwrap().status_code(), 200, "{kind}");
    }
}

// =============================================================================
// Response Reconstruction
// =============================================================================

#[tokio::test]
async fn test_duplicate_response_headers() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .append_header("x-dup", "first")
                    .append_header("x-dup", "second")
                    .set_body_string("hello"),
            )
            .mount(&server)
            .await;

        let response = client(&server, kind).get("/").await.unwrap();
        assert_eq!(response.header("X-Dup"), Some("second"), "{kind}");
        assert_eq!(response.header_all("x-dup"), vec!["first", "second"]);
        assert_eq!(response.bytes().as_ref(), b"hello");
    }
}

#[tokio::test]
async fn test_head_has_no_body() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).insert_header("x-head", "1"))
            .expect(1)
            .mount(&server)
            .await;

        let response = client(&server, kind).head("/").await.unwrap();
        assert_eq!(response.header("x-head"), Some("1"), "{kind}");
        assert!(response.bytes().is_empty());
    }
}

#[tokio::test]
async fn test_header_info_keeps_header_block() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body"))
            .mount(&server)
            .await;

        let mut client = client(&server, kind);
        client.configure(|b| Ok(b.header_info(true))).unwrap();

        let response = client.get("/").await.unwrap();
        let text = response.text().unwrap();
        assert!(text.starts_with("HTTP/1.1 200"), "{kind}: {text}");
        assert!(text.ends_with("\r\n\r\nbody"));
        assert_eq!(response.status_code(), 200);
    }
}

// =============================================================================
// Redirects
// =============================================================================

#[tokio::test]
async fn test_redirects_not_followed_by_default() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(path("/start"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/end"))
            .mount(&server)
            .await;

        let response = client(&server, kind).get("/start").await.unwrap();
        assert_eq!(response.status_code(), 302, "{kind}");
        assert_eq!(response.header("location"), Some("/end"));
    }
}

#[tokio::test]
async fn test_redirects_followed_and_tracked() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(path("/start"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/end"))
            .mount(&server)
            .await;
        Mock::given(path("/end"))
            .respond_with(ResponseTemplate::new(200).set_body_string("done"))
            .mount(&server)
            .await;

        let mut client = client(&server, kind);
        client
            .configure(|b| {
                Ok(b.follow_redirects(RedirectOptions {
                    track_hops: true,
                    ..Default::default()
                }))
            })
            .unwrap();

        let response = client.get("/start").await.unwrap();
        assert_eq!(response.status_code(), 200, "{kind}");
        assert_eq!(response.text().unwrap(), "done");
        assert_eq!(response.diagnostics().redirect_count, 1);
        assert_eq!(response.diagnostics().redirect_hops.len(), 1);
        assert!(response.diagnostics().redirect_hops[0].ends_with("/end"));
        assert!(response.url().unwrap().ends_with("/end"));
    }
}

#[tokio::test]
async fn test_followed_redirect_keeps_final_headers_only() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(path("/start"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", "/end")
                    .insert_header("x-hop-only", "302"),
            )
            .mount(&server)
            .await;
        Mock::given(path("/end"))
            .respond_with(ResponseTemplate::new(200).insert_header("x-final", "200"))
            .mount(&server)
            .await;

        let mut client = client(&server, kind);
        client.configure(|b| Ok(b.redirect(RedirectPolicy::follow()))).unwrap();

        let response = client.get("/start").await.unwrap();
        assert_eq!(response.status_code(), 200, "{kind}");
        assert_eq!(response.header("x-hop-only"), None, "{kind}");
        assert_eq!(response.header("location"), None, "{kind}");
        assert_eq!(response.header("x-final"), Some("200"), "{kind}");
    }
}

#[tokio::test]
async fn test_redirect_limit() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(path("/loop"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
            .mount(&server)
            .await;

        let mut client = client(&server, kind);
        client
            .configure(|b| Ok(b.redirect(RedirectPolicy::limited(2))))
            .unwrap();

        let err = client.get("/loop").await.unwrap_err();
        assert!(err.is_transport(), "{kind}: {err}");
        assert_eq!(
            client.last_error().map(|e| e.kind()),
            Some(TransportErrorKind::Redirect)
        );
    }
}

// =============================================================================
// Error Policy
// =============================================================================

#[tokio::test]
async fn test_http_errors_policy() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let mut client = client(&server, kind);
        let response = client.get("/").await.unwrap();
        assert_eq!(response.status_code(), 500, "{kind}");

        let err = client
            .get_with("/", |b| Ok(b.http_errors(true)))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert!(client.last_error().is_none());
    }
}

#[tokio::test]
async fn test_connection_refused() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    for kind in TRANSPORTS {
        let mut client = Client::default().with_transport(kind);
        let err = client
            .get(&format!("http://127.0.0.1:{port}/"))
            .await
            .unwrap_err();

        assert!(err.is_connection(), "{kind}: {err}");
        let recorded = client.last_error().unwrap();
        assert_eq!(recorded.transport(), kind);
        assert_eq!(recorded.kind(), TransportErrorKind::Connect);
    }
}

#[tokio::test]
async fn test_timeout() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let mut client = client(&server, kind);
        client
            .configure(|b| Ok(b.timeout(Duration::from_millis(300))))
            .unwrap();

        let err = client.get("/").await.unwrap_err();
        assert!(err.is_timeout(), "{kind}: {err}");
    }
}

#[tokio::test]
async fn test_configuration_errors_before_io() {
    for kind in TRANSPORTS {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut client = client(&server, kind);
        let err = client
            .get_with("/", |b| b.protocol_version("9.9"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unsupported protocol version value: 9.9");

        let err = client.dispatch_named("FETCH", "/").await.unwrap_err();
        assert!(matches!(err, HttpClientError::MethodNotFound(_)));
    }

    let mut client = Client::default();
    let err = client.get("").await.unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn test_delegating_rejects_unmapped_options() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut client = client(&server, TransportKind::Delegating);
    let err = client
        .get_with("/", |b| Ok(b.digest_auth("user", "pass")))
        .await
        .unwrap_err();
    assert!(err.is_configuration(), "{err}");

    let err = client
        .get_with("/", |b| Ok(b.protocol(ProtocolVersion::Http3Only)))
        .await
        .unwrap_err();
    assert!(err.is_configuration(), "{err}");
}
