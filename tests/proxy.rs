mod catalog_stub;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use catalog_stub::{CatalogStub, Reply};
use http_body_util::BodyExt as _;
use novelsearch::server::{ProxyState, router};
use tower::ServiceExt as _;

fn app(upstream: &str) -> axum::Router {
    router(ProxyState::new(upstream, Duration::from_secs(5)).expect("proxy state"))
}

async fn call(app: axum::Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes()
        .to_vec();
    (status, body)
}

fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).expect("json body")
}

#[tokio::test]
async fn forwards_non_empty_params_with_referer_and_agent() {
    let stub = CatalogStub::spawn(45);
    let request = Request::get("/api/book/searchByPage?curr=2&limit=20&keyword=&tag=%E7%99%BE%E5%90%88")
        .header(header::USER_AGENT, "test-browser/1.0")
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(app(&stub.base_url), request).await;

    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["code"], "200");
    assert_eq!(body["data"]["pageNum"], "2");

    let upstream = &stub.search_requests()[0];
    assert_eq!(upstream.query("keyword"), None);
    assert_eq!(upstream.query("tag").as_deref(), Some("百合"));
    assert_eq!(upstream.user_agent.as_deref(), Some("test-browser/1.0"));
    assert_eq!(
        upstream.referer.as_deref(),
        Some(format!("{}/?curr=2&limit=20&tag=%E7%99%BE%E5%90%88", stub.base_url).as_str())
    );
}

#[tokio::test]
async fn other_methods_are_rejected() {
    let stub = CatalogStub::spawn(45);
    let request = Request::post("/api/book/searchByPage")
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(app(&stub.base_url), request).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        json(&body),
        serde_json::json!({ "code": "405", "msg": "Method Not Allowed", "data": null })
    );
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn upstream_errors_keep_their_status() {
    let stub = CatalogStub::spawn(45);
    stub.push_reply(Reply::Status {
        status: 503,
        body: r#"{"code":"503","msg":"busy","data":null}"#.to_owned(),
    });
    stub.push_reply(Reply::Status {
        status: 502,
        body: "bad gateway".to_owned(),
    });

    let (status, body) = call(
        app(&stub.base_url),
        Request::get("/api/book/searchByPage?curr=1").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json(&body)["msg"], "busy");

    let (status, body) = call(
        app(&stub.base_url),
        Request::get("/api/book/searchByPage?curr=1").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json(&body)["code"], "502");
    assert_eq!(json(&body)["data"], serde_json::Value::Null);
}

#[tokio::test]
async fn unreachable_upstream_is_an_internal_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    let (status, body) = call(
        app(&format!("http://127.0.0.1:{port}")),
        Request::get("/api/book/searchByPage").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(&body)["code"], "500");
}

#[tokio::test]
async fn cover_images_are_forwarded() {
    let stub = CatalogStub::spawn(45);
    let request = Request::get("/localPic/covers/1.png?v=2")
        .body(Body::empty())
        .unwrap();
    let response = app(&stub.base_url).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"PNGDATA");

    assert_eq!(stub.requests()[0].url, "/localPic/covers/1.png?v=2");
}
