use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::Request;
use serial_test::serial;
use tipfy::http_helpers::{CookieArgs, Response};
use tipfy::{Rule, TipfyFactory, handler_fn};
use tipfy_axum::{AxumAdapter, AxumRouteAdapter, BodyTooLarge};

fn app(debug: bool) -> tipfy::Tipfy {
    TipfyFactory::new()
        .debug(debug)
        .rules(vec![
            Rule::new("/echo/<name>").name("echo").handler("echo"),
            Rule::new("/fail").name("fail").handler("fail"),
        ])
        .register_handler_factory("echo", || {
            Box::new(handler_fn(&["get", "post"], |_, cx, args| {
                Ok(format!(
                    "{} {} q={} body={}",
                    cx.request.method,
                    args["name"],
                    cx.request.args.get("q").unwrap_or_default(),
                    cx.request.text()
                )
                .into())
            }))
        })
        .register_handler_factory("fail", || {
            Box::new(handler_fn(&["get"], |_, _, _| {
                Err(anyhow::anyhow!("database is gone").into())
            }))
        })
        .create()
        .unwrap()
}

// ============================================================
// Request and response conversion
// ============================================================

#[tokio::test]
async fn test_adapt_request_fills_environ() {
    let request = Request::builder()
        .method("POST")
        .uri("/people/calvin%20h?page=2")
        .header("host", "example.com:8080")
        .header("x-forwarded-for", "10.0.0.1")
        .header("cookie", "a=1; b=2")
        .body(Body::from("hello"))
        .unwrap();

    let environ = AxumRouteAdapter::adapt_request(request).await.unwrap();

    assert_eq!(environ.method, "POST");
    assert_eq!(environ.host, "example.com:8080");
    assert_eq!(environ.path_info, "/people/calvin h");
    assert_eq!(environ.query_string, "page=2");
    assert_eq!(environ.body, b"hello");
    assert_eq!(environ.remote_addr.as_deref(), Some("10.0.0.1"));
    assert_eq!(environ.get_header("Cookie"), Some("a=1; b=2"));
}

#[tokio::test]
async fn test_scheme_follows_forwarded_proto() {
    let request = Request::builder()
        .uri("/echo/x")
        .header("host", "example.com")
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .unwrap();
    let environ = AxumRouteAdapter::adapt_request(request).await.unwrap();
    assert_eq!(environ.url_scheme, "https");

    let request = Request::builder()
        .uri("https://example.com/echo/x")
        .body(Body::empty())
        .unwrap();
    let environ = AxumRouteAdapter::adapt_request(request).await.unwrap();
    assert_eq!(environ.url_scheme, "https");
    assert_eq!(environ.host, "example.com");

    let request = Request::builder()
        .uri("/echo/x")
        .header("host", "example.com")
        .header("x-forwarded-proto", "gopher")
        .body(Body::empty())
        .unwrap();
    let environ = AxumRouteAdapter::adapt_request(request).await.unwrap();
    assert_eq!(environ.url_scheme, "http");
}

#[tokio::test]
async fn test_body_over_the_limit_is_refused() {
    let request = Request::builder()
        .method("POST")
        .uri("/echo/x")
        .header("host", "localhost")
        .body(Body::from("x".repeat(64)))
        .unwrap();
    let error = AxumRouteAdapter::adapt_request_with_limit(request, 16)
        .await
        .unwrap_err();
    assert_eq!(error.downcast_ref::<BodyTooLarge>(), Some(&BodyTooLarge { limit: 16 }));

    let request = Request::builder()
        .method("POST")
        .uri("/echo/x")
        .header("host", "localhost")
        .header("content-length", "64")
        .body(Body::from("x".repeat(64)))
        .unwrap();
    let response = AxumRouteAdapter::handle_request_with_limit(request, Arc::new(app(false)), 16)
        .await
        .unwrap();
    assert_eq!(response.status(), 413);

    let request = Request::builder()
        .method("POST")
        .uri("/echo/x")
        .header("host", "localhost")
        .body(Body::from("short"))
        .unwrap();
    let response = AxumRouteAdapter::handle_request_with_limit(request, Arc::new(app(false)), 16)
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_adapt_response_keeps_every_set_cookie() {
    let mut response = Response::new("ok").with_status(201);
    response.set_cookie("a", "1", &CookieArgs::new());
    response.set_cookie("b", "2", &CookieArgs::new().httponly(true));

    let response = AxumRouteAdapter::adapt_response(response).unwrap();

    assert_eq!(response.status(), 201);
    let cookies: Vec<_> = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies.len(), 2);
    assert!(cookies[0].starts_with("a=1"));
    assert!(cookies[1].starts_with("b=2"));
    assert_eq!(
        response.headers()["content-type"],
        "text/html; charset=utf-8"
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"ok");
}

// ============================================================
// Serving the application
// ============================================================

#[tokio::test]
async fn test_handle_request_runs_the_application() {
    let request = Request::builder()
        .method("POST")
        .uri("/echo/hobbes?q=tiger")
        .header("host", "localhost")
        .body(Body::from("stuffed"))
        .unwrap();

    let response = AxumRouteAdapter::handle_request(request, Arc::new(app(false)))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"POST hobbes q=tiger body=stuffed");
}

#[tokio::test]
async fn test_debug_application_reports_the_error_chain() {
    let request = Request::builder()
        .uri("/fail")
        .header("host", "localhost")
        .body(Body::empty())
        .unwrap();

    let response = AxumRouteAdapter::handle_request(request, Arc::new(app(true)))
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(body.to_vec()).unwrap();
    assert!(body.starts_with("Unhandled exception while serving /fail"));
    assert!(body.contains("database is gone"));
}

#[tokio::test]
async fn test_debug_application_keeps_http_error_status() {
    let request = Request::builder()
        .uri("/missing")
        .header("host", "localhost")
        .body(Body::empty())
        .unwrap();

    let response = AxumRouteAdapter::handle_request(request, Arc::new(app(true)))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let request = Request::builder()
        .method("DELETE")
        .uri("/fail")
        .header("host", "localhost")
        .body(Body::empty())
        .unwrap();

    let response = AxumRouteAdapter::handle_request(request, Arc::new(app(true)))
        .await
        .unwrap();
    assert_eq!(response.status(), 405);
    assert!(response.headers().contains_key("allow"));
}

#[tokio::test]
#[serial]
async fn test_listen_serves_over_tcp() {
    let port = 29170;
    let local = tokio::task::LocalSet::new();
    local.spawn_local(async move {
        let _ = AxumAdapter::new(app(false)).listen(port, "127.0.0.1").await;
    });

    local
        .run_until(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let client = reqwest::Client::new();

            let response = client
                .get(format!("http://127.0.0.1:{}/echo/susie?q=x", port))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 200);
            assert_eq!(response.text().await.unwrap(), "GET susie q=x body=");

            let response = client
                .get(format!("http://127.0.0.1:{}/fail", port))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 500);
        })
        .await;
}
