//! A tipfy application served by axum, exercised over HTTP.

use std::time::Duration;

use serial_test::serial;
use tipfy::{Context, RequestHandler, Result, ReturnValue, Rule, RuleArgs, Submount, TipfyFactory};
use tipfy_axum::AxumAdapter;

#[derive(Default)]
struct HomeHandler;

impl RequestHandler for HomeHandler {
    fn methods(&self) -> &[&'static str] {
        &["get"]
    }

    fn call(&mut self, _method: &str, cx: &mut Context<'_>, _args: &RuleArgs) -> Result<ReturnValue> {
        Ok(format!("Method: {}", cx.request.method).into())
    }
}

#[derive(Default)]
struct ItemHandler;

impl RequestHandler for ItemHandler {
    fn methods(&self) -> &[&'static str] {
        &["get", "post"]
    }

    fn call(&mut self, method: &str, cx: &mut Context<'_>, args: &RuleArgs) -> Result<ReturnValue> {
        match method {
            "post" => {
                let title = cx.request.form.get("title").unwrap_or("untitled").to_string();
                let location = cx.url_for(
                    "items:show",
                    &tipfy::BuildArgs::new().arg("id", 7).arg("title", &title),
                )?;
                Ok(cx.redirect(&location, 303).into())
            }
            _ => Ok(serde_json::json!({
                "id": args["id"].parse::<u32>().unwrap_or_default(),
                "title": cx.request.args.get("title"),
            })
            .into()),
        }
    }
}

fn spawn_server(local: &tokio::task::LocalSet, port: u16) {
    local.spawn_local(async move {
        let app = TipfyFactory::new()
            .rules(vec![
                Rule::new("/").name("home").handler("home"),
                Rule::new("/only-get").name("only-get").handler("home").methods(&["GET"]),
                Rule::new("/about/").name("about").handler("home"),
            ])
            .rules(Submount::new(
                "/items",
                vec![
                    Rule::new("/").name("items:create").handler("items").methods(&["POST"]),
                    Rule::new("/<int:id>").name("items:show").handler("items"),
                ],
            ))
            .register_handler::<HomeHandler>("home")
            .register_handler::<ItemHandler>("items")
            .create()
            .unwrap();
        let _ = AxumAdapter::new(app).listen(port, "127.0.0.1").await;
    });
}

#[tokio::test]
#[serial]
async fn test_hello_world_over_http() {
    let port = 29180;
    let local = tokio::task::LocalSet::new();
    spawn_server(&local, port);

    local
        .run_until(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let client = reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .unwrap();
            let base = format!("http://127.0.0.1:{}", port);

            // ============================================================
            // Dispatch
            // ============================================================
            let response = client.get(format!("{base}/")).send().await.unwrap();
            assert_eq!(response.status(), 200);
            assert_eq!(
                response.headers()["content-type"],
                "text/html; charset=utf-8"
            );
            assert_eq!(response.text().await.unwrap(), "Method: GET");

            // ============================================================
            // Errors produced before and during routing
            // ============================================================
            let response = client.patch(format!("{base}/")).send().await.unwrap();
            assert_eq!(response.status(), 501);

            let response = client.get(format!("{base}/missing")).send().await.unwrap();
            assert_eq!(response.status(), 404);

            let response = client
                .post(format!("{base}/only-get"))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 405);
            assert_eq!(response.headers()["allow"], "GET, HEAD");

            let response = client.get(format!("{base}/about")).send().await.unwrap();
            assert_eq!(response.status(), 301);
            assert_eq!(
                response.headers()["location"],
                format!("http://127.0.0.1:{port}/about/").as_str()
            );
        })
        .await;
}

#[tokio::test]
#[serial]
async fn test_forms_json_and_redirects_over_http() {
    let port = 29181;
    let local = tokio::task::LocalSet::new();
    spawn_server(&local, port);

    local
        .run_until(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let client = reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .unwrap();
            let base = format!("http://127.0.0.1:{}", port);

            let response = client
                .post(format!("{base}/items/"))
                .form(&[("title", "Hello world")])
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 303);
            let location = response.headers()["location"].to_str().unwrap().to_string();
            assert_eq!(
                location,
                format!("http://127.0.0.1:{port}/items/7?title=Hello+world")
            );

            let response = client.get(&location).send().await.unwrap();
            assert_eq!(response.status(), 200);
            assert_eq!(response.headers()["content-type"], "application/json");
            let body: serde_json::Value = response.json().await.unwrap();
            assert_eq!(body, serde_json::json!({"id": 7, "title": "Hello world"}));
        })
        .await;
}
