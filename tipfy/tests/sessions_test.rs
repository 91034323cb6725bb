use std::sync::Arc;

use serde_json::{Map, json};
use tipfy::http_helpers::Environ;
use tipfy::sessions::{MemoryStorage, SessionOptions, StorageBackend};
use tipfy::{
    Config, ETagMiddleware, MiddlewareSpec, ReturnValue, Rule, SessionMiddleware, Tipfy,
    TipfyFactory, handler_fn,
};

fn config() -> Config {
    Config::from_value(json!({
        "tipfy.sessions": {"secret_key": "my very secret key"}
    }))
    .unwrap()
}

fn app_with(storage: Arc<MemoryStorage>) -> Tipfy {
    TipfyFactory::new()
        .config(config())
        .rules(vec![
            Rule::new("/read").name("read").handler("read"),
            Rule::new("/write").name("write").handler("write"),
            Rule::new("/flash").name("flash").handler("flash"),
            Rule::new("/flashes").name("flashes").handler("flashes"),
            Rule::new("/cart/<item>").name("cart").handler("cart"),
            Rule::new("/prefs").name("prefs").handler("prefs"),
            Rule::new("/logout").name("logout").handler("logout"),
            Rule::new("/static").name("static").handler("static"),
        ])
        .register_handler_factory("read", || {
            Box::new(handler_fn(&["get"], |_, cx, _| {
                let visits = cx.session()?.get_as::<i64>("visits").unwrap_or(0);
                Ok(format!("visits={visits}").into())
            }))
        })
        .register_handler_factory("write", || {
            Box::new(handler_fn(&["get"], |_, cx, _| {
                let session = cx.session()?;
                let visits = session.get_as::<i64>("visits").unwrap_or(0) + 1;
                session.insert("visits", visits);
                Ok(format!("visits={visits}").into())
            }))
        })
        .register_handler_factory("flash", || {
            Box::new(handler_fn(&["get"], |_, cx, _| {
                cx.session()?.add_flash("Saved!", Some("success"));
                Ok("flashed".into())
            }))
        })
        .register_handler_factory("flashes", || {
            Box::new(handler_fn(&["get"], |_, cx, _| {
                let flashes = cx.session()?.get_flashes();
                let messages: Vec<_> = flashes.into_iter().map(|flash| flash.message).collect();
                Ok(json!(messages).into())
            }))
        })
        .register_handler_factory("cart", || {
            Box::new(handler_fn(&["get"], |_, cx, args| {
                let item = args["item"].clone();
                let options = SessionOptions::new().name("cart").backend("memory");
                let cart = cx.session_store()?.get_session_with(options)?;
                let mut items: Vec<String> = cart.get_as("items").unwrap_or_default();
                items.push(item);
                cart.insert("items", json!(items));
                Ok(json!(items).into())
            }))
        })
        .register_handler_factory("prefs", || {
            Box::new(handler_fn(&["get"], |_, cx, _| {
                let mut args = Map::new();
                args.insert("max_age".to_string(), json!(3600));
                cx.session_store()?
                    .set_json_cookie("prefs", &json!({"theme": "dark"}), &args)?;
                Ok("prefs".into())
            }))
        })
        .register_handler_factory("logout", || {
            Box::new(handler_fn(&["get"], |_, cx, _| {
                cx.session_store()?.delete_cookie("session", &Map::new())?;
                Ok("bye".into())
            }))
        })
        .register_handler_factory("static", || {
            Box::new(handler_fn(&["get"], |_, _, _| Ok(ReturnValue::from("static content"))))
        })
        .session_backend("memory", StorageBackend::new(storage))
        .use_middleware(MiddlewareSpec::of::<ETagMiddleware>())
        .use_middleware(MiddlewareSpec::of::<SessionMiddleware>())
        .create()
        .unwrap()
}

fn app() -> Tipfy {
    app_with(Arc::new(MemoryStorage::new()))
}

#[test]
fn test_unmodified_session_sets_no_cookie() {
    let app = app();
    let mut client = app.test_client();

    let response = client.get("/read").unwrap();

    assert_eq!(response.data(), "visits=0");
    assert!(response.set_cookies().is_empty());
}

#[test]
fn test_modified_session_sets_one_cookie() {
    let app = app();
    let mut client = app.test_client();

    let response = client.get("/write").unwrap();
    assert_eq!(response.set_cookies().len(), 1);
    assert!(response.set_cookies()[0].starts_with("session="));

    let response = client.get("/write").unwrap();
    assert_eq!(response.data(), "visits=2");

    // Reading the stored session writes nothing back.
    let response = client.get("/read").unwrap();
    assert_eq!(response.data(), "visits=2");
    assert!(response.set_cookies().is_empty());
}

#[test]
fn test_forged_session_cookie_is_ignored() {
    let app = app();
    let mut client = app.test_client();
    client.get("/write").unwrap();

    let forged = client.cookie("session").unwrap().replace('|', "|0");
    client.set_cookie("session", &forged);

    let response = client.get("/read").unwrap();
    assert_eq!(response.data(), "visits=0");
}

#[test]
fn test_flashes_are_read_once_across_requests() {
    let app = app();
    let mut client = app.test_client();

    client.get("/flash").unwrap();

    let response = client.get("/flashes").unwrap();
    assert_eq!(response.data(), r#"["Saved!"]"#);
    assert_eq!(response.set_cookies().len(), 1);

    let response = client.get("/flashes").unwrap();
    assert_eq!(response.data(), "[]");
    assert!(response.set_cookies().is_empty());
}

#[test]
fn test_storage_backend_keeps_data_on_the_server() {
    let storage = Arc::new(MemoryStorage::new());
    let app = app_with(storage.clone());
    let mut client = app.test_client();

    client.get("/cart/apple").unwrap();
    let response = client.get("/cart/pear").unwrap();

    assert_eq!(response.data(), r#"["apple","pear"]"#);
    assert_eq!(storage.len(), 1);
    let cookie = client.cookie("cart").unwrap();
    assert!(!cookie.contains("apple"));
}

#[test]
fn test_plain_and_deleted_cookies() {
    let app = app();
    let mut client = app.test_client();

    let response = client.get("/prefs").unwrap();
    let cookie = response.set_cookies()[0];
    assert!(cookie.starts_with("prefs="));
    assert!(cookie.contains("Max-Age=3600"));
    assert_eq!(
        tipfy::sessions::decode_json(client.cookie("prefs").unwrap()),
        Some(json!({"theme": "dark"}))
    );

    client.get("/write").unwrap();
    assert!(client.cookie("session").is_some());
    let response = client.get("/logout").unwrap();
    assert!(response.set_cookies()[0].contains("Max-Age=0"));
    assert!(client.cookie("session").is_none());
}

#[test]
fn test_etag_answers_not_modified() {
    let app = app();

    let response = app.call(Environ::new("GET", "/static").unwrap()).unwrap();
    let etag = response.header("ETag").unwrap().to_string();
    assert!(etag.starts_with('"') && etag.ends_with('"'));

    let response = app
        .call(
            Environ::new("GET", "/static")
                .unwrap()
                .header("If-None-Match", &etag),
        )
        .unwrap();
    assert_eq!(response.status, 304);
    assert!(response.body.is_empty());

    let response = app
        .call(
            Environ::new("GET", "/static")
                .unwrap()
                .header("If-None-Match", "\"stale\""),
        )
        .unwrap();
    assert_eq!(response.status, 200);
}

#[test]
fn test_missing_secret_key_fails_the_request() {
    let app = TipfyFactory::new()
        .rules(vec![Rule::new("/").name("home").handler("home")])
        .register_handler_factory("home", || {
            Box::new(handler_fn(&["get"], |_, cx, _| {
                cx.session()?.insert("foo", "bar");
                Ok("ok".into())
            }))
        })
        .use_middleware(MiddlewareSpec::of::<SessionMiddleware>())
        .debug(true)
        .create()
        .unwrap();

    let unhandled = app.call(Environ::new("GET", "/").unwrap()).unwrap_err();
    assert!(unhandled.error.to_string().contains("secret_key"));
}
