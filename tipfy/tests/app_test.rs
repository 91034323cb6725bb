use serde_json::json;
use tipfy::http_helpers::Environ;
use tipfy::{
    BuildArgs, Config, Context, Error, HttpException, Middleware, Hook, RequestHandler, Response,
    Result, ReturnValue, Rule, RuleArgs, Tipfy, TipfyFactory, abort, handler_fn,
};

#[derive(Default)]
struct HomeHandler;

impl RequestHandler for HomeHandler {
    fn methods(&self) -> &[&'static str] {
        &["get", "post"]
    }

    fn call(&mut self, _method: &str, cx: &mut Context<'_>, _args: &RuleArgs) -> Result<ReturnValue> {
        Ok(format!("Method: {}", cx.request.method).into())
    }
}

#[derive(Default)]
struct ProfileHandler;

impl RequestHandler for ProfileHandler {
    fn methods(&self) -> &[&'static str] {
        &["get", "show"]
    }

    fn call(&mut self, method: &str, cx: &mut Context<'_>, args: &RuleArgs) -> Result<ReturnValue> {
        let url = cx.url_for("profile", &BuildArgs::new().arg("username", &args["username"]))?;
        Ok(format!("{method} {} at {url}", args["username"]).into())
    }
}

#[derive(Default)]
struct BrokenHandler;

impl RequestHandler for BrokenHandler {
    fn methods(&self) -> &[&'static str] {
        &["get"]
    }

    fn call(&mut self, _method: &str, _cx: &mut Context<'_>, _args: &RuleArgs) -> Result<ReturnValue> {
        Err(anyhow::anyhow!("database is gone").into())
    }
}

fn app(debug: bool) -> Tipfy {
    TipfyFactory::new()
        .rules(vec![
            Rule::new("/").name("home").handler("home"),
            Rule::new("/people/<username>").name("profile").handler("profile"),
            Rule::new("/people/<username>/show")
                .name("profile-show")
                .handler("profile:show"),
            Rule::new("/only-get").name("only-get").handler("home").methods(&["GET"]),
            Rule::new("/broken").name("broken").handler("broken"),
            Rule::new("/nothing").name("nothing").handler("nothing"),
            Rule::new("/forbidden").name("forbidden").handler("forbidden"),
            Rule::new("/tuple").name("tuple").handler("tuple"),
            Rule::new("/callable").name("callable").handler("callable"),
            Rule::new("/unregistered").name("unregistered").handler("unregistered"),
            Rule::new("/blog/").name("blog").handler("home"),
        ])
        .register_handler::<HomeHandler>("home")
        .register_handler::<ProfileHandler>("profile")
        .register_handler::<BrokenHandler>("broken")
        .register_handler_factory("nothing", || {
            Box::new(handler_fn(&["get"], |_, _, _| Ok(ReturnValue::Nothing)))
        })
        .register_handler_factory("forbidden", || {
            Box::new(handler_fn(&["get"], |_, _, _| Err(abort(403))))
        })
        .register_handler_factory("tuple", || {
            Box::new(handler_fn(&["get"], |_, _, _| {
                Ok((
                    "created",
                    201,
                    vec![
                        ("Content-Type".to_string(), "text/plain".to_string()),
                        ("X-Item".to_string(), "1".to_string()),
                    ],
                )
                    .into())
            }))
        })
        .register_handler_factory("callable", || {
            Box::new(handler_fn(&["get"], |_, _, _| {
                Ok(ReturnValue::callable(|request| {
                    Response::new(format!("called for {}", request.path))
                }))
            }))
        })
        .debug(debug)
        .create()
        .unwrap()
}

fn call(app: &Tipfy, method: &str, url: &str) -> Response {
    app.call(Environ::new(method, url).unwrap()).unwrap()
}

// ============================================================================
// Dispatch
// ============================================================================

#[test]
fn test_get_home() {
    let app = app(false);

    let response = call(&app, "GET", "/");
    assert_eq!(response.status, 200);
    assert_eq!(response.data(), "Method: GET");

    let response = call(&app, "POST", "/");
    assert_eq!(response.data(), "Method: POST");
}

#[test]
fn test_method_outside_allowed_set_is_not_implemented() {
    let app = app(false);
    let response = call(&app, "CONNECT", "/");
    assert_eq!(response.status, 501);
}

#[test]
fn test_unmapped_path_is_not_found() {
    let app = app(false);
    assert_eq!(call(&app, "GET", "/missing").status, 404);
}

#[test]
fn test_rule_methods_give_405_with_allow_header() {
    let app = app(false);
    let response = call(&app, "POST", "/only-get");
    assert_eq!(response.status, 405);
    assert_eq!(response.header("Allow"), Some("GET, HEAD"));
}

#[test]
fn test_handler_without_method_gives_405() {
    let app = app(false);
    let response = call(&app, "PUT", "/");
    assert_eq!(response.status, 405);
    assert_eq!(response.header("Allow"), Some("GET, POST"));
}

#[test]
fn test_handler_method_from_rule() {
    let app = app(false);
    let response = call(&app, "GET", "/people/calvin/show");
    assert_eq!(response.data(), "show calvin at /people/calvin");

    let response = call(&app, "GET", "/people/hobbes");
    assert_eq!(response.data(), "get hobbes at /people/hobbes");
}

#[test]
fn test_missing_slash_redirects() {
    let app = app(false);
    let response = call(&app, "GET", "/blog");
    assert_eq!(response.status, 301);
    assert_eq!(response.header("Location"), Some("http://localhost/blog/"));
}

#[test]
fn test_return_value_conversions() {
    let app = app(false);

    let response = call(&app, "GET", "/tuple");
    assert_eq!(response.status, 201);
    assert_eq!(response.content_type(), Some("text/plain"));
    assert_eq!(response.header("X-Item"), Some("1"));

    let response = call(&app, "GET", "/callable");
    assert_eq!(response.data(), "called for /callable");
}

#[test]
fn test_http_errors_from_handlers() {
    let app = app(false);
    assert_eq!(call(&app, "GET", "/forbidden").status, 403);
}

#[test]
fn test_handler_returning_nothing_is_a_server_error() {
    let app = app(false);
    assert_eq!(call(&app, "GET", "/nothing").status, 500);
}

#[test]
fn test_unregistered_handler_is_a_server_error() {
    let app = app(false);
    assert_eq!(call(&app, "GET", "/unregistered").status, 500);
}

// ============================================================================
// Exceptions and request-local state
// ============================================================================

#[test]
fn test_production_error_is_500_and_clears_state() {
    let app = app(false);
    let mut request = tipfy::Request::from_environ(Environ::new("GET", "/broken").unwrap());

    let response = app.wsgi_app(&mut request).unwrap();

    assert_eq!(response.status, 500);
    assert!(!response.data().contains("database is gone"));
    assert!(request.local.is_empty());
}

#[test]
fn test_debug_error_is_raised_and_keeps_state() {
    let app = app(true);

    let unhandled = app
        .call(Environ::new("GET", "/broken").unwrap())
        .unwrap_err();

    assert!(unhandled.error.to_string().contains("database is gone"));
    let rule = unhandled.request.local.rule.as_ref().unwrap();
    assert_eq!(rule.name.as_deref(), Some("broken"));
    assert!(unhandled.request.local.url_adapter.is_some());
}

#[test]
fn test_debug_raises_http_errors_too() {
    let app = app(true);

    let unhandled = app
        .call(Environ::new("GET", "/missing").unwrap())
        .unwrap_err();
    assert_eq!(unhandled.error.as_http().map(|e| e.code), Some(404));
    assert!(unhandled.request.local.url_adapter.is_some());

    let unhandled = app
        .call(Environ::new("GET", "/forbidden").unwrap())
        .unwrap_err();
    assert_eq!(unhandled.error.as_http().map(|e| e.code), Some(403));
    let rule = unhandled.request.local.rule.as_ref().unwrap();
    assert_eq!(rule.name.as_deref(), Some("forbidden"));

    let unhandled = app
        .call(Environ::new("CONNECT", "/").unwrap())
        .unwrap_err();
    assert_eq!(unhandled.error.as_http().map(|e| e.code), Some(501));

    // Redirects are not errors.
    assert_eq!(call(&app, "GET", "/blog").status, 301);
}

#[test]
fn test_successful_request_clears_state() {
    let app = app(true);
    let mut request = tipfy::Request::from_environ(Environ::new("GET", "/people/calvin").unwrap());

    app.wsgi_app(&mut request).unwrap();

    assert!(request.local.is_empty());
}

// ============================================================================
// Application middleware
// ============================================================================

struct Maintenance;

impl Middleware for Maintenance {
    fn hooks(&self) -> &'static [Hook] {
        &[Hook::PreDispatchHandler]
    }

    fn pre_dispatch_handler(&self, cx: &mut Context<'_>) -> Result<Option<ReturnValue>> {
        if cx.request.args.contains("maintenance") {
            let home = cx.url_for("home", &BuildArgs::new().full())?;
            return Ok(Some(("Back soon: ".to_string() + &home, 503).into()));
        }
        Ok(None)
    }
}

struct Recover;

impl Middleware for Recover {
    fn hooks(&self) -> &'static [Hook] {
        &[Hook::HandleException]
    }

    fn handle_exception(&self, _cx: &mut Context<'_>, error: &Error) -> Option<ReturnValue> {
        match error {
            Error::Http(HttpException { code: 404, .. }) => Some(("Nothing here", 404).into()),
            Error::Other(error) => Some((format!("Recovered: {error}"), 500).into()),
            _ => None,
        }
    }
}

fn app_with_middleware() -> Tipfy {
    TipfyFactory::new()
        .rules(vec![
            Rule::new("/").name("home").handler("home"),
            Rule::new("/broken").name("broken").handler("broken"),
        ])
        .register_handler::<HomeHandler>("home")
        .register_handler::<BrokenHandler>("broken")
        .use_middleware(tipfy::MiddlewareSpec::instance(Maintenance))
        .use_middleware(tipfy::MiddlewareSpec::instance(Recover))
        .debug(true)
        .create()
        .unwrap()
}

#[test]
fn test_pre_dispatch_handler_skips_routing() {
    let app = app_with_middleware();

    // Even an unmapped path is answered by the hook.
    let response = call(&app, "GET", "/missing?maintenance=1");
    assert_eq!(response.status, 503);
    assert_eq!(response.data(), "Back soon: http://localhost/");
}

#[test]
fn test_app_handle_exception() {
    let app = app_with_middleware();

    let response = call(&app, "GET", "/missing");
    assert_eq!(response.data(), "Nothing here");

    // Handled before debug mode gets a chance to raise.
    let response = call(&app, "GET", "/broken");
    assert_eq!(response.status, 500);
    assert_eq!(response.data(), "Recovered: database is gone");
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_and_named_middleware() {
    let config = Config::from_value(json!({
        "tipfy": {"middleware": ["maintenance"], "server_name": "example.com"},
        "app": {"title": "My app"},
    }))
    .unwrap();

    let app = TipfyFactory::new()
        .rules(vec![Rule::new("/").name("home").handler("home")])
        .register_handler::<HomeHandler>("home")
        .register_middleware("maintenance", || std::sync::Arc::new(Maintenance))
        .config(config)
        .create()
        .unwrap();

    assert!(!app.debug());
    assert_eq!(app.get_config("app", "title").unwrap(), json!("My app"));
    assert_eq!(app.get_config("tipfy", "default_subdomain").unwrap(), json!(""));
    assert!(app.get_config("tipfy.sessions", "secret_key").is_err());

    let response = call(&app, "GET", "http://example.com/?maintenance");
    assert_eq!(response.data(), "Back soon: http://example.com/");
}

#[test]
fn test_unknown_configured_middleware_fails_creation() {
    let config = Config::from_value(json!({"tipfy": {"middleware": ["missing"]}})).unwrap();
    let result = TipfyFactory::new().config(config).create();
    assert!(matches!(result, Err(Error::MiddlewareNotFound(name)) if name == "missing"));
}

#[test]
fn test_handlers_resolve_once() {
    let app = app(false);
    assert!(!app.router().handlers().is_resolved("home"));

    call(&app, "GET", "/");
    call(&app, "GET", "/");

    assert!(app.router().handlers().is_resolved("home"));
    assert!(!app.router().handlers().is_resolved("profile"));
}
