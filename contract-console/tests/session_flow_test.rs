//! End-to-end session behaviour through the console router.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{body_json, body_text, get, location, post_form, send, session_cookie, user};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header as header_is, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn sign_in(server: &MockServer, app: &Router, token: &str, profile: Value) -> String {
    sign_in_over(server, app, token, profile, None).await
}

/// Sign in from a browser that may already hold a session cookie.
async fn sign_in_over(
    server: &MockServer,
    app: &Router,
    token: &str,
    profile: Value,
    cookie: Option<&str>,
) -> String {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::login_body(token, profile)))
        .up_to_n_times(1)
        .mount(server)
        .await;

    let response = send(
        app,
        post_form("/login", "email=someone%40corp.com&password=pw", cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));
    session_cookie(&response).expect("login should set the session cookie")
}

// ============================================================================
// Sign-in and sign-out
// ============================================================================

#[tokio::test]
async fn anonymous_visitors_land_on_login() {
    let server = MockServer::start().await;
    let app = common::console(&server);

    let response = send(&app, get("/", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));

    let response = send(&app, get("/view/dashboard", None)).await;
    assert_eq!(location(&response), Some("/login"));

    let summary = body_json(send(&app, get("/session", None)).await).await;
    assert_eq!(summary["authenticated"], false);
    assert_eq!(summary["entry_view"], "login");
    assert_eq!(summary["permitted"], json!(["login", "register"]));
    assert_eq!(summary["capabilities"], json!([]));
}

#[tokio::test]
async fn login_persists_session_across_requests() {
    let server = MockServer::start().await;
    let app = common::console(&server);
    let cookie = sign_in(&server, &app, "tok-1", user(12, "manager", Some(3), None)).await;

    let summary = body_json(send(&app, get("/session", Some(&cookie))).await).await;
    assert_eq!(summary["authenticated"], true);
    assert_eq!(summary["role"], "manager");
    assert_eq!(summary["entry_view"], "dashboard");
    assert_eq!(summary["identity"]["id"], 12);
    assert_eq!(summary["scope"], json!({ "kind": "tenant", "id": 3 }));

    let response = send(&app, get("/", Some(&cookie))).await;
    assert_eq!(location(&response), Some("/view/dashboard"));

    let response = send(&app, get("/login", Some(&cookie))).await;
    assert_eq!(location(&response), Some("/"));
}

#[tokio::test]
async fn bad_credentials_show_an_error_and_create_no_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "detail": "Incorrect email or password" })),
        )
        .mount(&server)
        .await;
    let app = common::console(&server);

    let response = send(
        &app,
        post_form("/login", "email=someone%40corp.com&password=nope", None),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(session_cookie(&response).is_none());
    assert!(body_text(response).await.contains("Invalid email or password"));
}

#[tokio::test]
async fn unknown_role_at_login_is_refused() {
    let server = MockServer::start().await;
    let app = common::console(&server);
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::login_body("tok-1", user(9, "auditor", None, None))),
        )
        .mount(&server)
        .await;

    let response = send(
        &app,
        post_form("/login", "email=someone%40corp.com&password=pw", None),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(session_cookie(&response).is_none());
}

#[tokio::test]
async fn htmx_login_is_told_where_to_go() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::login_body("tok-1", user(12, "manager", Some(3), None))),
        )
        .mount(&server)
        .await;
    let app = common::console(&server);

    let mut request = post_form("/login", "email=someone%40corp.com&password=pw", None);
    request
        .headers_mut()
        .insert("hx-request", "true".parse().unwrap());
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("hx-redirect").unwrap(), "/");
}

#[tokio::test]
async fn logout_returns_to_login() {
    let server = MockServer::start().await;
    let app = common::console(&server);
    let cookie = sign_in(&server, &app, "tok-1", user(12, "manager", Some(3), None)).await;

    let response = send(&app, post_form("/logout", "", Some(&cookie))).await;
    assert_eq!(location(&response), Some("/"));

    let summary = body_json(send(&app, get("/session", Some(&cookie))).await).await;
    assert_eq!(summary["authenticated"], false);

    let response = send(&app, get("/", Some(&cookie))).await;
    assert_eq!(location(&response), Some("/login"));
}

#[tokio::test]
async fn logout_is_not_reachable_by_get() {
    let server = MockServer::start().await;
    let app = common::console(&server);
    let cookie = sign_in(&server, &app, "tok-1", user(12, "manager", Some(3), None)).await;

    let response = send(&app, get("/logout", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let summary = body_json(send(&app, get("/session", Some(&cookie))).await).await;
    assert_eq!(summary["authenticated"], true);
}

#[tokio::test]
async fn signing_in_again_issues_a_new_session_id() {
    let server = MockServer::start().await;
    let app = common::console(&server);
    let first = sign_in(&server, &app, "tok-1", user(12, "manager", Some(3), None)).await;

    let second = sign_in_over(
        &server,
        &app,
        "tok-2",
        user(30, "vendor", None, Some(7)),
        Some(&first),
    )
    .await;
    assert_ne!(first, second);

    let summary = body_json(send(&app, get("/session", Some(&first))).await).await;
    assert_eq!(summary["authenticated"], false);

    let summary = body_json(send(&app, get("/session", Some(&second))).await).await;
    assert_eq!(summary["authenticated"], true);
    assert_eq!(summary["role"], "vendor");
}

#[tokio::test]
async fn vendor_registration_signs_in() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register/vendor"))
        .and(body_string_contains("\"invite_code\":\"INV-93A\""))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::login_body("tok-v", user(30, "vendor", None, Some(7)))),
        )
        .expect(1)
        .mount(&server)
        .await;
    let app = common::console(&server);

    let response = send(
        &app,
        post_form(
            "/register",
            "account_type=vendor&full_name=Vera&email=vera%40supplier.io&password=pw&invite_code=INV-93A",
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookie = session_cookie(&response).unwrap();

    let response = send(&app, get("/", Some(&cookie))).await;
    assert_eq!(location(&response), Some("/view/vendor"));
}

#[tokio::test]
async fn manager_registration_without_company_is_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    let app = common::console(&server);

    let response = send(
        &app,
        post_form(
            "/register",
            "account_type=manager&full_name=Mary&email=mary%40corp.com&password=pw&company_id=",
            None,
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(response).await.contains("Select the company you belong to"));
}

// ============================================================================
// View routing
// ============================================================================

#[tokio::test]
async fn vendor_is_confined_to_the_portal() {
    let server = MockServer::start().await;
    let app = common::console(&server);
    let cookie = sign_in(&server, &app, "tok-v", user(30, "vendor", None, Some(7))).await;

    for requested in ["/view/dashboard", "/view/contracts", "/view/users", "/view/nonsense"] {
        let response = send(&app, get(requested, Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{requested}");
        assert_eq!(location(&response), Some("/view/vendor"), "{requested}");
    }

    let response = send(&app, get("/view/vendor", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("Vendor Portal"));
    assert!(!page.contains("<nav>"));
}

#[tokio::test]
async fn manager_sees_navigation_but_not_user_management() {
    let server = MockServer::start().await;
    let app = common::console(&server);
    let cookie = sign_in(&server, &app, "tok-1", user(12, "manager", Some(3), None)).await;

    let response = send(&app, get("/view/users", Some(&cookie))).await;
    assert_eq!(location(&response), Some("/view/dashboard"));

    let response = send(&app, get("/view/compare", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("<nav>"));
    assert!(page.contains("href=\"/view/contracts\""));
    assert!(!page.contains("href=\"/view/users\""));
    assert!(page.contains("Compare contracts"));
    assert!(!page.contains("Manage users"));
}

#[tokio::test]
async fn super_admin_lands_on_platform_admin() {
    let server = MockServer::start().await;
    let app = common::console(&server);
    let cookie = sign_in(&server, &app, "tok-s", user(1, "super_admin", None, None)).await;

    let response = send(&app, get("/", Some(&cookie))).await;
    assert_eq!(location(&response), Some("/view/platform"));

    let response = send(&app, get("/view/compare", Some(&cookie))).await;
    assert_eq!(location(&response), Some("/view/platform"));

    let response = send(&app, get("/view/users", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// API forwarding
// ============================================================================

#[tokio::test]
async fn api_calls_carry_the_session_credential() {
    let server = MockServer::start().await;
    let app = common::console(&server);
    let cookie = sign_in(&server, &app, "tok-1", user(12, "manager", Some(3), None)).await;
    Mock::given(method("GET"))
        .and(path("/contracts/"))
        .and(query_param("status", "active"))
        .and(header_is("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
        .expect(1)
        .mount(&server)
        .await;

    let response = send(&app, get("/api/contracts/?status=active", Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([{ "id": 1 }]));
}

#[tokio::test]
async fn json_bodies_are_forwarded() {
    let server = MockServer::start().await;
    let app = common::console(&server);
    let cookie = sign_in(&server, &app, "tok-1", user(12, "manager", Some(3), None)).await;
    Mock::given(method("PATCH"))
        .and(path("/contracts/5"))
        .and(body_string_contains("\"title\":\"MSA 2026\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 5 })))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::builder()
        .method("PATCH")
        .uri("/api/contracts/5")
        .header(header::COOKIE, &cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"title":"MSA 2026"}"#))
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_json_is_rejected_before_forwarding() {
    let server = MockServer::start().await;
    let app = common::console(&server);
    let cookie = sign_in(&server, &app, "tok-1", user(12, "manager", Some(3), None)).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/contracts/")
        .header(header::COOKIE, &cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn anonymous_api_calls_are_sent_back_to_the_start() {
    let server = MockServer::start().await;
    let app = common::console(&server);

    let response = send(&app, get("/api/contracts/", None)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));
}

#[tokio::test]
async fn rejected_credential_ends_the_browser_session() {
    let server = MockServer::start().await;
    let app = common::console(&server);
    let cookie = sign_in(&server, &app, "tok-1", user(12, "manager", Some(3), None)).await;
    Mock::given(method("GET"))
        .and(path("/vendors/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "Token expired" })))
        .mount(&server)
        .await;

    let response = send(&app, get("/api/vendors/", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));
    assert_eq!(response.headers().get("hx-refresh").unwrap(), "true");

    let summary = body_json(send(&app, get("/session", Some(&cookie))).await).await;
    assert_eq!(summary["authenticated"], false);
}

#[tokio::test]
async fn late_rejection_does_not_end_a_newer_sign_in() {
    let server = MockServer::start().await;
    let app = common::console(&server);
    let cookie = sign_in(&server, &app, "tok-old", user(12, "manager", Some(3), None)).await;
    Mock::given(method("GET"))
        .and(path("/contracts/"))
        .and(header_is("authorization", "Bearer tok-old"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": "Token expired" }))
                .set_delay(Duration::from_millis(600)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vendors/"))
        .and(header_is("authorization", "Bearer tok-new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let stale = {
        let app = app.clone();
        let cookie = cookie.clone();
        tokio::spawn(async move { send(&app, get("/api/contracts/", Some(&cookie))).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    let renewed = sign_in_over(
        &server,
        &app,
        "tok-new",
        user(12, "manager", Some(3), None),
        Some(&cookie),
    )
    .await;

    let response = stale.await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));
    assert!(session_cookie(&response).is_none());

    let summary = body_json(send(&app, get("/session", Some(&renewed))).await).await;
    assert_eq!(summary["authenticated"], true);

    let response = send(&app, get("/api/vendors/", Some(&renewed))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn gated_actions_are_refused_without_the_capability() {
    let server = MockServer::start().await;
    let app = common::console(&server);
    let cookie = sign_in(&server, &app, "tok-v", user(30, "vendor", None, Some(7))).await;
    Mock::given(method("POST"))
        .and(path("/contracts/upload"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/contracts/upload")
        .header(header::COOKIE, &cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let summary = body_json(send(&app, get("/session", Some(&cookie))).await).await;
    assert_eq!(summary["authenticated"], true);
}

#[tokio::test]
async fn uploads_are_forwarded_as_multipart() {
    let server = MockServer::start().await;
    let app = common::console(&server);
    let cookie = sign_in(&server, &app, "tok-1", user(12, "manager", Some(3), None)).await;
    Mock::given(method("POST"))
        .and(path("/contracts/upload"))
        .and(body_string_contains("filename=\"msa.pdf\""))
        .and(body_string_contains("%PDF-1.4"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 44 })))
        .expect(1)
        .mount(&server)
        .await;

    let boundary = "console-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"msa.pdf\"\r\n\
         Content-Type: application/pdf\r\n\r\n\
         %PDF-1.4 msa\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/contracts/upload")
        .header(header::COOKIE, &cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], 44);
}

#[tokio::test]
async fn dot_segments_cannot_reach_gated_actions() {
    let server = MockServer::start().await;
    let app = common::console(&server);
    let cookie = sign_in(&server, &app, "tok-v", user(30, "vendor", None, Some(7))).await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let attempts = [
        ("DELETE", "/api/vendors/../auth/users/5"),
        ("PATCH", "/api/vendors/./../auth/users/5"),
        ("POST", "/api/vendors/../contracts/upload"),
        ("POST", "/api/x/../similarity/compare/9"),
        ("POST", "/api/x/../companies"),
        ("POST", "/api/vendors/%2e%2e/companies"),
        ("DELETE", "/api/vendors/%2E%2E/auth/users/5"),
        ("DELETE", "/api/vendors/..%2fauth/users/5"),
        ("POST", "/api/x/..%5Ccontracts/upload"),
    ];

    for (verb, uri) in attempts {
        let request = Request::builder()
            .method(verb)
            .uri(uri)
            .header(header::COOKIE, &cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{verb} {uri}");
    }

    let summary = body_json(send(&app, get("/session", Some(&cookie))).await).await;
    assert_eq!(summary["authenticated"], true);
}

#[tokio::test]
async fn manager_registration_sends_the_user_to_sign_in() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .and(body_string_contains("\"company_id\":3"))
        .respond_with(ResponseTemplate::new(201).set_body_json(user(12, "manager", Some(3), None)))
        .expect(1)
        .mount(&server)
        .await;
    let app = common::console(&server);

    let response = send(
        &app,
        post_form(
            "/register",
            "account_type=manager&full_name=Mary&email=mary%40corp.com&password=pw&company_id=3",
            None,
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_none());
    assert!(body_text(response).await.contains("Account created! Please sign in."));
}
