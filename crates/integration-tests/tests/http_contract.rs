//! HTTP contract tests driven through the real router.
//!
//! These run without a database: every request here is answered before the
//! first query (health, auth rejections, body validation, routing).

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::StatusCode;
use serde_json::json;

use shopfront_integration_tests::{
    TEST_ORIGIN, json_request, request, send, send_json, test_router,
};

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_liveness_answers_ok() {
    let (status, _, body) = send(
        test_router(),
        request("GET", "/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let (status, body) = send_json(
        test_router(),
        request("GET", "/health/ready").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "Database unavailable");
}

// ============================================================================
// Auth rejections
// ============================================================================

#[tokio::test]
async fn test_customer_routes_require_login() {
    let protected = [
        ("GET", "/api/cart"),
        ("DELETE", "/api/cart"),
        ("GET", "/api/orders"),
        ("GET", "/api/auth/me"),
        ("GET", "/api/reviews/reviewable"),
        ("GET", "/api/payment/vnpay/return?vnp_TxnRef=1"),
    ];

    for (method, uri) in protected {
        let (status, body) = send_json(
            test_router(),
            request(method, uri).body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(body["message"], "Not authorized, please log in");
    }
}

#[tokio::test]
async fn test_json_routes_require_login() {
    let protected = [
        ("POST", "/api/cart", json!({ "productId": 1, "quantity": 1 })),
        ("POST", "/api/orders", json!({ "paymentMethod": "cod" })),
        ("POST", "/api/payment/paypal", json!({ "amount": "10.00" })),
        (
            "POST",
            "/api/payment/paypal/execute",
            json!({ "paymentID": "PAY-1", "payerID": "PAYER" }),
        ),
        ("POST", "/api/payment/vnpay", json!({ "orderId": 1, "amount": "100000" })),
    ];

    for (method, uri, payload) in protected {
        let (status, body) = send_json(test_router(), json_request(method, uri, &payload)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(body["message"], "Not authorized, please log in");
    }
}

#[tokio::test]
async fn test_admin_routes_require_login() {
    for uri in [
        "/api/admin/dashboard",
        "/api/admin/orders",
        "/api/admin/reports/sales",
    ] {
        let (status, _) = send_json(
            test_router(),
            request("GET", uri).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }

    let (status, _) = send_json(
        test_router(),
        json_request(
            "POST",
            "/api/products",
            &json!({ "name": "Lamp", "description": "Desk lamp", "price": "20", "category": "Home" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_without_session_succeeds() {
    let (status, body) = send_json(
        test_router(),
        request("POST", "/api/auth/logout").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged out");
}

// ============================================================================
// Request validation
// ============================================================================

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let req = request("POST", "/api/auth/login")
        .header("content-type", "application/json")
        .body(Body::from("{\"email\":"))
        .unwrap();

    let (status, body) = send_json(test_router(), req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_missing_content_type_is_bad_request() {
    let req = request("POST", "/api/auth/register")
        .body(Body::from(r#"{"name":"A","email":"a@example.com","password":"secret123"}"#))
        .unwrap();

    let (status, body) = send_json(test_router(), req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

// ============================================================================
// Routing and middleware
// ============================================================================

#[tokio::test]
async fn test_unknown_route_is_json_not_found() {
    let (status, body) = send_json(
        test_router(),
        request("GET", "/api/nope").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Not found");
}

#[tokio::test]
async fn test_every_response_carries_request_id() {
    let (_, headers, _) = send(
        test_router(),
        request("GET", "/health")
            .header("x-request-id", "lb-1234")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(headers["x-request-id"], "lb-1234");

    let (_, headers, _) = send(
        test_router(),
        request("GET", "/api/cart").body(Body::empty()).unwrap(),
    )
    .await;
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_cors_preflight_allows_storefront_origin() {
    let req = request("OPTIONS", "/api/cart")
        .header("origin", TEST_ORIGIN)
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .unwrap();

    let (status, headers, _) = send(test_router(), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["access-control-allow-origin"], TEST_ORIGIN);
    assert_eq!(headers["access-control-allow-credentials"], "true");
}

#[tokio::test]
async fn test_auth_rate_limit_answers_json() {
    let router = test_router();
    let logout = || {
        request("POST", "/api/auth/logout")
            .body(Body::empty())
            .unwrap()
    };

    for attempt in 1..=5 {
        let (status, _) = send_json(router.clone(), logout()).await;
        assert_eq!(status, StatusCode::OK, "attempt {attempt}");
    }

    let (status, headers, body) = send(router, logout()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(headers["content-type"], "application/json");
    assert!(headers.contains_key("retry-after"));
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["message"], "Too many requests, please try again later");
}

#[tokio::test]
async fn test_cors_ignores_other_origins() {
    let req = request("GET", "/health")
        .header("origin", "https://evil.example")
        .body(Body::empty())
        .unwrap();

    let (status, headers, _) = send(test_router(), req).await;

    assert_eq!(status, StatusCode::OK);
    assert!(!headers.contains_key("access-control-allow-origin"));
}
