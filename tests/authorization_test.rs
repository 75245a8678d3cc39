//! Token handling and role/ownership enforcement at the HTTP boundary.

mod common;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use common::{response_json, sign, TestApp, TestUser};
use procurement_api::auth::Claims;
use serde_json::json;

#[tokio::test]
async fn missing_token_is_forbidden() {
    let app = TestApp::in_memory().await;

    let response = app
        .request(Method::GET, "/api/v1/requirements", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Forbidden");
}

#[tokio::test]
async fn malformed_and_foreign_tokens_are_forbidden() {
    let app = TestApp::in_memory().await;

    let response = app
        .request(Method::GET, "/api/v1/requirements", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: "intruder".into(),
        name: None,
        email: None,
        role: Some("administrator".into()),
        iat: now,
        exp: now + 600,
        iss: None,
        aud: None,
        jti: None,
    };
    let forged = sign(&claims, "some-other-secret-of-sufficient-length!!");
    let response = app
        .request(Method::GET, "/api/v1/requirements", None, Some(&forged))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn expired_token_is_forbidden() {
    let app = TestApp::in_memory().await;
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: "late".into(),
        name: None,
        email: None,
        role: None,
        iat: now - 7200,
        exp: now - 3600,
        iss: None,
        aud: None,
        jti: None,
    };
    let token = sign(&claims, common::JWT_SECRET);

    let response = app
        .request(Method::GET, "/api/v1/requirements", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn token_without_role_acts_as_buyer() {
    let app = TestApp::in_memory().await;
    let creator = TestUser::buyer();
    let roleless = TestUser::named("no-role", None);
    let id = app.submitted_requirement(&creator).await;

    let (status, _) = app
        .call(
            &roleless,
            Method::POST,
            &format!("/api/v1/requirements/{id}/approvals"),
            Some(json!({ "status": "approved" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .call(&roleless, Method::PUT, &format!("/api/v1/requirements/{id}/approve"), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn approve_and_reject_require_administrator() {
    let app = TestApp::in_memory().await;
    let buyer = TestUser::buyer();
    let id = app.submitted_requirement(&buyer).await;

    for action in ["approve", "reject"] {
        let (status, body) = app
            .call(&buyer, Method::PUT, &format!("/api/v1/requirements/{id}/{action}"), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{action}: {body}");
    }

    let (_, body) = app
        .call(&buyer, Method::GET, &format!("/api/v1/requirements/{id}"), None)
        .await;
    assert_eq!(body["data"]["status"], "pending_approval");
    assert_eq!(body["data"]["approvals"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn suppliers_cannot_record_approvals() {
    let app = TestApp::in_memory().await;
    let buyer = TestUser::buyer();
    let supplier = TestUser::supplier();
    let id = app.submitted_requirement(&buyer).await;

    let (status, _) = app
        .call(
            &supplier,
            Method::POST,
            &format!("/api/v1/requirements/{id}/approvals"),
            Some(json!({ "status": "approved" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn only_creator_or_admin_may_modify() {
    let app = TestApp::in_memory().await;
    let owner = TestUser::buyer();
    let stranger = TestUser::buyer();
    let admin = TestUser::admin();
    let id = app
        .create_requirement(
            &owner,
            json!([{ "name": "Pen", "quantity": "10", "unitOfMeasure": "box", "estimatedPrice": "3" }]),
        )
        .await;

    let attempts = [
        (Method::PUT, format!("/api/v1/requirements/{id}"), Some(json!({ "title": "Hijacked" }))),
        (
            Method::POST,
            format!("/api/v1/requirements/{id}/items"),
            Some(json!({ "name": "Ink", "quantity": "1", "unitOfMeasure": "ea" })),
        ),
        (Method::PUT, format!("/api/v1/requirements/{id}/submit"), None),
        (Method::PUT, format!("/api/v1/requirements/{id}/cancel"), None),
        (Method::DELETE, format!("/api/v1/requirements/{id}"), None),
    ];
    for (method, uri, body) in attempts {
        let (status, response) = app.call(&stranger, method.clone(), &uri, body).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}: {response}");
    }

    // Reads are open to any authenticated caller.
    let (status, _) = app
        .call(&stranger, Method::GET, &format!("/api/v1/requirements/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(
            &admin,
            Method::PUT,
            &format!("/api/v1/requirements/{id}"),
            Some(json!({ "title": "Stationery" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["title"], "Stationery");
}

#[tokio::test]
async fn ownership_is_checked_before_status() {
    let app = TestApp::in_memory().await;
    let owner = TestUser::buyer();
    let stranger = TestUser::buyer();
    let id = app.submitted_requirement(&owner).await;

    // Pending requirements are not editable, but a stranger learns only that they are forbidden.
    let (status, _) = app
        .call(
            &stranger,
            Method::PUT,
            &format!("/api/v1/requirements/{id}"),
            Some(json!({ "title": "x" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(
            &owner,
            Method::PUT,
            &format!("/api/v1/requirements/{id}"),
            Some(json!({ "title": "x" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn public_endpoints_need_no_token() {
    let app = TestApp::in_memory().await;

    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());

    let response = app.request(Method::GET, "/health/ready", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.request(Method::GET, "/metrics", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(Method::GET, "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn responses_carry_request_ids() {
    let app = TestApp::in_memory().await;

    let response = app
        .request(Method::GET, "/api/v1/requirements", None, None)
        .await;
    assert!(response.headers().contains_key("x-request-id"));
    let body = response_json(response).await;
    assert!(body["request_id"].is_string());
}
