mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, TestUser};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn create_rejects_missing_and_invalid_fields() {
    let app = TestApp::new().await;
    let buyer = TestUser::buyer();

    let cases = [
        json!({ "priority": "high" }),
        json!({ "title": "", "priority": "high" }),
        json!({ "title": "Paper", "priority": "urgent" }),
        json!({ "title": "Paper", "priority": "low", "warrantyDuration": -1 }),
        json!({ "title": "Paper", "priority": "low", "items": [{ "name": "A4", "quantity": "0", "unitOfMeasure": "ream" }] }),
        json!({ "title": "Paper", "priority": "low", "items": [{ "name": "A4", "quantity": "1" }] }),
        json!({ "title": "Paper", "priority": "low", "items": [{ "name": "A4", "quantity": "1", "unitOfMeasure": "ream", "estimatedPrice": "-2" }] }),
    ];
    for payload in cases {
        let (status, body) = app
            .call(&buyer, Method::POST, "/api/v1/requirements", Some(payload.clone()))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload} -> {body}");
    }

    let (_, body) = app
        .call(&buyer, Method::GET, "/api/v1/requirements", None)
        .await;
    assert_eq!(body["data"]["pagination"]["total"], 0);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = TestApp::new().await;
    let buyer = TestUser::buyer();

    let response = app
        .request(
            Method::POST,
            "/api/v1/requirements",
            Some(json!("just a string")),
            Some(&buyer.token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let app = TestApp::new().await;
    let buyer = TestUser::buyer();
    let missing = Uuid::new_v4();

    for (method, uri) in [
        (Method::GET, format!("/api/v1/requirements/{missing}")),
        (Method::DELETE, format!("/api/v1/requirements/{missing}")),
        (Method::PUT, format!("/api/v1/requirements/{missing}/submit")),
        (Method::GET, format!("/api/v1/requirements/{missing}/approvals")),
    ] {
        let (status, body) = app.call(&buyer, method.clone(), &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}: {body}");
    }

    let id = app.create_requirement(&buyer, json!([])).await;
    let (status, _) = app
        .call(
            &buyer,
            Method::PUT,
            &format!("/api/v1/requirements/{id}/items/{missing}"),
            Some(json!({ "name": "Ghost" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_guards_reject_out_of_order_actions() {
    let app = TestApp::new().await;
    let buyer = TestUser::buyer();
    let admin = TestUser::admin();

    // A draft without items cannot be submitted.
    let empty = app.create_requirement(&buyer, json!([])).await;
    let (status, _) = app
        .call(&buyer, Method::PUT, &format!("/api/v1/requirements/{empty}/submit"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Drafts do not accept approvals and cannot be completed.
    let (status, _) = app
        .call(&admin, Method::PUT, &format!("/api/v1/requirements/{empty}/approve"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .call(&buyer, Method::PUT, &format!("/api/v1/requirements/{empty}/complete"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Pending requirements cannot be deleted, edited, or resubmitted.
    let pending = app.submitted_requirement(&buyer).await;
    for (method, uri, body) in [
        (Method::DELETE, format!("/api/v1/requirements/{pending}"), None),
        (
            Method::POST,
            format!("/api/v1/requirements/{pending}/items"),
            Some(json!({ "name": "Mouse", "quantity": "1", "unitOfMeasure": "ea" })),
        ),
        (Method::PUT, format!("/api/v1/requirements/{pending}/submit"), None),
    ] {
        let (status, response) = app.call(&buyer, method.clone(), &uri, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}: {response}");
    }

    let (_, body) = app
        .call(&buyer, Method::GET, &format!("/api/v1/requirements/{pending}"), None)
        .await;
    assert_eq!(body["data"]["status"], "pending_approval");
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn approval_body_must_be_a_decision() {
    let app = TestApp::new().await;
    let buyer = TestUser::buyer();
    let admin = TestUser::admin();
    let id = app.submitted_requirement(&buyer).await;

    for payload in [json!({ "status": "pending" }), json!({ "status": "maybe" }), json!({})] {
        let (status, body) = app
            .call(
                &admin,
                Method::POST,
                &format!("/api/v1/requirements/{id}/approvals"),
                Some(payload.clone()),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload} -> {body}");
    }
}

#[tokio::test]
async fn empty_update_is_rejected() {
    let app = TestApp::new().await;
    let buyer = TestUser::buyer();
    let id = app.create_requirement(&buyer, json!([])).await;

    let (status, body) = app
        .call(&buyer, Method::PUT, &format!("/api/v1/requirements/{id}"), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("No fields provided"));
}

#[tokio::test]
async fn list_rejects_unknown_filters_values() {
    let app = TestApp::new().await;
    let buyer = TestUser::buyer();

    let (status, body) = app
        .call(&buyer, Method::GET, "/api/v1/requirements?priority=urgent", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]
        .as_str()
        .unwrap_or_default()
        .starts_with("Invalid priority"));
}

#[tokio::test]
async fn oversized_quantities_and_prices_are_rejected() {
    let app = TestApp::new().await;
    let buyer = TestUser::buyer();
    let id = app
        .create_requirement(
            &buyer,
            json!([{ "name": "Chair", "quantity": "2", "unitOfMeasure": "ea", "estimatedPrice": "10" }]),
        )
        .await;
    let uri = format!("/api/v1/requirements/{id}/items");

    for payload in [
        json!({ "name": "Huge", "quantity": "10000000000000000000", "unitOfMeasure": "ea", "estimatedPrice": "10000000000000000000" }),
        json!({ "name": "Many", "quantity": "1000000000", "unitOfMeasure": "ea", "estimatedPrice": "1000000000" }),
    ] {
        let (status, body) = app
            .call(&buyer, Method::POST, &uri, Some(payload.clone()))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload} -> {body}");
    }

    let (status, body) = app
        .call(&buyer, Method::GET, &format!("/api/v1/requirements/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(common::decimal(&body["data"]["totalPrice"]), rust_decimal_macros::dec!(20));

    // Later item writes still succeed.
    let (status, body) = app
        .call(
            &buyer,
            Method::POST,
            &uri,
            Some(json!({ "name": "Lamp", "quantity": "1", "unitOfMeasure": "ea", "estimatedPrice": "5" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}

#[tokio::test]
async fn malformed_ids_are_not_found_with_error_body() {
    let app = TestApp::new().await;
    let buyer = TestUser::buyer();
    let id = app.create_requirement(&buyer, json!([])).await;

    for (method, uri) in [
        (Method::GET, "/api/v1/requirements/not-a-uuid".to_string()),
        (Method::PUT, "/api/v1/requirements/42/submit".to_string()),
        (Method::DELETE, format!("/api/v1/requirements/{id}/items/nope")),
    ] {
        let (status, body) = app.call(&buyer, method, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}: {body}");
        assert_eq!(body["error"], "Not Found");
        assert!(body["request_id"].is_string(), "{body}");
    }
}

#[tokio::test]
async fn malformed_query_values_are_bad_requests_with_error_body() {
    let app = TestApp::new().await;
    let buyer = TestUser::buyer();

    let (status, body) = app
        .call(&buyer, Method::GET, "/api/v1/requirements?limit=ten", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["message"], "Validation failed");
    assert!(body["details"].is_string());
}
