use crate::{
    auth::AuthUser,
    errors::{ApiError, ErrorResponse},
    handlers::common::{
        created_response, success_response, CancelRequest, DecisionComments, IdPath,
        OptionalJson, PaginationMeta, RequirementListQuery, ValidatedJson, ValidatedQuery,
    },
    models::{
        ApprovalDecision, ItemChanges, NewRequirement, NewRequirementItem, Requirement,
        RequirementApproval, RequirementChanges, RequirementDetails, RequirementItem,
    },
    services::requirements::RequirementService,
    ApiResponse, AppState,
};
use axum::{
    extract::State,
    response::Response,
    routing::{get, put},
    Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Body of the requirement listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct RequirementListResponse {
    pub requirements: Vec<Requirement>,
    pub pagination: PaginationMeta,
}

fn service(state: &AppState) -> Arc<RequirementService> {
    state.services.requirements.clone()
}

/// Routes mounted under `/api/v1`; every one requires a bearer token.
pub fn requirement_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/requirements",
            get(list_requirements).post(create_requirement),
        )
        .route(
            "/requirements/:id",
            get(get_requirement)
                .put(update_requirement)
                .delete(delete_requirement),
        )
        .route("/requirements/:id/items", get(list_items).post(add_item))
        .route(
            "/requirements/:id/items/:item_id",
            put(update_item).delete(delete_item),
        )
        .route(
            "/requirements/:id/approvals",
            get(list_approvals).post(record_approval),
        )
        .route("/requirements/:id/submit", put(submit_requirement))
        .route("/requirements/:id/approve", put(approve_requirement))
        .route("/requirements/:id/reject", put(reject_requirement))
        .route("/requirements/:id/cancel", put(cancel_requirement))
        .route("/requirements/:id/complete", put(complete_requirement))
}

/// Create a draft requirement
#[utoipa::path(
    post,
    path = "/api/v1/requirements",
    summary = "Create requirement",
    description = "Create a draft requirement owned by the caller, optionally with initial items",
    request_body = NewRequirement,
    responses(
        (status = 201, description = "Requirement created", body = ApiResponse<RequirementDetails>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 403, description = "Missing or invalid token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "requirements"
)]
pub async fn create_requirement(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(input): ValidatedJson<NewRequirement>,
) -> Result<Response, ApiError> {
    let details = service(&state).create_requirement(&user, input).await?;
    Ok(created_response(details))
}

/// List requirements
#[utoipa::path(
    get,
    path = "/api/v1/requirements",
    summary = "List requirements",
    description = "Newest first, filtered and paginated with limit/offset",
    params(RequirementListQuery),
    responses(
        (status = 200, description = "Requirements retrieved", body = ApiResponse<RequirementListResponse>),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
        (status = 403, description = "Missing or invalid token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "requirements"
)]
pub async fn list_requirements(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedQuery(query): ValidatedQuery<RequirementListQuery>,
) -> Result<Response, ApiError> {
    let filter = query.filter()?;
    let page = service(&state)
        .list_requirements(&user, filter, query.limit, query.offset)
        .await?;

    let pagination = PaginationMeta {
        total: page.total,
        limit: page.limit,
        offset: page.offset,
        has_more: page.has_more(),
    };
    Ok(success_response(RequirementListResponse {
        requirements: page.requirements,
        pagination,
    }))
}

/// Get a requirement with its items and approvals
#[utoipa::path(
    get,
    path = "/api/v1/requirements/{id}",
    summary = "Get requirement",
    params(("id" = Uuid, Path, description = "Requirement ID")),
    responses(
        (status = 200, description = "Requirement retrieved", body = ApiResponse<RequirementDetails>),
        (status = 403, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Requirement not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "requirements"
)]
pub async fn get_requirement(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath<Uuid>,
) -> Result<Response, ApiError> {
    let details = service(&state).get_requirement(&user, id).await?;
    Ok(success_response(details))
}

/// Update a draft or rejected requirement
#[utoipa::path(
    put,
    path = "/api/v1/requirements/{id}",
    summary = "Update requirement",
    description = "Partial update; only the creator or an administrator may edit",
    params(("id" = Uuid, Path, description = "Requirement ID")),
    request_body = RequirementChanges,
    responses(
        (status = 200, description = "Requirement updated", body = ApiResponse<Requirement>),
        (status = 400, description = "Invalid data or status", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Requirement not found", body = ErrorResponse),
        (status = 409, description = "Concurrent modification", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "requirements"
)]
pub async fn update_requirement(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath<Uuid>,
    ValidatedJson(changes): ValidatedJson<RequirementChanges>,
) -> Result<Response, ApiError> {
    let requirement = service(&state)
        .update_requirement(&user, id, changes)
        .await?;
    Ok(success_response(requirement))
}

/// Delete a draft requirement
#[utoipa::path(
    delete,
    path = "/api/v1/requirements/{id}",
    summary = "Delete requirement",
    params(("id" = Uuid, Path, description = "Requirement ID")),
    responses(
        (status = 200, description = "Requirement deleted"),
        (status = 400, description = "Requirement is not a draft", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Requirement not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "requirements"
)]
pub async fn delete_requirement(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath<Uuid>,
) -> Result<Response, ApiError> {
    service(&state).delete_requirement(&user, id).await?;
    Ok(success_response(json!({ "id": id, "deleted": true })))
}

/// List the items of a requirement
#[utoipa::path(
    get,
    path = "/api/v1/requirements/{id}/items",
    summary = "List items",
    params(("id" = Uuid, Path, description = "Requirement ID")),
    responses(
        (status = 200, description = "Items ordered by line number", body = ApiResponse<Vec<RequirementItem>>),
        (status = 404, description = "Requirement not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "items"
)]
pub async fn list_items(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath<Uuid>,
) -> Result<Response, ApiError> {
    let items = service(&state).list_items(&user, id).await?;
    Ok(success_response(items))
}

/// Add an item to a draft or rejected requirement
#[utoipa::path(
    post,
    path = "/api/v1/requirements/{id}/items",
    summary = "Add item",
    params(("id" = Uuid, Path, description = "Requirement ID")),
    request_body = NewRequirementItem,
    responses(
        (status = 201, description = "Item added", body = ApiResponse<RequirementItem>),
        (status = 400, description = "Invalid data or status", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Requirement not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "items"
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath<Uuid>,
    ValidatedJson(input): ValidatedJson<NewRequirementItem>,
) -> Result<Response, ApiError> {
    let item = service(&state).add_item(&user, id, input).await?;
    Ok(created_response(item))
}

/// Update an item
#[utoipa::path(
    put,
    path = "/api/v1/requirements/{id}/items/{item_id}",
    summary = "Update item",
    params(
        ("id" = Uuid, Path, description = "Requirement ID"),
        ("item_id" = Uuid, Path, description = "Item ID"),
    ),
    request_body = ItemChanges,
    responses(
        (status = 200, description = "Item updated", body = ApiResponse<RequirementItem>),
        (status = 400, description = "Invalid data or status", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Requirement or item not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "items"
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath((id, item_id)): IdPath<(Uuid, Uuid)>,
    ValidatedJson(changes): ValidatedJson<ItemChanges>,
) -> Result<Response, ApiError> {
    let item = service(&state)
        .update_item(&user, id, item_id, changes)
        .await?;
    Ok(success_response(item))
}

/// Remove an item
#[utoipa::path(
    delete,
    path = "/api/v1/requirements/{id}/items/{item_id}",
    summary = "Delete item",
    params(
        ("id" = Uuid, Path, description = "Requirement ID"),
        ("item_id" = Uuid, Path, description = "Item ID"),
    ),
    responses(
        (status = 200, description = "Item removed"),
        (status = 400, description = "Requirement is not editable", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Requirement or item not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "items"
)]
pub async fn delete_item(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath((id, item_id)): IdPath<(Uuid, Uuid)>,
) -> Result<Response, ApiError> {
    service(&state).delete_item(&user, id, item_id).await?;
    Ok(success_response(json!({ "id": item_id, "deleted": true })))
}

/// List approval records
#[utoipa::path(
    get,
    path = "/api/v1/requirements/{id}/approvals",
    summary = "List approvals",
    params(("id" = Uuid, Path, description = "Requirement ID")),
    responses(
        (status = 200, description = "Approvals ordered by creation time", body = ApiResponse<Vec<RequirementApproval>>),
        (status = 404, description = "Requirement not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "approvals"
)]
pub async fn list_approvals(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath<Uuid>,
) -> Result<Response, ApiError> {
    let approvals = service(&state).list_approvals(&user, id).await?;
    Ok(success_response(approvals))
}

/// Record an approver decision
#[utoipa::path(
    post,
    path = "/api/v1/requirements/{id}/approvals",
    summary = "Record approval",
    description = "Administrators and buyers may record `approved` or `rejected` while the requirement is pending approval",
    params(("id" = Uuid, Path, description = "Requirement ID")),
    request_body = ApprovalDecision,
    responses(
        (status = 201, description = "Decision recorded", body = ApiResponse<RequirementApproval>),
        (status = 400, description = "Invalid decision or status", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Requirement not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "approvals"
)]
pub async fn record_approval(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath<Uuid>,
    ValidatedJson(decision): ValidatedJson<ApprovalDecision>,
) -> Result<Response, ApiError> {
    let approval = service(&state).record_approval(&user, id, decision).await?;
    Ok(created_response(approval))
}

/// Submit for approval
#[utoipa::path(
    put,
    path = "/api/v1/requirements/{id}/submit",
    summary = "Submit requirement",
    params(("id" = Uuid, Path, description = "Requirement ID")),
    responses(
        (status = 200, description = "Requirement pending approval", body = ApiResponse<Requirement>),
        (status = 400, description = "Not a draft/rejected requirement, or no items", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Requirement not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "workflow"
)]
pub async fn submit_requirement(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath<Uuid>,
) -> Result<Response, ApiError> {
    let requirement = service(&state).submit(&user, id).await?;
    Ok(success_response(requirement))
}

/// Approve a pending requirement
#[utoipa::path(
    put,
    path = "/api/v1/requirements/{id}/approve",
    summary = "Approve requirement",
    params(("id" = Uuid, Path, description = "Requirement ID")),
    request_body(content = DecisionComments, description = "Optional comments"),
    responses(
        (status = 200, description = "Decision recorded", body = ApiResponse<Requirement>),
        (status = 400, description = "Requirement is not pending approval", body = ErrorResponse),
        (status = 403, description = "Administrator role required", body = ErrorResponse),
        (status = 404, description = "Requirement not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "workflow"
)]
pub async fn approve_requirement(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath<Uuid>,
    OptionalJson(body): OptionalJson<DecisionComments>,
) -> Result<Response, ApiError> {
    let comments = body.and_then(|b| b.comments);
    let requirement = service(&state).approve(&user, id, comments).await?;
    Ok(success_response(requirement))
}

/// Reject a pending requirement
#[utoipa::path(
    put,
    path = "/api/v1/requirements/{id}/reject",
    summary = "Reject requirement",
    params(("id" = Uuid, Path, description = "Requirement ID")),
    request_body(content = DecisionComments, description = "Optional comments"),
    responses(
        (status = 200, description = "Decision recorded", body = ApiResponse<Requirement>),
        (status = 400, description = "Requirement is not pending approval", body = ErrorResponse),
        (status = 403, description = "Administrator role required", body = ErrorResponse),
        (status = 404, description = "Requirement not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "workflow"
)]
pub async fn reject_requirement(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath<Uuid>,
    OptionalJson(body): OptionalJson<DecisionComments>,
) -> Result<Response, ApiError> {
    let comments = body.and_then(|b| b.comments);
    let requirement = service(&state).reject(&user, id, comments).await?;
    Ok(success_response(requirement))
}

/// Cancel a requirement
#[utoipa::path(
    put,
    path = "/api/v1/requirements/{id}/cancel",
    summary = "Cancel requirement",
    params(("id" = Uuid, Path, description = "Requirement ID")),
    request_body(content = CancelRequest, description = "Optional cancellation reason"),
    responses(
        (status = 200, description = "Requirement cancelled", body = ApiResponse<Requirement>),
        (status = 400, description = "Already completed or cancelled", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Requirement not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "workflow"
)]
pub async fn cancel_requirement(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath<Uuid>,
    OptionalJson(body): OptionalJson<CancelRequest>,
) -> Result<Response, ApiError> {
    let reason = body.and_then(|b| b.reason);
    let requirement = service(&state).cancel(&user, id, reason).await?;
    Ok(success_response(requirement))
}

/// Complete an approved requirement
#[utoipa::path(
    put,
    path = "/api/v1/requirements/{id}/complete",
    summary = "Complete requirement",
    params(("id" = Uuid, Path, description = "Requirement ID")),
    responses(
        (status = 200, description = "Requirement completed", body = ApiResponse<Requirement>),
        (status = 400, description = "Requirement is not approved", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Requirement not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "workflow"
)]
pub async fn complete_requirement(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath<Uuid>,
) -> Result<Response, ApiError> {
    let requirement = service(&state).complete(&user, id).await?;
    Ok(success_response(requirement))
}
