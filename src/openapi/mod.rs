use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::{common, requirements};
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Procurement API",
        version = "1.0.0",
        description = r#"
# Procurement Requirements API

Purchase requests ("requirements") with line items and a submission/approval workflow.

## Lifecycle

`draft` → `pending_approval` → `approved` → `completed`, with `rejected` returning to
`pending_approval` on resubmission and `cancelled` reachable from every open state.

## Authentication

Every `/api/v1` endpoint requires a bearer JWT issued by the identity provider:

```
Authorization: Bearer <token>
```

A missing, invalid or expired token is answered with `403`.

## Pagination

`GET /api/v1/requirements` accepts `limit` (default 10, max 100) and `offset`.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    tags(
        (name = "requirements", description = "Requirement management"),
        (name = "items", description = "Requirement line items"),
        (name = "approvals", description = "Approver decisions"),
        (name = "workflow", description = "Status transitions"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        requirements::create_requirement,
        requirements::list_requirements,
        requirements::get_requirement,
        requirements::update_requirement,
        requirements::delete_requirement,
        requirements::list_items,
        requirements::add_item,
        requirements::update_item,
        requirements::delete_item,
        requirements::list_approvals,
        requirements::record_approval,
        requirements::submit_requirement,
        requirements::approve_requirement,
        requirements::reject_requirement,
        requirements::cancel_requirement,
        requirements::complete_requirement,
        crate::health::health_check,
        crate::health::readiness_check,
    ),
    components(
        schemas(
            models::Requirement,
            models::RequirementItem,
            models::RequirementApproval,
            models::RequirementDetails,
            models::RequirementStatus,
            models::RequirementPriority,
            models::PaymentMethod,
            models::ApprovalStatus,
            models::NewRequirement,
            models::NewRequirementItem,
            models::RequirementChanges,
            models::ItemChanges,
            models::ApprovalDecision,
            common::PaginationMeta,
            common::CancelRequest,
            common::DecisionComments,
            requirements::RequirementListResponse,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

/// Registers the `Bearer` JWT security scheme referenced by the paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_requirement_routes() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Procurement API"));
        assert!(json.contains("/api/v1/requirements/{id}/approvals"));
        assert!(json.contains("/api/v1/requirements/{id}/complete"));
        assert!(json.contains("\"Bearer\""));
    }
}
