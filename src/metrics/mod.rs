//! Prometheus counters for the requirement workflow, exposed at `/metrics`.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use prometheus::{core::Collector, Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

use crate::errors::ServiceError;
use crate::events::RequirementEvent;
use crate::models::RequirementStatus;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref REQUIREMENTS_CREATED: IntCounter = registered(
        IntCounter::new(
            "procurement_requirements_created_total",
            "Total number of requirements created"
        )
        .expect("metric can be created")
    );
    pub static ref REQUIREMENTS_SUBMITTED: IntCounter = registered(
        IntCounter::new(
            "procurement_requirements_submitted_total",
            "Total number of submissions for approval"
        )
        .expect("metric can be created")
    );
    pub static ref APPROVAL_DECISIONS: IntCounterVec = registered(
        IntCounterVec::new(
            Opts::new(
                "procurement_approval_decisions_total",
                "Approval records by decision"
            ),
            &["status"]
        )
        .expect("metric can be created")
    );
    pub static ref STATUS_TRANSITIONS: IntCounterVec = registered(
        IntCounterVec::new(
            Opts::new(
                "procurement_status_transitions_total",
                "Requirement status transitions by target status"
            ),
            &["to"]
        )
        .expect("metric can be created")
    );
    pub static ref REQUEST_FAILURES: IntCounterVec = registered(
        IntCounterVec::new(
            Opts::new(
                "procurement_request_failures_total",
                "Failed requests by error kind"
            ),
            &["kind"]
        )
        .expect("metric can be created")
    );
}

fn registered<C: Collector + Clone + 'static>(collector: C) -> C {
    if let Err(e) = REGISTRY.register(Box::new(collector.clone())) {
        error!("Failed to register metric: {}", e);
    }
    collector
}

/// Updates counters for a dispatched domain event.
pub fn record_event(event: &RequirementEvent) {
    match event {
        RequirementEvent::RequirementCreated { .. } => REQUIREMENTS_CREATED.inc(),
        RequirementEvent::RequirementStatusChanged { to, .. } => {
            STATUS_TRANSITIONS.with_label_values(&[&to.to_string()]).inc();
            if *to == RequirementStatus::PendingApproval {
                REQUIREMENTS_SUBMITTED.inc();
            }
        }
        RequirementEvent::ApprovalRecorded { status, .. } => {
            APPROVAL_DECISIONS
                .with_label_values(&[&status.to_string()])
                .inc();
        }
        _ => {}
    }
}

pub fn record_failure(kind: &str) {
    REQUEST_FAILURES.with_label_values(&[kind]).inc();
}

/// Renders every registered metric in the Prometheus text format.
pub fn export() -> Result<String, ServiceError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| ServiceError::InternalError(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| ServiceError::InternalError(format!("Metrics are not UTF-8: {}", e)))
}

/// `GET /metrics`
pub async fn metrics_handler() -> Response {
    match export() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
