//! Business logic services layer

pub mod action_plan_service;
pub mod aggregation_service;
pub mod permission_service;
pub mod refresh_timer;
pub mod session_service;

pub use action_plan_service::EscalationRule;
pub use permission_service::{AccessDecision, PermissionService, RouteGuard};
pub use refresh_timer::RefreshTimer;
pub use session_service::{
    HttpTokenEndpoint, RefreshOutcome, RefreshStatus, RefreshTrigger, SessionManager,
    SessionOptions, TokenEndpoint,
};
