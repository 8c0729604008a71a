/// Answer option normalization and checking.
pub mod answer_validator;
/// Identity of the process towards the store rules.
pub mod auth;
/// Reconciliation of the remote config mirror.
pub mod config_sync;
/// OpenAPI documentation generation.
pub mod documentation;
/// Host-driven match actions.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Lifeline activation and the phone-a-friend countdown.
pub mod lifeline_service;
/// Local question content.
pub mod question_bank;
/// Pure setup checks run before a match starts.
pub mod setup_readiness;
/// Team and prize ladder editing.
pub mod setup_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Store connection supervisor.
pub mod storage_supervisor;
