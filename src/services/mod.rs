/// OpenAPI documentation generation.
pub mod documentation;
/// Authoring form and prompt rendering.
pub mod form;
/// Health check service.
pub mod health_service;
/// Validation and commit of finalized input into drafts.
pub mod reconciler;
/// Admin role checks.
pub mod roles;
/// Draft store connection supervisor with backoff.
pub mod storage_supervisor;
/// Eviction of abandoned authoring state.
pub mod sweeper;
/// Outbound chat platform calls.
pub mod transport;
/// Dispatch of incoming chat updates.
pub mod update_service;
/// Authoring operations behind the form buttons.
pub mod wizard_service;
