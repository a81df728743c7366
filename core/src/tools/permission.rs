use async_trait::async_trait;

/// Policy deciding whether a tool may run and whether a human must confirm
/// it first. Queried concurrently from every dispatched step.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn is_enabled(&self, tool: &str) -> bool;
    async fn requires_confirmation(&self, tool: &str) -> bool;
}

/// Enables every tool without confirmation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllGate;

#[async_trait]
impl PermissionGate for AllowAllGate {
    async fn is_enabled(&self, _tool: &str) -> bool {
        true
    }

    async fn requires_confirmation(&self, _tool: &str) -> bool {
        false
    }
}
