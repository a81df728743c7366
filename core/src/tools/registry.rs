use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::plan::ToolInput;

/// Per-call context handed to a tool.
///
/// `cancel` fires on plan cancellation and on timeout; tools that honour it
/// should return promptly once it does.
#[derive(Debug, Clone)]
pub struct ToolCallContext {
    pub step_id: String,
    pub cancel: CancellationToken,
    pub timeout: Duration,
}

/// A callable tool. Output is passed through to the step untouched.
#[async_trait]
pub trait ToolHandle: Send + Sync {
    fn name(&self) -> &str;
    async fn call(&self, input: &ToolInput, ctx: ToolCallContext) -> anyhow::Result<Value>;
}

/// Name lookup for tools. Must tolerate concurrent reads.
pub trait ToolRegistry: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<dyn ToolHandle>>;
}

/// Name-keyed tool map.
#[derive(Default)]
pub struct InMemoryToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn ToolHandle>>>,
}

impl InMemoryToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&self, tool: Arc<dyn ToolHandle>) {
        let mut tools = self.tools.write().unwrap_or_else(|e| e.into_inner());
        tools.insert(tool.name().to_string(), tool);
    }

    /// Remove a tool by name. Returns whether it was present.
    pub fn unregister(&self, name: &str) -> bool {
        let mut tools = self.tools.write().unwrap_or_else(|e| e.into_inner());
        tools.remove(name).is_some()
    }

    /// Return sorted list of registered tool names.
    pub fn tool_names(&self) -> Vec<String> {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = tools.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ToolRegistry for InMemoryToolRegistry {
    fn resolve(&self, name: &str) -> Option<Arc<dyn ToolHandle>> {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        tools.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Named(&'static str);

    #[async_trait]
    impl ToolHandle for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn call(&self, _input: &ToolInput, _ctx: ToolCallContext) -> anyhow::Result<Value> {
            Ok(json!(self.0))
        }
    }

    #[test]
    fn register_resolve_unregister() {
        let registry = InMemoryToolRegistry::new();
        registry.register(Arc::new(Named("quote")));
        registry.register(Arc::new(Named("news")));

        assert_eq!(registry.tool_names(), vec!["news".to_string(), "quote".to_string()]);
        assert!(registry.resolve("quote").is_some());
        assert!(registry.resolve("missing").is_none());

        assert!(registry.unregister("quote"));
        assert!(!registry.unregister("quote"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn resolved_handle_is_callable() {
        let registry = InMemoryToolRegistry::new();
        registry.register(Arc::new(Named("echo")));

        let handle = registry.resolve("echo").unwrap();
        let ctx = ToolCallContext {
            step_id: "s1".into(),
            cancel: CancellationToken::new(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(handle.call(&ToolInput::new(), ctx).await.unwrap(), json!("echo"));
    }
}
