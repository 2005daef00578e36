//! Plugin handlers observe or gate hook events outside the core pipeline.
//! Handlers with `priority() < 50` run before core handling and may deny;
//! handlers with `priority() >= 50` run after and may only observe.

use crate::event::HookEvent;
use crate::response::HookResponse;

pub trait PluginHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Lower runs first. `< 50` is pre-core and gating, `>= 50` is
    /// post-core and observe-only.
    fn priority(&self) -> u8;

    fn handle(&self, event: &HookEvent) -> anyhow::Result<Option<HookResponse>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::HookEventType;
    use gobby_core::CliSource;

    struct AlwaysDeny;
    impl PluginHandler for AlwaysDeny {
        fn name(&self) -> &str {
            "always-deny"
        }
        fn priority(&self) -> u8 {
            10
        }
        fn handle(&self, _event: &HookEvent) -> anyhow::Result<Option<HookResponse>> {
            Ok(Some(HookResponse::deny("nope")))
        }
    }

    #[test]
    fn test_handler_runs_and_denies() {
        let handler = AlwaysDeny;
        let event = HookEvent::new(HookEventType::ToolCall, CliSource::ClaudeCode, Some("s1".into()), serde_json::Value::Null);
        let resp = handler.handle(&event).unwrap().unwrap();
        assert!(resp.is_deny());
        assert!(handler.priority() < 50);
    }
}
