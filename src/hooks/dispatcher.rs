//! Ordered, vetoable hook chains.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

use crate::hooks::HandlerContext;

/// A registered hook.
///
/// Receives the shared context and the request's opaque data; its return
/// value becomes the context's `result`.
pub type Hook =
    dyn for<'a> Fn(&'a mut HandlerContext, &'a Value) -> BoxFuture<'a, bool> + Send + Sync;

/// Registry of hook chains keyed by event name.
///
/// Handlers for one event run strictly in registration order. There is no
/// short-circuit: every handler runs, and a later one can reverse an
/// earlier decision.
pub struct HookDispatcher<K> {
    handlers: RwLock<HashMap<K, Vec<Arc<Hook>>>>,
    globals: Map<String, Value>,
}

impl<K> HookDispatcher<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    pub fn new() -> Self {
        Self::with_globals(Map::new())
    }

    /// Dispatcher whose contexts always start with `globals` in their fields.
    pub fn with_globals(globals: Map<String, Value>) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            globals,
        }
    }

    /// Append a handler to `event`'s chain. Handlers cannot be removed.
    pub fn register<F>(&self, event: K, handler: F)
    where
        F: for<'a> Fn(&'a mut HandlerContext, &'a Value) -> BoxFuture<'a, bool>
            + Send
            + Sync
            + 'static,
    {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.entry(event).or_default().push(Arc::new(handler));
    }

    pub fn handler_count(&self, event: &K) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.get(event).map_or(0, Vec::len)
    }

    /// Run `event`'s chain over `seed` and return the final context.
    ///
    /// The context starts from the globals with the seed's fields laid on
    /// top; `result`, `remote` and `state` come from the seed. With no
    /// handlers the seed's `result` is returned untouched.
    pub async fn dispatch(&self, event: &K, data: &Value, seed: HandlerContext) -> HandlerContext {
        // Snapshot the chain so registration never waits on a running dispatch.
        let chain: Vec<Arc<Hook>> = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            handlers.get(event).cloned().unwrap_or_default()
        };

        let mut ctx = seed;
        if !self.globals.is_empty() {
            let mut fields = self.globals.clone();
            fields.extend(std::mem::take(&mut ctx.fields));
            ctx.fields = fields;
        }

        for (position, handler) in chain.iter().enumerate() {
            let decision = handler(&mut ctx, data).await;
            tracing::trace!(event = ?event, position, decision, "Hook ran");
            ctx.result = Some(decision);
        }

        ctx
    }
}

impl<K> Default for HookDispatcher<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::state::ConnectionState;
    use crate::peer::PeerId;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn seed() -> HandlerContext {
        HandlerContext::new(PeerId::new("remote"), ConnectionState::new()).with_result(true)
    }

    #[tokio::test]
    async fn no_handlers_keeps_seed_result() {
        let hooks: HookDispatcher<&str> = HookDispatcher::new();
        let ctx = hooks.dispatch(&"connect", &Value::Null, seed()).await;
        assert_eq!(ctx.result, Some(true));

        let unseeded = HandlerContext::new(PeerId::new("remote"), ConnectionState::new());
        let ctx = hooks.dispatch(&"connect", &Value::Null, unseeded).await;
        assert_eq!(ctx.result, None);
    }

    #[tokio::test]
    async fn last_handler_wins() {
        let hooks: HookDispatcher<&str> = HookDispatcher::new();
        hooks.register("connect", |_ctx, _data| Box::pin(async { true }));
        hooks.register("connect", |_ctx, _data| Box::pin(async { false }));
        assert_eq!(hooks.dispatch(&"connect", &Value::Null, seed()).await.result, Some(false));

        let reversed: HookDispatcher<&str> = HookDispatcher::new();
        reversed.register("connect", |_ctx, _data| Box::pin(async { false }));
        reversed.register("connect", |_ctx, _data| Box::pin(async { true }));
        assert_eq!(reversed.dispatch(&"connect", &Value::Null, seed()).await.result, Some(true));
    }

    #[tokio::test]
    async fn every_handler_runs_in_order_and_sees_previous_result() {
        let hooks: HookDispatcher<&str> = HookDispatcher::new();
        hooks.register("connect", |ctx, _data| {
            Box::pin(async move {
                ctx.state.insert("order", json!(["first"]));
                false
            })
        });
        hooks.register("connect", |ctx, _data| {
            Box::pin(async move {
                // The denial above does not stop the chain.
                assert_eq!(ctx.result, Some(false));
                tokio::task::yield_now().await;
                ctx.state.with(|map| {
                    if let Some(Value::Array(order)) = map.get_mut("order") {
                        order.push(json!("second"));
                    }
                });
                true
            })
        });

        let ctx = hooks.dispatch(&"connect", &Value::Null, seed()).await;
        assert_eq!(ctx.result, Some(true));
        assert_eq!(ctx.state.get("order"), Some(json!(["first", "second"])));
    }

    #[tokio::test]
    async fn handlers_receive_data_and_only_their_event() {
        let calls = Arc::new(AtomicUsize::new(0));
        let hooks: HookDispatcher<&str> = HookDispatcher::new();
        let seen = calls.clone();
        hooks.register("disconnect", move |_ctx, data| {
            let seen = seen.clone();
            Box::pin(async move {
                seen.fetch_add(1, Ordering::SeqCst);
                data == &json!("let it go")
            })
        });

        let ctx = hooks.dispatch(&"connect", &json!("let it go"), seed()).await;
        assert_eq!(ctx.result, Some(true));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let ctx = hooks.dispatch(&"disconnect", &json!("let it go"), seed()).await;
        assert_eq!(ctx.result, Some(true));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.handler_count(&"disconnect"), 1);
        assert_eq!(hooks.handler_count(&"connect"), 0);
    }

    #[tokio::test]
    async fn seed_fields_override_globals() {
        let mut globals = Map::new();
        globals.insert("node".into(), json!("local"));
        globals.insert("mode".into(), json!("global"));
        let hooks: HookDispatcher<&str> = HookDispatcher::with_globals(globals);

        let ctx = hooks
            .dispatch(&"connect", &Value::Null, seed().with_field("mode", "seed"))
            .await;
        assert_eq!(ctx.fields.get("node"), Some(&json!("local")));
        assert_eq!(ctx.fields.get("mode"), Some(&json!("seed")));
    }
}
