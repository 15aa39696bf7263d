use crate::domain::model::{Dependency, ScopeValue};
use serde_json::Value;
use std::rc::Rc;

/// Listener invoked with `(old, new)` when a watched path changes.
pub type WatchListener = Box<dyn FnMut(Option<&ScopeValue>, Option<&ScopeValue>)>;

/// Work queued for the host's next update pass.
pub type DeferredTask = Box<dyn FnOnce()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(pub u64);

/// The mutable view state owned by the host framework.
///
/// Paths are dot-separated and relative to the object the handle points at.
pub trait ViewState {
    fn get(&self, path: &str) -> Option<ScopeValue>;

    fn set(&self, path: &str, value: ScopeValue);

    /// Create a fresh, empty nested object under `name` and return a handle rooted there.
    fn child(&self, name: &str) -> Rc<dyn ViewState>;

    fn watch(&self, path: &str, listener: WatchListener, deep: bool) -> WatchId;

    fn emit(&self, event: &str, payload: Value);

    /// The declaration text ("Widget as w") the host attached to this view state.
    fn declaration(&self) -> Option<String> {
        None
    }

    fn set_declaration(&self, _text: &str) {}

    /// Whether [`ViewState::defer`] queues work for a later pass.
    fn supports_defer(&self) -> bool {
        false
    }

    /// Queue `task` for the next update pass. Hosts without a queue run it immediately.
    fn defer(&self, task: DeferredTask) {
        task()
    }
}

/// The host's dependency-injection container, seen by name.
pub trait Injector {
    fn get(&self, name: &str) -> Option<Dependency>;
}
