//! In-memory view state with a digest loop.
//!
//! [`Scope`] stands in for the host framework's scope object: a tree of
//! [`ScopeValue`] nodes addressed by dotted paths, deep or shallow watches that
//! fire during [`Scope::digest`], event emission and a deferred-task queue that
//! is drained at the start of every digest round.

use crate::config::Settings;
use crate::domain::model::ScopeValue;
use crate::domain::ports::{DeferredTask, ViewState, WatchId, WatchListener};
use crate::utils::error::{Result, ScopeError};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::Rc;

pub type EventListener = Box<dyn FnMut(&Value)>;

#[derive(Debug, Clone, PartialEq)]
pub struct EmittedEvent {
    pub name: String,
    pub payload: Value,
}

type SharedListener = Rc<RefCell<WatchListener>>;

struct Watcher {
    id: WatchId,
    path: Vec<String>,
    last: Option<ScopeValue>,
    deep: bool,
    listener: SharedListener,
}

struct Shared {
    data: RefCell<BTreeMap<String, ScopeValue>>,
    watchers: RefCell<Vec<Watcher>>,
    listeners: RefCell<BTreeMap<String, Vec<Rc<RefCell<EventListener>>>>>,
    events: RefCell<Vec<EmittedEvent>>,
    deferred: RefCell<VecDeque<DeferredTask>>,
    declarations: RefCell<BTreeMap<Vec<String>, String>>,
    next_watch: Cell<u64>,
    digesting: Cell<bool>,
    ttl: usize,
    defer_enabled: bool,
}

/// A handle onto a shared scope tree, rooted at `path`.
pub struct Scope {
    shared: Rc<Shared>,
    path: Vec<String>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("path", &self.path.join("."))
            .field("watchers", &self.shared.watchers.borrow().len())
            .field("ttl", &self.shared.ttl)
            .finish()
    }
}

struct DigestGuard<'a>(&'a Cell<bool>);

impl Drop for DigestGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

fn split_path(path: &str) -> impl Iterator<Item = String> + '_ {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

fn json_child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn lookup(root: &BTreeMap<String, ScopeValue>, path: &[String]) -> Option<ScopeValue> {
    let Some((first, rest)) = path.split_first() else {
        return Some(ScopeValue::Object(root.clone()));
    };
    let mut current = root.get(first)?;
    for (i, segment) in rest.iter().enumerate() {
        match current {
            ScopeValue::Object(children) => current = children.get(segment)?,
            ScopeValue::Data(value) => {
                let mut value = value;
                for segment in &rest[i..] {
                    value = json_child(value, segment)?;
                }
                return Some(ScopeValue::Data(value.clone()));
            }
            ScopeValue::Function(_) => return None,
        }
    }
    Some(current.clone())
}

fn insert(node: &mut BTreeMap<String, ScopeValue>, path: &[String], value: ScopeValue) {
    match path {
        [] => {}
        [last] => {
            node.insert(last.clone(), value);
        }
        [first, rest @ ..] => {
            let slot = node
                .entry(first.clone())
                .or_insert_with(ScopeValue::object);
            if let ScopeValue::Object(children) = &mut *slot {
                insert(children, rest, value);
                return;
            }
            // plain data in the way becomes an object node; JSON objects keep their keys
            let mut children = match std::mem::replace(slot, ScopeValue::object()) {
                ScopeValue::Data(Value::Object(map)) => map
                    .into_iter()
                    .map(|(key, value)| (key, ScopeValue::Data(value)))
                    .collect(),
                _ => BTreeMap::new(),
            };
            insert(&mut children, rest, value);
            *slot = ScopeValue::Object(children);
        }
    }
}

fn changed(last: &Option<ScopeValue>, current: &Option<ScopeValue>, deep: bool) -> bool {
    match (last, current) {
        (None, None) => false,
        (Some(a), Some(b)) if deep => a != b,
        (Some(a), Some(b)) => !a.shallow_eq(b),
        _ => true,
    }
}

impl Scope {
    pub fn new() -> Rc<Scope> {
        Self::with_options(10, true)
    }

    pub fn from_settings(settings: &Settings) -> Rc<Scope> {
        Self::with_options(settings.digest_ttl, true)
    }

    /// `ttl` bounds dirty rounds per digest; without `defer`, deferred tasks run
    /// immediately and components fall back to accessor observation.
    pub fn with_options(ttl: usize, defer: bool) -> Rc<Scope> {
        Rc::new(Scope {
            shared: Rc::new(Shared {
                data: RefCell::new(BTreeMap::new()),
                watchers: RefCell::new(Vec::new()),
                listeners: RefCell::new(BTreeMap::new()),
                events: RefCell::new(Vec::new()),
                deferred: RefCell::new(VecDeque::new()),
                declarations: RefCell::new(BTreeMap::new()),
                next_watch: Cell::new(0),
                digesting: Cell::new(false),
                ttl: ttl.max(1),
                defer_enabled: defer,
            }),
            path: Vec::new(),
        })
    }

    fn absolute(&self, path: &str) -> Vec<String> {
        let mut absolute = self.path.clone();
        absolute.extend(split_path(path));
        absolute
    }

    /// Data at `path`, with functions left out.
    pub fn get_value(&self, path: &str) -> Option<Value> {
        self.get(path).and_then(|value| value.to_data())
    }

    pub fn set_value(&self, path: &str, value: impl Into<Value>) {
        self.set(path, ScopeValue::Data(value.into()));
    }

    /// Invoke the function stored at `path`, as a template expression would.
    pub fn call(&self, path: &str, args: &[Value]) -> Option<Value> {
        match self.get(path)? {
            ScopeValue::Function(bound) => bound.call(args),
            _ => None,
        }
    }

    /// JSON rendering of everything under this handle.
    pub fn snapshot(&self) -> Value {
        self.get("")
            .map(|value| value.to_json())
            .unwrap_or(Value::Null)
    }

    pub fn on(&self, event: &str, listener: impl FnMut(&Value) + 'static) {
        let listener: EventListener = Box::new(listener);
        self.shared
            .listeners
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .push(Rc::new(RefCell::new(listener)));
    }

    pub fn events(&self) -> Vec<EmittedEvent> {
        self.shared.events.borrow().clone()
    }

    pub fn watcher_count(&self) -> usize {
        self.shared.watchers.borrow().len()
    }

    pub fn watched_paths(&self) -> Vec<String> {
        self.shared
            .watchers
            .borrow()
            .iter()
            .map(|w| w.path.join("."))
            .collect()
    }

    pub fn unwatch(&self, id: WatchId) -> bool {
        let mut watchers = self.shared.watchers.borrow_mut();
        let before = watchers.len();
        watchers.retain(|w| w.id != id);
        watchers.len() != before
    }

    pub fn pending_tasks(&self) -> usize {
        self.shared.deferred.borrow().len()
    }

    /// Run `f`, then digest.
    pub fn apply(&self, f: impl FnOnce(&Scope)) -> Result<usize> {
        f(self);
        self.digest()
    }

    /// Drain deferred tasks and fire dirty watchers until nothing changes.
    /// Returns how many listener calls were made.
    pub fn digest(&self) -> Result<usize> {
        if self.shared.digesting.replace(true) {
            return Err(ScopeError::DigestInProgress);
        }
        let _guard = DigestGuard(&self.shared.digesting);

        let ttl = self.shared.ttl;
        let mut rounds = 0;
        let mut fired = 0;
        loop {
            self.run_deferred();
            let dirty = self.collect_dirty();
            if dirty.is_empty() && self.shared.deferred.borrow().is_empty() {
                break;
            }
            rounds += 1;
            if rounds > ttl {
                tracing::warn!("digest gave up after {} rounds", ttl);
                return Err(ScopeError::DigestLimit { ttl });
            }
            for (listener, old, new) in dirty {
                (listener.borrow_mut())(old.as_ref(), new.as_ref());
                fired += 1;
            }
        }
        tracing::trace!("digest settled after {} round(s), {} listener call(s)", rounds, fired);
        Ok(fired)
    }

    fn run_deferred(&self) {
        loop {
            let task = self.shared.deferred.borrow_mut().pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    fn collect_dirty(&self) -> Vec<(SharedListener, Option<ScopeValue>, Option<ScopeValue>)> {
        let data = self.shared.data.borrow();
        let mut watchers = self.shared.watchers.borrow_mut();
        let mut dirty = Vec::new();
        for watcher in watchers.iter_mut() {
            let current = lookup(&data, &watcher.path);
            if changed(&watcher.last, &current, watcher.deep) {
                let old = std::mem::replace(&mut watcher.last, current.clone());
                dirty.push((Rc::clone(&watcher.listener), old, current));
            }
        }
        dirty
    }
}

impl ViewState for Scope {
    fn get(&self, path: &str) -> Option<ScopeValue> {
        lookup(&self.shared.data.borrow(), &self.absolute(path))
    }

    fn set(&self, path: &str, value: ScopeValue) {
        let absolute = self.absolute(path);
        insert(&mut self.shared.data.borrow_mut(), &absolute, value);
    }

    fn child(&self, name: &str) -> Rc<dyn ViewState> {
        self.set(name, ScopeValue::object());
        let path = self.absolute(name);
        // 新物件沒有宣告
        self.shared.declarations.borrow_mut().remove(&path);
        Rc::new(Scope {
            shared: Rc::clone(&self.shared),
            path,
        })
    }

    fn watch(&self, path: &str, listener: WatchListener, deep: bool) -> WatchId {
        let id = WatchId(self.shared.next_watch.get());
        self.shared.next_watch.set(id.0 + 1);
        let absolute = self.absolute(path);
        let last = lookup(&self.shared.data.borrow(), &absolute);
        tracing::trace!("watching '{}' (deep: {})", absolute.join("."), deep);
        self.shared.watchers.borrow_mut().push(Watcher {
            id,
            path: absolute,
            last,
            deep,
            listener: Rc::new(RefCell::new(listener)),
        });
        id
    }

    fn emit(&self, event: &str, payload: Value) {
        self.shared.events.borrow_mut().push(EmittedEvent {
            name: event.to_string(),
            payload: payload.clone(),
        });
        let listeners = self
            .shared
            .listeners
            .borrow()
            .get(event)
            .cloned()
            .unwrap_or_default();
        for listener in listeners {
            // 監聽器內再次 emit 同一事件時，不重入正在執行的監聽器
            match listener.try_borrow_mut() {
                Ok(mut call) => call(&payload),
                Err(_) => tracing::trace!("skipping re-entrant listener for '{}'", event),
            }
        }
    }

    fn declaration(&self) -> Option<String> {
        self.shared.declarations.borrow().get(&self.path).cloned()
    }

    fn set_declaration(&self, text: &str) {
        self.shared
            .declarations
            .borrow_mut()
            .insert(self.path.clone(), text.to_string());
    }

    fn supports_defer(&self) -> bool {
        self.shared.defer_enabled
    }

    fn defer(&self, task: DeferredTask) {
        if self.shared.defer_enabled {
            self.shared.deferred.borrow_mut().push_back(task);
        } else {
            task();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dotted_paths() {
        let scope = Scope::new();
        scope.set_value("user.name", "ada");
        scope.set_value("count", 3);
        assert_eq!(scope.get_value("user.name"), Some(json!("ada")));
        assert_eq!(scope.get_value("user"), Some(json!({"name": "ada"})));
        assert_eq!(scope.snapshot(), json!({"count": 3, "user": {"name": "ada"}}));
    }

    #[test]
    fn test_reads_descend_into_json() {
        let scope = Scope::new();
        scope.set_value("config", json!({"theme": {"dark": true}, "tags": ["a", "b"]}));
        assert_eq!(scope.get_value("config.theme.dark"), Some(json!(true)));
        assert_eq!(scope.get_value("config.tags.1"), Some(json!("b")));
        assert_eq!(scope.get_value("config.missing"), None);
    }

    #[test]
    fn test_write_below_json_object_keeps_siblings() {
        let scope = Scope::new();
        scope.set_value("config", json!({"a": 1}));
        scope.set_value("config.b", 2);
        assert_eq!(scope.get_value("config"), Some(json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_child_is_fresh_and_shares_tree() {
        let scope = Scope::new();
        scope.set_value("w.stale", true);
        let child = scope.child("w");
        child.set("count", ScopeValue::Data(json!(1)));
        assert_eq!(scope.get_value("w"), Some(json!({"count": 1})));
    }

    #[test]
    fn test_watch_fires_on_digest_with_old_and_new() {
        let scope = Scope::new();
        scope.set_value("count", 1);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        scope.watch(
            "count",
            Box::new(move |old, new| {
                sink.borrow_mut().push((
                    old.and_then(ScopeValue::to_data),
                    new.and_then(ScopeValue::to_data),
                ))
            }),
            true,
        );

        assert_eq!(scope.digest().unwrap(), 0);
        scope.set_value("count", 2);
        assert_eq!(scope.digest().unwrap(), 1);
        assert_eq!(*seen.borrow(), vec![(Some(json!(1)), Some(json!(2)))]);
    }

    #[test]
    fn test_shallow_watch_ignores_nested_changes() {
        let scope = Scope::new();
        scope.set_value("user", json!({"name": "a"}));
        let hits = Rc::new(Cell::new(0));
        let (deep_hits, shallow_hits) = (Rc::clone(&hits), Rc::new(Cell::new(0)));
        let shallow_sink = Rc::clone(&shallow_hits);
        scope.watch("user", Box::new(move |_, _| deep_hits.set(deep_hits.get() + 1)), true);
        scope.watch("user", Box::new(move |_, _| shallow_sink.set(shallow_sink.get() + 1)), false);

        scope.set_value("user", json!({"name": "b"}));
        scope.digest().unwrap();
        assert_eq!(hits.get(), 1);
        assert_eq!(shallow_hits.get(), 0);
    }

    #[test]
    fn test_digest_limit() {
        let scope = Scope::with_options(5, true);
        scope.set_value("n", 0);
        let writer = Rc::clone(&scope);
        scope.watch(
            "n",
            Box::new(move |_, new| {
                let n = new.and_then(|v| v.as_data()?.as_i64()).unwrap_or(0);
                writer.set_value("n", n + 1);
            }),
            true,
        );
        scope.set_value("n", 1);
        assert!(matches!(scope.digest(), Err(ScopeError::DigestLimit { ttl: 5 })));
        // the guard is released after a failed digest
        scope.unwatch(WatchId(0));
        assert!(scope.digest().is_ok());
    }

    #[test]
    fn test_nested_digest_is_rejected() {
        let scope = Scope::new();
        let inner = Rc::clone(&scope);
        let result = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&result);
        scope.watch(
            "x",
            Box::new(move |_, _| *sink.borrow_mut() = Some(inner.digest().is_err())),
            true,
        );
        scope.set_value("x", 1);
        scope.digest().unwrap();
        assert_eq!(*result.borrow(), Some(true));
    }

    #[test]
    fn test_deferred_tasks_run_on_digest() {
        let scope = Scope::new();
        let target = Rc::clone(&scope);
        scope.defer(Box::new(move || target.set_value("late", true)));
        assert_eq!(scope.pending_tasks(), 1);
        assert_eq!(scope.get_value("late"), None);
        scope.digest().unwrap();
        assert_eq!(scope.get_value("late"), Some(json!(true)));

        let immediate = Scope::with_options(10, false);
        let target = Rc::clone(&immediate);
        immediate.defer(Box::new(move || target.set_value("now", 1)));
        assert_eq!(immediate.get_value("now"), Some(json!(1)));
    }

    #[test]
    fn test_emit_records_and_notifies() {
        let scope = Scope::new();
        let got = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&got);
        scope.on("ctrl:init", move |payload| sink.borrow_mut().push(payload.clone()));
        scope.emit("ctrl:init", json!(["Widget"]));
        scope.emit("other", json!(null));
        assert_eq!(*got.borrow(), vec![json!(["Widget"])]);
        assert_eq!(scope.events().len(), 2);
    }

    #[test]
    fn test_listener_may_emit_again() {
        let scope = Scope::new();
        let got = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&got);
        let inner = Rc::clone(&scope);
        scope.on("ping", move |_| {
            *sink.borrow_mut() += 1;
            inner.emit("ping", json!(null));
        });
        scope.emit("ping", json!(null));
        assert_eq!(*got.borrow(), 1);
        assert_eq!(scope.events().len(), 2);
    }

    #[test]
    fn test_declaration_belongs_to_one_handle() {
        let root = Scope::new();
        root.set_declaration("Outer as o");
        let inner = root.child("inner");
        assert_eq!(inner.declaration(), None);
        assert_eq!(root.declaration().as_deref(), Some("Outer as o"));

        inner.set_declaration("Inner as i");
        assert_eq!(root.child("inner").declaration(), None);
    }
}
