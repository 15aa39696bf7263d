//! Component instances and their view-state lifecycle.
//!
//! A component moves `Unbound → Projected → Observing` in a single
//! initialization pass, triggered either at construction (when the view-state
//! dependency is injected) or later through [`Component::attach_view_state`].
//! There is no way back to `Unbound`.

use crate::config::Settings;
use crate::core::field::{Field, Subscription};
use crate::core::hierarchy::{ComponentClass, MemberLists};
use crate::core::normalize;
use crate::core::registry::ServiceRegistry;
use crate::core::sync::{self, Strategy};
use crate::domain::model::{Dependency, Member};
use crate::domain::ports::ViewState;
use crate::utils::error::{Result, ScopeError};
use serde_json::Value;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindState {
    Unbound,
    Projected,
    Observing,
}

impl fmt::Display for BindState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindState::Unbound => "unbound",
            BindState::Projected => "projected",
            BindState::Observing => "observing",
        };
        f.write_str(name)
    }
}

/// Behaviour that differs between component kinds (controllers, directives, ...).
pub trait ComponentKind: 'static {
    fn name(&self) -> &'static str;

    /// Whether the kind is synchronized with a view state at all.
    fn viewable(&self) -> bool {
        true
    }

    /// Dependency names used when neither the class nor an ancestor declares any.
    fn default_inject(&self, settings: &Settings) -> Vec<String> {
        if self.viewable() {
            vec![settings.scope_dependency.clone()]
        } else {
            Vec::new()
        }
    }

    /// Declaration text to read from the view state before projecting.
    fn statement(&self, _root: &dyn ViewState) -> Option<String> {
        None
    }

    /// The object exposed members are projected into.
    fn view_target(&self, _component: &Component, root: &Rc<dyn ViewState>) -> Rc<dyn ViewState> {
        Rc::clone(root)
    }

    /// Namespace the watch keys are registered under. Must agree with `view_target`.
    fn watch_prefix(&self, _component: &Component) -> Option<String> {
        None
    }

    /// Runs once, after the component reached `Observing`.
    fn initialized(&self, _component: &Component, _root: &Rc<dyn ViewState>) {}

    fn as_any(&self) -> &dyn Any;
}

/// Plain viewable component: projects into the view state it is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct Viewable;

impl ComponentKind for Viewable {
    fn name(&self) -> &'static str {
        "viewable"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Non-viewable component; only dependency capture applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct Service;

impl ComponentKind for Service {
    fn name(&self) -> &'static str {
        "service"
    }

    fn viewable(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct ComponentInner {
    class: Rc<ComponentClass>,
    registry: RefCell<ServiceRegistry>,
    members: BTreeMap<String, Field<Option<Member>>>,
    lists: RefCell<MemberLists>,
    state: Cell<BindState>,
    strategy: Cell<Option<Strategy>>,
    statement: RefCell<Option<String>>,
    statement_name: RefCell<Option<String>>,
    root: RefCell<Option<Rc<dyn ViewState>>>,
    target: RefCell<Option<Rc<dyn ViewState>>>,
    watched: RefCell<HashSet<String>>,
    subscriptions: RefCell<Vec<Subscription>>,
    pending: RefCell<Vec<String>>,
    flush_scheduled: Cell<bool>,
}

/// A component instance. Clones are handles to the same instance.
#[derive(Clone)]
pub struct Component {
    inner: Rc<ComponentInner>,
}

/// Non-owning handle, used by everything the view state keeps.
#[derive(Clone)]
pub struct WeakComponent {
    inner: Weak<ComponentInner>,
}

impl WeakComponent {
    pub fn upgrade(&self) -> Option<Component> {
        self.inner.upgrade().map(|inner| Component { inner })
    }

    pub fn ptr_eq(&self, other: &WeakComponent) -> bool {
        self.inner.ptr_eq(&other.inner)
    }

    pub fn name(&self) -> Option<String> {
        self.upgrade().map(|c| c.name().to_string())
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("class", &self.name())
            .field("state", &self.state())
            .field("statement", &*self.inner.statement.borrow())
            .finish()
    }
}

pub(crate) fn same_view(a: &Rc<dyn ViewState>, b: &Rc<dyn ViewState>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

impl Component {
    /// Construct an instance, capturing `dependencies` positionally against the
    /// class's declared names. Initializes against the view state right away when
    /// one is among them.
    pub fn new(class: &Rc<ComponentClass>, dependencies: Vec<Dependency>) -> Component {
        let has_dependencies = !dependencies.is_empty();
        let mut registry = ServiceRegistry::from_settings(class.settings());
        registry.inject_all(class.inject(), dependencies);

        let members = class
            .members()
            .iter()
            .map(|(name, member)| (name.clone(), Field::new(member.clone())))
            .collect();

        let component = Component {
            inner: Rc::new(ComponentInner {
                class: Rc::clone(class),
                registry: RefCell::new(registry),
                members,
                lists: RefCell::new(class.lists().clone()),
                state: Cell::new(BindState::Unbound),
                strategy: Cell::new(None),
                statement: RefCell::new(None),
                statement_name: RefCell::new(None),
                root: RefCell::new(None),
                target: RefCell::new(None),
                watched: RefCell::new(HashSet::new()),
                subscriptions: RefCell::new(Vec::new()),
                pending: RefCell::new(Vec::new()),
                flush_scheduled: Cell::new(false),
            }),
        };
        tracing::debug!("constructed {} ({})", component.name(), class.kind().name());

        if has_dependencies {
            component.initialize();
        }
        component
    }

    pub fn name(&self) -> &str {
        self.inner.class.name()
    }

    pub fn class(&self) -> &Rc<ComponentClass> {
        &self.inner.class
    }

    pub fn settings(&self) -> &Settings {
        self.inner.class.settings()
    }

    pub fn downgrade(&self) -> WeakComponent {
        WeakComponent {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn state(&self) -> BindState {
        self.inner.state.get()
    }

    pub fn is_observing(&self) -> bool {
        self.state() == BindState::Observing
    }

    /// The observation strategy chosen at initialization, if any.
    pub fn strategy(&self) -> Option<Strategy> {
        self.inner.strategy.get()
    }

    /// Look a dependency up by short, sigil-prefixed or suffixed name.
    pub fn resolve(&self, name: &str) -> Option<Dependency> {
        self.inner.registry.borrow().resolve(name).cloned()
    }

    pub fn resolve_as<T: Any>(&self, name: &str) -> Option<Rc<T>> {
        self.resolve(name)?.downcast::<T>()
    }

    /// Register a dependency after construction. The first registration of a
    /// name wins. Adding the view state this way initializes the component.
    pub fn add_dependency(&self, name: impl Into<String>, dependency: Dependency) -> &Self {
        let name = name.into();
        let is_view = name == self.settings().scope_dependency
            && matches!(dependency, Dependency::View(_));
        let added = self.inner.registry.borrow_mut().add(name, dependency);
        if added && is_view {
            self.initialize();
        }
        self
    }

    /// Bind to `view` when no view state was injected at construction.
    ///
    /// Attaching the same view state again is a no-op. Attaching a different one
    /// to an already bound component is rejected.
    pub fn attach_view_state(&self, view: Rc<dyn ViewState>) -> Result<()> {
        let scope_name = self.settings().scope_dependency.clone();
        let existing = self.inner.registry.borrow().resolve(&scope_name).cloned();
        match existing {
            None => {
                self.add_dependency(scope_name, Dependency::View(view));
                Ok(())
            }
            Some(Dependency::View(current)) if same_view(&current, &view) => {
                self.initialize();
                Ok(())
            }
            Some(_) => {
                tracing::warn!(
                    "refusing to attach a second view state to {} ({})",
                    self.name(),
                    self.state()
                );
                Err(ScopeError::AlreadyBound {
                    component: self.name().to_string(),
                })
            }
        }
    }

    /// The view state this component is bound to.
    pub fn view_state(&self) -> Option<Rc<dyn ViewState>> {
        self.inner.root.borrow().clone()
    }

    /// The object exposed members are written into. Differs from
    /// [`Component::view_state`] for namespaced controllers.
    pub fn projection_target(&self) -> Option<Rc<dyn ViewState>> {
        self.inner.target.borrow().clone()
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.inner.members.contains_key(name)
    }

    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.inner.members.keys().map(String::as_str)
    }

    /// Current value of a member; `None` when undeclared or undefined.
    pub fn member(&self, name: &str) -> Option<Member> {
        self.inner.members.get(name).and_then(Field::get)
    }

    /// Data value of a member; `None` for methods, undefined or undeclared members.
    pub fn get(&self, name: &str) -> Option<Value> {
        match self.member(name)? {
            Member::Data(value) => Some(value),
            Member::Method(_) => None,
        }
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.set_member(name, Member::Data(value.into()))
    }

    /// Replace a declared member. Observers push the new value to the view state.
    pub fn set_member(&self, name: &str, member: Member) -> Result<()> {
        let field = self.inner.members.get(name).ok_or_else(|| {
            tracing::warn!("{} has no member '{}'", self.name(), name);
            ScopeError::UnknownMember {
                component: self.name().to_string(),
                member: name.to_string(),
            }
        })?;
        field.set(Some(member));
        Ok(())
    }

    /// Invoke a method member on this instance.
    pub fn call(&self, name: &str, args: &[Value]) -> Option<Value> {
        match self.member(name)? {
            Member::Method(method) => Some(method.invoke(self, args)),
            Member::Data(_) => None,
        }
    }

    pub fn expose_list(&self) -> Vec<String> {
        self.inner.lists.borrow().expose.clone()
    }

    pub fn watch_list(&self) -> Vec<String> {
        self.inner.lists.borrow().watch.clone()
    }

    /// Extend this instance's expose list. Only possible before binding.
    pub fn expose_member(&self, name: impl Into<String>) -> bool {
        if self.state() != BindState::Unbound {
            return false;
        }
        self.inner.lists.borrow_mut().expose.push(name.into());
        true
    }

    /// Extend this instance's watch list. Only possible before binding.
    pub fn watch_member(&self, name: impl Into<String>) -> bool {
        if self.state() != BindState::Unbound {
            return false;
        }
        self.inner.lists.borrow_mut().watch.push(name.into());
        true
    }

    /// Re-run aggregation from the class. Only possible before binding.
    pub fn reaggregate(&self) -> bool {
        if self.state() != BindState::Unbound {
            return false;
        }
        *self.inner.lists.borrow_mut() = self.inner.class.lists().clone();
        true
    }

    pub fn statement(&self) -> Option<String> {
        self.inner.statement.borrow().clone()
    }

    /// Set the declaration text by hand, for hosts that cannot carry it on the
    /// view state. Ignored once bound.
    pub fn set_statement(&self, text: impl Into<String>) {
        if self.state() == BindState::Unbound {
            *self.inner.statement.borrow_mut() = Some(text.into());
            self.inner.statement_name.borrow_mut().take();
        }
    }

    /// The alias from the declaration text, cached once found.
    pub fn statement_name(&self) -> Option<String> {
        if let Some(cached) = self.inner.statement_name.borrow().clone() {
            return Some(cached);
        }
        let text = self.statement()?;
        let name = normalize::statement_name(&text, &self.settings().statement_delimiter)?;
        *self.inner.statement_name.borrow_mut() = Some(name.clone());
        Some(name)
    }

    fn resolve_view(&self) -> Option<Rc<dyn ViewState>> {
        let scope_name = &self.settings().scope_dependency;
        self.inner
            .registry
            .borrow()
            .resolve(scope_name)
            .and_then(Dependency::as_view)
            .cloned()
    }

    /// Project, install watches, install observers. Runs at most once.
    fn initialize(&self) {
        if self.state() != BindState::Unbound {
            tracing::trace!("{} already initialized", self.name());
            return;
        }
        let kind = Rc::clone(self.inner.class.kind());
        if !kind.viewable() {
            return;
        }
        let Some(root) = self.resolve_view() else {
            return;
        };

        if let Some(text) = kind.statement(root.as_ref()) {
            self.set_statement(text);
        }
        let target = kind.view_target(self, &root);
        *self.inner.root.borrow_mut() = Some(Rc::clone(&root));
        *self.inner.target.borrow_mut() = Some(Rc::clone(&target));

        let lists = self.inner.lists.borrow().clone();
        sync::project(self, target.as_ref(), &lists.expose);
        self.inner.state.set(BindState::Projected);

        let prefix = kind.watch_prefix(self);
        sync::install_watches(self, &root, &lists.watch, prefix.as_deref());
        sync::install_observers(self, &target, &lists.expose);

        tracing::debug!(
            "{} bound to view state (alias {:?}, {:?})",
            self.name(),
            prefix,
            self.strategy()
        );
        kind.initialized(self, &root);
    }

    pub(crate) fn member_field(&self, name: &str) -> Option<&Field<Option<Member>>> {
        self.inner.members.get(name)
    }

    pub(crate) fn member_fields(&self) -> impl Iterator<Item = (&String, &Field<Option<Member>>)> {
        self.inner.members.iter()
    }

    /// Record a watch key. Returns false when it was already installed.
    pub(crate) fn mark_watched(&self, key: &str) -> bool {
        self.inner.watched.borrow_mut().insert(key.to_string())
    }

    /// Full keys this instance has registered watches under, sorted.
    pub fn watched_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.watched.borrow().iter().cloned().collect();
        keys.sort();
        keys
    }

    pub(crate) fn keep_subscription(&self, subscription: Subscription) {
        self.inner.subscriptions.borrow_mut().push(subscription);
    }

    pub(crate) fn mark_observing(&self, strategy: Strategy) {
        self.inner.strategy.set(Some(strategy));
        self.inner.state.set(BindState::Observing);
    }

    /// Queue a changed member. Returns true when no flush is scheduled yet.
    pub(crate) fn queue_change(&self, name: &str) -> bool {
        let mut pending = self.inner.pending.borrow_mut();
        if !pending.iter().any(|queued| queued == name) {
            pending.push(name.to_string());
        }
        drop(pending);
        !self.inner.flush_scheduled.replace(true)
    }

    pub(crate) fn take_pending(&self) -> Vec<String> {
        self.inner.flush_scheduled.set(false);
        std::mem::take(&mut *self.inner.pending.borrow_mut())
    }
}
