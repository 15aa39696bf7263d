//! Component classes and the aggregation of their exposed and watched members.
//!
//! A class names at most one parent, and the parent must already be built, so the
//! ancestor chain is finite and acyclic by construction. The inherited expose and
//! watch lists are flattened once, when the class is built; instances clone the
//! flat lists and never share them with the class or with each other.

use crate::config::Settings;
use crate::core::component::{Component, ComponentKind, Viewable};
use crate::domain::model::{Member, Method};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Called with `(old, new)` after a watched member was updated from the view state.
pub type ChangeHandler = Rc<dyn Fn(&Component, &Value, &Value)>;

/// The flattened expose and watch lists of a class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberLists {
    pub expose: Vec<String>,
    pub watch: Vec<String>,
}

pub struct ComponentClass {
    name: String,
    parent: Option<Rc<ComponentClass>>,
    kind: Rc<dyn ComponentKind>,
    settings: Rc<Settings>,
    inject: Vec<String>,
    own_expose: Option<Vec<String>>,
    own_watch: Option<Vec<String>>,
    members: BTreeMap<String, Option<Member>>,
    handlers: BTreeMap<String, ChangeHandler>,
    lists: MemberLists,
}

impl fmt::Debug for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentClass")
            .field("name", &self.name)
            .field("kind", &self.kind.name())
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("inject", &self.inject)
            .field("lists", &self.lists)
            .finish()
    }
}

impl ComponentClass {
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Rc<ComponentClass>> {
        self.parent.as_ref()
    }

    pub fn kind(&self) -> &Rc<dyn ComponentKind> {
        &self.kind
    }

    pub fn settings(&self) -> &Rc<Settings> {
        &self.settings
    }

    /// Dependency names consumed positionally at construction.
    pub fn inject(&self) -> &[String] {
        &self.inject
    }

    pub fn own_expose(&self) -> Option<&[String]> {
        self.own_expose.as_deref()
    }

    pub fn own_watch(&self) -> Option<&[String]> {
        self.own_watch.as_deref()
    }

    /// Aggregated lists, this class first and then each ancestor upward.
    pub fn lists(&self) -> &MemberLists {
        &self.lists
    }

    /// Declared members, own declarations overriding inherited ones.
    /// `None` marks a member declared without a value.
    pub fn members(&self) -> &BTreeMap<String, Option<Member>> {
        &self.members
    }

    pub fn handler(&self, member: &str) -> Option<&ChangeHandler> {
        self.handlers.get(member)
    }

    /// This class followed by its parents.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }

    pub fn depth(&self) -> usize {
        self.ancestors().count()
    }

    pub fn is_subclass_of(&self, other: &ComponentClass) -> bool {
        self.ancestors().any(|class| std::ptr::eq(class, other))
    }
}

pub struct Ancestors<'a> {
    next: Option<&'a ComponentClass>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a ComponentClass;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent.as_deref();
        Some(current)
    }
}

/// Merge the expose and watch declarations along the chain into fresh lists.
///
/// Duplicates are kept; consumers de-duplicate by normalized key.
pub fn aggregate(class: &ComponentClass) -> MemberLists {
    let mut lists = MemberLists::default();
    for ancestor in class.ancestors() {
        if let Some(expose) = &ancestor.own_expose {
            lists.expose.extend(expose.iter().cloned());
        }
        if let Some(watch) = &ancestor.own_watch {
            lists.watch.extend(watch.iter().cloned());
        }
    }
    lists
}

pub struct ClassBuilder {
    name: String,
    parent: Option<Rc<ComponentClass>>,
    kind: Option<Rc<dyn ComponentKind>>,
    settings: Option<Rc<Settings>>,
    inject: Option<Vec<String>>,
    expose: Option<Vec<String>>,
    watch: Option<Vec<String>>,
    members: BTreeMap<String, Option<Member>>,
    handlers: BTreeMap<String, ChangeHandler>,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            kind: None,
            settings: None,
            inject: None,
            expose: None,
            watch: None,
            members: BTreeMap::new(),
            handlers: BTreeMap::new(),
        }
    }

    pub fn extends(mut self, parent: &Rc<ComponentClass>) -> Self {
        self.parent = Some(Rc::clone(parent));
        self
    }

    pub fn kind(mut self, kind: impl ComponentKind) -> Self {
        self.kind = Some(Rc::new(kind));
        self
    }

    pub fn settings(mut self, settings: Rc<Settings>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn inject<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inject = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn expose<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expose = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn watch<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.watch = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.members
            .insert(name.into(), Some(Member::Data(value.into())));
        self
    }

    /// Declare a member without a value. It is skipped by projection until set.
    pub fn declare(mut self, name: impl Into<String>) -> Self {
        self.members.insert(name.into(), None);
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(&Component, &[Value]) -> Value + 'static,
    ) -> Self {
        self.members
            .insert(name.into(), Some(Member::Method(Method::new(method))));
        self
    }

    /// Handler run after `member` was updated from the view state.
    pub fn on_scope_change(
        mut self,
        member: impl Into<String>,
        handler: impl Fn(&Component, &Value, &Value) + 'static,
    ) -> Self {
        self.handlers.insert(member.into(), Rc::new(handler));
        self
    }

    pub fn build(self) -> Rc<ComponentClass> {
        let parent = self.parent;

        let kind = self
            .kind
            .or_else(|| parent.as_ref().map(|p| Rc::clone(&p.kind)))
            .unwrap_or_else(|| Rc::new(Viewable) as Rc<dyn ComponentKind>);
        let settings = self
            .settings
            .or_else(|| parent.as_ref().map(|p| Rc::clone(&p.settings)))
            .unwrap_or_default();
        let inject = self
            .inject
            .or_else(|| parent.as_ref().map(|p| p.inject.clone()))
            .unwrap_or_else(|| kind.default_inject(&settings));

        let mut members = parent
            .as_ref()
            .map(|p| p.members.clone())
            .unwrap_or_default();
        members.extend(self.members);

        let mut handlers = parent
            .as_ref()
            .map(|p| p.handlers.clone())
            .unwrap_or_default();
        handlers.extend(self.handlers);

        let mut class = ComponentClass {
            name: self.name,
            parent,
            kind,
            settings,
            inject,
            own_expose: self.expose,
            own_watch: self.watch,
            members,
            handlers,
            lists: MemberLists::default(),
        };
        class.lists = aggregate(&class);

        tracing::debug!(
            "built class {} (depth {}, {} exposed, {} watched)",
            class.name,
            class.depth(),
            class.lists.expose.len(),
            class.lists.watch.len()
        );
        Rc::new(class)
    }
}
