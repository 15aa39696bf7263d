//! Explicit registration of component classes and constant values.
//!
//! The host application builds a [`Module`] at startup instead of extending a
//! global framework object. Every registered class gets a [`Factory`] that knows
//! its dependency names and how to build the right kind of product.

use crate::app::directive::{Directive, DirectiveKind};
use crate::app::filter::{filter_fn, FilterFn, FilterKind};
use crate::config::Settings;
use crate::core::component::Component;
use crate::core::hierarchy::ComponentClass;
use crate::core::normalize::statement_target;
use crate::domain::model::Dependency;
use crate::domain::ports::Injector;
use crate::utils::error::{Result, ScopeError};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// What a factory hands back to the host.
#[derive(Clone)]
pub enum Provided {
    Component(Component),
    Directive(Directive),
    Filter(FilterFn),
}

impl Provided {
    pub fn into_component(self) -> Option<Component> {
        match self {
            Provided::Component(component) => Some(component),
            _ => None,
        }
    }

    pub fn into_directive(self) -> Option<Directive> {
        match self {
            Provided::Directive(directive) => Some(directive),
            _ => None,
        }
    }

    pub fn into_filter(self) -> Option<FilterFn> {
        match self {
            Provided::Filter(filter) => Some(filter),
            _ => None,
        }
    }
}

impl fmt::Debug for Provided {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provided::Component(component) => f.debug_tuple("Component").field(component).finish(),
            Provided::Directive(directive) => f.debug_tuple("Directive").field(directive).finish(),
            Provided::Filter(_) => f.write_str("Filter(..)"),
        }
    }
}

type BuildFn = Rc<dyn Fn(Vec<Dependency>) -> Provided>;

/// Dependency names plus a build function taking them positionally.
#[derive(Clone)]
pub struct Factory {
    class: Rc<ComponentClass>,
    build: BuildFn,
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("class", &self.class.name())
            .field("inject", &self.inject())
            .finish()
    }
}

impl Factory {
    pub fn for_class(class: &Rc<ComponentClass>) -> Self {
        let kind = class.kind().as_any();
        let owned = Rc::clone(class);
        let build: BuildFn = if kind.is::<DirectiveKind>() {
            Rc::new(move |deps: Vec<Dependency>| Provided::Directive(Directive::new(&owned, deps)))
        } else if kind.is::<FilterKind>() {
            Rc::new(move |deps: Vec<Dependency>| Provided::Filter(filter_fn(&owned, deps)))
        } else {
            Rc::new(move |deps: Vec<Dependency>| Provided::Component(Component::new(&owned, deps)))
        };
        Self {
            class: Rc::clone(class),
            build,
        }
    }

    pub fn class(&self) -> &Rc<ComponentClass> {
        &self.class
    }

    pub fn inject(&self) -> &[String] {
        self.class.inject()
    }

    pub fn invoke(&self, dependencies: Vec<Dependency>) -> Provided {
        (self.build)(dependencies)
    }
}

#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    settings: Rc<Settings>,
    factories: BTreeMap<String, Factory>,
    values: BTreeMap<String, Dependency>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_settings(name, Rc::new(Settings::default()))
    }

    pub fn with_settings(name: impl Into<String>, settings: Rc<Settings>) -> Self {
        Self {
            name: name.into(),
            settings,
            factories: BTreeMap::new(),
            values: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &Rc<Settings> {
        &self.settings
    }

    /// Register a class under its own name. A later registration replaces an earlier one.
    pub fn register(&mut self, class: &Rc<ComponentClass>) -> &mut Self {
        tracing::debug!(
            "module {}: registered {} {}",
            self.name,
            class.kind().name(),
            class.name()
        );
        self.factories
            .insert(class.name().to_string(), Factory::for_class(class));
        self
    }

    /// Register a constant available to every instantiation.
    pub fn value(&mut self, name: impl Into<String>, dependency: Dependency) -> &mut Self {
        self.values.insert(name.into(), dependency);
        self
    }

    pub fn factory(&self, name: &str) -> Option<&Factory> {
        self.factories.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build `name`, resolving each declared dependency from `locals`, then module
    /// values, then other registered non-viewable classes.
    pub fn instantiate(&self, name: &str, locals: &dyn Injector) -> Result<Provided> {
        self.instantiate_inner(name, locals, &mut Vec::new())
    }

    fn instantiate_inner(
        &self,
        name: &str,
        locals: &dyn Injector,
        resolving: &mut Vec<String>,
    ) -> Result<Provided> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ScopeError::UnknownComponent {
                name: name.to_string(),
            })?;

        resolving.push(name.to_string());
        let mut dependencies = Vec::with_capacity(factory.inject().len());
        for dependency in factory.inject() {
            let resolved = self.provide(dependency, locals, resolving)?;
            match resolved {
                Some(found) => dependencies.push(found),
                None => {
                    return Err(ScopeError::UnknownProvider {
                        name: dependency.clone(),
                        component: name.to_string(),
                    })
                }
            }
        }
        resolving.pop();

        Ok(factory.invoke(dependencies))
    }

    fn provide(
        &self,
        name: &str,
        locals: &dyn Injector,
        resolving: &mut Vec<String>,
    ) -> Result<Option<Dependency>> {
        if let Some(found) = locals.get(name).or_else(|| self.values.get(name).cloned()) {
            return Ok(Some(found));
        }
        let Some(factory) = self.factories.get(name) else {
            return Ok(None);
        };
        // 只有 service 類能被注入；避免循環依賴
        if factory.class().kind().viewable() || resolving.iter().any(|n| n == name) {
            return Ok(None);
        }
        let provided = self.instantiate_inner(name, locals, resolving)?;
        Ok(provided.into_component().map(Dependency::service))
    }

    /// Instantiate a controller from a declaration such as `"Widget as w"`.
    ///
    /// The declaration is recorded on the `$scope` local before construction so the
    /// controller can read its alias from there.
    pub fn controller(&self, statement: &str, locals: &dyn Injector) -> Result<Component> {
        let target = statement_target(statement, &self.settings.statement_delimiter);
        if let Some(view) = locals
            .get(&self.settings.scope_dependency)
            .and_then(|dependency| dependency.as_view().cloned())
        {
            view.set_declaration(statement);
        }
        self.instantiate(target, locals)?
            .into_component()
            .ok_or_else(|| ScopeError::UnknownComponent {
                name: target.to_string(),
            })
    }
}

impl Injector for Module {
    fn get(&self, name: &str) -> Option<Dependency> {
        self.values.get(name).cloned()
    }
}
