//! Directive-like components.
//!
//! A [`Directive`] is the definition the host registers once; every `link`
//! creates a fresh component bound to the linked element's scope.

use crate::core::component::{Component, ComponentKind};
use crate::core::hierarchy::{ClassBuilder, ComponentClass};
use crate::domain::model::Dependency;
use crate::domain::ports::ViewState;
use crate::utils::error::Result;
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Element attributes as the host hands them to `link`.
pub type Attributes = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct DirectiveKind {
    pub restrict: String,
    pub isolated: bool,
    /// Isolated scope bindings (`"="`, `"@"`, `"&"` style), keyed by attribute.
    pub bindings: BTreeMap<String, String>,
    /// Attribute read by [`Directive::parse_attribute`]; defaults to the
    /// directive name with a lower-case first letter.
    pub attribute: Option<String>,
}

impl Default for DirectiveKind {
    fn default() -> Self {
        Self {
            restrict: "AEC".to_string(),
            isolated: true,
            bindings: BTreeMap::new(),
            attribute: None,
        }
    }
}

impl DirectiveKind {
    pub fn restrict(mut self, restrict: impl Into<String>) -> Self {
        self.restrict = restrict.into();
        self
    }

    pub fn shared_scope(mut self) -> Self {
        self.isolated = false;
        self
    }

    pub fn bind(mut self, attribute: impl Into<String>, mode: impl Into<String>) -> Self {
        self.bindings.insert(attribute.into(), mode.into());
        self
    }

    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attribute = Some(name.into());
        self
    }
}

impl ComponentKind for DirectiveKind {
    fn name(&self) -> &'static str {
        "directive"
    }

    // 依賴只在 link 時才拿到 scope，建構時不注入
    fn default_inject(&self, _settings: &crate::config::Settings) -> Vec<String> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Start a directive class with default options.
pub fn directive(name: impl Into<String>) -> ClassBuilder {
    directive_with(name, DirectiveKind::default())
}

pub fn directive_with(name: impl Into<String>, kind: DirectiveKind) -> ClassBuilder {
    ComponentClass::builder(name).kind(kind)
}

#[derive(Debug, Clone)]
pub struct Directive {
    class: Rc<ComponentClass>,
    dependencies: Vec<Dependency>,
}

impl Directive {
    pub fn new(class: &Rc<ComponentClass>, dependencies: Vec<Dependency>) -> Self {
        Self {
            class: Rc::clone(class),
            dependencies,
        }
    }

    pub fn class(&self) -> &Rc<ComponentClass> {
        &self.class
    }

    fn options(&self) -> DirectiveKind {
        self.class
            .kind()
            .as_any()
            .downcast_ref::<DirectiveKind>()
            .cloned()
            .unwrap_or_default()
    }

    /// `$name`: the directive name as registered.
    pub fn name(&self) -> &str {
        self.class.name()
    }

    pub fn restrict(&self) -> String {
        self.options().restrict
    }

    pub fn is_isolated(&self) -> bool {
        self.options().isolated
    }

    /// The isolated scope definition; `None` for directives sharing their parent scope.
    pub fn scope_bindings(&self) -> Option<BTreeMap<String, String>> {
        let options = self.options();
        options.isolated.then_some(options.bindings)
    }

    pub fn attribute_name(&self) -> String {
        if let Some(name) = self.options().attribute {
            return name;
        }
        let mut chars = self.name().chars();
        match chars.next() {
            Some(first) => first.to_lowercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Link the directive to an element: a new component bound to `scope`.
    /// A `link` method, if declared, runs afterwards with the attributes.
    pub fn link(&self, scope: Rc<dyn ViewState>, attributes: &Attributes) -> Result<Component> {
        let component = Component::new(&self.class, self.dependencies.clone());
        component.attach_view_state(scope)?;
        if component.member("link").is_some_and(|m| m.is_callable()) {
            let attrs = serde_json::to_value(attributes)?;
            component.call("link", &[attrs]);
        }
        tracing::debug!("linked directive {}", self.name());
        Ok(component)
    }

    /// The directive's own attribute, parsed as JSON when possible.
    pub fn parse_attribute(&self, attributes: &Attributes) -> Value {
        let raw = attributes
            .get(&self.attribute_name())
            .cloned()
            .unwrap_or_default();
        parse_attribute_value(&raw)
    }
}

/// JSON when it parses, the raw string otherwise.
pub fn parse_attribute_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
