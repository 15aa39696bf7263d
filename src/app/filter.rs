use crate::core::component::{Component, ComponentKind};
use crate::core::hierarchy::{ClassBuilder, ComponentClass};
use crate::domain::model::Dependency;
use serde_json::Value;
use std::any::Any;
use std::rc::Rc;

/// The plain function a filter hands to the host.
pub type FilterFn = Rc<dyn Fn(&[Value]) -> Value>;

/// Filter-like components. Never bound to a view state.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterKind {
    /// Build a fresh instance for every invocation.
    pub stateful: bool,
}

impl ComponentKind for FilterKind {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn viewable(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Start a filter class. `init` does nothing and `filter` returns its first
/// argument until overridden.
pub fn filter(name: impl Into<String>) -> ClassBuilder {
    filter_with(name, FilterKind::default())
}

pub fn filter_with(name: impl Into<String>, kind: FilterKind) -> ClassBuilder {
    ComponentClass::builder(name)
        .kind(kind)
        .method("init", |_, _| Value::Null)
        .method("filter", |_, args| args.first().cloned().unwrap_or(Value::Null))
}

fn instantiate(class: &Rc<ComponentClass>, dependencies: Vec<Dependency>) -> Component {
    let instance = Component::new(class, dependencies);
    instance.call("init", &[]);
    instance
}

/// Construct the filter, run `init`, and return `filter` bound to the instance.
pub fn filter_fn(class: &Rc<ComponentClass>, dependencies: Vec<Dependency>) -> FilterFn {
    let stateful = class
        .kind()
        .as_any()
        .downcast_ref::<FilterKind>()
        .is_some_and(|kind| kind.stateful);

    if stateful {
        let class = Rc::clone(class);
        return Rc::new(move |args: &[Value]| {
            instantiate(&class, dependencies.clone())
                .call("filter", args)
                .unwrap_or(Value::Null)
        });
    }

    let instance = instantiate(class, dependencies);
    tracing::debug!("filter {} ready", instance.name());
    Rc::new(move |args: &[Value]| instance.call("filter", args).unwrap_or(Value::Null))
}
