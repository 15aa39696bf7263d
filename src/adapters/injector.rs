use crate::domain::model::Dependency;
use crate::domain::ports::{Injector, ViewState};
use std::collections::HashMap;
use std::rc::Rc;

/// Per-instantiation dependencies, such as the `$scope` of a controller.
#[derive(Debug, Clone, Default)]
pub struct Locals {
    values: HashMap<String, Dependency>,
}

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locals carrying only a view state under `name`.
    pub fn scope(name: impl Into<String>, view: Rc<dyn ViewState>) -> Self {
        Self::new().with(name, Dependency::View(view))
    }

    pub fn with(mut self, name: impl Into<String>, dependency: Dependency) -> Self {
        self.insert(name, dependency);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, dependency: Dependency) {
        self.values.insert(name.into(), dependency);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

impl Injector for Locals {
    fn get(&self, name: &str) -> Option<Dependency> {
        self.values.get(name).cloned()
    }
}
