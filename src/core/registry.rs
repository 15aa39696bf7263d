use crate::config::Settings;
use crate::domain::model::Dependency;
use std::collections::HashMap;

/// Named dependencies captured by one component instance.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    services: HashMap<String, Dependency>,
    prefix: String,
    suffix: String,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl ServiceRegistry {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            services: HashMap::new(),
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.service_prefix.clone(), settings.service_suffix.clone())
    }

    /// Store `values` positionally under the `declared` names.
    ///
    /// Extra values are ignored and missing trailing values leave their names
    /// unregistered. Returns how many dependencies were stored.
    pub fn inject_all(&mut self, declared: &[String], values: Vec<Dependency>) -> usize {
        if declared.is_empty() || values.is_empty() {
            return 0;
        }
        let mut stored = 0;
        for (name, value) in declared.iter().zip(values) {
            self.services.insert(name.clone(), value);
            stored += 1;
        }
        stored
    }

    /// Look `name` up as given, then with the prefix, then with the suffix.
    pub fn resolve(&self, name: &str) -> Option<&Dependency> {
        if let Some(found) = self.services.get(name) {
            return Some(found);
        }
        if !name.starts_with(&self.prefix) {
            let prefixed = format!("{}{}", self.prefix, name);
            if let Some(found) = self.services.get(&prefixed) {
                return Some(found);
            }
        }
        if !name.ends_with(&self.suffix) {
            let suffixed = format!("{}{}", name, self.suffix);
            if let Some(found) = self.services.get(&suffixed) {
                return Some(found);
            }
        }
        None
    }

    /// Insert unless `name` is already taken. Returns whether it was inserted.
    pub fn add(&mut self, name: impl Into<String>, dependency: Dependency) -> bool {
        let name = name.into();
        if self.services.contains_key(&name) {
            tracing::trace!("dependency '{}' already registered, keeping the first", name);
            return false;
        }
        self.services.insert(name, dependency);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }
}
