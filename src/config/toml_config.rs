use crate::app::controller::ControllerKind;
use crate::app::directive::DirectiveKind;
use crate::app::filter::FilterKind;
use crate::app::module::Module;
use crate::config::Settings;
use crate::core::component::{Component, Service, Viewable};
use crate::core::hierarchy::{ClassBuilder, ComponentClass};
use crate::domain::model::Dependency;
use crate::utils::error::{Result, ScopeError};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;
use std::sync::LazyLock;

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern"));

static TEMPLATE_SLOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_$.\-]+)\}").expect("template slot pattern"));

pub const KINDS: &[&str] = &["viewable", "controller", "directive", "filter", "service"];

/// A module described in TOML: settings, component classes and an optional script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub module: ModuleConfig,
    pub settings: Option<Settings>,
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
    pub run: Option<RunConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub name: String,
    pub kind: Option<String>,
    pub extends: Option<String>,
    pub inject: Option<Vec<String>>,
    pub expose: Option<Vec<String>>,
    pub watch: Option<Vec<String>>,
    /// Data members and their initial values.
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    /// Members declared without a value.
    #[serde(default)]
    pub declare: Vec<String>,
    /// Methods rendering a template; `{member}` slots are filled from the instance.
    #[serde(default)]
    pub templates: BTreeMap<String, String>,
    pub restrict: Option<String>,
    pub isolated: Option<bool>,
    pub attribute: Option<String>,
    #[serde(default)]
    pub bindings: BTreeMap<String, String>,
    pub stateful: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    /// Controller declarations to mount on the root scope, e.g. `"Widget as w"`.
    #[serde(default)]
    pub mount: Vec<String>,
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptStep {
    /// Write a value into the scope, as a template binding would.
    ScopeSet { path: String, value: Value },
    /// Write a member on a mounted controller, addressed by alias or name.
    MemberSet {
        component: String,
        member: String,
        value: Value,
    },
    /// Invoke a function stored in the scope.
    Call {
        path: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    Digest,
}

impl TomlConfig {
    /// 從 TOML 檔案載入模組描述
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ScopeError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ScopeError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GREETING})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn settings(&self) -> Settings {
        self.settings.clone().unwrap_or_default()
    }

    pub fn component(&self, name: &str) -> Option<&ComponentConfig> {
        self.components.iter().find(|c| c.name == name)
    }

    fn check_extends_chains(&self) -> Result<()> {
        let parents: HashMap<&str, Option<&str>> = self
            .components
            .iter()
            .map(|c| (c.name.as_str(), c.extends.as_deref()))
            .collect();

        for component in &self.components {
            let mut seen = HashSet::from([component.name.as_str()]);
            let mut current = component.extends.as_deref();
            while let Some(parent) = current {
                let Some(next) = parents.get(parent) else {
                    return Err(ScopeError::ConfigValidationError {
                        field: format!("components.{}.extends", component.name),
                        message: format!("Unknown parent component '{}'", parent),
                    });
                };
                if !seen.insert(parent) {
                    return Err(ScopeError::ConfigValidationError {
                        field: format!("components.{}.extends", component.name),
                        message: format!("Inheritance cycle through '{}'", parent),
                    });
                }
                current = *next;
            }
        }
        Ok(())
    }

    /// Build every declared class, parents first, and register them on a new module.
    pub fn build_module(&self) -> Result<Module> {
        let settings = Rc::new(self.settings());
        let mut module = Module::with_settings(self.module.name.clone(), Rc::clone(&settings));
        for (name, value) in &self.values {
            module.value(name.clone(), Dependency::Value(value.clone()));
        }

        let mut built: HashMap<String, Rc<ComponentClass>> = HashMap::new();
        let mut remaining: Vec<&ComponentConfig> = self.components.iter().collect();
        while !remaining.is_empty() {
            let before = remaining.len();
            let mut next = Vec::new();
            for component in remaining {
                let parent = match &component.extends {
                    Some(parent) => match built.get(parent) {
                        Some(class) => Some(Rc::clone(class)),
                        None => {
                            next.push(component);
                            continue;
                        }
                    },
                    None => None,
                };
                let class = component.build_class(parent.as_ref(), &settings)?;
                module.register(&class);
                built.insert(component.name.clone(), class);
            }
            if next.len() == before {
                return Err(ScopeError::config(format!(
                    "Cannot resolve parents of: {}",
                    next.iter()
                        .map(|c| c.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )));
            }
            remaining = next;
        }

        tracing::info!(
            "📦 module {} built with {} component(s)",
            self.module.name,
            built.len()
        );
        Ok(module)
    }
}

impl ComponentConfig {
    fn kind_name(&self) -> &str {
        self.kind.as_deref().unwrap_or("viewable")
    }

    fn start(&self) -> ClassBuilder {
        let builder = ComponentClass::builder(self.name.clone());
        match self.kind_name() {
            "controller" => builder.kind(ControllerKind),
            "directive" => {
                let mut kind = DirectiveKind::default();
                if let Some(restrict) = &self.restrict {
                    kind.restrict = restrict.clone();
                }
                if let Some(isolated) = self.isolated {
                    kind.isolated = isolated;
                }
                kind.attribute = self.attribute.clone();
                kind.bindings = self.bindings.clone();
                builder.kind(kind)
            }
            "filter" => crate::app::filter::filter_with(
                self.name.clone(),
                FilterKind {
                    stateful: self.stateful.unwrap_or(false),
                },
            ),
            "service" => builder.kind(Service),
            _ => builder.kind(Viewable),
        }
    }

    /// The class this entry declares. Kinds are only set on root classes;
    /// subclasses inherit their parent's.
    pub fn build_class(
        &self,
        parent: Option<&Rc<ComponentClass>>,
        settings: &Rc<Settings>,
    ) -> Result<Rc<ComponentClass>> {
        let mut builder = match (parent, &self.kind) {
            (Some(parent), None) => ComponentClass::builder(self.name.clone()).extends(parent),
            (Some(parent), Some(_)) => self.start().extends(parent),
            (None, _) => self.start().settings(Rc::clone(settings)),
        };

        if let Some(inject) = &self.inject {
            builder = builder.inject(inject.clone());
        }
        if let Some(expose) = &self.expose {
            builder = builder.expose(expose.clone());
        }
        if let Some(watch) = &self.watch {
            builder = builder.watch(watch.clone());
        }
        for (name, value) in &self.fields {
            builder = builder.field(name.clone(), value.clone());
        }
        for name in &self.declare {
            builder = builder.declare(name.clone());
        }
        for (name, template) in &self.templates {
            let template = template.clone();
            builder = builder.method(name.clone(), move |this, _| {
                Value::String(render_template(&template, this))
            });
        }
        Ok(builder.build())
    }
}

/// Fill `{member}` slots from the instance's data members; strings are inserted
/// as-is, other values as JSON, undefined members as empty text.
pub fn render_template(template: &str, component: &Component) -> String {
    TEMPLATE_SLOT
        .replace_all(template, |caps: &regex::Captures| {
            match component.get(&caps[1]) {
                Some(Value::String(text)) => text,
                Some(other) => other.to_string(),
                None => String::new(),
            }
        })
        .into_owned()
}

impl Validate for ComponentConfig {
    fn validate(&self) -> Result<()> {
        let prefix = format!("components.{}", self.name);
        validation::validate_non_empty_string("components.name", &self.name)?;
        validation::validate_one_of(&format!("{}.kind", prefix), self.kind_name(), KINDS)?;
        if let Some(inject) = &self.inject {
            for name in inject {
                validation::validate_non_empty_string(&format!("{}.inject", prefix), name)?;
            }
        }
        if let Some(expose) = &self.expose {
            validation::validate_member_names(&format!("{}.expose", prefix), expose)?;
        }
        if let Some(watch) = &self.watch {
            validation::validate_member_names(&format!("{}.watch", prefix), watch)?;
        }
        for name in self
            .fields
            .keys()
            .chain(self.declare.iter())
            .chain(self.templates.keys())
        {
            validation::validate_member_name(&format!("{}.members", prefix), name)?;
        }
        validation::validate_unique_names(
            &format!("{}.members", prefix),
            self.fields
                .keys()
                .chain(self.declare.iter())
                .chain(self.templates.keys())
                .map(String::as_str),
        )?;
        Ok(())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("module.name", &self.module.name)?;
        if let Some(settings) = &self.settings {
            settings.validate()?;
        }
        validation::validate_unique_names(
            "components.name",
            self.components.iter().map(|c| c.name.as_str()),
        )?;
        for component in &self.components {
            component.validate()?;
        }
        self.check_extends_chains()?;

        if let Some(run) = &self.run {
            let delimiter = self.settings().statement_delimiter;
            for statement in &run.mount {
                let target = crate::core::normalize::statement_target(statement, &delimiter);
                if self.component(target).is_none() {
                    return Err(ScopeError::ConfigValidationError {
                        field: "run.mount".to_string(),
                        message: format!("Unknown component '{}'", target),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[module]
name = "demo"

[settings]
observation = "accessor"

[values]
greeting = "hello"

[[components]]
name = "Base"
kind = "controller"
expose = ["title"]
fields = { title = "base" }

[[components]]
name = "Widget"
extends = "Base"
expose = ["count", "greet"]
watch = ["count"]
fields = { count = 0, name = "Ada" }
templates = { greet = "hi {name}" }

[run]
mount = ["Widget as w"]

[[run.steps]]
action = "scope_set"
path = "w.count"
value = 3

[[run.steps]]
action = "digest"
"#;

    #[test]
    fn test_parse_module_config() {
        let config = TomlConfig::from_toml_str(BASIC).unwrap();
        assert_eq!(config.module.name, "demo");
        assert_eq!(config.settings().observation, crate::config::ObservationMode::Accessor);
        assert_eq!(config.components.len(), 2);
        assert_eq!(config.values.get("greeting"), Some(&json!("hello")));

        let run = config.run.as_ref().unwrap();
        assert_eq!(run.mount, vec!["Widget as w"]);
        assert_eq!(
            run.steps[0],
            ScriptStep::ScopeSet {
                path: "w.count".to_string(),
                value: json!(3)
            }
        );
        assert_eq!(run.steps[1], ScriptStep::Digest);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_build_module_inherits() {
        let config = TomlConfig::from_toml_str(BASIC).unwrap();
        let module = config.build_module().unwrap();
        let widget = module.factory("Widget").unwrap().class();
        assert_eq!(widget.kind().name(), "controller");
        assert_eq!(widget.lists().expose, vec!["count", "greet", "title"]);
        assert_eq!(widget.inject(), ["$scope".to_string()]);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SCOPEBIND_TEST_MODULE", "from-env");
        let config = TomlConfig::from_toml_str(
            r#"
[module]
name = "${SCOPEBIND_TEST_MODULE}"
description = "${SCOPEBIND_TEST_UNSET}"
"#,
        )
        .unwrap();
        assert_eq!(config.module.name, "from-env");
        assert_eq!(config.module.description.as_deref(), Some("${SCOPEBIND_TEST_UNSET}"));
        std::env::remove_var("SCOPEBIND_TEST_MODULE");
    }

    #[test]
    fn test_unknown_parent_and_cycle() {
        let unknown = TomlConfig::from_toml_str(
            r#"
[module]
name = "m"

[[components]]
name = "A"
extends = "Missing"
"#,
        )
        .unwrap();
        assert!(unknown.validate().is_err());
        assert!(unknown.build_module().is_err());

        let cycle = TomlConfig::from_toml_str(
            r#"
[module]
name = "m"

[[components]]
name = "A"
extends = "B"

[[components]]
name = "B"
extends = "A"
"#,
        )
        .unwrap();
        let err = cycle.validate().unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_invalid_kind_and_member_names() {
        let config = TomlConfig::from_toml_str(
            r#"
[module]
name = "m"

[[components]]
name = "A"
kind = "widget"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = TomlConfig::from_toml_str(
            r#"
[module]
name = "m"

[[components]]
name = "A"
expose = ["bad name"]
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_mount_target() {
        let config = TomlConfig::from_toml_str(
            r#"
[module]
name = "m"

[run]
mount = ["Nope as n"]
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.module.name, "demo");
        assert!(TomlConfig::from_file("/nonexistent/module.toml").is_err());
    }
}
