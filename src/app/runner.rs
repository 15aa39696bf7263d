use crate::adapters::{Locals, Scope};
use crate::app::module::Module;
use crate::config::toml_config::{RunConfig, ScriptStep};
use crate::core::component::Component;
use crate::domain::ports::ViewState;
use crate::utils::error::{Result, ScopeError};
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// 腳本執行結果
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub module: String,
    pub mounted: Vec<String>,
    pub steps: usize,
    /// Return values of `call` steps, in order.
    pub calls: Vec<Value>,
    /// Watch listener invocations across every digest.
    pub listener_calls: usize,
    pub scope: Value,
    #[serde(skip)]
    pub duration: Duration,
}

/// Mounts controllers of a module on one root scope and drives it with script steps.
pub struct Runner {
    module: Module,
    scope: Rc<Scope>,
    mounted: Vec<(String, Component)>,
    calls: Vec<Value>,
    listener_calls: usize,
}

impl Runner {
    pub fn new(module: Module) -> Self {
        let scope = Scope::from_settings(module.settings());
        Self::with_scope(module, scope)
    }

    pub fn with_scope(module: Module, scope: Rc<Scope>) -> Self {
        Self {
            module,
            scope,
            mounted: Vec::new(),
            calls: Vec::new(),
            listener_calls: 0,
        }
    }

    pub fn scope(&self) -> &Rc<Scope> {
        &self.scope
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Instantiate the controller named by `statement` against the root scope.
    pub fn mount(&mut self, statement: &str) -> Result<Component> {
        let view: Rc<dyn ViewState> = Rc::clone(&self.scope) as Rc<dyn ViewState>;
        let locals = Locals::scope(self.module.settings().scope_dependency.clone(), view);
        let component = self.module.controller(statement, &locals)?;
        let key = component
            .statement_name()
            .unwrap_or_else(|| component.name().to_string());
        tracing::info!("🔗 mounted {} as '{}'", component.name(), key);
        self.mounted.push((key, component.clone()));
        Ok(component)
    }

    /// A mounted controller, by alias or class name.
    pub fn component(&self, key: &str) -> Option<&Component> {
        self.mounted
            .iter()
            .find(|(alias, component)| alias == key || component.name() == key)
            .map(|(_, component)| component)
    }

    pub fn step(&mut self, step: &ScriptStep) -> Result<()> {
        match step {
            ScriptStep::ScopeSet { path, value } => {
                tracing::debug!("scope_set {} = {}", path, value);
                self.scope.set_value(path, value.clone());
            }
            ScriptStep::MemberSet {
                component,
                member,
                value,
            } => {
                let target = self
                    .component(component)
                    .ok_or_else(|| ScopeError::UnknownComponent {
                        name: component.clone(),
                    })?;
                tracing::debug!("member_set {}.{} = {}", component, member, value);
                target.set(member, value.clone())?;
            }
            ScriptStep::Call { path, args } => {
                let result = self.scope.call(path, args);
                if result.is_none() {
                    tracing::warn!("⚠️ '{}' is not a function in the scope", path);
                }
                self.calls.push(result.unwrap_or(Value::Null));
            }
            ScriptStep::Digest => {
                self.listener_calls += self.scope.digest()?;
            }
        }
        Ok(())
    }

    /// Mount, run every step, then settle the scope with a final digest.
    pub fn run(&mut self, run: &RunConfig) -> Result<RunReport> {
        let start = Instant::now();
        for statement in &run.mount {
            self.mount(statement)?;
        }
        for (index, step) in run.steps.iter().enumerate() {
            tracing::debug!("step {}/{}", index + 1, run.steps.len());
            self.step(step)?;
        }
        self.listener_calls += self.scope.digest()?;

        let report = RunReport {
            module: self.module.name().to_string(),
            mounted: self.mounted.iter().map(|(key, _)| key.clone()).collect(),
            steps: run.steps.len(),
            calls: self.calls.clone(),
            listener_calls: self.listener_calls,
            scope: self.scope.snapshot(),
            duration: start.elapsed(),
        };
        tracing::info!(
            "✅ ran {} step(s) in {:?}, {} listener call(s)",
            report.steps,
            report.duration,
            report.listener_calls
        );
        Ok(report)
    }
}
