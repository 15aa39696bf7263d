use crate::core::component::{Component, ComponentKind};
use crate::core::hierarchy::{ClassBuilder, ComponentClass};
use crate::domain::ports::ViewState;
use serde_json::json;
use std::any::Any;
use std::rc::Rc;

/// Controller-like components.
///
/// The declaration ("Widget as w") is read from the view state. With an alias,
/// exposed members go into a fresh `w` object on the scope and watches are
/// registered under `w.`; without one, the scope itself is the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerKind;

impl ComponentKind for ControllerKind {
    fn name(&self) -> &'static str {
        "controller"
    }

    fn statement(&self, root: &dyn ViewState) -> Option<String> {
        root.declaration()
    }

    fn view_target(&self, component: &Component, root: &Rc<dyn ViewState>) -> Rc<dyn ViewState> {
        match component.statement_name() {
            Some(alias) => root.child(&alias),
            None => Rc::clone(root),
        }
    }

    fn watch_prefix(&self, component: &Component) -> Option<String> {
        component.statement_name()
    }

    fn initialized(&self, component: &Component, root: &Rc<dyn ViewState>) {
        let event = &component.settings().init_event;
        tracing::debug!("{}: emitting '{}'", component.name(), event);
        root.emit(event, json!([component.name()]));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Start a controller class.
pub fn controller(name: impl Into<String>) -> ClassBuilder {
    ComponentClass::builder(name).kind(ControllerKind)
}
