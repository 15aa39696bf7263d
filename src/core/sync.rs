//! Two-way synchronization between component members and a view state.
//!
//! * [`project`] writes exposed members into the view state once.
//! * [`install_watches`] pulls view-state changes back into watched members.
//! * [`install_observers`] pushes later member changes to the view state, either
//!   batched through the host's deferred queue ([`Strategy::Native`]) or written
//!   through on every set ([`Strategy::Accessor`]).
//!
//! Everything registered on the view state holds the component weakly.

use crate::config::ObservationMode;
use crate::core::component::Component;
use crate::core::normalize::{full_key, normalize};
use crate::domain::model::{Member, ScopeValue};
use crate::domain::ports::ViewState;
use serde_json::Value;
use std::collections::HashSet;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Changes are queued and re-projected on the host's next pass.
    Native,
    /// Every member write goes straight through to the view state.
    Accessor,
}

/// `(member, key)` pairs, keeping the first member for each normalized key.
fn owned_keys(expose: &[String]) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    expose
        .iter()
        .filter_map(|name| {
            let key = normalize(name);
            seen.insert(key.clone()).then(|| (name.clone(), key))
        })
        .collect()
}

fn write_member(component: &Component, view: &dyn ViewState, key: &str, member: &Member) {
    let value = match member {
        Member::Method(method) => ScopeValue::Function(method.bind(component)),
        Member::Data(value) => ScopeValue::Data(value.clone()),
    };
    tracing::trace!("{}: writing '{}'", component.name(), key);
    view.set(key, value);
}

/// Initial projection of the expose list. Returns how many keys were written.
///
/// Methods are bound to the component. A data member that also resolves to a
/// plain-value dependency projects the dependency. Undefined members are
/// skipped and leave any existing key untouched.
pub fn project(component: &Component, view: &dyn ViewState, expose: &[String]) -> usize {
    let mut written = 0;
    for (name, key) in owned_keys(expose) {
        match component.member(&name) {
            Some(Member::Method(method)) => {
                write_member(component, view, &key, &Member::Method(method));
            }
            Some(Member::Data(value)) => {
                let projected = component
                    .resolve(&name)
                    .and_then(|dependency| dependency.to_scope_value())
                    .unwrap_or(ScopeValue::Data(value));
                tracing::trace!("{}: writing '{}'", component.name(), key);
                view.set(&key, projected);
            }
            None => {
                tracing::trace!("{}: '{}' is undefined, not projected", component.name(), name);
                continue;
            }
        }
        written += 1;
    }
    tracing::debug!("{}: projected {} member(s)", component.name(), written);
    written
}

/// Register a deep watch for every defined watched member. Returns how many
/// watches were installed; keys already watched by this component are skipped.
pub fn install_watches(
    component: &Component,
    root: &Rc<dyn ViewState>,
    watch: &[String],
    prefix: Option<&str>,
) -> usize {
    let mut seen = HashSet::new();
    let mut installed = 0;
    for name in watch {
        let key = full_key(name, prefix);
        if !seen.insert(key.clone()) {
            continue;
        }
        if component.member(name).is_none() {
            tracing::trace!("{}: '{}' is undefined, not watched", component.name(), name);
            continue;
        }
        if !component.mark_watched(&key) {
            continue;
        }

        let weak = component.downgrade();
        let member = name.clone();
        root.watch(
            &key,
            Box::new(move |old, new| {
                if let Some(component) = weak.upgrade() {
                    apply_scope_change(&component, &member, old, new);
                }
            }),
            true,
        );
        installed += 1;
    }
    tracing::debug!("{}: installed {} watch(es)", component.name(), installed);
    installed
}

/// Copy a changed view-state value into `member`, then run its change handler
/// with `(old, new)`.
pub fn apply_scope_change(
    component: &Component,
    member: &str,
    old: Option<&ScopeValue>,
    new: Option<&ScopeValue>,
) {
    let new_value = match new {
        None => Value::Null,
        Some(value) => match value.to_data() {
            Some(data) => data,
            None => {
                tracing::trace!("{}: ignoring function written to '{}'", component.name(), member);
                return;
            }
        },
    };
    let old_value = old.and_then(ScopeValue::to_data).unwrap_or(Value::Null);

    if let Err(e) = component.set(member, new_value.clone()) {
        tracing::warn!("{}: could not apply view-state change: {}", component.name(), e);
        return;
    }
    if let Some(handler) = component.class().handler(member).cloned() {
        handler(component, &old_value, &new_value);
    }
}

/// Keep exposed members flowing into `target`. No-op once the component is observing.
pub fn install_observers(
    component: &Component,
    target: &Rc<dyn ViewState>,
    expose: &[String],
) -> Option<Strategy> {
    if component.is_observing() {
        return None;
    }
    let strategy = match component.settings().observation {
        ObservationMode::Native => Strategy::Native,
        ObservationMode::Accessor => Strategy::Accessor,
        ObservationMode::Auto if target.supports_defer() => Strategy::Native,
        ObservationMode::Auto => Strategy::Accessor,
    };
    match strategy {
        Strategy::Native => observe_native(component, target),
        Strategy::Accessor => observe_accessors(component, target, expose),
    }
    component.mark_observing(strategy);
    tracing::debug!("{}: observing with {:?}", component.name(), strategy);
    Some(strategy)
}

/// Every member reports into one queue; the queue is flushed on the host's next
/// pass and only members exposed at that point are re-projected.
fn observe_native(component: &Component, target: &Rc<dyn ViewState>) {
    for (name, field) in component.member_fields() {
        let weak = component.downgrade();
        let view = Rc::clone(target);
        let member = name.clone();
        let subscription = field.subscribe(move |_, _| {
            let Some(component) = weak.upgrade() else {
                return;
            };
            if component.queue_change(&member) {
                let weak = component.downgrade();
                let flush_view = Rc::clone(&view);
                view.defer(Box::new(move || {
                    if let Some(component) = weak.upgrade() {
                        flush_changes(&component, flush_view.as_ref());
                    }
                }));
            }
        });
        component.keep_subscription(subscription);
    }
}

fn flush_changes(component: &Component, view: &dyn ViewState) {
    let pending = component.take_pending();
    if pending.is_empty() {
        return;
    }
    let owned = owned_keys(&component.expose_list());
    let mut flushed = HashSet::new();
    for name in pending {
        let Some((_, key)) = owned.iter().find(|(owner, _)| *owner == name) else {
            continue;
        };
        if !flushed.insert(key.clone()) {
            continue;
        }
        if let Some(member) = component.member(&name) {
            write_member(component, view, key, &member);
        }
    }
    tracing::trace!("{}: flushed {} change(s)", component.name(), flushed.len());
}

/// One write-through listener per exposed member.
fn observe_accessors(component: &Component, target: &Rc<dyn ViewState>, expose: &[String]) {
    for (name, key) in owned_keys(expose) {
        let Some(field) = component.member_field(&name) else {
            continue;
        };
        let weak = component.downgrade();
        let view = Rc::clone(target);
        let subscription = field.subscribe(move |_, new| {
            let (Some(component), Some(member)) = (weak.upgrade(), new.as_ref()) else {
                return;
            };
            write_member(&component, view.as_ref(), &key, member);
        });
        component.keep_subscription(subscription);
    }
}
