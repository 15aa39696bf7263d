//! Class-style components synchronized with a host framework's view state.
//!
//! Components are declared as [`ComponentClass`]es with inherited expose and
//! watch lists. Once an instance receives its view state, exposed members are
//! projected into it and watched keys flow back into the instance.

pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{Locals, Scope};
pub use app::{Directive, Module, Runner};
pub use config::{ObservationMode, Settings};
pub use core::component::{BindState, Component, ComponentKind};
pub use core::hierarchy::ComponentClass;
pub use core::sync::Strategy;
pub use domain::model::{Dependency, Member, ScopeValue};
pub use domain::ports::{Injector, ViewState};
pub use utils::error::{Result, ScopeError};
