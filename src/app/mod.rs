// 各種元件：controller、directive、filter，以及註冊它們的 module
pub mod controller;
pub mod directive;
pub mod filter;
pub mod module;
pub mod runner;

pub use controller::{controller, ControllerKind};
pub use directive::{directive, directive_with, Attributes, Directive, DirectiveKind};
pub use filter::{filter, filter_fn, filter_with, FilterFn, FilterKind};
pub use module::{Factory, Module, Provided};
pub use runner::{RunReport, Runner};
