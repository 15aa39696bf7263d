pub mod component;
pub mod field;
pub mod hierarchy;
pub mod normalize;
pub mod registry;
pub mod sync;

pub use crate::domain::model::{BoundMethod, Dependency, Member, Method, ScopeValue};
pub use crate::domain::ports::{Injector, ViewState};
