// 宿主框架端的實作：記憶體內的 scope 與 locals 注入器
pub mod injector;
pub mod scope;

pub use injector::Locals;
pub use scope::{EmittedEvent, Scope};
