use crate::core::component::{Component, WeakComponent};
use crate::domain::ports::ViewState;
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

type MethodFn = dyn Fn(&Component, &[Value]) -> Value;

/// A callable member. The function receives the component it is invoked on.
#[derive(Clone)]
pub struct Method {
    func: Rc<MethodFn>,
}

impl Method {
    pub fn new(func: impl Fn(&Component, &[Value]) -> Value + 'static) -> Self {
        Self {
            func: Rc::new(func),
        }
    }

    pub fn invoke(&self, receiver: &Component, args: &[Value]) -> Value {
        (self.func)(receiver, args)
    }

    /// Fix the receiver so the method can be handed to the view state as a plain function.
    pub fn bind(&self, receiver: &Component) -> BoundMethod {
        BoundMethod {
            method: self.clone(),
            receiver: receiver.downgrade(),
        }
    }

    pub fn ptr_eq(&self, other: &Method) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Method({:p})", Rc::as_ptr(&self.func) as *const ())
    }
}

/// A method paired with its receiver.
///
/// The receiver is held weakly: the view state must not keep a component alive,
/// since the component already holds the view state through its registry.
#[derive(Clone)]
pub struct BoundMethod {
    method: Method,
    receiver: WeakComponent,
}

impl BoundMethod {
    /// Returns `None` once the receiver has been dropped.
    pub fn call(&self, args: &[Value]) -> Option<Value> {
        let receiver = self.receiver.upgrade()?;
        Some(self.method.invoke(&receiver, args))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn receiver(&self) -> Option<Component> {
        self.receiver.upgrade()
    }
}

impl PartialEq for BoundMethod {
    fn eq(&self, other: &Self) -> bool {
        self.method.ptr_eq(&other.method) && self.receiver.ptr_eq(&other.receiver)
    }
}

impl fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundMethod")
            .field("method", &self.method)
            .field("receiver", &self.receiver.name())
            .finish()
    }
}

/// A value stored in the view state.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeValue {
    Data(Value),
    Function(BoundMethod),
    Object(BTreeMap<String, ScopeValue>),
}

impl ScopeValue {
    pub fn object() -> Self {
        ScopeValue::Object(BTreeMap::new())
    }

    pub fn as_data(&self) -> Option<&Value> {
        match self {
            ScopeValue::Data(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&BoundMethod> {
        match self {
            ScopeValue::Function(bound) => Some(bound),
            _ => None,
        }
    }

    /// The data carried by this value. Functions carry none and are dropped
    /// from nested objects.
    pub fn to_data(&self) -> Option<Value> {
        match self {
            ScopeValue::Data(value) => Some(value.clone()),
            ScopeValue::Function(_) => None,
            ScopeValue::Object(children) => Some(Value::Object(
                children
                    .iter()
                    .filter_map(|(key, child)| child.to_data().map(|v| (key.clone(), v)))
                    .collect(),
            )),
        }
    }

    /// JSON rendering for display; functions show up as `"[Function]"`.
    pub fn to_json(&self) -> Value {
        match self {
            ScopeValue::Data(value) => value.clone(),
            ScopeValue::Function(_) => Value::String("[Function]".to_string()),
            ScopeValue::Object(children) => Value::Object(
                children
                    .iter()
                    .map(|(key, child)| (key.clone(), child.to_json()))
                    .collect(),
            ),
        }
    }

    /// Top-level comparison: objects compare by key set only.
    pub fn shallow_eq(&self, other: &ScopeValue) -> bool {
        match (self, other) {
            (ScopeValue::Object(a), ScopeValue::Object(b)) => a.keys().eq(b.keys()),
            (ScopeValue::Data(Value::Object(a)), ScopeValue::Data(Value::Object(b))) => {
                a.keys().eq(b.keys())
            }
            (ScopeValue::Data(Value::Array(a)), ScopeValue::Data(Value::Array(b))) => {
                a.len() == b.len()
            }
            _ => self == other,
        }
    }
}

impl From<Value> for ScopeValue {
    fn from(value: Value) -> Self {
        ScopeValue::Data(value)
    }
}

impl From<BoundMethod> for ScopeValue {
    fn from(bound: BoundMethod) -> Self {
        ScopeValue::Function(bound)
    }
}

/// The value held by a declared component member.
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Data(Value),
    Method(Method),
}

impl Member {
    pub fn is_callable(&self) -> bool {
        matches!(self, Member::Method(_))
    }

    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Member::Data(value) => Some(value),
            Member::Method(_) => None,
        }
    }
}

impl From<Value> for Member {
    fn from(value: Value) -> Self {
        Member::Data(value)
    }
}

impl From<Method> for Member {
    fn from(method: Method) -> Self {
        Member::Method(method)
    }
}

/// A raw injected dependency.
#[derive(Clone)]
pub enum Dependency {
    Value(Value),
    View(Rc<dyn ViewState>),
    Service(Rc<dyn Any>),
}

impl Dependency {
    pub fn value(value: impl Into<Value>) -> Self {
        Dependency::Value(value.into())
    }

    pub fn view(view: Rc<dyn ViewState>) -> Self {
        Dependency::View(view)
    }

    pub fn service<T: Any>(service: T) -> Self {
        Dependency::Service(Rc::new(service))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Dependency::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_view(&self) -> Option<&Rc<dyn ViewState>> {
        match self {
            Dependency::View(view) => Some(view),
            _ => None,
        }
    }

    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        match self {
            Dependency::Service(service) => Rc::clone(service).downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Only plain values can be written into a view state.
    pub fn to_scope_value(&self) -> Option<ScopeValue> {
        self.as_value().map(|value| ScopeValue::Data(value.clone()))
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Dependency::View(_) => f.write_str("View(..)"),
            Dependency::Service(_) => f.write_str("Service(..)"),
        }
    }
}
