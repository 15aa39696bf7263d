use anyhow::Result;
use scopebind::app::directive::{directive, directive_with, Attributes, DirectiveKind};
use scopebind::app::filter::{filter, filter_fn, filter_with, FilterKind};
use scopebind::app::{controller, Module};
use scopebind::core::component::Service;
use scopebind::{Component, ComponentClass, Dependency, Locals, Scope, ScopeError, ViewState};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

fn widget() -> Rc<ComponentClass> {
    controller("Widget")
        .expose(["count", "label"])
        .watch(["count"])
        .field("count", 0)
        .field("label", "widget")
        .field("hidden", "not exposed")
        .build()
}

/// 有別名時，成員寫進 scope.w，watch 也註冊在 w.count
#[test]
fn test_controller_alias_namespaces_keys() -> Result<()> {
    let scope = Scope::new();
    scope.set_declaration("Widget AS w");
    let component = Component::new(&widget(), vec![Dependency::view(scope.clone())]);

    assert_eq!(component.statement_name().as_deref(), Some("w"));
    assert_eq!(scope.snapshot(), json!({"w": {"count": 0, "label": "widget"}}));
    assert_eq!(scope.watched_paths(), vec!["w.count"]);
    assert_eq!(component.watched_keys(), vec!["w.count"]);

    scope.set_value("count", 7);
    scope.set_value("w.count", 4);
    scope.digest()?;
    assert_eq!(component.get("count"), Some(json!(4)));
    Ok(())
}

#[test]
fn test_controller_without_alias_uses_root() {
    let scope = Scope::new();
    let _component = Component::new(&widget(), vec![Dependency::view(scope.clone())]);
    assert_eq!(scope.snapshot(), json!({"count": 0, "label": "widget"}));
    assert_eq!(scope.watched_paths(), vec!["count"]);
}

/// 巢狀 scope 不會繼承外層的宣告
#[test]
fn test_controller_on_nested_scope_has_no_alias() {
    let root = Scope::new();
    root.set_declaration("Outer as o");
    let inner = root.child("inner");

    let class = controller("Inner")
        .expose(["label"])
        .watch(["label"])
        .field("label", "x")
        .build();
    let component = Component::new(&class, vec![Dependency::view(inner)]);

    assert_eq!(component.statement_name(), None);
    assert_eq!(root.snapshot(), json!({"inner": {"label": "x"}}));
    assert_eq!(root.watched_paths(), vec!["inner.label"]);
}

#[test]
fn test_controller_emits_init_event_once() -> Result<()> {
    let scope = Scope::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    scope.on("ctrl:init", move |payload| sink.borrow_mut().push(payload.clone()));

    let component = Component::new(&widget(), vec![Dependency::view(scope.clone())]);
    component.attach_view_state(scope.clone())?;

    assert_eq!(*seen.borrow(), vec![json!(["Widget"])]);
    Ok(())
}

#[test]
fn test_module_mounts_controller_from_statement() -> Result<()> {
    let mut module = Module::new("app");
    module.register(&widget());

    let scope = Scope::new();
    let locals = Locals::scope("$scope", scope.clone());
    let component = module.controller("Widget as panel", &locals)?;

    assert_eq!(component.name(), "Widget");
    assert_eq!(scope.declaration().as_deref(), Some("Widget as panel"));
    assert_eq!(scope.get_value("panel.label"), Some(json!("widget")));

    let missing = module.controller("Nope as n", &locals).unwrap_err();
    assert!(matches!(missing, ScopeError::UnknownComponent { .. }));
    Ok(())
}

#[test]
fn test_module_resolves_values_and_services() -> Result<()> {
    let greeter = ComponentClass::builder("greeter")
        .kind(Service)
        .inject(["punctuation"])
        .method("greet", |this, args| {
            let name = args.first().and_then(Value::as_str).unwrap_or("");
            let mark = this
                .resolve("punctuation")
                .and_then(|d| d.as_value().and_then(Value::as_str).map(str::to_string))
                .unwrap_or_default();
            json!(format!("hello {}{}", name, mark))
        })
        .build();
    let home = controller("Home")
        .inject(["$scope", "greeter"])
        .expose(["message"])
        .declare("message")
        .method("refresh", |this, _| {
            let message = this
                .resolve_as::<Component>("greeter")
                .and_then(|service| service.call("greet", &[json!("Ada")]))
                .unwrap_or(Value::Null);
            let _ = this.set("message", message.clone());
            message
        })
        .build();

    let mut module = Module::new("app");
    module
        .register(&greeter)
        .register(&home)
        .value("punctuation", Dependency::value("!"));

    let scope = Scope::new();
    let component = module.controller("Home", &Locals::scope("$scope", scope.clone()))?;
    assert_eq!(component.call("refresh", &[]), Some(json!("hello Ada!")));
    scope.digest()?;
    assert_eq!(scope.get_value("message"), Some(json!("hello Ada!")));
    Ok(())
}

#[test]
fn test_module_reports_unknown_provider() {
    let needy = controller("Needy").inject(["$scope", "$http"]).build();
    let mut module = Module::new("app");
    module.register(&needy);

    let err = module
        .controller("Needy", &Locals::scope("$scope", Scope::new()))
        .unwrap_err();
    match err {
        ScopeError::UnknownProvider { name, component } => {
            assert_eq!(name, "$http");
            assert_eq!(component, "Needy");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_directive_links_a_fresh_component_per_scope() -> Result<()> {
    let tooltip = directive("Tooltip")
        .expose(["text"])
        .field("text", "tip")
        .method("link", |this, args| {
            if let Some(text) = args.first().and_then(|attrs| attrs.get("tooltip")).cloned() {
                let _ = this.set("text", text);
            }
            Value::Null
        })
        .build();
    let mut module = Module::new("ui");
    module.register(&tooltip);
    let definition = module
        .instantiate("Tooltip", &Locals::new())?
        .into_directive()
        .expect("directive factory");

    let first = Scope::new();
    let second = Scope::new();
    let attrs: Attributes = [("tooltip".to_string(), "hello".to_string())].into();
    let a = definition.link(first.clone(), &attrs)?;
    let b = definition.link(second.clone(), &Attributes::new())?;
    first.digest()?;
    second.digest()?;

    assert!(!a.ptr_eq(&b));
    assert_eq!(first.get_value("text"), Some(json!("hello")));
    assert_eq!(second.get_value("text"), Some(json!("tip")));
    assert_eq!(definition.parse_attribute(&attrs), json!("hello"));
    Ok(())
}

#[test]
fn test_directive_attribute_parsing() {
    let class = directive_with("chart", DirectiveKind::default().attribute("chart-options")).build();
    let definition = scopebind::Directive::new(&class, vec![]);

    let attrs: Attributes = [("chart-options".to_string(), r#"{"bars": 3}"#.to_string())].into();
    assert_eq!(definition.parse_attribute(&attrs), json!({"bars": 3}));

    let attrs: Attributes = [("chart-options".to_string(), "{broken".to_string())].into();
    assert_eq!(definition.parse_attribute(&attrs), json!("{broken"));
}

fn counting(kind: FilterKind) -> Rc<ComponentClass> {
    filter_with("count", kind)
        .field("calls", 0)
        .method("filter", |this, _| {
            let calls = this.get("calls").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
            let _ = this.set("calls", calls);
            json!(calls)
        })
        .build()
}

#[test]
fn test_filter_keeps_one_instance() {
    let apply = filter_fn(&counting(FilterKind::default()), vec![]);
    assert_eq!(apply(&[]), json!(1));
    assert_eq!(apply(&[]), json!(2));
}

#[test]
fn test_stateful_filter_is_rebuilt_per_call() {
    let apply = filter_fn(&counting(FilterKind { stateful: true }), vec![]);
    assert_eq!(apply(&[]), json!(1));
    assert_eq!(apply(&[]), json!(1));
}

#[test]
fn test_filter_runs_init_before_use() -> Result<()> {
    let upper = filter("upper")
        .field("ready", false)
        .method("init", |this, _| {
            let _ = this.set("ready", true);
            Value::Null
        })
        .method("filter", |this, args| {
            let ready = this.get("ready") == Some(json!(true));
            let text = args.first().and_then(Value::as_str).unwrap_or("");
            json!(if ready { text.to_uppercase() } else { text.to_string() })
        })
        .build();

    let mut module = Module::new("filters");
    module.register(&upper);
    let apply = module
        .instantiate("upper", &Locals::new())?
        .into_filter()
        .expect("filter factory");
    assert_eq!(apply(&[json!("abc")]), json!("ABC"));
    assert!(upper.inject().is_empty());
    Ok(())
}
