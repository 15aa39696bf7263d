use anyhow::Result;
use scopebind::core::sync::Strategy;
use scopebind::domain::model::Method;
use scopebind::{
    BindState, Component, ComponentClass, Dependency, Member, ObservationMode, Scope, ScopeError,
    Settings,
};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

fn counter_class(changes: Rc<RefCell<Vec<(Value, Value)>>>) -> Rc<ComponentClass> {
    ComponentClass::builder("Counter")
        .expose(["count", "greet", "name"])
        .watch(["count"])
        .field("count", 0)
        .field("name", "Ada")
        .method("greet", |this, _| {
            let name = this.get("name").unwrap_or_default();
            json!(format!("hello {}", name.as_str().unwrap_or("")))
        })
        .on_scope_change("count", move |_, old, new| {
            changes.borrow_mut().push((old.clone(), new.clone()))
        })
        .build()
}

/// 建構時注入 $scope 就會把 expose 的成員寫進去
#[test]
fn test_label_projected_at_construction() {
    let class = ComponentClass::builder("Label")
        .inject(["$scope"])
        .expose(["label"])
        .field("label", "hi")
        .build();
    let scope = Scope::new();
    let component = Component::new(&class, vec![Dependency::view(scope.clone())]);

    assert_eq!(scope.get_value("label"), Some(json!("hi")));
    assert_eq!(component.state(), BindState::Observing);
}

#[test]
fn test_projected_method_is_bound_to_instance() {
    let changes = Rc::new(RefCell::new(Vec::new()));
    let scope = Scope::with_options(10, false);
    let component = Component::new(&counter_class(changes), vec![Dependency::view(scope.clone())]);

    assert_eq!(scope.call("greet", &[]), Some(json!("hello Ada")));
    component.set("name", "Bob").unwrap();
    assert_eq!(scope.call("greet", &[]), Some(json!("hello Bob")));

    drop(component);
    assert_eq!(scope.call("greet", &[]), None);
}

#[test]
fn test_watch_updates_member_and_runs_handler_once() -> Result<()> {
    for (scope, strategy) in [
        (Scope::new(), Strategy::Native),
        (Scope::with_options(10, false), Strategy::Accessor),
    ] {
        let changes = Rc::new(RefCell::new(Vec::new()));
        let component =
            Component::new(&counter_class(changes.clone()), vec![Dependency::view(scope.clone())]);
        assert_eq!(component.strategy(), Some(strategy));

        scope.set_value("count", 5);
        assert_eq!(scope.digest()?, 1);

        assert_eq!(component.get("count"), Some(json!(5)));
        assert_eq!(*changes.borrow(), vec![(json!(0), json!(5))]);
        assert_eq!(scope.get_value("count"), Some(json!(5)));
    }
    Ok(())
}

#[test]
fn test_native_observation_waits_for_next_pass() -> Result<()> {
    let scope = Scope::new();
    let component = Component::new(
        &counter_class(Rc::new(RefCell::new(Vec::new()))),
        vec![Dependency::view(scope.clone())],
    );

    component.set("count", 9)?;
    component.set("name", "Eve")?;
    assert_eq!(scope.get_value("count"), Some(json!(0)));
    // one flush per pass, however many members changed
    assert_eq!(scope.pending_tasks(), 1);

    scope.digest()?;
    assert_eq!(scope.get_value("count"), Some(json!(9)));
    assert_eq!(scope.get_value("name"), Some(json!("Eve")));
    Ok(())
}

#[test]
fn test_accessor_observation_writes_through() -> Result<()> {
    let settings = Settings {
        observation: ObservationMode::Accessor,
        ..Settings::default()
    };
    let class = ComponentClass::builder("Forced")
        .settings(Rc::new(settings))
        .expose(["count"])
        .field("count", 1)
        .build();
    let scope = Scope::new();
    let component = Component::new(&class, vec![Dependency::view(scope.clone())]);

    assert_eq!(component.strategy(), Some(Strategy::Accessor));
    component.set("count", 2)?;
    assert_eq!(scope.get_value("count"), Some(json!(2)));
    assert_eq!(scope.pending_tasks(), 0);
    Ok(())
}

#[test]
fn test_replaced_method_is_rebound() -> Result<()> {
    let scope = Scope::new();
    let component = Component::new(
        &counter_class(Rc::new(RefCell::new(Vec::new()))),
        vec![Dependency::view(scope.clone())],
    );
    component.set_member(
        "greet",
        Member::Method(Method::new(|this, _| json!(format!("bye {}", this.name())))),
    )?;
    scope.digest()?;
    assert_eq!(scope.call("greet", &[]), Some(json!("bye Counter")));
    Ok(())
}

#[test]
fn test_attach_is_idempotent() -> Result<()> {
    let changes = Rc::new(RefCell::new(Vec::new()));
    let component = Component::new(&counter_class(changes), vec![]);
    assert_eq!(component.state(), BindState::Unbound);

    let scope = Scope::new();
    component.attach_view_state(scope.clone())?;
    let first = scope.snapshot();
    let watchers = scope.watcher_count();

    component.attach_view_state(scope.clone())?;
    assert_eq!(scope.snapshot(), first);
    assert_eq!(scope.watcher_count(), watchers);
    assert_eq!(watchers, 1);

    let other = Scope::new();
    let err = component.attach_view_state(other.clone()).unwrap_err();
    assert!(matches!(err, ScopeError::AlreadyBound { .. }));
    assert_eq!(other.snapshot(), json!({}));
    Ok(())
}

#[test]
fn test_add_dependency_runs_initialization() {
    let class = ComponentClass::builder("Late")
        .expose(["label"])
        .field("label", "late")
        .build();
    let component = Component::new(&class, vec![]);
    let scope = Scope::new();

    component.add_dependency("$scope", Dependency::view(scope.clone()));
    assert!(component.is_observing());
    assert_eq!(scope.get_value("label"), Some(json!("late")));
    assert!(component.resolve("scope").is_some());
}

#[test]
fn test_undefined_members_are_skipped() {
    let class = ComponentClass::builder("Sparse")
        .expose(["extra", "present"])
        .watch(["extra"])
        .declare("extra")
        .field("present", false)
        .build();
    let scope = Scope::new();
    scope.set_value("extra", "keep");

    let _component = Component::new(&class, vec![Dependency::view(scope.clone())]);
    assert_eq!(scope.get_value("extra"), Some(json!("keep")));
    // falsy values are still projected
    assert_eq!(scope.get_value("present"), Some(json!(false)));
    assert_eq!(scope.watcher_count(), 0);
}

#[test]
fn test_dependency_value_is_projected_first() {
    let class = ComponentClass::builder("Titled")
        .inject(["$scope", "title"])
        .expose(["title"])
        .field("title", "default")
        .build();
    let scope = Scope::new();
    let _component = Component::new(
        &class,
        vec![Dependency::view(scope.clone()), Dependency::value("from-dependency")],
    );
    assert_eq!(scope.get_value("title"), Some(json!("from-dependency")));
}

#[test]
fn test_keys_are_normalized_once() {
    let class = ComponentClass::builder("User")
        .expose(["user_name", "user.name", "is-active"])
        .field("user_name", "ada")
        .field("user.name", "ignored")
        .field("is-active", true)
        .build();
    let scope = Scope::new();
    let _component = Component::new(&class, vec![Dependency::view(scope.clone())]);

    assert_eq!(
        scope.snapshot(),
        json!({"userName": "ada", "isActive": true})
    );
}

#[test]
fn test_subclass_surface_is_inherited() {
    let base = ComponentClass::builder("Base")
        .expose(["title"])
        .watch(["filter"])
        .field("title", "base")
        .field("filter", "")
        .build();
    let page = ComponentClass::builder("Page")
        .extends(&base)
        .expose(["items"])
        .field("items", json!([]))
        .build();
    let scope = Scope::new();
    let component = Component::new(&page, vec![Dependency::view(scope.clone())]);

    assert_eq!(scope.snapshot(), json!({"items": [], "title": "base"}));
    assert_eq!(scope.watched_paths(), vec!["filter"]);
    // 實例自己的清單不會影響類別
    assert!(!component.expose_member("late"));
    assert_eq!(page.lists().expose, vec!["items", "title"]);
}
