//! Reactive storage for component members.
//!
//! A [`Field`] owns one value and fans every change out to its subscribers.
//! Subscribers are held weakly; the returned [`Subscription`] keeps the callback
//! alive, and dropping it removes the callback before the next notification.
//!
//! # Invariants
//!
//! 1. Setting a value equal to the current one is a no-op (no version bump, no
//!    notification).
//! 2. Subscribers are notified in registration order with `(old, new)`.
//! 3. No internal borrow is held while callbacks run, so a callback may read or
//!    write the field again.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<T> = dyn Fn(&T, &T);

struct FieldInner<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    subscribers: RefCell<Vec<Weak<Callback<T>>>>,
}

/// A shared, change-notifying value cell. Clones share the same value.
pub struct Field<T> {
    inner: Rc<FieldInner<T>>,
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

/// Keeps a [`Field`] callback registered for as long as it lives.
pub struct Subscription {
    _callback: Rc<dyn std::any::Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Subscription")
    }
}

impl<T: Clone + PartialEq + 'static> Field<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(FieldInner {
                value: RefCell::new(value),
                version: Cell::new(0),
                subscribers: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Store `value` and notify subscribers. Returns whether anything changed.
    pub fn set(&self, value: T) -> bool {
        let old = {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return false;
            }
            std::mem::replace(&mut *current, value.clone())
        };
        self.inner.version.set(self.inner.version.get() + 1);
        self.notify(&old, &value);
        true
    }

    pub fn subscribe(&self, callback: impl Fn(&T, &T) + 'static) -> Subscription {
        let strong: Rc<Callback<T>> = Rc::new(callback);
        self.inner
            .subscribers
            .borrow_mut()
            .push(Rc::downgrade(&strong));
        Subscription {
            _callback: Rc::new(strong),
        }
    }

    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    fn notify(&self, old: &T, new: &T) {
        let live: Vec<Rc<Callback<T>>> = {
            let mut subscribers = self.inner.subscribers.borrow_mut();
            subscribers.retain(|weak| weak.strong_count() > 0);
            subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        for callback in live {
            callback(old, new);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_notifies_with_old_and_new() {
        let field = Field::new(1);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = field.subscribe(move |old, new| sink.borrow_mut().push((*old, *new)));

        assert!(field.set(2));
        assert!(field.set(5));
        assert_eq!(*seen.borrow(), vec![(1, 2), (2, 5)]);
        assert_eq!(field.version(), 2);
    }

    #[test]
    fn test_equal_value_is_noop() {
        let field = Field::new("a".to_string());
        let count = Rc::new(Cell::new(0));
        let hits = Rc::clone(&count);
        let _sub = field.subscribe(move |_, _| hits.set(hits.get() + 1));

        assert!(!field.set("a".to_string()));
        assert_eq!(count.get(), 0);
        assert_eq!(field.version(), 0);
    }

    #[test]
    fn test_dropped_subscription_stops_notifications() {
        let field = Field::new(0);
        let count = Rc::new(Cell::new(0));
        let hits = Rc::clone(&count);
        let sub = field.subscribe(move |_, _| hits.set(hits.get() + 1));

        field.set(1);
        drop(sub);
        field.set(2);
        assert_eq!(count.get(), 1);
        assert_eq!(field.subscriber_count(), 0);
    }

    #[test]
    fn test_callback_may_write_back() {
        let field = Field::new(0);
        let echo = field.clone();
        let _sub = field.subscribe(move |_, new| {
            if *new < 3 {
                echo.set(new + 1);
            }
        });

        field.set(1);
        assert_eq!(field.get(), 3);
    }

    #[test]
    fn test_clones_share_value() {
        let a = Field::new(vec![1]);
        let b = a.clone();
        b.set(vec![1, 2]);
        assert_eq!(a.get(), vec![1, 2]);
        a.with(|v| assert_eq!(v.len(), 2));
    }
}
