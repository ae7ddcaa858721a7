//! Values that may be computed from session state at the point of use.

use std::fmt;
use std::rc::Rc;

/// A literal value or a thunk evaluated against a context `C`.
///
/// The thunk runs once per [`Delayed::resolve`] call; callers resolve at the
/// point of consumption and hold on to the result.
pub enum Delayed<T, C: ?Sized> {
    Ready(T),
    Thunk(Rc<dyn Fn(&C) -> T>),
}

impl<T, C: ?Sized> Delayed<T, C> {
    pub fn thunk(f: impl Fn(&C) -> T + 'static) -> Self {
        Delayed::Thunk(Rc::new(f))
    }
}

impl<T: Clone, C: ?Sized> Delayed<T, C> {
    pub fn resolve(&self, ctx: &C) -> T {
        match self {
            Delayed::Ready(value) => value.clone(),
            Delayed::Thunk(f) => f(ctx),
        }
    }
}

impl<T: Default, C: ?Sized> Default for Delayed<T, C> {
    fn default() -> Self {
        Delayed::Ready(T::default())
    }
}

impl<T, C: ?Sized> From<T> for Delayed<T, C> {
    fn from(value: T) -> Self {
        Delayed::Ready(value)
    }
}

impl<T: Clone, C: ?Sized> Clone for Delayed<T, C> {
    fn clone(&self) -> Self {
        match self {
            Delayed::Ready(value) => Delayed::Ready(value.clone()),
            Delayed::Thunk(f) => Delayed::Thunk(Rc::clone(f)),
        }
    }
}

impl<T: fmt::Debug, C: ?Sized> fmt::Debug for Delayed<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delayed::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Delayed::Thunk(_) => f.write_str("Thunk(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn thunk_runs_once_per_resolve() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let delayed: Delayed<u32, u32> = Delayed::thunk(move |base| {
            counter.set(counter.get() + 1);
            base + 1
        });

        assert_eq!(delayed.resolve(&4), 5);
        assert_eq!(calls.get(), 1);
        assert_eq!(delayed.resolve(&9), 10);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn ready_value_is_cloned() {
        let delayed: Delayed<Vec<u8>, ()> = vec![1, 2].into();
        assert_eq!(delayed.resolve(&()), vec![1, 2]);
    }
}
