//! Events and typed event handlers.
//!
//! Handlers are stored directly in view properties. When a native view receives a gesture, the
//! handler of that view is invoked; if it has none, the gesture bubbles up to its superviews.

use crate::view_tree::ViewId;
use core::fmt;
use parking_lot::Mutex;
use std::sync::Arc;

/// Kinds of gestures a native view can report.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Gesture {
    Tap = 0,
    Press = 1,
    DoubleTap = 2,
}

/// A gesture, as delivered to gesture handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureEvent {
    /// The view the gesture originally targeted.
    pub target: ViewId,

    /// The view whose handler is being invoked; differs from `target` if the event bubbled.
    pub current: ViewId,

    pub gesture: Gesture,
}

/// A typed event handler.
///
/// Handlers compare equal only if they are clones of each other, so re-creating a closure during
/// render counts as a property change.
pub struct EventHandler<T>(Arc<Mutex<dyn FnMut(T) + Send>>);

impl<T> Clone for EventHandler<T> {
    fn clone(&self) -> Self {
        EventHandler(Arc::clone(&self.0))
    }
}

impl<T> EventHandler<T> {
    pub fn new<F: 'static + FnMut(T) + Send>(handler: F) -> Self {
        EventHandler(Arc::new(Mutex::new(handler)))
    }

    /// Invokes the handler.
    pub fn call(&self, event: T) {
        let mut handler = self.0.lock();
        (&mut *handler)(event)
    }
}

impl<T> PartialEq for EventHandler<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> fmt::Debug for EventHandler<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EventHandler<{}>", core::any::type_name::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn handlers_compare_by_identity() {
        let a = EventHandler::new(|_: u32| {});
        let b = EventHandler::new(|_: u32| {});
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn handlers_can_mutate_captures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut total = 0;
        let counter = Arc::clone(&calls);
        let handler = EventHandler::new(move |n: usize| {
            total += n;
            counter.store(total, Ordering::SeqCst);
        });
        handler.call(2);
        handler.clone().call(3);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }
}
