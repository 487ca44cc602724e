// One-shot UI events (navigation, toasts) that must be handled exactly once,
// even when several observers hold the same event.
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub struct Event<T> {
    content: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            content: Arc::clone(&self.content),
        }
    }
}

impl<T> Event<T> {
    pub fn new(content: T) -> Self {
        Self {
            content: Arc::new(Mutex::new(Some(content))),
        }
    }

    /// The first caller gets the content; everyone after gets `None`.
    pub fn take(&self) -> Option<T> {
        match self.content.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    pub fn is_handled(&self) -> bool {
        match self.content.lock() {
            Ok(slot) => slot.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

impl<T: Clone> Event<T> {
    /// Look without consuming.
    pub fn peek(&self) -> Option<T> {
        match self.content.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
