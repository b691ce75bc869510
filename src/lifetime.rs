//! Liveness flag shared between a screen and the async work it starts.

use std::cell::Cell;
use std::rc::{Rc, Weak};

/// Owned by a mounted component. Ends when dropped or on `end()`.
#[derive(Debug)]
pub struct ComponentLifetime {
    alive: Rc<Cell<bool>>,
}

impl Default for ComponentLifetime {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentLifetime {
    pub fn new() -> Self {
        Self {
            alive: Rc::new(Cell::new(true)),
        }
    }

    pub fn token(&self) -> LifetimeToken {
        LifetimeToken {
            alive: Rc::downgrade(&self.alive),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.get()
    }

    pub fn end(&self) {
        self.alive.set(false);
    }
}

impl Drop for ComponentLifetime {
    fn drop(&mut self) {
        self.end();
    }
}

/// Handed to pending work; checked before touching component state.
#[derive(Debug, Clone)]
pub struct LifetimeToken {
    alive: Weak<Cell<bool>>,
}

impl LifetimeToken {
    pub fn is_alive(&self) -> bool {
        self.alive.upgrade().map(|alive| alive.get()).unwrap_or(false)
    }
}
