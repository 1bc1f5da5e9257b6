//! signal - ordered listener registry
//!
//! listeners run in the order they were added. one-shot listeners are
//! dropped after their first call. a memorizing signal replays its last
//! value to listeners added after it fired.

use std::fmt;

type Callback<T> = Box<dyn FnMut(&T) + Send>;

/// handle returned by `add`, used to remove a listener again
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener<T> {
    id: ListenerId,
    once: bool,
    callback: Callback<T>,
}

pub struct Signal<T> {
    listeners: Vec<Listener<T>>,
    next_id: u64,
    memorize: bool,
    last: Option<T>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.listeners.len())
            .field("memorize", &self.memorize)
            .field("fired", &self.last.is_some())
            .finish()
    }
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
            memorize: false,
            last: None,
        }
    }

    /// signal that remembers its last dispatch
    pub fn memorizing() -> Self {
        Self {
            memorize: true,
            ..Self::new()
        }
    }

    pub fn add(&mut self, callback: impl FnMut(&T) + Send + 'static) -> ListenerId {
        self.register(Box::new(callback), false)
    }

    pub fn add_once(&mut self, callback: impl FnMut(&T) + Send + 'static) -> ListenerId {
        self.register(Box::new(callback), true)
    }

    /// returns false if the listener was already gone
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    pub fn num_listeners(&self) -> usize {
        self.listeners.len()
    }

    pub fn dispatch(&mut self, value: T) {
        for listener in &mut self.listeners {
            (listener.callback)(&value);
        }
        self.listeners.retain(|l| !l.once);

        if self.memorize {
            self.last = Some(value);
        }
    }

    fn register(&mut self, mut callback: Callback<T>, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;

        if let Some(last) = &self.last {
            callback(last);
            if once {
                return id;
            }
        }

        self.listeners.push(Listener { id, once, callback });
        id
    }
}
