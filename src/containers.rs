use tokio::sync::watch;

/// A mutable-but-externally-read-only reactive cell.
///
/// The engine holds the only setter side. Readers take a
/// [`watch::Receiver`] via [`subscribe`](Container::subscribe) and observe
/// the current value immediately, then every subsequent value.
pub struct Container<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> Container<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Clone of the current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Replace the value wholesale.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Compute the next value from the prior one. Required when the next
    /// value (or a decision taken alongside it) depends on what it replaces.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = {
            let current = self.tx.borrow();
            f(&current)
        };
        self.tx.send_replace(next);
    }

    /// Subscribe to the current value and every subsequent one.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}
