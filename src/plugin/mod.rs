//! Observer plumbing between oracles and their plugins.
//!
//! An oracle that supports plugins owns a [`Notifier`]; each attached
//! [`Subscriber`] is called back on the oracle's events and may narrow the
//! oracle's active bounds. The relationship is composition by field: the
//! oracle does not inherit anything from the plugin machinery.

mod reducer;

pub use reducer::{DomainReducer, DomainReducerBuilder};

/// Something an oracle reports to its subscribers.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    /// The oracle recorded a new observation; carries the full history.
    Told {
        /// Observed vectors, in search-space layout.
        x: &'a [Vec<f64>],
        /// Observed objective values, aligned with `x`.
        y: &'a [f64],
    },
}

/// Receives events from an oracle's [`Notifier`].
pub trait Subscriber: Send {
    /// Registry name of the plugin.
    fn name(&self) -> &str;

    /// Handles one event emitted by the oracle named `source`.
    ///
    /// `bounds` are the oracle's active per-dimension bounds; a plugin may
    /// tighten them in place.
    fn on_event(&mut self, event: &Event<'_>, source: &str, bounds: &mut [(f64, f64)]);
}

/// The subject half of the observer pair: a list of subscribers.
#[derive(Default)]
pub struct Notifier {
    subscribers: Vec<Box<dyn Subscriber>>,
}

impl Notifier {
    /// Creates a notifier with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber.
    pub fn attach(&mut self, subscriber: Box<dyn Subscriber>) {
        trace_debug!(plugin = subscriber.name(), "plugin attached");
        self.subscribers.push(subscriber);
    }

    /// Removes and returns the first subscriber called `name`.
    pub fn detach(&mut self, name: &str) -> Option<Box<dyn Subscriber>> {
        let pos = self.subscribers.iter().position(|s| s.name() == name)?;
        Some(self.subscribers.remove(pos))
    }

    /// Delivers `event` to every subscriber in attach order.
    pub fn notify(&mut self, event: &Event<'_>, source: &str, bounds: &mut [(f64, f64)]) {
        for subscriber in &mut self.subscribers {
            subscriber.on_event(event, source, bounds);
        }
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// `true` if nothing is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl core::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.subscribers.iter().map(|s| s.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shrink(&'static str);

    impl Subscriber for Shrink {
        fn name(&self) -> &str {
            self.0
        }

        fn on_event(&mut self, _event: &Event<'_>, _source: &str, bounds: &mut [(f64, f64)]) {
            for b in bounds.iter_mut() {
                b.1 = f64::midpoint(b.0, b.1);
            }
        }
    }

    #[test]
    fn notify_and_detach() {
        let mut n = Notifier::new();
        n.attach(Box::new(Shrink("a")));
        n.attach(Box::new(Shrink("b")));
        let mut bounds = vec![(0.0, 4.0)];
        n.notify(&Event::Told { x: &[], y: &[] }, "o", &mut bounds);
        assert_eq!(bounds, vec![(0.0, 1.0)]);

        assert!(n.detach("a").is_some());
        assert!(n.detach("a").is_none());
        assert_eq!(n.len(), 1);
    }
}
