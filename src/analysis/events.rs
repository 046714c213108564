//! Notifications for views that hold on to measurements.
//!
//! Plots and tables subscribe to [`MeasurementRemoved`] and drop whatever
//! they keep for that identifier; the analysis never knows who is listening.

use std::fmt;

/// Published once for every measurement taken out of an analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementRemoved {
    pub identifier: String,
    pub title: String,
}

/// Handle returned by `subscribe`, needed to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&MeasurementRemoved)>;

#[derive(Default)]
pub(crate) struct Observers {
    next: u64,
    subscribers: Vec<(SubscriptionId, Observer)>,
}

impl Observers {
    pub(crate) fn subscribe(&mut self, observer: Observer) -> SubscriptionId {
        let id = SubscriptionId(self.next);
        self.next += 1;
        self.subscribers.push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub(crate) fn publish(&mut self, event: &MeasurementRemoved) {
        for (_, observer) in &mut self.subscribers {
            observer(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
