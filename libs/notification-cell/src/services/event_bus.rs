use futures::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::models::{EventFilter, ScheduleEvent};

const DEFAULT_CAPACITY: usize = 1000;

/// In-process publish/subscribe channel for schedule changes.
///
/// Delivery is best effort and at most once: a subscriber that falls more
/// than `capacity` events behind loses the oldest ones, and nothing is
/// replayed to subscribers that join later.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ScheduleEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many subscribers the event reached. Never fails.
    pub fn publish(&self, event: ScheduleEvent) -> usize {
        let topic = event.topic();
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!("Published {} to {} subscriber(s)", topic, receivers);
                receivers
            }
            Err(_) => {
                debug!("Dropped {}: no subscribers", topic);
                0
            }
        }
    }

    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<ScheduleEvent>,
    filter: EventFilter,
}

impl Subscription {
    /// Next event passing the filter, or `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<ScheduleEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagged, skipped {} event(s)", skipped);
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = ScheduleEvent> {
        stream::unfold(self, |mut subscription| async move {
            subscription.next().await.map(|event| (event, subscription))
        })
    }
}
