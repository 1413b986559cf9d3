use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use shared_database::BackendClient;
use shared_models::auth::Session;

use crate::error::NotificationError;
use crate::models::{ScheduleEvent, ScheduleEventKind};
use crate::services::EventBus;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationCountSource: Send + Sync {
    async fn unread_count(&self, user_id: i64) -> Result<u32, NotificationError>;
}

/// Reads unread notification rows from the backend.
pub struct RestNotificationSource {
    backend: Arc<BackendClient>,
    session: Session,
}

impl RestNotificationSource {
    pub fn new(backend: Arc<BackendClient>, session: Session) -> Self {
        Self { backend, session }
    }
}

#[async_trait]
impl NotificationCountSource for RestNotificationSource {
    async fn unread_count(&self, user_id: i64) -> Result<u32, NotificationError> {
        let path = format!(
            "/rest/v1/notifications?recipient_id=eq.{}&is_read=eq.false&select=id",
            user_id
        );

        let rows: Vec<Value> = self.backend.request_with_session(
            Method::GET,
            &path,
            &self.session,
            None,
            None,
        ).await?;

        Ok(rows.len() as u32)
    }
}

/// Periodic refresh of one user's unread notification badge.
pub struct NotificationPoller {
    source: Arc<dyn NotificationCountSource>,
    events: EventBus,
    user_id: i64,
    interval: Duration,
}

impl NotificationPoller {
    pub fn new(
        source: Arc<dyn NotificationCountSource>,
        events: EventBus,
        user_id: i64,
        interval: Duration,
    ) -> Self {
        Self { source, events, user_id, interval }
    }

    /// Start polling; the first poll happens immediately.
    pub fn spawn(self) -> PollerHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        PollerHandle { shutdown, task: Some(task) }
    }

    #[instrument(skip(self, shutdown), fields(user_id = self.user_id))]
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("Notification poller started ({:?} interval)", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_count: Option<u32> = None;

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match self.source.unread_count(self.user_id).await {
                        Ok(count) if last_count != Some(count) => {
                            debug!("Unread count changed {:?} -> {}", last_count, count);
                            last_count = Some(count);
                            self.events.publish(ScheduleEvent::new(
                                ScheduleEventKind::NotificationCountChanged {
                                    user_id: self.user_id,
                                    unread_count: count,
                                },
                            ));
                        }
                        Ok(_) => {}
                        Err(e) => warn!("Notification poll failed: {}", e),
                    }
                }
            }
        }

        info!("Notification poller stopped");
    }
}

/// Owner of a running poller. Dropping it cancels the task.
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn cancel(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Cancel and wait for the task to wind down.
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Notification poller ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::models::EventFilter;

    #[tokio::test]
    async fn test_poller_publishes_only_on_change() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_mock = Arc::clone(&calls);

        let mut source = MockNotificationCountSource::new();
        source.expect_unread_count().returning(move |_| {
            // 2, 2, 2, then 5 forever
            let n = calls_in_mock.fetch_add(1, Ordering::SeqCst);
            Ok(if n < 3 { 2 } else { 5 })
        });

        let bus = EventBus::default();
        let mut subscription = bus.subscribe(EventFilter::User(8));

        let handle = NotificationPoller::new(Arc::new(source), bus.clone(), 8, Duration::from_millis(10))
            .spawn();

        let first = tokio::time::timeout(Duration::from_secs(2), subscription.next())
            .await
            .unwrap()
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(2), subscription.next())
            .await
            .unwrap()
            .unwrap();

        handle.shutdown().await;

        assert_eq!(
            first.kind,
            ScheduleEventKind::NotificationCountChanged { user_id: 8, unread_count: 2 }
        );
        assert_eq!(
            second.kind,
            ScheduleEventKind::NotificationCountChanged { user_id: 8, unread_count: 5 }
        );
        assert!(calls.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test]
    async fn test_poller_survives_source_errors() {
        let mut source = MockNotificationCountSource::new();
        source.expect_unread_count().returning(|user_id| {
            Err(NotificationError::InvalidUser(user_id.to_string()))
        });

        let handle = NotificationPoller::new(
            Arc::new(source),
            EventBus::default(),
            3,
            Duration::from_millis(5),
        )
        .spawn();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!handle.is_finished());
        handle.shutdown().await;
    }
}
