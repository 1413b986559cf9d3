use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Extension, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream};
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_database::BackendClient;
use shared_models::auth::{Session, User};
use shared_models::error::AppError;

use crate::error::NotificationError;
use crate::models::{EventFilter, NotificationCount};
use crate::services::{NotificationCountSource, NotificationPoller, RestNotificationSource};
use crate::state::CellState;

fn backend_user_id(user: &User) -> Result<i64, AppError> {
    user.numeric_id()
        .ok_or_else(|| NotificationError::InvalidUser(user.id.clone()).into())
}

/// Live feed of schedule changes for the signed-in user's open views.
///
/// The stream owns a notification poller; when the client disconnects the
/// stream is dropped and the poller with it.
pub async fn stream_events(
    State(state): State<CellState>,
    Extension(user): Extension<User>,
    Extension(session): Extension<Session>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let user_id = backend_user_id(&user)?;
    let filter = if user.is_admin() { EventFilter::All } else { EventFilter::User(user_id) };

    let subscription = state.events.subscribe(filter);

    let source = RestNotificationSource::new(
        Arc::new(BackendClient::new(&state.config)),
        session,
    );
    let poller = NotificationPoller::new(
        Arc::new(source),
        state.events.clone(),
        user_id,
        Duration::from_secs(state.config.notification_poll_interval_secs.max(1)),
    )
    .spawn();

    debug!("Opened event stream for user {} ({:?})", user_id, filter);

    let events = stream::unfold((subscription, poller), |(mut subscription, poller)| async move {
        loop {
            let event = subscription.next().await?;
            match Event::default()
                .event(event.topic())
                .id(event.event_id.to_string())
                .json_data(&event)
            {
                Ok(sse) => return Some((Ok(sse), (subscription, poller))),
                Err(e) => warn!("Skipping unserializable event {}: {}", event.event_id, e),
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

pub async fn get_notification_count(
    State(state): State<CellState>,
    Extension(user): Extension<User>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    let user_id = backend_user_id(&user)?;

    let source = RestNotificationSource::new(Arc::new(BackendClient::new(&state.config)), session);
    let unread_count = source.unread_count(user_id).await?;

    Ok(Json(json!(NotificationCount { user_id, unread_count })))
}
