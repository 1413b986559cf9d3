use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;

use notification_cell::*;

fn slot_changed(provider_id: i64, available: bool) -> ScheduleEvent {
    ScheduleEvent::new(ScheduleEventKind::SlotAvailabilityChanged {
        provider_id,
        date: "2024-06-01".to_string(),
        time: "13:00:00".to_string(),
        available,
    })
}

fn appointment_created(provider_id: i64, client_id: i64) -> ScheduleEvent {
    ScheduleEvent::new(ScheduleEventKind::AppointmentCreated {
        appointment_id: 77,
        provider_id,
        client_id,
        date: "2024-06-01".to_string(),
        time: "09:00:00".to_string(),
    })
}

#[tokio::test]
async fn test_publish_without_subscribers_is_harmless() {
    let bus = EventBus::default();
    assert_eq!(bus.subscriber_count(), 0);
    assert_eq!(bus.publish(slot_changed(5, false)), 0);
}

#[tokio::test]
async fn test_every_subscriber_receives_event() {
    let bus = EventBus::default();
    let mut counselor_view = bus.subscribe(EventFilter::User(5));
    let mut student_view = bus.subscribe(EventFilter::User(40));

    let delivered = bus.publish(appointment_created(5, 40));
    assert_eq!(delivered, 2);

    let a = timeout(Duration::from_secs(1), counselor_view.next()).await.unwrap().unwrap();
    let b = timeout(Duration::from_secs(1), student_view.next()).await.unwrap().unwrap();
    assert_eq!(a.event_id, b.event_id);
}

#[tokio::test]
async fn test_filtered_subscriber_skips_unrelated_events() {
    let bus = EventBus::default();
    let mut other_student = bus.subscribe(EventFilter::User(41));

    bus.publish(appointment_created(5, 40));
    bus.publish(slot_changed(5, false));

    let received = timeout(Duration::from_secs(1), other_student.next()).await.unwrap().unwrap();
    assert_eq!(received.topic(), "slot_availability_changed");
}

#[tokio::test]
async fn test_lagging_subscriber_drops_oldest_and_continues() {
    let bus = EventBus::new(2);
    let mut slow = bus.subscribe(EventFilter::All);

    for i in 0..5 {
        bus.publish(slot_changed(i, true));
    }

    let first_seen = timeout(Duration::from_secs(1), slow.next()).await.unwrap().unwrap();
    match first_seen.kind {
        ScheduleEventKind::SlotAvailabilityChanged { provider_id, .. } => assert_eq!(provider_id, 3),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_subscription_stream_ends_when_bus_dropped() {
    let bus = EventBus::default();
    let stream = bus.subscribe(EventFilter::All).into_stream();

    bus.publish(slot_changed(5, true));
    drop(bus);

    let collected: Vec<ScheduleEvent> = timeout(Duration::from_secs(1), stream.collect())
        .await
        .unwrap();
    assert_eq!(collected.len(), 1);
}
