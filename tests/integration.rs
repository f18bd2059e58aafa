//! Integration tests for the event monitor.

mod common;

use common::{init_tracing, platform_envelope, FakeDiscovery, FakeGateway, FakeTransport};
use event_monitor::{
    Channel, ChannelCategory, ChannelFilter, Dashboard, EventId, MonitorConfig, NodeKind,
    PersistenceGateway, PubSubClient, RegistryEvent, ReplayCursor, RequestOutcome,
    SubscriptionRegistry, SubscriptionState, BUFFER_CAPACITY,
};
use serde_json::json;
use std::sync::Arc;

const FOO: &str = "/event/Foo__e";
const ACCOUNTS: &str = "/data/AccountChangeEvent";

fn registry_with(transport: &Arc<FakeTransport>, gateway: &Arc<FakeGateway>) -> Arc<SubscriptionRegistry> {
    init_tracing();
    Arc::new(SubscriptionRegistry::new(
        Arc::clone(transport) as Arc<dyn PubSubClient>,
        Some(Arc::clone(gateway) as Arc<dyn PersistenceGateway>),
        MonitorConfig::default(),
    ))
}

async fn wait_for_state(registry: &SubscriptionRegistry, channel: &str, state: SubscriptionState) {
    for _ in 0..100 {
        if registry.state(channel) == state {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("{channel} never reached {state:?}, stuck at {:?}", registry.state(channel));
}

// --- Subscription Lifecycle ---

#[tokio::test]
async fn test_subscribe_reports_pending_then_subscribed() {
    let transport = FakeTransport::new();
    let gateway = FakeGateway::new();
    let registry = registry_with(&transport, &gateway);
    let notes = registry.watch();
    transport.gate(FOO);

    let task = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            registry
                .request_subscribe(Channel::from_path(FOO), ReplayCursor::Tip)
                .await
        })
    };

    wait_for_state(&registry, FOO, SubscriptionState::Subscribing).await;
    assert!(notes.drain().is_empty());

    transport.release(FOO);
    assert_eq!(task.await.unwrap(), RequestOutcome::Completed);
    assert_eq!(registry.state(FOO), SubscriptionState::Subscribed);

    assert_eq!(
        notes.drain(),
        vec![RegistryEvent::Subscribed {
            channel: FOO.to_string(),
            replay_cursor: ReplayCursor::Tip,
        }]
    );
    assert_eq!(
        transport.subscribe_calls.lock().clone(),
        vec![(FOO.to_string(), ReplayCursor::Tip)]
    );
}

#[tokio::test]
async fn test_second_subscribe_is_noop() {
    let transport = FakeTransport::new();
    let gateway = FakeGateway::new();
    let registry = registry_with(&transport, &gateway);
    let notes = registry.watch();

    registry.subscribe(Channel::from_path(FOO)).await;
    let again = registry
        .request_subscribe(Channel::from_path(FOO), ReplayCursor::All)
        .await;

    assert_eq!(again, RequestOutcome::Rejected(SubscriptionState::Subscribed));
    assert_eq!(transport.subscribe_calls.lock().len(), 1);
    let subscribed = notes
        .drain()
        .into_iter()
        .filter(|n| matches!(n, RegistryEvent::Subscribed { .. }))
        .count();
    assert_eq!(subscribed, 1);
    assert_eq!(registry.subscription(FOO).unwrap().replay_cursor, ReplayCursor::Tip);
}

#[tokio::test]
async fn test_subscribe_while_pending_is_rejected() {
    let transport = FakeTransport::new();
    let gateway = FakeGateway::new();
    let registry = registry_with(&transport, &gateway);
    transport.gate(FOO);

    let task = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.subscribe(Channel::from_path(FOO)).await })
    };
    wait_for_state(&registry, FOO, SubscriptionState::Subscribing).await;

    assert_eq!(
        registry.subscribe(Channel::from_path(FOO)).await,
        RequestOutcome::Rejected(SubscriptionState::Subscribing)
    );
    assert_eq!(
        registry.request_unsubscribe(FOO).await,
        RequestOutcome::Rejected(SubscriptionState::Subscribing)
    );

    transport.release(FOO);
    task.await.unwrap();
    assert_eq!(registry.state(FOO), SubscriptionState::Subscribed);
}

#[tokio::test]
async fn test_replay_all_passed_to_transport() {
    let transport = FakeTransport::new();
    let gateway = FakeGateway::new();
    init_tracing();
    let config = MonitorConfig {
        default_replay: ReplayCursor::All,
        ..Default::default()
    };
    let registry = SubscriptionRegistry::new(
        Arc::clone(&transport) as Arc<dyn PubSubClient>,
        Some(Arc::clone(&gateway) as Arc<dyn PersistenceGateway>),
        config,
    );

    registry.subscribe(Channel::from_path(ACCOUNTS)).await;
    assert_eq!(transport.subscribe_calls.lock()[0].1, ReplayCursor::All);
}

#[tokio::test]
async fn test_unsubscribe_keeps_buffered_events() {
    let transport = FakeTransport::new();
    let gateway = FakeGateway::new();
    let registry = registry_with(&transport, &gateway);
    let notes = registry.watch();

    registry.subscribe(Channel::from_path(FOO)).await;
    for n in 1..=5 {
        assert!(transport.deliver(FOO, platform_envelope(FOO, n)));
    }

    assert_eq!(registry.request_unsubscribe(FOO).await, RequestOutcome::Completed);
    assert_eq!(registry.state(FOO), SubscriptionState::Unsubscribed);
    assert_eq!(registry.events(FOO).len(), 5);
    assert!(notes
        .drain()
        .contains(&RegistryEvent::Unsubscribed { channel: FOO.to_string() }));

    // No further deliveries once unsubscribed.
    assert!(!transport.deliver(FOO, platform_envelope(FOO, 6)));
    assert_eq!(registry.events(FOO).len(), 5);

    assert_eq!(registry.clear_buffer(FOO), 5);
    assert!(registry.events(FOO).is_empty());
}

#[tokio::test]
async fn test_resubscribe_after_unsubscribe() {
    let transport = FakeTransport::new();
    let gateway = FakeGateway::new();
    let registry = registry_with(&transport, &gateway);

    registry.subscribe(Channel::from_path(FOO)).await;
    registry.request_unsubscribe(FOO).await;
    assert_eq!(
        registry.subscribe(Channel::from_path(FOO)).await,
        RequestOutcome::Completed
    );
    assert_eq!(transport.subscribe_calls.lock().len(), 2);
}

// --- Message Intake ---

#[tokio::test]
async fn test_buffer_keeps_newest_200() {
    let transport = FakeTransport::new();
    let gateway = FakeGateway::new();
    let registry = registry_with(&transport, &gateway);
    registry.subscribe(Channel::from_path(FOO)).await;

    for n in 1..=201 {
        transport.deliver(FOO, platform_envelope(FOO, n));
    }

    let events = registry.events(FOO);
    assert_eq!(events.len(), BUFFER_CAPACITY);
    assert_eq!(events.first().unwrap().payload["Sequence__c"], 201);
    assert_eq!(events.last().unwrap().payload["Sequence__c"], 2);
}

#[tokio::test]
async fn test_record_ids_patched_by_identity() {
    let transport = FakeTransport::new();
    let gateway = FakeGateway::held();
    let registry = registry_with(&transport, &gateway);
    registry.subscribe(Channel::from_path(FOO)).await;

    for n in 1..=3 {
        transport.deliver(FOO, platform_envelope(FOO, n));
    }
    assert!(registry
        .events(FOO)
        .iter()
        .all(|e| e.persisted_record_id.is_none()));

    // More arrivals shift positions before the writes land.
    transport.deliver(FOO, platform_envelope(FOO, 4));
    gateway.open();
    registry.flush_background().await;

    let events = registry.events(FOO);
    assert!(events.iter().all(|e| e.persisted_record_id.is_some()));
    let written = gateway.created.lock().clone();
    assert_eq!(written.len(), 4);
    assert_eq!(written[0].channel, FOO);
    assert_eq!(written[0].created_by.as_deref(), Some("005xx000001X8Uz"));
}

#[tokio::test]
async fn test_evicted_event_patch_is_dropped() {
    let transport = FakeTransport::new();
    let gateway = FakeGateway::held();
    let registry = registry_with(&transport, &gateway);
    registry.subscribe(Channel::from_path(FOO)).await;

    for n in 1..=201 {
        transport.deliver(FOO, platform_envelope(FOO, n));
    }
    gateway.open();
    registry.flush_background().await;

    let events = registry.events(FOO);
    assert_eq!(events.len(), BUFFER_CAPACITY);
    assert!(events.iter().all(|e| e.id != EventId(1)));
    assert!(events.iter().all(|e| e.persisted_record_id.is_some()));
    assert_eq!(gateway.created.lock().len(), 201);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_channels_are_independent_under_interleaving() {
    let transport = FakeTransport::new();
    let gateway = FakeGateway::new();
    let registry = registry_with(&transport, &gateway);

    let channels: Vec<String> = (0..4).map(|i| format!("/event/Stream{i}__e")).collect();
    for path in &channels {
        registry.subscribe(Channel::from_path(path.clone())).await;
    }

    let threads: Vec<_> = channels
        .iter()
        .cloned()
        .map(|path| {
            let transport = Arc::clone(&transport);
            std::thread::spawn(move || {
                for n in 1..=150 {
                    transport.deliver(&path, platform_envelope(&path, n));
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }
    registry.flush_background().await;

    for path in &channels {
        let events = registry.events(path);
        assert_eq!(events.len(), 150);
        let sequence: Vec<u64> = events
            .iter()
            .map(|e| e.payload["Sequence__c"].as_u64().unwrap())
            .collect();
        assert!(sequence.windows(2).all(|w| w[0] > w[1]));
        assert!(events.iter().all(|e| e.channel.path == *path));
    }
    assert_eq!(gateway.created.lock().len(), 600);
}

#[tokio::test]
async fn test_clear_all_clears_buffer_and_persisted() {
    let transport = FakeTransport::new();
    let gateway = FakeGateway::new();
    let registry = registry_with(&transport, &gateway);
    registry.subscribe(Channel::from_path(FOO)).await;

    for n in 1..=3 {
        transport.deliver(FOO, platform_envelope(FOO, n));
    }
    registry.flush_background().await;

    assert_eq!(registry.clear_persisted(FOO).await.unwrap(), 3);
    assert_eq!(registry.events(FOO).len(), 3);

    transport.deliver(FOO, platform_envelope(FOO, 4));
    registry.flush_background().await;
    let summary = registry.clear_all(FOO).await.unwrap();
    assert_eq!(summary.buffered, 4);
    assert_eq!(summary.persisted, 1);
}

// --- Payload Trees ---

#[tokio::test]
async fn test_change_capture_payload_tree() {
    let transport = FakeTransport::new();
    let gateway = FakeGateway::new();
    let registry = registry_with(&transport, &gateway);
    registry
        .request_subscribe(Channel::from_path(ACCOUNTS), ReplayCursor::All)
        .await;

    transport.deliver(
        ACCOUNTS,
        json!({
            "data": {
                "schema": "IeRuaY6cbI_HsV8Rv1Mc5g",
                "payload": {
                    "ChangeEventHeader": {
                        "entityName": "Account",
                        "changeType": "UPDATE",
                        "changedFields": ["Name"],
                        "recordIds": ["001xx000003DGb2AAG"],
                        "commitTimestamp": 1714564800000i64
                    },
                    "Name": "Acme",
                    "Details__c": "{\"tier\": \"gold\", \"seats\": 40}"
                },
                "event": {"replayId": 77}
            }
        }),
    );

    let event = registry.events(ACCOUNTS)[0].clone();
    assert_eq!(event.replay_cursor, "77");
    assert_eq!(event.change_header.as_ref().unwrap().change_type, "UPDATE");

    let tree = event.payload_tree(Default::default());
    assert_eq!(tree.kind(), NodeKind::Object);
    let keys: Vec<&str> = tree.children().iter().filter_map(|c| c.key()).collect();
    assert_eq!(keys, vec!["ChangeEventHeader", "Name", "Details__c"]);

    let details = &tree.children()[2];
    assert_eq!(details.kind(), NodeKind::Object);
    assert_eq!(details.children()[1].value(), &json!(40));
}

// --- Dashboard ---

#[tokio::test]
async fn test_dashboard_view() {
    let transport = FakeTransport::new();
    let gateway = FakeGateway::new();
    let registry = registry_with(&transport, &gateway);
    let discovery = FakeDiscovery::with(vec![
        Channel::new(FOO, "Foo", ChannelCategory::Custom),
        Channel::new(ACCOUNTS, "Account changes", ChannelCategory::ChangeDataCapture),
        Channel::new("/event/LoginEventStream", "Login events", ChannelCategory::Standard),
    ]);

    let mut dashboard = Dashboard::new();
    assert_eq!(dashboard.refresh_channels(&discovery).await.unwrap(), 3);

    registry.subscribe(Channel::new(FOO, "Foo", ChannelCategory::Custom)).await;
    transport.deliver(FOO, platform_envelope(FOO, 1));
    transport.deliver(FOO, platform_envelope(FOO, 2));

    let view = dashboard.view(&registry);
    assert_eq!(view.rows.len(), 3);
    assert_eq!(view.subscribed_count, 1);
    let foo = view.rows.iter().find(|r| r.channel.path == FOO).unwrap();
    assert_eq!(foo.state, SubscriptionState::Subscribed);
    assert_eq!(foo.buffered, 2);
    assert!(foo.newest_received_at.is_some());

    let custom = view
        .categories
        .iter()
        .find(|c| c.category == ChannelCategory::Custom)
        .unwrap();
    assert_eq!((custom.total, custom.subscribed), (1, 1));

    dashboard.set_filter(ChannelFilter {
        subscribed_only: true,
        ..Default::default()
    });
    dashboard.select(Some(FOO));
    let view = dashboard.view(&registry);
    assert_eq!(view.rows.len(), 1);
    let selected = view.selected.unwrap();
    assert_eq!(selected.events.len(), 2);
    assert_eq!(selected.events[0].event.payload["Sequence__c"], 2);
    assert_eq!(selected.events[0].tree.kind(), NodeKind::Object);
}

#[tokio::test]
async fn test_dashboard_lists_undiscovered_subscriptions() {
    let transport = FakeTransport::new();
    let gateway = FakeGateway::new();
    let registry = registry_with(&transport, &gateway);
    let dashboard = Dashboard::new();

    registry.subscribe(Channel::from_path("/event/Adhoc__e")).await;

    let view = dashboard.view(&registry);
    assert_eq!(view.rows.len(), 1);
    assert_eq!(view.rows[0].channel.category, ChannelCategory::Custom);
}

#[tokio::test]
async fn test_dashboard_keeps_buffered_events_after_unsubscribe() {
    let transport = FakeTransport::new();
    let gateway = FakeGateway::new();
    let registry = registry_with(&transport, &gateway);
    let mut dashboard = Dashboard::new();
    let adhoc = "/event/Adhoc__e";

    registry.subscribe(Channel::from_path(adhoc)).await;
    for n in 1..=5 {
        transport.deliver(adhoc, platform_envelope(adhoc, n));
    }
    assert_eq!(registry.request_unsubscribe(adhoc).await, RequestOutcome::Completed);

    dashboard.select(Some(adhoc));
    let view = dashboard.view(&registry);
    assert_eq!(view.rows.len(), 1);
    assert_eq!(view.rows[0].state, SubscriptionState::Unsubscribed);
    assert_eq!(view.rows[0].buffered, 5);
    let selected = view.selected.unwrap();
    assert_eq!(selected.events.len(), 5);
    assert_eq!(selected.state, SubscriptionState::Unsubscribed);

    registry.clear_buffer(adhoc);
    let view = dashboard.view(&registry);
    assert!(view.rows.is_empty());
    assert!(view.selected.is_none());
}
