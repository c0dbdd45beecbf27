//! HomeClient against the in-memory backends.

use std::sync::Arc;
use std::time::Duration;

use mox_home::{
    Accessory, AccessoryKey, AccessoryKind, ChannelId, CommandBus, HomeClient, HomeError,
    InteractRequest, MemoryBus, MemoryStore, ModuleId, PubSubChannels,
};

fn key(channel: u8) -> AccessoryKey {
    AccessoryKey::new(ModuleId::new(0x01, 0x02, 0x03), ChannelId::new(channel))
}

async fn connected_client() -> (Arc<MemoryStore>, Arc<MemoryBus>, HomeClient) {
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(MemoryBus::new());
    let client = HomeClient::new(store.clone(), bus.clone());
    client.connect().await.expect("Failed to connect client");
    (store, bus, client)
}

#[tokio::test]
async fn test_setters_publish_interact_requests() {
    let (_, bus, client) = connected_client().await;
    let interact = PubSubChannels::default().interact;

    client.set_light_status(key(1), true).await.unwrap();
    client.set_switch_status(key(2), false).await.unwrap();
    client.set_dimmer_value(key(3), 200).await.unwrap();
    client.set_window_position(key(4), 10).await.unwrap();

    let requests: Vec<InteractRequest> = bus
        .published_on(&interact)
        .iter()
        .map(|payload| InteractRequest::from_json(payload).unwrap())
        .collect();

    assert_eq!(
        requests,
        vec![
            InteractRequest::status(key(1), AccessoryKind::Light, true),
            InteractRequest::status(key(2), AccessoryKind::Switch, false),
            InteractRequest::value(key(3), AccessoryKind::Dimmer, 200),
            InteractRequest::value(key(4), AccessoryKind::Window, 10),
        ]
    );
}

#[tokio::test]
async fn test_published_request_is_delivered_to_subscribers() {
    let (_, bus, client) = connected_client().await;
    let mut receiver = bus.subscribe(&PubSubChannels::default().interact).await.unwrap();

    client.set_dimmer_value(key(3), 7).await.unwrap();

    let message = tokio::time::timeout(Duration::from_secs(1), receiver.recv())
        .await
        .expect("Timeout waiting for message")
        .unwrap();
    let request = InteractRequest::from_json(&message.payload).unwrap();
    assert_eq!(request.key(), key(3));
    assert_eq!(request.value, Some(7));
}

#[tokio::test]
async fn test_getters_read_the_store() {
    let (store, _, client) = connected_client().await;
    let mut light = Accessory::new(key(1), AccessoryKind::Light, "Hall");
    light.status = Some(true);
    let mut window = Accessory::new(key(4), AccessoryKind::Window, "Blinds");
    window.value = Some(90);
    store.insert_accessory(light);
    store.insert_accessory(window);
    store.insert_accessory(Accessory::new(key(3), AccessoryKind::Dimmer, "Lamp"));

    assert_eq!(client.light_status(key(1)).await.unwrap(), Some(true));
    assert_eq!(client.window_position(key(4)).await.unwrap(), Some(90));
    assert_eq!(client.dimmer_value(key(3)).await.unwrap(), None);
}

#[tokio::test]
async fn test_getter_for_unknown_key_fails() {
    let (_, _, client) = connected_client().await;

    assert!(matches!(
        client.light_status(key(9)).await,
        Err(HomeError::AccessoryNotFound(k)) if k == key(9)
    ));
}

#[tokio::test]
async fn test_disconnected_client_cannot_publish() {
    let (store, bus, client) = connected_client().await;

    client.disconnect().await.unwrap();
    client.disconnect().await.unwrap();

    assert!(!bus.is_connected());
    assert!(!store.is_connected());
    assert!(matches!(
        client.set_light_status(key(1), true).await,
        Err(HomeError::Bus(_))
    ));
}

#[tokio::test]
async fn test_store_failure_on_connect_closes_bus() {
    let store = Arc::new(MemoryStore::new());
    store.set_unavailable(true);
    let bus = Arc::new(MemoryBus::new());
    let client = HomeClient::new(store.clone(), bus.clone());

    assert!(matches!(client.connect().await, Err(HomeError::Store(_))));
    assert!(!bus.is_connected());
}
