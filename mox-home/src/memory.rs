//! In-process store and bus
//!
//! Both keep everything behind a `parking_lot` lock and count their
//! connections, so several components can share one instance. They back
//! the tests and single-process deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use tokio::sync::mpsc;

use mox_protocol::{AccessoryKey, AccessoryKind};

use crate::bus::{BusError, BusMessage, BusResult, CommandBus};
use crate::model::{Accessory, House, HouseId, MissingAccessory};
use crate::store::{AccessoryStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct StoreInner {
    connections: usize,
    unavailable: bool,
    houses: HashMap<HouseId, House>,
    accessories: HashMap<AccessoryKey, Accessory>,
    missing: HashMap<AccessoryKey, MissingAccessory>,
    saves: usize,
    sightings: usize,
}

impl StoreInner {
    fn check(&self) -> StoreResult<()> {
        if self.unavailable {
            Err(StoreError::Unavailable("memory store marked unavailable".to_string()))
        } else if self.connections == 0 {
            Err(StoreError::NotConnected)
        } else {
            Ok(())
        }
    }
}

/// Accessory store held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_house(self, house: House) -> Self {
        self.insert_house(house);
        self
    }

    pub fn insert_house(&self, house: House) {
        self.inner.write().houses.insert(house.id.clone(), house);
    }

    /// Registers an accessory without counting it as a save
    pub fn insert_accessory(&self, accessory: Accessory) {
        self.inner.write().accessories.insert(accessory.key, accessory);
    }

    pub fn accessory(&self, key: AccessoryKey) -> Option<Accessory> {
        self.inner.read().accessories.get(&key).cloned()
    }

    pub fn accessories(&self) -> Vec<Accessory> {
        self.inner.read().accessories.values().cloned().collect()
    }

    pub fn missing_accessory(&self, key: AccessoryKey) -> Option<MissingAccessory> {
        self.inner.read().missing.get(&key).cloned()
    }

    pub fn missing_accessories(&self) -> Vec<MissingAccessory> {
        self.inner.read().missing.values().cloned().collect()
    }

    /// Number of `save` calls that succeeded
    pub fn save_count(&self) -> usize {
        self.inner.read().saves
    }

    /// Number of `upsert_missing_sighting` calls that succeeded
    pub fn sighting_count(&self) -> usize {
        self.inner.read().sightings
    }

    pub fn is_connected(&self) -> bool {
        self.inner.read().connections > 0
    }

    /// Makes every trait call fail until cleared
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.write().unavailable = unavailable;
    }
}

#[async_trait]
impl AccessoryStore for MemoryStore {
    async fn connect(&self) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if inner.unavailable {
            return Err(StoreError::Unavailable("memory store marked unavailable".to_string()));
        }
        inner.connections += 1;
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.connections = inner.connections.saturating_sub(1);
        Ok(())
    }

    async fn find_house(&self, id: &HouseId) -> StoreResult<Option<House>> {
        let inner = self.inner.read();
        inner.check()?;
        Ok(inner.houses.get(id).cloned())
    }

    async fn find_by_key(
        &self,
        key: AccessoryKey,
        kind: Option<AccessoryKind>,
    ) -> StoreResult<Option<Accessory>> {
        let inner = self.inner.read();
        inner.check()?;
        Ok(inner
            .accessories
            .get(&key)
            .filter(|accessory| kind.map_or(true, |kind| accessory.kind == kind))
            .cloned())
    }

    async fn upsert_missing_sighting(
        &self,
        key: AccessoryKey,
        seen_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.check()?;
        inner
            .missing
            .entry(key)
            .and_modify(|missing| missing.seen(seen_at))
            .or_insert_with(|| MissingAccessory::new(key, seen_at));
        inner.sightings += 1;
        Ok(())
    }

    async fn save(&self, accessory: &Accessory) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.check()?;
        inner.accessories.insert(accessory.key, accessory.clone());
        inner.saves += 1;
        Ok(())
    }

    async fn find_stale(&self, older_than: DateTime<Utc>) -> StoreResult<Vec<Accessory>> {
        let inner = self.inner.read();
        inner.check()?;
        let mut stale: Vec<Accessory> = inner
            .accessories
            .values()
            .filter(|accessory| accessory.updated_at < older_than)
            .cloned()
            .collect();
        stale.sort_by_key(|accessory| accessory.key);
        Ok(stale)
    }
}

#[derive(Debug, Default)]
struct BusInner {
    connections: usize,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<BusMessage>>>,
    published: VecDeque<BusMessage>,
}

/// Command bus that delivers within the process
///
/// The most recent published messages are kept for inspection, up to
/// the history limit. The oldest are dropped first.
#[derive(Debug)]
pub struct MemoryBus {
    inner: Mutex<BusInner>,
    history_limit: usize,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::with_history_limit(Self::DEFAULT_HISTORY_LIMIT)
    }
}

impl MemoryBus {
    /// Published messages kept by `new`
    pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `limit` published messages; 0 keeps none
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            inner: Mutex::new(BusInner::default()),
            history_limit: limit,
        }
    }

    pub fn published(&self) -> Vec<BusMessage> {
        self.inner.lock().published.iter().cloned().collect()
    }

    pub fn published_on(&self, channel: &str) -> Vec<String> {
        self.inner
            .lock()
            .published
            .iter()
            .filter(|message| message.channel == channel)
            .map(|message| message.payload.clone())
            .collect()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().connections > 0
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.inner
            .lock()
            .subscribers
            .get(channel)
            .map_or(0, |senders| senders.iter().filter(|s| !s.is_closed()).count())
    }
}

#[async_trait]
impl CommandBus for MemoryBus {
    async fn connect(&self) -> BusResult<()> {
        self.inner.lock().connections += 1;
        Ok(())
    }

    async fn close(&self) -> BusResult<()> {
        let mut inner = self.inner.lock();
        inner.connections = inner.connections.saturating_sub(1);
        if inner.connections == 0 {
            inner.subscribers.clear();
        }
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> BusResult<()> {
        let mut inner = self.inner.lock();
        if inner.connections == 0 {
            return Err(BusError::NotConnected);
        }

        let message = BusMessage::new(channel, payload);
        if let Some(senders) = inner.subscribers.get_mut(channel) {
            senders.retain(|sender| sender.send(message.clone()).is_ok());
        }
        if self.history_limit > 0 {
            if inner.published.len() == self.history_limit {
                inner.published.pop_front();
            }
            inner.published.push_back(message);
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> BusResult<mpsc::UnboundedReceiver<BusMessage>> {
        let mut inner = self.inner.lock();
        if inner.connections == 0 {
            return Err(BusError::NotConnected);
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        inner
            .subscribers
            .entry(channel.to_string())
            .or_default()
            .push(sender);
        Ok(receiver)
    }

    /// Ends every subscription on the channel
    async fn unsubscribe(&self, channel: &str) -> BusResult<()> {
        self.inner.lock().subscribers.remove(channel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mox_protocol::{ChannelId, ModuleId};

    fn key(channel: u8) -> AccessoryKey {
        AccessoryKey::new(ModuleId::new(0, 0, 0x10), ChannelId::new(channel))
    }

    #[tokio::test]
    async fn test_store_requires_connection() {
        let store = MemoryStore::new();
        assert_eq!(
            store.find_by_key(key(1), None).await,
            Err(StoreError::NotConnected)
        );

        store.connect().await.unwrap();
        assert_eq!(store.find_by_key(key(1), None).await, Ok(None));
        store.close().await.unwrap();
        assert!(!store.is_connected());
    }

    #[tokio::test]
    async fn test_store_connections_are_counted() {
        let store = MemoryStore::new();
        store.connect().await.unwrap();
        store.connect().await.unwrap();
        store.close().await.unwrap();
        assert!(store.is_connected());
        store.close().await.unwrap();
        store.close().await.unwrap();
        assert!(!store.is_connected());
    }

    #[tokio::test]
    async fn test_find_by_key_filters_kind() {
        let store = MemoryStore::new();
        store.connect().await.unwrap();
        store.insert_accessory(Accessory::new(key(1), AccessoryKind::Switch, "Fan"));

        assert!(store.find_by_key(key(1), None).await.unwrap().is_some());
        assert!(store
            .find_by_key(key(1), Some(AccessoryKind::Switch))
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_by_key(key(1), Some(AccessoryKind::Light))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_missing_sighting_upsert() {
        let store = MemoryStore::new();
        store.connect().await.unwrap();
        let first = Utc::now();
        let second = first + Duration::seconds(3);

        store.upsert_missing_sighting(key(9), first).await.unwrap();
        store.upsert_missing_sighting(key(9), second).await.unwrap();

        let missing = store.missing_accessory(key(9)).unwrap();
        assert_eq!(missing.first_seen_at, first);
        assert_eq!(missing.last_seen_at, second);
        assert_eq!(store.missing_accessories().len(), 1);
        assert_eq!(store.sighting_count(), 2);
    }

    #[tokio::test]
    async fn test_find_stale_is_strict() {
        let store = MemoryStore::new();
        store.connect().await.unwrap();
        let cutoff = Utc::now();
        store.insert_accessory(
            Accessory::new(key(1), AccessoryKind::Light, "Old")
                .with_updated_at(cutoff - Duration::seconds(1)),
        );
        store.insert_accessory(
            Accessory::new(key(2), AccessoryKind::Light, "Edge").with_updated_at(cutoff),
        );

        let stale = store.find_stale(cutoff).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].key, key(1));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.connect().await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_bus_delivers_to_subscribers() {
        let bus = MemoryBus::new();
        bus.connect().await.unwrap();
        let mut receiver = bus.subscribe("a").await.unwrap();

        bus.publish("a", "one").await.unwrap();
        bus.publish("b", "two").await.unwrap();

        let message = receiver.recv().await.unwrap();
        assert_eq!(message, BusMessage::new("a", "one"));
        assert!(receiver.try_recv().is_err());
        assert_eq!(bus.published().len(), 2);
        assert_eq!(bus.published_on("b"), vec!["two".to_string()]);
    }

    #[tokio::test]
    async fn test_unsubscribe_ends_receiver() {
        let bus = MemoryBus::new();
        bus.connect().await.unwrap();
        let mut receiver = bus.subscribe("a").await.unwrap();
        assert_eq!(bus.subscriber_count("a"), 1);

        bus.unsubscribe("a").await.unwrap();
        assert!(receiver.recv().await.is_none());
        assert_eq!(bus.subscriber_count("a"), 0);
    }

    #[tokio::test]
    async fn test_bus_requires_connection() {
        let bus = MemoryBus::new();
        assert_eq!(bus.publish("a", "x").await, Err(BusError::NotConnected));
        assert!(bus.subscribe("a").await.is_err());
    }

    #[tokio::test]
    async fn test_bus_history_keeps_newest_messages() {
        let bus = MemoryBus::with_history_limit(3);
        bus.connect().await.unwrap();
        let mut receiver = bus.subscribe("a").await.unwrap();

        for n in 0..5 {
            bus.publish("a", &n.to_string()).await.unwrap();
        }

        assert_eq!(bus.published_on("a"), vec!["2", "3", "4"]);
        for n in 0..5 {
            assert_eq!(receiver.recv().await.unwrap().payload, n.to_string());
        }
    }

    #[tokio::test]
    async fn test_default_bus_history_is_bounded() {
        let bus = MemoryBus::new();
        bus.connect().await.unwrap();

        for n in 0..MemoryBus::DEFAULT_HISTORY_LIMIT + 10 {
            bus.publish("a", &n.to_string()).await.unwrap();
        }

        let published = bus.published();
        assert_eq!(published.len(), MemoryBus::DEFAULT_HISTORY_LIMIT);
        assert_eq!(published[0].payload, "10");
    }

    #[tokio::test]
    async fn test_zero_history_limit_still_delivers() {
        let bus = MemoryBus::with_history_limit(0);
        bus.connect().await.unwrap();
        let mut receiver = bus.subscribe("a").await.unwrap();

        bus.publish("a", "one").await.unwrap();

        assert_eq!(receiver.recv().await.unwrap().payload, "one");
        assert!(bus.published().is_empty());
    }
}
