//! Property-based tests for interact handling and inbound resolution.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use mox_home::{
    Accessory, AccessoryKey, AccessoryKind, AccessoryStore, ChannelId, Classification,
    HomeConfig, HomeError, InboundOutcome, InteractRequest, MemoryStore, ModuleId, Reconciler,
};
use mox_protocol::{CommandFrame, ResponseFrame};
use mox_transport::FrameSender;
use parking_lot::Mutex;
use proptest::prelude::*;

#[derive(Default)]
struct RecordingSender {
    frames: Mutex<Vec<CommandFrame>>,
}

#[async_trait]
impl FrameSender for RecordingSender {
    async fn send_frame(&self, frame: &CommandFrame) -> mox_transport::Result<usize> {
        self.frames.lock().push(frame.clone());
        Ok(frame.len())
    }
}

fn key_strategy() -> impl Strategy<Value = AccessoryKey> {
    (any::<[u8; 3]>(), any::<u8>())
        .prop_map(|(module, channel)| AccessoryKey::new(ModuleId::from(module), ChannelId::new(channel)))
}

fn setup() -> (Arc<MemoryStore>, Arc<RecordingSender>, Reconciler) {
    let store = Arc::new(MemoryStore::new());
    let sender = Arc::new(RecordingSender::default());
    let reconciler = Reconciler::new(store.clone(), sender.clone(), &HomeConfig::new("house"));
    (store, sender, reconciler)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A dimmer request is sent and stored exactly when its value fits a byte
    #[test]
    fn prop_dimmer_value_range(key in key_strategy(), value in -1000i64..1000) {
        tokio_test::block_on(async {
            let (store, sender, reconciler) = setup();
            store.connect().await.unwrap();
            store.insert_accessory(Accessory::new(key, AccessoryKind::Dimmer, "Lamp"));

            let request = InteractRequest {
                value: Some(value),
                ..InteractRequest::value(key, AccessoryKind::Dimmer, 0)
            };
            let result = reconciler.handle_request(&request).await;

            if (0..=255).contains(&value) {
                prop_assert!(result.is_ok());
                prop_assert_eq!(sender.frames.lock().len(), 1);
                prop_assert_eq!(store.accessory(key).unwrap().value, Some(value as u8));
            } else {
                let out_of_range = matches!(result, Err(HomeError::ValueOutOfRange { .. }));
                prop_assert!(out_of_range);
                prop_assert!(sender.frames.lock().is_empty());
                prop_assert_eq!(store.save_count(), 0);
            }
            Ok(())
        })?;
    }

    /// The stored status follows the last light report
    #[test]
    fn prop_last_report_wins(key in key_strategy(), reports in prop::collection::vec(any::<bool>(), 1..8)) {
        tokio_test::block_on(async {
            let (store, _, reconciler) = setup();
            store.connect().await.unwrap();
            store.insert_accessory(Accessory::new(key, AccessoryKind::Light, "Hall"));

            for on in &reports {
                let frame = ResponseFrame::build(key, Classification::LightStatus(*on));
                reconciler.resolve_frame(&frame).await.unwrap();
            }

            prop_assert_eq!(store.accessory(key).unwrap().status, reports.last().copied());
            prop_assert_eq!(store.save_count(), reports.len());
            Ok(())
        })?;
    }

    /// Reports for unregistered keys never create accessories
    #[test]
    fn prop_unregistered_reports_only_sight(key in key_strategy(), value in any::<u8>()) {
        tokio_test::block_on(async {
            let (store, sender, reconciler) = setup();
            store.connect().await.unwrap();
            let before = Utc::now();

            let frame = ResponseFrame::build(key, Classification::CurtainPosition(value));
            let outcome = reconciler.resolve_frame(&frame).await.unwrap();

            prop_assert_eq!(outcome, InboundOutcome::Sighted(key));
            prop_assert!(store.accessories().is_empty());
            prop_assert!(sender.frames.lock().is_empty());
            let missing = store.missing_accessory(key).unwrap();
            prop_assert!(missing.first_seen_at >= before);
            Ok(())
        })?;
    }
}
