//! Interact requests published on the command bus
//!
//! ```json
//! {"moduleId": "0x0000cc", "channelId": 22, "type": "dimmer", "value": 128}
//! ```
//!
//! `moduleId` may be a hex string or an integer. Lights and switches
//! carry `status`, dimmers and windows carry `value`.

use serde::{Deserialize, Serialize};

use mox_protocol::{AccessoryKey, AccessoryKind, AccessoryState, ChannelId, ModuleId};

use crate::error::{HomeError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractRequest {
    pub module_id: ModuleId,
    pub channel_id: ChannelId,
    #[serde(rename = "type")]
    pub kind: AccessoryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
}

impl InteractRequest {
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| HomeError::InvalidPayload(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| HomeError::InvalidPayload(e.to_string()))
    }

    pub fn status(key: AccessoryKey, kind: AccessoryKind, on: bool) -> Self {
        Self {
            module_id: key.module_id,
            channel_id: key.channel_id,
            kind,
            status: Some(on),
            value: None,
        }
    }

    pub fn value(key: AccessoryKey, kind: AccessoryKind, value: u8) -> Self {
        Self {
            module_id: key.module_id,
            channel_id: key.channel_id,
            kind,
            status: None,
            value: Some(i64::from(value)),
        }
    }

    pub fn key(&self) -> AccessoryKey {
        AccessoryKey::new(self.module_id, self.channel_id)
    }

    /// The state to apply, checked against the field the kind requires
    pub fn requested_state(&self) -> Result<AccessoryState> {
        let key = self.key();
        if self.kind.has_status() {
            let on = self.status.ok_or(HomeError::MissingField {
                key,
                kind: self.kind,
                field: "status",
            })?;
            return Ok(AccessoryState::Status(on));
        }

        let value = self.value.ok_or(HomeError::MissingField {
            key,
            kind: self.kind,
            field: "value",
        })?;
        u8::try_from(value)
            .map(AccessoryState::Value)
            .map_err(|_| HomeError::ValueOutOfRange { key, value })
    }
}
