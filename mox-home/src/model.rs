//! Records held by the accessory store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use mox_protocol::{AccessoryKey, AccessoryKind, AccessoryState, ProtocolError};
use mox_transport::{
    TransportConfig, DEFAULT_CLIENT_PORT, DEFAULT_SERVER_ADDRESS, DEFAULT_SERVER_PORT,
};

/// Namespace for accessory UUIDs derived from their key
pub const ACCESSORY_UUID_NAMESPACE: Uuid = Uuid::from_u128(0x17b8e566_afb6_4884_a77f_4e5e82deefec);

/// Identifier of a house record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HouseId(String);

impl HouseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HouseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HouseId {
    fn from(s: &str) -> Self {
        HouseId::new(s)
    }
}

impl From<String> for HouseId {
    fn from(s: String) -> Self {
        HouseId::new(s)
    }
}

/// A site served by one controller
///
/// Unset or blank addresses and unset or zero ports fall back to the
/// controller defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct House {
    pub id: HouseId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub server_ip_address: Option<String>,
    #[serde(default)]
    pub server_port: Option<u16>,
    #[serde(default)]
    pub client_ip_address: Option<String>,
    #[serde(default)]
    pub client_port: Option<u16>,
}

impl House {
    pub fn new(id: impl Into<HouseId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            server_ip_address: None,
            server_port: None,
            client_ip_address: None,
            client_port: None,
        }
    }

    pub fn with_server(mut self, address: impl Into<String>, port: u16) -> Self {
        self.server_ip_address = Some(address.into());
        self.server_port = Some(port);
        self
    }

    pub fn with_client(mut self, address: impl Into<String>, port: u16) -> Self {
        self.client_ip_address = Some(address.into());
        self.client_port = Some(port);
        self
    }
}

impl From<&House> for TransportConfig {
    fn from(house: &House) -> Self {
        TransportConfig {
            local_address: non_blank(&house.client_ip_address).map(str::to_string),
            local_port: non_zero(house.client_port).unwrap_or(DEFAULT_CLIENT_PORT),
            server_address: non_blank(&house.server_ip_address)
                .unwrap_or(DEFAULT_SERVER_ADDRESS)
                .to_string(),
            server_port: non_zero(house.server_port).unwrap_or(DEFAULT_SERVER_PORT),
            ..TransportConfig::default()
        }
    }
}

fn non_blank(address: &Option<String>) -> Option<&str> {
    address.as_deref().map(str::trim).filter(|a| !a.is_empty())
}

fn non_zero(port: Option<u16>) -> Option<u16> {
    port.filter(|&p| p != 0)
}

/// A registered device and its last known state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessory {
    #[serde(flatten)]
    pub key: AccessoryKey,
    #[serde(rename = "type")]
    pub kind: AccessoryKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<bool>,
    #[serde(default)]
    pub value: Option<u8>,
    pub updated_at: DateTime<Utc>,
}

impl Accessory {
    pub fn new(key: AccessoryKey, kind: AccessoryKind, name: impl Into<String>) -> Self {
        Self {
            key,
            kind,
            name: name.into(),
            status: None,
            value: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }

    /// The authoritative field for this kind, if known
    pub fn state(&self) -> Option<AccessoryState> {
        if self.kind.has_status() {
            self.status.map(AccessoryState::Status)
        } else {
            self.value.map(AccessoryState::Value)
        }
    }

    /// Writes the authoritative field and stamps the update time
    pub fn apply(&mut self, state: AccessoryState, at: DateTime<Utc>) -> Result<(), ProtocolError> {
        match (self.kind.has_status(), state) {
            (true, AccessoryState::Status(on)) => self.status = Some(on),
            (false, AccessoryState::Value(value)) => self.value = Some(value),
            (_, state) => {
                return Err(ProtocolError::InvalidCommand(format!(
                    "{state} cannot be applied to a {}",
                    self.kind
                )))
            }
        }
        self.updated_at = at;
        Ok(())
    }

    pub fn uuid(&self) -> Uuid {
        accessory_uuid(self.key)
    }
}

/// Stable UUID for an accessory key
pub fn accessory_uuid(key: AccessoryKey) -> Uuid {
    let name = format!(
        "{:x}-{:x}-{:x}-{:x}",
        key.module_id.high(),
        key.module_id.middle(),
        key.module_id.low(),
        key.channel_id.value()
    );
    Uuid::new_v5(&ACCESSORY_UUID_NAMESPACE, name.as_bytes())
}

/// A device that answered the controller without being registered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingAccessory {
    #[serde(flatten)]
    pub key: AccessoryKey,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl MissingAccessory {
    pub fn new(key: AccessoryKey, seen_at: DateTime<Utc>) -> Self {
        Self {
            key,
            first_seen_at: seen_at,
            last_seen_at: seen_at,
        }
    }

    pub fn seen(&mut self, at: DateTime<Utc>) {
        self.last_seen_at = at;
    }
}
