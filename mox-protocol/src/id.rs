//! Identity types for MOX LT modules, channels and accessories

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ProtocolError, Result};

/// Largest value representable by a 24-bit module identifier
pub const MAX_MODULE_ID: u32 = 0x00FF_FFFF;

/// Length of the textual module identifier form ("0x" + six hex digits)
const TEXT_FORM_LEN: usize = 8;

/// A 24-bit smart-control module identifier
///
/// Stored as the three wire bytes `(H, M, L)`, most significant first.
/// The textual form is eight characters where the first two are ignored
/// and the remaining six are hex byte pairs, e.g. `"0x0000cc"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "ModuleIdRepr", into = "u32")]
pub struct ModuleId([u8; 3]);

impl ModuleId {
    /// Creates a module identifier from its high, middle and low bytes
    pub const fn new(high: u8, middle: u8, low: u8) -> Self {
        Self([high, middle, low])
    }

    /// Creates a module identifier from a 24-bit integer
    ///
    /// Values above `0xFFFFFF` cannot be represented on the wire and are
    /// rejected.
    pub fn from_u32(value: u32) -> Result<Self> {
        if value > MAX_MODULE_ID {
            return Err(ProtocolError::InvalidIdentifier(format!(
                "{value:#x} does not fit in 24 bits"
            )));
        }

        Ok(Self([
            ((value >> 16) & 0xff) as u8,
            ((value >> 8) & 0xff) as u8,
            (value & 0xff) as u8,
        ]))
    }

    /// Creates a module identifier from a byte slice of exactly three bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let triple: [u8; 3] = bytes.try_into().map_err(|_| {
            ProtocolError::InvalidIdentifier(format!(
                "expected 3 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(triple))
    }

    /// Parses the textual form
    ///
    /// Characters at offsets 2..4, 4..6 and 6..8 are read as hex byte pairs;
    /// the first two characters are ignored.
    pub fn parse(input: &str) -> Result<Self> {
        let raw = input.as_bytes();
        if raw.len() < TEXT_FORM_LEN {
            return Err(ProtocolError::InvalidIdentifier(format!(
                "'{input}' is shorter than {TEXT_FORM_LEN} characters"
            )));
        }

        let mut bytes = [0u8; 3];
        for (index, pair) in raw[2..TEXT_FORM_LEN].chunks(2).enumerate() {
            bytes[index] = hex_pair(pair).ok_or_else(|| {
                ProtocolError::InvalidIdentifier(format!(
                    "'{input}' contains non-hex characters"
                ))
            })?;
        }

        Ok(Self(bytes))
    }

    /// The three wire bytes `(H, M, L)`
    pub const fn bytes(&self) -> [u8; 3] {
        self.0
    }

    pub const fn high(&self) -> u8 {
        self.0[0]
    }

    pub const fn middle(&self) -> u8 {
        self.0[1]
    }

    pub const fn low(&self) -> u8 {
        self.0[2]
    }

    /// The identifier as an integer, `H*65536 + M*256 + L`
    pub const fn as_u32(&self) -> u32 {
        ((self.0[0] as u32) << 16) | ((self.0[1] as u32) << 8) | self.0[2] as u32
    }
}

fn hex_pair(pair: &[u8]) -> Option<u8> {
    match pair {
        [hi, lo] => {
            let hi = (*hi as char).to_digit(16)?;
            let lo = (*lo as char).to_digit(16)?;
            Some((hi * 16 + lo) as u8)
        }
        _ => None,
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

impl FromStr for ModuleId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<[u8; 3]> for ModuleId {
    fn from(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<u32> for ModuleId {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self> {
        Self::from_u32(value)
    }
}

impl From<ModuleId> for u32 {
    fn from(id: ModuleId) -> Self {
        id.as_u32()
    }
}

/// Accepted serialized shapes of a module identifier
#[derive(Deserialize)]
#[serde(untagged)]
enum ModuleIdRepr {
    Integer(u64),
    Text(String),
    Bytes(Vec<u8>),
}

impl TryFrom<ModuleIdRepr> for ModuleId {
    type Error = ProtocolError;

    fn try_from(repr: ModuleIdRepr) -> Result<Self> {
        match repr {
            ModuleIdRepr::Integer(value) => {
                let value = u32::try_from(value).map_err(|_| {
                    ProtocolError::InvalidIdentifier(format!("{value} does not fit in 24 bits"))
                })?;
                Self::from_u32(value)
            }
            ModuleIdRepr::Text(text) => Self::parse(&text),
            ModuleIdRepr::Bytes(bytes) => Self::from_slice(&bytes),
        }
    }
}

/// A sub-channel on a module, e.g. one light circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(u8);

impl ChannelId {
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

impl From<u8> for ChannelId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

/// Uniquely identifies a controllable device: a channel on a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessoryKey {
    pub module_id: ModuleId,
    pub channel_id: ChannelId,
}

impl AccessoryKey {
    pub const fn new(module_id: ModuleId, channel_id: ChannelId) -> Self {
        Self {
            module_id,
            channel_id,
        }
    }
}

impl fmt::Display for AccessoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.module_id, self.channel_id)
    }
}

/// The class of device behind an accessory key
///
/// Light and switch accessories carry an on/off status; dimmer and window
/// accessories carry a 0-255 value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessoryKind {
    Light,
    Switch,
    Dimmer,
    #[serde(alias = "curtain")]
    Window,
}

impl AccessoryKind {
    pub const ALL: [AccessoryKind; 4] = [
        AccessoryKind::Light,
        AccessoryKind::Switch,
        AccessoryKind::Dimmer,
        AccessoryKind::Window,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessoryKind::Light => "light",
            AccessoryKind::Switch => "switch",
            AccessoryKind::Dimmer => "dimmer",
            AccessoryKind::Window => "window",
        }
    }

    /// Whether the authoritative state is a boolean status rather than a value
    pub fn has_status(&self) -> bool {
        matches!(self, AccessoryKind::Light | AccessoryKind::Switch)
    }
}

impl fmt::Display for AccessoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessoryKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "light" => Ok(AccessoryKind::Light),
            "switch" => Ok(AccessoryKind::Switch),
            "dimmer" => Ok(AccessoryKind::Dimmer),
            "window" | "curtain" => Ok(AccessoryKind::Window),
            other => Err(ProtocolError::InvalidCommand(format!(
                "unknown accessory kind '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_text_form() {
        let id = ModuleId::parse("0x0000cc").unwrap();
        assert_eq!(id.bytes(), [0x00, 0x00, 0xcc]);
        assert_eq!(id.as_u32(), 0xcc);
    }

    #[test]
    fn test_parse_ignores_prefix_and_trailing_characters() {
        let id = ModuleId::parse("##ABcdEF-extra").unwrap();
        assert_eq!(id.bytes(), [0xab, 0xcd, 0xef]);
    }

    #[rstest]
    #[case("")]
    #[case("0x00cc")]
    #[case("0x0000c")]
    #[case("0x00zzcc")]
    #[case("0x0 00cc")]
    #[case("0xé000cc")]
    fn test_parse_rejects_invalid_text(#[case] input: &str) {
        assert!(matches!(
            ModuleId::parse(input),
            Err(ProtocolError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_from_u32_decomposition() {
        let id = ModuleId::from_u32(0xABCDEF).unwrap();
        assert_eq!(id.bytes(), [0xab, 0xcd, 0xef]);
        assert_eq!(id.high(), 0xab);
        assert_eq!(id.middle(), 0xcd);
        assert_eq!(id.low(), 0xef);
    }

    #[test]
    fn test_from_u32_rejects_values_wider_than_24_bits() {
        assert!(ModuleId::from_u32(0x0100_0000).is_err());
        assert!(ModuleId::from_u32(MAX_MODULE_ID).is_ok());
    }

    #[test]
    fn test_from_slice_requires_three_bytes() {
        assert_eq!(
            ModuleId::from_slice(&[1, 2, 3]).unwrap(),
            ModuleId::new(1, 2, 3)
        );
        assert!(ModuleId::from_slice(&[1, 2]).is_err());
        assert!(ModuleId::from_slice(&[1, 2, 3, 4]).is_err());
    }

    #[test]
    fn test_display_is_zero_padded() {
        assert_eq!(ModuleId::new(0, 0x0a, 0xcc).to_string(), "0x000acc");
        assert_eq!(ChannelId::new(0x16).to_string(), "0x16");
    }

    #[test]
    fn test_module_id_serde_shapes() {
        let from_int: ModuleId = serde_json::from_str("204").unwrap();
        let from_text: ModuleId = serde_json::from_str("\"0x0000cc\"").unwrap();
        let from_bytes: ModuleId = serde_json::from_str("[0, 0, 204]").unwrap();
        assert_eq!(from_int, from_text);
        assert_eq!(from_text, from_bytes);

        assert_eq!(serde_json::to_string(&from_int).unwrap(), "204");
        assert!(serde_json::from_str::<ModuleId>("16777216").is_err());
        assert!(serde_json::from_str::<ModuleId>("[1, 2]").is_err());
    }

    #[test]
    fn test_accessory_key_serde() {
        let key = AccessoryKey::new(ModuleId::new(0, 0, 0xcc), ChannelId::new(22));
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#"{"moduleId":204,"channelId":22}"#);
        assert_eq!(key.to_string(), "0x0000cc/0x16");
    }

    #[rstest]
    #[case("light", AccessoryKind::Light)]
    #[case("switch", AccessoryKind::Switch)]
    #[case("dimmer", AccessoryKind::Dimmer)]
    #[case("window", AccessoryKind::Window)]
    #[case("curtain", AccessoryKind::Window)]
    fn test_accessory_kind_parsing(#[case] input: &str, #[case] expected: AccessoryKind) {
        assert_eq!(input.parse::<AccessoryKind>().unwrap(), expected);
        let json = format!("\"{input}\"");
        assert_eq!(
            serde_json::from_str::<AccessoryKind>(&json).unwrap(),
            expected
        );
    }

    #[test]
    fn test_accessory_kind_rejects_unknown() {
        assert!("fan".parse::<AccessoryKind>().is_err());
        assert!(serde_json::from_str::<AccessoryKind>("\"fan\"").is_err());
    }

    #[test]
    fn test_accessory_kind_state_field() {
        assert!(AccessoryKind::Light.has_status());
        assert!(AccessoryKind::Switch.has_status());
        assert!(!AccessoryKind::Dimmer.has_status());
        assert!(!AccessoryKind::Window.has_status());
    }
}
