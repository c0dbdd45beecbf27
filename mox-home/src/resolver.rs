//! Maps a frame classification onto the state of an accessory kind

use mox_protocol::{AccessoryKind, AccessoryState, Classification};

/// The state a classification carries for an accessory of `kind`
///
/// `None` when the classification is not one the kind answers with.
pub fn resolve(kind: AccessoryKind, classification: Classification) -> Option<AccessoryState> {
    match kind {
        AccessoryKind::Light | AccessoryKind::Switch => resolve_light(classification),
        AccessoryKind::Dimmer => resolve_dimmer(classification),
        AccessoryKind::Window => resolve_curtain(classification),
    }
}

fn resolve_light(classification: Classification) -> Option<AccessoryState> {
    match classification {
        Classification::LightStatus(on) => Some(AccessoryState::Status(on)),
        _ => None,
    }
}

fn resolve_dimmer(classification: Classification) -> Option<AccessoryState> {
    match classification {
        Classification::LightBrightness(value) => Some(AccessoryState::Value(value)),
        _ => None,
    }
}

fn resolve_curtain(classification: Classification) -> Option<AccessoryState> {
    match classification {
        Classification::CurtainPosition(value) => Some(AccessoryState::Value(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AccessoryKind::Light, Classification::LightStatus(true), Some(AccessoryState::Status(true)))]
    #[case(AccessoryKind::Switch, Classification::LightStatus(false), Some(AccessoryState::Status(false)))]
    #[case(AccessoryKind::Dimmer, Classification::LightBrightness(128), Some(AccessoryState::Value(128)))]
    #[case(AccessoryKind::Window, Classification::CurtainPosition(7), Some(AccessoryState::Value(7)))]
    #[case(AccessoryKind::Light, Classification::LightBrightness(1), None)]
    #[case(AccessoryKind::Dimmer, Classification::LightStatus(true), None)]
    #[case(AccessoryKind::Dimmer, Classification::CurtainPosition(9), None)]
    #[case(AccessoryKind::Window, Classification::LightBrightness(9), None)]
    #[case(AccessoryKind::Switch, Classification::Unrecognized, None)]
    fn test_resolve(
        #[case] kind: AccessoryKind,
        #[case] classification: Classification,
        #[case] expected: Option<AccessoryState>,
    ) {
        assert_eq!(resolve(kind, classification), expected);
    }
}
