//! HVAC modes, actions and the reported-mode derivation.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

pub const PRESET_AWAY: &str = "away";
pub const PRESET_HOME: &str = "home";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HvacMode {
    /// Following the active schedule.
    Auto,
    Heat,
    /// Heat pump setups that can also cool.
    HeatCool,
    /// Local override; the device itself has no off state.
    Off,
}

pub const HVAC_MODES_HEAT_ONLY: &[HvacMode] = &[HvacMode::Heat, HvacMode::Auto, HvacMode::Off];
pub const HVAC_MODES_HEAT_COOL: &[HvacMode] =
    &[HvacMode::HeatCool, HvacMode::Auto, HvacMode::Off];

/// Modes a thermostat offers, depending on whether a compressor is present.
pub fn available_modes(compressor_present: bool) -> &'static [HvacMode] {
    if compressor_present {
        HVAC_MODES_HEAT_COOL
    } else {
        HVAC_MODES_HEAT_ONLY
    }
}

/// Mode reported to the host after a refresh.
///
/// The off override wins, then a compressor signal, then an active schedule.
/// Only the override survives across polls; everything else is re-derived
/// from the gateway data every time.
pub fn derive_hvac_mode(
    compressor_present: bool,
    schedule_active: bool,
    off_override: bool,
) -> HvacMode {
    if off_override {
        HvacMode::Off
    } else if compressor_present {
        HvacMode::HeatCool
    } else if schedule_active {
        HvacMode::Auto
    } else {
        HvacMode::Heat
    }
}

/// What the heating system is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HvacAction {
    Heating,
    Cooling,
    Idle,
}
