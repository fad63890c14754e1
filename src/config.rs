//! Caller-supplied per-buck configuration.
//!
//! Boards may override voltage constraints and the initial ramp rate per
//! buck; anything left unset falls back to the catalog defaults.

use crate::topology::BuckId;

/// Output constraints and initial ramp rate for one buck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuckConfig {
    /// Lowest allowed output voltage, in microvolts.
    pub min_uv: u32,
    /// Highest allowed output voltage, in microvolts.
    pub max_uv: u32,
    /// Ramp rate programmed at registration, in uV/us. Zero selects the
    /// slowest hardware step.
    pub ramp_uv_per_us: u32,
}

impl BuckConfig {
    /// Lowest voltage the selector field can express.
    pub const RANGE_MIN_UV: u32 = 500_000;

    /// Highest voltage the selector field can express.
    pub const RANGE_MAX_UV: u32 = 1_680_000;

    /// Clamp the constraint window onto the hardware's selectable range,
    /// keeping `min_uv <= max_uv`. Applied to every override at
    /// registration so voltage requests can never address a selector the
    /// chip does not have.
    pub(crate) fn clamped(self) -> Self {
        let min_uv = self.min_uv.clamp(Self::RANGE_MIN_UV, Self::RANGE_MAX_UV);
        let max_uv = self.max_uv.clamp(min_uv, Self::RANGE_MAX_UV);
        Self {
            min_uv,
            max_uv,
            ramp_uv_per_us: self.ramp_uv_per_us,
        }
    }
}

impl Default for BuckConfig {
    fn default() -> Self {
        Self {
            min_uv: 500_000,
            max_uv: 1_675_000,
            ramp_uv_per_us: 0,
        }
    }
}

/// Per-device configuration: one optional override per buck. Entries for
/// bucks outside the detected phase configuration are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lp8755Config {
    pub bucks: [Option<BuckConfig>; BuckId::COUNT],
}

impl Lp8755Config {
    /// Set the override for one buck.
    pub fn with_buck(mut self, id: BuckId, config: BuckConfig) -> Self {
        self.bucks[id.index()] = Some(config);
        self
    }
}
