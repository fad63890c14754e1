//! LP8755 register map.
//!
//! One byte per address. The per-buck control registers are scrambled
//! relative to buck numbering; everything else is a fixed base plus the
//! buck index.

use crate::topology::BuckId;

/// Per-buck control register (enable bit + voltage selector), indexed by
/// buck id. Note the non-contiguous assignment.
pub const BUCK_CTRL: [u8; BuckId::COUNT] = [0x00, 0x03, 0x04, 0x01, 0x05, 0x02];

/// Output-enable bit in a buck control register.
pub const BUCK_EN: u8 = 0x80;

/// Voltage-selector field in a buck control register.
pub const BUCK_VOUT_MASK: u8 = 0x7F;

/// Forced-PWM register; bit `1 << id` forces continuous conduction for
/// that buck and takes priority when decoding the operating mode.
pub const FORCE_PWM: u8 = 0x06;

/// Buck 0 control register used by the test-mode sequence.
pub const B0_CTRL: u8 = 0x07;

/// Deep-idle (low-power PFM) bit in a per-buck mode register.
pub const DEEP_IDLE: u8 = 0x20;

/// Ramp-rate field in a per-buck ramp register.
pub const RAMP_MASK: u8 = 0x07;

/// Device-global low-power enable register and bit. Set as a side effect
/// of putting any buck into IDLE mode; never cleared by leaving IDLE.
pub const LOW_POWER: u8 = 0x10;
pub const LOW_POWER_EN: u8 = 0x01;

/// Interrupt mask register, read once when the interrupt line is armed.
pub const IRQ_MASK: u8 = 0x0F;

/// Fault flag register A: per-buck power-fault bits (`0x04 << id`).
pub const FAULT_FLAG_A: u8 = 0x0D;

/// Fault flag register B: bit 0 overcurrent, bit 1 overvoltage.
pub const FAULT_FLAG_B: u8 = 0x0E;
pub const FAULT_OCP: u8 = 0x01;
pub const FAULT_OVP: u8 = 0x02;

/// Multi-phase configuration code register; low nibble selects the
/// topology catalog entry.
pub const PHASE_CONFIG: u8 = 0x3D;
pub const PHASE_CONFIG_MASK: u8 = 0x0F;

/// Write-protect register gating the debug register. Unlocked by the
/// exact byte sequence 0x00, 0x2C, 0x58.
pub const LOCK: u8 = 0xDD;

/// Debug/test register, reachable only after unlocking.
pub const DEBUG: u8 = 0xFF;

/// Phase-level registers written by the test-mode sequence.
pub const PH_LEV_B0: u8 = 0x1F;
pub const PH_LEV_B3: u8 = 0x20;

/// Per-buck control register address.
pub fn buck_ctrl(id: BuckId) -> u8 {
    BUCK_CTRL[id.index()]
}

/// Per-buck ramp register address.
pub fn buck_ramp(id: BuckId) -> u8 {
    0x07 + id.index() as u8
}

/// Per-buck mode register address (deep-idle bit).
pub fn buck_mode(id: BuckId) -> u8 {
    0x08 + id.index() as u8
}

/// Per-buck enable-time register address.
pub fn buck_enable_time(id: BuckId) -> u8 {
    0x12 + id.index() as u8
}

/// Forced-PWM bit for a buck in [`FORCE_PWM`].
pub fn force_pwm_bit(id: BuckId) -> u8 {
    0x01 << id.index()
}

/// Power-fault bit for a buck in [`FAULT_FLAG_A`] (and the matching
/// position in the interrupt mask).
pub fn power_fault_bit(id: BuckId) -> u8 {
    0x04 << id.index()
}
