//! Driver for the TI LP8755 high-performance power management unit.
//!
//! The LP8755 exposes six independently switchable buck converters over a
//! register-addressed control bus. At power-up the chip is strapped into one
//! of nine multi-phase configurations that determines which bucks are
//! usable; the driver reads that configuration back, registers a channel per
//! active buck, and then serves voltage/mode/ramp commands on those
//! channels. An optional interrupt line drives asynchronous fault-event
//! delivery (per-buck power faults, device-wide overcurrent/overvoltage).
//!
//! The register transport is abstracted behind [`RegisterBus`]; boards plug
//! in whatever addressed bus reaches the chip.
//!
//! Datasheet: <https://www.ti.com/product/LP8755>

pub mod bus;
pub mod config;
pub mod device;
pub mod error;
pub mod fault;
pub mod regs;
pub mod topology;

pub use bus::RegisterBus;
pub use config::{BuckConfig, Lp8755Config};
pub use device::{list_voltage, Lp8755, Mode};
pub use error::{Error, Result};
pub use fault::{FaultDispatcher, FaultEvent, FaultKind, InterruptLine};
pub use topology::{BuckId, PhaseTopology};

#[cfg(test)]
pub(crate) mod testutil;
