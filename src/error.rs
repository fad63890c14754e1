//! Driver error taxonomy.
//!
//! Every operation surfaces its failure synchronously to the immediate
//! caller; nothing is retried at this layer. Register-transport failures
//! from the board's [`RegisterBus`](crate::bus::RegisterBus) implementation
//! are wrapped in [`Error::DeviceAccess`].

use thiserror::Error;

use crate::topology::BuckId;

/// Errors returned by LP8755 operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A register transaction failed. Never retried; the underlying
    /// transport error is carried as the source.
    #[error("register access failed")]
    DeviceAccess(#[source] anyhow::Error),

    /// The phase-configuration code read from the chip does not index the
    /// catalog (codes 9-15 are undefined). Fatal to initialization.
    #[error("invalid multi-phase configuration code 0x{0:X}")]
    InvalidConfiguration(u8),

    /// The operation targets a buck that is absent from the resolved phase
    /// configuration. Rejected before any register access.
    #[error("{0} is not active in the current phase configuration")]
    ChannelNotActive(BuckId),

    /// Voltage selector outside the 0-118 range.
    #[error("voltage selector {0} out of range")]
    InvalidSelector(u8),

    /// Requested ramp rate above the hardware's 30000 uV/us maximum.
    #[error("unsupported ramp rate {0} uV/us")]
    UnsupportedRampRate(u32),
}

impl Error {
    /// Wrap a transport error as a register-access failure.
    pub fn device_access(err: impl Into<anyhow::Error>) -> Self {
        Error::DeviceAccess(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
