//! Register transport abstraction.
//!
//! The LP8755 sits on an addressed byte-wide control bus (I2C on every
//! board seen so far). The driver only needs single-register reads and
//! writes; boards implement this trait over whatever transport reaches the
//! chip and map their native errors through
//! [`Error::device_access`](crate::error::Error::device_access).

use async_trait::async_trait;

use crate::error::Result;

/// Byte-addressed register bus, 0x00-0xFF address space.
///
/// Each individual transaction is assumed atomic by the driver; nothing
/// here provides cross-transaction atomicity. Implementations must either
/// complete or fail fast, never block indefinitely.
#[async_trait]
pub trait RegisterBus: Send {
    /// Read a single register.
    async fn read(&mut self, reg: u8) -> Result<u8>;

    /// Write a single register.
    async fn write(&mut self, reg: u8, val: u8) -> Result<()>;

    /// Read-modify-write restricted to `mask` bits.
    ///
    /// Bits outside `mask` are preserved. Skips the write when the register
    /// already holds the requested value.
    async fn update_bits(&mut self, reg: u8, mask: u8, val: u8) -> Result<()> {
        let current = self.read(reg).await?;
        let updated = (current & !mask) | (val & mask);
        if updated != current {
            self.write(reg, updated).await?;
        }
        Ok(())
    }
}
