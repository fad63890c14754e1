//! Shared test fixtures.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;

use crate::bus::RegisterBus;
use crate::error::{Error, Result};

/// In-memory register file standing in for the control bus.
///
/// Cloning shares the underlying registers, matching the real transport
/// where the command path and the fault dispatcher each hold a bus handle
/// onto the same device.
#[derive(Clone, Default)]
pub struct MockBus {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    regs: HashMap<u8, u8>,
    writes: Vec<(u8, u8)>,
    fail_reads: HashSet<u8>,
    fail_writes: HashSet<u8>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed register contents before handing the bus to the driver.
    pub fn set(&self, reg: u8, val: u8) {
        self.inner.lock().unwrap().regs.insert(reg, val);
    }

    /// Current register value (unwritten registers read as zero).
    pub fn get(&self, reg: u8) -> u8 {
        *self.inner.lock().unwrap().regs.get(&reg).unwrap_or(&0)
    }

    /// Every `(reg, val)` write issued so far, in order.
    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.inner.lock().unwrap().writes.clone()
    }

    /// Make subsequent reads of `reg` fail.
    pub fn fail_reads_of(&self, reg: u8) {
        self.inner.lock().unwrap().fail_reads.insert(reg);
    }

    /// Make subsequent writes of `reg` fail.
    pub fn fail_writes_of(&self, reg: u8) {
        self.inner.lock().unwrap().fail_writes.insert(reg);
    }
}

#[async_trait]
impl RegisterBus for MockBus {
    async fn read(&mut self, reg: u8) -> Result<u8> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_reads.contains(&reg) {
            return Err(Error::device_access(anyhow!(
                "injected read failure at 0x{reg:02X}"
            )));
        }
        Ok(*inner.regs.get(&reg).unwrap_or(&0))
    }

    async fn write(&mut self, reg: u8, val: u8) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_writes.contains(&reg) {
            return Err(Error::device_access(anyhow!(
                "injected write failure at 0x{reg:02X}"
            )));
        }
        inner.regs.insert(reg, val);
        inner.writes.push((reg, val));
        Ok(())
    }
}
