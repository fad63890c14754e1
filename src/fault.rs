//! Interrupt-driven fault dispatch.
//!
//! On each interrupt assertion the dispatcher reads the two fault flag
//! registers, clears them, and fans typed events out to the active bucks.
//! Power faults are scoped to the buck whose flag bit was set; overcurrent
//! and overvoltage are device-wide and broadcast to every instantiated
//! buck. Fault classes masked in the interrupt mask (cached when the line
//! is armed) are dropped.
//!
//! Flag registers are cleared by writing 0x00 regardless of which bits
//! were read as set; this re-arms the interrupt line but can lose a fault
//! that latches between the read and the clear. That window is inherited
//! from the hardware's single flag-register design and deliberately kept.
//!
//! A bus failure anywhere in the sequence aborts the remainder of that
//! invocation; nothing is retried. If the condition persists the line
//! re-asserts and the next invocation starts fresh.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::bus::RegisterBus;
use crate::error::Result;
use crate::regs;
use crate::topology::BuckId;

/// Fault classes reported by the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Per-buck power fault.
    PowerFault,
    /// Device-wide overcurrent; broadcast to every active buck.
    Overcurrent,
    /// Device-wide overvoltage; broadcast to every active buck.
    Overvoltage,
}

/// One fault notification, scoped to a single buck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultEvent {
    pub buck: BuckId,
    pub kind: FaultKind,
}

/// Edge-triggered interrupt signal.
///
/// Boards implement this over whatever carries the chip's interrupt pin
/// (GPIO line, management-protocol notification). The line is optional:
/// without one the driver works normally, just without fault delivery.
#[async_trait]
pub trait InterruptLine: Send {
    /// Resolves on the next assertion of the line.
    async fn wait_asserted(&mut self) -> Result<()>;
}

/// Services the fault flag registers and fans events out.
///
/// Holds its own bus handle; the hardware has a single register set, so
/// there is no cross-path locking between fault dispatch and concurrent
/// command callers. The flag registers are touched only from here.
pub struct FaultDispatcher<B> {
    bus: B,
    irqmask: u8,
    active: [bool; BuckId::COUNT],
    events: mpsc::Sender<FaultEvent>,
}

impl<B: RegisterBus> FaultDispatcher<B> {
    /// `irqmask` is the interrupt-mask register value cached at arm time;
    /// `active` marks the bucks instantiated for the detected phase
    /// configuration.
    pub fn new(
        bus: B,
        irqmask: u8,
        active: [bool; BuckId::COUNT],
        events: mpsc::Sender<FaultEvent>,
    ) -> Self {
        Self {
            bus,
            irqmask,
            active,
            events,
        }
    }

    /// Service one interrupt assertion.
    ///
    /// Any bus failure aborts the remaining steps for this invocation and
    /// is surfaced to the caller; flags not yet cleared stay latched and
    /// keep the line asserted.
    pub async fn service(&mut self) -> Result<()> {
        let flag_a = self.bus.read(regs::FAULT_FLAG_A).await?;
        // Unconditional clear re-arms the interrupt line.
        self.bus.write(regs::FAULT_FLAG_A, 0x00).await?;
        trace!("fault flags A=0x{flag_a:02X}");

        for id in BuckId::all() {
            let bit = regs::power_fault_bit(id);
            if flag_a & bit != 0 && self.irqmask & bit != 0 && self.active[id.index()] {
                self.emit(FaultEvent {
                    buck: id,
                    kind: FaultKind::PowerFault,
                });
            }
        }

        let flag_b = self.bus.read(regs::FAULT_FLAG_B).await?;
        self.bus.write(regs::FAULT_FLAG_B, 0x00).await?;
        trace!("fault flags B=0x{flag_b:02X}");

        if flag_b & regs::FAULT_OCP != 0 && self.irqmask & regs::FAULT_OCP != 0 {
            self.broadcast(FaultKind::Overcurrent);
        }
        if flag_b & regs::FAULT_OVP != 0 && self.irqmask & regs::FAULT_OVP != 0 {
            self.broadcast(FaultKind::Overvoltage);
        }

        Ok(())
    }

    fn broadcast(&self, kind: FaultKind) {
        for id in BuckId::all() {
            if self.active[id.index()] {
                self.emit(FaultEvent { buck: id, kind });
            }
        }
    }

    /// Emit without blocking on the sink; a full channel drops the event.
    fn emit(&self, event: FaultEvent) {
        debug!("{}: {:?}", event.buck, event.kind);
        if let Err(err) = self.events.try_send(event) {
            warn!("dropping fault event for {}: {err}", event.buck);
        }
    }

    /// Dispatch loop: service the flag registers on every assertion of
    /// `irq` until the line itself fails.
    pub async fn run<I: InterruptLine>(mut self, mut irq: I) {
        loop {
            if let Err(err) = irq.wait_asserted().await {
                warn!("interrupt line failed, stopping fault dispatch: {err}");
                return;
            }
            if let Err(err) = self.service().await {
                // Flags left uncleared keep the line asserted; the next
                // invocation starts over.
                warn!("fault dispatch aborted: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testutil::MockBus;

    fn buck(id: usize) -> BuckId {
        BuckId::new(id).unwrap()
    }

    fn active(ids: &[usize]) -> [bool; BuckId::COUNT] {
        let mut active = [false; BuckId::COUNT];
        for &id in ids {
            active[id] = true;
        }
        active
    }

    fn dispatcher(
        bus: &MockBus,
        irqmask: u8,
        ids: &[usize],
    ) -> (FaultDispatcher<MockBus>, mpsc::Receiver<FaultEvent>) {
        let (tx, rx) = mpsc::channel(32);
        (FaultDispatcher::new(bus.clone(), irqmask, active(ids), tx), rx)
    }

    fn drain(rx: &mut mpsc::Receiver<FaultEvent>) -> Vec<FaultEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn power_fault_is_scoped_to_one_buck() {
        let bus = MockBus::new();
        bus.set(regs::FAULT_FLAG_A, 0x04 << 2); // buck2 power fault
        let (mut dispatcher, mut rx) = dispatcher(&bus, 0xFF, &[0, 2, 3, 5]);

        dispatcher.service().await.unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![FaultEvent {
                buck: buck(2),
                kind: FaultKind::PowerFault
            }]
        );
        assert_eq!(bus.get(regs::FAULT_FLAG_A), 0x00);
        assert!(bus.writes().contains(&(regs::FAULT_FLAG_A, 0x00)));
    }

    #[tokio::test]
    async fn overcurrent_broadcasts_to_every_active_buck() {
        let bus = MockBus::new();
        bus.set(regs::FAULT_FLAG_B, regs::FAULT_OCP);
        let (mut dispatcher, mut rx) = dispatcher(&bus, 0xFF, &[0, 3, 4, 5]);

        dispatcher.service().await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 4);
        for (event, id) in events.iter().zip([0, 3, 4, 5]) {
            assert_eq!(event.buck, buck(id));
            assert_eq!(event.kind, FaultKind::Overcurrent);
        }
        assert_eq!(bus.get(regs::FAULT_FLAG_B), 0x00);
    }

    #[tokio::test]
    async fn overvoltage_broadcasts_independently_of_overcurrent() {
        let bus = MockBus::new();
        bus.set(regs::FAULT_FLAG_B, regs::FAULT_OCP | regs::FAULT_OVP);
        let (mut dispatcher, mut rx) = dispatcher(&bus, 0xFF, &[0, 5]);

        dispatcher.service().await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 4);
        assert!(events[..2].iter().all(|e| e.kind == FaultKind::Overcurrent));
        assert!(events[2..].iter().all(|e| e.kind == FaultKind::Overvoltage));
    }

    #[tokio::test]
    async fn masked_fault_classes_are_dropped() {
        let bus = MockBus::new();
        bus.set(regs::FAULT_FLAG_A, 0x04 << 3);
        bus.set(regs::FAULT_FLAG_B, regs::FAULT_OCP | regs::FAULT_OVP);
        // Only overvoltage unmasked.
        let (mut dispatcher, mut rx) = dispatcher(&bus, regs::FAULT_OVP, &[0, 3]);

        dispatcher.service().await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind == FaultKind::Overvoltage));
        // Flags are still cleared even when every class is masked.
        assert_eq!(bus.get(regs::FAULT_FLAG_A), 0x00);
        assert_eq!(bus.get(regs::FAULT_FLAG_B), 0x00);
    }

    #[tokio::test]
    async fn inactive_bucks_get_no_events() {
        let bus = MockBus::new();
        // Power fault on buck1, which is not part of the configuration.
        bus.set(regs::FAULT_FLAG_A, 0x04 << 1);
        let (mut dispatcher, mut rx) = dispatcher(&bus, 0xFF, &[0, 3, 5]);

        dispatcher.service().await.unwrap();

        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn read_failure_aborts_whole_invocation() {
        let bus = MockBus::new();
        bus.set(regs::FAULT_FLAG_A, 0x04);
        bus.set(regs::FAULT_FLAG_B, regs::FAULT_OCP);
        bus.fail_reads_of(regs::FAULT_FLAG_A);
        let (mut dispatcher, mut rx) = dispatcher(&bus, 0xFF, &[0]);

        let err = dispatcher.service().await.unwrap_err();
        assert!(matches!(err, Error::DeviceAccess(_)));

        // No partial dispatch, no clears: register B was never touched.
        assert!(drain(&mut rx).is_empty());
        assert!(bus.writes().is_empty());
        assert_eq!(bus.get(regs::FAULT_FLAG_B), regs::FAULT_OCP);
    }

    #[tokio::test]
    async fn flag_b_failure_still_delivers_flag_a_events() {
        let bus = MockBus::new();
        bus.set(regs::FAULT_FLAG_A, 0x04); // buck0 power fault
        bus.fail_reads_of(regs::FAULT_FLAG_B);
        let (mut dispatcher, mut rx) = dispatcher(&bus, 0xFF, &[0]);

        assert!(dispatcher.service().await.is_err());

        assert_eq!(
            drain(&mut rx),
            vec![FaultEvent {
                buck: buck(0),
                kind: FaultKind::PowerFault
            }]
        );
        assert_eq!(bus.get(regs::FAULT_FLAG_A), 0x00);
    }
}
