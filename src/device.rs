//! LP8755 device context and per-buck channel operations.
//!
//! [`Lp8755::init`] reads the multi-phase configuration code back from the
//! chip, resolves it through the topology catalog, and registers a channel
//! for every buck the configuration leaves independently addressable.
//! Operations on any other buck fail with `ChannelNotActive` before
//! touching the bus.
//!
//! Enable and mode state is never cached: fault conditions and other bus
//! masters can flip those bits out-of-band, so every query re-reads the
//! device. The register transport serializes individual transactions but
//! nothing here serializes whole operations; callers issuing concurrent
//! commands to the same buck must provide their own ordering.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::bus::RegisterBus;
use crate::config::{BuckConfig, Lp8755Config};
use crate::error::{Error, Result};
use crate::fault::{FaultDispatcher, FaultEvent, InterruptLine};
use crate::regs;
use crate::topology::{self, BuckId, PhaseTopology};

/// Lowest selectable output voltage, in microvolts.
const VSEL_BASE_UV: u32 = 500_000;

/// Selector step size, in microvolts.
const VSEL_STEP_UV: u32 = 10_000;

/// Highest valid voltage selector (119 steps, 0x00-0x76).
pub const VSEL_MAX: u8 = 0x76;

/// Ramp quantization: upper bound of each requested-rate bucket (uV/us)
/// and the hardware step it maps to. Faster requested ramps map to
/// smaller step codes.
const RAMP_STEPS: [(u32, u8); 8] = [
    (230, 0x07),
    (470, 0x06),
    (940, 0x05),
    (1_900, 0x04),
    (3_800, 0x03),
    (7_500, 0x02),
    (15_000, 0x01),
    (30_000, 0x00),
];

/// Lock-register byte sequence gating the debug register. Must be written
/// in exactly this order.
const UNLOCK_SEQUENCE: [u8; 3] = [0x00, 0x2C, 0x58];

/// Buck operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Forced continuous conduction (fixed PWM switching).
    Fast,
    /// Automatic PWM/PFM switching.
    Normal,
    /// Automatic switching including the low-power PFM sub-mode.
    ///
    /// Selecting this on any buck also sets the device-global low-power
    /// enable bit, which is never cleared by leaving IDLE.
    Idle,
}

impl Mode {
    /// Decode a consumer-framework numeric mode request (0x1 fast,
    /// 0x2 normal, 0x4 idle). Unknown values fall back to forced PWM as
    /// the safe default instead of being rejected.
    pub fn from_raw(raw: u8) -> Mode {
        match raw {
            0x1 => Mode::Fast,
            0x2 => Mode::Normal,
            0x4 => Mode::Idle,
            other => {
                warn!("unsupported mode request 0x{other:X}, forcing PWM");
                Mode::Fast
            }
        }
    }
}

/// Voltage for a selector: `500000 + 10000 * selector` microvolts.
///
/// Selectors above [`VSEL_MAX`] are outside the chip's linear range and
/// fail with [`Error::InvalidSelector`].
pub fn list_voltage(selector: u8) -> Result<u32> {
    if selector > VSEL_MAX {
        return Err(Error::InvalidSelector(selector));
    }
    Ok(VSEL_BASE_UV + VSEL_STEP_UV * selector as u32)
}

/// One registered buck channel.
#[derive(Debug, Clone, Copy)]
struct Buck {
    config: BuckConfig,
}

/// Device context for one LP8755 chip.
pub struct Lp8755<B: RegisterBus> {
    bus: B,
    topology: PhaseTopology,
    bucks: [Option<Buck>; BuckId::COUNT],
    irq_task: Option<JoinHandle<()>>,
}

impl<B: RegisterBus> Lp8755<B> {
    /// Probe the chip and register a channel per active buck.
    ///
    /// Reads the phase-configuration code, resolves it through the
    /// catalog, and programs each active buck's initial ramp rate from
    /// `config` (catalog defaults where no override is given; override
    /// constraint windows are clamped onto the chip's selectable voltage
    /// range). On any
    /// failure after resolution, all registered channels are dropped and
    /// the six raw buck control registers are driven to 0x00 as a safety
    /// fallback before the error is returned.
    pub async fn init(mut bus: B, config: Lp8755Config) -> Result<Self> {
        let raw = bus.read(regs::PHASE_CONFIG).await?;
        let code = raw & regs::PHASE_CONFIG_MASK;
        let topology = topology::resolve(code)?;
        info!(
            "phase configuration 0x{code:X}: {} active bucks",
            topology.active_count()
        );

        let mut device = Self {
            bus,
            topology,
            bucks: [None; BuckId::COUNT],
            irq_task: None,
        };

        if let Err(err) = device.register_bucks(&config).await {
            warn!("buck registration failed: {err}");
            device.bucks = [None; BuckId::COUNT];
            device.force_all_off().await;
            return Err(err);
        }

        Ok(device)
    }

    async fn register_bucks(&mut self, config: &Lp8755Config) -> Result<()> {
        for &id in self.topology.bucks() {
            let buck_config = config.bucks[id.index()].unwrap_or_default().clamped();
            self.bucks[id.index()] = Some(Buck {
                config: buck_config,
            });
            self.set_ramp_rate(id, buck_config.ramp_uv_per_us).await?;
            debug!(
                "registered {id}: {}-{} uV, ramp {} uV/us",
                buck_config.min_uv, buck_config.max_uv, buck_config.ramp_uv_per_us
            );
        }
        Ok(())
    }

    /// The resolved phase configuration.
    pub fn topology(&self) -> PhaseTopology {
        self.topology
    }

    /// Whether a buck is registered under the current configuration.
    pub fn is_active(&self, id: BuckId) -> bool {
        self.bucks[id.index()].is_some()
    }

    /// Constraints and initial ramp for a registered buck.
    pub fn buck_config(&self, id: BuckId) -> Result<BuckConfig> {
        self.bucks[id.index()]
            .map(|b| b.config)
            .ok_or(Error::ChannelNotActive(id))
    }

    fn require_active(&self, id: BuckId) -> Result<()> {
        if self.bucks[id.index()].is_some() {
            Ok(())
        } else {
            Err(Error::ChannelNotActive(id))
        }
    }

    /// Switch a buck's output on.
    ///
    /// The rail transition is asynchronous to the command; see
    /// [`enable_time`](Self::enable_time) for the settling latency.
    pub async fn enable(&mut self, id: BuckId) -> Result<()> {
        self.require_active(id)?;
        self.bus
            .update_bits(regs::buck_ctrl(id), regs::BUCK_EN, regs::BUCK_EN)
            .await
    }

    /// Switch a buck's output off. Idempotent.
    pub async fn disable(&mut self, id: BuckId) -> Result<()> {
        self.require_active(id)?;
        self.bus
            .update_bits(regs::buck_ctrl(id), regs::BUCK_EN, 0)
            .await
    }

    /// Whether the buck's output-enable bit is set.
    ///
    /// Always re-read from the device; faults and other bus masters can
    /// clear the bit out-of-band.
    pub async fn is_enabled(&mut self, id: BuckId) -> Result<bool> {
        self.require_active(id)?;
        let val = self.bus.read(regs::buck_ctrl(id)).await?;
        Ok(val & regs::BUCK_EN != 0)
    }

    /// Time for the output to settle after enable, in microseconds.
    pub async fn enable_time(&mut self, id: BuckId) -> Result<u32> {
        self.require_active(id)?;
        let raw = self.bus.read(regs::buck_enable_time(id)).await?;
        Ok(raw as u32 * 100)
    }

    /// Current voltage selector.
    pub async fn get_voltage_selector(&mut self, id: BuckId) -> Result<u8> {
        self.require_active(id)?;
        let val = self.bus.read(regs::buck_ctrl(id)).await?;
        Ok(val & regs::BUCK_VOUT_MASK)
    }

    /// Program the voltage selector without disturbing the enable bit.
    pub async fn set_voltage_selector(&mut self, id: BuckId, selector: u8) -> Result<()> {
        self.require_active(id)?;
        list_voltage(selector)?;
        trace!("{id}: selector {selector}");
        self.bus
            .update_bits(regs::buck_ctrl(id), regs::BUCK_VOUT_MASK, selector)
            .await
    }

    /// Program the lowest selector whose voltage is at least `uv`, clamped
    /// into the buck's constraint window. Returns the selector used.
    pub async fn set_voltage_uv(&mut self, id: BuckId, uv: u32) -> Result<u8> {
        let config = self.buck_config(id)?;
        let clamped = uv.clamp(config.min_uv, config.max_uv);
        let steps = clamped.saturating_sub(VSEL_BASE_UV).div_ceil(VSEL_STEP_UV);
        let mut selector = u8::try_from(steps).unwrap_or(u8::MAX);
        if list_voltage(selector)? > config.max_uv {
            // Rounding up crossed the constraint ceiling; settle for the
            // step just below it. The registration-time clamp keeps
            // max_uv inside the selectable range.
            selector = (config.max_uv.saturating_sub(VSEL_BASE_UV) / VSEL_STEP_UV) as u8;
        }
        debug!("{id}: {uv} uV -> selector {selector}");
        self.set_voltage_selector(id, selector).await?;
        Ok(selector)
    }

    /// Change a buck's operating mode.
    ///
    /// Putting a buck into [`Mode::Idle`] also sets the device-global
    /// low-power enable bit; that bit stays set when the buck later
    /// returns to another mode.
    pub async fn set_mode(&mut self, id: BuckId, mode: Mode) -> Result<()> {
        self.require_active(id)?;
        let force_bit = regs::force_pwm_bit(id);
        let mut force_val = 0x00;
        match mode {
            Mode::Fast => force_val = force_bit,
            Mode::Normal => {
                self.bus
                    .update_bits(regs::buck_mode(id), regs::DEEP_IDLE, 0)
                    .await?;
            }
            Mode::Idle => {
                self.bus
                    .update_bits(regs::buck_mode(id), regs::DEEP_IDLE, regs::DEEP_IDLE)
                    .await?;
                self.bus
                    .update_bits(regs::LOW_POWER, regs::LOW_POWER_EN, regs::LOW_POWER_EN)
                    .await?;
            }
        }
        debug!("{id}: mode {mode:?}");
        self.bus
            .update_bits(regs::FORCE_PWM, force_bit, force_val)
            .await
    }

    /// Decode a buck's operating mode from the device.
    ///
    /// The force-PWM bit takes priority: while it is set the buck reports
    /// [`Mode::Fast`] regardless of the deep-idle bit.
    pub async fn get_mode(&mut self, id: BuckId) -> Result<Mode> {
        self.require_active(id)?;
        let force = self.bus.read(regs::FORCE_PWM).await?;
        if force & regs::force_pwm_bit(id) != 0 {
            return Ok(Mode::Fast);
        }
        let mode = self.bus.read(regs::buck_mode(id)).await?;
        if mode & regs::DEEP_IDLE != 0 {
            Ok(Mode::Idle)
        } else {
            Ok(Mode::Normal)
        }
    }

    /// Quantize a requested ramp rate (uV/us) onto the eight hardware
    /// steps and program it. Requests above 30000 uV/us fail with
    /// [`Error::UnsupportedRampRate`] before any register access.
    pub async fn set_ramp_rate(&mut self, id: BuckId, uv_per_us: u32) -> Result<()> {
        self.require_active(id)?;
        let step = RAMP_STEPS
            .iter()
            .find(|(limit, _)| uv_per_us <= *limit)
            .map(|(_, step)| *step)
            .ok_or(Error::UnsupportedRampRate(uv_per_us))?;
        trace!("{id}: ramp {uv_per_us} uV/us -> step {step}");
        self.bus
            .update_bits(regs::buck_ramp(id), regs::RAMP_MASK, step)
            .await
    }

    /// Arm fault dispatch on an interrupt line.
    ///
    /// Reads and caches the interrupt mask, then spawns a task that
    /// services the fault flag registers on every assertion and fans
    /// typed events out over `events`. Without an interrupt line the
    /// device works normally; only fault delivery is unavailable.
    pub async fn attach_interrupt<I>(
        &mut self,
        irq: I,
        events: mpsc::Sender<FaultEvent>,
    ) -> Result<()>
    where
        B: Clone + 'static,
        I: InterruptLine + 'static,
    {
        // Re-arming replaces the previous dispatcher; only one may touch
        // the flag registers at a time.
        if let Some(task) = self.irq_task.take() {
            task.abort();
        }

        let irqmask = self.bus.read(regs::IRQ_MASK).await?;
        debug!("interrupt mask 0x{irqmask:02X}");

        let mut active = [false; BuckId::COUNT];
        for &id in self.topology.bucks() {
            active[id.index()] = true;
        }

        let dispatcher = FaultDispatcher::new(self.bus.clone(), irqmask, active, events);
        self.irq_task = Some(tokio::spawn(dispatcher.run(irq)));
        Ok(())
    }

    /// Run the diagnostic test-mode write sequence.
    ///
    /// Unlocks the debug register with the fixed lock-byte sequence, pulses
    /// the debug path, and zeroes the phase-level registers. Stops at the
    /// first bus failure.
    pub async fn test_mode_write(&mut self) -> Result<()> {
        info!("running test-mode write sequence");
        for byte in UNLOCK_SEQUENCE {
            self.bus.write(regs::LOCK, byte).await?;
        }
        self.bus.write(regs::DEBUG, 0x01).await?;
        self.bus.write(regs::B0_CTRL, 0x83).await?;
        self.bus.write(regs::DEBUG, 0x00).await?;
        self.bus.write(regs::PH_LEV_B0, 0x00).await?;
        self.bus.write(regs::PH_LEV_B3, 0x00).await?;
        Ok(())
    }

    /// Tear the device down: stop fault dispatch, drive every buck
    /// control register to 0x00, and drop all registered channels.
    pub async fn shutdown(&mut self) {
        if let Some(task) = self.irq_task.take() {
            task.abort();
        }
        self.force_all_off().await;
        self.bucks = [None; BuckId::COUNT];
    }

    /// Best-effort safety fallback: zero all six raw buck control
    /// registers, active or not.
    async fn force_all_off(&mut self) {
        for reg in 0x00..=0x05u8 {
            if let Err(err) = self.bus.write(reg, 0x00).await {
                warn!("failed to force off register 0x{reg:02X}: {err}");
            }
        }
    }
}
