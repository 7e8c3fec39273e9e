//! The SPI bus the card slot hangs off.
//!
//! The bus is the power switch for the card: while it is up the card draws
//! active current, so [`StorageBus::end`] must run before every deep sleep.
//! [`SimBus`] models that power state for hosts without real hardware.

use log::debug;
use thiserror::Error;

use crate::config::BusConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("SPI clock frequency must be non-zero")]
    ZeroFrequency,
    #[error("GPIO {0} assigned to more than one SPI signal")]
    PinConflict(u8),
    #[error("bus controller refused init: {0}")]
    Controller(String),
}

pub trait StorageBus {
    /// Power up and configure the bus.  Calling it while powered reconfigures.
    fn begin(&mut self, config: &BusConfig) -> Result<(), BusError>;

    /// Release the bus and cut power to the slot.  Idempotent.
    fn end(&mut self);

    fn is_powered(&self) -> bool;
}

/// Simulated SPI bus: validates wiring and tracks power state.
#[derive(Debug, Default)]
pub struct SimBus {
    powered:      bool,
    power_cycles: u32,
    fail_init:    Option<String>,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `begin` fail with `reason` until cleared.
    pub fn set_init_fault(&mut self, reason: Option<&str>) {
        self.fail_init = reason.map(str::to_owned);
    }

    /// Number of completed power-up → power-down cycles.
    pub fn power_cycles(&self) -> u32 {
        self.power_cycles
    }
}

impl StorageBus for SimBus {
    fn begin(&mut self, config: &BusConfig) -> Result<(), BusError> {
        if let Some(reason) = &self.fail_init {
            return Err(BusError::Controller(reason.clone()));
        }
        if config.freq_hz == 0 {
            return Err(BusError::ZeroFrequency);
        }
        if let Some(pin) = config.conflicting_pin() {
            return Err(BusError::PinConflict(pin));
        }
        debug!(
            "SPI up: clk={} miso={} mosi={} cs={} @ {} Hz",
            config.clk, config.miso, config.mosi, config.cs, config.freq_hz
        );
        self.powered = true;
        Ok(())
    }

    fn end(&mut self) {
        if self.powered {
            self.powered = false;
            self.power_cycles += 1;
            debug!("SPI released");
        }
    }

    fn is_powered(&self) -> bool {
        self.powered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_and_end_toggle_power() {
        let mut bus = SimBus::new();
        bus.begin(&BusConfig::default()).unwrap();
        assert!(bus.is_powered());
        bus.end();
        bus.end();
        assert!(!bus.is_powered());
        assert_eq!(bus.power_cycles(), 1);
    }

    #[test]
    fn rejects_bad_wiring() {
        let mut bus = SimBus::new();
        let zero = BusConfig { freq_hz: 0, ..BusConfig::default() };
        assert_eq!(bus.begin(&zero), Err(BusError::ZeroFrequency));

        let clash = BusConfig { mosi: 14, clk: 14, ..BusConfig::default() };
        assert_eq!(bus.begin(&clash), Err(BusError::PinConflict(14)));
        assert!(!bus.is_powered());
    }

    #[test]
    fn injected_fault_keeps_bus_down() {
        let mut bus = SimBus::new();
        bus.set_init_fault(Some("no response"));
        assert!(matches!(bus.begin(&BusConfig::default()), Err(BusError::Controller(_))));
        assert!(!bus.is_powered());

        bus.set_init_fault(None);
        assert!(bus.begin(&BusConfig::default()).is_ok());
    }
}
