//! Shared in-memory state of the simulated board.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pinhub_domain::hardware::{DhtReading, PinMode};

#[derive(Debug)]
pub(crate) struct BoardState {
    pub levels: HashMap<u32, bool>,
    pub modes: HashMap<u32, PinMode>,
    pub pwm: HashMap<u32, (f64, f64)>,
    /// `None` makes every DHT read fail as a flaky sensor would.
    pub dht: Option<DhtReading>,
    pub lcd: HashMap<u16, String>,
    pub serial: VecDeque<u8>,
    pub loopback: bool,
}

impl Default for BoardState {
    fn default() -> Self {
        Self {
            levels: HashMap::new(),
            modes: HashMap::new(),
            pwm: HashMap::new(),
            dht: Some(DhtReading {
                temperature_c: 21.5,
                humidity_pct: 45.0,
            }),
            lcd: HashMap::new(),
            serial: VecDeque::new(),
            loopback: true,
        }
    }
}

/// In-memory board implementing both hardware ports.
///
/// Clones share the same state, so a test can keep a handle to inspect
/// what the application did.
#[derive(Debug, Clone, Default)]
pub struct VirtualBoard {
    state: Arc<Mutex<BoardState>>,
}

impl VirtualBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive a pin from the outside, as a button or sensor would.
    pub fn set_level(&self, pin: u32, high: bool) {
        self.lock_state().levels.insert(pin, high);
    }

    /// Physical level last written to or set on `pin`.
    #[must_use]
    pub fn level(&self, pin: u32) -> Option<bool> {
        self.lock_state().levels.get(&pin).copied()
    }

    #[must_use]
    pub fn mode(&self, pin: u32) -> Option<PinMode> {
        self.lock_state().modes.get(&pin).copied()
    }

    /// Duty cycle and frequency of the PWM signal on `pin`.
    #[must_use]
    pub fn pwm(&self, pin: u32) -> Option<(f64, f64)> {
        self.lock_state().pwm.get(&pin).copied()
    }

    /// Replace the DHT reading; `None` makes reads fail.
    pub fn set_dht(&self, reading: Option<DhtReading>) {
        self.lock_state().dht = reading;
    }

    /// Text shown on an LCD line (1-based).
    #[must_use]
    pub fn lcd_line(&self, line: u16) -> Option<String> {
        self.lock_state().lcd.get(&line).cloned()
    }

    /// Queue bytes as if a remote device had sent them.
    pub fn receive(&self, bytes: &[u8]) {
        self.lock_state().serial.extend(bytes);
    }

    /// Whether written serial bytes are echoed back (the default).
    pub fn set_loopback(&self, enabled: bool) {
        self.lock_state().loopback = enabled;
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
