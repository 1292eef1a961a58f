//! In-memory port implementations shared by the unit tests of this crate.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pinhub_domain::error::PinHubError;
use pinhub_domain::hardware::{DhtModel, DhtReading, LcdPanel, PinMode, SerialLink};
use pinhub_domain::pin_config::PinConfig;

use crate::ports::{ConfigStore, Peripherals, PinIo};

#[derive(Clone, Default)]
pub struct MemoryStore {
    config: Arc<Mutex<PinConfig>>,
    writes: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub fn snapshot(&self) -> PinConfig {
        self.config.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> impl Future<Output = Result<PinConfig, PinHubError>> + Send {
        let config = self.config.lock().unwrap().clone();
        async { Ok(config) }
    }

    fn update<T, F>(&self, change: F) -> impl Future<Output = Result<T, PinHubError>> + Send
    where
        T: Send + 'static,
        F: FnOnce(&mut PinConfig) -> Result<T, PinHubError> + Send + 'static,
    {
        let mut config = self.config.lock().unwrap();
        let mut working = config.clone();
        let result = change(&mut working);
        if result.is_ok() {
            *config = working;
            *self.writes.lock().unwrap() += 1;
        }
        async { result }
    }
}

#[derive(Default)]
pub struct PinState {
    pub levels: HashMap<u32, bool>,
    pub pwm: HashMap<u32, (f64, f64)>,
    pub modes: HashMap<u32, PinMode>,
    /// Every physical write, in order.
    pub writes: Vec<(u32, bool)>,
    /// Pins whose level flips after the given number of reads.
    pub flips: HashMap<u32, usize>,
    pub failing: HashSet<u32>,
}

#[derive(Clone, Default)]
pub struct FakePins {
    pub state: Arc<Mutex<PinState>>,
}

impl FakePins {
    pub fn set_level(&self, pin: u32, high: bool) {
        self.state.lock().unwrap().levels.insert(pin, high);
    }

    pub fn level(&self, pin: u32) -> Option<bool> {
        self.state.lock().unwrap().levels.get(&pin).copied()
    }

    pub fn fail(&self, pin: u32) {
        self.state.lock().unwrap().failing.insert(pin);
    }

    /// Invert `pin` once `reads` reads of it have happened.
    pub fn flip_after(&self, pin: u32, reads: usize) {
        self.state.lock().unwrap().flips.insert(pin, reads);
    }

    pub fn writes(&self) -> Vec<(u32, bool)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn pwm(&self, pin: u32) -> Option<(f64, f64)> {
        self.state.lock().unwrap().pwm.get(&pin).copied()
    }

    fn check(state: &PinState, pin: u32) -> Result<(), PinHubError> {
        if state.failing.contains(&pin) {
            return Err(PinHubError::hardware("gpio", format!("pin {pin} is not available")));
        }
        Ok(())
    }
}

impl PinIo for FakePins {
    fn backend(&self) -> &'static str {
        "fake"
    }

    fn persistent(&self) -> bool {
        false
    }

    fn write_digital(&self, pin: u32, high: bool) -> impl Future<Output = Result<(), PinHubError>> + Send {
        let mut state = self.state.lock().unwrap();
        let result = Self::check(&state, pin).map(|()| {
            state.levels.insert(pin, high);
            state.writes.push((pin, high));
        });
        async { result }
    }

    fn read_digital(&self, pin: u32, _pull_up: bool) -> impl Future<Output = Result<bool, PinHubError>> + Send {
        let mut state = self.state.lock().unwrap();
        let result = Self::check(&state, pin).map(|()| {
            if let Some(remaining) = state.flips.get_mut(&pin) {
                if *remaining == 0 {
                    state.flips.remove(&pin);
                    let level = state.levels.entry(pin).or_default();
                    *level = !*level;
                } else {
                    *remaining -= 1;
                }
            }
            state.levels.get(&pin).copied().unwrap_or(false)
        });
        async { result }
    }

    fn write_pwm(
        &self,
        pin: u32,
        duty_cycle: f64,
        frequency: f64,
    ) -> impl Future<Output = Result<(), PinHubError>> + Send {
        let mut state = self.state.lock().unwrap();
        let result = Self::check(&state, pin).map(|()| {
            state.pwm.insert(pin, (duty_cycle, frequency));
        });
        async { result }
    }

    fn set_direction(&self, pin: u32, mode: PinMode) -> impl Future<Output = Result<(), PinHubError>> + Send {
        let mut state = self.state.lock().unwrap();
        let result = Self::check(&state, pin).map(|()| {
            state.modes.insert(pin, mode);
        });
        async { result }
    }
}

#[derive(Default)]
pub struct PeripheralState {
    pub dht: Option<DhtReading>,
    pub lcd: HashMap<u16, String>,
    pub lcd_clears: usize,
    pub sent: Vec<u8>,
    pub incoming: VecDeque<u8>,
}

#[derive(Clone, Default)]
pub struct FakePeripherals {
    pub state: Arc<Mutex<PeripheralState>>,
}

impl FakePeripherals {
    pub fn with_dht(temperature_c: f64, humidity_pct: f64) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().dht = Some(DhtReading {
            temperature_c,
            humidity_pct,
        });
        fake
    }

    pub fn receive(&self, bytes: &[u8]) {
        self.state.lock().unwrap().incoming.extend(bytes);
    }
}

impl Peripherals for FakePeripherals {
    fn read_dht(
        &self,
        _pin: u32,
        _model: DhtModel,
    ) -> impl Future<Output = Result<DhtReading, PinHubError>> + Send {
        let reading = self.state.lock().unwrap().dht;
        async move { reading.ok_or_else(|| PinHubError::retryable("dht_read", "checksum did not validate")) }
    }

    fn lcd_write(
        &self,
        _panel: &LcdPanel,
        line: u16,
        text: &str,
    ) -> impl Future<Output = Result<(), PinHubError>> + Send {
        self.state.lock().unwrap().lcd.insert(line, text.to_string());
        async { Ok(()) }
    }

    fn lcd_clear(&self, _panel: &LcdPanel) -> impl Future<Output = Result<(), PinHubError>> + Send {
        let mut state = self.state.lock().unwrap();
        state.lcd.clear();
        state.lcd_clears += 1;
        async { Ok(()) }
    }

    fn serial_write(
        &self,
        _link: &SerialLink,
        bytes: &[u8],
    ) -> impl Future<Output = Result<usize, PinHubError>> + Send {
        self.state.lock().unwrap().sent.extend_from_slice(bytes);
        let len = bytes.len();
        async move { Ok(len) }
    }

    fn serial_read(
        &self,
        _link: &SerialLink,
        max: usize,
        _timeout: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, PinHubError>> + Send {
        let mut state = self.state.lock().unwrap();
        let take = max.min(state.incoming.len());
        let bytes: Vec<u8> = state.incoming.drain(..take).collect();
        async { Ok(bytes) }
    }

    fn serial_readline(
        &self,
        _link: &SerialLink,
        _timeout: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, PinHubError>> + Send {
        let mut state = self.state.lock().unwrap();
        let end = state
            .incoming
            .iter()
            .position(|&b| b == b'\n')
            .map_or(state.incoming.len(), |i| i + 1);
        let bytes: Vec<u8> = state.incoming.drain(..end).collect();
        async { Ok(bytes) }
    }
}
