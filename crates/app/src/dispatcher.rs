//! Command dispatcher: one handler per command variant.
//!
//! [`Dispatcher::handle`] is the whole request/response contract: it never
//! fails, every error ends up as a `success: false` object. Sequences and
//! routines re-enter [`Dispatcher::execute`] through the interpreter.

use std::time::Duration;

use pinhub_domain::command::Command;
use pinhub_domain::device::{Device, Identifier, PinAddress};
use pinhub_domain::error::{InvalidValue, PinHubError};
use pinhub_domain::hardware::{BackendProbe, DhtModel, Encoding, LcdPanel, PinMode, SerialLink, round1};
use pinhub_domain::sequence::Step;
use serde_json::{Value, json};
use tokio::time::{Instant, sleep};

use crate::pin_driver::{PinDriver, SERVO_FREQUENCY_HZ, servo_duty_cycle};
use crate::ports::{ConfigStore, Peripherals, PinIo};
use crate::response::{Failure, Fields, Outcome, to_response};
use crate::services::device_registry::DeviceRegistry;
use crate::services::routine_service::RoutineService;

/// Turn a `json!` object literal into response fields.
fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

fn seconds(field: &'static str, value: f64) -> Result<Duration, PinHubError> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        InvalidValue::OutOfRange {
            field,
            expected: "a representable number of seconds",
            value: value.to_string(),
        }
        .into()
    })
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Resolved target of a pin command plus what every result reports about it.
struct Target {
    address: PinAddress,
    label: String,
}

impl Target {
    fn fields(&self) -> Fields {
        fields(json!({
            "pin": self.address.pin(),
            "device": self.label,
            "description": self.address.description(),
        }))
    }

    /// Wrap an error with the pin it happened on.
    fn fail(&self, error: PinHubError) -> Failure {
        Failure::new(error)
            .with("pin", self.address.pin())
            .with("device", self.label.as_str())
    }
}

/// Executes parsed commands against the registry, the routine store and the
/// pin backends.
pub struct Dispatcher<S, P, X> {
    devices: DeviceRegistry<S>,
    routines: RoutineService<S>,
    driver: PinDriver<P>,
    peripherals: X,
    probes: Vec<BackendProbe>,
}

impl<S, P, X> Dispatcher<S, P, X>
where
    S: ConfigStore + Clone,
    P: PinIo,
    X: Peripherals,
{
    /// Wire a dispatcher. `list_backends` reports only `pins` until
    /// [`Self::with_backend_probes`] is called.
    pub fn new(store: S, pins: P, peripherals: X) -> Self {
        let probes = vec![BackendProbe {
            name: pins.backend().to_string(),
            available: true,
            persistent: pins.persistent(),
        }];
        Self {
            devices: DeviceRegistry::new(store.clone()),
            routines: RoutineService::new(store),
            driver: PinDriver::new(pins),
            peripherals,
            probes,
        }
    }

    /// Replace the backend availability report.
    #[must_use]
    pub fn with_backend_probes(mut self, probes: Vec<BackendProbe>) -> Self {
        self.probes = probes;
        self
    }

    /// Run one request and produce its response object.
    #[tracing::instrument(skip_all, fields(command = tracing::field::Empty))]
    pub async fn handle(&self, request: &Value) -> Value {
        let outcome = match Command::parse(request, 0) {
            Ok(command) => {
                tracing::Span::current().record("command", command.name());
                self.execute(command, 0).await
            }
            Err(err) => Err(err.into()),
        };
        if let Err(failure) = &outcome {
            tracing::warn!(error = %failure.error, "command failed");
        }
        to_response(outcome)
    }

    /// Execute a parsed command at the given nesting depth.
    #[allow(clippy::too_many_lines)]
    pub async fn execute(&self, command: Command, depth: usize) -> Outcome {
        tracing::debug!(command = command.name(), depth, "executing");
        match command {
            Command::Activate { target } => self.write_level(&target, true).await,
            Command::Deactivate { target } => self.write_level(&target, false).await,
            Command::Toggle { target } => self.toggle(&target).await,
            Command::Read { target } => self.read(&target).await,
            Command::ReadAll => self.read_all().await,
            Command::Set { target, level } => self.set_level(&target, level).await,
            Command::Blink {
                target,
                times,
                on_ms,
                off_ms,
            } => self.blink(&target, times, on_ms, off_ms).await,
            Command::Pulse {
                target,
                duration_ms,
            } => self.pulse(&target, duration_ms).await,
            Command::WaitFor {
                target,
                state,
                timeout_s,
                poll_ms,
            } => self.wait_for(&target, state, timeout_s, poll_ms).await,
            Command::SetAngle { target, angle } => self.set_angle(&target, angle).await,
            Command::SetMode { target, mode } => self.set_mode(&target, mode).await,
            Command::DhtRead { target, model } => self.dht_read(&target, model).await,
            Command::LcdPrint { panel, text, line } => self.lcd_print(&panel, &text, line).await,
            Command::LcdClear { panel } => {
                self.peripherals.lcd_clear(&panel).await?;
                Ok(fields(json!({"mode": panel.bus.mode()})))
            }
            Command::SerialWrite {
                link,
                data,
                encoding,
            } => self.serial_write(&link, &data, encoding).await,
            Command::SerialRead {
                link,
                length,
                timeout_s,
                encoding,
            } => self.serial_read(&link, length, timeout_s, encoding).await,
            Command::SerialReadline {
                link,
                timeout_s,
                encoding,
            } => self.serial_readline(&link, timeout_s, encoding).await,
            Command::Sequence { steps } => self.run_sequence(&steps).await,
            Command::SaveRoutine {
                name,
                description,
                steps,
            } => {
                let count = steps.len();
                let replaced = self.routines.save(&name, &description, steps).await?;
                Ok(fields(json!({
                    "saved_routine": name,
                    "steps": count,
                    "replaced": replaced,
                })))
            }
            Command::RunRoutine { name } => self.run_routine(&name, depth).await,
            Command::DeleteRoutine { name } => {
                let deleted = self.routines.delete(&name).await?;
                Ok(fields(json!({"deleted_routine": name, "deleted": deleted})))
            }
            Command::ListRoutines => {
                let routines = self.routines.list().await?;
                let summaries: Vec<Value> = routines.iter().map(|r| r.summary()).collect();
                Ok(fields(json!({"routines": summaries})))
            }
            Command::Rename { target, new_name } => {
                let device = self.devices.rename(&target, &new_name).await?;
                Ok(fields(json!({
                    "renamed_to": device.name,
                    "pin": device.pin,
                    "description": device.description,
                })))
            }
            Command::Register(device) => self.register(device).await,
            Command::Unregister { target } => {
                let removed = self.devices.unregister(&target).await?;
                let mut out = fields(json!({"removed": removed.is_some()}));
                match removed {
                    Some(device) => {
                        out.insert("unregistered".into(), device.name.into());
                        out.insert("pin".into(), device.pin.into());
                    }
                    None => {
                        out.insert("unregistered".into(), target.to_string().into());
                    }
                }
                Ok(out)
            }
            Command::ListDevices => {
                let devices = self.devices.list().await?;
                let summaries: Vec<Value> = devices.iter().map(Device::summary).collect();
                Ok(fields(json!({"devices": summaries})))
            }
            Command::ListBackends => Ok(self.list_backends()),
        }
    }

    async fn target(&self, identifier: &Identifier) -> Result<Target, Failure> {
        let address = self.devices.resolve(identifier).await?;
        Ok(Target {
            address,
            label: identifier.to_string(),
        })
    }

    async fn write_level(&self, identifier: &Identifier, on: bool) -> Outcome {
        let target = self.target(identifier).await?;
        let value = self
            .driver
            .write(&target.address, on)
            .await
            .map_err(|e| target.fail(e))?;
        let mut out = target.fields();
        out.insert("value".into(), value.into());
        out.insert("backend".into(), self.driver.backend().into());
        Ok(out)
    }

    async fn toggle(&self, identifier: &Identifier) -> Outcome {
        let target = self.target(identifier).await?;
        let previous = self
            .driver
            .read(&target.address)
            .await
            .map_err(|e| target.fail(e))?;
        let value = self
            .driver
            .write(&target.address, !previous)
            .await
            .map_err(|e| target.fail(e))?;
        let mut out = target.fields();
        out.insert("previous".into(), previous.into());
        out.insert("value".into(), value.into());
        out.insert("backend".into(), self.driver.backend().into());
        Ok(out)
    }

    async fn read(&self, identifier: &Identifier) -> Outcome {
        let target = self.target(identifier).await?;
        let value = self
            .driver
            .read(&target.address)
            .await
            .map_err(|e| target.fail(e))?;
        let mut out = target.fields();
        out.insert("value".into(), value.into());
        out.insert("backend".into(), self.driver.backend().into());
        Ok(out)
    }

    /// Read every input and sensor; one failing device does not stop the batch.
    async fn read_all(&self) -> Outcome {
        let devices = self.devices.list().await?;
        let mut readings = Fields::new();
        let mut errors = Fields::new();
        for device in devices.into_iter().filter(|d| d.kind.is_readable()) {
            let name = device.name.clone();
            let address = PinAddress::Registered(device);
            match self.driver.read(&address).await {
                Ok(value) => {
                    readings.insert(
                        name,
                        json!({
                            "value": value,
                            "pin": address.pin(),
                            "description": address.description(),
                        }),
                    );
                }
                Err(err) => {
                    tracing::warn!(device = %name, error = %err, "read failed");
                    errors.insert(name, err.to_string().into());
                }
            }
        }
        let mut out = fields(json!({"readings": readings}));
        if !errors.is_empty() {
            out.insert("errors".into(), Value::Object(errors));
        }
        Ok(out)
    }

    async fn set_level(&self, identifier: &Identifier, level: f64) -> Outcome {
        let target = self.target(identifier).await?;
        let frequency = target.address.frequency();
        self.driver
            .pwm(&target.address, level, frequency)
            .await
            .map_err(|e| target.fail(e))?;
        let mut out = target.fields();
        out.insert("duty_cycle".into(), level.into());
        out.insert("frequency".into(), frequency.into());
        out.insert("backend".into(), self.driver.backend().into());
        Ok(out)
    }

    async fn blink(&self, identifier: &Identifier, times: u32, on_ms: u64, off_ms: u64) -> Outcome {
        let target = self.target(identifier).await?;
        for cycle in 0..times {
            let failed = |e| target.fail(e).with("completed_cycles", cycle);
            self.driver.write(&target.address, true).await.map_err(failed)?;
            sleep(Duration::from_millis(on_ms)).await;
            self.driver.write(&target.address, false).await.map_err(failed)?;
            if cycle + 1 < times {
                sleep(Duration::from_millis(off_ms)).await;
            }
        }
        let mut out = target.fields();
        out.insert("times".into(), times.into());
        out.insert("on_ms".into(), on_ms.into());
        out.insert("off_ms".into(), off_ms.into());
        Ok(out)
    }

    async fn pulse(&self, identifier: &Identifier, duration_ms: u64) -> Outcome {
        let target = self.target(identifier).await?;
        self.driver
            .write(&target.address, true)
            .await
            .map_err(|e| target.fail(e))?;
        sleep(Duration::from_millis(duration_ms)).await;
        self.driver
            .write(&target.address, false)
            .await
            .map_err(|e| target.fail(e))?;
        let mut out = target.fields();
        out.insert("duration_ms".into(), duration_ms.into());
        Ok(out)
    }

    /// Poll until the pin reads `state`. The first read happens before any
    /// sleep and no sleep runs past the deadline.
    async fn wait_for(&self, identifier: &Identifier, state: bool, timeout_s: f64, poll_ms: u64) -> Outcome {
        let target = self.target(identifier).await?;
        let timeout = seconds("timeout_s", timeout_s)?;
        let poll = Duration::from_millis(poll_ms);
        let started = Instant::now();
        let Some(deadline) = started.checked_add(timeout) else {
            return Err(PinHubError::from(InvalidValue::OutOfRange {
                field: "timeout_s",
                expected: "a representable number of seconds",
                value: timeout_s.to_string(),
            })
            .into());
        };

        loop {
            let value = self
                .driver
                .read(&target.address)
                .await
                .map_err(|e| target.fail(e))?;
            if value == state {
                let mut out = target.fields();
                out.insert("value".into(), state.into());
                out.insert(
                    "elapsed_s".into(),
                    round3(started.elapsed().as_secs_f64()).into(),
                );
                return Ok(out);
            }
            let now = Instant::now();
            if now >= deadline {
                let expected = if state { "HIGH" } else { "LOW" };
                return Err(target
                    .fail(PinHubError::Timeout {
                        timeout_s,
                        expected,
                    })
                    .with("timeout_s", timeout_s));
            }
            sleep(poll.min(deadline - now)).await;
        }
    }

    async fn set_angle(&self, identifier: &Identifier, angle: f64) -> Outcome {
        let target = self.target(identifier).await?;
        let duty_cycle = servo_duty_cycle(angle);
        self.driver
            .pwm(&target.address, duty_cycle, SERVO_FREQUENCY_HZ)
            .await
            .map_err(|e| target.fail(e))?;
        let mut out = target.fields();
        out.insert("angle".into(), angle.into());
        out.insert("duty_cycle".into(), duty_cycle.into());
        out.insert("frequency".into(), SERVO_FREQUENCY_HZ.into());
        Ok(out)
    }

    async fn set_mode(&self, identifier: &Identifier, mode: PinMode) -> Outcome {
        let target = self.target(identifier).await?;
        self.driver
            .set_direction(&target.address, mode)
            .await
            .map_err(|e| target.fail(e))?;
        let mut out = target.fields();
        out.insert("mode".into(), mode.as_str().into());
        out.insert("backend".into(), self.driver.backend().into());
        Ok(out)
    }

    async fn dht_read(&self, identifier: &Identifier, model: DhtModel) -> Outcome {
        let target = self.target(identifier).await?;
        let reading = self
            .peripherals
            .read_dht(target.address.pin(), model)
            .await
            .map_err(|e| target.fail(e))?;
        Ok(fields(json!({
            "pin": target.address.pin(),
            "device": target.label,
            "sensor_type": model.as_str(),
            "temperature_c": round1(reading.temperature_c),
            "temperature_f": round1(reading.temperature_f()),
            "humidity_pct": round1(reading.humidity_pct),
        })))
    }

    async fn lcd_print(&self, panel: &LcdPanel, text: &str, line: u16) -> Outcome {
        let fitted = panel.fit(text);
        self.peripherals.lcd_write(panel, line, &fitted).await?;
        Ok(fields(json!({
            "mode": panel.bus.mode(),
            "line": line,
            "cols": panel.cols,
            "rows": panel.rows,
            "text": fitted.trim_end(),
        })))
    }

    async fn serial_write(&self, link: &SerialLink, data: &str, encoding: Encoding) -> Outcome {
        let bytes = encoding.encode(data).map_err(PinHubError::from)?;
        let sent = self.peripherals.serial_write(link, &bytes).await?;
        Ok(fields(json!({
            "port": link.port,
            "baud": link.baud,
            "bytes_sent": sent,
            "data": data,
        })))
    }

    async fn serial_read(&self, link: &SerialLink, length: usize, timeout_s: f64, encoding: Encoding) -> Outcome {
        let timeout = seconds("timeout_s", timeout_s)?;
        let bytes = self.peripherals.serial_read(link, length, timeout).await?;
        Ok(fields(json!({
            "port": link.port,
            "baud": link.baud,
            "bytes_received": bytes.len(),
            "data": encoding.decode(&bytes),
        })))
    }

    async fn serial_readline(&self, link: &SerialLink, timeout_s: f64, encoding: Encoding) -> Outcome {
        let timeout = seconds("timeout_s", timeout_s)?;
        let bytes = self
            .peripherals
            .serial_readline(link, timeout)
            .await
            .map_err(|e| Failure::new(e).with("port", link.port.as_str()))?;
        let text = encoding.decode(&bytes);
        let line = text.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(Failure::new(PinHubError::retryable(
                "serial_readline",
                format!("no line received within {timeout_s}s"),
            ))
            .with("port", link.port.as_str()));
        }
        Ok(fields(json!({
            "port": link.port,
            "baud": link.baud,
            "data": line,
            "bytes_received": bytes.len(),
        })))
    }

    async fn register(&self, device: Device) -> Outcome {
        let summary = fields(json!({
            "registered": device.name,
            "pin": device.pin,
            "type": device.kind,
            "description": device.description,
        }));
        let registration = self.devices.register(device).await?;
        let mut out = summary;
        out.insert("replaced".into(), registration.replaced.is_some().into());
        if let Some(displaced) = registration.displaced {
            out.insert("displaced".into(), displaced.into());
        }
        Ok(out)
    }

    async fn run_routine(&self, name: &str, depth: usize) -> Outcome {
        let routine = self.routines.find(name).await?;
        let steps = Step::parse_all(&routine.steps, depth + 1)
            .map_err(|e| Failure::new(e).with("routine", name))?;
        match self.run_sequence(&steps).await {
            Ok(mut out) => {
                out.insert("routine".into(), name.into());
                Ok(out)
            }
            Err(failure) => Err(failure.with("routine", name)),
        }
    }

    fn list_backends(&self) -> Fields {
        let recommended = self
            .probes
            .iter()
            .find(|p| p.available && p.persistent)
            .or_else(|| self.probes.iter().find(|p| p.available))
            .map_or_else(|| self.driver.backend().to_string(), |p| p.name.clone());
        fields(json!({
            "backends": self.probes,
            "active_backend": self.driver.backend(),
            "persistent": self.driver.persistent(),
            "recommended_backend": recommended,
        }))
    }
}
