//! Sleep/wake cycle of the switch.
//!
//! The device sleeps until the sensor alert line or a sleep timeout wakes
//! it, then decides in [`Switch::step`] whether the wake-up is a new touch,
//! a repeat of a held touch or the end of a gesture:
//!
//! ```text
//!            alert                   timeout, still touched
//!   Idle ─────────────▶ Holding ───────────────────────────┐
//!    ▲                   │  ▲                              │
//!    │  timeout,         │  └──────── repeat event ────────┘
//!    └── released ───────┘
//!        (gesture sent)
//! ```

use drivers::mpr121::blocking::Mpr121;
use drivers::mpr121::{TouchSensorError, MPR121_ADDRESS};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info, warn};

use crate::gesture::Gesture;
use crate::power::{AlertFlag, Power};
use crate::protocol::{decode_frame, Frame, FrameError, Packet};
use crate::radio::{NodeRadio, GATEWAY_ID};
use crate::settings::{DeviceSettings, SettingsStore, SleepPeriod, Storage};
use crate::touch::TouchSequence;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HoldReason {
    Touch,
    Release,
    Proximity,
    Repeat,
}

impl From<HoldReason> for SleepPeriod {
    fn from(reason: HoldReason) -> Self {
        match reason {
            HoldReason::Touch => SleepPeriod::Touch,
            HoldReason::Release => SleepPeriod::Release,
            HoldReason::Proximity => SleepPeriod::Proximity,
            HoldReason::Repeat => SleepPeriod::Repeat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Waiting for the next touch
    Idle,
    /// A gesture is in progress
    Holding(HoldReason),
}

/// Outcome of one wake-up
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    Continue,
    /// The hub asked for a restart, or the settings changed.
    Restart,
}

pub struct Switch<'a, I2C, BUS, RADIO, STORE, POWER, DELAY> {
    touch: TouchSequence<I2C>,
    /// Secondary bus reachable through I2C packets
    bus: BUS,
    radio: RADIO,
    store: SettingsStore<STORE>,
    power: POWER,
    delay: DELAY,
    alert: &'a AlertFlag,
    settings: DeviceSettings,
    state: State,
    period: SleepPeriod,
    status_count: u16,
}

impl<'a, I2C, BUS, RADIO, STORE, POWER, DELAY> Switch<'a, I2C, BUS, RADIO, STORE, POWER, DELAY>
where
    I2C: I2c,
    BUS: I2c,
    RADIO: NodeRadio,
    STORE: Storage,
    POWER: Power,
    DELAY: DelayNs,
{
    pub fn new(
        sensor_bus: I2C,
        bus: BUS,
        radio: RADIO,
        storage: STORE,
        power: POWER,
        delay: DELAY,
        alert: &'a AlertFlag,
    ) -> Self {
        Self {
            touch: TouchSequence::new(Mpr121::new(sensor_bus, MPR121_ADDRESS)),
            bus,
            radio,
            store: SettingsStore::new(storage),
            power,
            delay,
            alert,
            settings: DeviceSettings::default(),
            state: State::Idle,
            period: SleepPeriod::Forever,
            status_count: 0,
        }
    }

    /// Loads the settings and brings up the radio and the touch sensor.
    pub fn start(&mut self) -> Result<(), TouchSensorError> {
        self.settings = self.store.load();

        self.radio.initialize(&self.settings.radio);
        self.sleep_radio();

        self.touch
            .begin(&self.settings.sensor, self.settings.electrodes)?;
        let regs = self.touch.sensor_mut().dump_registers()?;
        debug!("sensor registers {:02x?}", regs);
        self.touch.sleep()?;

        self.state = State::Idle;
        self.period = SleepPeriod::Forever;
        self.alert.arm();
        info!("switch {} started", self.settings.radio.node_id);
        Ok(())
    }

    /// Steps until a restart is requested.
    pub fn run(&mut self) {
        while self.step() == Step::Continue {}
    }

    /// Sleeps, then handles whatever woke the device.
    pub fn step(&mut self) -> Step {
        if !self.alert.is_pending() {
            debug!("sleep {:?}", self.period);
            self.power.sleep(self.settings.duration(self.period));
        }

        if self.radio.did_time_out() {
            if self.report_status() == Step::Restart {
                return Step::Restart;
            }
            // a status wake leaves the touch state as is
            if !self.alert.is_pending() {
                return Step::Continue;
            }
        }

        if self.alert.take() {
            self.on_alert();
            return Step::Continue;
        }

        match self.state {
            State::Idle => Step::Continue,
            State::Holding(_) if self.touch.is_touched() || self.touch.is_proximity() => {
                self.on_repeat();
                Step::Continue
            }
            State::Holding(_) => self.finalize(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn status_count(&self) -> u16 {
        self.status_count
    }

    fn hold(&mut self, reason: HoldReason) {
        self.state = State::Holding(reason);
        self.period = reason.into();
    }

    /// A touch or release raised the alert line.
    fn on_alert(&mut self) {
        if let Err(e) = self.touch.update() {
            warn!("touch update failed: {}", e);
        }
        let reason = if self.touch.is_touched() {
            HoldReason::Touch
        } else if self.touch.is_proximity() {
            HoldReason::Proximity
        } else {
            HoldReason::Release
        };
        if let Err(e) = self.touch.wake_up() {
            warn!("sensor wake up failed: {}", e);
        }
        self.alert.arm();
        self.hold(reason);
    }

    /// Woke up by timeout while the plate is still touched.
    fn on_repeat(&mut self) {
        if let Err(e) = self.touch.update() {
            warn!("touch update failed: {}", e);
        }
        debug!("repeat");
        // repeat events are not acknowledged
        if let Some(packet) = self.touch_event(true) {
            self.radio.wake_up();
            self.send(&packet, false);
            self.sleep_radio();
        }
        self.hold(HoldReason::Repeat);
    }

    /// Woke up by timeout after the release; the gesture is complete.
    fn finalize(&mut self) -> Step {
        self.alert.disarm();
        let step = match self.touch_event(false) {
            Some(packet) => self.send_with_reply(&packet),
            None => Step::Continue,
        };
        self.touch.clear();
        if let Err(e) = self.touch.sleep() {
            warn!("sensor sleep failed: {}", e);
        }
        self.alert.arm();
        self.state = State::Idle;
        self.period = SleepPeriod::Forever;
        debug!("touch done");
        step
    }

    fn touch_event(&self, repeat: bool) -> Option<Packet> {
        let gesture = self.touch.gesture();
        if gesture == Gesture::Unknown {
            debug!("no gesture");
            return None;
        }
        let electrode = self.touch.last_touch();
        info!("{:?} on electrode {} (repeat: {})", gesture, electrode, repeat);
        Some(Packet::TouchEvent {
            gesture,
            electrode,
            repeat,
        })
    }

    fn status_packet(&mut self) -> Packet {
        self.status_count = self.status_count.wrapping_add(1);
        let packet = Packet::StatusUpdate {
            battery_level: self.power.battery_millivolts(),
            status_count: self.status_count,
        };
        debug!("status {:?}", packet);
        packet
    }

    /// Battery report requesting an ACK, so the hub can piggyback queued
    /// commands on it.
    fn report_status(&mut self) -> Step {
        let packet = self.status_packet();
        self.send_with_reply(&packet)
    }

    /// Unacknowledged battery report, sent while the radio is awake.
    fn send_status(&mut self) {
        let packet = self.status_packet();
        self.radio.wake_up();
        self.send(&packet, false);
    }

    fn send_with_reply(&mut self, packet: &Packet) -> Step {
        self.radio.wake_up();
        if self.send(packet, true) {
            return self.wait_for_reply();
        }
        self.sleep_radio();
        Step::Continue
    }

    fn send(&mut self, packet: &Packet, request_ack: bool) -> bool {
        let frame = match packet.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("cannot encode {:?}: {}", packet.packet_type(), e);
                return false;
            }
        };
        let sent = self.radio.send(GATEWAY_ID, &frame, request_ack);
        if !sent {
            warn!("send of {:?} failed", packet.packet_type());
        }
        sent
    }

    /// Polls for the ACK of the last send for at most `reply_wake_lock` ms,
    /// handles its payload and puts the radio back to sleep.
    fn wait_for_reply(&mut self) -> Step {
        let step = match self.poll_ack() {
            Some(frame) => {
                // replies may reconfigure the sensor
                let armed = self.alert.is_armed();
                self.alert.disarm();
                let step = self.handle_reply(&frame);
                if armed && step == Step::Continue {
                    self.alert.arm();
                }
                step
            }
            None => {
                debug!("no ACK received");
                Step::Continue
            }
        };
        self.sleep_radio();
        step
    }

    fn poll_ack(&mut self) -> Option<Frame> {
        let timeout_ms = u32::from(self.settings.sleep.reply_wake_lock);
        let mut elapsed_ms = 0;
        loop {
            if let Some(frame) = self.radio.ack_received(GATEWAY_ID) {
                return Some(frame);
            }
            if elapsed_ms >= timeout_ms {
                return None;
            }
            self.delay.delay_ms(1);
            elapsed_ms += 1;
        }
    }

    fn handle_reply(&mut self, frame: &[u8]) -> Step {
        let mut dirty = false;
        for item in decode_frame(frame) {
            let packet = match item {
                Ok(packet) => packet,
                Err(e @ FrameError::Corrupt { .. }) => {
                    warn!("reply: {}", e);
                    break;
                }
                Err(e) => {
                    warn!("reply: {}", e);
                    continue;
                }
            };

            match packet {
                Packet::Ping => debug!("ping"),
                Packet::StatusRequest => self.send_status(),
                Packet::Configure { offset, value } => {
                    if self.settings.set_byte(offset, value) {
                        debug!("set {:#04x} = {:#04x}", offset, value);
                        dirty = true;
                    } else {
                        warn!("configure offset {} out of range", offset);
                    }
                }
                Packet::DumpRequest => {
                    let settings = self.store.read_blob();
                    self.send(&Packet::DumpReply { settings }, false);
                }
                Packet::Reset { reset_settings } => {
                    if reset_settings {
                        info!("resetting settings");
                        self.store.invalidate();
                    } else if dirty {
                        self.store.save(&self.settings);
                    }
                    info!("reset");
                    return Step::Restart;
                }
                Packet::I2CRequest { address, register } => {
                    match self.read_i2c(address, register) {
                        Ok(value) => {
                            let reply = Packet::I2CReply {
                                address,
                                register,
                                value,
                            };
                            self.send(&reply, false);
                        }
                        Err(e) => warn!("i2c read {:#04x}:{:#04x} failed: {}", address, register, e),
                    }
                }
                Packet::I2CSet {
                    address,
                    register,
                    value,
                } => {
                    if let Err(e) = self.write_i2c(address, register, value) {
                        warn!("i2c write {:#04x}:{:#04x} failed: {}", address, register, e);
                    }
                }
                other => warn!("unexpected {:?} in reply", other.packet_type()),
            }
        }

        if dirty {
            self.store.save(&self.settings);
            return Step::Restart;
        }
        Step::Continue
    }

    fn read_i2c(&mut self, address: u8, register: u8) -> Result<u8, TouchSensorError> {
        let sensor = self.touch.sensor_mut();
        if address == sensor.address() {
            return sensor.read_register(register);
        }
        let mut buf = [0u8];
        self.bus.write_read(address, &[register], &mut buf)?;
        Ok(buf[0])
    }

    fn write_i2c(&mut self, address: u8, register: u8, value: u8) -> Result<(), TouchSensorError> {
        let sensor = self.touch.sensor_mut();
        if address == sensor.address() {
            return sensor.write_register(register, value);
        }
        self.bus.write(address, &[register, value])?;
        Ok(())
    }

    fn sleep_radio(&mut self) {
        self.radio.sleep(
            self.settings.sleep.status_interval,
            self.settings.sleep.status_scaler,
        );
    }
}
