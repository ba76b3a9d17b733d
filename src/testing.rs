//! In-memory collaborators for host tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation};

use crate::power::{AlertFlag, Power, SleepDuration};
use crate::protocol::Frame;
use crate::radio::{GatewayRadio, Inbound, NodeRadio, GATEWAY_ID};
use crate::settings::{RadioSettings, Storage};

/// Auto-incrementing register file answering on every address.
pub struct FakeBus {
    pub regs: [u8; 256],
    /// `(address, register, value)` in write order
    pub writes: Vec<(u8, u8, u8)>,
    pub fail: bool,
    /// Alert line pulsed on every register write
    pub alert_on_write: Option<Arc<AlertFlag>>,
    pointer: u8,
}

impl FakeBus {
    pub fn new() -> Self {
        Self {
            regs: [0; 256],
            writes: Vec::new(),
            fail: false,
            alert_on_write: None,
            pointer: 0,
        }
    }

    pub fn set_touch_status(&mut self, status: u16) {
        let [low, high] = status.to_le_bytes();
        self.regs[0x00] = low;
        self.regs[0x01] = high;
    }
}

impl ErrorType for FakeBus {
    type Error = ErrorKind;
}

impl I2c for FakeBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.fail {
            return Err(ErrorKind::Other);
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    if let Some((first, rest)) = bytes.split_first() {
                        self.pointer = *first;
                        for value in rest {
                            self.regs[self.pointer as usize] = *value;
                            self.writes.push((address, self.pointer, *value));
                            if let Some(alert) = &self.alert_on_write {
                                alert.on_interrupt();
                            }
                            self.pointer = self.pointer.wrapping_add(1);
                        }
                    }
                }
                Operation::Read(buffer) => {
                    for byte in buffer.iter_mut() {
                        *byte = self.regs[self.pointer as usize];
                        self.pointer = self.pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

pub struct FakeStorage {
    pub mem: [u8; 256],
    pub writes: Vec<(u16, u8)>,
}

impl FakeStorage {
    /// Erased memory
    pub fn blank() -> Self {
        Self {
            mem: [0xFF; 256],
            writes: Vec::new(),
        }
    }
}

impl Storage for FakeStorage {
    fn read(&mut self, address: u16) -> u8 {
        self.mem[address as usize]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.mem[address as usize] = value;
        self.writes.push((address, value));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub to: u8,
    pub payload: Vec<u8>,
    pub request_ack: bool,
}

#[derive(Default)]
pub struct FakeRadio {
    pub settings: Option<RadioSettings>,
    pub awake: bool,
    pub sleeps: usize,
    pub timed_out: bool,
    pub sent: Vec<Sent>,
    /// ACK payloads handed out by `ack_received`, one per call
    pub replies: VecDeque<Frame>,
    pub polls: usize,
}

impl NodeRadio for FakeRadio {
    fn initialize(&mut self, settings: &RadioSettings) {
        self.settings = Some(*settings);
    }

    fn wake_up(&mut self) {
        self.awake = true;
    }

    fn sleep(&mut self, _interval: u8, _scaler: u8) {
        self.awake = false;
        self.sleeps += 1;
    }

    fn did_time_out(&mut self) -> bool {
        core::mem::take(&mut self.timed_out)
    }

    fn send(&mut self, to: u8, payload: &[u8], request_ack: bool) -> bool {
        self.awake = true;
        self.sent.push(Sent {
            to,
            payload: payload.to_vec(),
            request_ack,
        });
        true
    }

    fn ack_received(&mut self, from: u8) -> Option<Frame> {
        self.polls += 1;
        if from != GATEWAY_ID {
            return None;
        }
        self.replies.pop_front()
    }
}

#[derive(Default)]
pub struct FakeGateway {
    pub inbound: VecDeque<Inbound>,
    pub acks: Vec<(u8, Vec<u8>)>,
}

impl GatewayRadio for FakeGateway {
    fn receive(&mut self) -> Option<Inbound> {
        self.inbound.pop_front()
    }

    fn send_ack(&mut self, to: u8, payload: &[u8]) {
        self.acks.push((to, payload.to_vec()));
    }
}

pub struct FakePower {
    pub sleeps: Vec<SleepDuration>,
    pub millivolts: u32,
}

impl FakePower {
    pub fn new(millivolts: u32) -> Self {
        Self {
            sleeps: Vec::new(),
            millivolts,
        }
    }
}

impl Power for FakePower {
    fn sleep(&mut self, duration: SleepDuration) {
        self.sleeps.push(duration);
    }

    fn battery_millivolts(&mut self) -> u32 {
        self.millivolts
    }
}

/// Delay that returns immediately and counts the requested time.
#[derive(Default)]
pub struct NoopDelay {
    pub elapsed_ns: u64,
}

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }
}
