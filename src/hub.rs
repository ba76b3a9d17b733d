//! Hub side of the link: turns switch frames into events and delivers
//! queued commands on the ACK of the addressed switch.

use log::{debug, info, warn};

use crate::gesture::Gesture;
use crate::protocol::{decode_frame, CommandBuffer, CommandError, FrameError, Packet, PacketType};
use crate::radio::GatewayRadio;
use crate::settings::SETTINGS_SIZE;

/// Something a switch reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HubEvent {
    Touch {
        node: u8,
        gesture: Gesture,
        electrode: u8,
        repeat: bool,
    },
    Status {
        node: u8,
        battery_level: u32,
        status_count: u16,
    },
    SettingsDump {
        node: u8,
        settings: [u8; SETTINGS_SIZE],
    },
    I2cValue {
        node: u8,
        address: u8,
        register: u8,
        value: u8,
    },
    /// A packet only the hub sends
    Unexpected { node: u8, packet_type: PacketType },
    Protocol { node: u8, error: FrameError },
}

/// Acknowledgement of a queued command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Queued {
    pub node: u8,
    pub packet: Packet,
}

pub struct Hub<R> {
    radio: R,
    commands: CommandBuffer,
}

impl<R> Hub<R>
where
    R: GatewayRadio,
{
    pub fn new(radio: R) -> Self {
        Self {
            radio,
            commands: CommandBuffer::new(),
        }
    }

    /// Restarts the switch, `hard` also discards its stored settings.
    pub fn reset(&mut self, node: u8, hard: bool) -> Result<Queued, CommandError> {
        self.issue(
            node,
            Packet::Reset {
                reset_settings: hard,
            },
        )
    }

    pub fn dump_settings(&mut self, node: u8) -> Result<Queued, CommandError> {
        self.issue(node, Packet::DumpRequest)
    }

    pub fn set_config_byte(
        &mut self,
        node: u8,
        offset: u8,
        value: u8,
    ) -> Result<Queued, CommandError> {
        self.issue(node, Packet::Configure { offset, value })
    }

    pub fn get_i2c(&mut self, node: u8, address: u8, register: u8) -> Result<Queued, CommandError> {
        self.issue(node, Packet::I2CRequest { address, register })
    }

    pub fn set_i2c(
        &mut self,
        node: u8,
        address: u8,
        register: u8,
        value: u8,
    ) -> Result<Queued, CommandError> {
        self.issue(
            node,
            Packet::I2CSet {
                address,
                register,
                value,
            },
        )
    }

    pub fn request_status(&mut self, node: u8) -> Result<Queued, CommandError> {
        self.issue(node, Packet::StatusRequest)
    }

    fn issue(&mut self, node: u8, packet: Packet) -> Result<Queued, CommandError> {
        if self.commands.target().is_some_and(|target| target != node) {
            warn!(
                "discarding commands for node {:?}",
                self.commands.target()
            );
        }
        self.commands.queue(node, &packet)?;
        debug!("queued {:?} for node {}", packet.packet_type(), node);
        Ok(Queued { node, packet })
    }

    /// Handles one received frame, if any. Returns whether a frame was
    /// received.
    pub fn poll<F>(&mut self, mut sink: F) -> bool
    where
        F: FnMut(HubEvent),
    {
        let Some(inbound) = self.radio.receive() else {
            return false;
        };
        let node = inbound.sender;
        if !inbound.crc_ok {
            debug!("dropping frame from node {}: bad CRC", node);
            return true;
        }

        for item in decode_frame(&inbound.payload) {
            sink(match item {
                Ok(packet) => event(node, packet),
                Err(error) => {
                    warn!("node {}: {}", node, error);
                    HubEvent::Protocol { node, error }
                }
            });
        }

        if inbound.ack_requested {
            match self.commands.flush_on_ack(node) {
                Some(frame) => {
                    info!("sending {} command bytes to node {}", frame.len(), node);
                    self.radio.send_ack(node, &frame);
                }
                None => self.radio.send_ack(node, &[]),
            }
        }
        true
    }

    pub fn commands(&self) -> &CommandBuffer {
        &self.commands
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }
}

fn event(node: u8, packet: Packet) -> HubEvent {
    match packet {
        Packet::TouchEvent {
            gesture,
            electrode,
            repeat,
        } => HubEvent::Touch {
            node,
            gesture,
            electrode,
            repeat,
        },
        Packet::StatusUpdate {
            battery_level,
            status_count,
        } => HubEvent::Status {
            node,
            battery_level,
            status_count,
        },
        Packet::DumpReply { settings } => HubEvent::SettingsDump { node, settings },
        Packet::I2CReply {
            address,
            register,
            value,
        } => HubEvent::I2cValue {
            node,
            address,
            register,
            value,
        },
        other => HubEvent::Unexpected {
            node,
            packet_type: other.packet_type(),
        },
    }
}
