//! Binary packet protocol shared by switches and the hub.
//!
//! Every packet starts with a two byte header, `[type][length]`, where
//! `length` is the encoded size including the header. Packets are
//! concatenated into radio frames of at most [`FRAME_CAPACITY`] bytes.
//!
//! ```text
//! | type | length | payload ...           | type | length | ...
//! |  u8  |   u8   | length - 2 bytes, LE  |
//! ```

use core::fmt::{self, Display, Formatter};

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::gesture::Gesture;
use crate::settings::SETTINGS_SIZE;

mod commands;
mod cursor;
mod frame;

pub use commands::{CommandBuffer, CommandError};
pub use cursor::{Reader, Writer};
pub use frame::{decode_frame, FrameDecoder, FrameError};

/// Maximum radio payload
pub const FRAME_CAPACITY: usize = 66;

/// `[type][length]`
pub const HEADER_LEN: usize = 2;

/// One radio payload of concatenated packets.
pub type Frame = heapless::Vec<u8, FRAME_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketType {
    TouchEvent = 0,
    StatusUpdate = 1,
    Reset = 2,
    Configure = 3,
    Ping = 4,
    DumpRequest = 5,
    DumpReply = 6,
    StatusRequest = 7,
    I2CRequest = 8,
    I2CReply = 9,
    I2CSet = 10,
}

impl PacketType {
    /// Encoded size including the header.
    pub const fn encoded_len(self) -> usize {
        HEADER_LEN
            + match self {
                PacketType::TouchEvent => 3,
                PacketType::StatusUpdate => 6,
                PacketType::Reset => 1,
                PacketType::Configure => 2,
                PacketType::Ping | PacketType::DumpRequest | PacketType::StatusRequest => 0,
                PacketType::DumpReply => SETTINGS_SIZE,
                PacketType::I2CRequest => 2,
                PacketType::I2CReply | PacketType::I2CSet => 3,
            }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Packet {
    TouchEvent {
        gesture: Gesture,
        electrode: u8,
        repeat: bool,
    },
    StatusUpdate {
        /// Battery voltage in millivolts
        battery_level: u32,
        status_count: u16,
    },
    Reset {
        /// Invalidate the stored settings before restarting
        reset_settings: bool,
    },
    Configure {
        offset: u8,
        value: u8,
    },
    Ping,
    DumpRequest,
    DumpReply {
        settings: [u8; SETTINGS_SIZE],
    },
    StatusRequest,
    I2CRequest {
        address: u8,
        register: u8,
    },
    I2CReply {
        address: u8,
        register: u8,
        value: u8,
    },
    I2CSet {
        address: u8,
        register: u8,
        value: u8,
    },
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::TouchEvent { .. } => PacketType::TouchEvent,
            Packet::StatusUpdate { .. } => PacketType::StatusUpdate,
            Packet::Reset { .. } => PacketType::Reset,
            Packet::Configure { .. } => PacketType::Configure,
            Packet::Ping => PacketType::Ping,
            Packet::DumpRequest => PacketType::DumpRequest,
            Packet::DumpReply { .. } => PacketType::DumpReply,
            Packet::StatusRequest => PacketType::StatusRequest,
            Packet::I2CRequest { .. } => PacketType::I2CRequest,
            Packet::I2CReply { .. } => PacketType::I2CReply,
            Packet::I2CSet { .. } => PacketType::I2CSet,
        }
    }

    pub fn encoded_len(&self) -> usize {
        self.packet_type().encoded_len()
    }

    /// Encodes into the front of `buf`, returning the number of bytes written.
    /// Nothing is written when `buf` is too small.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        let len = self.encoded_len();
        let slot = buf.get_mut(..len).ok_or(ProtocolError::BufferTooSmall)?;
        let mut w = Writer::new(slot);
        w.write_u8(self.packet_type().into())?;
        w.write_u8(len as u8)?;
        match *self {
            Packet::TouchEvent {
                gesture,
                electrode,
                repeat,
            } => {
                w.write_u8(gesture.into())?;
                w.write_u8(electrode)?;
                w.write_u8(repeat as u8)?;
            }
            Packet::StatusUpdate {
                battery_level,
                status_count,
            } => {
                w.write_u32(battery_level)?;
                w.write_u16(status_count)?;
            }
            Packet::Reset { reset_settings } => w.write_u8(reset_settings as u8)?,
            Packet::Configure { offset, value } => {
                w.write_u8(offset)?;
                w.write_u8(value)?;
            }
            Packet::Ping | Packet::DumpRequest | Packet::StatusRequest => {}
            Packet::DumpReply { ref settings } => w.write_bytes(settings)?,
            Packet::I2CRequest { address, register } => {
                w.write_u8(address)?;
                w.write_u8(register)?;
            }
            Packet::I2CReply {
                address,
                register,
                value,
            }
            | Packet::I2CSet {
                address,
                register,
                value,
            } => {
                w.write_u8(address)?;
                w.write_u8(register)?;
                w.write_u8(value)?;
            }
        }
        debug_assert_eq!(w.position(), len);
        Ok(len)
    }

    /// Encodes the packet as a single-packet frame.
    pub fn to_frame(&self) -> Result<Frame, ProtocolError> {
        let mut frame = Frame::new();
        push_packet(&mut frame, self)?;
        Ok(frame)
    }

    /// Decodes the payload that follows the header of a `packet_type` packet.
    /// Bytes past the fields of the packet are ignored.
    pub fn decode(packet_type: PacketType, payload: &[u8]) -> Result<Packet, ProtocolError> {
        let mut r = Reader::new(payload);
        let packet = match packet_type {
            PacketType::TouchEvent => Packet::TouchEvent {
                gesture: Gesture::from(r.read_u8()?),
                electrode: r.read_u8()?,
                repeat: r.read_u8()? != 0,
            },
            PacketType::StatusUpdate => Packet::StatusUpdate {
                battery_level: r.read_u32()?,
                status_count: r.read_u16()?,
            },
            PacketType::Reset => Packet::Reset {
                reset_settings: r.read_u8()? != 0,
            },
            PacketType::Configure => Packet::Configure {
                offset: r.read_u8()?,
                value: r.read_u8()?,
            },
            PacketType::Ping => Packet::Ping,
            PacketType::DumpRequest => Packet::DumpRequest,
            PacketType::DumpReply => Packet::DumpReply {
                settings: r.read_array()?,
            },
            PacketType::StatusRequest => Packet::StatusRequest,
            PacketType::I2CRequest => Packet::I2CRequest {
                address: r.read_u8()?,
                register: r.read_u8()?,
            },
            PacketType::I2CReply => Packet::I2CReply {
                address: r.read_u8()?,
                register: r.read_u8()?,
                value: r.read_u8()?,
            },
            PacketType::I2CSet => Packet::I2CSet {
                address: r.read_u8()?,
                register: r.read_u8()?,
                value: r.read_u8()?,
            },
        };
        Ok(packet)
    }
}

/// Appends `packet` to `frame`, leaving the frame untouched if it does not fit.
pub fn push_packet(frame: &mut Frame, packet: &Packet) -> Result<(), ProtocolError> {
    let start = frame.len();
    let len = packet.encoded_len();
    frame
        .resize(start + len, 0)
        .map_err(|_| ProtocolError::BufferTooSmall)?;
    packet.encode(&mut frame[start..])?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// Output buffer cannot hold the encoded packet
    BufferTooSmall,
    /// Input ended before every field was read
    Truncated,
    UnknownType,
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::BufferTooSmall => write!(f, "buffer too small"),
            ProtocolError::Truncated => write!(f, "packet truncated"),
            ProtocolError::UnknownType => write!(f, "unknown packet type"),
        }
    }
}
