//! Packet radio collaborators for the switch and the hub side of the link.

use crate::protocol::Frame;
use crate::settings::RadioSettings;

/// Node id of the hub
pub const GATEWAY_ID: u8 = 1;

/// Radio as seen from a switch
pub trait NodeRadio {
    fn initialize(&mut self, settings: &RadioSettings);

    fn wake_up(&mut self);

    /// Powers the radio down and arms its periodic wake-up timer for
    /// `interval << scaler` ms.
    fn sleep(&mut self, interval: u8, scaler: u8);

    /// Whether the periodic wake-up timer expired since the last call.
    fn did_time_out(&mut self) -> bool;

    /// Sends `payload` to node `to`. Returns `false` if the radio could not
    /// transmit.
    fn send(&mut self, to: u8, payload: &[u8], request_ack: bool) -> bool;

    /// Polls for the ACK of the last send from `from`, returning the ACK
    /// payload. An empty frame is a bare ACK.
    fn ack_received(&mut self, from: u8) -> Option<Frame>;
}

/// Frame received by the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub sender: u8,
    pub crc_ok: bool,
    pub ack_requested: bool,
    pub payload: Frame,
}

/// Radio as seen from the hub
pub trait GatewayRadio {
    fn receive(&mut self) -> Option<Inbound>;

    /// Acknowledges the last frame of `to`, piggybacking `payload`.
    fn send_ack(&mut self, to: u8, payload: &[u8]);
}
