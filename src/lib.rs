#![no_std]
//! Firmware core of a battery powered capacitive touch wall switch and of
//! the hub it reports to.
//!
//! - [`protocol`]: packets, radio frames and the hub command buffer
//! - [`touch`] and [`gesture`]: touch sequences read from the MPR121 and
//!   their classification into taps, swipes and proximity events
//! - [`scheduler`]: the sleep/wake cycle of the switch
//! - [`hub`]: event decoding and command delivery on the hub
//!
//! Hardware is reached through `embedded-hal` traits and the collaborator
//! traits in [`radio`], [`settings`] and [`power`].

#[cfg(test)]
extern crate std;

pub mod gesture;
pub mod hub;
pub mod power;
pub mod protocol;
pub mod radio;
pub mod scheduler;
pub mod settings;
pub mod touch;

#[cfg(test)]
mod testing;

pub use gesture::{ElectrodeMap, Gesture};
pub use hub::{Hub, HubEvent, Queued};
pub use power::{AlertFlag, Power, SleepDuration};
pub use protocol::{Frame, Packet, PacketType};
pub use radio::{GatewayRadio, Inbound, NodeRadio, GATEWAY_ID};
pub use scheduler::{State, Step, Switch};
pub use settings::{DeviceSettings, SettingsStore, Storage};
