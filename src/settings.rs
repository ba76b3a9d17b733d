//! Persistent device settings.
//!
//! The settings live as one flat blob at address 0 of the durable storage:
//!
//! ```text
//! 0      2       6                 44           50         57
//! | ver  | radio | sensor (MPR121) | electrodes | sleep    |
//! ```

use drivers::mpr121::Mpr121Config;
use log::{debug, info, warn};

use crate::gesture::ElectrodeMap;
use crate::power::SleepDuration;

pub const FIRMWARE_MAJOR: u8 = 0;
pub const FIRMWARE_MINOR: u8 = 1;

/// Written over the major version to force defaults on the next start.
pub const INVALID_VERSION: u8 = 0xFF;

pub const SETTINGS_SIZE: usize = 57;

const VERSION_OFFSET: usize = 0;
const RADIO_OFFSET: usize = 2;
const SENSOR_OFFSET: usize = 6;
const ELECTRODES_OFFSET: usize = SENSOR_OFFSET + Mpr121Config::SIZE;
const SLEEP_OFFSET: usize = ELECTRODES_OFFSET + ElectrodeMap::SIZE;

const _: () = assert!(SLEEP_OFFSET + SleepSettings::SIZE == SETTINGS_SIZE);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const CURRENT: Version = Version {
        major: FIRMWARE_MAJOR,
        minor: FIRMWARE_MINOR,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RadioSettings {
    pub node_id: u8,
    pub tx_power: u8,
    /// Air data rate selector of the radio
    pub air_kbps: u8,
    /// Battery level below which the radio reports low voltage
    pub low_voltage_threshold: u8,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            node_id: 127,
            tx_power: 0,
            air_kbps: 0x08,
            low_voltage_threshold: 5,
        }
    }
}

/// Which hold the scheduler sleeps for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SleepPeriod {
    Touch,
    Release,
    Proximity,
    Repeat,
    Forever,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SleepSettings {
    pub touch: SleepDuration,
    pub release: SleepDuration,
    pub proximity: SleepDuration,
    pub repeat: SleepDuration,
    /// Milliseconds to wait for an ACK after a send
    pub reply_wake_lock: u8,
    /// Status report period is `status_interval << status_scaler` ms
    pub status_interval: u8,
    pub status_scaler: u8,
}

impl Default for SleepSettings {
    fn default() -> Self {
        Self {
            touch: SleepDuration::Ms500,
            release: SleepDuration::Ms250,
            proximity: SleepDuration::S1,
            repeat: SleepDuration::Ms250,
            reply_wake_lock: 30,
            status_interval: 110,
            status_scaler: 15,
        }
    }
}

impl SleepSettings {
    pub const SIZE: usize = 7;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        [
            self.touch.into(),
            self.release.into(),
            self.proximity.into(),
            self.repeat.into(),
            self.reply_wake_lock,
            self.status_interval,
            self.status_scaler,
        ]
    }

    /// Unknown sleep codes fall back to the default of their slot.
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let defaults = Self::default();
        let code = |b: u8, fallback: SleepDuration| SleepDuration::try_from(b).unwrap_or(fallback);
        Self {
            touch: code(bytes[0], defaults.touch),
            release: code(bytes[1], defaults.release),
            proximity: code(bytes[2], defaults.proximity),
            repeat: code(bytes[3], defaults.repeat),
            reply_wake_lock: bytes[4],
            status_interval: bytes[5],
            status_scaler: bytes[6],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceSettings {
    pub version: Version,
    pub radio: RadioSettings,
    pub sensor: Mpr121Config,
    pub electrodes: ElectrodeMap,
    pub sleep: SleepSettings,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            version: Version::CURRENT,
            radio: RadioSettings::default(),
            sensor: Mpr121Config::default(),
            electrodes: ElectrodeMap::default(),
            sleep: SleepSettings::default(),
        }
    }
}

impl DeviceSettings {
    pub fn to_bytes(&self) -> [u8; SETTINGS_SIZE] {
        let mut out = [0u8; SETTINGS_SIZE];
        out[VERSION_OFFSET] = self.version.major;
        out[VERSION_OFFSET + 1] = self.version.minor;
        out[RADIO_OFFSET..SENSOR_OFFSET].copy_from_slice(&[
            self.radio.node_id,
            self.radio.tx_power,
            self.radio.air_kbps,
            self.radio.low_voltage_threshold,
        ]);
        out[SENSOR_OFFSET..ELECTRODES_OFFSET].copy_from_slice(&self.sensor.to_bytes());
        out[ELECTRODES_OFFSET..SLEEP_OFFSET].copy_from_slice(&self.electrodes.to_bytes());
        out[SLEEP_OFFSET..].copy_from_slice(&self.sleep.to_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; SETTINGS_SIZE]) -> Self {
        let mut sensor = [0u8; Mpr121Config::SIZE];
        sensor.copy_from_slice(&bytes[SENSOR_OFFSET..ELECTRODES_OFFSET]);
        let mut electrodes = [0u8; ElectrodeMap::SIZE];
        electrodes.copy_from_slice(&bytes[ELECTRODES_OFFSET..SLEEP_OFFSET]);
        let mut sleep = [0u8; SleepSettings::SIZE];
        sleep.copy_from_slice(&bytes[SLEEP_OFFSET..]);

        Self {
            version: Version {
                major: bytes[VERSION_OFFSET],
                minor: bytes[VERSION_OFFSET + 1],
            },
            radio: RadioSettings {
                node_id: bytes[RADIO_OFFSET],
                tx_power: bytes[RADIO_OFFSET + 1],
                air_kbps: bytes[RADIO_OFFSET + 2],
                low_voltage_threshold: bytes[RADIO_OFFSET + 3],
            },
            sensor: Mpr121Config::from_bytes(&sensor),
            electrodes: ElectrodeMap::from_bytes(&electrodes),
            sleep: SleepSettings::from_bytes(&sleep),
        }
    }

    /// Overwrites the byte at `offset` of the flat layout. Returns `false`
    /// when the offset is outside the blob.
    pub fn set_byte(&mut self, offset: u8, value: u8) -> bool {
        let offset = offset as usize;
        if offset >= SETTINGS_SIZE {
            return false;
        }
        let mut bytes = self.to_bytes();
        bytes[offset] = value;
        *self = Self::from_bytes(&bytes);
        true
    }

    pub fn duration(&self, period: SleepPeriod) -> SleepDuration {
        match period {
            SleepPeriod::Touch => self.sleep.touch,
            SleepPeriod::Release => self.sleep.release,
            SleepPeriod::Proximity => self.sleep.proximity,
            SleepPeriod::Repeat => self.sleep.repeat,
            SleepPeriod::Forever => SleepDuration::Forever,
        }
    }
}

/// Byte addressable durable memory
pub trait Storage {
    fn read(&mut self, address: u16) -> u8;
    fn write(&mut self, address: u16, value: u8);
}

/// Settings blob at address 0 of a [`Storage`].
pub struct SettingsStore<S> {
    storage: S,
}

impl<S> SettingsStore<S>
where
    S: Storage,
{
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn read_blob(&mut self) -> [u8; SETTINGS_SIZE] {
        let mut blob = [0u8; SETTINGS_SIZE];
        for (address, byte) in blob.iter_mut().enumerate() {
            *byte = self.storage.read(address as u16);
        }
        blob
    }

    /// Loads the stored settings. A blob written by another firmware version
    /// is replaced with the defaults.
    pub fn load(&mut self) -> DeviceSettings {
        let blob = self.read_blob();
        let settings = DeviceSettings::from_bytes(&blob);
        if settings.version == Version::CURRENT {
            debug!("settings loaded, node {}", settings.radio.node_id);
            return settings;
        }

        warn!(
            "settings version {}.{} does not match {}.{}, restoring defaults",
            settings.version.major, settings.version.minor, FIRMWARE_MAJOR, FIRMWARE_MINOR
        );
        let defaults = DeviceSettings::default();
        self.save(&defaults);
        defaults
    }

    /// Writes the bytes that differ from the stored blob and returns how many
    /// were written.
    pub fn save(&mut self, settings: &DeviceSettings) -> usize {
        let stored = self.read_blob();
        let mut written = 0;
        for (address, (new, old)) in settings.to_bytes().iter().zip(stored.iter()).enumerate() {
            if new != old {
                self.storage.write(address as u16, *new);
                written += 1;
            }
        }
        if written > 0 {
            info!("settings saved, {} bytes written", written);
        }
        written
    }

    /// Marks the stored settings as belonging to no firmware version.
    pub fn invalidate(&mut self) {
        self.storage.write(VERSION_OFFSET as u16, INVALID_VERSION);
    }

    pub fn storage(&mut self) -> &mut S {
        &mut self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeStorage;

    #[test]
    fn test_default_layout() {
        let bytes = DeviceSettings::default().to_bytes();
        assert_eq!(&bytes[0..6], &[0, 1, 127, 0, 0x08, 5]);
        assert_eq!(bytes[6], 5);
        assert_eq!(&bytes[44..50], &[0, 1, 2, 3, 4, 12]);
        assert_eq!(&bytes[50..57], &[5, 4, 6, 4, 30, 110, 15]);
        assert_eq!(DeviceSettings::from_bytes(&bytes), DeviceSettings::default());
    }

    #[test]
    fn test_invalid_sleep_code_falls_back_to_default() {
        let mut settings = DeviceSettings::default();
        assert!(settings.set_byte(51, 0x40));
        assert_eq!(settings.sleep.release, SleepDuration::Ms250);
        assert!(settings.set_byte(51, 9));
        assert_eq!(settings.sleep.release, SleepDuration::S8);
        assert_eq!(settings.duration(SleepPeriod::Release), SleepDuration::S8);
        assert_eq!(settings.duration(SleepPeriod::Forever), SleepDuration::Forever);
    }

    #[test]
    fn test_set_byte_out_of_range() {
        let mut settings = DeviceSettings::default();
        assert!(!settings.set_byte(SETTINGS_SIZE as u8, 1));
        assert_eq!(settings, DeviceSettings::default());
    }

    #[test]
    fn test_set_byte_reaches_nested_fields() {
        let mut settings = DeviceSettings::default();
        settings.set_byte(2, 42);
        settings.set_byte(6 + 34, 9);
        settings.set_byte(48, 7);
        assert_eq!(settings.radio.node_id, 42);
        assert_eq!(settings.sensor.touch, 9);
        assert_eq!(settings.electrodes.center, 7);
    }

    #[test]
    fn test_blank_storage_loads_and_persists_defaults() {
        let mut store = SettingsStore::new(FakeStorage::blank());
        let settings = store.load();
        assert_eq!(settings, DeviceSettings::default());
        assert_eq!(store.read_blob(), DeviceSettings::default().to_bytes());
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn test_save_writes_only_differences() {
        let mut store = SettingsStore::new(FakeStorage::blank());
        let mut settings = store.load();
        store.storage().writes.clear();

        assert_eq!(store.save(&settings), 0);
        assert!(store.storage().writes.is_empty());

        settings.set_byte(54, 60);
        assert_eq!(store.save(&settings), 1);
        assert_eq!(store.storage().writes, [(54, 60)]);
    }

    #[test]
    fn test_invalidate_forces_defaults() {
        let mut store = SettingsStore::new(FakeStorage::blank());
        let mut settings = store.load();
        settings.set_byte(2, 9);
        store.save(&settings);
        assert_eq!(store.load().radio.node_id, 9);

        store.invalidate();
        assert_eq!(store.read_blob()[0], INVALID_VERSION);
        assert_eq!(store.load(), DeviceSettings::default());
    }
}
