//! Touch sequence tracking on top of the MPR121 driver.

use drivers::mpr121::blocking::Mpr121;
use drivers::mpr121::{Mpr121Config, TouchSensorError, TouchStatus, ELECTRODE_COUNT};
use embedded_hal::i2c::I2c;
use log::debug;

use crate::gesture::{classify, ElectrodeMap, Gesture, NO_TOUCH};

/// Longest sequence of electrodes recorded for one gesture
pub const MAX_SEQUENCE: usize = 4;

pub struct TouchSequence<I2C> {
    sensor: Mpr121<I2C>,
    map: ElectrodeMap,
    /// Enabled electrodes, counted from ELE0
    electrodes: u8,
    seq: heapless::Vec<u8, MAX_SEQUENCE>,
    last_status: TouchStatus,
    touched: bool,
    proximity: bool,
    /// Proximity seen while no electrode was recorded
    proximity_event: bool,
}

impl<I2C> TouchSequence<I2C>
where
    I2C: I2c,
{
    pub fn new(sensor: Mpr121<I2C>) -> Self {
        Self {
            sensor,
            map: ElectrodeMap::default(),
            electrodes: 0,
            seq: heapless::Vec::new(),
            last_status: TouchStatus::empty(),
            touched: false,
            proximity: false,
            proximity_event: false,
        }
    }

    pub fn begin(
        &mut self,
        config: &Mpr121Config,
        map: ElectrodeMap,
    ) -> Result<(), TouchSensorError> {
        self.map = map;
        self.electrodes = config.electrodes.min(ELECTRODE_COUNT);
        self.sensor.begin(config)?;
        self.last_status = TouchStatus::empty();
        self.clear();
        Ok(())
    }

    /// Reads the touch status and records newly touched electrodes. Returns
    /// whether any electrode or the proximity channel is asserted.
    ///
    /// Nothing is recorded when the read fails.
    pub fn update(&mut self) -> Result<bool, TouchSensorError> {
        let status = self.sensor.touch_status()?;

        let new = status.newly_touched(self.last_status);
        for electrode in 0..self.electrodes {
            if new.is_touched(electrode) && self.seq.push(electrode).is_err() {
                break;
            }
        }

        self.touched = (0..self.electrodes).any(|e| status.is_touched(e));
        self.proximity = status.is_touched(self.map.proximity);
        if !self.seq.is_empty() {
            self.proximity_event = false;
        } else if self.proximity {
            self.proximity_event = true;
        }
        self.last_status = status;

        debug!(
            "touch status {:#06x}, sequence {:?}",
            status.bits(),
            self.seq.as_slice()
        );
        Ok(self.touched || self.proximity)
    }

    pub fn gesture(&self) -> Gesture {
        classify(&self.seq, &self.map, self.proximity_event)
    }

    /// Most recently recorded electrode, [`NO_TOUCH`] if none.
    pub fn last_touch(&self) -> u8 {
        self.seq.last().copied().unwrap_or(NO_TOUCH)
    }

    pub fn sequence(&self) -> &[u8] {
        &self.seq
    }

    pub fn clear(&mut self) {
        self.seq.clear();
        self.touched = false;
        self.proximity = false;
        self.proximity_event = false;
    }

    /// An electrode was asserted on the last update.
    pub fn is_touched(&self) -> bool {
        self.touched
    }

    /// A hand is near the plate without having touched it.
    pub fn is_proximity(&self) -> bool {
        self.proximity_event && self.proximity
    }

    pub fn run(&mut self) -> Result<(), TouchSensorError> {
        self.sensor.run()
    }

    pub fn stop(&mut self) -> Result<(), TouchSensorError> {
        self.sensor.stop()
    }

    /// Idle sensing between gestures.
    pub fn sleep(&mut self) -> Result<(), TouchSensorError> {
        self.sensor.run_proximity_only()
    }

    pub fn wake_up(&mut self) -> Result<(), TouchSensorError> {
        self.sensor.run()
    }

    pub fn electrode_map(&self) -> &ElectrodeMap {
        &self.map
    }

    pub fn sensor_mut(&mut self) -> &mut Mpr121<I2C> {
        &mut self.sensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBus;
    use drivers::mpr121::{ProximityMode, MPR121_ADDRESS};

    fn sequence(config: &Mpr121Config) -> TouchSequence<FakeBus> {
        let sensor = Mpr121::new(FakeBus::new(), MPR121_ADDRESS);
        let mut touch = TouchSequence::new(sensor);
        touch.begin(config, ElectrodeMap::default()).unwrap();
        touch
    }

    fn press(touch: &mut TouchSequence<FakeBus>, status: u16) -> bool {
        touch.sensor_mut().bus().set_touch_status(status);
        touch.update().unwrap()
    }

    #[test]
    fn test_swipe_down_is_recorded_in_order() {
        let mut touch = sequence(&Mpr121Config::default());
        assert!(press(&mut touch, 1 << 0));
        assert!(press(&mut touch, 1 << 0 | 1 << 4));
        assert!(press(&mut touch, 1 << 4 | 1 << 2));
        assert!(!press(&mut touch, 0));
        assert_eq!(touch.sequence(), &[0, 4, 2]);
        assert_eq!(touch.gesture(), Gesture::SwipeDown);
        assert_eq!(touch.last_touch(), 2);
    }

    #[test]
    fn test_tap_and_double_tap() {
        let mut touch = sequence(&Mpr121Config::default());
        press(&mut touch, 1 << 0);
        press(&mut touch, 0);
        assert_eq!(touch.gesture(), Gesture::Tap);
        assert_eq!(touch.last_touch(), 0);

        press(&mut touch, 1 << 0);
        assert_eq!(touch.gesture(), Gesture::DoubleTap);
    }

    #[test]
    fn test_sequence_is_bounded() {
        let mut touch = sequence(&Mpr121Config::default());
        for e in [0, 1, 2, 3, 4, 0, 1] {
            press(&mut touch, 1 << e);
            press(&mut touch, 0);
        }
        assert_eq!(touch.sequence().len(), MAX_SEQUENCE);
        assert_eq!(touch.sequence(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_sequence_is_bounded_within_one_update() {
        let config = Mpr121Config {
            electrodes: 6,
            ..Mpr121Config::default()
        };
        let mut touch = sequence(&config);
        assert!(press(&mut touch, 0x1F));
        assert_eq!(touch.sequence(), &[0, 1, 2, 3]);

        assert!(!press(&mut touch, 0));
        assert!(!touch.is_touched());
        assert!(press(&mut touch, 1 << 5));
        assert!(touch.is_touched());
        assert_eq!(touch.sequence(), &[0, 1, 2, 3]);
        assert_eq!(touch.last_touch(), 3);
    }

    #[test]
    fn test_disabled_electrodes_are_ignored() {
        let mut touch = sequence(&Mpr121Config::default());
        assert!(!press(&mut touch, 1 << 7));
        assert!(touch.sequence().is_empty());
    }

    #[test]
    fn test_proximity_event_is_sticky_until_touch() {
        let config = Mpr121Config {
            proximity_mode: ProximityMode::Electrodes0To3,
            ..Mpr121Config::default()
        };
        let mut touch = sequence(&config);
        assert!(press(&mut touch, 1 << 12));
        assert!(touch.is_proximity());
        assert!(!touch.is_touched());
        assert!(!press(&mut touch, 0));
        assert_eq!(touch.gesture(), Gesture::Proximity);

        press(&mut touch, 1 << 12 | 1 << 3);
        assert!(!touch.is_proximity());
        assert_eq!(touch.gesture(), Gesture::Tap);
    }

    #[test]
    fn test_clear_resets_sequence() {
        let mut touch = sequence(&Mpr121Config::default());
        press(&mut touch, 1 << 1);
        touch.clear();
        assert!(touch.sequence().is_empty());
        assert_eq!(touch.last_touch(), NO_TOUCH);
        assert_eq!(touch.gesture(), Gesture::Unknown);
    }

    #[test]
    fn test_failed_read_leaves_state_untouched() {
        let mut touch = sequence(&Mpr121Config::default());
        press(&mut touch, 1 << 1);
        touch.sensor_mut().bus().set_touch_status(1 << 1 | 1 << 2);
        touch.sensor_mut().bus().fail = true;
        assert_eq!(touch.update(), Err(TouchSensorError::I2CError));
        assert_eq!(touch.sequence(), &[1]);
        assert!(touch.is_touched());

        touch.sensor_mut().bus().fail = false;
        assert!(touch.update().unwrap());
        assert_eq!(touch.sequence(), &[1, 2]);
    }

    #[test]
    fn test_sleep_and_wake_up() {
        let config = Mpr121Config {
            proximity_mode: ProximityMode::Electrodes0To11,
            ..Mpr121Config::default()
        };
        let mut touch = sequence(&config);
        touch.sleep().unwrap();
        assert_eq!(touch.sensor_mut().ecr().electrodes(), 0);
        assert!(touch.sensor_mut().is_running());
        touch.wake_up().unwrap();
        assert_eq!(touch.sensor_mut().ecr().electrodes(), 5);
    }
}
