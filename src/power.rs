//! Low-power sleep and the sensor alert line.

use core::sync::atomic::{AtomicBool, Ordering};

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Sleep lengths supported by the watchdog based sleep of the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SleepDuration {
    Ms15 = 0,
    Ms30 = 1,
    Ms60 = 2,
    Ms120 = 3,
    Ms250 = 4,
    Ms500 = 5,
    S1 = 6,
    S2 = 7,
    S4 = 8,
    S8 = 9,
    /// Until an interrupt or the radio timer wakes the device
    Forever = 10,
}

impl SleepDuration {
    pub const fn as_millis(self) -> Option<u32> {
        match self {
            SleepDuration::Ms15 => Some(15),
            SleepDuration::Ms30 => Some(30),
            SleepDuration::Ms60 => Some(60),
            SleepDuration::Ms120 => Some(120),
            SleepDuration::Ms250 => Some(250),
            SleepDuration::Ms500 => Some(500),
            SleepDuration::S1 => Some(1000),
            SleepDuration::S2 => Some(2000),
            SleepDuration::S4 => Some(4000),
            SleepDuration::S8 => Some(8000),
            SleepDuration::Forever => None,
        }
    }
}

/// Platform sleep and battery measurement
pub trait Power {
    /// Sleeps for `duration` or until the sensor alert or the radio timer
    /// wakes the device, whichever comes first.
    fn sleep(&mut self, duration: SleepDuration);

    fn battery_millivolts(&mut self) -> u32;
}

/// Single-shot flag between the sensor alert interrupt and the main loop.
///
/// The interrupt handler calls [`AlertFlag::on_interrupt`]; it only records
/// the event when the flag was armed and disarms it, so at most one event is
/// recorded until the main loop re-arms.
///
/// ```ignore
/// static ALERT: AlertFlag = AlertFlag::new();
///
/// #[interrupt]
/// fn EXTI0() {
///     ALERT.on_interrupt();
/// }
/// ```
#[derive(Debug, Default)]
pub struct AlertFlag {
    armed: AtomicBool,
    fired: AtomicBool,
}

impl AlertFlag {
    pub const fn new() -> Self {
        Self {
            armed: AtomicBool::new(false),
            fired: AtomicBool::new(false),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::Release);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Called from the interrupt handler.
    pub fn on_interrupt(&self) {
        if self.armed.load(Ordering::Acquire) {
            self.armed.store(false, Ordering::Release);
            self.fired.store(true, Ordering::Release);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Consumes a recorded event.
    pub fn take(&self) -> bool {
        let fired = self.fired.load(Ordering::Acquire);
        if fired {
            self.fired.store(false, Ordering::Release);
        }
        fired
    }
}
