use core::fmt::{self, Display, Formatter};

// https://www.nxp.com/docs/en/data-sheet/MPR121.pdf
// https://github.com/adafruit/Adafruit_MPR121
use bitflags::bitflags;
use embedded_hal::i2c::Error;
use num_enum::IntoPrimitive;

/// Default I2C address (ADDR pin tied to GND)
pub const MPR121_ADDRESS: u8 = 0x5A;

/// Number of sensing electrodes, the proximity channel excluded
pub const ELECTRODE_COUNT: u8 = 12;

/// Index of the virtual proximity electrode in the touch status register
pub const PROXIMITY_ELECTRODE: u8 = 12;

/// Value written to [`Register::SoftReset`] to reset the chip
pub(crate) const SOFT_RESET_MAGIC: u8 = 0x63;

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    TouchStatusLow = 0x00,
    TouchStatusHigh = 0x01,
    OorStatusLow = 0x02,
    OorStatusHigh = 0x03,
    FilteredDataBase = 0x04,
    BaselineBase = 0x1E,

    // Electrode baseline filter, rising / falling / touched
    Mhdr = 0x2B,
    Mhdf = 0x2F,
    Nhdt = 0x33,

    // Proximity baseline filter, rising / falling / touched
    MhdProxR = 0x36,
    MhdProxF = 0x3A,
    NhdProxT = 0x3E,

    // Per electrode touch threshold, release threshold follows at +1
    TouchThresholdBase = 0x41,
    ProximityTouchThreshold = 0x59,
    ProximityReleaseThreshold = 0x5A,

    Debounce = 0x5B,
    Afe1 = 0x5C,
    Afe2 = 0x5D,
    Ecr = 0x5E,

    GpioCtrl0 = 0x73,
    GpioEnable = 0x77,
    GpioToggle = 0x7A,

    AutoConfig0 = 0x7B,
    AutoConfig1 = 0x7C,
    UpSideLimit = 0x7D,
    LowSideLimit = 0x7E,
    TargetLevel = 0x7F,

    SoftReset = 0x80,
}

impl Register {
    /// Registers the datasheet allows to be written while the electrodes
    /// are enabled (run mode).
    pub const fn writable_in_run_mode(register: u8) -> bool {
        matches!(register, 0x5E | 0x73..=0x7A | 0x80)
    }
}

/// Electrode configuration register (ECR, 0x5E)
///
/// ```text
///  7   6   5   4   3   2   1   0
/// [ CL   ][ELEPROX][   ELE_EN    ]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ecr(u8);

impl Ecr {
    pub const CL_MASK: u8 = 0b1100_0000;
    pub const CL_SHIFT: u8 = 6;
    pub const ELEPROX_MASK: u8 = 0b0011_0000;
    pub const ELEPROX_SHIFT: u8 = 4;
    pub const ELE_MASK: u8 = 0b0000_1111;
    pub const ELE_SHIFT: u8 = 0;

    /// Baseline tracking enabled, initial value loaded from the first sample
    pub const CL_TRACKING: u8 = 0b10;

    pub const fn new(calibration_lock: u8, proximity: ProximityMode, electrodes: u8) -> Self {
        Self(0)
            .with_calibration_lock(calibration_lock)
            .with_proximity(proximity)
            .with_electrodes(electrodes)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn calibration_lock(self) -> u8 {
        (self.0 & Self::CL_MASK) >> Self::CL_SHIFT
    }

    pub const fn with_calibration_lock(self, cl: u8) -> Self {
        Self((self.0 & !Self::CL_MASK) | ((cl << Self::CL_SHIFT) & Self::CL_MASK))
    }

    pub const fn proximity(self) -> ProximityMode {
        ProximityMode::from_bits((self.0 & Self::ELEPROX_MASK) >> Self::ELEPROX_SHIFT)
    }

    pub const fn with_proximity(self, mode: ProximityMode) -> Self {
        Self(
            (self.0 & !Self::ELEPROX_MASK)
                | (((mode as u8) << Self::ELEPROX_SHIFT) & Self::ELEPROX_MASK),
        )
    }

    /// Number of enabled electrodes, counted from ELE0.
    pub const fn electrodes(self) -> u8 {
        (self.0 & Self::ELE_MASK) >> Self::ELE_SHIFT
    }

    /// Electrode counts above 12 are clamped to 12.
    pub const fn with_electrodes(self, count: u8) -> Self {
        let count = if count > ELECTRODE_COUNT {
            ELECTRODE_COUNT
        } else {
            count
        };
        Self((self.0 & !Self::ELE_MASK) | ((count << Self::ELE_SHIFT) & Self::ELE_MASK))
    }

    /// Any electrode or the proximity channel is enabled.
    pub const fn is_running(self) -> bool {
        self.0 & (Self::ELEPROX_MASK | Self::ELE_MASK) != 0
    }

    /// Same register with every enable bit cleared, calibration lock kept.
    pub const fn stopped(self) -> Self {
        Self(self.0 & Self::CL_MASK)
    }
}

const _: () = {
    assert!(Ecr::CL_MASK & Ecr::ELEPROX_MASK == 0);
    assert!(Ecr::ELEPROX_MASK & Ecr::ELE_MASK == 0);
    assert!(Ecr::CL_MASK | Ecr::ELEPROX_MASK | Ecr::ELE_MASK == 0xFF);
    assert!(Ecr::CL_MASK >> Ecr::CL_SHIFT == 0b11);
    assert!(Ecr::ELEPROX_MASK >> Ecr::ELEPROX_SHIFT == 0b11);
    assert!(Ecr::ELE_MASK >> Ecr::ELE_SHIFT == 0b1111);
};

/// Electrodes combined into the proximity channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProximityMode {
    #[default]
    Disabled = 0,
    Electrodes0To1 = 1,
    Electrodes0To3 = 2,
    Electrodes0To11 = 3,
}

impl ProximityMode {
    /// Decodes the two ELEPROX bits; higher bits are ignored.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => ProximityMode::Disabled,
            1 => ProximityMode::Electrodes0To1,
            2 => ProximityMode::Electrodes0To3,
            _ => ProximityMode::Electrodes0To11,
        }
    }
}

bitflags! {
    /// Touch status registers 0x00 (low) and 0x01 (high)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TouchStatus: u16 {
        const ELE0  = 1 << 0;
        const ELE1  = 1 << 1;
        const ELE2  = 1 << 2;
        const ELE3  = 1 << 3;
        const ELE4  = 1 << 4;
        const ELE5  = 1 << 5;
        const ELE6  = 1 << 6;
        const ELE7  = 1 << 7;
        const ELE8  = 1 << 8;
        const ELE9  = 1 << 9;
        const ELE10 = 1 << 10;
        const ELE11 = 1 << 11;
        /// Proximity channel
        const ELEPROX = 1 << 12;
        /// Over current on REXT
        const OVCF = 1 << 15;
    }
}

impl TouchStatus {
    pub fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self::from_bits_truncate(u16::from_le_bytes(bytes))
    }

    /// Whether electrode `index` (0..=12, 12 being proximity) is touched.
    pub fn is_touched(self, index: u8) -> bool {
        index <= PROXIMITY_ELECTRODE && self.bits() & (1 << index) != 0
    }

    /// Electrodes touched in `self` but not in `previous`.
    pub fn newly_touched(self, previous: TouchStatus) -> TouchStatus {
        self.difference(previous)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TouchStatus {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "TouchStatus({=u16:#x})", self.bits());
    }
}

/// Baseline filter coefficients for one filter stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Filter {
    /// Maximum half delta
    pub mhd: u8,
    /// Noise half delta
    pub nhd: u8,
    /// Noise count limit
    pub ncl: u8,
    /// Filter delay count limit
    pub fdl: u8,
}

impl Filter {
    pub const fn new(mhd: u8, nhd: u8, ncl: u8, fdl: u8) -> Self {
        Self { mhd, nhd, ncl, fdl }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FilterGroup {
    pub rising: Filter,
    pub falling: Filter,
    /// The touched stage has no MHD register; `mhd` is kept for layout only.
    pub touched: Filter,
}

/// Complete sensor configuration applied by `begin`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Mpr121Config {
    /// Number of electrodes to enable (0..=12)
    pub electrodes: u8,
    pub proximity_mode: ProximityMode,
    pub electrode_filter: FilterGroup,
    pub proximity_filter: FilterGroup,
    pub debounce: u8,
    pub afe1: u8,
    pub afe2: u8,
    pub accr0: u8,
    pub accr1: u8,
    pub usl: u8,
    pub lsl: u8,
    pub tl: u8,
    /// Touch threshold applied to every electrode
    pub touch: u8,
    /// Release threshold applied to every electrode
    pub release: u8,
    pub proximity_touch: u8,
    pub proximity_release: u8,
}

impl Default for Mpr121Config {
    fn default() -> Self {
        Self {
            electrodes: 5,
            proximity_mode: ProximityMode::Disabled,
            electrode_filter: FilterGroup {
                rising: Filter::new(0x3F, 0x3F, 0x05, 0x00),
                falling: Filter::new(0x01, 0x3F, 0x10, 0x03),
                touched: Filter::new(0x00, 0x01, 0x01, 0xFF),
            },
            proximity_filter: FilterGroup {
                rising: Filter::new(0x0F, 0x0F, 0x00, 0x00),
                falling: Filter::new(0x01, 0x01, 0xFF, 0xFF),
                touched: Filter::new(0x00, 0x00, 0x00, 0x00),
            },
            debounce: 0x11,
            afe1: 0x3F,
            afe2: 0x24,
            accr0: 0x3F,
            accr1: 0x00,
            usl: 200,
            lsl: 100,
            tl: 180,
            touch: 5,
            release: 2,
            proximity_touch: 2,
            proximity_release: 1,
        }
    }
}

impl Mpr121Config {
    /// Size of the flat byte representation
    pub const SIZE: usize = 38;

    /// ECR value that runs the configured channels with baseline tracking.
    pub fn run_ecr(&self) -> Ecr {
        Ecr::new(Ecr::CL_TRACKING, self.proximity_mode, self.electrodes)
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0] = self.electrodes;
        out[1] = self.proximity_mode.into();
        write_group(&mut out[2..14], &self.electrode_filter);
        write_group(&mut out[14..26], &self.proximity_filter);
        out[26..].copy_from_slice(&[
            self.debounce,
            self.afe1,
            self.afe2,
            self.accr0,
            self.accr1,
            self.usl,
            self.lsl,
            self.tl,
            self.touch,
            self.release,
            self.proximity_touch,
            self.proximity_release,
        ]);
        out
    }

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            electrodes: bytes[0],
            proximity_mode: ProximityMode::from_bits(bytes[1]),
            electrode_filter: read_group(&bytes[2..14]),
            proximity_filter: read_group(&bytes[14..26]),
            debounce: bytes[26],
            afe1: bytes[27],
            afe2: bytes[28],
            accr0: bytes[29],
            accr1: bytes[30],
            usl: bytes[31],
            lsl: bytes[32],
            tl: bytes[33],
            touch: bytes[34],
            release: bytes[35],
            proximity_touch: bytes[36],
            proximity_release: bytes[37],
        }
    }
}

fn write_group(out: &mut [u8], group: &FilterGroup) {
    for (chunk, filter) in out
        .chunks_exact_mut(4)
        .zip([group.rising, group.falling, group.touched])
    {
        chunk.copy_from_slice(&[filter.mhd, filter.nhd, filter.ncl, filter.fdl]);
    }
}

fn read_group(bytes: &[u8]) -> FilterGroup {
    let filter = |b: &[u8]| Filter::new(b[0], b[1], b[2], b[3]);
    FilterGroup {
        rising: filter(&bytes[0..4]),
        falling: filter(&bytes[4..8]),
        touched: filter(&bytes[8..12]),
    }
}

/// Errors that can occur when interacting with the MPR121
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TouchSensorError {
    I2CError,
    /// Electrode index outside 0..=12
    InvalidElectrode(u8),
}

impl Display for TouchSensorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TouchSensorError::I2CError => write!(f, "I2C bus error"),
            TouchSensorError::InvalidElectrode(e) => write!(f, "invalid electrode {e}"),
        }
    }
}

impl<E> From<E> for TouchSensorError
where
    E: Error,
{
    fn from(_: E) -> Self {
        TouchSensorError::I2CError
    }
}

pub mod blocking;
