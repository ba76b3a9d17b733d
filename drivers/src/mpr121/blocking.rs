use super::*;
use crate::BlockingRegisterDevice;
use embedded_hal::i2c::I2c;

/// First register covered by [`Mpr121::dump_registers`]
pub const DUMP_START: u8 = Register::Mhdr as u8;
/// Number of registers returned by [`Mpr121::dump_registers`] (0x2B..=0x7F)
pub const DUMP_LEN: usize = 0x80 - DUMP_START as usize;

pub struct Mpr121<I2C> {
    dev: BlockingRegisterDevice<I2C>,
    /// Last value written to ECR
    ecr: Ecr,
    /// ECR restored by `run`
    active: Ecr,
}

impl<I2C> Mpr121<I2C>
where
    I2C: I2c,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            dev: BlockingRegisterDevice::new(i2c, address),
            ecr: Ecr::default(),
            active: Ecr::default(),
        }
    }

    pub fn address(&self) -> u8 {
        self.dev.adr
    }

    /// Soft-resets the chip, writes the complete configuration and starts
    /// sensing the configured channels.
    pub fn begin(&mut self, config: &Mpr121Config) -> Result<(), TouchSensorError> {
        self.dev
            .write_register(&[Register::SoftReset.into(), SOFT_RESET_MAGIC])?;
        self.ecr = Ecr::default();
        self.apply_config(config)?;
        self.active = config.run_ecr();
        #[cfg(feature = "defmt")]
        defmt::debug!("MPR121 configured, ECR {=u8:#x}", self.active.bits());
        #[cfg(feature = "log-04")]
        log::debug!("MPR121 configured, ECR {:#x}", self.active.bits());
        self.run()
    }

    /// Writes filter, threshold, debounce, AFE and auto-configuration
    /// registers. The enabled channels are left as they were.
    pub fn apply_config(&mut self, config: &Mpr121Config) -> Result<(), TouchSensorError> {
        self.with_paused(|this| {
            let mut filters = [0u8; 23];
            filters[0] = Register::Mhdr.into();
            write_filters(&mut filters[1..12], &config.electrode_filter);
            write_filters(&mut filters[12..23], &config.proximity_filter);
            this.dev.write_register(&filters)?;

            let mut thresholds = [0u8; 1 + 2 * ELECTRODE_COUNT as usize + 2];
            thresholds[0] = Register::TouchThresholdBase.into();
            for pair in thresholds[1..].chunks_exact_mut(2) {
                pair.copy_from_slice(&[config.touch, config.release]);
            }
            let last = thresholds.len() - 2;
            thresholds[last..].copy_from_slice(&[config.proximity_touch, config.proximity_release]);
            this.dev.write_register(&thresholds)?;

            this.dev.write_register(&[
                Register::Debounce.into(),
                config.debounce,
                config.afe1,
                config.afe2,
            ])?;
            this.dev.write_register(&[
                Register::AutoConfig0.into(),
                config.accr0,
                config.accr1,
                config.usl,
                config.lsl,
                config.tl,
            ])?;
            Ok(())
        })
    }

    pub fn touch_status(&mut self) -> Result<TouchStatus, TouchSensorError> {
        let mut buf = [0u8; 2];
        self.dev
            .read_register_buffer(Register::TouchStatusLow.into(), &mut buf)?;
        Ok(TouchStatus::from_le_bytes(buf))
    }

    pub fn ecr(&self) -> Ecr {
        self.ecr
    }

    pub fn is_running(&self) -> bool {
        self.ecr.is_running()
    }

    /// Enables the channels of the last run configuration.
    pub fn run(&mut self) -> Result<(), TouchSensorError> {
        self.write_ecr(self.active)
    }

    /// Clears every enable bit, calibration lock is kept.
    pub fn stop(&mut self) -> Result<(), TouchSensorError> {
        self.write_ecr(self.ecr.stopped())
    }

    /// Keeps only the proximity channel enabled. Without a proximity channel
    /// the electrodes keep running so touches still raise the alert line.
    pub fn run_proximity_only(&mut self) -> Result<(), TouchSensorError> {
        if self.active.proximity() == ProximityMode::Disabled {
            return self.run();
        }
        if self.is_running() {
            self.stop()?;
        }
        self.write_ecr(self.active.with_electrodes(0))
    }

    /// Runs `op` with every channel disabled, restoring the previous ECR on
    /// every exit path. A stopped chip is left untouched.
    pub fn with_paused<F, T>(&mut self, op: F) -> Result<T, TouchSensorError>
    where
        F: FnOnce(&mut Self) -> Result<T, TouchSensorError>,
    {
        let previous = self.ecr;
        if !previous.is_running() {
            return op(self);
        }

        self.write_ecr(previous.stopped())?;
        let res = op(self);
        let restored = self.write_ecr(previous);
        if restored.is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("Failed to restore ECR after paused write");
            #[cfg(feature = "log-04")]
            log::warn!("Failed to restore ECR after paused write");
        }
        let value = res?;
        restored?;
        Ok(value)
    }

    pub fn read_register(&mut self, register: u8) -> Result<u8, TouchSensorError> {
        Ok(self.dev.read_register(register)?)
    }

    /// Writes a single register. Registers outside the run-mode whitelist are
    /// written with the chip paused.
    pub fn write_register(&mut self, register: u8, value: u8) -> Result<(), TouchSensorError> {
        if register == u8::from(Register::Ecr) {
            let ecr = Ecr::from_bits(value);
            self.write_ecr(ecr)?;
            if ecr.is_running() {
                self.active = ecr;
            }
            return Ok(());
        }

        if Register::writable_in_run_mode(register) {
            self.dev.write_register(&[register, value])?;
            if register == u8::from(Register::SoftReset) && value == SOFT_RESET_MAGIC {
                self.ecr = Ecr::default();
            }
            return Ok(());
        }

        self.with_paused(|this| {
            this.dev.write_register(&[register, value])?;
            Ok(())
        })
    }

    /// Touch threshold for one electrode (12 = proximity) or, with `None`,
    /// for all twelve electrodes.
    pub fn set_touch_threshold(
        &mut self,
        value: u8,
        electrode: Option<u8>,
    ) -> Result<(), TouchSensorError> {
        self.set_threshold(value, electrode, 0)
    }

    /// Release threshold for one electrode (12 = proximity) or, with `None`,
    /// for all twelve electrodes.
    pub fn set_release_threshold(
        &mut self,
        value: u8,
        electrode: Option<u8>,
    ) -> Result<(), TouchSensorError> {
        self.set_threshold(value, electrode, 1)
    }

    fn set_threshold(
        &mut self,
        value: u8,
        electrode: Option<u8>,
        offset: u8,
    ) -> Result<(), TouchSensorError> {
        let base = u8::from(Register::TouchThresholdBase) + offset;
        match electrode {
            Some(e) if e > PROXIMITY_ELECTRODE => Err(TouchSensorError::InvalidElectrode(e)),
            Some(e) => self.with_paused(|this| {
                this.dev.write_register(&[base + 2 * e, value])?;
                Ok(())
            }),
            None => self.with_paused(|this| {
                for e in 0..ELECTRODE_COUNT {
                    this.dev.write_register(&[base + 2 * e, value])?;
                }
                Ok(())
            }),
        }
    }

    /// Reads the configuration registers 0x2B..=0x7F.
    pub fn dump_registers(&mut self) -> Result<[u8; DUMP_LEN], TouchSensorError> {
        let mut regs = [0u8; DUMP_LEN];
        self.dev.read_register_buffer(DUMP_START, &mut regs)?;
        #[cfg(feature = "log-04")]
        for (i, value) in regs.iter().enumerate() {
            log::debug!("MPR121 {:#04x} = {:#04x}", DUMP_START as usize + i, value);
        }
        Ok(regs)
    }

    /// Access to the underlying bus.
    pub fn bus(&mut self) -> &mut I2C {
        self.dev.bus()
    }

    fn write_ecr(&mut self, ecr: Ecr) -> Result<(), TouchSensorError> {
        self.dev.write_register(&[Register::Ecr.into(), ecr.bits()])?;
        self.ecr = ecr;
        Ok(())
    }
}

/// Rising and falling stages carry all four coefficients, the touched stage
/// has no MHD register.
fn write_filters(out: &mut [u8], group: &FilterGroup) {
    let FilterGroup {
        rising: r,
        falling: f,
        touched: t,
    } = group;
    out.copy_from_slice(&[
        r.mhd, r.nhd, r.ncl, r.fdl, f.mhd, f.nhd, f.ncl, f.fdl, t.nhd, t.ncl, t.fdl,
    ]);
}
