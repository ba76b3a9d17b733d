#![no_std]
//! Register-level drivers used by the touch switch firmware.
//!
//! The crate currently provides a blocking driver for the MPR121 capacitive
//! touch and proximity controller. Drivers are generic over the
//! `embedded-hal` 1.0 I2C traits so they run against real buses on target and
//! against in-memory fakes on the host.

#[cfg(test)]
extern crate std;

use embedded_hal::i2c::I2c;

/// MPR121 capacitive touch / proximity sensor driver.
pub mod mpr121;

/// Single-register access helper shared by the blocking drivers.
#[derive(Debug)]
pub struct BlockingRegisterDevice<I2C> {
    i2c: I2C,
    pub(crate) adr: u8,
}

impl<I2C> BlockingRegisterDevice<I2C>
where
    I2C: I2c,
{
    pub fn new(i2c: I2C, adr: u8) -> Self {
        Self { i2c, adr }
    }

    pub fn read_register(&mut self, register: u8) -> Result<u8, I2C::Error> {
        let mut buffer = [0u8];
        self.i2c.write_read(self.adr, &[register], &mut buffer)?;
        Ok(buffer[0])
    }

    pub fn read_register_buffer(
        &mut self,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), I2C::Error> {
        self.i2c.write_read(self.adr, &[register], buffer)
    }

    /// Writes `register_and_data[0]` as the register pointer followed by the
    /// remaining bytes.
    pub fn write_register(&mut self, register_and_data: &[u8]) -> Result<(), I2C::Error> {
        self.i2c.write(self.adr, register_and_data)
    }

    pub fn set_register_bit(&mut self, register: u8, bit: u8) -> Result<(), I2C::Error> {
        let val = self.read_register(register)?;
        self.write_register(&[register, val | (1 << bit)])
    }

    pub fn get_register_bit(&mut self, register: u8, bit: u8) -> Result<bool, I2C::Error> {
        let val = self.read_register(register)?;
        Ok((val & (1 << bit)) != 0)
    }

    pub fn clear_register_bit(&mut self, register: u8, bit: u8) -> Result<(), I2C::Error> {
        let val = self.read_register(register)?;
        self.write_register(&[register, val & !(1 << bit)])
    }

    /// Access to the underlying bus for devices sharing it.
    pub fn bus(&mut self) -> &mut I2C {
        &mut self.i2c
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeRegisters;
    use super::BlockingRegisterDevice;

    #[test]
    fn test_register_bit_helpers() {
        let mut dev = BlockingRegisterDevice::new(FakeRegisters::new(), 0x5A);
        dev.write_register(&[0x10, 0b0000_0001]).unwrap();
        dev.set_register_bit(0x10, 3).unwrap();
        assert_eq!(dev.read_register(0x10).unwrap(), 0b0000_1001);
        assert!(dev.get_register_bit(0x10, 3).unwrap());
        dev.clear_register_bit(0x10, 0).unwrap();
        assert_eq!(dev.read_register(0x10).unwrap(), 0b0000_1000);
    }

    #[test]
    fn test_read_register_buffer() {
        let mut fake = FakeRegisters::new();
        fake.regs[0x00] = 0x12;
        fake.regs[0x01] = 0x34;
        let mut dev = BlockingRegisterDevice::new(fake, 0x5A);
        let mut buf = [0u8; 2];
        dev.read_register_buffer(0x00, &mut buf).unwrap();
        assert_eq!(buf, [0x12, 0x34]);
    }

    #[test]
    fn test_bus_error_is_returned() {
        let mut fake = FakeRegisters::new();
        fake.fail = true;
        let mut dev = BlockingRegisterDevice::new(fake, 0x5A);
        assert!(dev.read_register(0x00).is_err());
    }
}
