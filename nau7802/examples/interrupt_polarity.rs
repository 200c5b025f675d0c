use linux_embedded_hal::I2cdev;
use nau7802::Nau7802;

/// Configures the CRDY pin to go low when a conversion is ready. Watching the
/// pin is left to the platform's GPIO layer; here we still poll the status bit.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let i2c = I2cdev::new("/dev/i2c-1")?;
    let mut scale = Nau7802::new(i2c);
    scale.begin(true)?;
    scale.set_interrupt_polarity_low()?;

    loop {
        if scale.available()? {
            println!("Reading: {}", scale.read_raw()?);
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
}
