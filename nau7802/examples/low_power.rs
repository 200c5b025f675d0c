use std::time::{Duration, Instant};

use linux_embedded_hal::I2cdev;
use nau7802::Nau7802;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let i2c = I2cdev::new("/dev/i2c-1")?;
    let mut scale = Nau7802::new(i2c);
    scale.begin(true)?;

    loop {
        let start = Instant::now();
        while !scale.available()? {
            std::thread::sleep(Duration::from_millis(1));
        }
        println!("Reading: {} (ready after {:?})", scale.read_raw()?, start.elapsed());

        scale.power_down()?;
        println!("Powered down");
        std::thread::sleep(Duration::from_secs(1));

        // Conversions restart from scratch, the first few after power-up are unsettled.
        scale.power_up()?;
        println!("Powered up");
    }
}
