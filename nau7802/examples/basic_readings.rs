use linux_embedded_hal::I2cdev;
use nau7802::Nau7802;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let i2c = I2cdev::new("/dev/i2c-1")?;
    let mut scale = Nau7802::new(i2c);
    scale.begin(true)?;
    println!("Scale detected, revision {:#x}", scale.revision_code()?);

    loop {
        if scale.available()? {
            println!("Reading: {}", scale.read_raw()?);
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
}
