use linux_embedded_hal::I2cdev;
use nau7802::{Channel, Gain, Nau7802, SampleRate};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let i2c = I2cdev::new("/dev/i2c-1")?;
    let mut scale = Nau7802::new(i2c);
    scale.begin(true)?;

    scale.set_gain_mode(Gain::G64)?;
    scale.set_samples_per_second(SampleRate::Sps40)?;
    scale.set_channel(Channel::Ch1)?;
    // Gain, rate and channel changes all need a fresh AFE calibration.
    scale.calibrate_afe()?;

    loop {
        if scale.available()? {
            println!("Reading: {}", scale.read_raw()?);
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
}
