use usb1608fsplus::{sample_from_word, volts_from_code, Calibration, VoltageRange};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let word = [0x94, 0x7e];
    let sample = sample_from_word(&word)?;
    for range in VoltageRange::ALL {
        println!("{:>9}: {:+.6} V", range.to_string(), range.volts(sample));
    }

    let cal = Calibration::new(1.0, 12.0);
    println!("Adjusted: {:#06x}", cal.try_adjust(sample)?);

    // Range codes come back from the device as plain bytes.
    match volts_from_code(sample, 9) {
        Ok(volts) => println!("Voltage: {:.3} V", volts),
        Err(e) => println!("Skipping sample: {e}"),
    }
    Ok(())
}
