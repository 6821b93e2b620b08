//! Slope/offset calibration walkthrough for the USB-1608FS-Plus.
//! Converts one raw sample with and without calibration and reports the
//! intermediate arithmetic.

use std::fmt;
use tracing::{debug, info};

use usb1608fsplus::{volts_from_code, Calibration, Error};

/// Inputs for one run of the walkthrough.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DemoConfig {
    pub sample: u16,
    pub calibration: Calibration,
    /// Range code as the device reports it (3 = ±2V).
    pub range_code: u8,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            sample: 0x8000,
            calibration: Calibration::new(1.155244, -5451.133301),
            range_code: 3,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct AdjustmentReport {
    pub sample: u16,
    pub adjusted: u16,
    pub volts: f64,
    pub adjusted_volts: f64,
    /// `sample * slope`
    pub scaled: f64,
    /// `sample * slope + offset`
    pub corrected: f64,
    pub rounded: f64,
}

impl fmt::Display for AdjustmentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Value = {:#x} / Adjusted Value = {:#x}", self.sample, self.adjusted)?;
        writeln!(f, "Voltage = {:.6} / Adjusted Voltage = {:.6}", self.volts, self.adjusted_volts)?;
        writeln!(f, "value * slope = {:.6}", self.scaled)?;
        writeln!(f, "value * slope + offset = {:.6}", self.corrected)?;
        write!(f, "round(value * slope + offset) = {:.6}", self.rounded)
    }
}

/// Run the conversion on the raw and the calibrated sample.
pub fn run(config: &DemoConfig) -> Result<AdjustmentReport, Error> {
    let DemoConfig { sample, calibration, range_code } = *config;
    info!(sample, range_code, slope = calibration.slope, offset = calibration.offset, "Running slope/offset conversion");

    let scaled = f64::from(sample) * calibration.slope;
    let corrected = scaled + calibration.offset;
    let adjusted = calibration.adjust(sample);
    debug!(unsaturated = calibration.adjust_raw(sample), adjusted, "Calibrated sample");

    Ok(AdjustmentReport {
        sample,
        adjusted,
        volts: volts_from_code(sample, range_code)?,
        adjusted_volts: volts_from_code(adjusted, range_code)?,
        scaled,
        corrected,
        rounded: corrected.round(),
    })
}
