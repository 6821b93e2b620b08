//! Sample conversion helpers for the Measurement Computing USB-1608FS-Plus DAQ.
//!
//! The device returns bipolar 16-bit counts centred on `0x8000`. This crate maps
//! those counts to volts for each of the eight input ranges, applies the
//! slope/offset calibration stored on the device, and decodes the gain table
//! from an image of the calibration memory. It does no USB I/O.
//!
//! ```
//! use usb1608fsplus::{Calibration, VoltageRange};
//!
//! let cal = Calibration::new(1.155244, -5451.133301);
//! let adjusted = cal.adjust(0x8000);
//! assert_eq!(adjusted, 0x7e94);
//! assert_eq!(VoltageRange::Bip2V.volts(adjusted), -0.022216796875);
//! ```

use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Raw count for a 0 V input.
pub const MID_SCALE: u16 = 0x8000;
const COUNTS_PER_FULL_SCALE: f64 = 32768.0;

/// Size of the nonvolatile calibration memory (0x000 - 0x2FF).
pub const CAL_MEMORY_SIZE: usize = 768;
/// Number of A/D channels.
pub const NUM_CHANNELS: usize = 8;
/// Number of input ranges.
pub const NUM_RANGES: usize = 8;
const BYTES_PER_COEFFICIENT: usize = 4;
/// Bytes at the start of calibration memory holding the slope/intercept table.
pub const GAIN_TABLE_SIZE: usize = NUM_RANGES * NUM_CHANNELS * 2 * BYTES_PER_COEFFICIENT;

/// Errors for the USB-1608FS-Plus helpers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("unknown voltage range code {0:#04x}")]
    UnknownRange(u8),
    #[error("unknown voltage range {0:?}")]
    UnknownRangeName(String),
    #[error("binary value must be 2 bytes, got {0}")]
    WordLength(usize),
    #[error("calibrated value {value} does not fit in a 16-bit sample")]
    AdjustedOutOfRange { value: f64 },
    #[error("access outside calibration memory 0x0000-0x02ff: address {address:#06x}, count {count}")]
    CalMemoryRange { address: usize, count: usize },
    #[error("calibration memory image is {len} bytes, need at least {needed}")]
    CalMemoryTooShort { len: usize, needed: usize },
}

/// Analog input ranges. The discriminant is the range code sent to the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VoltageRange {
    Bip10V = 0,
    Bip5V = 1,
    Bip2_5V = 2,
    Bip2V = 3,
    Bip1_25V = 4,
    Bip1V = 5,
    Bip0_625V = 6,
    Bip0_3125V = 7,
}

impl VoltageRange {
    /// Every range, ordered by range code.
    pub const ALL: [VoltageRange; NUM_RANGES] = [
        VoltageRange::Bip10V,
        VoltageRange::Bip5V,
        VoltageRange::Bip2_5V,
        VoltageRange::Bip2V,
        VoltageRange::Bip1_25V,
        VoltageRange::Bip1V,
        VoltageRange::Bip0_625V,
        VoltageRange::Bip0_3125V,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Largest absolute voltage the range can represent.
    pub fn full_scale(self) -> f64 {
        match self {
            VoltageRange::Bip10V => 10.0,
            VoltageRange::Bip5V => 5.0,
            VoltageRange::Bip2_5V => 2.5,
            VoltageRange::Bip2V => 2.0,
            VoltageRange::Bip1_25V => 1.25,
            VoltageRange::Bip1V => 1.0,
            VoltageRange::Bip0_625V => 0.625,
            VoltageRange::Bip0_3125V => 0.3125,
        }
    }

    /// Name used in configuration, e.g. `"2.5V"`.
    pub fn name(self) -> &'static str {
        match self {
            VoltageRange::Bip10V => "10V",
            VoltageRange::Bip5V => "5V",
            VoltageRange::Bip2_5V => "2.5V",
            VoltageRange::Bip2V => "2V",
            VoltageRange::Bip1_25V => "1.25V",
            VoltageRange::Bip1V => "1V",
            VoltageRange::Bip0_625V => "0.625V",
            VoltageRange::Bip0_3125V => "0.3125V",
        }
    }

    /// Convert a raw count to volts.
    pub fn volts(self, sample: u16) -> f64 {
        let counts = i32::from(sample) - i32::from(MID_SCALE);
        f64::from(counts) * self.full_scale() / COUNTS_PER_FULL_SCALE
    }
}

impl TryFrom<u8> for VoltageRange {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(code))
            .copied()
            .ok_or(Error::UnknownRange(code))
    }
}

impl From<VoltageRange> for u8 {
    fn from(range: VoltageRange) -> u8 {
        range.code()
    }
}

impl FromStr for VoltageRange {
    type Err = Error;

    /// Accepts the configuration name, with or without a leading `±`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let name = trimmed.strip_prefix('±').unwrap_or(trimmed);
        Self::ALL
            .into_iter()
            .find(|range| range.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnknownRangeName(s.to_string()))
    }
}

impl fmt::Display for VoltageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "±{}", self.name())
    }
}

/// Convert a raw count using a range code as read from the device.
pub fn volts_from_code(sample: u16, code: u8) -> Result<f64, Error> {
    Ok(VoltageRange::try_from(code)?.volts(sample))
}

/// Slope/offset correction applied to a raw count before conversion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calibration {
    pub slope: f64,
    pub offset: f64,
}

impl Calibration {
    pub const IDENTITY: Calibration = Calibration { slope: 1.0, offset: 0.0 };

    pub fn new(slope: f64, offset: f64) -> Self {
        Calibration { slope, offset }
    }

    // Rounds half away from zero.
    fn corrected(&self, sample: u16) -> f64 {
        (f64::from(sample) * self.slope + self.offset).round()
    }

    /// Corrected count before narrowing to 16 bits.
    ///
    /// Values beyond the `i64` range saturate to `i64::MIN`/`i64::MAX`, and NaN
    /// becomes 0.
    pub fn adjust_raw(&self, sample: u16) -> i64 {
        self.corrected(sample) as i64
    }

    /// Corrected count, saturated to `0..=0xFFFF`. NaN narrows to 0.
    pub fn adjust(&self, sample: u16) -> u16 {
        let value = self.corrected(sample);
        if !(0.0..=f64::from(u16::MAX)).contains(&value) {
            debug!(sample, value, "calibrated sample saturated");
        }
        value as u16
    }

    /// Corrected count, or an error if it does not fit in 16 bits.
    pub fn try_adjust(&self, sample: u16) -> Result<u16, Error> {
        let value = self.corrected(sample);
        if (0.0..=f64::from(u16::MAX)).contains(&value) {
            Ok(value as u16)
        } else {
            Err(Error::AdjustedOutOfRange { value })
        }
    }

    /// Correct then convert to volts.
    pub fn volts(&self, sample: u16, range: VoltageRange) -> f64 {
        range.volts(self.adjust(sample))
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Calibration::IDENTITY
    }
}

/// Decode a little-endian sample word as sent by the device.
pub fn sample_from_word(word: &[u8]) -> Result<u16, Error> {
    let bytes: [u8; 2] = word.try_into().map_err(|_| Error::WordLength(word.len()))?;
    Ok(u16::from_le_bytes(bytes))
}

/// Volts for a sample word with no calibration applied.
pub fn raw_volts_from_word(word: &[u8], range: VoltageRange) -> Result<f64, Error> {
    Ok(range.volts(sample_from_word(word)?))
}

/// Volts for a sample word after calibration.
pub fn volts_from_word(word: &[u8], range: VoltageRange, cal: &Calibration) -> Result<f64, Error> {
    Ok(cal.volts(sample_from_word(word)?, range))
}

/// Whether `count` bytes from `address` lie inside calibration memory.
pub fn valid_cal_memory_range(address: usize, count: usize) -> bool {
    count > 0
        && count <= CAL_MEMORY_SIZE
        && address
            .checked_add(count)
            .is_some_and(|end| end <= CAL_MEMORY_SIZE)
}

/// Slice `count` bytes at `address` out of a calibration memory image.
pub fn read_cal_memory(memory: &[u8], address: usize, count: usize) -> Result<&[u8], Error> {
    if !valid_cal_memory_range(address, count) {
        return Err(Error::CalMemoryRange { address, count });
    }
    memory
        .get(address..address + count)
        .ok_or(Error::CalMemoryTooShort { len: memory.len(), needed: address + count })
}

fn read_coefficient(memory: &[u8], address: usize) -> Result<f64, Error> {
    let bytes = read_cal_memory(memory, address, BYTES_PER_COEFFICIENT)?;
    let mut buf = [0u8; BYTES_PER_COEFFICIENT];
    buf.copy_from_slice(bytes);
    Ok(f64::from(f32::from_le_bytes(buf)))
}

/// Per range, per channel calibration coefficients.
#[derive(Clone, Debug, PartialEq)]
pub struct GainTable {
    entries: [[Calibration; NUM_CHANNELS]; NUM_RANGES],
}

impl GainTable {
    /// Decode the table from a calibration memory image.
    ///
    /// Entries are range-major; each is a slope followed by an intercept, both
    /// little-endian `f32`.
    pub fn from_cal_memory(memory: &[u8]) -> Result<Self, Error> {
        let mut entries = [[Calibration::IDENTITY; NUM_CHANNELS]; NUM_RANGES];
        let mut address = 0;
        for range in VoltageRange::ALL {
            for (channel, entry) in entries[usize::from(range.code())].iter_mut().enumerate() {
                let slope = read_coefficient(memory, address)?;
                let offset = read_coefficient(memory, address + BYTES_PER_COEFFICIENT)?;
                address += 2 * BYTES_PER_COEFFICIENT;
                if !slope.is_finite() || !offset.is_finite() {
                    warn!(%range, channel, slope, offset, "non-finite calibration coefficient");
                }
                *entry = Calibration::new(slope, offset);
            }
        }
        debug!(bytes = address, "decoded calibration gain table");
        Ok(GainTable { entries })
    }

    /// Coefficients for one range and channel; `None` if the channel does not exist.
    pub fn calibration(&self, range: VoltageRange, channel: usize) -> Option<Calibration> {
        self.entries[usize::from(range.code())].get(channel).copied()
    }
}
