//! Packed RGB colour codes carried by chat records.
//!
//! Recorders transmit the colour as a signed decimal integer. Negative values
//! are two's-complement encodings of the same 32-bit quantity, so `-1` is
//! white (`ffffff`) once masked to 24 bits.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

const RGB_MASK: u32 = 0x00FF_FFFF;

/// Error returned when a colour field is not a signed decimal integer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid colour code: {value:?}")]
pub struct ColourParseError {
    value: String,
}

/// A 24-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Colour(u32);

impl Colour {
    /// White, the colour most chat messages carry.
    pub const WHITE: Self = Self(RGB_MASK);

    /// Builds a colour from the signed integer a recorder wrote.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "two's-complement reinterpretation is the encoding"
    )]
    pub const fn from_signed(value: i64) -> Self {
        Self((value as i32 as u32) & RGB_MASK)
    }

    /// Returns the packed `0xRRGGBB` value.
    #[must_use]
    pub const fn rgb(self) -> u32 {
        self.0
    }

    /// Six lower-case hex digits, `rrggbb`.
    #[must_use]
    pub fn hex(self) -> String {
        format!("{:06x}", self.0)
    }

    /// The colour as an ASS colour literal (`&H00BBGGRR`).
    #[must_use]
    pub fn ass_bgr(self) -> String {
        let r = (self.0 >> 16) & 0xFF;
        let g = (self.0 >> 8) & 0xFF;
        let b = self.0 & 0xFF;
        format!("&H00{b:02X}{g:02X}{r:02X}")
    }
}

impl FromStr for Colour {
    type Err = ColourParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self::from_signed)
            .map_err(|_| ColourParseError {
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06x}", self.0)
    }
}

impl Serialize for Colour {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.hex())
    }
}
