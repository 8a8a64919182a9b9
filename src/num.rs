//! The consensus numeric model.
//!
//! Arithmetic opcodes operate on signed integers serialized as little-endian
//! sign-magnitude byte strings: the most significant bit of the last byte is
//! the sign, everything else is magnitude. Operands are limited to 4 bytes
//! (5 for the lock-time opcodes) but results may exceed that range; they only
//! fail once re-used as an operand.

/// Script number error type.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum NumError {
    #[error("script number overflow")]
    Overflow,
    #[error("non-minimally encoded script number")]
    NotMinimallyEncoded,
}

/// A numeric stack operand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScriptNum(i64);

impl<T: Into<i64>> From<T> for ScriptNum {
    fn from(value: T) -> Self {
        Self(value.into())
    }
}

impl ScriptNum {
    /// Default maximum operand length in bytes.
    pub const MAX_NUM_SIZE: usize = 4;

    /// Decodes a byte string, enforcing the length bound and, optionally,
    /// minimal encoding.
    pub fn from_bytes(
        data: &[u8],
        require_minimal: bool,
        max_size: Option<usize>,
    ) -> Result<Self, NumError> {
        if data.len() > max_size.unwrap_or(Self::MAX_NUM_SIZE) {
            return Err(NumError::Overflow);
        }

        let Some((&last, _)) = data.split_last() else {
            return Ok(Self(0));
        };

        if require_minimal && !is_minimally_encoded(data) {
            return Err(NumError::NotMinimallyEncoded);
        }

        let mut magnitude = 0i64;
        for (i, &byte) in data.iter().enumerate() {
            magnitude |= i64::from(byte).wrapping_shl(8 * i as u32);
        }

        if last & 0x80 != 0 {
            // Strip the sign bit out of the accumulated magnitude and negate.
            let sign_bit = 0x80i64.wrapping_shl(8 * (data.len() as u32 - 1));
            Ok(Self(-(magnitude & !sign_bit)))
        } else {
            Ok(Self(magnitude))
        }
    }

    /// Encodes the number in its minimal byte representation.
    pub fn to_bytes(self) -> Vec<u8> {
        if self.0 == 0 {
            return Vec::new();
        }

        let negative = self.0 < 0;
        let mut magnitude = self.0.unsigned_abs();

        let mut bytes = Vec::with_capacity(9);
        while magnitude > 0 {
            bytes.push((magnitude & 0xff) as u8);
            magnitude >>= 8;
        }

        // The high bit of the last byte carries the sign; if the magnitude
        // already uses it, an extra byte is needed.
        let last = bytes.last_mut().expect("non-zero value has bytes");
        if *last & 0x80 != 0 {
            bytes.push(if negative { 0x80 } else { 0x00 });
        } else if negative {
            *last |= 0x80;
        }

        bytes
    }

    pub fn value(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn abs(self) -> Self {
        Self(self.0.wrapping_abs())
    }

    pub fn checked_add(self, other: Self) -> Result<Self, NumError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(NumError::Overflow)
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, NumError> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(NumError::Overflow)
    }

    pub fn checked_neg(self) -> Result<Self, NumError> {
        self.0.checked_neg().map(Self).ok_or(NumError::Overflow)
    }
}

/// Whether `data` is the shortest encoding of its value.
pub fn is_minimally_encoded(data: &[u8]) -> bool {
    match data {
        [] => true,
        // A trailing byte carrying only the sign bit (or nothing) is redundant
        // unless the previous byte needs its high bit for magnitude.
        [.., prev, last] if last & 0x7f == 0 => prev & 0x80 != 0,
        [last] => last & 0x7f != 0,
        _ => true,
    }
}
