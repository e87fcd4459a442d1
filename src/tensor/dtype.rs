//! Element types
//!
//! Closed set of element types carried by graph values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Element type of a tensor value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    /// 32-bit IEEE float
    #[default]
    F32,
    /// 16-bit IEEE float
    F16,
    /// bfloat16
    BF16,
    /// Signed 8-bit integer
    I8,
    /// Unsigned 8-bit integer
    U8,
    /// Signed 32-bit integer
    I32,
    /// Signed 64-bit integer
    I64,
    /// Boolean
    Bool,
}

impl ElementType {
    /// Size in bits of one element
    pub fn bit_width(self) -> u32 {
        match self {
            Self::F32 | Self::I32 => 32,
            Self::F16 | Self::BF16 => 16,
            Self::I8 | Self::U8 | Self::Bool => 8,
            Self::I64 => 64,
        }
    }

    /// Check if data type is floating point
    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F16 | Self::BF16)
    }

    /// Check if data type is integer
    pub fn is_int(self) -> bool {
        matches!(self, Self::I8 | Self::U8 | Self::I32 | Self::I64)
    }

    /// Check if data type is signed
    pub fn is_signed(self) -> bool {
        !matches!(self, Self::U8 | Self::Bool)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::F32 => "f32",
            Self::F16 => "f16",
            Self::BF16 => "bf16",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::Bool => "bool",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_width() {
        assert_eq!(ElementType::F32.bit_width(), 32);
        assert_eq!(ElementType::U8.bit_width(), 8);
        assert_eq!(ElementType::I64.bit_width(), 64);
    }

    #[test]
    fn test_categories() {
        assert!(ElementType::F16.is_float());
        assert!(!ElementType::I8.is_float());
        assert!(ElementType::I8.is_int());
        assert!(ElementType::I8.is_signed());
        assert!(!ElementType::U8.is_signed());
    }

    #[test]
    fn test_display() {
        assert_eq!(ElementType::BF16.to_string(), "bf16");
    }
}
