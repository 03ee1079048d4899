//! Transfer function generation.
//!
//! The table maps every 8-bit sample value to a color and opacity. Opacity follows a
//! "tent" that rises from `alpha0` to 255 at `peak`, then falls back to `alpha1` at 255,
//! bent by `data_gamma`. Color bytes are stored already scaled by `alpha / 255`, which is
//! the form the ray-marching shader composites directly.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::color::validate_rgb;
use crate::error::Result;
use crate::params::Control;

/// Number of entries in a transfer function table.
pub const TABLE_SIZE: usize = 256;

/// Controls for the transfer function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferParams {
    /// Base opacity for values below the peak.
    pub alpha0: f32,
    /// Sample value of maximum opacity.
    pub peak: f32,
    /// Tent exponent; values below 1 widen the opaque region.
    pub data_gamma: f32,
    /// Base opacity for values at or above the peak.
    pub alpha1: f32,
    /// Data color, normalized RGB. Serialized as `#rrggbb`.
    #[serde(with = "crate::color::hex")]
    pub color: Vec3,
}

impl Default for TransferParams {
    fn default() -> Self {
        Self {
            alpha0: 0.0,
            peak: 217.0,
            data_gamma: 0.5,
            alpha1: 255.0,
            color: Vec3::new(1.0, 0.0, 1.0),
        }
    }
}

impl TransferParams {
    /// Checks every control against its documented domain.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Vol3dError::InvalidParameter`] for the first value out of range.
    pub fn validate(&self) -> Result<()> {
        Control::Alpha0.validate(self.alpha0)?;
        Control::Peak.validate(self.peak)?;
        Control::DataGamma.validate(self.data_gamma)?;
        Control::Alpha1.validate(self.alpha1)?;
        validate_rgb("color", self.color)?;
        Ok(())
    }
}

/// A 256-entry color and opacity lookup table.
#[derive(Clone, PartialEq, Eq)]
pub struct TransferTable {
    entries: [[u8; 4]; TABLE_SIZE],
}

impl std::fmt::Debug for TransferTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferTable")
            .field("first", &self.entries[0])
            .field("last", &self.entries[TABLE_SIZE - 1])
            .finish_non_exhaustive()
    }
}

impl TransferTable {
    /// Validates `params` and generates a table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Vol3dError::InvalidParameter`] if any control is out of range,
    /// in particular when `data_gamma <= 0`.
    pub fn generate(params: &TransferParams) -> Result<Self> {
        params.validate()?;
        Ok(Self::generate_unchecked(params))
    }

    /// Generates a table without validating `params`.
    ///
    /// A zero-width side of the tent (`peak == 0` or `peak == 255`) is treated as
    /// width 1.
    pub fn generate_unchecked(params: &TransferParams) -> Self {
        let mut entries = [[0u8; 4]; TABLE_SIZE];
        let peak = params.peak;
        let color = params.color * 255.0;

        for (i, entry) in entries.iter_mut().enumerate() {
            let fi = i as f32;
            let below = fi < peak;
            let (mut d, x, base) = if below {
                (peak, fi, params.alpha0)
            } else {
                (255.0 - peak, 255.0 - fi, params.alpha1)
            };
            if d == 0.0 {
                d = 1.0;
            }

            let y = x / d;
            let y_gamma = y.powf(1.0 / params.data_gamma);
            let alpha = (base + y_gamma * (255.0 - base)).clamp(0.0, 255.0).round();

            let scale = alpha / 255.0;
            *entry = [
                (color.x * scale) as u8,
                (color.y * scale) as u8,
                (color.z * scale) as u8,
                alpha as u8,
            ];
        }

        Self { entries }
    }

    /// Returns all entries as `[r, g, b, a]`.
    pub fn entries(&self) -> &[[u8; 4]; TABLE_SIZE] {
        &self.entries
    }

    /// Returns the entry for one sample value.
    pub fn get(&self, value: u8) -> [u8; 4] {
        self.entries[usize::from(value)]
    }

    /// Returns the table as tightly packed RGBA bytes.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use crate::error::Vol3dError;

    fn tent(peak: f32) -> TransferParams {
        TransferParams {
            alpha0: 0.0,
            peak,
            data_gamma: 1.0,
            alpha1: 255.0,
            color: Vec3::ONE,
        }
    }

    #[test]
    fn test_tent_rises_to_peak() {
        let table = TransferTable::generate(&tent(128.0)).unwrap();
        assert_eq!(table.get(0)[3], 0);
        assert_eq!(table.get(128)[3], 255);
        for i in 0..128u8 {
            assert!(table.get(i)[3] <= table.get(i + 1)[3], "alpha decreased at {i}");
        }
    }

    #[test]
    fn test_color_is_alpha_scaled() {
        let params = TransferParams {
            color: Vec3::new(1.0, 0.0, 0.5),
            ..tent(128.0)
        };
        let table = TransferTable::generate(&params).unwrap();
        assert_eq!(table.get(0), [0, 0, 0, 0]);
        assert_eq!(table.get(128), [255, 0, 127, 255]);
        let mid = table.get(64);
        assert_eq!(mid[3], 128);
        assert!((i32::from(mid[0]) - 128).abs() <= 1);
        assert_eq!(mid[1], 0);
    }

    #[test]
    fn test_peak_zero_does_not_divide_by_zero() {
        let table = TransferTable::generate(&tent(0.0)).unwrap();
        assert_eq!(table.get(0)[3], 255);
        for i in 0..255u8 {
            assert!(table.get(i)[3] >= table.get(i + 1)[3]);
        }
    }

    #[test]
    fn test_peak_full_does_not_divide_by_zero() {
        let params = TransferParams {
            alpha1: 0.0,
            ..tent(255.0)
        };
        let table = TransferTable::generate(&params).unwrap();
        for i in 0..254u8 {
            assert!(table.get(i)[3] <= table.get(i + 1)[3]);
        }
        assert_eq!(table.get(254)[3], 254);
        assert_eq!(table.get(255)[3], 0);
    }

    #[test]
    fn test_zero_data_gamma_is_invalid() {
        let params = TransferParams {
            data_gamma: 0.0,
            ..TransferParams::default()
        };
        assert!(matches!(
            TransferTable::generate(&params),
            Err(Vol3dError::InvalidParameter { name: "dataGamma", .. })
        ));
    }

    #[test]
    fn test_out_of_range_peak_is_invalid() {
        assert!(TransferTable::generate(&tent(300.0)).is_err());
        assert!(TransferTable::generate(&tent(-1.0)).is_err());
    }

    #[test]
    fn test_defaults_produce_magenta() {
        let table = TransferTable::generate(&TransferParams::default()).unwrap();
        let entry = table.get(217);
        assert_eq!(entry, [255, 0, 255, 255]);
        assert_eq!(table.as_bytes().len(), TABLE_SIZE * 4);
    }

    proptest! {
        #[test]
        fn prop_generation_is_pure(
            alpha0 in 0.0f32..=255.0,
            alpha1 in 0.0f32..=255.0,
            peak in 0u8..=255,
            data_gamma in 0.05f32..=6.0,
            r in 0.0f32..=1.0, g in 0.0f32..=1.0, b in 0.0f32..=1.0,
        ) {
            let params = TransferParams {
                alpha0,
                peak: f32::from(peak),
                data_gamma,
                alpha1,
                color: Vec3::new(r, g, b),
            };
            let first = TransferTable::generate(&params).unwrap();
            let second = TransferTable::generate(&params).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_rising_side_is_monotonic(peak in 1u8..=255, data_gamma in 0.05f32..=6.0) {
            let params = TransferParams { data_gamma, ..tent(f32::from(peak)) };
            let table = TransferTable::generate_unchecked(&params);
            for i in 0..peak {
                prop_assert!(table.get(i)[3] <= table.get(i.saturating_add(1))[3]);
            }
        }

        #[test]
        fn prop_color_never_exceeds_alpha(peak in 0u8..=255, data_gamma in 0.05f32..=6.0) {
            let table = TransferTable::generate_unchecked(&TransferParams {
                data_gamma,
                ..tent(f32::from(peak))
            });
            for entry in table.entries() {
                prop_assert!(entry[0] <= entry[3]);
            }
        }
    }
}
