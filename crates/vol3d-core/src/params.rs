//! Scalar render controls, their documented ranges, and validation.

use serde::{Deserialize, Serialize};

use crate::error::{Result, Vol3dError};

/// A scalar control exposed to the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    /// Ray step size multiplier.
    DtScale,
    /// Global opacity multiplier.
    AlphaScale,
    /// Post-compositing gamma.
    FinalGamma,
    /// Resolution divisor while dragging.
    InteractionSpeedup,
    /// Data value at which the transfer function is most opaque.
    Peak,
    /// Exponent bending the transfer function tent.
    DataGamma,
    /// Base opacity below the peak.
    Alpha0,
    /// Base opacity above the peak.
    Alpha1,
}

/// Inclusive-or-exclusive numeric domain of a [`Control`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlRange {
    pub min: f32,
    pub max: f32,
    /// Whether `min` itself is outside the domain.
    pub min_exclusive: bool,
}

impl ControlRange {
    const fn closed(min: f32, max: f32) -> Self {
        Self {
            min,
            max,
            min_exclusive: false,
        }
    }

    /// Returns whether `value` lies in the domain.
    pub fn contains(&self, value: f32) -> bool {
        if !value.is_finite() || value > self.max {
            return false;
        }
        if self.min_exclusive {
            value > self.min
        } else {
            value >= self.min
        }
    }
}

impl Control {
    /// Returns the control's name as used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Control::DtScale => "dtScale",
            Control::AlphaScale => "alphaScale",
            Control::FinalGamma => "finalGamma",
            Control::InteractionSpeedup => "interactionSpeedup",
            Control::Peak => "peak",
            Control::DataGamma => "dataGamma",
            Control::Alpha0 => "alpha0",
            Control::Alpha1 => "alpha1",
        }
    }

    /// Returns the documented domain of the control.
    pub fn range(self) -> ControlRange {
        match self {
            Control::DtScale => ControlRange::closed(0.1, 10.0),
            Control::AlphaScale => ControlRange::closed(0.0, f32::MAX),
            Control::FinalGamma => ControlRange::closed(0.1, 1000.0),
            Control::InteractionSpeedup => ControlRange::closed(1.0, 20.0),
            Control::Peak | Control::Alpha0 | Control::Alpha1 => ControlRange::closed(0.0, 255.0),
            Control::DataGamma => ControlRange {
                min: 0.0,
                max: 6.0,
                min_exclusive: true,
            },
        }
    }

    /// Checks `value` against the control's domain.
    ///
    /// # Errors
    ///
    /// Returns [`Vol3dError::InvalidParameter`] if `value` is outside the domain.
    pub fn validate(self, value: f32) -> Result<f32> {
        let range = self.range();
        if range.contains(value) {
            Ok(value)
        } else {
            let open = if range.min_exclusive { '(' } else { '[' };
            Err(Vol3dError::invalid_parameter(
                self.name(),
                value,
                format!("expected a value in {open}{}, {}]", range.min, range.max),
            ))
        }
    }
}

/// A single change to a scalar control, as produced by a repeatable UI control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlChange {
    DtScale(f32),
    AlphaScale(f32),
    FinalGamma(f32),
    InteractionSpeedup(f32),
    Peak(f32),
    DataGamma(f32),
}

impl ControlChange {
    /// Returns which control this change targets.
    pub fn control(self) -> Control {
        match self {
            ControlChange::DtScale(_) => Control::DtScale,
            ControlChange::AlphaScale(_) => Control::AlphaScale,
            ControlChange::FinalGamma(_) => Control::FinalGamma,
            ControlChange::InteractionSpeedup(_) => Control::InteractionSpeedup,
            ControlChange::Peak(_) => Control::Peak,
            ControlChange::DataGamma(_) => Control::DataGamma,
        }
    }

    /// Returns the new value.
    pub fn value(self) -> f32 {
        match self {
            ControlChange::DtScale(v)
            | ControlChange::AlphaScale(v)
            | ControlChange::FinalGamma(v)
            | ControlChange::InteractionSpeedup(v)
            | ControlChange::Peak(v)
            | ControlChange::DataGamma(v) => v,
        }
    }

    /// Returns whether applying the change requires regenerating the transfer table.
    pub fn affects_transfer_function(self) -> bool {
        matches!(self, ControlChange::Peak(_) | ControlChange::DataGamma(_))
    }

    /// Validates the new value against the control's domain.
    ///
    /// # Errors
    ///
    /// Returns [`Vol3dError::InvalidParameter`] if the value is out of range.
    pub fn validate(self) -> Result<()> {
        self.control().validate(self.value()).map(|_| ())
    }
}

/// Mutable rendering parameters that feed the ray-marching shader.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderParams {
    /// Ray step size multiplier.
    pub dt_scale: f32,
    /// Global opacity multiplier.
    pub alpha_scale: f32,
    /// Gamma applied after compositing.
    pub final_gamma: f32,
    /// Whether gradient lighting is applied to volume samples.
    pub use_lighting: bool,
    /// Whether the volume is mirrored along X.
    pub use_volume_mirror_x: bool,
    /// Render resolution divisor while a drag is active.
    pub interaction_speedup: f32,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            dt_scale: 1.0,
            alpha_scale: 1.0,
            final_gamma: 4.5,
            use_lighting: true,
            use_volume_mirror_x: false,
            interaction_speedup: 1.0,
        }
    }
}

impl RenderParams {
    /// Checks every scalar field against its documented domain.
    ///
    /// # Errors
    ///
    /// Returns the first [`Vol3dError::InvalidParameter`] found.
    pub fn validate(&self) -> Result<()> {
        Control::DtScale.validate(self.dt_scale)?;
        Control::AlphaScale.validate(self.alpha_scale)?;
        Control::FinalGamma.validate(self.final_gamma)?;
        Control::InteractionSpeedup.validate(self.interaction_speedup)?;
        Ok(())
    }

    /// Sets the step size multiplier, keeping the old value on error.
    ///
    /// # Errors
    ///
    /// Returns [`Vol3dError::InvalidParameter`] if out of range.
    pub fn set_dt_scale(&mut self, value: f32) -> Result<()> {
        self.dt_scale = Control::DtScale.validate(value)?;
        Ok(())
    }

    /// Sets the opacity multiplier, keeping the old value on error.
    ///
    /// # Errors
    ///
    /// Returns [`Vol3dError::InvalidParameter`] if out of range.
    pub fn set_alpha_scale(&mut self, value: f32) -> Result<()> {
        self.alpha_scale = Control::AlphaScale.validate(value)?;
        Ok(())
    }

    /// Sets the final gamma, keeping the old value on error.
    ///
    /// # Errors
    ///
    /// Returns [`Vol3dError::InvalidParameter`] if out of range.
    pub fn set_final_gamma(&mut self, value: f32) -> Result<()> {
        self.final_gamma = Control::FinalGamma.validate(value)?;
        Ok(())
    }

    /// Sets the interaction speedup, keeping the old value on error.
    ///
    /// # Errors
    ///
    /// Returns [`Vol3dError::InvalidParameter`] if out of range.
    pub fn set_interaction_speedup(&mut self, value: f32) -> Result<()> {
        self.interaction_speedup = Control::InteractionSpeedup.validate(value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RenderParams::default().validate().is_ok());
    }

    #[test]
    fn test_data_gamma_zero_is_rejected() {
        assert!(Control::DataGamma.validate(0.0).is_err());
        assert!(Control::DataGamma.validate(0.01).is_ok());
        assert!(Control::DataGamma.validate(6.0).is_ok());
    }

    #[test]
    fn test_peak_range() {
        assert!(Control::Peak.validate(-1.0).is_err());
        assert!(Control::Peak.validate(256.0).is_err());
        assert!(Control::Peak.validate(0.0).is_ok());
        assert!(Control::Peak.validate(255.0).is_ok());
    }

    #[test]
    fn test_nan_is_rejected() {
        assert!(Control::AlphaScale.validate(f32::NAN).is_err());
    }

    #[test]
    fn test_setter_keeps_previous_value_on_error() {
        let mut params = RenderParams::default();
        params.set_dt_scale(2.0).unwrap();
        assert!(params.set_dt_scale(50.0).is_err());
        assert_eq!(params.dt_scale, 2.0);

        assert!(params.set_final_gamma(0.0).is_err());
        assert_eq!(params.final_gamma, 4.5);
    }

    #[test]
    fn test_control_change_routing() {
        let change = ControlChange::Peak(100.0);
        assert_eq!(change.control(), Control::Peak);
        assert_eq!(change.value(), 100.0);
        assert!(change.affects_transfer_function());
        assert!(!ControlChange::DtScale(1.0).affects_transfer_function());
        assert!(ControlChange::InteractionSpeedup(30.0).validate().is_err());
    }
}
