//! The fixed three-light rig shared by volume and surface shading.

use glam::Vec3;

/// Number of directional lights in the rig.
pub const LIGHT_COUNT: usize = 3;

/// A directional light. `direction` points from the scene toward the light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Vec3,
}

/// Three directional lights with fixed directions and colors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightRig {
    pub lights: [DirectionalLight; LIGHT_COUNT],
}

impl Default for LightRig {
    fn default() -> Self {
        Self {
            lights: [
                DirectionalLight {
                    direction: Vec3::new(-0.2, 1.0, 0.0).normalize(),
                    color: Vec3::new(0.9, 0.9, 0.9),
                },
                DirectionalLight {
                    direction: Vec3::new(-1.0, -1.0, 1.0).normalize(),
                    color: Vec3::new(0.4, 0.5, 0.6),
                },
                DirectionalLight {
                    direction: Vec3::new(1.0, -1.0, -1.0).normalize(),
                    color: Vec3::new(0.7, 0.8, 1.0),
                },
            ],
        }
    }
}

impl LightRig {
    /// Diffuse lighting for a unit normal, clamped to 1 per channel.
    pub fn lambert(&self, normal: Vec3) -> Vec3 {
        self.lights
            .iter()
            .map(|light| normal.dot(light.direction).max(0.0) * light.color)
            .sum::<Vec3>()
            .min(Vec3::ONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directions_are_normalized() {
        for light in LightRig::default().lights {
            assert!((light.direction.length() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_lambert_is_clamped() {
        let rig = LightRig::default();
        let lit = rig.lambert(Vec3::Y);
        assert!(lit.cmple(Vec3::ONE).all());
        assert!(lit.x > 0.8);
    }

    #[test]
    fn test_lambert_facing_away_is_dark() {
        let rig = LightRig {
            lights: [DirectionalLight {
                direction: Vec3::Z,
                color: Vec3::ONE,
            }; LIGHT_COUNT],
        };
        assert_eq!(rig.lambert(Vec3::NEG_Z), Vec3::ZERO);
    }
}
