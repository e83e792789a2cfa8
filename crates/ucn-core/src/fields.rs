//! Electromagnetic field sources.
//!
//! Fields are evaluated in cylindrical coordinates at a point and time.
//! The neutron couples to the gradient of the field magnitude through
//! its magnetic moment, so sources report `|B|` and its partial
//! derivatives alongside the components.

use serde::{Deserialize, Serialize};

/// Field evaluation at one point.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldValue {
    /// Magnetic field components (B_r, B_phi, B_z) in T.
    pub b: [f64; 3],
    /// Field magnitude |B| in T.
    pub babs: f64,
    /// Partial derivatives (d|B|/dr, d|B|/dphi, d|B|/dz). The phi
    /// component is the derivative with respect to the angle itself.
    pub grad_babs: [f64; 3],
    /// Electric field components (E_r, E_phi, E_z) in V/m.
    pub e: [f64; 3],
}

/// Anything that can be asked for a field value.
pub trait FieldSource: Send + Sync {
    fn evaluate(&self, r: f64, phi: f64, z: f64, t: f64) -> FieldValue;
}

/// Field-free region.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoField;

impl FieldSource for NoField {
    fn evaluate(&self, _r: f64, _phi: f64, _z: f64, _t: f64) -> FieldValue {
        FieldValue::default()
    }
}

/// Homogeneous magnetic and electric field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UniformField {
    /// (B_r, B_phi, B_z) in T.
    pub b: [f64; 3],
    /// (E_r, E_phi, E_z) in V/m.
    #[serde(default)]
    pub e: [f64; 3],
}

impl FieldSource for UniformField {
    fn evaluate(&self, _r: f64, _phi: f64, _z: f64, _t: f64) -> FieldValue {
        let babs = (self.b[0] * self.b[0] + self.b[1] * self.b[1] + self.b[2] * self.b[2]).sqrt();
        FieldValue {
            b: self.b,
            babs,
            grad_babs: [0.0; 3],
            e: self.e,
        }
    }
}

/// Axial field with a linear vertical gradient, B_z = b0 + k (z - z0).
///
/// The crude but analytic profile is enough for storage studies where
/// only the magnitude gradient along z matters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LinearGradientField {
    /// Field at the reference height (T).
    pub b0: f64,
    /// Vertical gradient d B_z / d z (T/m).
    pub gradient: f64,
    /// Reference height (m).
    #[serde(default)]
    pub z0: f64,
}

impl FieldSource for LinearGradientField {
    fn evaluate(&self, _r: f64, _phi: f64, z: f64, _t: f64) -> FieldValue {
        let bz = self.b0 + self.gradient * (z - self.z0);
        FieldValue {
            b: [0.0, 0.0, bz],
            babs: bz.abs(),
            grad_babs: [0.0, 0.0, self.gradient * bz.signum()],
            e: [0.0; 3],
        }
    }
}

/// Timing of the experiment phases (s). The magnetic field is off while
/// the trap fills and cleans, ramps up linearly, holds, and ramps back
/// down before counting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RampSchedule {
    #[serde(default)]
    pub filling_time: f64,
    #[serde(default)]
    pub cleaning_time: f64,
    #[serde(default)]
    pub ramp_up_time: f64,
    #[serde(default)]
    pub full_field_time: f64,
    #[serde(default)]
    pub ramp_down_time: f64,
}

impl RampSchedule {
    /// Field scaling factor in [0, 1] at time `t`.
    pub fn factor(&self, t: f64) -> f64 {
        let mut edge = self.filling_time + self.cleaning_time;
        if t < edge {
            return 0.0;
        }
        if self.ramp_up_time > 0.0 && t < edge + self.ramp_up_time {
            return (t - edge) / self.ramp_up_time;
        }
        edge += self.ramp_up_time;
        if t < edge + self.full_field_time {
            return 1.0;
        }
        edge += self.full_field_time;
        if self.ramp_down_time > 0.0 && t < edge + self.ramp_down_time {
            return 1.0 - (t - edge) / self.ramp_down_time;
        }
        0.0
    }
}

/// A field source whose magnetic part follows a ramp schedule. The
/// electric field is left unscaled.
pub struct RampedField<F> {
    pub inner: F,
    pub schedule: RampSchedule,
}

impl<F: FieldSource> FieldSource for RampedField<F> {
    fn evaluate(&self, r: f64, phi: f64, z: f64, t: f64) -> FieldValue {
        let mut value = self.inner.evaluate(r, phi, z, t);
        let factor = self.schedule.factor(t);
        for i in 0..3 {
            value.b[i] *= factor;
            value.grad_babs[i] *= factor;
        }
        value.babs *= factor;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_field_magnitude() {
        let f = UniformField {
            b: [0.0, 0.0, 2.0],
            e: [0.0; 3],
        };
        let v = f.evaluate(0.1, 0.0, 0.5, 0.0);
        assert_relative_eq!(v.babs, 2.0);
        assert_eq!(v.grad_babs, [0.0; 3]);
    }

    #[test]
    fn test_linear_gradient_field() {
        let f = LinearGradientField {
            b0: 1.0,
            gradient: 0.5,
            z0: 0.0,
        };
        let v = f.evaluate(0.0, 0.0, 2.0, 0.0);
        assert_relative_eq!(v.babs, 2.0);
        assert_relative_eq!(v.grad_babs[2], 0.5);
    }

    #[test]
    fn test_ramp_schedule_phases() {
        let s = RampSchedule {
            filling_time: 100.0,
            cleaning_time: 50.0,
            ramp_up_time: 10.0,
            full_field_time: 200.0,
            ramp_down_time: 20.0,
        };
        assert_eq!(s.factor(0.0), 0.0);
        assert_eq!(s.factor(149.0), 0.0);
        assert_relative_eq!(s.factor(155.0), 0.5);
        assert_eq!(s.factor(200.0), 1.0);
        assert_relative_eq!(s.factor(370.0), 0.5);
        assert_eq!(s.factor(500.0), 0.0);
    }

    #[test]
    fn test_ramped_field_scales_magnitude() {
        let ramped = RampedField {
            inner: UniformField {
                b: [0.0, 0.0, 2.0],
                e: [0.0, 0.0, 1.0],
            },
            schedule: RampSchedule {
                filling_time: 0.0,
                cleaning_time: 0.0,
                ramp_up_time: 10.0,
                full_field_time: 100.0,
                ramp_down_time: 0.0,
            },
        };
        let v = ramped.evaluate(0.0, 0.0, 0.0, 5.0);
        assert_relative_eq!(v.babs, 1.0);
        // Electric field stays on during the ramp.
        assert_relative_eq!(v.e[2], 1.0);
    }
}
