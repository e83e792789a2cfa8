//! Adaptive Cash-Karp Runge-Kutta integration.
//!
//! A macro step `[t0, t1]` is covered by a sequence of micro steps whose
//! sizes are controlled by the embedded 4th/5th order error estimate.
//! Every accepted micro step is reported back so the caller can run
//! collision checks on the piecewise-linear trajectory between them.

use thiserror::Error;

use crate::fields::FieldSource;
use crate::motion::{Equations, MotionError};
use crate::state::StateVector;

const SAFETY: f64 = 0.9;
const P_GROW: f64 = -0.2;
const P_SHRINK: f64 = -0.25;
/// Error threshold below which the step may grow by the full factor 5.
const ERRCON: f64 = 1.89e-4;
const TINY: f64 = 1e-30;

// Cash-Karp tableau.
const A: [f64; 5] = [0.2, 0.3, 0.6, 1.0, 0.875];
const B21: f64 = 0.2;
const B31: f64 = 3.0 / 40.0;
const B32: f64 = 9.0 / 40.0;
const B41: f64 = 0.3;
const B42: f64 = -0.9;
const B43: f64 = 1.2;
const B51: f64 = -11.0 / 54.0;
const B52: f64 = 2.5;
const B53: f64 = -70.0 / 27.0;
const B54: f64 = 35.0 / 27.0;
const B61: f64 = 1631.0 / 55296.0;
const B62: f64 = 175.0 / 512.0;
const B63: f64 = 575.0 / 13824.0;
const B64: f64 = 44275.0 / 110592.0;
const B65: f64 = 253.0 / 4096.0;
const C1: f64 = 37.0 / 378.0;
const C3: f64 = 250.0 / 621.0;
const C4: f64 = 125.0 / 594.0;
const C6: f64 = 512.0 / 1771.0;
const DC1: f64 = C1 - 2825.0 / 27648.0;
const DC3: f64 = C3 - 18575.0 / 48384.0;
const DC4: f64 = C4 - 13525.0 / 55296.0;
const DC5: f64 = -277.0 / 14336.0;
const DC6: f64 = C6 - 0.25;

/// Step-size control parameters.
#[derive(Debug, Clone, Copy)]
pub struct StepControl {
    /// Relative error tolerance per micro step.
    pub eps: f64,
    /// Smallest permitted micro step (s).
    pub h_min: f64,
    /// First trial step size (s).
    pub h_init: f64,
    /// Micro steps allowed per macro step before giving up.
    pub max_micro_steps: usize,
}

impl Default for StepControl {
    fn default() -> Self {
        Self {
            eps: 1e-13,
            h_min: 1e-12,
            h_init: 1e-5,
            max_micro_steps: 10_000,
        }
    }
}

/// One accepted micro step.
#[derive(Debug, Clone, Copy)]
pub struct MicroStep {
    pub t: f64,
    pub y: StateVector,
}

#[derive(Debug, Error)]
pub enum IntegratorError {
    #[error("Step size underflow at t = {t} (h = {h})")]
    StepSizeUnderflow { t: f64, h: f64 },

    #[error("More than {max} micro steps in macro step starting at t = {t}")]
    TooManySteps { t: f64, max: usize },

    #[error(transparent)]
    Motion(#[from] MotionError),
}

/// Adaptive integrator bound to one particle's equations and a field.
pub struct Integrator<'a> {
    equations: Equations,
    field: &'a dyn FieldSource,
    pub control: StepControl,
}

impl<'a> Integrator<'a> {
    pub fn new(equations: Equations, field: &'a dyn FieldSource, control: StepControl) -> Self {
        Self {
            equations,
            field,
            control,
        }
    }

    fn derivs(&self, t: f64, y: &StateVector) -> Result<StateVector, IntegratorError> {
        let field = self.field.evaluate(y[0], y[4], y[2], t);
        Ok(self.equations.derivs(t, y, &field)?)
    }

    /// One Cash-Karp step of size `h`, returning the 5th order solution
    /// and the embedded error estimate.
    fn rkck(
        &self,
        t: f64,
        y: &StateVector,
        dydt: &StateVector,
        h: f64,
    ) -> Result<(StateVector, StateVector), IntegratorError> {
        let mut ytemp = [0.0; 6];

        for i in 0..6 {
            ytemp[i] = y[i] + h * B21 * dydt[i];
        }
        let k2 = self.derivs(t + A[0] * h, &ytemp)?;

        for i in 0..6 {
            ytemp[i] = y[i] + h * (B31 * dydt[i] + B32 * k2[i]);
        }
        let k3 = self.derivs(t + A[1] * h, &ytemp)?;

        for i in 0..6 {
            ytemp[i] = y[i] + h * (B41 * dydt[i] + B42 * k2[i] + B43 * k3[i]);
        }
        let k4 = self.derivs(t + A[2] * h, &ytemp)?;

        for i in 0..6 {
            ytemp[i] = y[i] + h * (B51 * dydt[i] + B52 * k2[i] + B53 * k3[i] + B54 * k4[i]);
        }
        let k5 = self.derivs(t + A[3] * h, &ytemp)?;

        for i in 0..6 {
            ytemp[i] = y[i]
                + h * (B61 * dydt[i] + B62 * k2[i] + B63 * k3[i] + B64 * k4[i] + B65 * k5[i]);
        }
        let k6 = self.derivs(t + A[4] * h, &ytemp)?;

        let mut yout = [0.0; 6];
        let mut yerr = [0.0; 6];
        for i in 0..6 {
            yout[i] = y[i] + h * (C1 * dydt[i] + C3 * k3[i] + C4 * k4[i] + C6 * k6[i]);
            yerr[i] =
                h * (DC1 * dydt[i] + DC3 * k3[i] + DC4 * k4[i] + DC5 * k5[i] + DC6 * k6[i]);
        }
        Ok((yout, yerr))
    }

    /// One quality-controlled step: try `h_try`, shrink on failure,
    /// suggest the next step size on success. Returns
    /// `(t_new, y_new, h_did, h_next)`.
    fn rkqs(
        &self,
        t: f64,
        y: &StateVector,
        dydt: &StateVector,
        h_try: f64,
        yscal: &StateVector,
    ) -> Result<(f64, StateVector, f64, f64), IntegratorError> {
        let mut h = h_try;
        loop {
            let (yout, yerr) = self.rkck(t, y, dydt, h)?;
            let mut errmax: f64 = 0.0;
            for i in 0..6 {
                errmax = errmax.max((yerr[i] / yscal[i]).abs());
            }
            errmax /= self.control.eps;
            if errmax <= 1.0 {
                let h_next = if errmax > ERRCON {
                    SAFETY * h * errmax.powf(P_GROW)
                } else {
                    5.0 * h
                };
                return Ok((t + h, yout, h, h_next));
            }
            let h_temp = SAFETY * h * errmax.powf(P_SHRINK);
            h = if h >= 0.0 {
                h_temp.max(0.1 * h)
            } else {
                h_temp.min(0.1 * h)
            };
            if t + h == t {
                return Err(IntegratorError::StepSizeUnderflow { t, h });
            }
        }
    }

    /// Integrate from `(t0, y0)` to `t1`, starting with trial step
    /// `h_start`. Returns the accepted micro steps (excluding the start
    /// point) and the suggested step size for the next macro step.
    pub fn integrate(
        &self,
        t0: f64,
        y0: &StateVector,
        t1: f64,
        h_start: f64,
    ) -> Result<(Vec<MicroStep>, f64), IntegratorError> {
        let mut t = t0;
        let mut y = *y0;
        let mut h = h_start.min(t1 - t0).max(self.control.h_min);
        let mut steps = Vec::new();

        while t < t1 {
            if steps.len() >= self.control.max_micro_steps {
                return Err(IntegratorError::TooManySteps {
                    t: t0,
                    max: self.control.max_micro_steps,
                });
            }
            let dydt = self.derivs(t, &y)?;
            let mut yscal = [0.0; 6];
            for i in 0..6 {
                yscal[i] = y[i].abs() + (dydt[i] * h).abs() + TINY;
            }
            if t + h > t1 {
                h = t1 - t;
            }
            let (t_new, y_new, h_did, h_next) = self.rkqs(t, &y, &dydt, h, &yscal)?;
            if h_did < self.control.h_min {
                return Err(IntegratorError::StepSizeUnderflow { t, h: h_did });
            }
            t = t_new;
            y = y_new;
            h = h_next;
            steps.push(MicroStep { t, y });
        }
        Ok((steps, h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GRAVITY;
    use crate::fields::NoField;
    use crate::species::Species;
    use crate::state::{from_cartesian, position, velocity};
    use approx::assert_relative_eq;

    fn free_fall_integrator(field: &NoField) -> Integrator<'_> {
        Integrator::new(Equations::new(Species::Neutron), field, StepControl::default())
    }

    #[test]
    fn test_free_fall_matches_analytic_solution() {
        let field = NoField;
        let integ = free_fall_integrator(&field);
        let y0 = from_cartesian(&[0.1, 0.05, 1.0], &[0.3, 0.0, 0.0]);
        let (steps, _) = integ.integrate(0.0, &y0, 0.5, 1e-4).unwrap();
        let last = steps.last().unwrap();
        assert_relative_eq!(last.t, 0.5, epsilon = 1e-12);
        let p = position(&last.y);
        // z(t) = z0 - g t^2 / 2
        assert_relative_eq!(p[2], 1.0 - 0.5 * GRAVITY * 0.25, epsilon = 1e-8);
        // x(t) = x0 + vx t
        assert_relative_eq!(p[0], 0.1 + 0.3 * 0.5, epsilon = 1e-8);
        let v = velocity(&last.y);
        assert_relative_eq!(v[2], -GRAVITY * 0.5, epsilon = 1e-8);
    }

    #[test]
    fn test_energy_conserved_in_free_fall() {
        let field = NoField;
        let integ = free_fall_integrator(&field);
        let eq = Equations::new(Species::Neutron);
        let v0 = Species::Neutron.speed_from_energy(150e-9);
        let y0 = from_cartesian(&[0.2, 0.0, 0.3], &[0.0, v0 * 0.6, v0 * 0.8]);
        let fv = crate::fields::FieldValue::default();
        let e0 = eq.total_energy(&y0, &fv);
        let (steps, _) = integ.integrate(0.0, &y0, 1.0, 1e-4).unwrap();
        let e1 = eq.total_energy(&steps.last().unwrap().y, &fv);
        assert_relative_eq!(e1, e0, epsilon = 1e-15, max_relative = 1e-9);
    }

    #[test]
    fn test_micro_steps_are_monotone_and_end_exactly() {
        let field = NoField;
        let integ = free_fall_integrator(&field);
        let y0 = from_cartesian(&[0.1, 0.0, 0.5], &[1.0, 0.0, 0.0]);
        let (steps, h_next) = integ.integrate(0.0, &y0, 0.01, 1e-5).unwrap();
        let mut prev = 0.0;
        for s in &steps {
            assert!(s.t > prev);
            prev = s.t;
        }
        assert_relative_eq!(prev, 0.01, epsilon = 1e-15);
        assert!(h_next > 0.0);
    }

    #[test]
    fn test_step_count_limit() {
        let field = NoField;
        let mut integ = free_fall_integrator(&field);
        integ.control.max_micro_steps = 2;
        let y0 = from_cartesian(&[0.1, 0.0, 0.5], &[1.0, 0.0, 0.0]);
        let result = integ.integrate(0.0, &y0, 10.0, 1e-6);
        assert!(matches!(result, Err(IntegratorError::TooManySteps { .. })));
    }
}
