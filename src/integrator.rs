//! Discrete-time state integration: owns the evolving joint position and
//! velocity and advances them one sample step at a time using a
//! [`JointVelocityGenerator`]. This is the only place physical time enters
//! the model; the controllers themselves are stateless with respect to the
//! joint state.

extern crate nalgebra as na;

use na::DVector;
use tracing::trace;

use crate::error::RobotError;
use crate::generator::JointVelocityGenerator;

/// Fixed-step explicit Euler integrator over a joint-velocity generator.
///
/// One control loop owns one integrator; the integrator exclusively owns the
/// joint-state vectors (DH convention) and its generator.
pub struct JointVelocityIntegrator<G: JointVelocityGenerator> {
    generator: G,
    q_dh: DVector<f64>,
    qdot_dh: DVector<f64>,
    ts: f64,
}

/// Default sample period, 1 kHz control rate.
pub const DEFAULT_TS: f64 = 1e-3;

impl<G: JointVelocityGenerator> JointVelocityIntegrator<G> {
    /// Start from the initial configuration `q0_dh` with zero velocity.
    /// The sample period `ts` must be positive.
    pub fn new(generator: G, q0_dh: DVector<f64>, ts: f64) -> Result<Self, RobotError> {
        if !(ts > 0.0) {
            return Err(RobotError::Configuration(format!(
                "sample period must be positive, got {}",
                ts
            )));
        }
        let joints = q0_dh.len();
        Ok(JointVelocityIntegrator {
            generator,
            q_dh: q0_dh,
            qdot_dh: DVector::zeros(joints),
            ts,
        })
    }

    /// One control tick: query the generator at the current position and
    /// advance the state by explicit Euler.
    pub fn exec_single_step(&mut self) -> Result<(), RobotError> {
        self.qdot_dh = self.generator.generate_joint_velocity_dh(&self.q_dh)?;
        self.q_dh += &self.qdot_dh * self.ts;
        trace!(qdot_norm = self.qdot_dh.norm(), "integrator step");
        Ok(())
    }

    pub fn joints_dh(&self) -> &DVector<f64> {
        &self.q_dh
    }

    pub fn joints_vel_dh(&self) -> &DVector<f64> {
        &self.qdot_dh
    }

    pub fn ts(&self) -> f64 {
        self.ts
    }

    /// Re-seed the position state, e.g. from a measured configuration.
    pub fn set_joints_dh(&mut self, q_dh: DVector<f64>) -> Result<(), RobotError> {
        if q_dh.len() != self.q_dh.len() {
            return Err(RobotError::SizeMismatch {
                expected: self.q_dh.len(),
                found: q_dh.len(),
            });
        }
        self.q_dh = q_dh;
        Ok(())
    }

    /// Zero the velocity state without touching the position, e.g. after an
    /// emergency stop.
    pub fn reset_joints_vel(&mut self) {
        self.qdot_dh.fill(0.0);
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Mutable access to the generator, e.g. to update the tracked target
    /// between control ticks.
    pub fn generator_mut(&mut self) -> &mut G {
        &mut self.generator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Commands a constant joint velocity regardless of the configuration.
    struct ConstantVelocity(DVector<f64>);

    impl JointVelocityGenerator for ConstantVelocity {
        fn generate_joint_velocity_dh(
            &mut self,
            _q_dh: &DVector<f64>,
        ) -> Result<DVector<f64>, RobotError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_euler_advances_position() {
        let generator = ConstantVelocity(DVector::from_vec(vec![1.0, -2.0]));
        let mut integrator =
            JointVelocityIntegrator::new(generator, DVector::zeros(2), 0.001).expect("valid ts");

        for _ in 0..1000 {
            integrator.exec_single_step().expect("step");
        }
        // One second of integration
        assert!((integrator.joints_dh()[0] - 1.0).abs() < 1e-9);
        assert!((integrator.joints_dh()[1] - -2.0).abs() < 1e-9);
        assert!((integrator.joints_vel_dh()[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_reset_zeroes_velocity_only() {
        let generator = ConstantVelocity(DVector::from_vec(vec![1.0]));
        let mut integrator =
            JointVelocityIntegrator::new(generator, DVector::zeros(1), 0.01).expect("valid ts");
        integrator.exec_single_step().expect("step");
        assert!(integrator.joints_vel_dh()[0] != 0.0);

        let position = integrator.joints_dh()[0];
        integrator.reset_joints_vel();
        assert_eq!(integrator.joints_vel_dh()[0], 0.0);
        assert_eq!(integrator.joints_dh()[0], position);
    }

    #[test]
    fn test_rejects_non_positive_sample_period() {
        let generator = ConstantVelocity(DVector::zeros(1));
        assert!(JointVelocityIntegrator::new(generator, DVector::zeros(1), 0.0).is_err());
        let generator = ConstantVelocity(DVector::zeros(1));
        assert!(JointVelocityIntegrator::new(generator, DVector::zeros(1), -0.1).is_err());
    }

    #[test]
    fn test_set_joints_checks_size() {
        let generator = ConstantVelocity(DVector::zeros(2));
        let mut integrator =
            JointVelocityIntegrator::new(generator, DVector::zeros(2), DEFAULT_TS)
                .expect("valid ts");
        assert!(integrator.set_joints_dh(DVector::zeros(3)).is_err());
        assert!(integrator.set_joints_dh(DVector::from_vec(vec![0.1, 0.2])).is_ok());
        assert!((integrator.joints_dh()[1] - 0.2).abs() < 1e-12);
    }
}
