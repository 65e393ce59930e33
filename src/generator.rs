//! The joint-velocity generator capability and a posture-centering generator
//! suitable as a null-space secondary objective.

extern crate nalgebra as na;

use std::sync::Arc;

use na::DVector;

use crate::chain::KinematicChain;
use crate::error::RobotError;

/// Anything that maps a chain configuration (DH convention) to a
/// joint-velocity command. Implemented by the CLIK controller itself, which
/// is what allows one controller to recursively use another generator as its
/// null-space secondary objective.
///
/// Generators must not hold themselves, directly or transitively, as their
/// own secondary objective; this is a caller invariant, not checked at run
/// time.
pub trait JointVelocityGenerator {
    /// Joint-velocity command for the configuration `q_dh`. Fails with a
    /// configuration error if the vector size does not match the chain.
    fn generate_joint_velocity_dh(
        &mut self,
        q_dh: &DVector<f64>,
    ) -> Result<DVector<f64>, RobotError>;
}

impl<G: JointVelocityGenerator + ?Sized> JointVelocityGenerator for Box<G> {
    fn generate_joint_velocity_dh(
        &mut self,
        q_dh: &DVector<f64>,
    ) -> Result<DVector<f64>, RobotError> {
        (**self).generate_joint_velocity_dh(q_dh)
    }
}

/// Generator steering the joints toward a desired configuration, each joint
/// weighted and normalized by its soft-limit range: the gradient of a
/// weighted distance-from-centers cost. Joints with unbounded soft limits
/// contribute nothing. Intended as the null-space secondary objective of a
/// CLIK controller on a redundant chain.
pub struct JointVelocityTargetConfiguration {
    chain: Arc<KinematicChain>,
    desired_configuration: DVector<f64>,
    joint_weights: DVector<f64>,
}

impl JointVelocityTargetConfiguration {
    /// Zero desired configuration and zero weights; configure via the setters.
    pub fn new(chain: Arc<KinematicChain>) -> Self {
        let joints = chain.num_joints();
        JointVelocityTargetConfiguration {
            chain,
            desired_configuration: DVector::zeros(joints),
            joint_weights: DVector::zeros(joints),
        }
    }

    /// Desired configuration in DH convention.
    pub fn set_desired_configuration(
        &mut self,
        desired_configuration: DVector<f64>,
    ) -> Result<(), RobotError> {
        if desired_configuration.len() != self.chain.num_joints() {
            return Err(RobotError::SizeMismatch {
                expected: self.chain.num_joints(),
                found: desired_configuration.len(),
            });
        }
        self.desired_configuration = desired_configuration;
        Ok(())
    }

    pub fn desired_configuration(&self) -> &DVector<f64> {
        &self.desired_configuration
    }

    pub fn set_joint_weights(&mut self, joint_weights: DVector<f64>) -> Result<(), RobotError> {
        if joint_weights.len() != self.chain.num_joints() {
            return Err(RobotError::SizeMismatch {
                expected: self.chain.num_joints(),
                found: joint_weights.len(),
            });
        }
        self.joint_weights = joint_weights;
        Ok(())
    }

    pub fn joint_weights(&self) -> &DVector<f64> {
        &self.joint_weights
    }
}

impl JointVelocityGenerator for JointVelocityTargetConfiguration {
    fn generate_joint_velocity_dh(
        &mut self,
        q_dh: &DVector<f64>,
    ) -> Result<DVector<f64>, RobotError> {
        if q_dh.len() != self.chain.num_joints() {
            return Err(RobotError::SizeMismatch {
                expected: self.chain.num_joints(),
                found: q_dh.len(),
            });
        }

        let joints = self.chain.num_joints();
        let mut gradient = DVector::zeros(joints);
        let mut weight_sum = 0.0;
        for i in 0..joints {
            let joint = self.chain.joint(i);
            let (low, high) = joint.soft_limits();

            if low.is_infinite() || high.is_infinite() {
                gradient[i] = 0.0;
            } else {
                let (low, high) = joint.dh_soft_limits();
                gradient[i] = (q_dh[i] - self.desired_configuration[i]) / (high - low)
                    * self.joint_weights[i];
            }

            weight_sum += self.joint_weights[i];
        }

        if weight_sum == 0.0 {
            return Ok(DVector::zeros(joints));
        }
        Ok(gradient * (-1.0 / weight_sum))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::RevoluteJoint;

    fn limited_chain() -> Arc<KinematicChain> {
        let mut chain = KinematicChain::new("posture");
        for name in ["j1", "j2"] {
            chain.push_joint(Box::new(
                RevoluteJoint::new(0.0, 0.0, 0.0, name)
                    .with_limits((-2.0, 2.0), (-1.0, 1.0))
                    .expect("valid limits"),
            ));
        }
        Arc::new(chain)
    }

    #[test]
    fn test_pulls_toward_desired_configuration() {
        let mut generator = JointVelocityTargetConfiguration::new(limited_chain());
        generator
            .set_desired_configuration(DVector::zeros(2))
            .expect("size ok");
        generator
            .set_joint_weights(DVector::from_vec(vec![1.0, 1.0]))
            .expect("size ok");

        let q = DVector::from_vec(vec![0.5, -0.5]);
        let qdot = generator.generate_joint_velocity_dh(&q).expect("valid");
        // Displaced joints are pushed back toward the center
        assert!(qdot[0] < 0.0);
        assert!(qdot[1] > 0.0);
        // At the desired configuration the command is zero
        let at_target = generator
            .generate_joint_velocity_dh(&DVector::zeros(2))
            .expect("valid");
        assert!(at_target.norm() < 1e-12);
    }

    #[test]
    fn test_unbounded_joint_contributes_nothing() {
        let mut chain = KinematicChain::new("mixed");
        chain.push_joint(Box::new(RevoluteJoint::new(0.0, 0.0, 0.0, "free")));
        chain.push_joint(Box::new(
            RevoluteJoint::new(0.0, 0.0, 0.0, "bounded")
                .with_limits((-2.0, 2.0), (-1.0, 1.0))
                .expect("valid limits"),
        ));
        let mut generator = JointVelocityTargetConfiguration::new(Arc::new(chain));
        generator
            .set_joint_weights(DVector::from_vec(vec![1.0, 1.0]))
            .expect("size ok");

        let q = DVector::from_vec(vec![5.0, 0.5]);
        let qdot = generator.generate_joint_velocity_dh(&q).expect("valid");
        assert_eq!(qdot[0], 0.0);
        assert!(qdot[1] != 0.0);
    }

    #[test]
    fn test_zero_weights_give_zero_command() {
        let mut generator = JointVelocityTargetConfiguration::new(limited_chain());
        let q = DVector::from_vec(vec![0.5, 0.5]);
        let qdot = generator.generate_joint_velocity_dh(&q).expect("valid");
        assert_eq!(qdot.norm(), 0.0);
    }

    #[test]
    fn test_rejects_wrong_sizes() {
        let mut generator = JointVelocityTargetConfiguration::new(limited_chain());
        assert!(generator.set_desired_configuration(DVector::zeros(3)).is_err());
        assert!(generator.set_joint_weights(DVector::zeros(1)).is_err());
        assert!(generator
            .generate_joint_velocity_dh(&DVector::zeros(5))
            .is_err());
    }
}
