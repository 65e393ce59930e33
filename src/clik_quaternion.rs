//! 6-DOF pose tracking task: position error plus quaternion orientation
//! error, with continuity handling for the unit-quaternion double cover.
//!
//! Unit quaternions represent each rotation twice (q and -q). Forward
//! kinematics alone cannot decide which representation to report, and a sign
//! flip between consecutive control ticks would look like a large
//! orientation error and cause a velocity-command discontinuity. The task
//! therefore carries the previous step's quaternion as a continuity
//! reference; it is instance state updated on every error computation, not a
//! control parameter.

extern crate nalgebra as na;

use std::sync::Arc;

use na::{DMatrix, DVector, UnitQuaternion, Vector3};

use crate::chain::KinematicChain;
use crate::clik::{Clik, ClikTask};
use crate::error::RobotError;
use crate::linalg::continuous_quaternion;

/// Pose task for a single chain: 3 position components plus 3 orientation
/// components taken from the vector part of the quaternion error.
pub struct QuaternionPoseTask {
    chain: Arc<KinematicChain>,
    desired_position: Vector3<f64>,
    desired_quaternion: UnitQuaternion<f64>,
    desired_linear_velocity: Vector3<f64>,
    desired_angular_velocity: Vector3<f64>,
    /// Continuity reference, updated on every error computation
    previous_quaternion: UnitQuaternion<f64>,
}

impl QuaternionPoseTask {
    /// Identity desired pose, zero desired twist.
    pub fn new(chain: Arc<KinematicChain>) -> Self {
        QuaternionPoseTask {
            chain,
            desired_position: Vector3::zeros(),
            desired_quaternion: UnitQuaternion::identity(),
            desired_linear_velocity: Vector3::zeros(),
            desired_angular_velocity: Vector3::zeros(),
            previous_quaternion: UnitQuaternion::identity(),
        }
    }

    pub fn set_desired_pose(&mut self, position: Vector3<f64>, orientation: UnitQuaternion<f64>) {
        self.desired_position = position;
        self.desired_quaternion = orientation;
    }

    pub fn set_desired_twist(&mut self, linear: Vector3<f64>, angular: Vector3<f64>) {
        self.desired_linear_velocity = linear;
        self.desired_angular_velocity = angular;
    }

    /// Zero both desired velocities, e.g. when switching from trajectory
    /// tracking to pure pose regulation.
    pub fn reset_desired_twist(&mut self) {
        self.desired_linear_velocity = Vector3::zeros();
        self.desired_angular_velocity = Vector3::zeros();
    }

    pub fn desired_position(&self) -> &Vector3<f64> {
        &self.desired_position
    }

    pub fn desired_quaternion(&self) -> &UnitQuaternion<f64> {
        &self.desired_quaternion
    }

    /// Re-seed the continuity reference from the measured configuration.
    /// Use after a discontinuous jump, e.g. when re-enabling control after
    /// a pause.
    pub fn reset_orientation_reference(&mut self, q_dh: &DVector<f64>) -> Result<(), RobotError> {
        self.previous_quaternion = self.chain.fkine(q_dh)?.rotation;
        Ok(())
    }
}

impl ClikTask for QuaternionPoseTask {
    fn clik_error(&mut self, q_dh: &DVector<f64>) -> Result<DVector<f64>, RobotError> {
        let b_t_e = self.chain.fkine(q_dh)?;
        let position = b_t_e.translation.vector;
        let current = continuous_quaternion(&b_t_e.rotation, &self.previous_quaternion);
        self.previous_quaternion = current;

        let delta = self.desired_quaternion * current.inverse();

        let mut error = DVector::zeros(6);
        error
            .fixed_rows_mut::<3>(0)
            .copy_from(&(self.desired_position - position));
        error.fixed_rows_mut::<3>(3).copy_from(&delta.vector());
        Ok(error)
    }

    fn clik_jacobian(&self, q_dh: &DVector<f64>) -> Result<DMatrix<f64>, RobotError> {
        self.chain.jacob_geometric(q_dh)
    }

    fn desired_cartesian_twist(&self, _q_dh: &DVector<f64>) -> DVector<f64> {
        let mut twist = DVector::zeros(6);
        twist
            .fixed_rows_mut::<3>(0)
            .copy_from(&self.desired_linear_velocity);
        twist
            .fixed_rows_mut::<3>(3)
            .copy_from(&self.desired_angular_velocity);
        twist
    }
}

/// CLIK controller specialized to the 6-DOF quaternion pose task.
pub type Clik6DQuaternion = Clik<QuaternionPoseTask>;

impl Clik6DQuaternion {
    /// Assemble a pose-tracking controller and its task over a shared chain.
    pub fn quaternion_pose(chain: Arc<KinematicChain>) -> Self {
        let task = QuaternionPoseTask::new(chain.clone());
        Clik::new(chain, task)
    }
}
