//! Closed-loop inverse kinematics: damped-least-squares differential
//! inversion of a task Jacobian, null-space composition of a secondary
//! objective, fixed-joint elimination and safety-limit enforcement.
//!
//! The controller is generic over a [`ClikTask`] that defines the task error,
//! the task Jacobian and the desired task-space twist; everything numeric and
//! safety-related lives here and works for any task dimension. The controller
//! itself implements [`JointVelocityGenerator`], so a CLIK instance can serve
//! as the null-space secondary objective of another CLIK instance.

extern crate nalgebra as na;

use std::sync::Arc;

use bitflags::bitflags;
use na::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::chain::KinematicChain;
use crate::error::{LimitKind, RobotError};
use crate::generator::JointVelocityGenerator;
use crate::linalg::{non_finite_entries, null_space_projector, pinv_dls};

/// Task specialization consumed by the CLIK controller: the task error, the
/// task Jacobian and the desired task-space twist at a given configuration
/// (DH convention). The error computation may carry per-instance state (the
/// quaternion continuity reference of the 6-DOF pose task does), hence
/// `&mut self`.
pub trait ClikTask {
    fn clik_error(&mut self, q_dh: &DVector<f64>) -> Result<DVector<f64>, RobotError>;

    fn clik_jacobian(&self, q_dh: &DVector<f64>) -> Result<DMatrix<f64>, RobotError>;

    fn desired_cartesian_twist(&self, q_dh: &DVector<f64>) -> DVector<f64>;
}

bitflags! {
    /// Which limit categories the safety check enforces. Non-finite values
    /// are always fatal and are not governed by these flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SafetyChecks: u8 {
        const HARD_POSITION = 1;
        const HARD_VELOCITY = 1 << 1;
        const SOFT_POSITION = 1 << 2;
        const SOFT_VELOCITY = 1 << 3;
    }
}

impl Default for SafetyChecks {
    /// Hard limits enforced, soft limits advisory.
    fn default() -> Self {
        SafetyChecks::HARD_POSITION | SafetyChecks::HARD_VELOCITY
    }
}

/// The closed-loop inverse-kinematics controller.
///
/// Stateless with respect to the joint position and velocity: temporal
/// integration belongs to
/// [`JointVelocityIntegrator`](crate::integrator::JointVelocityIntegrator),
/// which queries this controller once per control tick.
pub struct Clik<T: ClikTask> {
    chain: Arc<KinematicChain>,
    task: T,
    gain_error: f64,
    gain_null_space: f64,
    dls_joint_speed_saturation: f64,
    /// Sorted, unique, DH-convention joint indices excluded from the solve
    fixed_joints: Vec<usize>,
    checks: SafetyChecks,
    desired_twist_only: bool,
    secondary: Option<Box<dyn JointVelocityGenerator>>,
}

impl<T: ClikTask> Clik<T> {
    /// Controller with zero gains, default damping saturation, no fixed
    /// joints, hard-limit checks enabled and no secondary objective.
    pub fn new(chain: Arc<KinematicChain>, task: T) -> Self {
        Clik {
            chain,
            task,
            gain_error: 0.0,
            gain_null_space: 0.0,
            dls_joint_speed_saturation: 3.0,
            fixed_joints: Vec::new(),
            checks: SafetyChecks::default(),
            desired_twist_only: false,
            secondary: None,
        }
    }

    pub fn chain(&self) -> &Arc<KinematicChain> {
        &self.chain
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn task_mut(&mut self) -> &mut T {
        &mut self.task
    }

    /*========SETTERS============*/

    /// Gain on the task error. Negative gains are rejected.
    pub fn set_gain_error(&mut self, gain_error: f64) -> Result<(), RobotError> {
        if gain_error < 0.0 {
            return Err(RobotError::Configuration(format!(
                "task error gain must be non-negative, got {}",
                gain_error
            )));
        }
        self.gain_error = gain_error;
        Ok(())
    }

    pub fn gain_error(&self) -> f64 {
        self.gain_error
    }

    /// Gain on the null-space secondary objective. Negative gains are
    /// rejected; zero disables the null-space term entirely.
    pub fn set_gain_null_space(&mut self, gain_null_space: f64) -> Result<(), RobotError> {
        if gain_null_space < 0.0 {
            return Err(RobotError::Configuration(format!(
                "null space gain must be non-negative, got {}",
                gain_null_space
            )));
        }
        self.gain_null_space = gain_null_space;
        Ok(())
    }

    pub fn gain_null_space(&self) -> f64 {
        self.gain_null_space
    }

    /// Joint-speed saturation shaping the adaptive damping: the damping
    /// factor is the commanded task-velocity norm divided by this constant,
    /// so damping grows exactly when the chain is asked to move fast.
    pub fn set_dls_joint_speed_saturation(
        &mut self,
        dls_joint_speed_saturation: f64,
    ) -> Result<(), RobotError> {
        if !(dls_joint_speed_saturation > 0.0) {
            return Err(RobotError::Configuration(format!(
                "DLS joint speed saturation must be positive, got {}",
                dls_joint_speed_saturation
            )));
        }
        self.dls_joint_speed_saturation = dls_joint_speed_saturation;
        Ok(())
    }

    pub fn dls_joint_speed_saturation(&self) -> f64 {
        self.dls_joint_speed_saturation
    }

    /// Joints excluded from the solve; their commanded velocity is forced to
    /// zero. Indices refer to the DH-convention joint vector, are stored
    /// sorted, and must be unique and in range.
    pub fn set_fixed_joints(&mut self, fixed_joints: &[usize]) -> Result<(), RobotError> {
        let mut sorted = fixed_joints.to_vec();
        sorted.sort_unstable();
        for window in sorted.windows(2) {
            if window[0] == window[1] {
                return Err(RobotError::Configuration(format!(
                    "duplicate fixed joint index {}",
                    window[0]
                )));
            }
        }
        if let Some(&last) = sorted.last() {
            if last >= self.chain.num_joints() {
                return Err(RobotError::InvalidJointIndex {
                    index: last,
                    joints: self.chain.num_joints(),
                });
            }
        }
        self.fixed_joints = sorted;
        Ok(())
    }

    pub fn fixed_joints(&self) -> &[usize] {
        &self.fixed_joints
    }

    pub fn all_joints_active(&self) -> bool {
        self.fixed_joints.is_empty()
    }

    pub fn set_safety_checks(&mut self, checks: SafetyChecks) {
        self.checks = checks;
    }

    pub fn safety_checks(&self) -> SafetyChecks {
        self.checks
    }

    /// In desired-twist-only mode the task error term is omitted entirely:
    /// pure velocity feed-forward, no pose regulation.
    pub fn set_desired_twist_only(&mut self, desired_twist_only: bool) {
        self.desired_twist_only = desired_twist_only;
    }

    pub fn desired_twist_only(&self) -> bool {
        self.desired_twist_only
    }

    /// Secondary objective evaluated at the same configuration and projected
    /// into the task null space. The controller owns its secondary generator.
    pub fn set_secondary_generator(&mut self, generator: Box<dyn JointVelocityGenerator>) {
        self.secondary = Some(generator);
    }

    pub fn clear_secondary_generator(&mut self) {
        self.secondary = None;
    }

    /*========FIXED JOINT ELIMINATION=========*/

    /// Copy of `qdot` with the fixed-joint entries removed. Expects the
    /// full-size joint vector.
    pub fn joint_vel_remove_fixed(&self, qdot: &DVector<f64>) -> DVector<f64> {
        let mut out = Vec::with_capacity(qdot.len() - self.fixed_joints.len());
        for (i, &value) in qdot.iter().enumerate() {
            if self.fixed_joints.binary_search(&i).is_err() {
                out.push(value);
            }
        }
        DVector::from_vec(out)
    }

    /// Inverse of [`Clik::joint_vel_remove_fixed`]: re-insert an exact zero
    /// at every fixed-joint index.
    pub fn joint_vel_add_zeros_for_fixed(&self, qdot: &DVector<f64>) -> DVector<f64> {
        let total = qdot.len() + self.fixed_joints.len();
        let mut out = DVector::zeros(total);
        let mut source = 0;
        for i in 0..total {
            if self.fixed_joints.binary_search(&i).is_err() {
                out[i] = qdot[source];
                source += 1;
            }
        }
        out
    }

    /// Copy of the task Jacobian with the fixed-joint columns removed.
    pub fn jacobian_remove_fixed(&self, jacobian: &DMatrix<f64>) -> DMatrix<f64> {
        let keep: Vec<usize> = (0..jacobian.ncols())
            .filter(|column| self.fixed_joints.binary_search(column).is_err())
            .collect();
        let mut out = DMatrix::zeros(jacobian.nrows(), keep.len());
        for (k, &column) in keep.iter().enumerate() {
            out.set_column(k, &jacobian.column(column));
        }
        out
    }

    /*========CLIK=========*/

    /// The raw differential-IK step on whatever joints the Jacobian covers:
    /// damped least-squares inversion of the commanded task velocity, plus
    /// the null-space term when its gain is nonzero.
    fn clik_qdot_raw(
        &self,
        vel_e: &DVector<f64>,
        jacobian: &DMatrix<f64>,
        qdot_secondary: &DVector<f64>,
    ) -> DVector<f64> {
        let damping = vel_e.norm() / self.dls_joint_speed_saturation;
        let jacobian_pinv = pinv_dls(jacobian, damping);
        let mut qdot = &jacobian_pinv * vel_e;

        if self.gain_null_space != 0.0 {
            qdot += self.gain_null_space
                * null_space_projector(jacobian, &jacobian_pinv)
                * qdot_secondary;
        }

        debug!(damping, qdot_norm = qdot.norm(), "clik solve");
        qdot
    }

    /// The differential-IK step with fixed-joint elimination: the reduced
    /// solve runs on the active joints only and zeros are re-inserted at the
    /// fixed indices afterwards.
    fn clik_qdot(
        &self,
        vel_e: &DVector<f64>,
        jacobian: &DMatrix<f64>,
        qdot_secondary: &DVector<f64>,
    ) -> DVector<f64> {
        if self.all_joints_active() {
            return self.clik_qdot_raw(vel_e, jacobian, qdot_secondary);
        }
        let reduced = self.clik_qdot_raw(
            vel_e,
            &self.jacobian_remove_fixed(jacobian),
            &self.joint_vel_remove_fixed(qdot_secondary),
        );
        self.joint_vel_add_zeros_for_fixed(&reduced)
    }

    /*========SAFETY=========*/

    fn limit_violation(
        kind: LimitKind,
        flags: &[bool],
        values: &DVector<f64>,
    ) -> Result<(), RobotError> {
        if !flags.contains(&true) {
            return Ok(());
        }
        let joints: Vec<usize> = flags
            .iter()
            .enumerate()
            .filter_map(|(i, &violated)| violated.then_some(i))
            .collect();
        let values: Vec<f64> = joints.iter().map(|&i| values[i]).collect();
        warn!(%kind, ?joints, "safety check failed");
        Err(RobotError::LimitViolation { kind, joints, values })
    }

    /// Fail-fast verification of a joint state (DH convention), typically
    /// invoked by the control loop after each integration step.
    ///
    /// Non-finite values in either vector are always fatal regardless of the
    /// configured checks. Then hard-position, hard-velocity, soft-position
    /// and soft-velocity limits are checked in that order, each only if the
    /// corresponding [`SafetyChecks`] flag is enabled, short-circuiting on
    /// the first violation. Limit comparison is delegated to the chain in
    /// robot convention; reported values are robot-convention values of the
    /// violating joints.
    pub fn safety_check(
        &self,
        q_dh: &DVector<f64>,
        qdot_dh: &DVector<f64>,
    ) -> Result<(), RobotError> {
        let (joints, values) = non_finite_entries(q_dh);
        if !joints.is_empty() {
            return Err(RobotError::NonFinite { what: "joint positions", joints, values });
        }
        let (joints, values) = non_finite_entries(qdot_dh);
        if !joints.is_empty() {
            return Err(RobotError::NonFinite { what: "joint velocities", joints, values });
        }

        let q_robot = self.chain.joints_dh2robot(q_dh)?;
        let qdot_robot = self.chain.jointsvel_dh2robot(qdot_dh)?;

        if self.checks.contains(SafetyChecks::HARD_POSITION) {
            let flags = self.chain.check_hard_joint_limits(&q_robot)?;
            Self::limit_violation(LimitKind::HardPosition, &flags, &q_robot)?;
        }
        if self.checks.contains(SafetyChecks::HARD_VELOCITY) {
            let flags = self.chain.check_hard_velocity_limits(&qdot_robot)?;
            Self::limit_violation(LimitKind::HardVelocity, &flags, &qdot_robot)?;
        }
        if self.checks.contains(SafetyChecks::SOFT_POSITION) {
            let flags = self.chain.check_soft_joint_limits(&q_robot)?;
            Self::limit_violation(LimitKind::SoftPosition, &flags, &q_robot)?;
        }
        if self.checks.contains(SafetyChecks::SOFT_VELOCITY) {
            let flags = self.chain.check_soft_velocity_limits(&qdot_robot)?;
            Self::limit_violation(LimitKind::SoftVelocity, &flags, &qdot_robot)?;
        }
        Ok(())
    }
}

impl<T: ClikTask> JointVelocityGenerator for Clik<T> {
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

        let jacobian = self.task.clik_jacobian(q_dh)?;
        let desired_twist = self.task.desired_cartesian_twist(q_dh);

        // Commanded task velocity: feed-forward plus proportional feedback,
        // or feed-forward alone in desired-twist-only mode.
        let vel_e = if self.desired_twist_only {
            desired_twist
        } else {
            desired_twist + self.gain_error * self.task.clik_error(q_dh)?
        };

        let qdot_secondary = match &mut self.secondary {
            Some(generator) => generator.generate_joint_velocity_dh(q_dh)?,
            None => DVector::zeros(q_dh.len()),
        };

        Ok(self.clik_qdot(&vel_e, &jacobian, &qdot_secondary))
    }
}
