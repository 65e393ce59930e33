//! Per-joint model: Denavit-Hartenberg transforms, position and velocity
//! limits, and the conversion between the robot and the DH joint convention.
//!
//! Hardware vendors specify joint values and limits in the "robot" convention
//! while the kinematic model works in the DH convention; the two are related
//! per joint by an affine map `q_DH = sign * q_Robot + offset` with
//! `sign` either 1 or -1. Limits are stored in robot convention; the DH
//! counterparts are obtained by pushing them through the map and reordering
//! so that lower <= upper.

extern crate nalgebra as na;

use na::{Isometry3, Matrix3, Rotation3, Translation3, UnitQuaternion};

use crate::error::RobotError;

/// Kind of a serial-chain joint. The Jacobian column rules branch on this
/// and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointType {
    Revolute,
    Prismatic,
}

/// Homogeneous transform of one standard DH row:
/// `A = RotZ(theta) * TransZ(d) * TransX(a) * RotX(alpha)`.
pub fn dh_transform(a: f64, alpha: f64, d: f64, theta: f64) -> Isometry3<f64> {
    let (st, ct) = theta.sin_cos();
    let (sa, ca) = alpha.sin_cos();

    let rotation = Matrix3::new(
        ct, -st * ca, st * sa,
        st, ct * ca, -ct * sa,
        0.0, sa, ca,
    );

    Isometry3::from_parts(
        Translation3::new(a * ct, a * st, d),
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation)),
    )
}

/// One joint of a serial chain as the kinematic core consumes it: its type,
/// its transform as a function of the scalar joint variable (DH convention),
/// its limits (robot convention) and the robot/DH conversion.
///
/// Limit pairs are `(lower, upper)`; an unbounded joint reports infinities.
pub trait Joint {
    fn joint_type(&self) -> JointType;

    /// Transform of this joint's frame w.r.t. the previous frame, as a
    /// function of the joint variable in DH convention.
    fn transform(&self, q_dh: f64) -> Isometry3<f64>;

    fn name(&self) -> &str;

    /// Sign of the robot to DH map, 1.0 or -1.0.
    fn robot2dh_sign(&self) -> f64;

    /// Offset of the robot to DH map.
    fn robot2dh_offset(&self) -> f64;

    /// Hard (physical) position limits, robot convention.
    fn hard_limits(&self) -> (f64, f64);

    /// Soft (advisory) position limits, robot convention.
    fn soft_limits(&self) -> (f64, f64);

    /// Hard velocity limits.
    fn hard_velocity_limits(&self) -> (f64, f64);

    /// Soft velocity limits.
    fn soft_velocity_limits(&self) -> (f64, f64);

    fn joint_robot2dh(&self, q_robot: f64) -> f64 {
        self.robot2dh_sign() * q_robot + self.robot2dh_offset()
    }

    fn joint_dh2robot(&self, q_dh: f64) -> f64 {
        (q_dh - self.robot2dh_offset()) / self.robot2dh_sign()
    }

    /// Velocities are unaffected by the offset, only by the sign.
    fn jointvel_robot2dh(&self, qdot_robot: f64) -> f64 {
        self.robot2dh_sign() * qdot_robot
    }

    fn jointvel_dh2robot(&self, qdot_dh: f64) -> f64 {
        qdot_dh / self.robot2dh_sign()
    }

    /// Hard position limits pushed through the robot to DH conversion,
    /// reordered so that lower <= upper.
    fn dh_hard_limits(&self) -> (f64, f64) {
        let (low, high) = self.hard_limits();
        sorted_pair(self.joint_robot2dh(low), self.joint_robot2dh(high))
    }

    /// Soft position limits in DH convention, reordered so that lower <= upper.
    fn dh_soft_limits(&self) -> (f64, f64) {
        let (low, high) = self.soft_limits();
        sorted_pair(self.joint_robot2dh(low), self.joint_robot2dh(high))
    }

    fn exceeded_hard_limit(&self, q_robot: f64) -> bool {
        let (low, high) = self.hard_limits();
        q_robot < low || q_robot > high
    }

    fn exceeded_soft_limit(&self, q_robot: f64) -> bool {
        let (low, high) = self.soft_limits();
        q_robot < low || q_robot > high
    }

    fn exceeded_hard_velocity_limit(&self, qdot_robot: f64) -> bool {
        let (low, high) = self.hard_velocity_limits();
        qdot_robot < low || qdot_robot > high
    }

    fn exceeded_soft_velocity_limit(&self, qdot_robot: f64) -> bool {
        let (low, high) = self.soft_velocity_limits();
        qdot_robot < low || qdot_robot > high
    }
}

fn sorted_pair(a: f64, b: f64) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}

const UNLIMITED: (f64, f64) = (f64::NEG_INFINITY, f64::INFINITY);

fn check_limit_pair(what: &str, pair: (f64, f64)) -> Result<(), RobotError> {
    if pair.0 > pair.1 {
        return Err(RobotError::Configuration(format!(
            "{} limits are reversed: ({}, {})", what, pair.0, pair.1
        )));
    }
    Ok(())
}

fn check_sign(sign: f64) -> Result<(), RobotError> {
    if sign != 1.0 && sign != -1.0 {
        return Err(RobotError::Configuration(format!(
            "robot2dh sign must be 1 or -1, got {}", sign
        )));
    }
    Ok(())
}

/// A revolute joint in standard DH parameterization: `theta` is the joint
/// variable, `a`, `alpha` and `d` are fixed.
#[derive(Debug, Clone)]
pub struct RevoluteJoint {
    a: f64,
    alpha: f64,
    d: f64,
    robot2dh_offset: f64,
    robot2dh_sign: f64,
    hard_limits: (f64, f64),
    soft_limits: (f64, f64),
    hard_velocity_limits: (f64, f64),
    soft_velocity_limits: (f64, f64),
    name: String,
}

impl RevoluteJoint {
    /// Unlimited joint with an identity robot/DH conversion.
    pub fn new(a: f64, alpha: f64, d: f64, name: &str) -> Self {
        RevoluteJoint {
            a,
            alpha,
            d,
            robot2dh_offset: 0.0,
            robot2dh_sign: 1.0,
            hard_limits: UNLIMITED,
            soft_limits: UNLIMITED,
            hard_velocity_limits: UNLIMITED,
            soft_velocity_limits: UNLIMITED,
            name: name.to_string(),
        }
    }

    pub fn with_limits(mut self, hard: (f64, f64), soft: (f64, f64)) -> Result<Self, RobotError> {
        check_limit_pair("hard position", hard)?;
        check_limit_pair("soft position", soft)?;
        self.hard_limits = hard;
        self.soft_limits = soft;
        Ok(self)
    }

    pub fn with_velocity_limits(
        mut self,
        hard: (f64, f64),
        soft: (f64, f64),
    ) -> Result<Self, RobotError> {
        check_limit_pair("hard velocity", hard)?;
        check_limit_pair("soft velocity", soft)?;
        self.hard_velocity_limits = hard;
        self.soft_velocity_limits = soft;
        Ok(self)
    }

    pub fn with_robot_convention(mut self, offset: f64, sign: f64) -> Result<Self, RobotError> {
        check_sign(sign)?;
        self.robot2dh_offset = offset;
        self.robot2dh_sign = sign;
        Ok(self)
    }
}

impl Joint for RevoluteJoint {
    fn joint_type(&self) -> JointType {
        JointType::Revolute
    }

    fn transform(&self, q_dh: f64) -> Isometry3<f64> {
        dh_transform(self.a, self.alpha, self.d, q_dh)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn robot2dh_sign(&self) -> f64 {
        self.robot2dh_sign
    }

    fn robot2dh_offset(&self) -> f64 {
        self.robot2dh_offset
    }

    fn hard_limits(&self) -> (f64, f64) {
        self.hard_limits
    }

    fn soft_limits(&self) -> (f64, f64) {
        self.soft_limits
    }

    fn hard_velocity_limits(&self) -> (f64, f64) {
        self.hard_velocity_limits
    }

    fn soft_velocity_limits(&self) -> (f64, f64) {
        self.soft_velocity_limits
    }
}

/// A prismatic joint in standard DH parameterization: `d` is the joint
/// variable, `a`, `alpha` and `theta` are fixed.
#[derive(Debug, Clone)]
pub struct PrismaticJoint {
    a: f64,
    alpha: f64,
    theta: f64,
    robot2dh_offset: f64,
    robot2dh_sign: f64,
    hard_limits: (f64, f64),
    soft_limits: (f64, f64),
    hard_velocity_limits: (f64, f64),
    soft_velocity_limits: (f64, f64),
    name: String,
}

impl PrismaticJoint {
    /// Unlimited joint with an identity robot/DH conversion.
    pub fn new(a: f64, alpha: f64, theta: f64, name: &str) -> Self {
        PrismaticJoint {
            a,
            alpha,
            theta,
            robot2dh_offset: 0.0,
            robot2dh_sign: 1.0,
            hard_limits: UNLIMITED,
            soft_limits: UNLIMITED,
            hard_velocity_limits: UNLIMITED,
            soft_velocity_limits: UNLIMITED,
            name: name.to_string(),
        }
    }

    pub fn with_limits(mut self, hard: (f64, f64), soft: (f64, f64)) -> Result<Self, RobotError> {
        check_limit_pair("hard position", hard)?;
        check_limit_pair("soft position", soft)?;
        self.hard_limits = hard;
        self.soft_limits = soft;
        Ok(self)
    }

    pub fn with_velocity_limits(
        mut self,
        hard: (f64, f64),
        soft: (f64, f64),
    ) -> Result<Self, RobotError> {
        check_limit_pair("hard velocity", hard)?;
        check_limit_pair("soft velocity", soft)?;
        self.hard_velocity_limits = hard;
        self.soft_velocity_limits = soft;
        Ok(self)
    }

    pub fn with_robot_convention(mut self, offset: f64, sign: f64) -> Result<Self, RobotError> {
        check_sign(sign)?;
        self.robot2dh_offset = offset;
        self.robot2dh_sign = sign;
        Ok(self)
    }
}

impl Joint for PrismaticJoint {
    fn joint_type(&self) -> JointType {
        JointType::Prismatic
    }

    fn transform(&self, q_dh: f64) -> Isometry3<f64> {
        dh_transform(self.a, self.alpha, q_dh, self.theta)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn robot2dh_sign(&self) -> f64 {
        self.robot2dh_sign
    }

    fn robot2dh_offset(&self) -> f64 {
        self.robot2dh_offset
    }

    fn hard_limits(&self) -> (f64, f64) {
        self.hard_limits
    }

    fn soft_limits(&self) -> (f64, f64) {
        self.soft_limits
    }

    fn hard_velocity_limits(&self) -> (f64, f64) {
        self.hard_velocity_limits
    }

    fn soft_velocity_limits(&self) -> (f64, f64) {
        self.soft_velocity_limits
    }
}
