//! Serial kinematic chain: ordered joints between a fixed base transform and
//! a fixed tool transform, with forward kinematics and geometric Jacobians.
//!
//! The chain is assembled once at configuration time and then used read-mostly
//! by the controllers; no state is cached between calls, so appending or
//! removing joints never invalidates anything. Frame indices follow the
//! convention of the underlying model: `n` in `0..=num_joints()` selects the
//! frame after the first `n` joints, and `n = num_joints() + 1` additionally
//! applies the tool transform.

extern crate nalgebra as na;

use na::{DMatrix, DVector, Isometry3, Matrix3, Vector3};

use crate::error::RobotError;
use crate::joint::{Joint, JointType};

pub struct KinematicChain {
    joints: Vec<Box<dyn Joint>>,
    /// Frame 0 w.r.t. the world/base frame
    base: Isometry3<f64>,
    /// End-effector frame w.r.t. the last joint frame
    tool: Isometry3<f64>,
    name: String,
}

impl KinematicChain {
    /// Empty chain with identity base and tool transforms.
    pub fn new(name: &str) -> Self {
        KinematicChain {
            joints: Vec::new(),
            base: Isometry3::identity(),
            tool: Isometry3::identity(),
            name: name.to_string(),
        }
    }

    pub fn with_transforms(
        name: &str,
        base: Isometry3<f64>,
        tool: Isometry3<f64>,
    ) -> Self {
        KinematicChain {
            joints: Vec::new(),
            base,
            tool,
            name: name.to_string(),
        }
    }

    pub fn push_joint(&mut self, joint: Box<dyn Joint>) {
        self.joints.push(joint);
    }

    pub fn pop_joint(&mut self) -> Option<Box<dyn Joint>> {
        self.joints.pop()
    }

    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    pub fn joint(&self, i: usize) -> &dyn Joint {
        self.joints[i].as_ref()
    }

    pub fn base(&self) -> &Isometry3<f64> {
        &self.base
    }

    pub fn tool(&self) -> &Isometry3<f64> {
        &self.tool
    }

    pub fn set_base(&mut self, base: Isometry3<f64>) {
        self.base = base;
    }

    pub fn set_tool(&mut self, tool: Isometry3<f64>) {
        self.tool = tool;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn check_joint_vector(&self, q: &DVector<f64>) -> Result<(), RobotError> {
        if q.len() != self.num_joints() {
            return Err(RobotError::SizeMismatch {
                expected: self.num_joints(),
                found: q.len(),
            });
        }
        Ok(())
    }

    fn check_frame_index(&self, n: usize) -> Result<(), RobotError> {
        if n > self.num_joints() + 1 {
            return Err(RobotError::Configuration(format!(
                "frame index {} out of range for a chain of {} joints",
                n,
                self.num_joints()
            )));
        }
        Ok(())
    }

    /*========FKINE=========*/

    /// Forward kinematics to the end-effector (through the tool transform).
    pub fn fkine(&self, q_dh: &DVector<f64>) -> Result<Isometry3<f64>, RobotError> {
        self.fkine_to(q_dh, self.num_joints() + 1)
    }

    /// Forward kinematics through the first `n` joints; `n = num_joints() + 1`
    /// additionally applies the tool transform, `n = 0` returns the base.
    pub fn fkine_to(&self, q_dh: &DVector<f64>, n: usize) -> Result<Isometry3<f64>, RobotError> {
        self.check_joint_vector(q_dh)?;
        self.check_frame_index(n)?;

        let ee = n == self.num_joints() + 1;
        let n = if ee { n - 1 } else { n };

        let mut transform = self.base;
        for i in 0..n {
            transform *= self.joints[i].transform(q_dh[i]);
        }
        if ee {
            transform *= self.tool;
        }
        Ok(transform)
    }

    /// Like [`KinematicChain::fkine_to`], with a caller-supplied frame offset
    /// post-multiplied to the result.
    pub fn fkine_to_frame(
        &self,
        q_dh: &DVector<f64>,
        n: usize,
        frame: &Isometry3<f64>,
    ) -> Result<Isometry3<f64>, RobotError> {
        Ok(self.fkine_to(q_dh, n)? * frame)
    }

    /// All intermediate transforms from the base through frame `n`: the
    /// element at index `i` is the transform after the first `i` joints.
    /// Jacobian construction needs every intermediate origin and z axis,
    /// not just the final pose.
    pub fn fkine_all(
        &self,
        q_dh: &DVector<f64>,
        n: usize,
    ) -> Result<Vec<Isometry3<f64>>, RobotError> {
        self.check_joint_vector(q_dh)?;
        self.check_frame_index(n)?;

        let ee = n == self.num_joints() + 1;
        let n = if ee { n - 1 } else { n };

        let mut all = Vec::with_capacity(n + 1);
        all.push(self.base);
        for i in 0..n {
            let next = all[all.len() - 1] * self.joints[i].transform(q_dh[i]);
            all.push(next);
        }
        if ee {
            let last = all.len() - 1;
            all[last] *= self.tool;
        }
        Ok(all)
    }

    /*========Jacobians=========*/

    /// Position part of the Jacobian, columns per the first `all.len() - 1`
    /// joints, expressed at the origin of the last transform in `all`.
    fn jacob_p_internal(&self, all: &[Isometry3<f64>]) -> DMatrix<f64> {
        let num_q = all.len() - 1;
        let p_e = all[num_q].translation.vector;

        let mut jp = DMatrix::zeros(3, num_q);
        for i in 0..num_q {
            let z = all[i].rotation * Vector3::z();
            let column = match self.joints[i].joint_type() {
                JointType::Prismatic => z,
                JointType::Revolute => z.cross(&(p_e - all[i].translation.vector)),
            };
            jp.fixed_view_mut::<3, 1>(0, i).copy_from(&column);
        }
        jp
    }

    /// Orientation part of the geometric Jacobian for the same frame set.
    fn jacob_o_internal(&self, all: &[Isometry3<f64>]) -> DMatrix<f64> {
        let num_q = all.len() - 1;

        let mut jo = DMatrix::zeros(3, num_q);
        for i in 0..num_q {
            match self.joints[i].joint_type() {
                JointType::Prismatic => {} // zero column
                JointType::Revolute => {
                    let z = all[i].rotation * Vector3::z();
                    jo.fixed_view_mut::<3, 1>(0, i).copy_from(&z);
                }
            }
        }
        jo
    }

    /// Position Jacobian (3 x Q) at the end-effector.
    pub fn jacob_p(&self, q_dh: &DVector<f64>) -> Result<DMatrix<f64>, RobotError> {
        self.jacob_p_to(q_dh, self.num_joints() + 1)
    }

    /// Position Jacobian using the first `n` joints.
    pub fn jacob_p_to(&self, q_dh: &DVector<f64>, n: usize) -> Result<DMatrix<f64>, RobotError> {
        Ok(self.jacob_p_internal(&self.fkine_all(q_dh, n)?))
    }

    /// Position Jacobian at a frame offset from frame `n`.
    pub fn jacob_p_to_frame(
        &self,
        q_dh: &DVector<f64>,
        n: usize,
        frame: &Isometry3<f64>,
    ) -> Result<DMatrix<f64>, RobotError> {
        let mut all = self.fkine_all(q_dh, n)?;
        let last = all.len() - 1;
        all[last] *= frame;
        Ok(self.jacob_p_internal(&all))
    }

    /// Orientation part of the geometric Jacobian (3 x Q) at the end-effector.
    pub fn jacob_o_geometric(&self, q_dh: &DVector<f64>) -> Result<DMatrix<f64>, RobotError> {
        self.jacob_o_geometric_to(q_dh, self.num_joints() + 1)
    }

    /// Orientation Jacobian using the first `n` joints.
    pub fn jacob_o_geometric_to(
        &self,
        q_dh: &DVector<f64>,
        n: usize,
    ) -> Result<DMatrix<f64>, RobotError> {
        Ok(self.jacob_o_internal(&self.fkine_all(q_dh, n)?))
    }

    /// Orientation Jacobian at a frame offset from frame `n`.
    pub fn jacob_o_geometric_to_frame(
        &self,
        q_dh: &DVector<f64>,
        n: usize,
        frame: &Isometry3<f64>,
    ) -> Result<DMatrix<f64>, RobotError> {
        let mut all = self.fkine_all(q_dh, n)?;
        let last = all.len() - 1;
        all[last] *= frame;
        Ok(self.jacob_o_internal(&all))
    }

    /// Full geometric Jacobian (6 x Q) at the end-effector: rows 0..3 map
    /// joint velocities to linear velocity, rows 3..6 to angular velocity.
    pub fn jacob_geometric(&self, q_dh: &DVector<f64>) -> Result<DMatrix<f64>, RobotError> {
        self.jacob_geometric_to(q_dh, self.num_joints() + 1)
    }

    /// Geometric Jacobian using the first `n` joints.
    pub fn jacob_geometric_to(
        &self,
        q_dh: &DVector<f64>,
        n: usize,
    ) -> Result<DMatrix<f64>, RobotError> {
        let all = self.fkine_all(q_dh, n)?;
        Ok(self.jacob_geometric_internal(&all))
    }

    /// Geometric Jacobian at a frame offset from frame `n`.
    pub fn jacob_geometric_to_frame(
        &self,
        q_dh: &DVector<f64>,
        n: usize,
        frame: &Isometry3<f64>,
    ) -> Result<DMatrix<f64>, RobotError> {
        let mut all = self.fkine_all(q_dh, n)?;
        let last = all.len() - 1;
        all[last] *= frame;
        Ok(self.jacob_geometric_internal(&all))
    }

    fn jacob_geometric_internal(&self, all: &[Isometry3<f64>]) -> DMatrix<f64> {
        let num_q = all.len() - 1;
        let mut j = DMatrix::zeros(6, num_q);
        j.view_mut((0, 0), (3, num_q))
            .copy_from(&self.jacob_p_internal(all));
        j.view_mut((3, 0), (3, num_q))
            .copy_from(&self.jacob_o_internal(all));
        j
    }

    /// Re-express a Jacobian in another frame, given the rotation of the
    /// Jacobian's current frame w.r.t. the target frame. Works on the
    /// position part (3 x Q), the orientation part (3 x Q) or the full
    /// geometric Jacobian (6 x Q), block-wise.
    pub fn change_jacob_frame(
        jacobian: &DMatrix<f64>,
        rotation: &Matrix3<f64>,
    ) -> Result<DMatrix<f64>, RobotError> {
        match jacobian.nrows() {
            3 => {
                let mut out = jacobian.clone();
                out.copy_from(&(rotation * jacobian));
                Ok(out)
            }
            6 => {
                let cols = jacobian.ncols();
                let mut out = jacobian.clone();
                let linear = rotation * jacobian.view((0, 0), (3, cols));
                let angular = rotation * jacobian.view((3, 0), (3, cols));
                out.view_mut((0, 0), (3, cols)).copy_from(&linear);
                out.view_mut((3, 0), (3, cols)).copy_from(&angular);
                Ok(out)
            }
            rows => Err(RobotError::Configuration(format!(
                "change_jacob_frame: jacobian must have 3 or 6 rows, got {}",
                rows
            ))),
        }
    }

    /*========CONVERSIONS=========*/

    pub fn joints_robot2dh(&self, q_robot: &DVector<f64>) -> Result<DVector<f64>, RobotError> {
        self.check_joint_vector(q_robot)?;
        Ok(DVector::from_fn(self.num_joints(), |i, _| {
            self.joints[i].joint_robot2dh(q_robot[i])
        }))
    }

    pub fn joints_dh2robot(&self, q_dh: &DVector<f64>) -> Result<DVector<f64>, RobotError> {
        self.check_joint_vector(q_dh)?;
        Ok(DVector::from_fn(self.num_joints(), |i, _| {
            self.joints[i].joint_dh2robot(q_dh[i])
        }))
    }

    pub fn jointsvel_robot2dh(
        &self,
        qdot_robot: &DVector<f64>,
    ) -> Result<DVector<f64>, RobotError> {
        self.check_joint_vector(qdot_robot)?;
        Ok(DVector::from_fn(self.num_joints(), |i, _| {
            self.joints[i].jointvel_robot2dh(qdot_robot[i])
        }))
    }

    pub fn jointsvel_dh2robot(&self, qdot_dh: &DVector<f64>) -> Result<DVector<f64>, RobotError> {
        self.check_joint_vector(qdot_dh)?;
        Ok(DVector::from_fn(self.num_joints(), |i, _| {
            self.joints[i].jointvel_dh2robot(qdot_dh[i])
        }))
    }

    /*========SAFETY=========*/

    /// Per-joint hard position limit check, robot convention; the element at
    /// index `i` is true when joint `i` violates its limits.
    pub fn check_hard_joint_limits(
        &self,
        q_robot: &DVector<f64>,
    ) -> Result<Vec<bool>, RobotError> {
        self.check_joint_vector(q_robot)?;
        Ok(self
            .joints
            .iter()
            .enumerate()
            .map(|(i, joint)| joint.exceeded_hard_limit(q_robot[i]))
            .collect())
    }

    pub fn exceeded_hard_joint_limits(&self, q_robot: &DVector<f64>) -> Result<bool, RobotError> {
        Ok(self.check_hard_joint_limits(q_robot)?.contains(&true))
    }

    pub fn check_soft_joint_limits(
        &self,
        q_robot: &DVector<f64>,
    ) -> Result<Vec<bool>, RobotError> {
        self.check_joint_vector(q_robot)?;
        Ok(self
            .joints
            .iter()
            .enumerate()
            .map(|(i, joint)| joint.exceeded_soft_limit(q_robot[i]))
            .collect())
    }

    pub fn exceeded_soft_joint_limits(&self, q_robot: &DVector<f64>) -> Result<bool, RobotError> {
        Ok(self.check_soft_joint_limits(q_robot)?.contains(&true))
    }

    pub fn check_hard_velocity_limits(
        &self,
        qdot_robot: &DVector<f64>,
    ) -> Result<Vec<bool>, RobotError> {
        self.check_joint_vector(qdot_robot)?;
        Ok(self
            .joints
            .iter()
            .enumerate()
            .map(|(i, joint)| joint.exceeded_hard_velocity_limit(qdot_robot[i]))
            .collect())
    }

    pub fn exceeded_hard_velocity_limits(
        &self,
        qdot_robot: &DVector<f64>,
    ) -> Result<bool, RobotError> {
        Ok(self.check_hard_velocity_limits(qdot_robot)?.contains(&true))
    }

    pub fn check_soft_velocity_limits(
        &self,
        qdot_robot: &DVector<f64>,
    ) -> Result<Vec<bool>, RobotError> {
        self.check_joint_vector(qdot_robot)?;
        Ok(self
            .joints
            .iter()
            .enumerate()
            .map(|(i, joint)| joint.exceeded_soft_velocity_limit(qdot_robot[i]))
            .collect())
    }

    pub fn exceeded_soft_velocity_limits(
        &self,
        qdot_robot: &DVector<f64>,
    ) -> Result<bool, RobotError> {
        Ok(self.check_soft_velocity_limits(qdot_robot)?.contains(&true))
    }
}
