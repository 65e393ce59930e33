//! Error reporting for chain configuration and the control loop

use std::fmt;

/// Which limit category a safety check found violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    HardPosition,
    HardVelocity,
    SoftPosition,
    SoftVelocity,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LimitKind::HardPosition => write!(f, "hard position"),
            LimitKind::HardVelocity => write!(f, "hard velocity"),
            LimitKind::SoftPosition => write!(f, "soft position"),
            LimitKind::SoftVelocity => write!(f, "soft velocity"),
        }
    }
}

/// Unified error for chain assembly, the CLIK solver and safety checking.
///
/// Configuration errors (`Configuration`, `InvalidJointIndex`, `SizeMismatch`)
/// are caller mistakes and are reported at setter or call time, never clamped.
/// `NonFinite` means the math broke (NaN or infinity in a joint vector) and is
/// always fatal to the current control step. `LimitViolation` is only raised
/// for limit categories the caller enabled; it names the violating joints and
/// their values so that the control loop can log or react upstream.
#[derive(Debug, Clone)]
pub enum RobotError {
    Configuration(String),
    InvalidJointIndex { index: usize, joints: usize },
    SizeMismatch { expected: usize, found: usize },
    NonFinite { what: &'static str, joints: Vec<usize>, values: Vec<f64> },
    LimitViolation { kind: LimitKind, joints: Vec<usize>, values: Vec<f64> },
}

impl fmt::Display for RobotError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            RobotError::Configuration(ref msg) =>
                write!(f, "Configuration Error: {}", msg),
            RobotError::InvalidJointIndex { index, joints } =>
                write!(f, "Invalid joint index {} for a chain of {} joints", index, joints),
            RobotError::SizeMismatch { expected, found } =>
                write!(f, "Size mismatch: expected {}, found {}", expected, found),
            RobotError::NonFinite { what, ref joints, ref values } =>
                write!(f, "Non-finite {} at joints {:?}: {:?}", what, joints, values),
            RobotError::LimitViolation { kind, ref joints, ref values } =>
                write!(f, "Exceeded {} limits at joints {:?}: {:?}", kind, joints, values),
        }
    }
}

impl std::error::Error for RobotError {}
