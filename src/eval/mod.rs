//! Distributed evaluation
//!
//! The master/slave protocol: a single coordinating master dispatches
//! individuals over TCP to stateless slave evaluators. This module holds
//! the slave side (the master's dispatcher lives with the master
//! application) plus the problem-form traits both sides share.

pub mod problem;
pub mod slave;

pub use problem::{GroupedProblem, SimpleProblem, SphereProblem};
pub use slave::{
    Slave, SlaveConfig, OP_CHECKPOINT, OP_EVALUATE_GROUPED, OP_EVALUATE_SIMPLE, OP_SHUTDOWN,
    RESULT_FITNESS, RESULT_INDIVIDUAL, RESULT_NOTHING,
};

/// Prelude for the eval module
pub mod prelude {
    pub use super::problem::{GroupedProblem, SimpleProblem, SphereProblem};
    pub use super::slave::{
        Slave, SlaveConfig, OP_CHECKPOINT, OP_EVALUATE_GROUPED, OP_EVALUATE_SIMPLE, OP_SHUTDOWN,
        RESULT_FITNESS, RESULT_INDIVIDUAL, RESULT_NOTHING,
    };
}
