//! # Gradients
//!
//! Backward wiring is derived from forward wiring by a naming convention
//! ([`gradient_io`]) rather than by recording a graph at run time. The
//! [`grad_check`] module validates a backward operator's output against a
//! central-difference estimate taken through the forward operator.

pub mod grad_check;
pub mod gradient_io;

pub use grad_check::{GradCheckConfig, GradCheckError, GradientChecker};
pub use gradient_io::{grad_name, gradient_io_for, FullyConnectedGradientIo, GradientIo, GRAD_SUFFIX};
