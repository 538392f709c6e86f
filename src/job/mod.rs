// src/job/mod.rs

//! Job descriptors.
//!
//! - [`invocation`] holds the immutable [`JobInvocation`] and its builder.
//! - [`trigger`], [`constraint`] and [`retry`] describe when and under what
//!   conditions a job runs, and how failures back off.
//! - [`validate`] is the pluggable validation strategy used by builders.
//! - [`coder`] turns jobs into the payload passed to workers and back.

pub mod coder;
pub mod constraint;
pub mod invocation;
pub mod retry;
pub mod trigger;
pub mod validate;

pub use coder::{JobCoder, JobData};
pub use constraint::{Constraint, ConstraintSet};
pub use invocation::{JobIdentity, JobInvocation, JobInvocationBuilder};
pub use retry::{RetryPolicy, RetryStrategy};
pub use trigger::{ObservedUri, Trigger};
pub use validate::{DefaultJobValidator, JobValidator, ValidationEnforcer};
