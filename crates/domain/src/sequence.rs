//! Sequence model: steps, `{alias.path}` templates, conditions and the
//! run-scoped binding environment.
//!
//! Execution lives in the app crate; this module only parses and evaluates.

mod bindings;
mod expression;
mod step;
mod template;

pub use bindings::{Bindings, stringify};
pub use expression::{Condition, Operator};
pub use step::{CommandStep, ErrorPolicy, MAX_DEPTH, Step, StepKind};
pub use template::{Reference, Segment, Template, TemplatedValue};
