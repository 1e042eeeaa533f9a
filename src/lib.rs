//! Definition-time validation of the functions of an array-processing
//! pipeline.
//!
//! A [`Function`] is created empty from a [`Pipeline`], then receives either
//! a pure definition followed by any number of update definitions, or an
//! extern definition. Every definition is checked for scoping and typing
//! before being committed, and the schedule descriptors consumed by the
//! scheduler are derived from it.
//!
//! ```
//! use funcdef::{Context, Expr, Pipeline};
//!
//! let ctx = Context::new();
//! let pipeline = Pipeline::new();
//! let f = pipeline.func("f");
//! f.define(&["x", "y"], vec![Expr::var("x") + Expr::var("y")], &ctx).unwrap();
//! let advisories = f
//!     .define_update(
//!         vec![Expr::var("x"), Expr::var("y")],
//!         vec![f.call(vec![Expr::var("x"), Expr::var("y")]).unwrap() + 1],
//!         &ctx,
//!     )
//!     .unwrap();
//! assert!(advisories.is_empty());
//! assert_eq!(f.update_schedule(0).unwrap().dim_names(), vec!["x", "y"]);
//! ```
pub mod compiler;
pub mod context;
pub mod errors;
pub mod function;
pub mod pretty;
pub mod scenarios;
pub mod structs;
pub mod transformer;

pub use compiler::{Expr, Parameter, ReductionDomain, Type};
pub use context::{Context, Lowering, StandardLowering};
pub use errors::{Advisory, DefinitionError, DefinitionKind, ErrorKind};
pub use function::{
    ExternArgument, Function, FunctionSummary, Pipeline, RefCount, Schedule,
    UpdateDefinition,
};
pub use structs::FuncId;

#[cfg(test)]
mod tests;
