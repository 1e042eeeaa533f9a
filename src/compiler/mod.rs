pub use domain::{ReductionDomain, ReductionVariable};
pub use node::{BinOp, CallType, Expr, ExprKind, Literal, NodeId};
pub use parameter::Parameter;
pub use tables::Scope;
pub use types::{ScalarKind, Type};
pub use visitor::{walk, GraphVisitor, Visited};

mod domain;
mod node;
mod parameter;
mod tables;
mod types;
mod visitor;
