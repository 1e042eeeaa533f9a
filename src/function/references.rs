use std::{collections::BTreeMap, convert::Infallible};

use crate::{
    compiler::{walk, CallType, Expr, ExprKind, GraphVisitor, Visited},
    structs::FuncId,
};

/// Collect, per called function, the distinct call nodes of an expression
/// graph. A call node shared by several uses is counted once.
#[derive(Default)]
struct CallSites {
    visited: Visited,
    calls: BTreeMap<FuncId, usize>,
}
impl GraphVisitor for CallSites {
    type Error = Infallible;

    fn first_visit(&mut self, e: &Expr) -> bool {
        self.visited.insert(e)
    }

    fn visit_node(&mut self, e: &Expr) -> Result<(), Infallible> {
        if let ExprKind::Call {
            call_type: CallType::Function,
            func: Some(f),
            ..
        } = e.kind()
        {
            *self.calls.entry(*f).or_default() += 1;
        }
        walk(self, e)
    }
}

/// The references a definition of `owner` holds on the functions of its
/// pipeline
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct References {
    /// the number of distinct call nodes targeting `owner` itself
    pub self_references: usize,
    /// one entry per distinct call node targeting another function
    pub edges: Vec<FuncId>,
}
impl References {
    pub(crate) fn add_edge(&mut self, owner: FuncId, target: FuncId) {
        if target == owner {
            self.self_references += 1;
        } else {
            self.edges.push(target);
        }
    }
}

pub(crate) fn collect_references<'e, I: IntoIterator<Item = &'e Expr>>(
    owner: FuncId,
    exprs: I,
) -> References {
    let mut sites = CallSites::default();
    let _ = sites.visit_all(exprs);

    let mut r = References::default();
    for (target, count) in sites.calls {
        for _ in 0..count {
            r.add_edge(owner, target);
        }
    }
    r
}

/// Count the distinct call nodes of `exprs` calling back `func`
pub fn count_self_references<'e, I: IntoIterator<Item = &'e Expr>>(func: FuncId, exprs: I) -> usize {
    collect_references(func, exprs).self_references
}
