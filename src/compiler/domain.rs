use itertools::Itertools;
use std::rc::Rc;

use super::{Expr, Type};
use crate::structs::unique_name;

/// A single iteration variable of a [`ReductionDomain`], ranging over
/// `[min, min + extent)`
#[derive(Debug, Clone)]
pub struct ReductionVariable {
    pub var: String,
    pub min: Expr,
    pub extent: Expr,
}

#[derive(Debug)]
struct DomainContents {
    name: String,
    domain: Vec<ReductionVariable>,
}

/// A named, ordered set of ranged iteration variables, shared by identity
/// among every expression and update definition iterating over it. Two
/// domains built from the same bounds are distinct.
#[derive(Clone, Debug)]
pub struct ReductionDomain(Rc<DomainContents>);
impl ReductionDomain {
    /// Create a domain over `vars`, given as `(name, min, extent)` triples.
    /// Unnamed domains receive a unique name.
    pub fn new<S: AsRef<str>>(name: Option<&str>, vars: Vec<(S, Expr, Expr)>) -> Self {
        let name = name.map(str::to_owned).unwrap_or_else(|| unique_name('r'));
        ReductionDomain(Rc::new(DomainContents {
            domain: vars
                .into_iter()
                .map(|(var, min, extent)| ReductionVariable {
                    var: var.as_ref().to_owned(),
                    min,
                    extent,
                })
                .collect(),
            name,
        }))
    }

    /// A shortcut for a domain whose bounds are integer constants
    pub fn from_ranges<S: AsRef<str>>(name: Option<&str>, ranges: &[(S, i64, i64)]) -> Self {
        Self::new(
            name,
            ranges
                .iter()
                .map(|(var, min, extent)| {
                    let var: &str = var.as_ref();
                    (var, Expr::int(*min), Expr::int(*extent))
                })
                .collect(),
        )
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }
    pub fn domain(&self) -> &[ReductionVariable] {
        &self.0.domain
    }
    pub fn dimensions(&self) -> usize {
        self.0.domain.len()
    }
    pub fn same_as(&self, other: &ReductionDomain) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
    /// A key identifying this very domain, stable as long as it lives
    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
    /// The names of the iteration variables, in domain order
    pub fn var_names(&self) -> impl Iterator<Item = &str> {
        self.0.domain.iter().map(|v| v.var.as_str())
    }

    /// The `i`th iteration variable, as an expression tagged with this domain
    pub fn var(&self, i: usize) -> Option<Expr> {
        self.0.domain.get(i).map(|v| {
            Expr::variable()
                .name(v.var.as_str())
                .t(Type::int(32))
                .domain(self.clone())
                .build()
        })
    }

    /// The iteration variable called `name`, as an expression tagged with
    /// this domain
    pub fn var_named(&self, name: &str) -> Option<Expr> {
        self.0
            .domain
            .iter()
            .position(|v| v.var == name)
            .and_then(|i| self.var(i))
    }
}
impl std::fmt::Display for ReductionDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}{{{}}}",
            self.name(),
            self.domain()
                .iter()
                .map(|v| format!("{}: [{}, {} + {})", v.var, v.min, v.min, v.extent))
                .join(", ")
        )
    }
}
