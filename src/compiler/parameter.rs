use std::rc::Rc;

use super::{Expr, Type};

#[derive(Debug)]
struct ParameterContents {
    t: Type,
    is_output: bool,
    name: String,
}

/// An opaque handle on an external buffer or scalar, bound by the caller at
/// execution time. Parameters are compared by identity.
#[derive(Clone, Debug)]
pub struct Parameter(Rc<ParameterContents>);
impl Parameter {
    pub fn new<S: AsRef<str>>(t: Type, is_output: bool, name: S) -> Self {
        Parameter(Rc::new(ParameterContents {
            t,
            is_output,
            name: name.as_ref().to_owned(),
        }))
    }

    pub fn t(&self) -> Type {
        self.0.t
    }
    pub fn is_output(&self) -> bool {
        self.0.is_output
    }
    pub fn name(&self) -> &str {
        &self.0.name
    }
    pub fn same_as(&self, other: &Parameter) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
    /// A key identifying this very parameter, stable as long as it lives
    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// A scalar expression reading this parameter
    pub fn expr(&self) -> Expr {
        Expr::variable()
            .name(self.name())
            .t(self.t())
            .param(self.clone())
            .build()
    }
}
