use std::collections::HashSet;

use crate::{
    compiler::{walk, Expr, ExprKind, GraphVisitor, NodeId, ReductionDomain, Scope},
    errors::ErrorKind,
    structs::FuncId,
};

/// All the variables present in any part of a function definition must
/// either be pure arguments, elements of the reduction domain, parameters, or
/// bound by a `let` internal to the expression.
struct CheckVars<'a> {
    func: FuncId,
    /// `None` marks a position of the left-hand side which is not pure
    pure_args: &'a [Option<String>],
    reduction_domain: Option<ReductionDomain>,
    defined_internally: Scope<()>,
    /// the `let` frames enclosing the node being visited; a shared node is
    /// visited once per frame it appears in
    frames: Vec<usize>,
    next_frame: usize,
    visited: HashSet<(NodeId, usize)>,
}
impl<'a> CheckVars<'a> {
    fn new(func: FuncId, pure_args: &'a [Option<String>]) -> Self {
        CheckVars {
            func,
            pure_args,
            reduction_domain: None,
            defined_internally: Scope::new(),
            frames: Vec::new(),
            next_frame: 1,
            visited: HashSet::new(),
        }
    }

    fn current_frame(&self) -> usize {
        self.frames.last().copied().unwrap_or(0)
    }

    fn check_variable(
        &mut self,
        name: &str,
        is_param: bool,
        domain: Option<&ReductionDomain>,
    ) -> Result<(), ErrorKind> {
        if is_param {
            return Ok(());
        }

        if self.defined_internally.contains(name) {
            return Ok(());
        }

        if self.pure_args.iter().flatten().any(|a| a == name) {
            return Ok(());
        }

        if let Some(domain) = domain {
            return match &self.reduction_domain {
                None => {
                    self.reduction_domain = Some(domain.clone());
                    Ok(())
                }
                Some(known) if known.same_as(domain) => Ok(()),
                Some(known) => Err(ErrorKind::ConflictingReductionDomain(
                    known.name().to_owned(),
                    domain.name().to_owned(),
                )),
            };
        }

        Err(ErrorKind::UnresolvedIdentifier(name.to_owned()))
    }

    /// Recursive references must preserve the pure variables of the
    /// left-hand side, at the same positions
    fn check_self_call(&self, call: &Expr, args: &[Expr]) -> Result<(), ErrorKind> {
        for (i, expected) in self.pure_args.iter().enumerate() {
            let Some(expected) = expected else {
                continue;
            };
            match args.get(i).and_then(Expr::as_variable) {
                Some(name) if name == expected => {}
                _ => {
                    return Err(ErrorKind::InvalidRecursiveReference {
                        call: call.to_string(),
                        expected: expected.to_owned(),
                        position: i,
                    })
                }
            }
        }
        Ok(())
    }
}
impl GraphVisitor for CheckVars<'_> {
    type Error = ErrorKind;

    fn first_visit(&mut self, e: &Expr) -> bool {
        let frame = self.current_frame();
        self.visited.insert((e.id(), frame))
    }

    fn visit_node(&mut self, e: &Expr) -> Result<(), ErrorKind> {
        match e.kind() {
            ExprKind::Let { name, value, body } => {
                self.visit(value)?;
                self.defined_internally.push(name, ());
                self.frames.push(self.next_frame);
                self.next_frame += 1;
                let r = self.visit(body);
                self.frames.pop();
                self.defined_internally.pop(name);
                r
            }
            ExprKind::Call { .. } => {
                walk(self, e)?;
                if let Some(args) = e.as_call_to(self.func) {
                    self.check_self_call(e, args)?;
                }
                Ok(())
            }
            ExprKind::Variable {
                name,
                param,
                domain,
            } => self.check_variable(name, param.is_some(), domain.as_ref()),
            _ => walk(self, e),
        }
    }
}

/// Check that every free variable of `exprs` resolves, in a definition of
/// `func` whose pure argument slots are `pure_args`. Return the reduction
/// domain referenced by the definition, if any.
pub(crate) fn check_vars<'e, I: IntoIterator<Item = &'e Expr>>(
    func: FuncId,
    pure_args: &[Option<String>],
    exprs: I,
) -> Result<Option<ReductionDomain>, ErrorKind> {
    let mut check = CheckVars::new(func, pure_args);
    check.visit_all(exprs)?;
    Ok(check.reduction_domain)
}
