use std::collections::HashSet;

use super::{Expr, NodeId};

/// A visitor over the expression graph that reaches every distinct node
/// once, however many times it is shared. Implementors decide what "already
/// visited" means through [`GraphVisitor::first_visit`]; most of them simply
/// delegate to a [`Visited`] set.
pub trait GraphVisitor {
    type Error;

    /// Mark `e` as visited, returning false if it already was
    fn first_visit(&mut self, e: &Expr) -> bool;

    fn visit(&mut self, e: &Expr) -> Result<(), Self::Error> {
        if self.first_visit(e) {
            self.visit_node(e)
        } else {
            Ok(())
        }
    }

    /// Called once per distinct node; defaults to visiting the children
    fn visit_node(&mut self, e: &Expr) -> Result<(), Self::Error> {
        walk(self, e)
    }

    fn visit_all<'a, I: IntoIterator<Item = &'a Expr>>(&mut self, es: I) -> Result<(), Self::Error>
    where
        Self: Sized,
    {
        for e in es {
            self.visit(e)?;
        }
        Ok(())
    }
}

/// Visit all the children of `e`
pub fn walk<V: GraphVisitor + ?Sized>(v: &mut V, e: &Expr) -> Result<(), V::Error> {
    for c in e.children() {
        v.visit(c)?;
    }
    Ok(())
}

/// The identity set of the nodes already reached by a visitor
#[derive(Default, Debug)]
pub struct Visited(HashSet<NodeId>);
impl Visited {
    pub fn insert(&mut self, e: &Expr) -> bool {
        self.0.insert(e.id())
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
