use std::sync::atomic::{AtomicU64, Ordering};

use crate::{compiler::Expr, transformer};

/// The expression passes applied to every definition before it is committed
pub trait Lowering {
    /// Must preserve the set of free variables of `e`
    fn eliminate_common_subexpressions(&self, e: &Expr) -> Expr;
    fn lower_random(&self, e: &Expr, free_vars: &[String], generation: u64) -> Expr;
}

/// The passes shipped with this crate
#[derive(Default, Debug, Clone, Copy)]
pub struct StandardLowering;
impl Lowering for StandardLowering {
    fn eliminate_common_subexpressions(&self, e: &Expr) -> Expr {
        transformer::eliminate_common_subexpressions(e)
    }

    fn lower_random(&self, e: &Expr, free_vars: &[String], generation: u64) -> Expr {
        transformer::lower_random(e, free_vars, generation)
    }
}

/// Generations are drawn from a single process-wide counter, whatever the
/// context issuing them.
static GENERATIONS: AtomicU64 = AtomicU64::new(0);

/// The state shared by successive definitions: the lowering passes, and the
/// number of generations issued through this context to tag stochastic
/// calls. Every definition event draws a fresh generation, never issued
/// before in the process, so any number of contexts may coexist and a single
/// context may be shared across threads.
pub struct Context {
    issued: AtomicU64,
    lowering: Box<dyn Lowering + Send + Sync>,
}
impl Context {
    pub fn new() -> Self {
        Self::with_lowering(StandardLowering)
    }

    pub fn with_lowering<L: Lowering + Send + Sync + 'static>(lowering: L) -> Self {
        Context {
            issued: AtomicU64::new(0),
            lowering: Box::new(lowering),
        }
    }

    /// Allocate a new, never issued before, generation
    pub fn next_generation(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst);
        GENERATIONS.fetch_add(1, Ordering::SeqCst)
    }

    /// How many generations have been issued through this context so far
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn lowering(&self) -> &dyn Lowering {
        self.lowering.as_ref()
    }
}
impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("issued", &self.issued())
            .finish()
    }
}
