use std::{
    collections::HashMap,
    sync::atomic::{AtomicI64, Ordering},
};

use crate::compiler::{
    walk, CallType, Expr, ExprKind, GraphVisitor, Literal, NodeId, Type, Visited,
};

lazy_static::lazy_static! {
    /// The stochastic primitives, and the name of their deterministic
    /// counterpart once tagged with a generation and free variables.
    pub static ref STOCHASTIC_PRIMITIVES: HashMap<&'static str, &'static str> = maplit::hashmap!{
        "random_float" => "random_float_tagged",
        "random_int" => "random_int_tagged",
    };
}

/// Distinguishes the call sites of stochastic primitives
static NEXT_CALL_SITE: AtomicI64 = AtomicI64::new(0);

fn stochastic_call(name: &str, t: Type) -> Expr {
    let site = NEXT_CALL_SITE.fetch_add(1, Ordering::Relaxed);
    Expr::call_extern(name, t, vec![Expr::int(site)])
}

/// A uniformly distributed `float32` in `[0, 1)`
pub fn random_float() -> Expr {
    stochastic_call("random_float", Type::float(32))
}

/// A uniformly distributed `int32`
pub fn random_int() -> Expr {
    stochastic_call("random_int", Type::int(32))
}

struct LowerRandom<'a> {
    free_vars: &'a [String],
    generation: u64,
    done: HashMap<NodeId, Expr>,
}
impl LowerRandom<'_> {
    fn mutate(&mut self, e: &Expr) -> Expr {
        if let Some(r) = self.done.get(&e.id()) {
            return r.clone();
        }
        let r = e.map_children(&mut |c| self.mutate(c));
        let lowered = match r.kind() {
            ExprKind::Call {
                name,
                call_type: CallType::Extern,
                args,
                ..
            } if STOCHASTIC_PRIMITIVES.contains_key(name.as_str()) => {
                let tagged = STOCHASTIC_PRIMITIVES[name.as_str()];
                let args = std::iter::once(Expr::uint(self.generation))
                    .chain(self.free_vars.iter().map(Expr::var))
                    .chain(args.iter().cloned())
                    .collect();
                Some(Expr::call_extern(tagged, r.t(), args))
            }
            _ => None,
        };
        let r = lowered.unwrap_or(r);
        self.done.insert(e.id(), r.clone());
        r
    }
}

/// Rewrite every call to a stochastic primitive within `e` into a
/// deterministic call, parameterized by `generation` and by the values of the
/// `free_vars` at the point of evaluation.
pub fn lower_random(e: &Expr, free_vars: &[String], generation: u64) -> Expr {
    LowerRandom {
        free_vars,
        generation,
        done: HashMap::new(),
    }
    .mutate(e)
}

struct CollectTags {
    visited: Visited,
    tags: Vec<u64>,
}
impl GraphVisitor for CollectTags {
    type Error = std::convert::Infallible;

    fn first_visit(&mut self, e: &Expr) -> bool {
        self.visited.insert(e)
    }

    fn visit_node(&mut self, e: &Expr) -> Result<(), Self::Error> {
        if let ExprKind::Call {
            name,
            call_type: CallType::Extern,
            args,
            ..
        } = e.kind()
        {
            if STOCHASTIC_PRIMITIVES.values().any(|t| *t == name.as_str()) {
                if let Some(ExprKind::Const(Literal::UInt(tag))) = args.first().map(Expr::kind) {
                    self.tags.push(*tag);
                }
            }
        }
        walk(self, e)
    }
}

/// The generations of all the tagged stochastic calls in `es`, in visit order
pub fn generation_tags<'a, I: IntoIterator<Item = &'a Expr>>(es: I) -> Vec<u64> {
    let mut collector = CollectTags {
        visited: Visited::default(),
        tags: Vec::new(),
    };
    let _ = collector.visit_all(es);
    collector.tags
}
