use std::collections::HashMap;

use crate::{
    compiler::{BinOp, CallType, Expr, ExprKind, Literal, NodeId, Type},
    structs::FuncId,
};

/// The structural identity of a node whose children have already been made
/// canonical
#[derive(PartialEq, Eq, Hash)]
enum Key {
    Const(Type, u8, u64),
    Variable {
        name: String,
        t: Type,
        param: Option<usize>,
        domain: Option<usize>,
    },
    Call {
        name: String,
        func: Option<FuncId>,
        value_index: usize,
        args: Vec<NodeId>,
        t: Type,
    },
    /// Calls to foreign code may be impure, and are never merged
    Opaque(NodeId),
    Let(String, NodeId, NodeId),
    Binary(BinOp, NodeId, NodeId, Type),
    Not(NodeId),
    Select(NodeId, NodeId, NodeId),
    Cast(Type, NodeId),
}

fn key(e: &Expr) -> Key {
    match e.kind() {
        ExprKind::Const(x) => match x {
            Literal::Int(x) => Key::Const(e.t(), 0, *x as u64),
            Literal::UInt(x) => Key::Const(e.t(), 1, *x),
            Literal::Float(x) => Key::Const(e.t(), 2, x.to_bits()),
            Literal::Bool(x) => Key::Const(e.t(), 3, *x as u64),
        },
        ExprKind::Variable {
            name,
            param,
            domain,
        } => Key::Variable {
            name: name.clone(),
            t: e.t(),
            param: param.as_ref().map(|p| p.identity()),
            domain: domain.as_ref().map(|d| d.identity()),
        },
        ExprKind::Call {
            call_type: CallType::Extern,
            ..
        } => Key::Opaque(e.id()),
        ExprKind::Call {
            name,
            func,
            value_index,
            args,
            ..
        } => Key::Call {
            name: name.clone(),
            func: *func,
            value_index: *value_index,
            args: args.iter().map(Expr::id).collect(),
            t: e.t(),
        },
        ExprKind::Let { name, value, body } => Key::Let(name.clone(), value.id(), body.id()),
        ExprKind::Binary { op, a, b } => Key::Binary(*op, a.id(), b.id(), e.t()),
        ExprKind::Not(x) => Key::Not(x.id()),
        ExprKind::Select {
            condition,
            if_true,
            if_false,
        } => Key::Select(condition.id(), if_true.id(), if_false.id()),
        ExprKind::Cast(x) => Key::Cast(e.t(), x.id()),
    }
}

/// The canonical nodes of a single lexical scope
#[derive(Default)]
struct Table {
    canonical: HashMap<Key, Expr>,
    rewritten: HashMap<NodeId, Expr>,
}

struct Cse {
    scopes: Vec<Table>,
}
impl Cse {
    fn top(&mut self) -> &mut Table {
        // the root table is pushed at construction and never popped
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    fn mutate(&mut self, e: &Expr) -> Expr {
        if let Some(r) = self.top().rewritten.get(&e.id()) {
            return r.clone();
        }

        let r = match e.kind() {
            // The body of a let lives in its own scope, so that no node is
            // shared between the inside and the outside of a binding.
            ExprKind::Let { name, value, body } => {
                let new_value = self.mutate(value);
                self.scopes.push(Table::default());
                let new_body = self.mutate(body);
                self.scopes.pop();
                if new_value.same_as(value) && new_body.same_as(body) {
                    e.clone()
                } else {
                    Expr::new(
                        ExprKind::Let {
                            name: name.clone(),
                            value: new_value,
                            body: new_body,
                        },
                        e.t(),
                    )
                }
            }
            _ => e.map_children(&mut |c| self.mutate(c)),
        };

        let table = self.top();
        let canonical = table.canonical.entry(key(&r)).or_insert(r).clone();
        table.rewritten.insert(e.id(), canonical.clone());
        canonical
    }
}

/// Merge all the structurally equal subexpressions of `e` into shared nodes.
/// The free variables of the expression are left untouched.
pub fn eliminate_common_subexpressions(e: &Expr) -> Expr {
    Cse {
        scopes: vec![Table::default()],
    }
    .mutate(e)
}
