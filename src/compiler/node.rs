use itertools::Itertools;
use std::{
    fmt::{Display, Formatter},
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use super::{types::ScalarKind, Parameter, ReductionDomain, Type};
use crate::structs::FuncId;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// The identity of a node in the expression graph. Two structurally equal
/// nodes built independently have distinct IDs; clones of the same [`Expr`]
/// share one.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(u64);
impl NodeId {
    fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Literal {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}
impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Int(x) => write!(f, "{}", x),
            Literal::UInt(x) => write!(f, "{}u", x),
            Literal::Float(x) => write!(f, "{:?}f", x),
            Literal::Bool(x) => write!(f, "{}", x),
        }
    }
}

/// Discriminates calls to another function of the pipeline from calls to
/// opaque, foreign code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallType {
    Function,
    Extern,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Min,
    Max,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}
impl BinOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Min => "min",
            BinOp::Max => "max",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Const(Literal),
    Variable {
        name: String,
        /// set if the variable is bound to an external buffer or scalar
        param: Option<Parameter>,
        /// set if the variable iterates over a reduction domain
        domain: Option<ReductionDomain>,
    },
    Call {
        name: String,
        call_type: CallType,
        /// the called function, for calls of type [`CallType::Function`]
        func: Option<FuncId>,
        /// which output of a multi-valued function is read
        value_index: usize,
        args: Vec<Expr>,
    },
    Let {
        name: String,
        value: Expr,
        body: Expr,
    },
    Binary {
        op: BinOp,
        a: Expr,
        b: Expr,
    },
    Not(Expr),
    Select {
        condition: Expr,
        if_true: Expr,
        if_false: Expr,
    },
    /// Conversion of its argument to the type of the node
    Cast(Expr),
}

#[derive(Debug)]
pub struct Node {
    id: NodeId,
    kind: ExprKind,
    t: Type,
}

/// A shared, immutable node of the expression graph. Cloning an [`Expr`] is
/// cheap and preserves its identity.
#[derive(Clone, Debug)]
pub struct Expr(Rc<Node>);

#[buildstructor::buildstructor]
impl Expr {
    #[builder(entry = "variable", exit = "build", visibility = "pub")]
    fn new_variable(
        name: String,
        t: Option<Type>,
        param: Option<Parameter>,
        domain: Option<ReductionDomain>,
    ) -> Expr {
        let t = t
            .or_else(|| param.as_ref().map(|p| p.t()))
            .unwrap_or_default();
        Expr::new(
            ExprKind::Variable {
                name,
                param,
                domain,
            },
            t,
        )
    }
}

impl Expr {
    pub fn new(kind: ExprKind, t: Type) -> Expr {
        Expr(Rc::new(Node {
            id: NodeId::fresh(),
            kind,
            t,
        }))
    }

    /// A pure variable of type `int32`
    pub fn var<S: AsRef<str>>(name: S) -> Expr {
        Expr::variable().name(name.as_ref()).build()
    }
    pub fn int(x: i64) -> Expr {
        Expr::new(ExprKind::Const(Literal::Int(x)), Type::int(32))
    }
    pub fn uint(x: u64) -> Expr {
        Expr::new(ExprKind::Const(Literal::UInt(x)), Type::uint(32))
    }
    pub fn float(x: f64) -> Expr {
        Expr::new(ExprKind::Const(Literal::Float(x)), Type::float(32))
    }
    pub fn bool(x: bool) -> Expr {
        Expr::new(ExprKind::Const(Literal::Bool(x)), Type::bool())
    }
    /// A constant of type `t` holding `x`. Unsigned constants wrap around
    /// modulo 2^bits.
    pub fn constant(t: Type, x: i64) -> Expr {
        let literal = match t.kind {
            ScalarKind::Int => Literal::Int(x),
            ScalarKind::UInt => Literal::UInt(if t.bits >= 64 {
                x as u64
            } else {
                (x as u64) & ((1u64 << t.bits) - 1)
            }),
            ScalarKind::Float => Literal::Float(x as f64),
            ScalarKind::Bool => Literal::Bool(x != 0),
        };
        Expr::new(ExprKind::Const(literal), t)
    }

    pub fn binary(op: BinOp, a: Expr, b: Expr) -> Expr {
        let t = if op.is_comparison() || matches!(op, BinOp::And | BinOp::Or) {
            Type::bool()
        } else {
            a.t()
        };
        Expr::new(ExprKind::Binary { op, a, b }, t)
    }
    pub fn min(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinOp::Min, a, b)
    }
    pub fn max(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinOp::Max, a, b)
    }
    pub fn equals(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinOp::Eq, a, b)
    }
    pub fn less_than(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinOp::Lt, a, b)
    }
    pub fn not(a: Expr) -> Expr {
        Expr::new(ExprKind::Not(a), Type::bool())
    }
    pub fn select(condition: Expr, if_true: Expr, if_false: Expr) -> Expr {
        let t = if_true.t();
        Expr::new(
            ExprKind::Select {
                condition,
                if_true,
                if_false,
            },
            t,
        )
    }
    pub fn cast(t: Type, e: Expr) -> Expr {
        Expr::new(ExprKind::Cast(e), t)
    }
    pub fn let_in<S: AsRef<str>>(name: S, value: Expr, body: Expr) -> Expr {
        let t = body.t();
        Expr::new(
            ExprKind::Let {
                name: name.as_ref().to_owned(),
                value,
                body,
            },
            t,
        )
    }
    /// A call to foreign code, returning a value of type `t`
    pub fn call_extern<S: AsRef<str>>(name: S, t: Type, args: Vec<Expr>) -> Expr {
        Expr::new(
            ExprKind::Call {
                name: name.as_ref().to_owned(),
                call_type: CallType::Extern,
                func: None,
                value_index: 0,
                args,
            },
            t,
        )
    }

    pub fn id(&self) -> NodeId {
        self.0.id
    }
    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }
    pub fn t(&self) -> Type {
        self.0.t
    }
    /// Whether `self` and `other` are the very same node
    pub fn same_as(&self, other: &Expr) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// If this node is a variable, return its name
    pub fn as_variable(&self) -> Option<&str> {
        match self.kind() {
            ExprKind::Variable { name, .. } => Some(name),
            _ => None,
        }
    }

    /// If this node is a call to `func`, return its arguments
    pub fn as_call_to(&self, func: FuncId) -> Option<&[Expr]> {
        match self.kind() {
            ExprKind::Call {
                call_type: CallType::Function,
                func: Some(f),
                args,
                ..
            } if *f == func => Some(args),
            _ => None,
        }
    }

    /// The direct children of this node, in evaluation order
    pub fn children(&self) -> Vec<&Expr> {
        match self.kind() {
            ExprKind::Const(_) | ExprKind::Variable { .. } => Vec::new(),
            ExprKind::Call { args, .. } => args.iter().collect(),
            ExprKind::Let { value, body, .. } => vec![value, body],
            ExprKind::Binary { a, b, .. } => vec![a, b],
            ExprKind::Not(x) | ExprKind::Cast(x) => vec![x],
            ExprKind::Select {
                condition,
                if_true,
                if_false,
            } => vec![condition, if_true, if_false],
        }
    }

    /// Rebuild this node with its children replaced by the images of `f`.
    /// The node itself is returned, identity preserved, if no child changed.
    pub fn map_children(&self, f: &mut dyn FnMut(&Expr) -> Expr) -> Expr {
        let mut changed = false;
        let mut m = |e: &Expr| {
            let r = f(e);
            changed |= !r.same_as(e);
            r
        };
        let kind = match self.kind() {
            ExprKind::Const(_) | ExprKind::Variable { .. } => return self.clone(),
            ExprKind::Call {
                name,
                call_type,
                func,
                value_index,
                args,
            } => ExprKind::Call {
                name: name.clone(),
                call_type: *call_type,
                func: *func,
                value_index: *value_index,
                args: args.iter().map(&mut m).collect(),
            },
            ExprKind::Let { name, value, body } => ExprKind::Let {
                name: name.clone(),
                value: m(value),
                body: m(body),
            },
            ExprKind::Binary { op, a, b } => ExprKind::Binary {
                op: *op,
                a: m(a),
                b: m(b),
            },
            ExprKind::Not(x) => ExprKind::Not(m(x)),
            ExprKind::Cast(x) => ExprKind::Cast(m(x)),
            ExprKind::Select {
                condition,
                if_true,
                if_false,
            } => ExprKind::Select {
                condition: m(condition),
                if_true: m(if_true),
                if_false: m(if_false),
            },
        };
        if changed {
            Expr::new(kind, self.t())
        } else {
            self.clone()
        }
    }

    /// Compute the number of nodes in the tree rooted at `self`, counting
    /// shared nodes once per use
    pub fn size(&self) -> usize {
        1 + self.children().into_iter().map(Expr::size).sum::<usize>()
    }
}

macro_rules! binary_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl std::ops::$trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, self, rhs)
            }
        }
        impl std::ops::$trait<i64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: i64) -> Expr {
                let rhs = Expr::constant(self.t(), rhs);
                Expr::binary($op, self, rhs)
            }
        }
    };
}
binary_operator!(Add, add, BinOp::Add);
binary_operator!(Sub, sub, BinOp::Sub);
binary_operator!(Mul, mul, BinOp::Mul);
binary_operator!(Div, div, BinOp::Div);
binary_operator!(Rem, rem, BinOp::Mod);

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind() {
            ExprKind::Const(x) => write!(f, "{}", x),
            ExprKind::Variable { name, .. } => write!(f, "{}", name),
            ExprKind::Call { name, args, .. } => {
                write!(f, "{}({})", name, args.iter().join(", "))
            }
            ExprKind::Let { name, value, body } => {
                write!(f, "(let {} = {} in {})", name, value, body)
            }
            ExprKind::Binary { op, a, b } => match op {
                BinOp::Min | BinOp::Max => write!(f, "{}({}, {})", op.symbol(), a, b),
                _ => write!(f, "({} {} {})", a, op.symbol(), b),
            },
            ExprKind::Not(x) => write!(f, "!{}", x),
            ExprKind::Select {
                condition,
                if_true,
                if_false,
            } => write!(f, "select({}, {}, {})", condition, if_true, if_false),
            ExprKind::Cast(x) => write!(f, "{}({})", self.t(), x),
        }
    }
}
