use itertools::Itertools;
use owo_colors::{colored::Color, OwoColorize};

use crate::{
    compiler::{BinOp, Expr, ExprKind, ReductionDomain},
    function::{Function, Schedule},
};

pub const COLORS: [Color; 7] = [
    Color::Green,
    Color::Yellow,
    Color::BrightBlue,
    Color::Red,
    Color::Magenta,
    Color::Cyan,
    Color::BrightWhite,
];

pub trait Pretty {
    fn pretty(&self) -> String;
}

impl Pretty for Expr {
    fn pretty(&self) -> String {
        fn rec_pretty(e: &Expr, depth: usize) -> String {
            let depth = depth
                + match e.kind() {
                    ExprKind::Call { .. } | ExprKind::Let { .. } => 1,
                    _ => 0,
                };
            let c = &COLORS[depth % COLORS.len()];
            match e.kind() {
                ExprKind::Const(x) => format!("{}", x).color(*c).to_string(),
                ExprKind::Variable { name, param, domain } => {
                    if param.is_some() {
                        name.color(*c).italic().to_string()
                    } else if let Some(d) = domain {
                        format!("{}.{}", d.name().dimmed(), name.color(*c))
                    } else {
                        name.color(*c).to_string()
                    }
                }
                ExprKind::Call { name, args, .. } => format!(
                    "{}({})",
                    name.color(*c).bold(),
                    format_list(args, depth)
                ),
                ExprKind::Let { name, value, body } => format!(
                    "{} {} = {} {} {}",
                    "let".color(*c),
                    name.color(*c).bold(),
                    rec_pretty(value, depth),
                    "in".color(*c),
                    rec_pretty(body, depth)
                ),
                ExprKind::Binary { op, a, b } => match op {
                    BinOp::Min | BinOp::Max => format!(
                        "{}({}, {})",
                        op.symbol().color(*c),
                        rec_pretty(a, depth),
                        rec_pretty(b, depth)
                    ),
                    _ => format!(
                        "({} {} {})",
                        rec_pretty(a, depth),
                        op.symbol().color(*c),
                        rec_pretty(b, depth)
                    ),
                },
                ExprKind::Not(x) => format!("{}{}", "!".color(*c), rec_pretty(x, depth)),
                ExprKind::Select {
                    condition,
                    if_true,
                    if_false,
                } => format!(
                    "{}({})",
                    "select".color(*c),
                    format_list(
                        &[condition.clone(), if_true.clone(), if_false.clone()],
                        depth
                    )
                ),
                ExprKind::Cast(x) => {
                    format!("{}({})", e.t().to_string().color(*c), rec_pretty(x, depth))
                }
            }
        }
        fn format_list(cs: &[Expr], depth: usize) -> String {
            cs.iter().map(|c| rec_pretty(c, depth)).join(", ")
        }
        rec_pretty(self, 0)
    }
}

impl Pretty for ReductionDomain {
    fn pretty(&self) -> String {
        format!("{}", self.to_string().yellow())
    }
}

impl Pretty for Schedule {
    fn pretty(&self) -> String {
        format!(
            "[{}] storage [{}]",
            self.dims
                .iter()
                .map(|d| format!("{}{}", d.var.bold(), format!(":{:?}", d.for_type).dimmed()))
                .join(", "),
            self.storage_dims.iter().join(", ")
        )
    }
}

impl Pretty for Function {
    fn pretty(&self) -> String {
        let c = self.contents();
        let mut r = String::new();
        let head = format!("{}({})", c.name.white().bold(), c.args.iter().join(", "));

        if let Some(ext) = c.extern_definition.as_ref() {
            r.push_str(&format!(
                "{} = {} {}({})\n",
                head,
                "extern".magenta(),
                ext.name.bold(),
                ext.args.iter().join(", ")
            ));
        } else if !c.values.is_empty() {
            r.push_str(&format!(
                "{} = {}\n",
                head,
                c.values.iter().map(Pretty::pretty).join(", ")
            ));
        } else {
            r.push_str(&format!("{} {}\n", head, "undefined".red()));
        }
        r.push_str(&format!("    schedule {}\n", c.schedule.pretty()));

        for (i, u) in c.updates.iter().enumerate() {
            r.push_str(&format!(
                "  #{} {}({}) = {}{}\n",
                i,
                c.name.white().bold(),
                u.args.iter().map(Pretty::pretty).join(", "),
                u.values.iter().map(Pretty::pretty).join(", "),
                u.domain
                    .as_ref()
                    .map(|d| format!(" over {}", d.pretty()))
                    .unwrap_or_default()
            ));
            r.push_str(&format!("    schedule {}\n", u.schedule.pretty()));
        }
        r.push_str(&format!(
            "    outputs {}",
            c.output_buffers
                .iter()
                .zip(c.output_types.iter())
                .map(|(b, t)| format!("{}: {}", b.name(), t))
                .join(", ")
        ));
        r
    }
}
