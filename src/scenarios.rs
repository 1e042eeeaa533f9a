use anyhow::*;
use anyhow::Context as _;
use log::*;

use crate::{
    compiler::{Expr, Parameter, ReductionDomain, Type},
    context::Context,
    errors::Advisory,
    function::{ExternArgument, Function, Pipeline},
    transformer::random_float,
};

/// The bundled demonstration pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// a three-channel constant image
    Color,
    /// the histogram of a synthetic image, over a two-dimensional domain
    Histogram,
    /// recursive updates: an in-place scaling and a prefix sum
    Recursive,
    /// an extern stage consumed by a pure stage
    Extern,
    /// stochastic values, tagged per definition
    Noise,
}
impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::Color,
        Scenario::Histogram,
        Scenario::Recursive,
        Scenario::Extern,
        Scenario::Noise,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Color => "color",
            Scenario::Histogram => "histogram",
            Scenario::Recursive => "recursive",
            Scenario::Extern => "extern",
            Scenario::Noise => "noise",
        }
    }
}
impl std::convert::TryFrom<&str> for Scenario {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Scenario::ALL
            .iter()
            .find(|s| s.name() == value.to_lowercase())
            .copied()
            .ok_or_else(|| {
                anyhow!(
                    "expected one of {}; found {}",
                    Scenario::ALL.map(|s| s.name()).join(", "),
                    value
                )
            })
    }
}
impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A pipeline built from a scenario, with the handles of its functions in
/// definition order
pub struct Built {
    pub pipeline: Pipeline,
    pub functions: Vec<Function>,
    pub advisories: Vec<Advisory>,
}

pub fn build(scenario: Scenario, ctx: &Context) -> Result<Built> {
    info!("building scenario {}", scenario);
    let pipeline = Pipeline::new();
    let mut advisories = Vec::new();
    let functions = match scenario {
        Scenario::Color => color(&pipeline, ctx)?,
        Scenario::Histogram => histogram(&pipeline, ctx, &mut advisories)?,
        Scenario::Recursive => recursive(&pipeline, ctx, &mut advisories)?,
        Scenario::Extern => external(&pipeline, ctx)?,
        Scenario::Noise => noise(&pipeline, ctx, &mut advisories)?,
    };
    Ok(Built {
        pipeline,
        functions,
        advisories,
    })
}

fn color(pipeline: &Pipeline, ctx: &Context) -> Result<Vec<Function>> {
    let c = Expr::var("c");
    let f = pipeline.func("color");
    f.set_debug_info("color:1");
    f.define(
        &["x", "y", "c"],
        vec![Expr::cast(
            Type::uint(8),
            Expr::select(
                Expr::equals(c.clone(), Expr::int(0)),
                Expr::int(255),
                Expr::select(Expr::equals(c, Expr::int(1)), Expr::int(127), Expr::int(12)),
            ),
        )],
        ctx,
    )
    .context("while defining the color image")?;
    Ok(vec![f])
}

fn histogram(
    pipeline: &Pipeline,
    ctx: &Context,
    advisories: &mut Vec<Advisory>,
) -> Result<Vec<Function>> {
    let (x, y) = (Expr::var("x"), Expr::var("y"));
    let input = pipeline.func("input");
    input
        .define(
            &["x", "y"],
            vec![Expr::cast(Type::uint(8), (x * 7 + y * 13) % 256)],
            ctx,
        )
        .context("while defining the input image")?;

    let width = Parameter::new(Type::int(32), false, "width");
    let height = Parameter::new(Type::int(32), false, "height");
    let r = ReductionDomain::new(
        Some("r"),
        vec![
            ("rx", Expr::int(0), width.expr()),
            ("ry", Expr::int(0), height.expr()),
        ],
    );
    let (rx, ry) = (
        r.var_named("rx").ok_or_else(|| anyhow!("rx not in {}", r))?,
        r.var_named("ry").ok_or_else(|| anyhow!("ry not in {}", r))?,
    );

    let hist = pipeline.func("hist");
    hist.define(&["i"], vec![Expr::int(0)], ctx)
        .context("while defining the histogram")?;
    let bucket = Expr::cast(Type::int(32), input.call(vec![rx, ry])?);
    advisories.extend(
        hist.define_update(
            vec![bucket.clone()],
            vec![hist.call(vec![bucket])? + 1],
            ctx,
        )
        .context("while accumulating the histogram")?,
    );
    Ok(vec![input, hist])
}

fn recursive(
    pipeline: &Pipeline,
    ctx: &Context,
    advisories: &mut Vec<Advisory>,
) -> Result<Vec<Function>> {
    let (x, y) = (Expr::var("x"), Expr::var("y"));

    let sum = pipeline.func("sum");
    sum.define(&["x", "y"], vec![x.clone() + y.clone()], ctx)?;
    advisories.extend(sum.define_update(
        vec![x.clone(), y.clone()],
        vec![sum.call(vec![x.clone(), y.clone()])? + 1],
        ctx,
    )?);
    let gain = Parameter::new(Type::int(32), false, "gain");
    advisories.extend(sum.define_update(
        vec![x.clone(), y.clone()],
        vec![sum.call(vec![x.clone(), y])? * gain.expr()],
        ctx,
    )?);

    let r = ReductionDomain::from_ranges(None, &[("k", 1, 99)]);
    let k = r.var(0).ok_or_else(|| anyhow!("empty domain {}", r))?;
    let scan = pipeline.func("scan");
    scan.define(&["x"], vec![x], ctx)?;
    advisories.extend(scan.define_update(
        vec![k.clone()],
        vec![scan.call(vec![k.clone() - 1])? + scan.call(vec![k])?],
        ctx,
    )?);

    Ok(vec![sum, scan])
}

fn external(pipeline: &Pipeline, ctx: &Context) -> Result<Vec<Function>> {
    let (x, y) = (Expr::var("x"), Expr::var("y"));
    let input = pipeline.func("input");
    input.define(&["x", "y"], vec![Expr::cast(Type::float(32), x.clone() + y.clone())], ctx)?;

    let radius = Parameter::new(Type::int(32), false, "radius");
    let lut = Parameter::new(Type::float(32), false, "lut");
    let blur = pipeline.func("blur");
    blur.define_extern(
        "blur_3x3",
        vec![
            ExternArgument::from(&input),
            radius.expr().into(),
            lut.into(),
        ],
        vec![Type::float(32), Type::float(32)],
        2,
    )?;

    let out = pipeline.func("out");
    out.define(
        &["x", "y"],
        vec![
            blur.call_output(vec![x.clone(), y.clone()], 0)?
                + blur.call_output(vec![x, y], 1)?,
        ],
        ctx,
    )?;
    Ok(vec![input, blur, out])
}

fn noise(
    pipeline: &Pipeline,
    ctx: &Context,
    advisories: &mut Vec<Advisory>,
) -> Result<Vec<Function>> {
    let noise = pipeline.func("noise");
    noise.define(&["x", "y"], vec![random_float() + random_float()], ctx)?;

    // fully overwrites the pure definition
    let n = Expr::variable().name("n").t(Type::float(32)).build();
    advisories.extend(noise.define_update(
        vec![Expr::var("x"), Expr::var("y")],
        vec![Expr::let_in("n", random_float(), n.clone() * n)],
        ctx,
    )?);
    Ok(vec![noise])
}
