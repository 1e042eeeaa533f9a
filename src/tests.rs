use anyhow::*;

use crate::{
    compiler::{Expr, ExprKind, Parameter, ReductionDomain, Scope, Type},
    context::Context,
    errors::{Advisory, DefinitionError, DefinitionKind, ErrorKind, Existing, Mismatch},
    function::{FunctionArena, FunctionContents, Pipeline, RefCount, References},
    structs::unique_name,
    transformer::{eliminate_common_subexpressions, generation_tags, random_float},
};

fn vars<const N: usize>(names: [&str; N]) -> [Expr; N] {
    names.map(Expr::var)
}

fn must_fail<T: std::fmt::Debug>(r: Result<T, DefinitionError>) -> ErrorKind {
    match r {
        Result::Ok(x) => panic!("definition unexpectedly accepted: {:?}", x),
        Err(e) => {
            eprintln!("{}", e);
            e.error
        }
    }
}

/// `f(x, y) = x + y`
fn sum(pipeline: &Pipeline, ctx: &Context) -> Result<crate::Function> {
    let [x, y] = vars(["x", "y"]);
    let f = pipeline.func("f");
    f.define(&["x", "y"], vec![x + y], ctx)?;
    Ok(f)
}

#[test]
fn pure_definition() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let f = sum(&p, &ctx)?;

    assert!(f.has_pure_definition());
    assert!(!f.has_update_definition());
    assert_eq!(f.args(), vec!["x", "y"]);
    assert_eq!(f.schedule().dim_names(), vec!["x", "y"]);
    assert_eq!(f.schedule().storage_dims, vec!["x", "y"]);
    assert_eq!(f.output_types(), vec![Type::int(32)]);
    assert_eq!(f.values()[0].to_string(), "(x + y)");
    assert_eq!(ctx.issued(), 1);
    Ok(())
}

#[test]
fn output_buffers() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let [x] = vars(["x"]);

    let single = p.func("single");
    single.define(&["x"], vec![x.clone()], &ctx)?;
    let names = |f: &crate::Function| {
        f.output_buffers()
            .iter()
            .map(|b| b.name().to_owned())
            .collect::<Vec<_>>()
    };
    assert_eq!(names(&single), vec!["single"]);
    assert!(single.output_buffers()[0].is_output());

    let pair = p.func("pair");
    pair.define(
        &["x"],
        vec![x.clone(), Expr::cast(Type::float(32), x)],
        &ctx,
    )?;
    assert_eq!(names(&pair), vec!["pair.0", "pair.1"]);
    assert_eq!(pair.output_types(), vec![Type::int(32), Type::float(32)]);
    assert_eq!(pair.output_buffers()[1].t(), Type::float(32));
    Ok(())
}

#[test]
fn duplicate_argument_name() {
    let ctx = Context::new();
    let p = Pipeline::new();
    let f = p.func("f");
    let [x] = vars(["x"]);

    assert_eq!(
        must_fail(f.define(&["x", "y", "x"], vec![x], &ctx)),
        ErrorKind::DuplicateArgumentName {
            name: "x".into(),
            first: 0,
            second: 2
        }
    );
    assert!(!f.has_pure_definition());
    assert!(f.args().is_empty());
    assert!(f.schedule().dims.is_empty());
    assert_eq!(ctx.issued(), 0);
}

#[test]
fn empty_argument_name() {
    let ctx = Context::new();
    let p = Pipeline::new();
    let f = p.func("f");

    assert_eq!(
        must_fail(f.define(&["x", ""], vec![Expr::int(1)], &ctx)),
        ErrorKind::EmptyArgumentName(1)
    );
    assert!(!f.has_pure_definition());
    assert!(f.output_buffers().is_empty());
}

#[test]
fn missing_name() {
    let ctx = Context::new();
    let p = Pipeline::new();
    let f = p.func("");
    assert_eq!(
        must_fail(f.define(&["x"], vec![Expr::var("x")], &ctx)),
        ErrorKind::MissingName
    );
}

#[test]
fn no_values() {
    let ctx = Context::new();
    let p = Pipeline::new();
    let f = p.func("f");
    assert_eq!(
        must_fail(f.define(&["x"], vec![], &ctx)),
        ErrorKind::ArityMismatch(Mismatch::NoValues)
    );
}

#[test]
fn defined_twice() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let f = sum(&p, &ctx)?;
    let [x, y] = vars(["x", "y"]);

    assert_eq!(
        must_fail(f.define(&["x", "y"], vec![x * y], &ctx)),
        ErrorKind::AlreadyDefined(Existing::Pure)
    );
    assert_eq!(f.values()[0].to_string(), "(x + y)");
    assert_eq!(f.schedule().dim_names(), vec!["x", "y"]);
    assert_eq!(ctx.issued(), 1);
    Ok(())
}

#[test]
fn unnamed_functions() {
    let p = Pipeline::new();
    let f = p.unnamed();
    let g = p.unnamed();
    assert!(f.name().starts_with("f$"));
    assert_ne!(f.name(), g.name());
}

#[test]
fn unresolved_identifier() {
    let ctx = Context::new();
    let p = Pipeline::new();
    let f = p.func("f");
    let [x, z] = vars(["x", "z"]);
    assert_eq!(
        must_fail(f.define(&["x"], vec![x + z], &ctx)),
        ErrorKind::UnresolvedIdentifier("z".into())
    );
}

#[test]
fn parameters_and_lets_resolve() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let [x, a] = vars(["x", "a"]);
    let gain = Parameter::new(Type::int(32), false, "gain");

    let f = p.func("f");
    f.define(
        &["x"],
        vec![Expr::let_in("a", x * gain.expr(), a.clone() + a)],
        &ctx,
    )?;
    assert!(f.has_pure_definition());
    Ok(())
}

#[test]
fn let_binding_does_not_leak() {
    let ctx = Context::new();
    let p = Pipeline::new();
    let [x, a] = vars(["x", "a"]);

    // the very same node `a` is used inside and outside of the binding
    let f = p.func("f");
    assert_eq!(
        must_fail(f.define(&["x"], vec![Expr::let_in("a", x, a.clone()) + a], &ctx)),
        ErrorKind::UnresolvedIdentifier("a".into())
    );
}

#[test]
fn shared_graph_visited_once() {
    let ctx = Context::new();
    let p = Pipeline::new();
    let mut e = Expr::var("z");
    for _ in 0..64 {
        e = e.clone() + e;
    }

    let f = p.func("f");
    assert_eq!(
        must_fail(f.define(&["x"], vec![e], &ctx)),
        ErrorKind::UnresolvedIdentifier("z".into())
    );
}

#[test]
fn pure_definition_with_domain() {
    let ctx = Context::new();
    let p = Pipeline::new();
    let r = ReductionDomain::from_ranges(Some("r"), &[("i", 0, 10)]);
    let i = r.var(0).unwrap();
    let f = p.func("f");
    assert_eq!(
        must_fail(f.define(&["x"], vec![Expr::var("x") + i], &ctx)),
        ErrorKind::PureDefinitionHasReductionDomain("r".into())
    );
    assert!(!f.has_pure_definition());
}

#[test]
fn update_before_pure() {
    let ctx = Context::new();
    let p = Pipeline::new();
    let f = p.func("f");
    let [x] = vars(["x"]);
    assert_eq!(
        must_fail(f.define_update(vec![x.clone()], vec![x], &ctx)),
        ErrorKind::MissingPureDefinition
    );
    assert!(f.updates().is_empty());
}

#[test]
fn single_self_reference() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let f = sum(&p, &ctx)?;
    let [x, y] = vars(["x", "y"]);

    assert_eq!(
        f.ref_count(),
        RefCount {
            strong: 1,
            back_edges: 0
        }
    );
    let advisories = f.define_update(
        vec![x.clone(), y.clone()],
        vec![f.call(vec![x, y])? + 1],
        &ctx,
    )?;
    assert!(advisories.is_empty());

    let update = f.update(0).unwrap();
    assert_eq!(update.self_references, 1);
    assert!(update.domain.is_none());
    assert_eq!(update.schedule.dim_names(), vec!["x", "y"]);
    assert!(update.schedule.storage_dims.is_empty());
    assert_eq!(
        f.ref_count(),
        RefCount {
            strong: 1,
            back_edges: 1
        }
    );
    Ok(())
}

#[test]
fn shared_self_calls_counted_once() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let f = sum(&p, &ctx)?;
    let [x, y] = vars(["x", "y"]);

    let call = f.call(vec![x.clone(), y.clone()])?;
    f.define_update(
        vec![x.clone(), y.clone()],
        vec![call.clone() * call],
        &ctx,
    )?;
    assert_eq!(f.update(0).unwrap().self_references, 1);

    // merged by the CSE pass
    f.define_update(
        vec![x.clone(), y.clone()],
        vec![f.call(vec![x.clone(), y.clone()])? + f.call(vec![x, y])?],
        &ctx,
    )?;
    assert_eq!(f.update(1).unwrap().self_references, 1);
    assert_eq!(f.ref_count().back_edges, 2);
    Ok(())
}

#[test]
fn domain_variables_scheduled_first() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let f = sum(&p, &ctx)?;
    let r = ReductionDomain::from_ranges(Some("r"), &[("i", 0, 10)]);
    let i = r.var(0).unwrap();
    let [x] = vars(["x"]);

    let advisories = f.define_update(
        vec![x.clone(), i.clone()],
        vec![f.call(vec![x, i])? * 2],
        &ctx,
    )?;
    assert!(advisories.is_empty());
    let update = f.update(0).unwrap();
    assert_eq!(update.schedule.dim_names(), vec!["i", "x"]);
    assert!(update.domain.unwrap().same_as(&r));
    Ok(())
}

#[test]
fn multidimensional_domain() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let [x, y, z] = vars(["x", "y", "z"]);
    let f = p.func("f");
    f.define(&["x", "y", "z"], vec![x.clone() + y + z.clone()], &ctx)?;

    let r = ReductionDomain::from_ranges(None, &[("ri", 0, 4), ("rj", 0, 4)]);
    let (ri, rj) = (r.var(0).unwrap(), r.var(1).unwrap());
    f.define_update(
        vec![x.clone(), ri.clone() + rj, z.clone()],
        vec![f.call(vec![x, ri.clone(), z])?],
        &ctx,
    )?;
    assert_eq!(
        f.update_schedule(0).unwrap().dim_names(),
        vec!["ri", "rj", "x", "z"]
    );
    Ok(())
}

#[test]
fn conflicting_domains() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let f = sum(&p, &ctx)?;
    let r1 = ReductionDomain::from_ranges(Some("r1"), &[("i", 0, 10)]);
    let r2 = ReductionDomain::from_ranges(Some("r2"), &[("i", 0, 10)]);

    assert_eq!(
        must_fail(f.define_update(
            vec![r1.var(0).unwrap(), r2.var(0).unwrap()],
            vec![Expr::int(0)],
            &ctx
        )),
        ErrorKind::ConflictingReductionDomain("r1".into(), "r2".into())
    );
    assert!(f.updates().is_empty());
    Ok(())
}

#[test]
fn swapped_recursive_reference() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let f = sum(&p, &ctx)?;
    let [x, y] = vars(["x", "y"]);

    let err = must_fail(f.define_update(
        vec![x.clone(), y.clone()],
        vec![f.call(vec![y, x])? + 1],
        &ctx,
    ));
    assert!(matches!(
        err,
        ErrorKind::InvalidRecursiveReference { ref expected, position: 0, .. } if expected == "x"
    ));
    assert!(f.updates().is_empty());
    assert_eq!(
        f.ref_count(),
        RefCount {
            strong: 1,
            back_edges: 0
        }
    );
    Ok(())
}

#[test]
fn fully_shadowing_update() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let f = sum(&p, &ctx)?;
    let [x, y] = vars(["x", "y"]);

    let advisories = f.define_update(vec![x.clone(), y.clone()], vec![x * y], &ctx)?;
    assert_eq!(
        advisories,
        vec![Advisory::ShadowsEarlierDefinitions {
            function: "f".into(),
            update: 0
        }]
    );
    assert_eq!(f.updates().len(), 1);
    Ok(())
}

#[test]
fn update_arity() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let f = sum(&p, &ctx)?;
    let [x, y] = vars(["x", "y"]);

    assert_eq!(
        must_fail(f.define_update(vec![x.clone()], vec![x.clone()], &ctx)),
        ErrorKind::ArityMismatch(Mismatch::Arguments {
            expected: 2,
            found: 1
        })
    );
    assert_eq!(
        must_fail(f.define_update(
            vec![x.clone(), y.clone()],
            vec![x.clone(), y.clone()],
            &ctx
        )),
        ErrorKind::ArityMismatch(Mismatch::Values {
            expected: 1,
            found: 2
        })
    );
    assert_eq!(
        must_fail(f.define_update(
            vec![x.clone(), y],
            vec![Expr::cast(Type::float(32), x)],
            &ctx
        )),
        ErrorKind::ArityMismatch(Mismatch::ValueType {
            index: 0,
            expected: Type::int(32),
            found: Type::float(32)
        })
    );
    assert!(f.updates().is_empty());
    Ok(())
}

#[test]
fn stochastic_tags_never_repeat() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();

    let f = p.func("f");
    f.define(&["x"], vec![random_float() + random_float()], &ctx)?;
    let g = p.func("g");
    g.define(&["x"], vec![random_float()], &ctx)?;

    let f_tags = generation_tags(f.values().iter());
    let g_tags = generation_tags(g.values().iter());
    assert_eq!(f_tags.len(), 2);
    assert!(f_tags.iter().all(|t| *t == f_tags[0]));
    assert_eq!(g_tags.len(), 1);
    assert!(!f_tags.contains(&g_tags[0]));
    Ok(())
}

#[test]
fn stochastic_tags_differ_across_contexts() -> Result<()> {
    let p = Pipeline::new();
    let noise = random_float();

    let f = p.func("f");
    f.define(&["x"], vec![noise.clone()], &Context::new())?;
    let g = p.func("g");
    g.define(&["x"], vec![noise], &Context::new())?;

    let f_tags = generation_tags(f.values().iter());
    let g_tags = generation_tags(g.values().iter());
    assert_eq!((f_tags.len(), g_tags.len()), (1, 1));
    assert_ne!(f_tags, g_tags);
    assert_ne!(f.values()[0].to_string(), g.values()[0].to_string());
    Ok(())
}

#[test]
fn stochastic_calls_take_free_variables() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let f = sum(&p, &ctx)?;
    let r = ReductionDomain::from_ranges(Some("r"), &[("i", 0, 10)]);
    let i = r.var(0).unwrap();
    let x = Expr::var("x");

    f.define_update(vec![x, i], vec![Expr::cast(Type::int(32), random_float())], &ctx)?;
    let value = f.update(0).unwrap().values[0].clone();
    let ExprKind::Cast(call) = value.kind() else {
        panic!("expected a cast, found {}", value)
    };
    let ExprKind::Call { name, args, .. } = call.kind() else {
        panic!("expected a call, found {}", call)
    };
    assert_eq!(name, "random_float_tagged");
    assert_eq!(
        args.iter()
            .skip(1)
            .take(2)
            .filter_map(Expr::as_variable)
            .collect::<Vec<_>>(),
        vec!["x", "i"]
    );
    Ok(())
}

#[test]
fn schedules_are_deterministic() -> Result<()> {
    fn build(ctx: &Context) -> Result<Vec<String>> {
        let p = Pipeline::new();
        let f = sum(&p, ctx)?;
        let r = ReductionDomain::from_ranges(Some("r"), &[("i", 0, 10), ("j", 0, 3)]);
        let [i, j] = [r.var(0).unwrap(), r.var(1).unwrap()];
        let y = Expr::var("y");
        f.define_update(
            vec![i.clone() + j, y.clone()],
            vec![f.call(vec![i, y])?],
            ctx,
        )?;
        Ok(f.update_schedule(0)
            .unwrap()
            .dim_names()
            .into_iter()
            .map(str::to_owned)
            .collect())
    }

    let ctx = Context::new();
    let first = build(&ctx)?;
    assert_eq!(first, vec!["i", "j", "y"]);
    assert_eq!(first, build(&ctx)?);
    Ok(())
}

#[test]
fn extern_definition() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let input = sum(&p, &ctx)?;
    let e = p.func("e");
    e.define_extern(
        "blur",
        vec![(&input).into()],
        vec![Type::float(32), Type::uint(8)],
        3,
    )?;

    let args = e.args();
    assert_eq!(args.len(), 3);
    assert!(args.iter().all(|a| a.starts_with("e$")));
    assert_ne!(args[0], args[1]);
    assert_eq!(e.schedule().storage_dims, args);
    assert!(e.schedule().dims.is_empty());
    assert_eq!(e.outputs(), 2);
    assert_eq!(e.extern_definition().unwrap().name, "blur");
    assert_eq!(input.ref_count().strong, 2);

    assert_eq!(
        must_fail(e.define(&["x"], vec![Expr::var("x")], &ctx)),
        ErrorKind::AlreadyDefined(Existing::Extern)
    );
    assert_eq!(
        must_fail(e.define_extern("again", vec![], vec![Type::int(32)], 1)),
        ErrorKind::AlreadyDefined(Existing::Extern)
    );
    assert_eq!(
        must_fail(input.define_extern("late", vec![], vec![Type::int(32)], 1)),
        ErrorKind::AlreadyDefined(Existing::Pure)
    );

    let call = e.call_output(vec![Expr::var("x"), Expr::var("y"), Expr::var("z")], 1)?;
    assert_eq!(call.t(), Type::uint(8));
    Ok(())
}

#[test]
fn calls() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let g = p.func("g");
    let [x] = vars(["x"]);
    assert_eq!(g.call(vec![x.clone()]).unwrap_err(), ErrorKind::CallToUndefined);

    g.define(&["x"], vec![x.clone()], &ctx)?;
    assert_eq!(
        g.call(vec![]).unwrap_err(),
        ErrorKind::ArityMismatch(Mismatch::Arguments {
            expected: 1,
            found: 0
        })
    );
    assert_eq!(
        g.call_output(vec![x.clone()], 1).unwrap_err(),
        ErrorKind::ArityMismatch(Mismatch::OutputIndex {
            index: 1,
            outputs: 1
        })
    );
    let call = g.call(vec![x])?;
    assert!(call.as_call_to(g.id()).is_some());
    assert_eq!(call.to_string(), "g(x)");
    Ok(())
}

#[test]
fn released_functions_are_freed() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let [x] = vars(["x"]);

    let g = p.func("g");
    g.define(&["x"], vec![x.clone()], &ctx)?;
    let f = p.func("f");
    f.define(&["x"], vec![g.call(vec![x.clone()])? + 1], &ctx)?;
    let (f_id, g_id) = (f.id(), g.id());
    assert_eq!(p.ref_count(g_id).unwrap().strong, 2);

    drop(g);
    assert!(p.is_live(g_id));
    assert_eq!(p.ref_count(g_id).unwrap().strong, 1);

    let f2 = f.clone();
    drop(f);
    assert!(p.is_live(f_id));
    drop(f2);
    assert!(!p.is_live(f_id));
    assert!(!p.is_live(g_id));
    assert_eq!(p.live_functions(), 0);
    Ok(())
}

#[test]
fn self_referencing_function_is_freed() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let f = sum(&p, &ctx)?;
    let [x, y] = vars(["x", "y"]);
    f.define_update(
        vec![x.clone(), y.clone()],
        vec![f.call(vec![x, y])? + 1],
        &ctx,
    )?;

    let id = f.id();
    drop(f);
    assert!(!p.is_live(id));
    assert_eq!(p.live_functions(), 0);
    Ok(())
}

#[test]
fn handle_dropped_while_borrowed_is_released() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let [x] = vars(["x"]);

    let g = p.func("g");
    g.define(&["x"], vec![x.clone()], &ctx)?;
    let f = p.func("f");
    f.define(&["x"], vec![g.call(vec![x])?], &ctx)?;
    let g_id = g.id();

    let f2 = f.clone();
    {
        let _contents = f.contents();
        drop(f2);
        drop(g);
    }
    assert_eq!(f.ref_count().strong, 1);
    assert_eq!(p.ref_count(g_id).unwrap().strong, 1);

    let h = p.func("h");
    let f_id = f.id();
    {
        let _contents = h.contents();
        drop(f);
        assert!(p.is_live(f_id));
    }
    assert!(!p.is_live(f_id));
    assert!(!p.is_live(g_id));
    assert_eq!(p.live_functions(), 1);
    Ok(())
}

#[test]
fn handles_of_another_pipeline_dangle() -> Result<()> {
    let ctx = Context::new();
    let (p, q) = (Pipeline::new(), Pipeline::new());
    let [x] = vars(["x"]);

    let g = p.func("g");
    g.define(&["x"], vec![x.clone()], &ctx)?;
    let f = q.func("f");
    assert_eq!(f.id().index(), g.id().index());

    assert_eq!(
        must_fail(f.define(&["x"], vec![g.call(vec![x])?], &ctx)),
        ErrorKind::DanglingReference(g.id())
    );
    assert!(!f.has_pure_definition());
    assert_eq!(f.ref_count().strong, 1);
    assert_eq!(g.ref_count().strong, 1);
    assert!(!q.is_live(g.id()));
    Ok(())
}

#[test]
fn dangling_reference() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let [x] = vars(["x"]);

    let g = p.func("g");
    g.define(&["x"], vec![x.clone()], &ctx)?;
    let stale = g.call(vec![x.clone()])?;
    let g_id = g.id();
    drop(g);

    let f = p.func("f");
    assert_eq!(
        must_fail(f.define(&["x"], vec![stale], &ctx)),
        ErrorKind::DanglingReference(g_id)
    );
    assert!(!f.has_pure_definition());
    assert_eq!(f.ref_count().strong, 1);
    Ok(())
}

#[test]
fn cycle_accounting_violation() -> Result<()> {
    let mut arena = FunctionArena::default();
    let id = arena.insert(FunctionContents::default());

    let refs = References {
        self_references: 1,
        edges: vec![],
    };
    arena.commit_references(id, &refs)?;
    assert_eq!(
        arena.ref_count(id),
        Some(RefCount {
            strong: 1,
            back_edges: 1
        })
    );

    let err = arena.weaken_back_edges(id, 1).unwrap_err();
    assert_eq!(
        err,
        ErrorKind::CycleAccountingViolation {
            found: 1,
            strong: 1
        }
    );
    assert_eq!(
        arena.ref_count(id),
        Some(RefCount {
            strong: 1,
            back_edges: 1
        })
    );
    assert!(DefinitionError {
        function: "f".into(),
        kind: DefinitionKind::Update(0),
        location: None,
        error: err,
    }
    .is_defect());

    assert_eq!(arena.release(id)?, vec![String::new()]);
    assert_eq!(arena.live(), 0);
    assert_eq!(
        arena.retain(id).unwrap_err(),
        ErrorKind::DanglingReference(id)
    );
    Ok(())
}

#[test]
fn errors_carry_location() -> Result<()> {
    let ctx = Context::new();
    let p = Pipeline::new();
    let f = sum(&p, &ctx)?;
    f.set_debug_info("pipeline.rs:12");

    let err = f
        .define(&["x"], vec![Expr::var("x")], &ctx)
        .unwrap_err();
    assert_eq!(err.function, "f");
    assert_eq!(err.kind, DefinitionKind::Pure);
    assert_eq!(err.location.as_deref(), Some("pipeline.rs:12"));
    assert!(!err.is_defect());
    assert!(err.to_string().contains("pipeline.rs:12"));

    let err = f
        .define_update(vec![Expr::var("x")], vec![Expr::var("x")], &ctx)
        .unwrap_err();
    assert_eq!(err.kind, DefinitionKind::Update(0));
    Ok(())
}

#[test]
fn cse_shares_equal_subtrees() {
    let x = Expr::var("x");
    let e = (x.clone() + 1) * (x + 1);
    let shared = eliminate_common_subexpressions(&e);
    let ExprKind::Binary { a, b, .. } = shared.kind() else {
        panic!("expected a binary node, found {}", shared)
    };
    assert!(a.same_as(b));
    assert_eq!(shared.to_string(), e.to_string());

    let r = random_float() + random_float();
    let r = eliminate_common_subexpressions(&r);
    let ExprKind::Binary { a, b, .. } = r.kind() else {
        panic!("expected a binary node, found {}", r)
    };
    assert!(!a.same_as(b));
}

#[test]
fn scopes_shadow() {
    let mut scope = Scope::new();
    scope.push("a", 1);
    scope.push("a", 2);
    assert_eq!(scope.get("a"), Some(&2));
    assert_eq!(scope.pop("a"), Some(2));
    assert_eq!(scope.get("a"), Some(&1));
    scope.pop("a");
    assert!(!scope.contains("a"));
    assert!(scope.is_empty());
}

#[test]
fn generations_are_unique_across_threads() {
    let ctx = Context::new();
    let mut all = std::thread::scope(|s| {
        let handles = (0..4)
            .map(|_| s.spawn(|| (0..100).map(|_| ctx.next_generation()).collect::<Vec<_>>()))
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect::<Vec<_>>()
    });
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 400);
    assert_eq!(ctx.issued(), 400);
}

#[test]
fn unique_names() {
    let a = unique_name('r');
    let b = unique_name('r');
    assert!(a.starts_with("r$"));
    assert_ne!(a, b);
}

#[test]
fn types() -> Result<()> {
    assert_eq!(Type::try_from("UInt8")?, Type::uint(8));
    assert_eq!(Type::try_from("float64")?.to_string(), "float64");
    assert!(Type::try_from("int7").is_err());
    assert!(Type::try_from("complex").is_err());
    assert_eq!(Type::float(32).bytes(), 4);
    Ok(())
}

#[test]
fn unsigned_constants_wrap() {
    let u = Expr::variable().name("u").t(Type::uint(8)).build();
    assert_eq!((u + (-1)).to_string(), "(u + 255u)");
    assert_eq!(Expr::constant(Type::uint(8), 256).to_string(), "0u");
    assert_eq!(
        Expr::constant(Type::uint(64), -1).to_string(),
        format!("{}u", u64::MAX)
    );
    assert_eq!(Expr::constant(Type::int(32), -1).to_string(), "-1");
}
