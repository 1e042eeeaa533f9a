use itertools::Itertools;
use log::*;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::{
    cell::{Ref, RefCell, RefMut},
    rc::Rc,
};

use crate::{
    compiler::{CallType, Expr, ExprKind, Parameter, ReductionDomain, Type},
    context::Context,
    errors::{Advisory, DefinitionError, DefinitionKind, ErrorKind, Existing, Mismatch},
    structs::{output_buffer_name, unique_name, FuncId},
};

mod arena;
mod check;
mod references;
mod schedule;

pub use arena::{FunctionArena, RefCount};
pub use references::{count_self_references, References};
pub use schedule::{Dim, ForType, Schedule};

use check::check_vars;
use references::collect_references;

/// A refinement of the values of a function over a subset of its domain
#[derive(Debug, Clone)]
pub struct UpdateDefinition {
    /// the left-hand side, one expression per pure argument of the function
    pub args: Vec<Expr>,
    pub values: Vec<Expr>,
    pub domain: Option<ReductionDomain>,
    pub schedule: Schedule,
    /// the number of distinct call nodes calling back the function
    pub self_references: usize,
}
#[derive(Debug, Clone)]
pub enum ExternArgument {
    Function(FuncId),
    Expr(Expr),
    Buffer(Parameter),
}
impl From<&Function> for ExternArgument {
    fn from(f: &Function) -> Self {
        ExternArgument::Function(f.id())
    }
}
impl From<Expr> for ExternArgument {
    fn from(e: Expr) -> Self {
        ExternArgument::Expr(e)
    }
}
impl From<Parameter> for ExternArgument {
    fn from(p: Parameter) -> Self {
        ExternArgument::Buffer(p)
    }
}
impl std::fmt::Display for ExternArgument {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ExternArgument::Function(id) => write!(f, "{}", id),
            ExternArgument::Expr(e) => write!(f, "{}", e),
            ExternArgument::Buffer(p) => write!(f, "{}[]", p.name()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExternDefinition {
    pub name: String,
    pub args: Vec<ExternArgument>,
}

/// Everything a function owns. It is stored in the arena of its pipeline and
/// reached through [`Function`] handles.
#[derive(Debug, Default)]
pub struct FunctionContents {
    pub name: String,
    pub args: Vec<String>,
    /// the pure definition; empty until defined
    pub values: Vec<Expr>,
    pub output_types: Vec<Type>,
    pub output_buffers: Vec<Parameter>,
    pub schedule: Schedule,
    pub updates: Vec<UpdateDefinition>,
    pub extern_definition: Option<ExternDefinition>,
    /// caller-supplied location of the function in the pipeline sources
    pub debug_info: Option<String>,
    /// the strong references held by the definitions of this function, one
    /// per distinct call node
    pub(crate) edges: Vec<FuncId>,
}
impl FunctionContents {
    fn new(name: String) -> Self {
        FunctionContents {
            name,
            ..Default::default()
        }
    }

    pub fn has_pure_definition(&self) -> bool {
        !self.values.is_empty()
    }
    pub fn has_update_definition(&self) -> bool {
        !self.updates.is_empty()
    }
    pub fn has_extern_definition(&self) -> bool {
        self.extern_definition.is_some()
    }
    pub fn outputs(&self) -> usize {
        self.output_types.len()
    }

    fn output_buffers_for(&self, types: &[Type]) -> Vec<Parameter> {
        types
            .iter()
            .enumerate()
            .map(|(i, t)| Parameter::new(*t, true, output_buffer_name(&self.name, i, types.len())))
            .collect()
    }
}

/// A summary of a function as handed over to the scheduler
#[derive(Debug, Serialize)]
pub struct FunctionSummary {
    pub name: String,
    pub args: Vec<String>,
    pub output_types: Vec<Type>,
    pub output_buffers: Vec<String>,
    pub schedule: Schedule,
    pub updates: Vec<Schedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extern_name: Option<String>,
    pub refs: RefCount,
}

/// The arena of a pipeline, together with the releases issued while it was
/// borrowed. These are applied on the next access to the arena.
#[derive(Debug, Default)]
struct Shared {
    arena: RefCell<FunctionArena>,
    deferred: RefCell<Vec<FuncId>>,
}
impl Shared {
    fn borrow(&self) -> Ref<'_, FunctionArena> {
        self.settle();
        self.arena.borrow()
    }

    fn borrow_mut(&self) -> RefMut<'_, FunctionArena> {
        self.settle();
        self.arena.borrow_mut()
    }

    /// Apply the deferred releases, unless the arena is still borrowed
    fn settle(&self) {
        if self.deferred.borrow().is_empty() {
            return;
        }
        if let Ok(mut arena) = self.arena.try_borrow_mut() {
            self.drain(&mut arena);
        }
    }

    fn drain(&self, arena: &mut FunctionArena) {
        let pending = std::mem::take(&mut *self.deferred.borrow_mut());
        for id in pending {
            Self::release_in(arena, id);
        }
    }

    fn release(&self, id: FuncId) {
        match self.arena.try_borrow_mut() {
            Ok(mut arena) => {
                self.drain(&mut arena);
                Self::release_in(&mut arena, id);
            }
            Err(_) => {
                trace!("{} released while its pipeline is borrowed", id);
                self.deferred.borrow_mut().push(id);
            }
        }
    }

    fn release_in(arena: &mut FunctionArena, id: FuncId) {
        match arena.release(id) {
            Ok(freed) => {
                for name in freed {
                    debug!("{} freed", name.bold());
                }
            }
            Err(e) => error!("while releasing {}: {}", id, e),
        }
    }
}

/// The owner of a set of functions calling each other
#[derive(Debug, Default, Clone)]
pub struct Pipeline {
    shared: Rc<Shared>,
}
impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new, undefined function called `name`
    pub fn func<S: AsRef<str>>(&self, name: S) -> Function {
        let id = self
            .shared
            .borrow_mut()
            .insert(FunctionContents::new(name.as_ref().to_owned()));
        trace!("created {} as {}", name.as_ref(), id);
        Function {
            shared: self.shared.clone(),
            id,
        }
    }

    /// Create a new, undefined function with a unique name
    pub fn unnamed(&self) -> Function {
        self.func(unique_name('f'))
    }

    /// The number of functions of the pipeline not freed yet
    pub fn live_functions(&self) -> usize {
        self.shared.borrow().live()
    }

    pub fn is_live(&self, id: FuncId) -> bool {
        self.shared.borrow().is_live(id)
    }

    pub fn ref_count(&self, id: FuncId) -> Option<RefCount> {
        self.shared.borrow().ref_count(id)
    }
}

/// A handle on a function of a [`Pipeline`]. Every handle holds a strong
/// reference on its function: cloning it retains the function, dropping it
/// releases it. A handle dropped while its pipeline is borrowed is released
/// as soon as the borrow ends.
pub struct Function {
    shared: Rc<Shared>,
    id: FuncId,
}
impl Clone for Function {
    fn clone(&self) -> Self {
        if let Err(e) = self.shared.borrow_mut().retain(self.id) {
            error!("while cloning {}: {}", self.id, e);
        }
        Function {
            shared: self.shared.clone(),
            id: self.id,
        }
    }
}
impl Drop for Function {
    fn drop(&mut self) {
        self.shared.release(self.id);
    }
}
impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}

impl Function {
    pub fn id(&self) -> FuncId {
        self.id
    }

    /// Borrow the contents of the function. The pipeline can not be
    /// modified while the borrow lives.
    pub fn contents(&self) -> Ref<'_, FunctionContents> {
        Ref::map(self.shared.borrow(), |arena| &arena[self.id])
    }

    pub fn name(&self) -> String {
        self.contents().name.clone()
    }
    pub fn args(&self) -> Vec<String> {
        self.contents().args.clone()
    }
    pub fn dimensions(&self) -> usize {
        self.contents().args.len()
    }
    pub fn outputs(&self) -> usize {
        self.contents().outputs()
    }
    pub fn output_types(&self) -> Vec<Type> {
        self.contents().output_types.clone()
    }
    pub fn values(&self) -> Vec<Expr> {
        self.contents().values.clone()
    }
    pub fn updates(&self) -> Vec<UpdateDefinition> {
        self.contents().updates.clone()
    }
    pub fn update(&self, i: usize) -> Option<UpdateDefinition> {
        self.contents().updates.get(i).cloned()
    }
    pub fn schedule(&self) -> Schedule {
        self.contents().schedule.clone()
    }
    pub fn update_schedule(&self, i: usize) -> Option<Schedule> {
        self.contents().updates.get(i).map(|u| u.schedule.clone())
    }
    pub fn output_buffers(&self) -> Vec<Parameter> {
        self.contents().output_buffers.clone()
    }
    pub fn extern_definition(&self) -> Option<ExternDefinition> {
        self.contents().extern_definition.clone()
    }
    pub fn has_pure_definition(&self) -> bool {
        self.contents().has_pure_definition()
    }
    pub fn has_update_definition(&self) -> bool {
        self.contents().has_update_definition()
    }
    pub fn has_extern_definition(&self) -> bool {
        self.contents().has_extern_definition()
    }
    pub fn debug_info(&self) -> Option<String> {
        self.contents().debug_info.clone()
    }
    pub fn set_debug_info<S: AsRef<str>>(&self, location: S) {
        self.shared.borrow_mut()[self.id].debug_info = Some(location.as_ref().to_owned());
    }
    pub fn ref_count(&self) -> RefCount {
        self.shared.borrow().ref_count(self.id).unwrap_or_default()
    }

    pub fn summary(&self) -> FunctionSummary {
        let refs = self.ref_count();
        let c = self.contents();
        FunctionSummary {
            name: c.name.clone(),
            args: c.args.clone(),
            output_types: c.output_types.clone(),
            output_buffers: c.output_buffers.iter().map(|p| p.name().to_owned()).collect(),
            schedule: c.schedule.clone(),
            updates: c.updates.iter().map(|u| u.schedule.clone()).collect(),
            extern_name: c.extern_definition.as_ref().map(|e| e.name.clone()),
            refs,
        }
    }

    /// A call to the first output of this function
    pub fn call(&self, args: Vec<Expr>) -> Result<Expr, ErrorKind> {
        self.call_output(args, 0)
    }

    /// A call to the `index`th output of this function
    pub fn call_output(&self, args: Vec<Expr>, index: usize) -> Result<Expr, ErrorKind> {
        let c = self.contents();
        if !c.has_pure_definition() && !c.has_extern_definition() {
            return Err(ErrorKind::CallToUndefined);
        }
        if args.len() != c.args.len() {
            return Err(ErrorKind::ArityMismatch(Mismatch::Arguments {
                expected: c.args.len(),
                found: args.len(),
            }));
        }
        let t = *c
            .output_types
            .get(index)
            .ok_or(ErrorKind::ArityMismatch(Mismatch::OutputIndex {
                index,
                outputs: c.outputs(),
            }))?;

        Ok(Expr::new(
            ExprKind::Call {
                name: c.name.clone(),
                call_type: CallType::Function,
                func: Some(self.id),
                value_index: index,
                args,
            },
            t,
        ))
    }

    fn report(&self, kind: DefinitionKind, error: ErrorKind) -> DefinitionError {
        let c = self.contents();
        let err = DefinitionError {
            function: c.name.clone(),
            kind,
            location: c.debug_info.clone(),
            error,
        };
        if err.is_defect() {
            error!("{}", err);
        } else {
            debug!("rejected: {}", err);
        }
        err
    }

    fn check_pure(&self, args: &[String], values: &[Expr]) -> Result<(), ErrorKind> {
        let c = self.contents();
        if c.name.is_empty() {
            return Err(ErrorKind::MissingName);
        }
        if c.has_extern_definition() {
            return Err(ErrorKind::AlreadyDefined(Existing::Extern));
        }
        if c.has_pure_definition() {
            return Err(ErrorKind::AlreadyDefined(Existing::Pure));
        }
        if values.is_empty() {
            return Err(ErrorKind::ArityMismatch(Mismatch::NoValues));
        }
        for (i, arg) in args.iter().enumerate() {
            if arg.is_empty() {
                return Err(ErrorKind::EmptyArgumentName(i));
            }
            if let Some(first) = args[..i].iter().position(|a| a == arg) {
                return Err(ErrorKind::DuplicateArgumentName {
                    name: arg.to_owned(),
                    first,
                    second: i,
                });
            }
        }
        Ok(())
    }

    /// Give this function its pure definition: `self(args) = values`. Every
    /// variable of `values` must be one of `args`, bound to a parameter, or
    /// bound by an enclosing `let`.
    ///
    /// Nothing is committed if the definition is rejected.
    pub fn define<S: AsRef<str>>(
        &self,
        args: &[S],
        values: Vec<Expr>,
        ctx: &Context,
    ) -> Result<(), DefinitionError> {
        let args = args.iter().map(|a| a.as_ref().to_owned()).collect::<Vec<_>>();
        self.check_pure(&args, &values)
            .map_err(|e| self.report(DefinitionKind::Pure, e))?;

        let values = values
            .iter()
            .map(|v| ctx.lowering().eliminate_common_subexpressions(v))
            .collect::<Vec<_>>();

        let pure_args = args.iter().cloned().map(Some).collect::<Vec<_>>();
        match check_vars(self.id, &pure_args, values.iter()) {
            Ok(None) => {}
            Ok(Some(domain)) => {
                return Err(self.report(
                    DefinitionKind::Pure,
                    ErrorKind::PureDefinitionHasReductionDomain(domain.name().to_owned()),
                ))
            }
            Err(e) => return Err(self.report(DefinitionKind::Pure, e)),
        }

        let generation = ctx.next_generation();
        let values = values
            .iter()
            .map(|v| ctx.lowering().lower_random(v, &args, generation))
            .collect::<Vec<_>>();
        let refs = collect_references(self.id, values.iter());

        self.commit(DefinitionKind::Pure, &refs, |c| {
            c.output_types = values.iter().map(Expr::t).collect();
            c.output_buffers = c.output_buffers_for(&c.output_types);
            c.schedule = Schedule::for_pure_definition(&args);
            c.args = args;
            c.values = values;
            debug!(
                "{}({}) = ({})",
                c.name.bold(),
                c.args.iter().join(", "),
                c.values.iter().join(", ")
            );
        })
    }

    fn check_update(&self, args: &[Expr], values: &[Expr]) -> Result<(), ErrorKind> {
        let c = self.contents();
        if c.name.is_empty() {
            return Err(ErrorKind::MissingName);
        }
        if !c.has_pure_definition() {
            return Err(ErrorKind::MissingPureDefinition);
        }
        if args.len() != c.args.len() {
            return Err(ErrorKind::ArityMismatch(Mismatch::Arguments {
                expected: c.args.len(),
                found: args.len(),
            }));
        }
        if values.len() != c.values.len() {
            return Err(ErrorKind::ArityMismatch(Mismatch::Values {
                expected: c.values.len(),
                found: values.len(),
            }));
        }
        for (index, (v, expected)) in values.iter().zip(c.output_types.iter()).enumerate() {
            if v.t() != *expected {
                return Err(ErrorKind::ArityMismatch(Mismatch::ValueType {
                    index,
                    expected: *expected,
                    found: v.t(),
                }));
            }
        }
        Ok(())
    }

    /// The pure positions of an update left-hand side: the name of the
    /// `i`th pure argument if `args[i]` is exactly this variable, unbound to
    /// any parameter or domain, `None` otherwise.
    fn pure_positions(&self, args: &[Expr]) -> Vec<Option<String>> {
        let c = self.contents();
        args.iter()
            .zip(c.args.iter())
            .map(|(a, pure)| match a.kind() {
                ExprKind::Variable {
                    name,
                    param: None,
                    domain: None,
                } if name == pure => Some(name.to_owned()),
                _ => None,
            })
            .collect()
    }

    /// Add an update definition `self(args) = values`. The left-hand side
    /// must have one expression per pure argument; the values must match the
    /// pure definition in number and types.
    ///
    /// Return the advisories raised by the definition, once committed.
    /// Nothing is committed if the definition is rejected.
    pub fn define_update(
        &self,
        args: Vec<Expr>,
        values: Vec<Expr>,
        ctx: &Context,
    ) -> Result<Vec<Advisory>, DefinitionError> {
        let kind = DefinitionKind::Update(self.contents().updates.len());
        self.check_update(&args, &values)
            .map_err(|e| self.report(kind, e))?;

        let lowering = ctx.lowering();
        let args = args
            .iter()
            .map(|a| lowering.eliminate_common_subexpressions(a))
            .collect::<Vec<_>>();
        let values = values
            .iter()
            .map(|v| lowering.eliminate_common_subexpressions(v))
            .collect::<Vec<_>>();

        let pure_args = self.pure_positions(&args);
        let domain = check_vars(self.id, &pure_args, args.iter().chain(values.iter()))
            .map_err(|e| self.report(kind, e))?;

        let free_vars = pure_args
            .iter()
            .flatten()
            .cloned()
            .chain(
                domain
                    .iter()
                    .flat_map(|d| d.var_names().map(str::to_owned).collect::<Vec<_>>()),
            )
            .collect::<Vec<_>>();
        let generation = ctx.next_generation();
        let args = args
            .iter()
            .map(|a| lowering.lower_random(a, &free_vars, generation))
            .collect::<Vec<_>>();
        let values = values
            .iter()
            .map(|v| lowering.lower_random(v, &free_vars, generation))
            .collect::<Vec<_>>();

        let refs = collect_references(self.id, args.iter().chain(values.iter()));
        let schedule = Schedule::for_update_definition(domain.as_ref(), &pure_args);

        let mut advisories = Vec::new();
        if domain.is_none() && refs.self_references == 0 && pure_args.iter().all(Option::is_some)
        {
            if let DefinitionKind::Update(update) = kind {
                advisories.push(Advisory::ShadowsEarlierDefinitions {
                    function: self.name(),
                    update,
                });
            }
        }

        self.commit(kind, &refs, |c| {
            debug!(
                "{}({}) = ({}) over [{}]",
                c.name.bold(),
                args.iter().join(", "),
                values.iter().join(", "),
                schedule.dim_names().join(", ")
            );
            c.updates.push(UpdateDefinition {
                args,
                values,
                domain,
                schedule,
                self_references: refs.self_references,
            });
        })?;

        for advisory in advisories.iter() {
            warn!("{}", advisory);
        }
        Ok(advisories)
    }

    fn check_extern(&self) -> Result<(), ErrorKind> {
        let c = self.contents();
        if c.has_pure_definition() {
            return Err(ErrorKind::AlreadyDefined(Existing::Pure));
        }
        if c.has_update_definition() {
            return Err(ErrorKind::AlreadyDefined(Existing::Update));
        }
        if c.has_extern_definition() {
            return Err(ErrorKind::AlreadyDefined(Existing::Extern));
        }
        Ok(())
    }

    /// Define this function as the result of `extern_name`, a foreign
    /// computation producing one `dims`-dimensional buffer per type of
    /// `types`.
    ///
    /// Nothing is committed if the definition is rejected.
    pub fn define_extern<S: AsRef<str>>(
        &self,
        extern_name: S,
        args: Vec<ExternArgument>,
        types: Vec<Type>,
        dims: usize,
    ) -> Result<(), DefinitionError> {
        self.check_extern()
            .map_err(|e| self.report(DefinitionKind::Extern, e))?;

        let mut refs = References::default();
        for arg in args.iter() {
            match arg {
                ExternArgument::Function(f) => refs.add_edge(self.id, *f),
                ExternArgument::Expr(e) => {
                    let inner = collect_references(self.id, std::iter::once(e));
                    refs.self_references += inner.self_references;
                    refs.edges.extend(inner.edges);
                }
                ExternArgument::Buffer(_) => {}
            }
        }

        let placeholders = (0..dims).map(|_| unique_name('e')).collect::<Vec<_>>();
        self.commit(DefinitionKind::Extern, &refs, |c| {
            debug!(
                "{}({}) = extern {}({})",
                c.name.bold(),
                placeholders.iter().join(", "),
                extern_name.as_ref(),
                args.iter().join(", ")
            );
            c.output_buffers = c.output_buffers_for(&types);
            c.output_types = types;
            c.schedule = Schedule::for_extern_definition(&placeholders);
            c.args = placeholders;
            c.extern_definition = Some(ExternDefinition {
                name: extern_name.as_ref().to_owned(),
                args,
            });
        })
    }

    /// Record the references held by a new definition, then let `f` write
    /// it into the function
    fn commit<F: FnOnce(&mut FunctionContents)>(
        &self,
        kind: DefinitionKind,
        refs: &References,
        f: F,
    ) -> Result<(), DefinitionError> {
        let r = {
            let mut arena = self.shared.borrow_mut();
            arena
                .commit_references(self.id, refs)
                .map(|_| f(&mut arena[self.id]))
        };
        r.map_err(|e| self.report(kind, e))
    }
}
