use owo_colors::OwoColorize;
use serde::Serialize;
use thiserror::Error;

use crate::{compiler::Type, structs::FuncId};

/// Which of the three definition operations an error was raised by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DefinitionKind {
    Pure,
    /// the index the update definition would have had
    Update(usize),
    Extern,
}
impl std::fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DefinitionKind::Pure => write!(f, "pure definition"),
            DefinitionKind::Update(i) => write!(f, "update definition #{}", i),
            DefinitionKind::Extern => write!(f, "extern definition"),
        }
    }
}

/// What a function already holds when it is refused a new definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existing {
    Pure,
    Update,
    Extern,
}
impl std::fmt::Display for Existing {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Existing::Pure => write!(f, "a pure definition"),
            Existing::Update => write!(f, "update definitions"),
            Existing::Extern => write!(f, "an extern definition"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    NoValues,
    Arguments { expected: usize, found: usize },
    Values { expected: usize, found: usize },
    ValueType { index: usize, expected: Type, found: Type },
    OutputIndex { index: usize, outputs: usize },
}
impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Mismatch::NoValues => write!(f, "a definition needs at least one value"),
            Mismatch::Arguments { expected, found } => {
                write!(f, "expected {} arguments, found {}", expected, found)
            }
            Mismatch::Values { expected, found } => {
                write!(f, "expected {} tuple elements, found {}", expected, found)
            }
            Mismatch::ValueType {
                index,
                expected,
                found,
            } => write!(
                f,
                "tuple element #{} has type {}, but the pure definition has type {}",
                index, found, expected
            ),
            Mismatch::OutputIndex { index, outputs } => write!(
                f,
                "output #{} requested from a function with {} outputs",
                index, outputs
            ),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("a function needs a name")]
    MissingName,
    #[error("function already has {0}")]
    AlreadyDefined(Existing),
    #[error("can not add an update definition without a pure definition first")]
    MissingPureDefinition,
    #[error("{0}")]
    ArityMismatch(Mismatch),
    #[error("arguments {first} and {second} have the same name: {}", .name.red().bold())]
    DuplicateArgumentName {
        name: String,
        first: usize,
        second: usize,
    },
    #[error("argument {0} has an empty name")]
    EmptyArgumentName(usize),
    #[error("undefined variable in function definition: {}", .0.red().bold())]
    UnresolvedIdentifier(String),
    #[error("multiple reduction domains found in function definition: {} and {}", .0.yellow(), .1.yellow())]
    ConflictingReductionDomain(String, String),
    #[error("reduction domain {} referenced in pure function definition", .0.yellow())]
    PureDefinitionHasReductionDomain(String),
    #[error(
        "all of a function's recursive references to itself must contain the same pure variables in the same places as on the left-hand-side: found {}, expected {} at position {position}",
        .call.red(), .expected.green()
    )]
    InvalidRecursiveReference {
        call: String,
        expected: String,
        position: usize,
    },
    #[error("bug: removed too many circular references ({found} self-references, {strong} strong references)")]
    CycleAccountingViolation { found: usize, strong: usize },
    #[error("can not call a function without definition")]
    CallToUndefined,
    #[error("{0} does not designate a live function")]
    DanglingReference(FuncId),
}

/// A definition rejected by the engine. Nothing has been committed to the
/// function when this is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", make_definition_error_msg(.function, .kind, .location.as_deref(), .error))]
pub struct DefinitionError {
    pub function: String,
    pub kind: DefinitionKind,
    /// caller-supplied source location of the offending definition
    pub location: Option<String>,
    pub error: ErrorKind,
}
impl DefinitionError {
    /// Whether this error denotes a bug in the engine rather than in its input
    pub fn is_defect(&self) -> bool {
        matches!(self.error, ErrorKind::CycleAccountingViolation { .. })
    }
}

fn make_definition_error_msg(
    function: &str,
    kind: &DefinitionKind,
    location: Option<&str>,
    error: &ErrorKind,
) -> String {
    format!(
        "{}{} (in {} of {})",
        location
            .map(|l| format!("{}: ", l.bold()))
            .unwrap_or_default(),
        error,
        kind,
        function.yellow().bold()
    )
}

/// A non-fatal diagnostic: the definition has been committed, but is
/// probably not what its author meant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Advisory {
    /// An update with only pure arguments, no reduction domain and no
    /// self-reference overwrites every value computed before it
    ShadowsEarlierDefinitions { function: String, update: usize },
}
impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Advisory::ShadowsEarlierDefinitions { function, update } => write!(
                f,
                "update definition {} of function {} completely hides earlier definitions, \
                 because all the arguments are pure, it contains no self-references, \
                 and no reduction domain. This may be an accidental re-definition of \
                 an already-defined function.",
                update,
                function.yellow().bold()
            ),
        }
    }
}
