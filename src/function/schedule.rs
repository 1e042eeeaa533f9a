use serde::{Deserialize, Serialize};

use crate::compiler::ReductionDomain;

/// How the loop over a dimension is to be iterated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ForType {
    #[default]
    Serial,
    Parallel,
    Vectorized,
    Unrolled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dim {
    pub var: String,
    pub for_type: ForType,
}
impl Dim {
    fn serial<S: AsRef<str>>(var: S) -> Self {
        Dim {
            var: var.as_ref().to_owned(),
            for_type: ForType::Serial,
        }
    }
}

/// The loop structure handed to the scheduler. It is derived from the
/// definitions, never written by the pipeline author at this stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// loop dimensions, innermost first
    pub dims: Vec<Dim>,
    /// the dimensions of the allocated storage, in memory order
    pub storage_dims: Vec<String>,
}
impl Schedule {
    /// One serial dimension per pure argument, in declaration order
    pub fn for_pure_definition(args: &[String]) -> Self {
        Schedule {
            dims: args.iter().map(Dim::serial).collect(),
            storage_dims: args.to_vec(),
        }
    }

    /// The reduction domain variables first, in domain order, then the pure
    /// positions of the left-hand side from left to right.
    ///
    /// The order matters: the scheduler expects the domain variables to be
    /// the innermost ones.
    pub fn for_update_definition(
        domain: Option<&ReductionDomain>,
        pure_args: &[Option<String>],
    ) -> Self {
        Schedule {
            dims: domain
                .into_iter()
                .flat_map(|d| d.var_names())
                .chain(pure_args.iter().flatten().map(String::as_str))
                .map(Dim::serial)
                .collect(),
            storage_dims: Vec::new(),
        }
    }

    /// Only the storage layout is known for an extern definition
    pub fn for_extern_definition(placeholders: &[String]) -> Self {
        Schedule {
            dims: Vec::new(),
            storage_dims: placeholders.to_vec(),
        }
    }

    pub fn dim_names(&self) -> Vec<&str> {
        self.dims.iter().map(|d| d.var.as_str()).collect()
    }
}
