use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Mutex};

use super::UNIQUE_SEPARATOR;

/// A handle uniquely designates a function within the arena of its pipeline.
///
/// Handles are never reused: once the function they point to has been freed,
/// the handle dangles and any lookup through it fails. A handle carries the
/// tag of the arena it was issued by, and dangles in any other arena.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FuncId {
    pub(crate) arena: usize,
    pub(crate) index: usize,
}
impl FuncId {
    pub fn index(&self) -> usize {
        self.index
    }
}
impl std::fmt::Debug for FuncId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "func#{}.{}", self.arena, self.index)
    }
}
impl std::fmt::Display for FuncId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "func#{}", self.index)
    }
}

lazy_static::lazy_static! {
    /// One counter per prefix, shared by the whole process
    static ref UNIQUE_COUNTERS: Mutex<HashMap<char, usize>> = Mutex::new(HashMap::new());
}

/// Generate a process-wide unique name starting with `prefix`, e.g. `f$12`.
///
/// These names are used for unnamed functions (`f`), unnamed reduction
/// domains (`r`) and the placeholder arguments of extern definitions (`e`).
pub fn unique_name(prefix: char) -> String {
    let mut counters = UNIQUE_COUNTERS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let counter = counters.entry(prefix).or_insert(0);
    let r = format!("{}{}{}", prefix, UNIQUE_SEPARATOR, counter);
    *counter += 1;
    r
}

/// Generate the name of the `i`th output buffer of a function producing
/// `outputs` values.
pub fn output_buffer_name(function: &str, i: usize, outputs: usize) -> String {
    if outputs > 1 {
        format!("{}{}{}", function, super::OUTPUT_SEPARATOR, i)
    } else {
        function.to_owned()
    }
}
