mod handle;

pub use handle::{output_buffer_name, unique_name, FuncId};

/// Separates the prefix of a generated name from its counter; it can not
/// appear in a user-written identifier
const UNIQUE_SEPARATOR: &str = "$";
/// Separates the name of a function from the index of one of its outputs
const OUTPUT_SEPARATOR: char = '.';
