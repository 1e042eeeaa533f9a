mod cse;
mod random;

pub use cse::eliminate_common_subexpressions;
pub use random::{generation_tags, lower_random, random_float, random_int, STOCHASTIC_PRIMITIVES};
