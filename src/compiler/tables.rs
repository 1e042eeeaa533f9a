use std::collections::HashMap;

/// A lexically-scoped symbol table: every name maps to a stack of bindings,
/// the innermost one shadowing the others. Pushes and pops must be balanced
/// by the caller, mirroring the nesting of `let` expressions.
#[derive(Debug, Clone)]
pub struct Scope<T> {
    table: HashMap<String, Vec<T>>,
}
impl<T> Default for Scope<T> {
    fn default() -> Self {
        Scope {
            table: HashMap::new(),
        }
    }
}
impl<T> Scope<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<S: AsRef<str>>(&mut self, name: S, value: T) {
        self.table
            .entry(name.as_ref().to_owned())
            .or_default()
            .push(value);
    }

    /// Remove the innermost binding of `name`, returning it
    pub fn pop(&mut self, name: &str) -> Option<T> {
        let stack = self.table.get_mut(name)?;
        let r = stack.pop();
        if stack.is_empty() {
            self.table.remove(name);
        }
        r
    }

    /// The innermost binding of `name`
    pub fn get(&self, name: &str) -> Option<&T> {
        self.table.get(name).and_then(|s| s.last())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
