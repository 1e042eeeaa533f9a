use log::*;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{FunctionContents, References};
use crate::{errors::ErrorKind, structs::FuncId};

/// The ownership ledger of a function.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefCount {
    /// external handles, plus one per distinct call node held by the
    /// committed definitions of other functions
    pub strong: usize,
    /// distinct call nodes of the function's own updates calling it back;
    /// they do not keep it alive
    pub back_edges: usize,
}

#[derive(Debug)]
struct Slot {
    contents: FunctionContents,
    refs: RefCount,
}

/// All the functions of a pipeline, addressed by [`FuncId`]. Call nodes hold
/// handles into the arena rather than owning pointers; ownership is tracked
/// explicitly by the [`RefCount`] of every slot, and a function is freed as
/// soon as its strong count drops to zero. Freed slots are never reused.
#[derive(Debug)]
pub struct FunctionArena {
    tag: usize,
    slots: Vec<Option<Slot>>,
}
impl Default for FunctionArena {
    fn default() -> Self {
        static ARENAS: AtomicUsize = AtomicUsize::new(0);
        FunctionArena {
            tag: ARENAS.fetch_add(1, Ordering::Relaxed),
            slots: Vec::new(),
        }
    }
}
impl FunctionArena {
    /// Store a new function, owned by a single external holder
    pub fn insert(&mut self, contents: FunctionContents) -> FuncId {
        self.slots.push(Some(Slot {
            contents,
            refs: RefCount {
                strong: 1,
                back_edges: 0,
            },
        }));
        FuncId {
            arena: self.tag,
            index: self.slots.len() - 1,
        }
    }

    /// The slot of `id`, if it was issued by this arena
    fn index_of(&self, id: FuncId) -> Option<usize> {
        (id.arena == self.tag).then_some(id.index)
    }

    fn slot(&self, id: FuncId) -> Result<&Slot, ErrorKind> {
        self.index_of(id)
            .and_then(|i| self.slots.get(i))
            .and_then(Option::as_ref)
            .ok_or(ErrorKind::DanglingReference(id))
    }

    fn slot_mut(&mut self, id: FuncId) -> Result<&mut Slot, ErrorKind> {
        self.index_of(id)
            .and_then(|i| self.slots.get_mut(i))
            .and_then(Option::as_mut)
            .ok_or(ErrorKind::DanglingReference(id))
    }

    pub fn get(&self, id: FuncId) -> Result<&FunctionContents, ErrorKind> {
        self.slot(id).map(|s| &s.contents)
    }

    pub fn get_mut(&mut self, id: FuncId) -> Result<&mut FunctionContents, ErrorKind> {
        self.slot_mut(id).map(|s| &mut s.contents)
    }

    pub fn is_live(&self, id: FuncId) -> bool {
        self.slot(id).is_ok()
    }

    pub fn ref_count(&self, id: FuncId) -> Option<RefCount> {
        self.slot(id).ok().map(|s| s.refs)
    }

    /// The number of functions not freed yet
    pub fn live(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn retain(&mut self, id: FuncId) -> Result<(), ErrorKind> {
        self.slot_mut(id)?.refs.strong += 1;
        Ok(())
    }

    /// Drop one strong reference to `id`. If it was the last one, the
    /// function is freed together with its definitions, and the references
    /// these definitions held are released in turn. Return the names of the
    /// freed functions.
    pub fn release(&mut self, id: FuncId) -> Result<Vec<String>, ErrorKind> {
        self.slot(id)?;

        let mut freed = Vec::new();
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let Ok(slot) = self.slot_mut(id) else {
                continue;
            };
            slot.refs.strong = slot.refs.strong.saturating_sub(1);
            if slot.refs.strong == 0 {
                if let Some(slot) = self.slots[id.index].take() {
                    trace!(
                        "freeing {} ({} back edges)",
                        slot.contents.name,
                        slot.refs.back_edges
                    );
                    pending.extend(slot.contents.edges.iter().copied());
                    freed.push(slot.contents.name);
                }
            }
        }
        Ok(freed)
    }

    /// Record the references held by a new definition of `owner`: every
    /// edge to another function becomes a strong reference on its target,
    /// every self-reference a weak back-edge on `owner`.
    ///
    /// Self-referencing call nodes are owned by the very function they point
    /// to. Each of them is attached as a strong reference, then immediately
    /// weakened. The arena is left untouched on failure.
    pub fn commit_references(&mut self, owner: FuncId, refs: &References) -> Result<(), ErrorKind> {
        for target in refs.edges.iter() {
            self.slot(*target)?;
        }
        self.slot(owner)?;

        self.slot_mut(owner)?.refs.strong += refs.self_references;
        if let Err(e) = self.weaken_back_edges(owner, refs.self_references) {
            self.slot_mut(owner)?.refs.strong -= refs.self_references;
            return Err(e);
        }
        for target in refs.edges.iter() {
            self.slot_mut(*target)?.refs.strong += 1;
        }
        self.slot_mut(owner)?
            .contents
            .edges
            .extend(refs.edges.iter().copied());
        Ok(())
    }

    /// Turn `n` strong references of `id` into weak back-edges. The strong
    /// count may never reach zero this way: the function would be freed
    /// while still held.
    pub fn weaken_back_edges(&mut self, id: FuncId, n: usize) -> Result<(), ErrorKind> {
        let refs = &mut self.slot_mut(id)?.refs;
        if n > 0 && refs.strong <= n {
            return Err(ErrorKind::CycleAccountingViolation {
                found: n,
                strong: refs.strong,
            });
        }
        refs.strong -= n;
        refs.back_edges += n;
        Ok(())
    }
}
impl std::ops::Index<FuncId> for FunctionArena {
    type Output = FunctionContents;

    fn index(&self, id: FuncId) -> &FunctionContents {
        match self.get(id) {
            Ok(c) => c,
            Err(e) => panic!("{}", e),
        }
    }
}
impl std::ops::IndexMut<FuncId> for FunctionArena {
    fn index_mut(&mut self, id: FuncId) -> &mut FunctionContents {
        match self.get_mut(id) {
            Ok(c) => c,
            Err(e) => panic!("{}", e),
        }
    }
}
