//! Generator arena
//!
//! Generators reference their predecessor by handle, never by pointer.
//! The arena grows while the search goes deeper and is truncated when the
//! checkpoint that saw it grow is popped, so handles stay valid for exactly
//! as long as something on the search stack can reach them.

use super::generator::ChoiceGenerator;
use super::types::CgHandle;
use crate::domain::error::InternalError;

/// Arena of all live choice generators
#[derive(Debug, Clone, Default)]
pub struct CgArena {
    generators: Vec<ChoiceGenerator>,
}

impl CgArena {
    /// Empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `cg` and return its handle
    pub fn insert(&mut self, cg: ChoiceGenerator) -> CgHandle {
        let handle = CgHandle::new(self.generators.len());
        self.generators.push(cg);
        handle
    }

    /// Number of stored generators
    pub fn len(&self) -> usize {
        self.generators.len()
    }

    /// Whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// Drop every generator from handle `len` on
    pub fn truncate(&mut self, len: usize) {
        self.generators.truncate(len);
    }

    /// Lookup
    pub fn get(&self, handle: CgHandle) -> Result<&ChoiceGenerator, InternalError> {
        self.generators
            .get(handle.as_usize())
            .ok_or(InternalError::DanglingHandle(handle.as_usize()))
    }

    /// Mutable lookup
    pub fn get_mut(&mut self, handle: CgHandle) -> Result<&mut ChoiceGenerator, InternalError> {
        self.generators
            .get_mut(handle.as_usize())
            .ok_or(InternalError::DanglingHandle(handle.as_usize()))
    }

    /// Generators decided together in one transition, outermost first
    ///
    /// Starting at `innermost`, follows `prev` while the generator is
    /// cascaded.
    pub fn chain(&self, innermost: CgHandle) -> Result<Vec<CgHandle>, InternalError> {
        let mut chain = vec![innermost];
        let mut cur = self.get(innermost)?;
        while cur.is_cascaded() {
            let prev = cur.prev().ok_or(InternalError::NoCurrentGenerator)?;
            chain.push(prev);
            cur = self.get(prev)?;
        }
        chain.reverse();
        Ok(chain)
    }

    /// Every generator reachable through `prev`, root first
    pub fn ancestry(&self, handle: CgHandle) -> Result<Vec<CgHandle>, InternalError> {
        let mut path = vec![handle];
        let mut cur = self.get(handle)?;
        while let Some(prev) = cur.prev() {
            path.push(prev);
            cur = self.get(prev)?;
        }
        path.reverse();
        Ok(path)
    }

    /// Same id at the same position of the `prev` chain
    pub fn same_decision_point(&self, a: CgHandle, b: CgHandle) -> Result<bool, InternalError> {
        if self.get(a)?.id() != self.get(b)?.id() {
            return Ok(false);
        }
        Ok(self.ancestry(a)?.len() == self.ancestry(b)?.len())
    }

    /// Independent copy of `handle` and its whole `prev` chain
    ///
    /// The copy lives in a fresh arena; the returned handle is the copy of
    /// `handle` inside it.
    pub fn deep_clone(&self, handle: CgHandle) -> Result<(CgArena, CgHandle), InternalError> {
        let mut detached = CgArena::new();
        let mut prev = None;
        for h in self.ancestry(handle)? {
            let mut copy = self.get(h)?.clone();
            let cascaded = copy.is_cascaded();
            copy.set_prev(prev, cascaded);
            prev = Some(detached.insert(copy));
        }
        let top = prev.ok_or(InternalError::DanglingHandle(handle.as_usize()))?;
        Ok((detached, top))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::choice::ChoiceValue;

    fn linked(arena: &mut CgArena, cg: ChoiceGenerator, prev: Option<CgHandle>, cascaded: bool) -> CgHandle {
        let mut cg = cg;
        cg.set_prev(prev, cascaded);
        arena.insert(cg)
    }

    #[test]
    fn test_chain_stops_at_uncascaded() {
        let mut arena = CgArena::new();
        let root = linked(&mut arena, ChoiceGenerator::boolean("root"), None, false);
        let a = linked(&mut arena, ChoiceGenerator::boolean("a"), Some(root), false);
        let b = linked(&mut arena, ChoiceGenerator::boolean("b"), Some(a), true);

        assert_eq!(arena.chain(b).unwrap(), vec![a, b]);
        assert_eq!(arena.chain(a).unwrap(), vec![a]);
        assert_eq!(arena.ancestry(b).unwrap(), vec![root, a, b]);
    }

    #[test]
    fn test_same_decision_point() {
        let mut arena = CgArena::new();
        let r1 = linked(&mut arena, ChoiceGenerator::boolean("root"), None, false);
        let x1 = linked(&mut arena, ChoiceGenerator::boolean("x"), Some(r1), false);
        let r2 = linked(&mut arena, ChoiceGenerator::boolean("root"), None, false);
        let x2 = linked(&mut arena, ChoiceGenerator::boolean("x"), Some(r2), false);
        let x3 = linked(&mut arena, ChoiceGenerator::boolean("x"), Some(x2), false);

        assert!(arena.same_decision_point(x1, x2).unwrap());
        assert!(!arena.same_decision_point(x1, x3).unwrap());
        assert!(!arena.same_decision_point(r1, x1).unwrap());
    }

    #[test]
    fn test_deep_clone_is_independent() {
        let mut arena = CgArena::new();
        let a = linked(&mut arena, ChoiceGenerator::int_interval("a", 0, 2, 1), None, false);
        let b = linked(&mut arena, ChoiceGenerator::boolean("b"), Some(a), true);
        arena.get_mut(a).unwrap().advance();

        let (mut copy, top) = arena.deep_clone(b).unwrap();
        assert_eq!(copy.len(), 2);
        assert_eq!(copy.chain(top).unwrap().len(), 2);

        let outer = copy.get(top).unwrap().prev().unwrap();
        assert_eq!(copy.get(outer).unwrap().current_choice().unwrap(), ChoiceValue::Int(0));
        copy.get_mut(outer).unwrap().advance();

        assert_eq!(arena.get(a).unwrap().current_choice().unwrap(), ChoiceValue::Int(0));
    }

    #[test]
    fn test_truncate_invalidates_handles() {
        let mut arena = CgArena::new();
        let a = arena.insert(ChoiceGenerator::boolean("a"));
        let b = arena.insert(ChoiceGenerator::boolean("b"));
        arena.truncate(1);
        assert!(arena.get(a).is_ok());
        assert!(matches!(arena.get(b), Err(InternalError::DanglingHandle(1))));
    }
}
