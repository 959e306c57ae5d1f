//! Typed environments and de Bruijn indices.
//!
//! An environment is a stack of typed slots. References into it are
//! `Idx` values: an offset counted from the top of the stack (0 is the most
//! recently bound slot) together with the type of the slot they expect.
//! Binders are described by `Lhs` patterns, which say how many slots a bound
//! value occupies once it is destructured.
//!
//! `TypedEnv` is the arena form of the environment used when checking or
//! walking a program: scopes are entered by pushing a binder's slots and
//! left by truncating back to the saved length.

use std::fmt;

use itertools::Itertools;

use crate::error::{CompilerError, Result};
use crate::types::{Type, TypeExt, pair_ty, unit_ty};

// =============================================================================
// Indices
// =============================================================================

/// A type-tagged de Bruijn index.
#[derive(Debug, Clone, PartialEq)]
pub struct Idx {
    pub ix: usize,
    pub ty: Type,
}

impl Idx {
    pub fn new(ix: usize, ty: Type) -> Self {
        Idx { ix, ty }
    }

    /// The same slot seen from `n` binders deeper.
    pub fn shifted(&self, n: usize) -> Self {
        Idx { ix: self.ix + n, ty: self.ty.clone() }
    }
}

impl fmt::Display for Idx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.ix)
    }
}

// =============================================================================
// Binder patterns
// =============================================================================

/// Left-hand side of a binding: how a bound value is attached to the
/// environment.
///
/// `Pair(l, r)` binds `l`'s slots first, so `r`'s slots end up on top.
#[derive(Debug, Clone, PartialEq)]
pub enum Lhs {
    /// Discards a value of the given type; binds no slots.
    Wildcard(Type),
    /// Binds the whole value to one slot.
    Single(Type),
    Pair(Box<Lhs>, Box<Lhs>),
}

impl Lhs {
    pub fn wildcard(ty: Type) -> Self {
        Lhs::Wildcard(ty)
    }

    pub fn single(ty: Type) -> Self {
        Lhs::Single(ty)
    }

    pub fn pair(l: Lhs, r: Lhs) -> Self {
        Lhs::Pair(Box::new(l), Box::new(r))
    }

    /// Fully destructure a value of type `ty`: pairs are split, units are
    /// discarded and everything else gets its own slot.
    pub fn from_type(ty: &Type) -> Self {
        if let Some((a, b)) = ty.as_pair() {
            Lhs::pair(Lhs::from_type(a), Lhs::from_type(b))
        } else if ty.is_unit() {
            Lhs::Wildcard(ty.clone())
        } else {
            Lhs::Single(ty.clone())
        }
    }

    /// Type of the value this pattern binds.
    pub fn ty(&self) -> Type {
        match self {
            Lhs::Wildcard(ty) | Lhs::Single(ty) => ty.clone(),
            Lhs::Pair(l, r) => pair_ty(l.ty(), r.ty()),
        }
    }

    /// Number of slots this pattern adds to the environment.
    pub fn slots(&self) -> usize {
        match self {
            Lhs::Wildcard(_) => 0,
            Lhs::Single(_) => 1,
            Lhs::Pair(l, r) => l.slots() + r.slots(),
        }
    }

    /// True if the pattern binds nothing.
    pub fn discards(&self) -> bool {
        self.slots() == 0
    }

    /// Slot types in binding order (the last one ends up on top).
    pub fn slot_types(&self) -> Vec<Type> {
        let mut out = Vec::new();
        self.collect_slot_types(&mut out);
        out
    }

    fn collect_slot_types(&self, out: &mut Vec<Type>) {
        match self {
            Lhs::Wildcard(_) => {}
            Lhs::Single(ty) => out.push(ty.clone()),
            Lhs::Pair(l, r) => {
                l.collect_slot_types(out);
                r.collect_slot_types(out);
            }
        }
    }

    /// Variables referring to the slots this pattern binds, valid directly
    /// inside the binder. Discarded parts become `Vars::Unit` only when
    /// they really are unit; any other wildcard has no variable to offer.
    pub fn vars(&self) -> Option<Vars> {
        let mut next = self.slots();
        self.vars_from(&mut next)
    }

    fn vars_from(&self, next: &mut usize) -> Option<Vars> {
        match self {
            Lhs::Wildcard(ty) if ty.is_unit() => Some(Vars::Unit),
            Lhs::Wildcard(_) => None,
            Lhs::Single(ty) => {
                *next -= 1;
                Some(Vars::Single(Idx::new(*next, ty.clone())))
            }
            Lhs::Pair(l, r) => {
                let l = l.vars_from(next)?;
                let r = r.vars_from(next)?;
                Some(Vars::pair(l, r))
            }
        }
    }

    /// The pattern with the slot at binder-relative index `k` (0 is the top
    /// slot of this binder) replaced by a wildcard.
    pub fn without_slot(&self, k: usize) -> Option<Lhs> {
        let n = self.slots();
        if k >= n {
            return None;
        }
        let mut pos = n - 1 - k;
        Some(self.drop_binding_position(&mut pos))
    }

    fn drop_binding_position(&self, pos: &mut usize) -> Lhs {
        match self {
            Lhs::Wildcard(_) => self.clone(),
            Lhs::Single(ty) => {
                let hit = *pos == 0;
                *pos = pos.wrapping_sub(1);
                if hit { Lhs::Wildcard(ty.clone()) } else { self.clone() }
            }
            Lhs::Pair(l, r) => {
                let l = l.drop_binding_position(pos);
                let r = r.drop_binding_position(pos);
                Lhs::pair(l, r)
            }
        }
    }

    /// For a pattern `new` obtained from `self` by turning some slots into
    /// wildcards, map each of `self`'s binder-relative slots to its index in
    /// `new`, or `None` if the slot was dropped.
    pub fn slot_map(&self, new: &Lhs) -> Result<Vec<Option<usize>>> {
        let mut kept = Vec::new();
        Self::zip_kept(self, new, &mut kept)?;
        let new_slots = kept.iter().filter(|k| **k).count();
        // `kept` is in binding order; binder-relative index 0 is its last entry.
        let mut map = Vec::with_capacity(kept.len());
        let mut above = 0;
        for keep in kept.iter().rev() {
            if *keep {
                map.push(Some(above));
                above += 1;
            } else {
                map.push(None);
            }
        }
        debug_assert_eq!(above, new_slots);
        Ok(map)
    }

    fn zip_kept(old: &Lhs, new: &Lhs, kept: &mut Vec<bool>) -> Result<()> {
        match (old, new) {
            (Lhs::Wildcard(a), Lhs::Wildcard(b)) if a == b => Ok(()),
            (Lhs::Single(a), Lhs::Single(b)) if a == b => {
                kept.push(true);
                Ok(())
            }
            (Lhs::Single(a), Lhs::Wildcard(b)) if a == b => {
                kept.push(false);
                Ok(())
            }
            (Lhs::Pair(l1, r1), Lhs::Pair(l2, r2)) => {
                Self::zip_kept(l1, l2, kept)?;
                Self::zip_kept(r1, r2, kept)
            }
            _ => Err(crate::err_invariant!("binder {} cannot be rebuilt as {}", old, new)),
        }
    }
}

impl fmt::Display for Lhs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lhs::Wildcard(_) => write!(f, "_"),
            Lhs::Single(ty) => write!(f, "({})", ty),
            Lhs::Pair(l, r) => write!(f, "({}, {})", l, r),
        }
    }
}

// =============================================================================
// Variable tuples
// =============================================================================

/// A tuple of variables, as returned by a program.
#[derive(Debug, Clone, PartialEq)]
pub enum Vars {
    Unit,
    Single(Idx),
    Pair(Box<Vars>, Box<Vars>),
}

impl Vars {
    pub fn single(idx: Idx) -> Self {
        Vars::Single(idx)
    }

    pub fn pair(l: Vars, r: Vars) -> Self {
        Vars::Pair(Box::new(l), Box::new(r))
    }

    pub fn ty(&self) -> Type {
        match self {
            Vars::Unit => unit_ty(),
            Vars::Single(idx) => idx.ty.clone(),
            Vars::Pair(l, r) => pair_ty(l.ty(), r.ty()),
        }
    }

    pub fn indices(&self) -> Vec<&Idx> {
        match self {
            Vars::Unit => vec![],
            Vars::Single(idx) => vec![idx],
            Vars::Pair(l, r) => l.indices().into_iter().chain(r.indices()).collect(),
        }
    }
}

impl fmt::Display for Vars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vars::Unit => write!(f, "()"),
            Vars::Single(idx) => write!(f, "{}", idx),
            Vars::Pair(l, r) => write!(f, "({}, {})", l, r),
        }
    }
}

// =============================================================================
// Typed environment
// =============================================================================

/// Arena of typed slots. The last element of `slots` is the top of the
/// environment (de Bruijn index 0).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedEnv {
    slots: Vec<Type>,
}

impl TypedEnv {
    pub fn new() -> Self {
        TypedEnv { slots: Vec::new() }
    }

    /// Build an environment from slot types, outermost first.
    pub fn from_slots(slots: Vec<Type>) -> Self {
        TypedEnv { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn push(&mut self, ty: Type) {
        self.slots.push(ty);
    }

    /// Enter a binder. Returns the length to truncate back to when the
    /// binder's scope ends.
    pub fn push_lhs(&mut self, lhs: &Lhs) -> usize {
        let mark = self.slots.len();
        self.slots.extend(lhs.slot_types());
        mark
    }

    /// Leave every scope entered since `mark` was taken.
    pub fn truncate(&mut self, mark: usize) {
        self.slots.truncate(mark);
    }

    /// Type of the slot `ix` positions below the top.
    pub fn slot(&self, ix: usize) -> Result<&Type> {
        if ix >= self.slots.len() {
            return Err(CompilerError::IndexOutOfRange { index: ix, len: self.slots.len() });
        }
        Ok(&self.slots[self.slots.len() - 1 - ix])
    }

    /// Resolve an index, checking both its range and its type tag.
    pub fn lookup(&self, idx: &Idx) -> Result<&Type> {
        let ty = self.slot(idx.ix)?;
        if *ty != idx.ty {
            return Err(CompilerError::TypeMismatch { expected: ty.clone(), found: idx.ty.clone() });
        }
        Ok(ty)
    }
}

impl fmt::Display for TypedEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.slots.iter().join(", "))
    }
}
