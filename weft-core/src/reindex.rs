//! Reindexing: renaming de Bruijn indices across a whole program.
//!
//! A `ReindexMap` is a partial function on indices. `None` means the slot no
//! longer exists in the target environment. The `Reindex` trait walks a term
//! and applies a map to every array-level index it finds, sinking the map
//! under each binder it crosses. If any index actually used has no image,
//! the whole traversal yields `None`; this is how strengthening (removing an
//! unused binding) is attempted.
//!
//! Scalar expressions have their own environment. Their binders do not
//! shift array-level indices, so the walk passes the map through scalar
//! binders unchanged and only rewrites `ArrayInstr` references.

use crate::env::{Idx, Lhs, Vars};
use crate::error::Result;
use crate::ir::{Acc, Arg, ArrayInstr, Exp, Fun};

// =============================================================================
// Index maps
// =============================================================================

pub trait ReindexMap {
    fn reindex_idx(&self, idx: &Idx) -> Option<Idx>;
}

impl<M: ReindexMap + ?Sized> ReindexMap for &M {
    fn reindex_idx(&self, idx: &Idx) -> Option<Idx> {
        (**self).reindex_idx(idx)
    }
}

/// A closure used as a map.
#[derive(Debug, Clone, Copy)]
pub struct FnMap<F>(pub F);

pub fn from_fn<F: Fn(&Idx) -> Option<Idx>>(f: F) -> FnMap<F> {
    FnMap(f)
}

impl<F: Fn(&Idx) -> Option<Idx>> ReindexMap for FnMap<F> {
    fn reindex_idx(&self, idx: &Idx) -> Option<Idx> {
        (self.0)(idx)
    }
}

/// Shift every index by `n`: `n` new slots were pushed on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weaken(pub usize);

pub fn weaken(n: usize) -> Weaken {
    Weaken(n)
}

impl Weaken {
    /// `weaken(a).then(weaken(b)) == weaken(a + b)`.
    pub fn then(self, other: Weaken) -> Weaken {
        Weaken(self.0 + other.0)
    }
}

impl ReindexMap for Weaken {
    fn reindex_idx(&self, idx: &Idx) -> Option<Idx> {
        Some(idx.shifted(self.0))
    }
}

/// Remove the slot at depth `k`. References to it have no image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strengthen(pub usize);

pub fn strengthen(k: usize) -> Strengthen {
    Strengthen(k)
}

impl ReindexMap for Strengthen {
    fn reindex_idx(&self, idx: &Idx) -> Option<Idx> {
        if idx.ix < self.0 {
            Some(idx.clone())
        } else if idx.ix == self.0 {
            None
        } else {
            Some(Idx::new(idx.ix - 1, idx.ty.clone()))
        }
    }
}

/// Insert a fresh slot at depth `k`; the inverse of `strengthen(k)`.
pub fn insert_slot(k: usize) -> Sink<Weaken> {
    Sink::new(weaken(1), k)
}

/// Apply `first`, then `second`.
#[derive(Debug, Clone, Copy)]
pub struct Compose<A, B> {
    pub first: A,
    pub second: B,
}

pub fn compose<A: ReindexMap, B: ReindexMap>(first: A, second: B) -> Compose<A, B> {
    Compose { first, second }
}

impl<A: ReindexMap, B: ReindexMap> ReindexMap for Compose<A, B> {
    fn reindex_idx(&self, idx: &Idx) -> Option<Idx> {
        self.first.reindex_idx(idx).and_then(|i| self.second.reindex_idx(&i))
    }
}

// =============================================================================
// Sinking
// =============================================================================

/// How the slots of the binder being entered are treated.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BinderSlots {
    /// The binder is unchanged: its `n` slots map to themselves.
    Keep(usize),
    /// The binder is rebuilt; `slots[i]` is the new position of old slot
    /// `i`, or `None` if that slot is dropped.
    Rebuilt { slots: Vec<Option<usize>>, added: usize },
}

/// A map valid one binder deeper than `inner`.
#[derive(Debug, Clone)]
pub struct Sink<M> {
    inner: M,
    binder: BinderSlots,
}

impl<M: ReindexMap> Sink<M> {
    /// Sink `inner` under a binder of `n` slots.
    pub fn new(inner: M, n: usize) -> Self {
        Sink { inner, binder: BinderSlots::Keep(n) }
    }
}

impl<M: ReindexMap> ReindexMap for Sink<M> {
    fn reindex_idx(&self, idx: &Idx) -> Option<Idx> {
        match &self.binder {
            BinderSlots::Keep(n) => {
                if idx.ix < *n {
                    Some(idx.clone())
                } else {
                    let outer = Idx::new(idx.ix - n, idx.ty.clone());
                    self.inner.reindex_idx(&outer).map(|i| i.shifted(*n))
                }
            }
            BinderSlots::Rebuilt { slots, added } => {
                if let Some(slot) = slots.get(idx.ix) {
                    slot.map(|ix| Idx::new(ix, idx.ty.clone()))
                } else {
                    let outer = Idx::new(idx.ix - slots.len(), idx.ty.clone());
                    self.inner.reindex_idx(&outer).map(|i| i.shifted(*added))
                }
            }
        }
    }
}

/// Sink `map` under `binder`: the binder's own slots pass through unchanged,
/// older slots go through `map` and are shifted past the binder.
pub fn sink_under_binder<M: ReindexMap>(map: M, binder: &Lhs) -> Sink<M> {
    Sink::new(map, binder.slots())
}

/// Sink `map` under a binder that is being rebuilt from `old` to `new`,
/// where `new` drops some of `old`'s slots. References to dropped slots have
/// no image.
pub fn sink_with_lhs<M: ReindexMap>(map: M, old: &Lhs, new: &Lhs) -> Result<Sink<M>> {
    let slots = old.slot_map(new)?;
    Ok(Sink { inner: map, binder: BinderSlots::Rebuilt { slots, added: new.slots() } })
}

// =============================================================================
// Traversal
// =============================================================================

/// Terms whose array-level indices can be rewritten.
pub trait Reindex: Sized {
    fn reindex(&self, map: &dyn ReindexMap) -> Option<Self>;
}

/// Weaken a term by `n` slots. Weakening never fails.
pub fn weaken_term<T: Reindex>(term: &T, n: usize) -> T {
    term.reindex(&weaken(n)).unwrap_or_else(|| unreachable!("weakening is total"))
}

impl Reindex for Idx {
    fn reindex(&self, map: &dyn ReindexMap) -> Option<Self> {
        let out = map.reindex_idx(self)?;
        debug_assert_eq!(out.ty, self.ty, "reindexing changed the type of {}", self);
        Some(out)
    }
}

impl<T: Reindex> Reindex for Vec<T> {
    fn reindex(&self, map: &dyn ReindexMap) -> Option<Self> {
        self.iter().map(|t| t.reindex(map)).collect()
    }
}

impl<T: Reindex> Reindex for Box<T> {
    fn reindex(&self, map: &dyn ReindexMap) -> Option<Self> {
        Some(Box::new((**self).reindex(map)?))
    }
}

impl Reindex for Vars {
    fn reindex(&self, map: &dyn ReindexMap) -> Option<Self> {
        Some(match self {
            Vars::Unit => Vars::Unit,
            Vars::Single(idx) => Vars::Single(idx.reindex(map)?),
            Vars::Pair(l, r) => Vars::Pair(l.reindex(map)?, r.reindex(map)?),
        })
    }
}

impl Reindex for ArrayInstr {
    fn reindex(&self, map: &dyn ReindexMap) -> Option<Self> {
        Some(match self {
            ArrayInstr::Index(buf) => ArrayInstr::Index(buf.reindex(map)?),
            ArrayInstr::Parameter(var) => ArrayInstr::Parameter(var.reindex(map)?),
        })
    }
}

impl Reindex for Exp {
    fn reindex(&self, map: &dyn ReindexMap) -> Option<Self> {
        Some(match self {
            // Scalar binders and scalar variables live in the scalar
            // environment and are left alone.
            Exp::Let { lhs, bnd, body } => {
                Exp::Let { lhs: lhs.clone(), bnd: bnd.reindex(map)?, body: body.reindex(map)? }
            }
            Exp::Var(idx) => Exp::Var(idx.clone()),
            Exp::Const(lit) => Exp::Const(*lit),
            Exp::Unary(op, e) => Exp::Unary(*op, e.reindex(map)?),
            Exp::Binary(op, a, b) => Exp::Binary(*op, a.reindex(map)?, b.reindex(map)?),
            Exp::Pair(a, b) => Exp::Pair(a.reindex(map)?, b.reindex(map)?),
            Exp::Nil => Exp::Nil,
            Exp::Fst(e) => Exp::Fst(e.reindex(map)?),
            Exp::Snd(e) => Exp::Snd(e.reindex(map)?),
            Exp::Cond(c, t, e) => Exp::Cond(c.reindex(map)?, t.reindex(map)?, e.reindex(map)?),
            Exp::ArrayInstr(instr, arg) => Exp::ArrayInstr(instr.reindex(map)?, arg.reindex(map)?),
        })
    }
}

impl Reindex for Fun {
    fn reindex(&self, map: &dyn ReindexMap) -> Option<Self> {
        Some(match self {
            Fun::Lam(lhs, f) => Fun::Lam(lhs.clone(), f.reindex(map)?),
            Fun::Body(e) => Fun::Body(e.reindex(map)?),
        })
    }
}

impl Reindex for Arg {
    fn reindex(&self, map: &dyn ReindexMap) -> Option<Self> {
        Some(match self {
            Arg::Var(idx) => Arg::Var(idx.reindex(map)?),
            Arg::Fun(f) => Arg::Fun(f.reindex(map)?),
            Arg::Input { shape, buf } => Arg::Input { shape: shape.reindex(map)?, buf: buf.reindex(map)? },
            Arg::Output { shape, buf } => Arg::Output { shape: shape.reindex(map)?, buf: buf.reindex(map)? },
        })
    }
}

impl<Op: Clone> Reindex for Acc<Op> {
    fn reindex(&self, map: &dyn ReindexMap) -> Option<Self> {
        Some(match self {
            Acc::Exec { op, args } => Acc::Exec { op: op.clone(), args: args.reindex(map)? },
            Acc::Return(vars) => Acc::Return(vars.reindex(map)?),
            Acc::Compute(e) => Acc::Compute(e.reindex(map)?),
            Acc::Alloc { elem, shape } => Acc::Alloc { elem: elem.clone(), shape: shape.reindex(map)? },
            Acc::Let { lhs, bnd, body } => {
                let bnd = bnd.reindex(map)?;
                let body = body.reindex(&sink_under_binder(map, lhs))?;
                Acc::Let { lhs: lhs.clone(), bnd, body }
            }
            Acc::Cond { cond, then_branch, else_branch } => Acc::Cond {
                cond: cond.reindex(map)?,
                then_branch: then_branch.reindex(map)?,
                else_branch: else_branch.reindex(map)?,
            },
        })
    }
}
