//! Argument lists and permutations.
//!
//! An operation's signature is an ordered list of `ArgSig`s. Reorderings of
//! such lists are built from `Take` steps: each step pulls one element out of
//! the remaining list. A `Permutation` is a chain of takes together with the
//! signature it was built for; applying it to a list whose signature differs
//! is an internal error.
//!
//! Elements are moved to the front in the order they are taken, and whatever
//! is left after the last take keeps its relative order. The empty chain is
//! therefore the identity on every list.

use std::fmt;

use itertools::Itertools;

use crate::error::Result;
use crate::types::Type;
use crate::{bail_shape, err_shape};

// =============================================================================
// Argument descriptors
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    /// Scalar parameter.
    Var,
    /// Scalar function parameter.
    Fun,
    /// Array read by the operation.
    In,
    /// Array written by the operation.
    Out,
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgKind::Var => write!(f, "Var"),
            ArgKind::Fun => write!(f, "Fun"),
            ArgKind::In => write!(f, "In"),
            ArgKind::Out => write!(f, "Out"),
        }
    }
}

/// Type-level description of one argument: its role and its type.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgSig {
    pub kind: ArgKind,
    pub ty: Type,
}

impl ArgSig {
    pub fn new(kind: ArgKind, ty: Type) -> Self {
        ArgSig { kind, ty }
    }

    pub fn input(ty: Type) -> Self {
        ArgSig::new(ArgKind::In, ty)
    }

    pub fn output(ty: Type) -> Self {
        ArgSig::new(ArgKind::Out, ty)
    }

    pub fn var(ty: Type) -> Self {
        ArgSig::new(ArgKind::Var, ty)
    }

    pub fn fun(ty: Type) -> Self {
        ArgSig::new(ArgKind::Fun, ty)
    }
}

impl fmt::Display for ArgSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.ty)
    }
}

/// Anything that can stand in an argument list: signatures themselves,
/// concrete IR arguments, or evaluator handles.
pub trait ArgLike: Clone {
    fn sig(&self) -> ArgSig;

    /// Whether two buffer arguments denote the same array.
    fn same_array(&self, other: &Self) -> bool;

    /// The reading counterpart of an output argument. Other arguments are
    /// returned unchanged.
    fn to_input(&self) -> Self;
}

impl ArgLike for ArgSig {
    fn sig(&self) -> ArgSig {
        self.clone()
    }

    fn same_array(&self, other: &Self) -> bool {
        matches!(self.kind, ArgKind::In | ArgKind::Out)
            && matches!(other.kind, ArgKind::In | ArgKind::Out)
            && self.ty == other.ty
    }

    fn to_input(&self) -> Self {
        match self.kind {
            ArgKind::Out => ArgSig::input(self.ty.clone()),
            _ => self.clone(),
        }
    }
}

/// An ordered argument list's shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature(pub Vec<ArgSig>);

impl Signature {
    pub fn new(args: Vec<ArgSig>) -> Self {
        Signature(args)
    }

    /// Signature of a concrete argument list.
    pub fn of<T: ArgLike>(args: &[T]) -> Self {
        Signature(args.iter().map(ArgLike::sig).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArgSig> {
        self.0.iter()
    }

    pub fn count(&self, kind: ArgKind) -> usize {
        self.0.iter().filter(|a| a.kind == kind).count()
    }

    /// Fail unless `args` has exactly this signature.
    pub fn check<T: ArgLike>(&self, args: &[T]) -> Result<()> {
        let found = Signature::of(args);
        if *self != found {
            bail_shape!("expected argument list {}, found {}", self, found);
        }
        Ok(())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.iter().join(", "))
    }
}

// =============================================================================
// Take
// =============================================================================

/// Witness selecting the element at `pos` out of a list with signature
/// `source`.
#[derive(Debug, Clone, PartialEq)]
pub struct Take {
    pos: usize,
    source: Signature,
}

impl Take {
    pub fn new(pos: usize, source: &Signature) -> Result<Self> {
        if pos >= source.len() {
            bail_shape!("cannot take position {} out of {}", pos, source);
        }
        Ok(Take { pos, source: source.clone() })
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn element(&self) -> &ArgSig {
        &self.source.0[self.pos]
    }

    /// Signature of what is left after the take.
    pub fn remainder(&self) -> Signature {
        let mut rest = self.source.0.clone();
        rest.remove(self.pos);
        Signature(rest)
    }

    pub fn apply<T: ArgLike>(&self, list: &[T]) -> Result<(T, Vec<T>)> {
        self.source.check(list)?;
        let mut rest = list.to_vec();
        let elem = rest.remove(self.pos);
        Ok((elem, rest))
    }
}

/// Take the element at `pos` out of `list`.
pub fn take<T: ArgLike>(pos: usize, list: &[T]) -> Result<(T, Vec<T>)> {
    Take::new(pos, &Signature::of(list))?.apply(list)
}

// =============================================================================
// Permutation
// =============================================================================

/// A reordering of argument lists with signature `source`, as a chain of
/// takes.
#[derive(Debug, Clone, PartialEq)]
pub struct Permutation {
    source: Signature,
    takes: Vec<Take>,
}

impl Permutation {
    /// The empty chain.
    pub fn identity(source: &Signature) -> Self {
        Permutation { source: source.clone(), takes: Vec::new() }
    }

    /// Build a chain from take positions; position `i` is relative to the
    /// list left after the first `i` takes.
    pub fn from_takes(source: &Signature, positions: &[usize]) -> Result<Self> {
        let mut remaining = source.clone();
        let mut takes = Vec::with_capacity(positions.len());
        for &pos in positions {
            let take = Take::new(pos, &remaining)?;
            remaining = take.remainder();
            takes.push(take);
        }
        Ok(Permutation { source: source.clone(), takes })
    }

    /// Build the permutation whose output position `i` holds source element
    /// `mapping[i]`.
    pub fn from_mapping(source: &Signature, mapping: &[usize]) -> Result<Self> {
        if mapping.len() != source.len() || !mapping.iter().copied().sorted().eq(0..source.len()) {
            return Err(err_shape!("{:?} is not a permutation of {} elements", mapping, source.len()));
        }
        let mut remaining: Vec<usize> = (0..source.len()).collect();
        let mut positions = Vec::with_capacity(mapping.len());
        for &want in mapping {
            let pos = remaining.iter().position(|&i| i == want).unwrap_or_default();
            remaining.remove(pos);
            positions.push(pos);
        }
        // Taking the head of what is left is the same as leaving it in place.
        while positions.last() == Some(&0) {
            positions.pop();
        }
        Self::from_takes(source, &positions)
    }

    pub fn source(&self) -> &Signature {
        &self.source
    }

    pub fn takes(&self) -> &[Take] {
        &self.takes
    }

    pub fn is_identity(&self) -> bool {
        self.mapping().iter().enumerate().all(|(i, &j)| i == j)
    }

    /// Output position `i` holds source element `mapping()[i]`.
    pub fn mapping(&self) -> Vec<usize> {
        let mut remaining: Vec<usize> = (0..self.source.len()).collect();
        let mut out = Vec::with_capacity(remaining.len());
        for take in &self.takes {
            out.push(remaining.remove(take.pos));
        }
        out.extend(remaining);
        out
    }

    /// Signature of the reordered list.
    pub fn target(&self) -> Signature {
        Signature(self.mapping().into_iter().map(|i| self.source.0[i].clone()).collect())
    }

    pub fn apply<T: ArgLike>(&self, list: &[T]) -> Result<Vec<T>> {
        self.source.check(list)?;
        let mut rest = list.to_vec();
        let mut out = Vec::with_capacity(rest.len());
        for take in &self.takes {
            out.push(rest.remove(take.pos));
        }
        out.extend(rest);
        Ok(out)
    }

    pub fn invert(&self) -> Permutation {
        let mapping = self.mapping();
        let mut inverse = vec![0; mapping.len()];
        for (i, &j) in mapping.iter().enumerate() {
            inverse[j] = i;
        }
        // The inverse of a permutation is a permutation of the same length.
        Self::from_mapping(&self.target(), &inverse).unwrap_or_else(|_| unreachable!())
    }
}

/// `compose(p, q)` applies `q` first, then `p`.
pub fn compose(p: &Permutation, q: &Permutation) -> Result<Permutation> {
    let mid = q.target();
    if p.source != mid {
        bail_shape!("cannot compose: {} does not accept {}", p.source, mid);
    }
    let pm = p.mapping();
    let qm = q.mapping();
    let mapping: Vec<usize> = pm.iter().map(|&i| qm[i]).collect();
    Permutation::from_mapping(&q.source, &mapping)
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.takes.iter().map(|t| t.pos).join(" "))
    }
}
