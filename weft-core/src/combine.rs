//! Combine descriptors: how two argument lists merge into one.
//!
//! A descriptor is a sequence of modes consumed in lock-step with the left
//! and right argument lists. Each mode takes the head of one or both lists
//! and decides what, if anything, appears in the merged list:
//!
//! | mode | left | right | result |
//! |---|---|---|---|
//! | `Consumed` | `Out t` | `In t` | nothing |
//! | `Kept` | `Out t` | `In t` | `Out t` |
//! | `Shared` | `In t` | `In t` | `In t` |
//! | `WeakLeftOnly` | not used | any `x` | `x` |
//! | `WeakRightOnly` | any `x` | not used | `x` |
//! | `WeakLeftOnlyOut` | not used | `Out t` | `Out t` |
//! | `WeakRightOnlyOut` | `Out t` | not used | `Out t` |
//!
//! The descriptor is checked against both operand signatures once, in
//! `Combine::new`. After that, combining concrete values only re-checks the
//! signatures of the lists it is given.

use std::fmt;

use itertools::Itertools;

use crate::args::{ArgKind, ArgLike, ArgSig, Signature};
use crate::error::Result;
use crate::{bail_shape, err_shape};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombineMode {
    /// Vertical fusion: the intermediate array never leaves the cluster.
    Consumed,
    /// Diagonal fusion: fused, but the array is still materialized.
    Kept,
    /// Horizontal fusion: both sides read the same array.
    Shared,
    /// Only the right side uses this argument.
    WeakLeftOnly,
    /// Only the left side uses this argument.
    WeakRightOnly,
    /// Only the right side writes this array.
    WeakLeftOnlyOut,
    /// Only the left side writes this array.
    WeakRightOnlyOut,
}

impl CombineMode {
    fn uses_left(self) -> bool {
        !matches!(self, CombineMode::WeakLeftOnly | CombineMode::WeakLeftOnlyOut)
    }

    fn uses_right(self) -> bool {
        !matches!(self, CombineMode::WeakRightOnly | CombineMode::WeakRightOnlyOut)
    }

    fn short(self) -> &'static str {
        match self {
            CombineMode::Consumed => "V",
            CombineMode::Kept => "D",
            CombineMode::Shared => "H",
            CombineMode::WeakLeftOnly => "_R",
            CombineMode::WeakRightOnly => "L_",
            CombineMode::WeakLeftOnlyOut => "_R'",
            CombineMode::WeakRightOnlyOut => "L_'",
        }
    }
}

/// A validated descriptor relating `left`, `right` and `result` signatures.
#[derive(Debug, Clone, PartialEq)]
pub struct Combine {
    modes: Vec<CombineMode>,
    left: Signature,
    right: Signature,
    result: Signature,
}

impl Combine {
    /// Check `modes` against both operand signatures and derive the merged
    /// signature.
    pub fn new(modes: Vec<CombineMode>, left: &Signature, right: &Signature) -> Result<Self> {
        let mut l = left.iter();
        let mut r = right.iter();
        let mut result = Vec::new();
        for (pos, &mode) in modes.iter().enumerate() {
            let a = if mode.uses_left() {
                Some(l.next().ok_or_else(|| err_shape!("mode {:?} at {} runs past left list", mode, pos))?)
            } else {
                None
            };
            let b = if mode.uses_right() {
                Some(r.next().ok_or_else(|| err_shape!("mode {:?} at {} runs past right list", mode, pos))?)
            } else {
                None
            };
            if let Some(out) = merge_sig(mode, a, b).map_err(|e| err_shape!("at mode {}: {}", pos, e))? {
                result.push(out);
            }
        }
        if l.next().is_some() || r.next().is_some() {
            bail_shape!("descriptor {:?} does not cover {} and {}", modes, left, right);
        }
        Ok(Combine { modes, left: left.clone(), right: right.clone(), result: Signature(result) })
    }

    pub fn modes(&self) -> &[CombineMode] {
        &self.modes
    }

    pub fn left(&self) -> &Signature {
        &self.left
    }

    pub fn right(&self) -> &Signature {
        &self.right
    }

    pub fn result(&self) -> &Signature {
        &self.result
    }

    /// Signatures of the arrays removed from the interface by `Consumed`.
    pub fn consumed(&self) -> Signature {
        let mut l = self.left.iter();
        let mut out = Vec::new();
        for mode in &self.modes {
            if mode.uses_left() {
                if let Some(a) = l.next() {
                    if *mode == CombineMode::Consumed {
                        out.push(a.clone());
                    }
                }
            }
        }
        Signature(out)
    }
}

impl fmt::Display for Combine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.modes.iter().map(|m| m.short()).join(" "))
    }
}

fn merge_sig(mode: CombineMode, a: Option<&ArgSig>, b: Option<&ArgSig>) -> std::result::Result<Option<ArgSig>, String> {
    match (mode, a, b) {
        (CombineMode::Consumed | CombineMode::Kept, Some(a), Some(b)) => {
            if a.kind != ArgKind::Out || b.kind != ArgKind::In || a.ty != b.ty {
                return Err(format!("{:?} needs Out t / In t, found {} / {}", mode, a, b));
            }
            Ok((mode == CombineMode::Kept).then(|| a.clone()))
        }
        (CombineMode::Shared, Some(a), Some(b)) => {
            if a.kind != ArgKind::In || b.kind != ArgKind::In || a.ty != b.ty {
                return Err(format!("Shared needs In t / In t, found {} / {}", a, b));
            }
            Ok(Some(a.clone()))
        }
        (CombineMode::WeakLeftOnly, None, Some(b)) | (CombineMode::WeakRightOnly, Some(b), None) => {
            Ok(Some(b.clone()))
        }
        (CombineMode::WeakLeftOnlyOut, None, Some(b)) | (CombineMode::WeakRightOnlyOut, Some(b), None) => {
            if b.kind != ArgKind::Out {
                return Err(format!("{:?} needs an output, found {}", mode, b));
            }
            Ok(Some(b.clone()))
        }
        _ => Err(format!("malformed step {:?}", mode)),
    }
}

// =============================================================================
// Combining values
// =============================================================================

/// Merge concrete argument lists according to `desc`.
///
/// Fused positions must name the same array on both sides; the left value is
/// kept.
pub fn combine_values<T: ArgLike>(desc: &Combine, left: &[T], right: &[T]) -> Result<Vec<T>> {
    Ok(walk_values(desc, left, right)?.0)
}

/// The left-hand (producing) values at `Consumed` positions.
pub fn consumed_values<T: ArgLike>(desc: &Combine, left: &[T], right: &[T]) -> Result<Vec<T>> {
    Ok(walk_values(desc, left, right)?.1)
}

/// Signature-level `combine_values`.
pub fn combine_signatures(desc: &Combine, left: &Signature, right: &Signature) -> Result<Signature> {
    Ok(Signature(combine_values(desc, &left.0, &right.0)?))
}

fn walk_values<T: ArgLike>(desc: &Combine, left: &[T], right: &[T]) -> Result<(Vec<T>, Vec<T>)> {
    desc.left.check(left)?;
    desc.right.check(right)?;
    let mut l = left.iter();
    let mut r = right.iter();
    let mut merged = Vec::with_capacity(desc.result.len());
    let mut consumed = Vec::new();
    for &mode in &desc.modes {
        let a = if mode.uses_left() { l.next() } else { None };
        let b = if mode.uses_right() { r.next() } else { None };
        match (mode, a, b) {
            (CombineMode::Consumed | CombineMode::Kept | CombineMode::Shared, Some(a), Some(b)) => {
                if !a.same_array(b) {
                    bail_shape!("{:?} fuses two different arrays", mode);
                }
                match mode {
                    CombineMode::Consumed => consumed.push(a.clone()),
                    _ => merged.push(a.clone()),
                }
            }
            (_, Some(x), None) | (_, None, Some(x)) => merged.push(x.clone()),
            _ => bail_shape!("descriptor and argument lists disagree at {:?}", mode),
        }
    }
    Ok((merged, consumed))
}

/// Inverse of `combine_values`: recover the left and right argument lists
/// from the merged list and the consumed values.
pub fn split_values<T: ArgLike>(desc: &Combine, merged: &[T], consumed: &[T]) -> Result<(Vec<T>, Vec<T>)> {
    desc.result.check(merged)?;
    desc.consumed().check(consumed)?;
    let mut m = merged.iter();
    let mut c = consumed.iter();
    let mut left = Vec::with_capacity(desc.left.len());
    let mut right = Vec::with_capacity(desc.right.len());
    for &mode in &desc.modes {
        let x = match mode {
            CombineMode::Consumed => c.next(),
            _ => m.next(),
        };
        let x = x.ok_or_else(|| err_shape!("merged list too short for descriptor"))?;
        match mode {
            CombineMode::Consumed | CombineMode::Kept => {
                left.push(x.clone());
                right.push(x.to_input());
            }
            CombineMode::Shared => {
                left.push(x.clone());
                right.push(x.clone());
            }
            CombineMode::WeakLeftOnly | CombineMode::WeakLeftOnlyOut => right.push(x.clone()),
            CombineMode::WeakRightOnly | CombineMode::WeakRightOnlyOut => left.push(x.clone()),
        }
    }
    Ok((left, right))
}
