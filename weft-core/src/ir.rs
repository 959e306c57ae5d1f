//! The array-level IR and the scalar expression language it embeds.
//!
//! Programs (`Acc`) are sequences of bindings over a typed environment of
//! buffers and scalars. Leaf computations are `Exec` nodes applying an
//! operation to an argument list. Scalar functions passed to operations
//! have their own de Bruijn environment; they reach back into the array
//! environment only through `ArrayInstr`.

use std::fmt;

use crate::args::{ArgKind, ArgLike, ArgSig};
use crate::env::{Idx, Lhs, Vars};
use crate::error::Result;
use crate::err_invariant;
use crate::types::{Type, TypeExt, array_ty, arrow_ty, bool_ty, f64_ty, i64_ty, pair_ty, unit_ty};

// =============================================================================
// Scalar expressions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Literal {
    pub fn ty(&self) -> Type {
        match self {
            Literal::Bool(_) => bool_ty(),
            Literal::Int(_) => i64_ty(),
            Literal::Float(_) => f64_ty(),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Float(x) => write!(f, "{:?}", x),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Lt,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Lt)
    }
}

/// Reference from a scalar expression into the array-level environment.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayInstr {
    /// Read an element of a buffer; the operand is the linear index.
    Index(Idx),
    /// Read a scalar variable; the operand is `Nil`.
    Parameter(Idx),
}

/// Scalar expression. `Var` indices refer to the scalar environment; the
/// array environment is only reachable through `ArrayInstr`.
#[derive(Debug, Clone, PartialEq)]
pub enum Exp {
    Let { lhs: Lhs, bnd: Box<Exp>, body: Box<Exp> },
    Var(Idx),
    Const(Literal),
    Unary(UnaryOp, Box<Exp>),
    Binary(BinaryOp, Box<Exp>, Box<Exp>),
    Pair(Box<Exp>, Box<Exp>),
    Nil,
    Fst(Box<Exp>),
    Snd(Box<Exp>),
    Cond(Box<Exp>, Box<Exp>, Box<Exp>),
    ArrayInstr(ArrayInstr, Box<Exp>),
}

impl Exp {
    pub fn var(ix: usize, ty: Type) -> Exp {
        Exp::Var(Idx::new(ix, ty))
    }

    pub fn float(x: f64) -> Exp {
        Exp::Const(Literal::Float(x))
    }

    pub fn int(n: i64) -> Exp {
        Exp::Const(Literal::Int(n))
    }

    pub fn binary(op: BinaryOp, a: Exp, b: Exp) -> Exp {
        Exp::Binary(op, Box::new(a), Box::new(b))
    }

    pub fn index(buf: Idx, at: Exp) -> Exp {
        Exp::ArrayInstr(ArrayInstr::Index(buf), Box::new(at))
    }

    pub fn parameter(var: Idx) -> Exp {
        Exp::ArrayInstr(ArrayInstr::Parameter(var), Box::new(Exp::Nil))
    }

    /// Result type, read off the type tags carried by indices and literals.
    ///
    /// A projection of a non-pair or an index into a non-array is an error.
    pub fn try_ty(&self) -> Result<Type> {
        Ok(match self {
            Exp::Let { body, .. } => body.try_ty()?,
            Exp::Var(idx) => idx.ty.clone(),
            Exp::Const(lit) => lit.ty(),
            Exp::Unary(UnaryOp::Not, _) => bool_ty(),
            Exp::Unary(UnaryOp::Neg, e) => e.try_ty()?,
            Exp::Binary(op, a, _) => {
                if op.is_comparison() {
                    bool_ty()
                } else {
                    a.try_ty()?
                }
            }
            Exp::Pair(a, b) => pair_ty(a.try_ty()?, b.try_ty()?),
            Exp::Nil => unit_ty(),
            Exp::Fst(e) | Exp::Snd(e) => {
                let ty = e.try_ty()?;
                let (a, b) = ty.as_pair().ok_or_else(|| err_invariant!("projection of non-pair type {}", ty))?;
                if matches!(self, Exp::Fst(_)) { a.clone() } else { b.clone() }
            }
            Exp::Cond(_, t, _) => t.try_ty()?,
            Exp::ArrayInstr(ArrayInstr::Index(buf), _) => buf
                .ty
                .as_array()
                .map(|(_, elem)| elem.clone())
                .ok_or_else(|| err_invariant!("index into {} of non-array type {}", buf, buf.ty))?,
            Exp::ArrayInstr(ArrayInstr::Parameter(var), _) => var.ty.clone(),
        })
    }

    /// Type of an expression that passed `verify`. Ill-typed projections
    /// and indexing read as unit here; use `try_ty` where that matters.
    pub fn ty(&self) -> Type {
        self.try_ty().unwrap_or_else(|_| unit_ty())
    }
}

/// Scalar function: a chain of lambdas around a body.
#[derive(Debug, Clone, PartialEq)]
pub enum Fun {
    Lam(Lhs, Box<Fun>),
    Body(Exp),
}

impl Fun {
    /// Unary function binding its argument to one slot.
    pub fn unary(param: Type, body: Exp) -> Fun {
        Fun::Lam(Lhs::Single(param), Box::new(Fun::Body(body)))
    }

    /// Binary function; the first parameter is index 1 and the second is
    /// index 0 inside the body.
    pub fn binary(a: Type, b: Type, body: Exp) -> Fun {
        Fun::Lam(Lhs::Single(a), Box::new(Fun::Lam(Lhs::Single(b), Box::new(Fun::Body(body)))))
    }

    pub fn ty(&self) -> Type {
        match self {
            Fun::Lam(lhs, f) => arrow_ty(lhs.ty(), f.ty()),
            Fun::Body(e) => e.ty(),
        }
    }
}

// =============================================================================
// Operation arguments
// =============================================================================

/// A concrete argument passed to an operation.
///
/// Buffer arguments carry the shape variables (scalar extents) alongside
/// the buffer itself, so an array's extent stays derivable even once its
/// buffer is fused away.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Var(Idx),
    Fun(Fun),
    Input { shape: Vec<Idx>, buf: Idx },
    Output { shape: Vec<Idx>, buf: Idx },
}

impl Arg {
    pub fn input(shape: Vec<Idx>, buf: Idx) -> Arg {
        Arg::Input { shape, buf }
    }

    pub fn output(shape: Vec<Idx>, buf: Idx) -> Arg {
        Arg::Output { shape, buf }
    }
}

impl ArgLike for Arg {
    fn sig(&self) -> ArgSig {
        match self {
            Arg::Var(idx) => ArgSig::new(ArgKind::Var, idx.ty.clone()),
            Arg::Fun(f) => ArgSig::new(ArgKind::Fun, f.ty()),
            Arg::Input { buf, .. } => ArgSig::new(ArgKind::In, buf.ty.clone()),
            Arg::Output { buf, .. } => ArgSig::new(ArgKind::Out, buf.ty.clone()),
        }
    }

    fn same_array(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Arg::Input { shape: s1, buf: b1 } | Arg::Output { shape: s1, buf: b1 },
                Arg::Input { shape: s2, buf: b2 } | Arg::Output { shape: s2, buf: b2 },
            ) => s1 == s2 && b1 == b2,
            _ => false,
        }
    }

    fn to_input(&self) -> Self {
        match self {
            Arg::Output { shape, buf } => Arg::Input { shape: shape.clone(), buf: buf.clone() },
            other => other.clone(),
        }
    }
}

// =============================================================================
// Array-level programs
// =============================================================================

/// An array-level program over operations of type `Op`.
#[derive(Debug, Clone, PartialEq)]
pub enum Acc<Op> {
    /// Run one operation; produces unit.
    Exec { op: Op, args: Vec<Arg> },
    Return(Vars),
    /// Evaluate a scalar expression at the array level.
    Compute(Exp),
    /// Allocate a buffer with the given extents.
    Alloc { elem: Type, shape: Vec<Idx> },
    Let { lhs: Lhs, bnd: Box<Acc<Op>>, body: Box<Acc<Op>> },
    Cond { cond: Idx, then_branch: Box<Acc<Op>>, else_branch: Box<Acc<Op>> },
}

impl<Op> Acc<Op> {
    /// Plain binding, with none of the simplifications done by
    /// `normalize::introduce_binding`.
    pub fn bind(lhs: Lhs, bnd: Acc<Op>, body: Acc<Op>) -> Self {
        Acc::Let { lhs, bnd: Box::new(bnd), body: Box::new(body) }
    }

    pub fn unit() -> Self {
        Acc::Return(Vars::Unit)
    }

    pub fn ty(&self) -> Type {
        match self {
            Acc::Exec { .. } => unit_ty(),
            Acc::Return(vars) => vars.ty(),
            Acc::Compute(e) => e.ty(),
            Acc::Alloc { elem, shape } => array_ty(shape.len(), elem.clone()),
            Acc::Let { body, .. } => body.ty(),
            Acc::Cond { then_branch, .. } => then_branch.ty(),
        }
    }

    /// True for a `Return` of unit: evaluating it has no observable effect.
    pub fn is_empty_return(&self) -> bool {
        matches!(self, Acc::Return(Vars::Unit))
    }
}
