//! Well-formedness check for array-level programs.
//!
//! Verifies that a program is consistent with the environment it is
//! evaluated in:
//! - every index is in range and agrees with the type of its slot
//! - every binder pattern matches the type of the value it binds
//! - every `Exec` argument list matches the operation's signature
//! - buffer arguments carry one `i64` shape variable per dimension
//!
//! Scalar functions are checked against their own scalar environment.
//! All problems are collected rather than stopping at the first one.

use std::fmt;

use log::trace;

use crate::args::Signature;
use crate::cluster::Operation;
use crate::env::{Idx, Lhs, TypedEnv};
use crate::error::CompilerError;
use crate::ir::{Acc, Arg, ArrayInstr, Exp, Fun};
use crate::types::{Type, TypeExt, bool_ty, size_ty};

/// Verification error.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyError {
    /// An array-level index is out of range or has the wrong type tag.
    BadIndex { idx: Idx, error: CompilerError },

    /// A scalar variable is out of range or has the wrong type tag.
    BadScalarVar { idx: Idx, error: CompilerError },

    /// A binder pattern does not match the type of the value bound to it.
    BinderMismatch { lhs: Lhs, bound: Type },

    /// An `Exec` argument list does not match the operation's signature.
    SignatureMismatch { op: String, expected: Signature, found: Signature },

    /// A condition is not a boolean.
    NonBooleanCondition { found: Type },

    /// A buffer's shape variables do not match its rank.
    BadShape { buf: Idx, rank: usize, extents: usize },

    /// A shape variable is not an extent.
    BadExtent { idx: Idx },

    /// An `Index` instruction reads from something that is not a buffer.
    NotABuffer { idx: Idx },

    /// `Fst` or `Snd` of an expression whose type is not a pair.
    NotAPair { found: Type },
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyError::BadIndex { idx, error } => write!(f, "Bad index {}: {}", idx, error),
            VerifyError::BadScalarVar { idx, error } => write!(f, "Bad scalar variable {}: {}", idx, error),
            VerifyError::BinderMismatch { lhs, bound } => {
                write!(f, "Binder {} of type {} cannot bind a value of type {}", lhs, lhs.ty(), bound)
            }
            VerifyError::SignatureMismatch { op, expected, found } => {
                write!(f, "{} expects arguments {}, got {}", op, expected, found)
            }
            VerifyError::NonBooleanCondition { found } => write!(f, "Condition has type {}, expected bool", found),
            VerifyError::BadShape { buf, rank, extents } => {
                write!(f, "Buffer {} has rank {} but {} shape variables", buf, rank, extents)
            }
            VerifyError::BadExtent { idx } => write!(f, "Shape variable {} has type {}, expected {}", idx, idx.ty, size_ty()),
            VerifyError::NotABuffer { idx } => write!(f, "Index instruction reads {} of type {}", idx, idx.ty),
            VerifyError::NotAPair { found } => write!(f, "Projection from type {}, expected a pair", found),
        }
    }
}

/// Verify `acc` against the environment of its free variables.
pub fn verify<Op: Operation>(acc: &Acc<Op>, env: &TypedEnv) -> Result<(), Vec<VerifyError>> {
    let mut verifier = Verifier { env: env.clone(), errors: Vec::new() };
    verifier.verify_acc(acc);
    if verifier.errors.is_empty() { Ok(()) } else { Err(verifier.errors) }
}

/// Verify a scalar function that may only reach the array environment
/// `env` through `ArrayInstr`.
pub fn verify_fun(f: &Fun, env: &TypedEnv) -> Result<(), Vec<VerifyError>> {
    let mut verifier = Verifier { env: env.clone(), errors: Vec::new() };
    verifier.verify_fun(f, &mut TypedEnv::new());
    if verifier.errors.is_empty() { Ok(()) } else { Err(verifier.errors) }
}

struct Verifier {
    /// Array-level environment at the current point.
    env: TypedEnv,
    errors: Vec<VerifyError>,
}

impl Verifier {
    fn check_idx(&mut self, idx: &Idx) {
        if let Err(error) = self.env.lookup(idx) {
            self.errors.push(VerifyError::BadIndex { idx: idx.clone(), error });
        }
    }

    fn check_extent(&mut self, idx: &Idx) {
        self.check_idx(idx);
        if idx.ty != size_ty() {
            self.errors.push(VerifyError::BadExtent { idx: idx.clone() });
        }
    }

    fn check_binder(&mut self, lhs: &Lhs, bound: Type) {
        if lhs.ty() != bound {
            self.errors.push(VerifyError::BinderMismatch { lhs: lhs.clone(), bound });
        }
    }

    fn check_condition(&mut self, ty: Type) {
        if ty != bool_ty() {
            self.errors.push(VerifyError::NonBooleanCondition { found: ty });
        }
    }

    fn verify_acc<Op: Operation>(&mut self, acc: &Acc<Op>) {
        match acc {
            Acc::Exec { op, args } => {
                trace!("verify: exec {}", op.name());
                let expected = op.signature();
                if expected.check(args).is_err() {
                    self.errors.push(VerifyError::SignatureMismatch {
                        op: op.name(),
                        expected,
                        found: Signature::of(args),
                    });
                }
                for arg in args {
                    self.verify_arg(arg);
                }
            }
            Acc::Return(vars) => {
                for idx in vars.indices() {
                    self.check_idx(idx);
                }
            }
            Acc::Compute(e) => self.verify_exp(e, &mut TypedEnv::new()),
            Acc::Alloc { shape, .. } => {
                for idx in shape {
                    self.check_extent(idx);
                }
            }
            Acc::Let { lhs, bnd, body } => {
                self.verify_acc(bnd);
                self.check_binder(lhs, bnd.ty());
                let mark = self.env.push_lhs(lhs);
                trace!("verify: entered {} at depth {}", lhs, self.env.len());
                self.verify_acc(body);
                self.env.truncate(mark);
            }
            Acc::Cond { cond, then_branch, else_branch } => {
                self.check_idx(cond);
                self.check_condition(cond.ty.clone());
                self.verify_acc(then_branch);
                self.verify_acc(else_branch);
            }
        }
    }

    fn verify_arg(&mut self, arg: &Arg) {
        match arg {
            Arg::Var(idx) => self.check_idx(idx),
            Arg::Fun(f) => self.verify_fun(f, &mut TypedEnv::new()),
            Arg::Input { shape, buf } | Arg::Output { shape, buf } => {
                self.check_idx(buf);
                if let Some((rank, _)) = buf.ty.as_array() {
                    if rank != shape.len() {
                        self.errors.push(VerifyError::BadShape { buf: buf.clone(), rank, extents: shape.len() });
                    }
                } else {
                    self.errors.push(VerifyError::NotABuffer { idx: buf.clone() });
                }
                for idx in shape {
                    self.check_extent(idx);
                }
            }
        }
    }

    fn verify_fun(&mut self, f: &Fun, scope: &mut TypedEnv) {
        match f {
            Fun::Lam(lhs, body) => {
                let mark = scope.push_lhs(lhs);
                self.verify_fun(body, scope);
                scope.truncate(mark);
            }
            Fun::Body(e) => self.verify_exp(e, scope),
        }
    }

    fn verify_exp(&mut self, exp: &Exp, scope: &mut TypedEnv) {
        match exp {
            Exp::Let { lhs, bnd, body } => {
                self.verify_exp(bnd, scope);
                // An ill-typed bound expression has been reported already.
                if let Ok(ty) = bnd.try_ty() {
                    self.check_binder(lhs, ty);
                }
                let mark = scope.push_lhs(lhs);
                self.verify_exp(body, scope);
                scope.truncate(mark);
            }
            Exp::Var(idx) => {
                if let Err(error) = scope.lookup(idx) {
                    self.errors.push(VerifyError::BadScalarVar { idx: idx.clone(), error });
                }
            }
            Exp::Const(_) | Exp::Nil => {}
            Exp::Unary(_, e) => self.verify_exp(e, scope),
            Exp::Fst(e) | Exp::Snd(e) => {
                self.verify_exp(e, scope);
                if let Ok(found) = e.try_ty() {
                    if found.as_pair().is_none() {
                        self.errors.push(VerifyError::NotAPair { found });
                    }
                }
            }
            Exp::Binary(_, a, b) | Exp::Pair(a, b) => {
                self.verify_exp(a, scope);
                self.verify_exp(b, scope);
            }
            Exp::Cond(c, t, e) => {
                self.verify_exp(c, scope);
                if let Ok(ty) = c.try_ty() {
                    self.check_condition(ty);
                }
                self.verify_exp(t, scope);
                self.verify_exp(e, scope);
            }
            Exp::ArrayInstr(ArrayInstr::Index(buf), at) => {
                self.check_idx(buf);
                if buf.ty.as_array().is_none() {
                    self.errors.push(VerifyError::NotABuffer { idx: buf.clone() });
                }
                self.verify_exp(at, scope);
            }
            Exp::ArrayInstr(ArrayInstr::Parameter(var), arg) => {
                self.check_idx(var);
                self.verify_exp(arg, scope);
            }
        }
    }
}
