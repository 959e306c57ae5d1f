//! Reference evaluator.
//!
//! Runs scalar functions, primitive kernels, clusters and small array
//! programs over in-memory buffers. Used to check that a fused cluster
//! computes the same thing as its leaves run one after another. Buffers
//! live in a `Heap` and are referred to by `BufferId`; environments are
//! plain value stacks with the top at the end, mirroring `TypedEnv`.

use std::fmt;

use indexmap::IndexMap;
use log::trace;

use crate::args::{ArgKind, ArgLike, ArgSig};
use crate::cluster::{Cluster, Operation};
use crate::env::{Idx, Lhs, Vars};
use crate::error::{CompilerError, Result};
use crate::ir::{Acc, Arg, ArrayInstr, BinaryOp, Exp, Fun, Literal, UnaryOp};
use crate::kernel::Kernel;
use crate::types::{Type, TypeExt, TypeName};
use crate::{bail_invariant, err_invariant};

// =============================================================================
// Heap
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(u32);

impl From<u32> for BufferId {
    fn from(id: u32) -> Self {
        BufferId(id)
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buf{}", self.0)
    }
}

/// A dense buffer in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    pub shape: Vec<usize>,
    pub data: Vec<Literal>,
}

#[derive(Debug, Clone, Default)]
pub struct Heap {
    next_id: u32,
    buffers: IndexMap<BufferId, Buffer>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zero-filled buffer.
    pub fn alloc(&mut self, elem: &Type, shape: Vec<usize>) -> Result<BufferId> {
        let zero = zero_of(elem)?;
        let data = vec![zero; shape.iter().product()];
        Ok(self.insert(Buffer { shape, data }))
    }

    /// Store existing data; its length must match `shape`.
    pub fn store(&mut self, shape: Vec<usize>, data: Vec<Literal>) -> Result<BufferId> {
        let size: usize = shape.iter().product();
        if size != data.len() {
            bail_invariant!("buffer of shape {:?} needs {} elements, got {}", shape, size, data.len());
        }
        Ok(self.insert(Buffer { shape, data }))
    }

    fn insert(&mut self, buffer: Buffer) -> BufferId {
        let id = BufferId::from(self.next_id);
        self.next_id += 1;
        self.buffers.insert(id, buffer);
        id
    }

    pub fn buffer(&self, id: BufferId) -> Result<&Buffer> {
        self.buffers.get(&id).ok_or_else(|| err_invariant!("dangling buffer {}", id))
    }

    pub fn read(&self, id: BufferId, i: usize) -> Result<Literal> {
        let buffer = self.buffer(id)?;
        buffer
            .data
            .get(i)
            .copied()
            .ok_or(CompilerError::IndexOutOfRange { index: i, len: buffer.data.len() })
    }

    pub fn write(&mut self, id: BufferId, i: usize, value: Literal) -> Result<()> {
        let buffer = self.buffers.get_mut(&id).ok_or_else(|| err_invariant!("dangling buffer {}", id))?;
        let len = buffer.data.len();
        let slot = buffer.data.get_mut(i).ok_or(CompilerError::IndexOutOfRange { index: i, len })?;
        *slot = value;
        Ok(())
    }

    pub fn free(&mut self, id: BufferId) {
        self.buffers.shift_remove(&id);
    }

    /// Number of live buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

fn zero_of(elem: &Type) -> Result<Literal> {
    match elem {
        Type::Constructed(TypeName::Bool, _) => Ok(Literal::Bool(false)),
        Type::Constructed(TypeName::Int(_) | TypeName::UInt(_), _) => Ok(Literal::Int(0)),
        Type::Constructed(TypeName::Float(_), _) => Ok(Literal::Float(0.0)),
        other => Err(err_invariant!("cannot store {} in a buffer", other)),
    }
}

// =============================================================================
// Values
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Literal),
    Buffer(BufferId),
    Unit,
    Pair(Box<Value>, Box<Value>),
}

impl Value {
    pub fn pair(a: Value, b: Value) -> Self {
        Value::Pair(Box::new(a), Box::new(b))
    }

    fn as_literal(&self) -> Result<Literal> {
        match self {
            Value::Scalar(lit) => Ok(*lit),
            other => Err(err_invariant!("expected a scalar, found {:?}", other)),
        }
    }

    fn as_buffer(&self) -> Result<BufferId> {
        match self {
            Value::Buffer(id) => Ok(*id),
            other => Err(err_invariant!("expected a buffer, found {:?}", other)),
        }
    }

    fn as_extent(&self) -> Result<usize> {
        match self.as_literal()? {
            Literal::Int(n) if n >= 0 => Ok(n as usize),
            other => Err(err_invariant!("{} is not an extent", other)),
        }
    }
}

/// Look up a de Bruijn index in a value stack.
fn lookup<'a>(stack: &'a [Value], idx: &Idx) -> Result<&'a Value> {
    stack
        .len()
        .checked_sub(idx.ix + 1)
        .map(|pos| &stack[pos])
        .ok_or(CompilerError::IndexOutOfRange { index: idx.ix, len: stack.len() })
}

/// Destructure `value` according to `lhs`, pushing the bound parts.
fn bind(lhs: &Lhs, value: Value, stack: &mut Vec<Value>) -> Result<()> {
    match (lhs, value) {
        (Lhs::Wildcard(_), _) => Ok(()),
        (Lhs::Single(_), v) => {
            stack.push(v);
            Ok(())
        }
        (Lhs::Pair(l, r), Value::Pair(a, b)) => {
            bind(l, *a, stack)?;
            bind(r, *b, stack)
        }
        (lhs, v) => Err(err_invariant!("cannot bind {:?} to {}", v, lhs)),
    }
}

fn vars_value(vars: &Vars, env: &[Value]) -> Result<Value> {
    match vars {
        Vars::Unit => Ok(Value::Unit),
        Vars::Single(idx) => lookup(env, idx).cloned(),
        Vars::Pair(l, r) => Ok(Value::pair(vars_value(l, env)?, vars_value(r, env)?)),
    }
}

// =============================================================================
// Scalar evaluation
// =============================================================================

/// Evaluate a scalar expression. `scope` is the scalar environment and
/// `env` the array-level one reached through `ArrayInstr`.
pub fn eval_exp(exp: &Exp, scope: &mut Vec<Value>, env: &[Value], heap: &Heap) -> Result<Value> {
    match exp {
        Exp::Let { lhs, bnd, body } => {
            let v = eval_exp(bnd, scope, env, heap)?;
            let mark = scope.len();
            bind(lhs, v, scope)?;
            let out = eval_exp(body, scope, env, heap);
            scope.truncate(mark);
            out
        }
        Exp::Var(idx) => lookup(scope, idx).cloned(),
        Exp::Const(lit) => Ok(Value::Scalar(*lit)),
        Exp::Unary(op, e) => {
            let x = eval_exp(e, scope, env, heap)?.as_literal()?;
            Ok(Value::Scalar(unary(*op, x)?))
        }
        Exp::Binary(op, a, b) => {
            let x = eval_exp(a, scope, env, heap)?.as_literal()?;
            let y = eval_exp(b, scope, env, heap)?.as_literal()?;
            Ok(Value::Scalar(binary(*op, x, y)?))
        }
        Exp::Pair(a, b) => Ok(Value::pair(eval_exp(a, scope, env, heap)?, eval_exp(b, scope, env, heap)?)),
        Exp::Nil => Ok(Value::Unit),
        Exp::Fst(e) | Exp::Snd(e) => match eval_exp(e, scope, env, heap)? {
            Value::Pair(a, b) => Ok(if matches!(exp, Exp::Fst(_)) { *a } else { *b }),
            other => Err(err_invariant!("projection from non-pair {:?}", other)),
        },
        Exp::Cond(c, t, e) => match eval_exp(c, scope, env, heap)?.as_literal()? {
            Literal::Bool(true) => eval_exp(t, scope, env, heap),
            Literal::Bool(false) => eval_exp(e, scope, env, heap),
            other => Err(err_invariant!("condition evaluated to {}", other)),
        },
        Exp::ArrayInstr(ArrayInstr::Index(buf), at) => {
            let id = lookup(env, buf)?.as_buffer()?;
            let i = eval_exp(at, scope, env, heap)?.as_extent()?;
            Ok(Value::Scalar(heap.read(id, i)?))
        }
        Exp::ArrayInstr(ArrayInstr::Parameter(var), _) => lookup(env, var).cloned(),
    }
}

/// Apply a scalar function to its arguments, first parameter first.
pub fn apply_fun(f: &Fun, args: Vec<Value>, env: &[Value], heap: &Heap) -> Result<Value> {
    let mut scope = Vec::new();
    let mut args = args.into_iter();
    let mut f = f;
    while let Fun::Lam(lhs, body) = f {
        let arg = args.next().ok_or_else(|| err_invariant!("too few arguments for {}", lhs))?;
        bind(lhs, arg, &mut scope)?;
        f = &**body;
    }
    if args.next().is_some() {
        bail_invariant!("too many arguments for scalar function");
    }
    match f {
        Fun::Body(e) => eval_exp(e, &mut scope, env, heap),
        Fun::Lam(..) => unreachable!(),
    }
}

fn unary(op: UnaryOp, x: Literal) -> Result<Literal> {
    match (op, x) {
        (UnaryOp::Neg, Literal::Int(n)) => Ok(Literal::Int(-n)),
        (UnaryOp::Neg, Literal::Float(v)) => Ok(Literal::Float(-v)),
        (UnaryOp::Not, Literal::Bool(b)) => Ok(Literal::Bool(!b)),
        (op, x) => Err(err_invariant!("{:?} applied to {}", op, x)),
    }
}

fn binary(op: BinaryOp, x: Literal, y: Literal) -> Result<Literal> {
    use Literal::*;
    Ok(match (op, x, y) {
        (BinaryOp::Add, Int(a), Int(b)) => Int(a.wrapping_add(b)),
        (BinaryOp::Sub, Int(a), Int(b)) => Int(a.wrapping_sub(b)),
        (BinaryOp::Mul, Int(a), Int(b)) => Int(a.wrapping_mul(b)),
        (BinaryOp::Div, Int(_), Int(0)) => bail_invariant!("integer division by zero"),
        (BinaryOp::Div, Int(a), Int(b)) => Int(a.wrapping_div(b)),
        (BinaryOp::Add, Float(a), Float(b)) => Float(a + b),
        (BinaryOp::Sub, Float(a), Float(b)) => Float(a - b),
        (BinaryOp::Mul, Float(a), Float(b)) => Float(a * b),
        (BinaryOp::Div, Float(a), Float(b)) => Float(a / b),
        (BinaryOp::Eq, a, b) => Bool(a == b),
        (BinaryOp::Lt, Int(a), Int(b)) => Bool(a < b),
        (BinaryOp::Lt, Float(a), Float(b)) => Bool(a < b),
        (BinaryOp::And, Bool(a), Bool(b)) => Bool(a && b),
        (BinaryOp::Or, Bool(a), Bool(b)) => Bool(a || b),
        (op, a, b) => bail_invariant!("{:?} applied to {} and {}", op, a, b),
    })
}

// =============================================================================
// Operations
// =============================================================================

/// A resolved operation argument: what an `Arg` denotes at run time.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Scalar(Literal),
    Fun(Fun),
    Input { buf: BufferId, ty: Type },
    Output { buf: BufferId, ty: Type },
}

impl ArgValue {
    pub fn buffer(&self) -> Option<BufferId> {
        match self {
            ArgValue::Input { buf, .. } | ArgValue::Output { buf, .. } => Some(*buf),
            _ => None,
        }
    }
}

impl ArgLike for ArgValue {
    fn sig(&self) -> ArgSig {
        match self {
            ArgValue::Scalar(lit) => ArgSig::new(ArgKind::Var, lit.ty()),
            ArgValue::Fun(f) => ArgSig::new(ArgKind::Fun, f.ty()),
            ArgValue::Input { ty, .. } => ArgSig::new(ArgKind::In, ty.clone()),
            ArgValue::Output { ty, .. } => ArgSig::new(ArgKind::Out, ty.clone()),
        }
    }

    fn same_array(&self, other: &Self) -> bool {
        matches!((self.buffer(), other.buffer()), (Some(a), Some(b)) if a == b)
    }

    fn to_input(&self) -> Self {
        match self {
            ArgValue::Output { buf, ty } => ArgValue::Input { buf: *buf, ty: ty.clone() },
            other => other.clone(),
        }
    }
}

/// Operations the evaluator knows how to run.
pub trait Execute: Operation {
    /// Run with arguments in natural order.
    fn execute(&self, args: &[ArgValue], heap: &mut Heap) -> Result<()>;
}

impl Execute for Kernel {
    fn execute(&self, args: &[ArgValue], heap: &mut Heap) -> Result<()> {
        self.signature().check(args)?;
        trace!("execute {}", self.name());
        let bufs: Vec<BufferId> = args.iter().filter_map(ArgValue::buffer).collect();
        match (self, bufs.as_slice()) {
            (Kernel::Map { f, .. }, &[input, output]) => {
                let n = same_extent(heap, &[input, output])?;
                for i in 0..n {
                    let x = Value::Scalar(heap.read(input, i)?);
                    let y = apply_fun(f, vec![x], &[], heap)?.as_literal()?;
                    heap.write(output, i, y)?;
                }
                Ok(())
            }
            (Kernel::ZipWith { f, .. }, &[left, right, output]) => {
                let n = same_extent(heap, &[left, right, output])?;
                for i in 0..n {
                    let a = Value::Scalar(heap.read(left, i)?);
                    let b = Value::Scalar(heap.read(right, i)?);
                    let y = apply_fun(f, vec![a, b], &[], heap)?.as_literal()?;
                    heap.write(output, i, y)?;
                }
                Ok(())
            }
            (Kernel::Generate { f, .. }, &[output]) => {
                let n = heap.buffer(output)?.data.len();
                for i in 0..n {
                    let y = apply_fun(f, vec![Value::Scalar(Literal::Int(i as i64))], &[], heap)?.as_literal()?;
                    heap.write(output, i, y)?;
                }
                Ok(())
            }
            _ => Err(err_invariant!("{} received {} buffers", self.name(), bufs.len())),
        }
    }
}

fn same_extent(heap: &Heap, bufs: &[BufferId]) -> Result<usize> {
    let shapes = bufs.iter().map(|&b| Ok(heap.buffer(b)?.shape.clone())).collect::<Result<Vec<_>>>()?;
    if shapes.windows(2).any(|w| w[0] != w[1]) {
        bail_invariant!("elementwise operation over shapes {:?}", shapes);
    }
    Ok(shapes.first().map(|s| s.iter().product()).unwrap_or(0))
}

/// Run a cluster on its external arguments.
///
/// `temporaries` gives the extents of each consumed intermediate, in the
/// order of `Cluster::intermediate_signatures`. They are allocated before
/// the first leaf runs and freed after the last.
pub fn run_cluster<Op: Execute>(
    cluster: &Cluster<Op>,
    args: &[ArgValue],
    temporaries: &[Vec<usize>],
    heap: &mut Heap,
) -> Result<()> {
    let sigs = cluster.intermediate_signatures();
    if sigs.len() != temporaries.len() {
        bail_invariant!("{} needs {} temporaries, got {}", cluster, sigs.len(), temporaries.len());
    }
    let mut intermediates = Vec::with_capacity(sigs.len());
    for (sig, shape) in sigs.iter().zip(temporaries) {
        let (_, elem) = sig.ty.as_array().ok_or_else(|| err_invariant!("intermediate {} is not an array", sig))?;
        let buf = heap.alloc(elem, shape.clone())?;
        intermediates.push(ArgValue::Output { buf, ty: sig.ty.clone() });
    }

    let result = run_leaves(cluster, args, &intermediates, heap);
    for tmp in &intermediates {
        if let Some(buf) = tmp.buffer() {
            heap.free(buf);
        }
    }
    result
}

fn run_leaves<Op: Execute>(
    cluster: &Cluster<Op>,
    args: &[ArgValue],
    intermediates: &[ArgValue],
    heap: &mut Heap,
) -> Result<()> {
    let leaf_args = cluster.leaf_arguments(args, intermediates)?;
    let leaves = cluster.leaves();
    for i in cluster.schedule() {
        trace!("cluster leaf {}: {}", i, leaves[i].name());
        leaves[i].execute(&leaf_args[i], heap)?;
    }
    Ok(())
}

// =============================================================================
// Programs
// =============================================================================

/// Evaluate an array-level program. `env` holds the values of the free
/// variables, outermost first.
pub fn eval_acc<Op: Execute>(acc: &Acc<Op>, env: &mut Vec<Value>, heap: &mut Heap) -> Result<Value> {
    match acc {
        Acc::Exec { op, args } => {
            let resolved = args.iter().map(|arg| resolve_arg(arg, env)).collect::<Result<Vec<_>>>()?;
            op.execute(&resolved, heap)?;
            Ok(Value::Unit)
        }
        Acc::Return(vars) => vars_value(vars, env),
        Acc::Compute(e) => eval_exp(e, &mut Vec::new(), env, heap),
        Acc::Alloc { elem, shape } => {
            let extents = shape.iter().map(|idx| lookup(env, idx)?.as_extent()).collect::<Result<Vec<_>>>()?;
            Ok(Value::Buffer(heap.alloc(elem, extents)?))
        }
        Acc::Let { lhs, bnd, body } => {
            let v = eval_acc(bnd, env, heap)?;
            let mark = env.len();
            bind(lhs, v, env)?;
            let out = eval_acc(body, env, heap);
            env.truncate(mark);
            out
        }
        Acc::Cond { cond, then_branch, else_branch } => match lookup(env, cond)?.as_literal()? {
            Literal::Bool(true) => eval_acc(then_branch, env, heap),
            Literal::Bool(false) => eval_acc(else_branch, env, heap),
            other => Err(err_invariant!("condition evaluated to {}", other)),
        },
    }
}

fn resolve_arg(arg: &Arg, env: &[Value]) -> Result<ArgValue> {
    Ok(match arg {
        Arg::Var(idx) => ArgValue::Scalar(lookup(env, idx)?.as_literal()?),
        Arg::Fun(f) => ArgValue::Fun(f.clone()),
        Arg::Input { buf, .. } => ArgValue::Input { buf: lookup(env, buf)?.as_buffer()?, ty: buf.ty.clone() },
        Arg::Output { buf, .. } => ArgValue::Output { buf: lookup(env, buf)?.as_buffer()?, ty: buf.ty.clone() },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{f64_ty, i64_ty};

    #[test]
    fn test_apply_binary_fun() {
        // \a b -> a - b
        let f = Fun::binary(
            i64_ty(),
            i64_ty(),
            Exp::binary(BinaryOp::Sub, Exp::var(1, i64_ty()), Exp::var(0, i64_ty())),
        );
        let heap = Heap::new();
        let args = vec![Value::Scalar(Literal::Int(10)), Value::Scalar(Literal::Int(3))];
        assert_eq!(apply_fun(&f, args, &[], &heap).unwrap(), Value::Scalar(Literal::Int(7)));
    }

    #[test]
    fn test_index_reads_array_env() {
        let mut heap = Heap::new();
        let buf = heap.store(vec![2], vec![Literal::Float(1.5), Literal::Float(2.5)]).unwrap();
        let env = vec![Value::Buffer(buf)];
        let e = Exp::index(Idx::new(0, crate::types::array_ty(1, f64_ty())), Exp::int(1));
        assert_eq!(eval_exp(&e, &mut Vec::new(), &env, &heap).unwrap(), Value::Scalar(Literal::Float(2.5)));
    }

    #[test]
    fn test_division_by_zero_is_an_error() {
        let heap = Heap::new();
        let e = Exp::binary(BinaryOp::Div, Exp::int(1), Exp::int(0));
        assert!(eval_exp(&e, &mut Vec::new(), &[], &heap).is_err());
    }
}
