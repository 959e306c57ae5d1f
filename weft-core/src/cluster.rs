//! Cluster trees: groups of operations fused into one unit.
//!
//! A cluster is a binary tree. Leaves hold one operation together with the
//! permutation from the cluster's argument order into the operation's
//! natural order; branches merge two sub-clusters with a `Combine`
//! descriptor. Trees are built once by the fusion decision pass and read by
//! code generation.
//!
//! Trees are not canonical: the same fusion can be expressed by differently
//! shaped trees. Compare clusters by their external arguments and by the
//! validity of their execution order, not structurally.

use std::fmt;

use indexmap::IndexSet;
use itertools::Itertools;
use log::debug;

use crate::args::{ArgLike, Permutation, Signature};
use crate::combine::{Combine, CombineMode, combine_values, consumed_values, split_values};
use crate::error::Result;
use crate::{bail_shape, err_shape};

/// A primitive operation that can sit in a cluster leaf.
pub trait Operation: Clone + fmt::Debug {
    fn name(&self) -> String;

    /// Arguments in the operation's natural order.
    fn signature(&self) -> Signature;
}

#[derive(Debug, Clone)]
pub enum Cluster<Op> {
    Leaf {
        op: Op,
        /// From the cluster's argument order to `op`'s natural order.
        perm: Permutation,
        external: Signature,
    },
    Branch {
        left: Box<Cluster<Op>>,
        right: Box<Cluster<Op>>,
        combine: Combine,
    },
}

impl<Op: Operation> Cluster<Op> {
    /// A leaf whose arguments are reordered by `perm` into `op`'s natural
    /// order.
    pub fn leaf(op: Op, perm: Permutation) -> Result<Self> {
        let natural = op.signature();
        let target = perm.target();
        if target != natural {
            bail_shape!("permutation for {} produces {}, but {} expects {}", op.name(), target, op.name(), natural);
        }
        let external = Signature(perm.invert().apply(&natural.0)?);
        debug!("cluster leaf {}: {}", op.name(), external);
        Ok(Cluster::Leaf { op, perm, external })
    }

    /// A leaf taking its arguments in natural order.
    pub fn single(op: Op) -> Self {
        let external = op.signature();
        let perm = Permutation::identity(&external);
        Cluster::Leaf { op, perm, external }
    }

    /// A leaf whose external argument `i` is natural argument `order[i]`.
    pub fn reordered(op: Op, order: &[usize]) -> Result<Self> {
        let to_external = Permutation::from_mapping(&op.signature(), order)?;
        Self::leaf(op, to_external.invert())
    }

    pub fn branch(left: Cluster<Op>, right: Cluster<Op>, combine: Combine) -> Result<Self> {
        if combine.left() != left.external_arguments() {
            bail_shape!("descriptor expects left {}, found {}", combine.left(), left.external_arguments());
        }
        if combine.right() != right.external_arguments() {
            bail_shape!("descriptor expects right {}, found {}", combine.right(), right.external_arguments());
        }
        debug!("cluster branch {}: {}", combine, combine.result());
        Ok(Cluster::Branch { left: Box::new(left), right: Box::new(right), combine })
    }

    /// Build the descriptor from `modes` and merge.
    pub fn fuse(left: Cluster<Op>, right: Cluster<Op>, modes: Vec<CombineMode>) -> Result<Self> {
        let combine = Combine::new(modes, left.external_arguments(), right.external_arguments())?;
        Self::branch(left, right, combine)
    }

    /// The argument list of the cluster as a whole.
    pub fn external_arguments(&self) -> &Signature {
        match self {
            Cluster::Leaf { external, .. } => external,
            Cluster::Branch { combine, .. } => combine.result(),
        }
    }

    /// Operations in leaf order (left to right).
    pub fn leaves(&self) -> Vec<&Op> {
        match self {
            Cluster::Leaf { op, .. } => vec![op],
            Cluster::Branch { left, right, .. } => left.leaves().into_iter().chain(right.leaves()).collect(),
        }
    }

    /// Producer/consumer edges between leaves (by leaf position) implied by
    /// `Consumed` and `Kept` fusions.
    pub fn dependencies(&self) -> Vec<(usize, usize)> {
        let mut next = 0;
        let mut edges = IndexSet::new();
        self.provenance(&mut next, &mut edges);
        edges.into_iter().collect()
    }

    /// For each external argument, the leaves that use it: writers for
    /// outputs, readers for everything else.
    fn provenance(&self, next: &mut usize, edges: &mut IndexSet<(usize, usize)>) -> Vec<Vec<usize>> {
        match self {
            Cluster::Leaf { external, .. } => {
                let id = *next;
                *next += 1;
                vec![vec![id]; external.len()]
            }
            Cluster::Branch { left, right, combine } => {
                let lp = left.provenance(next, edges);
                let rp = right.provenance(next, edges);
                let mut l = lp.into_iter();
                let mut r = rp.into_iter();
                let mut out = Vec::with_capacity(combine.result().len());
                for mode in combine.modes() {
                    match mode {
                        CombineMode::Consumed | CombineMode::Kept => {
                            let writers = l.next().unwrap_or_default();
                            let readers = r.next().unwrap_or_default();
                            edges.extend(writers.iter().cartesian_product(&readers).map(|(&w, &c)| (w, c)));
                            if *mode == CombineMode::Kept {
                                out.push(writers);
                            }
                        }
                        CombineMode::Shared => {
                            let a = l.next().unwrap_or_default();
                            let b = r.next().unwrap_or_default();
                            out.push(a.into_iter().chain(b).unique().collect());
                        }
                        CombineMode::WeakLeftOnly | CombineMode::WeakLeftOnlyOut => {
                            out.push(r.next().unwrap_or_default());
                        }
                        CombineMode::WeakRightOnly | CombineMode::WeakRightOnlyOut => {
                            out.push(l.next().unwrap_or_default());
                        }
                    }
                }
                out
            }
        }
    }

    /// Leaf positions in an order where every producer precedes its
    /// consumers. Ties go to the leftmost leaf.
    pub fn schedule(&self) -> Vec<usize> {
        let n = self.leaves().len();
        let edges = self.dependencies();
        let mut indegree = vec![0usize; n];
        for &(_, to) in &edges {
            indegree[to] += 1;
        }
        let mut done = vec![false; n];
        let mut order = Vec::with_capacity(n);
        while let Some(next) = (0..n).find(|&i| !done[i] && indegree[i] == 0) {
            done[next] = true;
            order.push(next);
            for &(from, to) in &edges {
                if from == next {
                    indegree[to] -= 1;
                }
            }
        }
        debug_assert_eq!(order.len(), n, "cluster dependencies form a cycle");
        order
    }

    /// Operations in a dependency-respecting order.
    pub fn execution_order(&self) -> Vec<&Op> {
        let leaves = self.leaves();
        self.schedule().into_iter().map(|i| leaves[i]).collect()
    }

    /// Signatures of the arrays fused away by `Consumed`, in pre-order
    /// (a branch's own before its left subtree's before its right's).
    pub fn intermediate_signatures(&self) -> Signature {
        match self {
            Cluster::Leaf { .. } => Signature::default(),
            Cluster::Branch { left, right, combine } => Signature(
                combine
                    .consumed()
                    .0
                    .into_iter()
                    .chain(left.intermediate_signatures().0)
                    .chain(right.intermediate_signatures().0)
                    .collect(),
            ),
        }
    }

    /// Merge the natural-order arguments of every leaf (in leaf order) into
    /// the cluster's external arguments. Also returns the consumed
    /// intermediates in the order of `intermediate_signatures`.
    pub fn combine_arguments<T: ArgLike>(&self, leaf_args: &[Vec<T>]) -> Result<(Vec<T>, Vec<T>)> {
        let mut it = leaf_args.iter();
        let out = self.combine_from(&mut it)?;
        if it.next().is_some() {
            bail_shape!("more leaf argument lists than leaves");
        }
        Ok(out)
    }

    /// The consumed buffers of the tree, as the producing leaves pass them.
    /// They carry their shape variables, which is what code generation
    /// needs to size local temporaries.
    pub fn intermediates<T: ArgLike>(&self, leaf_args: &[Vec<T>]) -> Result<Vec<T>> {
        Ok(self.combine_arguments(leaf_args)?.1)
    }

    fn combine_from<'a, T: ArgLike + 'a>(
        &self,
        it: &mut impl Iterator<Item = &'a Vec<T>>,
    ) -> Result<(Vec<T>, Vec<T>)> {
        match self {
            Cluster::Leaf { op, perm, .. } => {
                let natural = it.next().ok_or_else(|| err_shape!("no arguments for leaf {}", op.name()))?;
                Ok((perm.invert().apply(natural)?, Vec::new()))
            }
            Cluster::Branch { left, right, combine } => {
                let (l, li) = left.combine_from(it)?;
                let (r, ri) = right.combine_from(it)?;
                let merged = combine_values(combine, &l, &r)?;
                let mut inter = consumed_values(combine, &l, &r)?;
                inter.extend(li);
                inter.extend(ri);
                Ok((merged, inter))
            }
        }
    }

    /// Inverse of `combine_arguments`: each leaf's arguments in its natural
    /// order, in leaf order.
    pub fn leaf_arguments<T: ArgLike>(&self, args: &[T], intermediates: &[T]) -> Result<Vec<Vec<T>>> {
        self.external_arguments().check(args)?;
        self.intermediate_signatures().check(intermediates)?;
        let mut cursor = 0;
        let mut out = Vec::new();
        self.distribute(args.to_vec(), intermediates, &mut cursor, &mut out)?;
        Ok(out)
    }

    fn distribute<T: ArgLike>(
        &self,
        args: Vec<T>,
        intermediates: &[T],
        cursor: &mut usize,
        out: &mut Vec<Vec<T>>,
    ) -> Result<()> {
        match self {
            Cluster::Leaf { perm, .. } => {
                out.push(perm.apply(&args)?);
                Ok(())
            }
            Cluster::Branch { left, right, combine } => {
                let n = combine.consumed().len();
                let consumed = intermediates
                    .get(*cursor..*cursor + n)
                    .ok_or_else(|| err_shape!("not enough intermediates for {}", combine))?;
                *cursor += n;
                let (l, r) = split_values(combine, &args, consumed)?;
                left.distribute(l, intermediates, cursor, out)?;
                right.distribute(r, intermediates, cursor, out)
            }
        }
    }
}

impl<Op: Operation> Operation for Cluster<Op> {
    fn name(&self) -> String {
        format!("cluster[{}]", self.leaves().iter().map(|op| op.name()).join(", "))
    }

    fn signature(&self) -> Signature {
        self.external_arguments().clone()
    }
}

impl<Op: Operation> fmt::Display for Cluster<Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cluster::Leaf { op, perm, .. } => {
                if perm.is_identity() {
                    write!(f, "{}", op.name())
                } else {
                    write!(f, "{}{}", op.name(), perm)
                }
            }
            Cluster::Branch { left, right, combine } => write!(f, "({} {} {})", left, combine, right),
        }
    }
}
