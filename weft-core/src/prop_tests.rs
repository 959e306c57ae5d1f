//! Property tests for argument lists and reindexing using proptest.
//!
//! These check laws that must hold for any input, not just hand-picked
//! cases:
//!
//! 1. Permutation round trip: invert(P) undoes P
//! 2. Sinking under m then n slots equals sinking under m + n
//! 3. Strengthening an unused slot and inserting it again is the identity
//! 4. Combining lists that match a descriptor always succeeds and yields
//!    the descriptor's result signature, and splitting undoes it
//! 5. Weakening by a then by b is weakening by a + b
//! 6. `introduce_binding` and `pair` keep the meaning of the program

use proptest::prelude::*;

use crate::args::{ArgKind, ArgSig, Permutation, Signature};
use crate::combine::{Combine, CombineMode, combine_values, consumed_values, split_values};
use crate::env::{Idx, Lhs, Vars};
use crate::interp::{Heap, Value, eval_acc};
use crate::ir::{Acc, Literal};
use crate::kernel::Kernel;
use crate::normalize::{introduce_binding, pair};
use crate::reindex::{Reindex, ReindexMap, Sink, Strengthen, Weaken, insert_slot, strengthen, weaken, weaken_term};
use crate::types::{Type, array_ty, f32_ty, i64_ty, unit_ty};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_array_type() -> impl Strategy<Value = Type> {
    prop_oneof![Just(array_ty(1, i64_ty())), Just(array_ty(1, f32_ty())), Just(array_ty(2, f32_ty()))]
}

fn arb_kind() -> impl Strategy<Value = ArgKind> {
    prop_oneof![Just(ArgKind::Var), Just(ArgKind::In), Just(ArgKind::Out)]
}

fn arb_arg_sig() -> impl Strategy<Value = ArgSig> {
    (arb_kind(), arb_array_type()).prop_map(|(kind, ty)| match kind {
        ArgKind::Var => ArgSig::var(i64_ty()),
        _ => ArgSig::new(kind, ty),
    })
}

fn arb_signature() -> impl Strategy<Value = Signature> {
    prop::collection::vec(arb_arg_sig(), 0..7).prop_map(Signature::new)
}

/// A signature together with a shuffle of its positions.
fn arb_permutation() -> impl Strategy<Value = (Signature, Vec<usize>)> {
    arb_signature().prop_flat_map(|sig| {
        let n = sig.len();
        (Just(sig), Just((0..n).collect::<Vec<_>>()).prop_shuffle())
    })
}

fn arb_mode() -> impl Strategy<Value = CombineMode> {
    prop_oneof![
        Just(CombineMode::Consumed),
        Just(CombineMode::Kept),
        Just(CombineMode::Shared),
        Just(CombineMode::WeakLeftOnly),
        Just(CombineMode::WeakRightOnly),
        Just(CombineMode::WeakLeftOnlyOut),
        Just(CombineMode::WeakRightOnlyOut),
    ]
}

/// A descriptor with left and right signatures that fit it.
fn arb_descriptor() -> impl Strategy<Value = (Vec<CombineMode>, Signature, Signature)> {
    prop::collection::vec((arb_mode(), arb_arg_sig(), arb_array_type()), 0..8).prop_map(|steps| {
        let mut modes = Vec::new();
        let mut left = Vec::new();
        let mut right = Vec::new();
        for (mode, any, ty) in steps {
            match mode {
                CombineMode::Consumed | CombineMode::Kept => {
                    left.push(ArgSig::output(ty.clone()));
                    right.push(ArgSig::input(ty));
                }
                CombineMode::Shared => {
                    left.push(ArgSig::input(ty.clone()));
                    right.push(ArgSig::input(ty));
                }
                CombineMode::WeakLeftOnly => right.push(any),
                CombineMode::WeakRightOnly => left.push(any),
                CombineMode::WeakLeftOnlyOut => right.push(ArgSig::output(ty)),
                CombineMode::WeakRightOnlyOut => left.push(ArgSig::output(ty)),
            }
            modes.push(mode);
        }
        (modes, Signature::new(left), Signature::new(right))
    })
}

fn arb_vars() -> impl Strategy<Value = Vars> {
    let leaf = prop_oneof![Just(Vars::Unit), (0usize..6).prop_map(|ix| Vars::single(Idx::new(ix, i64_ty())))];
    leaf.prop_recursive(2, 8, 2, |inner| (inner.clone(), inner).prop_map(|(l, r)| Vars::pair(l, r)))
}

/// Programs over an environment of `i64` slots.
fn arb_acc() -> impl Strategy<Value = Acc<Kernel>> {
    let leaf = prop_oneof![
        arb_vars().prop_map(Acc::Return),
        prop::collection::vec(0usize..6, 0..3).prop_map(|ixs| Acc::Alloc {
            elem: f32_ty(),
            shape: ixs.into_iter().map(|ix| Idx::new(ix, i64_ty())).collect(),
        }),
    ];
    leaf.prop_recursive(3, 16, 2, |inner| {
        (inner.clone(), inner).prop_map(|(bnd, body)| Acc::bind(Lhs::from_type(&bnd.ty()), bnd, body))
    })
}

/// Six extents to run generated programs in.
fn arb_env() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec((0i64..4).prop_map(|n| Value::Scalar(Literal::Int(n))), 6)
}

/// Evaluate on a fresh heap, so buffer ids line up between runs that
/// allocate in the same order.
fn run(acc: &Acc<Kernel>, env: &[Value]) -> Option<Value> {
    let mut env = env.to_vec();
    eval_acc(acc, &mut env, &mut Heap::new()).ok()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    /// Applying a permutation and then its inverse gives back the list.
    #[test]
    fn permutation_round_trip((sig, mapping) in arb_permutation()) {
        let p = Permutation::from_mapping(&sig, &mapping).unwrap();
        let permuted = p.apply(&sig.0).unwrap();
        prop_assert_eq!(Signature::new(permuted.clone()), p.target());
        prop_assert_eq!(p.invert().apply(&permuted).unwrap(), sig.0);
    }

    /// Rebuilding a permutation from its own mapping gives the same chain.
    #[test]
    fn permutation_chain_is_canonical((sig, mapping) in arb_permutation()) {
        let p = Permutation::from_mapping(&sig, &mapping).unwrap();
        let q = Permutation::from_mapping(&sig, &p.mapping()).unwrap();
        prop_assert_eq!(p, q);
    }
}

proptest! {
    #[test]
    fn sink_composition(m in 0usize..4, n in 0usize..4, k in 0usize..4, ix in 0usize..16) {
        let idx = Idx::new(ix, i64_ty());

        let weak = Weaken(k);
        let nested = Sink::new(Sink::new(weak, m), n);
        let combined = Sink::new(weak, m + n);
        prop_assert_eq!(nested.reindex_idx(&idx), combined.reindex_idx(&idx));

        let strong = Strengthen(k);
        let nested = Sink::new(Sink::new(strong, m), n);
        let combined = Sink::new(strong, m + n);
        prop_assert_eq!(nested.reindex_idx(&idx), combined.reindex_idx(&idx));
    }

    #[test]
    fn strengthen_then_insert_is_identity(term in arb_acc(), k in 0usize..7) {
        if let Some(smaller) = term.reindex(&strengthen(k)) {
            prop_assert_eq!(smaller.reindex(&insert_slot(k)), Some(term));
        }
    }

    #[test]
    fn weaken_composes(term in arb_acc(), a in 0usize..4, b in 0usize..4) {
        let stepwise = weaken_term(&weaken_term(&term, a), b);
        prop_assert_eq!(&stepwise, &weaken_term(&term, a + b));
        prop_assert_eq!(term.reindex(&weaken(a).then(weaken(b))), Some(stepwise));
    }

    #[test]
    fn weakened_slot_can_be_strengthened_away(term in arb_acc(), n in 1usize..4) {
        let lifted = weaken_term(&term, n);
        prop_assert_eq!(lifted.reindex(&strengthen(0)), Some(weaken_term(&term, n - 1)));
    }
}

proptest! {
    #[test]
    fn combine_shape_law((modes, left, right) in arb_descriptor()) {
        let desc = Combine::new(modes, &left, &right).unwrap();
        let merged = combine_values(&desc, &left.0, &right.0).unwrap();
        prop_assert_eq!(&Signature::new(merged.clone()), desc.result());

        let consumed = consumed_values(&desc, &left.0, &right.0).unwrap();
        prop_assert_eq!(Signature::new(consumed.clone()), desc.consumed());

        let (l, r) = split_values(&desc, &merged, &consumed).unwrap();
        prop_assert_eq!(l, left.0);
        prop_assert_eq!(r, right.0);
    }
}

proptest! {
    #[test]
    fn discarded_empty_return_collapses(body in arb_acc()) {
        prop_assert_eq!(introduce_binding(Lhs::wildcard(unit_ty()), Acc::unit(), body.clone()), body);
    }

    #[test]
    fn introduce_binding_keeps_meaning(bnd in arb_acc(), body in arb_acc(), env in arb_env()) {
        let lhs = Lhs::from_type(&bnd.ty());
        let plain = Acc::bind(lhs.clone(), bnd.clone(), body.clone());
        if let Some(expected) = run(&plain, &env) {
            prop_assert_eq!(run(&introduce_binding(lhs, bnd, body), &env), Some(expected));
        }
    }

    #[test]
    fn pair_keeps_meaning(a in arb_acc(), b in arb_acc(), env in arb_env()) {
        let mut scratch = env.clone();
        let mut heap = Heap::new();
        let separately = eval_acc(&a, &mut scratch, &mut heap)
            .and_then(|va| Ok(Value::pair(va, eval_acc(&b, &mut scratch, &mut heap)?)));
        if let Ok(expected) = separately {
            prop_assert_eq!(run(&pair(a, b), &env), Some(expected));
        }
    }
}
