//! Let-binding normalization.
//!
//! Smart constructors that keep programs free of redundant bindings while
//! other passes rebuild them:
//! - `introduce_binding` re-associates nested lets, drops effect-free
//!   discarded bindings and inlines bindings of plain variables
//! - `pair` returns the results of two programs as a pair by hoisting both
//!   binder chains into one prefix
//! - `eliminate_dead_binding` drops binder slots nothing refers to

use log::trace;

use crate::env::{Idx, Lhs, Vars};
use crate::ir::Acc;
use crate::reindex::{Reindex, ReindexMap, Sink, from_fn, sink_with_lhs, weaken, weaken_term};

/// Bind `bnd` to `lhs` around `body`, simplifying where possible.
///
/// `body` lives in the environment extended by `lhs`.
pub fn introduce_binding<Op: Clone>(lhs: Lhs, bnd: Acc<Op>, body: Acc<Op>) -> Acc<Op> {
    match bnd {
        // let lhs = (let lhs2 = b1 in b2) in body
        //   ~> let lhs2 = b1 in let lhs = b2 in body'
        Acc::Let { lhs: inner_lhs, bnd: inner_bnd, body: inner_body } => {
            trace!("introduce_binding: floating nested let out of {}", lhs);
            let sink = Sink::new(weaken(inner_lhs.slots()), lhs.slots());
            let body = reindex_total(&body, &sink);
            let rest = introduce_binding(lhs, *inner_body, body);
            introduce_binding(inner_lhs, *inner_bnd, rest)
        }
        bnd if lhs.discards() && bnd.is_empty_return() => {
            trace!("introduce_binding: dropping discarded empty return");
            body
        }
        Acc::Return(vars) => match substitution(&lhs, &vars) {
            Some(slots) => {
                trace!("introduce_binding: inlining {} for {}", vars, lhs);
                let n = lhs.slots();
                let map = from_fn(move |idx: &Idx| {
                    if idx.ix < n {
                        slots[idx.ix].clone()
                    } else {
                        Some(Idx::new(idx.ix - n, idx.ty.clone()))
                    }
                });
                body.reindex(&map).unwrap_or_else(|| unreachable!("substitution covers every bound slot"))
            }
            None => Acc::bind(lhs, Acc::Return(vars), body),
        },
        bnd => Acc::bind(lhs, bnd, body),
    }
}

/// For each slot bound by `lhs` (binder-relative, top first), the variable it
/// would be bound to. `None` if `vars` does not line up with `lhs`.
fn substitution(lhs: &Lhs, vars: &Vars) -> Option<Vec<Option<Idx>>> {
    let mut in_order = Vec::new();
    collect_substitution(lhs, vars, &mut in_order)?;
    in_order.reverse();
    Some(in_order.into_iter().map(Some).collect())
}

fn collect_substitution(lhs: &Lhs, vars: &Vars, out: &mut Vec<Idx>) -> Option<()> {
    match (lhs, vars) {
        (Lhs::Wildcard(_), _) => Some(()),
        (Lhs::Single(ty), Vars::Single(idx)) if *ty == idx.ty => {
            out.push(idx.clone());
            Some(())
        }
        (Lhs::Pair(l, r), Vars::Pair(vl, vr)) => {
            collect_substitution(l, vl, out)?;
            collect_substitution(r, vr, out)
        }
        _ => None,
    }
}

/// Bind `acc`'s result to fresh slots and return them.
fn bind_result<Op>(acc: Acc<Op>) -> (Lhs, Acc<Op>, Vars) {
    let ty = acc.ty();
    let lhs = Lhs::from_type(&ty);
    // `from_type` only discards unit, so every part has a variable.
    let vars = lhs.vars().unwrap_or(Vars::Unit);
    (lhs, acc, vars)
}

/// A program returning the pair of `a`'s and `b`'s results.
///
/// Both binder chains are hoisted into one prefix: `a`'s bindings first,
/// then `b`'s, then a single return of both variable tuples. A program that
/// does not end in a `Return` is bound to a synthetic binding first.
pub fn pair<Op: Clone>(a: Acc<Op>, b: Acc<Op>) -> Acc<Op> {
    pair_left(a, &b, 0)
}

fn pair_left<Op: Clone>(a: Acc<Op>, b: &Acc<Op>, depth: usize) -> Acc<Op> {
    match a {
        Acc::Let { lhs, bnd, body } => {
            let n = lhs.slots();
            let body = pair_left(*body, b, depth + n);
            Acc::Let { lhs, bnd, body: Box::new(body) }
        }
        Acc::Return(va) => pair_right(va, depth, b.clone(), 0),
        other => {
            let (lhs, bnd, vars) = bind_result(other);
            pair_left(Acc::bind(lhs, bnd, Acc::Return(vars)), b, depth)
        }
    }
}

/// `va` is valid below `b`'s chain; `b` is valid below `depth_a` slots of
/// `a`'s chain that it does not know about.
fn pair_right<Op: Clone>(va: Vars, depth_a: usize, b: Acc<Op>, depth_b: usize) -> Acc<Op> {
    let lift = Sink::new(weaken(depth_a), depth_b);
    match b {
        Acc::Let { lhs, bnd, body } => {
            let n = lhs.slots();
            let bnd = reindex_total(&*bnd, &lift);
            let body = pair_right(va, depth_a, *body, depth_b + n);
            Acc::Let { lhs, bnd: Box::new(bnd), body: Box::new(body) }
        }
        Acc::Return(vb) => {
            let vb = reindex_total(&vb, &lift);
            Acc::Return(Vars::pair(weaken_term(&va, depth_b), vb))
        }
        other => {
            let (lhs, bnd, vars) = bind_result(other);
            pair_right(va, depth_a, Acc::bind(lhs, bnd, Acc::Return(vars)), depth_b)
        }
    }
}

fn reindex_total<T: Reindex>(term: &T, map: &dyn ReindexMap) -> T {
    term.reindex(map).unwrap_or_else(|| unreachable!("weakening is total"))
}

/// Remove binder slots of a `Let` that its body never refers to.
///
/// Each slot is dropped by attempting to strengthen the body; slots still in
/// use stay bound. A binding left with no slots whose bound program has no
/// effect disappears entirely. Anything other than a `Let` is returned as is.
pub fn eliminate_dead_binding<Op: Clone>(acc: Acc<Op>) -> Acc<Op> {
    let (mut lhs, bnd, mut body) = match acc {
        Acc::Let { lhs, bnd, body } => (lhs, bnd, *body),
        other => return other,
    };
    let mut k = 0;
    while k < lhs.slots() {
        let Some(candidate) = lhs.without_slot(k) else {
            break;
        };
        let strengthened = sink_with_lhs(weaken(0), &lhs, &candidate)
            .ok()
            .and_then(|map| body.reindex(&map));
        match strengthened {
            Some(new_body) => {
                trace!("eliminate_dead_binding: dropped slot {} of {}", k, lhs);
                lhs = candidate;
                body = new_body;
            }
            None => k += 1,
        }
    }
    if lhs.discards() && matches!(*bnd, Acc::Return(_)) {
        return body;
    }
    Acc::Let { lhs, bnd, body: Box::new(body) }
}
