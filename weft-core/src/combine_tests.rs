use crate::args::{ArgSig, Signature};
use crate::combine::{Combine, CombineMode, combine_signatures, combine_values, consumed_values, split_values};
use crate::env::Idx;
use crate::error::CompilerError;
use crate::ir::Arg;
use crate::test_util::{input, output, vec_f32, vec_i64};
use crate::types::{i64_ty, size_ty};

use CombineMode::*;

fn n() -> Idx {
    Idx::new(0, size_ty())
}

fn buf(ix: usize) -> Idx {
    Idx::new(ix, vec_i64())
}

fn arg_in(ix: usize) -> Arg {
    Arg::input(vec![n()], buf(ix))
}

fn arg_out(ix: usize) -> Arg {
    Arg::output(vec![n()], buf(ix))
}

fn producer() -> Signature {
    Signature::new(vec![input(vec_i64()), output(vec_i64())])
}

#[test]
fn test_consumed_drops_intermediate() {
    let desc = Combine::new(vec![WeakRightOnly, Consumed, WeakLeftOnlyOut], &producer(), &producer()).unwrap();
    assert_eq!(desc.result(), &Signature::new(vec![input(vec_i64()), output(vec_i64())]));
    assert_eq!(desc.consumed(), Signature::new(vec![output(vec_i64())]));
}

#[test]
fn test_kept_materializes_intermediate() {
    let desc = Combine::new(vec![WeakRightOnly, Kept, WeakLeftOnlyOut], &producer(), &producer()).unwrap();
    assert_eq!(
        desc.result(),
        &Signature::new(vec![input(vec_i64()), output(vec_i64()), output(vec_i64())])
    );
    assert!(desc.consumed().is_empty());
}

#[test]
fn test_shared_deduplicates_input() {
    let desc = Combine::new(vec![Shared, WeakRightOnlyOut, WeakLeftOnlyOut], &producer(), &producer()).unwrap();
    assert_eq!(
        desc.result(),
        &Signature::new(vec![input(vec_i64()), output(vec_i64()), output(vec_i64())])
    );
}

#[test]
fn test_weak_modes_copy_any_kind() {
    let left = Signature::new(vec![ArgSig::var(i64_ty())]);
    let right = Signature::new(vec![input(vec_f32())]);
    let desc = Combine::new(vec![WeakLeftOnly, WeakRightOnly], &left, &right).unwrap();
    assert_eq!(desc.result(), &Signature::new(vec![input(vec_f32()), ArgSig::var(i64_ty())]));
}

#[test]
fn test_rejects_bad_roles() {
    // Consumed needs an output on the left.
    let err = Combine::new(vec![Consumed, WeakRightOnlyOut], &producer(), &Signature::new(vec![input(vec_i64())]));
    assert!(matches!(err, Err(CompilerError::Shape(_))));

    // Shared needs two inputs of the same type.
    let left = Signature::new(vec![input(vec_i64())]);
    let right = Signature::new(vec![input(vec_f32())]);
    assert!(Combine::new(vec![Shared], &left, &right).is_err());

    // The Out variants of the weak modes only accept outputs.
    assert!(Combine::new(vec![WeakRightOnlyOut], &left, &Signature::default()).is_err());
}

#[test]
fn test_rejects_descriptor_of_wrong_length() {
    let short = Combine::new(vec![WeakRightOnly], &producer(), &Signature::default());
    assert!(short.is_err());

    let long = Combine::new(vec![WeakRightOnly, WeakRightOnlyOut, WeakRightOnly], &producer(), &Signature::default());
    assert!(long.is_err());
}

#[test]
fn test_combine_values_follows_descriptor() {
    let desc = Combine::new(vec![WeakRightOnly, Consumed, WeakLeftOnlyOut], &producer(), &producer()).unwrap();
    let left = vec![arg_in(3), arg_out(2)];
    let right = vec![arg_in(2), arg_out(1)];

    assert_eq!(combine_values(&desc, &left, &right).unwrap(), vec![arg_in(3), arg_out(1)]);
    assert_eq!(consumed_values(&desc, &left, &right).unwrap(), vec![arg_out(2)]);
    assert_eq!(
        combine_signatures(&desc, &producer(), &producer()).unwrap(),
        desc.result().clone()
    );
}

#[test]
fn test_combine_values_rejects_different_arrays() {
    let desc = Combine::new(vec![WeakRightOnly, Consumed, WeakLeftOnlyOut], &producer(), &producer()).unwrap();
    let left = vec![arg_in(3), arg_out(2)];
    // The consumer reads buffer 4, not the one the producer wrote.
    let right = vec![arg_in(4), arg_out(1)];
    assert!(matches!(combine_values(&desc, &left, &right), Err(CompilerError::Shape(_))));
}

#[test]
fn test_combine_values_checks_list_shapes() {
    let desc = Combine::new(vec![WeakRightOnly, Consumed, WeakLeftOnlyOut], &producer(), &producer()).unwrap();
    let left = vec![arg_in(3)];
    let right = vec![arg_in(2), arg_out(1)];
    assert!(combine_values(&desc, &left, &right).is_err());
}

#[test]
fn test_split_values_inverts_combine() {
    let modes = vec![Shared, Kept, WeakRightOnlyOut, Consumed, WeakLeftOnlyOut];
    let left_sig = Signature::new(vec![
        input(vec_i64()),
        output(vec_i64()),
        output(vec_i64()),
        output(vec_i64()),
    ]);
    let right_sig = Signature::new(vec![input(vec_i64()), input(vec_i64()), input(vec_i64()), output(vec_i64())]);
    let desc = Combine::new(modes, &left_sig, &right_sig).unwrap();

    let left = vec![arg_in(7), arg_out(6), arg_out(5), arg_out(4)];
    let right = vec![arg_in(7), arg_in(6), arg_in(4), arg_out(3)];

    let merged = combine_values(&desc, &left, &right).unwrap();
    let consumed = consumed_values(&desc, &left, &right).unwrap();
    assert_eq!(merged, vec![arg_in(7), arg_out(6), arg_out(5), arg_out(3)]);
    assert_eq!(consumed, vec![arg_out(4)]);

    let (l, r) = split_values(&desc, &merged, &consumed).unwrap();
    assert_eq!(l, left);
    assert_eq!(r, right);
}

#[test]
fn test_display() {
    let desc = Combine::new(vec![WeakRightOnly, Consumed, WeakLeftOnlyOut], &producer(), &producer()).unwrap();
    assert_eq!(desc.to_string(), "{L_ V _R'}");
}
