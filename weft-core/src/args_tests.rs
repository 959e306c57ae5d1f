use crate::args::{ArgKind, ArgSig, Permutation, Signature, Take, compose, take};
use crate::error::CompilerError;
use crate::test_util::{input, output, vec_f32, vec_i64};
use crate::types::{f32_ty, i64_ty};

fn sig3() -> Signature {
    Signature::new(vec![input(vec_f32()), input(vec_i64()), output(vec_f32())])
}

#[test]
fn test_take_splits_element_from_rest() {
    let sig = sig3();
    let t = Take::new(1, &sig).unwrap();
    assert_eq!(t.element(), &input(vec_i64()));
    assert_eq!(t.remainder(), Signature::new(vec![input(vec_f32()), output(vec_f32())]));

    let (x, rest) = t.apply(&sig.0).unwrap();
    assert_eq!(x, input(vec_i64()));
    assert_eq!(rest, vec![input(vec_f32()), output(vec_f32())]);
}

#[test]
fn test_take_out_of_range() {
    assert!(matches!(Take::new(3, &sig3()), Err(CompilerError::Shape(_))));
    assert!(take::<ArgSig>(0, &[]).is_err());
}

#[test]
fn test_take_rejects_list_of_other_shape() {
    let t = Take::new(0, &sig3()).unwrap();
    let wrong = vec![input(vec_f32()), output(vec_f32())];
    assert!(matches!(t.apply(&wrong), Err(CompilerError::Shape(_))));
}

#[test]
fn test_identity_is_empty_chain() {
    let p = Permutation::identity(&sig3());
    assert!(p.takes().is_empty());
    assert!(p.is_identity());
    assert_eq!(p.apply(&sig3().0).unwrap(), sig3().0);
    assert_eq!(p.target(), sig3());
}

#[test]
fn test_from_mapping_and_apply() {
    let sig = sig3();
    // Output position 0 takes source element 2, and so on.
    let p = Permutation::from_mapping(&sig, &[2, 0, 1]).unwrap();
    assert_eq!(p.mapping(), vec![2, 0, 1]);
    assert_eq!(p.apply(&sig.0).unwrap(), vec![output(vec_f32()), input(vec_f32()), input(vec_i64())]);
    assert_eq!(p.target().0, p.apply(&sig.0).unwrap());
    assert!(!p.is_identity());
}

#[test]
fn test_from_mapping_strips_trailing_head_takes() {
    // [0, 1, 2] takes the head every time: nothing to record.
    let p = Permutation::from_mapping(&sig3(), &[0, 1, 2]).unwrap();
    assert!(p.takes().is_empty());

    // [1, 0, 2] takes position 1, then the head twice.
    let q = Permutation::from_mapping(&sig3(), &[1, 0, 2]).unwrap();
    assert_eq!(q.takes().iter().map(Take::pos).collect::<Vec<_>>(), vec![1]);
}

#[test]
fn test_from_mapping_rejects_non_permutations() {
    assert!(Permutation::from_mapping(&sig3(), &[0, 0, 1]).is_err());
    assert!(Permutation::from_mapping(&sig3(), &[0, 1]).is_err());
    assert!(Permutation::from_mapping(&sig3(), &[0, 1, 3]).is_err());
}

#[test]
fn test_invert_round_trip() {
    let sig = sig3();
    let p = Permutation::from_takes(&sig, &[2, 1]).unwrap();
    let permuted = p.apply(&sig.0).unwrap();
    let inv = p.invert();
    assert_eq!(inv.source(), &p.target());
    assert_eq!(inv.apply(&permuted).unwrap(), sig.0);
}

#[test]
fn test_compose_applies_right_operand_first() {
    let sig = sig3();
    let q = Permutation::from_mapping(&sig, &[1, 2, 0]).unwrap();
    let p = Permutation::from_mapping(&q.target(), &[2, 0, 1]).unwrap();
    let pq = compose(&p, &q).unwrap();

    let stepwise = p.apply(&q.apply(&sig.0).unwrap()).unwrap();
    assert_eq!(pq.apply(&sig.0).unwrap(), stepwise);

    // Composing with the inverse gives back the identity.
    assert!(compose(&q.invert(), &q).unwrap().is_identity());
}

#[test]
fn test_compose_rejects_mismatched_signatures() {
    let q = Permutation::identity(&sig3());
    let p = Permutation::identity(&Signature::new(vec![input(vec_f32())]));
    assert!(compose(&p, &q).is_err());
}

#[test]
fn test_signature_queries() {
    let sig = Signature::new(vec![
        ArgSig::var(i64_ty()),
        input(vec_f32()),
        input(vec_f32()),
        output(vec_f32()),
        ArgSig::fun(f32_ty()),
    ]);
    assert_eq!(sig.count(ArgKind::In), 2);
    assert_eq!(sig.count(ArgKind::Out), 1);
    assert_eq!(sig.count(ArgKind::Var), 1);
    assert!(sig.check(&sig.0).is_ok());
    assert!(sig.check(&sig.0[1..]).is_err());
}

#[test]
fn test_display() {
    let sig = Signature::new(vec![input(vec_f32()), output(vec_i64())]);
    assert_eq!(sig.to_string(), format!("[In {}, Out {}]", vec_f32(), vec_i64()));
    let p = Permutation::from_mapping(&sig3(), &[2, 0, 1]).unwrap();
    assert_eq!(p.to_string(), "<2>");
}
