use weft_core::combine::CombineMode;
use weft_core::interp::{ArgValue, Heap, run_cluster};
use weft_core::ir::{BinaryOp, Exp, Fun, Literal};
use weft_core::types::{array_ty, i64_ty};
use weft_core::{Cluster, Kernel, Operation};

fn map(op: BinaryOp, k: i64) -> Kernel {
    let f = Fun::unary(i64_ty(), Exp::binary(op, Exp::var(0, i64_ty()), Exp::int(k)));
    Kernel::map(1, i64_ty(), i64_ty(), f)
}

fn main() {
    env_logger::init();

    let fused = Cluster::fuse(
        Cluster::single(map(BinaryOp::Add, 1)),
        Cluster::single(map(BinaryOp::Mul, 2)),
        vec![CombineMode::WeakRightOnly, CombineMode::Consumed, CombineMode::WeakLeftOnlyOut],
    )
    .expect("fusion failed");

    println!("cluster:       {}", fused);
    println!("external:      {}", fused.external_arguments());
    println!("intermediates: {}", fused.intermediate_signatures());
    let order: Vec<String> = fused.execution_order().iter().map(|op| op.name()).collect();
    println!("order:         {:?}", order);

    let ty = array_ty(1, i64_ty());
    let mut heap = Heap::new();
    let input = heap.store(vec![3], vec![Literal::Int(1), Literal::Int(2), Literal::Int(3)]).expect("store failed");
    let output = heap.alloc(&i64_ty(), vec![3]).expect("alloc failed");
    let args = [ArgValue::Input { buf: input, ty: ty.clone() }, ArgValue::Output { buf: output, ty }];
    run_cluster(&fused, &args, &[vec![3]], &mut heap).expect("run failed");

    let result: Vec<String> = heap.buffer(output).expect("missing output").data.iter().map(|x| x.to_string()).collect();
    println!("result:        [{}]", result.join(", "));
}
