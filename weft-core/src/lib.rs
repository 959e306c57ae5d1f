pub mod args;
pub mod cluster;
pub mod combine;
pub mod env;
pub mod error;
pub mod interp;
pub mod ir;
pub mod kernel;
pub mod normalize;
pub mod reindex;
pub mod types;
pub mod verify;

#[cfg(test)]
mod args_tests;
#[cfg(test)]
mod combine_tests;
#[cfg(test)]
mod prop_tests;

pub use args::{ArgKind, ArgLike, ArgSig, Permutation, Signature, Take};
pub use cluster::{Cluster, Operation};
pub use combine::{Combine, CombineMode};
pub use env::{Idx, Lhs, TypedEnv, Vars};
pub use error::{CompilerError, Result};
pub use ir::{Acc, Arg, Exp, Fun};
pub use kernel::Kernel;
pub use types::{Type, TypeName};

/// Shared fixtures for the unit tests.
#[cfg(test)]
pub(crate) mod test_util {
    use crate::args::ArgSig;
    use crate::ir::{BinaryOp, Exp, Fun};
    use crate::kernel::Kernel;
    use crate::types::{Type, array_ty, f32_ty, i64_ty};

    pub fn vec_f32() -> Type {
        array_ty(1, f32_ty())
    }

    pub fn vec_i64() -> Type {
        array_ty(1, i64_ty())
    }

    pub fn input(ty: Type) -> ArgSig {
        ArgSig::input(ty)
    }

    pub fn output(ty: Type) -> ArgSig {
        ArgSig::output(ty)
    }

    /// `map (\x -> x <op> k)` over rank-1 `i64` arrays.
    pub fn map_i64(op: BinaryOp, k: i64) -> Kernel {
        let f = Fun::unary(i64_ty(), Exp::binary(op, Exp::var(0, i64_ty()), Exp::int(k)));
        Kernel::map(1, i64_ty(), i64_ty(), f)
    }

    /// `zipWith (+)` over rank-1 `i64` arrays.
    pub fn add_i64() -> Kernel {
        let f = Fun::binary(
            i64_ty(),
            i64_ty(),
            Exp::binary(BinaryOp::Add, Exp::var(1, i64_ty()), Exp::var(0, i64_ty())),
        );
        Kernel::zip_with(1, i64_ty(), i64_ty(), i64_ty(), f)
    }

    /// Route tests' `log` output through env_logger.
    pub fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }
}
