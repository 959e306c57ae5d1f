//! Primitive array operations.
//!
//! The element functions are closed: they only refer to their own
//! parameters. Anything else an operation needs is passed as an argument.

use crate::args::{ArgSig, Signature};
use crate::cluster::Operation;
use crate::ir::Fun;
use crate::types::{Type, array_ty};

#[derive(Debug, Clone, PartialEq)]
pub enum Kernel {
    /// `[In rank a, Out rank b]`, applying `f : a -> b` elementwise.
    Map { rank: usize, input: Type, output: Type, f: Fun },
    /// `[In rank a, In rank b, Out rank c]`, applying `f : a -> b -> c`.
    ZipWith { rank: usize, left: Type, right: Type, output: Type, f: Fun },
    /// `[Out rank e]`, where `f` maps each linear index (`i64`) to an element.
    Generate { rank: usize, output: Type, f: Fun },
}

impl Kernel {
    pub fn map(rank: usize, input: Type, output: Type, f: Fun) -> Self {
        Kernel::Map { rank, input, output, f }
    }

    pub fn zip_with(rank: usize, left: Type, right: Type, output: Type, f: Fun) -> Self {
        Kernel::ZipWith { rank, left, right, output, f }
    }

    pub fn generate(rank: usize, output: Type, f: Fun) -> Self {
        Kernel::Generate { rank, output, f }
    }
}

impl Operation for Kernel {
    fn name(&self) -> String {
        match self {
            Kernel::Map { .. } => "map",
            Kernel::ZipWith { .. } => "zipWith",
            Kernel::Generate { .. } => "generate",
        }
        .to_string()
    }

    fn signature(&self) -> Signature {
        match self {
            Kernel::Map { rank, input, output, .. } => Signature::new(vec![
                ArgSig::input(array_ty(*rank, input.clone())),
                ArgSig::output(array_ty(*rank, output.clone())),
            ]),
            Kernel::ZipWith { rank, left, right, output, .. } => Signature::new(vec![
                ArgSig::input(array_ty(*rank, left.clone())),
                ArgSig::input(array_ty(*rank, right.clone())),
                ArgSig::output(array_ty(*rank, output.clone())),
            ]),
            Kernel::Generate { rank, output, .. } => {
                Signature::new(vec![ArgSig::output(array_ty(*rank, output.clone()))])
            }
        }
    }
}
