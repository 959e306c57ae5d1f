//! Type definitions for environment slots and argument descriptors.
//!
//! Types reuse `polytype::Type` specialized to our own `TypeName`, the same
//! way the rest of the pipeline represents them. Only the structure matters
//! here: slot types are compared for equality when indices are checked and
//! when argument lists are matched against each other.

use std::fmt;

pub type Type = polytype::Type<TypeName>;

/// Type name constructors.
///
/// - `Bool/Int/UInt/Float`: scalar element types with bit widths
/// - `Unit`/`Pair`: the tuple structure of bound values; `Pair` takes `[a, b]`
/// - `Array(rank)`: a buffer of `rank` dimensions; element type is `args[0]`
/// - `Arrow`: scalar function type `a -> b`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeName {
    Bool,
    Int(usize),
    UInt(usize),
    Float(usize),
    Unit,
    Pair,
    Array(usize),
    Arrow,
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", polytype::Name::show(self))
    }
}

impl polytype::Name for TypeName {
    fn arrow() -> Self {
        TypeName::Arrow
    }

    fn show(&self) -> String {
        match self {
            TypeName::Bool => "bool".to_string(),
            TypeName::Int(bits) => format!("i{}", bits),
            TypeName::UInt(bits) => format!("u{}", bits),
            TypeName::Float(bits) => format!("f{}", bits),
            TypeName::Unit => "()".to_string(),
            TypeName::Pair => "Pair".to_string(),
            TypeName::Array(rank) => format!("Array{}", rank),
            TypeName::Arrow => "->".to_string(),
        }
    }
}

// =============================================================================
// Constructors
// =============================================================================

pub fn bool_ty() -> Type {
    Type::Constructed(TypeName::Bool, vec![])
}

pub fn i32_ty() -> Type {
    Type::Constructed(TypeName::Int(32), vec![])
}

pub fn i64_ty() -> Type {
    Type::Constructed(TypeName::Int(64), vec![])
}

pub fn f32_ty() -> Type {
    Type::Constructed(TypeName::Float(32), vec![])
}

pub fn f64_ty() -> Type {
    Type::Constructed(TypeName::Float(64), vec![])
}

pub fn unit_ty() -> Type {
    Type::Constructed(TypeName::Unit, vec![])
}

pub fn pair_ty(a: Type, b: Type) -> Type {
    Type::Constructed(TypeName::Pair, vec![a, b])
}

/// Buffer type of the given rank and element type.
pub fn array_ty(rank: usize, elem: Type) -> Type {
    Type::Constructed(TypeName::Array(rank), vec![elem])
}

pub fn arrow_ty(from: Type, to: Type) -> Type {
    Type::Constructed(TypeName::Arrow, vec![from, to])
}

/// Extent type for shape variables: one `i64` per dimension.
pub fn size_ty() -> Type {
    i64_ty()
}

// =============================================================================
// Queries
// =============================================================================

/// Extension trait for structural type queries.
///
/// Passes use these instead of matching on `TypeName` directly.
pub trait TypeExt {
    /// Rank and element type if this is an array type.
    fn as_array(&self) -> Option<(usize, &Type)>;

    /// Components if this is a pair type.
    fn as_pair(&self) -> Option<(&Type, &Type)>;

    fn is_unit(&self) -> bool;

    /// Scalar element types: bool and the numeric types.
    fn is_scalar(&self) -> bool;
}

impl TypeExt for Type {
    fn as_array(&self) -> Option<(usize, &Type)> {
        match self {
            Type::Constructed(TypeName::Array(rank), args) if args.len() == 1 => Some((*rank, &args[0])),
            _ => None,
        }
    }

    fn as_pair(&self) -> Option<(&Type, &Type)> {
        match self {
            Type::Constructed(TypeName::Pair, args) if args.len() == 2 => Some((&args[0], &args[1])),
            _ => None,
        }
    }

    fn is_unit(&self) -> bool {
        matches!(self, Type::Constructed(TypeName::Unit, _))
    }

    fn is_scalar(&self) -> bool {
        matches!(
            self,
            Type::Constructed(TypeName::Bool | TypeName::Int(_) | TypeName::UInt(_) | TypeName::Float(_), _)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_query() {
        let ty = array_ty(2, f32_ty());
        let (rank, elem) = ty.as_array().unwrap();
        assert_eq!(rank, 2);
        assert_eq!(elem, &f32_ty());
        assert!(f32_ty().as_array().is_none());
    }

    #[test]
    fn test_scalar_and_pair() {
        assert!(i32_ty().is_scalar());
        assert!(!unit_ty().is_scalar());
        let p = pair_ty(i32_ty(), bool_ty());
        assert_eq!(p.as_pair(), Some((&i32_ty(), &bool_ty())));
        assert!(unit_ty().is_unit());
    }
}
