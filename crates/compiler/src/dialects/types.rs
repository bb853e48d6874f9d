//! The value-space type system and its subtyping lattice.
//!
//! Types are [`Attribute`] values: the named primitives, `list<T>`, and
//! `memloc<T>`. The lattice is flat apart from `object` on top:
//! `<None> <= object`, `<Empty> <= list<T> <= object`, and every primitive
//! `<= object`. Joining two distinct list types gives `list<object>`.

use crate::ir::{Attribute, NamedTy};

pub fn int_type() -> Attribute {
    Attribute::NamedType(NamedTy::Int)
}

pub fn bool_type() -> Attribute {
    Attribute::NamedType(NamedTy::Bool)
}

pub fn str_type() -> Attribute {
    Attribute::NamedType(NamedTy::Str)
}

pub fn none_type() -> Attribute {
    Attribute::NamedType(NamedTy::None)
}

pub fn empty_type() -> Attribute {
    Attribute::NamedType(NamedTy::Empty)
}

pub fn object_type() -> Attribute {
    Attribute::NamedType(NamedTy::Object)
}

/// Structural subtyping per the lattice.
pub fn is_subtype(sub: &Attribute, sup: &Attribute) -> bool {
    if sub == sup {
        return true;
    }
    if *sup == object_type() {
        return true;
    }
    // <Empty> is below every list type.
    *sub == empty_type() && sup.is_list()
}

/// Whether a value of type `value` may be stored into a location of type
/// `target`. This is subtyping plus the reference-type rule: `None` is a
/// valid value for any list-typed location.
pub fn is_assignable(value: &Attribute, target: &Attribute) -> bool {
    if is_subtype(value, target) {
        return true;
    }
    *value == none_type() && target.is_list()
}

/// Least common supertype of two types.
pub fn join(a: &Attribute, b: &Attribute) -> Attribute {
    if a == b {
        return a.clone();
    }
    if is_subtype(a, b) {
        return b.clone();
    }
    if is_subtype(b, a) {
        return a.clone();
    }
    if a.is_list() && b.is_list() {
        return Attribute::list_of(object_type());
    }
    object_type()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_below_object() {
        for t in [int_type(), bool_type(), str_type(), none_type()] {
            assert!(is_subtype(&t, &object_type()));
            assert!(!is_subtype(&object_type(), &t));
        }
    }

    #[test]
    fn test_empty_below_lists() {
        let ints = Attribute::list_of(int_type());
        assert!(is_subtype(&empty_type(), &ints));
        assert!(is_subtype(&ints, &object_type()));
        assert!(!is_subtype(&ints, &Attribute::list_of(object_type())));
    }

    #[test]
    fn test_none_assignable_to_lists_only_via_store_rule() {
        let ints = Attribute::list_of(int_type());
        assert!(!is_subtype(&none_type(), &ints));
        assert!(is_assignable(&none_type(), &ints));
        assert!(!is_assignable(&none_type(), &int_type()));
    }

    #[test]
    fn test_join_of_mismatched_lists() {
        let a = Attribute::list_of(int_type());
        let b = Attribute::list_of(bool_type());
        assert_eq!(join(&a, &b), Attribute::list_of(object_type()));
        assert_eq!(join(&a, &a), a);
        assert_eq!(join(&empty_type(), &a), a);
        assert_eq!(join(&int_type(), &bool_type()), object_type());
    }
}
