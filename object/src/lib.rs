mod value;
mod header;
mod objects;
mod tag;

pub use value::{Address, ObjRef, Value, INT_BITS, INT_MAX, INT_MIN, wrap_int};
pub use header::ObjectKind;
pub use objects::Object;
pub use tag::{TAG_CHARS, TagError, tag_hash, tag_name};

#[cfg(test)]
mod tests {
    use super::*;

    // ── Value tagging ──────────────────────────────────────────────

    #[test]
    fn int_round_trip() {
        for &n in &[0, 1, -1, 42, -42, INT_MAX, INT_MIN] {
            let v = Value::int(n);
            assert!(v.is_unboxed());
            assert!(!v.is_boxed());
            assert_eq!(v.as_int(), Some(n));
        }
    }

    #[test]
    fn int_wraps_to_31_bits() {
        assert_eq!(Value::int(INT_MAX + 1).as_int(), Some(INT_MIN));
        assert_eq!(Value::int(INT_MIN - 1).as_int(), Some(INT_MAX));
        assert_eq!(wrap_int(i32::MAX), -1);
    }

    #[test]
    fn refs_and_addresses_are_boxed() {
        let r = Value::Ref(ObjRef(3));
        assert!(r.is_boxed());
        assert_eq!(r.referent(), Some(ObjRef(3)));

        let a = Value::Addr(Address::Stack(7));
        assert!(a.is_boxed());
        assert_eq!(a.referent(), None);

        let f = Value::Addr(Address::Field { object: ObjRef(9), index: 1 });
        assert_eq!(f.referent(), Some(ObjRef(9)));
    }

    // ── Kinds ──────────────────────────────────────────────────────

    #[test]
    fn kinds_use_runtime_tag_values() {
        assert_eq!(ObjectKind::Sexp as u32, 0x5);
        assert_eq!(ObjectKind::Str.name(), "string");
        assert_eq!(ObjectKind::Closure.name(), "closure");
    }

    #[test]
    fn closure_len_counts_entry() {
        let c = Object::Closure { entry: 12, captures: vec![Value::int(1)] };
        assert_eq!(c.len(), 2);
        assert_eq!(c.field(0), Some(Value::int(12)));
        assert_eq!(c.field(1), Some(Value::int(1)));
        assert_eq!(c.field(2), None);
    }

    #[test]
    fn string_fields_are_bytes() {
        let mut s = Object::Str(b"abc".to_vec());
        assert_eq!(s.field(1), Some(Value::int(b'b' as i32)));
        assert!(s.set_field(1, Value::int(b'x' as i32)));
        assert!(!s.set_field(1, Value::Ref(ObjRef(0))));
        assert_eq!(s, Object::Str(b"axc".to_vec()));
    }

    #[test]
    fn closure_entry_is_read_only() {
        let mut c = Object::Closure { entry: 0, captures: vec![Value::zero()] };
        assert!(!c.set_field(0, Value::int(5)));
        assert!(c.set_field(1, Value::int(5)));
        assert_eq!(c.values(), &[Value::int(5)]);
    }

    // ── Tags ───────────────────────────────────────────────────────

    #[test]
    fn tag_hash_round_trip() {
        for name in ["Nil", "Cons", "cons", "A", "Leaf'", "x1y2z"] {
            let hash = tag_hash(name.as_bytes()).expect("valid tag");
            assert_eq!(tag_name(hash), name);
        }
    }

    #[test]
    fn tag_hash_truncates_long_names() {
        let long = tag_hash(b"Branch").expect("valid tag");
        let short = tag_hash(b"Branc").expect("valid tag");
        assert_eq!(long, short);
        assert!(long <= INT_MAX);
    }

    #[test]
    fn tag_hash_rejects_foreign_chars() {
        assert_eq!(tag_hash(b"a-b"), Err(TagError::InvalidChar('-')));
    }
}
