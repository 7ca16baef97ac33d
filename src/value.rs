//! NaN-Boxed Value Representation
//!
//! Encodes every ECMAScript value into a single 8-byte word using IEEE 754
//! NaN-boxing. A quiet-NaN bit pattern signals a non-number payload; three
//! tag bits above the payload select among the six non-number kinds, and the
//! low 48 bits carry a boolean, a string-pool id, or an object pointer.
//!
//! ## Encoding scheme
//!
//! ```text
//! number (not a boxed NaN):  any IEEE 754 double outside the boxed range
//! boxed:                     0x7FF8_TTTT_PPPP_PPPP
//!                                  ^^^^-- 3-bit tag (in bits 50:48)
//!                                       ^^^^^^^^^^^-- 48-bit payload
//! ```
//!
//! Tags (see spec §6 "Value bit layout"):
//! - 0: nothing
//! - 1: undefined
//! - 2: null
//! - 3: boolean (payload 0/1)
//! - 4: string (payload = interned string id, zero-extended)
//! - 5: object (payload = pointer, see `ObjectRef`)

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::object::ObjectRef;
use crate::strpool::StrId;

/// An aliasable storage location: a formal parameter, a declarative
/// environment binding, or an `arguments`-object mapped slot all point at
/// the same `Slot` when they refer to "the same live variable" (spec
/// §4.H's `link_mutable_binding`, §4.J's parameter/arguments aliasing).
/// This is the safe-Rust stand-in for the spec's raw `fp`-relative stack
/// slot pointer — see DESIGN.md "Call-stack representation".
pub type Slot = Rc<RefCell<Value>>;

pub fn new_slot(v: Value) -> Slot {
    Rc::new(RefCell::new(v))
}

/// Base pattern for every boxed (non-number) value: a positive quiet NaN.
const BOX_BASE: u64 = 0x7FF8_0000_0000_0000;
/// Any bit pattern at or above this threshold is boxed, not a float.
/// (Negative NaNs and -inf live below this in bit order only once we mask
/// the sign bit away; boxed values are always sign-bit-clear quiet NaNs.)
const BOX_MASK: u64 = 0xFFFF_8000_0000_0000;
const TAG_MASK: u64 = 0x0007_0000_0000_0000;
const TAG_SHIFT: u32 = 48;
const PAYLOAD_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

const TAG_NOTHING: u64 = 0;
const TAG_UNDEFINED: u64 = 1;
const TAG_NULL: u64 = 2;
const TAG_BOOLEAN: u64 = 3;
const TAG_STRING: u64 = 4;
const TAG_OBJECT: u64 = 5;

/// Canonical NaN bit pattern, used whenever an arithmetic op produces NaN,
/// so that NaN payloads never collide with the boxed-value range.
pub const CANONICAL_NAN_BITS: u64 = 0x7FF8_0000_0000_0001;

#[inline]
fn is_boxed(bits: u64) -> bool {
    bits & BOX_MASK == BOX_BASE
}

#[inline]
fn make_boxed(tag: u64, payload: u64) -> u64 {
    debug_assert!(payload & !PAYLOAD_MASK == 0);
    BOX_BASE | (tag << TAG_SHIFT) | payload
}

/// A single ECMAScript value: a NaN-boxed 64-bit word plus, for the object
/// variant, the `Rc` keeping the referenced object alive. Kept as a small
/// tagged enum at the Rust level (rather than a literal `u64` field) so the
/// object payload can be reference-counted safely; `bits()`/`from_bits` give
/// the wire-shaped 64-bit view the ABI in `abi.rs` exposes to generated code.
#[derive(Clone)]
pub enum Value {
    Number(f64),
    Nothing,
    Undefined,
    Null,
    Boolean(bool),
    String(StrId),
    Object(ObjectRef),
}

impl Value {
    // ---- constructors -----------------------------------------------

    pub fn from_bool(b: bool) -> Value {
        Value::Boolean(b)
    }

    pub fn from_num(n: f64) -> Value {
        Value::Number(n)
    }

    pub fn from_i32(i: i32) -> Value {
        Value::Number(i as f64)
    }

    pub fn from_u32(i: u32) -> Value {
        Value::Number(i as f64)
    }

    pub fn from_i64(i: i64) -> Value {
        Value::Number(i as f64)
    }

    pub fn from_u64(i: u64) -> Value {
        Value::Number(i as f64)
    }

    pub fn from_str(id: StrId) -> Value {
        Value::String(id)
    }

    pub fn from_obj(obj: ObjectRef) -> Value {
        Value::Object(obj)
    }

    // ---- predicates ---------------------------------------------------

    pub fn is_nothing(&self) -> bool {
        matches!(self, Value::Nothing)
    }
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
    pub fn is_boolean(&self) -> bool {
        matches!(self, Value::Boolean(_))
    }
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }
    pub fn is_primitive(&self) -> bool {
        !self.is_object()
    }
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Object(o) if o.borrow().is_callable())
    }
    pub fn is_nullish(&self) -> bool {
        self.is_null() || self.is_undefined()
    }

    // ---- accessors ------------------------------------------------------

    pub fn as_boolean(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            _ => panic!("Value::as_boolean on non-boolean"),
        }
    }

    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            _ => panic!("Value::as_number on non-number"),
        }
    }

    pub fn as_string(&self) -> StrId {
        match self {
            Value::String(id) => *id,
            _ => panic!("Value::as_string on non-string"),
        }
    }

    pub fn as_object(&self) -> &ObjectRef {
        match self {
            Value::Object(o) => o,
            _ => panic!("Value::as_object on non-object"),
        }
    }

    pub fn as_function(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) if o.borrow().is_callable() => Some(o),
            _ => None,
        }
    }

    /// Bit-for-bit NaN-boxed wire representation, as consumed/produced by
    /// generated native code through the ABI. Object payloads are encoded
    /// as the raw `Rc` pointer address; round-tripping through `from_bits`
    /// on an object value requires the caller to hold a matching owned
    /// reference (the ABI layer is responsible for this, see `abi.rs`).
    pub fn bits(&self) -> u64 {
        match self {
            Value::Number(n) => {
                if n.is_nan() {
                    CANONICAL_NAN_BITS
                } else {
                    n.to_bits()
                }
            }
            Value::Nothing => make_boxed(TAG_NOTHING, 0),
            Value::Undefined => make_boxed(TAG_UNDEFINED, 0),
            Value::Null => make_boxed(TAG_NULL, 0),
            Value::Boolean(b) => make_boxed(TAG_BOOLEAN, *b as u64),
            Value::String(id) => make_boxed(TAG_STRING, id.0 as u64),
            Value::Object(o) => {
                let ptr = Rc::as_ptr(&o.0) as u64;
                make_boxed(TAG_OBJECT, ptr & PAYLOAD_MASK)
            }
        }
    }

    /// Reconstructs a `Value` from its wire-shaped 64-bit form, the inverse
    /// of `bits()`. Used only at the ABI boundary (`abi.rs`), where
    /// generated native code hands values back across the FFI edge as raw
    /// words.
    ///
    /// # Safety
    ///
    /// For an object-tagged payload, `bits` must have been produced by a
    /// live `Value::Object` whose `Rc` the caller (directly or transitively,
    /// e.g. via the call stack or a global binding) still holds — this
    /// function bumps the strong count of the pointer the payload encodes
    /// without any way to check it is still valid. A payload built from a
    /// stale or foreign pointer is undefined behavior.
    pub unsafe fn from_bits(bits: u64) -> Value {
        if !is_boxed(bits) {
            return Value::Number(f64::from_bits(bits));
        }
        let tag = (bits & TAG_MASK) >> TAG_SHIFT;
        let payload = bits & PAYLOAD_MASK;
        match tag {
            TAG_NOTHING => Value::Nothing,
            TAG_UNDEFINED => Value::Undefined,
            TAG_NULL => Value::Null,
            TAG_BOOLEAN => Value::Boolean(payload != 0),
            TAG_STRING => Value::String(StrId(payload as u32)),
            TAG_OBJECT => {
                let ptr = payload as *const RefCell<crate::object::Obj>;
                Rc::increment_strong_count(ptr);
                Value::Object(ObjectRef(Rc::from_raw(ptr)))
            }
            _ => Value::Undefined,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Nothing => write!(f, "Nothing"),
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Boolean(b) => write!(f, "Boolean({b})"),
            Value::String(id) => write!(f, "String({id:?})"),
            Value::Object(_) => write!(f, "Object(..)"),
        }
    }
}

/// Raw bitwise equivalence: booleans/null/undefined compare by tag, strings
/// by interned id (identity, since interning guarantees one id per
/// sequence), objects by pointer, numbers by IEEE-754 (so `NaN != NaN`).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Nothing, Value::Nothing) => true,
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }
}

/// The SameValue algorithm (spec §8.K / ES5 §9.12): differs from strict
/// equality only in that NaN = NaN and +0 != -0.
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if x.is_nan() && y.is_nan() {
                true
            } else if *x == 0.0 && *y == 0.0 {
                x.is_sign_positive() == y.is_sign_positive()
            } else {
                x == y
            }
        }
        _ => a == b,
    }
}

/// Hint passed to `to_primitive`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Hint {
    Default,
    Number,
    String,
}

