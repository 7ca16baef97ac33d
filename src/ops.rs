//! Operations layer
//!
//! Type conversions (§9 of ECMA-262 5.1), abstract/strict/same-value
//! equality, abstract relational comparison, unary/binary operators,
//! context get/put/delete (lexical-environment chain walk), property
//! get/put/delete (object-model dispatch), and call dispatch (by value, by
//! key, by name, construct).
//!
//! Grounded on `original_source/runtime/conversion.cc` and
//! `original_source/runtime/operation.cc` for the exact algorithm shapes
//! (`to_primitive`'s hint handling, `to_number`'s string-parsing table,
//! `abstract_relational_comparison`'s left-first-evaluation note); restated
//! here as free functions taking `&mut dyn Invoker` rather than the
//! original's context-stack-threaded `EsContext*`, since this crate's
//! conversions don't need access to the context stack itself, only to the
//! call machinery (spec §4.K groups get/put/delete and call dispatch
//! separately; those consult `context.rs`/`env.rs` directly).

use std::rc::Rc;

use crate::ast::Stmt;
use crate::context::ContextStack;
use crate::env::LexEnv;
use crate::error::{ErrorKind, EsResult};
use crate::frame::CallStack;
use crate::object::{ClassTag, Invoker, ObjectRef, Obj, ObjectKind};
use crate::propkey::PropKey;
use crate::shape::Shape;
use crate::strpool::StrId;
use crate::value::{same_value, Hint, Value};

/// Everything the context/property/call-dispatch operations below need
/// beyond plain call/construct/intern: access to the running context
/// stack and the object-model bootstrap fixtures (boxing prototypes, the
/// shape root, the global object). One `Engine` implements this once,
/// letting the context-get/property-get/call-dispatch free functions below
/// take a single generic `inv: &mut I where I: Interp + ?Sized` instead of
/// threading four separate parameters through every call site. Generic
/// rather than `&mut dyn Interp`: `Engine` needs to pass itself where both
/// an `&mut dyn Invoker` and the `ctx()`/`protos()` accessors are needed
/// from the same borrow, and a concrete-to-trait-object unsized coercion
/// is always available, while narrowing an existing `&mut dyn Interp` back
/// down to `&mut dyn Invoker` would depend on trait upcasting.
pub trait Interp: Invoker {
    fn ctx(&self) -> &ContextStack;
    fn ctx_mut(&mut self) -> &mut ContextStack;
    fn protos(&self) -> &BoxingPrototypes;
    fn root(&self) -> Shape;
    fn global_object(&self) -> &ObjectRef;
    /// The persistent global lexical environment (an object environment
    /// record over `global_object`), reused for every `push_global` and for
    /// indirect `eval` (which always runs against global scope regardless
    /// of the calling context, spec §4.L).
    fn global_env(&self) -> LexEnv;
    /// `Function.prototype`, the `[[Prototype]]` every function object
    /// (native or interpreted) is created with (spec §4.O).
    fn function_proto(&self) -> ObjectRef;
    /// `Array.prototype`, the `[[Prototype]]` an array literal's object is
    /// created with (ES5 §11.1.4) regardless of whether the binding named
    /// `Array` has since been reassigned.
    fn array_proto(&self) -> ObjectRef;
    /// The shared `%ThrowTypeError%` intrinsic (ES5 §13.2 note): a single
    /// native function instance installed as the getter/setter pair on the
    /// poisoned `arguments.callee`/`caller` and
    /// `Function.prototype.caller`/`.arguments` accessors of every strict
    /// function (spec §4.G scenario: accessing these throws `TypeError`).
    fn throw_type_error_fn(&self) -> ObjectRef;
    /// Backing storage for argument slots pushed by `Frame` (spec §4.J).
    /// The evaluator (`eval.rs`) uses this to build each call's frame and
    /// capture its argument `Slot`s before the frame is torn down.
    fn call_stack_mut(&mut self) -> &mut CallStack;
    /// Hands a source string to the external parser (spec §1: "the parser
    /// and AST producer is consumed as a black box") and gets back a
    /// program body, for `eval(string)`. Not implemented by this crate
    /// itself; a host embedding wires an actual parser in here.
    fn parse_program(&mut self, source: &str) -> EsResult<Rc<Vec<Stmt>>>;
}

// ---------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------

pub fn to_boolean(v: &Value, inv: &dyn Invoker) -> bool {
    match v {
        Value::Nothing | Value::Undefined | Value::Null => false,
        Value::Boolean(b) => *b,
        Value::Number(n) => !(n.is_nan() || *n == 0.0),
        Value::String(id) => !inv.lookup_str(*id).is_empty(),
        Value::Object(_) => true,
    }
}

/// ES5 §9.1: if already primitive, returned unchanged; otherwise tries
/// `toString`/`valueOf` in the hint-dependent order (delegates to
/// `Obj::default_value`).
pub fn to_primitive(v: &Value, hint: Hint, inv: &mut dyn Invoker) -> EsResult<Value> {
    match v {
        Value::Object(o) => o.default_value(hint, inv),
        other => Ok(other.clone()),
    }
}

/// ES5 §9.3, restricted to the numeric parse of already-available string
/// text; callers needing the actual decimal/hex grammar on arbitrary
/// strings look it up via `inv.lookup_str`.
pub fn to_number(v: &Value, inv: &mut dyn Invoker) -> EsResult<f64> {
    match v {
        Value::Number(n) => Ok(*n),
        Value::Undefined | Value::Nothing => Ok(f64::NAN),
        Value::Null => Ok(0.0),
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(id) => Ok(string_to_number(&inv.lookup_str(*id))),
        Value::Object(_) => {
            let prim = to_primitive(v, Hint::Number, inv)?;
            to_number(&prim, inv)
        }
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(|c: char| c.is_whitespace());
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map(|n| n as f64).unwrap_or(f64::NAN);
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

pub fn to_int32(v: &Value, inv: &mut dyn Invoker) -> EsResult<i32> {
    let n = to_number(v, inv)?;
    Ok(double_to_int32(n))
}

pub fn to_uint32(v: &Value, inv: &mut dyn Invoker) -> EsResult<u32> {
    let n = to_number(v, inv)?;
    Ok(double_to_int32(n) as u32)
}

fn double_to_int32(n: f64) -> i32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let n = n.trunc();
    let m = n.rem_euclid(4294967296.0);
    if m >= 2147483648.0 {
        (m - 4294967296.0) as i32
    } else {
        m as i32
    }
}

/// ES5 §9.8: numbers use the shortest round-tripping decimal form (the
/// contract-level deviation noted in DESIGN.md — exact ECMA-262 digit
/// generation is out of scope here, matching spec §1's non-goal for
/// "exact ... number-format ... algorithms").
pub fn to_string(v: &Value, inv: &mut dyn Invoker) -> EsResult<String> {
    match v {
        Value::Undefined | Value::Nothing => Ok("undefined".to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(number_to_string(*n)),
        Value::String(id) => Ok(inv.lookup_str(*id)),
        Value::Object(_) => {
            let prim = to_primitive(v, Hint::String, inv)?;
            to_string(&prim, inv)
        }
    }
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else {
        n.to_string()
    }
}

/// ES5 §9.9: primitives (except null/undefined) are boxed; objects pass
/// through. Null/undefined are a caller error (raises `TypeError`).
pub fn to_object(v: &Value, protos: &BoxingPrototypes, root: Shape, inv: &mut dyn Invoker) -> EsResult<ObjectRef> {
    match v {
        Value::Object(o) => Ok(o.clone()),
        Value::Boolean(b) => Ok(ObjectRef::new(Obj::new(
            ClassTag::Boolean,
            Some(protos.boolean.clone()),
            root,
            ObjectKind::Boolean(*b),
        ))),
        Value::Number(n) => Ok(ObjectRef::new(Obj::new(
            ClassTag::Number,
            Some(protos.number.clone()),
            root,
            ObjectKind::Number(*n),
        ))),
        Value::String(id) => Ok(ObjectRef::new(Obj::new(
            ClassTag::String,
            Some(protos.string.clone()),
            root,
            ObjectKind::StringObj(*id),
        ))),
        Value::Null | Value::Undefined | Value::Nothing => Err(inv.throw(ErrorKind::TypeError, "cannot convert null or undefined to object")),
    }
}

/// The prototypes `to_object` boxes primitives against; threaded in rather
/// than looked up through a global so this module stays independent of
/// `bootstrap.rs`'s initialization order.
pub struct BoxingPrototypes {
    pub object: ObjectRef,
    pub boolean: ObjectRef,
    pub number: ObjectRef,
    pub string: ObjectRef,
}

pub fn to_property_key(v: &Value, inv: &mut dyn Invoker) -> EsResult<PropKey> {
    if let Value::Number(n) = v {
        if *n >= 0.0 && n.fract() == 0.0 && *n < u32::MAX as f64 {
            return Ok(PropKey::from_u32(*n as u32));
        }
    }
    let s = to_string(v, inv)?;
    Ok(PropKey::from_str(&s, |s| inv.intern(s)))
}

// ---------------------------------------------------------------------
// Equality
// ---------------------------------------------------------------------

/// ES5 §11.9.3: abstract equality, type-crossing with the standard
/// coercions (number<->string, boolean<->number, object<->primitive).
pub fn abstract_equals(a: &Value, b: &Value, inv: &mut dyn Invoker) -> EsResult<bool> {
    use Value::*;
    match (a, b) {
        (Number(_), Number(_))
        | (String(_), String(_))
        | (Boolean(_), Boolean(_))
        | (Object(_), Object(_))
        | (Null, Null)
        | (Undefined, Undefined)
        | (Nothing, Nothing) => Ok(strict_equals(a, b)),
        (Null, Undefined) | (Undefined, Null) => Ok(true),
        (Number(_), String(s)) => {
            let n = string_to_number(&inv.lookup_str(*s));
            Ok(matches!(a, Number(x) if numbers_equal(*x, n)))
        }
        (String(s), Number(_)) => {
            let n = string_to_number(&inv.lookup_str(*s));
            Ok(matches!(b, Number(y) if numbers_equal(n, *y)))
        }
        (Boolean(_), _) => {
            let n = to_number(a, inv)?;
            abstract_equals(&Number(n), b, inv)
        }
        (_, Boolean(_)) => {
            let n = to_number(b, inv)?;
            abstract_equals(a, &Number(n), inv)
        }
        (Number(_) | String(_), Object(_)) => {
            let prim = to_primitive(b, Hint::Default, inv)?;
            abstract_equals(a, &prim, inv)
        }
        (Object(_), Number(_) | String(_)) => {
            let prim = to_primitive(a, Hint::Default, inv)?;
            abstract_equals(&prim, b, inv)
        }
        _ => Ok(false),
    }
}

fn numbers_equal(a: f64, b: f64) -> bool {
    a == b
}

/// ES5 §11.9.6: strict equality, no coercion.
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    a == b
}

// ---------------------------------------------------------------------
// Relational comparison
// ---------------------------------------------------------------------

/// ES5 §11.8.5. `left_first` controls evaluation order of the
/// `to_primitive` coercions only (both operands are already values here;
/// the flag exists for callers whose evaluation of the two operand
/// expressions must happen in source order before this function is
/// invoked). Returns `None` when either side is NaN (the "undefined"
/// result, which both `<` and `>` treat as false).
pub fn abstract_relational_comparison(a: &Value, b: &Value, left_first: bool, inv: &mut dyn Invoker) -> EsResult<Option<bool>> {
    let (pa, pb) = if left_first {
        let pa = to_primitive(a, Hint::Number, inv)?;
        let pb = to_primitive(b, Hint::Number, inv)?;
        (pa, pb)
    } else {
        let pb = to_primitive(b, Hint::Number, inv)?;
        let pa = to_primitive(a, Hint::Number, inv)?;
        (pa, pb)
    };

    if let (Value::String(sa), Value::String(sb)) = (&pa, &pb) {
        let ta = inv.lookup_str(*sa);
        let tb = inv.lookup_str(*sb);
        return Ok(Some(ta < tb));
    }

    let na = to_number(&pa, inv)?;
    let nb = to_number(&pb, inv)?;
    if na.is_nan() || nb.is_nan() {
        return Ok(None);
    }
    Ok(Some(na < nb))
}

// ---------------------------------------------------------------------
// Unary / binary operators
// ---------------------------------------------------------------------

pub fn op_typeof(v: &Value) -> &'static str {
    match v {
        Value::Nothing | Value::Undefined => "undefined",
        Value::Null => "object",
        Value::Boolean(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Object(o) => {
            if o.borrow().is_callable() {
                "function"
            } else {
                "object"
            }
        }
    }
}

pub fn op_add(a: &Value, b: &Value, inv: &mut dyn Invoker) -> EsResult<Value> {
    let pa = to_primitive(a, Hint::Default, inv)?;
    let pb = to_primitive(b, Hint::Default, inv)?;
    if matches!(pa, Value::String(_)) || matches!(pb, Value::String(_)) {
        let sa = to_string(&pa, inv)?;
        let sb = to_string(&pb, inv)?;
        let id = inv.intern(&(sa + &sb));
        Ok(Value::String(id))
    } else {
        let na = to_number(&pa, inv)?;
        let nb = to_number(&pb, inv)?;
        Ok(Value::Number(na + nb))
    }
}

macro_rules! numeric_binop {
    ($name:ident, $op:tt) => {
        pub fn $name(a: &Value, b: &Value, inv: &mut dyn Invoker) -> EsResult<Value> {
            let na = to_number(a, inv)?;
            let nb = to_number(b, inv)?;
            Ok(Value::Number(na $op nb))
        }
    };
}

numeric_binop!(op_sub, -);
numeric_binop!(op_mul, *);
numeric_binop!(op_div, /);

pub fn op_mod(a: &Value, b: &Value, inv: &mut dyn Invoker) -> EsResult<Value> {
    let na = to_number(a, inv)?;
    let nb = to_number(b, inv)?;
    Ok(Value::Number(na % nb))
}

macro_rules! int32_binop {
    ($name:ident, $op:tt) => {
        pub fn $name(a: &Value, b: &Value, inv: &mut dyn Invoker) -> EsResult<Value> {
            let ia = to_int32(a, inv)?;
            let ib = to_int32(b, inv)?;
            Ok(Value::from_i32(ia $op ib))
        }
    };
}

int32_binop!(op_bit_and, &);
int32_binop!(op_bit_or, |);
int32_binop!(op_bit_xor, ^);

pub fn op_shl(a: &Value, b: &Value, inv: &mut dyn Invoker) -> EsResult<Value> {
    let ia = to_int32(a, inv)?;
    let shift = to_uint32(b, inv)? & 0x1f;
    Ok(Value::from_i32(ia.wrapping_shl(shift)))
}

pub fn op_sar(a: &Value, b: &Value, inv: &mut dyn Invoker) -> EsResult<Value> {
    let ia = to_int32(a, inv)?;
    let shift = to_uint32(b, inv)? & 0x1f;
    Ok(Value::from_i32(ia.wrapping_shr(shift)))
}

pub fn op_shr(a: &Value, b: &Value, inv: &mut dyn Invoker) -> EsResult<Value> {
    let ua = to_uint32(a, inv)?;
    let shift = to_uint32(b, inv)? & 0x1f;
    Ok(Value::from_u32(ua.wrapping_shr(shift)))
}

pub fn op_in(a: &Value, b: &Value, inv: &mut dyn Invoker) -> EsResult<bool> {
    let Value::Object(o) = b else {
        return Err(inv.throw(ErrorKind::TypeError, "'in' requires an object right-hand side"));
    };
    let key = to_property_key(a, inv)?;
    Ok(o.has_property(key))
}

pub fn op_instance_of(a: &Value, b: &Value, inv: &mut dyn Invoker) -> EsResult<bool> {
    let Value::Object(ctor) = b else {
        return Err(inv.throw(ErrorKind::TypeError, "'instanceof' requires a callable right-hand side"));
    };
    if !ctor.borrow().is_callable() {
        return Err(inv.throw(ErrorKind::TypeError, "'instanceof' requires a callable right-hand side"));
    }
    ctor.has_instance(a, inv)
}

// ---------------------------------------------------------------------
// Context (lexical environment) get / put / delete
// ---------------------------------------------------------------------

/// Walks the current context's lexical environment chain for `key`; raises
/// `ReferenceError` in strict mode (or always, for reads per ES5 §10.2.1)
/// when unresolved.
pub fn ctx_get<I: Interp + ?Sized>(inv: &mut I, key: PropKey) -> EsResult<Value> {
    let env = inv.ctx().current().lex_env.clone();
    match env.resolve(key) {
        Some(found) => found.record().get_binding_value(key, true, inv),
        None => Err(inv.throw(ErrorKind::ReferenceError, "identifier is not defined")),
    }
}

/// Non-strict writes to an unresolved identifier implicitly create a
/// property on the global object (spec §4.K); strict writes raise
/// `ReferenceError`.
pub fn ctx_put<I: Interp + ?Sized>(inv: &mut I, key: PropKey, value: Value) -> EsResult<()> {
    let current_lex = inv.ctx().current().lex_env.clone();
    let current_var = inv.ctx().current().var_env.clone();
    let strict = inv.ctx().current().strict;
    match current_lex.resolve(key) {
        Some(found) => found.record().set_mutable_binding(key, value, strict, inv),
        None if strict => Err(inv.throw(ErrorKind::ReferenceError, "identifier is not defined")),
        None => current_var.record().set_mutable_binding(key, value, false, inv),
    }
}

pub fn ctx_delete<I: Interp + ?Sized>(inv: &mut I, key: PropKey) -> EsResult<bool> {
    let env = inv.ctx().current().lex_env.clone();
    match env.resolve(key) {
        Some(found) => found.record().delete_binding(key, inv),
        None => Ok(true),
    }
}

// ---------------------------------------------------------------------
// Property get / put / delete
// ---------------------------------------------------------------------

pub fn prop_get<I: Interp + ?Sized>(inv: &mut I, base: &Value, key: PropKey) -> EsResult<Value> {
    let (protos, root) = (boxing_snapshot(inv), inv.root());
    let obj = to_object(base, &protos, root, inv)?;
    obj.get(key, inv)
}

pub fn prop_put<I: Interp + ?Sized>(inv: &mut I, base: &Value, key: PropKey, value: Value, strict: bool) -> EsResult<()> {
    let (protos, root) = (boxing_snapshot(inv), inv.root());
    let obj = to_object(base, &protos, root, inv)?;
    obj.put(key, value, strict, inv)
}

pub fn prop_delete<I: Interp + ?Sized>(inv: &mut I, base: &Value, key: PropKey, strict: bool) -> EsResult<bool> {
    let (protos, root) = (boxing_snapshot(inv), inv.root());
    let obj = to_object(base, &protos, root, inv)?;
    obj.delete(key, strict, inv)
}

fn boxing_snapshot<I: Interp + ?Sized>(inv: &I) -> BoxingPrototypes {
    let p = inv.protos();
    BoxingPrototypes {
        object: p.object.clone(),
        boolean: p.boolean.clone(),
        number: p.number.clone(),
        string: p.string.clone(),
    }
}

// ---------------------------------------------------------------------
// Call dispatch
// ---------------------------------------------------------------------

pub fn call_value(callee: &Value, this: Value, args: &[Value], inv: &mut dyn Invoker) -> EsResult<Value> {
    match callee {
        Value::Object(o) if o.borrow().is_callable() => o.call(this, args, inv),
        _ => Err(inv.throw(ErrorKind::TypeError, "value is not callable")),
    }
}

/// *By key*: `obj[key](args)` / `obj.key(args)`. This-value is `obj`
/// itself; a call where `key` is the interned string `"eval"` is flagged
/// direct-eval by the caller (the evaluator, which has the string id of
/// `"eval"` cached).
pub fn call_keyed<I: Interp + ?Sized>(inv: &mut I, base: &Value, key: PropKey, args: &[Value]) -> EsResult<Value> {
    let (protos, root) = (boxing_snapshot(inv), inv.root());
    let obj = to_object(base, &protos, root, inv)?;
    let callee = obj.get(key, inv)?;
    call_value(&callee, Value::Object(obj), args, inv)
}

/// *By name*: identifier lookup through the context chain; this-value is
/// the resolved environment's implicit this.
pub fn call_named<I: Interp + ?Sized>(inv: &mut I, name: PropKey, args: &[Value]) -> EsResult<Value> {
    let env = inv.ctx().current().lex_env.clone();
    let Some(found) = env.resolve(name) else {
        return Err(inv.throw(ErrorKind::ReferenceError, "identifier is not defined"));
    };
    let callee = found.record().get_binding_value(name, true, inv)?;
    let this = found.record().implicit_this_value();
    call_value(&callee, this, args, inv)
}

pub fn call_new<I: Interp + ?Sized>(inv: &mut I, callee: &Value, args: &[Value]) -> EsResult<Value> {
    let object_proto = inv.protos().object.clone();
    let root = inv.root();
    match callee {
        Value::Object(o) if o.borrow().is_callable() => o.construct(args, object_proto, root, inv),
        _ => Err(inv.throw(ErrorKind::TypeError, "value is not a constructor")),
    }
}

/// Identifies whether a call expression is a direct eval (spec §4.K,
/// §4.L): `key`/`name` equals the interned string `"eval"`.
pub fn is_eval_key(key: PropKey, eval_str_id: StrId) -> bool {
    key.is_string() && key.as_string() == eval_str_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strpool::StringPool;

    struct NullInvoker {
        pool: StringPool,
    }
    impl Invoker for NullInvoker {
        fn call(&mut self, _callee: &ObjectRef, _this: Value, _args: &[Value]) -> EsResult<Value> {
            Ok(Value::Undefined)
        }
        fn construct(&mut self, _callee: &ObjectRef, _args: &[Value]) -> EsResult<Value> {
            Ok(Value::Undefined)
        }
        fn intern(&mut self, s: &str) -> StrId {
            self.pool.intern(s)
        }
        fn lookup_str(&self, id: StrId) -> String {
            self.pool.lookup(id).to_owned()
        }
        fn throw(&mut self, _kind: ErrorKind, message: impl Into<String>) -> Value {
            Value::String(self.pool.intern(&message.into()))
        }
    }

    #[test]
    fn same_value_distinguishes_nan_and_zero() {
        assert!(same_value(&Value::from_num(f64::NAN), &Value::from_num(f64::NAN)));
        assert!(!same_value(&Value::from_num(0.0), &Value::from_num(-0.0)));
    }

    #[test]
    fn abstract_equality_crosses_number_and_string() {
        let mut inv = NullInvoker { pool: StringPool::new() };
        let s = Value::String(inv.intern("1"));
        assert!(abstract_equals(&Value::from_i32(1), &s, &mut inv).unwrap());
    }

    #[test]
    fn strict_equality_never_crosses_types() {
        let mut inv = NullInvoker { pool: StringPool::new() };
        let s = Value::String(inv.intern("1"));
        assert!(!strict_equals(&Value::from_i32(1), &s));
    }

    #[test]
    fn to_int32_wraps_out_of_range_values() {
        let mut inv = NullInvoker { pool: StringPool::new() };
        let v = Value::from_num(4294967296.0 + 5.0);
        assert_eq!(to_int32(&v, &mut inv).unwrap(), 5);
    }

    #[test]
    fn relational_comparison_is_none_for_nan() {
        let mut inv = NullInvoker { pool: StringPool::new() };
        let r = abstract_relational_comparison(&Value::from_num(f64::NAN), &Value::from_i32(1), true, &mut inv).unwrap();
        assert_eq!(r, None);
    }

    #[test]
    fn op_add_concatenates_when_either_side_is_string() {
        let mut inv = NullInvoker { pool: StringPool::new() };
        let s = Value::String(inv.intern("x"));
        let result = op_add(&s, &Value::from_i32(1), &mut inv).unwrap();
        assert_eq!(inv.lookup_str(result.as_string()), "x1");
    }
}
