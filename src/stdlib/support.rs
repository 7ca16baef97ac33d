//! Shared construction helpers for standard library bindings
//!
//! Every built-in constructor/prototype is built from the same handful of
//! moves: allocate a `Function` object wrapping a native closure, wire its
//! `length`/`name`, optionally hook up `prototype`/`constructor`, and
//! install non-enumerable methods on a prototype object. Factored out here
//! so `bootstrap.rs` and every `stdlib::*` module share one way of doing it,
//! mirroring `eval::make_closure`'s own property layout for interpreted
//! functions (ES5 §15's "every built-in function has a `length` own
//! property ... `[[Writable]]` false, `[[Enumerable]]` false,
//! `[[Configurable]]` true" and likewise for `name`).

use crate::error::{ErrorKind, EsResult};
use crate::object::{ClassTag, FunctionData, FunctionKind, Invoker, NativeFn, Obj, ObjectKind, ObjectRef, PropertyDescriptor};
use crate::propkey::PropKey;
use crate::shape::Shape;
use crate::value::Value;

/// Builds a non-constructible native function object (a plain method, e.g.
/// `Math.abs` or `Array.prototype.push`): `length` and, when `name` is
/// given, `name`, both non-writable/non-enumerable/configurable.
pub fn native_function(inv: &mut dyn Invoker, root: Shape, function_proto: ObjectRef, name: &str, arity: u32, func: NativeFn) -> ObjectRef {
    build_native(inv, root, function_proto, name, arity, func, None)
}

/// Builds a constructible native function (`Object`, `Array`, the `Error`
/// family, ...): also allocates a fresh `prototype` object (or reuses
/// `prototype_obj` when the caller already built one, e.g. `Object.prototype`
/// itself) and wires the `prototype.constructor` back-reference (ES5
/// §15.2.3.1-style pairing, same as `eval::make_closure`).
pub fn native_constructor(
    inv: &mut dyn Invoker,
    root: Shape,
    function_proto: ObjectRef,
    name: &str,
    arity: u32,
    func: NativeFn,
    construct: NativeFn,
    prototype_obj: ObjectRef,
) -> ObjectRef {
    let ctor = build_native(inv, root.clone(), function_proto, name, arity, func, Some(construct));

    let ctor_key = PropKey::from_str_id(inv.intern("constructor"));
    let _ = prototype_obj.define_own_property(
        ctor_key,
        PropertyDescriptor::from_data(Value::Object(ctor.clone()), true, false, true),
        false,
        inv,
    );
    let proto_key = PropKey::from_str_id(inv.intern("prototype"));
    let _ = ctor.define_own_property(proto_key, PropertyDescriptor::from_data(Value::Object(prototype_obj), false, false, false), false, inv);

    ctor
}

fn build_native(inv: &mut dyn Invoker, root: Shape, function_proto: ObjectRef, name: &str, arity: u32, func: NativeFn, construct: Option<NativeFn>) -> ObjectRef {
    let func_obj = ObjectRef::new(Obj::new(
        ClassTag::Function,
        Some(function_proto),
        root,
        ObjectKind::Function(FunctionData {
            kind: FunctionKind::Native { func, construct },
            strict: false,
            arity,
        }),
    ));

    let length_key = PropKey::from_str_id(inv.intern("length"));
    let _ = func_obj.define_own_property(length_key, PropertyDescriptor::from_data(Value::from_u32(arity), false, false, true), false, inv);
    let name_id = inv.intern(name);
    let name_key = PropKey::from_str_id(name_id);
    let _ = func_obj.define_own_property(name_key, PropertyDescriptor::from_data(Value::String(name_id), false, false, true), false, inv);

    func_obj
}

/// Installs a native method on `obj` as `{writable: true, enumerable:
/// false, configurable: true}` (ES5 §15's standard built-in method
/// attributes).
pub fn define_method(inv: &mut dyn Invoker, obj: &ObjectRef, root: Shape, function_proto: ObjectRef, name: &str, arity: u32, func: NativeFn) {
    let method = native_function(inv, root, function_proto, name, arity, func);
    let key = PropKey::from_str_id(inv.intern(name));
    let _ = obj.define_own_property(key, PropertyDescriptor::from_data(Value::Object(method), true, false, true), false, inv);
}

/// Installs a plain data property (a constant like `Math.PI` or
/// `Number.MAX_VALUE`) as non-writable/non-enumerable/non-configurable,
/// the attribute set ES5 §15 gives every builtin value property.
pub fn define_constant(inv: &mut dyn Invoker, obj: &ObjectRef, name: &str, value: Value) {
    let key = PropKey::from_str_id(inv.intern(name));
    let _ = obj.define_own_property(key, PropertyDescriptor::from_data(value, false, false, false), false, inv);
}

/// Installs a regular own data property (used for instance fields such as
/// an `Error`'s `message`), `{writable: true, enumerable: false,
/// configurable: true}`.
pub fn define_value(inv: &mut dyn Invoker, obj: &ObjectRef, name: &str, value: Value) {
    let key = PropKey::from_str_id(inv.intern(name));
    let _ = obj.define_own_property(key, PropertyDescriptor::from_data(value, true, false, true), false, inv);
}

/// Reads an argument by position, defaulting to `Undefined` past the end
/// (ES5 §10.6 "unsupplied arguments are undefined").
pub fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

/// Every generic prototype method here is called through `obj.method(...)`
/// or `obj[key](...)`, both of which box `this` through `ToObject` before
/// the native body ever runs (see `ops::call_keyed`). A bare function value
/// pulled out and invoked with a primitive `this` (`Array.prototype.push.call(5)`)
/// is the one path that reaches a method body unboxed; reject it rather
/// than silently misbehaving.
pub fn this_object(this: &Value, inv: &mut dyn Invoker) -> EsResult<ObjectRef> {
    match this {
        Value::Object(o) => Ok(o.clone()),
        _ => Err(inv.throw(ErrorKind::TypeError, "method called on a non-object receiver")),
    }
}

/// Own property keys in ES5 §12.6.4/§15.2.3.14 enumeration order: array
/// indices ascending first, then string keys in creation order.
/// `enumerable_only` selects `Object.keys`/`for-in`'s filtered view versus
/// `Object.getOwnPropertyNames`'s unfiltered one.
pub fn own_keys(obj: &ObjectRef, enumerable_only: bool) -> Vec<PropKey> {
    if enumerable_only {
        return obj.own_enumerable_keys();
    }
    let borrowed = obj.borrow();
    let mut indices: Vec<u32> = borrowed.indexed.iter().map(|(i, _)| i).collect();
    indices.sort_unstable();
    let mut keys: Vec<PropKey> = indices.into_iter().map(PropKey::from_u32).collect();
    keys.extend(borrowed.props.keys());
    keys
}
