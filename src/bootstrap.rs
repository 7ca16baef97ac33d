//! Prototype and global-object bootstrap (ES5 §15).
//!
//! `Engine::new` builds every field with a throwaway placeholder object,
//! then calls `bootstrap` once to replace each of them in place. Order
//! matters: `Object.prototype` and `Function.prototype` have to exist
//! (with each other as prototype/constructor) before anything else can be
//! built on top of them, and `Array.prototype` has to exist before
//! `String.prototype.split`, `RegExp.prototype.exec`, and `JSON` can be
//! wired up to build array results.
//!
//! Grounded on `original_source/runtime/context.cc`'s single bootstrap
//! routine that wires the built-in object graph before any user code runs;
//! collapsed here into free functions over `&mut Engine` rather than a
//! method on a partially-constructed `this`.

use std::rc::Rc;

use crate::engine::Engine;
use crate::error::ErrorKind;
use crate::object::{ClassTag, FunctionData, FunctionKind, Invoker, NativeFn, Obj, ObjectKind, ObjectRef, PropertyDescriptor};
use crate::ops::BoxingPrototypes;
use crate::propkey::PropKey;
use crate::stdlib;
use crate::value::Value;

pub fn bootstrap(engine: &mut Engine) {
    let root = engine.root.clone();

    // Object.prototype and Function.prototype are mutually referential:
    // Function.prototype's own [[Prototype]] is Object.prototype, and every
    // function (including Object/Function themselves) chains to
    // Function.prototype. Build both bare, wire the chain, then install.
    let object_proto = ObjectRef::new(Obj::new(ClassTag::Object, None, root.clone(), ObjectKind::Plain));
    let function_proto = ObjectRef::new(Obj::new(
        ClassTag::Function,
        Some(object_proto.clone()),
        root.clone(),
        ObjectKind::Function(FunctionData {
            kind: FunctionKind::Native {
                func: Rc::new(|_inv, _this, _args| Ok(Value::Undefined)),
                construct: None,
            },
            strict: false,
            arity: 0,
        }),
    ));

    stdlib::function_proto::install(engine, root.clone(), function_proto.clone());

    let boolean = stdlib::boolean_ctor::install(engine, root.clone(), function_proto.clone(), object_proto.clone());
    let number = stdlib::number_ctor::install(engine, root.clone(), function_proto.clone(), object_proto.clone());
    let array = stdlib::array_ctor::install(engine, root.clone(), function_proto.clone(), object_proto.clone());
    let string = stdlib::string_ctor::install(engine, root.clone(), function_proto.clone(), object_proto.clone(), array.prototype.clone());

    let protos = BoxingPrototypes {
        object: object_proto.clone(),
        boolean: boolean.prototype.clone(),
        number: number.prototype.clone(),
        string: string.prototype.clone(),
    };

    let object = stdlib::object_ctor::install(engine, root.clone(), function_proto.clone(), &protos, array.prototype.clone());
    let errors = stdlib::error_ctor::install(engine, root.clone(), function_proto.clone(), object_proto.clone());
    let math = stdlib::math_mod::install(engine, root.clone(), function_proto.clone(), object_proto.clone());
    let date = stdlib::date_ctor::install(engine, root.clone(), function_proto.clone(), object_proto.clone());
    let regexp = stdlib::regexp_ctor::install(engine, root.clone(), function_proto.clone(), object_proto.clone(), array.prototype.clone());
    let json = stdlib::json_mod::install(engine, root.clone(), function_proto.clone(), object_proto.clone(), array.prototype.clone());

    let throw_type_error_fn = build_throw_type_error(engine, root.clone(), function_proto.clone());

    let global_object = ObjectRef::new(Obj::new(ClassTag::Object, Some(object_proto.clone()), root.clone(), ObjectKind::Plain));
    stdlib::global_funcs::install(engine, root.clone(), function_proto.clone(), &global_object);
    install_eval(engine, root.clone(), function_proto.clone(), &global_object);
    install_function_ctor(engine, root.clone(), function_proto.clone(), &global_object);

    bind_constant(engine, &global_object, "undefined", Value::Undefined);
    bind_constant(engine, &global_object, "NaN", Value::from_num(f64::NAN));
    bind_constant(engine, &global_object, "Infinity", Value::from_num(f64::INFINITY));

    bind_global(engine, &global_object, "Object", Value::Object(object.constructor));
    bind_global(engine, &global_object, "Array", Value::Object(array.constructor.clone()));
    bind_global(engine, &global_object, "Boolean", Value::Object(boolean.constructor));
    bind_global(engine, &global_object, "Number", Value::Object(number.constructor));
    bind_global(engine, &global_object, "String", Value::Object(string.constructor));
    bind_global(engine, &global_object, "Math", Value::Object(math));
    bind_global(engine, &global_object, "Date", Value::Object(date.constructor));
    bind_global(engine, &global_object, "RegExp", Value::Object(regexp.constructor));
    bind_global(engine, &global_object, "JSON", Value::Object(json));
    for binding in &errors.by_kind {
        bind_global(engine, &global_object, binding.kind.name(), Value::Object(binding.constructor.clone()));
    }

    let global_env = crate::env::LexEnv::new_obj_env(global_object.clone(), None, true);

    engine.protos = protos;
    engine.function_proto = function_proto;
    engine.array_proto = array.prototype;
    engine.throw_type_error_fn = throw_type_error_fn;
    engine.global_object = global_object;
    engine.global_env = global_env;
    for binding in &errors.by_kind {
        engine.error_protos.set(binding.kind, binding.prototype.clone());
    }
}

/// The shared `%ThrowTypeError%` function (ES5 §13.2.3): installed as the
/// getter/setter pair on a strict function's poisoned `arguments`/`caller`,
/// see `eval::install_poison_pair`. Itself unreachable from global code.
fn build_throw_type_error(inv: &mut dyn Invoker, root: crate::shape::Shape, function_proto: ObjectRef) -> ObjectRef {
    let func: NativeFn = Rc::new(|inv, _this, _args| Err(inv.throw(ErrorKind::TypeError, "'caller', 'callee', and 'arguments' properties may not be accessed on strict mode functions")));
    ObjectRef::new(Obj::new(
        ClassTag::Function,
        Some(function_proto),
        root,
        ObjectKind::Function(FunctionData {
            kind: FunctionKind::Native { func, construct: None },
            strict: true,
            arity: 0,
        }),
    ))
}

/// `eval` (ES5 §15.1.2.1) needs `Interp::parse_program`, not just the plain
/// `Invoker` every other builtin is installed through, so it's bound here
/// via the `as_any_mut` downcast hook rather than through `stdlib::*`.
fn install_eval(inv: &mut dyn Invoker, root: crate::shape::Shape, function_proto: ObjectRef, global_object: &ObjectRef) {
    let func: NativeFn = Rc::new(|inv, _this, args| {
        let engine = inv
            .as_any_mut()
            .downcast_mut::<Engine>()
            .expect("eval requires a concrete Engine");
        crate::eval::eval_indirect(engine, args)
    });
    let method = crate::stdlib::support::native_function(inv, root, function_proto, "eval", 1, func);
    let key = PropKey::from_str_id(inv.intern("eval"));
    let _ = global_object.define_own_property(key, PropertyDescriptor::from_data(Value::Object(method), true, false, true), false, inv);
}

/// `new Function(...)` / `Function(...)` (ES5 §15.3.2.1): same downcast
/// need as `eval`, so it is bound directly rather than through
/// `stdlib::function_proto`, which only owns `Function.prototype`'s own
/// methods.
fn install_function_ctor(inv: &mut dyn Invoker, root: crate::shape::Shape, function_proto: ObjectRef, global_object: &ObjectRef) {
    let call_body: NativeFn = Rc::new(|inv, _this, args| {
        let engine = inv
            .as_any_mut()
            .downcast_mut::<Engine>()
            .expect("Function constructor requires a concrete Engine");
        crate::eval::make_function_from_source(engine, args).map(Value::Object)
    });
    let construct_body: NativeFn = Rc::new(|inv, _this, args| {
        let engine = inv
            .as_any_mut()
            .downcast_mut::<Engine>()
            .expect("Function constructor requires a concrete Engine");
        crate::eval::make_function_from_source(engine, args).map(Value::Object)
    });
    let ctor = crate::stdlib::support::native_constructor(inv, root, function_proto.clone(), "Function", 1, call_body, construct_body, function_proto);
    let key = PropKey::from_str_id(inv.intern("Function"));
    let _ = global_object.define_own_property(key, PropertyDescriptor::from_data(Value::Object(ctor), true, false, true), false, inv);
}

/// ES5 §15.1.1: `undefined`, `NaN`, `Infinity` are non-writable,
/// non-enumerable, non-configurable own properties of the global object.
fn bind_constant(inv: &mut dyn Invoker, global_object: &ObjectRef, name: &str, value: Value) {
    let key = PropKey::from_str_id(inv.intern(name));
    let _ = global_object.define_own_property(key, PropertyDescriptor::from_data(value, false, false, false), false, inv);
}

/// Every other built-in (`Object`, `Array`, `Math`, the `Error` family, ...)
/// is a regular, writable/configurable global property (ES5 §15's "each of
/// ... has the attributes {[[Writable]]: true, [[Enumerable]]: false,
/// [[Configurable]]: true}").
fn bind_global(inv: &mut dyn Invoker, global_object: &ObjectRef, name: &str, value: Value) {
    let key = PropKey::from_str_id(inv.intern(name));
    let _ = global_object.define_own_property(key, PropertyDescriptor::from_data(value, true, false, true), false, inv);
}
