//! `Error` and its six built-in subtypes (ES5 §15.11): `EvalError`,
//! `RangeError`, `ReferenceError`, `SyntaxError`, `TypeError`, `URIError`.
//! Each shares `Error.prototype.toString`'s algorithm but gets its own
//! `prototype` object and `name`, chained onto `Error.prototype`.

use std::rc::Rc;

use crate::error::ErrorKind;
use crate::object::{ClassTag, Invoker, NativeFn, Obj, ObjectKind, ObjectRef};
use crate::ops::to_string;
use crate::propkey::PropKey;
use crate::shape::Shape;
use crate::stdlib::support::{define_method, define_value, native_constructor, this_object};
use crate::value::Value;

pub struct ErrorKindBinding {
    pub kind: ErrorKind,
    pub prototype: ObjectRef,
    pub constructor: ObjectRef,
}

pub struct ErrorBindings {
    pub by_kind: Vec<ErrorKindBinding>,
}

impl ErrorBindings {
    pub fn get(&self, kind: ErrorKind) -> &ErrorKindBinding {
        self.by_kind.iter().find(|b| b.kind == kind).expect("every ErrorKind installed")
    }
}

const KINDS: [ErrorKind; 7] = [
    ErrorKind::Error,
    ErrorKind::EvalError,
    ErrorKind::RangeError,
    ErrorKind::ReferenceError,
    ErrorKind::SyntaxError,
    ErrorKind::TypeError,
    ErrorKind::UriError,
];

pub fn install(inv: &mut dyn Invoker, root: Shape, function_proto: ObjectRef, object_proto: ObjectRef) -> ErrorBindings {
    let error_proto = ObjectRef::new(Obj::new(ClassTag::Error, Some(object_proto.clone()), root.clone(), ObjectKind::Error(ErrorKind::Error)));
    define_value(inv, &error_proto, "name", Value::String(inv.intern("Error")));
    define_value(inv, &error_proto, "message", Value::String(inv.intern("")));

    define_method(inv, &error_proto, root.clone(), function_proto.clone(), "toString", 0, Rc::new(|inv, this, _args| {
        let obj = this_object(&this, inv)?;
        let name_key = PropKey::from_str_id(inv.intern("name"));
        let name = match obj.get(name_key, inv)? {
            Value::Undefined => "Error".to_string(),
            v => to_string(&v, inv)?,
        };
        let message_key = PropKey::from_str_id(inv.intern("message"));
        let message = match obj.get(message_key, inv)? {
            Value::Undefined => String::new(),
            v => to_string(&v, inv)?,
        };
        let out = if message.is_empty() { name } else { format!("{name}: {message}") };
        Ok(Value::String(inv.intern(&out)))
    }));

    let mut by_kind = Vec::with_capacity(KINDS.len());

    for &kind in KINDS.iter() {
        let (proto, ctor) = if kind == ErrorKind::Error {
            (error_proto.clone(), build_constructor(inv, root.clone(), function_proto.clone(), kind, error_proto.clone()))
        } else {
            let sub_proto = ObjectRef::new(Obj::new(ClassTag::Error, Some(error_proto.clone()), root.clone(), ObjectKind::Error(kind)));
            define_value(inv, &sub_proto, "name", Value::String(inv.intern(kind.name())));
            define_value(inv, &sub_proto, "message", Value::String(inv.intern("")));
            let ctor = build_constructor(inv, root.clone(), function_proto.clone(), kind, sub_proto.clone());
            (sub_proto, ctor)
        };
        by_kind.push(ErrorKindBinding { kind, prototype: proto, constructor: ctor });
    }

    ErrorBindings { by_kind }
}

fn build_constructor(inv: &mut dyn Invoker, root: Shape, function_proto: ObjectRef, kind: ErrorKind, prototype: ObjectRef) -> ObjectRef {
    let call_root = root.clone();
    let call_proto = prototype.clone();
    let call_body: NativeFn = Rc::new(move |inv, _this, args| build_instance(kind, args, call_root.clone(), call_proto.clone(), inv));
    let construct_root = root.clone();
    let construct_proto = prototype.clone();
    let construct_body: NativeFn = Rc::new(move |inv, _this, args| build_instance(kind, args, construct_root.clone(), construct_proto.clone(), inv));
    native_constructor(inv, root, function_proto, kind.name(), 1, call_body, construct_body, prototype)
}

fn build_instance(kind: ErrorKind, args: &[Value], root: Shape, prototype: ObjectRef, inv: &mut dyn Invoker) -> crate::error::EsResult<Value> {
    let obj = ObjectRef::new(Obj::new(ClassTag::Error, Some(prototype), root, ObjectKind::Error(kind)));
    if let Some(v) = args.first() {
        if !v.is_undefined() {
            let message = to_string(v, inv)?;
            define_value(inv, &obj, "message", Value::String(inv.intern(&message)));
        }
    }
    Ok(Value::Object(obj))
}
