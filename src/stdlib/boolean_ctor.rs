//! `Boolean` constructor and `Boolean.prototype` (ES5 §15.6)

use std::rc::Rc;

use crate::error::ErrorKind;
use crate::object::{ClassTag, Invoker, NativeFn, Obj, ObjectKind, ObjectRef};
use crate::ops::to_boolean;
use crate::shape::Shape;
use crate::stdlib::support::{arg, define_method, native_constructor};
use crate::value::Value;

pub struct BooleanBindings {
    pub prototype: ObjectRef,
    pub constructor: ObjectRef,
}

fn boolean_value(this: &Value, inv: &mut dyn Invoker) -> Result<bool, Value> {
    match this {
        Value::Object(o) => match &o.borrow().kind {
            ObjectKind::Boolean(b) => Ok(*b),
            _ => Err(inv.throw(ErrorKind::TypeError, "Boolean method called on incompatible receiver")),
        },
        _ => Err(inv.throw(ErrorKind::TypeError, "Boolean method called on incompatible receiver")),
    }
}

pub fn install(inv: &mut dyn Invoker, root: Shape, function_proto: ObjectRef, object_proto: ObjectRef) -> BooleanBindings {
    let boolean_proto = ObjectRef::new(Obj::new(ClassTag::Boolean, Some(object_proto), root.clone(), ObjectKind::Boolean(false)));

    define_method(inv, &boolean_proto, root.clone(), function_proto.clone(), "toString", 0, Rc::new(|inv, this, _args| {
        let b = boolean_value(&this, inv)?;
        Ok(Value::String(inv.intern(if b { "true" } else { "false" })))
    }));

    define_method(inv, &boolean_proto, root.clone(), function_proto.clone(), "valueOf", 0, Rc::new(|inv, this, _args| {
        boolean_value(&this, inv).map(Value::from_bool)
    }));

    let call_body: NativeFn = Rc::new(|inv, _this, args| Ok(Value::from_bool(to_boolean(&arg(args, 0), inv))));
    let construct_root = root.clone();
    let construct_proto = boolean_proto.clone();
    let construct_body: NativeFn = Rc::new(move |inv, _this, args| {
        let b = to_boolean(&arg(args, 0), inv);
        Ok(Value::Object(ObjectRef::new(Obj::new(ClassTag::Boolean, Some(construct_proto.clone()), construct_root.clone(), ObjectKind::Boolean(b)))))
    });

    let constructor = native_constructor(inv, root, function_proto, "Boolean", 1, call_body, construct_body, boolean_proto.clone());

    BooleanBindings { prototype: boolean_proto, constructor }
}
