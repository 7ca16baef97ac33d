//! `Object` constructor and `Object.prototype` (ES5 §15.2)

use std::rc::Rc;

use crate::error::{ErrorKind, EsResult};
use crate::object::{ClassTag, Invoker, Obj, ObjectKind, ObjectRef, Property, PropertyDescriptor, PropertyKind};
use crate::ops::{to_boolean, to_object, to_property_key, BoxingPrototypes};
use crate::propkey::PropKey;
use crate::shape::Shape;
use crate::stdlib::support::{arg, define_method, define_value, native_constructor, own_keys, this_object};
use crate::value::Value;

pub struct ObjectBindings {
    pub prototype: ObjectRef,
    pub constructor: ObjectRef,
}

/// ES5 §8.10.5 "ToPropertyDescriptor": any of the six fields may be absent.
fn to_property_descriptor(desc_obj: &ObjectRef, inv: &mut dyn Invoker) -> EsResult<PropertyDescriptor> {
    let mut desc = PropertyDescriptor::default();
    let value_key = PropKey::from_str_id(inv.intern("value"));
    if desc_obj.has_property(value_key) {
        desc.value = Some(desc_obj.get(value_key, inv)?);
    }
    let writable_key = PropKey::from_str_id(inv.intern("writable"));
    if desc_obj.has_property(writable_key) {
        let v = desc_obj.get(writable_key, inv)?;
        desc.writable = Some(to_boolean(&v, inv));
    }
    let get_key = PropKey::from_str_id(inv.intern("get"));
    if desc_obj.has_property(get_key) {
        desc.get = Some(desc_obj.get(get_key, inv)?);
    }
    let set_key = PropKey::from_str_id(inv.intern("set"));
    if desc_obj.has_property(set_key) {
        desc.set = Some(desc_obj.get(set_key, inv)?);
    }
    let enumerable_key = PropKey::from_str_id(inv.intern("enumerable"));
    if desc_obj.has_property(enumerable_key) {
        let v = desc_obj.get(enumerable_key, inv)?;
        desc.enumerable = Some(to_boolean(&v, inv));
    }
    let configurable_key = PropKey::from_str_id(inv.intern("configurable"));
    if desc_obj.has_property(configurable_key) {
        let v = desc_obj.get(configurable_key, inv)?;
        desc.configurable = Some(to_boolean(&v, inv));
    }
    Ok(desc)
}

/// ES5 §8.10.4 "FromPropertyDescriptor", for `getOwnPropertyDescriptor`.
fn from_property(prop: &Property, object_proto: ObjectRef, root: Shape, inv: &mut dyn Invoker) -> ObjectRef {
    let out = ObjectRef::new(Obj::new(ClassTag::Object, Some(object_proto), root, ObjectKind::Plain));
    match &prop.kind {
        PropertyKind::Data { value, writable } => {
            define_value(inv, &out, "value", value.clone());
            define_value(inv, &out, "writable", Value::from_bool(*writable));
        }
        PropertyKind::Accessor { get, set } => {
            let get_v = get.clone().map(Value::Object).unwrap_or(Value::Undefined);
            let set_v = set.clone().map(Value::Object).unwrap_or(Value::Undefined);
            define_value(inv, &out, "get", get_v);
            define_value(inv, &out, "set", set_v);
        }
    }
    define_value(inv, &out, "enumerable", Value::from_bool(prop.enumerable));
    define_value(inv, &out, "configurable", Value::from_bool(prop.configurable));
    out
}

pub fn install(inv: &mut dyn Invoker, root: Shape, function_proto: ObjectRef, protos: &BoxingPrototypes, array_proto: ObjectRef) -> ObjectBindings {
    let object_proto = protos.object.clone();

    define_method(inv, &object_proto, root.clone(), function_proto.clone(), "toString", 0, Rc::new(|inv, this, _args| {
        let class = match &this {
            Value::Object(o) => o.borrow().class.name(),
            Value::Undefined | Value::Nothing => "Undefined",
            Value::Null => "Null",
            _ => "Object",
        };
        Ok(Value::String(inv.intern(&format!("[object {class}]"))))
    }));

    define_method(inv, &object_proto, root.clone(), function_proto.clone(), "toLocaleString", 0, Rc::new(|inv, this, _args| {
        let obj = this_object(&this, inv)?;
        let to_string_key = PropKey::from_str_id(inv.intern("toString"));
        let method = obj.get(to_string_key, inv)?;
        crate::ops::call_value(&method, this, &[], inv)
    }));

    define_method(inv, &object_proto, root.clone(), function_proto.clone(), "valueOf", 0, Rc::new(|_inv, this, _args| Ok(this)));

    define_method(inv, &object_proto, root.clone(), function_proto.clone(), "hasOwnProperty", 1, Rc::new(|inv, this, args| {
        let obj = this_object(&this, inv)?;
        let key = to_property_key(&arg(args, 0), inv)?;
        Ok(Value::from_bool(obj.get_own_property(key).is_some()))
    }));

    define_method(inv, &object_proto, root.clone(), function_proto.clone(), "isPrototypeOf", 1, Rc::new(|_inv, this, args| {
        let Value::Object(target) = &this else { return Ok(Value::from_bool(false)) };
        let Value::Object(mut candidate) = arg(args, 0) else { return Ok(Value::from_bool(false)) };
        loop {
            let next = candidate.borrow().prototype.clone();
            match next {
                Some(p) => {
                    if p.ptr_eq(target) {
                        return Ok(Value::from_bool(true));
                    }
                    candidate = p;
                }
                None => return Ok(Value::from_bool(false)),
            }
        }
    }));

    define_method(inv, &object_proto, root.clone(), function_proto.clone(), "propertyIsEnumerable", 1, Rc::new(|inv, this, args| {
        let obj = this_object(&this, inv)?;
        let key = to_property_key(&arg(args, 0), inv)?;
        Ok(Value::from_bool(obj.get_own_property(key).map(|p| p.enumerable).unwrap_or(false)))
    }));

    let boxing = BoxingPrototypes {
        object: protos.object.clone(),
        boolean: protos.boolean.clone(),
        number: protos.number.clone(),
        string: protos.string.clone(),
    };
    let call_root = root.clone();
    let call_proto = object_proto.clone();
    let call_body: crate::object::NativeFn = Rc::new(move |inv, _this, args| match args.first() {
        Some(Value::Null) | Some(Value::Undefined) | None => Ok(Value::Object(ObjectRef::new(Obj::new(ClassTag::Object, Some(call_proto.clone()), call_root.clone(), ObjectKind::Plain)))),
        Some(other) => to_object(other, &boxing, call_root.clone(), inv).map(Value::Object),
    });
    let construct_root = root.clone();
    let construct_proto = object_proto.clone();
    let construct_body: crate::object::NativeFn = Rc::new(move |_inv, _this, args| match args.first() {
        Some(v) if v.is_object() => Ok(v.clone()),
        _ => Ok(Value::Object(ObjectRef::new(Obj::new(ClassTag::Object, Some(construct_proto.clone()), construct_root.clone(), ObjectKind::Plain)))),
    });

    let constructor = native_constructor(inv, root.clone(), function_proto.clone(), "Object", 1, call_body, construct_body, object_proto.clone());

    let keys_root = root.clone();
    let keys_array_proto = array_proto.clone();
    define_method(inv, &constructor, root.clone(), function_proto.clone(), "keys", 1, Rc::new(move |inv, _this, args| {
        let obj = this_object(&arg(args, 0), inv)?;
        let keys = own_keys(&obj, true);
        build_string_array(&keys, keys_root.clone(), keys_array_proto.clone(), inv)
    }));

    let names_root = root.clone();
    let names_array_proto = array_proto;
    define_method(inv, &constructor, root.clone(), function_proto.clone(), "getOwnPropertyNames", 1, Rc::new(move |inv, _this, args| {
        let obj = this_object(&arg(args, 0), inv)?;
        let keys = own_keys(&obj, false);
        build_string_array(&keys, names_root.clone(), names_array_proto.clone(), inv)
    }));

    define_method(inv, &constructor, root.clone(), function_proto.clone(), "getPrototypeOf", 1, Rc::new(|inv, _this, args| {
        let obj = this_object(&arg(args, 0), inv)?;
        Ok(obj.borrow().prototype.clone().map(Value::Object).unwrap_or(Value::Null))
    }));

    define_method(inv, &constructor, root.clone(), function_proto.clone(), "isExtensible", 1, Rc::new(|inv, _this, args| {
        let obj = this_object(&arg(args, 0), inv)?;
        Ok(Value::from_bool(obj.borrow().extensible))
    }));

    define_method(inv, &constructor, root.clone(), function_proto.clone(), "preventExtensions", 1, Rc::new(|inv, _this, args| {
        let obj = this_object(&arg(args, 0), inv)?;
        obj.borrow_mut().extensible = false;
        Ok(Value::Object(obj))
    }));

    let gopd_root = root.clone();
    let gopd_proto = object_proto.clone();
    define_method(inv, &constructor, root.clone(), function_proto.clone(), "getOwnPropertyDescriptor", 2, Rc::new(move |inv, _this, args| {
        let obj = this_object(&arg(args, 0), inv)?;
        let key = to_property_key(&arg(args, 1), inv)?;
        match obj.get_own_property(key) {
            Some(prop) => Ok(Value::Object(from_property(&prop, gopd_proto.clone(), gopd_root.clone(), inv))),
            None => Ok(Value::Undefined),
        }
    }));

    define_method(inv, &constructor, root.clone(), function_proto.clone(), "defineProperty", 3, Rc::new(|inv, _this, args| {
        let obj = this_object(&arg(args, 0), inv)?;
        let key = to_property_key(&arg(args, 1), inv)?;
        let desc_obj = this_object(&arg(args, 2), inv)?;
        let desc = to_property_descriptor(&desc_obj, inv)?;
        obj.define_own_property(key, desc, true, inv)?;
        Ok(Value::Object(obj))
    }));

    define_method(inv, &constructor, root.clone(), function_proto.clone(), "defineProperties", 2, Rc::new(|inv, _this, args| {
        let obj = this_object(&arg(args, 0), inv)?;
        let props_obj = this_object(&arg(args, 1), inv)?;
        for key in own_keys(&props_obj, true) {
            let desc_obj = this_object(&props_obj.get(key, inv)?, inv)?;
            let desc = to_property_descriptor(&desc_obj, inv)?;
            obj.define_own_property(key, desc, true, inv)?;
        }
        Ok(Value::Object(obj))
    }));

    let create_root = root;
    define_method(inv, &constructor, create_root.clone(), function_proto, "create", 2, Rc::new(move |inv, _this, args| {
        let proto = match arg(args, 0) {
            Value::Object(o) => Some(o),
            Value::Null => None,
            _ => return Err(inv.throw(ErrorKind::TypeError, "Object.create: prototype must be an object or null")),
        };
        let obj = ObjectRef::new(Obj::new(ClassTag::Object, proto, create_root.clone(), ObjectKind::Plain));
        if let Some(props_obj) = args.get(1) {
            let props_obj = this_object(props_obj, inv)?;
            for key in own_keys(&props_obj, true) {
                let desc_obj = this_object(&props_obj.get(key, inv)?, inv)?;
                let desc = to_property_descriptor(&desc_obj, inv)?;
                obj.define_own_property(key, desc, true, inv)?;
            }
        }
        Ok(Value::Object(obj))
    }));

    ObjectBindings { prototype: object_proto, constructor }
}

fn build_string_array(keys: &[PropKey], root: Shape, array_proto: ObjectRef, inv: &mut dyn Invoker) -> EsResult<Value> {
    let length_key = PropKey::from_str_id(inv.intern("length"));
    let array = ObjectRef::new(Obj::new(ClassTag::Array, Some(array_proto), root, ObjectKind::Array(crate::object::ArrayData::new(length_key))));
    for (i, key) in keys.iter().enumerate() {
        let s = key.to_string(|id| inv.lookup_str(id));
        let id = inv.intern(&s);
        array.define_own_property(PropKey::from_u32(i as u32), PropertyDescriptor::from_data(Value::String(id), true, true, true), false, inv)?;
    }
    array.define_own_property(length_key, PropertyDescriptor::from_data(Value::from_u32(keys.len() as u32), true, false, false), false, inv)?;
    Ok(Value::Object(array))
}
