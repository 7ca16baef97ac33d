//! `Array` constructor and `Array.prototype` (ES5 §15.4)

use std::rc::Rc;

use crate::error::{ErrorKind, EsResult};
use crate::object::{ArrayData, ClassTag, Invoker, NativeFn, Obj, ObjectKind, ObjectRef};
use crate::ops::{call_value, strict_equals, to_number, to_string, to_uint32};
use crate::propkey::PropKey;
use crate::shape::Shape;
use crate::stdlib::support::{arg, define_method, this_object};
use crate::value::Value;

pub struct ArrayBindings {
    pub prototype: ObjectRef,
    pub constructor: ObjectRef,
}

fn new_array(root: Shape, array_proto: ObjectRef, inv: &mut dyn Invoker) -> ObjectRef {
    let length_key = PropKey::from_str_id(inv.intern("length"));
    let array = ObjectRef::new(Obj::new(ClassTag::Array, Some(array_proto), root, ObjectKind::Array(ArrayData::new(length_key))));
    let _ = array.define_own_property(
        length_key,
        crate::object::PropertyDescriptor::from_data(Value::from_u32(0), true, false, false),
        false,
        inv,
    );
    array
}

fn length_of(obj: &ObjectRef, inv: &mut dyn Invoker) -> EsResult<u32> {
    let length_key = PropKey::from_str_id(inv.intern("length"));
    to_uint32(&obj.get(length_key, inv)?, inv)
}

fn set_length(obj: &ObjectRef, len: u32, inv: &mut dyn Invoker) -> EsResult<()> {
    let length_key = PropKey::from_str_id(inv.intern("length"));
    obj.put(length_key, Value::from_u32(len), true, inv)
}

fn push_element(obj: &ObjectRef, index: u32, value: Value, inv: &mut dyn Invoker) -> EsResult<()> {
    obj.define_own_property(
        PropKey::from_u32(index),
        crate::object::PropertyDescriptor::from_data(value, true, true, true),
        false,
        inv,
    )?;
    Ok(())
}

pub fn install(inv: &mut dyn Invoker, root: Shape, function_proto: ObjectRef, object_proto: ObjectRef) -> ArrayBindings {
    let array_proto = ObjectRef::new(Obj::new(ClassTag::Array, Some(object_proto), root.clone(), ObjectKind::Array(ArrayData::new(PropKey::from_u32(0)))));
    {
        let length_key = PropKey::from_str_id(inv.intern("length"));
        let _ = array_proto.define_own_property(
            length_key,
            crate::object::PropertyDescriptor::from_data(Value::from_u32(0), true, false, false),
            false,
            inv,
        );
        if let ObjectKind::Array(data) = &mut array_proto.borrow_mut().kind {
            data.length_key = length_key;
        }
    }

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "toString", 0, Rc::new(|inv, this, _args| {
        let obj = this_object(&this, inv)?;
        join_with(&obj, ",", inv)
    }));

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "join", 1, Rc::new(|inv, this, args| {
        let obj = this_object(&this, inv)?;
        let sep = match args.first() {
            None | Some(Value::Undefined) => ",".to_string(),
            Some(v) => to_string(v, inv)?,
        };
        join_with(&obj, &sep, inv)
    }));

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "push", 1, Rc::new(|inv, this, args| {
        let obj = this_object(&this, inv)?;
        let mut len = length_of(&obj, inv)?;
        for v in args {
            push_element(&obj, len, v.clone(), inv)?;
            len += 1;
        }
        set_length(&obj, len, inv)?;
        Ok(Value::from_u32(len))
    }));

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "pop", 0, Rc::new(|inv, this, _args| {
        let obj = this_object(&this, inv)?;
        let len = length_of(&obj, inv)?;
        if len == 0 {
            set_length(&obj, 0, inv)?;
            return Ok(Value::Undefined);
        }
        let key = PropKey::from_u32(len - 1);
        let value = obj.get(key, inv)?;
        obj.delete(key, true, inv)?;
        set_length(&obj, len - 1, inv)?;
        Ok(value)
    }));

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "shift", 0, Rc::new(|inv, this, _args| {
        let obj = this_object(&this, inv)?;
        let len = length_of(&obj, inv)?;
        if len == 0 {
            set_length(&obj, 0, inv)?;
            return Ok(Value::Undefined);
        }
        let first = obj.get(PropKey::from_u32(0), inv)?;
        for i in 1..len {
            let v = obj.get(PropKey::from_u32(i), inv)?;
            obj.put(PropKey::from_u32(i - 1), v, true, inv)?;
        }
        obj.delete(PropKey::from_u32(len - 1), true, inv)?;
        set_length(&obj, len - 1, inv)?;
        Ok(first)
    }));

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "unshift", 1, Rc::new(|inv, this, args| {
        let obj = this_object(&this, inv)?;
        let len = length_of(&obj, inv)?;
        let shift = args.len() as u32;
        let mut i = len;
        while i > 0 {
            let v = obj.get(PropKey::from_u32(i - 1), inv)?;
            obj.put(PropKey::from_u32(i - 1 + shift), v, true, inv)?;
            i -= 1;
        }
        for (i, v) in args.iter().enumerate() {
            obj.put(PropKey::from_u32(i as u32), v.clone(), true, inv)?;
        }
        set_length(&obj, len + shift, inv)?;
        Ok(Value::from_u32(len + shift))
    }));

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "reverse", 0, Rc::new(|inv, this, _args| {
        let obj = this_object(&this, inv)?;
        let len = length_of(&obj, inv)?;
        let mut lo = 0u32;
        let mut hi = len.saturating_sub(1);
        while lo < hi {
            let a = obj.get(PropKey::from_u32(lo), inv)?;
            let b = obj.get(PropKey::from_u32(hi), inv)?;
            obj.put(PropKey::from_u32(lo), b, true, inv)?;
            obj.put(PropKey::from_u32(hi), a, true, inv)?;
            lo += 1;
            hi -= 1;
        }
        Ok(Value::Object(obj))
    }));

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "concat", 1, {
        let concat_root = root.clone();
        let concat_proto = array_proto.clone();
        Rc::new(move |inv, this, args| {
            let obj = this_object(&this, inv)?;
            let out = new_array(concat_root.clone(), concat_proto.clone(), inv);
            let mut idx = 0u32;
            let mut append_one = |item: &Value, inv: &mut dyn Invoker, idx: &mut u32| -> EsResult<()> {
                if let Value::Object(o) = item {
                    if o.borrow().class == ClassTag::Array {
                        let l = length_of(o, inv)?;
                        for i in 0..l {
                            let v = o.get(PropKey::from_u32(i), inv)?;
                            push_element(&out, *idx, v, inv)?;
                            *idx += 1;
                        }
                        return Ok(());
                    }
                }
                push_element(&out, *idx, item.clone(), inv)?;
                *idx += 1;
                Ok(())
            };
            append_one(&Value::Object(obj), inv, &mut idx)?;
            for a in args {
                append_one(a, inv, &mut idx)?;
            }
            set_length(&out, idx, inv)?;
            Ok(Value::Object(out))
        })
    });

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "slice", 2, {
        let slice_root = root.clone();
        let slice_proto = array_proto.clone();
        Rc::new(move |inv, this, args| {
            let obj = this_object(&this, inv)?;
            let len = length_of(&obj, inv)? as i64;
            let start = normalize_index(args.first(), 0, len, inv)?;
            let end = normalize_index(args.get(1), len, len, inv)?;
            let out = new_array(slice_root.clone(), slice_proto.clone(), inv);
            let mut idx = 0u32;
            let mut i = start;
            while i < end {
                let v = obj.get(PropKey::from_u32(i as u32), inv)?;
                push_element(&out, idx, v, inv)?;
                idx += 1;
                i += 1;
            }
            set_length(&out, idx, inv)?;
            Ok(Value::Object(out))
        })
    });

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "splice", 2, {
        let splice_root = root.clone();
        let splice_proto = array_proto.clone();
        Rc::new(move |inv, this, args| {
            let obj = this_object(&this, inv)?;
            let len = length_of(&obj, inv)? as i64;
            let start = normalize_index(args.first(), 0, len, inv)?;
            let delete_count = match args.get(1) {
                None => len - start,
                Some(v) => (to_number(v, inv)? as i64).clamp(0, len - start),
            };
            let removed = new_array(splice_root.clone(), splice_proto.clone(), inv);
            for i in 0..delete_count {
                let v = obj.get(PropKey::from_u32((start + i) as u32), inv)?;
                push_element(&removed, i as u32, v, inv)?;
            }
            set_length(&removed, delete_count as u32, inv)?;

            let items: Vec<Value> = if args.len() > 2 { args[2..].to_vec() } else { Vec::new() };
            let new_len = len - delete_count + items.len() as i64;
            if items.len() as i64 > delete_count {
                let mut i = len - 1;
                while i >= start + delete_count {
                    let v = obj.get(PropKey::from_u32(i as u32), inv)?;
                    obj.put(PropKey::from_u32((i + items.len() as i64 - delete_count) as u32), v, true, inv)?;
                    i -= 1;
                }
            } else if (items.len() as i64) < delete_count {
                let mut i = start + delete_count;
                while i < len {
                    let v = obj.get(PropKey::from_u32(i as u32), inv)?;
                    obj.put(PropKey::from_u32((i - delete_count + items.len() as i64) as u32), v, true, inv)?;
                    i += 1;
                }
                for i in new_len..len {
                    obj.delete(PropKey::from_u32(i as u32), true, inv)?;
                }
            }
            for (k, item) in items.iter().enumerate() {
                obj.put(PropKey::from_u32((start + k as i64) as u32), item.clone(), true, inv)?;
            }
            set_length(&obj, new_len as u32, inv)?;
            Ok(Value::Object(removed))
        })
    });

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "indexOf", 1, Rc::new(|inv, this, args| {
        let obj = this_object(&this, inv)?;
        let len = length_of(&obj, inv)?;
        let target = arg(args, 0);
        let start = match args.get(1) {
            None => 0,
            Some(v) => {
                let n = to_number(v, inv)? as i64;
                if n < 0 {
                    (len as i64 + n).max(0) as u32
                } else {
                    n as u32
                }
            }
        };
        for i in start..len {
            let v = obj.get(PropKey::from_u32(i), inv)?;
            if strict_equals(&v, &target) {
                return Ok(Value::from_i32(i as i32));
            }
        }
        Ok(Value::from_i32(-1))
    }));

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "lastIndexOf", 1, Rc::new(|inv, this, args| {
        let obj = this_object(&this, inv)?;
        let len = length_of(&obj, inv)?;
        let target = arg(args, 0);
        if len == 0 {
            return Ok(Value::from_i32(-1));
        }
        let mut i = len - 1;
        loop {
            let v = obj.get(PropKey::from_u32(i), inv)?;
            if strict_equals(&v, &target) {
                return Ok(Value::from_i32(i as i32));
            }
            if i == 0 {
                break;
            }
            i -= 1;
        }
        Ok(Value::from_i32(-1))
    }));

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "forEach", 1, Rc::new(|inv, this, args| {
        let obj = this_object(&this, inv)?;
        let callback = arg(args, 0);
        let this_arg = arg(args, 1);
        let len = length_of(&obj, inv)?;
        for i in 0..len {
            let key = PropKey::from_u32(i);
            if obj.get_own_property(key).is_none() {
                continue;
            }
            let v = obj.get(key, inv)?;
            call_value(&callback, this_arg.clone(), &[v, Value::from_u32(i), Value::Object(obj.clone())], inv)?;
        }
        Ok(Value::Undefined)
    }));

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "map", 1, {
        let map_root = root.clone();
        let map_proto = array_proto.clone();
        Rc::new(move |inv, this, args| {
            let obj = this_object(&this, inv)?;
            let callback = arg(args, 0);
            let this_arg = arg(args, 1);
            let len = length_of(&obj, inv)?;
            let out = new_array(map_root.clone(), map_proto.clone(), inv);
            for i in 0..len {
                let key = PropKey::from_u32(i);
                if obj.get_own_property(key).is_none() {
                    continue;
                }
                let v = obj.get(key, inv)?;
                let mapped = call_value(&callback, this_arg.clone(), &[v, Value::from_u32(i), Value::Object(obj.clone())], inv)?;
                push_element(&out, i, mapped, inv)?;
            }
            set_length(&out, len, inv)?;
            Ok(Value::Object(out))
        })
    });

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "filter", 1, {
        let filter_root = root.clone();
        let filter_proto = array_proto.clone();
        Rc::new(move |inv, this, args| {
            let obj = this_object(&this, inv)?;
            let callback = arg(args, 0);
            let this_arg = arg(args, 1);
            let len = length_of(&obj, inv)?;
            let out = new_array(filter_root.clone(), filter_proto.clone(), inv);
            let mut idx = 0u32;
            for i in 0..len {
                let key = PropKey::from_u32(i);
                if obj.get_own_property(key).is_none() {
                    continue;
                }
                let v = obj.get(key, inv)?;
                let keep = call_value(&callback, this_arg.clone(), &[v.clone(), Value::from_u32(i), Value::Object(obj.clone())], inv)?;
                if crate::ops::to_boolean(&keep, inv) {
                    push_element(&out, idx, v, inv)?;
                    idx += 1;
                }
            }
            set_length(&out, idx, inv)?;
            Ok(Value::Object(out))
        })
    });

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "some", 1, Rc::new(|inv, this, args| {
        let obj = this_object(&this, inv)?;
        let callback = arg(args, 0);
        let this_arg = arg(args, 1);
        let len = length_of(&obj, inv)?;
        for i in 0..len {
            let key = PropKey::from_u32(i);
            if obj.get_own_property(key).is_none() {
                continue;
            }
            let v = obj.get(key, inv)?;
            let r = call_value(&callback, this_arg.clone(), &[v, Value::from_u32(i), Value::Object(obj.clone())], inv)?;
            if crate::ops::to_boolean(&r, inv) {
                return Ok(Value::from_bool(true));
            }
        }
        Ok(Value::from_bool(false))
    }));

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "every", 1, Rc::new(|inv, this, args| {
        let obj = this_object(&this, inv)?;
        let callback = arg(args, 0);
        let this_arg = arg(args, 1);
        let len = length_of(&obj, inv)?;
        for i in 0..len {
            let key = PropKey::from_u32(i);
            if obj.get_own_property(key).is_none() {
                continue;
            }
            let v = obj.get(key, inv)?;
            let r = call_value(&callback, this_arg.clone(), &[v, Value::from_u32(i), Value::Object(obj.clone())], inv)?;
            if !crate::ops::to_boolean(&r, inv) {
                return Ok(Value::from_bool(false));
            }
        }
        Ok(Value::from_bool(true))
    }));

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "reduce", 1, Rc::new(|inv, this, args| {
        let obj = this_object(&this, inv)?;
        let callback = arg(args, 0);
        let len = length_of(&obj, inv)?;
        let mut i = 0u32;
        let mut acc = match args.get(1) {
            Some(v) => v.clone(),
            None => {
                loop {
                    if i >= len {
                        return Err(inv.throw(ErrorKind::TypeError, "Reduce of empty array with no initial value"));
                    }
                    let key = PropKey::from_u32(i);
                    if obj.get_own_property(key).is_some() {
                        let v = obj.get(key, inv)?;
                        i += 1;
                        break v;
                    }
                    i += 1;
                }
            }
        };
        while i < len {
            let key = PropKey::from_u32(i);
            if obj.get_own_property(key).is_some() {
                let v = obj.get(key, inv)?;
                acc = call_value(&callback, Value::Undefined, &[acc, v, Value::from_u32(i), Value::Object(obj.clone())], inv)?;
            }
            i += 1;
        }
        Ok(acc)
    }));

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "reduceRight", 1, Rc::new(|inv, this, args| {
        let obj = this_object(&this, inv)?;
        let callback = arg(args, 0);
        let len = length_of(&obj, inv)?;
        if len == 0 && args.len() < 2 {
            return Err(inv.throw(ErrorKind::TypeError, "Reduce of empty array with no initial value"));
        }
        let mut i = len as i64 - 1;
        let mut acc = match args.get(1) {
            Some(v) => v.clone(),
            None => {
                loop {
                    if i < 0 {
                        return Err(inv.throw(ErrorKind::TypeError, "Reduce of empty array with no initial value"));
                    }
                    let key = PropKey::from_u32(i as u32);
                    if obj.get_own_property(key).is_some() {
                        let v = obj.get(key, inv)?;
                        i -= 1;
                        break v;
                    }
                    i -= 1;
                }
            }
        };
        while i >= 0 {
            let key = PropKey::from_u32(i as u32);
            if obj.get_own_property(key).is_some() {
                let v = obj.get(key, inv)?;
                acc = call_value(&callback, Value::Undefined, &[acc, v, Value::from_u32(i as u32), Value::Object(obj.clone())], inv)?;
            }
            i -= 1;
        }
        Ok(acc)
    }));

    define_method(inv, &array_proto, root.clone(), function_proto.clone(), "sort", 1, Rc::new(|inv, this, args| {
        let obj = this_object(&this, inv)?;
        let len = length_of(&obj, inv)?;
        let comparator = args.first().cloned().filter(|v| v.is_callable());
        let mut items: Vec<Value> = Vec::with_capacity(len as usize);
        for i in 0..len {
            items.push(obj.get(PropKey::from_u32(i), inv)?);
        }
        // A simple insertion sort: ES5 doesn't mandate an algorithm, only
        // that `comparator` decides relative order (§15.4.4.11).
        let mut err = None;
        for i in 1..items.len() {
            let mut j = i;
            while j > 0 {
                let less = compare_for_sort(&items[j], &items[j - 1], &comparator, inv, &mut err);
                if err.is_some() {
                    break;
                }
                if less {
                    items.swap(j, j - 1);
                    j -= 1;
                } else {
                    break;
                }
            }
            if err.is_some() {
                break;
            }
        }
        if let Some(e) = err {
            return Err(e);
        }
        for (i, v) in items.into_iter().enumerate() {
            obj.put(PropKey::from_u32(i as u32), v, true, inv)?;
        }
        Ok(Value::Object(obj))
    }));

    let ctor_root = root.clone();
    let ctor_proto = array_proto.clone();
    let call_body: NativeFn = Rc::new(move |inv, _this, args| build_from_args(args, ctor_root.clone(), ctor_proto.clone(), inv));
    let construct_root = root.clone();
    let construct_proto = array_proto.clone();
    let construct_body: NativeFn = Rc::new(move |inv, _this, args| build_from_args(args, construct_root.clone(), construct_proto.clone(), inv));

    let constructor = crate::stdlib::support::native_constructor(inv, root.clone(), function_proto.clone(), "Array", 1, call_body, construct_body, array_proto.clone());

    define_method(inv, &constructor, root, function_proto, "isArray", 1, Rc::new(|_inv, _this, args| {
        Ok(Value::from_bool(matches!(args.first(), Some(Value::Object(o)) if o.borrow().class == ClassTag::Array)))
    }));

    ArrayBindings { prototype: array_proto, constructor }
}

fn build_from_args(args: &[Value], root: Shape, array_proto: ObjectRef, inv: &mut dyn Invoker) -> EsResult<Value> {
    if args.len() == 1 {
        if let Value::Number(n) = &args[0] {
            if *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64 {
                let out = new_array(root, array_proto, inv);
                set_length(&out, *n as u32, inv)?;
                return Ok(Value::Object(out));
            }
            return Err(inv.throw(ErrorKind::RangeError, "Invalid array length"));
        }
    }
    let out = new_array(root, array_proto, inv);
    for (i, v) in args.iter().enumerate() {
        push_element(&out, i as u32, v.clone(), inv)?;
    }
    set_length(&out, args.len() as u32, inv)?;
    Ok(Value::Object(out))
}

fn join_with(obj: &ObjectRef, sep: &str, inv: &mut dyn Invoker) -> EsResult<Value> {
    let len = length_of(obj, inv)?;
    let mut out = String::new();
    for i in 0..len {
        if i > 0 {
            out.push_str(sep);
        }
        let v = obj.get(PropKey::from_u32(i), inv)?;
        if !v.is_nullish() {
            out.push_str(&to_string(&v, inv)?);
        }
    }
    Ok(Value::String(inv.intern(&out)))
}

fn normalize_index(v: Option<&Value>, default: i64, len: i64, inv: &mut dyn Invoker) -> EsResult<i64> {
    match v {
        None | Some(Value::Undefined) => Ok(default),
        Some(v) => {
            let n = to_number(v, inv)? as i64;
            Ok(if n < 0 { (len + n).max(0) } else { n.min(len) })
        }
    }
}

fn compare_for_sort(a: &Value, b: &Value, comparator: &Option<Value>, inv: &mut dyn Invoker, err: &mut Option<Value>) -> bool {
    if a.is_undefined() {
        return false;
    }
    if b.is_undefined() {
        return true;
    }
    match comparator {
        Some(cmp) => match call_value(cmp, Value::Undefined, &[a.clone(), b.clone()], inv) {
            Ok(r) => match to_number(&r, inv) {
                Ok(n) => n < 0.0,
                Err(e) => {
                    *err = Some(e);
                    false
                }
            },
            Err(e) => {
                *err = Some(e);
                false
            }
        },
        None => match (to_string(a, inv), to_string(b, inv)) {
            (Ok(sa), Ok(sb)) => sa < sb,
            (Err(e), _) | (_, Err(e)) => {
                *err = Some(e);
                false
            }
        },
    }
}
