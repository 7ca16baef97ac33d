//! `String` constructor and `String.prototype` (ES5 §15.5)
//!
//! Indexing operates over `char`s rather than UTF-16 code units; matches
//! this crate's general non-goal of exact UTF-16/surrogate-pair fidelity
//! (see `original_source/runtime/string.cc`'s ASCII-fast-path-only policy,
//! which this mirrors in spirit by never materializing surrogate pairs).

use std::rc::Rc;

use crate::error::ErrorKind;
use crate::object::{ArrayData, ClassTag, Invoker, NativeFn, Obj, ObjectKind, ObjectRef, PropertyDescriptor};
use crate::ops::{to_number, to_string};
use crate::propkey::PropKey;
use crate::shape::Shape;
use crate::stdlib::support::{arg, define_method, native_constructor};
use crate::value::Value;

pub struct StringBindings {
    pub prototype: ObjectRef,
    pub constructor: ObjectRef,
}

fn string_value(this: &Value, inv: &mut dyn Invoker) -> Result<String, Value> {
    match this {
        Value::String(id) => Ok(inv.lookup_str(*id)),
        Value::Object(o) => match &o.borrow().kind {
            ObjectKind::StringObj(id) => Ok(inv.lookup_str(*id)),
            _ => Err(inv.throw(ErrorKind::TypeError, "String method called on incompatible receiver")),
        },
        _ => Err(inv.throw(ErrorKind::TypeError, "String method called on incompatible receiver")),
    }
}

fn normalize(n: f64, len: i64) -> i64 {
    if n.is_nan() {
        0
    } else if n < 0.0 {
        (len + n as i64).max(0)
    } else {
        (n as i64).min(len)
    }
}

pub fn install(inv: &mut dyn Invoker, root: Shape, function_proto: ObjectRef, object_proto: ObjectRef, array_proto: ObjectRef) -> StringBindings {
    let empty_id = inv.intern("");
    let string_proto = ObjectRef::new(Obj::new(ClassTag::String, Some(object_proto), root.clone(), ObjectKind::StringObj(empty_id)));

    define_method(inv, &string_proto, root.clone(), function_proto.clone(), "toString", 0, Rc::new(|inv, this, _args| {
        string_value(&this, inv).map(|s| Value::String(inv.intern(&s)))
    }));

    define_method(inv, &string_proto, root.clone(), function_proto.clone(), "valueOf", 0, Rc::new(|inv, this, _args| {
        string_value(&this, inv).map(|s| Value::String(inv.intern(&s)))
    }));

    define_method(inv, &string_proto, root.clone(), function_proto.clone(), "charAt", 1, Rc::new(|inv, this, args| {
        let s = string_value(&this, inv)?;
        let chars: Vec<char> = s.chars().collect();
        let i = match args.first() {
            None => 0,
            Some(v) => to_number(v, inv)? as i64,
        };
        let out = if i >= 0 && (i as usize) < chars.len() { chars[i as usize].to_string() } else { String::new() };
        Ok(Value::String(inv.intern(&out)))
    }));

    define_method(inv, &string_proto, root.clone(), function_proto.clone(), "charCodeAt", 1, Rc::new(|inv, this, args| {
        let s = string_value(&this, inv)?;
        let chars: Vec<char> = s.chars().collect();
        let i = match args.first() {
            None => 0,
            Some(v) => to_number(v, inv)? as i64,
        };
        if i >= 0 && (i as usize) < chars.len() {
            Ok(Value::from_u32(chars[i as usize] as u32))
        } else {
            Ok(Value::from_num(f64::NAN))
        }
    }));

    define_method(inv, &string_proto, root.clone(), function_proto.clone(), "indexOf", 1, Rc::new(|inv, this, args| {
        let s = string_value(&this, inv)?;
        let needle = to_string(&arg(args, 0), inv)?;
        let start = match args.get(1) {
            None => 0,
            Some(v) => (to_number(v, inv)? as usize).min(s.chars().count()),
        };
        let chars: Vec<char> = s.chars().collect();
        let haystack: String = chars[start..].iter().collect();
        match haystack.find(&needle) {
            Some(byte_idx) => Ok(Value::from_i32((start + haystack[..byte_idx].chars().count()) as i32)),
            None => Ok(Value::from_i32(-1)),
        }
    }));

    define_method(inv, &string_proto, root.clone(), function_proto.clone(), "lastIndexOf", 1, Rc::new(|inv, this, args| {
        let s = string_value(&this, inv)?;
        let needle = to_string(&arg(args, 0), inv)?;
        match s.rfind(&needle) {
            Some(byte_idx) => Ok(Value::from_i32(s[..byte_idx].chars().count() as i32)),
            None => Ok(Value::from_i32(-1)),
        }
    }));

    define_method(inv, &string_proto, root.clone(), function_proto.clone(), "slice", 2, Rc::new(|inv, this, args| {
        let s = string_value(&this, inv)?;
        let chars: Vec<char> = s.chars().collect();
        let len = chars.len() as i64;
        let start = match args.first() {
            None | Some(Value::Undefined) => 0,
            Some(v) => normalize(to_number(v, inv)?, len),
        };
        let end = match args.get(1) {
            None | Some(Value::Undefined) => len,
            Some(v) => normalize(to_number(v, inv)?, len),
        };
        let out: String = if start < end { chars[start as usize..end as usize].iter().collect() } else { String::new() };
        Ok(Value::String(inv.intern(&out)))
    }));

    define_method(inv, &string_proto, root.clone(), function_proto.clone(), "substring", 2, Rc::new(|inv, this, args| {
        let s = string_value(&this, inv)?;
        let chars: Vec<char> = s.chars().collect();
        let len = chars.len() as i64;
        let clamp = |n: f64| -> i64 { if n.is_nan() { 0 } else { (n as i64).clamp(0, len) } };
        let a = match args.first() {
            None | Some(Value::Undefined) => 0,
            Some(v) => clamp(to_number(v, inv)?),
        };
        let b = match args.get(1) {
            None | Some(Value::Undefined) => len,
            Some(v) => clamp(to_number(v, inv)?),
        };
        let (start, end) = if a < b { (a, b) } else { (b, a) };
        let out: String = chars[start as usize..end as usize].iter().collect();
        Ok(Value::String(inv.intern(&out)))
    }));

    define_method(inv, &string_proto, root.clone(), function_proto.clone(), "substr", 2, Rc::new(|inv, this, args| {
        let s = string_value(&this, inv)?;
        let chars: Vec<char> = s.chars().collect();
        let len = chars.len() as i64;
        let start = match args.first() {
            None | Some(Value::Undefined) => 0,
            Some(v) => {
                let n = to_number(v, inv)? as i64;
                if n < 0 { (len + n).max(0) } else { n.min(len) }
            }
        };
        let count = match args.get(1) {
            None | Some(Value::Undefined) => len - start,
            Some(v) => (to_number(v, inv)? as i64).clamp(0, len - start),
        };
        let out: String = chars[start as usize..(start + count) as usize].iter().collect();
        Ok(Value::String(inv.intern(&out)))
    }));

    define_method(inv, &string_proto, root.clone(), function_proto.clone(), "toUpperCase", 0, Rc::new(|inv, this, _args| {
        let s = string_value(&this, inv)?;
        Ok(Value::String(inv.intern(&s.to_uppercase())))
    }));

    define_method(inv, &string_proto, root.clone(), function_proto.clone(), "toLowerCase", 0, Rc::new(|inv, this, _args| {
        let s = string_value(&this, inv)?;
        Ok(Value::String(inv.intern(&s.to_lowercase())))
    }));

    define_method(inv, &string_proto, root.clone(), function_proto.clone(), "trim", 0, Rc::new(|inv, this, _args| {
        let s = string_value(&this, inv)?;
        Ok(Value::String(inv.intern(s.trim())))
    }));

    define_method(inv, &string_proto, root.clone(), function_proto.clone(), "concat", 1, Rc::new(|inv, this, args| {
        let mut s = string_value(&this, inv)?;
        for a in args {
            s.push_str(&to_string(a, inv)?);
        }
        Ok(Value::String(inv.intern(&s)))
    }));

    define_method(inv, &string_proto, root.clone(), function_proto.clone(), "split", 2, {
        let split_root = root.clone();
        let split_array_proto = array_proto.clone();
        Rc::new(move |inv, this, args| {
            let s = string_value(&this, inv)?;
            let length_key = PropKey::from_str_id(inv.intern("length"));
            let out = ObjectRef::new(Obj::new(ClassTag::Array, Some(split_array_proto.clone()), split_root.clone(), ObjectKind::Array(ArrayData::new(length_key))));
            let pieces: Vec<String> = match args.first() {
                None | Some(Value::Undefined) => vec![s],
                Some(sep_val) => {
                    let sep = to_string(sep_val, inv)?;
                    if sep.is_empty() {
                        s.chars().map(|c| c.to_string()).collect()
                    } else {
                        s.split(&sep).map(|p| p.to_string()).collect()
                    }
                }
            };
            for (i, piece) in pieces.iter().enumerate() {
                let id = inv.intern(piece);
                out.define_own_property(PropKey::from_u32(i as u32), PropertyDescriptor::from_data(Value::String(id), true, true, true), false, inv)?;
            }
            out.define_own_property(length_key, PropertyDescriptor::from_data(Value::from_u32(pieces.len() as u32), true, false, false), false, inv)?;
            Ok(Value::Object(out))
        })
    });

    define_method(inv, &string_proto, root.clone(), function_proto.clone(), "replace", 2, Rc::new(|inv, this, args| {
        let s = string_value(&this, inv)?;
        let pattern = to_string(&arg(args, 0), inv)?;
        let replacement = to_string(&arg(args, 1), inv)?;
        Ok(Value::String(inv.intern(&s.replacen(&pattern, &replacement, 1))))
    }));

    let call_body: NativeFn = Rc::new(|inv, _this, args| match args.first() {
        None => Ok(Value::String(inv.intern(""))),
        Some(v) => to_string(v, inv).map(|s| Value::String(inv.intern(&s))),
    });
    let construct_root = root.clone();
    let construct_proto = string_proto.clone();
    let construct_body: NativeFn = Rc::new(move |inv, _this, args| {
        let s = match args.first() {
            None => String::new(),
            Some(v) => to_string(v, inv)?,
        };
        let id = inv.intern(&s);
        Ok(Value::Object(ObjectRef::new(Obj::new(ClassTag::String, Some(construct_proto.clone()), construct_root.clone(), ObjectKind::StringObj(id)))))
    });

    let constructor = native_constructor(inv, root.clone(), function_proto.clone(), "String", 1, call_body, construct_body, string_proto.clone());

    define_method(inv, &constructor, root, function_proto, "fromCharCode", 1, Rc::new(|inv, _this, args| {
        let mut s = String::new();
        for a in args {
            let n = to_number(a, inv)? as u32;
            if let Some(c) = char::from_u32(n) {
                s.push(c);
            }
        }
        Ok(Value::String(inv.intern(&s)))
    }));

    StringBindings { prototype: string_proto, constructor }
}
