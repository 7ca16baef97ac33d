//! `Number` constructor and `Number.prototype` (ES5 §15.7)

use std::rc::Rc;

use crate::error::ErrorKind;
use crate::object::{ClassTag, Invoker, NativeFn, Obj, ObjectKind, ObjectRef};
use crate::ops::to_number;
use crate::shape::Shape;
use crate::stdlib::support::{arg, define_constant, define_method, native_constructor};
use crate::value::Value;

pub struct NumberBindings {
    pub prototype: ObjectRef,
    pub constructor: ObjectRef,
}

fn number_value(this: &Value, inv: &mut dyn Invoker) -> Result<f64, Value> {
    match this {
        Value::Object(o) => match &o.borrow().kind {
            ObjectKind::Number(n) => Ok(*n),
            _ => Err(inv.throw(ErrorKind::TypeError, "Number method called on incompatible receiver")),
        },
        Value::Number(n) => Ok(*n),
        _ => Err(inv.throw(ErrorKind::TypeError, "Number method called on incompatible receiver")),
    }
}

pub fn install(inv: &mut dyn Invoker, root: Shape, function_proto: ObjectRef, object_proto: ObjectRef) -> NumberBindings {
    let number_proto = ObjectRef::new(Obj::new(ClassTag::Number, Some(object_proto), root.clone(), ObjectKind::Number(0.0)));

    define_method(inv, &number_proto, root.clone(), function_proto.clone(), "toString", 1, Rc::new(|inv, this, args| {
        let n = number_value(&this, inv)?;
        let radix = match args.first() {
            None | Some(Value::Undefined) => 10,
            Some(v) => to_number(v, inv)? as u32,
        };
        Ok(Value::String(inv.intern(&format_radix(n, radix))))
    }));

    define_method(inv, &number_proto, root.clone(), function_proto.clone(), "valueOf", 0, Rc::new(|inv, this, _args| {
        number_value(&this, inv).map(Value::from_num)
    }));

    define_method(inv, &number_proto, root.clone(), function_proto.clone(), "toFixed", 1, Rc::new(|inv, this, args| {
        let n = number_value(&this, inv)?;
        let digits = match args.first() {
            None | Some(Value::Undefined) => 0,
            Some(v) => {
                let raw = to_number(v, inv)?;
                if raw.is_nan() { 0 } else { raw.trunc().clamp(0.0, 20.0) as usize }
            }
        };
        if n.is_nan() {
            return Ok(Value::String(inv.intern("NaN")));
        }
        Ok(Value::String(inv.intern(&format!("{n:.digits$}"))))
    }));

    define_method(inv, &number_proto, root.clone(), function_proto.clone(), "toPrecision", 1, Rc::new(|inv, this, args| {
        let n = number_value(&this, inv)?;
        match args.first() {
            None | Some(Value::Undefined) => Ok(Value::String(inv.intern(&format_shortest(n)))),
            Some(v) => {
                let p = to_number(v, inv)? as usize;
                Ok(Value::String(inv.intern(&format!("{n:.*}", p.saturating_sub(1)))))
            }
        }
    }));

    let call_body: NativeFn = Rc::new(|inv, _this, args| match args.first() {
        None => Ok(Value::from_num(0.0)),
        Some(v) => to_number(v, inv).map(Value::from_num),
    });
    let construct_root = root.clone();
    let construct_proto = number_proto.clone();
    let construct_body: NativeFn = Rc::new(move |inv, _this, args| {
        let n = match args.first() {
            None => 0.0,
            Some(v) => to_number(v, inv)?,
        };
        Ok(Value::Object(ObjectRef::new(Obj::new(ClassTag::Number, Some(construct_proto.clone()), construct_root.clone(), ObjectKind::Number(n)))))
    });

    let constructor = native_constructor(inv, root, function_proto, "Number", 1, call_body, construct_body, number_proto.clone());

    define_constant(inv, &constructor, "MAX_VALUE", Value::from_num(f64::MAX));
    define_constant(inv, &constructor, "MIN_VALUE", Value::from_num(f64::MIN_POSITIVE));
    define_constant(inv, &constructor, "NaN", Value::from_num(f64::NAN));
    define_constant(inv, &constructor, "POSITIVE_INFINITY", Value::from_num(f64::INFINITY));
    define_constant(inv, &constructor, "NEGATIVE_INFINITY", Value::from_num(f64::NEG_INFINITY));

    NumberBindings { prototype: number_proto, constructor }
}

fn format_shortest(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() };
    }
    let mut s = format!("{n}");
    if !s.contains('.') && !s.contains('e') {
        // Rust's default float Display already omits a trailing ".0" for
        // integral values the way ES5 ToString does; nothing further needed.
        let _ = &mut s;
    }
    s
}

fn format_radix(n: f64, radix: u32) -> String {
    if radix == 10 {
        return format_shortest(n);
    }
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let neg = n < 0.0;
    let mut int_part = n.abs().trunc() as u64;
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut digits = Vec::new();
    if int_part == 0 {
        digits.push(b'0');
    }
    while int_part > 0 {
        digits.push(DIGITS[(int_part % radix as u64) as usize]);
        int_part /= radix as u64;
    }
    digits.reverse();
    let mut out = String::from_utf8(digits).unwrap();
    if neg {
        out.insert(0, '-');
    }
    out
}
