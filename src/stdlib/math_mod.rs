//! `Math` (ES5 §15.8): a plain object, not a constructor.

use std::rc::Rc;

use crate::object::{ClassTag, Invoker, Obj, ObjectKind, ObjectRef};
use crate::ops::to_number;
use crate::shape::Shape;
use crate::stdlib::support::{arg, define_constant, define_method};
use crate::value::Value;

pub fn install(inv: &mut dyn Invoker, root: Shape, function_proto: ObjectRef, object_proto: ObjectRef) -> ObjectRef {
    let math = ObjectRef::new(Obj::new(ClassTag::Object, Some(object_proto), root.clone(), ObjectKind::Plain));

    define_constant(inv, &math, "PI", Value::from_num(std::f64::consts::PI));
    define_constant(inv, &math, "E", Value::from_num(std::f64::consts::E));
    define_constant(inv, &math, "LN2", Value::from_num(std::f64::consts::LN_2));
    define_constant(inv, &math, "LN10", Value::from_num(std::f64::consts::LN_10));
    define_constant(inv, &math, "LOG2E", Value::from_num(std::f64::consts::LOG2_E));
    define_constant(inv, &math, "LOG10E", Value::from_num(std::f64::consts::LOG10_E));
    define_constant(inv, &math, "SQRT2", Value::from_num(std::f64::consts::SQRT_2));
    define_constant(inv, &math, "SQRT1_2", Value::from_num(std::f64::consts::FRAC_1_SQRT_2));

    macro_rules! unary {
        ($name:expr, $f:expr) => {
            define_method(inv, &math, root.clone(), function_proto.clone(), $name, 1, Rc::new(move |inv, _this, args| {
                let n = to_number(&arg(args, 0), inv)?;
                Ok(Value::from_num(($f)(n)))
            }));
        };
    }

    unary!("abs", f64::abs);
    unary!("floor", f64::floor);
    unary!("ceil", f64::ceil);
    unary!("round", |n: f64| (n + 0.5).floor());
    unary!("trunc", f64::trunc);
    unary!("sqrt", f64::sqrt);
    unary!("log", f64::ln);
    unary!("exp", f64::exp);
    unary!("sin", f64::sin);
    unary!("cos", f64::cos);
    unary!("tan", f64::tan);
    unary!("asin", f64::asin);
    unary!("acos", f64::acos);
    unary!("atan", f64::atan);

    define_method(inv, &math, root.clone(), function_proto.clone(), "max", 2, Rc::new(|inv, _this, args| {
        let mut m = f64::NEG_INFINITY;
        for a in args {
            let n = to_number(a, inv)?;
            if n.is_nan() {
                return Ok(Value::from_num(f64::NAN));
            }
            if n > m {
                m = n;
            }
        }
        Ok(Value::from_num(m))
    }));

    define_method(inv, &math, root.clone(), function_proto.clone(), "min", 2, Rc::new(|inv, _this, args| {
        let mut m = f64::INFINITY;
        for a in args {
            let n = to_number(a, inv)?;
            if n.is_nan() {
                return Ok(Value::from_num(f64::NAN));
            }
            if n < m {
                m = n;
            }
        }
        Ok(Value::from_num(m))
    }));

    define_method(inv, &math, root.clone(), function_proto.clone(), "pow", 2, Rc::new(|inv, _this, args| {
        let base = to_number(&arg(args, 0), inv)?;
        let exp = to_number(&arg(args, 1), inv)?;
        Ok(Value::from_num(base.powf(exp)))
    }));

    define_method(inv, &math, root.clone(), function_proto.clone(), "atan2", 2, Rc::new(|inv, _this, args| {
        let y = to_number(&arg(args, 0), inv)?;
        let x = to_number(&arg(args, 1), inv)?;
        Ok(Value::from_num(y.atan2(x)))
    }));

    define_method(inv, &math, root, function_proto, "random", 0, Rc::new(|_inv, _this, _args| {
        Ok(Value::from_num(pseudo_random()))
    }));

    math
}

/// `Math.random`'s ES5 contract only demands a number in `[0, 1)`, no
/// particular distribution or seeding strategy; a xorshift generator seeded
/// from the address of a stack local avoids pulling in a `rand` dependency
/// the rest of this crate's stack doesn't otherwise need.
fn pseudo_random() -> f64 {
    use std::cell::Cell;
    thread_local! {
        static STATE: Cell<u64> = Cell::new(0x9E3779B97F4A7C15);
    }
    STATE.with(|s| {
        let mut x = s.get();
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        s.set(x);
        (x >> 11) as f64 / (1u64 << 53) as f64
    })
}
