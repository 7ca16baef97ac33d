//! `Function.prototype` (ES5 §15.3.4): `call`, `apply`, `bind`, `toString`.
//!
//! `Function` itself (`new Function(...)`, requiring the external parser)
//! is bound directly in `bootstrap.rs`, not here, since it needs the
//! `Engine`'s `Interp::parse_program` rather than a plain `Invoker`.

use std::rc::Rc;

use crate::error::ErrorKind;
use crate::object::{ClassTag, FunctionData, FunctionKind, Invoker, Obj, ObjectKind, ObjectRef};
use crate::ops::{call_value, to_uint32};
use crate::propkey::PropKey;
use crate::shape::Shape;
use crate::stdlib::support::{arg, define_method};
use crate::value::Value;

pub fn install(inv: &mut dyn Invoker, root: Shape, function_proto: ObjectRef) {
    define_method(inv, &function_proto, root.clone(), function_proto.clone(), "toString", 0, Rc::new(|inv, this, _args| {
        let Value::Object(o) = &this else {
            return Err(inv.throw(ErrorKind::TypeError, "Function.prototype.toString called on a non-function"));
        };
        if !o.borrow().is_callable() {
            return Err(inv.throw(ErrorKind::TypeError, "Function.prototype.toString called on a non-function"));
        }
        let source = match &o.borrow().as_function().unwrap().kind {
            FunctionKind::Native { .. } => "function () { [native code] }".to_string(),
            FunctionKind::Interpreted { .. } => "function () { [interpreted code] }".to_string(),
            FunctionKind::Bound { .. } => "function () { [bound code] }".to_string(),
        };
        Ok(Value::String(inv.intern(&source)))
    }));

    define_method(inv, &function_proto, root.clone(), function_proto.clone(), "call", 1, Rc::new(|inv, this, args| {
        let this_arg = arg(args, 0);
        let rest: &[Value] = if args.len() > 1 { &args[1..] } else { &[] };
        call_value(&this, this_arg, rest, inv)
    }));

    define_method(inv, &function_proto, root.clone(), function_proto.clone(), "apply", 2, Rc::new(|inv, this, args| {
        let this_arg = arg(args, 0);
        let spread = match args.get(1) {
            None | Some(Value::Undefined) | Some(Value::Null) => Vec::new(),
            Some(array_like) => array_like_to_vec(array_like, inv)?,
        };
        call_value(&this, this_arg, &spread, inv)
    }));

    let bind_root = root;
    define_method(inv, &function_proto.clone(), bind_root.clone(), function_proto, "bind", 1, Rc::new(move |inv, this, args| {
        let Value::Object(target) = &this else {
            return Err(inv.throw(ErrorKind::TypeError, "Function.prototype.bind called on a non-function"));
        };
        if !target.borrow().is_callable() {
            return Err(inv.throw(ErrorKind::TypeError, "Function.prototype.bind called on a non-function"));
        }
        let bound_this = arg(args, 0);
        let bound_args: Vec<Value> = args.iter().skip(1).cloned().collect();
        let arity = target.borrow().as_function().map(|f| f.arity).unwrap_or(0);
        let remaining_arity = arity.saturating_sub(bound_args.len() as u32);
        let func_proto = target.borrow().prototype.clone().unwrap_or_else(|| target.clone());
        let bound = ObjectRef::new(Obj::new(
            ClassTag::Function,
            Some(func_proto),
            bind_root.clone(),
            ObjectKind::Function(FunctionData {
                kind: FunctionKind::Bound {
                    target: target.clone(),
                    bound_this,
                    bound_args,
                },
                strict: false,
                arity: remaining_arity,
            }),
        ));
        Ok(Value::Object(bound))
    }));
}

/// ES5 §15.3.4.3's array-like coercion for `apply`'s second argument: reads
/// `length`, then indices `0..length` in order.
fn array_like_to_vec(array_like: &Value, inv: &mut dyn Invoker) -> crate::error::EsResult<Vec<Value>> {
    let Value::Object(obj) = array_like else {
        return Err(inv.throw(ErrorKind::TypeError, "apply: second argument must be array-like"));
    };
    let length_key = PropKey::from_str_id(inv.intern("length"));
    let len = to_uint32(&obj.get(length_key, inv)?, inv)?;
    let mut out = Vec::with_capacity(len as usize);
    for i in 0..len {
        out.push(obj.get(PropKey::from_u32(i), inv)?);
    }
    Ok(out)
}
