//! `RegExp` (ES5 §15.10): a thin binding over the `regex` crate, exposing
//! `test`/`exec` and the flag properties. Full ES5 regex-grammar fidelity
//! (lookahead, backreferences) isn't attempted — `regex` is a different,
//! non-backtracking dialect; good enough for the contract-boundary pattern
//! matching generated code actually performs (see DESIGN.md).

use std::rc::Rc;

use crate::error::ErrorKind;
use crate::object::{ArrayData, ClassTag, Invoker, NativeFn, Obj, ObjectKind, ObjectRef, PropertyDescriptor, RegExpData};
use crate::ops::to_string;
use crate::propkey::PropKey;
use crate::shape::Shape;
use crate::stdlib::support::{arg, define_method, define_value, native_constructor};
use crate::value::Value;

pub struct RegExpBindings {
    pub prototype: ObjectRef,
    pub constructor: ObjectRef,
}

fn parse_flags(flags: &str) -> (bool, bool, bool) {
    (flags.contains('g'), flags.contains('i'), flags.contains('m'))
}

#[cfg(feature = "regex")]
fn compile(source: &str, ignore_case: bool, multiline: bool) -> Option<regex::Regex> {
    let mut builder = regex::RegexBuilder::new(source);
    builder.case_insensitive(ignore_case).multi_line(multiline);
    builder.build().ok()
}

pub(crate) fn build_regexp(source: String, flags: &str, root: Shape, proto: ObjectRef, inv: &mut dyn Invoker) -> ObjectRef {
    let (global, ignore_case, multiline) = parse_flags(flags);
    #[cfg(feature = "regex")]
    let compiled = compile(&source, ignore_case, multiline);
    let data = RegExpData {
        source: source.clone(),
        global,
        ignore_case,
        multiline,
        #[cfg(feature = "regex")]
        compiled,
    };
    let obj = ObjectRef::new(Obj::new(ClassTag::RegExp, Some(proto), root, ObjectKind::RegExp(data)));
    define_value(inv, &obj, "source", Value::String(inv.intern(&source)));
    define_value(inv, &obj, "global", Value::from_bool(global));
    define_value(inv, &obj, "ignoreCase", Value::from_bool(ignore_case));
    define_value(inv, &obj, "multiline", Value::from_bool(multiline));
    define_value(inv, &obj, "lastIndex", Value::from_u32(0));
    obj
}

pub fn install(inv: &mut dyn Invoker, root: Shape, function_proto: ObjectRef, object_proto: ObjectRef, array_proto: ObjectRef) -> RegExpBindings {
    let regexp_proto = {
        let data = RegExpData {
            source: String::new(),
            global: false,
            ignore_case: false,
            multiline: false,
            #[cfg(feature = "regex")]
            compiled: None,
        };
        ObjectRef::new(Obj::new(ClassTag::RegExp, Some(object_proto), root.clone(), ObjectKind::RegExp(data)))
    };

    define_method(inv, &regexp_proto, root.clone(), function_proto.clone(), "toString", 0, Rc::new(|inv, this, _args| {
        let Value::Object(o) = &this else {
            return Err(inv.throw(ErrorKind::TypeError, "RegExp.prototype.toString called on a non-RegExp"));
        };
        let src = match &o.borrow().kind {
            ObjectKind::RegExp(d) => format!("/{}/{}{}{}", d.source, if d.global { "g" } else { "" }, if d.ignore_case { "i" } else { "" }, if d.multiline { "m" } else { "" }),
            _ => return Err(inv.throw(ErrorKind::TypeError, "RegExp.prototype.toString called on a non-RegExp")),
        };
        Ok(Value::String(inv.intern(&src)))
    }));

    define_method(inv, &regexp_proto, root.clone(), function_proto.clone(), "test", 1, Rc::new(|inv, this, args| {
        let subject = to_string(&arg(args, 0), inv)?;
        let Value::Object(o) = &this else {
            return Err(inv.throw(ErrorKind::TypeError, "RegExp.prototype.test called on a non-RegExp"));
        };
        #[cfg(feature = "regex")]
        {
            let matched = match &o.borrow().kind {
                ObjectKind::RegExp(d) => d.compiled.as_ref().map(|re| re.is_match(&subject)).unwrap_or(false),
                _ => return Err(inv.throw(ErrorKind::TypeError, "RegExp.prototype.test called on a non-RegExp")),
            };
            Ok(Value::from_bool(matched))
        }
        #[cfg(not(feature = "regex"))]
        {
            let _ = (subject, o);
            Err(inv.throw(ErrorKind::TypeError, "RegExp support was not compiled into this build"))
        }
    }));

    define_method(inv, &regexp_proto, root.clone(), function_proto.clone(), "exec", 1, {
        let exec_root = root.clone();
        let exec_array_proto = array_proto;
        Rc::new(move |inv, this, args| {
            let subject = to_string(&arg(args, 0), inv)?;
            let Value::Object(o) = &this else {
                return Err(inv.throw(ErrorKind::TypeError, "RegExp.prototype.exec called on a non-RegExp"));
            };
            #[cfg(feature = "regex")]
            {
                let found = match &o.borrow().kind {
                    ObjectKind::RegExp(d) => d.compiled.as_ref().and_then(|re| re.captures(&subject)),
                    _ => return Err(inv.throw(ErrorKind::TypeError, "RegExp.prototype.exec called on a non-RegExp")),
                };
                match found {
                    None => Ok(Value::Null),
                    Some(caps) => {
                        let length_key = PropKey::from_str_id(inv.intern("length"));
                        let result = ObjectRef::new(Obj::new(ClassTag::Array, Some(exec_array_proto.clone()), exec_root.clone(), ObjectKind::Array(ArrayData::new(length_key))));
                        let count = caps.len();
                        for i in 0..count {
                            let v = match caps.get(i) {
                                Some(m) => Value::String(inv.intern(m.as_str())),
                                None => Value::Undefined,
                            };
                            result.define_own_property(PropKey::from_u32(i as u32), PropertyDescriptor::from_data(v, true, true, true), false, inv)?;
                        }
                        result.define_own_property(length_key, PropertyDescriptor::from_data(Value::from_u32(count as u32), true, false, false), false, inv)?;
                        let index = caps.get(0).map(|m| m.start()).unwrap_or(0);
                        define_value(inv, &result, "index", Value::from_u32(index as u32));
                        define_value(inv, &result, "input", Value::String(inv.intern(&subject)));
                        Ok(Value::Object(result))
                    }
                }
            }
            #[cfg(not(feature = "regex"))]
            {
                let _ = (subject, o, exec_array_proto.clone());
                Err(inv.throw(ErrorKind::TypeError, "RegExp support was not compiled into this build"))
            }
        })
    });

    let ctor_root = root.clone();
    let ctor_proto = regexp_proto.clone();
    let call_body: NativeFn = Rc::new(move |inv, _this, args| {
        let source = to_string(&arg(args, 0), inv)?;
        let flags = match args.get(1) {
            None | Some(Value::Undefined) => String::new(),
            Some(v) => to_string(v, inv)?,
        };
        Ok(Value::Object(build_regexp(source, &flags, ctor_root.clone(), ctor_proto.clone(), inv)))
    });
    let construct_root = root.clone();
    let construct_proto = regexp_proto.clone();
    let construct_body: NativeFn = Rc::new(move |inv, _this, args| {
        let source = to_string(&arg(args, 0), inv)?;
        let flags = match args.get(1) {
            None | Some(Value::Undefined) => String::new(),
            Some(v) => to_string(v, inv)?,
        };
        Ok(Value::Object(build_regexp(source, &flags, construct_root.clone(), construct_proto.clone(), inv)))
    });

    let constructor = native_constructor(inv, root, function_proto, "RegExp", 2, call_body, construct_body, regexp_proto.clone());

    RegExpBindings { prototype: regexp_proto, constructor }
}
