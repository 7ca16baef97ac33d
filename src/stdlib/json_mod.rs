//! `JSON` (ES5 §15.12): `stringify`/`parse` over the core value graph.
//! `stringify`'s `replacer` parameter and `parse`'s `reviver` are not
//! implemented (non-goal: this crate targets the data-interchange subset
//! generated callers actually exercise, not the full abstract-operation
//! callback hooks); `space` is honored when it's a number or string.

use std::rc::Rc;

use crate::error::ErrorKind;
use crate::object::{ArrayData, ClassTag, Invoker, Obj, ObjectKind, ObjectRef, PropertyDescriptor};
use crate::propkey::PropKey;
use crate::shape::Shape;
use crate::stdlib::support::{arg, define_method, own_keys};
use crate::value::Value;

pub fn install(inv: &mut dyn Invoker, root: Shape, function_proto: ObjectRef, object_proto: ObjectRef, array_proto: ObjectRef) -> ObjectRef {
    let json = ObjectRef::new(Obj::new(ClassTag::Object, Some(object_proto.clone()), root.clone(), ObjectKind::Plain));

    define_method(inv, &json, root.clone(), function_proto.clone(), "stringify", 3, Rc::new(|inv, _this, args| {
        let indent = match args.get(2) {
            None | Some(Value::Undefined) => String::new(),
            Some(Value::Number(n)) => " ".repeat((*n as usize).min(10)),
            Some(v) => {
                let s = crate::ops::to_string(v, inv)?;
                s.chars().take(10).collect()
            }
        };
        match stringify_value(&arg(args, 0), &indent, 0, inv)? {
            Some(s) => Ok(Value::String(inv.intern(&s))),
            None => Ok(Value::Undefined),
        }
    }));

    define_method(inv, &json, root.clone(), function_proto.clone(), "parse", 1, {
        let parse_root = root;
        let parse_array_proto = array_proto;
        let parse_object_proto = object_proto;
        Rc::new(move |inv, _this, args| {
            let text = crate::ops::to_string(&arg(args, 0), inv)?;
            let mut parser = JsonParser { bytes: text.as_bytes(), pos: 0 };
            parser.skip_ws();
            let v = parser.parse_value(&parse_root, &parse_array_proto, &parse_object_proto, inv)?;
            parser.skip_ws();
            if parser.pos != parser.bytes.len() {
                return Err(inv.throw(ErrorKind::SyntaxError, "Unexpected trailing characters in JSON"));
            }
            Ok(v)
        })
    });

    json
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn stringify_value(v: &Value, indent: &str, depth: usize, inv: &mut dyn Invoker) -> Result<Option<String>, Value> {
    match v {
        Value::Undefined | Value::Nothing => Ok(None),
        Value::Null => Ok(Some("null".to_string())),
        Value::Boolean(b) => Ok(Some(if *b { "true".to_string() } else { "false".to_string() })),
        Value::Number(n) => Ok(Some(if n.is_finite() { format!("{n}") } else { "null".to_string() })),
        Value::String(id) => Ok(Some(quote(&inv.lookup_str(*id)))),
        Value::Object(o) => {
            if o.borrow().is_callable() {
                return Ok(None);
            }
            if o.borrow().class == ClassTag::Array {
                let length_key = PropKey::from_str_id(inv.intern("length"));
                let len = crate::ops::to_uint32(&o.get(length_key, inv)?, inv)?;
                let mut parts = Vec::with_capacity(len as usize);
                for i in 0..len {
                    let item = o.get(PropKey::from_u32(i), inv)?;
                    let rendered = stringify_value(&item, indent, depth + 1, inv)?.unwrap_or_else(|| "null".to_string());
                    parts.push(rendered);
                }
                Ok(Some(wrap("[", "]", parts, indent, depth)))
            } else {
                let mut parts = Vec::new();
                for key in own_keys(o, true) {
                    let value = o.get(key, inv)?;
                    if let Some(rendered) = stringify_value(&value, indent, depth + 1, inv)? {
                        let key_str = key.to_string(|id| inv.lookup_str(id));
                        parts.push(format!("{}:{}{}", quote(&key_str), if indent.is_empty() { "" } else { " " }, rendered));
                    }
                }
                Ok(Some(wrap("{", "}", parts, indent, depth)))
            }
        }
    }
}

fn wrap(open: &str, close: &str, parts: Vec<String>, indent: &str, depth: usize) -> String {
    if parts.is_empty() {
        return format!("{open}{close}");
    }
    if indent.is_empty() {
        return format!("{open}{}{close}", parts.join(","));
    }
    let inner = indent.repeat(depth + 1);
    let outer = indent.repeat(depth);
    format!("{open}\n{inner}{}\n{outer}{close}", parts.join(&format!(",\n{inner}")))
}

struct JsonParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> JsonParser<'a> {
    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && matches!(self.bytes[self.pos], b' ' | b'\t' | b'\n' | b'\r') {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, b: u8, inv: &mut dyn Invoker) -> Result<(), Value> {
        if self.peek() == Some(b) {
            self.pos += 1;
            Ok(())
        } else {
            Err(inv.throw(ErrorKind::SyntaxError, format!("Expected '{}' in JSON at position {}", b as char, self.pos)))
        }
    }

    fn parse_value(&mut self, root: &Shape, array_proto: &ObjectRef, object_proto: &ObjectRef, inv: &mut dyn Invoker) -> Result<Value, Value> {
        self.skip_ws();
        match self.peek() {
            Some(b'{') => self.parse_object(root, array_proto, object_proto, inv),
            Some(b'[') => self.parse_array(root, array_proto, object_proto, inv),
            Some(b'"') => self.parse_string(inv).map(|s| Value::String(inv.intern(&s))),
            Some(b't') => self.parse_literal("true", Value::from_bool(true), inv),
            Some(b'f') => self.parse_literal("false", Value::from_bool(false), inv),
            Some(b'n') => self.parse_literal("null", Value::Null, inv),
            Some(c) if c == b'-' || c.is_ascii_digit() => self.parse_number(inv),
            _ => Err(inv.throw(ErrorKind::SyntaxError, "Unexpected token in JSON")),
        }
    }

    fn parse_literal(&mut self, lit: &str, value: Value, inv: &mut dyn Invoker) -> Result<Value, Value> {
        if self.bytes[self.pos..].starts_with(lit.as_bytes()) {
            self.pos += lit.len();
            Ok(value)
        } else {
            Err(inv.throw(ErrorKind::SyntaxError, "Unexpected token in JSON"))
        }
    }

    fn parse_number(&mut self, inv: &mut dyn Invoker) -> Result<Value, Value> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == b'.' || c == b'e' || c == b'E' || c == b'+' || c == b'-') {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap();
        text.parse::<f64>().map(Value::from_num).map_err(|_| inv.throw(ErrorKind::SyntaxError, "Invalid number in JSON"))
    }

    fn parse_string(&mut self, inv: &mut dyn Invoker) -> Result<String, Value> {
        self.expect(b'"', inv)?;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(inv.throw(ErrorKind::SyntaxError, "Unterminated string in JSON")),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'"') => {
                            out.push('"');
                            self.pos += 1;
                        }
                        Some(b'\\') => {
                            out.push('\\');
                            self.pos += 1;
                        }
                        Some(b'/') => {
                            out.push('/');
                            self.pos += 1;
                        }
                        Some(b'n') => {
                            out.push('\n');
                            self.pos += 1;
                        }
                        Some(b't') => {
                            out.push('\t');
                            self.pos += 1;
                        }
                        Some(b'r') => {
                            out.push('\r');
                            self.pos += 1;
                        }
                        Some(b'u') => {
                            self.pos += 1;
                            let end = (self.pos + 4).min(self.bytes.len());
                            let hex = std::str::from_utf8(&self.bytes[self.pos..end]).unwrap_or("0000");
                            let code = u32::from_str_radix(hex, 16).unwrap_or(0);
                            if let Some(c) = char::from_u32(code) {
                                out.push(c);
                            }
                            self.pos = end;
                        }
                        _ => return Err(inv.throw(ErrorKind::SyntaxError, "Invalid escape in JSON string")),
                    }
                }
                Some(c) => {
                    out.push(c as char);
                    self.pos += 1;
                }
            }
        }
    }

    fn parse_array(&mut self, root: &Shape, array_proto: &ObjectRef, object_proto: &ObjectRef, inv: &mut dyn Invoker) -> Result<Value, Value> {
        self.expect(b'[', inv)?;
        let length_key = PropKey::from_str_id(inv.intern("length"));
        let arr = ObjectRef::new(Obj::new(ClassTag::Array, Some(array_proto.clone()), root.clone(), ObjectKind::Array(ArrayData::new(length_key))));
        let mut i = 0u32;
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
        } else {
            loop {
                let v = self.parse_value(root, array_proto, object_proto, inv)?;
                arr.define_own_property(PropKey::from_u32(i), PropertyDescriptor::from_data(v, true, true, true), false, inv)?;
                i += 1;
                self.skip_ws();
                match self.peek() {
                    Some(b',') => {
                        self.pos += 1;
                    }
                    Some(b']') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(inv.throw(ErrorKind::SyntaxError, "Expected ',' or ']' in JSON array")),
                }
            }
        }
        arr.define_own_property(length_key, PropertyDescriptor::from_data(Value::from_u32(i), true, false, false), false, inv)?;
        Ok(Value::Object(arr))
    }

    fn parse_object(&mut self, root: &Shape, array_proto: &ObjectRef, object_proto: &ObjectRef, inv: &mut dyn Invoker) -> Result<Value, Value> {
        self.expect(b'{', inv)?;
        let obj = ObjectRef::new(Obj::new(ClassTag::Object, Some(object_proto.clone()), root.clone(), ObjectKind::Plain));
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
        } else {
            loop {
                self.skip_ws();
                let key = self.parse_string(inv)?;
                self.skip_ws();
                self.expect(b':', inv)?;
                let value = self.parse_value(root, array_proto, object_proto, inv)?;
                let prop_key = PropKey::from_str(&key, |s| inv.intern(s));
                obj.define_own_property(prop_key, PropertyDescriptor::from_data(value, true, true, true), false, inv)?;
                self.skip_ws();
                match self.peek() {
                    Some(b',') => {
                        self.pos += 1;
                    }
                    Some(b'}') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(inv.throw(ErrorKind::SyntaxError, "Expected ',' or '}' in JSON object")),
                }
            }
        }
        Ok(Value::Object(obj))
    }
}
