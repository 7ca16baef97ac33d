//! Global functions (ES5 §15.1.2, §15.1.3): `isNaN`, `isFinite`, `parseInt`,
//! `parseFloat`, and the URI encode/decode quartet. `eval` and `Function`
//! are bootstrapped separately in `bootstrap.rs`, since both need
//! `Interp::parse_program` rather than the plain `Invoker` every other
//! builtin here is installed through.
//!
//! The URI functions operate over `char`s rather than UTF-16 code units,
//! same non-goal as `string_ctor.rs`'s indexing — a lone surrogate can
//! never arise since this crate never materializes one, so the escape
//! algorithm's "isolated surrogate" `URIError` case never triggers here.

use std::rc::Rc;

use crate::error::ErrorKind;
use crate::object::{Invoker, ObjectRef};
use crate::ops::to_number;
use crate::shape::Shape;
use crate::stdlib::support::{arg, define_method};
use crate::value::Value;

/// ES5 §15.1.3 `uriReserved` + `uriUnescaped` + `#`: the characters
/// `encodeURI` leaves untouched.
const URI_RESERVED: &str = ";/?:@&=+$,#";
/// ES5 §15.1.3 `uriUnescaped` minus the alphanumerics (handled separately):
/// the marker punctuation every encode/decode variant leaves untouched.
const URI_MARK: &str = "-_.!~*'()";

fn uri_unreserved(c: char, keep_reserved: bool) -> bool {
    c.is_ascii_alphanumeric() || URI_MARK.contains(c) || (keep_reserved && URI_RESERVED.contains(c))
}

/// ES5 §15.1.3's `Encode` abstract operation: percent-encode every
/// character outside `unescapedSet` as its UTF-8 octets, uppercase hex.
/// Never fails here: the isolated-surrogate `URIError` case in the spec
/// text cannot arise since this crate never materializes a lone surrogate
/// (see module doc comment).
fn uri_encode(s: &str, keep_reserved: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if uri_unreserved(c, keep_reserved) {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).as_bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}

/// ES5 §15.1.3's `Decode` abstract operation: reassembles `%XX` UTF-8
/// octet sequences back into characters, leaving a sequence that decodes to
/// a character in `reservedSet` percent-encoded (so `decodeURI` round-trips
/// reserved punctuation unchanged).
fn uri_decode(s: &str, keep_reserved: bool, inv: &mut dyn Invoker) -> Result<String, Value> {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            // Safe: `s` is valid UTF-8 and `i` only ever advances to a
            // char boundary (either 0, past an ASCII `%`-decode, or past a
            // full multi-byte char copied verbatim below).
            let rest = &s[i..];
            let c = rest.chars().next().unwrap();
            out.push(c);
            i += c.len_utf8();
            continue;
        }
        let hex = bytes.get(i + 1..i + 3).and_then(|h| std::str::from_utf8(h).ok()).and_then(|h| u8::from_str_radix(h, 16).ok());
        let Some(first) = hex else {
            return Err(inv.throw(ErrorKind::UriError, "malformed URI sequence"));
        };
        let octet_len = if first < 0x80 {
            1
        } else if first & 0xE0 == 0xC0 {
            2
        } else if first & 0xF0 == 0xE0 {
            3
        } else if first & 0xF8 == 0xF0 {
            4
        } else {
            return Err(inv.throw(ErrorKind::UriError, "malformed URI sequence"));
        };
        let mut octets = Vec::with_capacity(octet_len);
        octets.push(first);
        for k in 1..octet_len {
            let off = i + 3 * k;
            let hex = bytes.get(off + 1..off + 3).and_then(|h| std::str::from_utf8(h).ok()).and_then(|h| u8::from_str_radix(h, 16).ok());
            match (bytes.get(off), hex) {
                (Some(b'%'), Some(b)) => octets.push(b),
                _ => return Err(inv.throw(ErrorKind::UriError, "malformed URI sequence")),
            }
        }
        let decoded = match std::str::from_utf8(&octets) {
            Ok(s) => s.chars().next().unwrap(),
            Err(_) => return Err(inv.throw(ErrorKind::UriError, "malformed URI sequence")),
        };
        if keep_reserved && URI_RESERVED.contains(decoded) {
            out.push_str(&s[i..i + 3 * octet_len]);
        } else {
            out.push(decoded);
        }
        i += 3 * octet_len;
    }
    Ok(out)
}

pub fn install(inv: &mut dyn Invoker, root: Shape, function_proto: ObjectRef, global_object: &ObjectRef) {
    define_method(inv, global_object, root.clone(), function_proto.clone(), "isNaN", 1, Rc::new(|inv, _this, args| {
        Ok(Value::from_bool(to_number(&arg(args, 0), inv)?.is_nan()))
    }));

    define_method(inv, global_object, root.clone(), function_proto.clone(), "isFinite", 1, Rc::new(|inv, _this, args| {
        Ok(Value::from_bool(to_number(&arg(args, 0), inv)?.is_finite()))
    }));

    define_method(inv, global_object, root.clone(), function_proto.clone(), "parseInt", 2, Rc::new(|inv, _this, args| {
        let s = crate::ops::to_string(&arg(args, 0), inv)?;
        let radix = match args.get(1) {
            None | Some(Value::Undefined) => 0,
            Some(v) => to_number(v, inv)? as u32,
        };
        Ok(Value::from_num(parse_int(s.trim(), radix)))
    }));

    define_method(inv, global_object, root.clone(), function_proto.clone(), "parseFloat", 1, Rc::new(|inv, _this, args| {
        let s = crate::ops::to_string(&arg(args, 0), inv)?;
        Ok(Value::from_num(parse_float(s.trim())))
    }));

    define_method(inv, global_object, root.clone(), function_proto.clone(), "encodeURI", 1, Rc::new(|inv, _this, args| {
        let s = crate::ops::to_string(&arg(args, 0), inv)?;
        let encoded = uri_encode(&s, true);
        Ok(Value::String(inv.intern(&encoded)))
    }));

    define_method(inv, global_object, root.clone(), function_proto.clone(), "encodeURIComponent", 1, Rc::new(|inv, _this, args| {
        let s = crate::ops::to_string(&arg(args, 0), inv)?;
        let encoded = uri_encode(&s, false);
        Ok(Value::String(inv.intern(&encoded)))
    }));

    define_method(inv, global_object, root.clone(), function_proto.clone(), "decodeURI", 1, Rc::new(|inv, _this, args| {
        let s = crate::ops::to_string(&arg(args, 0), inv)?;
        let decoded = uri_decode(&s, true, inv)?;
        Ok(Value::String(inv.intern(&decoded)))
    }));

    define_method(inv, global_object, root, function_proto, "decodeURIComponent", 1, Rc::new(|inv, _this, args| {
        let s = crate::ops::to_string(&arg(args, 0), inv)?;
        let decoded = uri_decode(&s, false, inv)?;
        Ok(Value::String(inv.intern(&decoded)))
    }));
}

/// ES5 §15.1.2.2: strips an optional sign, detects a `0x`/`0X` prefix
/// (forcing radix 16 unless the caller already pinned one), then consumes
/// the longest valid-digit prefix for the resolved radix.
fn parse_int(s: &str, mut radix: u32) -> f64 {
    let (sign, rest) = match s.strip_prefix('-') {
        Some(r) => (-1.0, r),
        None => (1.0, s.strip_prefix('+').unwrap_or(s)),
    };
    let mut rest = rest;
    if radix == 0 {
        if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
            rest = hex;
            radix = 16;
        } else {
            radix = 10;
        }
    } else if radix == 16 {
        rest = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")).unwrap_or(rest);
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let end = rest.find(|c: char| !c.is_digit(radix)).unwrap_or(rest.len());
    if end == 0 {
        return f64::NAN;
    }
    match u64::from_str_radix(&rest[..end], radix) {
        Ok(n) => sign * n as f64,
        Err(_) => {
            // Overflowed u64: fall back to accumulating as f64 digit by
            // digit, since parseInt must not fail just because the magnitude
            // exceeds what fits in 64 bits.
            let mut acc = 0.0f64;
            for c in rest[..end].chars() {
                acc = acc * radix as f64 + c.to_digit(radix).unwrap() as f64;
            }
            sign * acc
        }
    }
}

/// ES5 §15.1.2.3: longest prefix matching a JS numeric literal grammar
/// (optional sign, digits, optional `.digits`, optional exponent), plus the
/// `Infinity`/`-Infinity` special cases.
fn parse_float(s: &str) -> f64 {
    if let Some(rest) = s.strip_prefix('-') {
        if rest.starts_with("Infinity") {
            return f64::NEG_INFINITY;
        }
    }
    if s.starts_with("Infinity") || s.starts_with("+Infinity") {
        return f64::INFINITY;
    }
    let bytes = s.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i == digits_start || (i == digits_start + 1 && bytes.get(digits_start) == Some(&b'.')) {
        return f64::NAN;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_digits_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_digits_start {
            i = j;
        }
    }
    s[..i].parse::<f64>().unwrap_or(f64::NAN)
}
