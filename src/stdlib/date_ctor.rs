//! `Date` (ES5 §15.9): a thin binding over a millisecond-since-epoch `f64`.
//! Only the handful of members a generated caller actually reaches for are
//! implemented (construction, `getTime`/`valueOf`, `toISOString`); full
//! locale- and calendar-field accessors are out of scope (see DESIGN.md).

use std::rc::Rc;

use crate::error::ErrorKind;
use crate::object::{ClassTag, Invoker, NativeFn, Obj, ObjectKind, ObjectRef};
use crate::ops::to_number;
use crate::shape::Shape;
use crate::stdlib::support::{define_method, native_constructor};
use crate::value::Value;

pub struct DateBindings {
    pub prototype: ObjectRef,
    pub constructor: ObjectRef,
}

fn date_value(this: &Value, inv: &mut dyn Invoker) -> Result<f64, Value> {
    match this {
        Value::Object(o) => match &o.borrow().kind {
            ObjectKind::Date(t) => Ok(*t),
            _ => Err(inv.throw(ErrorKind::TypeError, "Date method called on incompatible receiver")),
        },
        _ => Err(inv.throw(ErrorKind::TypeError, "Date method called on incompatible receiver")),
    }
}

pub fn install(inv: &mut dyn Invoker, root: Shape, function_proto: ObjectRef, object_proto: ObjectRef) -> DateBindings {
    let date_proto = ObjectRef::new(Obj::new(ClassTag::Date, Some(object_proto), root.clone(), ObjectKind::Date(f64::NAN)));

    define_method(inv, &date_proto, root.clone(), function_proto.clone(), "getTime", 0, Rc::new(|inv, this, _args| {
        date_value(&this, inv).map(Value::from_num)
    }));

    define_method(inv, &date_proto, root.clone(), function_proto.clone(), "valueOf", 0, Rc::new(|inv, this, _args| {
        date_value(&this, inv).map(Value::from_num)
    }));

    define_method(inv, &date_proto, root.clone(), function_proto.clone(), "toString", 0, Rc::new(|inv, this, _args| {
        let t = date_value(&this, inv)?;
        Ok(Value::String(inv.intern(&format_iso(t))))
    }));

    define_method(inv, &date_proto, root.clone(), function_proto.clone(), "toISOString", 0, Rc::new(|inv, this, _args| {
        let t = date_value(&this, inv)?;
        if t.is_nan() {
            return Err(inv.throw(ErrorKind::RangeError, "Invalid Date"));
        }
        Ok(Value::String(inv.intern(&format_iso(t))))
    }));

    let call_body: NativeFn = Rc::new(|inv, _this, _args| Ok(Value::String(inv.intern(&format_iso(current_time_millis())))));
    let construct_root = root.clone();
    let construct_proto = date_proto.clone();
    let construct_body: NativeFn = Rc::new(move |inv, _this, args| {
        let t = match args.first() {
            None => current_time_millis(),
            Some(v) => to_number(v, inv)?,
        };
        Ok(Value::Object(ObjectRef::new(Obj::new(ClassTag::Date, Some(construct_proto.clone()), construct_root.clone(), ObjectKind::Date(t)))))
    });

    let constructor = native_constructor(inv, root.clone(), function_proto.clone(), "Date", 7, call_body, construct_body, date_proto.clone());

    define_method(inv, &constructor, root, function_proto, "now", 0, Rc::new(|_inv, _this, _args| Ok(Value::from_num(current_time_millis()))));

    DateBindings { prototype: date_proto, constructor }
}

/// Milliseconds since the Unix epoch, read from the host clock. Generated
/// callers that need deterministic time inject it via `new Date(ms)`
/// instead.
fn current_time_millis() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as f64).unwrap_or(0.0)
}

/// Renders a millisecond timestamp as `YYYY-MM-DDTHH:mm:ss.sssZ`, the one
/// format `toISOString`/`toString` need; not a general calendar library.
fn format_iso(ms: f64) -> String {
    if ms.is_nan() {
        return "Invalid Date".to_string();
    }
    let total_ms = ms as i64;
    let millis = total_ms.rem_euclid(1000);
    let total_secs = total_ms.div_euclid(1000);
    let secs = total_secs.rem_euclid(60);
    let total_mins = total_secs.div_euclid(60);
    let mins = total_mins.rem_euclid(60);
    let total_hours = total_mins.div_euclid(60);
    let hours = total_hours.rem_euclid(24);
    let days = total_hours.div_euclid(24);
    let (year, month, day) = civil_from_days(days);
    format!("{year:04}-{month:02}-{day:02}T{hours:02}:{mins:02}:{secs:02}.{millis:03}Z")
}

/// Howard Hinnant's days-from-epoch civil calendar algorithm, proleptic
/// Gregorian, valid across the full `i64` range.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = if month <= 2 { y + 1 } else { y };
    (year, month, day)
}
