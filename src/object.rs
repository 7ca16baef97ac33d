//! Object model
//!
//! Objects own a prototype pointer, class tag, extensibility flag, a
//! property map, and an indexed array, plus specialized subkind payloads
//! (Array, Arguments, Boolean, Number, String, Date, RegExp, Function,
//! Error). Implements the §8.12 "meta-object protocol": `get_own_property`/
//! `get_property`/`get`/`put`/`delete`/`define_own_property`/
//! `default_value`.
//!
//! Rather than a class hierarchy with virtual overrides (what
//! `original_source/runtime/object.hh` uses in C++), subkind behavior
//! dispatches on an explicit tag (spec §9 design note), matching this
//! codebase's general preference for tagged-union dispatch over trait
//! objects (`seq-runtime::value::Value` is the same shape: one enum, match
//! on variant, no dyn dispatch on the hot path).

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{ErrorKind, EsResult};
use crate::indexed::IndexedArray;
use crate::propkey::PropKey;
use crate::propmap::{PropertyMap, SlotRef};
use crate::shape::Shape;
use crate::strpool::StrId;
use crate::value::{new_slot, Hint, Slot, Value};

/// Anything that can invoke a function value: pushing a frame, dispatching
/// to a native callable or the evaluator, and reporting ok/throws. Object
/// methods that must call a getter/setter/`toString`/`valueOf` take this as
/// a parameter rather than depending on `crate::engine::Engine` directly,
/// keeping the object model ignorant of the evaluator/context-stack layers
/// that sit above it in the dependency order of spec §2.
pub trait Invoker {
    fn call(&mut self, callee: &ObjectRef, this: Value, args: &[Value]) -> EsResult<Value>;
    fn construct(&mut self, callee: &ObjectRef, args: &[Value]) -> EsResult<Value>;
    /// Interns a string, for on-the-fly property-key construction inside
    /// object-model algorithms (e.g. rendering an index key to a string
    /// property key for `Array` length coupling).
    fn intern(&mut self, s: &str) -> StrId;
    fn lookup_str(&self, id: StrId) -> String;
    fn throw(&mut self, kind: ErrorKind, message: impl Into<String>) -> Value;
    /// Type-erased downcast back to the concrete engine, for the rare native
    /// builtin (`eval`, `new Function(...)`) that needs evaluator-level
    /// capabilities (`crate::ops::Interp`) beyond what this trait exposes.
    /// Every `Invoker` in this crate is ultimately an `Engine`; builtins that
    /// use this reject any caller where the downcast fails rather than
    /// assuming it always succeeds.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

// ---------------------------------------------------------------------
// Property / descriptor
// ---------------------------------------------------------------------

#[derive(Clone)]
pub enum PropertyKind {
    Data { value: Value, writable: bool },
    Accessor { get: Option<ObjectRef>, set: Option<ObjectRef> },
}

#[derive(Clone)]
pub struct Property {
    pub kind: PropertyKind,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Property {
    pub fn data(value: Value, writable: bool, enumerable: bool, configurable: bool) -> Property {
        Property {
            kind: PropertyKind::Data { value, writable },
            enumerable,
            configurable,
        }
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self.kind, PropertyKind::Accessor { .. })
    }

    pub fn is_data(&self) -> bool {
        matches!(self.kind, PropertyKind::Data { .. })
    }
}

/// A partially-specified property used for define/update operations; any of
/// the six ES5 descriptor fields may be absent.
#[derive(Clone, Default)]
pub struct PropertyDescriptor {
    pub value: Option<Value>,
    pub writable: Option<bool>,
    pub get: Option<Value>,
    pub set: Option<Value>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    pub fn is_data_descriptor(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    pub fn is_accessor_descriptor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    pub fn is_generic(&self) -> bool {
        !self.is_data_descriptor() && !self.is_accessor_descriptor()
    }

    pub fn from_data(value: Value, writable: bool, enumerable: bool, configurable: bool) -> Self {
        PropertyDescriptor {
            value: Some(value),
            writable: Some(writable),
            get: None,
            set: None,
            enumerable: Some(enumerable),
            configurable: Some(configurable),
        }
    }
}

/// A resolved (base, slot) reference: `get_own_property`'s result,
/// independent of subsequent layout changes that don't touch this
/// particular slot (spec GLOSSARY "Property reference").
pub struct PropertyRef {
    pub slot: SlotRef,
}

// ---------------------------------------------------------------------
// Object kinds
// ---------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ClassTag {
    Object,
    Array,
    Arguments,
    Boolean,
    Number,
    String,
    Date,
    RegExp,
    Function,
    Error,
}

impl ClassTag {
    pub fn name(self) -> &'static str {
        match self {
            ClassTag::Object => "Object",
            ClassTag::Array => "Array",
            ClassTag::Arguments => "Arguments",
            ClassTag::Boolean => "Boolean",
            ClassTag::Number => "Number",
            ClassTag::String => "String",
            ClassTag::Date => "Date",
            ClassTag::RegExp => "RegExp",
            ClassTag::Function => "Function",
            ClassTag::Error => "Error",
        }
    }
}

pub type NativeFn = Rc<dyn Fn(&mut dyn Invoker, Value, &[Value]) -> EsResult<Value>>;

/// A parsed function body, supplied by the external parser/AST producer
/// (spec §1: "consumed as a black box"). Opaque to this crate's object
/// model; the evaluator (`eval.rs`) is the only consumer.
pub type AstBody = Rc<crate::ast::FunctionBody>;

pub enum FunctionKind {
    Native {
        func: NativeFn,
        /// Constructible natives (e.g. `Array`, `Object`, error
        /// constructors) set this; pure methods (`Math.abs`) do not.
        construct: Option<NativeFn>,
    },
    /// A function literal whose body is a parsed AST, evaluated by the
    /// tree-walker (spec §4.L) rather than by generated native code.
    Interpreted {
        body: AstBody,
        scope: crate::env::LexEnv,
        param_names: Vec<StrId>,
        uses_arguments: bool,
    },
    /// The result of `Function.prototype.bind`: captures `(target, this,
    /// prepended-args)` and forwards call/construct by prefixing the
    /// arguments (spec §4.G "FunctionBind").
    Bound {
        target: ObjectRef,
        bound_this: Value,
        bound_args: Vec<Value>,
    },
}

pub struct FunctionData {
    pub kind: FunctionKind,
    pub strict: bool,
    pub arity: u32,
}

pub struct ArrayData {
    /// The interned key for `"length"`, stashed here at construction so the
    /// length/element coupling logic never needs an `Invoker` just to
    /// resolve it.
    pub length_key: PropKey,
}

impl ArrayData {
    pub fn new(length_key: PropKey) -> ArrayData {
        ArrayData { length_key }
    }
}

/// Links a non-strict, non-shadowed formal parameter name to its live
/// storage slot, so mutation through `arguments[i]` and through the named
/// parameter binding stay in sync (spec §4.G "Arguments").
pub struct ArgumentsData {
    pub mapped: HashMap<u32, Slot>,
}

pub struct RegExpData {
    pub source: String,
    pub global: bool,
    pub ignore_case: bool,
    pub multiline: bool,
    #[cfg(feature = "regex")]
    pub compiled: Option<regex::Regex>,
}

pub enum ObjectKind {
    Plain,
    Array(ArrayData),
    Arguments(ArgumentsData),
    Boolean(bool),
    Number(f64),
    StringObj(StrId),
    Date(f64),
    RegExp(RegExpData),
    Function(FunctionData),
    Error(ErrorKind),
}

pub struct Obj {
    pub prototype: Option<ObjectRef>,
    pub class: ClassTag,
    pub extensible: bool,
    pub props: PropertyMap<Property>,
    pub indexed: IndexedArray<Property>,
    pub kind: ObjectKind,
}

impl Obj {
    pub fn new(class: ClassTag, prototype: Option<ObjectRef>, root: Shape, kind: ObjectKind) -> Obj {
        Obj {
            prototype,
            class,
            extensible: true,
            props: PropertyMap::new(root),
            indexed: IndexedArray::new(),
            kind,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }

    pub fn as_function(&self) -> Option<&FunctionData> {
        match &self.kind {
            ObjectKind::Function(f) => Some(f),
            _ => None,
        }
    }
}

/// A reference-counted, interior-mutable object handle. Cloning an
/// `ObjectRef` shares identity (pointer equality backs `Value`'s object
/// equality, see `value.rs`).
#[derive(Clone)]
pub struct ObjectRef(pub Rc<RefCell<Obj>>);

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl ObjectRef {
    pub fn new(obj: Obj) -> ObjectRef {
        ObjectRef(Rc::new(RefCell::new(obj)))
    }

    pub fn borrow(&self) -> Ref<'_, Obj> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Obj> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // -------------------------------------------------------------
    // §8.12 meta-object protocol
    // -------------------------------------------------------------

    /// Index keys query the indexed array; string keys query the property
    /// map. Own lookup only — does not walk the prototype chain.
    pub fn get_own_property(&self, key: PropKey) -> Option<Property> {
        let obj = self.borrow();
        if key.is_index() {
            obj.indexed.get(key.as_index()).cloned()
        } else {
            obj.props
                .lookup(key)
                .and_then(|slot| obj.props.get(slot))
                .cloned()
        }
    }

    /// Walks the prototype chain via `get_own_property`.
    pub fn get_property(&self, key: PropKey) -> Option<Property> {
        let mut cursor = self.clone();
        loop {
            if let Some(p) = cursor.get_own_property(key) {
                return Some(p);
            }
            let proto = cursor.borrow().prototype.clone();
            match proto {
                Some(p) => cursor = p,
                None => return None,
            }
        }
    }

    pub fn has_property(&self, key: PropKey) -> bool {
        self.get_property(key).is_some()
    }

    /// Own enumerable keys in `for-in` order: indexed properties ascending
    /// by index, then string-named properties in insertion order (spec §8
    /// scenario 5: "integer-named properties would be sorted first").
    pub fn own_enumerable_keys(&self) -> Vec<PropKey> {
        let obj = self.borrow();
        let mut keys: Vec<PropKey> = obj
            .indexed
            .iter()
            .filter(|(_, p)| p.enumerable)
            .map(|(i, _)| PropKey::from_u32(i))
            .collect();
        for key in obj.props.keys() {
            if let Some(p) = obj.props.lookup(key).and_then(|slot| obj.props.get(slot)) {
                if p.enumerable {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// `for-in` enumeration order (ES5 §12.6.4): own keys first, then each
    /// prototype's own keys in turn, skipping any key already seen on a
    /// closer object — a closer object's own property (enumerable or not)
    /// blocks a same-named enumerable property further up the chain.
    pub fn for_in_keys(&self) -> Vec<PropKey> {
        let mut seen = std::collections::HashSet::new();
        let mut result = Vec::new();
        let mut cursor = self.clone();
        loop {
            for key in cursor.own_enumerable_keys() {
                if !seen.contains(&key) {
                    result.push(key);
                }
            }
            {
                let obj = cursor.borrow();
                for (i, _) in obj.indexed.iter() {
                    seen.insert(PropKey::from_u32(i));
                }
                for key in obj.props.keys() {
                    seen.insert(key);
                }
            }
            let proto = cursor.borrow().prototype.clone();
            match proto {
                Some(p) => cursor = p,
                None => break,
            }
        }
        result
    }

    /// For a mapped `Arguments` index still linked to a live parameter
    /// slot, the slot (not the stored property value) is the live datum —
    /// spec §4.G: "a getter/setter pair on the map reads/writes the
    /// corresponding live stack slot". Simplified here from an actual
    /// accessor-property pair into a direct read/write-through at the
    /// `ObjectRef` method boundary (see DESIGN.md).
    fn arguments_slot(&self, key: PropKey) -> Option<Slot> {
        if !key.is_index() {
            return None;
        }
        match &self.borrow().kind {
            ObjectKind::Arguments(data) => data.mapped.get(&key.as_index()).cloned(),
            _ => None,
        }
    }

    /// `delete arguments[i]` unmaps `i` (ES5 §10.6 step 5): after deletion
    /// the property, if recreated, is a plain own data property no longer
    /// aliased to the parameter.
    fn arguments_unmap(&self, key: PropKey) {
        if !key.is_index() {
            return;
        }
        if let ObjectKind::Arguments(data) = &mut self.borrow_mut().kind {
            data.mapped.remove(&key.as_index());
        }
    }

    /// Resolves through `get_property`, then for an accessor property
    /// invokes the getter (pushing a 0-argument frame with `this` bound to
    /// `self`); for a data property, returns its value directly. A mapped
    /// `Arguments` index reads through to its aliased parameter slot first.
    pub fn get(&self, key: PropKey, inv: &mut dyn Invoker) -> EsResult<Value> {
        if let Some(slot) = self.arguments_slot(key) {
            if self.get_own_property(key).is_some() {
                return Ok(slot.borrow().clone());
            }
        }
        match self.get_property(key) {
            None => Ok(Value::Undefined),
            Some(Property {
                kind: PropertyKind::Data { value, .. },
                ..
            }) => Ok(value),
            Some(Property {
                kind: PropertyKind::Accessor { get, .. },
                ..
            }) => match get {
                Some(getter) => inv.call(&getter, Value::Object(self.clone()), &[]),
                None => Ok(Value::Undefined),
            },
        }
    }

    /// Implements §8.12.5 literally:
    /// 1. If no writable target exists and `throws`, raise `TypeError`;
    ///    else return silently.
    /// 2. If the found property is a data property owned by `self`, update
    ///    it in place.
    /// 3. If it is an inherited accessor, invoke the setter.
    /// 4. Otherwise create a new own data property `(true, true, true)`.
    pub fn put(&self, key: PropKey, value: Value, throws: bool, inv: &mut dyn Invoker) -> EsResult<()> {
        if let Some(own) = self.get_own_property(key) {
            match own.kind {
                PropertyKind::Data { writable, .. } => {
                    if !writable {
                        return reject(throws, inv, "assignment to read-only property");
                    }
                    if let Some(slot) = self.arguments_slot(key) {
                        *slot.borrow_mut() = value.clone();
                    }
                    self.set_own_data_value(key, value);
                    return Ok(());
                }
                PropertyKind::Accessor { set, .. } => {
                    return match set {
                        Some(setter) => inv
                            .call(&setter, Value::Object(self.clone()), &[value])
                            .map(|_| ()),
                        None => reject(throws, inv, "no setter for accessor property"),
                    };
                }
            }
        }

        // Not an own property: walk the prototype chain looking for an
        // inherited accessor or a non-writable inherited data property.
        let mut cursor = self.borrow().prototype.clone();
        while let Some(proto) = cursor {
            if let Some(found) = proto.get_own_property(key) {
                match found.kind {
                    PropertyKind::Accessor { set, .. } => {
                        return match set {
                            Some(setter) => inv
                                .call(&setter, Value::Object(self.clone()), &[value])
                                .map(|_| ()),
                            None => reject(throws, inv, "no setter for accessor property"),
                        };
                    }
                    PropertyKind::Data { writable, .. } => {
                        if !writable {
                            return reject(throws, inv, "assignment to read-only property");
                        }
                        break;
                    }
                }
            }
            cursor = proto.borrow().prototype.clone();
        }

        if !self.borrow().extensible {
            return reject(throws, inv, "object is not extensible");
        }
        self.define_own_property(
            key,
            PropertyDescriptor::from_data(value, true, true, true),
            throws,
            inv,
        )
        .map(|_| ())
    }

    fn set_own_data_value(&self, key: PropKey, value: Value) {
        let mut obj = self.borrow_mut();
        if key.is_index() {
            if let Some(p) = obj.indexed.get_mut(key.as_index()) {
                if let PropertyKind::Data { value: v, .. } = &mut p.kind {
                    *v = value;
                }
            }
        } else if let Some(slot) = obj.props.lookup(key) {
            if let Some(p) = obj.props.get_mut(slot) {
                if let PropertyKind::Data { value: v, .. } = &mut p.kind {
                    *v = value;
                }
            }
        }
    }

    pub fn can_put(&self, key: PropKey) -> bool {
        if let Some(own) = self.get_own_property(key) {
            return match own.kind {
                PropertyKind::Data { writable, .. } => writable,
                PropertyKind::Accessor { set, .. } => set.is_some(),
            };
        }
        match self.borrow().prototype.clone() {
            None => self.borrow().extensible,
            Some(proto) => proto.can_put(key),
        }
    }

    /// Removes configurable own properties; non-configurable yields
    /// `TypeError` when `throws`, else `false`.
    pub fn delete(&self, key: PropKey, throws: bool, inv: &mut dyn Invoker) -> EsResult<bool> {
        match self.get_own_property(key) {
            None => Ok(true),
            Some(p) if p.configurable => {
                {
                    let mut obj = self.borrow_mut();
                    if key.is_index() {
                        obj.indexed.remove(key.as_index());
                    } else {
                        obj.props.remove(key);
                    }
                }
                self.arguments_unmap(key);
                Ok(true)
            }
            Some(_) => {
                if throws {
                    Err(inv.throw(ErrorKind::TypeError, "property is non-configurable"))
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// §8.12.8: for the `string` hint, try `toString` then `valueOf`; for
    /// `number` (or `none`, except on `Date`, which flips to `string` for
    /// the default hint) try `valueOf` then `toString`. `TypeError` if
    /// neither returns a primitive.
    pub fn default_value(&self, hint: Hint, inv: &mut dyn Invoker) -> EsResult<Value> {
        let effective_hint = if hint == Hint::Default && self.borrow().class == ClassTag::Date {
            Hint::String
        } else {
            hint
        };

        let order: [&str; 2] = match effective_hint {
            Hint::String => ["toString", "valueOf"],
            _ => ["valueOf", "toString"],
        };

        for method_name in order {
            let key = PropKey::from_str_id(inv.intern(method_name));
            if let Ok(method) = self.get(key, inv) {
                if let Value::Object(f) = &method {
                    if f.borrow().is_callable() {
                        let result = inv.call(f, Value::Object(self.clone()), &[])?;
                        if result.is_primitive() {
                            return Ok(result);
                        }
                    }
                }
            }
        }
        Err(inv.throw(ErrorKind::TypeError, "cannot convert object to primitive value"))
    }

    /// §8.12.9 verbatim, including the (configurable, writable, value,
    /// getter/setter) field interactions, generic descriptors, and
    /// data<->accessor conversion. `Array` overrides this to also enforce
    /// length/element coupling (see `array_define_own_property`).
    pub fn define_own_property(
        &self,
        key: PropKey,
        desc: PropertyDescriptor,
        throws: bool,
        inv: &mut dyn Invoker,
    ) -> EsResult<bool> {
        if self.borrow().class == ClassTag::Array && key.is_string() {
            if inv.lookup_str(key.as_string()) == "length" {
                return self.array_set_length(desc, throws, inv);
            }
        }
        if self.borrow().class == ClassTag::Array && key.is_index() {
            let ok = self.define_own_property_raw(key, desc.clone(), false, inv)?;
            if ok {
                self.array_bump_length_for_index(key.as_index());
            } else if throws {
                return Err(inv.throw(ErrorKind::TypeError, "cannot define array element"));
            }
            return Ok(ok);
        }
        self.define_own_property_raw(key, desc, throws, inv)
    }

    fn define_own_property_raw(
        &self,
        key: PropKey,
        desc: PropertyDescriptor,
        throws: bool,
        inv: &mut dyn Invoker,
    ) -> EsResult<bool> {
        let current = self.get_own_property(key);

        let Some(current) = current else {
            if !self.borrow().extensible {
                return reject_bool(throws, inv, "object is not extensible");
            }
            let prop = if desc.is_accessor_descriptor() {
                Property {
                    kind: PropertyKind::Accessor {
                        get: as_function(&desc.get),
                        set: as_function(&desc.set),
                    },
                    enumerable: desc.enumerable.unwrap_or(false),
                    configurable: desc.configurable.unwrap_or(false),
                }
            } else {
                Property::data(
                    desc.value.unwrap_or(Value::Undefined),
                    desc.writable.unwrap_or(false),
                    desc.enumerable.unwrap_or(false),
                    desc.configurable.unwrap_or(false),
                )
            };
            self.install_own(key, prop);
            return Ok(true);
        };

        // 5. Return true if every present field of desc already matches
        // current (no-op update).
        if described_by(&current, &desc) {
            return Ok(true);
        }

        if !current.configurable {
            if desc.configurable == Some(true) {
                return reject_bool(throws, inv, "cannot redefine non-configurable property");
            }
            if let Some(en) = desc.enumerable {
                if en != current.enumerable {
                    return reject_bool(throws, inv, "cannot change enumerable on non-configurable property");
                }
            }
            if current.is_data() != desc.is_accessor_descriptor() && !desc.is_generic() {
                // switching data<->accessor requires configurable
                if current.is_data() && desc.is_accessor_descriptor() {
                    return reject_bool(throws, inv, "cannot convert data property to accessor");
                }
                if current.is_accessor() && desc.is_data_descriptor() {
                    return reject_bool(throws, inv, "cannot convert accessor property to data");
                }
            }
            if let PropertyKind::Data { writable: false, value } = &current.kind {
                if desc.writable == Some(true) {
                    return reject_bool(throws, inv, "cannot make non-configurable property writable");
                }
                if let Some(new_value) = &desc.value {
                    if !crate::value::same_value(value, new_value) {
                        return reject_bool(throws, inv, "cannot change value of non-writable property");
                    }
                }
            }
            if let PropertyKind::Accessor { get, set } = &current.kind {
                if let Some(new_get) = &desc.get {
                    if !same_accessor(get, new_get) {
                        return reject_bool(throws, inv, "cannot change getter of non-configurable accessor");
                    }
                }
                if let Some(new_set) = &desc.set {
                    if !same_accessor(set, new_set) {
                        return reject_bool(throws, inv, "cannot change setter of non-configurable accessor");
                    }
                }
            }
        }

        let merged = merge_descriptor(&current, &desc);
        self.install_own(key, merged);
        Ok(true)
    }

    fn install_own(&self, key: PropKey, prop: Property) {
        let mut obj = self.borrow_mut();
        if key.is_index() {
            obj.indexed.set(key.as_index(), prop);
        } else if let Some(slot) = obj.props.lookup(key) {
            if let Some(slot_prop) = obj.props.get_mut(slot) {
                *slot_prop = prop;
            }
        } else {
            obj.props.add(key, prop);
        }
    }

    // -------------------------------------------------------------
    // Array length/element coupling
    // -------------------------------------------------------------

    fn length_key(&self) -> PropKey {
        match &self.borrow().kind {
            ObjectKind::Array(a) => a.length_key,
            _ => panic!("array_length on non-array object"),
        }
    }

    pub fn array_length(&self) -> u32 {
        let key_len = self.length_key();
        match self.get_own_property(key_len) {
            Some(Property {
                kind: PropertyKind::Data { value, .. },
                ..
            }) => value.as_number() as u32,
            _ => 0,
        }
    }

    fn array_set_length(&self, desc: PropertyDescriptor, throws: bool, inv: &mut dyn Invoker) -> EsResult<bool> {
        let len_key = self.length_key();
        let new_len = match &desc.value {
            Some(v) => to_uint32(v),
            None => self.array_length(),
        };
        let old_len = self.array_length();

        if new_len < old_len {
            // Delete indices >= new_len in decreasing order, aborting if
            // any is non-configurable.
            let mut i = old_len;
            while i > new_len {
                i -= 1;
                let deleted = self.delete(PropKey::from_u32(i), false, inv)?;
                if !deleted {
                    let actual_len = i + 1;
                    self.install_own(
                        len_key,
                        Property::data(Value::from_u32(actual_len), desc.writable.unwrap_or(true), false, false),
                    );
                    return reject_bool(throws, inv, "cannot delete non-configurable array element");
                }
            }
        }

        let writable = desc.writable.unwrap_or_else(|| {
            matches!(
                self.get_own_property(len_key),
                Some(Property { kind: PropertyKind::Data { writable: true, .. }, .. })
            )
        });
        self.install_own(len_key, Property::data(Value::from_u32(new_len), writable, false, false));
        Ok(true)
    }

    fn array_bump_length_for_index(&self, index: u32) {
        let len_key = self.length_key();
        let Some(Property {
            kind: PropertyKind::Data { value, writable },
            ..
        }) = self.get_own_property(len_key)
        else {
            return;
        };
        let len = value.as_number() as u32;
        if index >= len {
            if !writable {
                return;
            }
            self.install_own(len_key, Property::data(Value::from_u32(index + 1), true, false, false));
        }
    }

    // -------------------------------------------------------------
    // Function: call / construct / has_instance
    // -------------------------------------------------------------

    /// `call(frame, flags)`: dispatches to a native entry point, the
    /// evaluator (for an AST body), or a bound-function forward.
    pub fn call(&self, this: Value, args: &[Value], inv: &mut dyn Invoker) -> EsResult<Value> {
        // Snapshot which dispatch path to take before calling back into
        // `inv`, so we never hold the `RefCell` borrow across a reentrant
        // call (a getter invoked mid-call could re-enter this same object).
        let snapshot = {
            let obj = self.borrow();
            match obj.as_function() {
                None => return Err(inv.throw(ErrorKind::TypeError, "value is not callable")),
                Some(FunctionData {
                    kind: FunctionKind::Native { func, .. },
                    ..
                }) => CallPlan::Native(func.clone()),
                Some(FunctionData {
                    kind:
                        FunctionKind::Bound {
                            target,
                            bound_this,
                            bound_args,
                        },
                    ..
                }) => CallPlan::Bound(target.clone(), bound_this.clone(), bound_args.clone()),
                Some(FunctionData {
                    kind: FunctionKind::Interpreted { .. },
                    ..
                }) => CallPlan::Interpreted,
            }
        };

        match snapshot {
            CallPlan::Native(func) => func(inv, this, args),
            CallPlan::Bound(target, bound_this, mut bound_args) => {
                bound_args.extend_from_slice(args);
                target.call(bound_this, &bound_args, inv)
            }
            CallPlan::Interpreted => inv.call(self, this, args),
        }
    }

    /// `construct(frame)`: creates an object with prototype taken from the
    /// function's `prototype` property (or `Object.prototype`), sets it as
    /// `this`, invokes `call`, and returns the result if it is an object,
    /// else the constructed object.
    pub fn construct(&self, args: &[Value], object_proto: ObjectRef, root: Shape, inv: &mut dyn Invoker) -> EsResult<Value> {
        let is_bound = matches!(self.borrow().as_function(), Some(FunctionData { kind: FunctionKind::Bound { .. }, .. }));
        if is_bound {
            let (target, bound_args) = {
                let obj = self.borrow();
                match &obj.as_function().unwrap().kind {
                    FunctionKind::Bound { target, bound_args, .. } => (target.clone(), bound_args.clone()),
                    _ => unreachable!(),
                }
            };
            let mut all_args = bound_args;
            all_args.extend_from_slice(args);
            return target.construct(&all_args, object_proto, root, inv);
        }

        let proto_key = PropKey::from_str_id(inv.intern("prototype"));
        let proto = match self.get(proto_key, inv)? {
            Value::Object(o) => o,
            _ => object_proto,
        };
        let new_obj = ObjectRef::new(Obj::new(ClassTag::Object, Some(proto), root, ObjectKind::Plain));
        let result = self.call(Value::Object(new_obj.clone()), args, inv)?;
        match result {
            Value::Object(o) => Ok(Value::Object(o)),
            _ => Ok(Value::Object(new_obj)),
        }
    }

    /// Walks `v`'s prototype chain looking for the function's `prototype`
    /// object.
    pub fn has_instance(&self, v: &Value, inv: &mut dyn Invoker) -> EsResult<bool> {
        let Value::Object(v_obj) = v else {
            return Ok(false);
        };
        let proto_key = PropKey::from_str_id(inv.intern("prototype"));
        let target_proto = match self.get(proto_key, inv)? {
            Value::Object(o) => o,
            _ => return Err(inv.throw(ErrorKind::TypeError, "prototype is not an object")),
        };
        let mut cursor = v_obj.borrow().prototype.clone();
        while let Some(proto) = cursor {
            if proto.ptr_eq(&target_proto) {
                return Ok(true);
            }
            cursor = proto.borrow().prototype.clone();
        }
        Ok(false)
    }
}

enum CallPlan {
    Native(NativeFn),
    Bound(ObjectRef, Value, Vec<Value>),
    Interpreted,
}

/// ES5 ToUint32 (§9.6), restricted to the finite, in-range inputs that
/// reach here from a `length` assignment's already-ToNumber-converted
/// descriptor value. Full ToUint32 (wraparound for out-of-range doubles)
/// belongs to the conversions module; array lengths in practice only ever
/// carry values produced by that conversion, so this mirrors it directly
/// rather than depending on the not-yet-assembled operations layer.
fn to_uint32(v: &Value) -> u32 {
    let n = v.as_number();
    if !n.is_finite() {
        return 0;
    }
    let n = n.trunc();
    let m = n.rem_euclid(4294967296.0);
    m as u32
}

fn as_function(v: &Option<Value>) -> Option<ObjectRef> {
    match v {
        Some(Value::Object(o)) if o.borrow().is_callable() => Some(o.clone()),
        _ => None,
    }
}

fn same_accessor(current: &Option<ObjectRef>, new: &Value) -> bool {
    match (current, new) {
        (None, Value::Undefined) => true,
        (Some(a), Value::Object(b)) => a.ptr_eq(b),
        _ => false,
    }
}

fn reject(throws: bool, inv: &mut dyn Invoker, msg: &str) -> EsResult<()> {
    if throws {
        Err(inv.throw(ErrorKind::TypeError, msg))
    } else {
        Ok(())
    }
}

fn reject_bool(throws: bool, inv: &mut dyn Invoker, msg: &str) -> EsResult<bool> {
    if throws {
        Err(inv.throw(ErrorKind::TypeError, msg))
    } else {
        Ok(false)
    }
}

/// Compares every field present in `desc` to `current` using `SameValue`
/// for value/getter/setter and strict equality for flags — §8.12.9 step 5.
fn described_by(current: &Property, desc: &PropertyDescriptor) -> bool {
    if let Some(en) = desc.enumerable {
        if en != current.enumerable {
            return false;
        }
    }
    if let Some(co) = desc.configurable {
        if co != current.configurable {
            return false;
        }
    }
    match &current.kind {
        PropertyKind::Data { value, writable } => {
            if desc.is_accessor_descriptor() {
                return false;
            }
            if let Some(w) = desc.writable {
                if w != *writable {
                    return false;
                }
            }
            if let Some(v) = &desc.value {
                if !crate::value::same_value(v, value) {
                    return false;
                }
            }
            true
        }
        PropertyKind::Accessor { get, set } => {
            if desc.is_data_descriptor() {
                return false;
            }
            if let Some(g) = &desc.get {
                if !same_accessor(get, g) {
                    return false;
                }
            }
            if let Some(s) = &desc.set {
                if !same_accessor(set, s) {
                    return false;
                }
            }
            true
        }
    }
}

fn merge_descriptor(current: &Property, desc: &PropertyDescriptor) -> Property {
    let enumerable = desc.enumerable.unwrap_or(current.enumerable);
    let configurable = desc.configurable.unwrap_or(current.configurable);

    if desc.is_accessor_descriptor() || (current.is_accessor() && desc.is_generic()) {
        let (cur_get, cur_set) = match &current.kind {
            PropertyKind::Accessor { get, set } => (get.clone(), set.clone()),
            PropertyKind::Data { .. } => (None, None),
        };
        Property {
            kind: PropertyKind::Accessor {
                get: desc.get.as_ref().and_then(as_function).or(cur_get),
                set: desc.set.as_ref().and_then(as_function).or(cur_set),
            },
            enumerable,
            configurable,
        }
    } else {
        let (cur_value, cur_writable) = match &current.kind {
            PropertyKind::Data { value, writable } => (value.clone(), *writable),
            PropertyKind::Accessor { .. } => (Value::Undefined, false),
        };
        Property {
            kind: PropertyKind::Data {
                value: desc.value.clone().unwrap_or(cur_value),
                writable: desc.writable.unwrap_or(cur_writable),
            },
            enumerable,
            configurable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strpool::StringPool;

    struct NullInvoker {
        pool: StringPool,
    }
    impl Invoker for NullInvoker {
        fn call(&mut self, _callee: &ObjectRef, _this: Value, _args: &[Value]) -> EsResult<Value> {
            Ok(Value::Undefined)
        }
        fn construct(&mut self, _callee: &ObjectRef, _args: &[Value]) -> EsResult<Value> {
            Ok(Value::Undefined)
        }
        fn intern(&mut self, s: &str) -> StrId {
            self.pool.intern(s)
        }
        fn lookup_str(&self, id: StrId) -> String {
            self.pool.lookup(id).to_owned()
        }
        fn throw(&mut self, kind: ErrorKind, message: impl Into<String>) -> Value {
            let _ = kind;
            Value::String(self.pool.intern(&message.into()))
        }
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    fn new_plain(_inv: &mut NullInvoker) -> ObjectRef {
        ObjectRef::new(Obj::new(ClassTag::Object, None, Shape::root(), ObjectKind::Plain))
    }

    #[test]
    fn get_put_own_data_property() {
        let mut inv = NullInvoker { pool: StringPool::new() };
        let obj = new_plain(&mut inv);
        let key = PropKey::from_str_id(inv.intern("x"));
        obj.put(key, Value::from_i32(1), true, &mut inv).unwrap();
        assert_eq!(obj.get(key, &mut inv).unwrap(), Value::from_i32(1));
    }

    #[test]
    fn non_writable_put_is_silently_ignored_when_not_throwing() {
        let mut inv = NullInvoker { pool: StringPool::new() };
        let obj = new_plain(&mut inv);
        let key = PropKey::from_str_id(inv.intern("y"));
        obj.define_own_property(key, PropertyDescriptor::from_data(Value::from_i32(2), false, true, false), true, &mut inv)
            .unwrap();
        obj.put(key, Value::from_i32(9), false, &mut inv).unwrap();
        assert_eq!(obj.get(key, &mut inv).unwrap(), Value::from_i32(2));
    }

    #[test]
    fn non_writable_put_throws_when_requested() {
        let mut inv = NullInvoker { pool: StringPool::new() };
        let obj = new_plain(&mut inv);
        let key = PropKey::from_str_id(inv.intern("y"));
        obj.define_own_property(key, PropertyDescriptor::from_data(Value::from_i32(2), false, true, false), true, &mut inv)
            .unwrap();
        assert!(obj.put(key, Value::from_i32(9), true, &mut inv).is_err());
    }

    #[test]
    fn delete_configurable_property() {
        let mut inv = NullInvoker { pool: StringPool::new() };
        let obj = new_plain(&mut inv);
        let key = PropKey::from_str_id(inv.intern("z"));
        obj.put(key, Value::from_i32(1), true, &mut inv).unwrap();
        assert!(obj.delete(key, true, &mut inv).unwrap());
        assert!(obj.get_own_property(key).is_none());
    }

    #[test]
    fn delete_non_configurable_throws() {
        let mut inv = NullInvoker { pool: StringPool::new() };
        let obj = new_plain(&mut inv);
        let key = PropKey::from_str_id(inv.intern("z"));
        obj.define_own_property(key, PropertyDescriptor::from_data(Value::from_i32(1), true, true, false), true, &mut inv)
            .unwrap();
        assert!(obj.delete(key, true, &mut inv).is_err());
        assert!(!obj.delete(key, false, &mut inv).unwrap());
    }

    #[test]
    fn prototype_chain_get_property() {
        let mut inv = NullInvoker { pool: StringPool::new() };
        let proto = new_plain(&mut inv);
        let key = PropKey::from_str_id(inv.intern("inherited"));
        proto.put(key, Value::from_i32(42), true, &mut inv).unwrap();

        let child = ObjectRef::new(Obj::new(ClassTag::Object, Some(proto), Shape::root(), ObjectKind::Plain));
        assert_eq!(child.get(key, &mut inv).unwrap(), Value::from_i32(42));
        assert!(child.get_own_property(key).is_none());
    }

    #[test]
    fn array_length_grows_on_index_assignment() {
        let mut inv = NullInvoker { pool: StringPool::new() };
        let length_key = PropKey::from_str_id(inv.intern("length"));
        let arr = ObjectRef::new(Obj::new(
            ClassTag::Array,
            None,
            Shape::root(),
            ObjectKind::Array(ArrayData::new(length_key)),
        ));
        arr.install_own(length_key, Property::data(Value::from_u32(0), true, false, false));
        arr.define_own_property(PropKey::from_u32(5), PropertyDescriptor::from_data(Value::from_i32(1), true, true, true), true, &mut inv)
            .unwrap();
        assert_eq!(arr.array_length(), 6);
    }
}
