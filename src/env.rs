//! Lexical environments and environment records
//!
//! A lexical environment is an environment record plus an outer pointer;
//! records come in two kinds: declarative (a name-to-slot table, used for
//! function locals, `catch` parameters, and `let`-shaped bindings) and
//! object (wraps an ordinary object's own properties as bindings, used for
//! the global environment and `with`).
//!
//! Structurally ported from `original_source/runtime/environment.hh`
//! (`EsDeclarativeEnvironmentRecord`/`EsObjectEnvironmentRecord`/
//! `EsLexicalEnvironment`); the `link_mutable_binding`/
//! `link_immutable_binding` linked-storage variants map onto this crate's
//! `value::Slot` aliasing (see `value.rs`'s doc comment) rather than a raw
//! `EsValue*`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{ErrorKind, EsResult};
use crate::object::{Invoker, ObjectRef};
use crate::propkey::PropKey;
use crate::value::{new_slot, Slot, Value};

struct Binding {
    slot: Slot,
    mutable_: bool,
    deletable: bool,
    /// A binding can be declared (hoisted) before it is initialized; ES5
    /// itself has no temporal-dead-zone concept, but `catch`/named function
    /// expression bindings still distinguish "exists" from "has a value"
    /// during `eval`'s declaration-binding instantiation pass.
    initialized: bool,
}

pub struct DeclarativeRecord {
    bindings: HashMap<PropKey, Binding>,
}

impl DeclarativeRecord {
    pub fn new() -> DeclarativeRecord {
        DeclarativeRecord {
            bindings: HashMap::new(),
        }
    }

    pub fn has_binding(&self, n: PropKey) -> bool {
        self.bindings.contains_key(&n)
    }

    /// Creates a binding linked to an externally-owned `Slot`. If a binding
    /// for `n` already exists and `inherit` is set, the existing value is
    /// copied into the new slot before the link replaces it (spec §4.H:
    /// parameter re-declaration by a nested `var` inherits the argument's
    /// current value).
    pub fn link_mutable_binding(&mut self, n: PropKey, deletable: bool, slot: Slot, inherit: bool) {
        if inherit {
            if let Some(existing) = self.bindings.get(&n) {
                *slot.borrow_mut() = existing.slot.borrow().clone();
            }
        }
        self.bindings.insert(
            n,
            Binding {
                slot,
                mutable_: true,
                deletable,
                initialized: true,
            },
        );
    }

    pub fn link_immutable_binding(&mut self, n: PropKey, slot: Slot) {
        self.bindings.insert(
            n,
            Binding {
                slot,
                mutable_: false,
                deletable: false,
                initialized: true,
            },
        );
    }

    pub fn create_mutable_binding(&mut self, n: PropKey, deletable: bool) {
        self.bindings.entry(n).or_insert_with(|| Binding {
            slot: new_slot(Value::Undefined),
            mutable_: true,
            deletable,
            initialized: true,
        });
    }

    /// `catch` bindings and named function expressions create an
    /// uninitialized immutable binding first, then initialize it
    /// separately, so an identifier reference before initialization is
    /// distinguishable (spec §4.H, ES5 §10.5).
    pub fn create_immutable_binding(&mut self, n: PropKey) {
        self.bindings.insert(
            n,
            Binding {
                slot: new_slot(Value::Undefined),
                mutable_: false,
                deletable: false,
                initialized: false,
            },
        );
    }

    pub fn initialize_immutable_binding(&mut self, n: PropKey, v: Value) {
        if let Some(b) = self.bindings.get_mut(&n) {
            *b.slot.borrow_mut() = v;
            b.initialized = true;
        }
    }

    pub fn set_mutable_binding(&mut self, n: PropKey, v: Value, strict: bool, inv: &mut dyn Invoker) -> EsResult<()> {
        match self.bindings.get(&n) {
            Some(b) if b.mutable_ => {
                *b.slot.borrow_mut() = v;
                Ok(())
            }
            Some(_) if strict => Err(inv.throw(ErrorKind::TypeError, "assignment to immutable binding")),
            Some(_) => Ok(()),
            None => {
                self.create_mutable_binding(n, true);
                self.bindings.get(&n).unwrap().slot.replace(v);
                Ok(())
            }
        }
    }

    pub fn get_binding_value(&self, n: PropKey, strict: bool, inv: &mut dyn Invoker) -> EsResult<Value> {
        match self.bindings.get(&n) {
            Some(b) if b.initialized => Ok(b.slot.borrow().clone()),
            Some(_) if strict => Err(inv.throw(ErrorKind::ReferenceError, "binding is not initialized")),
            Some(_) => Ok(Value::Undefined),
            None if strict => Err(inv.throw(ErrorKind::ReferenceError, "binding does not exist")),
            None => Ok(Value::Undefined),
        }
    }

    pub fn delete_binding(&mut self, n: PropKey) -> bool {
        match self.bindings.get(&n) {
            None => true,
            Some(b) if b.deletable => {
                self.bindings.remove(&n);
                true
            }
            Some(_) => false,
        }
    }

    pub fn implicit_this_value(&self) -> Value {
        Value::Undefined
    }

    /// Exposes the live slot for a binding, used by `frame.rs` to alias
    /// formal parameters into the `arguments` object's parameter map.
    pub fn slot_of(&self, n: PropKey) -> Option<Slot> {
        self.bindings.get(&n).map(|b| b.slot.clone())
    }
}

impl Default for DeclarativeRecord {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ObjectRecord {
    pub binding_object: ObjectRef,
    /// `with` statements set this false; the global environment sets it
    /// true (spec §4.H, ES5 §10.2.1.2).
    pub provide_this: bool,
}

impl ObjectRecord {
    pub fn has_binding(&self, n: PropKey) -> bool {
        self.binding_object.has_property(n)
    }

    pub fn create_mutable_binding(&self, n: PropKey, deletable: bool, inv: &mut dyn Invoker) -> EsResult<()> {
        use crate::object::PropertyDescriptor;
        self.binding_object.define_own_property(
            n,
            PropertyDescriptor::from_data(Value::Undefined, true, true, deletable),
            true,
            inv,
        )?;
        Ok(())
    }

    pub fn set_mutable_binding(&self, n: PropKey, v: Value, strict: bool, inv: &mut dyn Invoker) -> EsResult<()> {
        self.binding_object.put(n, v, strict, inv)
    }

    pub fn get_binding_value(&self, n: PropKey, strict: bool, inv: &mut dyn Invoker) -> EsResult<Value> {
        if !self.binding_object.has_property(n) {
            return if strict {
                Err(inv.throw(ErrorKind::ReferenceError, "binding does not exist"))
            } else {
                Ok(Value::Undefined)
            };
        }
        self.binding_object.get(n, inv)
    }

    pub fn delete_binding(&self, n: PropKey, inv: &mut dyn Invoker) -> EsResult<bool> {
        self.binding_object.delete(n, false, inv)
    }

    pub fn implicit_this_value(&self) -> Value {
        if self.provide_this {
            Value::Object(self.binding_object.clone())
        } else {
            Value::Undefined
        }
    }
}

pub enum EnvRecord {
    Declarative(RefCell<DeclarativeRecord>),
    Object(ObjectRecord),
}

impl EnvRecord {
    pub fn has_binding(&self, n: PropKey) -> bool {
        match self {
            EnvRecord::Declarative(r) => r.borrow().has_binding(n),
            EnvRecord::Object(r) => r.has_binding(n),
        }
    }

    pub fn implicit_this_value(&self) -> Value {
        match self {
            EnvRecord::Declarative(r) => r.borrow().implicit_this_value(),
            EnvRecord::Object(r) => r.implicit_this_value(),
        }
    }

    pub fn get_binding_value(&self, n: PropKey, strict: bool, inv: &mut dyn Invoker) -> EsResult<Value> {
        match self {
            EnvRecord::Declarative(r) => r.borrow().get_binding_value(n, strict, inv),
            EnvRecord::Object(r) => r.get_binding_value(n, strict, inv),
        }
    }

    pub fn set_mutable_binding(&self, n: PropKey, v: Value, strict: bool, inv: &mut dyn Invoker) -> EsResult<()> {
        match self {
            EnvRecord::Declarative(r) => r.borrow_mut().set_mutable_binding(n, v, strict, inv),
            EnvRecord::Object(r) => r.set_mutable_binding(n, v, strict, inv),
        }
    }

    pub fn delete_binding(&self, n: PropKey, inv: &mut dyn Invoker) -> EsResult<bool> {
        match self {
            EnvRecord::Declarative(r) => Ok(r.borrow_mut().delete_binding(n)),
            EnvRecord::Object(r) => r.delete_binding(n, inv),
        }
    }

    pub fn as_declarative(&self) -> Option<&RefCell<DeclarativeRecord>> {
        match self {
            EnvRecord::Declarative(r) => Some(r),
            _ => None,
        }
    }
}

struct LexEnvNode {
    outer: Option<LexEnv>,
    record: EnvRecord,
}

/// A lexical environment: an environment record plus a pointer to the
/// enclosing environment. Reference-counted so closures can capture their
/// defining environment independent of the call frame that created it
/// (spec §4.H/§4.J).
#[derive(Clone)]
pub struct LexEnv(Rc<LexEnvNode>);

impl LexEnv {
    pub fn new_decl_env(outer: Option<LexEnv>) -> LexEnv {
        LexEnv(Rc::new(LexEnvNode {
            outer,
            record: EnvRecord::Declarative(RefCell::new(DeclarativeRecord::new())),
        }))
    }

    pub fn new_obj_env(binding_object: ObjectRef, outer: Option<LexEnv>, provide_this: bool) -> LexEnv {
        LexEnv(Rc::new(LexEnvNode {
            outer,
            record: EnvRecord::Object(ObjectRecord {
                binding_object,
                provide_this,
            }),
        }))
    }

    pub fn outer(&self) -> Option<LexEnv> {
        self.0.outer.clone()
    }

    pub fn record(&self) -> &EnvRecord {
        &self.0.record
    }

    /// Resolves an identifier through the environment chain, returning the
    /// environment record that binds it (the rest of identifier resolution
    /// -- GetValue/PutValue -- lives in `ops.rs` on top of this).
    pub fn resolve(&self, n: PropKey) -> Option<LexEnv> {
        let mut cursor = self.clone();
        loop {
            if cursor.0.record.has_binding(n) {
                return Some(cursor);
            }
            match cursor.0.outer.clone() {
                Some(outer) => cursor = outer,
                None => return None,
            }
        }
    }
}

/// `GetThisValue` per `original_source/runtime/environment.cc`: walk
/// outward to the first environment record whose `implicit_this_value` is
/// defined via its own binding object, or fall back to `undefined` at the
/// global scope boundary. In practice every `LexEnv`'s record already
/// answers `implicit_this_value` directly, so this is a thin wrapper kept
/// for symmetry with the original's free function.
pub fn get_this_value(env: &LexEnv) -> Value {
    env.record().implicit_this_value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::object::{Obj, ObjectKind, ClassTag};
    use crate::shape::Shape;
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
        fn intern(&mut self, s: &str) -> crate::strpool::StrId {
            self.pool.intern(s)
        }
        fn lookup_str(&self, id: crate::strpool::StrId) -> String {
            self.pool.lookup(id).to_owned()
        }
        fn throw(&mut self, _kind: ErrorKind, message: impl Into<String>) -> Value {
            Value::String(self.pool.intern(&message.into()))
        }
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    #[test]
    fn declarative_binding_round_trips() {
        let mut inv = NullInvoker { pool: StringPool::new() };
        let env = LexEnv::new_decl_env(None);
        let key = PropKey::from_str_id(inv.intern("x"));
        if let EnvRecord::Declarative(r) = env.record() {
            r.borrow_mut().create_mutable_binding(key, true);
        }
        env.record().set_mutable_binding(key, Value::from_i32(5), false, &mut inv).unwrap();
        assert_eq!(env.record().get_binding_value(key, false, &mut inv).unwrap(), Value::from_i32(5));
    }

    #[test]
    fn outer_chain_resolves_through_nesting() {
        let mut inv = NullInvoker { pool: StringPool::new() };
        let outer = LexEnv::new_decl_env(None);
        let key = PropKey::from_str_id(inv.intern("y"));
        if let EnvRecord::Declarative(r) = outer.record() {
            r.borrow_mut().create_mutable_binding(key, true);
        }
        let inner = LexEnv::new_decl_env(Some(outer));
        assert!(inner.resolve(key).is_some());
        let missing = PropKey::from_str_id(inv.intern("z"));
        assert!(inner.resolve(missing).is_none());
    }

    #[test]
    fn object_environment_delegates_to_binding_object() {
        let mut inv = NullInvoker { pool: StringPool::new() };
        let global_obj = ObjectRef::new(Obj::new(ClassTag::Object, None, Shape::root(), ObjectKind::Plain));
        let env = LexEnv::new_obj_env(global_obj.clone(), None, true);
        let key = PropKey::from_str_id(inv.intern("g"));
        env.record().set_mutable_binding(key, Value::from_i32(7), false, &mut inv).unwrap();
        assert_eq!(global_obj.get(key, &mut inv).unwrap(), Value::from_i32(7));
        assert_eq!(get_this_value(&env), Value::Object(global_obj));
    }

    #[test]
    fn with_environment_does_not_provide_this() {
        let obj = ObjectRef::new(Obj::new(ClassTag::Object, None, Shape::root(), ObjectKind::Plain));
        let env = LexEnv::new_obj_env(obj, None, false);
        assert_eq!(get_this_value(&env), Value::Undefined);
    }
}
