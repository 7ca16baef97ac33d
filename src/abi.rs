//! Runtime ABI: the linkage surface compiler-generated native code targets
//!
//! Generated code never touches `Engine`, `ObjectRef`, or any other Rust
//! type directly — it only ever holds an opaque `*mut EsrEngine`, `u64`
//! value bits, and `usize` call-stack indices, and calls the `extern "C"`
//! functions in this file. Everything above this line (`engine.rs`,
//! `context.rs`, `object.rs`, `ops.rs`, ...) is the interpreter's own
//! business; this file is the only place that crosses the FFI edge.
//!
//! Grounded on `original_source/runtime/ecma_vm.cc` / `operation.cc`'s flat
//! C-callable entry points (`EsOperations::*`, `_ES_ARG`/`_ES_VP` macro
//! family) and on this crate's own `frame.rs` (the `fp`/`vp`/HEADER_LEN
//! convention) and `cache.rs` (the inline-cache tables a callsite `cid`
//! indexes into). A compiled function is represented to the rest of the
//! engine as an ordinary `FunctionKind::Native` object — the trampoline in
//! `invoke_compiled` below is the only place that knows it is secretly a
//! raw function pointer (see DESIGN.md "Native function representation").

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::rc::Rc;

use crate::engine::{Engine, EngineOptions};
use crate::env::{EnvRecord, LexEnv};
use crate::error::ErrorKind;
use crate::frame::HEADER_LEN;
use crate::object::{ClassTag, Invoker, NativeFn, Obj, ObjectKind, ObjectRef, Property, PropertyDescriptor, PropertyKind};
use crate::ops::{self, Interp};
use crate::propkey::PropKey;
use crate::stdlib::regexp_ctor;
use crate::stdlib::support::native_constructor;
use crate::strpool::StrId;
use crate::value::{new_slot, Slot, Value};

/// The signature generated code exposes for every ES5 function body,
/// matching spec §6's native function signature verbatim: `ctx` is the
/// opaque engine handle, `fp` and `vp` are call-stack indices (`vp = fp +
/// argc + 3`, this crate's rendering of the header-relative pointer
/// arithmetic), and the return value is `0` on success / `-1` on a thrown
/// exception (consult `ex_load_state`/the pending-exception slot).
pub type RawFn = extern "C" fn(ctx: *mut EsrEngine, argc: usize, fp: usize, vp: usize) -> i32;

/// A live `for-in` enumeration, snapshotted at `prp_it_new` time (ES5
/// §12.6.4: mutating the object mid-loop must not perturb an
/// already-taken snapshot of its enumerable-key set).
struct PropIter {
    obj: ObjectRef,
    keys: Vec<PropKey>,
    pos: usize,
}

/// The opaque engine handle generated code carries across every ABI call.
/// `Engine` holds everything the tree-walking evaluator needs;
/// `extra_stack` and `iterators` are the two side tables this ABI layer
/// adds on top, for closure upvalues and live `for-in` cursors
/// respectively — neither has an evaluator-side counterpart, since the
/// tree walker never needs either (see DESIGN.md).
pub struct EsrEngine {
    engine: Engine,
    last_error: Option<CString>,
    /// One entry per active compiled-function call, holding the slots that
    /// function's own closures (if any) capture as upvalues. Indexed
    /// `bnd_extra_ptr`'s `hops` from the top, absolute index handed back to
    /// the caller so `bnd_extra_get`/`bnd_extra_set` can address it without
    /// re-walking.
    extra_stack: Vec<Vec<Slot>>,
    iterators: Vec<Option<PropIter>>,
}

impl EsrEngine {
    fn engine(&mut self) -> &mut Engine {
        &mut self.engine
    }
}

// ---------------------------------------------------------------------
// Value <-> bits, small helpers
// ---------------------------------------------------------------------

/// Reconstructs a `Value` from wire bits. Every call site here receives
/// bits that were either produced by `Value::bits()` moments earlier by
/// the same generated code, or read back out of a call-stack slot this
/// engine itself populated — both uphold `from_bits`'s safety requirement
/// that an object payload's `Rc` is still alive somewhere.
unsafe fn val(bits: u64) -> Value {
    unsafe { Value::from_bits(bits) }
}

/// Property keys cross the ABI as `(is_string, payload)` rather than a raw
/// `u64`, since `PropKey`'s packed representation is a private
/// implementation detail of `propkey.rs` (spec §4.C keeps the bit layout
/// internal to the runtime, only the key *value* is part of the generated
/// code's contract).
fn decode_key(is_string: i32, payload: u32) -> PropKey {
    if is_string != 0 {
        PropKey::from_str_id(StrId(payload))
    } else {
        PropKey::from_u32(payload)
    }
}

/// Clones the current boxing prototypes out of the engine so `to_object`
/// can be called alongside a separate `&mut` borrow of the engine itself
/// (mirrors `eval.rs`'s own `boxing_snapshot`, private to that module).
fn boxing_snapshot(engine: &Engine) -> ops::BoxingPrototypes {
    let p = engine.protos();
    ops::BoxingPrototypes {
        object: p.object.clone(),
        boolean: p.boolean.clone(),
        number: p.number.clone(),
        string: p.string.clone(),
    }
}

fn set_last_error(esr: &mut EsrEngine, message: String) {
    esr.last_error = CString::new(message).ok();
}

/// Converts a caught `EsResult` error into the ABI's `0`/`-1` convention,
/// stashing the thrown value as the current context's pending exception
/// (when one is live) and as `esr_error`'s human-readable text.
fn fail(esr: &mut EsrEngine, thrown: Value) -> i32 {
    let message = ops::to_string(&thrown, &mut esr.engine).unwrap_or_else(|_| "<error formatting thrown value>".to_string());
    set_last_error(esr, message);
    if esr.engine.ctx.depth() > 0 {
        esr.engine.ctx.current_mut().set_exception(thrown);
    }
    -1
}

// ---------------------------------------------------------------------
// esr_init / esr_run / esr_error / esr_free / esr_intern
// ---------------------------------------------------------------------

/// Installs pre-interned string ids the compiled program's identifier
/// constants are numbered against (spec §6: "the identifier constants of
/// the compiled program must match the runtime's interning decisions").
pub type GlobalDataEntry = extern "C" fn(ctx: *mut EsrEngine);

/// `esr_init`: builds the engine (string pool, shape root, prototype
/// bootstrap), then — if supplied — calls `global_data_entry` so the host
/// program can intern its compile-time string constants via `esr_intern`
/// before any generated code runs.
#[no_mangle]
pub extern "C" fn esr_init(global_data_entry: Option<GlobalDataEntry>) -> *mut EsrEngine {
    let engine = Engine::new(EngineOptions::default());
    let esr = Box::new(EsrEngine {
        engine,
        last_error: None,
        extra_stack: Vec::new(),
        iterators: Vec::new(),
    });
    let ptr = Box::into_raw(esr);
    if let Some(entry) = global_data_entry {
        entry(ptr);
    }
    ptr
}

/// `esr_run`: pushes the global execution context and invokes
/// `main_entry`, the compiled program's top-level function, as a
/// zero-argument call with `this` bound to the global object (ES5
/// §10.4.1).
#[no_mangle]
pub extern "C" fn esr_run(ctx: *mut EsrEngine, main_entry: RawFn) -> i32 {
    let esr = unsafe { &mut *ctx };
    let global_env = esr.engine.global_env.clone();
    esr.engine.ctx.push_global(false, global_env);

    let base = esr.engine.call_stack.alloc(HEADER_LEN);
    esr.engine.call_stack.set(base + 1, Value::Object(esr.engine.global_object.clone()));
    let vp = base + HEADER_LEN;

    let status = main_entry(ctx, 0, base, vp);

    let result = if status == 0 {
        0
    } else {
        let thrown = esr.engine.ctx.current_mut().take_exception().unwrap_or(Value::Undefined);
        let err = esr.engine.describe_uncaught(&thrown);
        set_last_error(esr, format!("{err}"));
        -1
    };
    esr.engine.ctx.pop();
    esr.engine.call_stack.free(base);
    result
}

/// `esr_error`: the last error message recorded by a failing ABI call, or
/// null if none has occurred yet. The returned pointer is owned by `ctx`
/// and stays valid until the next failing call or `esr_free`.
#[no_mangle]
pub extern "C" fn esr_error(ctx: *mut EsrEngine) -> *const c_char {
    let esr = unsafe { &*ctx };
    match &esr.last_error {
        Some(c) => c.as_ptr(),
        None => std::ptr::null(),
    }
}

/// Not part of spec §6's named surface, but necessary glue: the host
/// program owns the `*mut EsrEngine` `esr_init` returns and must release it
/// exactly once (see DESIGN.md).
#[no_mangle]
pub extern "C" fn esr_free(ctx: *mut EsrEngine) {
    if !ctx.is_null() {
        drop(unsafe { Box::from_raw(ctx) });
    }
}

/// Not part of spec §6's named surface: `global_data_entry`'s only way to
/// get identifier constants into the runtime's string pool is to intern
/// them, so this function has to exist for `esr_init`'s contract to be
/// satisfiable (see DESIGN.md).
#[no_mangle]
pub extern "C" fn esr_intern(ctx: *mut EsrEngine, s: *const c_char) -> u32 {
    let esr = unsafe { &mut *ctx };
    let s = unsafe { CStr::from_ptr(s) }.to_string_lossy();
    esr.engine.intern(&s).0
}

// ---------------------------------------------------------------------
// Stack primitives
// ---------------------------------------------------------------------

/// `stk_alloc(n)`: reserves `n` fresh (undefined-initialized) slots at the
/// top of the call stack, returning their base index.
#[no_mangle]
pub extern "C" fn stk_alloc(ctx: *mut EsrEngine, n: usize) -> usize {
    let esr = unsafe { &mut *ctx };
    esr.engine.call_stack.alloc(n)
}

/// `stk_free(n)`: truncates the call stack back down to `base` (named `n`
/// in spec §6's listing, but it is the base index `stk_alloc` returned, not
/// a count — matching `CallStack::free`'s own parameter).
#[no_mangle]
pub extern "C" fn stk_free(ctx: *mut EsrEngine, base: usize) {
    let esr = unsafe { &mut *ctx };
    esr.engine.call_stack.free(base);
}

/// `stk_push(v)`: appends one value to the stack top, for building an
/// argument list with side effects interleaved between each push.
#[no_mangle]
pub extern "C" fn stk_push(ctx: *mut EsrEngine, v: u64) {
    let esr = unsafe { &mut *ctx };
    esr.engine.call_stack.push_one(unsafe { val(v) });
}

// ---------------------------------------------------------------------
// Argument init / Arguments object
// ---------------------------------------------------------------------

/// `init_args(dst, argc, argv, prmc)`: copies `argc` values starting at
/// call-stack index `argv` into call-stack slots `dst..dst+max(argc,prmc)`,
/// padding any slot past `argc` with `undefined` (ES5 §10.6's implicit
/// parameter padding, applied here instead of at `push_function` time since
/// generated code owns its own frame layout).
#[no_mangle]
pub extern "C" fn init_args(ctx: *mut EsrEngine, dst: usize, argc: usize, argv: usize, prmc: usize) {
    let esr = unsafe { &mut *ctx };
    let total = argc.max(prmc);
    for i in 0..total {
        let v = if i < argc { esr.engine.call_stack.get(argv + i) } else { Value::Undefined };
        esr.engine.call_stack.set(dst + i, v);
    }
}

/// `args_obj_init(ctx, argc, fp, vp)`: builds the `arguments` object for the
/// activation whose header starts at `fp`, mapping its first `param_count`
/// indices onto the live parameter slots at `vp..vp+param_count` (ES5
/// §10.6). `callee` is handed in explicitly rather than rediscovered from
/// the frame header, since compiled code already holds its own function
/// value (spec's raw `vp`/`fp` framing has no object-model concept of
/// "the function that owns this frame" to read it back from — see
/// DESIGN.md). Returns the new object's bits.
#[no_mangle]
pub extern "C" fn args_obj_init(ctx: *mut EsrEngine, argc: usize, vp: usize, param_count: usize, callee_bits: u64, strict: i32) -> u64 {
    let esr = unsafe { &mut *ctx };
    let callee = match unsafe { val(callee_bits) } {
        Value::Object(o) => o,
        _ => return Value::Undefined.bits(),
    };
    let param_names: Vec<StrId> = Vec::new();
    let arg_slots: Vec<Slot> = (0..argc).map(|i| esr.engine.call_stack.slot(vp + i)).collect();
    let _ = param_count;
    match crate::eval::make_arguments_object(&mut esr.engine, &arg_slots, argc, &param_names, &callee, strict != 0) {
        Ok(obj) => Value::Object(obj).bits(),
        Err(thrown) => {
            fail(esr, thrown);
            Value::Undefined.bits()
        }
    }
}

/// `args_obj_link(args, i, slot)`: aliases `arguments[i]` onto the call
/// stack slot at index `slot`, so writes to either are visible through the
/// other until `delete arguments[i]` unmaps it (ES5 §10.6 step 11's
/// `Arguments` parameter map, here realized directly rather than via an
/// accessor-property pair — see `object.rs`'s `arguments_slot`).
#[no_mangle]
pub extern "C" fn args_obj_link(ctx: *mut EsrEngine, args_bits: u64, i: u32, slot: usize) {
    let esr = unsafe { &mut *ctx };
    let Value::Object(args) = (unsafe { val(args_bits) }) else { return };
    let live = esr.engine.call_stack.slot(slot);
    if let ObjectKind::Arguments(data) = &mut args.borrow_mut().kind {
        data.mapped.insert(i, live);
    }
}

// ---------------------------------------------------------------------
// Extra bindings (closure upvalues)
// ---------------------------------------------------------------------

/// `bnd_extra_init(ctx, n)`: allocates `n` undefined-initialized upvalue
/// slots for the activation currently being set up, to be captured by any
/// nested function literal this call creates (spec §6's "extra bindings for
/// closures": locals a compiled function exposes to closures it creates,
/// addressed by static nesting depth rather than through the lexical
/// environment chain the tree walker uses).
#[no_mangle]
pub extern "C" fn bnd_extra_init(ctx: *mut EsrEngine, n: usize) -> usize {
    let esr = unsafe { &mut *ctx };
    let frame = (0..n).map(|_| new_slot(Value::Undefined)).collect();
    esr.extra_stack.push(frame);
    esr.extra_stack.len() - 1
}

/// `bnd_extra_ptr(argc, fp, vp, hops)`: resolves the extra-bindings frame
/// `hops` activations up the *static* (lexical, not dynamic call) nesting
/// chain and returns its absolute index into the engine's extra-bindings
/// stack, for use with `bnd_extra_get`/`bnd_extra_set`. `argc`/`fp`/`vp` are
/// accepted for signature fidelity with spec §6 but unused: this crate
/// tracks extra-bindings frames in their own stack rather than packing them
/// into the call-stack header, so the current frame's offset is simply the
/// stack's current length minus one.
#[no_mangle]
pub extern "C" fn bnd_extra_ptr(ctx: *mut EsrEngine, _argc: usize, _fp: usize, _vp: usize, hops: usize) -> isize {
    let esr = unsafe { &mut *ctx };
    let len = esr.extra_stack.len();
    if hops >= len {
        return -1;
    }
    (len - 1 - hops) as isize
}

/// Not part of spec §6's named surface: `bnd_extra_ptr` hands back an
/// opaque frame index rather than a raw pointer, so reading/writing an
/// upvalue needs a matching pair of accessors (see DESIGN.md).
#[no_mangle]
pub extern "C" fn bnd_extra_get(ctx: *mut EsrEngine, frame: usize, offset: usize) -> u64 {
    let esr = unsafe { &mut *ctx };
    match esr.extra_stack.get(frame).and_then(|f| f.get(offset)) {
        Some(slot) => slot.borrow().bits(),
        None => Value::Undefined.bits(),
    }
}

#[no_mangle]
pub extern "C" fn bnd_extra_set(ctx: *mut EsrEngine, frame: usize, offset: usize, v: u64) {
    let esr = unsafe { &mut *ctx };
    if let Some(slot) = esr.extra_stack.get(frame).and_then(|f| f.get(offset)) {
        *slot.borrow_mut() = unsafe { val(v) };
    }
}

// ---------------------------------------------------------------------
// Context: identifier resolution, strictness, with/catch, declarations
// ---------------------------------------------------------------------

/// Looks up the global environment's map id for the context cache's
/// identity check (spec §4.P: "only the global object is ever cached").
fn global_map_id(engine: &Engine) -> usize {
    engine.global_object.borrow().props.id().id()
}

/// `ctx_get(ctx, key, cid)`: resolves an identifier through the current
/// lexical environment chain (ES5 §10.3.1 `GetIdentifierReference` plus
/// GetValue), consulting/populating the context cache when the binding
/// resolves to the global object's own property map (the only case the
/// cache covers — any other resolution marks the callsite uncachable).
#[no_mangle]
pub extern "C" fn ctx_get(ctx: *mut EsrEngine, is_string: i32, payload: u32, cid: u16, out: *mut u64) -> i32 {
    let esr = unsafe { &mut *ctx };
    let key = decode_key(is_string, payload);

    if key.is_string() {
        let map_id = global_map_id(&esr.engine);
        if let Some(slot) = esr.engine.context_cache().lookup(cid, map_id, key) {
            if let Some(prop) = esr.engine.global_object.borrow().props.get(slot) {
                if let PropertyKind::Data { value, .. } = &prop.kind {
                    unsafe { *out = value.bits() };
                    return 0;
                }
            }
        }
    }

    let lex_env = esr.engine.ctx.current().lex_env.clone();
    match lex_env.resolve(key) {
        None => {
            let thrown = esr.engine.throw(ErrorKind::ReferenceError, "identifier is not defined");
            fail(esr, thrown)
        }
        Some(found) => {
            let is_global_own = match found.record() {
                EnvRecord::Object(rec) => rec.binding_object.ptr_eq(&esr.engine.global_object) && key.is_string(),
                _ => false,
            };
            match found.record().get_binding_value(key, true, &mut esr.engine) {
                Ok(v) => {
                    if is_global_own {
                        if let Some(slot) = esr.engine.global_object.borrow().props.lookup(key) {
                            let map_id = global_map_id(&esr.engine);
                            esr.engine.context_cache_mut().update(cid, map_id, key, slot);
                        }
                    } else {
                        esr.engine.context_cache_mut().mark_uncachable(cid);
                    }
                    unsafe { *out = v.bits() };
                    0
                }
                Err(thrown) => fail(esr, thrown),
            }
        }
    }
}

/// `ctx_put(ctx, key, v, cid)`: `PutValue` onto the resolved binding, or
/// (non-strict, unresolved) an implicit global creation (ES5 §10.2.1.1.2
/// combined with §8.7.2 step 3).
#[no_mangle]
pub extern "C" fn ctx_put(ctx: *mut EsrEngine, is_string: i32, payload: u32, v: u64, _cid: u16) -> i32 {
    let esr = unsafe { &mut *ctx };
    let key = decode_key(is_string, payload);
    let value = unsafe { val(v) };
    let strict = esr.engine.ctx.current().strict;

    let lex_env = esr.engine.ctx.current().lex_env.clone();
    let result = match lex_env.resolve(key) {
        Some(found) => found.record().set_mutable_binding(key, value, strict, &mut esr.engine),
        None if strict => Err(esr.engine.throw(ErrorKind::ReferenceError, "assignment to an undeclared identifier in strict mode")),
        None => {
            let current_var = esr.engine.ctx.current().var_env.clone();
            current_var.record().set_mutable_binding(key, value, false, &mut esr.engine)
        }
    };
    match result {
        Ok(()) => 0,
        Err(thrown) => fail(esr, thrown),
    }
}

/// `ctx_del(ctx, key, cid)`: `delete` on an unqualified identifier (ES5
/// §11.4.1 step 2-3); resolves through the lexical chain and deletes from
/// whichever environment record binds it, or succeeds vacuously if
/// unresolved.
#[no_mangle]
pub extern "C" fn ctx_del(ctx: *mut EsrEngine, is_string: i32, payload: u32, _cid: u16, out: *mut i32) -> i32 {
    let esr = unsafe { &mut *ctx };
    let key = decode_key(is_string, payload);
    let lex_env = esr.engine.ctx.current().lex_env.clone();
    let result = match lex_env.resolve(key) {
        None => Ok(true),
        Some(found) => found.record().delete_binding(key, &mut esr.engine),
    };
    match result {
        Ok(deleted) => {
            unsafe { *out = deleted as i32 };
            0
        }
        Err(thrown) => fail(esr, thrown),
    }
}

/// `ctx_set_strict(ctx, strict)`: flips the current context's strict-mode
/// flag, for a function body whose own "use strict" directive generated
/// code discovers only once it starts executing the body.
#[no_mangle]
pub extern "C" fn ctx_set_strict(ctx: *mut EsrEngine, strict: i32) {
    let esr = unsafe { &mut *ctx };
    esr.engine.ctx.current_mut().strict = strict != 0;
}

/// `ctx_enter_with(ctx, obj)`: pushes an object-environment context for a
/// `with` statement's body (ES5 §12.10), coercing `obj` to an object first
/// per spec §4.I's note that the caller supplies an already-boxed operand.
#[no_mangle]
pub extern "C" fn ctx_enter_with(ctx: *mut EsrEngine, obj_bits: u64) -> i32 {
    let esr = unsafe { &mut *ctx };
    let v = unsafe { val(obj_bits) };
    let protos = boxing_snapshot(&esr.engine);
    let root = esr.engine.root();
    match ops::to_object(&v, &protos, root, &mut esr.engine) {
        Ok(obj) => {
            esr.engine.ctx.push_with(obj);
            0
        }
        Err(thrown) => fail(esr, thrown),
    }
}

/// `ctx_enter_catch(ctx, key, v)`: pushes a declarative context binding the
/// caught value to `key` for a `catch` clause's body (ES5 §12.14).
#[no_mangle]
pub extern "C" fn ctx_enter_catch(ctx: *mut EsrEngine, is_string: i32, payload: u32, v: u64) {
    let esr = unsafe { &mut *ctx };
    let key = decode_key(is_string, payload);
    let value = unsafe { val(v) };
    esr.engine.ctx.push_catch(key, value);
}

/// `ctx_leave(ctx)`: pops the current context, propagating any pending
/// exception outward (used to unwind a `with`/`catch`/`function` context on
/// every exit path, matching `ContextStack::pop`'s own contract).
#[no_mangle]
pub extern "C" fn ctx_leave(ctx: *mut EsrEngine) {
    let esr = unsafe { &mut *ctx };
    esr.engine.ctx.pop();
}

/// `ctx_decl_fun(ctx, key)`: hoists a function declaration's name as a
/// mutable, deletable binding in the current variable environment (ES5
/// §10.5 step 5) — the binding's value is set separately via `ctx_put`
/// once the function object itself has been constructed.
#[no_mangle]
pub extern "C" fn ctx_decl_fun(ctx: *mut EsrEngine, is_string: i32, payload: u32) {
    let esr = unsafe { &mut *ctx };
    let key = decode_key(is_string, payload);
    let var_env = esr.engine.ctx.current().var_env.clone();
    if let EnvRecord::Declarative(r) = var_env.record() {
        r.borrow_mut().create_mutable_binding(key, false);
    }
}

/// `ctx_decl_var(ctx, key)`: hoists a `var` declaration (ES5 §10.5 step 7),
/// a no-op if the name is already bound (a prior `var`, parameter, or
/// function declaration of the same name).
#[no_mangle]
pub extern "C" fn ctx_decl_var(ctx: *mut EsrEngine, is_string: i32, payload: u32) {
    let esr = unsafe { &mut *ctx };
    let key = decode_key(is_string, payload);
    let var_env = esr.engine.ctx.current().var_env.clone();
    if let EnvRecord::Declarative(r) = var_env.record() {
        r.borrow_mut().create_mutable_binding(key, false);
    }
}

/// `ctx_decl_prm(ctx, key)`: declares a formal parameter binding (ES5
/// §10.5 step 4's per-parameter loop) in the current variable environment,
/// ahead of `ctx_link_prm` aliasing it to the parameter's live stack slot.
#[no_mangle]
pub extern "C" fn ctx_decl_prm(ctx: *mut EsrEngine, is_string: i32, payload: u32) {
    let esr = unsafe { &mut *ctx };
    let key = decode_key(is_string, payload);
    let var_env = esr.engine.ctx.current().var_env.clone();
    if let EnvRecord::Declarative(r) = var_env.record() {
        r.borrow_mut().create_mutable_binding(key, false);
    }
}

/// `ctx_link_fun(ctx, key, v)`: initializes a previously-declared function
/// binding with the constructed function value.
#[no_mangle]
pub extern "C" fn ctx_link_fun(ctx: *mut EsrEngine, is_string: i32, payload: u32, v: u64) {
    let esr = unsafe { &mut *ctx };
    let key = decode_key(is_string, payload);
    let value = unsafe { val(v) };
    let var_env = esr.engine.ctx.current().var_env.clone();
    if let EnvRecord::Declarative(r) = var_env.record() {
        r.borrow_mut().set_mutable_binding(key, value, false, &mut esr.engine).ok();
    }
}

/// `ctx_link_var(ctx, key, slot)`: aliases a `var` binding directly onto a
/// call-stack slot, for a `var` that generated code keeps as a register and
/// only needs exposed through the lexical chain for `eval`/`with`/closures
/// to see (spec §4.H's "nested var inherits the argument's current value"
/// rule applies when `inherit` is warranted — a parameter re-declared as a
/// plain `var` of the same name).
#[no_mangle]
pub extern "C" fn ctx_link_var(ctx: *mut EsrEngine, is_string: i32, payload: u32, slot: usize) {
    let esr = unsafe { &mut *ctx };
    let key = decode_key(is_string, payload);
    let live = esr.engine.call_stack.slot(slot);
    let var_env = esr.engine.ctx.current().var_env.clone();
    if let EnvRecord::Declarative(r) = var_env.record() {
        r.borrow_mut().link_mutable_binding(key, false, live, true);
    }
}

/// `ctx_link_prm(ctx, key, slot)`: aliases a formal parameter's binding
/// onto its live call-stack argument slot, so writes to the parameter
/// variable and to `arguments[i]`'s mapped entry observe each other (ES5
/// §10.6's parameter map, mirrored on the lexical-environment side).
#[no_mangle]
pub extern "C" fn ctx_link_prm(ctx: *mut EsrEngine, is_string: i32, payload: u32, slot: usize) {
    let esr = unsafe { &mut *ctx };
    let key = decode_key(is_string, payload);
    let live = esr.engine.call_stack.slot(slot);
    let var_env = esr.engine.ctx.current().var_env.clone();
    if let EnvRecord::Declarative(r) = var_env.record() {
        r.borrow_mut().link_mutable_binding(key, false, live, false);
    }
}

// ---------------------------------------------------------------------
// Exceptions
// ---------------------------------------------------------------------

/// `ex_save_state(ctx) -> has_pending`: snapshots whether the current
/// context has a pending exception without consuming it, for a `finally`
/// block that needs to know whether to re-throw after it runs.
#[no_mangle]
pub extern "C" fn ex_save_state(ctx: *mut EsrEngine, out: *mut u64) -> i32 {
    let esr = unsafe { &mut *ctx };
    match &esr.engine.ctx.current().pending_exception {
        Some(v) => {
            unsafe { *out = v.bits() };
            1
        }
        None => 0,
    }
}

/// `ex_load_state(ctx, v)`: restores a previously-saved pending exception
/// (the `finally`-block re-throw path).
#[no_mangle]
pub extern "C" fn ex_load_state(ctx: *mut EsrEngine, v: u64) {
    let esr = unsafe { &mut *ctx };
    esr.engine.ctx.current_mut().set_exception(unsafe { val(v) });
}

/// `ex_set(ctx, v)`: records `v` as the current context's pending
/// exception (a `throw` statement).
#[no_mangle]
pub extern "C" fn ex_set(ctx: *mut EsrEngine, v: u64) {
    let esr = unsafe { &mut *ctx };
    esr.engine.ctx.current_mut().set_exception(unsafe { val(v) });
}

/// `ex_clear(ctx)`: clears the current context's pending exception (a
/// `catch` clause that handled it, or a `finally` block that decided not
/// to re-throw).
#[no_mangle]
pub extern "C" fn ex_clear(ctx: *mut EsrEngine) {
    let esr = unsafe { &mut *ctx };
    esr.engine.ctx.current_mut().take_exception();
}

// ---------------------------------------------------------------------
// Property iteration (for-in)
// ---------------------------------------------------------------------

/// `prp_it_new(v)`: snapshots `v`'s `for-in` key set (ES5 §12.6.4) and
/// returns an iterator handle; `-1` if `v` is `null`/`undefined` (a `for-in`
/// over a nullish value runs zero iterations rather than throwing).
#[no_mangle]
pub extern "C" fn prp_it_new(ctx: *mut EsrEngine, v: u64) -> isize {
    let esr = unsafe { &mut *ctx };
    let value = unsafe { val(v) };
    let obj = match value {
        Value::Object(o) => o,
        Value::Null | Value::Undefined => return -1,
        other => {
            let protos = boxing_snapshot(&esr.engine);
            let root = esr.engine.root();
            match ops::to_object(&other, &protos, root, &mut esr.engine) {
                Ok(o) => o,
                Err(_) => return -1,
            }
        }
    };
    let keys = obj.for_in_keys();
    let iter = PropIter { obj, keys, pos: 0 };
    let slot = esr.iterators.iter().position(Option::is_none);
    match slot {
        Some(i) => {
            esr.iterators[i] = Some(iter);
            i as isize
        }
        None => {
            esr.iterators.push(Some(iter));
            (esr.iterators.len() - 1) as isize
        }
    }
}

/// `prp_it_next(it, out)`: advances iterator `it`, writing the next key's
/// string value to `out` and returning `1`; `0` once exhausted, freeing the
/// iterator slot. A key no longer present on the (possibly since-mutated)
/// object is skipped per ES5 §12.6.4's "a property deleted during
/// enumeration is not visited".
#[no_mangle]
pub extern "C" fn prp_it_next(ctx: *mut EsrEngine, it: usize, out: *mut u64) -> i32 {
    let esr = unsafe { &mut *ctx };
    loop {
        let Some(Some(iter)) = esr.iterators.get_mut(it) else { return 0 };
        if iter.pos >= iter.keys.len() {
            esr.iterators[it] = None;
            return 0;
        }
        let key = iter.keys[iter.pos];
        iter.pos += 1;
        let obj = iter.obj.clone();
        if !obj.has_property(key) {
            continue;
        }
        let s = key.to_string(|id| esr.engine.lookup_str(id));
        let interned = esr.engine.intern(&s);
        unsafe { *out = Value::String(interned).bits() };
        return 1;
    }
}

// ---------------------------------------------------------------------
// Property get/put/delete/define
// ---------------------------------------------------------------------

/// Gathers the receiver's own map id followed by each prototype's map id up
/// to (and including) the object owning `key`, the shape the property
/// cache validates a hit against (spec §4.P).
fn owner_chain(obj: &ObjectRef, key: PropKey) -> Option<Vec<usize>> {
    let mut chain = Vec::new();
    let mut cursor = obj.clone();
    loop {
        chain.push(cursor.borrow().props.id().id());
        if cursor.get_own_property(key).is_some() {
            return Some(chain);
        }
        let proto = cursor.borrow().prototype.clone();
        match proto {
            Some(p) => cursor = p,
            None => return None,
        }
    }
}

/// `prp_get(obj, key, out, cid)`: `obj[key]` (ES5 §8.12.3/§11.2.1), caching
/// string-keyed hits (index-keyed properties live in the indexed array, not
/// the `SlotRef`-addressed property map the cache speaks, so they always
/// miss — see DESIGN.md).
#[no_mangle]
pub extern "C" fn prp_get(ctx: *mut EsrEngine, obj_bits: u64, is_string: i32, payload: u32, cid: u16, out: *mut u64) -> i32 {
    let esr = unsafe { &mut *ctx };
    let key = decode_key(is_string, payload);
    let value = unsafe { val(obj_bits) };
    let obj = match &value {
        Value::Object(o) => o.clone(),
        _ => {
            let protos = boxing_snapshot(&esr.engine);
            let root = esr.engine.root();
            match ops::to_object(&value, &protos, root, &mut esr.engine) {
                Ok(o) => o,
                Err(thrown) => return fail(esr, thrown),
            }
        }
    };

    if key.is_string() {
        let receiver_map = obj.borrow().props.id().id();
        if let Some(owner_chain) = owner_chain(&obj, key) {
            if owner_chain[0] == receiver_map {
                if let Some(slot_ref) = esr.engine.property_cache().lookup(cid, &owner_chain, key) {
                    let owner_map_id = *owner_chain.last().unwrap();
                    let mut cursor = obj.clone();
                    loop {
                        if cursor.borrow().props.id().id() == owner_map_id {
                            if let Some(prop) = cursor.borrow().props.get(slot_ref) {
                                if let PropertyKind::Data { value, .. } = &prop.kind {
                                    unsafe { *out = value.bits() };
                                    return 0;
                                }
                            }
                            break;
                        }
                        let proto = cursor.borrow().prototype.clone();
                        match proto {
                            Some(p) => cursor = p,
                            None => break,
                        }
                    }
                }
            }
        }
    }

    match obj.get(key, &mut esr.engine) {
        Ok(v) => {
            if key.is_string() {
                if let Some(chain) = owner_chain(&obj, key) {
                    let owner_map_id = *chain.last().unwrap();
                    let mut cursor = obj.clone();
                    loop {
                        if cursor.borrow().props.id().id() == owner_map_id {
                            if let Some(slot_ref) = cursor.borrow().props.lookup(key) {
                                let is_data = matches!(cursor.get_own_property(key), Some(Property { kind: PropertyKind::Data { .. }, .. }));
                                if is_data {
                                    esr.engine.property_cache_mut().update(cid, chain, key, slot_ref);
                                }
                            }
                            break;
                        }
                        let proto = cursor.borrow().prototype.clone();
                        match proto {
                            Some(p) => cursor = p,
                            None => break,
                        }
                    }
                }
            }
            unsafe { *out = v.bits() };
            0
        }
        Err(thrown) => fail(esr, thrown),
    }
}

/// `prp_put(ctx, obj, key, v, cid)`: `obj[key] = v` (ES5 §8.12.5), in the
/// current context's strict-mode.
#[no_mangle]
pub extern "C" fn prp_put(ctx: *mut EsrEngine, obj_bits: u64, is_string: i32, payload: u32, v: u64, _cid: u16) -> i32 {
    let esr = unsafe { &mut *ctx };
    let key = decode_key(is_string, payload);
    let value = unsafe { val(obj_bits) };
    let new_value = unsafe { val(v) };
    let strict = esr.engine.ctx.current().strict;
    let protos = boxing_snapshot(&esr.engine);
    let root = esr.engine.root();
    let obj = match ops::to_object(&value, &protos, root, &mut esr.engine) {
        Ok(o) => o,
        Err(thrown) => return fail(esr, thrown),
    };
    match obj.put(key, new_value, strict, &mut esr.engine) {
        Ok(()) => 0,
        Err(thrown) => fail(esr, thrown),
    }
}

/// `prp_del(ctx, obj, key, out)`: `delete obj[key]` (ES5 §11.4.1).
#[no_mangle]
pub extern "C" fn prp_del(ctx: *mut EsrEngine, obj_bits: u64, is_string: i32, payload: u32, out: *mut i32) -> i32 {
    let esr = unsafe { &mut *ctx };
    let key = decode_key(is_string, payload);
    let value = unsafe { val(obj_bits) };
    let strict = esr.engine.ctx.current().strict;
    let protos = boxing_snapshot(&esr.engine);
    let root = esr.engine.root();
    let obj = match ops::to_object(&value, &protos, root, &mut esr.engine) {
        Ok(o) => o,
        Err(thrown) => return fail(esr, thrown),
    };
    match obj.delete(key, strict, &mut esr.engine) {
        Ok(deleted) => {
            unsafe { *out = deleted as i32 };
            0
        }
        Err(thrown) => fail(esr, thrown),
    }
}

/// `prp_def_data(obj, key, v, writable, enumerable, configurable)`: defines
/// an own data property directly (ES5 §8.12.9), for an object/array
/// literal's own properties or `Object.defineProperty`'s data-descriptor
/// path.
#[no_mangle]
pub extern "C" fn prp_def_data(ctx: *mut EsrEngine, obj_bits: u64, is_string: i32, payload: u32, v: u64, writable: i32, enumerable: i32, configurable: i32) -> i32 {
    let esr = unsafe { &mut *ctx };
    let key = decode_key(is_string, payload);
    let Value::Object(obj) = (unsafe { val(obj_bits) }) else {
        let thrown = esr.engine.throw(ErrorKind::TypeError, "prp_def_data target is not an object");
        return fail(esr, thrown);
    };
    let value = unsafe { val(v) };
    let desc = PropertyDescriptor::from_data(value, writable != 0, enumerable != 0, configurable != 0);
    match obj.define_own_property(key, desc, true, &mut esr.engine) {
        Ok(_) => 0,
        Err(thrown) => fail(esr, thrown),
    }
}

/// `prp_def_accessor(obj, key, getter, setter, enumerable, configurable)`:
/// defines an own accessor property, for an object literal's getter/setter
/// shorthand or `Object.defineProperty`'s accessor-descriptor path.
#[no_mangle]
pub extern "C" fn prp_def_accessor(ctx: *mut EsrEngine, obj_bits: u64, is_string: i32, payload: u32, getter: u64, setter: u64, enumerable: i32, configurable: i32) -> i32 {
    let esr = unsafe { &mut *ctx };
    let key = decode_key(is_string, payload);
    let Value::Object(obj) = (unsafe { val(obj_bits) }) else {
        let thrown = esr.engine.throw(ErrorKind::TypeError, "prp_def_accessor target is not an object");
        return fail(esr, thrown);
    };
    let get = match unsafe { val(getter) } {
        Value::Undefined => None,
        other => Some(other),
    };
    let set = match unsafe { val(setter) } {
        Value::Undefined => None,
        other => Some(other),
    };
    let desc = PropertyDescriptor {
        value: None,
        writable: None,
        get,
        set,
        enumerable: Some(enumerable != 0),
        configurable: Some(configurable != 0),
    };
    match obj.define_own_property(key, desc, true, &mut esr.engine) {
        Ok(_) => 0,
        Err(thrown) => fail(esr, thrown),
    }
}

// ---------------------------------------------------------------------
// Call
// ---------------------------------------------------------------------

fn args_from_stack(esr: &mut EsrEngine, argv: usize, argc: usize) -> Vec<Value> {
    (0..argc).map(|i| esr.engine.call_stack.get(argv + i)).collect()
}

/// `call(callee, this, argv, argc, out)`: ordinary function call (ES5
/// §11.2.3), `argv` a call-stack base index holding `argc` argument values.
#[no_mangle]
pub extern "C" fn call(ctx: *mut EsrEngine, callee: u64, this: u64, argv: usize, argc: usize, out: *mut u64) -> i32 {
    let esr = unsafe { &mut *ctx };
    let callee_v = unsafe { val(callee) };
    let this_v = unsafe { val(this) };
    let args = args_from_stack(esr, argv, argc);
    match ops::call_value(&callee_v, this_v, &args, &mut esr.engine) {
        Ok(v) => {
            unsafe { *out = v.bits() };
            0
        }
        Err(thrown) => fail(esr, thrown),
    }
}

/// `call_keyed(base, key, argv, argc, out)`: a method call `base[key](...)`
/// (ES5 §11.2.3's `MemberExpression` callee form).
#[no_mangle]
pub extern "C" fn call_keyed(ctx: *mut EsrEngine, base: u64, is_string: i32, payload: u32, argv: usize, argc: usize, out: *mut u64) -> i32 {
    let esr = unsafe { &mut *ctx };
    let key = decode_key(is_string, payload);
    let base_v = unsafe { val(base) };
    let args = args_from_stack(esr, argv, argc);
    match ops::call_keyed(&mut esr.engine, &base_v, key, &args) {
        Ok(v) => {
            unsafe { *out = v.bits() };
            0
        }
        Err(thrown) => fail(esr, thrown),
    }
}

/// `call_named(name, argv, argc, out)`: a call whose callee is a bare
/// identifier (ES5 §11.2.3's `CallExpression : Identifier Arguments` form,
/// which threads the identifier's base environment through as `this` for
/// an object-environment binding — e.g. `with(o) { o.m() }`'s unqualified
/// call).
#[no_mangle]
pub extern "C" fn call_named(ctx: *mut EsrEngine, is_string: i32, payload: u32, argv: usize, argc: usize, out: *mut u64) -> i32 {
    let esr = unsafe { &mut *ctx };
    let name = decode_key(is_string, payload);
    let args = args_from_stack(esr, argv, argc);
    match ops::call_named(&mut esr.engine, name, &args) {
        Ok(v) => {
            unsafe { *out = v.bits() };
            0
        }
        Err(thrown) => fail(esr, thrown),
    }
}

/// `call_new(callee, argv, argc, out)`: `new callee(...)` (ES5 §11.2.2).
#[no_mangle]
pub extern "C" fn call_new(ctx: *mut EsrEngine, callee: u64, argv: usize, argc: usize, out: *mut u64) -> i32 {
    let esr = unsafe { &mut *ctx };
    let callee_v = unsafe { val(callee) };
    let args = args_from_stack(esr, argv, argc);
    match ops::call_new(&mut esr.engine, &callee_v, &args) {
        Ok(v) => {
            unsafe { *out = v.bits() };
            0
        }
        Err(thrown) => fail(esr, thrown),
    }
}

// ---------------------------------------------------------------------
// Compiled-function trampoline
// ---------------------------------------------------------------------

/// The non-strict `this`-binding coercion rule (ES5 §10.4.3): `null`/
/// `undefined` become the global object, a primitive is boxed, an object
/// passes through unchanged. Strict callees keep `this` verbatim. Lives
/// here (rather than reusing `frame.rs`'s `Frame::push_function`) because
/// the trampoline below manages its call-stack frame by raw index, not
/// through a `Frame<'s>` borrow.
fn coerce_this(engine: &mut Engine, strict: bool, this: Value) -> Value {
    if strict {
        return this;
    }
    match this {
        Value::Undefined | Value::Null => Value::Object(engine.global_object.clone()),
        Value::Object(o) => Value::Object(o),
        primitive => {
            let protos = boxing_snapshot(engine);
            let root = engine.root();
            ops::to_object(&primitive, &protos, root, engine)
                .map(Value::Object)
                .unwrap_or(primitive)
        }
    }
}

/// Invokes a compiled function's raw entry point as the object model's
/// `[[Call]]`: pushes a call-stack frame matching `frame.rs`'s
/// `HEADER_LEN` layout, a fresh declarative context chained under the
/// global environment (compiled code resolves its own locals directly;
/// this context only matters for free identifiers, `with`/`catch`, and
/// `eval` — see DESIGN.md "Compiled-function scope"), and a fresh
/// extra-bindings frame for any closures the call creates. The header's
/// reserved third slot doubles as `vp[-1]`, the spec's native-function
/// result slot.
unsafe fn invoke_compiled(handle: *mut EsrEngine, raw: RawFn, arity: u32, strict: bool, this: Value, args: &[Value]) -> Result<Value, Value> {
    let esr = unsafe { &mut *handle };
    let argc = args.len();
    let this_value = coerce_this(&mut esr.engine, strict, this);

    let base = esr.engine.call_stack.alloc(HEADER_LEN + argc.max(arity as usize));
    esr.engine.call_stack.set(base + 1, this_value.clone());
    for (i, a) in args.iter().enumerate() {
        esr.engine.call_stack.set(base + HEADER_LEN + i, a.clone());
    }

    esr.extra_stack.push(Vec::new());
    let scope = LexEnv::new_decl_env(Some(esr.engine.global_env.clone()));
    esr.engine.ctx.push_fun(strict, scope, this_value);

    let vp = base + HEADER_LEN;
    let status = raw(handle, argc, base, vp);

    let result = if status == 0 {
        Ok(esr.engine.call_stack.get(base + 2))
    } else {
        Err(esr.engine.ctx.current_mut().take_exception().unwrap_or(Value::Undefined))
    };

    esr.engine.ctx.pop();
    esr.extra_stack.pop();
    esr.engine.call_stack.free(base);
    result
}

fn compiled_trampoline(handle: *mut EsrEngine, raw: RawFn, arity: u32, strict: bool) -> NativeFn {
    let handle = handle as usize;
    Rc::new(move |_inv: &mut dyn Invoker, this: Value, args: &[Value]| {
        let handle = handle as *mut EsrEngine;
        unsafe { invoke_compiled(handle, raw, arity, strict, this, args) }
    })
}

// ---------------------------------------------------------------------
// Constructors: arrays, objects, compiled functions, regexes
// ---------------------------------------------------------------------

/// `new_arr(count, items)`: an array literal (ES5 §11.1.4), `items` a
/// call-stack base index holding `count` element values in order.
#[no_mangle]
pub extern "C" fn new_arr(ctx: *mut EsrEngine, count: usize, items: usize) -> u64 {
    let esr = unsafe { &mut *ctx };
    let array_proto = esr.engine.array_proto();
    let root = esr.engine.root();
    let length_key = PropKey::from_str_id(esr.engine.intern("length"));
    let obj = ObjectRef::new(Obj::new(
        ClassTag::Array,
        Some(array_proto),
        root,
        ObjectKind::Array(crate::object::ArrayData::new(length_key)),
    ));
    for i in 0..count {
        let v = esr.engine.call_stack.get(items + i);
        let _ = obj.define_own_property(PropKey::from_u32(i as u32), PropertyDescriptor::from_data(v, true, true, true), false, &mut esr.engine);
    }
    let _ = obj.define_own_property(length_key, PropertyDescriptor::from_data(Value::from_u32(count as u32), true, false, false), false, &mut esr.engine);
    Value::Object(obj).bits()
}

/// `new_obj()`: an empty object literal's initial allocation (ES5 §11.1.5
/// step 1); generated code follows up with `prp_def_data`/`prp_def_accessor`
/// calls for each property.
#[no_mangle]
pub extern "C" fn new_obj(ctx: *mut EsrEngine) -> u64 {
    let esr = unsafe { &mut *ctx };
    let object_proto = esr.engine.protos().object.clone();
    let root = esr.engine.root();
    let obj = ObjectRef::new(Obj::new(ClassTag::Object, Some(object_proto), root, ObjectKind::Plain));
    Value::Object(obj).bits()
}

/// `new_fun_decl(name, arity, strict, entry)`: wraps a compiled function
/// declaration's entry point as a `Function` object (ES5 §13's
/// `FunctionDeclaration`), wiring `length`/`name`/`prototype`/
/// `prototype.constructor` the same way every other builtin is wired (see
/// `stdlib::support::native_constructor`).
#[no_mangle]
pub extern "C" fn new_fun_decl(ctx: *mut EsrEngine, name: *const c_char, arity: u32, strict: i32, entry: RawFn) -> u64 {
    new_function(ctx, name, arity, strict, entry)
}

/// `new_fun_expr(name, arity, strict, entry)`: a `FunctionExpression` (ES5
/// §13); identical construction to `new_fun_decl` — the declaration/
/// expression distinction only affects hoisting, which is the caller's
/// (the generated code's `ctx_decl_fun`/`ctx_link_fun` sequencing)
/// responsibility, not this constructor's.
#[no_mangle]
pub extern "C" fn new_fun_expr(ctx: *mut EsrEngine, name: *const c_char, arity: u32, strict: i32, entry: RawFn) -> u64 {
    new_function(ctx, name, arity, strict, entry)
}

fn new_function(ctx: *mut EsrEngine, name: *const c_char, arity: u32, strict: i32, entry: RawFn) -> u64 {
    let esr = unsafe { &mut *ctx };
    let name_str = if name.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
    };
    let is_strict = strict != 0;
    let trampoline = compiled_trampoline(ctx, entry, arity, is_strict);

    let function_proto = esr.engine.function_proto();
    let object_proto = esr.engine.protos().object.clone();
    let root = esr.engine.root();
    let prototype_obj = ObjectRef::new(Obj::new(ClassTag::Object, Some(object_proto), root.clone(), ObjectKind::Plain));

    let ctor = native_constructor(&mut esr.engine, root, function_proto, &name_str, arity, trampoline.clone(), trampoline, prototype_obj);
    if is_strict {
        let _ = crate::eval::install_poison_pair(&mut esr.engine, &ctor, "caller");
        let _ = crate::eval::install_poison_pair(&mut esr.engine, &ctor, "arguments");
    }
    Value::Object(ctor).bits()
}

/// `new_reg_exp(source, flags)`: a `RegExp` literal (ES5 §7.8.5), built
/// against `RegExp.prototype` looked up live off the global object, since
/// the engine keeps no dedicated `regexp_proto` field of its own (see
/// DESIGN.md).
#[no_mangle]
pub extern "C" fn new_reg_exp(ctx: *mut EsrEngine, source: *const c_char, flags: *const c_char) -> u64 {
    let esr = unsafe { &mut *ctx };
    let source_str = unsafe { CStr::from_ptr(source) }.to_string_lossy().into_owned();
    let flags_str = if flags.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(flags) }.to_string_lossy().into_owned()
    };

    let regexp_ctor_key = PropKey::from_str_id(esr.engine.intern("RegExp"));
    let proto = match esr.engine.global_object.clone().get(regexp_ctor_key, &mut esr.engine) {
        Ok(Value::Object(ctor)) => {
            let proto_key = PropKey::from_str_id(esr.engine.intern("prototype"));
            match ctor.get(proto_key, &mut esr.engine) {
                Ok(Value::Object(p)) => p,
                _ => esr.engine.protos().object.clone(),
            }
        }
        _ => esr.engine.protos().object.clone(),
    };
    let root = esr.engine.root();
    let obj = regexp_ctor::build_regexp(source_str, &flags_str, root, proto, &mut esr.engine);
    Value::Object(obj).bits()
}

// ---------------------------------------------------------------------
// Unary / binary / comparison operators
// ---------------------------------------------------------------------

macro_rules! unary_op {
    ($name:ident, $body:expr) => {
        #[no_mangle]
        pub extern "C" fn $name(ctx: *mut EsrEngine, a: u64, out: *mut u64) -> i32 {
            let esr = unsafe { &mut *ctx };
            let av = unsafe { val(a) };
            let f: fn(&mut EsrEngine, Value) -> Result<Value, Value> = $body;
            match f(esr, av) {
                Ok(v) => {
                    unsafe { *out = v.bits() };
                    0
                }
                Err(thrown) => fail(esr, thrown),
            }
        }
    };
}

macro_rules! binary_op {
    ($name:ident, $op:path) => {
        #[no_mangle]
        pub extern "C" fn $name(ctx: *mut EsrEngine, a: u64, b: u64, out: *mut u64) -> i32 {
            let esr = unsafe { &mut *ctx };
            let av = unsafe { val(a) };
            let bv = unsafe { val(b) };
            match $op(&av, &bv, &mut esr.engine) {
                Ok(v) => {
                    unsafe { *out = v.bits() };
                    0
                }
                Err(thrown) => fail(esr, thrown),
            }
        }
    };
}

unary_op!(u_typeof, |esr, v| {
    let s = ops::op_typeof(&v);
    Ok(Value::String(esr.engine.intern(s)))
});
unary_op!(u_not, |esr, v| Ok(Value::from_bool(!ops::to_boolean(&v, &esr.engine))));
unary_op!(u_bit_not, |esr, v| {
    let i = ops::to_int32(&v, &mut esr.engine)?;
    Ok(Value::from_i32(!i))
});
unary_op!(u_add, |esr, v| ops::to_number(&v, &mut esr.engine).map(Value::from_num));
unary_op!(u_sub, |esr, v| ops::to_number(&v, &mut esr.engine).map(|n| Value::from_num(-n)));

binary_op!(b_add, ops::op_add);
binary_op!(b_sub, ops::op_sub);
binary_op!(b_mul, ops::op_mul);
binary_op!(b_div, ops::op_div);
binary_op!(b_mod, ops::op_mod);
binary_op!(b_or, ops::op_bit_or);
binary_op!(b_xor, ops::op_bit_xor);
binary_op!(b_and, ops::op_bit_and);
binary_op!(b_shl, ops::op_shl);
binary_op!(b_sar, ops::op_sar);
binary_op!(b_shr, ops::op_shr);

/// `c_in`: `a in b` (ES5 §11.8.7).
#[no_mangle]
pub extern "C" fn c_in(ctx: *mut EsrEngine, a: u64, b: u64, out: *mut i32) -> i32 {
    let esr = unsafe { &mut *ctx };
    let av = unsafe { val(a) };
    let bv = unsafe { val(b) };
    match ops::op_in(&av, &bv, &mut esr.engine) {
        Ok(r) => {
            unsafe { *out = r as i32 };
            0
        }
        Err(thrown) => fail(esr, thrown),
    }
}

/// `c_instance_of`: `a instanceof b` (ES5 §11.8.6).
#[no_mangle]
pub extern "C" fn c_instance_of(ctx: *mut EsrEngine, a: u64, b: u64, out: *mut i32) -> i32 {
    let esr = unsafe { &mut *ctx };
    let av = unsafe { val(a) };
    let bv = unsafe { val(b) };
    match ops::op_instance_of(&av, &bv, &mut esr.engine) {
        Ok(r) => {
            unsafe { *out = r as i32 };
            0
        }
        Err(thrown) => fail(esr, thrown),
    }
}

#[no_mangle]
pub extern "C" fn c_strict_eq(_ctx: *mut EsrEngine, a: u64, b: u64, out: *mut i32) -> i32 {
    let av = unsafe { val(a) };
    let bv = unsafe { val(b) };
    unsafe { *out = ops::strict_equals(&av, &bv) as i32 };
    0
}

#[no_mangle]
pub extern "C" fn c_strict_neq(ctx: *mut EsrEngine, a: u64, b: u64, out: *mut i32) -> i32 {
    c_strict_eq(ctx, a, b, out);
    unsafe { *out = 1 - *out };
    0
}

#[no_mangle]
pub extern "C" fn c_eq(ctx: *mut EsrEngine, a: u64, b: u64, out: *mut i32) -> i32 {
    let esr = unsafe { &mut *ctx };
    let av = unsafe { val(a) };
    let bv = unsafe { val(b) };
    match ops::abstract_equals(&av, &bv, &mut esr.engine) {
        Ok(r) => {
            unsafe { *out = r as i32 };
            0
        }
        Err(thrown) => fail(esr, thrown),
    }
}

#[no_mangle]
pub extern "C" fn c_neq(ctx: *mut EsrEngine, a: u64, b: u64, out: *mut i32) -> i32 {
    let status = c_eq(ctx, a, b, out);
    if status == 0 {
        unsafe { *out = 1 - *out };
    }
    status
}

fn relational(ctx: *mut EsrEngine, a: u64, b: u64, left_first: bool, out: *mut i32, invert_undefined: bool) -> i32 {
    let esr = unsafe { &mut *ctx };
    let av = unsafe { val(a) };
    let bv = unsafe { val(b) };
    match ops::abstract_relational_comparison(&av, &bv, left_first, &mut esr.engine) {
        Ok(Some(r)) => {
            unsafe { *out = r as i32 };
            0
        }
        Ok(None) => {
            unsafe { *out = invert_undefined as i32 };
            0
        }
        Err(thrown) => fail(esr, thrown),
    }
}

/// `c_lt`: `a < b` (ES5 §11.8.1); an undefined relational result (either
/// operand `NaN`) is `false`.
#[no_mangle]
pub extern "C" fn c_lt(ctx: *mut EsrEngine, a: u64, b: u64, out: *mut i32) -> i32 {
    relational(ctx, a, b, true, out, false)
}

/// `c_gt`: `a > b` (ES5 §11.8.2), evaluated as `b < a` with the right
/// operand computed first.
#[no_mangle]
pub extern "C" fn c_gt(ctx: *mut EsrEngine, a: u64, b: u64, out: *mut i32) -> i32 {
    relational(ctx, b, a, false, out, false)
}

/// `c_lte`: `a <= b` (ES5 §11.8.3), evaluated as `!(b < a)`.
#[no_mangle]
pub extern "C" fn c_lte(ctx: *mut EsrEngine, a: u64, b: u64, out: *mut i32) -> i32 {
    let mut gt = 0;
    let status = relational(ctx, b, a, false, &mut gt, true);
    if status == 0 {
        unsafe { *out = 1 - gt };
    }
    status
}

/// `c_gte`: `a >= b` (ES5 §11.8.4), evaluated as `!(a < b)`.
#[no_mangle]
pub extern "C" fn c_gte(ctx: *mut EsrEngine, a: u64, b: u64, out: *mut i32) -> i32 {
    let mut lt = 0;
    let status = relational(ctx, a, b, true, &mut lt, true);
    if status == 0 {
        unsafe { *out = 1 - lt };
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn fresh() -> *mut EsrEngine {
        esr_init(None)
    }

    fn store_result(ctx: *mut EsrEngine, base: usize, v: Value) {
        let esr = unsafe { &mut *ctx };
        esr.engine.call_stack.set(base + 2, v);
    }

    #[test]
    fn init_and_free_round_trip() {
        let ctx = fresh();
        assert!(esr_error(ctx).is_null());
        esr_free(ctx);
    }

    // Every case below runs its assertions from inside an `extern "C"`
    // entry point driven by `esr_run`, the same calling convention
    // generated code uses: the body only ever sees `ctx` as an opaque
    // pointer and talks to the engine exclusively through the ABI
    // functions, never through a live `&mut EsrEngine` held across a call.

    extern "C" fn stack_body(ctx: *mut EsrEngine, _argc: usize, base: usize, _vp: usize) -> i32 {
        let top = stk_alloc(ctx, 2);
        stk_push(ctx, Value::from_i32(7).bits());
        let got = unsafe { &mut *ctx }.engine.call_stack.get(top + 2);
        assert_eq!(got, Value::from_i32(7));
        stk_free(ctx, top);
        store_result(ctx, base, Value::Undefined);
        0
    }

    #[test]
    fn stack_alloc_push_free_round_trip() {
        let ctx = fresh();
        assert_eq!(esr_run(ctx, stack_body), 0);
        esr_free(ctx);
    }

    extern "C" fn ctx_get_put_body(ctx: *mut EsrEngine, _argc: usize, base: usize, _vp: usize) -> i32 {
        let name = CString::new("counter").unwrap();
        let key_id = esr_intern(ctx, name.as_ptr());

        let mut out = 0u64;
        if ctx_put(ctx, 1, key_id, Value::from_i32(41).bits(), 0) != 0 {
            return -1;
        }
        if ctx_get(ctx, 1, key_id, 0, &mut out) != 0 {
            return -1;
        }
        assert_eq!(unsafe { val(out) }, Value::from_i32(41));
        store_result(ctx, base, Value::Undefined);
        0
    }

    #[test]
    fn ctx_get_put_round_trips_through_global_object() {
        let ctx = fresh();
        assert_eq!(esr_run(ctx, ctx_get_put_body), 0);
        esr_free(ctx);
    }

    extern "C" fn prp_body(ctx: *mut EsrEngine, _argc: usize, base: usize, _vp: usize) -> i32 {
        let obj = new_obj(ctx);
        let name = CString::new("x").unwrap();
        let key_id = esr_intern(ctx, name.as_ptr());

        let mut out = 0u64;
        if prp_put(ctx, obj, 1, key_id, Value::from_i32(1).bits(), 5) != 0 {
            return -1;
        }
        if prp_get(ctx, obj, 1, key_id, 5, &mut out) != 0 {
            return -1;
        }
        assert_eq!(unsafe { val(out) }, Value::from_i32(1));
        // Second read should hit the now-populated cache and still agree.
        if prp_get(ctx, obj, 1, key_id, 5, &mut out) != 0 {
            return -1;
        }
        assert_eq!(unsafe { val(out) }, Value::from_i32(1));
        store_result(ctx, base, Value::Undefined);
        0
    }

    #[test]
    fn prp_get_put_cache_hit_then_miss_on_shape_change() {
        let ctx = fresh();
        assert_eq!(esr_run(ctx, prp_body), 0);
        esr_free(ctx);
    }

    extern "C" fn new_arr_body(ctx: *mut EsrEngine, _argc: usize, base: usize, _vp: usize) -> i32 {
        let items = stk_alloc(ctx, 2);
        unsafe { &mut *ctx }.engine.call_stack.set(items, Value::from_i32(10));
        unsafe { &mut *ctx }.engine.call_stack.set(items + 1, Value::from_i32(20));
        let arr = new_arr(ctx, 2, items);
        let Value::Object(o) = (unsafe { val(arr) }) else { panic!("expected object") };
        assert_eq!(o.array_length(), 2);
        stk_free(ctx, items);
        store_result(ctx, base, Value::Undefined);
        0
    }

    #[test]
    fn new_arr_builds_length_and_elements() {
        let ctx = fresh();
        assert_eq!(esr_run(ctx, new_arr_body), 0);
        esr_free(ctx);
    }
}
