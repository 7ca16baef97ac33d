//! Call frame and call stack
//!
//! One flat stack of aliasable value slots shared by every call, regardless
//! of whether the callee is native, generated, or tree-walked (spec §4.J:
//! "interpreter-independent stack frame layout used uniformly"). A frame
//! reserves a 3-slot header (callee, this, a reserved slot mirroring the
//! source layout's saved-frame-pointer word) followed by `max(argc, arity)`
//! argument slots — `vp = fp + argc + 3` in the spec's raw-pointer framing;
//! here `vp` is simply "the header's end", since `Frame` tracks its own
//! bounds rather than exposing raw addresses (see DESIGN.md "Call-stack
//! representation").
//!
//! Grounded on `original_source/runtime/frame.hh`'s `EsCallFrame` factory
//! methods (`push_function`, `push_function_excl_args`, `push_eval`,
//! `push_global`) and its RAII destructor that truncates the stack back to
//! the frame's pre-push height on every exit path, including unwinding.

use crate::env::LexEnv;
use crate::object::ObjectRef;
use crate::value::{new_slot, Slot, Value};

pub(crate) const HEADER_LEN: usize = 3;

/// The shared slot stack every `Frame` is a view over. Owned by `Engine`;
/// one per running program (spec §5: "one call stack").
pub struct CallStack {
    slots: Vec<Slot>,
}

impl CallStack {
    pub fn new() -> CallStack {
        CallStack { slots: Vec::new() }
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    fn reserve(&mut self, n: usize) -> usize {
        let base = self.slots.len();
        self.slots.resize_with(base + n, || new_slot(Value::Undefined));
        base
    }

    fn truncate_to(&mut self, depth: usize) {
        self.slots.truncate(depth);
    }

    /// Raw index-based counterpart to `reserve`, for the ABI layer (`abi.rs`),
    /// which can't hold a `Frame<'s>` across separate `extern "C"` calls —
    /// generated code instead carries the returned base index itself as its
    /// "frame pointer" and addresses slots relative to it.
    pub(crate) fn alloc(&mut self, n: usize) -> usize {
        self.reserve(n)
    }

    /// Raw index-based counterpart to `Frame`'s `Drop` truncation.
    pub(crate) fn free(&mut self, base: usize) {
        self.truncate_to(base);
    }

    /// Pushes a single value onto the top of the stack, for generated code
    /// building up an argument list with side effects between each push
    /// (`push_function_excl_args`'s raw-index equivalent).
    pub(crate) fn push_one(&mut self, v: Value) {
        self.slots.push(new_slot(v));
    }

    pub(crate) fn get(&self, idx: usize) -> Value {
        self.slots[idx].borrow().clone()
    }

    pub(crate) fn set(&self, idx: usize, v: Value) {
        *self.slots[idx].borrow_mut() = v;
    }

    /// The live slot at `idx`, for aliasing into a declarative environment
    /// binding or an `arguments` mapped property.
    pub(crate) fn slot(&self, idx: usize) -> Slot {
        self.slots[idx].clone()
    }
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new()
    }
}

/// A non-owning handle over a range of the call stack, truncating it back
/// on drop (move-only: cloning would desynchronize the stack position, so
/// `Frame` derives neither `Clone` nor `Copy`, matching the spec's "move-
/// only" note).
pub struct Frame<'s> {
    stack: &'s mut CallStack,
    base: usize,
    argc: usize,
    arity: usize,
    scope: LexEnv,
}

impl<'s> Frame<'s> {
    /// `push_function`: reserves `argc + max(0, arity - argc) + 3` slots,
    /// populates callee/this, and applies the non-strict this-binding
    /// coercion rule (null/undefined -> global object, primitive -> boxed,
    /// object -> unchanged). Strict callees keep `this_arg` verbatim.
    pub fn push_function(
        stack: &'s mut CallStack,
        callee: ObjectRef,
        this_arg: Value,
        args: &[Value],
        arity: usize,
        strict: bool,
        scope: LexEnv,
        global_object: &ObjectRef,
        object_proto_for_box: impl FnOnce(Value) -> Value,
    ) -> Frame<'s> {
        let argc = args.len();
        let slot_count = HEADER_LEN + argc.max(arity);
        let base = stack.reserve(slot_count);

        let this_value = if strict {
            this_arg
        } else {
            match this_arg {
                Value::Undefined | Value::Null => Value::Object(global_object.clone()),
                Value::Object(o) => Value::Object(o),
                primitive => object_proto_for_box(primitive),
            }
        };

        *stack.slots[base].borrow_mut() = Value::Object(callee);
        *stack.slots[base + 1].borrow_mut() = this_value;
        for (i, a) in args.iter().enumerate() {
            *stack.slots[base + HEADER_LEN + i].borrow_mut() = a.clone();
        }

        Frame {
            stack,
            base,
            argc,
            arity,
            scope,
        }
    }

    /// Same layout as `push_function`, but assumes the caller has already
    /// pushed `argc` argument values directly onto the stack top (e.g. via
    /// `op_stk_push` while evaluating arguments with side effects) rather
    /// than handing them as a slice.
    pub fn push_function_excl_args(
        stack: &'s mut CallStack,
        callee: ObjectRef,
        this_arg: Value,
        argc: usize,
        arity: usize,
        strict: bool,
        scope: LexEnv,
        global_object: &ObjectRef,
        object_proto_for_box: impl FnOnce(Value) -> Value,
    ) -> Frame<'s> {
        // The caller already grew `stack` by `argc` slots; shift them into
        // place under a freshly-reserved header rather than double-counting.
        let pre_args_base = stack.slots.len() - argc;
        let pushed_args: Vec<Slot> = stack.slots.split_off(pre_args_base);

        let extra = arity.saturating_sub(argc);
        let base = stack.reserve(HEADER_LEN);
        stack.slots.extend(pushed_args);
        stack.slots.resize_with(base + HEADER_LEN + argc + extra, || new_slot(Value::Undefined));

        let this_value = if strict {
            this_arg
        } else {
            match this_arg {
                Value::Undefined | Value::Null => Value::Object(global_object.clone()),
                Value::Object(o) => Value::Object(o),
                primitive => object_proto_for_box(primitive),
            }
        };
        *stack.slots[base].borrow_mut() = Value::Object(callee);
        *stack.slots[base + 1].borrow_mut() = this_value;

        Frame {
            stack,
            base,
            argc,
            arity,
            scope,
        }
    }

    /// `push_eval_direct`: 0 declared arguments, `this` inherited from the
    /// calling context.
    pub fn push_eval_direct(stack: &'s mut CallStack, this_arg: Value, scope: LexEnv) -> Frame<'s> {
        let base = stack.reserve(HEADER_LEN);
        *stack.slots[base + 1].borrow_mut() = this_arg;
        Frame {
            stack,
            base,
            argc: 0,
            arity: 0,
            scope,
        }
    }

    /// `push_eval_indirect`: 0 declared arguments, `this` is the global
    /// object.
    pub fn push_eval_indirect(stack: &'s mut CallStack, global_object: &ObjectRef, scope: LexEnv) -> Frame<'s> {
        let base = stack.reserve(HEADER_LEN);
        *stack.slots[base + 1].borrow_mut() = Value::Object(global_object.clone());
        Frame {
            stack,
            base,
            argc: 0,
            arity: 0,
            scope,
        }
    }

    /// `push_global`: the program's entry point frame.
    pub fn push_global(stack: &'s mut CallStack, global_object: &ObjectRef, scope: LexEnv) -> Frame<'s> {
        let base = stack.reserve(HEADER_LEN);
        *stack.slots[base + 1].borrow_mut() = Value::Object(global_object.clone());
        Frame {
            stack,
            base,
            argc: 0,
            arity: 0,
            scope,
        }
    }

    /// `wrap`: a non-owning view over an already-pushed frame, for re-entry
    /// from native code that receives `(argc, fp, vp)` and needs a `Frame`
    /// without pushing a second one.
    pub fn wrap(stack: &'s mut CallStack, base: usize, argc: usize, arity: usize, scope: LexEnv) -> Frame<'s> {
        Frame {
            stack,
            base,
            argc,
            arity,
            scope,
        }
    }

    pub fn callee(&self) -> Value {
        self.stack.slots[self.base].borrow().clone()
    }

    pub fn this_arg(&self) -> Value {
        self.stack.slots[self.base + 1].borrow().clone()
    }

    pub fn argc(&self) -> usize {
        self.argc
    }

    pub fn scope(&self) -> &LexEnv {
        &self.scope
    }

    /// Read argument `i`, or `undefined` past `argc` (ES5's implicit
    /// padding for under-supplied parameters).
    pub fn arg(&self, i: usize) -> Value {
        if i < self.argc.max(self.arity) {
            self.stack.slots[self.base + HEADER_LEN + i].borrow().clone()
        } else {
            Value::Undefined
        }
    }

    /// The live slot backing argument `i`, for wiring into a declarative
    /// environment's parameter binding or an `Arguments` parameter map
    /// (spec §4.J: "link_parameter(i, &snapshot[i])").
    pub fn arg_slot(&self, i: usize) -> Option<Slot> {
        if i < self.argc.max(self.arity) {
            Some(self.stack.slots[self.base + HEADER_LEN + i].clone())
        } else {
            None
        }
    }

    pub fn args_snapshot(&self) -> Vec<Value> {
        (0..self.argc).map(|i| self.arg(i)).collect()
    }

    pub fn base(&self) -> usize {
        self.base
    }
}

impl<'s> Drop for Frame<'s> {
    fn drop(&mut self) {
        self.stack.truncate_to(self.base);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ClassTag, Obj, ObjectKind};
    use crate::shape::Shape;

    fn dummy_object() -> ObjectRef {
        ObjectRef::new(Obj::new(ClassTag::Object, None, Shape::root(), ObjectKind::Plain))
    }

    #[test]
    fn frame_reserves_args_padded_to_arity() {
        let mut stack = CallStack::new();
        let callee = dummy_object();
        let global = dummy_object();
        let scope = LexEnv::new_decl_env(None);
        let frame = Frame::push_function(
            &mut stack,
            callee,
            Value::Undefined,
            &[Value::from_i32(1), Value::from_i32(2)],
            4,
            true,
            scope,
            &global,
            |v| v,
        );
        assert_eq!(frame.argc(), 2);
        assert_eq!(frame.arg(0), Value::from_i32(1));
        assert_eq!(frame.arg(1), Value::from_i32(2));
        assert_eq!(frame.arg(3), Value::Undefined);
    }

    #[test]
    fn non_strict_undefined_this_becomes_global_object() {
        let mut stack = CallStack::new();
        let callee = dummy_object();
        let global = dummy_object();
        let scope = LexEnv::new_decl_env(None);
        let frame = Frame::push_function(&mut stack, callee, Value::Undefined, &[], 0, false, scope, &global, |v| v);
        assert_eq!(frame.this_arg(), Value::Object(global));
    }

    #[test]
    fn drop_truncates_stack_back_to_base() {
        let mut stack = CallStack::new();
        let callee = dummy_object();
        let global = dummy_object();
        let scope = LexEnv::new_decl_env(None);
        let before = stack.depth();
        {
            let _frame = Frame::push_function(&mut stack, callee, Value::Undefined, &[Value::from_i32(1)], 1, true, scope, &global, |v| v);
            assert!(stack.depth() > before);
        }
        assert_eq!(stack.depth(), before);
    }
}
