//! Execution context stack
//!
//! One context per `global`/`eval`/`function`/`catch`/`with` entry, each
//! carrying its lexical environment, its variable environment (distinct
//! only for `catch`/`with`, which extend the lexical chain without
//! changing where `var` declarations land), a strict-mode flag, and a
//! pending-exception slot that `pop`/`unwind_to` propagate outward.
//!
//! Grounded on `original_source/runtime/context.hh`/`context.cc`: the
//! context stack there is a process-wide singleton
//! (`EsContextStack::instance()`); this crate's single owning `Engine`
//! handle holds it instead (spec §9 "Global mutable state" — no `static`).

use crate::env::LexEnv;
use crate::object::ObjectRef;
use crate::value::Value;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ContextKind {
    Global,
    Eval,
    Function,
    Catch,
    With,
}

pub struct ExecContext {
    pub kind: ContextKind,
    pub lex_env: LexEnv,
    pub var_env: LexEnv,
    pub this_binding: Value,
    pub strict: bool,
    /// Set by `ex_set`/a throwing operation; consulted and cleared by
    /// `try`/`catch` handling in the evaluator, and propagated outward by
    /// `pop`/`unwind_to` when a context is torn down while one is pending
    /// (spec §4.I, §7).
    pub pending_exception: Option<Value>,
}

impl ExecContext {
    pub fn set_exception(&mut self, v: Value) {
        self.pending_exception = Some(v);
    }

    pub fn take_exception(&mut self) -> Option<Value> {
        self.pending_exception.take()
    }
}

/// The execution context stack. One instance per `Engine` (spec §9: no
/// process-wide singleton in this crate — see `engine.rs`).
pub struct ContextStack {
    frames: Vec<ExecContext>,
}

impl ContextStack {
    pub fn new() -> ContextStack {
        ContextStack { frames: Vec::new() }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn current(&self) -> &ExecContext {
        self.frames.last().expect("context stack underflow")
    }

    pub fn current_mut(&mut self) -> &mut ExecContext {
        self.frames.last_mut().expect("context stack underflow")
    }

    pub fn push_global(&mut self, strict: bool, global_env: LexEnv) {
        let this_binding = crate::env::get_this_value(&global_env);
        self.frames.push(ExecContext {
            kind: ContextKind::Global,
            lex_env: global_env.clone(),
            var_env: global_env,
            this_binding,
            strict,
            pending_exception: None,
        });
    }

    pub fn push_eval(&mut self, strict: bool, lex_env: LexEnv, var_env: LexEnv, this_binding: Value) {
        self.frames.push(ExecContext {
            kind: ContextKind::Eval,
            lex_env,
            var_env,
            this_binding,
            strict,
            pending_exception: None,
        });
    }

    pub fn push_fun(&mut self, strict: bool, scope: LexEnv, this_binding: Value) {
        self.frames.push(ExecContext {
            kind: ContextKind::Function,
            lex_env: scope.clone(),
            var_env: scope,
            this_binding,
            strict,
            pending_exception: None,
        });
    }

    /// `catch(key, value)`: a new declarative environment nested in the
    /// current lexical environment, with a single immutable-but-mutable
    /// (ES5 `catch` bindings are mutable, just scoped) binding for `key`.
    /// `var_env` is inherited unchanged — `var` inside a `catch` block
    /// still hoists to the enclosing function/global scope.
    pub fn push_catch(&mut self, key: crate::propkey::PropKey, value: Value) {
        let current = self.current();
        let strict = current.strict;
        let var_env = current.var_env.clone();
        let this_binding = current.this_binding.clone();
        let catch_env = LexEnv::new_decl_env(Some(current.lex_env.clone()));
        if let Some(decl) = catch_env.record().as_declarative() {
            // Binding is freshly created and mutable, so writing its value
            // never takes the error paths that would need a real invoker.
            decl.borrow_mut().create_mutable_binding(key, false);
            if let Some(slot) = decl.borrow().slot_of(key) {
                *slot.borrow_mut() = value;
            }
        }
        self.frames.push(ExecContext {
            kind: ContextKind::Catch,
            lex_env: catch_env,
            var_env,
            this_binding,
            strict,
            pending_exception: None,
        });
    }

    /// `with(value)`: the operand is expected to already be coerced to an
    /// object by the caller (spec §4.I: "the with operand is coerced to
    /// object"); this just builds the object-environment layer.
    pub fn push_with(&mut self, obj: ObjectRef) {
        let current = self.current();
        let strict = current.strict;
        let var_env = current.var_env.clone();
        let this_binding = current.this_binding.clone();
        let with_env = LexEnv::new_obj_env(obj, Some(current.lex_env.clone()), false);
        self.frames.push(ExecContext {
            kind: ContextKind::With,
            lex_env: with_env,
            var_env,
            this_binding,
            strict,
            pending_exception: None,
        });
    }

    /// Pops the top context; if it carried a pending exception, propagates
    /// it into the new top (spec §4.I).
    pub fn pop(&mut self) {
        let popped = self.frames.pop().expect("pop on empty context stack");
        if let Some(exc) = popped.pending_exception {
            if let Some(parent) = self.frames.last_mut() {
                parent.pending_exception = Some(exc);
            }
        }
    }

    /// Pops contexts down to `depth`, propagating any pending exception
    /// found along the way into the frame that survives at `depth` (used
    /// for stack unwinding on a thrown value crossing scope boundaries).
    pub fn unwind_to(&mut self, depth: usize) {
        let mut carried: Option<Value> = None;
        while self.frames.len() > depth {
            let popped = self.frames.pop().unwrap();
            if popped.pending_exception.is_some() {
                carried = popped.pending_exception;
            }
        }
        if let Some(exc) = carried {
            if let Some(top) = self.frames.last_mut() {
                top.pending_exception = Some(exc);
            }
        }
    }
}

impl Default for ContextStack {
    fn default() -> Self {
        Self::new()
    }
}
