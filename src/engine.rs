//! Engine: the single owning handle
//!
//! `Engine` is the one struct a host program constructs (spec §9 design
//! note: "specify a single 'engine' handle" rather than a set of
//! process-wide singletons). It owns the string pool, the shape tree root,
//! the execution context stack, the call stack, the boxing/function/array
//! prototypes, the global object and its lexical environment, the inline
//! caches, and an optional parser hook for `eval`/`new Function`.
//!
//! Grounded on spec §6 "Initialization" and on `original_source/runtime`'s
//! single `EsContextStack`/`EsCallStack` ownership collapsed onto one Rust
//! struct instead of a set of `static`s, matching this codebase's existing
//! choice (`context.rs`, `frame.rs`) to hang "process-wide" state off
//! `Engine` rather than a global.

use std::rc::Rc;

use tracing::{debug, info};

use crate::ast::Stmt;
use crate::bootstrap;
use crate::cache::{ContextCache, PropertyCache};
use crate::context::ContextStack;
use crate::env::LexEnv;
use crate::error::{ErrorKind, EsResult, RuntimeError};
use crate::eval;
use crate::frame::CallStack;
use crate::object::{ClassTag, Invoker, Obj, ObjectKind, ObjectRef, PropertyDescriptor};
use crate::ops::{BoxingPrototypes, Interp};
use crate::propkey::PropKey;
use crate::shape::Shape;
use crate::strpool::{StrId, StringPool};
use crate::value::Value;

/// A host-supplied front end for source text, needed only by `eval(string)`
/// and `new Function(...)` (spec §1: "the parser and AST producer is
/// consumed as a black box"). Everything else in this crate runs without
/// one, since generated code never re-parses source at run time.
pub trait Parser {
    fn parse(&mut self, source: &str) -> Result<Vec<Stmt>, String>;
}

/// The seven `prototype` objects for the built-in `Error` family, filled in
/// by `bootstrap::bootstrap` and consulted by `Engine::make_error_value`.
/// A plain array keyed by `ErrorKind` rather than a `HashMap`, since
/// `ErrorKind` carries no `Hash` impl (spec's error taxonomy is a closed,
/// seven-member set — an array is both the simplest and the fastest fit).
#[derive(Default)]
pub(crate) struct ErrorProtos {
    error: Option<ObjectRef>,
    eval_error: Option<ObjectRef>,
    range_error: Option<ObjectRef>,
    reference_error: Option<ObjectRef>,
    syntax_error: Option<ObjectRef>,
    type_error: Option<ObjectRef>,
    uri_error: Option<ObjectRef>,
}

impl ErrorProtos {
    pub(crate) fn set(&mut self, kind: ErrorKind, proto: ObjectRef) {
        let slot = match kind {
            ErrorKind::Error => &mut self.error,
            ErrorKind::EvalError => &mut self.eval_error,
            ErrorKind::RangeError => &mut self.range_error,
            ErrorKind::ReferenceError => &mut self.reference_error,
            ErrorKind::SyntaxError => &mut self.syntax_error,
            ErrorKind::TypeError => &mut self.type_error,
            ErrorKind::UriError => &mut self.uri_error,
            ErrorKind::Memory => return,
        };
        *slot = Some(proto);
    }

    pub(crate) fn get(&self, kind: ErrorKind) -> Option<&ObjectRef> {
        match kind {
            ErrorKind::Error => self.error.as_ref(),
            ErrorKind::EvalError => self.eval_error.as_ref(),
            ErrorKind::RangeError => self.range_error.as_ref(),
            ErrorKind::ReferenceError => self.reference_error.as_ref(),
            ErrorKind::SyntaxError => self.syntax_error.as_ref(),
            ErrorKind::TypeError => self.type_error.as_ref(),
            ErrorKind::UriError => self.uri_error.as_ref(),
            ErrorKind::Memory => None,
        }
    }
}

/// Constructor-time configuration (spec §2a "Configuration"): no file-based
/// config, just plain fields a host sets before calling `Engine::new`.
pub struct EngineOptions {
    /// Raises `RangeError` ("call stack size exceeded") once the call
    /// stack's slot count would exceed this; `0` means unlimited. Not yet
    /// consulted by the evaluator's call path (see DESIGN.md Open Question
    /// carry-forward); reserved for the generated-code ABI's frame push.
    pub max_call_stack_depth: usize,
    /// Number of distinct callsite ids the inline caches are sized for
    /// (spec §4.P); generated code assigns these at compile time. A
    /// tree-walked-only program needs no caches at all, so `0` is a valid
    /// (and the default) choice.
    pub callsite_count: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            max_call_stack_depth: 8192,
            callsite_count: 0,
        }
    }
}

pub struct Engine {
    pub(crate) pool: StringPool,
    pub(crate) root: Shape,
    pub(crate) ctx: ContextStack,
    pub(crate) call_stack: CallStack,
    pub(crate) protos: BoxingPrototypes,
    pub(crate) function_proto: ObjectRef,
    pub(crate) array_proto: ObjectRef,
    pub(crate) throw_type_error_fn: ObjectRef,
    pub(crate) error_protos: ErrorProtos,
    pub(crate) global_object: ObjectRef,
    pub(crate) global_env: LexEnv,
    ctx_cache: ContextCache,
    prop_cache: PropertyCache,
    options: EngineOptions,
    parser: Option<Box<dyn Parser>>,
    pub(crate) eval_str_id: StrId,
}

impl Engine {
    /// `esr_init`: allocates the string pool and shape root, builds a
    /// minimal placeholder object graph, then runs the two-phase
    /// prototype/global bootstrap (`bootstrap::bootstrap`), which replaces
    /// every placeholder field in place.
    pub fn new(options: EngineOptions) -> Engine {
        info!(max_call_stack_depth = options.max_call_stack_depth, "engine bootstrap starting");
        let mut pool = StringPool::new();
        let root = Shape::root();
        let eval_str_id = pool.intern("eval");

        let placeholder = ObjectRef::new(Obj::new(ClassTag::Object, None, root.clone(), ObjectKind::Plain));

        let ctx_cache = ContextCache::new(options.callsite_count);
        let prop_cache = PropertyCache::new(options.callsite_count);

        let mut engine = Engine {
            pool,
            root,
            ctx: ContextStack::new(),
            call_stack: CallStack::new(),
            protos: BoxingPrototypes {
                object: placeholder.clone(),
                boolean: placeholder.clone(),
                number: placeholder.clone(),
                string: placeholder.clone(),
            },
            function_proto: placeholder.clone(),
            array_proto: placeholder.clone(),
            throw_type_error_fn: placeholder.clone(),
            error_protos: ErrorProtos::default(),
            global_object: placeholder.clone(),
            global_env: LexEnv::new_decl_env(None),
            ctx_cache,
            prop_cache,
            options,
            parser: None,
            eval_str_id,
        };

        bootstrap::bootstrap(&mut engine);
        info!("engine bootstrap complete");
        engine
    }

    pub fn with_parser(mut self, parser: Box<dyn Parser>) -> Engine {
        self.parser = Some(parser);
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn context_cache(&self) -> &ContextCache {
        &self.ctx_cache
    }

    pub fn context_cache_mut(&mut self) -> &mut ContextCache {
        &mut self.ctx_cache
    }

    pub fn property_cache(&self) -> &PropertyCache {
        &self.prop_cache
    }

    pub fn property_cache_mut(&mut self) -> &mut PropertyCache {
        &mut self.prop_cache
    }

    pub fn global_object_ref(&self) -> &ObjectRef {
        &self.global_object
    }

    /// `esr_run`: runs a top-level program (global code, ES5 §10.4.1)
    /// against the persistent global environment. A fresh global context is
    /// pushed and popped around the run so repeated calls (e.g. a REPL
    /// feeding one statement list at a time) see the same global bindings
    /// accumulate across calls.
    pub fn run(&mut self, stmts: &[Stmt], strict: bool) -> EsResult<Value> {
        self.ctx.push_global(strict, self.global_env.clone());
        let result = eval::eval_program(self, stmts, true);
        self.ctx.pop();
        result
    }

    /// `esr_error`: formats an uncaught thrown value into a host-facing
    /// report. Reads the error kind off the value when it is a built-in
    /// `Error` instance, else reports it as a plain `Error`.
    pub fn describe_uncaught(&mut self, thrown: &Value) -> RuntimeError {
        let kind = match thrown {
            Value::Object(o) => match &o.borrow().kind {
                ObjectKind::Error(k) => *k,
                _ => ErrorKind::Error,
            },
            _ => ErrorKind::Error,
        };
        let message = crate::ops::to_string(thrown, self).unwrap_or_else(|_| "<error formatting uncaught exception>".to_string());
        debug!(kind = %kind, %message, "uncaught exception leaving esr_run");
        RuntimeError { kind, message }
    }

    /// Builds an instance of the built-in `Error` subtype named by `kind`,
    /// with its `message` own property set. Used by `Invoker::throw` and by
    /// `stdlib`'s error constructors (spec §4.M).
    pub(crate) fn make_error_value(&mut self, kind: ErrorKind, message: String) -> Value {
        let proto = self.error_protos.get(kind).cloned().unwrap_or_else(|| self.protos.object.clone());
        let obj = ObjectRef::new(Obj::new(ClassTag::Error, Some(proto), self.root.clone(), ObjectKind::Error(kind)));
        let message_key = PropKey::from_str_id(self.pool.intern("message"));
        let _ = obj.define_own_property(message_key, PropertyDescriptor::from_data(Value::String(self.pool.intern(&message)), true, false, true), false, self);
        Value::Object(obj)
    }
}

impl Invoker for Engine {
    fn call(&mut self, callee: &ObjectRef, this: Value, args: &[Value]) -> EsResult<Value> {
        eval::call_interpreted(self, callee, this, args)
    }

    fn construct(&mut self, callee: &ObjectRef, args: &[Value]) -> EsResult<Value> {
        crate::ops::call_new(self, &Value::Object(callee.clone()), args)
    }

    fn intern(&mut self, s: &str) -> StrId {
        self.pool.intern(s)
    }

    fn lookup_str(&self, id: StrId) -> String {
        self.pool.lookup(id).to_owned()
    }

    fn throw(&mut self, kind: ErrorKind, message: impl Into<String>) -> Value {
        self.make_error_value(kind, message.into())
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Interp for Engine {
    fn ctx(&self) -> &ContextStack {
        &self.ctx
    }

    fn ctx_mut(&mut self) -> &mut ContextStack {
        &mut self.ctx
    }

    fn protos(&self) -> &BoxingPrototypes {
        &self.protos
    }

    fn root(&self) -> Shape {
        self.root.clone()
    }

    fn global_object(&self) -> &ObjectRef {
        &self.global_object
    }

    fn global_env(&self) -> LexEnv {
        self.global_env.clone()
    }

    fn function_proto(&self) -> ObjectRef {
        self.function_proto.clone()
    }

    fn array_proto(&self) -> ObjectRef {
        self.array_proto.clone()
    }

    fn throw_type_error_fn(&self) -> ObjectRef {
        self.throw_type_error_fn.clone()
    }

    fn call_stack_mut(&mut self) -> &mut CallStack {
        &mut self.call_stack
    }

    fn parse_program(&mut self, source: &str) -> EsResult<Rc<Vec<Stmt>>> {
        match &mut self.parser {
            Some(parser) => match parser.parse(source) {
                Ok(stmts) => Ok(Rc::new(stmts)),
                Err(msg) => Err(self.throw(ErrorKind::SyntaxError, msg)),
            },
            None => Err(self.throw(ErrorKind::EvalError, "no parser installed; construct Engine::with_parser to support eval/new Function")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_bootstraps_without_panicking() {
        let engine = Engine::new(EngineOptions::default());
        assert_eq!(engine.global_object_ref().borrow().class, ClassTag::Object);
    }

    #[test]
    fn running_an_empty_program_yields_undefined() {
        let mut engine = Engine::new(EngineOptions::default());
        let result = engine.run(&[], false).unwrap();
        assert_eq!(result, Value::Undefined);
    }

    #[test]
    fn global_var_persists_across_run_calls() {
        use crate::ast::Expr;

        let mut engine = Engine::new(EngineOptions::default());
        let x = engine.intern("x");
        let program1 = vec![Stmt::VarDecl(vec![(x, Some(Expr::NumberLit(41.0)))])];
        engine.run(&program1, false).unwrap();
        let program2 = vec![Stmt::Expr(Expr::Binary(
            crate::ast::BinOp::Add,
            Box::new(Expr::Ident(x)),
            Box::new(Expr::NumberLit(1.0)),
        ))];
        let result = engine.run(&program2, false).unwrap();
        assert_eq!(result, Value::Number(42.0));
    }
}
