//! Tree-walking evaluator
//!
//! Walks the minimal AST of `src/ast.rs`, producing a `Completion` for
//! statements and a `Value` for expressions. This is the only consumer of
//! `ast.rs`'s node shapes; generated native code never touches this module
//! (spec §1, §4.L).
//!
//! `Completion` covers Normal/Break/Continue/Return; Throw is instead
//! represented by `EsResult`'s `Err(Value)` and propagated with `?`, letting
//! ordinary Rust control flow carry exceptional completion rather than a
//! fourth `Completion` variant threaded through every match arm (spec §9
//! design note on avoiding native panics/exceptions for ordinary control
//! flow — threading `Result` through `?` is the safe-Rust equivalent of the
//! original's longjmp-based unwind).
//!
//! Grounded on spec §4.L and §3a (Completion record), and on
//! `original_source/runtime/eval.cc` for try/catch/finally completion
//! composition (§12.14) and label matching for break/continue.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Expr, ForInit, FunctionBody, PropKeyExpr, Stmt, SwitchCase, UnOp, BinOp};
use crate::env::{EnvRecord, LexEnv};
use crate::error::{ErrorKind, EsResult};
use crate::frame::Frame;
use crate::object::{
    ArgumentsData, ClassTag, FunctionData, FunctionKind, Obj, ObjectKind, ObjectRef,
    PropertyDescriptor,
};
use crate::ops::{
    self, abstract_equals, abstract_relational_comparison, call_keyed, call_named, call_new,
    call_value, ctx_delete, ctx_get, ctx_put, op_add, op_bit_and, op_bit_or, op_bit_xor, op_div,
    op_in, op_instance_of, op_mod, op_mul, op_sar, op_shl, op_shr, op_sub, op_typeof, prop_delete,
    prop_get, prop_put, strict_equals, to_boolean, to_number, to_object, to_property_key, Interp,
};
use crate::propkey::PropKey;
use crate::strpool::StrId;
use crate::value::{new_slot, Slot, Value};

/// Statement-level result. Throw is carried out-of-band via `EsResult`, so
/// every completion here is a "normal" outcome of running a statement to
/// its end (spec §3a, restricted to the four completion kinds that ever
/// reach a statement boundary without unwinding via `?`).
#[derive(Clone)]
pub enum Completion {
    /// Ran to completion; carries the last expression-statement value seen,
    /// for `eval`'s return value (ES5 §12.1's "empty" completion is
    /// `None` here).
    Normal(Option<Value>),
    Break(Option<StrId>),
    Continue(Option<StrId>),
    Return(Value),
}

fn label_matches(label: Option<StrId>, labels: &[StrId]) -> bool {
    match label {
        None => true,
        Some(l) => labels.contains(&l),
    }
}

// ---------------------------------------------------------------------
// Statement sequencing
// ---------------------------------------------------------------------

/// Runs a statement list in order, stopping early on any abrupt completion.
/// The "normal" value threaded through is the last non-empty value seen,
/// matching ES5's completion-value propagation through a statement list.
pub fn eval_statements<I: Interp + ?Sized>(inv: &mut I, stmts: &[Stmt]) -> EsResult<Completion> {
    let mut last = None;
    for stmt in stmts {
        match eval_stmt(inv, stmt, &[])? {
            Completion::Normal(v) => {
                if v.is_some() {
                    last = v;
                }
            }
            other => return Ok(other),
        }
    }
    Ok(Completion::Normal(last))
}

fn eval_stmt<I: Interp + ?Sized>(inv: &mut I, stmt: &Stmt, labels: &[StrId]) -> EsResult<Completion> {
    match stmt {
        Stmt::Empty | Stmt::FunctionDecl(_) => Ok(Completion::Normal(None)),
        Stmt::Expr(e) => Ok(Completion::Normal(Some(eval_expr(inv, e)?))),
        Stmt::VarDecl(decls) => {
            for (name, init) in decls {
                if let Some(e) = init {
                    let v = eval_expr(inv, e)?;
                    ctx_put(inv, PropKey::from_str_id(*name), v)?;
                }
            }
            Ok(Completion::Normal(None))
        }
        Stmt::Block(stmts) => eval_statements(inv, stmts),
        Stmt::If(cond, then_s, else_s) => {
            let c = eval_expr(inv, cond)?;
            if to_boolean(&c, inv) {
                eval_stmt(inv, then_s, &[])
            } else if let Some(e) = else_s {
                eval_stmt(inv, e, &[])
            } else {
                Ok(Completion::Normal(None))
            }
        }
        Stmt::While(cond, body) => eval_while(inv, cond, body, labels),
        Stmt::DoWhile(body, cond) => eval_do_while(inv, body, cond, labels),
        Stmt::For(init, cond, update, body) => eval_for(inv, init, cond, update, body, labels),
        Stmt::ForIn(var, expr, body) => eval_for_in(inv, *var, expr, body, labels),
        Stmt::Return(e) => {
            let v = match e {
                Some(expr) => eval_expr(inv, expr)?,
                None => Value::Undefined,
            };
            Ok(Completion::Return(v))
        }
        Stmt::Break(label) => Ok(Completion::Break(*label)),
        Stmt::Continue(label) => Ok(Completion::Continue(*label)),
        Stmt::Throw(e) => Err(eval_expr(inv, e)?),
        Stmt::Try { block, catch, finally } => eval_try(inv, block, catch, finally),
        Stmt::With(e, body) => eval_with(inv, e, body),
        Stmt::Switch(disc, cases) => eval_switch(inv, disc, cases, labels),
        Stmt::Labeled(label, inner) => eval_labeled(inv, *label, inner),
    }
}

fn eval_while<I: Interp + ?Sized>(inv: &mut I, cond: &Expr, body: &Stmt, labels: &[StrId]) -> EsResult<Completion> {
    let mut last = None;
    loop {
        let c = eval_expr(inv, cond)?;
        if !to_boolean(&c, inv) {
            break;
        }
        match eval_stmt(inv, body, &[])? {
            Completion::Normal(v) => {
                if v.is_some() {
                    last = v;
                }
            }
            Completion::Break(l) if label_matches(l, labels) => break,
            Completion::Continue(l) if label_matches(l, labels) => {}
            other => return Ok(other),
        }
    }
    Ok(Completion::Normal(last))
}

fn eval_do_while<I: Interp + ?Sized>(inv: &mut I, body: &Stmt, cond: &Expr, labels: &[StrId]) -> EsResult<Completion> {
    let mut last = None;
    loop {
        match eval_stmt(inv, body, &[])? {
            Completion::Normal(v) => {
                if v.is_some() {
                    last = v;
                }
            }
            Completion::Break(l) if label_matches(l, labels) => break,
            Completion::Continue(l) if label_matches(l, labels) => {}
            other => return Ok(other),
        }
        let c = eval_expr(inv, cond)?;
        if !to_boolean(&c, inv) {
            break;
        }
    }
    Ok(Completion::Normal(last))
}

fn eval_for<I: Interp + ?Sized>(
    inv: &mut I,
    init: &ForInit,
    cond: &Option<Expr>,
    update: &Option<Expr>,
    body: &Stmt,
    labels: &[StrId],
) -> EsResult<Completion> {
    match init {
        ForInit::None => {}
        ForInit::Expr(e) => {
            eval_expr(inv, e)?;
        }
        ForInit::VarDecl(decls) => {
            for (name, e) in decls {
                if let Some(e) = e {
                    let v = eval_expr(inv, e)?;
                    ctx_put(inv, PropKey::from_str_id(*name), v)?;
                }
            }
        }
    }

    let mut last = None;
    loop {
        if let Some(c) = cond {
            let cv = eval_expr(inv, c)?;
            if !to_boolean(&cv, inv) {
                break;
            }
        }
        match eval_stmt(inv, body, &[])? {
            Completion::Normal(v) => {
                if v.is_some() {
                    last = v;
                }
            }
            Completion::Break(l) if label_matches(l, labels) => break,
            Completion::Continue(l) if label_matches(l, labels) => {}
            other => return Ok(other),
        }
        if let Some(u) = update {
            eval_expr(inv, u)?;
        }
    }
    Ok(Completion::Normal(last))
}

fn eval_for_in<I: Interp + ?Sized>(inv: &mut I, var: StrId, expr: &Expr, body: &Stmt, labels: &[StrId]) -> EsResult<Completion> {
    let val = eval_expr(inv, expr)?;
    if val.is_nullish() {
        return Ok(Completion::Normal(None));
    }
    let protos = boxing_snapshot(inv);
    let root = inv.root();
    let obj = to_object(&val, &protos, root, inv)?;
    let keys = obj.for_in_keys();
    let var_key = PropKey::from_str_id(var);

    let mut last = None;
    for key in keys {
        if !obj.has_property(key) {
            continue;
        }
        let name = key.to_string(|id| inv.lookup_str(id));
        let name_id = inv.intern(&name);
        ctx_put(inv, var_key, Value::String(name_id))?;
        match eval_stmt(inv, body, &[])? {
            Completion::Normal(v) => {
                if v.is_some() {
                    last = v;
                }
            }
            Completion::Break(l) if label_matches(l, labels) => break,
            Completion::Continue(l) if label_matches(l, labels) => continue,
            other => return Ok(other),
        }
    }
    Ok(Completion::Normal(last))
}

fn eval_switch<I: Interp + ?Sized>(inv: &mut I, disc: &Expr, cases: &[SwitchCase], labels: &[StrId]) -> EsResult<Completion> {
    let d = eval_expr(inv, disc)?;
    let mut start = None;
    for (i, case) in cases.iter().enumerate() {
        if let Some(test) = &case.test {
            let t = eval_expr(inv, test)?;
            if strict_equals(&d, &t) {
                start = Some(i);
                break;
            }
        }
    }
    let start = start.or_else(|| cases.iter().position(|c| c.test.is_none()));
    let Some(start) = start else {
        return Ok(Completion::Normal(None));
    };

    let mut last = None;
    for case in &cases[start..] {
        match eval_statements(inv, &case.body)? {
            Completion::Normal(v) => {
                if v.is_some() {
                    last = v;
                }
            }
            Completion::Break(l) if label_matches(l, labels) => return Ok(Completion::Normal(last)),
            other => return Ok(other),
        }
    }
    Ok(Completion::Normal(last))
}

fn eval_labeled<I: Interp + ?Sized>(inv: &mut I, label: StrId, inner: &Stmt) -> EsResult<Completion> {
    let mut label_set = vec![label];
    let mut cursor = inner;
    while let Stmt::Labeled(l2, next) = cursor {
        label_set.push(*l2);
        cursor = next.as_ref();
    }

    let is_loop_or_switch = matches!(
        cursor,
        Stmt::While(..) | Stmt::DoWhile(..) | Stmt::For(..) | Stmt::ForIn(..) | Stmt::Switch(..)
    );
    let result = if is_loop_or_switch {
        eval_stmt(inv, cursor, &label_set)?
    } else {
        eval_stmt(inv, cursor, &[])?
    };

    match result {
        Completion::Break(Some(l)) if label_set.contains(&l) => Ok(Completion::Normal(None)),
        other => Ok(other),
    }
}

/// ES5 §12.14: `finally`'s own abrupt completion (if any) replaces whatever
/// `try`/`catch` produced, including a pending throw.
fn eval_try<I: Interp + ?Sized>(
    inv: &mut I,
    block: &[Stmt],
    catch: &Option<(StrId, Vec<Stmt>)>,
    finally: &Option<Vec<Stmt>>,
) -> EsResult<Completion> {
    let try_result = eval_statements(inv, block);

    let result: EsResult<Completion> = match try_result {
        Err(thrown) => match catch {
            Some((param, catch_body)) => {
                inv.ctx_mut().push_catch(PropKey::from_str_id(*param), thrown);
                let r = eval_statements(inv, catch_body);
                inv.ctx_mut().pop();
                r
            }
            None => Err(thrown),
        },
        ok => ok,
    };

    match finally {
        None => result,
        Some(finally_body) => match eval_statements(inv, finally_body)? {
            Completion::Normal(_) => result,
            abrupt => Ok(abrupt),
        },
    }
}

fn eval_with<I: Interp + ?Sized>(inv: &mut I, expr: &Expr, body: &Stmt) -> EsResult<Completion> {
    let v = eval_expr(inv, expr)?;
    let protos = boxing_snapshot(inv);
    let root = inv.root();
    let obj = to_object(&v, &protos, root, inv)?;
    inv.ctx_mut().push_with(obj);
    let r = eval_stmt(inv, body, &[]);
    inv.ctx_mut().pop();
    r
}

// ---------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------

pub fn eval_expr<I: Interp + ?Sized>(inv: &mut I, expr: &Expr) -> EsResult<Value> {
    match expr {
        Expr::NumberLit(n) => Ok(Value::Number(*n)),
        Expr::StringLit(id) => Ok(Value::String(*id)),
        Expr::BoolLit(b) => Ok(Value::Boolean(*b)),
        Expr::NullLit => Ok(Value::Null),
        Expr::UndefinedLit => Ok(Value::Undefined),
        Expr::Ident(name) => ctx_get(inv, PropKey::from_str_id(*name)),
        Expr::This => Ok(inv.ctx().current().this_binding.clone()),
        Expr::ArrayLit(elems) => eval_array_lit(inv, elems),
        Expr::ObjectLit(props) => eval_object_lit(inv, props),
        Expr::FunctionLit(body) => eval_function_lit(inv, body),
        Expr::Unary(op, e) => eval_unary(inv, *op, e),
        Expr::Binary(op, a, b) => eval_binary(inv, *op, a, b),
        Expr::Assign(target, value) => {
            let v = eval_expr(inv, value)?;
            assign_to(inv, target, v.clone())?;
            Ok(v)
        }
        Expr::CompoundAssign(op, target, value) => eval_compound_assign(inv, *op, target, value),
        Expr::Conditional(c, t, e) => {
            let cv = eval_expr(inv, c)?;
            if to_boolean(&cv, inv) {
                eval_expr(inv, t)
            } else {
                eval_expr(inv, e)
            }
        }
        Expr::Comma(a, b) => {
            eval_expr(inv, a)?;
            eval_expr(inv, b)
        }
        Expr::Member(base, key) => {
            let b = eval_expr(inv, base)?;
            let k = eval_prop_key(inv, key)?;
            prop_get(inv, &b, k)
        }
        Expr::CallValue(callee, args) => {
            let f = eval_expr(inv, callee)?;
            let argv = eval_args(inv, args)?;
            call_value(&f, Value::Undefined, &argv, inv)
        }
        Expr::CallKeyed(base, key, args) => {
            let b = eval_expr(inv, base)?;
            let k = eval_prop_key(inv, key)?;
            let argv = eval_args(inv, args)?;
            call_keyed(inv, &b, k, &argv)
        }
        Expr::CallNamed(name, args) => {
            let argv = eval_args(inv, args)?;
            let key = PropKey::from_str_id(*name);
            let eval_id = inv.intern("eval");
            if ops::is_eval_key(key, eval_id) {
                eval_direct(inv, &argv)
            } else {
                call_named(inv, key, &argv)
            }
        }
        Expr::New(callee, args) => {
            let f = eval_expr(inv, callee)?;
            let argv = eval_args(inv, args)?;
            call_new(inv, &f, &argv)
        }
        Expr::PreIncDec(inc, target) => eval_inc_dec(inv, *inc, target, true),
        Expr::PostIncDec(inc, target) => eval_inc_dec(inv, *inc, target, false),
    }
}

fn eval_args<I: Interp + ?Sized>(inv: &mut I, args: &[Expr]) -> EsResult<Vec<Value>> {
    args.iter().map(|a| eval_expr(inv, a)).collect()
}

fn eval_prop_key<I: Interp + ?Sized>(inv: &mut I, key: &PropKeyExpr) -> EsResult<PropKey> {
    match key {
        PropKeyExpr::Ident(id) => Ok(PropKey::from_str_id(*id)),
        PropKeyExpr::Computed(e) => {
            let v = eval_expr(inv, e)?;
            to_property_key(&v, inv)
        }
    }
}

fn boxing_snapshot<I: Interp + ?Sized>(inv: &I) -> ops::BoxingPrototypes {
    let p = inv.protos();
    ops::BoxingPrototypes {
        object: p.object.clone(),
        boolean: p.boolean.clone(),
        number: p.number.clone(),
        string: p.string.clone(),
    }
}

fn eval_array_lit<I: Interp + ?Sized>(inv: &mut I, elems: &[Option<Expr>]) -> EsResult<Value> {
    let array_proto = inv.array_proto();
    let root = inv.root();
    let length_key = PropKey::from_str_id(inv.intern("length"));
    let array = ObjectRef::new(Obj::new(
        ClassTag::Array,
        Some(array_proto),
        root,
        ObjectKind::Array(crate::object::ArrayData::new(length_key)),
    ));
    array.define_own_property(length_key, PropertyDescriptor::from_data(Value::from_u32(0), true, false, false), false, inv)?;

    for (i, elem) in elems.iter().enumerate() {
        if let Some(e) = elem {
            let v = eval_expr(inv, e)?;
            array.define_own_property(PropKey::from_u32(i as u32), PropertyDescriptor::from_data(v, true, true, true), false, inv)?;
        }
        // elision (`None`): a hole, counted by `length` but never installed
        // as an own property (ES5 §11.1.4 step for "Elision").
    }
    let actual_len = elems.len() as u32;
    let current_len = array.array_length();
    if actual_len > current_len {
        array.define_own_property(length_key, PropertyDescriptor::from_data(Value::from_u32(actual_len), true, false, false), false, inv)?;
    }
    Ok(Value::Object(array))
}

fn eval_object_lit<I: Interp + ?Sized>(inv: &mut I, props: &[(PropKeyExpr, Expr)]) -> EsResult<Value> {
    let object_proto = inv.protos().object.clone();
    let root = inv.root();
    let obj = ObjectRef::new(Obj::new(ClassTag::Object, Some(object_proto), root, ObjectKind::Plain));
    for (key_expr, value_expr) in props {
        let key = eval_prop_key(inv, key_expr)?;
        let v = eval_expr(inv, value_expr)?;
        obj.define_own_property(key, PropertyDescriptor::from_data(v, true, true, true), false, inv)?;
    }
    Ok(Value::Object(obj))
}

fn eval_function_lit<I: Interp + ?Sized>(inv: &mut I, body: &Rc<FunctionBody>) -> EsResult<Value> {
    let base_scope = inv.ctx().current().lex_env.clone();
    let closure_scope = match body.name {
        Some(name_id) => {
            let named_env = LexEnv::new_decl_env(Some(base_scope));
            if let EnvRecord::Declarative(r) = named_env.record() {
                r.borrow_mut().create_immutable_binding(PropKey::from_str_id(name_id));
            }
            named_env
        }
        None => base_scope,
    };

    let func_obj = make_closure(inv, body.clone(), closure_scope.clone())?;

    if let Some(name_id) = body.name {
        if let EnvRecord::Declarative(r) = closure_scope.record() {
            r.borrow_mut()
                .initialize_immutable_binding(PropKey::from_str_id(name_id), Value::Object(func_obj.clone()));
        }
    }
    Ok(Value::Object(func_obj))
}

fn eval_unary<I: Interp + ?Sized>(inv: &mut I, op: UnOp, e: &Expr) -> EsResult<Value> {
    match op {
        UnOp::Typeof => {
            // `typeof` on an unresolved identifier yields `"undefined"`
            // rather than raising `ReferenceError` (ES5 §11.4.3); other
            // operand shapes evaluate normally.
            if let Expr::Ident(name) = e {
                let key = PropKey::from_str_id(*name);
                let env = inv.ctx().current().lex_env.clone();
                if env.resolve(key).is_none() {
                    return Ok(Value::String(inv.intern("undefined")));
                }
            }
            let v = eval_expr(inv, e)?;
            Ok(Value::String(inv.intern(op_typeof(&v))))
        }
        UnOp::Delete => eval_delete(inv, e),
        UnOp::Void => {
            eval_expr(inv, e)?;
            Ok(Value::Undefined)
        }
        UnOp::Not => {
            let v = eval_expr(inv, e)?;
            Ok(Value::Boolean(!to_boolean(&v, inv)))
        }
        UnOp::Plus => {
            let v = eval_expr(inv, e)?;
            Ok(Value::Number(to_number(&v, inv)?))
        }
        UnOp::Minus => {
            let v = eval_expr(inv, e)?;
            Ok(Value::Number(-to_number(&v, inv)?))
        }
        UnOp::BitNot => {
            let v = eval_expr(inv, e)?;
            let i = ops::to_int32(&v, inv)?;
            Ok(Value::from_i32(!i))
        }
    }
}

fn eval_delete<I: Interp + ?Sized>(inv: &mut I, e: &Expr) -> EsResult<Value> {
    match e {
        Expr::Member(base, key) => {
            let b = eval_expr(inv, base)?;
            let k = eval_prop_key(inv, key)?;
            let strict = inv.ctx().current().strict;
            let ok = prop_delete(inv, &b, k, strict)?;
            Ok(Value::Boolean(ok))
        }
        Expr::Ident(name) => {
            let ok = ctx_delete(inv, PropKey::from_str_id(*name))?;
            Ok(Value::Boolean(ok))
        }
        other => {
            // Deleting anything else (a literal, a call result, ...) has no
            // target to remove; ES5 §11.4.1 step 2 just evaluates it for
            // side effects and returns `true`.
            eval_expr(inv, other)?;
            Ok(Value::Boolean(true))
        }
    }
}

fn eval_binary<I: Interp + ?Sized>(inv: &mut I, op: BinOp, a: &Expr, b: &Expr) -> EsResult<Value> {
    // Short-circuiting operators evaluate `b` conditionally; every other
    // operator evaluates both operands left-to-right first.
    match op {
        BinOp::LogicalAnd => {
            let av = eval_expr(inv, a)?;
            if !to_boolean(&av, inv) {
                return Ok(av);
            }
            return eval_expr(inv, b);
        }
        BinOp::LogicalOr => {
            let av = eval_expr(inv, a)?;
            if to_boolean(&av, inv) {
                return Ok(av);
            }
            return eval_expr(inv, b);
        }
        _ => {}
    }

    let av = eval_expr(inv, a)?;
    let bv = eval_expr(inv, b)?;
    match op {
        BinOp::Add => op_add(&av, &bv, inv),
        BinOp::Sub => op_sub(&av, &bv, inv),
        BinOp::Mul => op_mul(&av, &bv, inv),
        BinOp::Div => op_div(&av, &bv, inv),
        BinOp::Mod => op_mod(&av, &bv, inv),
        BinOp::Shl => op_shl(&av, &bv, inv),
        BinOp::Sar => op_sar(&av, &bv, inv),
        BinOp::Shr => op_shr(&av, &bv, inv),
        BinOp::BitAnd => op_bit_and(&av, &bv, inv),
        BinOp::BitOr => op_bit_or(&av, &bv, inv),
        BinOp::BitXor => op_bit_xor(&av, &bv, inv),
        BinOp::Lt => Ok(Value::Boolean(abstract_relational_comparison(&av, &bv, true, inv)?.unwrap_or(false))),
        BinOp::Gt => Ok(Value::Boolean(abstract_relational_comparison(&bv, &av, false, inv)?.unwrap_or(false))),
        BinOp::Lte => Ok(Value::Boolean(!abstract_relational_comparison(&bv, &av, false, inv)?.unwrap_or(true))),
        BinOp::Gte => Ok(Value::Boolean(!abstract_relational_comparison(&av, &bv, true, inv)?.unwrap_or(true))),
        BinOp::Eq => Ok(Value::Boolean(abstract_equals(&av, &bv, inv)?)),
        BinOp::Neq => Ok(Value::Boolean(!abstract_equals(&av, &bv, inv)?)),
        BinOp::StrictEq => Ok(Value::Boolean(strict_equals(&av, &bv))),
        BinOp::StrictNeq => Ok(Value::Boolean(!strict_equals(&av, &bv))),
        BinOp::In => Ok(Value::Boolean(op_in(&av, &bv, inv)?)),
        BinOp::InstanceOf => Ok(Value::Boolean(op_instance_of(&av, &bv, inv)?)),
        BinOp::LogicalAnd | BinOp::LogicalOr => unreachable!("handled above"),
    }
}

fn assign_to<I: Interp + ?Sized>(inv: &mut I, target: &Expr, value: Value) -> EsResult<()> {
    match target {
        Expr::Ident(name) => ctx_put(inv, PropKey::from_str_id(*name), value),
        Expr::Member(base, key) => {
            let b = eval_expr(inv, base)?;
            let k = eval_prop_key(inv, key)?;
            let strict = inv.ctx().current().strict;
            prop_put(inv, &b, k, value, strict)
        }
        _ => Err(inv.throw(ErrorKind::ReferenceError, "invalid assignment target")),
    }
}

fn read_target<I: Interp + ?Sized>(inv: &mut I, target: &Expr) -> EsResult<Value> {
    match target {
        Expr::Ident(name) => ctx_get(inv, PropKey::from_str_id(*name)),
        Expr::Member(base, key) => {
            let b = eval_expr(inv, base)?;
            let k = eval_prop_key(inv, key)?;
            prop_get(inv, &b, k)
        }
        _ => Err(inv.throw(ErrorKind::ReferenceError, "invalid assignment target")),
    }
}

fn eval_compound_assign<I: Interp + ?Sized>(inv: &mut I, op: BinOp, target: &Expr, value: &Expr) -> EsResult<Value> {
    // `Member` targets must only evaluate their base/key expressions once
    // (ES5 §11.13.2); re-reading through `target` a second time for the
    // write would double-evaluate a computed key with side effects.
    match target {
        Expr::Member(base, key) => {
            let b = eval_expr(inv, base)?;
            let k = eval_prop_key(inv, key)?;
            let current = prop_get(inv, &b, k)?;
            let rhs = eval_expr(inv, value)?;
            let result = apply_binop_value(inv, op, &current, &rhs)?;
            let strict = inv.ctx().current().strict;
            prop_put(inv, &b, k, result.clone(), strict)?;
            Ok(result)
        }
        Expr::Ident(_) => {
            let current = read_target(inv, target)?;
            let rhs = eval_expr(inv, value)?;
            let result = apply_binop_value(inv, op, &current, &rhs)?;
            assign_to(inv, target, result.clone())?;
            Ok(result)
        }
        _ => Err(inv.throw(ErrorKind::ReferenceError, "invalid assignment target")),
    }
}

fn apply_binop_value<I: Interp + ?Sized>(inv: &mut I, op: BinOp, a: &Value, b: &Value) -> EsResult<Value> {
    match op {
        BinOp::Add => op_add(a, b, inv),
        BinOp::Sub => op_sub(a, b, inv),
        BinOp::Mul => op_mul(a, b, inv),
        BinOp::Div => op_div(a, b, inv),
        BinOp::Mod => op_mod(a, b, inv),
        BinOp::Shl => op_shl(a, b, inv),
        BinOp::Sar => op_sar(a, b, inv),
        BinOp::Shr => op_shr(a, b, inv),
        BinOp::BitAnd => op_bit_and(a, b, inv),
        BinOp::BitOr => op_bit_or(a, b, inv),
        BinOp::BitXor => op_bit_xor(a, b, inv),
        _ => unreachable!("compound assignment only carries arithmetic/bitwise operators"),
    }
}

fn eval_inc_dec<I: Interp + ?Sized>(inv: &mut I, increment: bool, target: &Expr, prefix: bool) -> EsResult<Value> {
    let old = to_number(&read_target(inv, target)?, inv)?;
    let new = if increment { old + 1.0 } else { old - 1.0 };
    assign_to(inv, target, Value::Number(new))?;
    Ok(Value::Number(if prefix { new } else { old }))
}

// ---------------------------------------------------------------------
// Declaration binding instantiation (ES5 §10.5)
// ---------------------------------------------------------------------

fn collect_decls(stmts: &[Stmt], vars: &mut Vec<StrId>, funcs: &mut Vec<Rc<FunctionBody>>) {
    for stmt in stmts {
        collect_decls_one(stmt, vars, funcs);
    }
}

fn collect_decls_one(stmt: &Stmt, vars: &mut Vec<StrId>, funcs: &mut Vec<Rc<FunctionBody>>) {
    match stmt {
        Stmt::VarDecl(decls) => vars.extend(decls.iter().map(|(n, _)| *n)),
        Stmt::Block(s) => collect_decls(s, vars, funcs),
        Stmt::If(_, t, e) => {
            collect_decls_one(t, vars, funcs);
            if let Some(e) = e {
                collect_decls_one(e, vars, funcs);
            }
        }
        Stmt::While(_, b) | Stmt::DoWhile(b, _) => collect_decls_one(b, vars, funcs),
        Stmt::For(init, _, _, b) => {
            if let ForInit::VarDecl(decls) = init {
                vars.extend(decls.iter().map(|(n, _)| *n));
            }
            collect_decls_one(b, vars, funcs);
        }
        Stmt::ForIn(name, _, b) => {
            vars.push(*name);
            collect_decls_one(b, vars, funcs);
        }
        Stmt::Try { block, catch, finally } => {
            collect_decls(block, vars, funcs);
            if let Some((_, cb)) = catch {
                collect_decls(cb, vars, funcs);
            }
            if let Some(fb) = finally {
                collect_decls(fb, vars, funcs);
            }
        }
        Stmt::With(_, b) => collect_decls_one(b, vars, funcs),
        Stmt::Switch(_, cases) => {
            for c in cases {
                collect_decls(&c.body, vars, funcs);
            }
        }
        Stmt::Labeled(_, inner) => collect_decls_one(inner, vars, funcs),
        Stmt::FunctionDecl(f) => funcs.push(f.clone()),
        _ => {}
    }
}

fn declare_var<I: Interp + ?Sized>(inv: &mut I, env: &LexEnv, key: PropKey, configurable: bool) -> EsResult<()> {
    match env.record() {
        EnvRecord::Declarative(r) => {
            if !r.borrow().has_binding(key) {
                r.borrow_mut().create_mutable_binding(key, configurable);
            }
            Ok(())
        }
        EnvRecord::Object(r) => {
            if !r.has_binding(key) {
                r.create_mutable_binding(key, configurable, inv)?;
            }
            Ok(())
        }
    }
}

fn declare_and_set<I: Interp + ?Sized>(inv: &mut I, env: &LexEnv, key: PropKey, value: Value, configurable: bool) -> EsResult<()> {
    match env.record() {
        EnvRecord::Declarative(r) => {
            r.borrow_mut().create_mutable_binding(key, configurable);
            if let Some(slot) = r.borrow().slot_of(key) {
                *slot.borrow_mut() = value;
            }
            Ok(())
        }
        EnvRecord::Object(r) => {
            r.create_mutable_binding(key, configurable, inv)?;
            r.set_mutable_binding(key, value, false, inv)
        }
    }
}

/// Hoists `var`/function declarations from `stmts` into `var_env` before the
/// body runs (ES5 §10.5): function declarations install their closures
/// first (later ones winning over earlier same-named ones), then `var`
/// names get an `undefined` binding if nothing already claimed the name.
pub fn instantiate_declarations<I: Interp + ?Sized>(inv: &mut I, var_env: &LexEnv, stmts: &[Stmt], configurable: bool) -> EsResult<()> {
    let mut vars = Vec::new();
    let mut funcs = Vec::new();
    collect_decls(stmts, &mut vars, &mut funcs);

    for f in &funcs {
        let name = f.name.expect("a hoisted function declaration must be named");
        let key = PropKey::from_str_id(name);
        let func_obj = make_closure(inv, f.clone(), var_env.clone())?;
        declare_and_set(inv, var_env, key, Value::Object(func_obj), configurable)?;
    }
    for name in vars {
        declare_var(inv, var_env, PropKey::from_str_id(name), configurable)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Function object construction (ES5 §13.2)
// ---------------------------------------------------------------------

pub fn make_closure<I: Interp + ?Sized>(inv: &mut I, body: Rc<FunctionBody>, scope: LexEnv) -> EsResult<ObjectRef> {
    let arity = body.params.len() as u32;
    let strict = body.strict;
    let func_proto = inv.function_proto();
    let root = inv.root();

    let func_obj = ObjectRef::new(Obj::new(
        ClassTag::Function,
        Some(func_proto),
        root.clone(),
        ObjectKind::Function(FunctionData {
            kind: FunctionKind::Interpreted {
                body: body.clone(),
                scope,
                param_names: body.params.clone(),
                uses_arguments: body.uses_arguments,
            },
            strict,
            arity,
        }),
    ));

    let object_proto = inv.protos().object.clone();
    let proto_obj = ObjectRef::new(Obj::new(ClassTag::Object, Some(object_proto), root, ObjectKind::Plain));
    let ctor_key = PropKey::from_str_id(inv.intern("constructor"));
    proto_obj.define_own_property(ctor_key, PropertyDescriptor::from_data(Value::Object(func_obj.clone()), true, false, true), false, inv)?;
    let proto_key = PropKey::from_str_id(inv.intern("prototype"));
    func_obj.define_own_property(proto_key, PropertyDescriptor::from_data(Value::Object(proto_obj), true, false, false), false, inv)?;

    let length_key = PropKey::from_str_id(inv.intern("length"));
    func_obj.define_own_property(length_key, PropertyDescriptor::from_data(Value::from_u32(arity), false, false, true), false, inv)?;

    if let Some(name_id) = body.name {
        let name_key = PropKey::from_str_id(inv.intern("name"));
        func_obj.define_own_property(name_key, PropertyDescriptor::from_data(Value::String(name_id), false, false, true), false, inv)?;
    }

    if strict {
        install_poison_pair(inv, &func_obj, "caller")?;
        install_poison_pair(inv, &func_obj, "arguments")?;
    }

    Ok(func_obj)
}

pub(crate) fn install_poison_pair<I: Interp + ?Sized>(inv: &mut I, obj: &ObjectRef, name: &str) -> EsResult<()> {
    let thrower = inv.throw_type_error_fn();
    let desc = PropertyDescriptor {
        value: None,
        writable: None,
        get: Some(Value::Object(thrower.clone())),
        set: Some(Value::Object(thrower)),
        enumerable: Some(false),
        configurable: Some(false),
    };
    let key = PropKey::from_str_id(inv.intern(name));
    obj.define_own_property(key, desc, false, inv)?;
    Ok(())
}

// ---------------------------------------------------------------------
// Call setup for interpreted functions (ES5 §13.2.1, §10.6)
// ---------------------------------------------------------------------

/// The `[[Call]]` entry point `Engine`'s `Invoker::call` delegates to for
/// `FunctionKind::Interpreted` callees (the `CallPlan::Interpreted` arm in
/// `object.rs`). Builds the activation's declarative environment, binds
/// parameters (linked to their stack slots for non-strict `arguments`
/// aliasing), materializes `arguments` when the literal referenced it, runs
/// declaration binding instantiation, and walks the body.
pub fn call_interpreted<I: Interp + ?Sized>(inv: &mut I, callee: &ObjectRef, this: Value, args: &[Value]) -> EsResult<Value> {
    let (ast_body, closure_scope, param_names, wants_arguments, strict) = {
        let obj = callee.borrow();
        let f = obj.as_function().expect("call_interpreted: callee is not a function");
        match &f.kind {
            FunctionKind::Interpreted { body, scope, param_names, uses_arguments } => {
                (body.clone(), scope.clone(), param_names.clone(), *uses_arguments, f.strict)
            }
            _ => panic!("call_interpreted: callee is not an interpreted function"),
        }
    };
    let arity = param_names.len();

    let protos = boxing_snapshot(inv);
    let root = inv.root();
    let global_object = inv.global_object().clone();

    // The frame only needs to live long enough to hand out `Slot`s for each
    // argument; those are `Rc`-backed, so once cloned out they stay alive
    // independent of the `CallStack`'s own backing storage, and the frame
    // can be torn down (freeing that stack region) before the body runs.
    let (this_value, arg_slots, argc) = {
        let box_primitive = move |primitive: Value| -> Value {
            let (class, proto, kind) = match &primitive {
                Value::Boolean(b) => (ClassTag::Boolean, protos.boolean.clone(), ObjectKind::Boolean(*b)),
                Value::Number(n) => (ClassTag::Number, protos.number.clone(), ObjectKind::Number(*n)),
                Value::String(s) => (ClassTag::String, protos.string.clone(), ObjectKind::StringObj(*s)),
                _ => unreachable!("push_function only boxes primitives"),
            };
            Value::Object(ObjectRef::new(Obj::new(class, Some(proto), root.clone(), kind)))
        };
        let frame = Frame::push_function(
            inv.call_stack_mut(),
            callee.clone(),
            this,
            args,
            arity,
            strict,
            closure_scope.clone(),
            &global_object,
            box_primitive,
        );
        let this_value = frame.this_arg();
        let argc = frame.argc();
        let slots: Vec<Slot> = (0..arity.max(argc)).map(|i| frame.arg_slot(i).expect("within arity.max(argc)")).collect();
        (this_value, slots, argc)
    };

    let func_env = LexEnv::new_decl_env(Some(closure_scope));
    if let EnvRecord::Declarative(r) = func_env.record() {
        let mut rec = r.borrow_mut();
        for (i, name) in param_names.iter().enumerate() {
            let slot = arg_slots.get(i).cloned().unwrap_or_else(|| new_slot(Value::Undefined));
            rec.link_mutable_binding(PropKey::from_str_id(*name), false, slot, false);
        }
    }

    if wants_arguments {
        let args_obj = make_arguments_object(inv, &arg_slots, argc, &param_names, callee, strict)?;
        if let EnvRecord::Declarative(r) = func_env.record() {
            let mut rec = r.borrow_mut();
            let arguments_key = PropKey::from_str_id(inv.intern("arguments"));
            rec.create_mutable_binding(arguments_key, false);
            if let Some(slot) = rec.slot_of(arguments_key) {
                *slot.borrow_mut() = Value::Object(args_obj);
            }
        }
    }

    inv.ctx_mut().push_fun(strict, func_env.clone(), this_value);
    instantiate_declarations(inv, &func_env, &ast_body.body, false)?;
    let result = eval_statements(inv, &ast_body.body);
    inv.ctx_mut().pop();

    match result? {
        Completion::Return(v) => Ok(v),
        Completion::Normal(_) => Ok(Value::Undefined),
        Completion::Break(_) | Completion::Continue(_) => Err(inv.throw(ErrorKind::SyntaxError, "illegal break/continue")),
    }
}

/// ES5 §10.6: the `arguments` object. Indices `0..param_names.len()` alias
/// their formal parameter's live slot in non-strict mode (spec §4.G); in
/// strict mode there is no parameter map, and `callee`/`caller` are poisoned
/// accessors rather than data properties.
pub(crate) fn make_arguments_object<I: Interp + ?Sized>(
    inv: &mut I,
    arg_slots: &[Slot],
    argc: usize,
    param_names: &[StrId],
    callee: &ObjectRef,
    strict: bool,
) -> EsResult<ObjectRef> {
    let object_proto = inv.protos().object.clone();
    let root = inv.root();

    let mut mapped = HashMap::new();
    if !strict {
        for i in 0..param_names.len().min(arg_slots.len()) {
            mapped.insert(i as u32, arg_slots[i].clone());
        }
    }
    let args_obj = ObjectRef::new(Obj::new(
        ClassTag::Arguments,
        Some(object_proto),
        root,
        ObjectKind::Arguments(ArgumentsData { mapped }),
    ));

    for i in 0..argc {
        let value = arg_slots.get(i).map(|s| s.borrow().clone()).unwrap_or(Value::Undefined);
        args_obj.define_own_property(PropKey::from_u32(i as u32), PropertyDescriptor::from_data(value, true, true, true), false, inv)?;
    }

    let length_key = PropKey::from_str_id(inv.intern("length"));
    args_obj.define_own_property(length_key, PropertyDescriptor::from_data(Value::from_u32(argc as u32), true, false, true), false, inv)?;

    if strict {
        install_poison_pair(inv, &args_obj, "callee")?;
        install_poison_pair(inv, &args_obj, "caller")?;
    } else {
        let callee_key = PropKey::from_str_id(inv.intern("callee"));
        args_obj.define_own_property(callee_key, PropertyDescriptor::from_data(Value::Object(callee.clone()), true, false, true), false, inv)?;
    }

    Ok(args_obj)
}

// ---------------------------------------------------------------------
// eval(string) (ES5 §15.1.2.1, §10.4.2)
// ---------------------------------------------------------------------

/// Direct eval: reuses the calling context's lexical environment verbatim
/// (so declarations made by the evaluated source are visible to the
/// caller), and inherits its strictness.
fn eval_direct<I: Interp + ?Sized>(inv: &mut I, args: &[Value]) -> EsResult<Value> {
    let Some(Value::String(src_id)) = args.first().cloned() else {
        return Ok(args.first().cloned().unwrap_or(Value::Undefined));
    };
    let source = inv.lookup_str(src_id);
    let program = inv.parse_program(&source)?;

    let caller = inv.ctx().current();
    let strict = caller.strict;
    let this_binding = caller.this_binding.clone();
    let lex_env = caller.lex_env.clone();
    let var_env = caller.var_env.clone();

    // Strict eval code gets its own variable environment so declarations
    // don't leak into the calling scope (ES5 §10.4.2 step 3); non-strict
    // eval shares the caller's variable environment directly.
    let (eval_lex, eval_var) = if strict {
        let env = LexEnv::new_decl_env(Some(lex_env));
        (env.clone(), env)
    } else {
        (lex_env, var_env)
    };

    inv.ctx_mut().push_eval(strict, eval_lex, eval_var, this_binding);
    let result = eval_program(inv, &program, true);
    inv.ctx_mut().pop();
    result
}

/// Indirect eval: always runs against the global environment with the
/// global object as `this`, non-strict (unless the source itself opts into
/// strict mode, which the black-box parser is responsible for reflecting
/// in the program it returns — this crate doesn't re-derive strictness
/// from source text).
pub fn eval_indirect<I: Interp + ?Sized>(inv: &mut I, args: &[Value]) -> EsResult<Value> {
    let Some(Value::String(src_id)) = args.first().cloned() else {
        return Ok(args.first().cloned().unwrap_or(Value::Undefined));
    };
    let source = inv.lookup_str(src_id);
    let program = inv.parse_program(&source)?;

    let global_env = inv.global_env();
    let this_binding = Value::Object(inv.global_object().clone());
    inv.ctx_mut().push_eval(false, global_env.clone(), global_env, this_binding);
    let result = eval_program(inv, &program, true);
    inv.ctx_mut().pop();
    result
}

/// Runs a program body (global code, or the body of an `eval`) to
/// completion against the current context's variable environment.
/// `configurable_bindings` is `true` for `eval` code (ES5 §10.5: bindings
/// created by `eval` are deletable) and `false` for global code.
pub fn eval_program<I: Interp + ?Sized>(inv: &mut I, body: &[Stmt], configurable_bindings: bool) -> EsResult<Value> {
    let var_env = inv.ctx().current().var_env.clone();
    instantiate_declarations(inv, &var_env, body, configurable_bindings)?;
    match eval_statements(inv, body)? {
        Completion::Normal(v) => Ok(v.unwrap_or(Value::Undefined)),
        Completion::Return(v) => Ok(v),
        Completion::Break(_) | Completion::Continue(_) => Err(inv.throw(ErrorKind::SyntaxError, "illegal break/continue")),
    }
}

/// `new Function(...)` (ES5 §15.3.2.1): the last argument is the body
/// source, the rest are comma-joined parameter-name lists; both are handed
/// to the external parser via the same `parse_program`-style contract, then
/// wrapped as an ordinary closure over the global environment.
pub fn make_function_from_source<I: Interp + ?Sized>(inv: &mut I, args: &[Value]) -> EsResult<ObjectRef> {
    let (param_src, body_src) = match args.split_last() {
        None => (String::new(), String::new()),
        Some((last, init)) => {
            let body = ops::to_string(last, inv)?;
            let mut params = String::new();
            for (i, a) in init.iter().enumerate() {
                if i > 0 {
                    params.push(',');
                }
                params.push_str(&ops::to_string(a, inv)?);
            }
            (params, body)
        }
    };
    let source = format!("function anonymous({param_src}\n) {{\n{body_src}\n}}");
    let program = inv.parse_program(&source)?;
    // The parser is expected to hand back a single `FunctionDecl` wrapping
    // the synthesized `anonymous` function for this source shape.
    let Some(Stmt::FunctionDecl(body)) = program.first() else {
        return Err(inv.throw(ErrorKind::SyntaxError, "invalid function body"));
    };
    make_closure(inv, body.clone(), inv.global_env())
}
