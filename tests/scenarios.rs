//! End-to-end scenarios: each test hand-builds the AST a parser would
//! produce for one JavaScript snippet and runs it through `Engine::run`,
//! matching `src/engine.rs`'s own `global_var_persists_across_run_calls`
//! style of constructing `Stmt`/`Expr` nodes directly (no parser in this
//! crate, per its black-box-AST contract).

use std::rc::Rc;

use esrt::ast::{BinOp, Expr, ForInit, FunctionBody, PropKeyExpr, Stmt, UnOp};
use esrt::object::Invoker;
use esrt::ops::to_string;
use esrt::{Engine, EngineOptions, Value};

fn run(engine: &mut Engine, stmts: Vec<Stmt>, strict: bool) -> Value {
    engine.run(&stmts, strict).expect("program should not throw")
}

fn string_result(engine: &mut Engine, v: &Value) -> String {
    to_string(v, engine).expect("result should coerce to a string")
}

#[test]
fn array_push_and_join_builds_squared_indices() {
    // var a = []; for (var i = 0; i < 3; i++) a.push(i * i); a.join(",")
    let mut engine = Engine::new(EngineOptions::default());
    let a = engine.intern("a");
    let i = engine.intern("i");
    let push = engine.intern("push");
    let join = engine.intern("join");
    let comma = engine.intern(",");

    let stmts = vec![
        Stmt::VarDecl(vec![(a, Some(Expr::ArrayLit(vec![])))]),
        Stmt::For(
            ForInit::VarDecl(vec![(i, Some(Expr::NumberLit(0.0)))]),
            Some(Expr::Binary(BinOp::Lt, Box::new(Expr::Ident(i)), Box::new(Expr::NumberLit(3.0)))),
            Some(Expr::PostIncDec(true, Box::new(Expr::Ident(i)))),
            Box::new(Stmt::Expr(Expr::CallKeyed(
                Box::new(Expr::Ident(a)),
                PropKeyExpr::Ident(push),
                vec![Expr::Binary(BinOp::Mul, Box::new(Expr::Ident(i)), Box::new(Expr::Ident(i)))],
            ))),
        ),
        Stmt::Expr(Expr::CallKeyed(Box::new(Expr::Ident(a)), PropKeyExpr::Ident(join), vec![Expr::StringLit(comma)])),
    ];

    let result = run(&mut engine, stmts, false);
    assert_eq!(string_result(&mut engine, &result), "0,1,4");
}

#[test]
fn non_writable_define_property_resists_assignment() {
    // var o = {x:1};
    // Object.defineProperty(o, "y", {value:2, writable:false, configurable:false, enumerable:true});
    // try { o.y = 9 } catch (e) {}
    // o.y
    let mut engine = Engine::new(EngineOptions::default());
    let o = engine.intern("o");
    let x = engine.intern("x");
    let object_ctor = engine.intern("Object");
    let define_property = engine.intern("defineProperty");
    let y = engine.intern("y");
    let value = engine.intern("value");
    let writable = engine.intern("writable");
    let configurable = engine.intern("configurable");
    let enumerable = engine.intern("enumerable");
    let e = engine.intern("e");

    let stmts = vec![
        Stmt::VarDecl(vec![(o, Some(Expr::ObjectLit(vec![(PropKeyExpr::Ident(x), Expr::NumberLit(1.0))])))]),
        Stmt::Expr(Expr::CallKeyed(
            Box::new(Expr::Ident(object_ctor)),
            PropKeyExpr::Ident(define_property),
            vec![
                Expr::Ident(o),
                Expr::StringLit(y),
                Expr::ObjectLit(vec![
                    (PropKeyExpr::Ident(value), Expr::NumberLit(2.0)),
                    (PropKeyExpr::Ident(writable), Expr::BoolLit(false)),
                    (PropKeyExpr::Ident(configurable), Expr::BoolLit(false)),
                    (PropKeyExpr::Ident(enumerable), Expr::BoolLit(true)),
                ]),
            ],
        )),
        Stmt::Try {
            block: vec![Stmt::Expr(Expr::Assign(
                Box::new(Expr::Member(Box::new(Expr::Ident(o)), PropKeyExpr::Ident(y))),
                Box::new(Expr::NumberLit(9.0)),
            ))],
            catch: Some((e, vec![])),
            finally: None,
        },
        Stmt::Expr(Expr::Member(Box::new(Expr::Ident(o)), PropKeyExpr::Ident(y))),
    ];

    let result = run(&mut engine, stmts, false);
    assert_eq!(result, Value::Number(2.0));
}

#[test]
fn arguments_length_ignores_formal_parameter_count() {
    // function f(a,b){ return arguments.length + "/" + b } f(1,2,3,4)
    let mut engine = Engine::new(EngineOptions::default());
    let f = engine.intern("f");
    let a = engine.intern("a");
    let b = engine.intern("b");
    let arguments = engine.intern("arguments");
    let length = engine.intern("length");
    let slash = engine.intern("/");

    let body = FunctionBody {
        name: Some(f),
        params: vec![a, b],
        strict: false,
        uses_arguments: true,
        body: vec![Stmt::Return(Some(Expr::Binary(
            BinOp::Add,
            Box::new(Expr::Binary(
                BinOp::Add,
                Box::new(Expr::Member(Box::new(Expr::Ident(arguments)), PropKeyExpr::Ident(length))),
                Box::new(Expr::StringLit(slash)),
            )),
            Box::new(Expr::Ident(b)),
        )))],
    };

    let stmts = vec![
        Stmt::FunctionDecl(Rc::new(body)),
        Stmt::Expr(Expr::CallNamed(f, vec![Expr::NumberLit(1.0), Expr::NumberLit(2.0), Expr::NumberLit(3.0), Expr::NumberLit(4.0)])),
    ];

    let result = run(&mut engine, stmts, false);
    assert_eq!(string_result(&mut engine, &result), "4/2");
}

#[test]
fn member_access_on_null_throws_a_caught_type_error() {
    // try { null.foo } catch (e) { e.name + ":" + (e.message.length > 0) }
    let mut engine = Engine::new(EngineOptions::default());
    let foo = engine.intern("foo");
    let e = engine.intern("e");
    let name = engine.intern("name");
    let message = engine.intern("message");
    let length = engine.intern("length");
    let colon = engine.intern(":");

    let stmts = vec![Stmt::Try {
        block: vec![Stmt::Expr(Expr::Member(Box::new(Expr::NullLit), PropKeyExpr::Ident(foo)))],
        catch: Some((
            e,
            vec![Stmt::Expr(Expr::Binary(
                BinOp::Add,
                Box::new(Expr::Binary(
                    BinOp::Add,
                    Box::new(Expr::Member(Box::new(Expr::Ident(e)), PropKeyExpr::Ident(name))),
                    Box::new(Expr::StringLit(colon)),
                )),
                Box::new(Expr::Binary(
                    BinOp::Gt,
                    Box::new(Expr::Member(
                        Box::new(Expr::Member(Box::new(Expr::Ident(e)), PropKeyExpr::Ident(message))),
                        PropKeyExpr::Ident(length),
                    )),
                    Box::new(Expr::NumberLit(0.0)),
                )),
            ))],
        )),
        finally: None,
    }];

    let result = run(&mut engine, stmts, false);
    assert_eq!(string_result(&mut engine, &result), "TypeError:true");
}

#[test]
fn for_in_visits_own_properties_in_insertion_order() {
    // var s = ""; for (var k in {b:1, a:2, c:3}) s += k; s
    let mut engine = Engine::new(EngineOptions::default());
    let s = engine.intern("s");
    let k = engine.intern("k");
    let b = engine.intern("b");
    let a = engine.intern("a");
    let c = engine.intern("c");
    let empty = engine.intern("");

    let stmts = vec![
        Stmt::VarDecl(vec![(s, Some(Expr::StringLit(empty)))]),
        Stmt::ForIn(
            k,
            Expr::ObjectLit(vec![
                (PropKeyExpr::Ident(b), Expr::NumberLit(1.0)),
                (PropKeyExpr::Ident(a), Expr::NumberLit(2.0)),
                (PropKeyExpr::Ident(c), Expr::NumberLit(3.0)),
            ]),
            Box::new(Stmt::Expr(Expr::CompoundAssign(BinOp::Add, Box::new(Expr::Ident(s)), Box::new(Expr::Ident(k))))),
        ),
        Stmt::Expr(Expr::Ident(s)),
    ];

    let result = run(&mut engine, stmts, false);
    assert_eq!(string_result(&mut engine, &result), "bac");
}

#[test]
fn strict_mode_arguments_caller_is_poisoned() {
    // (function(){ "use strict"; try { arguments.caller } catch(e) { return e.name } })()
    let mut engine = Engine::new(EngineOptions::default());
    let arguments = engine.intern("arguments");
    let caller = engine.intern("caller");
    let e = engine.intern("e");
    let name = engine.intern("name");

    let body = FunctionBody {
        name: None,
        params: vec![],
        strict: true,
        uses_arguments: true,
        body: vec![Stmt::Try {
            block: vec![Stmt::Expr(Expr::Member(Box::new(Expr::Ident(arguments)), PropKeyExpr::Ident(caller)))],
            catch: Some((e, vec![Stmt::Return(Some(Expr::Member(Box::new(Expr::Ident(e)), PropKeyExpr::Ident(name))))])),
            finally: None,
        }],
    };

    let stmts = vec![Stmt::Expr(Expr::CallValue(Box::new(Expr::FunctionLit(Rc::new(body))), vec![]))];

    let result = run(&mut engine, stmts, false);
    assert_eq!(string_result(&mut engine, &result), "TypeError");
}

/// Not one of the headline scenarios, but the same `UnOp::Typeof` path an
/// AOT-compiled `typeof` expression goes through; kept here since this
/// file is otherwise the only place exercising `Engine::run` end to end.
#[test]
fn typeof_undeclared_identifier_is_undefined_not_a_throw() {
    let mut engine = Engine::new(EngineOptions::default());
    let missing = engine.intern("neverDeclared");
    let stmts = vec![Stmt::Expr(Expr::Unary(UnOp::Typeof, Box::new(Expr::Ident(missing))))];
    let result = run(&mut engine, stmts, false);
    assert_eq!(string_result(&mut engine, &result), "undefined");
}
