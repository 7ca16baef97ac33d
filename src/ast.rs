//! Abstract syntax tree (evaluator input contract)
//!
//! The parser and full AST are out of scope for this crate (spec §1: "the
//! parser and AST ... consumed as a black box"). This module defines the
//! minimal node shapes the tree-walking evaluator (`eval.rs`) actually
//! walks: enough to run `eval(string)` and `new Function(...)` bodies after
//! an external parser has produced them. Generated native code never builds
//! or consumes this tree.

use std::rc::Rc;

use crate::strpool::StrId;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Sar,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    Lt,
    Gt,
    Lte,
    Gte,
    Eq,
    Neq,
    StrictEq,
    StrictNeq,
    In,
    InstanceOf,
    LogicalAnd,
    LogicalOr,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnOp {
    Typeof,
    Not,
    BitNot,
    Plus,
    Minus,
    Void,
    Delete,
}

#[derive(Clone, Debug)]
pub enum PropKeyExpr {
    Ident(StrId),
    Computed(Box<Expr>),
}

#[derive(Clone)]
pub enum Expr {
    NumberLit(f64),
    StringLit(StrId),
    BoolLit(bool),
    NullLit,
    UndefinedLit,
    Ident(StrId),
    This,
    ArrayLit(Vec<Option<Expr>>),
    ObjectLit(Vec<(PropKeyExpr, Expr)>),
    FunctionLit(Rc<FunctionBody>),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Assign(Box<Expr>, Box<Expr>),
    CompoundAssign(BinOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Comma(Box<Expr>, Box<Expr>),
    Member(Box<Expr>, PropKeyExpr),
    /// `f(args...)` where the callee is evaluated as a plain value (no
    /// implicit-this or name-based dispatch).
    CallValue(Box<Expr>, Vec<Expr>),
    /// `obj[key](args...)` / `obj.key(args...)`: this-value is `obj`.
    CallKeyed(Box<Expr>, PropKeyExpr, Vec<Expr>),
    /// Bare identifier call `name(args...)`: this-value from the resolved
    /// environment's implicit this.
    CallNamed(StrId, Vec<Expr>),
    New(Box<Expr>, Vec<Expr>),
    PreIncDec(bool, Box<Expr>),
    PostIncDec(bool, Box<Expr>),
}

#[derive(Clone)]
pub enum ForInit {
    None,
    Expr(Expr),
    VarDecl(Vec<(StrId, Option<Expr>)>),
}

#[derive(Clone)]
pub enum Stmt {
    Expr(Expr),
    VarDecl(Vec<(StrId, Option<Expr>)>),
    Block(Vec<Stmt>),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    While(Expr, Box<Stmt>),
    DoWhile(Box<Stmt>, Expr),
    For(ForInit, Option<Expr>, Option<Expr>, Box<Stmt>),
    ForIn(StrId, Expr, Box<Stmt>),
    Return(Option<Expr>),
    Break(Option<StrId>),
    Continue(Option<StrId>),
    Throw(Expr),
    Try {
        block: Vec<Stmt>,
        catch: Option<(StrId, Vec<Stmt>)>,
        finally: Option<Vec<Stmt>>,
    },
    With(Expr, Box<Stmt>),
    Switch(Expr, Vec<SwitchCase>),
    Labeled(StrId, Box<Stmt>),
    FunctionDecl(Rc<FunctionBody>),
    Empty,
}

#[derive(Clone)]
pub struct SwitchCase {
    /// `None` is the `default:` clause.
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

/// A function literal's parsed body, shared (`Rc`) between every closure
/// created from the same literal.
pub struct FunctionBody {
    pub name: Option<StrId>,
    pub params: Vec<StrId>,
    pub strict: bool,
    /// True when the parser detected a free reference to `arguments`
    /// (spec §9 open question: materialize only when referenced).
    pub uses_arguments: bool,
    pub body: Vec<Stmt>,
}
