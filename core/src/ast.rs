//! Owned syntax tree produced by the parser.
//!
//! Function and struct definitions are behind `Rc` so the interpreter's
//! tables can share them with the program (and with programs parsed at
//! runtime by `import`) without retaining source text.

use std::rc::Rc;

/// A parsed script: the top-level statement sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Block,
}

pub type Block = Vec<Stmt>;

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `let name = expr;`
    Declaration { name: String, init: Expr },
    /// An expression in statement position, e.g. a call or assignment.
    Expr(Expr),
    /// `return;` or `return expr;`
    Return(Option<Expr>),
    /// `import a.b.module;`
    Import { folders: Vec<String>, module: String },
    If {
        cond: Expr,
        then_body: Block,
        else_body: Option<Block>,
    },
    While { cond: Expr, body: Block },
    /// `for (let i = a; cond; step) body`
    ForManual {
        decl_name: String,
        decl_init: Expr,
        cond: Expr,
        step: Expr,
        body: Block,
    },
    /// `for (let x : iterable) body`
    ForEach {
        binding: String,
        iterable: Expr,
        body: Block,
    },
    Function(Rc<FunctionDef>),
    Struct(Rc<StructDef>),
    /// `namespace name { ... }`
    Namespace { name: String, body: Block },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Ident(String),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary { op: UnaryOp, expr: Box<Expr> },
    /// `a.b.name(args)`; the dotted prefix is resolved at runtime to
    /// either a variable (member-function call) or a namespace.
    Call {
        namespace: Vec<String>,
        name: String,
        args: Vec<Expr>,
    },
    /// `name[index]`
    Index { target: String, index: Box<Expr> },
    /// `a->b->c`
    Access { base: String, fields: Vec<String> },
    /// `[a, b, c]`
    List(Vec<Expr>),
    /// `TypeName{args…}`
    Constructor { name: String, args: Vec<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Assign => "=",
            BinaryOp::AddAssign => "+=",
            BinaryOp::SubAssign => "-=",
            BinaryOp::MulAssign => "*=",
            BinaryOp::DivAssign => "/=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    /// True for `=` and the compound assignment operators, which need
    /// an assignable place on the left.
    pub fn is_assigning(self) -> bool {
        matches!(
            self,
            BinaryOp::Assign
                | BinaryOp::AddAssign
                | BinaryOp::SubAssign
                | BinaryOp::MulAssign
                | BinaryOp::DivAssign
        )
    }

    /// The pure operator a compound assignment applies before storing.
    pub fn compound_base(self) -> Option<BinaryOp> {
        match self {
            BinaryOp::AddAssign => Some(BinaryOp::Add),
            BinaryOp::SubAssign => Some(BinaryOp::Sub),
            BinaryOp::MulAssign => Some(BinaryOp::Mul),
            BinaryOp::DivAssign => Some(BinaryOp::Div),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

/// `fn name(params…) -> T { body }`, or `extern fn …;` with no body.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: String,
    pub body: Option<Block>,
}

/// A parameter's declared type is recorded but never checked.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub name: String,
    pub members: Vec<MemberDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberDef {
    pub name: String,
    pub ty: String,
    pub default: Option<Expr>,
}
