use std::rc::Rc;

use lazy_static::lazy_static;
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;

use crate::ast::{
    BinaryOp, Block, Expr, FunctionDef, Literal, MemberDef, Param, Program, Stmt, StructDef,
    UnaryOp,
};
use crate::errors::{Error, Result};

#[derive(Parser)]
#[grammar = "parser/pscript.pest"]
pub struct ScriptParser;

lazy_static! {
    // Precedence is defined lowest to highest; everything in the
    // operator grammar is left-associative.
    static ref PRATT: PrattParser<Rule> = PrattParser::new()
        .op(Op::infix(Rule::assign, Assoc::Left)
            | Op::infix(Rule::add_assign, Assoc::Left)
            | Op::infix(Rule::sub_assign, Assoc::Left)
            | Op::infix(Rule::mul_assign, Assoc::Left)
            | Op::infix(Rule::div_assign, Assoc::Left))
        .op(Op::infix(Rule::eq, Assoc::Left)
            | Op::infix(Rule::ne, Assoc::Left)
            | Op::infix(Rule::le, Assoc::Left)
            | Op::infix(Rule::ge, Assoc::Left)
            | Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::gt, Assoc::Left))
        .op(Op::infix(Rule::sub, Assoc::Left) | Op::infix(Rule::add, Assoc::Left))
        .op(Op::infix(Rule::div, Assoc::Left) | Op::infix(Rule::mul, Assoc::Left));
}

/// Parse a whole script into a [`Program`].
pub fn parse(source: &str) -> Result<Program> {
    let mut pairs = ScriptParser::parse(Rule::script, source).map_err(convert_error)?;
    let script = pairs.next().ok_or_else(malformed)?;
    let content = find(&script, Rule::content).ok_or_else(malformed)?;
    Ok(Program {
        body: lower_content(content)?,
    })
}

fn convert_error(err: pest::error::Error<Rule>) -> Error {
    let (line, col) = match err.line_col {
        pest::error::LineColLocation::Pos((line, col)) => (line, col),
        pest::error::LineColLocation::Span((line, col), _) => (line, col),
    };
    Error::Parse {
        message: err.variant.message().into_owned(),
        line,
        col,
    }
}

/// Internal inconsistency between grammar and lowering. Not reachable
/// from any input the grammar accepts.
fn malformed() -> Error {
    Error::Parse {
        message: "malformed parse tree".to_string(),
        line: 0,
        col: 0,
    }
}

fn find<'i>(pair: &Pair<'i, Rule>, rule: Rule) -> Option<Pair<'i, Rule>> {
    pair.clone().into_inner().find(|p| p.as_rule() == rule)
}

fn find_all<'i>(pair: &Pair<'i, Rule>, rule: Rule) -> Vec<Pair<'i, Rule>> {
    pair.clone()
        .into_inner()
        .filter(|p| p.as_rule() == rule)
        .collect()
}

fn lower_content(pair: Pair<Rule>) -> Result<Block> {
    pair.into_inner().map(lower_element).collect()
}

fn lower_compound(pair: Pair<Rule>) -> Result<Block> {
    pair.into_inner().map(lower_element).collect()
}

fn lower_element(pair: Pair<Rule>) -> Result<Stmt> {
    match pair.as_rule() {
        Rule::statement => lower_statement(pair),
        Rule::if_stmt => lower_if(pair),
        Rule::while_stmt => lower_while(pair),
        Rule::for_stmt => lower_for(pair),
        Rule::function_def | Rule::function_ext => lower_function(pair),
        Rule::struct_def => lower_struct(pair),
        Rule::namespace_decl => lower_namespace(pair),
        _ => Err(malformed()),
    }
}

fn lower_statement(pair: Pair<Rule>) -> Result<Stmt> {
    let inner = pair.into_inner().next().ok_or_else(malformed)?;
    match inner.as_rule() {
        Rule::import_stmt => {
            let path = find(&inner, Rule::module_path).ok_or_else(malformed)?;
            let mut parts: Vec<String> = path.as_str().split('.').map(str::to_string).collect();
            let module = parts.pop().ok_or_else(malformed)?;
            Ok(Stmt::Import {
                folders: parts,
                module,
            })
        }
        Rule::return_stmt => {
            let value = match find(&inner, Rule::expression) {
                Some(expr) => Some(lower_expression(expr)?),
                None => None,
            };
            Ok(Stmt::Return(value))
        }
        Rule::declaration => {
            let (name, init) = lower_declaration(inner)?;
            Ok(Stmt::Declaration { name, init })
        }
        Rule::expression => Ok(Stmt::Expr(lower_expression(inner)?)),
        _ => Err(malformed()),
    }
}

fn lower_declaration(pair: Pair<Rule>) -> Result<(String, Expr)> {
    let name = find(&pair, Rule::identifier).ok_or_else(malformed)?;
    let init = find(&pair, Rule::expression).ok_or_else(malformed)?;
    Ok((name.as_str().to_string(), lower_expression(init)?))
}

fn lower_if(pair: Pair<Rule>) -> Result<Stmt> {
    let cond = find(&pair, Rule::expression).ok_or_else(malformed)?;
    let body = find(&pair, Rule::compound).ok_or_else(malformed)?;
    let else_body = match find(&pair, Rule::else_clause) {
        Some(clause) => {
            let block = find(&clause, Rule::compound).ok_or_else(malformed)?;
            Some(lower_compound(block)?)
        }
        None => None,
    };
    Ok(Stmt::If {
        cond: lower_expression(cond)?,
        then_body: lower_compound(body)?,
        else_body,
    })
}

fn lower_while(pair: Pair<Rule>) -> Result<Stmt> {
    let cond = find(&pair, Rule::expression).ok_or_else(malformed)?;
    let body = find(&pair, Rule::compound).ok_or_else(malformed)?;
    Ok(Stmt::While {
        cond: lower_expression(cond)?,
        body: lower_compound(body)?,
    })
}

fn lower_for(pair: Pair<Rule>) -> Result<Stmt> {
    let body = find(&pair, Rule::compound).ok_or_else(malformed)?;
    let body = lower_compound(body)?;

    if let Some(manual) = find(&pair, Rule::for_manual) {
        let decl = find(&manual, Rule::declaration).ok_or_else(malformed)?;
        let (decl_name, decl_init) = lower_declaration(decl)?;
        let exprs = find_all(&manual, Rule::expression);
        let [cond, step] = exprs.as_slice() else {
            return Err(malformed());
        };
        return Ok(Stmt::ForManual {
            decl_name,
            decl_init,
            cond: lower_expression(cond.clone())?,
            step: lower_expression(step.clone())?,
            body,
        });
    }

    let each = find(&pair, Rule::for_each).ok_or_else(malformed)?;
    let binding = find(&each, Rule::identifier).ok_or_else(malformed)?;
    let iterable = find(&each, Rule::expression).ok_or_else(malformed)?;
    Ok(Stmt::ForEach {
        binding: binding.as_str().to_string(),
        iterable: lower_expression(iterable)?,
        body,
    })
}

fn lower_function(pair: Pair<Rule>) -> Result<Stmt> {
    let is_extern = pair.as_rule() == Rule::function_ext;
    let name = find(&pair, Rule::identifier).ok_or_else(malformed)?;
    let return_type = find(&pair, Rule::typename).ok_or_else(malformed)?;

    let mut params = Vec::new();
    if let Some(list) = find(&pair, Rule::parameter_list) {
        for param in find_all(&list, Rule::parameter) {
            let pname = find(&param, Rule::identifier).ok_or_else(malformed)?;
            let ty = find(&param, Rule::typename).ok_or_else(malformed)?;
            params.push(Param {
                name: pname.as_str().to_string(),
                ty: ty.as_str().to_string(),
            });
        }
    }

    let body = if is_extern {
        None
    } else {
        let compound = find(&pair, Rule::compound).ok_or_else(malformed)?;
        Some(lower_compound(compound)?)
    };

    Ok(Stmt::Function(Rc::new(FunctionDef {
        name: name.as_str().to_string(),
        params,
        return_type: return_type.as_str().to_string(),
        body,
    })))
}

fn lower_struct(pair: Pair<Rule>) -> Result<Stmt> {
    let name = find(&pair, Rule::identifier).ok_or_else(malformed)?;
    let mut members = Vec::new();
    for item in find_all(&pair, Rule::struct_item) {
        let mname = find(&item, Rule::identifier).ok_or_else(malformed)?;
        let ty = find(&item, Rule::typename).ok_or_else(malformed)?;
        let default = match find(&item, Rule::struct_initializer) {
            Some(init) => {
                let expr = find(&init, Rule::expression).ok_or_else(malformed)?;
                Some(lower_expression(expr)?)
            }
            None => None,
        };
        members.push(MemberDef {
            name: mname.as_str().to_string(),
            ty: ty.as_str().to_string(),
            default,
        });
    }
    Ok(Stmt::Struct(Rc::new(StructDef {
        name: name.as_str().to_string(),
        members,
    })))
}

fn lower_namespace(pair: Pair<Rule>) -> Result<Stmt> {
    let name = find(&pair, Rule::identifier).ok_or_else(malformed)?;
    let content = find(&pair, Rule::content).ok_or_else(malformed)?;
    Ok(Stmt::Namespace {
        name: name.as_str().to_string(),
        body: lower_content(content)?,
    })
}

fn lower_expression(pair: Pair<Rule>) -> Result<Expr> {
    PRATT
        .map_primary(lower_atom)
        .map_infix(|lhs, op, rhs| {
            Ok(Expr::Binary {
                op: binary_op(op.as_rule())?,
                lhs: Box::new(lhs?),
                rhs: Box::new(rhs?),
            })
        })
        .parse(pair.into_inner())
}

fn binary_op(rule: Rule) -> Result<BinaryOp> {
    Ok(match rule {
        Rule::assign => BinaryOp::Assign,
        Rule::add_assign => BinaryOp::AddAssign,
        Rule::sub_assign => BinaryOp::SubAssign,
        Rule::mul_assign => BinaryOp::MulAssign,
        Rule::div_assign => BinaryOp::DivAssign,
        Rule::eq => BinaryOp::Eq,
        Rule::ne => BinaryOp::Ne,
        Rule::le => BinaryOp::Le,
        Rule::ge => BinaryOp::Ge,
        Rule::lt => BinaryOp::Lt,
        Rule::gt => BinaryOp::Gt,
        Rule::add => BinaryOp::Add,
        Rule::sub => BinaryOp::Sub,
        Rule::mul => BinaryOp::Mul,
        Rule::div => BinaryOp::Div,
        _ => return Err(malformed()),
    })
}

fn lower_atom(pair: Pair<Rule>) -> Result<Expr> {
    let mut unary = None;
    let mut expr = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::unary_op => {
                unary = Some(match inner.as_str() {
                    "-" => UnaryOp::Neg,
                    _ => UnaryOp::Not,
                });
            }
            _ => expr = Some(lower_primary(inner)?),
        }
    }
    let expr = expr.ok_or_else(malformed)?;
    Ok(match unary {
        Some(op) => Expr::Unary {
            op,
            expr: Box::new(expr),
        },
        None => expr,
    })
}

fn lower_primary(pair: Pair<Rule>) -> Result<Expr> {
    match pair.as_rule() {
        // Parenthesised sub-expression.
        Rule::expression => lower_expression(pair),
        Rule::constructor_expression => {
            let name = find(&pair, Rule::identifier).ok_or_else(malformed)?;
            Ok(Expr::Constructor {
                name: name.as_str().to_string(),
                args: lower_arguments(&pair)?,
            })
        }
        Rule::list_expression => Ok(Expr::List(lower_arguments(&pair)?)),
        Rule::call_expression => {
            let namespace = match find(&pair, Rule::namespace_list) {
                Some(list) => list
                    .into_inner()
                    .filter(|p| p.as_rule() == Rule::identifier)
                    .map(|p| p.as_str().to_string())
                    .collect(),
                None => Vec::new(),
            };
            let name = find(&pair, Rule::builtin_function)
                .or_else(|| find(&pair, Rule::identifier))
                .ok_or_else(malformed)?;
            Ok(Expr::Call {
                namespace,
                name: name.as_str().to_string(),
                args: lower_arguments(&pair)?,
            })
        }
        Rule::index_expression => {
            let target = find(&pair, Rule::identifier).ok_or_else(malformed)?;
            let index = find(&pair, Rule::expression).ok_or_else(malformed)?;
            Ok(Expr::Index {
                target: target.as_str().to_string(),
                index: Box::new(lower_expression(index)?),
            })
        }
        Rule::access_expression => {
            let mut names = find_all(&pair, Rule::identifier)
                .into_iter()
                .map(|p| p.as_str().to_string());
            let base = names.next().ok_or_else(malformed)?;
            Ok(Expr::Access {
                base,
                fields: names.collect(),
            })
        }
        Rule::integer => {
            let value = pair.as_str().parse::<i64>().map_err(|_| Error::ParseNumber {
                text: pair.as_str().to_string(),
            })?;
            Ok(Expr::Literal(Literal::Int(value)))
        }
        Rule::float => {
            let value = pair.as_str().parse::<f64>().map_err(|_| Error::ParseNumber {
                text: pair.as_str().to_string(),
            })?;
            Ok(Expr::Literal(Literal::Float(value)))
        }
        Rule::string => {
            let text = pair.as_str();
            Ok(Expr::Literal(Literal::Str(
                text[1..text.len() - 1].to_string(),
            )))
        }
        Rule::boolean => Ok(Expr::Literal(Literal::Bool(pair.as_str() == "true"))),
        Rule::identifier => Ok(Expr::Ident(pair.as_str().to_string())),
        _ => Err(malformed()),
    }
}

fn lower_arguments(pair: &Pair<Rule>) -> Result<Vec<Expr>> {
    match find(pair, Rule::argument_list) {
        Some(list) => list
            .into_inner()
            .filter(|p| p.as_rule() == Rule::expression)
            .map(lower_expression)
            .collect(),
        None => Ok(Vec::new()),
    }
}
