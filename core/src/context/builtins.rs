//! Interpreter intrinsics: `__print`/`__readln`, plus the member
//! functions dispatched on a receiver's tag (`list.append`,
//! `list.size`, `str.format`, `str.parse_int`, `str.parse_float`).

use std::io::{BufRead, Write};

use snafu::ResultExt;

use crate::ast::Expr;
use crate::errors::{Error, IoSnafu, Result};
use crate::memory::Pointer;
use crate::scope::ScopeId;
use crate::value::{self, Value};

use super::Context;

impl Context {
    /// `__print(v)`: textual form plus newline on the output sink.
    /// Returns 0.
    pub(super) fn builtin_print(
        &mut self,
        args: &[Expr],
        scope: ScopeId,
        prefix: &str,
    ) -> Result<Value> {
        if args.len() != 1 {
            return Err(Error::Arity {
                name: "__print".to_string(),
                expected: 1,
                got: args.len(),
            });
        }
        let v = self.eval_expr(&args[0], scope, prefix)?;
        let text = value::display(&self.pool, &v);
        value::release(&mut self.pool, &v);
        let text = text?;
        writeln!(self.out, "{text}").context(IoSnafu {
            target: "output stream".to_string(),
        })?;
        Ok(Value::Int(0))
    }

    /// `__readln()`: one line from the input source, without the
    /// trailing newline.
    pub(super) fn builtin_readln(&mut self, args: &[Expr]) -> Result<Value> {
        if !args.is_empty() {
            return Err(Error::Arity {
                name: "__readln".to_string(),
                expected: 0,
                got: args.len(),
            });
        }
        let mut line = String::new();
        self.input.read_line(&mut line).context(IoSnafu {
            target: "input stream".to_string(),
        })?;
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        value::new_str(&mut self.pool, &line)
    }

    /// Member functions on a list variable.
    pub(super) fn list_member(
        &mut self,
        receiver: &str,
        list: Pointer,
        method: &str,
        args: &[Expr],
        scope: ScopeId,
        prefix: &str,
    ) -> Result<Value> {
        match method {
            "append" => {
                if args.len() != 1 {
                    return Err(Error::Arity {
                        name: "list.append".to_string(),
                        expected: 1,
                        got: args.len(),
                    });
                }
                let element = self.eval_expr(&args[0], scope, prefix)?;
                let moved = value::list_append(&mut self.pool, list, element)?;
                if moved != list {
                    // The allocation was reseated; point the receiving
                    // variable at the new block.
                    if let Some(owner) = self.scopes.resolve(scope, receiver) {
                        if let Some(var) = self.scopes.var_mut(owner, receiver) {
                            *var.value_mut() = Value::List(moved);
                        }
                    }
                }
                Ok(Value::Null)
            }
            "size" => {
                if !args.is_empty() {
                    return Err(Error::Arity {
                        name: "list.size".to_string(),
                        expected: 0,
                        got: args.len(),
                    });
                }
                Ok(Value::Int(value::list_len(&self.pool, list)? as i64))
            }
            other => Err(Error::UnknownField {
                ty: "list".to_string(),
                field: other.to_string(),
            }),
        }
    }

    /// Member functions on a string variable.
    pub(super) fn string_member(
        &mut self,
        string: Pointer,
        method: &str,
        args: &[Expr],
        scope: ScopeId,
        prefix: &str,
    ) -> Result<Value> {
        match method {
            "format" => {
                let template = value::str_value(&self.pool, string)?;
                let arg_values = self.eval_arguments(args, scope, prefix)?;
                let rendered = self.render_format(&template, &arg_values);
                self.release_all(&arg_values);
                value::new_str(&mut self.pool, &rendered?)
            }
            "parse_int" => {
                self.expect_no_args("str.parse_int", args)?;
                let text = value::str_value(&self.pool, string)?;
                match text.trim().parse::<i64>() {
                    Ok(i) => Ok(Value::Int(i)),
                    Err(_) => Err(Error::ParseNumber { text }),
                }
            }
            "parse_float" => {
                self.expect_no_args("str.parse_float", args)?;
                let text = value::str_value(&self.pool, string)?;
                match text.trim().parse::<f64>() {
                    Ok(f) => Ok(Value::Float(f)),
                    Err(_) => Err(Error::ParseNumber { text }),
                }
            }
            other => Err(Error::UnknownField {
                ty: "str".to_string(),
                field: other.to_string(),
            }),
        }
    }

    fn expect_no_args(&self, name: &str, args: &[Expr]) -> Result<()> {
        if args.is_empty() {
            Ok(())
        } else {
            Err(Error::Arity {
                name: name.to_string(),
                expected: 0,
                got: args.len(),
            })
        }
    }

    /// Substitute `{}` placeholders left to right. Placeholders beyond
    /// the argument count stay literal; extra arguments are ignored.
    fn render_format(&self, template: &str, args: &[Value]) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        let mut args = args.iter();
        while let Some(pos) = rest.find("{}") {
            let Some(arg) = args.next() else { break };
            out.push_str(&rest[..pos]);
            out.push_str(&value::display(&self.pool, arg)?);
            rest = &rest[pos + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}
