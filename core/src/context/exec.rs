//! The tree-walking evaluator.
//!
//! Statements are executed for their [`Flow`]; expressions evaluate to
//! an owned [`Value`]. Assigning operators resolve their left side to a
//! [`Place`] (variable cell, list slot, or struct field) and mutate it
//! in place. Every temporary an expression produces is either moved
//! into storage or released back to the pool before the statement
//! finishes.

use std::rc::Rc;

use snafu::ResultExt;
use tracing::{debug, trace};

use crate::ast::{BinaryOp, Block, Expr, Literal, Stmt};
use crate::errors::{Error, IoSnafu, Result};
use crate::memory::Pointer;
use crate::parser;
use crate::scope::{ScopeId, Scopes};
use crate::value::{self, ops, Value};

use super::{Context, Frame, FunctionEntry, StructDesc, StructMember};

/// Statement outcome: keep going, or unwind to the nearest call frame
/// carrying the returned value.
pub(crate) enum Flow {
    Normal,
    Return(Value),
}

/// A resolved assignment target.
enum Place {
    Var { owner: ScopeId, name: String },
    ListSlot { list: Pointer, index: usize },
    Field { target: Pointer, field: String },
}

impl Context {
    pub(crate) fn exec_block(
        &mut self,
        block: &Block,
        scope: ScopeId,
        prefix: &str,
    ) -> Result<Flow> {
        for stmt in block {
            match self.exec_stmt(stmt, scope, prefix)? {
                Flow::Normal => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: ScopeId, prefix: &str) -> Result<Flow> {
        match stmt {
            Stmt::Declaration { name, init } => {
                let init_value = self.eval_expr(init, scope, prefix)?;
                self.scopes.declare(&mut self.pool, scope, name, init_value);
                Ok(Flow::Normal)
            }

            Stmt::Expr(expr) => {
                let result = self.eval_expr(expr, scope, prefix)?;
                value::release(&mut self.pool, &result);
                Ok(Flow::Normal)
            }

            Stmt::Return(expr) => {
                let result = match expr {
                    Some(expr) => self.eval_expr(expr, scope, prefix)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(result))
            }

            Stmt::Import { folders, module } => {
                self.exec_import(folders, module)?;
                Ok(Flow::Normal)
            }

            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let taken = self.eval_condition(cond, scope, prefix)?;
                let inner = self.scopes.push(scope);
                let flow = if taken {
                    self.exec_block(then_body, inner, prefix)
                } else if let Some(else_body) = else_body {
                    self.exec_block(else_body, inner, prefix)
                } else {
                    Ok(Flow::Normal)
                };
                self.scopes.pop(inner, &mut self.pool);
                flow
            }

            Stmt::While { cond, body } => {
                while self.eval_condition(cond, scope, prefix)? {
                    let inner = self.scopes.push(scope);
                    let flow = self.exec_block(body, inner, prefix);
                    self.scopes.pop(inner, &mut self.pool);
                    if let Flow::Return(value) = flow? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::ForManual {
                decl_name,
                decl_init,
                cond,
                step,
                body,
            } => {
                let loop_scope = self.scopes.push(scope);
                let flow =
                    self.run_manual_for(decl_name, decl_init, cond, step, body, loop_scope, prefix);
                self.scopes.pop(loop_scope, &mut self.pool);
                flow
            }

            Stmt::ForEach {
                binding,
                iterable,
                body,
            } => {
                let iterable_value = self.eval_expr(iterable, scope, prefix)?;
                let list = match &iterable_value {
                    Value::List(ptr) => *ptr,
                    other => {
                        let err = Error::ExpectedList {
                            found: other.type_name(),
                        };
                        value::release(&mut self.pool, &iterable_value);
                        return Err(err);
                    }
                };
                let loop_scope = self.scopes.push(scope);
                let flow = self.run_for_each(binding, list, body, loop_scope, prefix);
                self.scopes.pop(loop_scope, &mut self.pool);
                value::release(&mut self.pool, &iterable_value);
                flow
            }

            Stmt::Function(def) => {
                let qualified = format!("{prefix}{}", def.name);
                trace!(function = %qualified, external = def.body.is_none(), "registering function");
                self.functions.insert(
                    qualified,
                    FunctionEntry {
                        def: Rc::clone(def),
                        prefix: prefix.to_string(),
                    },
                );
                Ok(Flow::Normal)
            }

            Stmt::Struct(def) => {
                let mut members: Vec<StructMember> = Vec::with_capacity(def.members.len());
                for member in &def.members {
                    // Defaults are evaluated once, now, in global scope.
                    let default = match &member.default {
                        Some(expr) => match self.eval_expr(expr, Scopes::GLOBAL, prefix) {
                            Ok(v) => v,
                            Err(err) => {
                                for built in &members {
                                    value::release(&mut self.pool, &built.default);
                                }
                                return Err(err);
                            }
                        },
                        None => Value::Null,
                    };
                    members.push(StructMember {
                        name: member.name.clone(),
                        default,
                    });
                }
                let qualified = format!("{prefix}{}", def.name);
                trace!(name = %qualified, "registering struct");
                let desc = Rc::new(StructDesc {
                    name: qualified.clone(),
                    members,
                });
                if let Some(old) = self.structs.insert(qualified, desc) {
                    for member in &old.members {
                        value::release(&mut self.pool, &member.default);
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::Namespace { name, body } => {
                let inner_prefix = format!("{prefix}{name}.");
                let inner = self.scopes.push(scope);
                let flow = self.exec_block(body, inner, &inner_prefix);
                self.scopes.pop(inner, &mut self.pool);
                flow
            }
        }
    }

    fn eval_condition(&mut self, cond: &Expr, scope: ScopeId, prefix: &str) -> Result<bool> {
        let cond_value = self.eval_expr(cond, scope, prefix)?;
        let taken = value::truthy(&cond_value);
        value::release(&mut self.pool, &cond_value);
        taken
    }

    #[allow(clippy::too_many_arguments)]
    fn run_manual_for(
        &mut self,
        decl_name: &str,
        decl_init: &Expr,
        cond: &Expr,
        step: &Expr,
        body: &Block,
        loop_scope: ScopeId,
        prefix: &str,
    ) -> Result<Flow> {
        let init = self.eval_expr(decl_init, loop_scope, prefix)?;
        self.scopes.declare(&mut self.pool, loop_scope, decl_name, init);
        while self.eval_condition(cond, loop_scope, prefix)? {
            let inner = self.scopes.push(loop_scope);
            let flow = self.exec_block(body, inner, prefix);
            self.scopes.pop(inner, &mut self.pool);
            if let Flow::Return(value) = flow? {
                return Ok(Flow::Return(value));
            }
            let step_value = self.eval_expr(step, loop_scope, prefix)?;
            value::release(&mut self.pool, &step_value);
        }
        Ok(Flow::Normal)
    }

    fn run_for_each(
        &mut self,
        binding: &str,
        list: Pointer,
        body: &Block,
        loop_scope: ScopeId,
        prefix: &str,
    ) -> Result<Flow> {
        let len = value::list_len(&self.pool, list)?;
        for index in 0..len {
            let element = value::list_get(&self.pool, list, index)?;
            let copy = value::deep_clone(&mut self.pool, &element)?;
            self.scopes.declare(&mut self.pool, loop_scope, binding, copy);
            let inner = self.scopes.push(loop_scope);
            let flow = self.exec_block(body, inner, prefix);
            self.scopes.pop(inner, &mut self.pool);
            if let Flow::Return(value) = flow? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_import(&mut self, folders: &[String], module: &str) -> Result<()> {
        let mut path = self.options.module_root.clone();
        for folder in folders {
            path.push(folder);
        }
        path.push(format!("{module}.ps"));

        let source = std::fs::read_to_string(&path).context(IoSnafu {
            target: path.display().to_string(),
        })?;
        let program = parser::parse(&source)?;

        let mut prefix = String::new();
        for folder in folders {
            prefix.push_str(folder);
            prefix.push('.');
        }
        prefix.push_str(module);
        prefix.push('.');
        debug!(module = %prefix, path = %path.display(), "importing module");

        // Imports run in a fresh scope parented to global so their
        // variables cannot collide with the importer's.
        let scope = self.scopes.push(Scopes::GLOBAL);
        let flow = self.exec_block(&program.body, scope, &prefix);
        self.scopes.pop(scope, &mut self.pool);
        if let Flow::Return(value) = flow? {
            value::release(&mut self.pool, &value);
        }
        Ok(())
    }

    pub(crate) fn eval_expr(&mut self, expr: &Expr, scope: ScopeId, prefix: &str) -> Result<Value> {
        match expr {
            Expr::Literal(Literal::Int(i)) => Ok(Value::Int(*i)),
            Expr::Literal(Literal::Float(f)) => Ok(Value::Float(*f)),
            Expr::Literal(Literal::Bool(b)) => Ok(Value::Bool(*b)),
            Expr::Literal(Literal::Str(s)) => value::new_str(&mut self.pool, s),

            Expr::Ident(name) => {
                // Evaluating a name yields a copy that owns its own
                // allocations; the variable keeps the original.
                let Some(var) = self.scopes.lookup(scope, name) else {
                    return Err(Error::UndefinedVariable { name: name.clone() });
                };
                value::deep_clone(&mut self.pool, var.value())
            }

            Expr::Binary { op, lhs, rhs } if op.is_assigning() => {
                self.eval_assignment(*op, lhs, rhs, scope, prefix)
            }

            Expr::Binary { op, lhs, rhs } => {
                let lhs_value = self.eval_expr(lhs, scope, prefix)?;
                let rhs_value = match self.eval_expr(rhs, scope, prefix) {
                    Ok(v) => v,
                    Err(err) => {
                        value::release(&mut self.pool, &lhs_value);
                        return Err(err);
                    }
                };
                let result = ops::binary(&mut self.pool, *op, &lhs_value, &rhs_value);
                value::release(&mut self.pool, &lhs_value);
                value::release(&mut self.pool, &rhs_value);
                result
            }

            Expr::Unary { op, expr } => {
                let operand = self.eval_expr(expr, scope, prefix)?;
                let result = ops::unary(*op, &operand);
                value::release(&mut self.pool, &operand);
                result
            }

            Expr::Call {
                namespace,
                name,
                args,
            } => self.eval_call(namespace, name, args, scope, prefix),

            Expr::Index { target, index } => {
                let (list, index) = self.resolve_index(target, index, scope, prefix)?;
                let element = value::list_get(&self.pool, list, index)?;
                value::deep_clone(&mut self.pool, &element)
            }

            Expr::Access { base, fields } => {
                let (target, field) = self.resolve_access(base, fields, scope)?;
                let view = value::struct_get(&self.pool, target, &field)?;
                value::deep_clone(&mut self.pool, &view)
            }

            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match self.eval_expr(item, scope, prefix) {
                        Ok(v) => values.push(v),
                        Err(err) => {
                            for built in &values {
                                value::release(&mut self.pool, built);
                            }
                            return Err(err);
                        }
                    }
                }
                value::new_list(&mut self.pool, values)
            }

            Expr::Constructor { name, args } => self.eval_constructor(name, args, scope, prefix),
        }
    }

    /// Evaluate the argument list of a call-like node, left to right,
    /// releasing partial results on failure.
    pub(super) fn eval_arguments(
        &mut self,
        args: &[Expr],
        scope: ScopeId,
        prefix: &str,
    ) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match self.eval_expr(arg, scope, prefix) {
                Ok(v) => values.push(v),
                Err(err) => {
                    self.release_all(&values);
                    return Err(err);
                }
            }
        }
        Ok(values)
    }

    pub(crate) fn release_all(&mut self, values: &[Value]) {
        for v in values {
            value::release(&mut self.pool, v);
        }
    }

    fn eval_constructor(
        &mut self,
        name: &str,
        args: &[Expr],
        scope: ScopeId,
        prefix: &str,
    ) -> Result<Value> {
        let arg_values = self.eval_arguments(args, scope, prefix)?;

        let qualified = format!("{prefix}{name}");
        let desc = match self
            .structs
            .get(&qualified)
            .or_else(|| self.structs.get(name))
        {
            Some(desc) => Rc::clone(desc),
            None => {
                self.release_all(&arg_values);
                return Err(Error::UndefinedStruct {
                    name: name.to_string(),
                });
            }
        };

        if arg_values.len() > desc.members.len() {
            let got = arg_values.len();
            self.release_all(&arg_values);
            return Err(Error::Arity {
                name: desc.name.clone(),
                expected: desc.members.len(),
                got,
            });
        }

        // Positional arguments first, member defaults for the rest.
        let mut fields = Vec::with_capacity(desc.members.len());
        let mut positional = arg_values.into_iter();
        for member in &desc.members {
            let field_value = match positional.next() {
                Some(v) => v,
                None => match value::deep_clone(&mut self.pool, &member.default) {
                    Ok(v) => v,
                    Err(err) => {
                        for (_, built) in &fields {
                            value::release(&mut self.pool, built);
                        }
                        return Err(err);
                    }
                },
            };
            fields.push((member.name.clone(), field_value));
        }
        value::new_struct(&mut self.pool, &desc.name, fields)
    }

    fn eval_assignment(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        scope: ScopeId,
        prefix: &str,
    ) -> Result<Value> {
        let rhs_value = self.eval_expr(rhs, scope, prefix)?;
        // Resolve the place after the right side so list slots cannot
        // be invalidated by a reallocation the right side triggers.
        let place = match self.resolve_place(lhs, op, scope, prefix) {
            Ok(place) => place,
            Err(err) => {
                value::release(&mut self.pool, &rhs_value);
                return Err(err);
            }
        };

        match op.compound_base() {
            None => self.place_store(&place, rhs_value)?,
            Some(base) => {
                let current = self.place_view(&place)?;
                let result = ops::binary(&mut self.pool, base, &current, &rhs_value);
                value::release(&mut self.pool, &rhs_value);
                self.place_store(&place, result?)?;
            }
        }

        // The expression's result is a copy of what was stored.
        let stored = self.place_view(&place)?;
        value::deep_clone(&mut self.pool, &stored)
    }

    fn resolve_place(
        &mut self,
        expr: &Expr,
        op: BinaryOp,
        scope: ScopeId,
        prefix: &str,
    ) -> Result<Place> {
        match expr {
            Expr::Ident(name) => {
                let owner =
                    self.scopes
                        .resolve(scope, name)
                        .ok_or_else(|| Error::UndefinedVariable {
                            name: name.clone(),
                        })?;
                Ok(Place::Var {
                    owner,
                    name: name.clone(),
                })
            }
            Expr::Index { target, index } => {
                let (list, index) = self.resolve_index(target, index, scope, prefix)?;
                Ok(Place::ListSlot { list, index })
            }
            Expr::Access { base, fields } => {
                let (target, field) = self.resolve_access(base, fields, scope)?;
                Ok(Place::Field { target, field })
            }
            _ => Err(Error::InvalidPlace { op: op.symbol() }),
        }
    }

    /// Resolve `target[index]` to the list allocation and a checked
    /// element index.
    fn resolve_index(
        &mut self,
        target: &str,
        index: &Expr,
        scope: ScopeId,
        prefix: &str,
    ) -> Result<(Pointer, usize)> {
        let index_value = self.eval_expr(index, scope, prefix)?;
        let index = match &index_value {
            Value::Int(i) => *i,
            other => {
                let err = Error::IndexType {
                    found: other.type_name(),
                };
                value::release(&mut self.pool, &index_value);
                return Err(err);
            }
        };

        let Some(var) = self.scopes.lookup(scope, target) else {
            return Err(Error::UndefinedVariable {
                name: target.to_string(),
            });
        };
        let list = match var.value() {
            Value::List(ptr) => *ptr,
            other => {
                return Err(Error::ExpectedList {
                    found: other.type_name(),
                })
            }
        };

        let len = value::list_len(&self.pool, list)?;
        if index < 0 || index as usize >= len {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        Ok((list, index as usize))
    }

    /// Resolve `base->f1->…->fn` to the struct allocation holding the
    /// last field, plus that field's name.
    fn resolve_access(
        &mut self,
        base: &str,
        fields: &[String],
        scope: ScopeId,
    ) -> Result<(Pointer, String)> {
        let Some(var) = self.scopes.lookup(scope, base) else {
            return Err(Error::UndefinedVariable {
                name: base.to_string(),
            });
        };
        let mut target = match var.value() {
            Value::Struct(ptr) => *ptr,
            other => {
                return Err(Error::UnknownField {
                    ty: other.type_name().to_string(),
                    field: fields.first().cloned().unwrap_or_default(),
                })
            }
        };

        // Descend through every field but the last.
        for (field, next) in fields.iter().zip(fields.iter().skip(1)) {
            let view = value::struct_get(&self.pool, target, field)?;
            target = match view {
                Value::Struct(ptr) => ptr,
                other => {
                    return Err(Error::UnknownField {
                        ty: other.type_name().to_string(),
                        field: next.clone(),
                    })
                }
            };
        }
        let last = fields
            .last()
            .ok_or_else(|| Error::InvalidPlace { op: "->" })?;
        Ok((target, last.clone()))
    }

    fn place_view(&self, place: &Place) -> Result<Value> {
        match place {
            Place::Var { owner, name } => {
                let var = self
                    .scopes
                    .lookup(*owner, name)
                    .ok_or_else(|| Error::UndefinedVariable { name: name.clone() })?;
                Ok(value::alias(var.value()))
            }
            Place::ListSlot { list, index } => value::list_get(&self.pool, *list, *index),
            Place::Field { target, field } => value::struct_get(&self.pool, *target, field),
        }
    }

    /// Move `new_value` into the place, releasing whatever it held.
    fn place_store(&mut self, place: &Place, new_value: Value) -> Result<()> {
        match place {
            Place::Var { owner, name } => {
                let var = self
                    .scopes
                    .var_mut(*owner, name)
                    .ok_or_else(|| Error::UndefinedVariable { name: name.clone() })?;
                let old = var.replace(new_value);
                value::release(&mut self.pool, &old);
                Ok(())
            }
            Place::ListSlot { list, index } => {
                value::list_set(&mut self.pool, *list, *index, new_value)
            }
            Place::Field { target, field } => {
                value::struct_set(&mut self.pool, *target, field, new_value)
            }
        }
    }

    fn eval_call(
        &mut self,
        namespace: &[String],
        name: &str,
        args: &[Expr],
        scope: ScopeId,
        prefix: &str,
    ) -> Result<Value> {
        if namespace.is_empty() {
            match name {
                "__print" => return self.builtin_print(args, scope, prefix),
                "__readln" => return self.builtin_readln(args),
                _ => {}
            }
        } else {
            // A dotted prefix naming a variable is a member-function
            // call dispatched on the variable's tag.
            let ns = namespace.join(".");
            let receiver = self
                .scopes
                .lookup(scope, &ns)
                .map(|var| value::alias(var.value()));
            if let Some(receiver) = receiver {
                return match receiver {
                    Value::List(ptr) => self.list_member(&ns, ptr, name, args, scope, prefix),
                    Value::Str(ptr) => self.string_member(ptr, name, args, scope, prefix),
                    other => Err(Error::UnknownField {
                        ty: other.type_name().to_string(),
                        field: name.to_string(),
                    }),
                };
            }
        }

        let full_name = if namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", namespace.join("."), name)
        };
        // Names qualify under the caller's prefix first, so functions
        // defined by a module resolve from inside that module.
        let qualified = format!("{prefix}{full_name}");
        let entry = self
            .functions
            .get(&qualified)
            .or_else(|| self.functions.get(&full_name));
        let Some(entry) = entry else {
            return Err(Error::UndefinedFunction { name: full_name });
        };
        let def = Rc::clone(&entry.def);
        let callee_prefix = entry.prefix.clone();

        let Some(body) = def.body.as_ref() else {
            return Err(Error::ExternNotBound { name: full_name });
        };

        let arg_values = self.eval_arguments(args, scope, prefix)?;
        if arg_values.len() != def.params.len() {
            let got = arg_values.len();
            self.release_all(&arg_values);
            return Err(Error::Arity {
                name: full_name,
                expected: def.params.len(),
                got,
            });
        }
        if self.call_stack.len() >= self.options.max_call_depth {
            self.release_all(&arg_values);
            return Err(Error::RecursionLimit {
                max_depth: self.options.max_call_depth,
            });
        }

        // Function frames are parented to the global scope: a callee
        // never sees the caller's locals.
        let frame_scope = self.scopes.push(Scopes::GLOBAL);
        for (param, arg) in def.params.iter().zip(arg_values) {
            self.scopes
                .declare(&mut self.pool, frame_scope, &param.name, arg);
        }
        trace!(function = %full_name, depth = self.call_stack.len() + 1, "calling");
        self.call_stack.push(Frame {
            name: full_name,
            scope: frame_scope,
        });

        let flow = self.exec_block(body, frame_scope, &callee_prefix);

        if let Some(frame) = self.call_stack.pop() {
            debug_assert_eq!(frame.scope, frame_scope);
            trace!(function = %frame.name, "returned");
        }
        self.scopes.pop(frame_scope, &mut self.pool);

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Null),
        }
    }
}
