//! Name analysis and type checking over the AST dialect.
//!
//! Builds the scoped environment of variables and function signatures,
//! rejects undeclared identifiers and lattice-incompatible assignments,
//! and decorates every expression with a `type_hint` attribute. The
//! AST→flat lowering relies on the hint carried by `call_expr`.

use std::collections::HashMap;

use crate::dialects::ast::{self, AstOp};
use crate::dialects::types;
use crate::error::CompileError;
use crate::ir::{Attribute, Module, OpId};

#[derive(Debug, Clone)]
enum Symbol {
    Var(Attribute),
    Func { params: Vec<Attribute>, ret: Attribute },
}

struct Env {
    scopes: Vec<HashMap<String, Symbol>>,
}

impl Env {
    fn new() -> Env {
        Env {
            scopes: vec![HashMap::new()],
        }
    }

    fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, symbol: Symbol) -> Result<(), CompileError> {
        let scope = self.scopes.last_mut().unwrap();
        if scope.contains_key(name) {
            return Err(CompileError::semantic(format!(
                "Duplicate declaration of `{}`",
                name
            )));
        }
        scope.insert(name.to_string(), symbol);
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Whether `name` is declared somewhere outside the current scope.
    fn declared_outside(&self, name: &str) -> bool {
        self.scopes[..self.scopes.len() - 1]
            .iter()
            .any(|scope| scope.contains_key(name))
    }
}

pub fn type_check(m: &mut Module) -> Result<(), CompileError> {
    let top_ops = m.block_ops(m.top_block());
    let program = *top_ops
        .first()
        .ok_or_else(|| CompileError::semantic("empty module"))?;
    let mut checker = TypeChecker {
        m,
        env: Env::new(),
        current_return: None,
    };
    checker.declare_builtins()?;
    checker.check_program(program)
}

struct TypeChecker<'m> {
    m: &'m mut Module,
    env: Env,
    /// Declared return type of the enclosing function, if any.
    current_return: Option<Attribute>,
}

impl TypeChecker<'_> {
    fn declare_builtins(&mut self) -> Result<(), CompileError> {
        self.env.declare(
            "print",
            Symbol::Func {
                params: vec![types::object_type()],
                ret: types::none_type(),
            },
        )?;
        self.env.declare(
            "input",
            Symbol::Func {
                params: vec![],
                ret: types::str_type(),
            },
        )?;
        self.env.declare(
            "len",
            Symbol::Func {
                params: vec![types::object_type()],
                ret: types::int_type(),
            },
        )?;
        Ok(())
    }

    fn check_program(&mut self, program: OpId) -> Result<(), CompileError> {
        let defs = ast::region_ops(self.m, program, 0);
        // Declare all global names first so definitions can refer to each
        // other regardless of order.
        for def in &defs {
            match ast::ast_kind(self.m, *def) {
                Some(AstOp::VarDef) => {
                    let (name, ty) = self.typed_var_of(*def)?;
                    self.env.declare(&name, Symbol::Var(ty))?;
                }
                Some(AstOp::FuncDef) => {
                    let name = self.str_attr(*def, "func_name");
                    let params = ast::region_ops(self.m, *def, 0)
                        .into_iter()
                        .map(|p| self.resolve_type(ast::region_only_op(self.m, p, 0)))
                        .collect::<Result<Vec<_>, _>>()?;
                    let ret = self.resolve_type(ast::region_only_op(self.m, *def, 1))?;
                    self.env.declare(&name, Symbol::Func { params, ret })?;
                }
                _ => {}
            }
        }
        for def in &defs {
            match ast::ast_kind(self.m, *def) {
                Some(AstOp::VarDef) => self.check_var_def(*def)?,
                Some(AstOp::FuncDef) => self.check_func_def(*def)?,
                _ => {}
            }
        }
        for stmt in ast::region_ops(self.m, program, 1) {
            self.check_stmt(stmt)?;
        }
        Ok(())
    }

    /// Name and resolved type of a `var_def`'s typed var.
    fn typed_var_of(&mut self, var_def: OpId) -> Result<(String, Attribute), CompileError> {
        let typed_var = ast::region_only_op(self.m, var_def, 0);
        let name = self.str_attr(typed_var, "var_name");
        let ty = self.resolve_type(ast::region_only_op(self.m, typed_var, 0))?;
        Ok((name, ty))
    }

    fn str_attr(&self, op: OpId, name: &str) -> String {
        self.m
            .attr(op, name)
            .and_then(|a| a.as_str().map(String::from))
            .expect("missing string attribute")
    }

    fn resolve_type(&self, ty_op: OpId) -> Result<Attribute, CompileError> {
        match ast::ast_kind(self.m, ty_op) {
            Some(AstOp::TypeName) => {
                let name = self.str_attr(ty_op, "type_name");
                match name.as_str() {
                    "int" => Ok(types::int_type()),
                    "bool" => Ok(types::bool_type()),
                    "str" => Ok(types::str_type()),
                    "object" => Ok(types::object_type()),
                    "<None>" => Ok(types::none_type()),
                    other => Err(CompileError::semantic(format!(
                        "Unknown type name `{}`",
                        other
                    ))),
                }
            }
            Some(AstOp::ListType) => {
                let elem = self.resolve_type(ast::region_only_op(self.m, ty_op, 0))?;
                Ok(Attribute::list_of(elem))
            }
            _ => Err(CompileError::semantic("expected a type annotation")),
        }
    }

    fn check_var_def(&mut self, var_def: OpId) -> Result<(), CompileError> {
        let (_, declared) = self.typed_var_of(var_def)?;
        let literal = ast::region_only_op(self.m, var_def, 1);
        let value_ty = self.check_expr(literal)?;
        self.require_assignable(&value_ty, &declared)
    }

    fn check_func_def(&mut self, func_def: OpId) -> Result<(), CompileError> {
        let ret = self.resolve_type(ast::region_only_op(self.m, func_def, 1))?;
        self.env.push();
        for param in ast::region_ops(self.m, func_def, 0) {
            let name = self.str_attr(param, "var_name");
            let ty = self.resolve_type(ast::region_only_op(self.m, param, 0))?;
            self.env.declare(&name, Symbol::Var(ty))?;
        }
        let previous_return = self.current_return.replace(ret);
        for op in ast::region_ops(self.m, func_def, 2) {
            match ast::ast_kind(self.m, op) {
                Some(AstOp::VarDef) => {
                    let (name, ty) = self.typed_var_of(op)?;
                    self.env.declare(&name, Symbol::Var(ty))?;
                    self.check_var_def(op)?;
                }
                Some(AstOp::GlobalDecl) | Some(AstOp::NonlocalDecl) => {
                    let name = self.str_attr(op, "decl_name");
                    if !self.env.declared_outside(&name) {
                        return Err(CompileError::semantic(format!(
                            "Unknown identifier `{}`",
                            name
                        )));
                    }
                }
                _ => self.check_stmt(op)?,
            }
        }
        self.current_return = previous_return;
        self.env.pop();
        Ok(())
    }

    fn check_stmt(&mut self, op: OpId) -> Result<(), CompileError> {
        match ast::ast_kind(self.m, op) {
            Some(AstOp::Pass) => Ok(()),
            Some(AstOp::Return) => {
                let Some(expected) = self.current_return.clone() else {
                    return Err(CompileError::semantic(
                        "Return statement outside of a function",
                    ));
                };
                let values = ast::region_ops(self.m, op, 0);
                let value_ty = match values.first() {
                    Some(value) => self.check_expr(*value)?,
                    None => types::none_type(),
                };
                self.require_assignable(&value_ty, &expected)
            }
            Some(AstOp::Assign) => self.check_assign(op),
            Some(AstOp::If) => {
                self.require_bool(ast::region_only_op(self.m, op, 0))?;
                for stmt in ast::region_ops(self.m, op, 1) {
                    self.check_stmt(stmt)?;
                }
                for stmt in ast::region_ops(self.m, op, 2) {
                    self.check_stmt(stmt)?;
                }
                Ok(())
            }
            Some(AstOp::While) => {
                self.require_bool(ast::region_only_op(self.m, op, 0))?;
                for stmt in ast::region_ops(self.m, op, 1) {
                    self.check_stmt(stmt)?;
                }
                Ok(())
            }
            Some(AstOp::For) => {
                let iter_name = self.str_attr(op, "iter_name");
                let var_ty = match self.env.lookup(&iter_name) {
                    Some(Symbol::Var(ty)) => ty.clone(),
                    _ => {
                        return Err(CompileError::semantic(format!(
                            "Unknown identifier `{}`",
                            iter_name
                        )));
                    }
                };
                let iterable_ty = self.check_expr(ast::region_only_op(self.m, op, 0))?;
                let elem_ty = if let Some(elem) = iterable_ty.list_elem() {
                    elem.clone()
                } else if iterable_ty == types::str_type() {
                    types::str_type()
                } else {
                    return Err(CompileError::semantic(format!(
                        "Cannot iterate over a value of type `{}`",
                        iterable_ty
                    )));
                };
                self.require_assignable(&elem_ty, &var_ty)?;
                for stmt in ast::region_ops(self.m, op, 1) {
                    self.check_stmt(stmt)?;
                }
                Ok(())
            }
            Some(kind) if kind.is_expression() => {
                self.check_expr(op)?;
                Ok(())
            }
            other => Err(CompileError::semantic(format!(
                "unexpected statement {:?}",
                other
            ))),
        }
    }

    fn check_assign(&mut self, assign: OpId) -> Result<(), CompileError> {
        // `a = b = e` is right-nested; collect the targets, then the value.
        let mut targets = vec![ast::region_only_op(self.m, assign, 0)];
        let mut value = ast::region_only_op(self.m, assign, 1);
        while ast::ast_kind(self.m, value) == Some(AstOp::Assign) {
            targets.push(ast::region_only_op(self.m, value, 0));
            value = ast::region_only_op(self.m, value, 1);
        }
        let value_ty = self.check_expr(value)?;
        for target in targets {
            let target_ty = self.check_expr(target)?;
            self.require_assignable(&value_ty, &target_ty)?;
        }
        Ok(())
    }

    fn require_bool(&mut self, expr: OpId) -> Result<(), CompileError> {
        let ty = self.check_expr(expr)?;
        if ty != types::bool_type() {
            return Err(CompileError::semantic(format!(
                "Expected type `bool`, got type `{}`",
                ty
            )));
        }
        Ok(())
    }

    fn require_assignable(&self, value: &Attribute, target: &Attribute) -> Result<(), CompileError> {
        if !types::is_assignable(value, target) {
            return Err(CompileError::semantic(format!(
                "Expected type `{}`, got type `{}`",
                target, value
            )));
        }
        Ok(())
    }

    fn check_expr(&mut self, op: OpId) -> Result<Attribute, CompileError> {
        let ty = self.infer_expr(op)?;
        self.m.set_attr(op, "type_hint", ty.clone());
        Ok(ty)
    }

    fn infer_expr(&mut self, op: OpId) -> Result<Attribute, CompileError> {
        match ast::ast_kind(self.m, op) {
            Some(AstOp::Literal) => Ok(match self.m.attr(op, "value") {
                Some(Attribute::Int(_)) => types::int_type(),
                Some(Attribute::Bool(_)) => types::bool_type(),
                Some(Attribute::Str(_)) => types::str_type(),
                Some(Attribute::NoneLit) => types::none_type(),
                other => {
                    return Err(CompileError::semantic(format!(
                        "malformed literal {:?}",
                        other
                    )));
                }
            }),
            Some(AstOp::ExprName) => {
                let name = self.str_attr(op, "id");
                match self.env.lookup(&name) {
                    Some(Symbol::Var(ty)) => Ok(ty.clone()),
                    Some(Symbol::Func { .. }) => Err(CompileError::semantic(format!(
                        "Function `{}` used as a value",
                        name
                    ))),
                    None => Err(CompileError::semantic(format!(
                        "Unknown identifier `{}`",
                        name
                    ))),
                }
            }
            Some(AstOp::UnaryExpr) => {
                let operator = self.str_attr(op, "op");
                let value_ty = self.check_expr(ast::region_only_op(self.m, op, 0))?;
                let expected = match operator.as_str() {
                    "-" => types::int_type(),
                    "not" => types::bool_type(),
                    other => {
                        return Err(CompileError::semantic(format!(
                            "unknown unary operator `{}`",
                            other
                        )));
                    }
                };
                if value_ty != expected {
                    return Err(CompileError::semantic(format!(
                        "Expected type `{}`, got type `{}`",
                        expected, value_ty
                    )));
                }
                Ok(expected)
            }
            Some(AstOp::BinaryExpr) => self.infer_binary(op),
            Some(AstOp::IfExpr) => {
                self.require_bool(ast::region_only_op(self.m, op, 0))?;
                let then_ty = self.check_expr(ast::region_only_op(self.m, op, 1))?;
                let else_ty = self.check_expr(ast::region_only_op(self.m, op, 2))?;
                Ok(types::join(&then_ty, &else_ty))
            }
            Some(AstOp::ListExpr) => {
                let elems = ast::region_ops(self.m, op, 0);
                if elems.is_empty() {
                    return Ok(types::empty_type());
                }
                let mut elem_ty = self.check_expr(elems[0])?;
                for elem in &elems[1..] {
                    let ty = self.check_expr(*elem)?;
                    elem_ty = types::join(&elem_ty, &ty);
                }
                Ok(Attribute::list_of(elem_ty))
            }
            Some(AstOp::IndexExpr) => {
                let value_ty = self.check_expr(ast::region_only_op(self.m, op, 0))?;
                let index_ty = self.check_expr(ast::region_only_op(self.m, op, 1))?;
                if index_ty != types::int_type() {
                    return Err(CompileError::semantic(format!(
                        "Expected type `int`, got type `{}`",
                        index_ty
                    )));
                }
                if let Some(elem) = value_ty.list_elem() {
                    Ok(elem.clone())
                } else if value_ty == types::str_type() {
                    Ok(types::str_type())
                } else {
                    Err(CompileError::semantic(format!(
                        "Cannot index into a value of type `{}`",
                        value_ty
                    )))
                }
            }
            Some(AstOp::CallExpr) => {
                let name = self.str_attr(op, "func");
                let (params, ret) = match self.env.lookup(&name) {
                    Some(Symbol::Func { params, ret }) => (params.clone(), ret.clone()),
                    Some(Symbol::Var(_)) => {
                        return Err(CompileError::semantic(format!(
                            "`{}` is not a function",
                            name
                        )));
                    }
                    None => {
                        return Err(CompileError::semantic(format!(
                            "Unknown identifier `{}`",
                            name
                        )));
                    }
                };
                let args = ast::region_ops(self.m, op, 0);
                if args.len() != params.len() {
                    return Err(CompileError::semantic(format!(
                        "`{}` expects {} argument(s), got {}",
                        name,
                        params.len(),
                        args.len()
                    )));
                }
                for (arg, param_ty) in args.iter().zip(&params) {
                    let arg_ty = self.check_expr(*arg)?;
                    self.require_assignable(&arg_ty, param_ty)?;
                }
                Ok(ret)
            }
            other => Err(CompileError::semantic(format!(
                "unexpected expression {:?}",
                other
            ))),
        }
    }

    fn infer_binary(&mut self, op: OpId) -> Result<Attribute, CompileError> {
        let operator = self.str_attr(op, "op");
        let lhs = self.check_expr(ast::region_only_op(self.m, op, 0))?;
        let rhs = self.check_expr(ast::region_only_op(self.m, op, 1))?;
        let int = types::int_type();
        let boolean = types::bool_type();
        let string = types::str_type();
        match operator.as_str() {
            "and" | "or" => {
                if lhs != boolean || rhs != boolean {
                    return Err(CompileError::semantic(format!(
                        "Operator `{}` expects bool operands, got `{}` and `{}`",
                        operator, lhs, rhs
                    )));
                }
                Ok(boolean)
            }
            "+" => {
                if lhs == int && rhs == int {
                    Ok(int)
                } else if lhs == string && rhs == string {
                    Ok(string)
                } else if (lhs.is_list() || lhs == types::empty_type())
                    && (rhs.is_list() || rhs == types::empty_type())
                {
                    Ok(types::join(&lhs, &rhs))
                } else {
                    Err(CompileError::semantic(format!(
                        "Operator `+` cannot combine `{}` and `{}`",
                        lhs, rhs
                    )))
                }
            }
            "-" | "*" | "//" | "%" => {
                if lhs != int || rhs != int {
                    return Err(CompileError::semantic(format!(
                        "Operator `{}` expects int operands, got `{}` and `{}`",
                        operator, lhs, rhs
                    )));
                }
                Ok(int)
            }
            "==" | "!=" => {
                if lhs != rhs || !(lhs == int || lhs == boolean || lhs == string) {
                    return Err(CompileError::semantic(format!(
                        "Operator `{}` cannot compare `{}` and `{}`",
                        operator, lhs, rhs
                    )));
                }
                Ok(boolean)
            }
            "<" | "<=" | ">" | ">=" => {
                if lhs != int || rhs != int {
                    return Err(CompileError::semantic(format!(
                        "Operator `{}` expects int operands, got `{}` and `{}`",
                        operator, lhs, rhs
                    )));
                }
                Ok(boolean)
            }
            "is" => {
                // Identity comparison on reference values.
                for ty in [&lhs, &rhs] {
                    if *ty == int || *ty == boolean || *ty == string {
                        return Err(CompileError::semantic(format!(
                            "Operator `is` cannot be applied to `{}`",
                            ty
                        )));
                    }
                }
                Ok(boolean)
            }
            other => Err(CompileError::semantic(format!(
                "unknown operator `{}`",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::ast::{ast_kind, region_only_op, region_ops};
    use crate::parser::parse_program;

    fn check(source: &str) -> Result<Module, CompileError> {
        let mut m = parse_program(source)?;
        type_check(&mut m)?;
        Ok(m)
    }

    #[test]
    fn test_annotates_call_type_hint() {
        let m = check("x: int = 1\nprint(x)\n").unwrap();
        let program = m.block_ops(m.top_block())[0];
        let call = region_ops(&m, program, 1)[0];
        assert_eq!(ast_kind(&m, call), Some(AstOp::CallExpr));
        assert_eq!(m.attr(call, "type_hint"), Some(types::none_type()));
    }

    #[test]
    fn test_undeclared_identifier() {
        let err = check("print(y)\n").unwrap_err();
        assert!(matches!(err, CompileError::Semantic(_)));
        assert!(err.to_string().contains("Unknown identifier `y`"));
    }

    #[test]
    fn test_assignment_type_mismatch() {
        let err = check("x: int = 1\nx = True\n").unwrap_err();
        assert!(err.to_string().contains("Expected type `!int`"));
    }

    #[test]
    fn test_none_assignable_to_list_var() {
        check("xs: [int] = None\nxs = [1, 2]\n").unwrap();
    }

    #[test]
    fn test_function_signature_checked() {
        let source = "def f(a: int) -> int:\n    return a\nprint(f(True))\n";
        let err = check(source).unwrap_err();
        assert!(matches!(err, CompileError::Semantic(_)));
    }

    #[test]
    fn test_return_outside_function() {
        let err = check("return 1\n").unwrap_err();
        assert!(err.to_string().contains("outside of a function"));
    }

    #[test]
    fn test_list_join_typing() {
        let m = check("xs: [object] = None\nxs = [1] + [True]\n").unwrap();
        let program = m.block_ops(m.top_block())[0];
        let assign = region_ops(&m, program, 1)[0];
        let value = region_only_op(&m, assign, 1);
        assert_eq!(
            m.attr(value, "type_hint"),
            Some(Attribute::list_of(types::object_type()))
        );
    }

    #[test]
    fn test_while_condition_must_be_bool() {
        let err = check("while 1:\n    pass\n").unwrap_err();
        assert!(err.to_string().contains("bool"));
    }

    #[test]
    fn test_global_decl_resolves() {
        let source = "x: int = 0\ndef bump():\n    global x\n    x = x + 1\nbump()\n";
        check(source).unwrap();
    }

    #[test]
    fn test_string_comparison_ok() {
        check("print(\"a\" == \"b\")\n").unwrap();
    }
}
