//! AST→flat lowering.
//!
//! Turns the tree-shaped AST into flat SSA: every variable becomes an
//! `alloc`ed memory location, every read a `load`, every write a `store`.
//! A stack of scopes maps source identifiers to the SSA value that
//! governs them (almost always a memloc); child scopes chain to their
//! parents, so a nested function sees the memlocs of enclosing scopes and
//! the backend later turns those cross-function references into
//! `tp`-relative accesses.
//!
//! The whole translated program ends up inside a synthesized
//! `func_def "_main"` returning `<None>`: variable definitions first,
//! then function definitions, then the top-level statements.

use std::collections::HashMap;

use crate::dialects::ast::{self, AstOp};
use crate::dialects::flat;
use crate::dialects::types;
use crate::error::CompileError;
use crate::ir::{Attribute, Module, OpId, ValueId};

/// Lower a type-checked AST module to a fresh flat module.
pub fn ast_to_flat(ast_module: &Module) -> Result<Module, CompileError> {
    let top_ops = ast_module.block_ops(ast_module.top_block());
    let program = *top_ops
        .first()
        .ok_or_else(|| CompileError::semantic("empty module"))?;
    if ast::ast_kind(ast_module, program) != Some(AstOp::Program) {
        return Err(CompileError::semantic("expected a program operation"));
    }

    let mut translator = Translator {
        ast: ast_module,
        out: Module::new(),
        scopes: vec![HashMap::new()],
    };
    let body = translator.translate_program(program)?;

    let mut out = translator.out;
    let region = out.region_from_ops(body);
    let main = flat::func_def(&mut out, "_main", types::none_type(), region);
    let top = out.top_block();
    out.append_op(top, main);
    Ok(out)
}

struct Translator<'a> {
    ast: &'a Module,
    out: Module,
    /// Identifier → governing SSA value, innermost scope last.
    scopes: Vec<HashMap<String, ValueId>>,
}

impl Translator<'_> {
    fn bind(&mut self, name: &str, value: ValueId) {
        self.scopes.last_mut().unwrap().insert(name.to_string(), value);
    }

    fn lookup(&self, name: &str) -> Option<ValueId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    fn str_attr(&self, op: OpId, name: &str) -> String {
        self.ast
            .attr(op, name)
            .and_then(|a| a.as_str().map(String::from))
            .expect("missing string attribute")
    }

    fn translate_program(&mut self, program: OpId) -> Result<Vec<OpId>, CompileError> {
        let defs = ast::region_ops(self.ast, program, 0);
        let mut ops = Vec::new();
        for def in &defs {
            if ast::ast_kind(self.ast, *def) == Some(AstOp::VarDef) {
                ops.extend(self.translate_var_def(*def)?);
            }
        }
        for def in &defs {
            if ast::ast_kind(self.ast, *def) == Some(AstOp::FuncDef) {
                ops.push(self.translate_fun_def(*def)?);
            }
        }
        for stmt in ast::region_ops(self.ast, program, 1) {
            ops.extend(self.translate_stmt(stmt)?);
        }
        Ok(ops)
    }

    fn resolve_type(&self, ty_op: OpId) -> Result<Attribute, CompileError> {
        match ast::ast_kind(self.ast, ty_op) {
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
                let elem = self.resolve_type(ast::region_only_op(self.ast, ty_op, 0))?;
                Ok(Attribute::list_of(elem))
            }
            _ => Err(CompileError::semantic("expected a type annotation")),
        }
    }

    fn translate_fun_def(&mut self, fun_def: OpId) -> Result<OpId, CompileError> {
        let func_name = self.str_attr(fun_def, "func_name");
        let mut param_names = Vec::new();
        let mut param_types = Vec::new();
        for param in ast::region_ops(self.ast, fun_def, 0) {
            param_names.push(self.str_attr(param, "var_name"));
            param_types.push(self.resolve_type(ast::region_only_op(self.ast, param, 0))?);
        }
        let return_type = self.resolve_type(ast::region_only_op(self.ast, fun_def, 1))?;

        let (region, block) = self.out.region_with_args(param_types.clone());
        self.scopes.push(HashMap::new());

        // Give each parameter a stack slot: alloc, rewrite any existing
        // use of the raw block argument onto the slot, then store the
        // incoming value into it.
        for (index, (name, ty)) in param_names.iter().zip(&param_types).enumerate() {
            let arg = self.out.block_args(block)[index];
            let alloc = flat::alloc(&mut self.out, ty.clone());
            let memloc = self.out.result(alloc, 0);
            for u in self.out.value_uses(arg) {
                self.out.replace_operand(u.op, u.index, memloc);
            }
            let store = flat::store(&mut self.out, memloc, arg);
            self.out.append_ops(block, &[alloc, store]);
            self.bind(name, memloc);
        }

        for op in ast::region_ops(self.ast, fun_def, 2) {
            let ops = self.translate_def_or_stmt(op)?;
            self.out.append_ops(block, &ops);
        }
        self.scopes.pop();

        Ok(flat::func_def(&mut self.out, &func_name, return_type, region))
    }

    fn translate_var_def(&mut self, var_def: OpId) -> Result<Vec<OpId>, CompileError> {
        let typed_var = ast::region_only_op(self.ast, var_def, 0);
        let name = self.str_attr(typed_var, "var_name");
        let ty = self.resolve_type(ast::region_only_op(self.ast, typed_var, 0))?;

        let init_op = ast::region_only_op(self.ast, var_def, 1);
        let (mut ops, init) = self.translate_expr(init_op, true)?;
        let alloc = flat::alloc(&mut self.out, ty);
        let memloc = self.out.result(alloc, 0);
        let store = flat::store(&mut self.out, memloc, init);
        self.bind(&name, memloc);

        ops.push(alloc);
        ops.push(store);
        Ok(ops)
    }

    fn translate_def_or_stmt(&mut self, op: OpId) -> Result<Vec<OpId>, CompileError> {
        match ast::ast_kind(self.ast, op) {
            Some(AstOp::VarDef) => self.translate_var_def(op),
            Some(AstOp::FuncDef) => Ok(vec![self.translate_fun_def(op)?]),
            _ => self.translate_stmt(op),
        }
    }

    fn translate_stmt(&mut self, op: OpId) -> Result<Vec<OpId>, CompileError> {
        match ast::ast_kind(self.ast, op) {
            Some(AstOp::Assign) => self.translate_assign(op),
            Some(AstOp::Return) => self.translate_return(op),
            Some(AstOp::Pass) => Ok(Vec::new()),
            Some(AstOp::If) => self.translate_if(op),
            Some(AstOp::While) => self.translate_while(op),
            Some(AstOp::For) => self.translate_for(op),
            // Declarations carry no runtime behavior: the IR already
            // expresses writes to outer-scope memlocs directly.
            Some(AstOp::GlobalDecl) | Some(AstOp::NonlocalDecl) => Ok(Vec::new()),
            Some(AstOp::CallExpr) => self.translate_call_stmt(op),
            Some(kind) if kind.is_expression() => Ok(self.translate_expr(op, true)?.0),
            other => Err(CompileError::semantic(format!(
                "could not translate {:?} as a statement",
                other
            ))),
        }
    }

    /// Translate an expression to `(ops, value)`. With `add_load` set, a
    /// memloc-typed result is wrapped in a `load`; targets of assignments
    /// pass `false` to get the raw location.
    fn translate_expr(
        &mut self,
        op: OpId,
        add_load: bool,
    ) -> Result<(Vec<OpId>, ValueId), CompileError> {
        let (mut ops, value) = self.translate_expr_inner(op)?;
        if add_load && self.out.value_type(value).is_memloc() {
            let load = flat::load(&mut self.out, value);
            let loaded = self.out.result(load, 0);
            ops.push(load);
            return Ok((ops, loaded));
        }
        Ok((ops, value))
    }

    fn translate_expr_inner(&mut self, op: OpId) -> Result<(Vec<OpId>, ValueId), CompileError> {
        match ast::ast_kind(self.ast, op) {
            Some(AstOp::Literal) => {
                let value = self
                    .ast
                    .attr(op, "value")
                    .ok_or_else(|| CompileError::semantic("malformed literal"))?;
                let lit = flat::literal(&mut self.out, value);
                let result = self.out.result(lit, 0);
                Ok((vec![lit], result))
            }
            Some(AstOp::ExprName) => {
                let name = self.str_attr(op, "id");
                let value = self.lookup(&name).ok_or_else(|| {
                    CompileError::semantic(format!("Unknown identifier `{}`", name))
                })?;
                Ok((Vec::new(), value))
            }
            Some(AstOp::UnaryExpr) => {
                let (mut ops, value) =
                    self.translate_expr(ast::region_only_op(self.ast, op, 0), true)?;
                let operator = self.str_attr(op, "op");
                let unary = flat::unary_expr(&mut self.out, &operator, value);
                let result = self.out.result(unary, 0);
                ops.push(unary);
                Ok((ops, result))
            }
            Some(AstOp::BinaryExpr) => self.translate_binary(op),
            Some(AstOp::IfExpr) => self.translate_if_expr(op),
            Some(AstOp::ListExpr) => self.translate_list_expr(op),
            Some(AstOp::IndexExpr) => self.translate_index_expr(op),
            Some(AstOp::CallExpr) => self.translate_call_expr(op),
            other => Err(CompileError::semantic(format!(
                "could not translate {:?} as an expression",
                other
            ))),
        }
    }

    fn translate_binary(&mut self, op: OpId) -> Result<(Vec<OpId>, ValueId), CompileError> {
        let operator = self.str_attr(op, "op");
        let (mut lhs_ops, lhs) = self.translate_expr(ast::region_only_op(self.ast, op, 0), true)?;
        let (mut rhs_ops, rhs) = self.translate_expr(ast::region_only_op(self.ast, op, 1), true)?;
        let lhs_ty = self.out.value_type(lhs);
        let rhs_ty = self.out.value_type(rhs);

        let mut result_type = rhs_ty.clone();
        if operator == "+" && lhs_ty != rhs_ty && lhs_ty.is_list() && rhs_ty.is_list() {
            // Concatenating differently-typed lists widens to list<object>.
            result_type = Attribute::list_of(types::object_type());
        } else if operator != "is" && lhs_ty != rhs_ty {
            // <Empty> mixes with list types; anything else is a type bug
            // the checker should have caught.
            if operator == "+" && (lhs_ty.is_list() || lhs_ty == types::empty_type()) {
                result_type = types::join(&lhs_ty, &rhs_ty);
            } else {
                return Err(CompileError::semantic(format!(
                    "operands of `{}` have mismatched types `{}` and `{}`",
                    operator, lhs_ty, rhs_ty
                )));
            }
        }
        if matches!(operator.as_str(), "!=" | "==" | "<" | "<=" | ">" | ">=" | "is") {
            result_type = types::bool_type();
        }

        // Short-circuit operators keep both sides in regions so the right
        // side only runs when control reaches it.
        if operator == "or" || operator == "and" {
            let lhs_yield = flat::yield_value(&mut self.out, lhs);
            lhs_ops.push(lhs_yield);
            let rhs_yield = flat::yield_value(&mut self.out, rhs);
            rhs_ops.push(rhs_yield);
            let lhs_region = self.out.region_from_ops(lhs_ops);
            let rhs_region = self.out.region_from_ops(rhs_ops);
            let expr = flat::effectful_binary_expr(
                &mut self.out,
                &operator,
                lhs_region,
                rhs_region,
                result_type,
            );
            let result = self.out.result(expr, 0);
            return Ok((vec![expr], result));
        }

        let expr = flat::binary_expr(&mut self.out, &operator, lhs, rhs, result_type);
        let result = self.out.result(expr, 0);
        lhs_ops.extend(rhs_ops);
        lhs_ops.push(expr);
        Ok((lhs_ops, result))
    }

    fn translate_if_expr(&mut self, op: OpId) -> Result<(Vec<OpId>, ValueId), CompileError> {
        let (mut ops, cond) = self.translate_expr(ast::region_only_op(self.ast, op, 0), true)?;
        let (mut then_ops, then_value) =
            self.translate_expr(ast::region_only_op(self.ast, op, 1), true)?;
        let (mut else_ops, else_value) =
            self.translate_expr(ast::region_only_op(self.ast, op, 2), true)?;

        let result_type = types::join(
            &self.out.value_type(then_value),
            &self.out.value_type(else_value),
        );
        let then_yield = flat::yield_value(&mut self.out, then_value);
        then_ops.push(then_yield);
        let else_yield = flat::yield_value(&mut self.out, else_value);
        else_ops.push(else_yield);

        let then_region = self.out.region_from_ops(then_ops);
        let else_region = self.out.region_from_ops(else_ops);
        let expr = flat::if_expr(&mut self.out, cond, then_region, else_region, result_type);
        let result = self.out.result(expr, 0);
        ops.push(expr);
        Ok((ops, result))
    }

    fn translate_list_expr(&mut self, op: OpId) -> Result<(Vec<OpId>, ValueId), CompileError> {
        let mut ops = Vec::new();
        let mut values = Vec::new();
        for elem in ast::region_ops(self.ast, op, 0) {
            let (elem_ops, value) = self.translate_expr(elem, true)?;
            ops.extend(elem_ops);
            values.push(value);
        }
        let result_type = if values.is_empty() {
            types::empty_type()
        } else {
            let mut elem_ty = self.out.value_type(values[0]);
            for value in &values[1..] {
                let ty = self.out.value_type(*value);
                elem_ty = types::join(&elem_ty, &ty);
            }
            Attribute::list_of(elem_ty)
        };
        let list = flat::list_expr(&mut self.out, &values, result_type);
        let result = self.out.result(list, 0);
        ops.push(list);
        Ok((ops, result))
    }

    fn translate_index_expr(&mut self, op: OpId) -> Result<(Vec<OpId>, ValueId), CompileError> {
        let (mut ops, value) = self.translate_expr(ast::region_only_op(self.ast, op, 0), true)?;
        let (index_ops, index) = self.translate_expr(ast::region_only_op(self.ast, op, 1), true)?;
        ops.extend(index_ops);

        let value_ty = self.out.value_type(value);
        let address = if value_ty == types::str_type() {
            flat::index_string(&mut self.out, value, index)
        } else if let Some(elem) = value_ty.list_elem() {
            let elem = elem.clone();
            flat::get_address(&mut self.out, value, index, elem)
        } else {
            return Err(CompileError::semantic(format!(
                "Cannot index into a value of type `{}`",
                value_ty
            )));
        };
        let result = self.out.result(address, 0);
        ops.push(address);
        Ok((ops, result))
    }

    fn translate_call_expr(&mut self, op: OpId) -> Result<(Vec<OpId>, ValueId), CompileError> {
        let (mut ops, args) = self.translate_call_args(op)?;
        let name = self.str_attr(op, "func");
        let result_type = self
            .ast
            .attr(op, "type_hint")
            .ok_or_else(|| CompileError::semantic("call expression lacks a type hint"))?;
        let call = flat::call_expr(&mut self.out, &name, &args, Some(result_type));
        let result = self.out.result(call, 0);
        ops.push(call);
        Ok((ops, result))
    }

    /// A call in statement position produces no SSA result.
    fn translate_call_stmt(&mut self, op: OpId) -> Result<Vec<OpId>, CompileError> {
        let (mut ops, args) = self.translate_call_args(op)?;
        let name = self.str_attr(op, "func");
        let call = flat::call_expr(&mut self.out, &name, &args, None);
        ops.push(call);
        Ok(ops)
    }

    fn translate_call_args(&mut self, op: OpId) -> Result<(Vec<OpId>, Vec<ValueId>), CompileError> {
        let mut ops = Vec::new();
        let mut args = Vec::new();
        for arg in ast::region_ops(self.ast, op, 0) {
            let (arg_ops, value) = self.translate_expr(arg, true)?;
            ops.extend(arg_ops);
            args.push(value);
        }
        Ok((ops, args))
    }

    /// Targets of `a = b = ... = expr`, outermost first, plus the value.
    fn split_multi_assign(&self, assign: OpId) -> (Vec<OpId>, OpId) {
        let mut targets = vec![ast::region_only_op(self.ast, assign, 0)];
        let mut value = ast::region_only_op(self.ast, assign, 1);
        while ast::ast_kind(self.ast, value) == Some(AstOp::Assign) {
            targets.push(ast::region_only_op(self.ast, value, 0));
            value = ast::region_only_op(self.ast, value, 1);
        }
        (targets, value)
    }

    fn translate_assign(&mut self, assign: OpId) -> Result<Vec<OpId>, CompileError> {
        let (targets, value) = self.split_multi_assign(assign);
        let (mut ops, value) = self.translate_expr(value, true)?;
        for target in targets {
            let (target_ops, target_value) = self.translate_expr(target, false)?;
            debug_assert!(self.out.value_type(target_value).is_memloc());
            ops.extend(target_ops);
            let store = flat::store(&mut self.out, target_value, value);
            ops.push(store);
        }
        Ok(ops)
    }

    fn translate_return(&mut self, ret: OpId) -> Result<Vec<OpId>, CompileError> {
        let values = ast::region_ops(self.ast, ret, 0);
        let (mut ops, value) = match values.first() {
            Some(value) => self.translate_expr(*value, true)?,
            None => {
                let none = flat::literal(&mut self.out, Attribute::NoneLit);
                let result = self.out.result(none, 0);
                (vec![none], result)
            }
        };
        let ret = flat::return_stmt(&mut self.out, value);
        ops.push(ret);
        Ok(ops)
    }

    fn translate_if(&mut self, if_stmt: OpId) -> Result<Vec<OpId>, CompileError> {
        let (mut ops, cond) = self.translate_expr(ast::region_only_op(self.ast, if_stmt, 0), true)?;
        let mut then_ops = Vec::new();
        for stmt in ast::region_ops(self.ast, if_stmt, 1) {
            then_ops.extend(self.translate_stmt(stmt)?);
        }
        let mut else_ops = Vec::new();
        for stmt in ast::region_ops(self.ast, if_stmt, 2) {
            else_ops.extend(self.translate_stmt(stmt)?);
        }
        let then_region = self.out.region_from_ops(then_ops);
        let else_region = self.out.region_from_ops(else_ops);
        let new_op = flat::if_stmt(&mut self.out, cond, then_region, else_region);
        ops.push(new_op);
        Ok(ops)
    }

    fn translate_while(&mut self, while_stmt: OpId) -> Result<Vec<OpId>, CompileError> {
        let (mut cond_ops, cond) =
            self.translate_expr(ast::region_only_op(self.ast, while_stmt, 0), true)?;
        let cond_yield = flat::yield_value(&mut self.out, cond);
        cond_ops.push(cond_yield);
        let cond_region = self.out.region_from_ops(cond_ops);

        let mut body_ops = Vec::new();
        for stmt in ast::region_ops(self.ast, while_stmt, 1) {
            body_ops.extend(self.translate_stmt(stmt)?);
        }
        let body_region = self.out.region_from_ops(body_ops);

        Ok(vec![flat::while_stmt(&mut self.out, cond_region, body_region)])
    }

    fn translate_for(&mut self, for_stmt: OpId) -> Result<Vec<OpId>, CompileError> {
        let (mut ops, iterable) =
            self.translate_expr(ast::region_only_op(self.ast, for_stmt, 0), true)?;
        let iter_name = self.str_attr(for_stmt, "iter_name");
        let iterator = self.lookup(&iter_name).ok_or_else(|| {
            CompileError::semantic(format!("Unknown identifier `{}`", iter_name))
        })?;

        let mut body_ops = Vec::new();
        for stmt in ast::region_ops(self.ast, for_stmt, 1) {
            body_ops.extend(self.translate_stmt(stmt)?);
        }
        let body_region = self.out.region_from_ops(body_ops);

        ops.push(flat::for_stmt(&mut self.out, iterator, iterable, body_region));
        Ok(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::flat::{FlatOp, flat_kind};
    use crate::dialects::verify_module;
    use crate::parser::parse_program;
    use crate::typechecker::type_check;

    fn lower(source: &str) -> Module {
        let mut m = parse_program(source).unwrap();
        type_check(&mut m).unwrap();
        let flat = ast_to_flat(&m).unwrap();
        verify_module(&flat).unwrap();
        flat
    }

    fn kinds_of(m: &Module) -> Vec<FlatOp> {
        m.walk().iter().filter_map(|op| flat_kind(m, *op)).collect()
    }

    fn count(m: &Module, kind: FlatOp) -> usize {
        kinds_of(m).into_iter().filter(|k| *k == kind).count()
    }

    #[test]
    fn test_program_wrapped_in_main() {
        let m = lower("print(1)\n");
        let top_ops = m.block_ops(m.top_block());
        assert_eq!(top_ops.len(), 1);
        assert_eq!(flat_kind(&m, top_ops[0]), Some(FlatOp::FuncDef));
        assert_eq!(
            m.attr(top_ops[0], "func_name"),
            Some(Attribute::Str("_main".to_string()))
        );
        assert_eq!(m.attr(top_ops[0], "return_type"), Some(types::none_type()));
    }

    #[test]
    fn test_var_def_allocates_and_stores() {
        let m = lower("x: int = 5\nprint(x)\n");
        assert_eq!(count(&m, FlatOp::Alloc), 1);
        assert_eq!(count(&m, FlatOp::Store), 1);
        // The read of `x` inserts a load.
        assert_eq!(count(&m, FlatOp::Load), 1);
    }

    #[test]
    fn test_multi_assign_shares_one_value() {
        let m = lower("a: int = 0\nb: int = 0\na = b = 7\n");
        // One literal for each var-def initializer plus exactly one for
        // the multi-assign value.
        assert_eq!(count(&m, FlatOp::Literal), 3);
        // Two stores from the var-defs plus two from the multi-assign.
        assert_eq!(count(&m, FlatOp::Store), 4);
    }

    #[test]
    fn test_short_circuit_keeps_rhs_in_region() {
        let m = lower(
            "def noisy() -> bool:\n    print(1)\n    return True\nx: bool = True\nprint(x or noisy())\n",
        );
        let effectful = m
            .walk()
            .into_iter()
            .find(|op| flat_kind(&m, *op) == Some(FlatOp::EffectfulBinaryExpr))
            .expect("expected an effectful binary expr");
        assert_eq!(
            m.attr(effectful, "op"),
            Some(Attribute::Str("or".to_string()))
        );
        // Both regions end in a yield, and the call lives in the rhs region.
        let rhs_block = m.region_block(m.region(effectful, 1));
        let rhs_ops = m.block_ops(rhs_block);
        assert!(rhs_ops.iter().any(|op| flat_kind(&m, *op) == Some(FlatOp::CallExpr)));
        assert_eq!(
            flat_kind(&m, *rhs_ops.last().unwrap()),
            Some(FlatOp::Yield)
        );
    }

    #[test]
    fn test_parameters_get_memlocs() {
        let m = lower("def id(a: int) -> int:\n    return a\nprint(id(3))\n");
        let funcs: Vec<OpId> = m
            .walk()
            .into_iter()
            .filter(|op| flat_kind(&m, *op) == Some(FlatOp::FuncDef))
            .collect();
        // _main plus id.
        assert_eq!(funcs.len(), 2);
        let id_fn = funcs
            .iter()
            .find(|f| m.attr(**f, "func_name") == Some(Attribute::Str("id".to_string())))
            .unwrap();
        let entry = m.region_block(m.region(*id_fn, 0));
        let ops = m.block_ops(entry);
        assert_eq!(flat_kind(&m, ops[0]), Some(FlatOp::Alloc));
        assert_eq!(flat_kind(&m, ops[1]), Some(FlatOp::Store));
        // The store writes the incoming block argument into the slot.
        let arg = m.block_args(entry)[0];
        assert_eq!(m.operand(ops[1], 1), arg);
    }

    #[test]
    fn test_string_index_uses_index_string() {
        let m = lower("s: str = \"hi\"\nprint(s[0])\n");
        assert_eq!(count(&m, FlatOp::IndexString), 1);
        assert_eq!(count(&m, FlatOp::GetAddress), 0);
    }

    #[test]
    fn test_list_index_uses_get_address() {
        let m = lower("xs: [int] = None\nxs = [1, 2]\nprint(xs[1])\n");
        assert_eq!(count(&m, FlatOp::GetAddress), 1);
    }

    #[test]
    fn test_mixed_list_concat_widens() {
        let m = lower("xs: [object] = None\nxs = [1] + [True]\n");
        let binary = m
            .walk()
            .into_iter()
            .find(|op| flat_kind(&m, *op) == Some(FlatOp::BinaryExpr))
            .unwrap();
        assert_eq!(
            m.value_type(m.result(binary, 0)),
            Attribute::list_of(types::object_type())
        );
    }

    #[test]
    fn test_if_expr_result_is_join() {
        let m = lower("x: object = None\nx = [1] if True else \"s\"\n");
        let if_expr = m
            .walk()
            .into_iter()
            .find(|op| flat_kind(&m, *op) == Some(FlatOp::IfExpr))
            .unwrap();
        assert_eq!(m.value_type(m.result(if_expr, 0)), types::object_type());
    }

    #[test]
    fn test_for_carries_iterator_memloc() {
        let m = lower("x: int = 0\nxs: [int] = None\nfor x in xs:\n    print(x)\n");
        let for_op = m
            .walk()
            .into_iter()
            .find(|op| flat_kind(&m, *op) == Some(FlatOp::For))
            .unwrap();
        let iterator = m.operand(for_op, 0);
        assert_eq!(
            m.value_type(iterator),
            Attribute::memloc_of(types::int_type())
        );
        let iterable = m.operand(for_op, 1);
        assert_eq!(m.value_type(iterable), Attribute::list_of(types::int_type()));
    }

    #[test]
    fn test_bare_return_yields_none() {
        let m = lower("def f():\n    return\nf()\n");
        let ret = m
            .walk()
            .into_iter()
            .find(|op| flat_kind(&m, *op) == Some(FlatOp::Return))
            .unwrap();
        assert_eq!(m.value_type(m.operand(ret, 0)), types::none_type());
    }
}
