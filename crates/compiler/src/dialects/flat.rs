//! The flat SSA IR.
//!
//! Every expression is an SSA value; variables live behind explicit
//! `memloc` values produced by `alloc`, `get_address`, or `index_string`
//! and accessed through `load`/`store`. Control flow keeps the structured
//! region form (`if`, `while`, `for`, short-circuit `effectful_binary_expr`)
//! so the flat transforms stay simple.

use crate::dialects::types;
use crate::dialects::OpKind;
use crate::ir::{Attribute, Module, OpId, RegionId, ValueId, VerifyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlatOp {
    /// Attrs `func_name`, `return_type`; one body region whose block
    /// arguments are the parameters.
    FuncDef,
    /// Operand: bool condition; regions: then, orelse.
    If,
    /// Regions: condition (terminated by `yield` of a bool), body.
    While,
    /// Operands: iterator memloc, iterable value; region: body.
    For,
    Pass,
    /// Operand: returned value.
    Return,
    /// Operand: value produced for the enclosing region.
    Yield,
    /// Attr `value`; one typed result.
    Literal,
    /// Attr `op`; operand and result of the same type.
    UnaryExpr,
    /// Attr `op`; two operands, one result.
    BinaryExpr,
    /// Attr `op` (`and`/`or`); regions: lhs, rhs, each yielding its value.
    EffectfulBinaryExpr,
    /// Operand: bool condition; regions: then, orelse, each yielding.
    IfExpr,
    /// Variadic element operands; result `list<join>` or `<Empty>`.
    ListExpr,
    /// Attr `func_name`; variadic argument operands; optional result.
    CallExpr,
    /// Attr `type`; result `memloc<type>` backed by function-frame storage.
    Alloc,
    /// Operands: list value, int index; result `memloc<elem>`.
    GetAddress,
    /// Operands: str value, int index; result `memloc<str>`.
    IndexString,
    /// Operand: `memloc<T>`; result `T`.
    Load,
    /// Operands: `memloc<T>`, value assignable to `T`.
    Store,
}

impl FlatOp {
    pub fn short_name(&self) -> &'static str {
        match self {
            FlatOp::FuncDef => "func_def",
            FlatOp::If => "if",
            FlatOp::While => "while",
            FlatOp::For => "for",
            FlatOp::Pass => "pass",
            FlatOp::Return => "return",
            FlatOp::Yield => "yield",
            FlatOp::Literal => "literal",
            FlatOp::UnaryExpr => "unary_expr",
            FlatOp::BinaryExpr => "binary_expr",
            FlatOp::EffectfulBinaryExpr => "effectful_binary_expr",
            FlatOp::IfExpr => "if_expr",
            FlatOp::ListExpr => "list_expr",
            FlatOp::CallExpr => "call_expr",
            FlatOp::Alloc => "alloc",
            FlatOp::GetAddress => "get_address",
            FlatOp::IndexString => "index_string",
            FlatOp::Load => "load",
            FlatOp::Store => "store",
        }
    }
}

/// The kind of a flat op, if `op` is one.
pub fn flat_kind(m: &Module, op: OpId) -> Option<FlatOp> {
    match m.kind(op) {
        OpKind::Flat(kind) => Some(kind),
        _ => None,
    }
}

// Builders.

/// Build a `literal`, typing the result from the payload.
pub fn literal(m: &mut Module, value: Attribute) -> OpId {
    let ty = match &value {
        Attribute::Int(_) => types::int_type(),
        Attribute::Bool(_) => types::bool_type(),
        Attribute::Str(_) => types::str_type(),
        Attribute::NoneLit => types::none_type(),
        other => panic!("not a literal attribute: {}", other),
    };
    m.create_op(
        OpKind::Flat(FlatOp::Literal),
        &[],
        vec![ty],
        vec![("value", value)],
        vec![],
    )
}

pub fn unary_expr(m: &mut Module, op: &str, value: ValueId) -> OpId {
    let ty = m.value_type(value);
    m.create_op(
        OpKind::Flat(FlatOp::UnaryExpr),
        &[value],
        vec![ty],
        vec![("op", Attribute::Str(op.to_string()))],
        vec![],
    )
}

pub fn binary_expr(
    m: &mut Module,
    op: &str,
    lhs: ValueId,
    rhs: ValueId,
    result_type: Attribute,
) -> OpId {
    m.create_op(
        OpKind::Flat(FlatOp::BinaryExpr),
        &[lhs, rhs],
        vec![result_type],
        vec![("op", Attribute::Str(op.to_string()))],
        vec![],
    )
}

pub fn effectful_binary_expr(
    m: &mut Module,
    op: &str,
    lhs: RegionId,
    rhs: RegionId,
    result_type: Attribute,
) -> OpId {
    m.create_op(
        OpKind::Flat(FlatOp::EffectfulBinaryExpr),
        &[],
        vec![result_type],
        vec![("op", Attribute::Str(op.to_string()))],
        vec![lhs, rhs],
    )
}

pub fn if_expr(
    m: &mut Module,
    cond: ValueId,
    then: RegionId,
    or_else: RegionId,
    result_type: Attribute,
) -> OpId {
    m.create_op(
        OpKind::Flat(FlatOp::IfExpr),
        &[cond],
        vec![result_type],
        vec![],
        vec![then, or_else],
    )
}

pub fn if_stmt(m: &mut Module, cond: ValueId, then: RegionId, orelse: RegionId) -> OpId {
    m.create_op(
        OpKind::Flat(FlatOp::If),
        &[cond],
        vec![],
        vec![],
        vec![then, orelse],
    )
}

pub fn while_stmt(m: &mut Module, cond: RegionId, body: RegionId) -> OpId {
    m.create_op(OpKind::Flat(FlatOp::While), &[], vec![], vec![], vec![cond, body])
}

pub fn for_stmt(m: &mut Module, iterator: ValueId, iterable: ValueId, body: RegionId) -> OpId {
    m.create_op(
        OpKind::Flat(FlatOp::For),
        &[iterator, iterable],
        vec![],
        vec![],
        vec![body],
    )
}

pub fn list_expr(m: &mut Module, elems: &[ValueId], result_type: Attribute) -> OpId {
    m.create_op(
        OpKind::Flat(FlatOp::ListExpr),
        elems,
        vec![result_type],
        vec![],
        vec![],
    )
}

pub fn call_expr(
    m: &mut Module,
    func_name: &str,
    args: &[ValueId],
    result_type: Option<Attribute>,
) -> OpId {
    m.create_op(
        OpKind::Flat(FlatOp::CallExpr),
        args,
        result_type.into_iter().collect(),
        vec![("func_name", Attribute::Str(func_name.to_string()))],
        vec![],
    )
}

pub fn alloc(m: &mut Module, ty: Attribute) -> OpId {
    m.create_op(
        OpKind::Flat(FlatOp::Alloc),
        &[],
        vec![Attribute::memloc_of(ty.clone())],
        vec![("type", ty)],
        vec![],
    )
}

pub fn get_address(m: &mut Module, value: ValueId, index: ValueId, elem: Attribute) -> OpId {
    m.create_op(
        OpKind::Flat(FlatOp::GetAddress),
        &[value, index],
        vec![Attribute::memloc_of(elem)],
        vec![],
        vec![],
    )
}

pub fn index_string(m: &mut Module, value: ValueId, index: ValueId) -> OpId {
    m.create_op(
        OpKind::Flat(FlatOp::IndexString),
        &[value, index],
        vec![Attribute::memloc_of(types::str_type())],
        vec![],
        vec![],
    )
}

pub fn load(m: &mut Module, memloc: ValueId) -> OpId {
    let inner = m
        .value_type(memloc)
        .memloc_inner()
        .expect("load expects a memloc operand")
        .clone();
    m.create_op(OpKind::Flat(FlatOp::Load), &[memloc], vec![inner], vec![], vec![])
}

pub fn store(m: &mut Module, memloc: ValueId, value: ValueId) -> OpId {
    m.create_op(
        OpKind::Flat(FlatOp::Store),
        &[memloc, value],
        vec![],
        vec![],
        vec![],
    )
}

pub fn return_stmt(m: &mut Module, value: ValueId) -> OpId {
    m.create_op(OpKind::Flat(FlatOp::Return), &[value], vec![], vec![], vec![])
}

pub fn yield_value(m: &mut Module, value: ValueId) -> OpId {
    m.create_op(OpKind::Flat(FlatOp::Yield), &[value], vec![], vec![], vec![])
}

pub fn func_def(m: &mut Module, name: &str, return_type: Attribute, body: RegionId) -> OpId {
    m.create_op(
        OpKind::Flat(FlatOp::FuncDef),
        &[],
        vec![],
        vec![
            ("func_name", Attribute::Str(name.to_string())),
            ("return_type", return_type),
        ],
        vec![body],
    )
}

/// The value yielded by the terminator of a region's block.
pub fn yielded_value(m: &Module, region: RegionId) -> Option<ValueId> {
    let ops = m.block_ops(m.region_block(region));
    let last = *ops.last()?;
    if flat_kind(m, last) == Some(FlatOp::Yield) {
        Some(m.operand(last, 0))
    } else {
        None
    }
}

pub fn verify(m: &Module, op: OpId, kind: FlatOp) -> Result<(), VerifyError> {
    // Memory locations never escape: only load, store, and for may
    // consume a memloc value.
    if !matches!(kind, FlatOp::Load | FlatOp::Store | FlatOp::For) {
        for operand in m.operands(op) {
            if m.value_type(operand).is_memloc() {
                return Err(VerifyError::new(format!(
                    "{} may not take a memloc operand",
                    kind.short_name()
                )));
            }
        }
    }
    let ends_in_yield = |index: usize| -> Result<(), VerifyError> {
        if yielded_value(m, m.region(op, index)).is_none() {
            return Err(VerifyError::new(format!(
                "{} expects the last operation of region {} to be a yield",
                kind.short_name(),
                index
            )));
        }
        Ok(())
    };
    match kind {
        FlatOp::Alloc => {
            let declared = m.attr(op, "type");
            let inner = m.value_type(m.result(op, 0)).memloc_inner().cloned();
            if declared != inner {
                return Err(VerifyError::new("alloc expects its type to match its memloc"));
            }
        }
        FlatOp::Load => {
            let memloc_ty = m.value_type(m.operand(op, 0));
            let Some(inner) = memloc_ty.memloc_inner() else {
                return Err(VerifyError::new("load expects a memloc operand"));
            };
            let result_ty = m.value_type(m.result(op, 0));
            if *inner != result_ty {
                return Err(VerifyError::new(format!(
                    "Mismatched operand types! Should the first operand be of type !memloc<{}>?",
                    result_ty
                )));
            }
        }
        FlatOp::Store => {
            let memloc_ty = m.value_type(m.operand(op, 0));
            let Some(inner) = memloc_ty.memloc_inner() else {
                return Err(VerifyError::new("store expects a memloc operand"));
            };
            let value_ty = m.value_type(m.operand(op, 1));
            if !types::is_assignable(&value_ty, inner) {
                return Err(VerifyError::new(format!(
                    "Mismatched operand types! Should the first operand be of type !memloc<{}>?",
                    value_ty
                )));
            }
        }
        FlatOp::GetAddress | FlatOp::IndexString => {
            let value_ty = m.value_type(m.operand(op, 0));
            let inner = m
                .value_type(m.result(op, 0))
                .memloc_inner()
                .cloned()
                .ok_or_else(|| VerifyError::new("indexing expects a memloc result"))?;
            if let Some(elem) = value_ty.list_elem() {
                if *elem != inner {
                    return Err(VerifyError::new("expected types to match"));
                }
            } else if value_ty == types::str_type() {
                if inner != types::str_type() {
                    return Err(VerifyError::new("expected types to match"));
                }
            } else {
                return Err(VerifyError::new("expected list or str type"));
            }
            if m.value_type(m.operand(op, 1)) != types::int_type() {
                return Err(VerifyError::new("index must be an int"));
            }
        }
        FlatOp::While => {
            let cond = m.region(op, 0);
            let Some(value) = yielded_value(m, cond) else {
                return Err(VerifyError::new(
                    "while expects the last operation in its condition to be a yield",
                ));
            };
            if m.value_type(value) != types::bool_type() {
                return Err(VerifyError::new(
                    "while expects its condition to yield a bool",
                ));
            }
        }
        FlatOp::IfExpr | FlatOp::EffectfulBinaryExpr => {
            ends_in_yield(0)?;
            ends_in_yield(1)?;
        }
        FlatOp::If => {
            if m.value_type(m.operand(op, 0)) != types::bool_type() {
                return Err(VerifyError::new("if expects a bool condition"));
            }
        }
        FlatOp::For => {
            if m.value_type(m.operand(op, 0)).memloc_inner().is_none() {
                return Err(VerifyError::new("for expects a memloc iterator"));
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::verify_module;

    #[test]
    fn test_load_type_must_match_memloc() {
        let mut m = Module::new();
        let top = m.top_block();
        let a = alloc(&mut m, types::int_type());
        let a_res = m.result(a, 0);
        let l = load(&mut m, a_res);
        m.append_ops(top, &[a, l]);
        verify_module(&m).unwrap();
        assert_eq!(m.value_type(m.result(l, 0)), types::int_type());
    }

    #[test]
    fn test_store_rejects_type_mismatch() {
        let mut m = Module::new();
        let top = m.top_block();
        let a = alloc(&mut m, types::int_type());
        let v = literal(&mut m, Attribute::Bool(true));
        let a_res = m.result(a, 0);
        let v_res = m.result(v, 0);
        let s = store(&mut m, a_res, v_res);
        m.append_ops(top, &[a, v, s]);
        assert!(verify_module(&m).is_err());
    }

    #[test]
    fn test_store_accepts_none_into_list() {
        let mut m = Module::new();
        let top = m.top_block();
        let a = alloc(&mut m, Attribute::list_of(types::int_type()));
        let v = literal(&mut m, Attribute::NoneLit);
        let a_res = m.result(a, 0);
        let v_res = m.result(v, 0);
        let s = store(&mut m, a_res, v_res);
        m.append_ops(top, &[a, v, s]);
        verify_module(&m).unwrap();
    }

    #[test]
    fn test_store_accepts_anything_into_object() {
        let mut m = Module::new();
        let top = m.top_block();
        let a = alloc(&mut m, types::object_type());
        let v = literal(&mut m, Attribute::Int(3));
        let a_res = m.result(a, 0);
        let v_res = m.result(v, 0);
        let s = store(&mut m, a_res, v_res);
        m.append_ops(top, &[a, v, s]);
        verify_module(&m).unwrap();
    }

    #[test]
    fn test_while_requires_bool_yield() {
        let mut m = Module::new();
        let top = m.top_block();
        let c = literal(&mut m, Attribute::Int(1));
        let c_res = m.result(c, 0);
        let y = yield_value(&mut m, c_res);
        let cond = m.region_from_ops(vec![c, y]);
        let body = m.region_from_ops(vec![]);
        let w = while_stmt(&mut m, cond, body);
        m.append_op(top, w);
        assert!(verify_module(&m).is_err());
    }

    #[test]
    fn test_memlocs_do_not_escape() {
        let mut m = Module::new();
        let top = m.top_block();
        let a = alloc(&mut m, types::int_type());
        let a_res = m.result(a, 0);
        let call = call_expr(&mut m, "f", &[a_res], None);
        m.append_ops(top, &[a, call]);
        assert!(verify_module(&m).is_err());
    }

    #[test]
    fn test_get_address_types() {
        let mut m = Module::new();
        let top = m.top_block();
        let a = alloc(&mut m, Attribute::list_of(types::int_type()));
        let a_res = m.result(a, 0);
        let xs = load(&mut m, a_res);
        let i = literal(&mut m, Attribute::Int(0));
        let xs_res = m.result(xs, 0);
        let i_res = m.result(i, 0);
        let addr = get_address(&mut m, xs_res, i_res, types::int_type());
        m.append_ops(top, &[a, xs, i, addr]);
        verify_module(&m).unwrap();

        let xs_res2 = m.result(xs, 0);
        let i_res2 = m.result(i, 0);
        let bad = get_address(&mut m, xs_res2, i_res2, types::bool_type());
        m.append_op(top, bad);
        assert!(verify_module(&m).is_err());
    }
}
