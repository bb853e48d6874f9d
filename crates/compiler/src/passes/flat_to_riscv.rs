//! Flat→RISC-V SSA lowering.
//!
//! Expands every flat operation into a sequence over virtual registers.
//! Structured control flow flattens into labels and branches; values
//! produced on both arms of a conditional go through a stack slot
//! (`riscv_ssa.alloc`) rather than a phi, which costs nothing under the
//! spill-everything allocator.
//!
//! Heap objects (lists, strings) are `[length : word][elements : word[]]`
//! with strings one character per word; `_malloc` bump-allocates them.
//! `len` lowers inline to a None check plus a length-word load.

use std::collections::HashMap;

use crate::dialects::flat::{FlatOp, flat_kind};
use crate::dialects::riscv::{RvOp, ssa};
use crate::error::CompileError;
use crate::ir::{Attribute, BlockId, Module, OpId, RegionId, ValueId, VerifyError};

/// Lower a flat module (a single `_main` with nested functions) into a
/// module of `riscv_ssa.func` operations.
pub fn flat_to_riscv_ssa(flat: &Module) -> Result<Module, CompileError> {
    let top_ops = flat.block_ops(flat.top_block());
    let main = *top_ops
        .first()
        .ok_or_else(|| CompileError::Verify(VerifyError::new("empty flat module")))?;
    if flat_kind(flat, main) != Some(FlatOp::FuncDef) {
        return Err(CompileError::Verify(VerifyError::new(
            "expected a _main function at the top level",
        )));
    }
    let mut translator = Translator {
        flat,
        out: Module::new(),
        values: HashMap::new(),
        label_counter: 0,
    };
    let main_fn = translator.translate_func(main)?;
    let mut out = translator.out;
    let top = out.top_block();
    out.append_op(top, main_fn);
    Ok(out)
}

struct Translator<'a> {
    flat: &'a Module,
    out: Module,
    /// Flat SSA value → virtual register value.
    values: HashMap<ValueId, ValueId>,
    label_counter: usize,
}

impl Translator<'_> {
    fn fresh_label(&mut self, stem: &str) -> String {
        let n = self.label_counter;
        self.label_counter += 1;
        format!("_{}_{}", stem, n)
    }

    fn v(&self, flat_value: ValueId) -> Result<ValueId, CompileError> {
        self.values.get(&flat_value).copied().ok_or_else(|| {
            CompileError::Verify(VerifyError::new(
                "flat value has no virtual-register mapping",
            ))
        })
    }

    fn emit(&mut self, block: BlockId, op: OpId) -> OpId {
        self.out.append_op(block, op);
        op
    }

    /// `li 0`, for branch comparisons against zero.
    fn zero(&mut self, block: BlockId) -> ValueId {
        let z = ssa::li(&mut self.out, 0);
        self.emit(block, z);
        self.out.result(z, 0)
    }

    fn translate_func(&mut self, func: OpId) -> Result<OpId, CompileError> {
        let name = self
            .flat
            .attr(func, "func_name")
            .and_then(|a| a.as_str().map(String::from))
            .expect("func_def must carry a name");
        let flat_block = self.flat.region_block(self.flat.region(func, 0));
        let flat_args = self.flat.block_args(flat_block);
        let (region, block) = self
            .out
            .region_with_args(vec![Attribute::RegisterType; flat_args.len()]);
        for (flat_arg, out_arg) in flat_args.iter().zip(self.out.block_args(block)) {
            self.values.insert(*flat_arg, out_arg);
        }
        for op in self.flat.block_ops(flat_block) {
            self.translate_op(op, block)?;
        }
        Ok(ssa::func(&mut self.out, &name, region))
    }

    /// Translate the contents of a region into `block`, returning the
    /// mapped value of a trailing `yield` if the region has one.
    fn translate_region(
        &mut self,
        region: RegionId,
        block: BlockId,
    ) -> Result<Option<ValueId>, CompileError> {
        let ops = self.flat.block_ops(self.flat.region_block(region));
        for (index, op) in ops.iter().enumerate() {
            if index + 1 == ops.len() && flat_kind(self.flat, *op) == Some(FlatOp::Yield) {
                let value = self.v(self.flat.operand(*op, 0))?;
                return Ok(Some(value));
            }
            self.translate_op(*op, block)?;
        }
        Ok(None)
    }

    fn map_result(&mut self, flat_op: OpId, out_value: ValueId) {
        self.values.insert(self.flat.result(flat_op, 0), out_value);
    }

    fn translate_op(&mut self, op: OpId, block: BlockId) -> Result<(), CompileError> {
        let kind = flat_kind(self.flat, op).ok_or_else(|| {
            CompileError::Verify(VerifyError::new("non-flat operation in flat module"))
        })?;
        match kind {
            FlatOp::Literal => self.lower_literal(op, block),
            FlatOp::UnaryExpr => self.lower_unary(op, block),
            FlatOp::BinaryExpr => self.lower_binary(op, block),
            FlatOp::EffectfulBinaryExpr => self.lower_effectful_binary(op, block),
            FlatOp::IfExpr => self.lower_if_expr(op, block),
            FlatOp::If => self.lower_if(op, block),
            FlatOp::While => self.lower_while(op, block),
            FlatOp::ListExpr => self.lower_list_expr(op, block),
            FlatOp::CallExpr => self.lower_call(op, block),
            FlatOp::Alloc => {
                let slot = ssa::alloc(&mut self.out);
                self.emit(block, slot);
                let slot_value = self.out.result(slot, 0);
                self.map_result(op, slot_value);
                Ok(())
            }
            FlatOp::Load => {
                let loc = self.v(self.flat.operand(op, 0))?;
                let load = ssa::rri(&mut self.out, RvOp::Lw, loc, 0);
                self.emit(block, load);
                let loaded = self.out.result(load, 0);
                self.map_result(op, loaded);
                Ok(())
            }
            FlatOp::Store => {
                let loc = self.v(self.flat.operand(op, 0))?;
                let value = self.v(self.flat.operand(op, 1))?;
                let store = ssa::store(&mut self.out, RvOp::Sw, value, loc, 0);
                self.emit(block, store);
                Ok(())
            }
            FlatOp::GetAddress => self.lower_get_address(op, block),
            FlatOp::IndexString => self.lower_index_string(op, block),
            FlatOp::Return => {
                let value = self.v(self.flat.operand(op, 0))?;
                let ret = ssa::ret(&mut self.out, Some(value));
                self.emit(block, ret);
                Ok(())
            }
            FlatOp::FuncDef => {
                let nested = self.translate_func(op)?;
                self.emit(block, nested);
                Ok(())
            }
            FlatOp::Pass => Ok(()),
            FlatOp::For => Err(CompileError::Verify(VerifyError::new(
                "for loops must be expanded before RISC-V lowering",
            ))),
            FlatOp::Yield => Err(CompileError::Verify(VerifyError::new(
                "yield outside of a region terminator",
            ))),
        }
    }

    fn lower_literal(&mut self, op: OpId, block: BlockId) -> Result<(), CompileError> {
        let value = self
            .flat
            .attr(op, "value")
            .expect("literal must carry a value");
        match value {
            Attribute::Int(v) => {
                let li = ssa::li(&mut self.out, v);
                self.emit(block, li);
                let result = self.out.result(li, 0);
                self.map_result(op, result);
            }
            Attribute::Bool(b) => {
                let li = ssa::li(&mut self.out, if b { 1 } else { 0 });
                self.emit(block, li);
                let result = self.out.result(li, 0);
                self.map_result(op, result);
            }
            Attribute::NoneLit => {
                let li = ssa::li(&mut self.out, 0);
                self.emit(block, li);
                let result = self.out.result(li, 0);
                self.map_result(op, result);
            }
            Attribute::Str(s) => {
                let ptr = self.materialize_string(&s, block)?;
                self.map_result(op, ptr);
            }
            other => {
                return Err(CompileError::Verify(VerifyError::new(format!(
                    "unexpected literal payload {}",
                    other
                ))));
            }
        }
        Ok(())
    }

    /// Allocate a `[len][chars...]` string object on the heap, one
    /// character per word.
    fn materialize_string(&mut self, s: &str, block: BlockId) -> Result<ValueId, CompileError> {
        let chars: Vec<char> = s.chars().collect();
        let size = ssa::li(&mut self.out, (chars.len() as i32 + 1) * 4);
        self.emit(block, size);
        let size_value = self.out.result(size, 0);
        let malloc = ssa::call(&mut self.out, "_malloc", &[size_value], true);
        self.emit(block, malloc);
        let ptr = self.out.result(malloc, 0);

        let len = ssa::li(&mut self.out, chars.len() as i32);
        self.emit(block, len);
        let len_value = self.out.result(len, 0);
        let store_len = ssa::store(&mut self.out, RvOp::Sw, len_value, ptr, 0);
        self.emit(block, store_len);

        for (index, c) in chars.iter().enumerate() {
            let ch = ssa::li(&mut self.out, *c as i32);
            self.emit(block, ch);
            let ch_value = self.out.result(ch, 0);
            let store = ssa::store(
                &mut self.out,
                RvOp::Sw,
                ch_value,
                ptr,
                (index as i32 + 1) * 4,
            );
            self.emit(block, store);
        }
        Ok(ptr)
    }

    fn lower_unary(&mut self, op: OpId, block: BlockId) -> Result<(), CompileError> {
        let operator = self
            .flat
            .attr(op, "op")
            .and_then(|a| a.as_str().map(String::from))
            .unwrap_or_default();
        let value = self.v(self.flat.operand(op, 0))?;
        let result = match operator.as_str() {
            "-" => {
                let zero = self.zero(block);
                let sub = ssa::rrr(&mut self.out, RvOp::Sub, zero, value);
                self.emit(block, sub);
                self.out.result(sub, 0)
            }
            "not" => {
                let flip = ssa::rri(&mut self.out, RvOp::Sltiu, value, 1);
                self.emit(block, flip);
                self.out.result(flip, 0)
            }
            other => {
                return Err(CompileError::Verify(VerifyError::new(format!(
                    "unknown unary operator `{}`",
                    other
                ))));
            }
        };
        self.map_result(op, result);
        Ok(())
    }

    fn lower_binary(&mut self, op: OpId, block: BlockId) -> Result<(), CompileError> {
        let operator = self
            .flat
            .attr(op, "op")
            .and_then(|a| a.as_str().map(String::from))
            .unwrap_or_default();
        let lhs = self.v(self.flat.operand(op, 0))?;
        let rhs = self.v(self.flat.operand(op, 1))?;

        let mut rrr = |t: &mut Self, opcode: RvOp, a: ValueId, b: ValueId| {
            let inst = ssa::rrr(&mut t.out, opcode, a, b);
            t.emit(block, inst);
            t.out.result(inst, 0)
        };

        let result = match operator.as_str() {
            "+" => rrr(self, RvOp::Add, lhs, rhs),
            "-" => rrr(self, RvOp::Sub, lhs, rhs),
            "*" => rrr(self, RvOp::Mul, lhs, rhs),
            "//" | "%" => {
                let zero = self.zero(block);
                let guard = ssa::branch(&mut self.out, RvOp::Beq, rhs, zero, "_error_div_zero");
                self.emit(block, guard);
                let opcode = if operator == "//" { RvOp::Div } else { RvOp::Rem };
                rrr(self, opcode, lhs, rhs)
            }
            "<" => rrr(self, RvOp::Slt, lhs, rhs),
            ">" => rrr(self, RvOp::Slt, rhs, lhs),
            "<=" => {
                let gt = rrr(self, RvOp::Slt, rhs, lhs);
                let flip = ssa::rri(&mut self.out, RvOp::Xori, gt, 1);
                self.emit(block, flip);
                self.out.result(flip, 0)
            }
            ">=" => {
                let lt = rrr(self, RvOp::Slt, lhs, rhs);
                let flip = ssa::rri(&mut self.out, RvOp::Xori, lt, 1);
                self.emit(block, flip);
                self.out.result(flip, 0)
            }
            "==" | "is" => {
                let diff = rrr(self, RvOp::Xor, lhs, rhs);
                let eq = ssa::rri(&mut self.out, RvOp::Sltiu, diff, 1);
                self.emit(block, eq);
                self.out.result(eq, 0)
            }
            "!=" => {
                let diff = rrr(self, RvOp::Xor, lhs, rhs);
                let zero = self.zero(block);
                rrr(self, RvOp::Sltu, zero, diff)
            }
            other => {
                return Err(CompileError::Verify(VerifyError::new(format!(
                    "unknown binary operator `{}`",
                    other
                ))));
            }
        };
        self.map_result(op, result);
        Ok(())
    }

    fn lower_effectful_binary(&mut self, op: OpId, block: BlockId) -> Result<(), CompileError> {
        let operator = self
            .flat
            .attr(op, "op")
            .and_then(|a| a.as_str().map(String::from))
            .unwrap_or_default();
        let end = self.fresh_label(if operator == "or" { "or_end" } else { "and_end" });

        let slot = ssa::alloc(&mut self.out);
        self.emit(block, slot);
        let slot_value = self.out.result(slot, 0);

        let lhs = self
            .translate_region(self.flat.region(op, 0), block)?
            .ok_or_else(|| CompileError::Verify(VerifyError::new("missing lhs yield")))?;
        let store_lhs = ssa::store(&mut self.out, RvOp::Sw, lhs, slot_value, 0);
        self.emit(block, store_lhs);
        let zero = self.zero(block);
        // `or` short-circuits on true, `and` on false.
        let branch_op = if operator == "or" { RvOp::Bne } else { RvOp::Beq };
        let skip = ssa::branch(&mut self.out, branch_op, lhs, zero, &end);
        self.emit(block, skip);

        let rhs = self
            .translate_region(self.flat.region(op, 1), block)?
            .ok_or_else(|| CompileError::Verify(VerifyError::new("missing rhs yield")))?;
        let store_rhs = ssa::store(&mut self.out, RvOp::Sw, rhs, slot_value, 0);
        self.emit(block, store_rhs);

        let end_label = ssa::label(&mut self.out, &end);
        self.emit(block, end_label);
        let load = ssa::rri(&mut self.out, RvOp::Lw, slot_value, 0);
        self.emit(block, load);
        let result = self.out.result(load, 0);
        self.map_result(op, result);
        Ok(())
    }

    fn lower_if_expr(&mut self, op: OpId, block: BlockId) -> Result<(), CompileError> {
        let else_label = self.fresh_label("ifexpr_else");
        let end_label = self.fresh_label("ifexpr_end");

        let slot = ssa::alloc(&mut self.out);
        self.emit(block, slot);
        let slot_value = self.out.result(slot, 0);

        let cond = self.v(self.flat.operand(op, 0))?;
        let zero = self.zero(block);
        let to_else = ssa::branch(&mut self.out, RvOp::Beq, cond, zero, &else_label);
        self.emit(block, to_else);

        let then_value = self
            .translate_region(self.flat.region(op, 0), block)?
            .ok_or_else(|| CompileError::Verify(VerifyError::new("missing then yield")))?;
        let store_then = ssa::store(&mut self.out, RvOp::Sw, then_value, slot_value, 0);
        self.emit(block, store_then);
        let to_end = ssa::jump(&mut self.out, &end_label);
        self.emit(block, to_end);

        let else_l = ssa::label(&mut self.out, &else_label);
        self.emit(block, else_l);
        let else_value = self
            .translate_region(self.flat.region(op, 1), block)?
            .ok_or_else(|| CompileError::Verify(VerifyError::new("missing else yield")))?;
        let store_else = ssa::store(&mut self.out, RvOp::Sw, else_value, slot_value, 0);
        self.emit(block, store_else);

        let end_l = ssa::label(&mut self.out, &end_label);
        self.emit(block, end_l);
        let load = ssa::rri(&mut self.out, RvOp::Lw, slot_value, 0);
        self.emit(block, load);
        let result = self.out.result(load, 0);
        self.map_result(op, result);
        Ok(())
    }

    fn lower_if(&mut self, op: OpId, block: BlockId) -> Result<(), CompileError> {
        let else_label = self.fresh_label("if_else");
        let end_label = self.fresh_label("if_end");

        let cond = self.v(self.flat.operand(op, 0))?;
        let zero = self.zero(block);
        let to_else = ssa::branch(&mut self.out, RvOp::Beq, cond, zero, &else_label);
        self.emit(block, to_else);

        self.translate_region(self.flat.region(op, 0), block)?;
        let to_end = ssa::jump(&mut self.out, &end_label);
        self.emit(block, to_end);

        let else_l = ssa::label(&mut self.out, &else_label);
        self.emit(block, else_l);
        self.translate_region(self.flat.region(op, 1), block)?;

        let end_l = ssa::label(&mut self.out, &end_label);
        self.emit(block, end_l);
        Ok(())
    }

    fn lower_while(&mut self, op: OpId, block: BlockId) -> Result<(), CompileError> {
        let begin_label = self.fresh_label("while_begin");
        let end_label = self.fresh_label("while_end");

        let begin = ssa::label(&mut self.out, &begin_label);
        self.emit(block, begin);
        let cond = self
            .translate_region(self.flat.region(op, 0), block)?
            .ok_or_else(|| CompileError::Verify(VerifyError::new("missing while condition yield")))?;
        let zero = self.zero(block);
        let to_end = ssa::branch(&mut self.out, RvOp::Beq, cond, zero, &end_label);
        self.emit(block, to_end);

        self.translate_region(self.flat.region(op, 1), block)?;
        let back = ssa::jump(&mut self.out, &begin_label);
        self.emit(block, back);

        let end = ssa::label(&mut self.out, &end_label);
        self.emit(block, end);
        Ok(())
    }

    fn lower_list_expr(&mut self, op: OpId, block: BlockId) -> Result<(), CompileError> {
        let elems: Vec<ValueId> = self
            .flat
            .operands(op)
            .iter()
            .map(|e| self.v(*e))
            .collect::<Result<_, _>>()?;
        let size = ssa::li(&mut self.out, (elems.len() as i32 + 1) * 4);
        self.emit(block, size);
        let size_value = self.out.result(size, 0);
        let malloc = ssa::call(&mut self.out, "_malloc", &[size_value], true);
        self.emit(block, malloc);
        let ptr = self.out.result(malloc, 0);

        let len = ssa::li(&mut self.out, elems.len() as i32);
        self.emit(block, len);
        let len_value = self.out.result(len, 0);
        let store_len = ssa::store(&mut self.out, RvOp::Sw, len_value, ptr, 0);
        self.emit(block, store_len);

        for (index, elem) in elems.iter().enumerate() {
            let store = ssa::store(&mut self.out, RvOp::Sw, *elem, ptr, (index as i32 + 1) * 4);
            self.emit(block, store);
        }
        self.map_result(op, ptr);
        Ok(())
    }

    fn lower_call(&mut self, op: OpId, block: BlockId) -> Result<(), CompileError> {
        let name = self
            .flat
            .attr(op, "func_name")
            .and_then(|a| a.as_str().map(String::from))
            .expect("call must carry a function name");
        let args: Vec<ValueId> = self
            .flat
            .operands(op)
            .iter()
            .map(|a| self.v(*a))
            .collect::<Result<_, _>>()?;

        if name == "len" {
            // Inline: None check, then the length word.
            let arg = args[0];
            let zero = self.zero(block);
            let guard = ssa::branch(&mut self.out, RvOp::Beq, arg, zero, "_error_len_none");
            self.emit(block, guard);
            let load = ssa::rri(&mut self.out, RvOp::Lw, arg, 0);
            self.emit(block, load);
            let result = self.out.result(load, 0);
            if self.flat.num_results(op) > 0 {
                self.map_result(op, result);
            }
            return Ok(());
        }

        let has_result = self.flat.num_results(op) > 0;
        let call = ssa::call(&mut self.out, &name, &args, has_result);
        self.emit(block, call);
        if has_result {
            let result = self.out.result(call, 0);
            self.map_result(op, result);
        }
        Ok(())
    }

    fn lower_get_address(&mut self, op: OpId, block: BlockId) -> Result<(), CompileError> {
        let list = self.v(self.flat.operand(op, 0))?;
        let index = self.v(self.flat.operand(op, 1))?;

        let zero = self.zero(block);
        let none_guard = ssa::branch(&mut self.out, RvOp::Beq, list, zero, "_list_index_none");
        self.emit(block, none_guard);

        let len = ssa::rri(&mut self.out, RvOp::Lw, list, 0);
        self.emit(block, len);
        let len_value = self.out.result(len, 0);
        let below = ssa::branch(&mut self.out, RvOp::Blt, index, zero, "_list_index_oob");
        self.emit(block, below);
        let above = ssa::branch(&mut self.out, RvOp::Bge, index, len_value, "_list_index_oob");
        self.emit(block, above);

        let addr = self.element_address(list, index, block);
        self.map_result(op, addr);
        Ok(())
    }

    /// `base + 4*index + 4`: skip the length word.
    fn element_address(&mut self, base: ValueId, index: ValueId, block: BlockId) -> ValueId {
        let four = ssa::li(&mut self.out, 4);
        self.emit(block, four);
        let four_value = self.out.result(four, 0);
        let offset = ssa::rrr(&mut self.out, RvOp::Mul, index, four_value);
        self.emit(block, offset);
        let offset_value = self.out.result(offset, 0);
        let sum = ssa::rrr(&mut self.out, RvOp::Add, base, offset_value);
        self.emit(block, sum);
        let sum_value = self.out.result(sum, 0);
        let addr = ssa::rri(&mut self.out, RvOp::Addi, sum_value, 4);
        self.emit(block, addr);
        self.out.result(addr, 0)
    }

    fn lower_index_string(&mut self, op: OpId, block: BlockId) -> Result<(), CompileError> {
        let string = self.v(self.flat.operand(op, 0))?;
        let index = self.v(self.flat.operand(op, 1))?;

        let zero = self.zero(block);
        let len = ssa::rri(&mut self.out, RvOp::Lw, string, 0);
        self.emit(block, len);
        let len_value = self.out.result(len, 0);
        let below = ssa::branch(&mut self.out, RvOp::Blt, index, zero, "_list_index_oob");
        self.emit(block, below);
        let above = ssa::branch(&mut self.out, RvOp::Bge, index, len_value, "_list_index_oob");
        self.emit(block, above);

        // Fetch the character word.
        let char_addr = self.element_address(string, index, block);
        let ch = ssa::rri(&mut self.out, RvOp::Lw, char_addr, 0);
        self.emit(block, ch);
        let ch_value = self.out.result(ch, 0);

        // Build a fresh one-character string.
        let size = ssa::li(&mut self.out, 8);
        self.emit(block, size);
        let size_value = self.out.result(size, 0);
        let malloc = ssa::call(&mut self.out, "_malloc", &[size_value], true);
        self.emit(block, malloc);
        let new_string = self.out.result(malloc, 0);
        let one = ssa::li(&mut self.out, 1);
        self.emit(block, one);
        let one_value = self.out.result(one, 0);
        let store_len = ssa::store(&mut self.out, RvOp::Sw, one_value, new_string, 0);
        self.emit(block, store_len);
        let store_ch = ssa::store(&mut self.out, RvOp::Sw, ch_value, new_string, 4);
        self.emit(block, store_ch);

        // The result is a location holding the new string's pointer.
        let slot = ssa::alloc(&mut self.out);
        self.emit(block, slot);
        let slot_value = self.out.result(slot, 0);
        let store_ptr = ssa::store(&mut self.out, RvOp::Sw, new_string, slot_value, 0);
        self.emit(block, store_ptr);
        self.map_result(op, slot_value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::OpKind;
    use crate::dialects::verify_module;
    use crate::passes::ast_to_flat::ast_to_flat;
    use crate::passes::constant_folding::constant_folding;
    use crate::passes::dead_code_elimination::dead_code_elimination;
    use crate::passes::for_to_while::for_to_while;
    use crate::passes::introduce_library_calls::introduce_library_calls;
    use crate::parser::parse_program;
    use crate::typechecker::type_check;

    fn lower(source: &str) -> Module {
        let mut m = parse_program(source).unwrap();
        type_check(&mut m).unwrap();
        let mut flat = ast_to_flat(&m).unwrap();
        introduce_library_calls(&mut flat).unwrap();
        constant_folding(&mut flat).unwrap();
        dead_code_elimination(&mut flat).unwrap();
        for_to_while(&mut flat).unwrap();
        let rv = flat_to_riscv_ssa(&flat).unwrap();
        verify_module(&rv).unwrap();
        rv
    }

    fn ops_of(m: &Module, op: RvOp) -> Vec<OpId> {
        m.walk()
            .into_iter()
            .filter(|o| m.kind(*o) == OpKind::RiscvSsa(op))
            .collect()
    }

    fn call_names(m: &Module) -> Vec<String> {
        ops_of(m, RvOp::Call)
            .into_iter()
            .filter_map(|op| m.attr(op, "func_name").and_then(|a| a.as_str().map(String::from)))
            .collect()
    }

    #[test]
    fn test_print_int_lowering() {
        let m = lower("print(1 + 2)\n");
        // Folded to a single li feeding _print_int.
        let lis = ops_of(&m, RvOp::Li);
        assert!(
            lis.iter()
                .any(|op| m.attr(*op, "immediate") == Some(Attribute::Int(3)))
        );
        assert_eq!(call_names(&m), vec!["_print_int"]);
    }

    #[test]
    fn test_main_func_wraps_module() {
        let m = lower("print(1)\n");
        let funcs = ops_of(&m, RvOp::Func);
        assert_eq!(funcs.len(), 1);
        assert_eq!(
            m.attr(funcs[0], "func_name"),
            Some(Attribute::Str("_main".to_string()))
        );
    }

    #[test]
    fn test_division_guards_against_zero() {
        let m = lower("x: int = 6\nprint(x // 2)\n");
        let guards: Vec<OpId> = ops_of(&m, RvOp::Beq)
            .into_iter()
            .filter(|op| {
                m.attr(*op, "offset") == Some(Attribute::Label("_error_div_zero".to_string()))
            })
            .collect();
        assert_eq!(guards.len(), 1);
        assert_eq!(ops_of(&m, RvOp::Div).len(), 1);
    }

    #[test]
    fn test_while_shape() {
        let m = lower("x: int = 0\nwhile x < 3:\n    x = x + 1\n");
        let labels: Vec<String> = ops_of(&m, RvOp::Label)
            .into_iter()
            .filter_map(|op| match m.attr(op, "label") {
                Some(Attribute::Label(l)) => Some(l),
                _ => None,
            })
            .collect();
        assert!(labels.iter().any(|l| l.starts_with("_while_begin")));
        assert!(labels.iter().any(|l| l.starts_with("_while_end")));
        assert_eq!(ops_of(&m, RvOp::J).len(), 1);
    }

    #[test]
    fn test_list_literal_builds_heap_object() {
        let m = lower("xs: [int] = None\nxs = [1, 2]\n");
        assert!(call_names(&m).contains(&"_malloc".to_string()));
        // Length word plus two element stores plus the variable store.
        assert_eq!(ops_of(&m, RvOp::Sw).len(), 5);
    }

    #[test]
    fn test_len_lowered_inline() {
        let m = lower("x: int = 0\nxs: [int] = None\nfor x in xs:\n    print(x)\n");
        assert!(!call_names(&m).contains(&"len".to_string()));
        let guards: Vec<OpId> = ops_of(&m, RvOp::Beq)
            .into_iter()
            .filter(|op| {
                m.attr(*op, "offset") == Some(Attribute::Label("_error_len_none".to_string()))
            })
            .collect();
        assert_eq!(guards.len(), 1);
    }

    #[test]
    fn test_get_address_bounds_checks() {
        let m = lower("xs: [int] = None\nxs = [1]\nprint(xs[0])\n");
        let oob: Vec<OpId> = m
            .walk()
            .into_iter()
            .filter(|op| {
                m.attr(*op, "offset") == Some(Attribute::Label("_list_index_oob".to_string()))
            })
            .collect();
        assert_eq!(oob.len(), 2);
        let none_guards: Vec<OpId> = m
            .walk()
            .into_iter()
            .filter(|op| {
                m.attr(*op, "offset") == Some(Attribute::Label("_list_index_none".to_string()))
            })
            .collect();
        assert_eq!(none_guards.len(), 1);
    }

    #[test]
    fn test_user_function_called_by_name() {
        let m = lower("def add(a: int, b: int) -> int:\n    return a + b\nprint(add(1, 2))\n");
        assert!(call_names(&m).contains(&"add".to_string()));
        let funcs = ops_of(&m, RvOp::Func);
        assert_eq!(funcs.len(), 2);
        // Returns lower to riscv_ssa.return.
        assert!(!ops_of(&m, RvOp::Return).is_empty());
    }

    #[test]
    fn test_short_circuit_becomes_branch_over_slot() {
        let m = lower(
            "def f() -> bool:\n    return True\nx: bool = True\nif x or f():\n    pass\n",
        );
        let bnes = ops_of(&m, RvOp::Bne);
        assert!(!bnes.is_empty());
        // The rhs call is still present, after the short-circuit branch.
        assert!(call_names(&m).contains(&"f".to_string()));
        assert!(!ops_of(&m, RvOp::Alloc).is_empty());
    }
}
