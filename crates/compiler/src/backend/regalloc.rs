//! Spill-everything register allocation.
//!
//! Every SSA value gets a stack slot in its function's frame; every
//! `riscv_ssa.alloc` additionally gets a slot of backing storage above
//! the spill area. Each virtual-register operation is rewritten into
//! loads of its operands into `t1`/`t2`, the physical operation writing
//! `t0`, and a store of `t0` back to the result's slot. Values defined in
//! `_main` but used in nested functions are addressed relative to `tp`,
//! which `_main`'s prologue points at its own frame.
//!
//! Frame offsets must fit a 12-bit signed immediate; anything larger is a
//! compile-time error, never a silently truncated instruction.

use std::collections::HashMap;

use crate::dialects::OpKind;
use crate::dialects::riscv::{Asm, Reg, RvOp};
use crate::error::CompileError;
use crate::ir::printer::Printer;
use crate::ir::{Attribute, BlockId, Module, OpId, ValueId};

/// Largest frame offset encodable in a 12-bit signed immediate.
const MAX_IMMEDIATE: i64 = 2047;
const MIN_IMMEDIATE: i64 = -2048;

fn check_offset(offset: i64) -> Result<i32, CompileError> {
    if !(MIN_IMMEDIATE..=MAX_IMMEDIATE).contains(&offset) {
        return Err(CompileError::BackendLimit(format!(
            "stack frame offset {} does not fit a 12-bit immediate",
            offset
        )));
    }
    Ok(offset as i32)
}

/// Per-function allocation: slot per SSA value (block arguments first,
/// then results in program order) and an auxiliary slot per alloc op.
struct Allocation {
    spilled_reg: usize,
    stack_pos: HashMap<ValueId, usize>,
    stack_vars: usize,
    alloc_slots: HashMap<OpId, usize>,
}

fn allocate_registers(m: &Module, func: OpId) -> Allocation {
    let block = m.region_block(m.region(func, 0));
    let mut allocation = Allocation {
        spilled_reg: 0,
        stack_pos: HashMap::new(),
        stack_vars: 0,
        alloc_slots: HashMap::new(),
    };
    for arg in m.block_args(block) {
        allocation.stack_pos.insert(arg, allocation.spilled_reg);
        allocation.spilled_reg += 1;
    }
    for op in m.block_ops(block) {
        for result in m.results(op) {
            allocation.stack_pos.insert(result, allocation.spilled_reg);
            allocation.spilled_reg += 1;
        }
        if m.kind(op) == OpKind::RiscvSsa(RvOp::Alloc) {
            allocation.alloc_slots.insert(op, allocation.stack_vars);
            allocation.stack_vars += 1;
        }
    }
    allocation
}

struct FuncLowering<'a> {
    allocation: &'a Allocation,
    global_stack_pos: Option<&'a HashMap<ValueId, usize>>,
    func_name: String,
    /// Pre-rendered textual form of each virtual-register op, for
    /// debuggability comments in the output.
    rendered: HashMap<OpId, String>,
    value_names: HashMap<ValueId, String>,
}

impl FuncLowering<'_> {
    /// Load `value` from its slot into `reg`.
    fn get_variable_on_register(
        &self,
        m: &mut Module,
        value: ValueId,
        reg: Reg,
    ) -> Result<Vec<OpId>, CompileError> {
        let name = self
            .value_names
            .get(&value)
            .cloned()
            .unwrap_or_else(|| "%?".to_string());
        let comment = format!("Unspill register '{}'", name);
        if let Some(pos) = self.allocation.stack_pos.get(&value) {
            let offset = check_offset(*pos as i64 * 4)?;
            let mut asm = Asm::new(m);
            asm.lw(reg, Reg::Sp, offset, Some(&comment));
            return Ok(asm.into_ops());
        }
        // Defined in _main: address the main frame through tp.
        let pos = self
            .global_stack_pos
            .and_then(|map| map.get(&value))
            .ok_or_else(|| {
                CompileError::BackendLimit("value has no stack slot in any frame".to_string())
            })?;
        let offset = check_offset(*pos as i64 * 4)?;
        let mut asm = Asm::new(m);
        asm.lw(reg, Reg::Tp, offset, Some(&comment));
        Ok(asm.into_ops())
    }

    /// Store `reg` into `value`'s slot.
    fn store_variable_from_register(
        &self,
        m: &mut Module,
        reg: Reg,
        value: ValueId,
    ) -> Result<Vec<OpId>, CompileError> {
        let pos = self.allocation.stack_pos[&value];
        let offset = check_offset(pos as i64 * 4)?;
        let mut asm = Asm::new(m);
        asm.sw(reg, Reg::Sp, offset, Some("Spill register"));
        Ok(asm.into_ops())
    }

    /// Prologue at the top of the function, epilogue (behind the
    /// `_<name>_return` label) at the bottom.
    fn add_stack_allocation(
        &self,
        m: &mut Module,
        block: BlockId,
        is_main: bool,
    ) -> Result<(), CompileError> {
        let spilled = self.allocation.spilled_reg as i64;
        let stack_vars = self.allocation.stack_vars as i64;
        check_offset(4 * spilled)?;
        check_offset(4 * (spilled + stack_vars))?;

        let args = m.block_args(block);
        if args.len() > 8 {
            return Err(CompileError::BackendLimit(
                "more than eight function parameters".to_string(),
            ));
        }

        let mut asm = Asm::new(m);
        asm.addi(Reg::Sp, Reg::Sp, -4, Some("Reserve space for ra"));
        asm.sw(Reg::Ra, Reg::Sp, 0, Some("Store return address"));
        asm.addi(
            Reg::Sp,
            Reg::Sp,
            -4 * spilled as i32,
            Some("Reserve stack space for spilled registers"),
        );
        if stack_vars > 0 {
            asm.addi(
                Reg::Sp,
                Reg::Sp,
                -4 * stack_vars as i32,
                Some("Reserve stack space for stack-allocated memory"),
            );
        }
        if is_main {
            asm.mv(Reg::Tp, Reg::Sp, Some("Move main stack pointer to special register"));
        }
        let mut header = asm.into_ops();
        for (index, arg) in args.iter().enumerate() {
            header.extend(self.store_variable_from_register(m, Reg::arg(index), *arg)?);
        }
        m.insert_ops_at(block, 0, &header);

        let mut asm = Asm::new(m);
        asm.blank();
        asm.comment("Footer Ops");
        asm.label(&format!("_{}_return", self.func_name));
        asm.addi(
            Reg::Sp,
            Reg::Sp,
            4 * spilled as i32,
            Some("Free stack space reserved for spilled registers"),
        );
        if stack_vars > 0 {
            asm.addi(
                Reg::Sp,
                Reg::Sp,
                4 * stack_vars as i32,
                Some("Free stack space reserved for stack-allocated memory"),
            );
        }
        asm.lw(Reg::Ra, Reg::Sp, 0, Some("Restore return address"));
        asm.addi(Reg::Sp, Reg::Sp, 4, Some("Free space for ra"));
        let footer = asm.into_ops();
        m.append_ops(block, &footer);
        Ok(())
    }

    fn rewrite_call(&self, m: &mut Module, op: OpId) -> Result<(), CompileError> {
        let func_name = m
            .attr(op, "func_name")
            .and_then(|a| a.as_str().map(String::from))
            .expect("call must carry a function name");
        let mut new_ops = Vec::new();
        let mut asm = Asm::new(m);
        asm.blank();
        asm.comment(&format!("riscv_ssa.call {}", func_name));
        new_ops.extend(asm.into_ops());

        let operands = m.operands(op);
        if operands.len() > 8 {
            return Err(CompileError::BackendLimit(
                "more than eight call arguments".to_string(),
            ));
        }
        for (index, operand) in operands.iter().enumerate() {
            new_ops.extend(self.get_variable_on_register(m, *operand, Reg::arg(index))?);
        }
        let mut asm = Asm::new(m);
        asm.jal(Reg::Ra, &func_name, None);
        new_ops.extend(asm.into_ops());

        if m.num_results(op) == 1 {
            new_ops.extend(self.store_variable_from_register(m, Reg::A0, m.result(op, 0))?);
        }
        let map = vec![None; m.num_results(op)];
        m.replace_op(op, &new_ops, &map, true)?;
        Ok(())
    }

    fn rewrite_ecall(&self, m: &mut Module, op: OpId) -> Result<(), CompileError> {
        let operands = m.operands(op);
        let mut new_ops = self.get_variable_on_register(m, operands[0], Reg::A7)?;
        for (index, operand) in operands[1..].iter().enumerate() {
            new_ops.extend(self.get_variable_on_register(m, *operand, Reg::arg(index))?);
        }
        let mut asm = Asm::new(m);
        asm.ecall(None);
        new_ops.extend(asm.into_ops());
        m.replace_op(op, &new_ops, &[], true)?;
        Ok(())
    }

    fn rewrite_alloc(&self, m: &mut Module, op: OpId) -> Result<(), CompileError> {
        let index = self.allocation.alloc_slots[&op];
        let offset = check_offset(4 * (index + self.allocation.spilled_reg) as i64)?;
        let mut asm = Asm::new(m);
        asm.addi(Reg::T0, Reg::Sp, offset, Some("Save ptr of stack-slot into register"));
        let mut new_ops = asm.into_ops();
        new_ops.extend(self.store_variable_from_register(m, Reg::T0, m.result(op, 0))?);
        m.replace_op(op, &new_ops, &[None], true)?;
        Ok(())
    }

    fn rewrite_return(&self, m: &mut Module, op: OpId) -> Result<(), CompileError> {
        let mut new_ops = Vec::new();
        if m.num_operands(op) == 1 {
            new_ops.extend(self.get_variable_on_register(m, m.operand(op, 0), Reg::A0)?);
        }
        let mut asm = Asm::new(m);
        asm.j(&format!("_{}_return", self.func_name), None);
        new_ops.extend(asm.into_ops());
        m.replace_op(op, &new_ops, &[], true)?;
        Ok(())
    }

    /// The generic shape: comment, load up to two operands into t1/t2,
    /// the physical op writing t0, spill t0.
    fn rewrite_generic(&self, m: &mut Module, op: OpId) -> Result<(), CompileError> {
        let OpKind::RiscvSsa(opcode) = m.kind(op) else {
            return Ok(());
        };
        let rendered = self.rendered.get(&op).cloned().unwrap_or_default();
        let mut new_ops = Vec::new();
        let mut asm = Asm::new(m);
        asm.blank();
        asm.comment(&rendered);
        new_ops.extend(asm.into_ops());

        let operands = m.operands(op);
        debug_assert!(operands.len() <= 2);
        let mut attrs: Vec<(&str, Attribute)> = Vec::new();
        for (name, attr) in m.attrs(op) {
            match name.as_str() {
                "immediate" => attrs.push(("immediate", attr)),
                "offset" => attrs.push(("offset", attr)),
                "label" => attrs.push(("label", attr)),
                "comment" => attrs.push(("comment", attr)),
                _ => {}
            }
        }
        if !operands.is_empty() {
            new_ops.extend(self.get_variable_on_register(m, operands[0], Reg::T1)?);
            attrs.push(("rs1", Attribute::Register(Reg::T1)));
        }
        if operands.len() > 1 {
            new_ops.extend(self.get_variable_on_register(m, operands[1], Reg::T2)?);
            attrs.push(("rs2", Attribute::Register(Reg::T2)));
        }
        if m.num_results(op) > 0 {
            attrs.push(("rd", Attribute::Register(Reg::T0)));
        }
        let phys = m.create_op(OpKind::Riscv(opcode), &[], vec![], attrs, vec![]);
        new_ops.push(phys);
        if m.num_results(op) > 0 {
            new_ops.extend(self.store_variable_from_register(m, Reg::T0, m.result(op, 0))?);
        }
        let map = vec![None; m.num_results(op)];
        m.replace_op(op, &new_ops, &map, true)?;
        Ok(())
    }

    /// Rewrite every virtual-register op among the direct children of
    /// `block`, last to first so uses are rewritten before definitions.
    fn rewrite_block(&self, m: &mut Module, block: BlockId) -> Result<(), CompileError> {
        let ops = m.block_ops(block);
        for op in ops.into_iter().rev() {
            let OpKind::RiscvSsa(opcode) = m.kind(op) else {
                continue;
            };
            match opcode {
                RvOp::Func => {} // nested functions are lowered separately
                RvOp::Call => self.rewrite_call(m, op)?,
                RvOp::Ecall => self.rewrite_ecall(m, op)?,
                RvOp::Alloc => self.rewrite_alloc(m, op)?,
                RvOp::Return => self.rewrite_return(m, op)?,
                _ => self.rewrite_generic(m, op)?,
            }
        }
        Ok(())
    }
}

/// Pre-render the textual form of every virtual-register child of
/// `block`, and the printer names of all values, before mutation begins.
fn prerender(m: &Module) -> (HashMap<OpId, String>, HashMap<ValueId, String>) {
    let mut printer = Printer::new(m);
    let mut rendered = HashMap::new();
    let mut names = HashMap::new();
    for op in m.walk() {
        if matches!(m.kind(op), OpKind::RiscvSsa(_)) {
            rendered.insert(op, printer.render_op_inline(op));
        }
        for result in m.results(op) {
            names.insert(result, printer.value_ref(result));
        }
        if let Some(block) = m.parent_block(op) {
            for arg in m.block_args(block) {
                names.insert(arg, printer.value_ref(arg));
            }
        }
    }
    (rendered, names)
}

/// Lower all `riscv_ssa` operations to physical `riscv` operations,
/// inserting prologues/epilogues, the exit sequence, and moving nested
/// functions behind `_main`'s body.
pub fn riscv_ssa_to_riscv(m: &mut Module) -> Result<(), CompileError> {
    let top_ops = m.block_ops(m.top_block());
    let main = *top_ops.first().ok_or_else(|| {
        CompileError::BackendLimit("expected a _main function".to_string())
    })?;
    if m.kind(main) != OpKind::RiscvSsa(RvOp::Func) {
        return Err(CompileError::BackendLimit(
            "expected a riscv_ssa.func at the top level".to_string(),
        ));
    }

    let (rendered, value_names) = prerender(m);
    let main_block = m.region_block(m.region(main, 0));
    let main_allocation = allocate_registers(m, main);

    // Nested functions first: they may reference _main's slots via tp.
    let nested: Vec<OpId> = m
        .block_ops(main_block)
        .into_iter()
        .filter(|op| m.kind(*op) == OpKind::RiscvSsa(RvOp::Func))
        .collect();
    for func in &nested {
        let allocation = allocate_registers(m, *func);
        let name = m
            .attr(*func, "func_name")
            .and_then(|a| a.as_str().map(String::from))
            .expect("func must carry a name");
        let lowering = FuncLowering {
            allocation: &allocation,
            global_stack_pos: Some(&main_allocation.stack_pos),
            func_name: name,
            rendered: rendered.clone(),
            value_names: value_names.clone(),
        };
        let block = m.region_block(m.region(*func, 0));
        lowering.add_stack_allocation(m, block, false)?;
        // Functions fall through their footer into `ret`.
        let mut asm = Asm::new(m);
        asm.ret();
        let ret_ops = asm.into_ops();
        m.append_ops(block, &ret_ops);
        lowering.rewrite_block(m, block)?;
    }

    let main_name = m
        .attr(main, "func_name")
        .and_then(|a| a.as_str().map(String::from))
        .expect("main must carry a name");
    let lowering = FuncLowering {
        allocation: &main_allocation,
        global_stack_pos: None,
        func_name: main_name,
        rendered,
        value_names,
    };
    lowering.add_stack_allocation(m, main_block, true)?;
    lowering.rewrite_block(m, main_block)?;

    // The program epilogue: exit(0).
    let exit = exit_ops(m, 0);
    m.append_ops(main_block, &exit);

    // Move nested functions behind _main's code.
    for func in &nested {
        m.detach_op(*func);
        m.append_op(main_block, *func);
    }
    Ok(())
}

/// `exit(code)` via the exit syscall.
pub fn exit_ops(m: &mut Module, code: i32) -> Vec<OpId> {
    let mut asm = Asm::new(m);
    asm.blank();
    asm.comment("Exit program");
    asm.li(Reg::A0, code, None);
    asm.li(Reg::A7, 93, None);
    asm.ecall(None);
    asm.into_ops()
}

/// Replace every `riscv_ssa.func` with its label followed by its body,
/// and prepend the `jal ra, _main` entry jump.
pub fn riscv_function_lowering(m: &mut Module) -> Result<(), CompileError> {
    loop {
        let Some(func) = m
            .walk()
            .into_iter()
            .find(|op| m.kind(*op) == OpKind::RiscvSsa(RvOp::Func))
        else {
            break;
        };
        let name = m
            .attr(func, "func_name")
            .and_then(|a| a.as_str().map(String::from))
            .expect("func must carry a name");
        let block = m.region_block(m.region(func, 0));
        let body = m.block_ops(block);
        for op in &body {
            m.detach_op(*op);
        }
        let mut asm = Asm::new(m);
        asm.label(&name);
        let mut new_ops = asm.into_ops();
        new_ops.extend(body);
        m.insert_before(func, &new_ops);
        m.erase_op(func);
    }
    let mut asm = Asm::new(m);
    asm.jal(Reg::Ra, "_main", None);
    let entry = asm.into_ops();
    let top = m.top_block();
    m.insert_ops_at(top, 0, &entry);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::riscv::ssa;
    use crate::ir::Module;

    fn build_main(body: impl FnOnce(&mut Module, crate::ir::BlockId)) -> Module {
        let mut m = Module::new();
        let (region, block) = m.region_with_args(vec![]);
        body(&mut m, block);
        let main = ssa::func(&mut m, "_main", region);
        let top = m.top_block();
        m.append_op(top, main);
        m
    }

    #[test]
    fn test_slots_are_unique_per_function() {
        let m = build_main(|m, block| {
            for i in 0..5 {
                let li = ssa::li(m, i);
                m.append_op(block, li);
            }
        });
        let main = m.block_ops(m.top_block())[0];
        let allocation = allocate_registers(&m, main);
        assert_eq!(allocation.spilled_reg, 5);
        let mut slots: Vec<usize> = allocation.stack_pos.values().copied().collect();
        slots.sort_unstable();
        slots.dedup();
        assert_eq!(slots.len(), 5);
    }

    #[test]
    fn test_allocs_get_auxiliary_slots() {
        let m = build_main(|m, block| {
            let a = ssa::alloc(m);
            m.append_op(block, a);
            let b = ssa::alloc(m);
            m.append_op(block, b);
        });
        let main = m.block_ops(m.top_block())[0];
        let allocation = allocate_registers(&m, main);
        assert_eq!(allocation.spilled_reg, 2);
        assert_eq!(allocation.stack_vars, 2);
    }

    #[test]
    fn test_rewrite_leaves_no_virtual_ops() {
        let mut m = build_main(|m, block| {
            let a = ssa::li(m, 1);
            m.append_op(block, a);
            let b = ssa::li(m, 2);
            m.append_op(block, b);
            let sum = ssa::rrr(m, RvOp::Add, m.result(a, 0), m.result(b, 0));
            m.append_op(block, sum);
        });
        riscv_ssa_to_riscv(&mut m).unwrap();
        riscv_function_lowering(&mut m).unwrap();
        for op in m.walk() {
            assert!(
                matches!(m.kind(op), OpKind::Riscv(_)),
                "leftover virtual op {:?}",
                m.kind(op)
            );
        }
        m.verify_structure().unwrap();
    }

    #[test]
    fn test_prologue_epilogue_balance() {
        let mut m = build_main(|m, block| {
            let a = ssa::alloc(m);
            m.append_op(block, a);
            let b = ssa::li(m, 2);
            m.append_op(block, b);
        });
        riscv_ssa_to_riscv(&mut m).unwrap();
        riscv_function_lowering(&mut m).unwrap();
        let mut net: i64 = 0;
        for op in m.walk() {
            if m.kind(op) == OpKind::Riscv(RvOp::Addi)
                && m.attr(op, "rd") == Some(Attribute::Register(Reg::Sp))
                && m.attr(op, "rs1") == Some(Attribute::Register(Reg::Sp))
            {
                net += m.attr(op, "immediate").and_then(|a| a.as_int()).unwrap() as i64;
            }
        }
        assert_eq!(net, 0);
    }

    #[test]
    fn test_spill_limit_is_reported() {
        let mut m = build_main(|m, block| {
            for i in 0..600 {
                let li = ssa::li(m, i);
                m.append_op(block, li);
            }
        });
        let err = riscv_ssa_to_riscv(&mut m).unwrap_err();
        assert!(matches!(err, CompileError::BackendLimit(_)));
    }

    #[test]
    fn test_130_values_still_fit() {
        let mut m = build_main(|m, block| {
            for i in 0..130 {
                let li = ssa::li(m, i);
                m.append_op(block, li);
            }
        });
        riscv_ssa_to_riscv(&mut m).unwrap();
    }

    #[test]
    fn test_main_prologue_sets_tp() {
        let mut m = build_main(|m, block| {
            let li = ssa::li(m, 1);
            m.append_op(block, li);
        });
        riscv_ssa_to_riscv(&mut m).unwrap();
        let mains = m.block_ops(m.top_block());
        let main = mains[0];
        let block = m.region_block(m.region(main, 0));
        let has_tp_mv = m.block_ops(block).into_iter().any(|op| {
            m.kind(op) == OpKind::Riscv(RvOp::Mv)
                && m.attr(op, "rd") == Some(Attribute::Register(Reg::Tp))
        });
        assert!(has_tp_mv);
    }
}
