//! Assembly text output.
//!
//! One instruction per line, operands formatted per instruction class
//! (loads and stores use `offset(base)`, everything else positional),
//! labels as `name:`, directives as `.dir value`, comments behind `#`.
//! The data section declaring the heap and the `_malloc` bump allocator
//! are printed as fixed text around the module's operations.

use std::fmt::Write as _;

use crate::dialects::OpKind;
use crate::dialects::riscv::{InstFormat, Reg, RvOp};
use crate::error::CompileError;
use crate::ir::{Attribute, Module, OpId, VerifyError};

/// Render the whole program: data section, heap initialization, the
/// module's physical operations, and the `_malloc` routine.
pub fn emit_assembly(m: &Module) -> Result<String, CompileError> {
    let mut out = String::new();
    let _ = writeln!(out, "\t.data");
    let _ = writeln!(out, "_heap:\t.space 102400");
    let _ = writeln!(out, "_heap_tree_ptr:\t.word 100");
    let _ = writeln!(out, "\t.text");
    let _ = writeln!(out, "# Initialize the heap memory");
    let _ = writeln!(out, "\tla t0, _heap");
    let _ = writeln!(out, "\tla t1, _heap_tree_ptr");
    let _ = writeln!(out, "\tsw t0, 0(t1)");

    for op in m.block_ops(m.top_block()) {
        print_op(m, op, &mut out)?;
    }

    let _ = writeln!(out, "_malloc:");
    let _ = writeln!(out, "\tla t0, _heap_tree_ptr");
    let _ = writeln!(out, "\tlw t1, 0(t0)");
    let _ = writeln!(out, "\tadd t2, t1, a0");
    let _ = writeln!(out, "\tsw t2, 0(t0)");
    let _ = writeln!(out, "\taddi a0, t1, 0");
    let _ = writeln!(out, "\tret");
    Ok(out)
}

fn reg(m: &Module, op: OpId, name: &str) -> Result<&'static str, CompileError> {
    match m.attr(op, name) {
        Some(Attribute::Register(r)) => Ok(r.abi_name()),
        other => Err(CompileError::Verify(VerifyError::new(format!(
            "operation {} lacks register attribute {} (found {:?})",
            m.kind(op).name(),
            name,
            other
        )))),
    }
}

/// An `immediate`/`offset` attribute rendered for assembly: a number or
/// a label name.
fn imm(m: &Module, op: OpId, name: &str) -> Result<String, CompileError> {
    match m.attr(op, name) {
        Some(Attribute::Int(v)) => Ok(v.to_string()),
        Some(Attribute::Label(l)) => Ok(l),
        other => Err(CompileError::Verify(VerifyError::new(format!(
            "operation {} lacks immediate attribute {} (found {:?})",
            m.kind(op).name(),
            name,
            other
        )))),
    }
}

fn print_op(m: &Module, op: OpId, out: &mut String) -> Result<(), CompileError> {
    let OpKind::Riscv(opcode) = m.kind(op) else {
        return Err(CompileError::Verify(VerifyError::new(format!(
            "cannot print non-physical operation {}",
            m.kind(op).name()
        ))));
    };
    let comment = m.attr(op, "comment").and_then(|a| match a {
        Attribute::Str(s) => Some(s),
        _ => None,
    });

    match opcode {
        RvOp::Comment => {
            match comment {
                Some(text) => {
                    let _ = writeln!(out, "    \t# {}", text);
                }
                None => {
                    let _ = writeln!(out);
                }
            }
            return Ok(());
        }
        RvOp::Label => {
            let label = match m.attr(op, "label") {
                Some(Attribute::Label(l)) => l,
                _ => {
                    return Err(CompileError::Verify(VerifyError::new(
                        "label operation lacks its label attribute",
                    )));
                }
            };
            let _ = writeln!(out, "{}:", label);
            return Ok(());
        }
        RvOp::Directive => {
            let directive = m.attr(op, "directive").and_then(|a| a.as_str().map(String::from));
            let value = m.attr(op, "value").and_then(|a| a.as_str().map(String::from));
            let _ = writeln!(
                out,
                ".{} {}",
                directive.unwrap_or_default(),
                value.unwrap_or_default()
            );
            return Ok(());
        }
        _ => {}
    }

    let _ = write!(out, "\t{}", opcode.mnemonic());
    match opcode.format() {
        InstFormat::NoArgs => {}
        InstFormat::RdImm => {
            let _ = write!(out, " {}, {}", reg(m, op, "rd")?, imm(m, op, "immediate")?);
        }
        InstFormat::Off => {
            let _ = write!(out, " {}", imm(m, op, "offset")?);
        }
        InstFormat::RdRs => {
            let _ = write!(out, " {}, {}", reg(m, op, "rd")?, reg(m, op, "rs")?);
        }
        InstFormat::RdRs1Rs2 => {
            let _ = write!(
                out,
                " {}, {}, {}",
                reg(m, op, "rd")?,
                reg(m, op, "rs1")?,
                reg(m, op, "rs2")?
            );
        }
        InstFormat::RdRs1Imm => {
            let _ = write!(
                out,
                " {}, {}, {}",
                reg(m, op, "rd")?,
                reg(m, op, "rs1")?,
                imm(m, op, "immediate")?
            );
        }
        InstFormat::Load => {
            let _ = write!(
                out,
                " {}, {}({})",
                reg(m, op, "rd")?,
                imm(m, op, "immediate")?,
                reg(m, op, "rs1")?
            );
        }
        InstFormat::Store => {
            let _ = write!(
                out,
                " {}, {}({})",
                reg(m, op, "rs1")?,
                imm(m, op, "immediate")?,
                reg(m, op, "rs2")?
            );
        }
        InstFormat::Branch => {
            let _ = write!(
                out,
                " {}, {}, {}",
                reg(m, op, "rs1")?,
                reg(m, op, "rs2")?,
                imm(m, op, "offset")?
            );
        }
        InstFormat::Meta => {
            return Err(CompileError::Verify(VerifyError::new(format!(
                "cannot print structural operation {}",
                m.kind(op).name()
            ))));
        }
    }
    if let Some(text) = comment {
        let _ = write!(out, "    \t# {}", text);
    }
    let _ = writeln!(out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::riscv::Asm;

    fn asm_of(build: impl FnOnce(&mut Asm<'_>)) -> String {
        let mut m = Module::new();
        let mut asm = Asm::new(&mut m);
        build(&mut asm);
        let ops = asm.into_ops();
        let top = m.top_block();
        m.append_ops(top, &ops);
        emit_assembly(&m).unwrap()
    }

    #[test]
    fn test_store_and_load_operand_shapes() {
        let text = asm_of(|a| {
            a.sw(Reg::Ra, Reg::Sp, 0, Some("Store return address"));
            a.lw(Reg::T1, Reg::Sp, 8, None);
        });
        assert!(text.contains("\tsw ra, 0(sp)    \t# Store return address\n"));
        assert!(text.contains("\tlw t1, 8(sp)\n"));
    }

    #[test]
    fn test_label_and_jump() {
        let text = asm_of(|a| {
            a.label("_main");
            a.jal(Reg::Ra, "_print_int", None);
            a.j("__main_return", None);
        });
        assert!(text.contains("_main:\n"));
        assert!(text.contains("\tjal ra, _print_int\n"));
        assert!(text.contains("\tj __main_return\n"));
    }

    #[test]
    fn test_header_and_malloc_footer() {
        let text = asm_of(|a| {
            a.ret();
        });
        assert!(text.starts_with("\t.data\n_heap:\t.space 102400\n_heap_tree_ptr:\t.word 100\n"));
        assert!(text.contains("\t.text\n"));
        assert!(text.contains("\tla t0, _heap\n"));
        assert!(text.ends_with("_malloc:\n\tla t0, _heap_tree_ptr\n\tlw t1, 0(t0)\n\tadd t2, t1, a0\n\tsw t2, 0(t0)\n\taddi a0, t1, 0\n\tret\n"));
    }

    #[test]
    fn test_blank_comment_prints_empty_line() {
        let text = asm_of(|a| {
            a.blank();
            a.comment("Exit program");
        });
        assert!(text.contains("\n\n"));
        assert!(text.contains("    \t# Exit program\n"));
    }

    #[test]
    fn test_branch_format() {
        let text = asm_of(|a| {
            a.beq(Reg::T1, Reg::Zero, "_error_div_zero", None);
        });
        assert!(text.contains("\tbeq t1, zero, _error_div_zero\n"));
    }
}
