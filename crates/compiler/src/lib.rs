//! ChocoPy Compiler Library
//!
//! Provides compilation from ChocoPy source to RISC-V assembly text,
//! lowering through two typed intermediate representations: the source
//! AST as a dialect of region-nested operations, and a flat SSA form
//! with explicit memory locations. The backend is a deliberately simple
//! spill-everything register allocator plus a set of hand-written
//! runtime routines.
//!
//! # Pipeline
//!
//! ```text
//! source --parse--> AST --check/annotate--> AST
//!        --lower--> flat SSA --transform--> flat SSA
//!        --lower--> RISC-V SSA --allocate--> RISC-V --print--> text
//! ```
//!
//! The driver can stop the pipeline early (`PipelineStop`) and render
//! either assembly or the IR of the current stage (`Target`):
//!
//! ```rust,ignore
//! use chococ::{PipelineStop, Target, compile_source};
//!
//! let asm = compile_source("print(1 + 2)\n", PipelineStop::All, Target::Riscv)?;
//! assert!(asm.contains("_print_int"));
//! ```

pub mod backend;
pub mod config;
pub mod dialects;
pub mod error;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod passes;
pub mod typechecker;

pub use config::DriverConfig;
pub use error::CompileError;

use std::fs;
use std::path::Path;

use crate::backend::emit::emit_assembly;
use crate::backend::regalloc::{riscv_function_lowering, riscv_ssa_to_riscv};
use crate::backend::runtime::add_runtime_routines;
use crate::dialects::verify_module;
use crate::ir::printer::print_module;
use crate::passes::ast_to_flat::ast_to_flat;
use crate::passes::check_assign_target::check_assign_target;
use crate::passes::constant_folding::constant_folding;
use crate::passes::dead_code_elimination::dead_code_elimination;
use crate::passes::flat_to_riscv::flat_to_riscv_ssa;
use crate::passes::for_to_while::for_to_while;
use crate::passes::introduce_library_calls::introduce_library_calls;
use crate::passes::warn_dead_code::warn_dead_code;
use crate::typechecker::type_check;

/// Where to stop the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStop {
    /// After type checking.
    Type,
    /// After the dead-code warning pass.
    Warn,
    /// After AST→flat lowering.
    Ir,
    /// After constant folding.
    Fold,
    /// After flat→RISC-V SSA lowering.
    Riscv,
    /// The full pipeline, down to physical RISC-V.
    All,
}

impl PipelineStop {
    pub fn parse(name: &str) -> Result<PipelineStop, CompileError> {
        Ok(match name {
            "type" => PipelineStop::Type,
            "warn" => PipelineStop::Warn,
            "ir" => PipelineStop::Ir,
            "fold" => PipelineStop::Fold,
            "riscv" => PipelineStop::Riscv,
            "all" => PipelineStop::All,
            other => {
                return Err(CompileError::semantic(format!(
                    "unknown pipeline stopping point `{}`",
                    other
                )));
            }
        })
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// RISC-V assembly text (requires the full pipeline).
    Riscv,
    /// The IR of whatever stage the pipeline stopped at.
    Mlir,
}

impl Target {
    pub fn parse(name: &str) -> Result<Target, CompileError> {
        Ok(match name {
            "riscv" => Target::Riscv,
            "mlir" => Target::Mlir,
            other => {
                return Err(CompileError::semantic(format!(
                    "unknown output target `{}`",
                    other
                )));
            }
        })
    }
}

/// Compile ChocoPy source text.
///
/// Runs the pipeline up to `stop` and renders the result per `target`.
/// User errors (syntax, semantic, dead-code warning) come back as the
/// matching [`CompileError`] kinds; verification and backend-limit
/// failures indicate bugs or programs beyond the backend's limits.
pub fn compile_source(
    source: &str,
    stop: PipelineStop,
    target: Target,
) -> Result<String, CompileError> {
    if target == Target::Riscv && stop != PipelineStop::All {
        return Err(CompileError::semantic(
            "riscv output requires the full pipeline; use --target mlir with early stops",
        ));
    }

    tracing::debug!(pass = "parse", "building AST");
    let mut ast = parser::parse_program(source)?;

    tracing::debug!(pass = "check-assign-target", "checking assignment targets");
    check_assign_target(&ast)?;
    tracing::debug!(pass = "type-checking", "checking and annotating types");
    type_check(&mut ast)?;
    if stop == PipelineStop::Type {
        return Ok(print_module(&ast));
    }
    // The warning pass is only part of pipelines that stop there, so
    // full compilations are not cluttered by it.
    if stop == PipelineStop::Warn {
        tracing::debug!(pass = "warn-dead-code", "scanning for dead code");
        warn_dead_code(&ast)?;
        return Ok(print_module(&ast));
    }

    tracing::debug!(pass = "ast-to-flat", "lowering to flat SSA");
    let mut flat = ast_to_flat(&ast)?;
    verify_module(&flat)?;
    if stop == PipelineStop::Ir {
        return Ok(print_module(&flat));
    }

    tracing::debug!(pass = "introduce-library-calls", "concretizing built-ins");
    introduce_library_calls(&mut flat)?;
    tracing::debug!(pass = "constant-folding", "folding constants");
    constant_folding(&mut flat)?;
    if stop == PipelineStop::Fold {
        return Ok(print_module(&flat));
    }

    tracing::debug!(pass = "dead-code-elimination", "erasing dead values");
    dead_code_elimination(&mut flat)?;
    tracing::debug!(pass = "for-to-while", "expanding for loops");
    for_to_while(&mut flat)?;
    verify_module(&flat)?;

    tracing::debug!(pass = "flat-to-riscv-ssa", "lowering to virtual registers");
    let mut rv = flat_to_riscv_ssa(&flat)?;
    verify_module(&rv)?;
    if stop == PipelineStop::Riscv {
        return Ok(print_module(&rv));
    }

    tracing::debug!(pass = "register-allocation", "assigning spill slots");
    riscv_ssa_to_riscv(&mut rv)?;
    tracing::debug!(pass = "runtime", "appending runtime routines");
    add_runtime_routines(&mut rv)?;
    tracing::debug!(pass = "function-lowering", "inlining function bodies");
    riscv_function_lowering(&mut rv)?;

    match target {
        Target::Riscv => emit_assembly(&rv),
        Target::Mlir => Ok(print_module(&rv)),
    }
}

/// Compile a source file.
pub fn compile_file(
    path: &Path,
    stop: PipelineStop,
    target: Target,
) -> Result<String, CompileError> {
    let source = fs::read_to_string(path)?;
    compile_source(&source, stop, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_and_print() {
        let asm = compile_source("print(1 + 2)\n", PipelineStop::All, Target::Riscv).unwrap();
        // The folded literal feeds _print_int.
        assert!(asm.contains("\tjal ra, _print_int"));
        assert!(asm.contains("_print_int:"));
        // Entry jump and exit sequence.
        assert!(asm.contains("\tjal ra, _main"));
        assert!(asm.contains("\tli a0, 0"));
        assert!(asm.contains("\tli a7, 93"));
        assert!(asm.contains("\tecall"));
        // The heap declaration.
        assert!(asm.contains("_heap:\t.space 102400"));
    }

    #[test]
    fn test_folded_ir_has_single_literal() {
        let ir = compile_source("print(1 + 2)\n", PipelineStop::Fold, Target::Mlir).unwrap();
        assert!(ir.contains("\"value\" = 3 : i32"));
        assert!(!ir.contains("binary_expr"));
        assert!(ir.contains("_print_int"));
    }

    #[test]
    fn test_list_concat_program() {
        let source = "xs: [int] = None\nxs = [1, 2] + [3]\nprint(len(xs))\n";
        let asm = compile_source(source, PipelineStop::All, Target::Riscv).unwrap();
        assert!(asm.contains("\tjal ra, _list_concat"));
        assert!(asm.contains("_list_concat:"));
        assert!(asm.contains("_error_len_none:"));
    }

    #[test]
    fn test_short_circuit_program_compiles() {
        let source = "def divzero() -> bool:\n    return 1 // 0 == 0\nx: bool = True\nif x or divzero():\n    print(1)\n";
        let asm = compile_source(source, PipelineStop::All, Target::Riscv).unwrap();
        assert!(asm.contains("divzero:"));
        assert!(asm.contains("_error_div_zero:"));
    }

    #[test]
    fn test_invalid_assign_target_message() {
        let err = compile_source("1 = x\n", PipelineStop::All, Target::Riscv).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Semantic error: Found Literal as the left-hand side of an assignment. \
             Expected to find variable name or index expression only."
        );
    }

    #[test]
    fn test_warn_stop_reports_dead_code() {
        let source = "def f() -> int:\n    return 1\n    return 2\nprint(f())\n";
        let err = compile_source(source, PipelineStop::Warn, Target::Mlir).unwrap_err();
        assert!(matches!(err, CompileError::DeadCode(_)));
        // The full pipeline skips the warning pass.
        compile_source(source, PipelineStop::All, Target::Riscv).unwrap();
    }

    #[test]
    fn test_riscv_target_requires_full_pipeline() {
        let err = compile_source("print(1)\n", PipelineStop::Ir, Target::Riscv).unwrap_err();
        assert!(matches!(err, CompileError::Semantic(_)));
    }

    #[test]
    fn test_functions_and_loops_end_to_end() {
        let source = "\
def sum_to(n: int) -> int:
    total: int = 0
    i: int = 0
    while i < n:
        total = total + i
        i = i + 1
    return total
print(sum_to(10))
";
        let asm = compile_source(source, PipelineStop::All, Target::Riscv).unwrap();
        assert!(asm.contains("sum_to:"));
        assert!(asm.contains("_sum_to_return:"));
        assert!(asm.contains("__main_return:"));
        assert!(asm.contains("\tjal ra, sum_to"));
    }

    #[test]
    fn test_for_loop_end_to_end() {
        let source = "x: int = 0\nfor x in [1, 2, 3]:\n    print(x)\n";
        let asm = compile_source(source, PipelineStop::All, Target::Riscv).unwrap();
        assert!(asm.contains("_list_index_oob:"));
        assert!(asm.contains("\tjal ra, _print_int"));
    }

    #[test]
    fn test_string_program_end_to_end() {
        let source = "s: str = \"hi\"\nif s == \"hi\":\n    print(s)\nprint(input())\n";
        let asm = compile_source(source, PipelineStop::All, Target::Riscv).unwrap();
        assert!(asm.contains("\tjal ra, _str_eq"));
        assert!(asm.contains("\tjal ra, _input"));
        assert!(asm.contains("\tjal ra, _print_str"));
    }

    #[test]
    fn test_ir_stop_prints_flat_dialect() {
        let ir = compile_source("print(1 + 2)\n", PipelineStop::Ir, Target::Mlir).unwrap();
        assert!(ir.contains("choco.ir.func_def"));
        assert!(ir.contains("choco.ir.binary_expr"));
        assert!(ir.contains("\"func_name\" = \"_main\""));
    }
}
