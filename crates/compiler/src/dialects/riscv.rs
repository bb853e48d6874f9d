//! The RISC-V dialects.
//!
//! One opcode enum serves two dialects: `riscv_ssa` carries operands and
//! results as SSA values of register type (an unbounded virtual register
//! file), while `riscv` carries physical registers as attributes and is
//! what the assembly printer understands. The register allocator rewrites
//! the former into the latter.

use std::fmt;

use crate::dialects::OpKind;
use crate::ir::{Attribute, Module, OpId, RegionId, ValueId};

/// A physical register, by ABI name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(dead_code)]
pub enum Reg {
    Zero,
    Ra,
    Sp,
    Gp,
    Tp,
    T0,
    T1,
    T2,
    T3,
    T4,
    T5,
    T6,
    S0,
    S1,
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
    A7,
}

impl Reg {
    /// The argument register for parameter `index` (`a0`..`a7`).
    pub fn arg(index: usize) -> Reg {
        match index {
            0 => Reg::A0,
            1 => Reg::A1,
            2 => Reg::A2,
            3 => Reg::A3,
            4 => Reg::A4,
            5 => Reg::A5,
            6 => Reg::A6,
            7 => Reg::A7,
            _ => panic!("only eight argument registers are available"),
        }
    }

    pub fn abi_name(&self) -> &'static str {
        match self {
            Reg::Zero => "zero",
            Reg::Ra => "ra",
            Reg::Sp => "sp",
            Reg::Gp => "gp",
            Reg::Tp => "tp",
            Reg::T0 => "t0",
            Reg::T1 => "t1",
            Reg::T2 => "t2",
            Reg::T3 => "t3",
            Reg::T4 => "t4",
            Reg::T5 => "t5",
            Reg::T6 => "t6",
            Reg::S0 => "s0",
            Reg::S1 => "s1",
            Reg::A0 => "a0",
            Reg::A1 => "a1",
            Reg::A2 => "a2",
            Reg::A3 => "a3",
            Reg::A4 => "a4",
            Reg::A5 => "a5",
            Reg::A6 => "a6",
            Reg::A7 => "a7",
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abi_name())
    }
}

/// Opcodes shared by the virtual- and physical-register dialects, plus the
/// assembler-level pseudo operations (labels, comments, directives) and
/// the SSA-only structural operations (`call`, `alloc`, `func`, `return`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(dead_code)]
pub enum RvOp {
    Lb,
    Lbu,
    Lh,
    Lhu,
    Lw,
    Sb,
    Sh,
    Sw,
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
    Sll,
    Slli,
    Srl,
    Srli,
    Sra,
    Srai,
    Add,
    Addi,
    Sub,
    Lui,
    Li,
    Auipc,
    Mv,
    Xor,
    Xori,
    Or,
    Ori,
    And,
    Andi,
    Slt,
    Slti,
    Sltu,
    Sltiu,
    J,
    Jal,
    Jalr,
    Ecall,
    Ebreak,
    Ret,
    Mul,
    Mulh,
    Mulhsu,
    Mulhu,
    Div,
    Divu,
    Rem,
    Remu,
    Label,
    Directive,
    Comment,
    Call,
    Alloc,
    Func,
    Return,
}

/// Operand shape, which decides both construction and printing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstFormat {
    /// `op rd, rs1, rs2`
    RdRs1Rs2,
    /// `op rd, rs1, imm`
    RdRs1Imm,
    /// `op rd, imm(rs1)`
    Load,
    /// `op rs1, imm(rs2)` — value register first, base register second.
    Store,
    /// `op rs1, rs2, offset`
    Branch,
    /// `op rd, imm`
    RdImm,
    /// `op rd, rs`
    RdRs,
    /// `op offset`
    Off,
    /// bare mnemonic
    NoArgs,
    /// label / directive / comment / SSA-only structure
    Meta,
}

impl RvOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            RvOp::Lb => "lb",
            RvOp::Lbu => "lbu",
            RvOp::Lh => "lh",
            RvOp::Lhu => "lhu",
            RvOp::Lw => "lw",
            RvOp::Sb => "sb",
            RvOp::Sh => "sh",
            RvOp::Sw => "sw",
            RvOp::Beq => "beq",
            RvOp::Bne => "bne",
            RvOp::Blt => "blt",
            RvOp::Bge => "bge",
            RvOp::Bltu => "bltu",
            RvOp::Bgeu => "bgeu",
            RvOp::Sll => "sll",
            RvOp::Slli => "slli",
            RvOp::Srl => "srl",
            RvOp::Srli => "srli",
            RvOp::Sra => "sra",
            RvOp::Srai => "srai",
            RvOp::Add => "add",
            RvOp::Addi => "addi",
            RvOp::Sub => "sub",
            RvOp::Lui => "lui",
            RvOp::Li => "li",
            RvOp::Auipc => "auipc",
            RvOp::Mv => "mv",
            RvOp::Xor => "xor",
            RvOp::Xori => "xori",
            RvOp::Or => "or",
            RvOp::Ori => "ori",
            RvOp::And => "and",
            RvOp::Andi => "andi",
            RvOp::Slt => "slt",
            RvOp::Slti => "slti",
            RvOp::Sltu => "sltu",
            RvOp::Sltiu => "sltiu",
            RvOp::J => "j",
            RvOp::Jal => "jal",
            RvOp::Jalr => "jalr",
            RvOp::Ecall => "ecall",
            RvOp::Ebreak => "ebreak",
            RvOp::Ret => "ret",
            RvOp::Mul => "mul",
            RvOp::Mulh => "mulh",
            RvOp::Mulhsu => "mulhsu",
            RvOp::Mulhu => "mulhu",
            RvOp::Div => "div",
            RvOp::Divu => "divu",
            RvOp::Rem => "rem",
            RvOp::Remu => "remu",
            RvOp::Label => "label",
            RvOp::Directive => "directive",
            RvOp::Comment => "comment",
            RvOp::Call => "call",
            RvOp::Alloc => "alloc",
            RvOp::Func => "func",
            RvOp::Return => "return",
        }
    }

    pub fn format(&self) -> InstFormat {
        match self {
            RvOp::Lb | RvOp::Lbu | RvOp::Lh | RvOp::Lhu | RvOp::Lw => InstFormat::Load,
            RvOp::Sb | RvOp::Sh | RvOp::Sw => InstFormat::Store,
            RvOp::Beq | RvOp::Bne | RvOp::Blt | RvOp::Bge | RvOp::Bltu | RvOp::Bgeu => {
                InstFormat::Branch
            }
            RvOp::Slli
            | RvOp::Srli
            | RvOp::Srai
            | RvOp::Addi
            | RvOp::Xori
            | RvOp::Ori
            | RvOp::Andi
            | RvOp::Slti
            | RvOp::Sltiu
            | RvOp::Jalr => InstFormat::RdRs1Imm,
            RvOp::Sll
            | RvOp::Srl
            | RvOp::Sra
            | RvOp::Add
            | RvOp::Sub
            | RvOp::Xor
            | RvOp::Or
            | RvOp::And
            | RvOp::Slt
            | RvOp::Sltu
            | RvOp::Mul
            | RvOp::Mulh
            | RvOp::Mulhsu
            | RvOp::Mulhu
            | RvOp::Div
            | RvOp::Divu
            | RvOp::Rem
            | RvOp::Remu => InstFormat::RdRs1Rs2,
            RvOp::Lui | RvOp::Li | RvOp::Auipc | RvOp::Jal => InstFormat::RdImm,
            RvOp::Mv => InstFormat::RdRs,
            RvOp::J => InstFormat::Off,
            RvOp::Ecall | RvOp::Ebreak | RvOp::Ret => InstFormat::NoArgs,
            RvOp::Label | RvOp::Directive | RvOp::Comment | RvOp::Call | RvOp::Alloc
            | RvOp::Func | RvOp::Return => InstFormat::Meta,
        }
    }
}

/// Builders for `riscv_ssa` operations (virtual registers as SSA values).
pub mod ssa {
    use super::*;

    fn reg() -> Attribute {
        Attribute::RegisterType
    }

    pub fn li(m: &mut Module, imm: i32) -> OpId {
        m.create_op(
            OpKind::RiscvSsa(RvOp::Li),
            &[],
            vec![reg()],
            vec![("immediate", Attribute::Int(imm))],
            vec![],
        )
    }

    /// Register-register-register op (`add`, `mul`, `slt`, ...).
    pub fn rrr(m: &mut Module, op: RvOp, rs1: ValueId, rs2: ValueId) -> OpId {
        debug_assert_eq!(op.format(), InstFormat::RdRs1Rs2);
        m.create_op(OpKind::RiscvSsa(op), &[rs1, rs2], vec![reg()], vec![], vec![])
    }

    /// Register-immediate op (`addi`, `slti`, `xori`, ...) and loads.
    pub fn rri(m: &mut Module, op: RvOp, rs1: ValueId, imm: i32) -> OpId {
        debug_assert!(matches!(
            op.format(),
            InstFormat::RdRs1Imm | InstFormat::Load
        ));
        m.create_op(
            OpKind::RiscvSsa(op),
            &[rs1],
            vec![reg()],
            vec![("immediate", Attribute::Int(imm))],
            vec![],
        )
    }

    /// Store of `value` at `imm(base)`.
    pub fn store(m: &mut Module, op: RvOp, value: ValueId, base: ValueId, imm: i32) -> OpId {
        debug_assert_eq!(op.format(), InstFormat::Store);
        m.create_op(
            OpKind::RiscvSsa(op),
            &[value, base],
            vec![],
            vec![("immediate", Attribute::Int(imm))],
            vec![],
        )
    }

    pub fn branch(m: &mut Module, op: RvOp, rs1: ValueId, rs2: ValueId, label: &str) -> OpId {
        debug_assert_eq!(op.format(), InstFormat::Branch);
        m.create_op(
            OpKind::RiscvSsa(op),
            &[rs1, rs2],
            vec![],
            vec![("offset", Attribute::Label(label.to_string()))],
            vec![],
        )
    }

    pub fn jump(m: &mut Module, label: &str) -> OpId {
        m.create_op(
            OpKind::RiscvSsa(RvOp::J),
            &[],
            vec![],
            vec![("offset", Attribute::Label(label.to_string()))],
            vec![],
        )
    }

    pub fn label(m: &mut Module, name: &str) -> OpId {
        m.create_op(
            OpKind::RiscvSsa(RvOp::Label),
            &[],
            vec![],
            vec![("label", Attribute::Label(name.to_string()))],
            vec![],
        )
    }

    pub fn call(m: &mut Module, func_name: &str, args: &[ValueId], has_result: bool) -> OpId {
        m.create_op(
            OpKind::RiscvSsa(RvOp::Call),
            args,
            if has_result { vec![reg()] } else { vec![] },
            vec![("func_name", Attribute::Str(func_name.to_string()))],
            vec![],
        )
    }

    /// A function-frame stack slot; the result register holds its address.
    pub fn alloc(m: &mut Module) -> OpId {
        m.create_op(OpKind::RiscvSsa(RvOp::Alloc), &[], vec![reg()], vec![], vec![])
    }

    pub fn ret(m: &mut Module, value: Option<ValueId>) -> OpId {
        let operands: Vec<ValueId> = value.into_iter().collect();
        m.create_op(OpKind::RiscvSsa(RvOp::Return), &operands, vec![], vec![], vec![])
    }

    pub fn func(m: &mut Module, name: &str, body: RegionId) -> OpId {
        m.create_op(
            OpKind::RiscvSsa(RvOp::Func),
            &[],
            vec![],
            vec![("func_name", Attribute::Str(name.to_string()))],
            vec![body],
        )
    }

    pub fn ecall(m: &mut Module, syscall_num: ValueId, args: &[ValueId]) -> OpId {
        let mut operands = vec![syscall_num];
        operands.extend_from_slice(args);
        m.create_op(OpKind::RiscvSsa(RvOp::Ecall), &operands, vec![], vec![], vec![])
    }
}

/// Builder for physical `riscv` operations, used by the register
/// allocator and the runtime-routine emitter. Collects detached ops for
/// the caller to place.
pub struct Asm<'m> {
    m: &'m mut Module,
    ops: Vec<OpId>,
}

impl<'m> Asm<'m> {
    pub fn new(m: &'m mut Module) -> Asm<'m> {
        Asm { m, ops: Vec::new() }
    }

    pub fn into_ops(self) -> Vec<OpId> {
        self.ops
    }

    fn push(
        &mut self,
        op: RvOp,
        attrs: Vec<(&str, Attribute)>,
        comment: Option<&str>,
    ) -> OpId {
        let mut attrs = attrs;
        if let Some(text) = comment {
            attrs.push(("comment", Attribute::Str(text.to_string())));
        }
        let id = self.m.create_op(OpKind::Riscv(op), &[], vec![], attrs, vec![]);
        self.ops.push(id);
        id
    }

    fn op3(&mut self, op: RvOp, rd: Reg, rs1: Reg, rs2: Reg, comment: Option<&str>) {
        self.push(
            op,
            vec![
                ("rd", Attribute::Register(rd)),
                ("rs1", Attribute::Register(rs1)),
                ("rs2", Attribute::Register(rs2)),
            ],
            comment,
        );
    }

    fn op_imm(&mut self, op: RvOp, rd: Reg, rs1: Reg, imm: i32, comment: Option<&str>) {
        self.push(
            op,
            vec![
                ("rd", Attribute::Register(rd)),
                ("rs1", Attribute::Register(rs1)),
                ("immediate", Attribute::Int(imm)),
            ],
            comment,
        );
    }

    pub fn add(&mut self, rd: Reg, rs1: Reg, rs2: Reg, comment: Option<&str>) {
        self.op3(RvOp::Add, rd, rs1, rs2, comment);
    }

    pub fn sub(&mut self, rd: Reg, rs1: Reg, rs2: Reg, comment: Option<&str>) {
        self.op3(RvOp::Sub, rd, rs1, rs2, comment);
    }

    pub fn mul(&mut self, rd: Reg, rs1: Reg, rs2: Reg, comment: Option<&str>) {
        self.op3(RvOp::Mul, rd, rs1, rs2, comment);
    }

    pub fn div(&mut self, rd: Reg, rs1: Reg, rs2: Reg, comment: Option<&str>) {
        self.op3(RvOp::Div, rd, rs1, rs2, comment);
    }

    pub fn rem(&mut self, rd: Reg, rs1: Reg, rs2: Reg, comment: Option<&str>) {
        self.op3(RvOp::Rem, rd, rs1, rs2, comment);
    }

    pub fn slt(&mut self, rd: Reg, rs1: Reg, rs2: Reg, comment: Option<&str>) {
        self.op3(RvOp::Slt, rd, rs1, rs2, comment);
    }

    pub fn sltu(&mut self, rd: Reg, rs1: Reg, rs2: Reg, comment: Option<&str>) {
        self.op3(RvOp::Sltu, rd, rs1, rs2, comment);
    }

    pub fn or(&mut self, rd: Reg, rs1: Reg, rs2: Reg, comment: Option<&str>) {
        self.op3(RvOp::Or, rd, rs1, rs2, comment);
    }

    pub fn and(&mut self, rd: Reg, rs1: Reg, rs2: Reg, comment: Option<&str>) {
        self.op3(RvOp::And, rd, rs1, rs2, comment);
    }

    pub fn addi(&mut self, rd: Reg, rs1: Reg, imm: i32, comment: Option<&str>) {
        self.op_imm(RvOp::Addi, rd, rs1, imm, comment);
    }

    pub fn slti(&mut self, rd: Reg, rs1: Reg, imm: i32, comment: Option<&str>) {
        self.op_imm(RvOp::Slti, rd, rs1, imm, comment);
    }

    pub fn li(&mut self, rd: Reg, imm: i32, comment: Option<&str>) {
        self.push(
            RvOp::Li,
            vec![
                ("rd", Attribute::Register(rd)),
                ("immediate", Attribute::Int(imm)),
            ],
            comment,
        );
    }

    pub fn mv(&mut self, rd: Reg, rs: Reg, comment: Option<&str>) {
        self.push(
            RvOp::Mv,
            vec![
                ("rd", Attribute::Register(rd)),
                ("rs", Attribute::Register(rs)),
            ],
            comment,
        );
    }

    pub fn lw(&mut self, rd: Reg, base: Reg, imm: i32, comment: Option<&str>) {
        self.op_imm(RvOp::Lw, rd, base, imm, comment);
    }

    pub fn lb(&mut self, rd: Reg, base: Reg, imm: i32, comment: Option<&str>) {
        self.op_imm(RvOp::Lb, rd, base, imm, comment);
    }

    pub fn sw(&mut self, value: Reg, base: Reg, imm: i32, comment: Option<&str>) {
        self.push(
            RvOp::Sw,
            vec![
                ("rs1", Attribute::Register(value)),
                ("rs2", Attribute::Register(base)),
                ("immediate", Attribute::Int(imm)),
            ],
            comment,
        );
    }

    pub fn sb(&mut self, value: Reg, base: Reg, imm: i32, comment: Option<&str>) {
        self.push(
            RvOp::Sb,
            vec![
                ("rs1", Attribute::Register(value)),
                ("rs2", Attribute::Register(base)),
                ("immediate", Attribute::Int(imm)),
            ],
            comment,
        );
    }

    fn branch(&mut self, op: RvOp, rs1: Reg, rs2: Reg, label: &str, comment: Option<&str>) {
        self.push(
            op,
            vec![
                ("rs1", Attribute::Register(rs1)),
                ("rs2", Attribute::Register(rs2)),
                ("offset", Attribute::Label(label.to_string())),
            ],
            comment,
        );
    }

    pub fn beq(&mut self, rs1: Reg, rs2: Reg, label: &str, comment: Option<&str>) {
        self.branch(RvOp::Beq, rs1, rs2, label, comment);
    }

    pub fn bne(&mut self, rs1: Reg, rs2: Reg, label: &str, comment: Option<&str>) {
        self.branch(RvOp::Bne, rs1, rs2, label, comment);
    }

    pub fn blt(&mut self, rs1: Reg, rs2: Reg, label: &str, comment: Option<&str>) {
        self.branch(RvOp::Blt, rs1, rs2, label, comment);
    }

    pub fn jal(&mut self, rd: Reg, label: &str, comment: Option<&str>) {
        self.push(
            RvOp::Jal,
            vec![
                ("rd", Attribute::Register(rd)),
                ("immediate", Attribute::Label(label.to_string())),
            ],
            comment,
        );
    }

    pub fn j(&mut self, label: &str, comment: Option<&str>) {
        self.push(
            RvOp::J,
            vec![("offset", Attribute::Label(label.to_string()))],
            comment,
        );
    }

    pub fn label(&mut self, name: &str) {
        self.push(
            RvOp::Label,
            vec![("label", Attribute::Label(name.to_string()))],
            None,
        );
    }

    /// A `# text` comment line.
    pub fn comment(&mut self, text: &str) {
        self.push(RvOp::Comment, vec![], Some(text));
    }

    /// A blank line in the output.
    pub fn blank(&mut self) {
        self.push(RvOp::Comment, vec![], None);
    }

    pub fn ecall(&mut self, comment: Option<&str>) {
        self.push(RvOp::Ecall, vec![], comment);
    }

    pub fn ret(&mut self) {
        self.push(RvOp::Ret, vec![], None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reg_names() {
        assert_eq!(Reg::Zero.abi_name(), "zero");
        assert_eq!(Reg::arg(0), Reg::A0);
        assert_eq!(Reg::arg(7), Reg::A7);
        assert_eq!(format!("{}", Reg::Tp), "tp");
    }

    #[test]
    fn test_formats() {
        assert_eq!(RvOp::Lw.format(), InstFormat::Load);
        assert_eq!(RvOp::Sw.format(), InstFormat::Store);
        assert_eq!(RvOp::Addi.format(), InstFormat::RdRs1Imm);
        assert_eq!(RvOp::Jal.format(), InstFormat::RdImm);
        assert_eq!(RvOp::Ret.format(), InstFormat::NoArgs);
    }

    #[test]
    fn test_asm_builder_attrs() {
        let mut m = Module::new();
        let mut asm = Asm::new(&mut m);
        asm.addi(Reg::Sp, Reg::Sp, -4, Some("Reserve space for ra"));
        asm.sw(Reg::Ra, Reg::Sp, 0, Some("Store return address"));
        let ops = asm.into_ops();
        assert_eq!(ops.len(), 2);
        assert_eq!(m.attr(ops[0], "rd"), Some(Attribute::Register(Reg::Sp)));
        assert_eq!(m.attr(ops[0], "immediate"), Some(Attribute::Int(-4)));
        assert_eq!(
            m.attr(ops[1], "comment"),
            Some(Attribute::Str("Store return address".to_string()))
        );
    }
}
