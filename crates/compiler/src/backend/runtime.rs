//! Runtime support routines, appended to the module after register
//! allocation.
//!
//! Printing, input, list concatenation, string equality, and the error
//! exits are emitted as fixed instruction sequences. Heap layout is
//! `[length : word][elements : word[]]` for lists and strings (one
//! character per word); `_malloc` itself is printed as literal text by
//! the assembly printer, together with the heap data section.

use crate::dialects::riscv::{Asm, Reg};
use crate::error::CompileError;
use crate::ir::Module;

use super::regalloc::exit_ops;

/// Append every runtime routine to the module's top-level block.
pub fn add_runtime_routines(m: &mut Module) -> Result<(), CompileError> {
    add_print_int(m);
    add_print_bool(m);
    add_print_string(m);
    add_input(m);
    add_list_concat(m);
    add_str_eq(m);
    add_print_error(
        m,
        "_error_len_none",
        "TypeError: object of type 'NoneType' has no len()",
    );
    add_print_error(m, "_list_index_oob", "IndexError: list index out of range");
    add_print_error(
        m,
        "_list_index_none",
        "TypeError: 'NoneType' object is not subscriptable",
    );
    add_print_error(m, "_error_div_zero", "DivByZero: Division by zero");
    Ok(())
}

fn append(m: &mut Module, build: impl FnOnce(&mut Asm<'_>)) {
    let mut asm = Asm::new(m);
    build(&mut asm);
    let ops = asm.into_ops();
    let top = m.top_block();
    m.append_ops(top, &ops);
}

/// Sign-aware decimal itoa into a 12-byte stack buffer, then one write
/// syscall including the trailing newline.
fn add_print_int(m: &mut Module) {
    append(m, |a| {
        a.label("_print_int");
        a.addi(Reg::Sp, Reg::Sp, -12, None);
        a.mv(Reg::T1, Reg::A0, None);
        a.li(Reg::T2, 10, None);
        a.slti(Reg::T6, Reg::T1, 0, None);
        a.slti(Reg::T6, Reg::T1, 0, None);
        a.li(Reg::T5, 2, None);
        a.mul(Reg::T6, Reg::T5, Reg::T6, None);
        a.li(Reg::T5, 1, None);
        a.sub(Reg::T5, Reg::T5, Reg::T6, None);
        a.mul(Reg::T1, Reg::T5, Reg::T1, None);
        a.mv(Reg::T6, Reg::Zero, None);

        for idx in (2..=10).rev() {
            a.rem(Reg::T0, Reg::T1, Reg::T2, None);
            a.addi(Reg::T0, Reg::T0, 48, None);
            a.slti(Reg::T3, Reg::T1, 1, None);
            a.add(Reg::T6, Reg::T6, Reg::T3, None);
            a.sb(Reg::T0, Reg::Sp, idx, None);
            a.div(Reg::T1, Reg::T1, Reg::T2, None);
        }

        a.rem(Reg::T0, Reg::T1, Reg::T2, None);
        a.addi(Reg::T0, Reg::T0, 48, None);
        a.slti(Reg::T3, Reg::T1, 1, None);
        a.slt(Reg::T4, Reg::Zero, Reg::A0, None);
        a.slt(Reg::T5, Reg::A0, Reg::Zero, None);
        a.or(Reg::T4, Reg::T4, Reg::T5, None);
        a.and(Reg::T3, Reg::T3, Reg::T4, None);
        a.add(Reg::T6, Reg::T6, Reg::T3, None);
        a.sb(Reg::T0, Reg::Sp, 1, None);
        a.div(Reg::T1, Reg::T1, Reg::T2, None);

        a.slti(Reg::T5, Reg::T5, -1, None);
        a.add(Reg::T6, Reg::T6, Reg::T5, None);
        a.li(Reg::T5, 45, None);
        a.add(Reg::T4, Reg::Sp, Reg::T6, None);
        a.sb(Reg::T5, Reg::T4, 0, None);
        a.li(Reg::T4, -1, None);
        a.slt(Reg::T3, Reg::T4, Reg::A0, None);
        a.add(Reg::T6, Reg::T6, Reg::T3, None);

        a.li(Reg::T0, 10, None);
        a.sb(Reg::T0, Reg::Sp, 11, None);
        a.li(Reg::A0, 1, None);
        a.mv(Reg::A1, Reg::Sp, None);
        a.add(Reg::A1, Reg::A1, Reg::T6, None);
        a.li(Reg::A2, 12, None);
        a.sub(Reg::A2, Reg::A2, Reg::T6, None);
        a.li(Reg::A7, 64, None);
        a.ecall(None);
        a.addi(Reg::Sp, Reg::Sp, 12, None);
        a.ret();
    });
}

/// Place `message` byte by byte on the stack (4-byte aligned); returns
/// the reserved size.
fn string_on_stack(a: &mut Asm<'_>, message: &str) -> i32 {
    let len = message.len() as i32;
    let size = len + (4 - len).rem_euclid(4);
    a.addi(Reg::Sp, Reg::Sp, -size, None);
    for (idx, byte) in message.bytes().enumerate() {
        a.li(Reg::T0, byte as i32, None);
        a.sb(Reg::T0, Reg::Sp, idx as i32, None);
    }
    size
}

fn print_message(a: &mut Asm<'_>, message: &str) {
    let size = string_on_stack(a, message);
    a.li(Reg::A0, 1, None); // stdout stream
    a.mv(Reg::A1, Reg::Sp, None); // string pointer
    a.li(Reg::A2, message.len() as i32, None); // string size
    a.li(Reg::A7, 64, None); // print string code
    a.ecall(None);
    a.addi(Reg::Sp, Reg::Sp, size, None);
}

/// Branch-free selection between `"False\n"` and `"True\n"` stored
/// back-to-back on the stack.
fn add_print_bool(m: &mut Module) {
    append(m, |a| {
        a.label("_print_bool");
        let size = string_on_stack(a, "False\n\0True\n\0");
        a.li(Reg::T1, 7, None);
        a.sltu(Reg::T2, Reg::Zero, Reg::A0, None);
        a.mul(Reg::T1, Reg::T1, Reg::T2, None);
        a.add(Reg::T1, Reg::T1, Reg::Sp, None);
        a.li(Reg::T3, 6, None);
        a.sltu(Reg::T4, Reg::Zero, Reg::A0, None);
        a.sub(Reg::T4, Reg::T3, Reg::T4, None);
        a.li(Reg::A0, 1, None);
        a.mv(Reg::A1, Reg::T1, None);
        a.mv(Reg::A2, Reg::T4, None);
        a.li(Reg::A7, 64, None);
        a.ecall(None);
        a.addi(Reg::Sp, Reg::Sp, size, None);
        a.ret();
    });
}

/// Copy the word-per-character string into a byte-packed stack buffer,
/// append a newline, write it out.
fn add_print_string(m: &mut Module) {
    append(m, |a| {
        a.label("_print_str");
        a.addi(Reg::T0, Reg::A0, 0, Some("Get address of string object"));
        a.lw(Reg::T2, Reg::T0, 0, Some("Load length of string"));
        a.li(Reg::T1, 0, Some("Set loop counter to zero"));
        a.sub(
            Reg::Sp,
            Reg::Sp,
            Reg::T2,
            Some("Expand stack pointer by number of string elements"),
        );
        a.addi(Reg::Sp, Reg::Sp, -1, Some("Expand stack pointer for newline"));
        a.beq(Reg::T1, Reg::T2, "_print_str_loop_finished", None);
        a.label("_print_str_loop_header");
        a.li(Reg::T6, 4, Some("Number of bytes per element"));
        a.mul(Reg::T3, Reg::T1, Reg::T6, Some("Distance from pointer in bytes"));
        a.add(
            Reg::T4,
            Reg::T0,
            Reg::T3,
            Some("The address of the element in the string"),
        );
        a.lw(Reg::T5, Reg::T4, 4, None);
        a.add(
            Reg::T4,
            Reg::Sp,
            Reg::T1,
            Some("The address of the element on the stack"),
        );
        a.sb(Reg::T5, Reg::T4, 0, Some("Store character on stack"));
        a.addi(Reg::T1, Reg::T1, 1, Some("Increment loop counter"));
        a.bne(Reg::T1, Reg::T2, "_print_str_loop_header", Some("Continue loop"));
        a.label("_print_str_loop_finished");
        a.add(
            Reg::T4,
            Reg::Sp,
            Reg::T1,
            Some("The address of the element on the stack"),
        );
        a.li(Reg::T5, '\n' as i32, Some("Store newline character in output string"));
        a.sb(Reg::T5, Reg::T4, 0, Some("Store character on stack"));
        a.li(Reg::A0, 1, Some("Print to stdout"));
        a.mv(
            Reg::A1,
            Reg::Sp,
            Some("syscall argument: the start address is the stack pointer"),
        );
        a.addi(Reg::T3, Reg::T2, 1, Some("Make room for newline"));
        a.mv(Reg::A2, Reg::T3, Some("syscall argument: length of the string"));
        a.li(Reg::A7, 64, Some("Request the print system call"));
        a.ecall(Some("Trigger the system call"));
        a.addi(Reg::Sp, Reg::Sp, 1, Some("Free the stack for newline"));
        a.add(Reg::Sp, Reg::Sp, Reg::T2, Some("Free the stack"));
        a.ret();
    });
}

/// Read a line into a 1020-byte stack buffer, then copy it to the heap
/// one word per character.
fn add_input(m: &mut Module) {
    append(m, |a| {
        a.label("_input");
        a.addi(Reg::Sp, Reg::Sp, -1024, None);
        a.sw(Reg::Ra, Reg::Sp, 1020, None);
        a.li(Reg::A0, 0, None);
        a.mv(Reg::A1, Reg::Sp, None);
        a.li(Reg::A2, 1020, None);
        a.li(Reg::A7, 63, None);
        a.ecall(None);
        a.li(Reg::T1, 4, None);
        a.mv(Reg::T4, Reg::A0, None);
        a.addi(Reg::T4, Reg::T4, -1, None);
        a.mul(Reg::A0, Reg::A0, Reg::T1, None);
        a.add(Reg::A0, Reg::A0, Reg::T1, None);
        a.jal(Reg::Ra, "_malloc", Some("Allocate memory for new list"));
        a.li(Reg::T1, 4, None);
        a.sw(Reg::T4, Reg::A0, 0, None);
        a.li(Reg::T5, 0, None);
        a.beq(Reg::T4, Reg::T5, "_input_loop_finished", None);
        a.label("_input_loop_header");
        a.add(Reg::T3, Reg::Sp, Reg::T5, None);
        a.lb(Reg::T6, Reg::T3, 0, None);
        a.mul(Reg::T3, Reg::T5, Reg::T1, None);
        a.add(Reg::T3, Reg::A0, Reg::T3, None);
        a.sw(Reg::T6, Reg::T3, 4, None);
        a.addi(Reg::T5, Reg::T5, 1, None);
        a.bne(Reg::T4, Reg::T5, "_input_loop_header", None);
        a.label("_input_loop_finished");
        a.lw(Reg::Ra, Reg::Sp, 1020, None);
        a.addi(Reg::Sp, Reg::Sp, 1024, None);
        a.ret();
    });
}

/// Allocate `len(a) + len(b)` elements, then copy both payloads.
fn add_list_concat(m: &mut Module) {
    append(m, |a| {
        a.label("_list_concat");
        a.addi(Reg::Sp, Reg::Sp, -24, Some("Reserve stack space"));
        a.lw(Reg::T0, Reg::A0, 0, Some("Load length of list a"));
        a.lw(Reg::T1, Reg::A1, 0, Some("Load length of list b"));
        a.add(Reg::T2, Reg::T0, Reg::T1, Some("Compute length of overall list"));
        a.li(Reg::T3, 4, Some("Load size of a word in bytes"));
        a.mul(
            Reg::T4,
            Reg::T2,
            Reg::T3,
            Some("Compute amount of storage for list elements"),
        );
        a.addi(
            Reg::T4,
            Reg::T4,
            4,
            Some("Also consider space needed to store list size"),
        );
        a.sw(Reg::Ra, Reg::Sp, 0, Some("Save return address"));
        a.sw(Reg::T0, Reg::Sp, 4, Some("Save length of list a"));
        a.sw(Reg::T1, Reg::Sp, 8, Some("Save length of list b"));
        a.sw(Reg::T2, Reg::Sp, 12, Some("Save length of new list"));
        a.sw(Reg::A0, Reg::Sp, 16, Some("Save base ptr of list a"));
        a.sw(Reg::A1, Reg::Sp, 20, Some("Save base ptr of list b"));
        a.addi(Reg::A0, Reg::T4, 0, None);
        a.jal(Reg::Ra, "_malloc", Some("Allocate memory for new list"));
        a.lw(Reg::Ra, Reg::Sp, 0, Some("Restore return address"));
        a.lw(Reg::T0, Reg::Sp, 4, Some("Restore length of list a"));
        a.lw(Reg::T1, Reg::Sp, 8, Some("Restore length of list b"));
        a.lw(Reg::T2, Reg::Sp, 12, Some("Restore length of new list"));
        a.lw(Reg::T3, Reg::Sp, 16, Some("Restore base ptr of list a"));
        a.lw(Reg::T4, Reg::Sp, 20, Some("Restore base ptr of list b"));
        a.sw(Reg::T2, Reg::A0, 0, Some("Store length of new list in list"));
        a.li(Reg::T5, 0, Some("Set loop counter"));
        a.addi(Reg::T6, Reg::A0, 0, None);
        a.beq(Reg::T0, Reg::Zero, "_list_concat_repeat_first_end", None);
        a.label("_list_concat_repeat_first");
        a.addi(Reg::T5, Reg::T5, 1, None);
        a.addi(Reg::T3, Reg::T3, 4, None);
        a.addi(Reg::T6, Reg::T6, 4, None);
        a.lw(Reg::T2, Reg::T3, 0, Some("Load list element from a"));
        a.sw(Reg::T2, Reg::T6, 0, Some("Store list element in new list"));
        a.bne(Reg::T5, Reg::T0, "_list_concat_repeat_first", None);
        a.label("_list_concat_repeat_first_end");
        a.li(Reg::T5, 0, Some("Set loop counter"));
        a.beq(Reg::T1, Reg::Zero, "_list_concat_repeat_second_end", None);
        a.label("_list_concat_repeat_second");
        a.addi(Reg::T5, Reg::T5, 1, None);
        a.addi(Reg::T4, Reg::T4, 4, None);
        a.addi(Reg::T6, Reg::T6, 4, None);
        a.lw(Reg::T2, Reg::T4, 0, Some("Load list element from b"));
        a.sw(Reg::T2, Reg::T6, 0, Some("Store list element in new list"));
        a.bne(Reg::T5, Reg::T1, "_list_concat_repeat_second", None);
        a.label("_list_concat_repeat_second_end");
        a.addi(Reg::Sp, Reg::Sp, 24, Some("Free stack space"));
        a.ret();
    });
}

/// Length compare, then element-by-element word compare.
fn add_str_eq(m: &mut Module) {
    append(m, |a| {
        a.label("_str_eq");
        a.lw(Reg::T0, Reg::A0, 0, Some("Load length of first string"));
        a.lw(Reg::T1, Reg::A1, 0, Some("Load length of second string"));
        a.bne(
            Reg::T0,
            Reg::T1,
            "_str_eq_return_false",
            Some("return false if length are not equal"),
        );
        a.beq(
            Reg::T0,
            Reg::Zero,
            "_str_eq_return_true",
            Some("return true if both length are equal to 0"),
        );
        a.addi(Reg::T2, Reg::A0, 4, Some("First string index iterator"));
        a.addi(Reg::T3, Reg::A1, 4, Some("Second string index iterator"));
        a.li(Reg::T5, 4, Some("Size of an integer"));
        a.mul(Reg::T5, Reg::T0, Reg::T5, Some("Size of the strings in bytes"));
        a.add(
            Reg::T4,
            Reg::A0,
            Reg::T5,
            Some("First string iterator last element"),
        );
        a.addi(Reg::T4, Reg::T4, 4, Some("First string end iterator"));
        a.label("_str_eq_loop_begin");
        a.lw(Reg::T5, Reg::T2, 0, Some("Get the first string character"));
        a.lw(Reg::T6, Reg::T3, 0, Some("Get the second string character"));
        a.bne(
            Reg::T5,
            Reg::T6,
            "_str_eq_return_false",
            Some("If the characters are different, return false"),
        );
        a.addi(Reg::T2, Reg::T2, 4, None);
        a.addi(Reg::T3, Reg::T3, 4, None);
        a.blt(
            Reg::T2,
            Reg::T4,
            "_str_eq_loop_begin",
            Some("If we are not at the end of the string, continue"),
        );
        a.label("_str_eq_return_true");
        a.li(Reg::A0, 1, None);
        a.ret();
        a.label("_str_eq_return_false");
        a.li(Reg::A0, 0, None);
        a.ret();
    });
}

/// A labeled error handler: print the message, exit(1).
fn add_print_error(m: &mut Module, label: &str, message: &str) {
    append(m, |a| {
        a.label(label);
        print_message(a, message);
    });
    let exit = exit_ops(m, 1);
    let top = m.top_block();
    m.append_ops(top, &exit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::OpKind;
    use crate::dialects::riscv::RvOp;
    use crate::ir::Attribute;

    fn labels(m: &Module) -> Vec<String> {
        m.walk()
            .into_iter()
            .filter(|op| m.kind(*op) == OpKind::Riscv(RvOp::Label))
            .filter_map(|op| match m.attr(op, "label") {
                Some(Attribute::Label(l)) => Some(l),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_all_routines_present() {
        let mut m = Module::new();
        add_runtime_routines(&mut m).unwrap();
        let labels = labels(&m);
        for expected in [
            "_print_int",
            "_print_bool",
            "_print_str",
            "_input",
            "_list_concat",
            "_str_eq",
            "_error_len_none",
            "_list_index_oob",
            "_list_index_none",
            "_error_div_zero",
        ] {
            assert!(labels.contains(&expected.to_string()), "missing {}", expected);
        }
    }

    #[test]
    fn test_print_int_buffer_is_twelve_bytes() {
        let mut m = Module::new();
        add_print_int(&mut m);
        let first_addi = m
            .walk()
            .into_iter()
            .find(|op| m.kind(*op) == OpKind::Riscv(RvOp::Addi))
            .unwrap();
        assert_eq!(m.attr(first_addi, "immediate"), Some(Attribute::Int(-12)));
    }

    #[test]
    fn test_error_routines_exit_with_one() {
        let mut m = Module::new();
        add_print_error(&mut m, "_error_div_zero", "DivByZero: Division by zero");
        let ops = m.walk();
        // The exit code li a0, 1 followed by li a7, 93.
        let mut found_exit = false;
        for pair in ops.windows(2) {
            let a0 = m.attr(pair[0], "rd") == Some(Attribute::Register(Reg::A0))
                && m.attr(pair[0], "immediate") == Some(Attribute::Int(1));
            let a7 = m.attr(pair[1], "rd") == Some(Attribute::Register(Reg::A7))
                && m.attr(pair[1], "immediate") == Some(Attribute::Int(93));
            if a0 && a7 {
                found_exit = true;
            }
        }
        assert!(found_exit);
    }

    #[test]
    fn test_input_reads_from_stdin() {
        let mut m = Module::new();
        add_input(&mut m);
        // li a7, 63 requests the read syscall.
        let has_read = m.walk().into_iter().any(|op| {
            m.kind(op) == OpKind::Riscv(RvOp::Li)
                && m.attr(op, "rd") == Some(Attribute::Register(Reg::A7))
                && m.attr(op, "immediate") == Some(Attribute::Int(63))
        });
        assert!(has_read);
    }
}
