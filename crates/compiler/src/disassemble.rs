//! Debug-only bytecode inspection (§6: "bytecode disassembler"). Not used
//! on any hot path; the CLI's `disassemble` subcommand and `--trace` flag
//! are the only callers.

use std::fmt::Write as _;

use ember_core::{Chunk, OpCode};

pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {name} ==");
    let mut offset = 0;
    while offset < chunk.len() {
        let (line, next) = disassemble_instruction(chunk, offset);
        out.push_str(&line);
        out.push('\n');
        offset = next;
    }
    out
}

/// Formats the instruction at `offset` and returns it along with the offset
/// of the next instruction.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> (String, usize) {
    let line_marker = if offset > 0 && chunk.line_at(offset) == chunk.line_at(offset - 1) {
        "   |".to_string()
    } else {
        format!("{:4}", chunk.line_at(offset))
    };

    let opcode = match OpCode::from_byte(chunk.code[offset]) {
        Some(op) => op,
        None => return (format!("{offset:04} {line_marker} <unknown opcode>"), offset + 1),
    };

    use OpCode::*;
    match opcode {
        Nil | True | False | Pop | Equal | Greater | Less | Add | Subtract | Multiply | Divide
        | Not | Negate | Print | CloseUpvalue | Return | Inherit => {
            (simple(&line_marker, offset, opcode), offset + 1)
        }
        GetLocal | SetLocal | GetUpvalue | SetUpvalue | Call => {
            let slot = chunk.code[offset + 1];
            (format!("{offset:04} {line_marker} {opcode:?} {slot}"), offset + 2)
        }
        Constant | GetGlobal | DefineGlobal | SetGlobal | GetProperty | SetProperty | GetSuper
        | Class | Method => {
            let idx = chunk.read_u16(offset + 1);
            let extra = if matches!(opcode, Constant) {
                format!(" = {}", describe_constant(chunk, idx))
            } else {
                String::new()
            };
            (format!("{offset:04} {line_marker} {opcode:?} {idx}{extra}"), offset + 3)
        }
        Invoke | SuperInvoke => {
            let idx = chunk.read_u16(offset + 1);
            let argc = chunk.code[offset + 3];
            (format!("{offset:04} {line_marker} {opcode:?} {idx} (argc={argc})"), offset + 4)
        }
        Jump | JumpIfFalse => {
            let dist = chunk.read_u16(offset + 1);
            let target = offset + 3 + dist as usize;
            (format!("{offset:04} {line_marker} {opcode:?} -> {target}"), offset + 3)
        }
        Loop => {
            let dist = chunk.read_u16(offset + 1);
            let target = offset + 3 - dist as usize;
            (format!("{offset:04} {line_marker} {opcode:?} -> {target}"), offset + 3)
        }
        Closure => {
            let idx = chunk.read_u16(offset + 1);
            let mut next = offset + 3;
            let mut line = format!("{offset:04} {line_marker} {opcode:?} {idx}");
            let constant = chunk.constants[idx as usize];
            if constant.is_object() {
                let upvalue_count = constant.as_object().as_function().upvalue_count;
                for _ in 0..upvalue_count {
                    let is_local = chunk.code[next];
                    let slot = chunk.code[next + 1];
                    let kind = if is_local != 0 { "local" } else { "upvalue" };
                    let _ = write!(line, "\n{next:04}      | {kind} {slot}");
                    next += 2;
                }
            }
            (line, next)
        }
    }
}

fn simple(line_marker: &str, offset: usize, op: OpCode) -> String {
    format!("{offset:04} {line_marker} {op:?}")
}

fn describe_constant(chunk: &Chunk, idx: u16) -> String {
    match chunk.constants.get(idx as usize) {
        Some(value) if value.is_number() => ember_core::format_number(value.as_number()),
        Some(value) if value.is_object() && value.as_object().kind() == ember_core::ObjKind::String => {
            value.as_object().as_string().as_str().to_string()
        }
        Some(_) => "<object>".to_string(),
        None => "<out of range>".to_string(),
    }
}
