//! Human-readable listing of a class file.
use std::fmt::Write;

use classfile::{ClassFileError, ClassImage, Instruction, decode_all};

pub fn dump_class(bytes: &[u8]) -> Result<String, ClassFileError> {
    let image = ClassImage::parse(bytes)?;
    let mut out = String::new();
    write_class(&mut out, &image)?;
    Ok(out)
}

// Writing into a String cannot fail, so `writeln!` results are dropped.
fn write_class(out: &mut String, image: &ClassImage) -> Result<(), ClassFileError> {
    let _ = writeln!(
        out,
        "class {} extends {} (version {}.{})",
        image.this_class, image.super_class, image.major_version, image.minor_version
    );
    if let Some(source) = &image.source_file {
        let _ = writeln!(out, "source {source}");
    }

    let _ = writeln!(out, "-- constants --");
    for (idx, constant) in image.constants() {
        let entry = constant.to_string();
        let _ = writeln!(out, "#{idx:<4} {entry:<28} {}", image.describe(idx));
    }

    let _ = writeln!(out, "-- fields --");
    for field in &image.fields {
        let _ = writeln!(out, "{:#06x} {} {}", field.access, field.name, field.descriptor);
    }

    for method in &image.methods {
        let _ = writeln!(
            out,
            "-- method {:#06x} {}{} --",
            method.access, method.name, method.descriptor
        );
        let Some(code) = &method.code else { continue };
        let _ = writeln!(
            out,
            "max_stack {} max_locals {}",
            code.max_stack, code.max_locals
        );
        let mut lines = code.line_numbers.iter().peekable();
        for (at, insn) in decode_all(&code.bytes)? {
            while let Some(&&(pc, line)) = lines.peek() {
                if usize::from(pc) > at {
                    break;
                }
                let _ = writeln!(out, "  ; line {line}");
                lines.next();
            }
            let text = insn.to_string();
            let _ = match operand(image, &insn) {
                Some(detail) => writeln!(out, "{at:6}: {text:<24} // {detail}"),
                None => writeln!(out, "{at:6}: {text}"),
            };
        }
        for entry in &code.exception_table {
            let catch = match entry.catch_type {
                0 => "any".to_string(),
                idx => image.describe(idx),
            };
            let _ = writeln!(
                out,
                "  catch {}..{} -> {} {catch}",
                entry.start_pc, entry.end_pc, entry.handler_pc
            );
        }
    }
    Ok(())
}

/// The pool entry an instruction refers to, resolved.
fn operand(image: &ClassImage, insn: &Instruction) -> Option<String> {
    match insn {
        Instruction::Ldc(idx)
        | Instruction::Field { idx, .. }
        | Instruction::Invoke { idx, .. }
        | Instruction::Class { idx, .. } => Some(image.describe(*idx)),
        _ => None,
    }
}
