use std::collections::BTreeMap;

use num_bigint::BigInt;

use super::{Instruction, Mode};

fn mode_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Position => "PTR",
        Mode::Immediate => "ABS",
        Mode::Relative => "SP",
    }
}

/// `ADD(PTR 5, ABS 1, SP 0)`
pub fn render(instr: &Instruction, operands: &[BigInt]) -> String {
    let args: Vec<String> = operands
        .iter()
        .zip(instr.modes.iter())
        .map(|(value, mode)| format!("{} {}", mode_name(*mode), value))
        .collect();
    format!("{}({})", instr.opcode.mnemonic(), args.join(", "))
}

/// Linear listing of a program image.
///
/// `symbols` maps addresses to the names placed there. Words that do not
/// decode, or whose operands would run past the end, are listed as data.
pub fn listing(words: &[BigInt], symbols: &[(usize, String)]) -> String {
    let mut names: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
    for (addr, name) in symbols {
        names.entry(*addr).or_default().push(name);
    }

    let mut out = String::new();
    let mut addr = 0;
    while addr < words.len() {
        let decoded = Instruction::decode(&words[addr], addr as u64)
            .ok()
            .filter(|instr| addr + instr.opcode.arity() < words.len());
        let width = decoded.as_ref().map_or(1, |instr| instr.opcode.arity() + 1);

        for at in addr..addr + width {
            for name in names.get(&at).into_iter().flatten() {
                if at == addr {
                    out.push_str(&format!("{name}:\n"));
                } else {
                    out.push_str(&format!("  ; {name} = operand at {at}\n"));
                }
            }
        }
        let text = match &decoded {
            Some(instr) => render(instr, &words[addr + 1..addr + width]),
            None => format!("DATA {}", words[addr]),
        };
        out.push_str(&format!("{addr:>8}  {text}\n"));
        addr += width;
    }
    out
}
