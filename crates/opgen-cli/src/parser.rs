//! Tokenizes newline-delimited disassembly text into an `InstructionSet`.
//!
//! Each line is `<0xHEX-opcode> <mnemonic and operands...>`. Operand
//! punctuation is split into standalone syntax tokens so that register and
//! immediate fields can be compared independently of the surrounding text.

use std::collections::BTreeSet;

use anyhow::{Context, Result, bail};

use opgen::instruction::{IMMEDIATE_LIST, REGISTER_LIST};
use opgen::{ComponentKind, Instruction, InstructionSet};

/// Register names recognized out of the box. Real listings vary per
/// architecture; `--additional-registers` extends this at the command line.
const NAMED_REGISTERS: &[&str] = &[
    "sp", "pc", "lr", "fp", "gp", "sr", "pr", "gbr", "vbr", "mach", "macl", "fpul", "fpscr",
    "zero", "ra", "at", "k0", "k1",
];

pub struct RegisterTable {
    names: BTreeSet<String>,
}

impl RegisterTable {
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut names: BTreeSet<String> = NAMED_REGISTERS.iter().map(|&n| n.to_owned()).collect();
        for i in 0..32 {
            names.insert(format!("r{i}"));
        }
        Self { names }
    }

    pub fn add_all(&mut self, additional: &[String]) {
        for name in additional {
            self.names.insert(name.clone());
        }
    }

    #[must_use]
    pub fn is_register(&self, token: &str) -> bool {
        // structured-format readers collapse register lists to a placeholder
        token == REGISTER_LIST || self.names.contains(token)
    }
}

/// Characters that split the surrounding text and, unless whitespace,
/// become their own syntax token.
fn is_separator(ch: char) -> bool {
    matches!(
        ch,
        ',' | '@' | '(' | ')' | '[' | ']' | '{' | '}' | '+' | '-' | '#' | '*' | '!'
    ) || ch.is_ascii_whitespace()
}

/// Splits one line of disassembly into tokens.
#[must_use]
pub fn split_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in line.chars() {
        if is_separator(ch) {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            if !ch.is_ascii_whitespace() {
                tokens.push(ch.to_string());
            }
        } else {
            current.push(ch);
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

fn is_opcode(token: &str) -> bool {
    token.len() > 2 && (token.starts_with("0x") || token.starts_with("0X"))
}

fn is_integer(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn is_immediate(token: &str) -> bool {
    token == IMMEDIATE_LIST || is_opcode(token) || is_integer(token)
}

/// Parses a whole listing. Blank lines are skipped; every other line must
/// start with a hex opcode. Errors carry the line number and text.
pub fn parse_listing(text: &str, registers: &RegisterTable) -> Result<InstructionSet> {
    let mut set = InstructionSet::new();

    for (index, line) in text.lines().enumerate() {
        parse_line(line, registers, &mut set)
            .with_context(|| format!("line {}: {line:?}", index + 1))?;
    }

    Ok(set)
}

fn parse_line(line: &str, registers: &RegisterTable, set: &mut InstructionSet) -> Result<()> {
    let tokens = split_line(line);
    let Some((first, rest)) = tokens.split_first() else {
        return Ok(());
    };

    if !is_opcode(first) {
        bail!("first field {first:?} is not a 0x-prefixed opcode");
    }

    let mut instruction = Instruction::from_hex_opcode(first)?;
    for token in rest {
        if registers.is_register(token) {
            set.add_register(token.clone());
            instruction.push_component(ComponentKind::Register, token.clone());
        } else if is_immediate(token) {
            instruction.push_component(ComponentKind::Immediate, token.clone());
        } else {
            set.add_mnemonic(token.clone());
            instruction.push_component(ComponentKind::Syntax, token.clone());
        }
    }

    set.insert(instruction)?;
    Ok(())
}
