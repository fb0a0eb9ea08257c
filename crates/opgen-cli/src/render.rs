//! Emits the combined instruction set as a plain-text pattern grammar.
//!
//! Rendering happens in two steps: an annotation pass derives a field name
//! for every letter-marked bit run and records it on the owning component,
//! then each pattern is printed as its rendered instruction text plus a
//! constraint expression over the named fields. Register fields also carry
//! the concrete registers they can hold, reconstructed by instantiating the
//! field's bit values against the original parsed set.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result, anyhow, bail};

use opgen::{ComponentKind, Instruction, InstructionSet};

/// Syntax tokens that attach to their neighbors without a space and are
/// never quoted in the rendered text.
const FILLER_TOKENS: &[&str] = &["", "@", "(", ")", "[", "]", "+", "-", ","];

fn is_filler(text: &str) -> bool {
    FILLER_TOKENS.contains(&text)
}

fn is_bit(ch: char) -> bool {
    ch == '0' || ch == '1'
}

/// Splits an opcode string into maximal runs: binary digits group together,
/// every marker character groups only with itself.
fn split_runs(opcode: &str) -> Vec<String> {
    let mut runs: Vec<String> = Vec::new();
    let mut run = String::new();

    for ch in opcode.chars() {
        match run.chars().last() {
            None => run.push(ch),
            Some(prev) if prev == ch || (is_bit(prev) && is_bit(ch)) => run.push(ch),
            Some(_) => {
                runs.push(std::mem::take(&mut run));
                run.push(ch);
            }
        }
    }

    if !run.is_empty() {
        runs.push(run);
    }

    runs
}

/// Enumerates every value of a register field and resolves each resulting
/// opcode in the parsed set, collecting the register names the field can
/// hold. All other combined bits are instantiated as zero, which is how the
/// original encodings were laid out before merging.
fn attached_registers(
    instruction: &Instruction,
    opcode: &str,
    run_start: usize,
    run_len: usize,
    set: &InstructionSet,
) -> Result<String> {
    let letter = opcode
        .chars()
        .nth(run_start)
        .ok_or_else(|| anyhow!("register run outside opcode {opcode:?}"))?;
    let position = instruction.position_from_letter(letter);

    let base: Vec<char> = opcode
        .chars()
        .map(|c| if is_bit(c) { c } else { '0' })
        .collect();

    if run_len >= usize::BITS as usize {
        bail!("register field of {run_len} bits is too wide to enumerate");
    }

    let mut found = Vec::new();
    for value in 0..(1usize << run_len) {
        let mut probe = base.clone();
        for bit in 0..run_len {
            probe[run_start + run_len - bit - 1] = if (value >> bit) & 1 == 1 { '1' } else { '0' };
        }
        let key: String = probe.iter().collect();

        let original = set
            .parsed()
            .get(&key)
            .ok_or_else(|| anyhow!("no parsed instruction for register probe {key}"))?;
        let component = original
            .components()
            .get(position)
            .ok_or_else(|| anyhow!("register probe {key} has no component {position}"))?;
        found.push(component.text.clone());
    }

    Ok(found.join(" "))
}

/// Per-pattern field naming: maps each letter-marked component position to
/// its grammar field name, collecting token declarations and attach lists
/// along the way.
fn assign_field_names(
    instruction: &Instruction,
    opcode: &str,
    set: &InstructionSet,
    tokens: &mut BTreeSet<String>,
    attach: &mut BTreeMap<String, String>,
) -> Result<BTreeMap<usize, String>> {
    let width = opcode.len();
    let mut names = BTreeMap::new();
    let mut bit_start = 0usize;

    for run in split_runs(opcode) {
        let Some(first) = run.chars().next() else {
            continue;
        };
        let hi = width - bit_start - 1;
        let lo = hi + 1 - run.len();

        if first.is_ascii_lowercase() {
            let name = format!("imm_{lo:02}_{hi:02}_{width}b");
            names.insert(instruction.position_from_letter(first), name.clone());
            tokens.insert(name);
        } else if first.is_ascii_uppercase() {
            let registers = attached_registers(instruction, opcode, bit_start, run.len(), set)?;

            // attach names must be unique per register list; on a collision
            // the name gets a numeric suffix
            let base = format!("reg{first}_{lo:02}_{hi:02}_{width}b");
            let mut name = base.clone();
            let mut counter = 2;
            loop {
                match attach.get(&name) {
                    None => {
                        attach.insert(name.clone(), registers);
                        break;
                    }
                    Some(existing) if *existing == registers => break,
                    Some(_) => {
                        name = format!("{base}_{counter}");
                        counter += 1;
                    }
                }
            }

            names.insert(instruction.position_from_letter(first), name.clone());
            tokens.insert(name);
        }

        bit_start += run.len();
    }

    Ok(names)
}

/// Builds the constraint expression for one pattern, e.g.
/// `opcode_12_15_16b=0b0110 & regA_08_11_16b & imm_00_03_16b`.
fn constraint_line(
    instruction: &Instruction,
    opcode: &str,
    tokens: &mut BTreeSet<String>,
) -> String {
    let width = opcode.len();
    let mut terms: Vec<String> = Vec::new();
    let mut bit_start = 0usize;

    for run in split_runs(opcode) {
        let Some(first) = run.chars().next() else {
            continue;
        };
        let hi = width - bit_start - 1;
        let lo = hi + 1 - run.len();
        bit_start += run.len();

        if is_bit(first) {
            let name = format!("opcode_{lo:02}_{hi:02}_{width}b");
            terms.push(format!("{name}=0b{run}"));
            tokens.insert(name);
        } else if first == '*' {
            // don't-care bits constrain nothing
        } else {
            let position = instruction.position_from_letter(first);
            let component = &instruction.components()[position];
            let name = component
                .field_name
                .clone()
                .unwrap_or_else(|| component.text.clone());
            terms.push(name);
        }
    }

    // registers that survived combining as literal operands still narrow
    // the pattern; letter-named fields already appeared above
    let mut seen = BTreeSet::new();
    for component in instruction.components() {
        if component.kind != ComponentKind::Register || component.field_name.is_some() {
            continue;
        }
        if seen.insert(component.text.clone()) {
            terms.push(component.text.clone());
        }
    }

    terms.join(" & ")
}

/// Renders the instruction's textual form, substituting field names for
/// combined components, e.g. `mov regA_04_07_16b, imm_00_03_16b`.
fn instruction_text(instruction: &Instruction) -> String {
    let mut output = String::new();

    for (position, component) in instruction.components().iter().enumerate() {
        if component.text == "," {
            while output.ends_with(' ') {
                output.pop();
            }
        }

        if let Some(name) = &component.field_name {
            output.push_str(name);
        } else if component.kind == ComponentKind::Syntax {
            let quote = position != 0 && !is_filler(&component.text);
            if quote {
                output.push('"');
            }
            output.push_str(&component.text);
            if quote {
                output.push('"');
            }
        } else {
            output.push_str(&component.text);
        }

        if !is_filler(&component.text) && component.kind != ComponentKind::Register {
            output.push(' ');
        }
    }

    output.trim_end().to_owned()
}

/// Annotates every pattern's components with their field names, then
/// renders the whole grammar.
pub fn render(set: &mut InstructionSet, processor: &str, endian: &str) -> Result<String> {
    let mut tokens = BTreeSet::new();
    let mut attach = BTreeMap::new();

    // derive field names against the frozen parsed view first, then write
    // the annotations back onto the pattern components
    let mut assigned: BTreeMap<String, BTreeMap<usize, String>> = BTreeMap::new();
    for (opcode, instruction) in set.patterns() {
        let names = assign_field_names(instruction, opcode, set, &mut tokens, &mut attach)
            .with_context(|| format!("pattern {opcode}"))?;
        assigned.insert(opcode.clone(), names);
    }
    set.for_each_pattern_mut(|opcode, instruction| {
        if let Some(names) = assigned.get(opcode) {
            for (&position, name) in names {
                instruction.set_component_field_name(position, name.clone());
            }
        }
    });

    let mut lines = Vec::new();
    for (opcode, instruction) in set.patterns() {
        let constraint = constraint_line(instruction, opcode, &mut tokens);
        let text = instruction_text(instruction);
        lines.push(format!("# {opcode}\n:{text} is {constraint}"));
    }

    let mut out = String::new();
    out.push_str("# Pattern grammar generated by opgen\n");
    out.push_str(&format!("processor {processor}\n"));
    out.push_str(&format!("endian {endian}\n\n"));

    out.push_str("tokens\n");
    for token in &tokens {
        out.push_str(&format!("  {token}\n"));
    }
    out.push('\n');

    for (name, registers) in &attach {
        out.push_str(&format!("attach {name} [ {registers} ]\n"));
    }
    if !attach.is_empty() {
        out.push('\n');
    }

    for line in &lines {
        out.push_str(line);
        out.push('\n');
    }

    Ok(out)
}
