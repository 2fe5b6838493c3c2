use crate::wsa::lexer::Token;
use crate::wsa::loader::Line;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
struct Block {
    lines: Vec<Line>,
    reachable: bool,
    successors: Vec<usize>,
}

fn label_name(line: &Line) -> Option<&str> {
    match line.args().first() {
        Some(Token::Word(name)) | Some(Token::Variable(name)) => Some(name.as_str()),
        _ => None,
    }
}

/// Drops every line that control flow cannot reach from the start of the program, keeping the
/// rest in their original order.
///
/// The program is cut into blocks at each `label`, after each unconditional `jump` and after
/// each `ret`. A block falls through into the block of a following `label`; jumps and calls
/// lead to every block defining the target name.
pub fn treeshake(program: Vec<Line>) -> Vec<Line> {
    let total = program.len();
    let mut blocks = vec![Block::default()];
    let mut current = 0;
    let mut defined: HashMap<String, Vec<usize>> = HashMap::new();
    let mut references: Vec<(usize, String)> = Vec::new();

    for line in program {
        let opcode = line.opcode().unwrap_or_default();
        let name = label_name(&line).map(str::to_string);
        if opcode == "label" {
            let next = blocks.len();
            blocks.push(Block::default());
            blocks[current].successors.push(next);
            if let Some(name) = name {
                defined.entry(name).or_default().push(next);
            }
            current = next;
            blocks[current].lines.push(line);
            continue;
        }

        let ends_block = opcode == "jump" || opcode == "ret";
        if opcode.starts_with("jump") || opcode == "call" {
            if let Some(name) = name {
                references.push((current, name));
            }
        }
        blocks[current].lines.push(line);
        if ends_block {
            current = blocks.len();
            blocks.push(Block::default());
        }
    }

    for (from, name) in references {
        if let Some(targets) = defined.get(&name) {
            blocks[from].successors.extend(targets.iter().copied());
        }
    }

    let mut work = vec![0];
    while let Some(i) = work.pop() {
        if blocks[i].reachable {
            continue;
        }
        blocks[i].reachable = true;
        work.extend(blocks[i].successors.iter().copied());
    }

    let kept = blocks
        .into_iter()
        .filter(|block| block.reachable)
        .flat_map(|block| block.lines)
        .collect::<Vec<_>>();
    debug!(total, kept = kept.len(), "tree-shaken");

    kept
}
