use crate::ws::instruction::{FlowOp, Instruction, Label};
use std::collections::{BTreeSet, HashMap};

/// A loaded program: the instructions, the resolved label table and the breakpoints. Only the
/// breakpoint set may change after loading.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    instructions: Vec<Instruction>,
    labels: HashMap<Label, usize>,
    breakpoints: BTreeSet<usize>,
}

impl Program {
    /// Pre-scans the instructions once: every `mark` maps its label to the index following it,
    /// every debug marker registers its own index as a breakpoint. A label marked twice keeps
    /// its last position.
    pub fn load(instructions: Vec<Instruction>) -> Program {
        let mut labels = HashMap::new();
        let mut breakpoints = BTreeSet::new();
        for (i, instr) in instructions.iter().enumerate() {
            match instr {
                Instruction::Flow(FlowOp::Mark(label)) => {
                    labels.insert(label.clone(), i + 1);
                }
                Instruction::Flow(FlowOp::Debug) => {
                    breakpoints.insert(i);
                }
                _ => {}
            }
        }

        Program {
            instructions,
            labels,
            breakpoints,
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn instruction(&self, pc: usize) -> Option<&Instruction> {
        self.instructions.get(pc)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// The address execution continues at after jumping to `label`
    pub fn target(&self, label: &Label) -> Option<usize> {
        self.labels.get(label).copied()
    }

    pub fn breakpoints(&self) -> &BTreeSet<usize> {
        &self.breakpoints
    }

    pub fn is_breakpoint(&self, pc: usize) -> bool {
        self.breakpoints.contains(&pc)
    }

    /// Flips the breakpoint at `index`, returning whether it is now set
    pub fn toggle_breakpoint(&mut self, index: usize) -> bool {
        if self.breakpoints.remove(&index) {
            false
        } else {
            self.breakpoints.insert(index);
            true
        }
    }

    /// One mnemonic per line, prefixed with the instruction index and a `*` on breakpoints
    pub fn listing(&self) -> String {
        self.instructions
            .iter()
            .enumerate()
            .map(|(i, instr)| {
                let marker = if self.is_breakpoint(i) { '*' } else { ' ' };
                format!("{}{:>5}  {}\n", marker, i, instr)
            })
            .collect()
    }
}
