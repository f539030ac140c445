//! Whole-module disassembly (§4.6 "Given a compiled module, prints each
//! frame: its name, then one line per instruction").
//!
//! `zscript-asm::disassemble_function` handles a single function's body;
//! this just loops it over every frame in a [`Module`] in declaration order,
//! with a blank line between frames for readability.

use crate::module::Module;

/// Renders every function in `module`, in the order they were compiled,
/// separated by a blank line.
pub fn disassemble_module(module: &Module) -> String {
    module
        .functions
        .iter()
        .map(|function| zscript_asm::disassemble_function(&function.name, &function.body))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Function;

    #[test]
    fn joins_every_function_with_a_blank_line_between() {
        let mut module = Module::new();
        module.push_function(Function::new("main", vec![zscript_asm::Opcode::Halt as u8], 1));
        module.push_function(Function::new("helper", vec![zscript_asm::Opcode::Halt as u8], 1));
        let out = disassemble_module(&module);
        assert!(out.contains("main:"));
        assert!(out.contains("helper:"));
        assert!(out.contains("\n\n"));
    }
}
