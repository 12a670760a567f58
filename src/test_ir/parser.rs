//! TIR (Test IR) parser implementation.

use super::*;
use std::collections::HashMap;

pub fn parse_ir(text: &str) -> Result<TestIR, String> {
    let parser = Parser::new(text);
    parser.parse()
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    ir: TestIR,

    // Global maps
    funcs: HashMap<&'a str, u32>,
    func_resolves: Vec<Resolve<'a>>,
    globals: HashMap<&'a str, u32>,

    // Per-function maps
    blocks: HashMap<&'a str, u32>,
    values: HashMap<&'a str, u32>,
    block_resolves: Vec<Resolve<'a>>,
    value_resolves: Vec<Resolve<'a>>,
}

#[derive(Debug)]
struct Resolve<'a> {
    name: &'a str,
    index: u32,
}

/// A value reference before resolution.
#[derive(Debug, Clone, Copy)]
enum Operand<'a> {
    Local(&'a str),
    Global(u32),
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            ir: TestIR::new(),
            funcs: HashMap::new(),
            func_resolves: Vec::new(),
            globals: HashMap::new(),
            blocks: HashMap::new(),
            values: HashMap::new(),
            block_resolves: Vec::new(),
            value_resolves: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<TestIR, String> {
        self.skip_whitespace(true);

        while !self.is_eof() {
            let parsed = if self.current_char() == Some('@') {
                self.parse_global()
            } else {
                self.parse_function()
            };
            if let Err(e) = parsed {
                let context_start = self.pos.saturating_sub(20);
                let context_end = (self.pos + 20).min(self.text.len());
                log::error!(
                    "TIR parse error at position {}: {} (near '{}')",
                    self.pos,
                    e,
                    self.text.get(context_start..context_end).unwrap_or("")
                );
                return Err(e);
            }
            self.skip_whitespace(true);
        }

        self.resolve_all_references()?;

        Ok(self.ir)
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn current_char(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.pos += ch.len_utf8();
        }
    }

    fn skip_whitespace(&mut self, skip_newlines: bool) {
        while let Some(ch) = self.current_char() {
            if ch == ';' {
                // Skip comment line
                while let Some(ch) = self.current_char() {
                    if ch == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if ch.is_whitespace() {
                if ch == '\n' && !skip_newlines {
                    break;
                }
                self.advance();
            } else {
                break;
            }
        }
    }

    fn try_read(&mut self, ch: char) -> bool {
        self.skip_whitespace(true);
        if self.current_char() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, ch: char) -> Result<(), String> {
        if !self.try_read(ch) {
            return Err(format!("Expected '{}' but found {:?}", ch, self.current_char()));
        }
        Ok(())
    }

    fn read_identifier(&mut self) -> Result<&'a str, String> {
        self.skip_whitespace(true);
        let start = self.pos;

        match self.current_char() {
            Some(ch) if ch.is_alphabetic() || ch == '_' => {}
            Some(ch) => return Err(format!("Expected identifier but found '{}'", ch)),
            None => return Err("Expected identifier but found EOF".to_string()),
        }

        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                self.advance();
            } else {
                break;
            }
        }

        Ok(&self.text[start..self.pos])
    }

    fn read_value_name(&mut self) -> Result<&'a str, String> {
        self.expect('%')?;
        self.read_identifier()
    }

    fn read_block_name(&mut self) -> Result<&'a str, String> {
        self.expect('^')?;
        self.read_identifier()
    }

    fn read_number(&mut self) -> Result<u32, String> {
        self.skip_whitespace(true);
        let rest = &self.text[self.pos..];

        let (digits, radix) = match rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
            Some(hex) => (hex, 16),
            None => (rest, 10),
        };
        let len = digits.chars().take_while(|c| c.is_digit(radix)).count();
        if len == 0 {
            return Err("Expected number".to_string());
        }
        let number = u32::from_str_radix(&digits[..len], radix)
            .map_err(|e| format!("Failed to parse number: {}", e))?;
        self.pos += rest.len() - digits.len() + len;
        Ok(number)
    }

    /// `%local` or `@global`.
    fn read_operand(&mut self) -> Result<Operand<'a>, String> {
        self.skip_whitespace(true);
        if self.current_char() == Some('@') {
            self.advance();
            let name = self.read_identifier()?;
            let idx = self
                .globals
                .get(name)
                .copied()
                .ok_or_else(|| format!("Undefined global reference: @{}", name))?;
            Ok(Operand::Global(idx))
        } else {
            Ok(Operand::Local(self.read_value_name()?))
        }
    }

    fn push_operand(&mut self, operand: Operand<'a>) {
        match operand {
            Operand::Global(idx) => self.ir.value_operands.push(idx),
            Operand::Local(name) => {
                self.value_resolves.push(Resolve { name, index: self.ir.value_operands.len() as u32 });
                self.ir.value_operands.push(0); // Placeholder
            }
        }
    }

    fn parse_operand(&mut self) -> Result<(), String> {
        let operand = self.read_operand()?;
        self.push_operand(operand);
        Ok(())
    }

    /// Comma-separated operands up to the end of the line.
    fn parse_operand_list(&mut self) -> Result<u32, String> {
        let mut count = 0;
        self.skip_whitespace(false);
        while matches!(self.current_char(), Some('%') | Some('@')) {
            self.parse_operand()?;
            count += 1;
            self.skip_whitespace(false);
            if self.current_char() != Some(',') {
                break;
            }
            self.advance();
            self.skip_whitespace(false);
        }
        Ok(count)
    }

    fn push_block_ref(&mut self, name: &'a str) {
        self.block_resolves.push(Resolve { name, index: self.ir.value_operands.len() as u32 });
        self.ir.value_operands.push(0); // Placeholder
    }

    /// `@name = global`
    fn parse_global(&mut self) -> Result<(), String> {
        self.expect('@')?;
        let name = self.read_identifier()?;
        self.expect('=')?;
        let kw = self.read_identifier()?;
        if kw != "global" {
            return Err(format!("Expected 'global' but found '{}'", kw));
        }
        if self.globals.contains_key(name) {
            return Err(format!("Duplicate global definition: '@{}'", name));
        }

        let idx = self.ir.values.len() as u32;
        self.globals.insert(name, idx);
        self.ir.globals.push(idx);
        self.ir.values.push(Value {
            name: name.to_string(),
            value_type: ValueType::Global,
            op: Operation::None,
            call_func_idx: 0,
            op_count: 0,
            op_begin_idx: 0,
            op_end_idx: 0,
        });
        Ok(())
    }

    fn parse_function(&mut self) -> Result<(), String> {
        let func_name = self.read_identifier()?;
        let func_idx = self.ir.functions.len() as u32;

        if self.funcs.contains_key(func_name) {
            return Err(format!("Duplicate function definition: '{}'", func_name));
        }

        // Reset per-function state
        self.blocks.clear();
        self.values.clear();
        self.block_resolves.clear();
        self.value_resolves.clear();

        self.expect('(')?;
        let arg_begin_idx = self.ir.values.len() as u32;

        while !self.try_read(')') {
            let arg_name = self.read_value_name()?;
            let arg_idx = self.ir.values.len() as u32;

            self.values.insert(arg_name, arg_idx);
            self.ir.values.push(Value {
                name: arg_name.to_string(),
                value_type: ValueType::Arg,
                op: Operation::None,
                call_func_idx: 0,
                op_count: 0,
                op_begin_idx: 0,
                op_end_idx: 0,
            });

            if !self.try_read(',') && self.current_char() != Some(')') {
                return Err("Expected ',' or ')' in argument list".to_string());
            }
        }

        let arg_end_idx = self.ir.values.len() as u32;

        // Declarations end with '!'
        let declaration = self.try_read('!');
        let block_begin_idx = self.ir.blocks.len() as u32;

        if !declaration {
            self.expect('{')?;
            while !self.try_read('}') {
                if self.is_eof() {
                    return Err(format!("Unterminated function body: '{}'", func_name));
                }
                self.parse_block()?;
            }
            self.resolve_function_references()?;
        }

        self.funcs.insert(func_name, func_idx);
        self.ir.functions.push(Function {
            name: func_name.to_string(),
            declaration,
            block_begin_idx,
            block_end_idx: self.ir.blocks.len() as u32,
            arg_begin_idx,
            arg_end_idx,
        });

        Ok(())
    }

    fn parse_block(&mut self) -> Result<(), String> {
        let block_name = self.read_identifier()?;
        self.expect(':')?;

        if self.blocks.contains_key(block_name) {
            return Err(format!("Duplicate block name: '{}'", block_name));
        }
        let block_idx = self.ir.blocks.len() as u32;
        self.blocks.insert(block_name, block_idx);

        let inst_begin_idx = self.ir.values.len() as u32;
        let mut phi_end_idx = inst_begin_idx;
        let mut successor_refs = Vec::new();

        while !self.is_at_block_end() {
            if self.is_eof() {
                break;
            }

            if self.peek_phi() {
                if self.ir.values.len() as u32 > phi_end_idx {
                    return Err("PHI nodes must be at the beginning of a block".to_string());
                }
                self.parse_phi()?;
                phi_end_idx = self.ir.values.len() as u32;
            } else {
                self.parse_instruction(&mut successor_refs)?;
            }
        }

        let inst_end_idx = self.ir.values.len() as u32;

        let succ_begin_idx = self.ir.value_operands.len() as u32;
        for succ_name in successor_refs {
            self.push_block_ref(succ_name);
        }
        let succ_end_idx = self.ir.value_operands.len() as u32;

        self.ir.blocks.push(Block {
            name: block_name.to_string(),
            succ_begin_idx,
            succ_end_idx,
            inst_begin_idx,
            phi_end_idx,
            inst_end_idx,
        });

        Ok(())
    }

    fn is_at_block_end(&mut self) -> bool {
        self.skip_whitespace(true);

        if self.current_char() == Some('}') {
            return true;
        }

        // Next block starts: identifier followed by ':'
        let saved_pos = self.pos;
        let has_colon = self.read_identifier().is_ok() && self.try_read(':');
        self.pos = saved_pos;
        has_colon
    }

    fn is_at_line_end(&self) -> bool {
        for ch in self.text[self.pos..].chars() {
            match ch {
                '\n' | ';' => return true,
                ' ' | '\t' | '\r' => {}
                _ => return false,
            }
        }
        true
    }

    fn peek_phi(&mut self) -> bool {
        let saved_pos = self.pos;
        let is_phi = self.read_value_name().is_ok()
            && self.try_read('=')
            && self.read_identifier().map_or(false, |op| op == "phi");
        self.pos = saved_pos;
        is_phi
    }

    /// `%name = phi [^block, %value], ...`
    fn parse_phi(&mut self) -> Result<(), String> {
        let name = self.read_value_name()?;
        self.expect('=')?;
        let op_name = self.read_identifier()?;
        if op_name != "phi" {
            return Err(format!("Expected 'phi' but found '{}'", op_name));
        }

        let val_idx = self.ir.values.len() as u32;
        self.values.insert(name, val_idx);

        let mut incoming = Vec::new();
        loop {
            self.expect('[')?;
            let block_name = self.read_block_name()?;
            self.expect(',')?;
            let value = self.read_operand()?;
            self.expect(']')?;
            incoming.push((value, block_name));

            self.skip_whitespace(false);
            if self.current_char() != Some(',') {
                break;
            }
            self.advance();
        }

        // Values first, then blocks
        let op_begin_idx = self.ir.value_operands.len() as u32;
        for &(value, _) in &incoming {
            self.push_operand(value);
        }
        for &(_, block_name) in &incoming {
            self.push_block_ref(block_name);
        }

        self.ir.values.push(Value {
            name: name.to_string(),
            value_type: ValueType::Phi,
            op: Operation::None,
            call_func_idx: 0,
            op_count: incoming.len() as u32,
            op_begin_idx,
            op_end_idx: self.ir.value_operands.len() as u32,
        });

        Ok(())
    }

    fn parse_instruction(&mut self, successors: &mut Vec<&'a str>) -> Result<(), String> {
        self.skip_whitespace(true);

        let (name, op) = if self.current_char() == Some('%') {
            let name = self.read_value_name()?;
            self.expect('=')?;
            self.skip_whitespace(false);

            // "%v =" alone, or "%v = %a, %b": an opaque value
            let op = if self.is_at_line_end() || matches!(self.current_char(), Some('%') | Some('@')) {
                Operation::Any
            } else {
                let op_str = self.read_identifier()?;
                Operation::parse(op_str).ok_or_else(|| format!("Unknown operation: {}", op_str))?
            };
            (Some(name), op)
        } else {
            let op_str = self.read_identifier()?;
            let op = Operation::parse(op_str).ok_or_else(|| format!("Unknown operation: {}", op_str))?;
            (None, op)
        };

        let info = op.info();

        if name.is_some() && !info.is_def {
            return Err(format!("Operation '{}' does not produce a value", info.name));
        }
        if name.is_none() && info.is_def && op != Operation::Call {
            return Err(format!("Operation '{}' requires a result value", info.name));
        }

        let val_idx = self.ir.values.len() as u32;
        if let Some(name) = name {
            if self.values.insert(name, val_idx).is_some() {
                return Err(format!("Value '%{}' defined twice", name));
            }
        }

        let op_begin_idx = self.ir.value_operands.len() as u32;
        let mut call_func_idx = 0;

        let op_count = match op {
            Operation::Alloca => {
                // alloca <size>, <align>
                let size = self.read_number()?;
                self.expect(',')?;
                let align = self.read_number()?;
                self.ir.value_operands.push(size);
                self.ir.value_operands.push(align);
                0
            }
            Operation::Const => {
                // const <imm>
                let imm = self.read_number()?;
                self.ir.value_operands.push(imm);
                0
            }
            Operation::Terminate => 0,
            Operation::Br => {
                let block_name = self.read_block_name()?;
                self.push_block_ref(block_name);
                successors.push(block_name);
                0
            }
            Operation::CondBr => {
                // condbr %cond, ^true_block, ^false_block
                self.parse_operand()?;
                self.expect(',')?;
                let true_block = self.read_block_name()?;
                self.expect(',')?;
                let false_block = self.read_block_name()?;
                self.push_block_ref(true_block);
                self.push_block_ref(false_block);
                successors.push(true_block);
                successors.push(false_block);
                1
            }
            Operation::Tbz => {
                // tbz %val, ^zero_block, ^nonzero_block, <bit>
                self.parse_operand()?;
                self.expect(',')?;
                let zero_block = self.read_block_name()?;
                self.expect(',')?;
                let nonzero_block = self.read_block_name()?;
                self.expect(',')?;
                let bit = self.read_number()?;
                self.push_block_ref(zero_block);
                self.push_block_ref(nonzero_block);
                self.ir.value_operands.push(bit);
                successors.push(zero_block);
                successors.push(nonzero_block);
                1
            }
            Operation::Jump => {
                // jump ^block1, ^block2, ...
                loop {
                    let block_name = self.read_block_name()?;
                    self.push_block_ref(block_name);
                    successors.push(block_name);
                    if !self.try_read(',') {
                        break;
                    }
                }
                0
            }
            Operation::Ret => {
                // ret, or ret %value
                self.skip_whitespace(false);
                if self.is_at_line_end() {
                    0
                } else {
                    self.parse_operand()?;
                    1
                }
            }
            Operation::Add | Operation::Sub | Operation::Mul | Operation::Cmp | Operation::Store => {
                self.parse_operand()?;
                self.expect(',')?;
                self.parse_operand()?;
                2
            }
            Operation::Load => {
                self.parse_operand()?;
                1
            }
            Operation::Gep => {
                // gep %base, %idx...
                let count = self.parse_operand_list()?;
                if count == 0 {
                    return Err("gep requires a base operand".to_string());
                }
                count
            }
            Operation::Call => {
                // call @func_name or call @func_name, %arg1, %arg2
                self.skip_whitespace(false);
                if self.current_char() != Some('@') {
                    return Err("Expected '@' before function name in call".to_string());
                }
                self.advance();
                let func_name = self.read_identifier()?;
                self.func_resolves.push(Resolve { name: func_name, index: val_idx });
                call_func_idx = !0;

                self.skip_whitespace(false);
                if self.current_char() == Some(',') {
                    self.advance();
                    self.parse_operand_list()?
                } else {
                    0
                }
            }
            Operation::Any => self.parse_operand_list()?,
            Operation::None => 0,
        };

        self.ir.values.push(Value {
            name: name.map(|n| n.to_string()).unwrap_or_default(),
            value_type: if info.is_terminator { ValueType::Terminator } else { ValueType::Normal },
            op,
            call_func_idx,
            op_count,
            op_begin_idx,
            op_end_idx: self.ir.value_operands.len() as u32,
        });

        Ok(())
    }

    fn resolve_function_references(&mut self) -> Result<(), String> {
        for resolve in &self.value_resolves {
            match self.values.get(resolve.name) {
                Some(&idx) => self.ir.value_operands[resolve.index as usize] = idx,
                None => return Err(format!("Undefined value reference: %{}", resolve.name)),
            }
        }

        for resolve in &self.block_resolves {
            match self.blocks.get(resolve.name) {
                Some(&idx) => self.ir.value_operands[resolve.index as usize] = idx,
                None => return Err(format!("Undefined block reference: ^{}", resolve.name)),
            }
        }

        Ok(())
    }

    fn resolve_all_references(&mut self) -> Result<(), String> {
        // Calls may name functions defined later in the file
        for resolve in &self.func_resolves {
            match self.funcs.get(resolve.name) {
                Some(&idx) => self.ir.values[resolve.index as usize].call_func_idx = idx,
                None => return Err(format!("Undefined function reference: @{}", resolve.name)),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_add() {
        let tir = r#"
; Simple add function
func() {
entry:
  %a =
  %b =
  %c = add %a, %b
  terminate
}
"#;

        let ir = TestIR::parse(tir).unwrap();

        assert_eq!(ir.functions.len(), 1);
        assert_eq!(ir.functions[0].name, "func");

        assert_eq!(ir.blocks.len(), 1);
        assert_eq!(ir.blocks[0].name, "entry");

        assert_eq!(ir.values.len(), 4);
        assert_eq!(ir.values[0].name, "a");
        assert_eq!(ir.values[1].name, "b");
        assert_eq!(ir.values[2].name, "c");
        assert_eq!(ir.values[2].op, Operation::Add);
    }

    #[test]
    fn test_parse_with_branches() {
        let tir = r#"
br1() {
entry:
  br ^secBlock
secBlock:
  br ^retBlock
retBlock:
  ret
}
"#;

        let ir = TestIR::parse(tir).unwrap();

        assert_eq!(ir.blocks.len(), 3);
        assert_eq!(ir.blocks[0].name, "entry");
        assert_eq!(ir.blocks[1].name, "secBlock");
        assert_eq!(ir.blocks[2].name, "retBlock");
        assert_eq!(ir.values[2].op, Operation::Ret);
        assert_eq!(ir.values[2].op_count, 0);
    }

    #[test]
    fn test_parse_conditional_branch() {
        let tir = r#"
condbr1(%x) {
entry:
  condbr %x, ^ret1, ^ret2
ret1:
  ret %x
ret2:
  terminate
}
"#;

        let ir = TestIR::parse(tir).unwrap();

        let condbr = &ir.values[1];
        assert_eq!(condbr.op, Operation::CondBr);
        assert_eq!(condbr.op_count, 1);
        assert_eq!(ir.value_operands[condbr.op_begin_idx as usize], 0);
        let ret = &ir.values[2];
        assert_eq!(ret.op_count, 1);
    }

    #[test]
    fn test_parse_phi_node() {
        let tir = r#"
myfunc(%a) {
entry:
  %val =
  jump ^ret, ^other
other:
  %val2 =
  jump ^ret
ret:
  %phi = phi [^entry, %val], [^other, %val2]
  terminate
}
"#;

        let ir = TestIR::parse(tir).unwrap();

        let phi = ir.values.iter().find(|v| v.value_type == ValueType::Phi).unwrap();
        assert_eq!(phi.name, "phi");
        assert_eq!(phi.op_count, 2);
    }

    #[test]
    fn test_parse_memory_ops() {
        let tir = r#"
@g = global
mem(%x) {
entry:
  %slot = alloca 16, 8
  %elem = gep %slot, %x
  store %x, %elem
  %v = load @g
  ret %v
}
"#;

        let ir = TestIR::parse(tir).unwrap();
        assert_eq!(ir.globals, vec![0]);

        let alloca = &ir.values[2];
        assert_eq!(alloca.op, Operation::Alloca);
        assert_eq!(ir.value_operands[alloca.op_begin_idx as usize], 16);
        assert_eq!(ir.value_operands[(alloca.op_begin_idx + 1) as usize], 8);

        let gep = &ir.values[3];
        assert_eq!(gep.op, Operation::Gep);
        assert_eq!(gep.op_count, 2);

        let store = &ir.values[4];
        assert_eq!(store.op, Operation::Store);
        assert!(store.name.is_empty());

        let load = &ir.values[5];
        assert_eq!(ir.value_operands[load.op_begin_idx as usize], 0);
    }

    #[test]
    fn test_parse_call_resolves_later_function() {
        let tir = r#"
main(%x) {
entry:
  %r = call @helper, %x
  ret %r
}
helper(%y)!
"#;

        let ir = TestIR::parse(tir).unwrap();
        assert!(ir.functions[1].declaration);
        let call = &ir.values[1];
        assert_eq!(call.op, Operation::Call);
        assert_eq!(call.call_func_idx, 1);
        assert_eq!(call.op_count, 1);
    }

    #[test]
    fn test_parse_errors() {
        assert!(TestIR::parse("f() {\nentry:\n  %a = add %b, %b\n  ret\n}").is_err());
        assert!(TestIR::parse("f() {\nentry:\n  %a = load @missing\n  ret\n}").is_err());
        assert!(TestIR::parse("f() {\nentry:\n  call @nowhere\n  ret\n}").is_err());
        assert!(TestIR::parse("f() {\nentry:\n  %a = frobnicate\n}").is_err());
    }

    #[test]
    fn test_print_ir() {
        let tir = r#"
func() {
entry:
  %a =
  %b = const 7
  %c = add %a, %b
  terminate
}
"#;

        let ir = TestIR::parse(tir).unwrap();
        let output = ir.print();

        assert!(output.contains("Printing IR"));
        assert!(output.contains("Function func"));
        assert!(output.contains("Block entry"));
        assert!(output.contains("Value a (any)"));
        assert!(output.contains("Value b (const)"));
        assert!(output.contains("Op $7"));
        assert!(output.contains("Value c (add)"));
        assert!(output.contains("Op a"));
        assert!(output.contains("Op b"));
        assert!(output.contains("Value (terminate)"));
    }
}
