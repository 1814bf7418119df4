//! Test MIPS64 code generation and encoding.
//!
//! These tests check the correspondence between assembly text, hex words and
//! binary words, the encode/decode inverse, and the spill/reload discipline of
//! the register allocator under a small register pool. Emitted words are also
//! executed on a minimal MIPS64 model and the resulting memory is compared with
//! the interpreter's variable values.

use hashbrown::HashMap;

use flexc::core::{CompilationSession, Reg, SessionConfig};
use flexc::front::{BinaryOp, Node, VarType};
use flexc::mips64::encoder::{SCRATCH0, SCRATCH1, ZERO};
use flexc::mips64::{CodegenConfig, GeneratedCode, MachineInst};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn num(v: i64) -> Node {
    Node::number(v, 1)
}

fn add(l: Node, r: Node) -> Node {
    Node::binary(BinaryOp::Add, l, r, 1)
}

/// `nmbr x = ((1 + 2) + (3 + 4)) + ((5 + 6) + (7 + 8))`
fn balanced_sum() -> Node {
    Node::program(vec![Node::declaration(
        VarType::Number,
        "x",
        Some(add(
            add(add(num(1), num(2)), add(num(3), num(4))),
            add(add(num(5), num(6)), add(num(7), num(8))),
        )),
        1,
    )])
}

fn mixed_program() -> Node {
    Node::program(vec![
        Node::declaration_list(
            vec![
                Node::declaration(VarType::Number, "a", Some(num(7)), 1),
                Node::declaration(VarType::Number, "b", Some(num(3)), 1),
            ],
            1,
        ),
        Node::declaration(VarType::Character, "c", Some(Node::character(b'a', 2)), 2),
        Node::declaration(
            VarType::Flex,
            "r",
            Some(Node::binary(
                BinaryOp::Sub,
                Node::binary(BinaryOp::Mul, Node::ident("a", 3), Node::ident("b", 3), 3),
                Node::binary(BinaryOp::Div, Node::ident("a", 3), Node::ident("b", 3), 3),
                3,
            )),
            3,
        ),
        Node::compound_assignment("r", BinaryOp::Mul, num(-2), 4),
        Node::assignment("c", Node::binary(BinaryOp::Add, Node::ident("c", 5), num(1), 5), 5),
        Node::show(Node::concat(Node::ident("r", 6), Node::ident("c", 6), 6), 6),
    ])
}

fn generate(ast: &Node, config: CodegenConfig) -> GeneratedCode {
    let mut session = CompilationSession::new(SessionConfig {
        optimize: true,
        codegen: config,
    });
    let lowered = session.lower(ast).unwrap();
    session.generate_code(&lowered).unwrap()
}

fn registers(inst: &MachineInst) -> Vec<u8> {
    match *inst {
        MachineInst::Daddiu { rt, rs, .. } => vec![rt.0, rs.0],
        MachineInst::Ld { rt, base, .. } | MachineInst::Sd { rt, base, .. } => vec![rt.0, base.0],
        MachineInst::Daddu { rd, rs, rt } | MachineInst::Dsubu { rd, rs, rt } => vec![rd.0, rs.0, rt.0],
        MachineInst::Dmult { rs, rt } | MachineInst::Ddiv { rs, rt } => vec![rs.0, rt.0],
        MachineInst::Mflo { rd } => vec![rd.0],
    }
}

#[test]
fn test_decode_inverts_every_emitted_word() {
    init();
    let code = generate(&mixed_program(), CodegenConfig::default());
    assert!(!code.instructions.is_empty());

    for (inst, word) in code.instructions.iter().zip(code.words()) {
        assert_eq!(MachineInst::decode(word).unwrap(), *inst, "word {word:#010x}");
    }
}

#[test]
fn test_text_hex_and_binary_correspond() {
    init();
    let code = generate(&mixed_program(), CodegenConfig::default());

    let asm_lines: Vec<&str> = code
        .assembly
        .split(".code\n")
        .nth(1)
        .unwrap()
        .lines()
        .collect();
    let hex = code.hex();
    let binary = code.binary();
    assert_eq!(asm_lines.len(), code.instructions.len());
    assert_eq!(hex.len(), code.instructions.len());
    assert_eq!(binary.len(), code.instructions.len());

    for ((line, h), b) in asm_lines.iter().zip(&hex).zip(&binary) {
        assert_eq!(h.len(), 10);
        assert!(h.starts_with("0x"));
        assert_eq!(h[2..].to_uppercase(), h[2..]);
        assert_eq!(b.len(), 32);
        let from_hex = u32::from_str_radix(&h[2..], 16).unwrap();
        let from_bin = u32::from_str_radix(b, 2).unwrap();
        assert_eq!(from_hex, from_bin);
        assert_eq!(line.trim(), MachineInst::decode(from_hex).unwrap().to_string());
    }

    assert_eq!(code.hex_text().lines().count(), hex.len());
    assert_eq!(code.binary_text().lines().count(), binary.len());
}

#[test]
fn test_data_section_lists_symbols_in_offset_order() {
    init();
    let code = generate(&mixed_program(), CodegenConfig::default());
    assert!(code.assembly.starts_with(
        ".data\na: .word64 0\nb: .word64 0\nc: .word64 0\nr: .word64 0\n.code\n"
    ));
    assert!(!code.assembly.contains("tmp_storage"));
}

#[test]
fn test_default_pool_uses_only_expected_registers() {
    init();
    let code = generate(&balanced_sum(), CodegenConfig::default());
    assert_eq!(code.spills, 0);
    assert_eq!(code.reloads, 0);

    let allowed: Vec<u8> = (8..16).chain([ZERO.0, SCRATCH0.0, SCRATCH1.0]).collect();
    for inst in &code.instructions {
        for reg in registers(inst) {
            assert!(allowed.contains(&reg), "unexpected register {reg} in {inst}");
        }
    }
}

#[test]
fn test_small_pool_spills_and_reloads() {
    init();
    let config = CodegenConfig {
        register_count: 2,
        ..CodegenConfig::default()
    };
    let code = generate(&balanced_sum(), config);
    assert!(code.spills > 0);
    assert!(code.reloads > 0);
    assert!(code.assembly.contains("tmp_storage: .space "));

    // Only $t0 and $t1 from the pool.
    for inst in &code.instructions {
        for reg in registers(inst) {
            assert!([0, 8, 9, 24, 25].contains(&reg), "unexpected register {reg} in {inst}");
        }
    }

    // Every reload reads a slot some earlier spill wrote.
    let base = config.temp_storage_base as i16;
    let mut written = Vec::new();
    for inst in &code.instructions {
        match *inst {
            MachineInst::Sd { offset, .. } if offset >= base => written.push(offset),
            MachineInst::Ld { offset, .. } if offset >= base => {
                assert!(written.contains(&offset), "reload of unwritten slot {offset}");
            }
            _ => {}
        }
    }
}

#[test]
fn test_annotated_output_keeps_word_correspondence() {
    init();
    let config = CodegenConfig {
        annotate: true,
        ..CodegenConfig::default()
    };
    let code = generate(&mixed_program(), config);
    let body = code.assembly.split(".code\n").nth(1).unwrap();

    let comments = body.lines().filter(|l| l.trim_start().starts_with(';')).count();
    let instructions = body.lines().filter(|l| !l.trim_start().starts_with(';')).count();
    assert!(comments > 0);
    assert_eq!(instructions, code.hex().len());
    assert!(body.contains("; t3 = a * b"));
    assert!(body.contains("; r = t3 - t4"));
}

#[test]
fn test_variables_reload_at_every_use() {
    init();
    // nmbr a = 4
    // nmbr b = a + a
    let ast = Node::program(vec![
        Node::declaration(VarType::Number, "a", Some(num(4)), 1),
        Node::declaration(
            VarType::Number,
            "b",
            Some(add(Node::ident("a", 2), Node::ident("a", 2))),
            2,
        ),
    ]);
    let code = generate(&ast, CodegenConfig::default());
    let text: Vec<String> = code.instructions.iter().map(ToString::to_string).collect();
    assert_eq!(
        text,
        vec![
            "daddiu $t8, $zero, 4",
            "sd $t8, 0($zero)",
            "ld $t8, 0($zero)",
            "ld $t9, 0($zero)",
            "daddu $t8, $t8, $t9",
            "sd $t8, 8($zero)",
        ]
    );
}

/// Just enough of a MIPS64 core to run generated code: the register file, LO
/// and a doubleword memory addressed by byte.
#[derive(Default)]
struct Machine {
    regs: [i64; 32],
    lo: i64,
    memory: HashMap<i64, i64>,
}

impl Machine {
    fn get(&self, reg: Reg) -> i64 {
        self.regs[reg.0 as usize]
    }

    fn set(&mut self, reg: Reg, value: i64) {
        if reg != ZERO {
            self.regs[reg.0 as usize] = value;
        }
    }

    fn run(&mut self, words: &[u32]) {
        for &word in words {
            match MachineInst::decode(word).unwrap() {
                MachineInst::Daddiu { rt, rs, imm } => {
                    self.set(rt, self.get(rs).wrapping_add(i64::from(imm)));
                }
                MachineInst::Ld { rt, base, offset } => {
                    let addr = self.get(base) + i64::from(offset);
                    let value = *self.memory.get(&addr).unwrap_or_else(|| panic!("load of unwritten {addr:#x}"));
                    self.set(rt, value);
                }
                MachineInst::Sd { rt, base, offset } => {
                    let addr = self.get(base) + i64::from(offset);
                    self.memory.insert(addr, self.get(rt));
                }
                MachineInst::Daddu { rd, rs, rt } => self.set(rd, self.get(rs).wrapping_add(self.get(rt))),
                MachineInst::Dsubu { rd, rs, rt } => self.set(rd, self.get(rs).wrapping_sub(self.get(rt))),
                MachineInst::Dmult { rs, rt } => self.lo = self.get(rs).wrapping_mul(self.get(rt)),
                MachineInst::Ddiv { rs, rt } => {
                    assert_ne!(self.get(rt), 0, "division by zero in generated code");
                    self.lo = self.get(rs).wrapping_div(self.get(rt));
                }
                MachineInst::Mflo { rd } => self.set(rd, self.lo),
            }
        }
    }
}

/// Deterministic xorshift so failures reproduce.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }

    fn literal(&mut self) -> i64 {
        self.below(81) as i64 - 40
    }

    fn nonzero(&mut self) -> i64 {
        match self.literal() {
            0 => 7,
            v => v,
        }
    }
}

const VARS: [&str; 4] = ["a", "b", "c", "d"];

fn random_expr(rng: &mut Rng, depth: u32, line: u32) -> Node {
    if depth == 0 || rng.below(4) == 0 {
        return match rng.below(2) {
            0 => Node::number(rng.literal(), line),
            _ => Node::ident(VARS[rng.below(4) as usize], line),
        };
    }
    let left = random_expr(rng, depth - 1, line);
    match rng.below(4) {
        0 => Node::binary(BinaryOp::Add, left, random_expr(rng, depth - 1, line), line),
        1 => Node::binary(BinaryOp::Sub, left, random_expr(rng, depth - 1, line), line),
        2 => Node::binary(BinaryOp::Mul, left, random_expr(rng, depth - 1, line), line),
        _ => Node::binary(BinaryOp::Div, left, Node::number(rng.nonzero(), line), line),
    }
}

fn random_program(seed: u64) -> Node {
    let mut rng = Rng(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1);
    let mut stmts: Vec<Node> = VARS
        .iter()
        .map(|name| Node::declaration(VarType::Number, name, Some(Node::number(rng.literal(), 1)), 1))
        .collect();
    for line in 2..10 {
        let target = VARS[rng.below(4) as usize];
        let stmt = match rng.below(5) {
            0 => Node::compound_assignment(target, BinaryOp::Add, random_expr(&mut rng, 2, line), line),
            1 => Node::compound_assignment(target, BinaryOp::Mul, random_expr(&mut rng, 1, line), line),
            2 => Node::compound_assignment(target, BinaryOp::Div, Node::number(rng.nonzero(), line), line),
            _ => Node::assignment(target, random_expr(&mut rng, 3, line), line),
        };
        stmts.push(stmt);
    }
    Node::program(stmts)
}

/// Run `ast` through the interpreter and through generated code with
/// `register_count` registers; every variable must end up with the same value.
fn assert_machine_matches_interpreter(ast: &Node, register_count: usize) {
    let mut session = CompilationSession::new(SessionConfig {
        optimize: true,
        codegen: CodegenConfig {
            register_count,
            ..CodegenConfig::default()
        },
    });
    let mut lowered = session.lower(ast).unwrap();
    let code = session.generate_code(&lowered).unwrap();
    session.run_to_string(&mut lowered).unwrap();

    let mut machine = Machine::default();
    machine.run(&code.words());

    for sym in lowered.symbols.iter() {
        let offset = i64::from(lowered.symbols.offset_of(&sym.name).unwrap());
        assert_eq!(
            machine.memory.get(&offset).copied().unwrap_or(0),
            sym.value().as_number(),
            "'{}' with {register_count} registers\n{}",
            sym.name,
            lowered.program
        );
    }
}

#[test]
fn test_generated_code_computes_interpreter_values() {
    init();
    for register_count in 2..=8 {
        assert_machine_matches_interpreter(&mixed_program(), register_count);
        assert_machine_matches_interpreter(&balanced_sum(), register_count);
    }
}

#[test]
fn test_random_programs_agree_across_pool_sizes() {
    init();
    for seed in 0..40 {
        let ast = random_program(seed);
        for register_count in 2..=8 {
            assert_machine_matches_interpreter(&ast, register_count);
        }
    }
}
