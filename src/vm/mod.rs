use std::collections::HashMap;

use num_bigint::BigInt;
use num_traits::{One, ToPrimitive, Zero};

pub mod disasm;
pub mod host;
pub mod scheduler;

pub use host::{Console, Flow, Host, Scripted};

#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("unknown opcode {opcode} at address {address}")]
    UnknownOpcode { opcode: BigInt, address: u64 },
    #[error("unsupported addressing mode {mode} at address {address}")]
    UnsupportedMode { mode: BigInt, address: u64 },
    #[error("cannot write through an immediate operand at address {address}")]
    ImmediateWrite { address: u64 },
    #[error("accessed negative address {address}")]
    NegativeAddress { address: BigInt },
    #[error("address {address} is out of range")]
    AddressOutOfRange { address: BigInt },
    #[error("no input available")]
    NoInput,
    #[error("could not read a number from {text:?}")]
    BadInput { text: String },
    #[error("machine is already running")]
    AlreadyRunning,
    #[error("machine has already halted")]
    AlreadyHalted,
    #[error("script ended while machine {machine} still needed it")]
    ScriptEnded { machine: usize },
    #[error("machine {machine} tried to {action} but the script expected the opposite")]
    ScriptMismatch { machine: usize, action: &'static str },
    #[error("script addressed machine {machine}, which does not exist")]
    UnknownMachine { machine: usize },
    #[error("script addressed machine {machine}, which has halted")]
    HaltedMachine { machine: usize },
    #[error("host i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type VmResult<T> = Result<T, VmError>;

// ── Instruction set ─────────────────────────────────────────────────

/// Operand addressing mode, as encoded in the instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// The operand is an address to dereference.
    Position = 0,
    /// The operand is the value itself.
    Immediate = 1,
    /// The operand is an offset from the relative base.
    Relative = 2,
}

impl Mode {
    pub fn digit(self) -> i64 {
        self as i64
    }

    fn from_digit(digit: u8) -> Option<Mode> {
        match digit {
            0 => Some(Mode::Position),
            1 => Some(Mode::Immediate),
            2 => Some(Mode::Relative),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add = 1,
    Multiply = 2,
    Read = 3,
    Write = 4,
    JumpIfTrue = 5,
    JumpIfFalse = 6,
    LessThan = 7,
    Equals = 8,
    AdjustBase = 9,
    Halt = 99,
}

impl Opcode {
    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Opcode> {
        Some(match code {
            1 => Opcode::Add,
            2 => Opcode::Multiply,
            3 => Opcode::Read,
            4 => Opcode::Write,
            5 => Opcode::JumpIfTrue,
            6 => Opcode::JumpIfFalse,
            7 => Opcode::LessThan,
            8 => Opcode::Equals,
            9 => Opcode::AdjustBase,
            99 => Opcode::Halt,
            _ => return None,
        })
    }

    /// Number of operand words following the opcode word.
    pub fn arity(self) -> usize {
        match self {
            Opcode::Add | Opcode::Multiply | Opcode::LessThan | Opcode::Equals => 3,
            Opcode::JumpIfTrue | Opcode::JumpIfFalse => 2,
            Opcode::Read | Opcode::Write | Opcode::AdjustBase => 1,
            Opcode::Halt => 0,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Multiply => "MULT",
            Opcode::Read => "READ",
            Opcode::Write => "WRITE",
            Opcode::JumpIfTrue => "JTRUE",
            Opcode::JumpIfFalse => "JFALSE",
            Opcode::LessThan => "LT",
            Opcode::Equals => "EQ",
            Opcode::AdjustBase => "REBASE",
            Opcode::Halt => "EXIT",
        }
    }
}

/// Pack an opcode and its operand modes into one instruction word.
pub fn encode(opcode: Opcode, modes: &[Mode]) -> i64 {
    let mut word = opcode.code();
    let mut scale = 100;
    for mode in modes {
        word += mode.digit() * scale;
        scale *= 10;
    }
    word
}

/// A decoded instruction word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    /// One mode per operand; unused positions are `Position`.
    pub modes: [Mode; 3],
}

impl Instruction {
    pub fn decode(word: &BigInt, address: u64) -> VmResult<Instruction> {
        let hundred = BigInt::from(100);
        let ten = BigInt::from(10);
        let code = word % &hundred;
        let opcode = code
            .to_i64()
            .and_then(Opcode::from_code)
            .ok_or_else(|| VmError::UnknownOpcode { opcode: code.clone(), address })?;

        let mut modes = [Mode::Position; 3];
        let mut rest = word / &hundred;
        for slot in modes.iter_mut().take(opcode.arity()) {
            let digit = &rest % &ten;
            *slot = digit
                .to_u8()
                .and_then(Mode::from_digit)
                .ok_or_else(|| VmError::UnsupportedMode { mode: digit.clone(), address })?;
            rest /= &ten;
        }
        Ok(Instruction { opcode, modes })
    }
}

// ── Memory ──────────────────────────────────────────────────────────

/// Sparse word-addressed memory; unset cells read as zero.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    cells: HashMap<u64, BigInt>,
}

impl Memory {
    pub fn load(program: &[BigInt]) -> Self {
        let cells = program
            .iter()
            .enumerate()
            .filter(|(_, w)| !w.is_zero())
            .map(|(i, w)| (i as u64, w.clone()))
            .collect();
        Memory { cells }
    }

    /// Validate a word as an address.
    pub fn address(value: &BigInt) -> VmResult<u64> {
        if value.sign() == num_bigint::Sign::Minus {
            return Err(VmError::NegativeAddress { address: value.clone() });
        }
        value
            .to_u64()
            .ok_or_else(|| VmError::AddressOutOfRange { address: value.clone() })
    }

    pub fn get(&self, address: u64) -> BigInt {
        self.cells.get(&address).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, address: u64, value: BigInt) {
        if value.is_zero() {
            self.cells.remove(&address);
        } else {
            self.cells.insert(address, value);
        }
    }
}

// ── Machine ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Running,
    Halted,
}

/// Why `run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Halted,
    /// The host asked to pause; `run` may be called again.
    Suspended,
}

/// Result of executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Suspend,
    Halt,
}

#[derive(Debug, Clone)]
pub struct Machine {
    status: Status,
    ip: u64,
    relative_base: BigInt,
    memory: Memory,
}

impl Machine {
    pub fn new(program: &[BigInt]) -> Self {
        Machine {
            status: Status::Idle,
            ip: 0,
            relative_base: BigInt::zero(),
            memory: Memory::load(program),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_halted(&self) -> bool {
        self.status == Status::Halted
    }

    pub fn ip(&self) -> u64 {
        self.ip
    }

    pub fn relative_base(&self) -> &BigInt {
        &self.relative_base
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Resume through every suspension until the program halts.
    pub fn run_to_halt(&mut self, host: &mut dyn Host) -> VmResult<()> {
        while self.run(host)? == Outcome::Suspended {}
        Ok(())
    }

    /// Execute until the program halts or the host suspends it.
    /// Any error halts the machine for good.
    pub fn run(&mut self, host: &mut dyn Host) -> VmResult<Outcome> {
        match self.status {
            Status::Halted => return Err(VmError::AlreadyHalted),
            Status::Running => return Err(VmError::AlreadyRunning),
            Status::Idle => {}
        }
        self.status = Status::Running;
        loop {
            match self.step(host) {
                Ok(Step::Continue) => {}
                Ok(Step::Suspend) => {
                    self.status = Status::Idle;
                    return Ok(Outcome::Suspended);
                }
                Ok(Step::Halt) => {
                    self.status = Status::Halted;
                    return Ok(Outcome::Halted);
                }
                Err(e) => {
                    self.status = Status::Halted;
                    return Err(e);
                }
            }
        }
    }

    /// Execute exactly one instruction.
    pub fn step(&mut self, host: &mut dyn Host) -> VmResult<Step> {
        let at = self.ip;
        let instr = Instruction::decode(&self.memory.get(at), at)?;
        if log::log_enabled!(log::Level::Trace) {
            let operands: Vec<BigInt> =
                (1..=instr.opcode.arity()).map(|i| self.memory.get(at + i as u64)).collect();
            log::trace!(
                "{at:>8} base={} {}",
                self.relative_base,
                disasm::render(&instr, &operands)
            );
        }

        match instr.opcode {
            Opcode::Add | Opcode::Multiply | Opcode::LessThan | Opcode::Equals => {
                let a = self.load(&instr, 0)?;
                let b = self.load(&instr, 1)?;
                let value = match instr.opcode {
                    Opcode::Add => a + b,
                    Opcode::Multiply => a * b,
                    Opcode::LessThan => flag(a < b),
                    _ => flag(a == b),
                };
                self.store(&instr, 2, value)?;
                self.ip += 4;
            }
            Opcode::Read => {
                let (value, flow) = host.read()?;
                self.store(&instr, 0, value)?;
                self.ip += 2;
                return Ok(flow.into());
            }
            Opcode::Write => {
                let value = self.load(&instr, 0)?;
                self.ip += 2;
                return Ok(host.write(value)?.into());
            }
            Opcode::JumpIfTrue | Opcode::JumpIfFalse => {
                let cond = self.load(&instr, 0)?;
                let target = self.load(&instr, 1)?;
                if cond.is_zero() == (instr.opcode == Opcode::JumpIfFalse) {
                    self.ip = Memory::address(&target)?;
                } else {
                    self.ip += 3;
                }
            }
            Opcode::AdjustBase => {
                let by = self.load(&instr, 0)?;
                self.relative_base += by;
                self.ip += 2;
            }
            Opcode::Halt => return Ok(Step::Halt),
        }
        Ok(Step::Continue)
    }

    fn operand(&self, index: usize) -> BigInt {
        self.memory.get(self.ip + 1 + index as u64)
    }

    fn load(&self, instr: &Instruction, index: usize) -> VmResult<BigInt> {
        let raw = self.operand(index);
        match instr.modes[index] {
            Mode::Position => Ok(self.memory.get(Memory::address(&raw)?)),
            Mode::Immediate => Ok(raw),
            Mode::Relative => Ok(self.memory.get(Memory::address(&(&self.relative_base + raw))?)),
        }
    }

    fn store(&mut self, instr: &Instruction, index: usize, value: BigInt) -> VmResult<()> {
        let raw = self.operand(index);
        let address = match instr.modes[index] {
            Mode::Position => Memory::address(&raw)?,
            Mode::Immediate => return Err(VmError::ImmediateWrite { address: self.ip }),
            Mode::Relative => Memory::address(&(&self.relative_base + raw))?,
        };
        self.memory.set(address, value);
        Ok(())
    }
}

fn flag(b: bool) -> BigInt {
    if b { BigInt::one() } else { BigInt::zero() }
}

impl From<Flow> for Step {
    fn from(flow: Flow) -> Self {
        match flow {
            Flow::Continue => Step::Continue,
            Flow::Suspend => Step::Suspend,
        }
    }
}

/// Run a program to completion against a scripted host.
pub fn run_scripted(
    program: &[BigInt],
    inputs: impl IntoIterator<Item = BigInt>,
) -> VmResult<(Machine, Vec<BigInt>)> {
    let mut machine = Machine::new(program);
    let mut host = Scripted::new(inputs);
    machine.run_to_halt(&mut host)?;
    Ok((machine, host.into_outputs()))
}
