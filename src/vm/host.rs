use std::collections::VecDeque;
use std::io::{BufRead, Write};

use num_bigint::BigInt;

use super::{VmError, VmResult};

/// Whether the machine should keep going after a side-channel call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Stop the run loop; the machine resumes at the next instruction.
    Suspend,
}

/// The machine's read/write side-channels.
pub trait Host {
    fn read(&mut self) -> VmResult<(BigInt, Flow)>;
    fn write(&mut self, value: BigInt) -> VmResult<Flow>;
}

/// Line-oriented terminal host: one decimal number per line in each direction.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Console { input, output }
    }
}

impl<R: BufRead, W: Write> Host for Console<R, W> {
    fn read(&mut self) -> VmResult<(BigInt, Flow)> {
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(VmError::NoInput);
        }
        let text = line.trim();
        let value = text
            .parse()
            .map_err(|_| VmError::BadInput { text: text.to_string() })?;
        Ok((value, Flow::Continue))
    }

    fn write(&mut self, value: BigInt) -> VmResult<Flow> {
        writeln!(self.output, "{value}")?;
        Ok(Flow::Continue)
    }
}

/// Feeds queued inputs and collects outputs. Never suspends.
#[derive(Debug, Clone, Default)]
pub struct Scripted {
    inputs: VecDeque<BigInt>,
    outputs: Vec<BigInt>,
}

impl Scripted {
    pub fn new(inputs: impl IntoIterator<Item = BigInt>) -> Self {
        Scripted { inputs: inputs.into_iter().collect(), outputs: Vec::new() }
    }

    pub fn outputs(&self) -> &[BigInt] {
        &self.outputs
    }

    pub fn into_outputs(self) -> Vec<BigInt> {
        self.outputs
    }
}

impl Host for Scripted {
    fn read(&mut self) -> VmResult<(BigInt, Flow)> {
        let value = self.inputs.pop_front().ok_or(VmError::NoInput)?;
        Ok((value, Flow::Continue))
    }

    fn write(&mut self, value: BigInt) -> VmResult<Flow> {
        self.outputs.push(value);
        Ok(Flow::Continue)
    }
}
