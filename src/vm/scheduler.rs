use num_bigint::BigInt;

use super::{Flow, Host, Machine, Outcome, VmError, VmResult};

/// One step of a multi-machine script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Machine `target` should read `value` next.
    Provide { target: usize, value: BigInt },
    /// Machine `target` should write next; the driver is handed the value.
    Receive { target: usize },
}

impl Message {
    pub fn target(&self) -> usize {
        match self {
            Message::Provide { target, .. } | Message::Receive { target } => *target,
        }
    }
}

/// Produces the script one message at a time.
///
/// `received` is the value written by the machine that satisfied the
/// previous `Receive`, and `None` otherwise. Returning `None` ends the script.
pub trait Driver {
    fn next(&mut self, received: Option<BigInt>) -> Option<Message>;
}

impl<F> Driver for F
where
    F: FnMut(Option<BigInt>) -> Option<Message>,
{
    fn next(&mut self, received: Option<BigInt>) -> Option<Message> {
        self(received)
    }
}

/// Interleaves several machines under one driver.
///
/// Only one machine runs at a time. A machine is suspended as soon as the
/// next message addresses a different machine, and that machine is resumed.
pub struct Scheduler {
    machines: Vec<Machine>,
}

impl Scheduler {
    pub fn new(machines: Vec<Machine>) -> Self {
        Scheduler { machines }
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    pub fn into_machines(self) -> Vec<Machine> {
        self.machines
    }

    /// Run until the script ends and the last addressed machine stops.
    pub fn run(&mut self, driver: &mut dyn Driver) -> VmResult<()> {
        let mut pending = driver.next(None);
        while let Some(target) = pending.as_ref().map(Message::target) {
            let machine = self
                .machines
                .get_mut(target)
                .ok_or(VmError::UnknownMachine { machine: target })?;
            if machine.is_halted() {
                return Err(VmError::HaltedMachine { machine: target });
            }
            log::debug!("scheduler: switching to machine {target}");
            let mut host = Channel { machine: target, pending: &mut pending, driver: &mut *driver };
            if machine.run(&mut host)? == Outcome::Halted {
                log::debug!("scheduler: machine {target} halted");
            }
        }
        Ok(())
    }
}

/// The host seen by one machine while the scheduler runs it.
struct Channel<'a> {
    machine: usize,
    pending: &'a mut Option<Message>,
    driver: &'a mut dyn Driver,
}

impl Channel<'_> {
    fn advance(&mut self, received: Option<BigInt>) -> Flow {
        *self.pending = self.driver.next(received);
        match self.pending.as_ref() {
            Some(next) if next.target() != self.machine => Flow::Suspend,
            _ => Flow::Continue,
        }
    }
}

impl Host for Channel<'_> {
    fn read(&mut self) -> VmResult<(BigInt, Flow)> {
        let value = match self.pending.take() {
            Some(Message::Provide { target, value }) if target == self.machine => value,
            None => return Err(VmError::ScriptEnded { machine: self.machine }),
            Some(_) => return Err(VmError::ScriptMismatch { machine: self.machine, action: "read" }),
        };
        Ok((value, self.advance(None)))
    }

    fn write(&mut self, value: BigInt) -> VmResult<Flow> {
        match self.pending.take() {
            Some(Message::Receive { target }) if target == self.machine => {}
            None => return Err(VmError::ScriptEnded { machine: self.machine }),
            Some(_) => return Err(VmError::ScriptMismatch { machine: self.machine, action: "write" }),
        }
        Ok(self.advance(Some(value)))
    }
}
