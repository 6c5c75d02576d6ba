//! The per-transaction interpreter.

use alloy_primitives::{keccak256, Address, Bytes, Log, B256, U256};
use revm::{
    interpreter::{num_words, SharedMemory},
    Database,
};
use tracing::{debug, trace};

use super::{
    context::{CallContext, CallType, ContextStack},
    eoa,
    frame::{FrameInput, FrameOutcome, Halt, Interrupt},
    machine::{as_u64_saturated, as_usize_saturated, copy_cost, Machine},
    opcode::*,
    ExecutionManager,
};
use crate::{
    constants::{gas, limits::MAX_MEMORY_OFFSET},
    Account, Checkpoint, MessageRecord, RevertFlag, RevertRecord, SafetyGate, StateStore,
    StateWitness, Transaction,
};

type Step<E> = Result<Action, Interrupt<E>>;

/// What the driver does after an instruction.
enum Action {
    /// Run the next instruction of the same frame.
    Continue,
    /// Open a child frame, handing its outcome back through [`Resume`].
    Open(FrameInput, Resume),
    /// The frame's code stopped.
    Halt(Halt),
}

/// Where the parent of a child frame picks up.
#[derive(Debug, Clone, Copy)]
enum Resume {
    Call { gas_limit: u64, out_offset: usize, out_len: usize },
    Create { gas_limit: u64 },
}

/// The result of opening a frame.
enum Opened {
    /// The context is pushed and the code is ready to run.
    Entered(Entry),
    /// The frame was refused or skipped and has its outcome already.
    Finished(FrameOutcome),
}

/// What an entered frame runs and how its exit is undone.
struct Entry {
    code: Bytes,
    input: Bytes,
    checkpoint: Checkpoint,
    log_mark: usize,
    /// The account being created, for creation frames.
    created: Option<Address>,
}

/// A frame on the driver's stack.
struct Frame {
    machine: Machine,
    checkpoint: Checkpoint,
    log_mark: usize,
    created: Option<Address>,
    /// Set while a child of this frame runs.
    resume: Option<Resume>,
}

impl Frame {
    fn new(entry: Entry, memory: SharedMemory) -> Self {
        Self {
            machine: Machine::new(entry.code, entry.input, memory),
            checkpoint: entry.checkpoint,
            log_mark: entry.log_mark,
            created: entry.created,
            resume: None,
        }
    }
}

/// What an opcode learns from a finished child frame.
struct Settled {
    success: bool,
    /// The child's return data, or the payload of its intentional revert.
    output: Bytes,
    /// Gas handed back to the caller.
    gas_left: u64,
    created: Option<Address>,
}

/// The interpreter state of one transaction: the context stack, the message record and the
/// logs of frames that have not reverted.
pub(crate) struct Execution<'a, DB: Database, W, G> {
    manager: &'a ExecutionManager<G>,
    tx: &'a Transaction,
    state: &'a mut StateStore<DB, W>,
    contexts: ContextStack,
    message: MessageRecord,
    logs: Vec<Log>,
}

impl<'a, DB, W, G> Execution<'a, DB, W, G>
where
    DB: Database,
    W: StateWitness,
    G: SafetyGate,
{
    pub(crate) fn new(
        manager: &'a ExecutionManager<G>,
        tx: &'a Transaction,
        state: &'a mut StateStore<DB, W>,
        message: MessageRecord,
    ) -> Self {
        Self {
            manager,
            tx,
            state,
            contexts: ContextStack::new(CallContext::origin(tx.caller_address, tx.gas_limit)),
            message,
            logs: Vec::new(),
        }
    }

    /// Ends the execution, returning the message record and the surviving logs.
    pub(crate) fn finish(self) -> (MessageRecord, Vec<Log>) {
        (self.message, self.logs)
    }

    /// Runs `input` in a frame on top of the active context, together with every frame it
    /// opens, and returns its outcome.
    ///
    /// Frames live on a heap-allocated stack, so the call depth is bounded by the configured
    /// maximum only. An `Err` means the frame could not be opened: its target could not be
    /// loaded or a transaction-fatal flag was raised. A failure of the backing database is
    /// returned as an `Err` from any depth, leaving the state of the open frames in place.
    pub(crate) fn execute(
        &mut self,
        input: FrameInput,
    ) -> Result<FrameOutcome, Interrupt<DB::Error>> {
        let mut frame = match self.frame(input)? {
            Opened::Entered(entry) => Frame::new(entry, SharedMemory::new()),
            Opened::Finished(outcome) => return Ok(outcome),
        };
        let mut parents: Vec<Frame> = Vec::new();
        loop {
            let halt = match self.step(&mut frame.machine) {
                Ok(Action::Continue) => continue,
                Ok(Action::Halt(halt)) => halt,
                Ok(Action::Open(input, resume)) => {
                    frame.resume = Some(resume);
                    match self.frame(input) {
                        Ok(Opened::Entered(entry)) => {
                            let memory = frame.machine.memory.new_child_context();
                            parents.push(core::mem::replace(&mut frame, Frame::new(entry, memory)));
                            continue;
                        }
                        Ok(Opened::Finished(outcome)) => match self.resume(&mut frame, outcome) {
                            Ok(()) => continue,
                            Err(interrupt) => halted(interrupt)?,
                        },
                        Err(interrupt) => halted(interrupt)?,
                    }
                }
                Err(interrupt) => halted(interrupt)?,
            };

            let mut outcome = self.exit(frame, halt)?;
            loop {
                let Some(parent) = parents.pop() else { return Ok(outcome) };
                frame = parent;
                match self.resume(&mut frame, outcome) {
                    Ok(()) => break,
                    // the parent fails on its child's account and exits in turn
                    Err(interrupt) => outcome = self.exit(frame, halted(interrupt)?)?,
                }
            }
        }
    }

    /// Opens a frame on top of the active context.
    fn frame(&mut self, input: FrameInput) -> Result<Opened, Interrupt<DB::Error>> {
        match input {
            FrameInput::Call { target, value, data, gas_limit } => {
                self.call(target, value, data, gas_limit)
            }
            FrameInput::StaticCall { target, data, gas_limit } => {
                self.static_call(target, data, gas_limit)
            }
            FrameInput::DelegateCall { target, data, gas_limit } => {
                self.delegate_call(target, data, gas_limit)
            }
            FrameInput::Create { value, init_code, gas_limit } => {
                self.create(value, init_code, gas_limit)
            }
            FrameInput::Create2 { value, init_code, salt, gas_limit } => {
                self.create2(value, init_code, salt, gas_limit)
            }
        }
    }

    /// The output of a frame that failed with `flag`.
    pub(crate) fn failure(&self, flag: RevertFlag, gas_refund: u64, data: Bytes) -> FrameOutcome {
        let record = RevertRecord::new(flag, self.message.nuisance_gas_left(), gas_refund, data);
        FrameOutcome::Failure { output: record.encode() }
    }

    fn call(
        &mut self,
        target: Address,
        value: U256,
        data: Bytes,
        gas_limit: u64,
    ) -> Result<Opened, Interrupt<DB::Error>> {
        let parent = *self.contexts.current();
        self.load_account(target)?;
        if self.depth_exceeded() {
            return Ok(self.not_entered(gas_limit));
        }
        if !value.is_zero() && self.state.get_account(parent.address)?.balance < value {
            return Ok(self.not_entered(gas_limit));
        }
        let checkpoint = self.state.checkpoint();
        let log_mark = self.logs.len();
        self.transfer(parent.address, target, value)?;
        let context = CallContext {
            address: target,
            code_address: target,
            caller: parent.address,
            call_type: CallType::Call,
            value,
            is_static: parent.is_static,
            remaining_gas: gas_limit,
        };
        self.enter(context, data, checkpoint, log_mark)
    }

    fn static_call(
        &mut self,
        target: Address,
        data: Bytes,
        gas_limit: u64,
    ) -> Result<Opened, Interrupt<DB::Error>> {
        let parent = *self.contexts.current();
        self.load_account(target)?;
        if self.depth_exceeded() {
            return Ok(self.not_entered(gas_limit));
        }
        let context = CallContext {
            address: target,
            code_address: target,
            caller: parent.address,
            call_type: CallType::StaticCall,
            value: U256::ZERO,
            is_static: true,
            remaining_gas: gas_limit,
        };
        self.enter(context, data, self.state.checkpoint(), self.logs.len())
    }

    fn delegate_call(
        &mut self,
        target: Address,
        data: Bytes,
        gas_limit: u64,
    ) -> Result<Opened, Interrupt<DB::Error>> {
        if self.manager.config().message_relay == Some(target) {
            trace!(target = %target, "Skipping delegate call into the message relay");
            let outcome = FrameOutcome::Success { output: Bytes::new(), gas_left: gas_limit, created: None };
            return Ok(Opened::Finished(outcome));
        }
        let parent = *self.contexts.current();
        self.load_account(target)?;
        if self.depth_exceeded() {
            return Ok(self.not_entered(gas_limit));
        }
        let context = CallContext {
            code_address: target,
            call_type: CallType::DelegateCall,
            remaining_gas: gas_limit,
            ..parent
        };
        self.enter(context, data, self.state.checkpoint(), self.logs.len())
    }

    fn create(
        &mut self,
        value: U256,
        init_code: Bytes,
        gas_limit: u64,
    ) -> Result<Opened, Interrupt<DB::Error>> {
        let creator = self.contexts.current().address;
        if let Some(rejected) = self.check_creator(creator, gas_limit) {
            return Ok(Opened::Finished(rejected));
        }
        let nonce = self.bump_nonce(creator)?;
        self.deploy(creator.create(nonce), value, init_code, gas_limit)
    }

    fn create2(
        &mut self,
        value: U256,
        init_code: Bytes,
        salt: B256,
        gas_limit: u64,
    ) -> Result<Opened, Interrupt<DB::Error>> {
        let creator = self.contexts.current().address;
        if let Some(rejected) = self.check_creator(creator, gas_limit) {
            return Ok(Opened::Finished(rejected));
        }
        self.bump_nonce(creator)?;
        let address = creator.create2_from_code(salt, &init_code);
        self.deploy(address, value, init_code, gas_limit)
    }

    /// Returns the outcome of a creation that is refused before the creator's nonce moves.
    fn check_creator(&self, creator: Address, gas_limit: u64) -> Option<FrameOutcome> {
        if self.depth_exceeded() {
            return Some(self.not_entered_outcome(gas_limit));
        }
        if !self.manager.deployers().is_allowed(&creator) {
            debug!(creator = %creator, "Creator not allowed");
            return Some(self.failure(RevertFlag::CreatorNotAllowed, gas_limit, Bytes::new()));
        }
        None
    }

    /// Increments the nonce of `address`, returning the nonce before the increment.
    fn bump_nonce(&mut self, address: Address) -> Result<u64, Interrupt<DB::Error>> {
        self.change_account(address)?;
        let account = self.state.get_account(address)?;
        let nonce = account.nonce;
        let bumped = nonce.checked_add(1).ok_or(Interrupt::Fault)?;
        self.state.put_account(address, Account { nonce: bumped, ..account })?;
        Ok(nonce)
    }

    fn deploy(
        &mut self,
        address: Address,
        value: U256,
        init_code: Bytes,
        gas_limit: u64,
    ) -> Result<Opened, Interrupt<DB::Error>> {
        let creator = self.contexts.current().address;
        // the target must be proven to exist, empty
        self.load_account(address)?;
        if !self.state.get_account(address)?.is_empty() {
            debug!(address = %address, "Create collision");
            let outcome = self.failure(RevertFlag::CreateCollision, gas_limit, Bytes::new());
            return Ok(Opened::Finished(outcome));
        }
        if !value.is_zero() && self.state.get_account(creator)?.balance < value {
            return Ok(self.not_entered(gas_limit));
        }
        self.change_account(address)?;

        let checkpoint = self.state.checkpoint();
        let log_mark = self.logs.len();
        let account = self.state.get_account(address)?;
        self.state.put_account(address, Account { nonce: 1, ..account })?;
        self.transfer(creator, address, value)?;

        let context = CallContext {
            address,
            code_address: address,
            caller: creator,
            call_type: CallType::Create,
            value,
            is_static: false,
            remaining_gas: gas_limit,
        };
        trace!(depth = self.contexts.depth() + 1, address = %address, gas_limit, "Entering create");
        self.contexts.push(context);
        Ok(Opened::Entered(Entry {
            code: init_code,
            input: Bytes::new(),
            checkpoint,
            log_mark,
            created: Some(address),
        }))
    }

    /// Installs the code returned by init code. Runs in the creation frame.
    fn finish_create(&mut self, address: Address, code: Bytes) -> Result<Halt, Interrupt<DB::Error>> {
        match self.install_created_code(address, code) {
            Ok(()) => Ok(Halt::Stop),
            Err(interrupt) => halted(interrupt),
        }
    }

    fn install_created_code(
        &mut self,
        address: Address,
        code: Bytes,
    ) -> Result<(), Interrupt<DB::Error>> {
        if code.len() > self.manager.config().max_code_size {
            return Err(Interrupt::Fault);
        }
        if !self.manager.safety_gate().is_bytecode_safe(&code) {
            debug!(address = %address, "Deployed code rejected by the safety gate");
            return Err(RevertFlag::CreatorNotAllowed.into());
        }
        self.charge(gas::CODEDEPOSIT.saturating_mul(code.len() as u64))?;
        self.message.use_nuisance_gas(self.manager.config().nuisance.code_cost(code.len()))?;
        self.state.install_code(address, code)?;
        Ok(())
    }

    /// Pushes `context` and readies its code.
    fn enter(
        &mut self,
        context: CallContext,
        input: Bytes,
        checkpoint: Checkpoint,
        log_mark: usize,
    ) -> Result<Opened, Interrupt<DB::Error>> {
        let code = self.state.code(context.code_address)?;
        trace!(
            depth = self.contexts.depth() + 1,
            call_type = %context.call_type,
            address = %context.address,
            code_address = %context.code_address,
            gas_limit = context.remaining_gas,
            "Entering frame"
        );
        self.contexts.push(context);
        Ok(Opened::Entered(Entry { code, input, checkpoint, log_mark, created: None }))
    }

    /// Pops the active frame and turns its halt into an outcome, rolling back its writes and
    /// logs unless it succeeded. A creation frame that stopped installs its code first.
    fn exit(&mut self, frame: Frame, halt: Halt) -> Result<FrameOutcome, Interrupt<DB::Error>> {
        let halt = match (frame.created, halt) {
            (Some(address), Halt::Stop) => self.finish_create(address, Bytes::new())?,
            (Some(address), Halt::Return(code)) => self.finish_create(address, code)?,
            (_, halt) => halt,
        };
        let gas_left = self.contexts.pop().map(|context| context.remaining_gas).unwrap_or_default();
        trace!(depth = self.contexts.depth() + 1, ?halt, gas_left, "Frame finished");
        let mut outcome = match halt {
            Halt::Stop => FrameOutcome::Success { output: Bytes::new(), gas_left, created: None },
            Halt::Return(output) => FrameOutcome::Success { output, gas_left, created: None },
            Halt::Revert(data) => self.failure(RevertFlag::IntentionalRevert, gas_left, data),
            Halt::Signal(flag) => {
                let refund = if flag.refunds_gas() { gas_left } else { 0 };
                self.failure(flag, refund, Bytes::new())
            }
            Halt::Fault => FrameOutcome::Failure { output: Bytes::new() },
        };
        match &mut outcome {
            FrameOutcome::Success { created, .. } => *created = frame.created,
            FrameOutcome::Failure { .. } => {
                self.state.revert_to(frame.checkpoint);
                self.logs.truncate(frame.log_mark);
            }
        }
        Ok(outcome)
    }

    /// Hands a child's outcome to the frame that opened it and finishes the opening
    /// instruction.
    fn resume(&mut self, frame: &mut Frame, outcome: FrameOutcome) -> Result<(), Interrupt<DB::Error>> {
        let m = &mut frame.machine;
        m.memory.free_child_context();
        let resume = frame.resume.take().ok_or(Interrupt::Fault)?;
        match resume {
            Resume::Call { gas_limit, out_offset, out_len } => {
                let settled = self.settle(outcome, gas_limit)?;
                self.contexts.current_mut().remaining_gas += settled.gas_left;
                let copied = out_len.min(settled.output.len());
                m.write_memory(out_offset, &settled.output, 0, copied);
                m.return_data = settled.output;
                m.push(word(settled.success))?;
            }
            Resume::Create { gas_limit } => {
                let settled = self.settle(outcome, gas_limit)?;
                self.contexts.current_mut().remaining_gas += settled.gas_left;
                m.return_data = if settled.success { Bytes::new() } else { settled.output };
                m.push(settled.created.map(address_word).unwrap_or_default())?;
            }
        }
        Ok(())
    }

    /// A call that fails before its frame is entered: nothing ran, so all of its gas returns.
    fn not_entered(&self, gas_limit: u64) -> Opened {
        Opened::Finished(self.not_entered_outcome(gas_limit))
    }

    fn not_entered_outcome(&self, gas_limit: u64) -> FrameOutcome {
        self.failure(RevertFlag::IntentionalRevert, gas_limit, Bytes::new())
    }

    fn depth_exceeded(&self) -> bool {
        self.contexts.depth() >= self.manager.config().max_call_depth
    }

    /// Decodes a child's outcome in the active frame.
    ///
    /// Adopts the nuisance gas the child reports and re-raises transaction-fatal flags.
    fn settle(
        &mut self,
        outcome: FrameOutcome,
        gas_limit: u64,
    ) -> Result<Settled, Interrupt<DB::Error>> {
        match outcome {
            FrameOutcome::Success { output, gas_left, created } => {
                Ok(Settled { success: true, output, gas_left, created })
            }
            FrameOutcome::Failure { output } => {
                let record = RevertRecord::decode(&output);
                self.message.adopt_nuisance_gas_left(record.nuisance_gas_left);
                if record.flag.is_transaction_fatal() {
                    return Err(record.flag.into());
                }
                let gas_left = if record.flag.refunds_gas() {
                    record.gas_refund.min(gas_limit)
                } else {
                    0
                };
                self.message.record_gas_refund(gas_left);
                Ok(Settled { success: false, output: record.data, gas_left, created: None })
            }
        }
    }

    fn charge(&mut self, cost: u64) -> Result<(), Interrupt<DB::Error>> {
        let context = self.contexts.current_mut();
        match context.remaining_gas.checked_sub(cost) {
            Some(left) => {
                context.remaining_gas = left;
                Ok(())
            }
            None => {
                context.remaining_gas = 0;
                Err(Interrupt::Fault)
            }
        }
    }

    /// Charges for and performs the expansion of memory to cover `len` bytes at `offset`.
    fn expand_memory(
        &mut self,
        machine: &mut Machine,
        offset: usize,
        len: usize,
    ) -> Result<(), Interrupt<DB::Error>> {
        if len == 0 {
            return Ok(());
        }
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= MAX_MEMORY_OFFSET)
            .ok_or(Interrupt::Fault)?;
        let words = num_words(end);
        let current = machine.memory_words();
        if words > current {
            self.charge(gas::memory_gas(words) - gas::memory_gas(current))?;
            machine.memory.resize(words * 32);
        }
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<(), Interrupt<DB::Error>> {
        if self.contexts.current().is_static {
            return Err(RevertFlag::StaticViolation.into());
        }
        Ok(())
    }

    /// Loads `address`, charging its first-load nuisance cost.
    fn load_account(&mut self, address: Address) -> Result<(), Interrupt<DB::Error>> {
        if !self.state.test_and_set_account_loaded(address)? {
            let cost = self.account_cost(address)?;
            self.message.use_nuisance_gas(cost)?;
        }
        Ok(())
    }

    /// Loads and opens `address` for writing, charging its first-change nuisance cost.
    fn change_account(&mut self, address: Address) -> Result<(), Interrupt<DB::Error>> {
        self.load_account(address)?;
        if !self.state.test_and_set_account_changed(address)? {
            let cost = self.account_cost(address)?;
            self.message.use_nuisance_gas(cost)?;
        }
        Ok(())
    }

    fn account_cost(&self, address: Address) -> Result<u64, Interrupt<DB::Error>> {
        let code_size = self.state.get_code_size(address)?;
        Ok(self.manager.config().nuisance.account_cost(code_size))
    }

    fn load_slot(&mut self, address: Address, key: B256) -> Result<(), Interrupt<DB::Error>> {
        if !self.state.test_and_set_contract_storage_loaded(address, key)? {
            self.message.use_nuisance_gas(self.manager.config().nuisance.nuisance_gas_sload)?;
        }
        Ok(())
    }

    fn change_slot(&mut self, address: Address, key: B256) -> Result<(), Interrupt<DB::Error>> {
        self.load_slot(address, key)?;
        if !self.state.test_and_set_contract_storage_changed(address, key)? {
            // a changed slot changes its account
            self.change_account(address)?;
            self.message.use_nuisance_gas(self.manager.config().nuisance.nuisance_gas_sstore)?;
        }
        Ok(())
    }

    fn transfer(
        &mut self,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), Interrupt<DB::Error>> {
        if value.is_zero() {
            return Ok(());
        }
        self.change_account(from)?;
        self.change_account(to)?;
        if from == to {
            return Ok(());
        }
        let sender = self.state.get_account(from)?;
        let balance = sender.balance.checked_sub(value).ok_or(Interrupt::Fault)?;
        self.state.put_account(from, Account { balance, ..sender })?;
        let recipient = self.state.get_account(to)?;
        let balance = recipient.balance.saturating_add(value);
        self.state.put_account(to, Account { balance, ..recipient })?;
        Ok(())
    }

    /// Installs the externally-owned proxy at `address` unless it already holds an account.
    fn create_eoa(&mut self, address: Address) -> Result<(), Interrupt<DB::Error>> {
        self.load_account(address)?;
        if !self.state.get_account(address)?.is_empty() {
            return Ok(());
        }
        self.change_account(address)?;
        let code = eoa::proxy_code(self.manager.config().eoa_implementation);
        self.message.use_nuisance_gas(self.manager.config().nuisance.code_cost(code.len()))?;
        self.state.install_code(address, code)?;
        debug!(address = %address, "Externally-owned account created");
        Ok(())
    }

    fn push(&mut self, m: &mut Machine, cost: u64, value: U256) -> Result<(), Interrupt<DB::Error>> {
        self.charge(cost)?;
        Ok(m.push(value)?)
    }

    fn unary(
        &mut self,
        m: &mut Machine,
        cost: u64,
        op: impl FnOnce(U256) -> U256,
    ) -> Result<(), Interrupt<DB::Error>> {
        self.charge(cost)?;
        let a = m.pop()?;
        Ok(m.push(op(a))?)
    }

    fn binary(
        &mut self,
        m: &mut Machine,
        cost: u64,
        op: impl FnOnce(U256, U256) -> U256,
    ) -> Result<(), Interrupt<DB::Error>> {
        self.charge(cost)?;
        let [a, b] = m.pop_n()?;
        Ok(m.push(op(a, b))?)
    }

    /// Executes the instruction at the program counter.
    ///
    /// An instruction that opens a frame leaves the program counter past itself and completes
    /// in [`Execution::resume`].
    fn step(&mut self, m: &mut Machine) -> Step<DB::Error> {
        let op = m.opcode();
        let context = *self.contexts.current();
        let mut next_pc = m.pc + 1;
        match op {
            STOP => return Ok(Action::Halt(Halt::Stop)),
            ADD => self.binary(m, gas::VERYLOW, |a, b| a.wrapping_add(b))?,
            MUL => self.binary(m, gas::LOW, |a, b| a.wrapping_mul(b))?,
            SUB => self.binary(m, gas::VERYLOW, |a, b| a.wrapping_sub(b))?,
            DIV => self.binary(m, gas::LOW, |a, b| a.checked_div(b).unwrap_or_default())?,
            MOD => self.binary(m, gas::LOW, |a, b| a.checked_rem(b).unwrap_or_default())?,
            LT => self.binary(m, gas::VERYLOW, |a, b| word(a < b))?,
            GT => self.binary(m, gas::VERYLOW, |a, b| word(a > b))?,
            EQ => self.binary(m, gas::VERYLOW, |a, b| word(a == b))?,
            ISZERO => self.unary(m, gas::VERYLOW, |a| word(a.is_zero()))?,
            AND => self.binary(m, gas::VERYLOW, |a, b| a & b)?,
            OR => self.binary(m, gas::VERYLOW, |a, b| a | b)?,
            XOR => self.binary(m, gas::VERYLOW, |a, b| a ^ b)?,
            NOT => self.unary(m, gas::VERYLOW, |a| !a)?,
            SHL => self.binary(m, gas::VERYLOW, |shift, value| {
                if shift < U256::from(256) {
                    value << as_usize_saturated(shift)
                } else {
                    U256::ZERO
                }
            })?,
            SHR => self.binary(m, gas::VERYLOW, |shift, value| {
                if shift < U256::from(256) {
                    value >> as_usize_saturated(shift)
                } else {
                    U256::ZERO
                }
            })?,
            KECCAK256 => {
                let [offset, len] = m.pop_n()?;
                let (offset, len) = (as_usize_saturated(offset), as_usize_saturated(len));
                let words = num_words(len) as u64;
                self.charge(gas::KECCAK256.saturating_add(gas::KECCAK256WORD.saturating_mul(words)))?;
                self.expand_memory(m, offset, len)?;
                let hash = keccak256(m.read_memory(offset, len));
                m.push(U256::from_be_bytes(hash.0))?;
            }
            ADDRESS => self.push(m, gas::BASE, address_word(context.address))?,
            CALLER => self.push(m, gas::BASE, address_word(context.caller))?,
            CALLVALUE => self.push(m, gas::BASE, context.value)?,
            CALLDATALOAD => {
                self.charge(gas::VERYLOW)?;
                let offset = as_usize_saturated(m.pop()?);
                let mut bytes = [0u8; 32];
                if offset < m.input.len() {
                    let len = (m.input.len() - offset).min(32);
                    bytes[..len].copy_from_slice(&m.input[offset..offset + len]);
                }
                m.push(U256::from_be_bytes(bytes))?;
            }
            CALLDATASIZE => {
                let size = U256::from(m.input.len());
                self.push(m, gas::BASE, size)?;
            }
            CALLDATACOPY => {
                let [dest, offset, len] = m.pop_n()?;
                let (dest, len) = (as_usize_saturated(dest), as_usize_saturated(len));
                self.charge(gas::VERYLOW.saturating_add(copy_cost(len)))?;
                self.expand_memory(m, dest, len)?;
                m.copy_input(dest, as_usize_saturated(offset), len);
            }
            CODESIZE => {
                let size = U256::from(m.code().len());
                self.push(m, gas::BASE, size)?;
            }
            CODECOPY => {
                let [dest, offset, len] = m.pop_n()?;
                let (dest, len) = (as_usize_saturated(dest), as_usize_saturated(len));
                self.charge(gas::VERYLOW.saturating_add(copy_cost(len)))?;
                self.expand_memory(m, dest, len)?;
                m.copy_code(dest, as_usize_saturated(offset), len);
            }
            EXTCODESIZE => {
                self.charge(gas::COLD_ACCOUNT_ACCESS_COST)?;
                let address = Address::from_word(m.pop()?.into());
                self.load_account(address)?;
                m.push(U256::from(self.state.get_code_size(address)?))?;
            }
            EXTCODEHASH => {
                self.charge(gas::COLD_ACCOUNT_ACCESS_COST)?;
                let address = Address::from_word(m.pop()?.into());
                self.load_account(address)?;
                let account = self.state.get_account(address)?;
                let hash = if account.is_empty() { B256::ZERO } else { account.code_hash };
                m.push(U256::from_be_bytes(hash.0))?;
            }
            EXTCODECOPY => {
                let [address, dest, offset, len] = m.pop_n()?;
                let address = Address::from_word(address.into());
                let (dest, len) = (as_usize_saturated(dest), as_usize_saturated(len));
                self.charge(gas::COLD_ACCOUNT_ACCESS_COST.saturating_add(copy_cost(len)))?;
                self.expand_memory(m, dest, len)?;
                if len > 0 {
                    self.load_account(address)?;
                    let code = self.state.get_code(address, as_usize_saturated(offset), len)?;
                    m.write_memory(dest, &code, 0, len);
                }
            }
            RETURNDATASIZE => {
                let size = U256::from(m.return_data.len());
                self.push(m, gas::BASE, size)?;
            }
            RETURNDATACOPY => {
                let [dest, offset, len] = m.pop_n()?;
                let (dest, offset, len) =
                    (as_usize_saturated(dest), as_usize_saturated(offset), as_usize_saturated(len));
                self.charge(gas::VERYLOW.saturating_add(copy_cost(len)))?;
                if offset.checked_add(len).is_none_or(|end| end > m.return_data.len()) {
                    return Err(Interrupt::Fault);
                }
                self.expand_memory(m, dest, len)?;
                let data = m.return_data.clone();
                m.write_memory(dest, &data, offset, len);
            }
            TIMESTAMP => self.push(m, gas::BASE, U256::from(self.tx.timestamp))?,
            NUMBER => self.push(m, gas::BASE, U256::from(self.tx.block_number))?,
            CHAINID => self.push(m, gas::BASE, U256::from(self.manager.config().chain_id))?,
            POP => {
                self.charge(gas::BASE)?;
                m.pop()?;
            }
            MLOAD => {
                self.charge(gas::VERYLOW)?;
                let offset = as_usize_saturated(m.pop()?);
                self.expand_memory(m, offset, 32)?;
                let value = U256::from_be_slice(&m.read_memory(offset, 32));
                m.push(value)?;
            }
            MSTORE => {
                self.charge(gas::VERYLOW)?;
                let [offset, value] = m.pop_n()?;
                let offset = as_usize_saturated(offset);
                self.expand_memory(m, offset, 32)?;
                m.memory.set(offset, &value.to_be_bytes::<32>());
            }
            MSTORE8 => {
                self.charge(gas::VERYLOW)?;
                let [offset, value] = m.pop_n()?;
                let offset = as_usize_saturated(offset);
                self.expand_memory(m, offset, 1)?;
                m.memory.set(offset, &[value.as_limbs()[0] as u8]);
            }
            SLOAD => {
                self.charge(gas::COLD_SLOAD_COST)?;
                let key = B256::from(m.pop()?);
                self.load_slot(context.address, key)?;
                let value = self.state.get_contract_storage(context.address, key)?;
                m.push(U256::from_be_bytes(value.0))?;
            }
            SSTORE => {
                self.ensure_mutable()?;
                let [key, value] = m.pop_n()?;
                let key = B256::from(key);
                self.load_slot(context.address, key)?;
                let current = self.state.get_contract_storage(context.address, key)?;
                let cost = if current.is_zero() && !value.is_zero() {
                    gas::SSTORE_SET
                } else {
                    gas::SSTORE_RESET
                };
                self.charge(cost)?;
                self.change_slot(context.address, key)?;
                self.state.put_contract_storage(context.address, key, value.into())?;
            }
            JUMP => {
                self.charge(gas::MID)?;
                let dest = as_usize_saturated(m.pop()?);
                if !m.is_jumpdest(dest) {
                    return Err(Interrupt::Fault);
                }
                next_pc = dest;
            }
            JUMPI => {
                self.charge(gas::HIGH)?;
                let [dest, condition] = m.pop_n()?;
                if !condition.is_zero() {
                    let dest = as_usize_saturated(dest);
                    if !m.is_jumpdest(dest) {
                        return Err(Interrupt::Fault);
                    }
                    next_pc = dest;
                }
            }
            PC => {
                let pc = U256::from(m.pc);
                self.push(m, gas::BASE, pc)?;
            }
            MSIZE => {
                let size = U256::from(m.memory.len());
                self.push(m, gas::BASE, size)?;
            }
            GAS => {
                self.charge(gas::BASE)?;
                m.push(U256::from(self.contexts.current().remaining_gas))?;
            }
            JUMPDEST => self.charge(gas::JUMPDEST)?,
            PUSH0 => self.push(m, gas::BASE, U256::ZERO)?,
            PUSH1..=PUSH32 => {
                let len = immediate_size(op);
                let value = m.immediate(len);
                self.push(m, gas::VERYLOW, value)?;
                next_pc += len;
            }
            DUP1..=DUP16 => {
                self.charge(gas::VERYLOW)?;
                m.dup(usize::from(op - DUP1) + 1)?;
            }
            SWAP1..=SWAP16 => {
                self.charge(gas::VERYLOW)?;
                m.swap(usize::from(op - SWAP1) + 1)?;
            }
            LOG0..=LOG4 => {
                self.ensure_mutable()?;
                let [offset, len] = m.pop_n()?;
                let (offset, len) = (as_usize_saturated(offset), as_usize_saturated(len));
                let count = usize::from(op - LOG0);
                let mut topics = Vec::with_capacity(count);
                for _ in 0..count {
                    topics.push(B256::from(m.pop()?));
                }
                let cost = gas::LOG
                    .saturating_add(gas::LOGDATA.saturating_mul(len as u64))
                    .saturating_add(gas::LOGTOPIC.saturating_mul(count as u64));
                self.charge(cost)?;
                self.expand_memory(m, offset, len)?;
                let data = m.read_memory(offset, len);
                self.logs.push(Log::new_unchecked(context.address, topics, data));
            }
            QUEUEORIGIN => {
                let tag = U256::from(self.tx.queue_origin as u8);
                self.push(m, gas::SANDBOX_CONTEXT, tag)?;
            }
            L1TXORIGIN => {
                let origin = address_word(self.tx.origin_address);
                self.push(m, gas::SANDBOX_CONTEXT, origin)?;
            }
            GETNONCE => {
                let nonce = self.state.get_account(context.address)?.nonce;
                self.push(m, gas::SANDBOX_CONTEXT, U256::from(nonce))?;
            }
            INCREMENTNONCE => {
                self.ensure_mutable()?;
                self.charge(gas::SANDBOX_CONTEXT)?;
                self.bump_nonce(context.address)?;
            }
            CREATEEOA => {
                self.ensure_mutable()?;
                let [hash, v, r, s] = m.pop_n()?;
                self.charge(gas::CREATE_EOA)?;
                let v = u8::try_from(as_u64_saturated(v)).map_err(|_| Interrupt::Fault)?;
                let signer = eoa::recover_signer(hash.into(), v, r.into(), s.into())
                    .ok_or(Interrupt::Fault)?;
                self.create_eoa(signer)?;
            }
            CREATE | CREATE2 => {
                self.ensure_mutable()?;
                let [value, offset, len] = m.pop_n()?;
                let salt = if op == CREATE2 { Some(B256::from(m.pop()?)) } else { None };
                let (offset, len) = (as_usize_saturated(offset), as_usize_saturated(len));
                let hashing = if salt.is_some() {
                    gas::KECCAK256WORD.saturating_mul(num_words(len) as u64)
                } else {
                    0
                };
                self.charge(gas::CREATE.saturating_add(hashing))?;
                self.expand_memory(m, offset, len)?;
                let init_code = m.read_memory(offset, len);
                let gas_limit = all_but_one_64th(self.contexts.current().remaining_gas);
                self.charge(gas_limit)?;
                let input = match salt {
                    Some(salt) => FrameInput::Create2 { value, init_code, salt, gas_limit },
                    None => FrameInput::Create { value, init_code, gas_limit },
                };
                m.pc = next_pc;
                return Ok(Action::Open(input, Resume::Create { gas_limit }));
            }
            CALL | STATICCALL | DELEGATECALL => {
                let requested = m.pop()?;
                let target = Address::from_word(m.pop()?.into());
                let value = if op == CALL { m.pop()? } else { U256::ZERO };
                let [in_offset, in_len, out_offset, out_len] = m.pop_n()?;
                if !value.is_zero() {
                    self.ensure_mutable()?;
                }
                let (in_offset, in_len) = (as_usize_saturated(in_offset), as_usize_saturated(in_len));
                let (out_offset, out_len) =
                    (as_usize_saturated(out_offset), as_usize_saturated(out_len));
                let value_cost = if value.is_zero() { 0 } else { gas::CALLVALUE };
                self.charge(gas::COLD_ACCOUNT_ACCESS_COST.saturating_add(value_cost))?;
                self.expand_memory(m, in_offset, in_len)?;
                self.expand_memory(m, out_offset, out_len)?;

                let available = all_but_one_64th(self.contexts.current().remaining_gas);
                let gas_limit = as_u64_saturated(requested).min(available);
                self.charge(gas_limit)?;
                let data = m.read_memory(in_offset, in_len);
                let input = match op {
                    CALL => FrameInput::Call { target, value, data, gas_limit },
                    STATICCALL => FrameInput::StaticCall { target, data, gas_limit },
                    _ => FrameInput::DelegateCall { target, data, gas_limit },
                };
                m.pc = next_pc;
                return Ok(Action::Open(input, Resume::Call { gas_limit, out_offset, out_len }));
            }
            RETURN | REVERT => {
                let [offset, len] = m.pop_n()?;
                let (offset, len) = (as_usize_saturated(offset), as_usize_saturated(len));
                self.expand_memory(m, offset, len)?;
                let data = m.read_memory(offset, len);
                let halt = if op == RETURN { Halt::Return(data) } else { Halt::Revert(data) };
                return Ok(Action::Halt(halt));
            }
            _ => return Err(Interrupt::Fault),
        }
        m.pc = next_pc;
        Ok(Action::Continue)
    }
}

/// Turns an interrupt raised inside a frame into that frame's halt.
fn halted<E>(interrupt: Interrupt<E>) -> Result<Halt, Interrupt<E>> {
    match interrupt {
        Interrupt::Signal(flag) => Ok(Halt::Signal(flag)),
        Interrupt::Fault => Ok(Halt::Fault),
        Interrupt::Backend(err) => Err(Interrupt::Backend(err)),
    }
}

const fn all_but_one_64th(gas: u64) -> u64 {
    gas - gas / 64
}

fn address_word(address: Address) -> U256 {
    U256::from_be_bytes(address.into_word().0)
}

fn word(value: bool) -> U256 {
    if value {
        U256::from(1)
    } else {
        U256::ZERO
    }
}
