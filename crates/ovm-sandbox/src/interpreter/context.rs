use alloy_primitives::{Address, U256};

/// How a frame was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum CallType {
    /// The transaction itself, before the first frame.
    #[display("origin")]
    Origin,
    /// `CALL`.
    #[display("call")]
    Call,
    /// `STATICCALL`.
    #[display("staticcall")]
    StaticCall,
    /// `DELEGATECALL`.
    #[display("delegatecall")]
    DelegateCall,
    /// `CREATE` or `CREATE2`, running init code.
    #[display("create")]
    Create,
}

/// The activation record of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// The account whose identity and storage the frame uses (`ADDRESS`).
    pub address: Address,
    /// The account whose code runs. Differs from `address` only for delegate calls.
    pub code_address: Address,
    /// The effective caller (`CALLER`).
    pub caller: Address,
    /// How the frame was entered.
    pub call_type: CallType,
    /// The value transferred with the call (`CALLVALUE`).
    pub value: U256,
    /// Whether mutations are forbidden.
    pub is_static: bool,
    /// Ordinary gas left to the frame.
    pub remaining_gas: u64,
}

impl CallContext {
    /// The root context of a transaction: the caller of the entrypoint, holding its gas limit.
    pub const fn origin(caller: Address, gas_limit: u64) -> Self {
        Self {
            address: caller,
            code_address: caller,
            caller,
            call_type: CallType::Origin,
            value: U256::ZERO,
            is_static: false,
            remaining_gas: gas_limit,
        }
    }
}

/// The stack of active contexts. There is always an active context; the root belongs to the
/// transaction and is never popped.
#[derive(Debug, Clone)]
pub struct ContextStack {
    active: CallContext,
    parents: Vec<CallContext>,
}

impl ContextStack {
    /// Creates a stack holding only `root`.
    pub const fn new(root: CallContext) -> Self {
        Self { active: root, parents: Vec::new() }
    }

    /// The number of frames above the root.
    pub fn depth(&self) -> usize {
        self.parents.len()
    }

    /// The active context.
    pub const fn current(&self) -> &CallContext {
        &self.active
    }

    /// The active context, mutably.
    pub fn current_mut(&mut self) -> &mut CallContext {
        &mut self.active
    }

    /// Makes `context` the active context.
    pub fn push(&mut self, context: CallContext) {
        let parent = core::mem::replace(&mut self.active, context);
        self.parents.push(parent);
    }

    /// Restores the parent context, returning the one that was active. The root is never
    /// popped; at depth zero this returns `None`.
    pub fn pop(&mut self) -> Option<CallContext> {
        let parent = self.parents.pop()?;
        Some(core::mem::replace(&mut self.active, parent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop() {
        let mut stack = ContextStack::new(CallContext::origin(Address::ZERO, 100));
        assert_eq!(stack.depth(), 0);
        assert_eq!(stack.pop(), None);

        let child = CallContext {
            address: Address::with_last_byte(1),
            code_address: Address::with_last_byte(1),
            call_type: CallType::Call,
            remaining_gas: 50,
            ..*stack.current()
        };
        stack.push(child);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.current().address, Address::with_last_byte(1));

        stack.current_mut().remaining_gas = 10;
        assert_eq!(stack.pop().map(|context| context.remaining_gas), Some(10));
        assert_eq!(stack.current().call_type, CallType::Origin);
        assert_eq!(stack.current().remaining_gas, 100);
    }
}
