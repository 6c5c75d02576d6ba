//! Tests for nuisance gas metering across a transaction.

use alloy_primitives::{address, Address, Bytes, U256};
use ovm_sandbox::{
    constants::nuisance::{NUISANCE_GAS_SLOAD, NUISANCE_GAS_SSTORE},
    opcode::INVALID,
    test_utils::{transact, MemoryDatabase, ProgramBuilder, TEST_GAS_LIMIT},
    NuisanceGasSchedule, RevertFlag, SandboxConfig, StateStore,
};

const CALLER: Address = address!("0x000000000000000000000000000000000000ca11");
const CONTRACT: Address = address!("0x0000000000000000000000000000000000c0de01");
const LIBRARY: Address = address!("0x0000000000000000000000000000000000c0de02");

fn account_cost(code: &Bytes) -> u64 {
    NuisanceGasSchedule::default().account_cost(code.len())
}

fn store(contract: &Bytes, library: &Bytes) -> StateStore<MemoryDatabase> {
    let mut db = MemoryDatabase::default();
    db.set_account_code(CONTRACT, contract.clone());
    db.set_account_code(LIBRARY, library.clone());
    StateStore::new(db)
}

/// Reads slot 1 twice, then writes it twice.
fn slot_program() -> Bytes {
    ProgramBuilder::default()
        .sload(1)
        .pop()
        .sload(1)
        .pop()
        .sstore(1, U256::from(5))
        .sstore(1, U256::from(6))
        .stop()
        .build()
}

#[test]
fn test_first_touch_costs_base_plus_code_size() {
    let code = ProgramBuilder::default().stop().build();
    let mut state = store(&code, &Bytes::new());

    let result = transact(SandboxConfig::default(), &mut state, CALLER, CONTRACT, Bytes::new())
        .unwrap();
    assert!(result.is_success());
    assert_eq!(result.nuisance_gas_used, account_cost(&code));
    assert_eq!(result.gas_used, 0);
}

#[test]
fn test_repeated_account_access_is_charged_once() {
    let library = ProgramBuilder::default().stop().build();
    let contract = ProgramBuilder::default()
        .call(100_000, LIBRARY, U256::ZERO)
        .pop()
        .call(100_000, LIBRARY, U256::ZERO)
        .pop()
        .static_call(100_000, LIBRARY)
        .pop()
        .push_address(LIBRARY)
        .append(ovm_sandbox::opcode::EXTCODESIZE)
        .pop()
        .stop()
        .build();
    let mut state = store(&contract, &library);

    let result = transact(SandboxConfig::default(), &mut state, CALLER, CONTRACT, Bytes::new())
        .unwrap();
    assert!(result.is_success());
    assert_eq!(result.nuisance_gas_used, account_cost(&contract) + account_cost(&library));
}

#[test]
fn test_repeated_slot_access_is_charged_once() {
    let contract = slot_program();
    let mut state = store(&contract, &Bytes::new());

    let result = transact(SandboxConfig::default(), &mut state, CALLER, CONTRACT, Bytes::new())
        .unwrap();
    assert!(result.is_success());
    // load and change of the account, load and change of the slot
    let expected = 2 * account_cost(&contract) + NUISANCE_GAS_SLOAD + NUISANCE_GAS_SSTORE;
    assert_eq!(result.nuisance_gas_used, expected);
}

#[test]
fn test_flags_reset_between_transactions() {
    let contract = slot_program();
    let mut state = store(&contract, &Bytes::new());

    let first = transact(SandboxConfig::default(), &mut state, CALLER, CONTRACT, Bytes::new())
        .unwrap();
    let second = transact(SandboxConfig::default(), &mut state, CALLER, CONTRACT, Bytes::new())
        .unwrap();
    assert_eq!(first.nuisance_gas_used, second.nuisance_gas_used);
}

#[test]
fn test_exact_budget_succeeds() {
    let contract = slot_program();
    let budget = 2 * account_cost(&contract) + NUISANCE_GAS_SLOAD + NUISANCE_GAS_SSTORE;
    let mut state = store(&contract, &Bytes::new());

    let config = SandboxConfig::default().with_nuisance_gas_limit(budget);
    let result = transact(config, &mut state, CALLER, CONTRACT, Bytes::new()).unwrap();
    assert!(result.is_success());
    assert_eq!(result.nuisance_gas_used, budget);
}

#[test]
fn test_budget_one_short_exhausts_everything() {
    let contract = slot_program();
    let budget = 2 * account_cost(&contract) + NUISANCE_GAS_SLOAD + NUISANCE_GAS_SSTORE - 1;
    let mut state = store(&contract, &Bytes::new());

    let config = SandboxConfig::default().with_nuisance_gas_limit(budget);
    let result = transact(config, &mut state, CALLER, CONTRACT, Bytes::new()).unwrap();
    assert!(!result.is_success());
    assert_eq!(result.flag, Some(RevertFlag::ExceedsNuisanceGas));
    assert_eq!(result.nuisance_gas_used, budget);
    assert_eq!(result.gas_used, TEST_GAS_LIMIT);
    assert!(state.state_diff().is_empty());
}

#[test]
fn test_exhaustion_in_child_fails_whole_transaction() {
    // the library's first slot change overdraws the budget; the contract cannot absorb it
    let library = ProgramBuilder::default().sstore(1, U256::from(1)).stop().build();
    let contract = ProgramBuilder::default()
        .sstore(2, U256::from(1))
        .call(1_000_000, LIBRARY, U256::ZERO)
        .pop()
        .stop()
        .build();
    let budget = 2 * account_cost(&contract) +
        NUISANCE_GAS_SLOAD +
        NUISANCE_GAS_SSTORE +
        account_cost(&library) +
        NUISANCE_GAS_SLOAD;
    let mut state = store(&contract, &library);

    let config = SandboxConfig::default().with_nuisance_gas_limit(budget);
    let result = transact(config, &mut state, CALLER, CONTRACT, Bytes::new()).unwrap();
    assert_eq!(result.flag, Some(RevertFlag::ExceedsNuisanceGas));
    assert_eq!(result.nuisance_gas_used, budget);
    assert!(state.state_diff().is_empty());
}

#[test]
fn test_unknown_entrypoint_is_rejected_before_charging() {
    let mut state = StateStore::new(MemoryDatabase::default());

    let result = transact(SandboxConfig::default(), &mut state, CALLER, CONTRACT, Bytes::new())
        .unwrap();
    assert!(!result.is_success());
    assert_eq!(result.flag, Some(RevertFlag::InvalidStateAccess));
    assert_eq!(result.nuisance_gas_used, 0);
}

#[test]
fn test_unknown_fault_zeroes_the_budget() {
    let library = Bytes::from(vec![INVALID]);
    let contract = ProgramBuilder::default()
        .call(100_000, LIBRARY, U256::ZERO)
        .return_top()
        .build();
    let mut state = store(&contract, &library);

    let result = transact(SandboxConfig::default(), &mut state, CALLER, CONTRACT, Bytes::new())
        .unwrap();
    // the caller survives the fault, but nothing of the budget is left
    assert!(result.is_success());
    assert_eq!(U256::from_be_slice(&result.return_data), U256::ZERO);
    assert_eq!(result.nuisance_gas_used, TEST_GAS_LIMIT);
}

#[test]
fn test_touching_state_after_a_fault_overdraws() {
    let library = Bytes::from(vec![INVALID]);
    let contract = ProgramBuilder::default()
        .call(100_000, LIBRARY, U256::ZERO)
        .pop()
        .sload(1)
        .stop()
        .build();
    let mut state = store(&contract, &library);

    let result = transact(SandboxConfig::default(), &mut state, CALLER, CONTRACT, Bytes::new())
        .unwrap();
    assert_eq!(result.flag, Some(RevertFlag::ExceedsNuisanceGas));
}
