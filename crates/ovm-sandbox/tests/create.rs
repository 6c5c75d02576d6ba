//! Tests for `CREATE` and `CREATE2`: address derivation, the creation gates and collisions.

use alloy_primitives::{address, Address, Bytes, B256, U256};
use ovm_sandbox::{
    constants::nuisance::MIN_NUISANCE_GAS_PER_CONTRACT,
    opcode::BALANCE,
    test_utils::{init_code, transact, transaction, MemoryDatabase, ProgramBuilder},
    DeployerAllowList, ExecutionManager, NuisanceGasSchedule, PermissiveSafetyGate, RevertFlag,
    SandboxConfig, StateStore,
};

const CALLER: Address = address!("0x000000000000000000000000000000000000ca11");
const FACTORY: Address = address!("0x0000000000000000000000000000000000fac701");

fn runtime() -> Bytes {
    ProgramBuilder::default().push_number(42).return_top().build()
}

fn factory(init: &Bytes) -> Bytes {
    ProgramBuilder::default().create(U256::ZERO, init).return_top().build()
}

fn created(result: &Bytes) -> Address {
    Address::from_slice(&result[12..])
}

fn store(factory: Bytes, empty: &[Address]) -> StateStore<MemoryDatabase> {
    let mut db = MemoryDatabase::default();
    db.set_account_code(FACTORY, factory);
    for address in empty {
        db.set_empty_account(*address);
    }
    StateStore::new(db)
}

#[test]
fn test_create_deploys_returned_code() {
    let init = init_code(runtime());
    let code = factory(&init);
    let expected = FACTORY.create(0);
    let mut state = store(code.clone(), &[expected]);

    let result = transact(SandboxConfig::default(), &mut state, CALLER, FACTORY, Bytes::new())
        .unwrap();
    assert!(result.is_success());
    assert_eq!(created(&result.return_data), expected);
    assert_eq!(state.code(expected).unwrap(), runtime());
    assert_eq!(state.get_account(expected).unwrap().nonce, 1);
    assert_eq!(state.get_account(FACTORY).unwrap().nonce, 1);

    let schedule = NuisanceGasSchedule::default();
    let expected_nuisance = 2 * schedule.account_cost(code.len()) +
        2 * MIN_NUISANCE_GAS_PER_CONTRACT +
        schedule.code_cost(runtime().len());
    assert_eq!(result.nuisance_gas_used, expected_nuisance);
}

#[test]
fn test_created_code_is_callable_in_a_later_transaction() {
    let expected = FACTORY.create(0);
    let mut state = store(factory(&init_code(runtime())), &[expected]);
    transact(SandboxConfig::default(), &mut state, CALLER, FACTORY, Bytes::new()).unwrap();

    let result = transact(SandboxConfig::default(), &mut state, CALLER, expected, Bytes::new())
        .unwrap();
    assert!(result.is_success());
    assert_eq!(U256::from_be_slice(&result.return_data), U256::from(42));
}

#[test]
fn test_create2_address() {
    let init = init_code(runtime());
    let salt = B256::with_last_byte(7);
    let code = ProgramBuilder::default().create2(U256::ZERO, &init, salt).return_top().build();
    let expected = FACTORY.create2_from_code(salt, &init);
    let mut state = store(code, &[expected]);

    let result = transact(SandboxConfig::default(), &mut state, CALLER, FACTORY, Bytes::new())
        .unwrap();
    assert_eq!(created(&result.return_data), expected);
    assert_eq!(state.code(expected).unwrap(), runtime());
}

#[test]
fn test_create_without_target_record_fails_transaction() {
    let mut state = store(factory(&init_code(runtime())), &[]);

    let result = transact(SandboxConfig::default(), &mut state, CALLER, FACTORY, Bytes::new())
        .unwrap();
    assert_eq!(result.flag, Some(RevertFlag::InvalidStateAccess));
    assert_eq!(state.get_account(FACTORY).unwrap().nonce, 0);
}

#[test]
fn test_create_collision() {
    let expected = FACTORY.create(0);
    let mut db = MemoryDatabase::default();
    db.set_account_code(FACTORY, factory(&init_code(runtime())));
    db.set_account_code(expected, ProgramBuilder::default().stop().build());
    let mut state = StateStore::new(db);

    let result = transact(SandboxConfig::default(), &mut state, CALLER, FACTORY, Bytes::new())
        .unwrap();
    assert!(result.is_success());
    assert_eq!(created(&result.return_data), Address::ZERO);
    assert_eq!(state.get_account(FACTORY).unwrap().nonce, 1);
}

#[test]
fn test_unsafe_code_is_not_deployed() {
    let expected = FACTORY.create(0);
    let unsafe_runtime = Bytes::from(vec![BALANCE]);
    let mut state = store(factory(&init_code(unsafe_runtime)), &[expected]);

    let result = transact(SandboxConfig::default(), &mut state, CALLER, FACTORY, Bytes::new())
        .unwrap();
    assert!(result.is_success());
    assert_eq!(created(&result.return_data), Address::ZERO);
    assert!(state.get_account(expected).unwrap().is_empty());
    // the nonce moves even though the creation failed
    assert_eq!(state.get_account(FACTORY).unwrap().nonce, 1);
}

#[test]
fn test_permissive_gate_deploys_any_code() {
    let expected = FACTORY.create(0);
    let unsafe_runtime = Bytes::from(vec![BALANCE]);
    let mut state = store(factory(&init_code(&unsafe_runtime)), &[expected]);

    let manager = ExecutionManager::with_safety_gate(SandboxConfig::default(), PermissiveSafetyGate);
    let result = manager.run(&transaction(CALLER, FACTORY, Bytes::new()), &mut state).unwrap();
    assert_eq!(created(&result.return_data), expected);
    assert_eq!(state.code(expected).unwrap(), unsafe_runtime);
}

#[test]
fn test_oversized_code_is_not_deployed() {
    let expected = FACTORY.create(0);
    let mut state = store(factory(&init_code(runtime())), &[expected]);

    let config = SandboxConfig::default().with_max_code_size(runtime().len() - 1);
    let result = transact(config, &mut state, CALLER, FACTORY, Bytes::new()).unwrap();
    assert_eq!(created(&result.return_data), Address::ZERO);
    assert!(state.get_account(expected).unwrap().is_empty());
}

#[test]
fn test_reverting_init_code() {
    let expected = FACTORY.create(0);
    let init = ProgramBuilder::default().revert_with_data(b"no").build();
    let code = ProgramBuilder::default().create(U256::ZERO, &init).pop().return_return_data().build();
    let mut state = store(code, &[expected]);

    let result = transact(SandboxConfig::default(), &mut state, CALLER, FACTORY, Bytes::new())
        .unwrap();
    assert_eq!(result.return_data, Bytes::from_static(b"no"));
    assert!(state.get_account(expected).unwrap().is_empty());
}

#[test]
fn test_allow_list_rejects_creator() {
    let expected = FACTORY.create(0);
    let mut state = store(factory(&init_code(runtime())), &[expected]);

    let manager = ExecutionManager::new(SandboxConfig::default())
        .with_deployers(DeployerAllowList::restricted([CALLER]));
    let result = manager.run(&transaction(CALLER, FACTORY, Bytes::new()), &mut state).unwrap();
    assert!(result.is_success());
    assert_eq!(created(&result.return_data), Address::ZERO);
    // rejected before the nonce moves
    assert_eq!(state.get_account(FACTORY).unwrap().nonce, 0);
}

#[test]
fn test_allow_list_admits_listed_creator() {
    let expected = FACTORY.create(0);
    let mut state = store(factory(&init_code(runtime())), &[expected]);

    let mut manager = ExecutionManager::new(SandboxConfig::default())
        .with_deployers(DeployerAllowList::restricted([CALLER]));
    manager.deployers_mut().allow(FACTORY);
    let result = manager.run(&transaction(CALLER, FACTORY, Bytes::new()), &mut state).unwrap();
    assert_eq!(created(&result.return_data), expected);
}
