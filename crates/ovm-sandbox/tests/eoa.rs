//! Tests for `CREATEEOA` and the externally-owned proxy.

use alloy_primitives::{address, b256, Address, Bytes, B256, U256};
use ovm_sandbox::{
    constants::nuisance::MIN_NUISANCE_GAS_PER_CONTRACT,
    opcode::CREATEEOA,
    proxy_code,
    test_utils::{transact, MemoryDatabase, ProgramBuilder, TEST_GAS_LIMIT},
    NuisanceGasSchedule, RevertFlag, SandboxConfig, StateStore,
};

const CALLER: Address = address!("0x000000000000000000000000000000000000ca11");
const CONTRACT: Address = address!("0x0000000000000000000000000000000000c0de01");
const IMPLEMENTATION: Address = address!("0x4200000000000000000000000000000000000003");

// signed with private key 1 over keccak256("ovm-sandbox")
const MESSAGE_HASH: B256 =
    b256!("0xb354d995259432dee34787dae8e3edc30ffcf21c6cca89d772cdbc9d47971951");
const R: B256 = b256!("0x5ad2703f5b4f4b9dea4c28fa30d86d3781d28e09dd51aae1208de80bb6155bee");
const S: B256 = b256!("0x53055a0a94bcb28dfa894470673e91479694251775f70d73726e8d065c30ef3c");
const SIGNER: Address = address!("0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");

fn create_eoa(v: u64) -> Bytes {
    ProgramBuilder::default()
        .push_b256(S)
        .push_b256(R)
        .push_number(v)
        .push_b256(MESSAGE_HASH)
        .append(CREATEEOA)
        .stop()
        .build()
}

#[test]
fn test_create_eoa_installs_proxy() {
    let code = create_eoa(28);
    let mut db = MemoryDatabase::default();
    db.set_account_code(CONTRACT, code.clone());
    db.set_empty_account(SIGNER);
    let mut state = StateStore::new(db);

    let config = SandboxConfig::default();
    let result = transact(config.clone(), &mut state, CALLER, CONTRACT, Bytes::new()).unwrap();
    assert!(result.is_success());

    let proxy = proxy_code(config.eoa_implementation);
    assert_eq!(state.code(SIGNER).unwrap(), proxy);
    assert_eq!(state.get_account(SIGNER).unwrap().nonce, 0);

    let schedule = NuisanceGasSchedule::default();
    let expected = schedule.account_cost(code.len()) +
        2 * MIN_NUISANCE_GAS_PER_CONTRACT +
        schedule.code_cost(proxy.len());
    assert_eq!(result.nuisance_gas_used, expected);
}

#[test]
fn test_create_eoa_on_existing_account_is_a_no_op() {
    let mut db = MemoryDatabase::default();
    db.set_account_code(CONTRACT, create_eoa(28));
    db.set_account_balance(SIGNER, U256::from(1));
    let mut state = StateStore::new(db);

    let result = transact(SandboxConfig::default(), &mut state, CALLER, CONTRACT, Bytes::new())
        .unwrap();
    assert!(result.is_success());
    assert!(state.code(SIGNER).unwrap().is_empty());
    assert!(state.state_diff().is_empty());
}

#[test]
fn test_create_eoa_with_invalid_signature_faults() {
    let mut db = MemoryDatabase::default();
    db.set_account_code(CONTRACT, create_eoa(30));
    db.set_empty_account(SIGNER);
    let mut state = StateStore::new(db);

    let result = transact(SandboxConfig::default(), &mut state, CALLER, CONTRACT, Bytes::new())
        .unwrap();
    assert_eq!(result.flag, Some(RevertFlag::UnknownFault));
    assert_eq!(result.gas_used, TEST_GAS_LIMIT);
    assert_eq!(result.nuisance_gas_used, TEST_GAS_LIMIT);
}

#[test]
fn test_proxy_delegates_to_implementation() {
    let mut db = MemoryDatabase::default();
    db.set_account_code(CONTRACT, create_eoa(28));
    db.set_empty_account(SIGNER);
    db.set_account_code(
        IMPLEMENTATION,
        ProgramBuilder::default().append(ovm_sandbox::opcode::ADDRESS).return_top().build(),
    );
    let mut state = StateStore::new(db);

    let config = SandboxConfig::default().with_eoa_implementation(IMPLEMENTATION);
    transact(config.clone(), &mut state, CALLER, CONTRACT, Bytes::new()).unwrap();

    // the implementation runs under the proxy's identity
    let result = transact(config, &mut state, CALLER, SIGNER, Bytes::new()).unwrap();
    assert!(result.is_success());
    assert_eq!(Address::from_slice(&result.return_data[12..]), SIGNER);
}
