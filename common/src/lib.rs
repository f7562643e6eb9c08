use ethereum_types::{Address, BigEndianHash as _, H160, H256, U256};

/// The zkEVM system contract holding the intermediate state root of every
/// pre-etrog block.
/// 0x000000000000000000000000000000005ca1ab1e
pub const SYSTEM_SC: Address = H160([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x5c, 0xa1, 0xab, 0x1e,
]);

/// Storage index of the `blockNumber => stateRoot` mapping inside
/// [`SYSTEM_SC`].
pub const STATE_ROOT_STORAGE_POS: u64 = 1;

/// First fork whose batches carry an effective gas price percentage per
/// transaction.
pub const FORK_ID_DRAGONFRUIT: u64 = 5;

/// First fork with multiple blocks per batch and `changeL2Block` markers in
/// the batch data. Intermediate state roots are only backfilled for blocks of
/// earlier forks.
pub const FORK_ID_ETROG: u64 = 7;

/// The all-zero hash.
pub const ZERO_HASH: H256 = H256([0u8; 32]);

/// Storage slot of the intermediate state root of `block_number` in
/// [`SYSTEM_SC`]: `keccak256(pad32(block_number) ++ pad32(1))`.
pub fn system_sc_position(block_number: u64) -> H256 {
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(H256::from_uint(&U256::from(block_number)).as_bytes());
    preimage[32..]
        .copy_from_slice(H256::from_uint(&U256::from(STATE_ROOT_STORAGE_POS)).as_bytes());
    keccak_hash::keccak(preimage)
}

#[test]
fn test_system_sc_address() {
    assert_eq!(
        SYSTEM_SC,
        Address::from(hex_literal::hex!(
            "000000000000000000000000000000005ca1ab1e"
        ))
    );
}

#[test]
fn test_system_sc_position_layout() {
    let mut preimage = [0u8; 64];
    preimage[31] = 42;
    preimage[63] = 1;
    assert_eq!(system_sc_position(42), keccak_hash::keccak(preimage));
    assert_ne!(system_sc_position(0), system_sc_position(1));
}
