use alloy_primitives::{keccak256, B256, U256};

/// One step of a logical storage path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotPathSegment {
    /// A mapping lookup: `keccak(key ++ slot)`.
    MapKey(B256),
    /// An element of a dynamic array: `keccak(slot) + index`.
    Index(U256),
    /// A field of a struct laid out from `slot`: `slot + offset`.
    Offset(U256),
}

/// Derives the storage key of a logical path rooted at `base`.
///
/// Follows the Solidity storage layout conventions, so guest code compiled against them reads
/// the same slots a driver computes here.
pub fn derive_slot(base: B256, path: &[SlotPathSegment]) -> B256 {
    path.iter().fold(base, |slot, segment| match *segment {
        SlotPathSegment::MapKey(key) => {
            let mut preimage = [0u8; 64];
            preimage[..32].copy_from_slice(key.as_slice());
            preimage[32..].copy_from_slice(slot.as_slice());
            keccak256(preimage)
        }
        SlotPathSegment::Index(index) => {
            let start = U256::from_be_bytes(keccak256(slot).0);
            start.wrapping_add(index).into()
        }
        SlotPathSegment::Offset(offset) => {
            U256::from_be_bytes(slot.0).wrapping_add(offset).into()
        }
    })
}
