//! Transfer log decoder.
//!
//! Turns one raw log into zero or more [`TransferEvent`]s. Dispatch is on the
//! number of topics, then on topic[0]:
//!
//! | topics | topic[0]          | kind                  | payload               |
//! |--------|-------------------|-----------------------|-----------------------|
//! | 3      | (any)             | ERC20                 | value, any width      |
//! | 4      | `Transfer`        | ERC721                | empty, id in topic[3] |
//! | 4      | `TransferSingle`  | ERC1155 single        | `(uint256, uint256)`  |
//! | 4      | `TransferBatch`   | ERC1155 batch         | `(uint256[], uint256[])` |
//!
//! Any other shape decodes to nothing. Decoding never fails: a three-topic
//! log always yields one event, and a malformed ERC1155 payload is logged and
//! handled so one bad entry cannot abort a block.

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{b256, Address, B256, U256};
use tokengraph_core::{RawLog, TokenAmount, TransferEvent, TransferKind};

/// `Transfer(address,address,uint256)`, shared by ERC20 and ERC721.
pub const TRANSFER_SIG: B256 =
    b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

/// `TransferSingle(address,address,address,uint256,uint256)`.
pub const TRANSFER_SINGLE_SIG: B256 =
    b256!("c3d58168c5ae7397731d063d5bbf3d657854427343f4c083240f7aacaa2d0f62");

/// `TransferBatch(address,address,address,uint256[],uint256[])`.
pub const TRANSFER_BATCH_SIG: B256 =
    b256!("4a39dc06d4c0dbc64b70af90fd698a233a518aa5d07e595d983b8c0526c8f7fb");

/// Every topic[0] the decoder understands.
pub const TRANSFER_TOPICS: [B256; 3] = [TRANSFER_SIG, TRANSFER_SINGLE_SIG, TRANSFER_BATCH_SIG];

/// Decode every log of a block, preserving log order.
pub fn decode_logs<'a>(logs: impl IntoIterator<Item = &'a RawLog>) -> Vec<TransferEvent> {
    logs.into_iter().flat_map(decode_log).collect()
}

/// Decode one log.
pub fn decode_log(log: &RawLog) -> Vec<TransferEvent> {
    match log.topics.as_slice() {
        [_, from, to] => {
            let value = decode_fungible_value(&log.data);
            if value.bits() > 256 {
                tracing::debug!(
                    tx_hash = %log.tx_hash,
                    log_index = log.log_index,
                    bits = value.bits(),
                    "ERC20 value wider than 256 bits"
                );
            }
            vec![event(log, TransferKind::Fungible, Address::ZERO, from, to, value, String::new())]
        }
        [sig, from, to, id] if *sig == TRANSFER_SIG => {
            let id = U256::from_be_bytes(id.0);
            vec![event(log, TransferKind::NonFungible, Address::ZERO, from, to, TokenAmount::zero(), id.to_string())]
        }
        [sig, operator, from, to] if *sig == TRANSFER_SINGLE_SIG => {
            let operator = topic_address(operator);
            let (id, value) = decode_single_payload(&log.data).unwrap_or_else(|| {
                tracing::warn!(
                    tx_hash = %log.tx_hash,
                    log_index = log.log_index,
                    "failed to decode TransferSingle payload, using id=0 value=0"
                );
                (U256::ZERO, U256::ZERO)
            });
            vec![event(log, TransferKind::SemiFungibleSingle, operator, from, to, value.into(), id.to_string())]
        }
        [sig, operator, from, to] if *sig == TRANSFER_BATCH_SIG => {
            let operator = topic_address(operator);
            let Some(entries) = decode_batch_payload(&log.data) else {
                tracing::warn!(
                    tx_hash = %log.tx_hash,
                    log_index = log.log_index,
                    "failed to decode TransferBatch payload, skipping"
                );
                return Vec::new();
            };
            entries
                .into_iter()
                .map(|(id, value)| {
                    event(log, TransferKind::SemiFungibleBatch, operator, from, to, value.into(), id.to_string())
                })
                .collect()
        }
        [sig, ..] if log.topics.len() == 4 => {
            tracing::trace!(tx_hash = %log.tx_hash, topic0 = %sig, "unrecognised log topic0");
            Vec::new()
        }
        topics => {
            tracing::trace!(tx_hash = %log.tx_hash, topics = topics.len(), "unrecognised log topic count");
            Vec::new()
        }
    }
}

fn event(
    log: &RawLog,
    kind: TransferKind,
    operator: Address,
    from: &B256,
    to: &B256,
    value: TokenAmount,
    nft_id: String,
) -> TransferEvent {
    TransferEvent {
        block_number: log.block_number,
        tx_hash: log.tx_hash,
        tx_index: log.tx_index,
        log_index: log.log_index,
        emitter: log.address,
        kind,
        from: topic_address(from),
        to: topic_address(to),
        operator,
        value,
        nft_id,
    }
}

/// Address held in the low 20 bytes of an indexed topic.
pub fn topic_address(topic: &B256) -> Address {
    Address::from_word(*topic)
}

/// Big-endian integer of the whole ERC20 data payload, at any width.
///
/// An empty payload is zero.
pub fn decode_fungible_value(data: &[u8]) -> TokenAmount {
    TokenAmount::from_be_slice(data)
}

/// `(id, value)` of an ERC1155 `TransferSingle` payload.
pub fn decode_single_payload(data: &[u8]) -> Option<(U256, U256)> {
    let ty = DynSolType::Tuple(vec![DynSolType::Uint(256), DynSolType::Uint(256)]);
    match ty.abi_decode_params(data).ok()? {
        DynSolValue::Tuple(values) => match values.as_slice() {
            [DynSolValue::Uint(id, _), DynSolValue::Uint(value, _)] => Some((*id, *value)),
            _ => None,
        },
        _ => None,
    }
}

/// `(id, value)` pairs of an ERC1155 `TransferBatch` payload.
///
/// Returns `None` if the payload does not decode or the two arrays differ in
/// length. A batch is never split into a partial result.
pub fn decode_batch_payload(data: &[u8]) -> Option<Vec<(U256, U256)>> {
    let array = || DynSolType::Array(Box::new(DynSolType::Uint(256)));
    let ty = DynSolType::Tuple(vec![array(), array()]);
    let DynSolValue::Tuple(values) = ty.abi_decode_params(data).ok()? else {
        return None;
    };
    let [DynSolValue::Array(ids), DynSolValue::Array(amounts)] = values.as_slice() else {
        return None;
    };
    if ids.len() != amounts.len() {
        tracing::warn!(ids = ids.len(), values = amounts.len(), "TransferBatch arrays differ in length");
        return None;
    }
    ids.iter()
        .zip(amounts)
        .map(|pair| match pair {
            (DynSolValue::Uint(id, _), DynSolValue::Uint(value, _)) => Some((*id, *value)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bytes;

    fn word(addr: Address) -> B256 {
        addr.into_word()
    }

    fn raw(topics: Vec<B256>, data: &[u8]) -> RawLog {
        RawLog {
            address: Address::repeat_byte(0xee),
            topics,
            data: Bytes::copy_from_slice(data),
            block_number: 27_265_300,
            tx_hash: B256::repeat_byte(0x24),
            tx_index: 2,
            log_index: 8,
        }
    }

    fn hex_data(s: &str) -> Vec<u8> {
        hex::decode(s.trim_start_matches("0x")).unwrap()
    }

    fn uint_array(values: &[u64]) -> DynSolValue {
        DynSolValue::Array(values.iter().map(|v| DynSolValue::Uint(U256::from(*v), 256)).collect())
    }

    #[test]
    fn erc20_value_is_whole_payload() {
        let from = Address::repeat_byte(1);
        let to = Address::repeat_byte(2);
        let value = U256::from(1_000_000u64);
        let log = raw(vec![TRANSFER_SIG, word(from), word(to)], &value.to_be_bytes::<32>());

        let events = decode_log(&log);
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.kind, TransferKind::Fungible);
        assert_eq!(e.from, from);
        assert_eq!(e.to, to);
        assert_eq!(e.value, TokenAmount::from(value));
        assert_eq!(e.operator, Address::ZERO);
        assert!(e.nft_id.is_empty());
        assert_eq!(e.emitter, log.address);
    }

    #[test]
    fn erc20_empty_and_padded_payloads() {
        assert_eq!(decode_fungible_value(&[]), TokenAmount::zero());
        let mut padded = vec![0u8; 40];
        padded[39] = 7;
        assert_eq!(decode_fungible_value(&padded), TokenAmount::from(7u64));
    }

    #[test]
    fn erc20_value_wider_than_256_bits_is_kept() {
        let from = Address::repeat_byte(1);
        let to = Address::repeat_byte(2);
        let log = raw(vec![TRANSFER_SIG, word(from), word(to)], &[1u8; 33]);

        let events = decode_log(&log);
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.kind, TransferKind::Fungible);
        assert_eq!(e.from, from);
        assert_eq!(e.to, to);
        assert_eq!(e.value.bits(), 257);
        assert!(e.value > TokenAmount::from(U256::MAX));
        assert_eq!(e.value, TokenAmount::from_be_slice(&[1u8; 33]));
    }

    #[test]
    fn erc721_id_from_fourth_topic() {
        let id = B256::from(U256::from(10_625u64).to_be_bytes::<32>());
        let log = raw(vec![TRANSFER_SIG, B256::ZERO, word(Address::repeat_byte(3)), id], &[]);
        let events = decode_log(&log);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, TransferKind::NonFungible);
        assert_eq!(events[0].nft_id, "10625");
        assert!(events[0].value.is_zero());
        assert_eq!(events[0].from, Address::ZERO);
    }

    #[test]
    fn erc721_large_id_is_not_truncated() {
        let id = B256::repeat_byte(0xff);
        let log = raw(vec![TRANSFER_SIG, B256::ZERO, B256::ZERO, id], &[]);
        assert_eq!(decode_log(&log)[0].nft_id, U256::MAX.to_string());
    }

    #[test]
    fn single_payload_vectors() {
        let data = hex_data(
            "0x0000000000000000000000000000000000000000000000000000000000002981\
             0000000000000000000000000000000000000000000000000000000000000001",
        );
        assert_eq!(decode_single_payload(&data), Some((U256::from(10_625u64), U256::from(1u64))));

        let data = hex_data(
            "0x0000000000000000000000000000000000000000000000000000000000000005\
             0000000000000000000000000000000000000000000000000000000000000004",
        );
        assert_eq!(decode_single_payload(&data), Some((U256::from(5u64), U256::from(4u64))));

        assert_eq!(decode_single_payload(&[0x01]), None);
    }

    #[test]
    fn single_log_defaults_to_zero_on_bad_payload() {
        let operator = Address::repeat_byte(9);
        let from = Address::repeat_byte(1);
        let to = Address::repeat_byte(2);
        let log = raw(vec![TRANSFER_SINGLE_SIG, word(operator), word(from), word(to)], &[0x01]);

        let events = decode_log(&log);
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.kind, TransferKind::SemiFungibleSingle);
        assert_eq!(e.nft_id, "0");
        assert!(e.value.is_zero());
        assert_eq!(e.operator, operator);
        assert_eq!(e.from, from);
        assert_eq!(e.to, to);
    }

    #[test]
    fn batch_payload_vectors() {
        let one = hex_data(
            "0x0000000000000000000000000000000000000000000000000000000000000040\
             0000000000000000000000000000000000000000000000000000000000000080\
             0000000000000000000000000000000000000000000000000000000000000001\
             0000000000000000000000000000000000000000000000000000000000000517\
             0000000000000000000000000000000000000000000000000000000000000001\
             0000000000000000000000000000000000000000000000000000000000000001",
        );
        assert_eq!(decode_batch_payload(&one), Some(vec![(U256::from(1303u64), U256::from(1u64))]));

        let two = hex_data(
            "0x0000000000000000000000000000000000000000000000000000000000000040\
             00000000000000000000000000000000000000000000000000000000000000a0\
             0000000000000000000000000000000000000000000000000000000000000002\
             0000000000000000000000000000000000000000000000000000000000002914\
             0000000000000000000000000000000000000000000000000000000000002933\
             0000000000000000000000000000000000000000000000000000000000000002\
             0000000000000000000000000000000000000000000000000000000000000001\
             0000000000000000000000000000000000000000000000000000000000000001",
        );
        assert_eq!(
            decode_batch_payload(&two),
            Some(vec![
                (U256::from(10_516u64), U256::from(1u64)),
                (U256::from(10_547u64), U256::from(1u64)),
            ])
        );
    }

    #[test]
    fn batch_log_expands_per_entry() {
        let data = DynSolValue::Tuple(vec![uint_array(&[7, 8, 9]), uint_array(&[1, 2, 3])]).abi_encode_params();
        let log = raw(vec![TRANSFER_BATCH_SIG, B256::ZERO, B256::ZERO, B256::ZERO], &data);

        let events = decode_log(&log);
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.kind == TransferKind::SemiFungibleBatch));
        assert_eq!(
            events.iter().map(|e| e.nft_id.as_str()).collect::<Vec<_>>(),
            vec!["7", "8", "9"]
        );
        assert_eq!(events[2].value, TokenAmount::from(3u64));
        assert!(events.iter().all(|e| e.log_index == 8));
    }

    #[test]
    fn batch_length_mismatch_yields_nothing() {
        let data = DynSolValue::Tuple(vec![uint_array(&[1, 2]), uint_array(&[1])]).abi_encode_params();
        assert_eq!(decode_batch_payload(&data), None);

        let log = raw(vec![TRANSFER_BATCH_SIG, B256::ZERO, B256::ZERO, B256::ZERO], &data);
        assert!(decode_log(&log).is_empty());
    }

    #[test]
    fn batch_garbage_yields_nothing() {
        let log = raw(vec![TRANSFER_BATCH_SIG, B256::ZERO, B256::ZERO, B256::ZERO], &[0x01, 0x02]);
        assert!(decode_log(&log).is_empty());
    }

    #[test]
    fn unrecognised_shapes_are_ignored() {
        let other = B256::repeat_byte(0x77);
        assert!(decode_log(&raw(vec![other, B256::ZERO, B256::ZERO, B256::ZERO], &[])).is_empty());
        assert!(decode_log(&raw(vec![TRANSFER_SIG, B256::ZERO], &[])).is_empty());
        assert!(decode_log(&raw(vec![], &[])).is_empty());
        assert!(decode_log(&raw(vec![TRANSFER_SIG; 5], &[])).is_empty());
    }

    #[test]
    fn addresses_come_from_low_twenty_bytes() {
        let mut topic = B256::repeat_byte(0xaa);
        topic.0[12..].copy_from_slice(Address::repeat_byte(0x42).as_slice());
        assert_eq!(topic_address(&topic), Address::repeat_byte(0x42));
    }
}
