//! End-to-end pipeline runs against the in-memory chain.

use std::collections::BTreeSet;
use std::sync::Arc;

use alloy_primitives::Address;
use tokengraph_core::{ExecutionMode, TransferKey, TransferKind};
use tokengraph_evm::mock::{erc1155_batch_log, erc1155_single_log, erc20_log, erc721_log, MockChain};
use tokengraph_evm::{PipelineBuilder, TRANSFER_SIG};

fn addr(b: u8) -> Address {
    Address::repeat_byte(b)
}

/// Ten blocks, every token standard, one malformed batch and one foreign log.
fn busy_chain() -> MockChain {
    let usdt = addr(0x10);
    let punks = addr(0x20);
    let items = addr(0x30);

    let mut chain = MockChain::new();
    for n in 1_000..1_010u64 {
        chain = chain.with_block(n, 1_600_000_000 + (n as i64 - 1_000) * 12, 8);
    }
    let mut foreign = erc20_log(1_004, 0, 9, usdt, addr(1), addr(2), 1);
    foreign.topics[0] = alloy_primitives::B256::repeat_byte(0x99);
    foreign.topics.push(alloy_primitives::B256::ZERO);

    chain
        .with_log(erc20_log(1_000, 0, 0, usdt, addr(1), addr(2), 100))
        .with_log(erc20_log(1_000, 3, 1, usdt, addr(2), addr(3), 50))
        .with_log(erc721_log(1_002, 1, 0, punks, Address::ZERO, addr(4), 7_804))
        .with_log(erc1155_single_log(1_003, 5, 2, items, addr(9), addr(4), addr(5), 10_625, 1))
        .with_log(erc1155_batch_log(1_005, 2, 4, items, addr(9), addr(5), addr(6), &[1, 2, 3], &[10, 20, 30]))
        .with_log(erc1155_batch_log(1_006, 0, 0, items, addr(9), addr(5), addr(6), &[1, 2], &[10]))
        .with_log(foreign)
        .with_log(erc20_log(1_009, 7, 3, usdt, addr(3), addr(1), 1))
}

fn keys(transfers: &[tokengraph_core::EnrichedTransfer]) -> BTreeSet<TransferKey> {
    transfers.iter().map(|t| t.key()).collect()
}

#[tokio::test]
async fn serial_and_concurrent_produce_the_same_events() {
    let chain = busy_chain();
    let base = PipelineBuilder::new().from_block(1_000).to_block(1_009).throttle_delay_ms(0);

    let serial = PipelineBuilder::new()
        .from_block(1_000)
        .to_block(1_009)
        .throttle_delay_ms(0)
        .execution(ExecutionMode::Serial)
        .build(Arc::new(chain.clone()))
        .unwrap()
        .run()
        .await
        .unwrap();
    let concurrent = base
        .log_fetch_concurrency(3)
        .block_fetch_concurrency(2)
        .build(Arc::new(chain))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(serial.transfers.len(), 8);
    assert_eq!(keys(&serial.transfers), keys(&concurrent.transfers));

    let mut a = serial.transfers.clone();
    let mut b = concurrent.transfers.clone();
    a.sort_by_key(|t| t.key());
    b.sort_by_key(|t| t.key());
    assert_eq!(a, b);
}

#[tokio::test]
async fn every_standard_is_normalised() {
    let out = PipelineBuilder::new()
        .from_block(1_000)
        .to_block(1_009)
        .build(Arc::new(busy_chain()))
        .unwrap()
        .run()
        .await
        .unwrap();

    let count = |kind| out.transfers.iter().filter(|t| t.transfer.kind == kind).count();
    assert_eq!(count(TransferKind::Fungible), 3);
    assert_eq!(count(TransferKind::NonFungible), 1);
    assert_eq!(count(TransferKind::SemiFungibleSingle), 1);
    assert_eq!(count(TransferKind::SemiFungibleBatch), 3);

    let nft = out.transfers.iter().find(|t| t.transfer.kind == TransferKind::NonFungible).unwrap();
    assert_eq!(nft.transfer.nft_id, "7804");
    assert!(nft.transfer.value.is_zero());

    // Malformed batch in block 1006 and the foreign log in 1004 yield nothing.
    assert!(out.transfers.iter().all(|t| t.transfer.block_number != 1_006));
    assert!(out.transfers.iter().all(|t| t.transfer.block_number != 1_004));
}

#[tokio::test]
async fn first_seen_and_ordinals_across_blocks() {
    let out = PipelineBuilder::new()
        .from_block(1_000)
        .to_block(1_009)
        .build(Arc::new(busy_chain()))
        .unwrap()
        .run()
        .await
        .unwrap();

    // addr(1) first sends in block 1000 tx 0 and receives again in block 1009.
    let late = out.transfers.iter().find(|t| t.transfer.block_number == 1_009).unwrap();
    let early = out
        .transfers
        .iter()
        .find(|t| t.transfer.block_number == 1_000 && t.transfer.tx_index == 0)
        .unwrap();
    assert_eq!(late.to_first_seen.timestamp, early.timestamp_estimate);
    assert_eq!(late.to_first_seen.index, 0);
    assert_eq!(early.timestamp_index, 0);

    let max_index = out.transfers.iter().map(|t| t.timestamp_index).max().unwrap();
    assert_eq!(late.timestamp_index, max_index);

    for t in &out.transfers {
        assert!(t.from_first_seen.timestamp <= t.timestamp_estimate);
        assert!(t.to_first_seen.timestamp <= t.timestamp_estimate);
        assert!(t.from_first_seen.index <= t.timestamp_index);
    }
}

#[tokio::test]
async fn token_filter_and_single_block_queries() {
    let chain = busy_chain();
    let usdt = addr(0x10);
    let out = PipelineBuilder::new()
        .from_block(1_000)
        .to_block(1_009)
        .token(Some(usdt))
        .build(Arc::new(chain.clone()))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(out.transfers.len(), 3);
    assert!(out.transfers.iter().all(|t| t.transfer.emitter == usdt));

    let queries = chain.log_queries();
    assert_eq!(queries.len(), 10);
    for q in queries {
        assert_eq!(q.from_block, q.to_block);
        assert_eq!(q.address, Some(usdt));
        assert!(q.topic0.contains(&TRANSFER_SIG));
    }
}

#[tokio::test]
async fn failed_log_fetch_is_reported() {
    let chain = busy_chain().fail_logs(1_000);
    let out = PipelineBuilder::new()
        .from_block(1_000)
        .to_block(1_009)
        .build(Arc::new(chain))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(out.transfers.len(), 6);
    assert_eq!(out.logs.attempted, 10);
    assert_eq!(out.logs.failed_units().copied().collect::<Vec<_>>(), vec![1_000]);
    assert!(!out.is_complete());
}
