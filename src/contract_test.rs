use std::sync::atomic::{AtomicUsize, Ordering};

use abi::market::ListingLayout;
use ethers::abi::{Token, encode};
use ethers::providers::{MockProvider, Provider};
use ethers::types::{H256, Log};
use ethers::utils::keccak256;

use super::*;
use crate::test_helpers::{addr, raw_listing, tx};

fn mocked_market(profile: ContractProfile) -> (RpcMarket<Provider<MockProvider>>, MockProvider) {
    let (provider, mock) = Provider::mocked();
    let abi = MarketAbi::new(profile.layout).unwrap();
    let market =
        RpcMarket::new(Arc::new(provider), Arc::new(abi), addr(0xcc), addr(1), profile, ReceiptPolicy::default());
    (market, mock)
}

fn mined(block: u64) -> TransactionReceipt {
    TransactionReceipt { status: Some(U64::one()), block_number: Some(U64::from(block)), ..TransactionReceipt::default() }
}

fn sold_log(id: u64, topic0: H256) -> Log {
    Log {
        address: addr(0xcc),
        topics: vec![topic0, H256::from_low_u64_be(id), H256::from(addr(2)), H256::from(addr(1))],
        data: Bytes::from(encode(&[Token::Uint(U256::from(5u64))])),
        transaction_hash: Some(tx(0xab)),
        ..Log::default()
    }
}

#[tokio::test]
async fn product_count_decodes_call_result() {
    let (market, mock) = mocked_market(ContractProfile::default());
    mock.push::<Bytes, _>(Bytes::from(encode(&[Token::Uint(U256::from(3u64))]))).unwrap();
    assert_eq!(market.product_count().await.unwrap(), 3);
}

#[tokio::test]
async fn product_decodes_listing_tuple() {
    let (market, mock) = mocked_market(ContractProfile::default());
    let raw = raw_listing(2, addr(3), addr(4), true);
    let tokens = vec![
        Token::Uint(U256::from(raw.product_id)),
        Token::String(raw.name.clone()),
        Token::String(raw.description.clone()),
        Token::Uint(raw.price),
        Token::Address(raw.owner),
        Token::Address(addr(4)),
        Token::Bool(raw.is_available),
    ];
    mock.push::<Bytes, _>(Bytes::from(encode(&tokens))).unwrap();
    assert_eq!(market.product(2).await.unwrap(), raw);
}

#[tokio::test]
async fn legacy_layout_reads_tuple_without_creator() {
    let profile = ContractProfile { layout: ListingLayout::Legacy, ..ContractProfile::default() };
    let (market, mock) = mocked_market(profile);
    let tokens = vec![
        Token::Uint(U256::from(5u64)),
        Token::String("Pulsera".into()),
        Token::String("Plata".into()),
        Token::Uint(U256::from(7u64)),
        Token::Address(addr(3)),
        Token::Bool(false),
    ];
    mock.push::<Bytes, _>(Bytes::from(encode(&tokens))).unwrap();
    let listing = market.product(5).await.unwrap();
    assert_eq!(listing.creator, None);
    assert!(!listing.is_available);
}

#[tokio::test]
async fn sold_events_skip_undecodable_logs() {
    let (market, mock) = mocked_market(ContractProfile::default());
    let topic = H256::from(keccak256(abi::market::PRODUCT_SOLD_SIGNATURE));
    mock.push::<Vec<Log>, _>(vec![sold_log(4, topic), sold_log(5, H256::repeat_byte(0x11))]).unwrap();

    let events = market.sold_events(addr(1)).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].product_id, 4);
    assert_eq!(events[0].seller, addr(2));
    assert_eq!(events[0].buyer, addr(1));
    assert_eq!(events[0].price, U256::from(5u64));
    assert_eq!(events[0].tx_hash, Some(tx(0xab)));
}

#[test]
fn failed_receipt_is_a_revert() {
    let receipt = TransactionReceipt { status: Some(U64::zero()), ..mined(16) };
    assert!(matches!(receipt_outcome(tx(1), &receipt), Err(MarketError::Reverted { reason: None })));
}

#[test]
fn successful_receipt_reports_block() {
    let receipt = receipt_outcome(tx(1), &mined(16)).unwrap();
    assert_eq!(receipt.block_number, Some(16));
    assert_eq!(receipt.tx_hash, tx(1));
}

#[test]
fn receipt_without_status_counts_as_mined() {
    let receipt = TransactionReceipt::default();
    assert!(receipt_outcome(tx(2), &receipt).is_ok());
}

#[tokio::test(start_paused = true)]
async fn pending_receipt_is_polled_until_mined() {
    let calls = AtomicUsize::new(0);
    let policy = ReceiptPolicy { poll_ms: 1_000, timeout_secs: 30 };
    let started = Instant::now();

    let receipt = poll_receipt(tx(1), policy, || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        async move { Ok((n >= 2).then(|| mined(16))) }
    })
    .await
    .unwrap();

    assert_eq!(receipt.block_number, Some(16));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn unmined_receipt_times_out() {
    let policy = ReceiptPolicy { poll_ms: 1_000, timeout_secs: 5 };
    let started = Instant::now();

    let err = poll_receipt(tx(2), policy, || async { Ok(None) }).await.unwrap_err();

    assert_eq!(err.error_code(), "E_CONFIRMATION_TIMEOUT");
    assert!(matches!(err, MarketError::ConfirmationTimeout(ref hash) if *hash == format!("{:#x}", tx(2))));
    assert!(started.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn receipt_errors_stop_polling() {
    let err = poll_receipt(tx(3), ReceiptPolicy::default(), || async { Err(MarketError::Rpc("boom".into())) })
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "E_RPC");
}

#[tokio::test(start_paused = true)]
async fn wait_for_receipt_polls_the_provider() {
    let (market, mock) = mocked_market(ContractProfile::default());
    // Responses are served last-in first-out.
    mock.push::<Option<TransactionReceipt>, _>(Some(mined(9))).unwrap();
    mock.push::<Option<TransactionReceipt>, _>(None).unwrap();

    let receipt = market.wait_for_receipt(tx(4)).await.unwrap();
    assert_eq!(receipt, Receipt { tx_hash: tx(4), block_number: Some(9) });
}

#[tokio::test]
async fn forced_capabilities_skip_detection() {
    let profile = ContractProfile {
        owner_index: CapabilityMode::On,
        sold_events: CapabilityMode::Off,
        ..ContractProfile::default()
    };
    let (market, _mock) = mocked_market(profile);
    assert_eq!(market.capabilities().await, Capabilities { owner_index: true, sold_events: false });
}

#[tokio::test]
async fn failed_detection_means_absent() {
    let (market, _mock) = mocked_market(ContractProfile::default());
    assert_eq!(market.capabilities().await, Capabilities::default());
}

#[tokio::test]
async fn detected_owner_index_is_reported() {
    let (market, mock) = mocked_market(ContractProfile::default());
    // Sold-event check runs second, so its response goes on first.
    mock.push::<Vec<Log>, _>(Vec::new()).unwrap();
    mock.push::<Bytes, _>(Bytes::from(encode(&[Token::Array(vec![])]))).unwrap();
    assert_eq!(market.capabilities().await, Capabilities { owner_index: true, sold_events: true });
}
