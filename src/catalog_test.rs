use super::*;
use crate::test_helpers::{MarketState, MockFailure, MockWallet, addr, connected_session, ether, raw_listing, tx};

fn three_listings() -> MockWallet {
    MockWallet::with_market(MarketState::with_listings(vec![
        raw_listing(1, addr(7), addr(7), true),
        raw_listing(2, addr(7), addr(7), true),
        raw_listing(3, addr(8), addr(8), false),
    ]))
}

fn ids(listings: &[Listing]) -> Vec<u64> {
    listings.iter().map(|l| l.id).collect()
}

fn catalog() -> Catalog {
    Catalog::new(TxHashCache::in_memory(), 20)
}

#[tokio::test]
async fn load_all_reads_every_listing_in_order() {
    let wallet = three_listings();
    let session = connected_session(&wallet).await.unwrap();
    let listings = catalog().load_all(&session).await.unwrap();
    assert_eq!(ids(&listings), vec![1, 2, 3]);
    assert!(!listings[2].available);
}

#[tokio::test]
async fn load_all_requires_connection() {
    let wallet = three_listings();
    let session = WalletSession::new(std::sync::Arc::new(wallet));
    assert!(matches!(catalog().load_all(&session).await, Err(MarketError::NotConnected)));
}

#[tokio::test]
async fn empty_slot_truncates_and_nothing_after_is_read() {
    let wallet = three_listings();
    wallet.market(|m| {
        m.empty_slots.insert(2);
    });
    let session = connected_session(&wallet).await.unwrap();
    wallet.market(|m| m.reads.clear());

    let listings = catalog().load_all(&session).await.unwrap();
    assert_eq!(ids(&listings), vec![1]);
    assert_eq!(wallet.market(|m| m.reads.clone()), vec![1, 2]);
}

#[tokio::test]
async fn read_failure_truncates_and_nothing_after_is_read() {
    let wallet = three_listings();
    wallet.market(|m| {
        m.fail_reads.insert(2);
    });
    let session = connected_session(&wallet).await.unwrap();
    wallet.market(|m| m.reads.clear());

    let listings = catalog().load_all(&session).await.unwrap();
    assert_eq!(ids(&listings), vec![1]);
    assert_eq!(wallet.market(|m| m.reads.clone()), vec![1, 2]);
}

#[tokio::test]
async fn failed_count_scans_until_sentinel() {
    let wallet = three_listings();
    wallet.market(|m| m.fail_count = true);
    let session = connected_session(&wallet).await.unwrap();
    wallet.market(|m| m.reads.clear());

    let listings = catalog().load_all(&session).await.unwrap();
    assert_eq!(ids(&listings), vec![1, 2, 3]);
    assert_eq!(wallet.market(|m| m.reads.clone()), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn failed_count_respects_fallback_bound() {
    let listings: Vec<_> = (1..=30).map(|id| raw_listing(id, addr(7), addr(7), true)).collect();
    let wallet = MockWallet::with_market(MarketState::with_listings(listings));
    wallet.market(|m| m.fail_count = true);
    let session = connected_session(&wallet).await.unwrap();

    let loaded = catalog().load_all(&session).await.unwrap();
    assert_eq!(loaded.len(), 20);
}

#[tokio::test]
async fn empty_contract_loads_nothing() {
    let wallet = MockWallet::default();
    let session = connected_session(&wallet).await.unwrap();
    assert!(catalog().load_all(&session).await.unwrap().is_empty());
    assert!(wallet.market(|m| m.reads.is_empty()));
}

#[tokio::test]
async fn sold_listings_pick_up_cached_hash() {
    let wallet = three_listings();
    let session = connected_session(&wallet).await.unwrap();
    let hashes = TxHashCache::in_memory();
    hashes.record(3, tx(9)).unwrap();
    hashes.record(1, tx(8)).unwrap();

    let listings = Catalog::new(hashes, 20).load_all(&session).await.unwrap();
    assert_eq!(listings[2].tx_hash, Some(tx(9)));
    assert_eq!(listings[0].tx_hash, None, "available listings carry no hash");
}

#[tokio::test]
async fn refresh_rereads_only_unseen_ids() {
    let wallet = three_listings();
    let session = connected_session(&wallet).await.unwrap();
    let mut catalog = catalog();
    catalog.load_all(&session).await.unwrap();

    wallet.market(|m| {
        m.reads.clear();
        m.listings.push(raw_listing(4, addr(7), addr(7), true));
    });
    catalog.note_created();
    let listings = catalog.refresh(&session).await.unwrap();

    assert_eq!(ids(&listings), vec![1, 2, 3, 4]);
    assert_eq!(wallet.market(|m| m.reads.clone()), vec![4]);
}

#[tokio::test]
async fn refresh_without_changes_reads_nothing() {
    let wallet = three_listings();
    let session = connected_session(&wallet).await.unwrap();
    let mut catalog = catalog();
    catalog.load_all(&session).await.unwrap();
    wallet.market(|m| m.reads.clear());

    catalog.refresh(&session).await.unwrap();
    assert!(wallet.market(|m| m.reads.is_empty()));
}

#[tokio::test]
async fn submit_purchase_marks_sold_and_records_hash() {
    let wallet = three_listings();
    let session = connected_session(&wallet).await.unwrap();
    let hashes = TxHashCache::in_memory();
    let mut catalog = Catalog::new(hashes.clone(), 20);
    catalog.load_all(&session).await.unwrap();

    let pending = catalog.submit_purchase(&session, 1, ether(1)).await.unwrap();
    assert_eq!(pending.listing_id, 1);
    assert_eq!(hashes.all().get(&1).copied(), Some(pending.tx_hash));

    let local = catalog.get(1).unwrap();
    assert!(!local.available);
    assert_eq!(local.tx_hash, Some(pending.tx_hash));
}

#[tokio::test]
async fn rejected_purchase_changes_nothing() {
    let wallet = three_listings();
    wallet.market(|m| m.buy_failure = Some(MockFailure::UserRejected));
    let session = connected_session(&wallet).await.unwrap();
    let hashes = TxHashCache::in_memory();
    let mut catalog = Catalog::new(hashes.clone(), 20);
    catalog.load_all(&session).await.unwrap();

    let err = catalog.submit_purchase(&session, 1, ether(1)).await.unwrap_err();
    assert_eq!(err.user_message(), "Transaction rejected.");
    assert!(catalog.get(1).unwrap().available);
    assert_eq!(hashes.all().get(&1).copied(), None);
    assert!(hashes.all().is_empty());
}

#[tokio::test]
async fn sold_listing_is_not_submitted() {
    let wallet = three_listings();
    let session = connected_session(&wallet).await.unwrap();
    let mut catalog = catalog();
    catalog.load_all(&session).await.unwrap();

    let err = catalog.submit_purchase(&session, 3, ether(3)).await.unwrap_err();
    assert!(matches!(err, MarketError::NotAvailable(3)));
    assert!(wallet.market(|m| m.sold_events.is_empty()));
}

#[tokio::test]
async fn confirm_purchase_refreshes_from_chain() {
    let wallet = three_listings();
    let session = connected_session(&wallet).await.unwrap();
    let mut catalog = catalog();
    catalog.load_all(&session).await.unwrap();

    let pending = catalog.submit_purchase(&session, 2, ether(2)).await.unwrap();
    wallet.market(|m| m.reads.clear());
    let receipt = catalog.confirm_purchase(&session, pending).await.unwrap();

    assert_eq!(receipt.tx_hash, pending.tx_hash);
    assert_eq!(wallet.market(|m| m.reads.clone()), vec![2]);
    let listing = catalog.get(2).unwrap();
    assert_eq!(listing.owner, addr(1));
    assert_eq!(listing.tx_hash, Some(pending.tx_hash));
}

#[tokio::test]
async fn failed_confirmation_still_refreshes() {
    let wallet = three_listings();
    let session = connected_session(&wallet).await.unwrap();
    let mut catalog = catalog();
    catalog.load_all(&session).await.unwrap();
    let pending = catalog.submit_purchase(&session, 1, ether(1)).await.unwrap();

    wallet.market(|m| {
        m.receipt_failure = Some(MockFailure::Reverted("Insufficient payment".into()));
        m.reads.clear();
    });
    let err = catalog.confirm_purchase(&session, pending).await.unwrap_err();
    assert_eq!(err.user_message(), "Insufficient payment");
    assert_eq!(wallet.market(|m| m.reads.clone()), vec![1]);
}

#[tokio::test]
async fn purchase_runs_both_steps() {
    let wallet = three_listings();
    let session = connected_session(&wallet).await.unwrap();
    let mut catalog = catalog();
    catalog.load_all(&session).await.unwrap();

    catalog.purchase(&session, 1, ether(1)).await.unwrap();
    assert!(!catalog.get(1).unwrap().available);
    assert_eq!(wallet.market(|m| m.sold_events.len()), 1);
}

#[tokio::test]
async fn scan_listings_uses_fresh_cache() {
    let wallet = three_listings();
    let session = connected_session(&wallet).await.unwrap();
    let listings = scan_listings(session.contract().unwrap(), &TxHashCache::in_memory(), 20).await;
    assert_eq!(ids(&listings), vec![1, 2, 3]);
}
