mod common;

use clearing_house_connector::{
    AccountCodec, AccountKind, AccountRecord, AnchorAccountCodec, BulkAccountLoader,
    ClearingHouseEvent, ClearingHouseSubscriber, ConnectorError, LoaderError, OptionalKindSet,
    SubscriptionState,
};
use clearing_house_state::{DepositHistory, TradeHistory};
use common::{drain, encode, markets_with_open_interest, trade_history, Fixture};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

#[tokio::test]
async fn subscribe_without_optional_kinds_exposes_only_required_accounts() {
    let fixture = Fixture::new();
    let subscriber = fixture.subscriber();

    subscriber.subscribe(OptionalKindSet::new()).await.unwrap();

    assert_eq!(subscriber.state(), SubscriptionState::Subscribed);
    assert_eq!(*subscriber.get_state_account().unwrap(), fixture.state);
    assert_eq!(
        *subscriber.get_markets_account().unwrap(),
        markets_with_open_interest(1)
    );
    assert_eq!(
        subscriber.get_trade_history_account().unwrap_err(),
        ConnectorError::OptionalStreamNotRequested(AccountKind::TradeHistory)
    );
    assert_eq!(
        subscriber.get_order_state_account().unwrap_err(),
        ConnectorError::OptionalStreamNotRequested(AccountKind::OrderState)
    );

    let mut tracked: Vec<Pubkey> = fixture.loader.tracked_accounts();
    tracked.sort();
    let mut expected = vec![fixture.state_address, fixture.state.markets];
    expected.sort();
    assert_eq!(tracked, expected);
}

#[tokio::test]
async fn requested_history_is_decoded_from_the_initial_fetch() {
    let fixture = Fixture::new();
    let subscriber = fixture.subscriber();

    subscriber
        .subscribe([AccountKind::TradeHistory, AccountKind::FundingRateHistory])
        .await
        .unwrap();

    let bytes = encode(&trade_history(&[1, 2]));
    let expected = AnchorAccountCodec
        .decode(AccountKind::TradeHistory, &bytes)
        .unwrap();
    let history = subscriber.get_trade_history_account().unwrap();
    assert_eq!(
        expected,
        AccountRecord::TradeHistory(history.clone())
    );
    assert_eq!(history.latest().map(|r| r.record_id), Some(2));

    let funding = subscriber.get_funding_rate_history_account().unwrap();
    assert_eq!(funding.records()[0].funding_rate, -42);
}

#[tokio::test]
async fn requested_but_missing_history_is_reported_as_not_loaded() {
    let fixture = Fixture::new();
    let subscriber = fixture.subscriber();

    // The fixture never writes a liquidation history account.
    subscriber
        .subscribe([AccountKind::LiquidationHistory])
        .await
        .unwrap();

    assert_eq!(
        subscriber.get_liquidation_history_account().unwrap_err(),
        ConnectorError::AccountNotLoaded(AccountKind::LiquidationHistory)
    );
}

#[tokio::test]
async fn concurrent_subscribers_share_one_bootstrap() {
    let fixture = Fixture::new();
    let subscriber = fixture.subscriber();
    let (a, b, c) = (subscriber.clone(), subscriber.clone(), subscriber.clone());

    let (ra, rb, rc) = tokio::join!(
        a.subscribe([AccountKind::DepositHistory]),
        b.subscribe(OptionalKindSet::new()),
        c.subscribe([AccountKind::TradeHistory]),
    );

    assert!(ra.is_ok() && rb.is_ok() && rc.is_ok());
    assert_eq!(*fixture.fetcher.single_reads.lock(), vec![fixture.state_address]);
    assert_eq!(*fixture.fetcher.batch_sizes.lock(), vec![3]);
    // The first caller's optional set wins.
    assert!(subscriber.get_deposit_history_account().is_ok());
    assert_eq!(
        subscriber.get_trade_history_account().unwrap_err(),
        ConnectorError::OptionalStreamNotRequested(AccountKind::TradeHistory)
    );
    assert_eq!(fixture.loader.handler_count(), (1, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_concurrent_callers_on_worker_threads_see_one_bootstrap() {
    let fixture = Fixture::new();
    let subscriber = fixture.subscriber();

    let calls = (0..16).map(|_| {
        let subscriber = subscriber.clone();
        tokio::spawn(async move { subscriber.subscribe(OptionalKindSet::new()).await })
    });
    let results = futures::future::join_all(calls).await;

    for result in results {
        result.unwrap().unwrap();
    }
    assert_eq!(fixture.fetcher.single_reads.lock().len(), 1);
    assert_eq!(fixture.loader.handler_count(), (1, 1));
}

#[tokio::test]
async fn concurrent_subscribers_share_one_failure() {
    let fixture = Fixture::new();
    *fixture.fetcher.fail.lock() = true;
    let subscriber = fixture.subscriber();
    let (a, b) = (subscriber.clone(), subscriber.clone());

    let (ra, rb) = tokio::join!(
        a.subscribe(OptionalKindSet::new()),
        b.subscribe(OptionalKindSet::new())
    );

    let err = ra.unwrap_err();
    assert!(matches!(err, ConnectorError::BootstrapFetchFailed { .. }));
    assert_eq!(rb.unwrap_err(), err);
    assert_eq!(subscriber.state(), SubscriptionState::Unsubscribed);
    assert!(fixture.loader.tracked_accounts().is_empty());
    assert_eq!(fixture.loader.handler_count(), (0, 0));

    *fixture.fetcher.fail.lock() = false;
    subscriber.subscribe(OptionalKindSet::new()).await.unwrap();
    assert!(subscriber.is_subscribed());
}

#[tokio::test]
async fn subscribe_is_idempotent_once_subscribed() {
    let fixture = Fixture::new();
    let subscriber = fixture.subscriber();

    subscriber.subscribe(OptionalKindSet::new()).await.unwrap();
    subscriber.subscribe([AccountKind::TradeHistory]).await.unwrap();

    assert_eq!(fixture.fetcher.single_reads.lock().len(), 1);
    assert!(subscriber.optional_kinds().is_empty());
    assert_eq!(subscriber.tracked_accounts().len(), 2);
}

#[tokio::test]
async fn missing_required_account_aborts_the_subscription() {
    let fixture = Fixture::new();
    fixture.fetcher.remove(&fixture.state.markets);
    let subscriber = fixture.subscriber();

    let err = subscriber.subscribe(OptionalKindSet::new()).await.unwrap_err();

    assert_eq!(
        err,
        ConnectorError::MissingAccount {
            kind: AccountKind::Markets,
            address: fixture.state.markets,
        }
    );
    assert_eq!(subscriber.state(), SubscriptionState::Unsubscribed);
    assert!(subscriber.tracked_accounts().is_empty());
    assert!(fixture.loader.tracked_accounts().is_empty());
    assert_eq!(fixture.loader.handler_count(), (0, 0));
}

#[tokio::test]
async fn loader_update_refreshes_cache_and_emits_kind_event_then_update() {
    let fixture = Fixture::new();
    let subscriber = fixture.subscriber();
    subscriber.subscribe(OptionalKindSet::new()).await.unwrap();
    let mut rx = subscriber.events();

    let newer = markets_with_open_interest(99);
    fixture.fetcher.set_account(fixture.state.markets, &newer);
    fixture.loader.load().await.unwrap();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    match &events[0] {
        ClearingHouseEvent::MarketsAccountUpdate(markets) => assert_eq!(**markets, newer),
        other => panic!("expected marketsAccountUpdate, got {}", other.name()),
    }
    assert!(matches!(events[1], ClearingHouseEvent::Update));
    assert_eq!(*subscriber.get_markets_account().unwrap(), newer);

    // Unchanged bytes are not pushed again.
    fixture.loader.load().await.unwrap();
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn initial_subscribe_emits_first_observations_then_a_generic_update() {
    let fixture = Fixture::new();
    let subscriber = fixture.subscriber();
    let mut rx = subscriber.events();

    subscriber.subscribe(OptionalKindSet::new()).await.unwrap();

    let events = drain(&mut rx);
    assert!(matches!(events.last(), Some(ClearingHouseEvent::Update)));
    // First observations arrive during bootstrap, ahead of the closing update.
    let names: Vec<&str> = events.iter().map(|e| e.name()).collect();
    assert!(names.contains(&"stateAccountUpdate"));
    assert!(names.contains(&"marketsAccountUpdate"));
    assert_eq!(names.iter().filter(|name| **name == "update").count(), 3);
}

#[tokio::test]
async fn updates_for_untracked_addresses_are_ignored() {
    let fixture = Fixture::new();
    let subscriber = fixture.subscriber();
    subscriber.subscribe(OptionalKindSet::new()).await.unwrap();
    let mut rx = subscriber.events();

    // Tracked by someone else on the shared loader.
    let foreign = Pubkey::new_unique();
    fixture.loader.add_account(foreign);
    fixture
        .fetcher
        .set_account(foreign, &markets_with_open_interest(1_000));
    fixture.loader.load().await.unwrap();

    assert!(drain(&mut rx).is_empty());
    assert_eq!(
        *subscriber.get_markets_account().unwrap(),
        markets_with_open_interest(1)
    );
}

#[tokio::test]
async fn undecodable_update_is_reported_without_stopping_other_accounts() {
    let fixture = Fixture::new();
    let subscriber = fixture.subscriber();
    subscriber.subscribe([AccountKind::TradeHistory]).await.unwrap();
    let mut rx = subscriber.events();

    fixture
        .fetcher
        .set(fixture.state.trade_history, b"not an account");
    fixture
        .fetcher
        .set_account(fixture.state.markets, &markets_with_open_interest(7));
    fixture.loader.load().await.unwrap();

    let events = drain(&mut rx);
    assert!(events.iter().any(|event| matches!(
        event,
        ClearingHouseEvent::Error(ConnectorError::DecodeFailed {
            kind: AccountKind::TradeHistory,
            ..
        })
    )));
    assert!(events
        .iter()
        .any(|event| matches!(event, ClearingHouseEvent::MarketsAccountUpdate(_))));

    assert_eq!(
        *subscriber.get_markets_account().unwrap(),
        markets_with_open_interest(7)
    );
    assert_eq!(
        *subscriber.get_trade_history_account().unwrap(),
        trade_history(&[1, 2])
    );
}

#[tokio::test]
async fn loader_errors_are_re_emitted_as_events() {
    let fixture = Fixture::new();
    let subscriber = fixture.subscriber();
    subscriber.subscribe(OptionalKindSet::new()).await.unwrap();
    let mut rx = subscriber.events();

    *fixture.fetcher.fail.lock() = true;
    let err = fixture.loader.load().await.unwrap_err();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    match &events[0] {
        ClearingHouseEvent::Error(ConnectorError::Loader(forwarded)) => {
            assert_eq!(*forwarded, err);
            assert!(matches!(forwarded, LoaderError::Rpc { .. }));
        }
        other => panic!("expected a loader error, got {}", other.name()),
    }
    // The subscription itself is unaffected.
    assert!(subscriber.get_state_account().is_ok());
}

#[tokio::test]
async fn optional_stream_stays_unavailable_after_many_updates() {
    let fixture = Fixture::new();
    let subscriber = fixture.subscriber();
    subscriber.subscribe(OptionalKindSet::new()).await.unwrap();

    for round in 2..6u128 {
        fixture
            .fetcher
            .set_account(fixture.state.markets, &markets_with_open_interest(round));
        fixture
            .fetcher
            .set_account(fixture.state.trade_history, &trade_history(&[round]));
        fixture.loader.load().await.unwrap();
        subscriber.fetch().await.unwrap();

        assert_eq!(
            subscriber.get_trade_history_account().unwrap_err(),
            ConnectorError::OptionalStreamNotRequested(AccountKind::TradeHistory)
        );
    }
}

#[tokio::test]
async fn accessors_fail_before_subscribe_and_after_unsubscribe() {
    let fixture = Fixture::new();
    let subscriber = fixture.subscriber();

    assert_eq!(
        subscriber.get_state_account().unwrap_err(),
        ConnectorError::NotSubscribed
    );
    assert_eq!(subscriber.fetch().await.unwrap_err(), ConnectorError::NotSubscribed);

    subscriber.subscribe([AccountKind::TradeHistory]).await.unwrap();
    subscriber.unsubscribe().await;

    assert_eq!(subscriber.state(), SubscriptionState::Unsubscribed);
    assert_eq!(
        subscriber.get_markets_account().unwrap_err(),
        ConnectorError::NotSubscribed
    );
    assert_eq!(
        subscriber.get_trade_history_account().unwrap_err(),
        ConnectorError::NotSubscribed
    );

    // Unsubscribing twice is a no-op.
    subscriber.unsubscribe().await;
}

#[tokio::test]
async fn resubscribe_rebuilds_the_registry_from_scratch() {
    let mut fixture = Fixture::new();
    let subscriber = fixture.subscriber();
    subscriber.subscribe([AccountKind::TradeHistory]).await.unwrap();

    subscriber.unsubscribe().await;
    assert!(subscriber.tracked_accounts().is_empty());
    assert!(fixture.loader.tracked_accounts().is_empty());
    assert_eq!(fixture.loader.handler_count(), (0, 0));

    // The program moved its deposit history while we were away.
    fixture.state.deposit_history = Pubkey::new_unique();
    fixture
        .fetcher
        .set_account(fixture.state_address, &fixture.state);
    let deposits = DepositHistory {
        head: 4,
        ..DepositHistory::default()
    };
    fixture
        .fetcher
        .set_account(fixture.state.deposit_history, &deposits);

    subscriber.subscribe([AccountKind::DepositHistory]).await.unwrap();

    let mut tracked = fixture.loader.tracked_accounts();
    tracked.sort();
    let mut expected = vec![
        fixture.state_address,
        fixture.state.markets,
        fixture.state.deposit_history,
    ];
    expected.sort();
    assert_eq!(tracked, expected);
    assert_eq!(fixture.fetcher.single_reads.lock().len(), 2);
    assert_eq!(*subscriber.get_deposit_history_account().unwrap(), deposits);
    assert_eq!(
        subscriber.get_trade_history_account().unwrap_err(),
        ConnectorError::OptionalStreamNotRequested(AccountKind::TradeHistory)
    );
}

#[tokio::test]
async fn subscribers_sharing_a_loader_keep_their_own_registrations() {
    let fixture = Fixture::new();
    let first = fixture.subscriber();
    let second = fixture.subscriber();

    first.subscribe([AccountKind::TradeHistory]).await.unwrap();
    second.subscribe(OptionalKindSet::new()).await.unwrap();
    assert_eq!(fixture.loader.handler_count(), (2, 2));

    first.unsubscribe().await;

    let tracked = fixture.loader.tracked_accounts();
    assert!(tracked.contains(&fixture.state_address));
    assert!(tracked.contains(&fixture.state.markets));
    assert!(!tracked.contains(&fixture.state.trade_history));
    assert_eq!(fixture.loader.handler_count(), (1, 1));

    let mut rx = second.events();
    fixture
        .fetcher
        .set_account(fixture.state.markets, &markets_with_open_interest(3));
    fixture.loader.load().await.unwrap();

    assert_eq!(drain(&mut rx).len(), 2);
    assert_eq!(
        *second.get_markets_account().unwrap(),
        markets_with_open_interest(3)
    );
}

#[tokio::test]
async fn fetch_refreshes_without_emitting_change_events() {
    let fixture = Fixture::new();
    let subscriber = fixture.subscriber();
    subscriber.subscribe([AccountKind::TradeHistory]).await.unwrap();
    let mut rx = subscriber.events();

    fixture
        .fetcher
        .set_account(fixture.state.trade_history, &trade_history(&[1, 2, 3]));
    subscriber.fetch().await.unwrap();

    let history: Arc<TradeHistory> = subscriber.get_trade_history_account().unwrap();
    assert_eq!(history.latest().map(|r| r.record_id), Some(3));
    // The loader's own change notification still fires; fetch adds nothing on top.
    let names: Vec<&str> = drain(&mut rx).iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["tradeHistoryAccountUpdate", "update"]);
}

#[tokio::test]
async fn dropping_the_subscriber_releases_its_loader_registrations() {
    let fixture = Fixture::new();
    let subscriber = fixture.subscriber();
    subscriber.subscribe(OptionalKindSet::new()).await.unwrap();
    assert_eq!(fixture.loader.handler_count(), (1, 1));

    drop(subscriber);

    assert_eq!(fixture.loader.handler_count(), (0, 0));
    assert!(fixture.loader.tracked_accounts().is_empty());
}

async fn until_subscribing(subscriber: &ClearingHouseSubscriber) {
    while subscriber.state() != SubscriptionState::Subscribing {
        tokio::task::yield_now().await;
    }
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn fetch_during_subscribe_waits_for_the_same_attempt() {
    let fixture = Fixture::new();
    let release = fixture.fetcher.hold_single_reads();
    let subscriber = fixture.subscriber();

    let subscribing = tokio::spawn({
        let subscriber = subscriber.clone();
        async move { subscriber.subscribe(OptionalKindSet::new()).await }
    });
    until_subscribing(&subscriber).await;
    let fetching = tokio::spawn({
        let subscriber = subscriber.clone();
        async move { subscriber.fetch().await }
    });

    settle().await;
    assert!(!fetching.is_finished());
    assert!(fixture.fetcher.batch_sizes.lock().is_empty());

    release.notify_one();
    subscribing.await.unwrap().unwrap();
    fetching.await.unwrap().unwrap();

    assert_eq!(fixture.fetcher.single_reads.lock().len(), 1);
    // The initial fetch, then the waiting fetch; never both at once.
    assert_eq!(*fixture.fetcher.batch_sizes.lock(), vec![2, 2]);
    assert!(subscriber.is_subscribed());
}

#[tokio::test]
async fn unsubscribe_during_subscribe_tears_down_after_it_completes() {
    let fixture = Fixture::new();
    let release = fixture.fetcher.hold_single_reads();
    let subscriber = fixture.subscriber();

    let subscribing = tokio::spawn({
        let subscriber = subscriber.clone();
        async move { subscriber.subscribe([AccountKind::TradeHistory]).await }
    });
    until_subscribing(&subscriber).await;
    let unsubscribing = tokio::spawn({
        let subscriber = subscriber.clone();
        async move { subscriber.unsubscribe().await }
    });

    settle().await;
    assert!(!unsubscribing.is_finished());
    assert_eq!(subscriber.state(), SubscriptionState::Subscribing);

    release.notify_one();
    subscribing.await.unwrap().unwrap();
    unsubscribing.await.unwrap();

    assert_eq!(subscriber.state(), SubscriptionState::Unsubscribed);
    assert!(subscriber.tracked_accounts().is_empty());
    assert!(fixture.loader.tracked_accounts().is_empty());
    assert_eq!(fixture.loader.handler_count(), (0, 0));
    assert_eq!(
        subscriber.get_state_account().unwrap_err(),
        ConnectorError::NotSubscribed
    );
}

/// Fails hard on the markets account, after the registry and loader registration exist.
struct PanicOnMarkets;

impl AccountCodec for PanicOnMarkets {
    fn decode(&self, kind: AccountKind, data: &[u8]) -> Result<AccountRecord, ConnectorError> {
        if kind == AccountKind::Markets {
            panic!("unexpected markets layout");
        }
        AnchorAccountCodec.decode(kind, data)
    }
}

#[tokio::test]
async fn a_crashed_subscription_task_is_reported_and_cleaned_up() {
    let fixture = Fixture::new();
    let subscriber = ClearingHouseSubscriber::with_codec(
        &fixture.config,
        fixture.program_id,
        fixture.fetcher.clone(),
        fixture.loader.clone(),
        Arc::new(PanicOnMarkets),
    );

    let err = subscriber.subscribe(OptionalKindSet::new()).await.unwrap_err();

    assert_eq!(err, ConnectorError::SubscribeAborted);
    assert_eq!(subscriber.state(), SubscriptionState::Unsubscribed);
    assert!(subscriber.tracked_accounts().is_empty());
    assert!(fixture.loader.tracked_accounts().is_empty());
    assert_eq!(fixture.loader.handler_count(), (0, 0));

    // A healthy subscriber can still use the same loader afterwards.
    let healthy = fixture.subscriber();
    healthy.subscribe(OptionalKindSet::new()).await.unwrap();
    assert_eq!(fixture.loader.handler_count(), (1, 1));
}
