use std::sync::Arc;

use chrono::Duration;

use super::common::*;
use crate::workflows::marketplace::domain::{
    GuaranteeStatus, MoveRequestId, MoveRequestRecord, PaymentId, PaymentStatus, QuoteId,
    QuoteStatus,
};
use crate::workflows::marketplace::lifecycle::{
    ArbitrationDecision, ArbitrationVerdict, ChargeOutcome, LifecycleError, MissionState,
};
use crate::workflows::marketplace::repository::{
    EventKind, PaymentRepository, QuoteRepository, RepositoryError, Settlement,
};
use crate::workflows::marketplace::{MarketplaceError, MarketplaceService};
use crate::workflows::pricing::{PriceIndicator, PricingError};

#[test]
fn submit_bid_prices_and_stores_a_pending_quote() {
    let (service, _store, _gateway, sink) = build_service();
    let request = service
        .create_move_request(move_request())
        .expect("request stored");

    let quote = service
        .submit_bid(bid(&request.request_id, "mover-1", 1350.0))
        .expect("bid stored");

    assert_eq!(quote.status, QuoteStatus::Pending);
    assert_eq!(quote.market_price_estimate, 1348);
    assert_eq!(quote.price_indicator, PriceIndicator::Green);
    assert_eq!(quote.client_display_price, 1755);
    assert_eq!(quote.request_revision, 1);
    assert_eq!(sink.kinds(), vec![EventKind::QuoteSubmitted]);
}

#[test]
fn bids_are_classified_against_the_market() {
    let (service, _store, _gateway, _sink) = build_service();
    let request = service
        .create_move_request(move_request())
        .expect("request stored");

    let indicators: Vec<PriceIndicator> = [1550.0, 2500.0, 600.0]
        .into_iter()
        .map(|price| {
            service
                .submit_bid(bid(&request.request_id, "mover-2", price))
                .expect("bid stored")
                .price_indicator
        })
        .collect();

    assert_eq!(
        indicators,
        vec![PriceIndicator::Orange, PriceIndicator::Red, PriceIndicator::Red]
    );
}

#[test]
fn notes_with_contact_details_block_the_bid() {
    let (service, store, _gateway, sink) = build_service();
    let request = service
        .create_move_request(move_request())
        .expect("request stored");
    let mut submission = bid(&request.request_id, "mover-1", 1350.0);
    submission.notes = Some("contactez-moi au 06 12 34 56 78".to_string());

    match service.submit_bid(submission) {
        Err(MarketplaceError::BlockedContent { reasons }) => {
            assert!(reasons.contains(&"Numéros de téléphone interdits".to_string()));
        }
        other => panic!("expected blocked content, got {other:?}"),
    }

    let quotes = crate::workflows::marketplace::QuoteRepository::quotes_for_request(
        store.as_ref(),
        &request.request_id,
    )
    .expect("quotes readable");
    assert!(quotes.is_empty());

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::QuoteBlockedForContactInfo);
    assert!(events[0]
        .details
        .get("reasons")
        .is_some_and(|reasons| reasons.starts_with("phone_number")));
}

#[test]
fn invalid_prices_are_rejected() {
    let (service, _store, _gateway, _sink) = build_service();
    let request = service
        .create_move_request(move_request())
        .expect("request stored");

    match service.submit_bid(bid(&request.request_id, "mover-1", 0.0)) {
        Err(MarketplaceError::Pricing(PricingError::InvalidPrice { .. })) => {}
        other => panic!("expected invalid price, got {other:?}"),
    }
}

#[test]
fn bids_on_unknown_requests_are_not_found() {
    let (service, _store, _gateway, _sink) = build_service();
    let missing = MoveRequestId("req-missing".to_string());

    assert!(matches!(
        service.submit_bid(bid(&missing, "mover-1", 1350.0)),
        Err(MarketplaceError::RequestNotFound { .. })
    ));
}

#[test]
fn accepting_a_quote_rejects_siblings_and_opens_the_payment() {
    let (service, _store, _gateway, sink) = build_service();
    let request = service
        .create_move_request(move_request())
        .expect("request stored");
    let chosen = service
        .submit_bid(bid(&request.request_id, "mover-1", 1350.0))
        .expect("first bid");
    let other = service
        .submit_bid(bid(&request.request_id, "mover-2", 1500.0))
        .expect("second bid");

    let accepted = service
        .accept_quote(&chosen.quote_id, today())
        .expect("accepted");

    assert_eq!(accepted.quote.status, QuoteStatus::Accepted);
    assert_eq!(accepted.payment.total_amount, 1755);
    assert_eq!(accepted.payment.mover_price, 1350);
    assert_eq!(accepted.payment.platform_fee, 405);
    assert_eq!(accepted.payment.deposit_amount, 702);
    assert_eq!(accepted.payment.remaining_amount, 1053);
    assert_eq!(accepted.payment.guarantee_amount, 297);
    assert_eq!(accepted.payment.payment_status, PaymentStatus::Pending);
    assert_eq!(
        service.quote(&other.quote_id).expect("sibling").status,
        QuoteStatus::Rejected
    );
    assert!(sink.kinds().contains(&EventKind::QuoteAccepted));

    match service.accept_quote(&other.quote_id, today()) {
        Err(MarketplaceError::QuoteNotPending { status, .. }) => {
            assert_eq!(status, QuoteStatus::Rejected)
        }
        other => panic!("expected not pending, got {other:?}"),
    }
}

#[test]
fn accepted_requests_refuse_new_bids_and_edits() {
    let (service, _store, _gateway, _sink) = build_service();
    let payment = accepted_payment(&service);

    assert!(matches!(
        service.submit_bid(bid(&payment.request_id, "mover-9", 1200.0)),
        Err(MarketplaceError::RequestLocked { .. })
    ));
    assert!(matches!(
        service.edit_move_request(&payment.request_id, move_request()),
        Err(MarketplaceError::RequestLocked { .. })
    ));
}

#[test]
fn quotes_past_their_validity_date_cannot_be_accepted() {
    let (service, _store, _gateway, _sink) = build_service();
    let request = service
        .create_move_request(move_request())
        .expect("request stored");
    let quote = service
        .submit_bid(bid(&request.request_id, "mover-1", 1350.0))
        .expect("bid stored");

    let after_move = moving_day() + Duration::days(1);
    assert!(matches!(
        service.accept_quote(&quote.quote_id, after_move),
        Err(MarketplaceError::QuoteValidityElapsed { .. })
    ));
    assert!(service.accept_quote(&quote.quote_id, moving_day()).is_ok());
}

#[test]
fn editing_a_request_expires_pending_quotes() {
    let (service, _store, _gateway, sink) = build_service();
    let request = service
        .create_move_request(move_request())
        .expect("request stored");
    let quote = service
        .submit_bid(bid(&request.request_id, "mover-1", 1350.0))
        .expect("bid stored");

    let mut details = move_request();
    details.volume_m3 = Some(40.0);
    let edit = service
        .edit_move_request(&request.request_id, details)
        .expect("edit stored");

    assert_eq!(edit.request.revision, 2);
    assert_eq!(edit.expired_quotes, vec![quote.quote_id.clone()]);
    assert_eq!(
        service.quote(&quote.quote_id).expect("quote").status,
        QuoteStatus::Expired
    );
    assert!(sink.kinds().contains(&EventKind::QuotesExpired));

    let repriced = service
        .submit_bid(bid(&request.request_id, "mover-1", 2100.0))
        .expect("new bid");
    assert_eq!(repriced.market_price_estimate, 2098);
    assert_eq!(repriced.request_revision, 2);
}

#[test]
fn quotes_priced_on_a_superseded_revision_are_not_accepted() {
    let (service, store, _gateway, _sink) = build_service();
    let request = service
        .create_move_request(move_request())
        .expect("request stored");
    let quote = service
        .submit_bid(bid(&request.request_id, "mover-1", 500.0))
        .expect("bid stored");

    let mut details = move_request();
    details.volume_m3 = Some(80.0);
    store
        .save_request(MoveRequestRecord {
            request_id: request.request_id.clone(),
            revision: 2,
            details,
        })
        .expect("revision stored");

    match service.accept_quote(&quote.quote_id, today()) {
        Err(MarketplaceError::StateTransitionConflict { reference }) => {
            assert_eq!(reference, quote.quote_id.0)
        }
        other => panic!("expected a conflict, got {other:?}"),
    }
    let payment_id = PaymentId::for_quote(&quote.quote_id);
    assert!(store
        .fetch_payment(&payment_id)
        .expect("store readable")
        .is_none());
    assert_eq!(
        service.quote(&quote.quote_id).expect("quote").status,
        QuoteStatus::Pending
    );
}

#[test]
fn quotes_expired_by_an_edit_cannot_be_accepted() {
    let (service, store, _gateway, _sink) = build_service();
    let request = service
        .create_move_request(move_request())
        .expect("request stored");
    let quote = service
        .submit_bid(bid(&request.request_id, "mover-1", 1350.0))
        .expect("bid stored");
    service
        .edit_move_request(&request.request_id, move_request())
        .expect("edit stored");

    assert!(matches!(
        service.accept_quote(&quote.quote_id, today()),
        Err(MarketplaceError::QuoteNotPending {
            status: QuoteStatus::Expired,
            ..
        })
    ));
    assert!(store
        .fetch_payment(&PaymentId::for_quote(&quote.quote_id))
        .expect("store readable")
        .is_none());
}

#[test]
fn collecting_the_deposit_charges_the_gateway() {
    let (service, _store, gateway, sink) = build_service();
    let payment = accepted_payment(&service);

    let updated = service
        .collect_deposit(&payment.payment_id, now())
        .expect("deposit collected");

    assert_eq!(MissionState::of(&updated), MissionState::InProgress);
    assert_eq!(updated.gateway_transaction_id.as_deref(), Some("txn-test"));
    let charges = gateway.charges();
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].amount, 702);
    assert!(sink.kinds().contains(&EventKind::DepositConfirmed));

    assert!(matches!(
        service.collect_deposit(&payment.payment_id, now()),
        Err(MarketplaceError::Lifecycle(LifecycleError::InvalidTransition { .. }))
    ));
    assert_eq!(gateway.charges().len(), 1, "no second charge");
}

#[test]
fn declined_deposit_leaves_the_mission_awaiting_payment() {
    let store = Arc::new(crate::workflows::marketplace::InMemoryMarketplaceStore::new());
    let gateway = Arc::new(RecordingGateway::declining("insufficient funds"));
    let sink = Arc::new(RecordingSink::default());
    let service = MarketplaceService::new(store, gateway, sink.clone(), config());
    let payment = accepted_payment(&service);

    let updated = service
        .collect_deposit(&payment.payment_id, now())
        .expect("outcome recorded");

    assert_eq!(updated.payment_status, PaymentStatus::Failed);
    assert_eq!(MissionState::of(&updated), MissionState::AwaitingPayment);
    assert!(sink.kinds().contains(&EventKind::DepositFailed));

    let confirmed = service
        .confirm_deposit(
            &payment.payment_id,
            ChargeOutcome::Succeeded {
                transaction_id: "txn-retry".to_string(),
            },
            now(),
        )
        .expect("provider callback applied");
    assert_eq!(MissionState::of(&confirmed), MissionState::InProgress);
}

#[test]
fn gateway_outage_surfaces_without_touching_the_record() {
    let store = Arc::new(crate::workflows::marketplace::InMemoryMarketplaceStore::new());
    let service = MarketplaceService::new(
        store,
        Arc::new(OfflineGateway),
        Arc::new(RecordingSink::default()),
        config(),
    );
    let request = service
        .create_move_request(move_request())
        .expect("request stored");
    let quote = service
        .submit_bid(bid(&request.request_id, "mover-1", 1350.0))
        .expect("bid stored");
    let payment = service
        .accept_quote(&quote.quote_id, today())
        .expect("accepted")
        .payment;

    assert!(matches!(
        service.collect_deposit(&payment.payment_id, now()),
        Err(MarketplaceError::Gateway(_))
    ));
    let stored = service.payment(&payment.payment_id).expect("record");
    assert_eq!(stored.payment_status, PaymentStatus::Pending);
}

#[test]
fn marking_complete_twice_conflicts_without_a_second_notification() {
    let (service, _store, _gateway, sink) = build_service();
    let payment = pending_review_payment(&service);

    assert_eq!(
        MissionState::of(&payment),
        MissionState::CompletedPendingReview
    );
    let completed_events = || {
        sink.kinds()
            .into_iter()
            .filter(|kind| *kind == EventKind::MissionCompleted)
            .count()
    };
    assert_eq!(completed_events(), 1);

    assert!(matches!(
        service.mark_mission_complete(&payment.payment_id, now()),
        Err(MarketplaceError::Lifecycle(LifecycleError::InvalidTransition { .. }))
    ));
    assert_eq!(completed_events(), 1);
}

#[test]
fn arbitration_releases_the_guarantee_through_the_gateway() {
    let (service, _store, gateway, sink) = build_service();
    let payment = pending_review_payment(&service);

    let approved = service
        .record_arbitration(
            &payment.payment_id,
            ArbitrationDecision {
                verdict: ArbitrationVerdict::Approve,
                released_amount: None,
                notes: None,
            },
            now(),
        )
        .expect("approved");

    assert_eq!(approved.guarantee_status, GuaranteeStatus::ReleasedToMover);
    assert_eq!(
        gateway.settlements(),
        vec![Settlement::ReleaseToMover {
            payment_id: payment.payment_id.clone(),
            amount: 297
        }]
    );
    assert!(sink.kinds().contains(&EventKind::GuaranteeReleased));

    assert!(matches!(
        service.record_arbitration(
            &payment.payment_id,
            ArbitrationDecision {
                verdict: ArbitrationVerdict::Reject,
                released_amount: None,
                notes: None,
            },
            now(),
        ),
        Err(MarketplaceError::Lifecycle(LifecycleError::Terminal { .. }))
    ));
}

#[test]
fn upheld_claim_refunds_the_client() {
    let (service, _store, gateway, sink) = build_service();
    let payment = pending_review_payment(&service);

    let rejected = service
        .record_arbitration(
            &payment.payment_id,
            ArbitrationDecision {
                verdict: ArbitrationVerdict::Reject,
                released_amount: Some(97),
                notes: Some("scratched wardrobe".to_string()),
            },
            now(),
        )
        .expect("rejected");

    assert_eq!(rejected.guarantee_status, GuaranteeStatus::Refunded);
    assert_eq!(rejected.guarantee_refunded_amount, Some(200));
    assert_eq!(
        gateway.settlements(),
        vec![
            Settlement::ReleaseToMover {
                payment_id: payment.payment_id.clone(),
                amount: 97
            },
            Settlement::RefundToClient {
                payment_id: payment.payment_id.clone(),
                amount: 200
            },
        ]
    );
    assert!(sink.kinds().contains(&EventKind::GuaranteeRefunded));
}

#[test]
fn reviews_due_only_lists_elapsed_windows() {
    let (service, _store, _gateway, _sink) = build_service();
    let payment = pending_review_payment(&service);

    assert!(service
        .reviews_due(now() + Duration::hours(47))
        .expect("readable")
        .is_empty());

    let due = service
        .reviews_due(now() + Duration::hours(48))
        .expect("readable");
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].payment_id, payment.payment_id);
}

#[test]
fn a_single_lost_race_is_retried() {
    let store = Arc::new(ContendedStore::new(1));
    let service = MarketplaceService::new(
        store.clone(),
        Arc::new(RecordingGateway::approving()),
        Arc::new(RecordingSink::default()),
        config(),
    );
    let request = service
        .create_move_request(move_request())
        .expect("request stored");
    let quote = service
        .submit_bid(bid(&request.request_id, "mover-1", 1350.0))
        .expect("bid stored");
    let payment = service
        .accept_quote(&quote.quote_id, today())
        .expect("accepted")
        .payment;

    let updated = service
        .collect_deposit(&payment.payment_id, now())
        .expect("second write lands");
    assert_eq!(MissionState::of(&updated), MissionState::InProgress);
    let stored = store
        .inner()
        .fetch_payment(&payment.payment_id)
        .expect("readable")
        .expect("present");
    assert_eq!(stored, updated);
}

#[test]
fn repeated_lost_races_surface_a_conflict() {
    let store = Arc::new(ContendedStore::new(u32::MAX));
    let service = MarketplaceService::new(
        store,
        Arc::new(RecordingGateway::approving()),
        Arc::new(RecordingSink::default()),
        config(),
    );
    let request = service
        .create_move_request(move_request())
        .expect("request stored");
    let quote = service
        .submit_bid(bid(&request.request_id, "mover-1", 1350.0))
        .expect("bid stored");
    let payment = service
        .accept_quote(&quote.quote_id, today())
        .expect("accepted")
        .payment;

    match service.confirm_deposit(
        &payment.payment_id,
        ChargeOutcome::Succeeded {
            transaction_id: "txn-1".to_string(),
        },
        now(),
    ) {
        Err(MarketplaceError::StateTransitionConflict { reference }) => {
            assert_eq!(reference, payment.payment_id.0)
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn notification_failures_do_not_fail_the_operation() {
    let service = MarketplaceService::new(
        Arc::new(crate::workflows::marketplace::InMemoryMarketplaceStore::new()),
        Arc::new(RecordingGateway::approving()),
        Arc::new(BrokenSink),
        config(),
    );
    let request = service
        .create_move_request(move_request())
        .expect("request stored");

    assert!(service
        .submit_bid(bid(&request.request_id, "mover-1", 1350.0))
        .is_ok());
}

#[test]
fn repository_outages_propagate() {
    let service = MarketplaceService::new(
        Arc::new(UnavailableStore),
        Arc::new(RecordingGateway::approving()),
        Arc::new(RecordingSink::default()),
        config(),
    );

    assert!(matches!(
        service.payment(&PaymentId("pay-x".to_string())),
        Err(MarketplaceError::Repository(RepositoryError::Unavailable(_)))
    ));
    assert!(matches!(
        service.quote(&QuoteId("quote-x".to_string())),
        Err(MarketplaceError::Repository(RepositoryError::Unavailable(_)))
    ));
}
