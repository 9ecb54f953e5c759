use crate::infra::{parse_date, SimulatedGateway, TracingNotificationSink};
use chrono::{Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::Args;
use move_broker::config::MarketplaceConfig;
use move_broker::error::AppError;
use move_broker::workflows::marketplace::{
    ArbitrationDecision, ArbitrationVerdict, BidSubmission, InMemoryMarketplaceStore,
    MarketplaceError, MarketplaceService, MoveRequestId, MoverId, Settlement,
};
use move_broker::workflows::pricing::MoveRequest;
use std::sync::Arc;

type DemoService =
    MarketplaceService<InMemoryMarketplaceStore, SimulatedGateway, TracingNotificationSink>;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Price bid by the mover
    #[arg(long, default_value_t = 1350.0)]
    pub(crate) bid: f64,
    /// Moving date (YYYY-MM-DD). Defaults to two weeks from today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) moving_date: Option<NaiveDate>,
    /// Part of the guarantee kept by the mover after a damage claim; omit to approve in full
    #[arg(long)]
    pub(crate) claim_release: Option<i64>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        bid,
        moving_date,
        claim_release,
    } = args;

    let today = Local::now().date_naive();
    let moving_date = moving_date.unwrap_or(today + Duration::days(14));
    let completed_at =
        Utc.from_utc_datetime(&moving_date.and_time(NaiveTime::default())) + Duration::hours(18);

    let config = MarketplaceConfig::default();
    let gateway = Arc::new(SimulatedGateway::default());
    let service: DemoService = MarketplaceService::new(
        Arc::new(InMemoryMarketplaceStore::new()),
        gateway.clone(),
        Arc::new(TracingNotificationSink),
        config,
    );

    println!("Move broker demo");
    let request = service.create_move_request(demo_request())?;
    let breakdown = service.estimator().estimate(&request.details);
    println!(
        "- Request {}: {}m3 {} -> {} | market price {}",
        request.request_id.0,
        breakdown.estimated_volume_m3,
        request.details.origin_place(),
        request.details.destination_place(),
        breakdown.total_market_price
    );
    for line in &breakdown.details {
        println!("    {line}");
    }

    let leaked = submission(
        &request.request_id,
        "mover-leaky",
        bid,
        moving_date,
        "Appelez-moi directement au 06 12 34 56 78",
    );
    match service.submit_bid(leaked) {
        Err(MarketplaceError::BlockedContent { reasons }) => {
            println!("- Bid with contact details blocked:");
            for reason in reasons {
                println!("    {reason}");
            }
        }
        Ok(quote) => println!("- Unexpectedly accepted bid {}", quote.quote_id.0),
        Err(err) => return Err(err.into()),
    }

    let quote = service.submit_bid(submission(
        &request.request_id,
        "mover-demo",
        bid,
        moving_date,
        "Camion 20m3, deux déménageurs, protection des meubles incluse",
    ))?;
    println!(
        "- Quote {} at {} -> indicator {} | client pays {}",
        quote.quote_id.0,
        quote.proposed_price,
        quote.price_indicator.label(),
        quote.client_display_price
    );

    let accepted = service.accept_quote(&quote.quote_id, today)?;
    let payment_id = accepted.payment.payment_id.clone();
    println!(
        "- Accepted: deposit {} now, {} on moving day | fee {} | guarantee {}",
        accepted.payment.deposit_amount,
        accepted.payment.remaining_amount,
        accepted.payment.platform_fee,
        accepted.payment.guarantee_amount
    );

    let paid = service.collect_deposit(&payment_id, Utc::now())?;
    println!(
        "- Deposit charged ({})",
        paid.gateway_transaction_id.as_deref().unwrap_or("no transaction id")
    );

    let completed = service.mark_mission_complete(&payment_id, completed_at)?;
    if let Some(deadline) = completed.review_deadline(config.review_window) {
        println!("- Mission complete, damage claims open until {deadline}");
        let due = service.reviews_due(deadline)?;
        println!("- {} mission(s) awaiting arbitration at the deadline", due.len());
    }

    let decision = match claim_release {
        Some(released) => ArbitrationDecision {
            verdict: ArbitrationVerdict::Reject,
            released_amount: Some(released),
            notes: Some("damage claim upheld".to_string()),
        },
        None => ArbitrationDecision {
            verdict: ArbitrationVerdict::Approve,
            released_amount: None,
            notes: None,
        },
    };
    let settled = service.record_arbitration(
        &payment_id,
        decision,
        completed_at + config.review_window,
    )?;
    println!(
        "- Guarantee {}: released {} | refunded {}",
        settled.guarantee_status.label(),
        settled.guarantee_released_amount.unwrap_or(0),
        settled.guarantee_refunded_amount.unwrap_or(0)
    );

    for settlement in gateway.settlements() {
        match settlement {
            Settlement::ReleaseToMover { amount, .. } => println!("    paid to mover: {amount}"),
            Settlement::RefundToClient { amount, .. } => {
                println!("    refunded to client: {amount}")
            }
        }
    }

    Ok(())
}

fn demo_request() -> MoveRequest {
    MoveRequest {
        volume_m3: Some(25.0),
        distance_km: Some(80.0),
        floor_from: 1,
        from_city: Some("Paris".to_string()),
        to_city: Some("Chartres".to_string()),
        from_postal_code: "75011".to_string(),
        to_postal_code: "28000".to_string(),
        ..MoveRequest::default()
    }
}

fn submission(
    request_id: &MoveRequestId,
    mover: &str,
    price: f64,
    moving_date: NaiveDate,
    notes: &str,
) -> BidSubmission {
    BidSubmission {
        request_id: request_id.clone(),
        mover_id: MoverId(mover.to_string()),
        proposed_price: price,
        validity_date: moving_date,
        notes: Some(notes.to_string()),
    }
}
