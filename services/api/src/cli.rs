use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use move_broker::error::AppError;
use move_broker::telemetry;
use move_broker::workflows::marketplace::MarketplaceError;
use move_broker::workflows::pricing::{
    assess_bid, refund_for_cancellation, split, MarketPriceEstimator, MoveRequest,
};
use move_broker::workflows::screening::ContactInfoScanner;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "Move Broker",
    about = "Run the moving-quote marketplace engines from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Estimate the market price of a move, optionally assessing a bid against it
    Estimate(EstimateArgs),
    /// Split a client display price into mover price, fee, deposit and guarantee
    Split {
        /// Client display price in whole currency units
        price: i64,
    },
    /// Compute the refund owed when a client cancels
    Refund {
        /// Amount already paid by the client
        amount: i64,
        /// Days left before the moving date
        days: i64,
    },
    /// Screen free text for contact details
    Scan {
        /// Text to screen
        text: String,
    },
    /// Walk one mission from request to guarantee settlement against in-memory storage
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct EstimateArgs {
    /// Declared volume in cubic meters
    #[arg(long)]
    pub(crate) volume: Option<f64>,
    /// Declared surface in square meters
    #[arg(long)]
    pub(crate) surface: Option<f64>,
    /// Home size label (studio, t1 .. t5, maison)
    #[arg(long, default_value = "")]
    pub(crate) home_size: String,
    /// Road distance in kilometers
    #[arg(long)]
    pub(crate) distance: Option<f64>,
    #[arg(long)]
    pub(crate) from_city: Option<String>,
    #[arg(long)]
    pub(crate) to_city: Option<String>,
    #[arg(long, default_value = "")]
    pub(crate) from_postal_code: String,
    #[arg(long, default_value = "")]
    pub(crate) to_postal_code: String,
    #[arg(long, default_value_t = 0)]
    pub(crate) floor_from: u32,
    #[arg(long, default_value_t = 0)]
    pub(crate) floor_to: u32,
    #[arg(long)]
    pub(crate) elevator_from: bool,
    #[arg(long)]
    pub(crate) elevator_to: bool,
    #[arg(long)]
    pub(crate) lift_departure: bool,
    #[arg(long)]
    pub(crate) lift_arrival: bool,
    /// Requested service tag; repeat for several
    #[arg(long = "service")]
    pub(crate) services: Vec<String>,
    #[arg(long)]
    pub(crate) groupage: bool,
    /// Mover bid to classify against the market price
    #[arg(long)]
    pub(crate) bid: Option<f64>,
}

impl EstimateArgs {
    fn request(&self) -> MoveRequest {
        MoveRequest {
            volume_m3: self.volume,
            surface_m2: self.surface,
            home_size: self.home_size.clone(),
            floor_from: self.floor_from,
            floor_to: self.floor_to,
            elevator_from: self.elevator_from,
            elevator_to: self.elevator_to,
            furniture_lift_needed_departure: self.lift_departure,
            furniture_lift_needed_arrival: self.lift_arrival,
            services_needed: self.services.clone(),
            distance_km: self.distance,
            from_city: self.from_city.clone(),
            to_city: self.to_city.clone(),
            from_postal_code: self.from_postal_code.clone(),
            to_postal_code: self.to_postal_code.clone(),
            accepts_groupage: self.groupage,
        }
    }
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    if !matches!(command, Command::Serve(_)) {
        telemetry::init_cli()?;
    }

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Estimate(args) => run_estimate(&args),
        Command::Split { price } => {
            let split = split(price).map_err(MarketplaceError::from)?;
            print_json(&split)
        }
        Command::Refund { amount, days } => {
            let refund = refund_for_cancellation(amount, days).map_err(MarketplaceError::from)?;
            print_json(&refund)
        }
        Command::Scan { text } => print_json(&ContactInfoScanner::standard().scan(&text)),
        Command::Demo(args) => run_demo(args),
    }
}

fn run_estimate(args: &EstimateArgs) -> Result<(), AppError> {
    let estimator = MarketPriceEstimator::standard();
    let request = args.request();

    match args.bid {
        Some(bid) => {
            let assessment =
                assess_bid(&estimator, &request, bid).map_err(MarketplaceError::from)?;
            print_json(&assessment)
        }
        None => print_json(&estimator.estimate(&request)),
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}
