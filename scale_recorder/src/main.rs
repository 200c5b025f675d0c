use std::env;

use scale_recorder::config::RecorderConfig;
use scale_recorder::{calibrate, scale_recorder};

#[tokio::main]
async fn main() {
    // construct a subscriber that prints formatted traces to stdout
    let subscriber = tracing_subscriber::FmtSubscriber::new();
    // use that subscriber to process traces emitted after this point
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global tracing subscriber.");

    let config = RecorderConfig::from_env().expect("Invalid SCALE_* environment configuration");

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("calibrate") => {
            let weight: f32 = args
                .get(2)
                .and_then(|w| w.parse().ok())
                .expect("Usage: scale_recorder calibrate <known weight, e.g. 4.25>");
            tokio::task::block_in_place(|| calibrate(&config, weight)).expect("Calibration failed");
        }
        None => scale_recorder(config).await.expect("Failed to run scale recorder"),
        Some(other) => {
            panic!("Unknown command {other:?}. Usage: scale_recorder [calibrate <weight>]")
        }
    }
}
