use slope_offset::{run, DemoConfig};
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // construct a subscriber that prints formatted traces to stdout
    let subscriber = tracing_subscriber::FmtSubscriber::new();
    // use that subscriber to process traces emitted after this point
    tracing::subscriber::set_global_default(subscriber)?;

    let report = run(&DemoConfig::default())?;
    println!("{report}");

    info!("Slope/offset walkthrough finished.");
    Ok(())
}
