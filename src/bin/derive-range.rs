use std::error::Error;

use dotenv::dotenv;
use log::{info, initialize_logger};
use structopt::StructOpt;

use beatschain::isrc::designation_range;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "derive-range",
    about = "Print the ISRC designation range assigned to each given user ID"
)]
struct Opt {
    /// The user IDs to derive ranges for
    ids: Vec<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let opt = Opt::from_args();

    let logger = initialize_logger();

    let ids = opt.ids;
    info!(logger, "Deriving ranges for {:?}...", &ids);

    for id in &ids {
        let range = designation_range(id);
        println!(
            "{}\t{}\t{:05}-{:05}",
            id, range.partition, range.start, range.end
        );
    }

    Ok(())
}
