use backfill_engine::clean_backfill;
use broker_local::LocalBroker;

use crate::config::{CleanArgs, Effective};
use crate::error::CliError;

pub async fn run(eff: &Effective, args: CleanArgs) -> Result<(), CliError> {
    let broker = LocalBroker::new(&eff.broker);
    let report = clean_backfill(&args.manifest, &broker, &broker).await?;
    println!("deleted {} resource(s)", report.deleted);
    Ok(())
}
