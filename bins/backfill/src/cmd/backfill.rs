use std::sync::Arc;

use backfill_engine::{Backfill, BackfillRequest};
use broker_local::LocalBroker;

use crate::config::{BackfillArgs, Effective};
use crate::error::CliError;

pub async fn run(eff: &Effective, args: BackfillArgs) -> Result<(), CliError> {
    let broker = Arc::new(LocalBroker::new(&eff.broker));
    tracing::debug!(root = %broker.root().display(), "local broker");

    let request = BackfillRequest {
        topic: args.topic,
        triggers: args.triggers,
        temporary_topic: args.temporary_topic,
        source: args.source,
        filter: args.filter,
        output: args.output,
    };

    let backfill = Backfill::new(broker.clone(), broker.clone(), broker);
    let outcome = backfill.run(&request).await?;

    println!("{}", outcome.manifest_path.display());
    Ok(())
}
