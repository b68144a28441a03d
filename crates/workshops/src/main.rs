//! Maintenance entry point: brings the waitlist of one event (given by public
//! id) or of every event back in line with its RSVP limit.

use std::process::ExitCode;

use workshops::config::Config;
use workshops::events::{all_event_ids, find_event_by_public_id};
use workshops::waitlist::reorder_waitlist;
use workshops::{telemetry, Result};

fn run(config: &Config) -> Result<()> {
    let pool = db::make_pool(&config.pool_config())?;
    let mut conn = pool.get()?;
    db::run_migrations(&mut conn)?;

    let ids = match std::env::args().nth(1) {
        Some(public_id) => vec![find_event_by_public_id(&mut conn, &public_id)?.id],
        None => all_event_ids(&mut conn)?,
    };

    for id in ids {
        let outcome = reorder_waitlist(&mut conn, id)?;
        tracing::info!(
            event_id = id,
            promoted = outcome.promoted.len(),
            renumbered = outcome.renumbered,
            still_waitlisted = outcome.still_waitlisted,
            over_capacity = outcome.over_capacity,
            "checked waitlist"
        );
    }

    Ok(())
}

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    telemetry::init(&config.log);

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
