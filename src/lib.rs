#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use std::sync::Arc;

use rocket::{Build, Rocket};

use config::{ConfigFairing, DatabaseFairing};
use evaluation::{
    events::{AggregationFairing, EventPublisher},
    store::EvaluationStore,
    Evaluations,
};
use logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod logging;
pub mod model;
pub mod scheduled_task;

pub use config::Config;

/// Build the server: routes, logging, config, the MongoDB store and the aggregation worker.
///
/// The fairings must stay in this order, as each depends on state managed by the previous ones.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(AggregationFairing)
}

/// Build a server around the given store and event publisher, bypassing the
/// database and the aggregation worker.
pub fn rocket_for(
    store: Arc<dyn EvaluationStore>,
    events: Arc<dyn EventPublisher>,
    config: Config,
) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .manage(config)
        .manage(store.clone())
        .manage(Evaluations::new(store, events))
}
