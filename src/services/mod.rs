//! HTTP control surface, shared state, and the periodic tick runner.
//!
//! Everything here shares one [`SharedTrainState`](shared::SharedTrainState)
//! wrapped in an `Arc`: the axum handlers apply commands through it, the
//! runner drives [`TrainMachine::advance`](crate::train::TrainMachine::advance)
//! on a fixed cadence, and both publish committed effects to the broker
//! after releasing the state lock.
//!
//! ```ignore
//! use std::sync::Arc;
//! use trem_dash::services::{runner, shared::SharedTrainState, web};
//!
//! let state = Arc::new(SharedTrainState::new(train, broker, activity));
//! tokio::spawn(runner::run(Arc::clone(&state), tick_interval));
//! let router = web::build_router(Arc::clone(&state), &web_config);
//! ```

pub mod api;
pub mod runner;
pub mod shared;
pub mod web;

pub use api::{
    ApiResponse, BrokerStatusResponse, FullStatusResponse, StatusResponse, TelemetryResponse,
};
pub use shared::SharedTrainState;
pub use web::build_router;
