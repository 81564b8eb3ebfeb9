#![allow(clippy::too_many_lines)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::similar_names)]

pub mod calendar;
pub mod calendar_cli_opts;
pub mod calendar_sync;
pub mod config;
pub mod errors;
pub mod event_filter;
pub mod gcal_connector;
pub mod models;
pub mod pgpool;
pub mod sync_metrics;
pub mod sync_store;
pub mod timezone;
