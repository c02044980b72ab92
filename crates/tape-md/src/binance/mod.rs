//! Binance recorder pipelines.
//!
//! Produces up to 2 fleets:
//! - `ticker`: one member; one socket on `/ws` subscribed to
//!   `<sym>@ticker` for every symbol (or `!ticker@arr`), one output log
//! - `depth`: one member per symbol; each opens `/ws/<sym>@depth<L>` and
//!   writes its own `<prefix>_<SYMBOL>.csv[.gz]`

pub mod config;
pub mod json_parser;

use std::sync::Arc;

use tape_core::feed::{Feed, StreamSpec};
use tape_core::types::Instrument;

use self::config::{BinanceConfig, DepthPlan, TickerPlan};
use self::json_parser::{DepthClassifier, TickerClassifier};
use crate::fleet::{Fleet, FleetModule};
use crate::health::HealthReporter;
use crate::pipeline::{OutputSpec, StreamPipeline};

pub const TICKER_MODULE: &str = "ticker";
pub const DEPTH_MODULE: &str = "depth";

pub type TickerModule<F> = FleetModule<StreamPipeline<F, TickerClassifier>>;
pub type DepthModule<F> = FleetModule<StreamPipeline<F, DepthClassifier>>;

/// Single-member fleet for the shared ticker subscription.
pub fn build_ticker<F: Feed>(cfg: &BinanceConfig, plan: &TickerPlan, feed: Arc<F>) -> TickerModule<F> {
    let stream = StreamSpec {
        label: TICKER_MODULE.to_string(),
        url: cfg.ws_url.clone(),
        subscribe_msg: Some(json_parser::build_ticker_subscribe(&plan.symbols)),
    };
    let output = OutputSpec::from_path(plan.output_path.clone());
    let interval = cfg.health_interval;

    let fleet = Fleet::new(
        TICKER_MODULE,
        vec![TICKER_MODULE.to_string()],
        cfg.policy.clone(),
        move |member| {
            StreamPipeline::new(
                stream.clone(),
                feed.clone(),
                TickerClassifier,
                output.clone(),
                HealthReporter::new(member, interval),
            )
        },
    );
    FleetModule::new(fleet, plan.lock_path.clone())
}

/// One fleet member per depth symbol.
pub fn build_depth<F: Feed>(cfg: &BinanceConfig, plan: &DepthPlan, feed: Arc<F>) -> DepthModule<F> {
    let members: Vec<String> = plan.symbols.iter().map(|s| s.to_string()).collect();
    let ws_url = cfg.ws_url.clone();
    let interval = cfg.health_interval;
    let plan_for_members = plan.clone();

    let fleet = Fleet::new(DEPTH_MODULE, members, cfg.policy.clone(), move |member| {
        let plan = &plan_for_members;
        let symbol = Instrument::new(member);
        let label = format!("{DEPTH_MODULE}:{symbol}");
        let output = OutputSpec {
            path: plan.output_path_for(&symbol),
            compression: plan.compression,
        };

        StreamPipeline::new(
            StreamSpec {
                label: label.clone(),
                url: json_parser::depth_stream_url(&ws_url, &symbol, plan.levels, plan.update_speed_ms),
                subscribe_msg: None,
            },
            feed.clone(),
            DepthClassifier::new(symbol, plan.levels),
            output,
            HealthReporter::new(label, interval),
        )
    });
    FleetModule::new(fleet, plan.lock_path.clone())
}
