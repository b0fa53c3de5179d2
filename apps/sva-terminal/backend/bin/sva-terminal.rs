//! `sva-terminal` runs one exam-hall verification kiosk: it loads the roster
//! and the examination session, starts the simulated biometric sensors and
//! serves the terminal's HTTP API.

#![warn(
    clippy::all,
    clippy::todo,
    clippy::empty_enum,
    clippy::enum_glob_use,
    clippy::mem_forget,
    clippy::unused_self,
    clippy::filter_map_next,
    clippy::needless_continue,
    clippy::needless_borrow,
    clippy::match_wildcard_for_single_variants,
    clippy::if_let_mutex,
    clippy::await_holding_lock,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::lossy_float_literal,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::fn_params_excessive_bools,
    clippy::exit,
    clippy::inefficient_to_string,
    clippy::linkedlist,
    clippy::macro_use_imports,
    clippy::option_option,
    clippy::verbose_file_reads,
    clippy::unnested_or_patterns,
    clippy::str_to_string,
    rust_2018_idioms,
    future_incompatible,
    nonstandard_style,
    missing_debug_implementations,
    missing_docs
)]
#![deny(unreachable_pub)]
#![forbid(unsafe_code)]
#![cfg_attr(not(test), warn(clippy::print_stdout, clippy::dbg_macro))]

use std::sync::Arc;

use clap::Parser;
use sva_terminal::{app, config::Config, log, terminal::Terminal};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();
    let config = Config::parse();
    log::setup(&config)?;

    let roster = Arc::new(config.load_roster()?);
    let exam = Arc::new(config.load_exam()?);
    tracing::info!(
        "verifying {} students for {} - {} ({})",
        roster.len(),
        exam.course_code,
        exam.course_name,
        exam.venue
    );

    let provider = config.biometric_provider(roster);
    let terminal = Terminal::new(exam, provider, config.timings());

    app::run(app::setup(terminal, config.public_dir.as_deref()), &config).await
}
