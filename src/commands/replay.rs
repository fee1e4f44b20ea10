use anyhow::{Context as _, Result};
use std::fs;
use std::path::PathBuf;

use crate::Context;
use crate::config::{Overrides, SousVideConfig};
use crate::replay::{drive, parse_events};
use crate::{outputs, ui};
use tracker::Tracker;

pub struct ReplayArgs {
    pub events: PathBuf,
    pub overrides: Overrides,
}

pub fn run(ctx: &Context, args: ReplayArgs) -> Result<()> {
    let mut config = SousVideConfig::load()?;
    config.apply(&args.overrides);
    config.validate()?;

    let input = fs::read_to_string(&args.events)
        .with_context(|| format!("Could not read event log: {}", args.events.display()))?;
    let events = parse_events(&input)
        .with_context(|| format!("Invalid event log: {}", args.events.display()))?;

    let dispatcher = outputs::build_dispatcher(&config)?;
    let mut tracker = Tracker::register(config.node.to_node_data(), config.tracker_options())
        .with_dispatcher(dispatcher);

    let summary = drive(&mut tracker, &events);

    if ctx.quiet {
        return Ok(());
    }

    ui::header("Replay");
    ui::kv("Events", &summary.events.to_string());
    ui::kv("Ignored", &summary.ignored.to_string());
    ui::kv("Resources", &tracker.processed().len().to_string());
    ui::kv("Run", &tracker.run().id);
    println!();

    if !summary.finished {
        ui::warn("Event log ended before the run finished, no report was dispatched");
    } else if tracker.run().success == Some(true) {
        ui::success("Run completed");
    } else {
        ui::warn("Run failed, unreached resources were reported as unprocessed");
    }

    if let Some(file) = &config.outputs.file {
        ui::dim(&format!("Report: {}", file.destination()?.display()));
    }

    Ok(())
}
