use anyhow::{bail, Context};
use clap::Parser;
use generator::profile::build_storm_from_config;
use gui_bridge::bridge::GuiBridge;
use gui_bridge::model::ViewerModel;
use lmacore::lma::FLASH_DIM;
use lmacore::processing::ClusterConfig;
use log::info;
use lmacore::{load_dataset, save_dataset};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::{CliOverrides, WorkflowConfig};
use workflow::runner::Runner;

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Cluster LMA sources into flashes")]
struct Args {
    /// LMA dataset to cluster (.json, or .nc with the netcdf feature)
    #[arg(long)]
    input: Option<PathBuf>,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Spatial clustering threshold in metres [default: 3000]
    #[arg(long)]
    distance: Option<f64>,
    /// Temporal clustering threshold in seconds [default: 0.15]
    #[arg(long)]
    time: Option<f64>,
    /// Minimum neighbours for a core source [default: 1]
    #[arg(long)]
    min_points: Option<usize>,
    /// Drop flashes with fewer sources than this
    #[arg(long)]
    min_events: Option<u64>,
    /// Output directory [default: output]
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Cluster a generated storm when no input is given
    #[arg(long, default_value_t = false)]
    synthetic: bool,
    /// Keep the GUI bridge alive for incoming datasets
    #[arg(long, default_value_t = false)]
    serve: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let overrides = CliOverrides {
        distance: args.distance,
        time: args.time,
        min_points: args.min_points,
        min_events: args.min_events,
        output_dir: args.output_dir.clone(),
    };
    let mut workflow_config = if let Some(path) = &args.workflow {
        let mut config = WorkflowConfig::load(path)?;
        if !overrides.is_empty() {
            info!("command-line thresholds override {}", path.display());
        }
        config.apply_overrides(&overrides)?;
        config
    } else {
        let defaults = ClusterConfig::default();
        WorkflowConfig::from_args(
            None,
            args.distance.unwrap_or(defaults.distance),
            args.time.unwrap_or(defaults.time),
            args.min_points.unwrap_or(defaults.min_points),
            args.min_events,
            args.output_dir.clone().unwrap_or_else(|| PathBuf::from("output")),
        )
    };
    if args.input.is_some() {
        workflow_config.input = args.input.clone();
    }

    let dataset = if let Some(path) = &workflow_config.input {
        Some(load_dataset(path).with_context(|| format!("loading {}", path.display()))?)
    } else if args.synthetic || workflow_config.generator.is_some() {
        let storm = workflow_config.generator.clone().unwrap_or_default();
        Some(build_storm_from_config(&storm).context("generating synthetic storm")?)
    } else {
        None
    };

    let runner = Runner::new(workflow_config.clone());
    let gui_bridge = GuiBridge::new(Arc::new(runner.clone()));

    match dataset {
        Some(dataset) => {
            let result = runner.execute(&dataset)?;

            let output_dir = &workflow_config.output_dir;
            fs::create_dir_all(output_dir)
                .with_context(|| format!("creating {}", output_dir.display()))?;
            save_dataset(&result.clustered, output_dir.join("lma_clustered.json"))
                .context("writing clustered dataset")?;
            save_dataset(&result.stats, output_dir.join("lma_stats.json"))
                .context("writing flash statistics")?;
            if let Some(filtered) = &result.filtered {
                save_dataset(filtered, output_dir.join("lma_filtered.json"))
                    .context("writing filtered dataset")?;
            }

            let kept = result
                .filtered
                .as_ref()
                .and_then(|ds| ds.dim_len(FLASH_DIM))
                .unwrap_or(0);
            println!(
                "Clustered {} sources into {} flashes ({} kept by filter)",
                result.event_count(),
                result.flash_count(),
                kept
            );
            for note in &result.notes {
                println!("  {}", note);
            }
            let metrics = runner.metrics();
            println!(
                "Metrics -> datasets {}, events {}, flashes {}, errors {}",
                metrics.datasets, metrics.events, metrics.flashes, metrics.errors
            );

            let report = format!(
                "events={} flashes={} kept={} distance={} time={} min_points={}\n",
                result.event_count(),
                result.flash_count(),
                kept,
                workflow_config.cluster.distance,
                workflow_config.cluster.time,
                workflow_config.cluster.min_points
            );
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(output_dir.join("flash_summary.log"))?;
            file.write_all(report.as_bytes())?;

            let model = ViewerModel::from_result(&result, workflow_config.selection.as_ref())?;
            gui_bridge.publish(&model)?;
            gui_bridge.publish_status("Flash clustering results ready.");
        }
        None if args.serve => {
            gui_bridge.publish_status("No input given; waiting for datasets on /ingest.");
        }
        None => bail!(
            "no input dataset; pass --input, --synthetic, or a workflow with a generator section"
        ),
    }

    if args.serve {
        gui_bridge.serve();
        gui_bridge.publish_status("HTTP bridge running (Ctrl+C to stop)...");
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_flags_leave_thresholds_to_the_workflow() {
        let args = Args::parse_from(["xlma", "--synthetic"]);
        assert!(args.synthetic);
        assert!(args.distance.is_none());
        assert!(args.time.is_none());
        assert!(args.min_points.is_none());
        assert!(args.min_events.is_none());
        assert!(args.output_dir.is_none());
    }

    #[test]
    fn threshold_flags_are_parsed() {
        let args = Args::parse_from(["xlma", "--distance", "2000", "--time", "0.3", "--min-points", "2"]);
        assert_eq!(args.distance, Some(2000.0));
        assert_eq!(args.time, Some(0.3));
        assert_eq!(args.min_points, Some(2));
    }
}
