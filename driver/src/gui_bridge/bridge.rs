use crate::generator::profile::{build_storm_from_config, StormConfig};
use crate::gui_bridge::model::ViewerModel;
use crate::workflow::runner::Runner;
use anyhow::{anyhow, Result};
use lmacore::Dataset;
use log::error;
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter};

type SharedModel = Arc<RwLock<ViewerModel>>;

fn gui_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

#[derive(Debug)]
struct BridgeError;

impl warp::reject::Reject for BridgeError {}

fn ingest(runner: &Runner, state: &SharedModel, dataset: &Dataset) -> Result<usize> {
    let result = runner.execute(dataset)?;
    let model = ViewerModel::from_result(&result, runner.config().selection.as_ref())?;
    let mut guard = state
        .write()
        .map_err(|_| anyhow!("viewer state lock poisoned"))?;
    *guard = model;
    Ok(result.flash_count())
}

/// Hosts the viewer HTTP endpoint and clusters incoming datasets.
pub struct GuiBridge {
    state: SharedModel,
    runner: Arc<Runner>,
}

impl GuiBridge {
    pub fn new(runner: Arc<Runner>) -> Self {
        Self {
            state: Arc::new(RwLock::new(ViewerModel::default())),
            runner,
        }
    }

    /// Starts the HTTP routes on a background thread.
    pub fn serve(&self) {
        let state_for_filter = self.state.clone();
        let state_filter = warp::any().map(move || state_for_filter.clone());
        let runner = self.runner.clone();
        let runner_filter = warp::any().map(move || runner.clone());

        let get_route = warp::path("payload")
            .and(warp::get())
            .and(state_filter.clone())
            .and_then(|state: SharedModel| async move {
                match state.read() {
                    Ok(model) => Ok::<_, warp::Rejection>(warp::reply::json(&*model)),
                    Err(_) => {
                        error!("viewer state lock poisoned");
                        Err(warp::reject::custom(BridgeError))
                    }
                }
            });

        let post_route = warp::path("ingest")
            .and(warp::post())
            .and(warp::body::json())
            .and(state_filter.clone())
            .and(runner_filter.clone())
            .and_then(
                |dataset: Dataset, state: SharedModel, runner: Arc<Runner>| async move {
                    match ingest(&runner, &state, &dataset) {
                        Ok(flashes) => Ok::<_, warp::Rejection>(warp::reply::with_status(
                            warp::reply::json(&json!({"status": "ok", "flashes": flashes})),
                            StatusCode::OK,
                        )),
                        Err(err) => {
                            error!("ingest error: {:#}", err);
                            Err(warp::reject::custom(BridgeError))
                        }
                    }
                },
            );

        let generator_route = warp::path("ingest-config")
            .and(warp::post())
            .and(warp::body::json())
            .and(state_filter)
            .and(runner_filter)
            .and_then(
                |config: StormConfig, state: SharedModel, runner: Arc<Runner>| async move {
                    match build_storm_from_config(&config)
                        .and_then(|dataset| ingest(&runner, &state, &dataset))
                    {
                        Ok(flashes) => {
                            if let Some(name) = config.scenario.as_ref() {
                                println!("[GUI] Scenario {} -> flashes {}", name, flashes);
                            }
                            Ok::<_, warp::Rejection>(warp::reply::with_status(
                                warp::reply::json(&json!({
                                    "status": "ok",
                                    "flashes": flashes,
                                    "description": config.description.clone().unwrap_or_default()
                                })),
                                StatusCode::OK,
                            ))
                        }
                        Err(err) => {
                            error!("ingest-config error: {:#}", err);
                            Err(warp::reject::custom(BridgeError))
                        }
                    }
                },
            );

        thread::spawn(move || {
            let routes = get_route.or(post_route).or(generator_route);
            let runtime = match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!("failed to build bridge runtime: {}", err);
                    return;
                }
            };
            runtime.block_on(async move {
                warp::serve(routes).run(gui_bind_address()).await;
            });
        });
    }

    pub fn publish(&self, model: &ViewerModel) -> Result<()> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| anyhow!("viewer state lock poisoned"))?;
        *guard = model.clone();
        println!(
            "[GUI] sources: {}, flashes: {} ({} after filtering), points shown: {}",
            guard.event_count,
            guard.flash_count,
            guard.filtered_flash_count,
            guard.points.len()
        );
        Ok(())
    }

    pub fn publish_status(&self, message: &str) {
        println!("[GUI] {}", message);
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> ViewerModel {
        self.state.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::build_storm;
    use crate::workflow::config::WorkflowConfig;

    #[test]
    fn gui_bridge_updates_state() {
        let runner = Arc::new(Runner::new(WorkflowConfig::default()));
        let gui = GuiBridge::new(runner.clone());
        let result = runner.execute(&build_storm(2, 15).unwrap()).unwrap();
        let model = ViewerModel::from_result(&result, None).unwrap();
        gui.publish(&model).unwrap();
        let snapshot = gui.snapshot();
        assert_eq!(snapshot.flash_count, 2);
        assert_eq!(snapshot.points.len(), 30);
    }

    #[test]
    fn ingest_replaces_viewer_state() {
        let runner = Runner::new(WorkflowConfig::default());
        let state: SharedModel = Arc::new(RwLock::new(ViewerModel::default()));
        let flashes = ingest(&runner, &state, &build_storm(3, 10).unwrap()).unwrap();
        assert_eq!(flashes, 3);
        assert_eq!(state.read().unwrap().event_count, 30);
    }
}
