use frost_server::app;
use tracing::{error, info};

fn main() {
    let wiring = match app::build_app() {
        Ok(wiring) => wiring,
        Err(err) => {
            error!(error = %err, "startup_failed");
            std::process::exit(1);
        }
    };

    match app::run_server(wiring.config, wiring.world) {
        Ok(summary) => info!(
            ticks_run = summary.ticks_run,
            entity_count = summary.entity_count,
            tps = summary.last_metrics.tps,
            state_digest = summary.state_digest.as_str(),
            "server_stopped"
        ),
        Err(err) => {
            error!(error = %err, "server_failed");
            std::process::exit(1);
        }
    }
}
