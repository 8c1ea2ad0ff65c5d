use chrono::Utc;
use log::*;
use sokoni_order_engine::{db_types::SubOrder, events::EventProducers, OrderFlowApi, SqliteDatabase};
use tokio::task::JoinHandle;

/// Starts the pickup-deadline expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// The sweep drives the same precondition-checked transition as every other actor, so it can run concurrently with
/// hub-staff pickup completion: whichever commits first wins, and the loser is rejected row by row.
pub fn start_expiry_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    check_interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(check_interval);
        let api = OrderFlowApi::new(db, producers);
        info!("🕰️ Pickup deadline expiry worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running pickup deadline expiry job");
            match api.expire_overdue_pickups(Utc::now()).await {
                Ok(result) if result.count() > 0 => {
                    info!("🕰️ {} sub-orders expired: {}", result.count(), suborder_list(&result.expired));
                },
                Ok(_) => {},
                Err(e) => {
                    error!("🕰️ Error running pickup deadline expiry job: {e}");
                },
            }
        }
    })
}

fn suborder_list(suborders: &[SubOrder]) -> String {
    suborders
        .iter()
        .map(|s| format!("[{}] order_id: {} hub: {:?}", s.id, s.master_order_id, s.hub_id))
        .collect::<Vec<String>>()
        .join(", ")
}
