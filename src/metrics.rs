use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const ORDERS_ACCEPTED: &str = "clob_orders_accepted_total";
pub const ORDERS_REJECTED: &str = "clob_orders_rejected_total";
pub const ORDERS_CANCELED: &str = "clob_orders_canceled_total";
pub const FILLS: &str = "clob_fills_total";
pub const FILLED_QUANTITY: &str = "clob_filled_quantity_total";
pub const RESTING_ORDERS: &str = "clob_resting_orders";

pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let builder = PrometheusBuilder::new();
    let handle = builder.install_recorder()?;
    Ok(handle)
}
