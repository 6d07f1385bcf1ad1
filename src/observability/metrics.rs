use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub registrations_total: IntCounter,
    pub login_attempts_total: IntCounterVec,
    pub orders_created_total: IntCounter,
    pub status_transitions_total: IntCounterVec,
    pub open_orders: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let registrations_total =
            IntCounter::new("registrations_total", "Total accounts registered")
                .expect("valid registrations_total metric");

        let login_attempts_total = IntCounterVec::new(
            Opts::new("login_attempts_total", "Login attempts by outcome"),
            &["outcome"],
        )
        .expect("valid login_attempts_total metric");

        let orders_created_total = IntCounter::new("orders_created_total", "Total orders created")
            .expect("valid orders_created_total metric");

        let status_transitions_total = IntCounterVec::new(
            Opts::new(
                "status_transitions_total",
                "Order status transitions by resulting status",
            ),
            &["status"],
        )
        .expect("valid status_transitions_total metric");

        let open_orders = IntGauge::new("open_orders", "Orders not yet delivered or cancelled")
            .expect("valid open_orders metric");

        registry
            .register(Box::new(registrations_total.clone()))
            .expect("register registrations_total");
        registry
            .register(Box::new(login_attempts_total.clone()))
            .expect("register login_attempts_total");
        registry
            .register(Box::new(orders_created_total.clone()))
            .expect("register orders_created_total");
        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");
        registry
            .register(Box::new(open_orders.clone()))
            .expect("register open_orders");

        Self {
            registry,
            registrations_total,
            login_attempts_total,
            orders_created_total,
            status_transitions_total,
            open_orders,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
