use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, register_counter, register_counter_vec,
    register_gauge, register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("gateway_requests_total", "Total number of proxy requests").unwrap();
    pub static ref REJECTIONS_TOTAL: CounterVec = register_counter_vec!(
        "gateway_rejections_total",
        "Proxy requests answered with a gateway error, by reason",
        &["reason"]
    )
    .unwrap();
    pub static ref UPSTREAM_LATENCY: Histogram = register_histogram!(
        "gateway_upstream_latency_seconds",
        "Time spent on the upstream request, including the body"
    )
    .unwrap();
    pub static ref RATE_LIMIT_CLIENTS: Gauge = register_gauge!(
        "gateway_rate_limit_clients",
        "Client keys currently tracked by the rate limiter"
    )
    .unwrap();
}
