use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, OnceLock},
};

static METRICS: OnceLock<Mutex<MetricsState>> = OnceLock::new();

#[derive(Default)]
struct MetricsState {
    total: u64,
    errors: u64,
    per_endpoint: HashMap<&'static str, u64>,
    per_endpoint_err: HashMap<&'static str, u64>,
    // 交易结果：submitted / confirmed / reverted / timeout / rejected
    tx_outcomes: HashMap<&'static str, u64>,
    // 确认耗时（毫秒）
    confirmation_latency_sum_ms: u128,
    // 简易直方图分桶（毫秒）：<1s, <5s, <15s, <60s, <180s, >=180s
    confirmation_hist_buckets: [u64; 6],
    deployments_total: u64,
    // 链上已部署但注册表写入冲突
    registry_conflicts_total: u64,
}

const CONFIRMATION_BUCKETS_MS: [u128; 5] = [1_000, 5_000, 15_000, 60_000, 180_000];

fn state() -> MutexGuard<'static, MetricsState> {
    let lock = METRICS.get_or_init(|| Mutex::new(MetricsState::default()));
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(), // 避免因锁污染导致 panic
    }
}

pub fn count_ok(endpoint: &'static str) {
    let mut s = state();
    s.total += 1;
    *s.per_endpoint.entry(endpoint).or_insert(0) += 1;
}

pub fn count_err(endpoint: &'static str) {
    let mut s = state();
    s.total += 1;
    s.errors += 1;
    *s.per_endpoint.entry(endpoint).or_insert(0) += 1;
    *s.per_endpoint_err.entry(endpoint).or_insert(0) += 1;
}

pub fn inc_tx_outcome(outcome: &'static str) {
    *state().tx_outcomes.entry(outcome).or_insert(0) += 1;
}

pub fn observe_confirmation_latency(ms: u128) {
    let mut s = state();
    s.confirmation_latency_sum_ms += ms;
    let idx = CONFIRMATION_BUCKETS_MS
        .iter()
        .position(|bound| ms < *bound)
        .unwrap_or(CONFIRMATION_BUCKETS_MS.len());
    s.confirmation_hist_buckets[idx] += 1;
}

pub fn inc_deployment() {
    state().deployments_total += 1;
}

pub fn inc_registry_conflict() {
    state().registry_conflicts_total += 1;
}

pub fn registry_conflicts() -> u64 {
    state().registry_conflicts_total
}

pub fn render_prometheus() -> String {
    let s = state();
    let mut out = String::new();
    out.push_str("# HELP ironmint_requests_total Total requests\n");
    out.push_str("# TYPE ironmint_requests_total counter\n");
    out.push_str(&format!("ironmint_requests_total {}\n", s.total));

    out.push_str("# HELP ironmint_errors_total Total error responses\n");
    out.push_str("# TYPE ironmint_errors_total counter\n");
    out.push_str(&format!("ironmint_errors_total {}\n", s.errors));

    out.push_str("# HELP ironmint_endpoint_requests_total Requests per endpoint\n");
    out.push_str("# TYPE ironmint_endpoint_requests_total counter\n");
    for (k, v) in s.per_endpoint.iter() {
        out.push_str(&format!(
            "ironmint_endpoint_requests_total{{endpoint=\"{}\"}} {}\n",
            k, v
        ));
    }

    out.push_str("# HELP ironmint_endpoint_errors_total Errors per endpoint\n");
    out.push_str("# TYPE ironmint_endpoint_errors_total counter\n");
    for (k, v) in s.per_endpoint_err.iter() {
        out.push_str(&format!(
            "ironmint_endpoint_errors_total{{endpoint=\"{}\"}} {}\n",
            k, v
        ));
    }

    out.push_str("# HELP ironmint_transactions_total Transactions by outcome\n");
    out.push_str("# TYPE ironmint_transactions_total counter\n");
    for (k, v) in s.tx_outcomes.iter() {
        out.push_str(&format!(
            "ironmint_transactions_total{{outcome=\"{}\"}} {}\n",
            k, v
        ));
    }

    out.push_str("# HELP ironmint_confirmation_latency_ms_sum Sum of confirmation latency in ms\n");
    out.push_str("# TYPE ironmint_confirmation_latency_ms_sum counter\n");
    out.push_str(&format!(
        "ironmint_confirmation_latency_ms_sum {}\n",
        s.confirmation_latency_sum_ms
    ));

    out.push_str("# HELP ironmint_confirmation_latency_ms_bucket Confirmation latency histogram\n");
    out.push_str("# TYPE ironmint_confirmation_latency_ms_bucket counter\n");
    let labels = ["1000", "5000", "15000", "60000", "180000", "+Inf"];
    for (label, count) in labels.iter().zip(s.confirmation_hist_buckets.iter()) {
        out.push_str(&format!(
            "ironmint_confirmation_latency_ms_bucket{{le=\"{}\"}} {}\n",
            label, count
        ));
    }

    out.push_str("# HELP ironmint_deployments_total Contracts deployed\n");
    out.push_str("# TYPE ironmint_deployments_total counter\n");
    out.push_str(&format!("ironmint_deployments_total {}\n", s.deployments_total));

    out.push_str(
        "# HELP ironmint_registry_conflicts_total Deployments confirmed on chain but lost the registry write\n",
    );
    out.push_str("# TYPE ironmint_registry_conflicts_total counter\n");
    out.push_str(&format!(
        "ironmint_registry_conflicts_total {}\n",
        s.registry_conflicts_total
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_counters() {
        count_ok("metrics_test");
        count_err("metrics_test");
        inc_tx_outcome("confirmed");
        observe_confirmation_latency(2_500);

        let text = render_prometheus();
        assert!(text.contains("ironmint_endpoint_errors_total{endpoint=\"metrics_test\"}"));
        assert!(text.contains("ironmint_transactions_total{outcome=\"confirmed\"}"));
        assert!(text.contains("ironmint_confirmation_latency_ms_bucket{le=\"5000\"}"));
    }
}
