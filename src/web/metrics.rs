use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static RECORDS_LISTED: AtomicU64 = AtomicU64::new(0);
static RECORDS_CREATED: AtomicU64 = AtomicU64::new(0);
static RECORDS_UPDATED: AtomicU64 = AtomicU64::new(0);
static RECORDS_DELETED: AtomicU64 = AtomicU64::new(0);
static WRITES_REJECTED: AtomicU64 = AtomicU64::new(0);
static BAD_REQUESTS: AtomicU64 = AtomicU64::new(0);
static DATABASE_ERRORS: AtomicU64 = AtomicU64::new(0);

pub struct Metrics;

impl Metrics {
    pub fn records_listed() {
        RECORDS_LISTED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_created() {
        RECORDS_CREATED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_updated() {
        RECORDS_UPDATED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deleted() {
        RECORDS_DELETED.fetch_add(1, Ordering::Relaxed);
    }

    /// A write aimed at an entity this role only reads.
    pub fn write_rejected() {
        WRITES_REJECTED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bad_request() {
        BAD_REQUESTS.fetch_add(1, Ordering::Relaxed);
    }

    pub fn database_error() {
        DATABASE_ERRORS.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn format_prometheus(role: &str, started_at: Instant) -> String {
    let uptime = started_at.elapsed().as_secs();
    let listed = RECORDS_LISTED.load(Ordering::Relaxed);
    let created = RECORDS_CREATED.load(Ordering::Relaxed);
    let updated = RECORDS_UPDATED.load(Ordering::Relaxed);
    let deleted = RECORDS_DELETED.load(Ordering::Relaxed);
    let rejected = WRITES_REJECTED.load(Ordering::Relaxed);
    let bad_requests = BAD_REQUESTS.load(Ordering::Relaxed);
    let db_errors = DATABASE_ERRORS.load(Ordering::Relaxed);

    format!(
        r#"# HELP gateway_uptime_seconds Number of seconds the gateway has been running
# TYPE gateway_uptime_seconds gauge
gateway_uptime_seconds{{role="{role}"}} {}

# HELP records_listed_total Number of list requests served
# TYPE records_listed_total counter
records_listed_total {}

# HELP records_created_total Number of rows inserted
# TYPE records_created_total counter
records_created_total {}

# HELP records_updated_total Number of rows updated
# TYPE records_updated_total counter
records_updated_total {}

# HELP records_deleted_total Number of rows deleted
# TYPE records_deleted_total counter
records_deleted_total {}

# HELP writes_rejected_total Writes refused because the entity is read-only on this role
# TYPE writes_rejected_total counter
writes_rejected_total {}

# HELP bad_requests_total Requests rejected for a malformed id or body
# TYPE bad_requests_total counter
bad_requests_total {}

# HELP database_errors_total Requests that failed on a database error
# TYPE database_errors_total counter
database_errors_total {}
"#,
        uptime, listed, created, updated, deleted, rejected, bad_requests, db_errors,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_increments_counters() {
        let created = RECORDS_CREATED.load(Ordering::Relaxed);
        let rejected = WRITES_REJECTED.load(Ordering::Relaxed);

        Metrics::record_created();
        Metrics::write_rejected();

        assert!(RECORDS_CREATED.load(Ordering::Relaxed) > created);
        assert!(WRITES_REJECTED.load(Ordering::Relaxed) > rejected);
    }

    #[test]
    fn format_prometheus_includes_all_metrics() {
        let output = format_prometheus("replica", Instant::now());
        assert!(output.contains(r#"gateway_uptime_seconds{role="replica"}"#));
        assert!(output.contains("records_created_total"));
        assert!(output.contains("writes_rejected_total"));
        assert!(output.contains("database_errors_total"));
    }
}
