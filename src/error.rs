/// Value reported across the numeric boundary when a metric could not be computed.
pub const SENTINEL: f64 = -1.0;

pub type MetricResult<T> = Result<T, MetricError>;

/// Errors raised while obtaining or reducing host statistics.
#[derive(Debug, thiserror::Error)]
pub enum MetricError {
    /// A Mach host call returned something other than `KERN_SUCCESS`.
    #[error("{call} returned {code}")]
    MachCall { call: &'static str, code: i32 },

    /// Reading a procfs file or querying a filesystem failed.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// The statistics tool could not be spawned or exited unsuccessfully.
    #[error("{program} failed: {detail}")]
    Command { program: String, detail: String },

    /// The host answered, but not in a shape we can read.
    #[error("malformed {origin}: {detail}")]
    Malformed {
        origin: &'static str,
        detail: String,
    },

    /// No facility for this metric on the current platform.
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    /// The aggregate denominator ended at zero.
    #[error("no usable data from {origin}: {detail}")]
    NoUsableData {
        origin: &'static str,
        detail: String,
    },
}

impl MetricError {
    /// True when the failure happened while talking to the host rather than
    /// while reducing data that was successfully obtained.
    pub fn is_host_query_failure(&self) -> bool {
        !matches!(self, MetricError::NoUsableData { .. })
    }
}

/// Collapses a metric result into the `[0,1]`-or-`-1.0` convention.
pub trait OrSentinel {
    fn or_sentinel(self) -> f64;
}

impl OrSentinel for MetricResult<f64> {
    fn or_sentinel(self) -> f64 {
        self.unwrap_or(SENTINEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_replaces_errors_only() {
        let ok: MetricResult<f64> = Ok(0.25);
        assert_eq!(ok.or_sentinel(), 0.25);

        let err: MetricResult<f64> = Err(MetricError::Unsupported("cpu ticks"));
        assert_eq!(err.or_sentinel(), SENTINEL);
    }

    #[test]
    fn no_usable_data_is_not_a_host_failure() {
        let empty = MetricError::NoUsableData {
            origin: "vm_stat",
            detail: "no page statistics".to_string(),
        };
        assert!(!empty.is_host_query_failure());

        let mach = MetricError::MachCall {
            call: "host_statistics64",
            code: 5,
        };
        assert!(mach.is_host_query_failure());
        assert_eq!(mach.to_string(), "host_statistics64 returned 5");
    }
}
