//! Opt-in tracing setup for hosts embedding the widgets.
//!
//! The widgets only emit `tracing` events. Nothing is installed unless the
//! host calls one of these functions or wires its own subscriber.

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "scrollplot=info";

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG` or [`DEFAULT_FILTER`].
///
/// Returns `false` when the `telemetry` feature is disabled or a global
/// subscriber is already set.
#[must_use]
pub fn init_default_tracing() -> bool {
    init_tracing_with(DEFAULT_FILTER)
}

/// Like [`init_default_tracing`] with a caller-chosen fallback filter.
///
/// An unparsable `fallback_filter` installs nothing.
#[must_use]
pub fn init_tracing_with(fallback_filter: &str) -> bool {
    #[cfg(feature = "telemetry")]
    {
        use tracing_subscriber::EnvFilter;

        let Ok(filter) =
            EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(fallback_filter))
        else {
            return false;
        };
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .compact()
            .try_init()
            .is_ok()
    }

    #[cfg(not(feature = "telemetry"))]
    {
        let _ = fallback_filter;
        false
    }
}
