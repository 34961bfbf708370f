//! Convenience macros for performance tracing.

/// Create a [`crate::performance::PerformanceSpan`], optionally entering a
/// debug span carrying extra fields.
///
/// ```rust
/// use hazard_tracing::perf_span;
///
/// {
///     let _span = perf_span!("add_descriptor", engine = 3, rois = 2);
///     // ... operation code ...
/// }
/// ```
#[macro_export]
macro_rules! perf_span {
    ($name:expr) => {{
        $crate::performance::PerformanceSpan::new($name)
    }};
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {{
        let _span = $crate::__private::debug_span!(
            "perf",
            name = $name,
            $($field = $value),+
        ).entered();
        $crate::performance::PerformanceSpan::new($name)
    }};
}

/// Emit a standardized debug event carrying metrics.
///
/// ```rust
/// use hazard_tracing::perf_event;
///
/// perf_event!("segments_merged", before = 120, after = 14);
/// ```
#[macro_export]
macro_rules! perf_event {
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {
        $crate::__private::debug!(
            event = $name,
            $($field = $value),+
        );
    };
}
