/// Receives one metric sample per completed processing operation.
///
/// Implementations run on the real-time processing thread: they must be
/// non-blocking, bounded and allocation free. Delivery is best-effort and has
/// no observable failure.
pub trait MetricNotifier<S>: Send + Sync {
    fn on_new_metric(&self, sample: &S);
}

impl<S, N: MetricNotifier<S> + ?Sized> MetricNotifier<S> for &N {
    #[inline]
    fn on_new_metric(&self, sample: &S) {
        (**self).on_new_metric(sample);
    }
}

impl<S, N: MetricNotifier<S> + ?Sized> MetricNotifier<S> for std::sync::Arc<N> {
    #[inline]
    fn on_new_metric(&self, sample: &S) {
        (**self).on_new_metric(sample);
    }
}
