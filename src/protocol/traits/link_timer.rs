//! Asynchronous timer abstraction providing the timing primitives required
//! by the request-deadline and reset logic.

/// Timer trait abstraction; must remain thread-safe when applicable.
pub trait LinkTimer {
    /// Asynchronously wait for `millis` milliseconds.
    fn delay_ms<'a>(
        &'a mut self,
        millis: u32,
    ) -> impl core::future::Future<Output = ()> + 'a;

    /// Milliseconds elapsed on a monotonic clock; used to stamp deadlines.
    fn now_ms(&self) -> u64;
}
