//! Minimal abstraction for an asynchronous byte stream. Allows the library to
//! plug into various implementations (serialport wrapper, USB CDC, a socket
//! bridge, etc.).
use futures_util::Future;

/// Contract to send and receive raw bytes asynchronously.
pub trait SerialLink {
    type Error: core::fmt::Debug;

    /// Write the whole buffer to the link. Asynchronous to accommodate
    /// non-blocking drivers.
    fn write<'a>(
        &'a mut self,
        bytes: &'a [u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a;

    /// Read the next available chunk into `buf` and return its length.
    /// A return of `0` means the link has closed.
    ///
    /// Must be cancel-safe: when the returned future is dropped before
    /// completion, no bytes may be lost.
    fn read<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> impl core::future::Future<Output = Result<usize, Self::Error>> + 'a;
}
