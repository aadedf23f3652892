use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// The byte-level capability a DAQ device is reached through.
///
/// Implementations own the endpoint handle. Every blocking call is bounded:
/// `receive` must return within `timeout` plus a small processing overhead,
/// yielding [`TransportError::Timeout`](crate::TransportError::Timeout) when
/// nothing arrived.
pub trait Transport: Send {
    /// Open the endpoint. Opening an already open transport is a no-op.
    fn open(&mut self) -> Result<()>;

    /// Close the endpoint. Closing is infallible and idempotent.
    fn close(&mut self);

    /// Whether the endpoint is currently open.
    fn is_open(&self) -> bool;

    /// Write all of `bytes` to the device.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Receive whatever the device has produced, waiting at most `timeout`.
    ///
    /// Returns a non-empty chunk on success. Chunk boundaries carry no
    /// meaning: a frame may be split across calls or several frames may
    /// arrive together.
    fn receive(&mut self, timeout: Duration) -> Result<Bytes>;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }

    fn receive(&mut self, timeout: Duration) -> Result<Bytes> {
        (**self).receive(timeout)
    }

    fn transport_name(&self) -> &'static str {
        (**self).transport_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    #[derive(Default)]
    struct Scripted {
        open: bool,
        sent: Vec<u8>,
        inbound: Vec<Bytes>,
    }

    impl Transport for Scripted {
        fn open(&mut self) -> Result<()> {
            self.open = true;
            Ok(())
        }

        fn close(&mut self) {
            self.open = false;
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn send(&mut self, bytes: &[u8]) -> Result<()> {
            self.sent.extend_from_slice(bytes);
            Ok(())
        }

        fn receive(&mut self, timeout: Duration) -> Result<Bytes> {
            if self.inbound.is_empty() {
                return Err(TransportError::Timeout(timeout));
            }
            Ok(self.inbound.remove(0))
        }

        fn transport_name(&self) -> &'static str {
            "scripted"
        }
    }

    #[test]
    fn boxed_transport_forwards_calls() {
        let mut boxed: Box<dyn Transport> = Box::new(Scripted {
            inbound: vec![Bytes::from_static(b"abc")],
            ..Scripted::default()
        });

        boxed.open().unwrap();
        assert!(boxed.is_open());
        boxed.send(b"xyz").unwrap();
        assert_eq!(
            boxed.receive(Duration::from_millis(1)).unwrap().as_ref(),
            b"abc"
        );
        assert!(boxed
            .receive(Duration::from_millis(1))
            .unwrap_err()
            .is_timeout());
        assert_eq!(boxed.transport_name(), "scripted");
        boxed.close();
        assert!(!boxed.is_open());
    }
}
