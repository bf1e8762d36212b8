//! Values carried on driver streams.

use crate::DriverError;

/// A value that can be sent on a driver stream.
///
/// Every stream ends with a definitive value: either one the driver sent
/// with an error attached, or one synthesized from [`DriverError::ChannelClosed`]
/// when the channel closed without it.
pub trait StreamItem: Send + 'static {
    /// Build the terminal value that carries `err`.
    fn from_error(err: DriverError) -> Self;

    /// Error attached to this value, if any.
    fn error(&self) -> Option<&DriverError>;

    /// Returns true if no further values follow this one.
    fn is_terminal(&self) -> bool {
        self.error().is_some()
    }
}
