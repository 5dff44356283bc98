//! Local terminal surface
//!
//! The surface renders bytes and produces keystrokes; rendering itself lives
//! elsewhere. A session owns exactly one surface and one event receiver.

mod stdio;

pub use stdio::*;

use thiserror::Error;

use crate::session::Geometry;

/// Errors that can occur on the local surface
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Surface is not visible")]
    NotVisible,

    #[error("Surface I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for surface operations
pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// Notifications from the surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// Bytes typed or pasted by the user
    Input(Vec<u8>),
    /// The surface gained focus
    Focus,
    /// The selection changed
    Selection,
    /// A rendered line changed; carries the last refreshed line
    Refresh { line: String },
    /// The surface changed size on its own
    Resize(Geometry),
}

/// Operations a session performs on its surface
pub trait LocalSurface: Send {
    /// Render bytes from the remote shell
    fn write(&mut self, data: &[u8]) -> SurfaceResult<()>;

    /// Geometry that would fill the available space
    fn propose_geometry(&self) -> SurfaceResult<Geometry>;

    fn resize(&mut self, geometry: Geometry);

    fn focus(&mut self);

    /// Release the surface; called once at teardown
    fn dispose(&mut self);
}
