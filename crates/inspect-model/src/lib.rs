//! Site inspection annotation model
//!
//! Plans, numbered pins placed on their pages in resolution-independent
//! coordinates, the issue category taxonomy, and the view state machine
//! that decides which edits are legal at any moment.

pub mod category;
pub mod coords;
pub mod error;
pub mod inspection;
pub mod navigator;
pub mod pin;
pub mod plan;

pub use category::{color_of, list_categories, Category, CategoryEntry, Color};
pub use coords::{to_fractional, to_pixel, FractionalPoint, PixelPoint, SurfaceBounds};
pub use error::{InspectError, InspectResult};
pub use inspection::{Action, Effect, Inspection, Marker, SharedInspection};
pub use navigator::{PageStep, View, ViewNavigator, ViewState, ZoomLimits};
pub use pin::{Pin, PinId, PinStore};
pub use plan::{Plan, PlanId, PlanRegistry, PlanUpload, SourceRef};
