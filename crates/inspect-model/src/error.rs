use crate::navigator::View;
use crate::pin::PinId;
use crate::plan::PlanId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InspectError {
    #[error("unknown plan {0}")]
    UnknownPlan(PlanId),
    #[error("unknown pin {0}")]
    UnknownPin(PinId),
    #[error("unknown category {0:?}")]
    UnknownCategory(String),
    #[error("pin placement requires an active plan and armed placement mode")]
    InvalidPlan,
    #[error("{action} is not available in the {view} view")]
    InvalidTransition { view: View, action: &'static str },
    #[error("page count for the active plan is not resolved yet")]
    PageCountPending,
    #[error("plan {plan} still has {pins} pin(s)")]
    PlanInUse { plan: PlanId, pins: usize },
    #[error("surface has no area ({width}x{height})")]
    DegenerateSurface { width: f64, height: f64 },
    #[error("invalid zoom limits: {0}")]
    InvalidZoomLimits(String),
}

pub type InspectResult<T> = Result<T, InspectError>;
