//! View navigation state machine.
//!
//! Tracks which of the three views is showing and the transient data live
//! in it. The navigator never touches plans or pins; `Inspection` performs
//! the store side effects and asks the navigator to move.

use crate::error::{InspectError, InspectResult};
use crate::pin::PinId;
use crate::plan::PlanId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum View {
    PlanView,
    PlanSelection,
    ObservationEditor,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PlanView => "plan",
            Self::PlanSelection => "plan selection",
            Self::ObservationEditor => "observation editor",
        })
    }
}

/// Zoom bounds and step, in integer percent so repeated steps stay exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomLimits {
    pub min_percent: u16,
    pub max_percent: u16,
    pub step_percent: u16,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self { min_percent: 50, max_percent: 200, step_percent: 10 }
    }
}

impl ZoomLimits {
    /// Describes the first problem found, if any.
    pub fn check(&self) -> Result<(), String> {
        if self.min_percent == 0 {
            return Err("minimum zoom must be above 0%".to_owned());
        }
        if self.min_percent > self.max_percent {
            return Err(format!(
                "minimum zoom {}% exceeds maximum {}%",
                self.min_percent, self.max_percent
            ));
        }
        if self.step_percent == 0 {
            return Err("zoom step must be above 0%".to_owned());
        }
        Ok(())
    }

    pub fn clamp(&self, percent: u16) -> u16 {
        percent.clamp(self.min_percent, self.max_percent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub view: View,
    pub selected_plan: Option<PlanId>,
    pub selected_pin: Option<PinId>,
    /// 1-based.
    pub current_page: u32,
    pub zoom_percent: u16,
    pub placement_armed: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            view: View::PlanView,
            selected_plan: None,
            selected_pin: None,
            current_page: 1,
            zoom_percent: 100,
            placement_armed: false,
        }
    }
}

impl ViewState {
    pub fn zoom_factor(&self) -> f32 {
        f32::from(self.zoom_percent) / 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStep {
    Next,
    Previous,
    To(u32),
}

#[derive(Debug, Clone, Default)]
pub struct ViewNavigator {
    state: ViewState,
    limits: ZoomLimits,
}

impl ViewNavigator {
    /// Fails with `InvalidZoomLimits` unless `limits` passes
    /// [`ZoomLimits::check`].
    pub fn new(limits: ZoomLimits) -> InspectResult<Self> {
        limits.check().map_err(InspectError::InvalidZoomLimits)?;
        Ok(Self { state: Self::initial_state(limits), limits })
    }

    fn initial_state(limits: ZoomLimits) -> ViewState {
        ViewState { zoom_percent: limits.clamp(100), ..ViewState::default() }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn view(&self) -> View {
        self.state.view
    }

    pub fn limits(&self) -> ZoomLimits {
        self.limits
    }

    pub(crate) fn reset(&mut self) {
        self.state = Self::initial_state(self.limits);
    }

    pub(crate) fn require(&self, view: View, action: &'static str) -> InspectResult<()> {
        if self.state.view == view {
            Ok(())
        } else {
            tracing::warn!(view = %self.state.view, action, "rejected action");
            Err(InspectError::InvalidTransition { view: self.state.view, action })
        }
    }

    fn enter(&mut self, view: View) {
        tracing::debug!(from = %self.state.view, to = %view, "view transition");
        self.state.view = view;
    }

    pub fn open_plan_list(&mut self) -> InspectResult<()> {
        self.require(View::PlanView, "open plan list")?;
        self.state.placement_armed = false;
        self.enter(View::PlanSelection);
        Ok(())
    }

    pub fn close_plan_list(&mut self) -> InspectResult<()> {
        self.require(View::PlanSelection, "close plan list")?;
        self.enter(View::PlanView);
        Ok(())
    }

    /// Completes a pick from the plan list. The registry has already
    /// accepted `plan` as active.
    pub(crate) fn plan_picked(&mut self, plan: PlanId) {
        self.plan_activated(Some(plan));
        self.enter(View::PlanView);
    }

    /// Follows the registry's active plan. A different plan starts over on
    /// page 1 with placement disarmed.
    pub(crate) fn plan_activated(&mut self, plan: Option<PlanId>) {
        if self.state.selected_plan == plan {
            return;
        }
        self.state.selected_plan = plan;
        self.state.current_page = 1;
        self.state.placement_armed = false;
    }

    /// Flips placement mode. `has_plan` reports whether an active plan exists.
    pub fn toggle_placement(&mut self, has_plan: bool) -> InspectResult<bool> {
        self.require(View::PlanView, "toggle pin placement")?;
        if !has_plan {
            return Err(InspectError::InvalidPlan);
        }

        self.state.placement_armed = !self.state.placement_armed;
        Ok(self.state.placement_armed)
    }

    pub(crate) fn ensure_armed(&self) -> InspectResult<()> {
        self.require(View::PlanView, "place pin")?;
        if self.state.placement_armed {
            Ok(())
        } else {
            Err(InspectError::InvalidPlan)
        }
    }

    pub(crate) fn open_editor(&mut self, pin: PinId) {
        self.state.selected_pin = Some(pin);
        self.state.placement_armed = false;
        self.enter(View::ObservationEditor);
    }

    pub(crate) fn editing_pin(&self, action: &'static str) -> InspectResult<PinId> {
        self.require(View::ObservationEditor, action)?;
        // Entering the editor always selects a pin.
        self.state.selected_pin.ok_or(InspectError::InvalidTransition {
            view: self.state.view,
            action,
        })
    }

    pub(crate) fn close_editor(&mut self, action: &'static str) -> InspectResult<()> {
        self.require(View::ObservationEditor, action)?;
        self.state.selected_pin = None;
        self.enter(View::PlanView);
        Ok(())
    }

    pub fn zoom_in(&mut self) -> InspectResult<u16> {
        self.require(View::PlanView, "zoom in")?;
        let next = self.state.zoom_percent.saturating_add(self.limits.step_percent);
        self.state.zoom_percent = self.limits.clamp(next);
        Ok(self.state.zoom_percent)
    }

    pub fn zoom_out(&mut self) -> InspectResult<u16> {
        self.require(View::PlanView, "zoom out")?;
        let next = self.state.zoom_percent.saturating_sub(self.limits.step_percent);
        self.state.zoom_percent = self.limits.clamp(next);
        Ok(self.state.zoom_percent)
    }

    /// Moves within `[1, page_count]`. Unavailable until the page count of
    /// the active plan is known.
    pub fn turn_page(&mut self, step: PageStep, page_count: Option<u32>) -> InspectResult<u32> {
        self.require(View::PlanView, "change page")?;
        let page_count = page_count.ok_or(InspectError::PageCountPending)?.max(1);

        let target = match step {
            PageStep::Next => self.state.current_page.saturating_add(1),
            PageStep::Previous => self.state.current_page.saturating_sub(1),
            PageStep::To(page) => page,
        };

        self.state.current_page = target.clamp(1, page_count);
        Ok(self.state.current_page)
    }

    /// Keeps the current page valid once a page count arrives.
    pub(crate) fn page_count_resolved(&mut self, page_count: u32) {
        self.state.current_page = self.state.current_page.clamp(1, page_count.max(1));
    }
}
