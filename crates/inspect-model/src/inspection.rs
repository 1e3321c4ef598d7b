//! Owned application state: plans, pins and the view navigator.
//!
//! Every user input is an [`Action`]. `Inspection::apply` checks it against
//! the current view, performs the store side effects and moves the
//! navigator. A failed action leaves all three untouched.

use crate::category::Color;
use crate::coords::{self, PixelPoint, SurfaceBounds};
use crate::error::{InspectError, InspectResult};
use crate::navigator::{PageStep, View, ViewNavigator, ViewState, ZoomLimits};
use crate::pin::{Pin, PinId, PinStore};
use crate::plan::{Plan, PlanId, PlanRegistry, PlanUpload};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    RegisterPlans(Vec<PlanUpload>),
    /// Renderer callback; may arrive in any view at any time.
    ResolvePageCount { plan: PlanId, page_count: u32 },
    OpenPlanList,
    ClosePlanList,
    PickPlan(PlanId),
    RemovePlan(PlanId),
    TogglePlacement,
    /// Pointer click on the rendered page surface.
    ClickSurface { pointer_x: f64, pointer_y: f64, bounds: SurfaceBounds },
    /// Click on an existing marker.
    SelectPin(PinId),
    SetCategory(String),
    SetDescription(String),
    Save,
    Back,
    DeletePin,
    ZoomIn,
    ZoomOut,
    TurnPage(PageStep),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Updated,
    PlansRegistered(Vec<PlanId>),
    PlanRemoved(PlanId),
    PinCreated(PinId),
    PinRemoved(PinId),
}

/// A pin as the plan view draws it on the current surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub pin: PinId,
    pub number: u32,
    pub color: Color,
    pub position: PixelPoint,
}

#[derive(Debug, Clone, Default)]
pub struct Inspection {
    plans: PlanRegistry,
    pins: PinStore,
    navigator: ViewNavigator,
}

impl Inspection {
    pub fn new(limits: ZoomLimits) -> InspectResult<Self> {
        Self::from_parts(PlanRegistry::new(), PinStore::new(), limits)
    }

    /// Rebuilds state from stored collections with a fresh view.
    pub fn from_parts(
        plans: PlanRegistry,
        pins: PinStore,
        limits: ZoomLimits,
    ) -> InspectResult<Self> {
        let mut navigator = ViewNavigator::new(limits)?;
        navigator.plan_activated(plans.active_id());
        Ok(Self { plans, pins, navigator })
    }

    pub fn plans(&self) -> &PlanRegistry {
        &self.plans
    }

    pub fn pins(&self) -> &PinStore {
        &self.pins
    }

    pub fn view_state(&self) -> &ViewState {
        self.navigator.state()
    }

    pub fn view(&self) -> View {
        self.navigator.view()
    }

    pub fn active_plan(&self) -> Option<&Plan> {
        self.plans.active_plan()
    }

    /// The pin open in the observation editor.
    pub fn selected_pin(&self) -> Option<&Pin> {
        let id = self.navigator.state().selected_pin?;
        self.pins.get(id).ok()
    }

    pub fn reset_view(&mut self) {
        self.navigator.reset();
        self.navigator.plan_activated(self.plans.active_id());
    }

    /// Pins on the active plan's current page, ordered by number.
    pub fn visible_pins(&self) -> Vec<&Pin> {
        let Some(plan) = self.plans.active_id() else {
            return Vec::new();
        };
        self.pins.query_by_plan_and_page(plan, self.navigator.state().current_page).collect()
    }

    /// Marker positions for the visible pins on a surface of `bounds`.
    pub fn markers(&self, bounds: SurfaceBounds) -> Vec<Marker> {
        self.visible_pins()
            .into_iter()
            .map(|pin| Marker {
                pin: pin.id(),
                number: pin.number(),
                color: pin.category.color(),
                position: coords::to_pixel(pin.position(), bounds),
            })
            .collect()
    }

    pub fn apply(&mut self, action: Action) -> InspectResult<Effect> {
        match action {
            Action::RegisterPlans(uploads) => {
                let ids =
                    self.plans.register_plans(uploads).into_iter().map(|plan| plan.id).collect();
                self.navigator.plan_activated(self.plans.active_id());
                Ok(Effect::PlansRegistered(ids))
            }
            Action::ResolvePageCount { plan, page_count } => {
                self.plans.set_page_count(plan, page_count)?;
                if self.plans.active_id() == Some(plan) {
                    self.navigator.page_count_resolved(page_count);
                }
                Ok(Effect::Updated)
            }
            Action::OpenPlanList => {
                self.navigator.open_plan_list()?;
                Ok(Effect::Updated)
            }
            Action::ClosePlanList => {
                self.navigator.close_plan_list()?;
                Ok(Effect::Updated)
            }
            Action::PickPlan(plan) => {
                self.navigator.require(View::PlanSelection, "pick plan")?;
                self.plans.set_active(plan)?;
                self.navigator.plan_picked(plan);
                Ok(Effect::Updated)
            }
            Action::RemovePlan(plan) => self.remove_plan(plan),
            Action::TogglePlacement => {
                self.navigator.toggle_placement(self.plans.active_id().is_some())?;
                Ok(Effect::Updated)
            }
            Action::ClickSurface { pointer_x, pointer_y, bounds } => {
                self.place_pin(pointer_x, pointer_y, bounds)
            }
            Action::SelectPin(pin) => {
                self.navigator.require(View::PlanView, "select pin")?;
                self.pins.get(pin)?;
                self.navigator.open_editor(pin);
                Ok(Effect::Updated)
            }
            Action::SetCategory(name) => {
                let pin = self.navigator.editing_pin("set category")?;
                self.pins.update_category(pin, &name)?;
                Ok(Effect::Updated)
            }
            Action::SetDescription(text) => {
                let pin = self.navigator.editing_pin("set description")?;
                self.pins.update_description(pin, text)?;
                Ok(Effect::Updated)
            }
            // Edits are committed as they happen, so save and back only leave
            // the editor.
            Action::Save => {
                self.navigator.close_editor("save")?;
                Ok(Effect::Updated)
            }
            Action::Back => {
                self.navigator.close_editor("back")?;
                Ok(Effect::Updated)
            }
            Action::DeletePin => {
                let pin = self.navigator.editing_pin("delete pin")?;
                self.pins.remove(pin)?;
                self.navigator.close_editor("delete pin")?;
                Ok(Effect::PinRemoved(pin))
            }
            Action::ZoomIn => {
                self.navigator.zoom_in()?;
                Ok(Effect::Updated)
            }
            Action::ZoomOut => {
                self.navigator.zoom_out()?;
                Ok(Effect::Updated)
            }
            Action::TurnPage(step) => {
                let page_count = self.plans.active_plan().and_then(|plan| plan.page_count);
                self.navigator.turn_page(step, page_count)?;
                Ok(Effect::Updated)
            }
        }
    }

    fn place_pin(
        &mut self,
        pointer_x: f64,
        pointer_y: f64,
        bounds: SurfaceBounds,
    ) -> InspectResult<Effect> {
        self.navigator.ensure_armed()?;
        let plan = self.plans.active_id().ok_or(InspectError::InvalidPlan)?;
        let position = coords::to_fractional(pointer_x, pointer_y, bounds)?;

        let page = self.navigator.state().current_page;
        let pin = self.pins.create_pin(plan, page, position).id();
        self.navigator.open_editor(pin);

        Ok(Effect::PinCreated(pin))
    }

    fn remove_plan(&mut self, plan: PlanId) -> InspectResult<Effect> {
        self.navigator.require(View::PlanSelection, "remove plan")?;
        if !self.plans.contains(plan) {
            return Err(InspectError::UnknownPlan(plan));
        }

        let pins = self.pins.count_for_plan(plan);
        if pins > 0 {
            return Err(InspectError::PlanInUse { plan, pins });
        }

        self.plans.remove(plan)?;
        self.navigator.plan_activated(self.plans.active_id());
        Ok(Effect::PlanRemoved(plan))
    }
}

/// Serializes every action through one lock, so pin numbers stay unique
/// when events are handled on more than one thread.
#[derive(Debug, Clone, Default)]
pub struct SharedInspection {
    inner: Arc<Mutex<Inspection>>,
}

impl SharedInspection {
    pub fn new(inspection: Inspection) -> Self {
        Self { inner: Arc::new(Mutex::new(inspection)) }
    }

    pub fn apply(&self, action: Action) -> InspectResult<Effect> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).apply(action)
    }

    pub fn read<R>(&self, f: impl FnOnce(&Inspection) -> R) -> R {
        f(&self.inner.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Runs several actions without other writers interleaving.
    pub fn write<R>(&self, f: impl FnOnce(&mut Inspection) -> R) -> R {
        f(&mut self.inner.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
