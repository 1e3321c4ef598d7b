//! Pin store: the authoritative collection of inspection pins.
//!
//! Pins reference plans by id only. The store never checks that a plan
//! exists; keeping references valid is the job of the owning
//! `Inspection`.

use crate::category::Category;
use crate::coords::FractionalPoint;
use crate::error::{InspectError, InspectResult};
use crate::plan::PlanId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PinId(pub u64);

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    id: PinId,
    plan_id: PlanId,
    page: u32,
    position: FractionalPoint,
    number: u32,
    pub category: Category,
    pub description: String,
    created_at: DateTime<Utc>,
}

impl Pin {
    pub fn id(&self) -> PinId {
        self.id
    }

    pub fn plan_id(&self) -> PlanId {
        self.plan_id
    }

    /// 1-based page within the plan.
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn position(&self) -> FractionalPoint {
        self.position
    }

    /// Human-facing sequence number, unique across the session.
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PinStore {
    pins: Vec<Pin>,
    /// Highest number handed out so far. Equals `pins.len()` until a pin is
    /// removed; numbers are never reissued.
    issued: u32,
    next_pin_id: u64,
}

impl PinStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pin with the default category and an empty description.
    ///
    /// The position is clamped into `[0, 100]` on both axes.
    pub fn create_pin(&mut self, plan_id: PlanId, page: u32, position: FractionalPoint) -> &Pin {
        self.next_pin_id += 1;
        self.issued += 1;

        let pin = Pin {
            id: PinId(self.next_pin_id),
            plan_id,
            page,
            position: FractionalPoint::clamped(position.x, position.y),
            number: self.issued,
            category: Category::default(),
            description: String::new(),
            created_at: Utc::now(),
        };

        tracing::debug!(
            pin = %pin.id,
            number = pin.number,
            plan = %plan_id,
            page,
            x = pin.position.x,
            y = pin.position.y,
            "created pin"
        );

        self.pins.push(pin);
        let index = self.pins.len() - 1;
        &self.pins[index]
    }

    pub fn get(&self, id: PinId) -> InspectResult<&Pin> {
        self.pins.iter().find(|pin| pin.id == id).ok_or(InspectError::UnknownPin(id))
    }

    fn get_mut(&mut self, id: PinId) -> InspectResult<&mut Pin> {
        self.pins.iter_mut().find(|pin| pin.id == id).ok_or(InspectError::UnknownPin(id))
    }

    /// Sets a pin's category by display name. Nothing changes on failure.
    pub fn update_category(&mut self, id: PinId, name: &str) -> InspectResult<()> {
        let pin = self.get_mut(id)?;
        let category: Category = name.parse()?;

        tracing::debug!(pin = %id, from = %pin.category, to = %category, "updated category");
        pin.category = category;
        Ok(())
    }

    pub fn update_description(&mut self, id: PinId, text: impl Into<String>) -> InspectResult<()> {
        let pin = self.get_mut(id)?;
        pin.description = text.into();
        tracing::debug!(pin = %id, len = pin.description.len(), "updated description");
        Ok(())
    }

    /// Pins on one page of one plan, ordered by number.
    pub fn query_by_plan_and_page(
        &self,
        plan_id: PlanId,
        page: u32,
    ) -> impl Iterator<Item = &Pin> + Clone + '_ {
        // Insertion order is number order.
        self.pins.iter().filter(move |pin| pin.plan_id == plan_id && pin.page == page)
    }

    pub fn count_for_plan(&self, plan_id: PlanId) -> usize {
        self.pins.iter().filter(|pin| pin.plan_id == plan_id).count()
    }

    pub fn remove(&mut self, id: PinId) -> InspectResult<Pin> {
        let index =
            self.pins.iter().position(|pin| pin.id == id).ok_or(InspectError::UnknownPin(id))?;

        let removed = self.pins.remove(index);
        tracing::debug!(pin = %id, number = removed.number, "removed pin");
        Ok(removed)
    }

    /// Highest number handed out so far.
    pub fn last_issued(&self) -> u32 {
        self.issued
    }

    /// Highest pin id handed out so far.
    pub fn last_id(&self) -> u64 {
        self.next_pin_id
    }

    /// All pins in creation order.
    pub fn all(&self) -> &[Pin] {
        &self.pins
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}
