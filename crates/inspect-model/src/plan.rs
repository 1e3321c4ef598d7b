//! Registry of uploaded plan documents and the active selection.

use crate::error::{InspectError, InspectResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlanId(pub u64);

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to a plan's document bytes (a path or URL). Only the
/// renderer interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRef(String);

impl SourceRef {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Ingestion input: what the uploader hands over for each document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanUpload {
    pub name: String,
    pub source: SourceRef,
}

impl PlanUpload {
    pub fn new(name: impl Into<String>, source: SourceRef) -> Self {
        Self { name: name.into(), source }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub source: SourceRef,
    pub uploaded_at: DateTime<Utc>,
    /// Unknown until the renderer has opened the document.
    #[serde(default)]
    pub page_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanRegistry {
    plans: Vec<Plan>,
    active: Option<PlanId>,
    next_plan_id: u64,
}

impl PlanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers uploads in order. When nothing was active, the first new
    /// plan becomes active.
    pub fn register_plans<I>(&mut self, uploads: I) -> Vec<Plan>
    where
        I: IntoIterator<Item = PlanUpload>,
    {
        let now = Utc::now();
        let mut registered = Vec::new();

        for upload in uploads {
            self.next_plan_id += 1;
            let plan = Plan {
                id: PlanId(self.next_plan_id),
                name: upload.name,
                source: upload.source,
                uploaded_at: now,
                page_count: None,
            };
            tracing::debug!(plan = %plan.id, name = %plan.name, "registered plan");
            self.plans.push(plan.clone());
            registered.push(plan);
        }

        if self.active.is_none() {
            self.active = registered.first().map(|plan| plan.id);
        }

        registered
    }

    pub fn set_active(&mut self, id: PlanId) -> InspectResult<()> {
        if !self.contains(id) {
            return Err(InspectError::UnknownPlan(id));
        }

        self.active = Some(id);
        Ok(())
    }

    pub fn active_plan(&self) -> Option<&Plan> {
        let active = self.active?;
        self.get(active)
    }

    pub fn active_id(&self) -> Option<PlanId> {
        self.active
    }

    /// Highest plan id handed out so far.
    pub fn last_id(&self) -> u64 {
        self.next_plan_id
    }

    pub fn all(&self) -> &[Plan] {
        &self.plans
    }

    pub fn get(&self, id: PlanId) -> Option<&Plan> {
        self.plans.iter().find(|plan| plan.id == id)
    }

    pub fn contains(&self, id: PlanId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn set_page_count(&mut self, id: PlanId, page_count: u32) -> InspectResult<()> {
        let plan = self
            .plans
            .iter_mut()
            .find(|plan| plan.id == id)
            .ok_or(InspectError::UnknownPlan(id))?;

        plan.page_count = Some(page_count);
        Ok(())
    }

    /// Removes a plan without checking for pins; callers that own pins go
    /// through `Inspection::remove_plan`. A removed active plan hands the
    /// selection to the first remaining plan.
    pub(crate) fn remove(&mut self, id: PlanId) -> InspectResult<Plan> {
        let index = self
            .plans
            .iter()
            .position(|plan| plan.id == id)
            .ok_or(InspectError::UnknownPlan(id))?;

        let removed = self.plans.remove(index);

        if self.active == Some(id) {
            self.active = self.plans.first().map(|plan| plan.id);
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str) -> PlanUpload {
        PlanUpload::new(name, SourceRef::new(format!("/plans/{name}")))
    }

    #[test]
    fn first_registration_activates_first_plan() {
        let mut registry = PlanRegistry::new();
        let plans = registry.register_plans([upload("siteA.pdf"), upload("siteB.pdf")]);

        assert_eq!(plans.len(), 2);
        let active = registry.active_plan().expect("active plan expected");
        assert_eq!(active.name, "siteA.pdf");
        assert_eq!(active.page_count, None);
    }

    #[test]
    fn later_registration_keeps_active_plan() {
        let mut registry = PlanRegistry::new();
        let first = registry.register_plans([upload("a.pdf")]);
        registry.register_plans([upload("b.pdf")]);

        assert_eq!(registry.active_id(), Some(first[0].id));
        let names: Vec<_> = registry.all().iter().map(|plan| plan.name.as_str()).collect();
        assert_eq!(names, ["a.pdf", "b.pdf"]);
    }

    #[test]
    fn ids_are_unique() {
        let mut registry = PlanRegistry::new();
        registry.register_plans([upload("a.pdf"), upload("b.pdf")]);
        registry.register_plans([upload("c.pdf")]);

        let mut ids: Vec<_> = registry.all().iter().map(|plan| plan.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn set_active_rejects_unknown_plan() {
        let mut registry = PlanRegistry::new();
        registry.register_plans([upload("a.pdf")]);

        let err = registry.set_active(PlanId(42)).expect_err("plan 42 does not exist");
        assert_eq!(err, InspectError::UnknownPlan(PlanId(42)));
        assert_eq!(registry.active_plan().map(|plan| plan.name.as_str()), Some("a.pdf"));
    }

    #[test]
    fn removing_active_plan_falls_back_to_first_remaining() {
        let mut registry = PlanRegistry::new();
        let plans = registry.register_plans([upload("a.pdf"), upload("b.pdf")]);

        registry.remove(plans[0].id).expect("plan exists");
        assert_eq!(registry.active_id(), Some(plans[1].id));

        registry.remove(plans[1].id).expect("plan exists");
        assert_eq!(registry.active_id(), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut registry = PlanRegistry::new();
        let plans = registry.register_plans([upload("a.pdf")]);
        registry.remove(plans[0].id).expect("plan exists");

        let again = registry.register_plans([upload("a.pdf")]);
        assert_ne!(again[0].id, plans[0].id);
    }
}
