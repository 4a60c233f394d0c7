//! Transparent partitioning of many requests into cap-sized batch plans

use log::{debug, info};
use std::collections::HashMap;

use super::plan::BatchPlan;
use super::step::RequestStep;
use crate::api::constants::MAX_BATCH_STEPS;
use crate::api::request::RequestInformation;
use crate::error::{OrchestrationError, Result};

/// Ordered list of sealed plans plus the plan currently being filled
///
/// Only the current plan can be below the cap after additions; a full current
/// plan is sealed before the next step is added. Once finalized for execution
/// the collection is read-only.
#[derive(Debug, Clone)]
pub struct BatchPlanCollection {
    sealed: Vec<BatchPlan>,
    current: BatchPlan,
    max_steps_per_plan: usize,
    finalized: bool,
}

impl Default for BatchPlanCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchPlanCollection {
    pub fn new() -> Self {
        Self {
            sealed: Vec::new(),
            current: BatchPlan::new(),
            max_steps_per_plan: MAX_BATCH_STEPS,
            finalized: false,
        }
    }

    /// Collection whose plans hold at most `max_steps_per_plan` steps (2..=20)
    pub fn with_capacity(max_steps_per_plan: usize) -> Result<Self> {
        Ok(Self {
            sealed: Vec::new(),
            current: BatchPlan::with_capacity(max_steps_per_plan)?,
            max_steps_per_plan,
            finalized: false,
        })
    }

    pub fn max_steps_per_plan(&self) -> usize {
        self.max_steps_per_plan
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Total number of steps across every plan
    pub fn len(&self) -> usize {
        self.sealed.iter().map(BatchPlan::len).sum::<usize>() + self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any plan holds a step with this id
    pub fn contains(&self, id: &str) -> bool {
        self.current.contains(id) || self.sealed.iter().any(|plan| plan.contains(id))
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.finalized {
            return Err(OrchestrationError::Unsupported(
                "batch collection has already been finalized for execution".to_string(),
            ));
        }
        Ok(())
    }

    fn roll_over_if_full(&mut self) -> Result<()> {
        if self.current.is_full() {
            let fresh = BatchPlan::with_capacity(self.max_steps_per_plan)?;
            let sealed = std::mem::replace(&mut self.current, fresh);
            debug!(
                "Sealed batch plan {} with {} steps",
                self.sealed.len() + 1,
                sealed.len()
            );
            self.sealed.push(sealed);
        }
        Ok(())
    }

    /// Add a step to the current plan, starting a new plan when it is full
    ///
    /// Dependencies must refer to steps in the same (current) plan.
    pub fn add_step(&mut self, step: RequestStep) -> Result<bool> {
        self.ensure_mutable()?;
        if self.contains(step.id()) {
            return Ok(false);
        }
        self.roll_over_if_full()?;
        self.current.add_step(step)
    }

    /// Add a request under a generated id and return that id
    pub fn add_request(&mut self, request: RequestInformation) -> Result<String> {
        self.ensure_mutable()?;
        self.roll_over_if_full()?;
        self.current.add_request(request)
    }

    /// Remove a step from the first plan containing it, current plan first
    pub fn remove_step(&mut self, id: &str) -> Result<bool> {
        self.ensure_mutable()?;
        if self.current.remove_step(id)? {
            return Ok(true);
        }
        for plan in &mut self.sealed {
            if plan.remove_step(id)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Seal the current plan and freeze the collection
    ///
    /// Calling this again returns the same plans without sealing anything twice.
    pub fn finalize_for_execution(&mut self) -> &[BatchPlan] {
        if !self.finalized {
            if !self.current.is_empty() {
                let current = std::mem::replace(&mut self.current, BatchPlan::new());
                self.sealed.push(current);
            }
            self.finalized = true;
            info!(
                "Finalized batch collection: {} plans, {} steps",
                self.sealed.len(),
                self.len()
            );
        }
        &self.sealed
    }

    /// Plans in execution order, including a non-empty current plan
    pub fn plans(&self) -> Vec<&BatchPlan> {
        let mut plans: Vec<&BatchPlan> = self.sealed.iter().collect();
        if !self.current.is_empty() {
            plans.push(&self.current);
        }
        plans
    }

    /// Id to step view across every plan; later plans win on id collisions
    pub fn all_steps(&self) -> HashMap<&str, &RequestStep> {
        self.plans()
            .into_iter()
            .flat_map(|plan| plan.steps())
            .map(|step| (step.id(), step))
            .collect()
    }

    /// New collection with the same cap holding every failed step
    pub fn build_retry_collection(
        &self,
        status_by_id: &HashMap<String, u16>,
    ) -> Result<BatchPlanCollection> {
        let mut retry = BatchPlanCollection::with_capacity(self.max_steps_per_plan)?;
        for plan in self.plans() {
            for step in plan.build_retry_plan(status_by_id).steps() {
                retry.add_step(step.clone())?;
            }
        }
        debug!(
            "Built retry collection with {} of {} steps",
            retry.len(),
            self.len()
        );
        Ok(retry)
    }
}
