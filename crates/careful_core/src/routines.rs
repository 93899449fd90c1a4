use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use shared::{
    domain::{
        CandidateProduct, Routine, RoutineCollections, RoutineId, RoutineType, ScheduleTime, Step,
        StepId,
    },
    error::CoreError,
    keys::{
        routine_id_from_progress_key, routine_progress_key, ROUTINES_KEY,
        ROUTINE_PROGRESS_PREFIX,
    },
};
use storage::{save_json, KeyValueStore};
use tracing::{debug, info, warn};

use crate::samples::sample_routines;

/// Input to [`RoutineStateManager::create_routine`].
#[derive(Debug, Clone)]
pub struct NewRoutine {
    pub name: String,
    pub routine_type: RoutineType,
    pub steps: Vec<Step>,
    pub time: ScheduleTime,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressInfo {
    pub completed_count: usize,
    pub step_count: usize,
    /// Unrounded, capped at 100.
    pub percentage: f64,
    pub is_completed: bool,
}

impl ProgressInfo {
    pub fn compute(completed_count: usize, step_count: usize) -> Self {
        let percentage = if step_count == 0 {
            0.0
        } else {
            (completed_count as f64 / step_count as f64 * 100.0).min(100.0)
        };
        Self {
            completed_count,
            step_count,
            percentage,
            is_completed: step_count > 0 && completed_count == step_count,
        }
    }

    pub fn has_progress(&self) -> bool {
        self.completed_count > 0
    }

    pub fn rounded_percentage(&self) -> u8 {
        self.percentage.round() as u8
    }
}

/// Builds routine steps from composed products, ordered by selection.
pub fn steps_from_candidates(selected: &[CandidateProduct]) -> Vec<Step> {
    selected
        .iter()
        .zip(1u32..)
        .map(|(product, order)| Step {
            product_id: product.id,
            category: product.category.clone(),
            order,
            instructions: String::new(),
        })
        .collect()
}

/// Sole writer of routine definitions and per-routine step progress.
pub struct RoutineStateManager<S> {
    store: S,
    routines: RoutineCollections,
    progress: HashMap<RoutineId, Vec<StepId>>,
    /// `None` once the id space is exhausted.
    next_id: Option<i64>,
}

impl<S: KeyValueStore> RoutineStateManager<S> {
    pub async fn load(store: S) -> Result<Self, CoreError> {
        let routines = match store.get(ROUTINES_KEY).await.map_err(CoreError::storage)? {
            Some(raw) => match serde_json::from_str::<RoutineCollections>(&raw) {
                Ok(routines) => routines,
                Err(err) => {
                    warn!(error = %err, "stored routines are unreadable; using sample routines");
                    sample_routines()
                }
            },
            None => sample_routines(),
        };

        let mut progress = HashMap::new();
        for routine in routines.iter() {
            let key = routine_progress_key(routine.id);
            let Some(raw) = store.get(&key).await.map_err(CoreError::storage)? else {
                continue;
            };
            match serde_json::from_str::<Vec<StepId>>(&raw) {
                Ok(completed) => {
                    let completed = sanitize_completed(routine, completed);
                    progress.insert(routine.id, completed);
                }
                Err(err) => {
                    warn!(
                        routine_id = routine.id.0,
                        error = %err,
                        "skipping unreadable routine progress"
                    );
                }
            }
        }

        let highest_progress_id = store
            .keys_with_prefix(ROUTINE_PROGRESS_PREFIX)
            .await
            .map_err(CoreError::storage)?
            .iter()
            .filter_map(|key| routine_id_from_progress_key(key))
            .max();
        // Sample ids stay reserved so a later reset never hands them to another routine.
        let highest_id = routines
            .max_id()
            .into_iter()
            .chain(highest_progress_id)
            .chain(sample_routines().max_id())
            .max();
        let next_id = match highest_id {
            Some(id) => id.0.checked_add(1).map(|next| next.max(1)),
            None => Some(1),
        };
        if next_id.is_none() {
            warn!("stored routine ids exhaust the id space; routine creation is disabled");
        }

        debug!(
            routines = routines.len(),
            with_progress = progress.len(),
            next_id = ?next_id,
            "routine state loaded"
        );

        Ok(Self {
            store,
            routines,
            progress,
            next_id,
        })
    }

    pub fn collections(&self) -> &RoutineCollections {
        &self.routines
    }

    pub fn list_routines(&self, routine_type: RoutineType) -> &[Routine] {
        self.routines.bucket(routine_type)
    }

    pub fn routine(&self, id: RoutineId) -> Option<&Routine> {
        self.routines.find(id)
    }

    pub fn completed_steps(&self, id: RoutineId) -> &[StepId] {
        self.progress.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn progress(&self, id: RoutineId) -> Result<ProgressInfo, CoreError> {
        let routine = self.require(id)?;
        Ok(ProgressInfo::compute(
            self.completed_steps(id).len(),
            routine.step_count(),
        ))
    }

    pub async fn create_routine(
        &mut self,
        new_routine: NewRoutine,
    ) -> Result<RoutineId, CoreError> {
        let name = new_routine.name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("Please enter a routine name".into()));
        }
        if new_routine.steps.is_empty() {
            return Err(CoreError::Validation("Please select at least one product".into()));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = new_routine.steps.iter().find(|step| !seen.insert(step.id())) {
            return Err(CoreError::Validation(format!(
                "product {} appears more than once in the routine",
                duplicate.product_id
            )));
        }

        let id = self
            .next_id
            .map(RoutineId)
            .ok_or_else(|| CoreError::Internal("routine id space exhausted".into()))?;
        self.next_id = id.0.checked_add(1);

        let routine = Routine {
            id,
            name: name.to_string(),
            routine_type: new_routine.routine_type,
            steps: new_routine.steps,
            time: new_routine.time,
            enabled: new_routine.enabled,
            streak: 0,
            last_used: None,
        };
        let previous = self.routines.clone();
        self.routines.bucket_mut(routine.routine_type).push(routine);
        self.commit_routines(previous).await?;

        info!(
            routine_id = id.0,
            routine_type = %new_routine.routine_type,
            "routine created"
        );
        Ok(id)
    }

    /// Flips the enabled flag and returns the new value.
    pub async fn toggle_routine(&mut self, id: RoutineId) -> Result<bool, CoreError> {
        let previous = self.routines.clone();
        let routine = self
            .routines
            .find_mut(id)
            .ok_or_else(|| CoreError::not_found("routine", id))?;
        routine.enabled = !routine.enabled;
        let enabled = routine.enabled;
        self.commit_routines(previous).await?;

        info!(
            routine_id = id.0,
            status = if enabled { "enabled" } else { "disabled" },
            "routine toggled"
        );
        Ok(enabled)
    }

    /// Removes the routine from whichever bucket holds it. Unknown ids are a no-op.
    pub async fn delete_routine(&mut self, id: RoutineId) -> Result<bool, CoreError> {
        let Some(name) = self.routines.find(id).map(|routine| routine.name.clone()) else {
            debug!(routine_id = id.0, "delete ignored for unknown routine");
            return Ok(false);
        };

        let previous = self.routines.clone();
        self.routines.morning.retain(|routine| routine.id != id);
        self.routines.evening.retain(|routine| routine.id != id);
        self.commit_routines(previous).await?;

        self.progress.remove(&id);
        if let Err(err) = self.store.remove(&routine_progress_key(id)).await {
            warn!(
                routine_id = id.0,
                error = %format!("{err:#}"),
                "failed to drop progress for deleted routine"
            );
        }

        info!(routine_id = id.0, name = %name, "routine deleted");
        Ok(true)
    }

    /// Returns whether the step is complete after the toggle.
    pub async fn toggle_step_completion(
        &mut self,
        routine_id: RoutineId,
        step_id: StepId,
    ) -> Result<bool, CoreError> {
        let routine = self.require(routine_id)?;
        if !routine.has_step(step_id) {
            return Err(CoreError::not_found("step", step_id));
        }

        let completed = self.progress.entry(routine_id).or_default();
        let previous = completed.clone();
        let now_complete = match completed.iter().position(|id| *id == step_id) {
            Some(index) => {
                completed.remove(index);
                false
            }
            None => {
                completed.push(step_id);
                true
            }
        };
        self.commit_progress(routine_id, previous).await?;

        debug!(
            routine_id = routine_id.0,
            step_id = step_id.0,
            complete = now_complete,
            "step toggled"
        );
        Ok(now_complete)
    }

    pub async fn mark_all_complete(&mut self, routine_id: RoutineId) -> Result<(), CoreError> {
        let all_steps: Vec<StepId> = self
            .require(routine_id)?
            .ordered_steps()
            .into_iter()
            .map(Step::id)
            .collect();
        let previous = self
            .progress
            .insert(routine_id, all_steps)
            .unwrap_or_default();
        self.commit_progress(routine_id, previous).await?;
        info!(routine_id = routine_id.0, "all steps marked complete");
        Ok(())
    }

    pub async fn reset_progress(&mut self, routine_id: RoutineId) -> Result<(), CoreError> {
        self.require(routine_id)?;
        let previous = self
            .progress
            .insert(routine_id, Vec::new())
            .unwrap_or_default();
        self.commit_progress(routine_id, previous).await?;
        info!(routine_id = routine_id.0, "routine progress reset");
        Ok(())
    }

    pub async fn increment_streak(&mut self, id: RoutineId) -> Result<u32, CoreError> {
        let previous = self.routines.clone();
        let routine = self
            .routines
            .find_mut(id)
            .ok_or_else(|| CoreError::not_found("routine", id))?;
        routine.streak = routine.streak.saturating_add(1);
        let streak = routine.streak;
        self.commit_routines(previous).await?;
        Ok(streak)
    }

    pub async fn mark_used(&mut self, id: RoutineId, at: DateTime<Utc>) -> Result<(), CoreError> {
        let previous = self.routines.clone();
        let routine = self
            .routines
            .find_mut(id)
            .ok_or_else(|| CoreError::not_found("routine", id))?;
        routine.last_used = Some(at);
        self.commit_routines(previous).await
    }

    /// Replaces every routine with the sample set. Progress survives only for
    /// sample routines that were already present; everything else is dropped.
    pub async fn reset_to_samples(&mut self) -> Result<(), CoreError> {
        let samples = sample_routines();
        let stale: Vec<RoutineId> = self
            .progress
            .keys()
            .copied()
            .filter(|id| !is_same_routine(self.routines.find(*id), samples.find(*id)))
            .collect();

        let previous = std::mem::replace(&mut self.routines, samples);
        self.commit_routines(previous).await?;

        for id in stale {
            self.progress.remove(&id);
            if let Err(err) = self.store.remove(&routine_progress_key(id)).await {
                warn!(
                    routine_id = id.0,
                    error = %format!("{err:#}"),
                    "failed to drop progress for replaced routine"
                );
            }
        }
        for routine in self.routines.iter() {
            if let Some(completed) = self.progress.get_mut(&routine.id) {
                completed.retain(|step_id| routine.has_step(*step_id));
            }
        }
        info!("routines reset to samples");
        Ok(())
    }

    fn require(&self, id: RoutineId) -> Result<&Routine, CoreError> {
        self.routines
            .find(id)
            .ok_or_else(|| CoreError::not_found("routine", id))
    }

    async fn commit_routines(&mut self, previous: RoutineCollections) -> Result<(), CoreError> {
        let result = save_json(&self.store, ROUTINES_KEY, &self.routines).await;
        if let Err(err) = result {
            self.routines = previous;
            return Err(CoreError::storage(err));
        }
        Ok(())
    }

    async fn commit_progress(
        &mut self,
        routine_id: RoutineId,
        previous: Vec<StepId>,
    ) -> Result<(), CoreError> {
        let key = routine_progress_key(routine_id);
        let result = save_json(&self.store, &key, self.completed_steps(routine_id)).await;
        if let Err(err) = result {
            self.progress.insert(routine_id, previous);
            return Err(CoreError::storage(err));
        }
        Ok(())
    }
}

fn is_same_routine(current: Option<&Routine>, restored: Option<&Routine>) -> bool {
    match (current, restored) {
        (Some(current), Some(restored)) => {
            current.name == restored.name && current.routine_type == restored.routine_type
        }
        _ => false,
    }
}

fn sanitize_completed(routine: &Routine, completed: Vec<StepId>) -> Vec<StepId> {
    let mut seen = HashSet::new();
    completed
        .into_iter()
        .filter(|step_id| routine.has_step(*step_id) && seen.insert(*step_id))
        .collect()
}

#[cfg(test)]
#[path = "tests/routines_tests.rs"]
mod tests;
