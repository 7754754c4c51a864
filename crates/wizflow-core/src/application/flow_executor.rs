//! Runs one flow against the subject system, step by step.
//!
//! A boundary error or any other `Err` aborts the flow. Validation failures are
//! recorded and execution continues so later defects in the same run surface too.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::application::choice_resolver::ChoiceResolver;
use crate::application::snapshot_service::SnapshotService;
use crate::application::subject::{SubjectApi, SubjectClient};
use crate::config::HarnessConfig;
use crate::domain::catalog::Catalog;
use crate::domain::context::{EquipmentMode, ExecutionContext};
use crate::domain::flow_result::{
    FailureRecord, FlowErrorRecord, FlowResult, StepOutcome, StepRecord,
};
use crate::domain::flow_step::{FlowStep, StepAction};
use crate::domain::payload::{ChoiceType, ValidationPayload};
use crate::domain::randomizer::Randomizer;
use crate::domain::snapshot::StateSnapshot;
use crate::domain::validation::ValidationResult;
use crate::error::{BoundaryErrorKind, CoreError, CoreResult};
use crate::validators::{
    CompletionValidator, EquipmentExpectation, EquipmentValidator, SubclassValidator,
    SwitchValidator,
};

/// What a step handler did
#[derive(Debug)]
enum StepReply {
    /// The step does not apply to this character (no subraces, no pending choices, ...)
    NotApplicable,
    Applied {
        warnings: Vec<String>,
        /// Body of `GET /validate`, only for the `validate` step
        report: Option<ValidationPayload>,
    },
}

impl StepReply {
    fn applied() -> Self {
        StepReply::Applied {
            warnings: Vec::new(),
            report: None,
        }
    }
}

pub struct FlowExecutor {
    api: SubjectApi,
    snapshots: SnapshotService,
    resolver: ChoiceResolver,
    catalog: Arc<Catalog>,
    config: HarnessConfig,
    switch_validator: SwitchValidator,
    equipment_validator: EquipmentValidator,
    subclass_validator: SubclassValidator,
    completion_validator: CompletionValidator,
}

impl std::fmt::Debug for FlowExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FlowExecutor {
    pub fn new(client: Arc<dyn SubjectClient>, catalog: Arc<Catalog>, config: HarnessConfig) -> Self {
        let api = SubjectApi::new(client);
        Self {
            snapshots: SnapshotService::new(api.clone()),
            resolver: ChoiceResolver::new(api.clone(), config.max_resolve_passes),
            switch_validator: SwitchValidator::new(),
            equipment_validator: EquipmentValidator::new(catalog.clone()),
            subclass_validator: SubclassValidator::new(catalog.clone(), config.clone()),
            completion_validator: CompletionValidator::new(),
            api,
            catalog,
            config,
        }
    }

    /// Load the catalog from the subject, then build an executor over it.
    pub async fn connect(client: Arc<dyn SubjectClient>, config: HarnessConfig) -> CoreResult<Self> {
        let catalog = SubjectApi::new(client.clone()).catalog().await?;
        if catalog.is_empty() {
            return Err(CoreError::CatalogError(
                "subject returned an empty catalog".to_string(),
            ));
        }
        info!(
            races = catalog.races.len(),
            classes = catalog.classes.len(),
            backgrounds = catalog.backgrounds.len(),
            "Loaded catalog"
        );
        Ok(Self::new(client, Arc::new(catalog), config))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Execute `flow` with a fresh context. Never fails: errors end up in the result.
    #[instrument(skip(self, flow, randomizer), fields(seed = randomizer.seed()))]
    pub async fn execute(&self, flow: &[FlowStep], randomizer: &mut Randomizer, iteration: u32) -> FlowResult {
        let mut result = FlowResult::new(iteration, randomizer.seed());
        let mut ctx = ExecutionContext::new();

        for (index, step) in flow.iter().enumerate() {
            if let Err(err) = self
                .run_step(index, step, randomizer, &mut ctx, &mut result)
                .await
            {
                match &err {
                    CoreError::Boundary(boundary) if boundary.kind == BoundaryErrorKind::Rejected => {
                        error!(
                            step = index,
                            action = %step.action,
                            status = boundary.status,
                            error = %boundary,
                            "Subject rejected step, aborting flow"
                        );
                        result.add_step(StepRecord {
                            index,
                            action: step.action,
                            description: step.description.clone(),
                            outcome: StepOutcome::HttpError,
                            warnings: Vec::new(),
                            status_code: Some(boundary.status),
                        });
                    }
                    other => {
                        error!(
                            step = index,
                            action = %step.action,
                            subject_id = ?ctx.subject_id,
                            error = %other,
                            "Wizard flow step failed"
                        );
                    }
                }
                result.abort(FlowErrorRecord::from_error(index, step, &err));
                break;
            }
        }

        result.finish(randomizer.call_count());
        info!(
            iteration,
            status = %result.status(),
            steps = result.steps().len(),
            failures = result.failures().len(),
            randomizer_calls = result.randomizer_calls(),
            "Flow finished"
        );
        result
    }

    async fn run_step(
        &self,
        index: usize,
        step: &FlowStep,
        randomizer: &mut Randomizer,
        ctx: &mut ExecutionContext,
        result: &mut FlowResult,
    ) -> CoreResult<()> {
        let before = match ctx.subject_id {
            Some(id) if step.needs_before_snapshot() => Some(self.snapshots.capture(id).await?),
            _ => None,
        };

        let reply = self.dispatch(step, randomizer, ctx, result).await?;
        let record = |outcome, warnings| StepRecord {
            index,
            action: step.action,
            description: step.description.clone(),
            outcome,
            warnings,
            status_code: None,
        };

        let (mut warnings, report) = match reply {
            StepReply::NotApplicable => {
                debug!(step = index, action = %step.action, "Step not applicable, skipped");
                result.add_step(record(StepOutcome::Skipped, Vec::new()));
                return Ok(());
            }
            StepReply::Applied { warnings, report } => (warnings, report),
        };

        let subject_id = require_subject(ctx)?;
        let after = self.snapshots.capture(subject_id).await?;

        let Some(validation) = self.validate_step(step, before.as_ref(), &after, ctx, report.as_ref()) else {
            result.add_step(record(StepOutcome::Ok, warnings));
            return Ok(());
        };

        warnings.extend(validation.warnings.iter().cloned());
        if validation.passed {
            result.add_step(record(StepOutcome::Ok, warnings));
            return Ok(());
        }

        warn!(
            step = index,
            action = %step.action,
            pattern = validation.pattern.as_deref().unwrap_or("unknown"),
            errors = ?validation.errors,
            "Validation failed"
        );
        result.add_step(record(StepOutcome::Fail, warnings));
        let changes = before
            .as_ref()
            .map(|b| StateSnapshot::diff(b, &after))
            .unwrap_or_default();
        result.add_failure(FailureRecord {
            step_index: index,
            action: step.action,
            description: step.description.clone(),
            validation,
            before,
            after,
            changes,
        });
        Ok(())
    }

    async fn dispatch(
        &self,
        step: &FlowStep,
        randomizer: &mut Randomizer,
        ctx: &mut ExecutionContext,
        result: &mut FlowResult,
    ) -> CoreResult<StepReply> {
        match step.action {
            StepAction::Create => self.create(randomizer, ctx, result).await,
            StepAction::SetRace => self.set_race(step, randomizer, ctx).await,
            StepAction::SetSubrace => self.set_subrace(randomizer, ctx).await,
            StepAction::SetClass => self.set_class(step, randomizer, ctx).await,
            StepAction::SetSubclass => self.set_subclass(step, randomizer, ctx).await,
            StepAction::SetBackground => self.set_background(randomizer, ctx).await,
            StepAction::SetAbilityScores => self.set_ability_scores(randomizer, ctx).await,
            StepAction::ResolveProficiencyChoices => {
                self.resolve(ChoiceType::Proficiency, randomizer, ctx).await
            }
            StepAction::ResolveLanguageChoices => {
                self.resolve(ChoiceType::Language, randomizer, ctx).await
            }
            StepAction::SetEquipmentMode => self.set_equipment_mode(step, randomizer, ctx).await,
            StepAction::ResolveEquipmentChoices => {
                self.resolve(ChoiceType::Equipment, randomizer, ctx).await
            }
            StepAction::ResolveSpellChoices => self.resolve(ChoiceType::Spell, randomizer, ctx).await,
            StepAction::SetDetails => self.set_details(randomizer, ctx).await,
            StepAction::Validate => self.validate_character(randomizer, ctx).await,
            StepAction::SwitchRace => self.switch_race(randomizer, ctx).await,
            StepAction::SwitchBackground => self.switch_background(randomizer, ctx).await,
            StepAction::SwitchClass => self.switch_class(step, randomizer, ctx).await,
        }
    }

    async fn create(
        &self,
        randomizer: &mut Randomizer,
        ctx: &mut ExecutionContext,
        result: &mut FlowResult,
    ) -> CoreResult<StepReply> {
        let public_id = randomizer.generate_public_id();
        let name = randomizer.random_name();
        let created = self.api.create_character(&public_id, &name).await?;
        info!(subject_id = created.id, public_id = %created.public_id, "Created character");
        ctx.subject_id = Some(created.id);
        ctx.public_id = Some(created.public_id.clone());
        result.set_subject(created.id, created.public_id);
        Ok(StepReply::applied())
    }

    async fn set_race(
        &self,
        step: &FlowStep,
        randomizer: &mut Randomizer,
        ctx: &mut ExecutionContext,
    ) -> CoreResult<StepReply> {
        let id = require_subject(ctx)?;
        let race = match &step.force_race {
            Some(slug) => self.catalog.require_race(slug)?,
            None => randomizer
                .choose(&self.catalog.races)
                .ok_or_else(|| CoreError::CatalogError("no races available".to_string()))?,
        };
        ctx.race = Some(race.slug.clone());
        ctx.subrace = None;
        self.api
            .update_character(id, json!({ "race_slug": race.slug }))
            .await?;
        Ok(StepReply::applied())
    }

    async fn set_subrace(&self, randomizer: &mut Randomizer, ctx: &mut ExecutionContext) -> CoreResult<StepReply> {
        let id = require_subject(ctx)?;
        let Some(race) = ctx.race.as_deref().and_then(|slug| self.catalog.race(slug)) else {
            return Ok(StepReply::NotApplicable);
        };
        let Some(subrace) = randomizer.choose(&race.subraces) else {
            return Ok(StepReply::NotApplicable);
        };
        ctx.subrace = Some(subrace.slug.clone());
        self.api
            .update_character(id, json!({ "race_slug": subrace.slug }))
            .await?;
        Ok(StepReply::applied())
    }

    async fn set_class(
        &self,
        step: &FlowStep,
        randomizer: &mut Randomizer,
        ctx: &mut ExecutionContext,
    ) -> CoreResult<StepReply> {
        let id = require_subject(ctx)?;
        let class = match &step.force_class {
            Some(slug) => self.catalog.require_class(slug)?,
            None => {
                let candidates = self.catalog.classes_matching(step.class_type_to, None);
                *randomizer
                    .choose(&candidates)
                    .ok_or_else(|| CoreError::CatalogError("no classes available".to_string()))?
            }
        };
        ctx.class = Some(class.slug.clone());
        ctx.subclass = None;

        let current = self.api.character(id).await?;
        match current.primary_class() {
            Some(existing) => {
                self.api
                    .replace_class(id, &existing.class.slug, &class.slug)
                    .await?
            }
            None => self.api.add_class(id, &class.slug).await?,
        };
        Ok(StepReply::applied())
    }

    async fn set_subclass(
        &self,
        step: &FlowStep,
        randomizer: &mut Randomizer,
        ctx: &mut ExecutionContext,
    ) -> CoreResult<StepReply> {
        let id = require_subject(ctx)?;
        let Some(class_slug) = ctx.class.clone() else {
            return Ok(StepReply::NotApplicable);
        };

        let subclass_slug = match &step.force_subclass {
            Some(slug) => slug.clone(),
            None => {
                let Some(class) = self.catalog.class(&class_slug) else {
                    return Ok(StepReply::NotApplicable);
                };
                if !class.selects_subclass_at_creation() {
                    return Ok(StepReply::NotApplicable);
                }
                match randomizer.choose(&class.subclasses) {
                    Some(subclass) => subclass.slug.clone(),
                    None => return Ok(StepReply::NotApplicable),
                }
            }
        };

        ctx.subclass = Some(subclass_slug.clone());
        self.api.set_subclass(id, &class_slug, &subclass_slug).await?;
        Ok(StepReply::applied())
    }

    async fn set_background(&self, randomizer: &mut Randomizer, ctx: &mut ExecutionContext) -> CoreResult<StepReply> {
        let id = require_subject(ctx)?;
        let background = randomizer
            .choose(&self.catalog.backgrounds)
            .ok_or_else(|| CoreError::CatalogError("no backgrounds available".to_string()))?;
        ctx.background = Some(background.slug.clone());
        self.api
            .update_character(id, json!({ "background_slug": background.slug }))
            .await?;
        Ok(StepReply::applied())
    }

    async fn set_ability_scores(&self, randomizer: &mut Randomizer, ctx: &mut ExecutionContext) -> CoreResult<StepReply> {
        let id = require_subject(ctx)?;
        let scores = randomizer.random_ability_scores();
        let mut body: Map<String, Value> = scores
            .scores
            .into_iter()
            .map(|(ability, value)| (ability, json!(value)))
            .collect();
        body.insert("ability_score_method".to_string(), json!(scores.method));
        self.api.update_character(id, Value::Object(body)).await?;
        Ok(StepReply::applied())
    }

    async fn resolve(
        &self,
        choice_type: ChoiceType,
        randomizer: &mut Randomizer,
        ctx: &mut ExecutionContext,
    ) -> CoreResult<StepReply> {
        let id = require_subject(ctx)?;
        match self.resolver.resolve(id, &choice_type, randomizer, ctx).await? {
            Some(_) => Ok(StepReply::applied()),
            None => Ok(StepReply::NotApplicable),
        }
    }

    async fn set_equipment_mode(
        &self,
        step: &FlowStep,
        randomizer: &mut Randomizer,
        ctx: &mut ExecutionContext,
    ) -> CoreResult<StepReply> {
        let id = require_subject(ctx)?;
        let mode = match step.force_equipment_mode {
            Some(mode) => mode,
            None => randomizer.random_equipment_mode(),
        };

        let pending = self.api.pending_choices(id).await?;
        let Some(choice) = pending
            .iter()
            .find(|c| c.choice_type == ChoiceType::EquipmentMode)
        else {
            return Ok(StepReply::NotApplicable);
        };

        ctx.previous_equipment_mode = ctx.equipment_mode;
        ctx.equipment_mode = Some(mode);
        ctx.equipment_selections.clear();
        debug!(previous = ?ctx.previous_equipment_mode, mode = %mode, "Setting equipment mode");

        self.api
            .submit_choice(id, &choice.id, &[mode.as_str().to_string()], None)
            .await?;
        Ok(StepReply::applied())
    }

    async fn set_details(&self, randomizer: &mut Randomizer, ctx: &mut ExecutionContext) -> CoreResult<StepReply> {
        let id = require_subject(ctx)?;
        let name = randomizer.random_name();
        let alignment = randomizer.random_alignment();
        self.api
            .update_character(id, json!({ "name": name, "alignment": alignment }))
            .await?;
        Ok(StepReply::applied())
    }

    async fn validate_character(
        &self,
        randomizer: &mut Randomizer,
        ctx: &mut ExecutionContext,
    ) -> CoreResult<StepReply> {
        let id = require_subject(ctx)?;
        let sweep = self.resolver.resolve_all_required(id, randomizer, ctx).await?;
        let mut warnings = Vec::new();
        if sweep.exhausted {
            warnings.push(format!(
                "Required choices still pending after {} resolution passes",
                sweep.passes
            ));
        }
        let report = self.api.validate(id).await?;
        Ok(StepReply::Applied {
            warnings,
            report: Some(report),
        })
    }

    async fn switch_race(&self, randomizer: &mut Randomizer, ctx: &mut ExecutionContext) -> CoreResult<StepReply> {
        let id = require_subject(ctx)?;
        let slugs = self.catalog.race_slugs();
        let next = randomizer
            .choose_other(&slugs, ctx.race.as_ref())
            .cloned()
            .ok_or_else(|| CoreError::CatalogError("No alternative races available".to_string()))?;
        ctx.race = Some(next.clone());
        ctx.subrace = None;
        self.api
            .update_character(id, json!({ "race_slug": next }))
            .await?;
        Ok(StepReply::applied())
    }

    async fn switch_background(&self, randomizer: &mut Randomizer, ctx: &mut ExecutionContext) -> CoreResult<StepReply> {
        let id = require_subject(ctx)?;
        let slugs: Vec<String> = self.catalog.backgrounds.iter().map(|b| b.slug.clone()).collect();
        let next = randomizer
            .choose_other(&slugs, ctx.background.as_ref())
            .cloned()
            .ok_or_else(|| {
                CoreError::CatalogError("No alternative backgrounds available".to_string())
            })?;
        ctx.background = Some(next.clone());
        self.api
            .update_character(id, json!({ "background_slug": next }))
            .await?;
        Ok(StepReply::applied())
    }

    async fn switch_class(
        &self,
        step: &FlowStep,
        randomizer: &mut Randomizer,
        ctx: &mut ExecutionContext,
    ) -> CoreResult<StepReply> {
        let id = require_subject(ctx)?;
        let Some(current) = ctx.class.clone() else {
            return Err(CoreError::FlowExecutionError(
                "switch_class before any class was set".to_string(),
            ));
        };
        let candidates = self
            .catalog
            .classes_matching(step.class_type_to, Some(&current));
        let next = randomizer
            .choose(&candidates)
            .map(|c| c.slug.clone())
            .ok_or_else(|| {
                CoreError::CatalogError(
                    "No alternative classes available matching criteria".to_string(),
                )
            })?;

        ctx.class = Some(next.clone());
        ctx.subclass = None;
        ctx.equipment_selections.clear();
        self.api.replace_class(id, &current, &next).await?;
        Ok(StepReply::applied())
    }

    /// Validators that apply to `step`; `None` when nothing checks this step.
    fn validate_step(
        &self,
        step: &FlowStep,
        before: Option<&StateSnapshot>,
        after: &StateSnapshot,
        ctx: &ExecutionContext,
        report: Option<&ValidationPayload>,
    ) -> Option<ValidationResult> {
        let no_selections = BTreeMap::new();
        match step.action {
            StepAction::SwitchRace | StepAction::SwitchBackground | StepAction::SwitchClass => {
                let before = before?;
                let mut result =
                    self.switch_validator
                        .validate(step.action, before, after, ctx.equipment_mode);
                if step.equipment_mode_test {
                    match ctx.equipment_mode {
                        Some(EquipmentMode::Gold) => {
                            result = result.merge(self.equipment_validator.validate_equipment_state(
                                after,
                                EquipmentExpectation {
                                    mode: EquipmentMode::Gold,
                                    selections: &no_selections,
                                    class_slug: ctx.class.as_deref(),
                                    background_slug: ctx.background.as_deref(),
                                    all_choices_resolved: false,
                                },
                            ));
                        }
                        Some(EquipmentMode::Equipment) if step.action == StepAction::SwitchClass => {
                            result = result.merge(
                                self.equipment_validator.validate_equipment_choices_available(
                                    &after.raw.pending_choices,
                                    ctx.class.as_deref(),
                                ),
                            );
                        }
                        _ => {}
                    }
                }
                Some(result)
            }
            StepAction::SetEquipmentMode => {
                let mode = ctx.equipment_mode?;
                if let (true, Some(previous), Some(before)) =
                    (ctx.equipment_mode_changed(), ctx.previous_equipment_mode, before)
                {
                    let switch = self
                        .equipment_validator
                        .validate_mode_switch(before, after, previous, mode);
                    if !switch.passed {
                        return Some(switch);
                    }
                }
                Some(match mode {
                    EquipmentMode::Equipment => self
                        .equipment_validator
                        .validate_equipment_choices_available(
                            &after.raw.pending_choices,
                            ctx.class.as_deref(),
                        ),
                    EquipmentMode::Gold => self.equipment_validator.validate_equipment_state(
                        after,
                        EquipmentExpectation {
                            mode,
                            selections: &no_selections,
                            class_slug: ctx.class.as_deref(),
                            background_slug: ctx.background.as_deref(),
                            all_choices_resolved: false,
                        },
                    ),
                })
            }
            StepAction::ResolveEquipmentChoices => {
                let all_choices_resolved = !after
                    .raw
                    .pending_choices
                    .iter()
                    .any(|c| c.choice_type == ChoiceType::Equipment && c.is_open());
                Some(self.equipment_validator.validate_equipment_state(
                    after,
                    EquipmentExpectation {
                        mode: ctx.equipment_mode.unwrap_or(EquipmentMode::Equipment),
                        selections: &ctx.equipment_selections,
                        class_slug: ctx.class.as_deref(),
                        background_slug: ctx.background.as_deref(),
                        all_choices_resolved,
                    },
                ))
            }
            StepAction::SetSubclass => {
                let subclass = ctx.subclass.as_deref()?;
                Some(
                    self.subclass_validator
                        .validate(after, subclass, self.config.subclass_level),
                )
            }
            StepAction::Validate => Some(self.completion_validator.validate(after, report)),
            StepAction::Create
            | StepAction::SetRace
            | StepAction::SetSubrace
            | StepAction::SetClass
            | StepAction::SetBackground
            | StepAction::SetAbilityScores
            | StepAction::ResolveProficiencyChoices
            | StepAction::ResolveLanguageChoices
            | StepAction::ResolveSpellChoices
            | StepAction::SetDetails => None,
        }
    }
}

fn require_subject(ctx: &ExecutionContext) -> CoreResult<u64> {
    ctx.subject_id.ok_or_else(|| {
        CoreError::FlowExecutionError("no character created yet; flows must start with create".to_string())
    })
}
