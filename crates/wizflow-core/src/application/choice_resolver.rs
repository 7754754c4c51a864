//! Picks values for pending choices.
//!
//! Values already chosen earlier in the same pass are excluded, so two choices
//! never receive the same language or spell.

use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use crate::application::subject::SubjectApi;
use crate::domain::context::{EquipmentMode, ExecutionContext};
use crate::domain::payload::{ChoiceType, EquipmentOption, PendingChoice};
use crate::domain::randomizer::Randomizer;
use crate::error::CoreResult;

/// Result of a `resolve_all_required` sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepOutcome {
    pub passes: u32,
    pub resolved: usize,
    /// Required choices were still pending when the sweep stopped
    pub exhausted: bool,
}

#[derive(Debug, Clone)]
pub struct ChoiceResolver {
    api: SubjectApi,
    max_passes: u32,
}

impl ChoiceResolver {
    pub fn new(api: SubjectApi, max_passes: u32) -> Self {
        Self { api, max_passes }
    }

    /// Resolve every open choice of `choice_type`.
    ///
    /// `None` when there was nothing of that type to resolve.
    pub async fn resolve(
        &self,
        subject_id: u64,
        choice_type: &ChoiceType,
        randomizer: &mut Randomizer,
        ctx: &mut ExecutionContext,
    ) -> CoreResult<Option<Value>> {
        let choices: Vec<PendingChoice> = self
            .api
            .pending_choices(subject_id)
            .await?
            .into_iter()
            .filter(|c| &c.choice_type == choice_type && c.is_open())
            .collect();

        if choices.is_empty() {
            return Ok(None);
        }

        let mut already_selected = HashSet::new();
        let mut last_response = None;
        for choice in &choices {
            if let Some(response) = self
                .resolve_choice(subject_id, choice, randomizer, ctx, &mut already_selected)
                .await?
            {
                last_response = Some(response);
            }
        }

        Ok(Some(last_response.unwrap_or_else(
            || json!({ "data": [], "message": "No choices resolved" }),
        )))
    }

    /// Keep resolving required choices until none remain or the pass limit is hit.
    pub async fn resolve_all_required(
        &self,
        subject_id: u64,
        randomizer: &mut Randomizer,
        ctx: &mut ExecutionContext,
    ) -> CoreResult<SweepOutcome> {
        let mut outcome = SweepOutcome {
            passes: 0,
            resolved: 0,
            exhausted: false,
        };

        while outcome.passes < self.max_passes {
            let required: Vec<PendingChoice> = self
                .api
                .pending_choices(subject_id)
                .await?
                .into_iter()
                .filter(|c| c.required && c.is_open())
                .collect();
            if required.is_empty() {
                return Ok(outcome);
            }

            outcome.passes += 1;
            let mut already_selected = HashSet::new();
            let mut resolved_this_pass = 0;
            for choice in &required {
                if self
                    .resolve_choice(subject_id, choice, randomizer, ctx, &mut already_selected)
                    .await?
                    .is_some()
                {
                    resolved_this_pass += 1;
                }
            }
            outcome.resolved += resolved_this_pass;
            debug!(pass = outcome.passes, resolved = resolved_this_pass, "Required choice sweep pass");

            if resolved_this_pass == 0 {
                break;
            }
        }

        let still_pending = self
            .api
            .pending_choices(subject_id)
            .await?
            .iter()
            .any(|c| c.required && c.is_open());
        outcome.exhausted = still_pending;
        if still_pending {
            warn!(subject_id, passes = outcome.passes, "Required choices still pending after sweep");
        }
        Ok(outcome)
    }

    /// Submit a selection for one choice; `None` when nothing could be selected.
    async fn resolve_choice(
        &self,
        subject_id: u64,
        choice: &PendingChoice,
        randomizer: &mut Randomizer,
        ctx: &mut ExecutionContext,
        already_selected: &mut HashSet<String>,
    ) -> CoreResult<Option<Value>> {
        if choice.choice_type == ChoiceType::Equipment {
            return self
                .resolve_equipment_choice(subject_id, choice, randomizer, ctx)
                .await;
        }

        let mut slugs: Vec<String> = choice
            .options
            .iter()
            .filter_map(|o| o.as_leaf().map(|leaf| leaf.slug.clone()))
            .collect();
        if slugs.is_empty() {
            if let Some(endpoint) = &choice.options_endpoint {
                slugs = self
                    .api
                    .options(endpoint)
                    .await?
                    .into_iter()
                    .map(|o| o.slug)
                    .collect();
            }
        }
        slugs.retain(|s| !s.is_empty() && !already_selected.contains(s));
        if slugs.is_empty() {
            debug!(choice_id = %choice.id, choice_type = %choice.choice_type, "No selectable options");
            return Ok(None);
        }

        let count = choice.selection_count().min(slugs.len());
        let selected = randomizer.pick_random(&slugs, count);
        already_selected.extend(selected.iter().cloned());

        if choice.choice_type == ChoiceType::EquipmentMode {
            if let Some(mode) = selected.first().and_then(|m| m.parse::<EquipmentMode>().ok()) {
                ctx.previous_equipment_mode = ctx.equipment_mode;
                ctx.equipment_mode = Some(mode);
                ctx.equipment_selections.clear();
            }
        }

        let response = self
            .api
            .submit_choice(subject_id, &choice.id, &selected, None)
            .await?;
        Ok(Some(response))
    }

    async fn resolve_equipment_choice(
        &self,
        subject_id: u64,
        choice: &PendingChoice,
        randomizer: &mut Randomizer,
        ctx: &mut ExecutionContext,
    ) -> CoreResult<Option<Value>> {
        let valid: Vec<&EquipmentOption> = choice
            .options
            .iter()
            .filter_map(|o| o.as_equipment())
            .filter(|o| o.is_valid())
            .collect();
        let Some(option) = randomizer.pick_random(&valid, 1).into_iter().next() else {
            debug!(choice_id = %choice.id, "Equipment choice has no valid options");
            return Ok(None);
        };

        let mut expected = Vec::new();
        let mut item_selections = None;
        if option.is_category {
            let selectable: Vec<String> = option.selectable_items().map(|i| i.slug.clone()).collect();
            let picked = randomizer.pick_random(&selectable, 1);
            expected.extend(picked.iter().cloned());
            expected.extend(
                option
                    .items
                    .iter()
                    .filter(|i| i.is_fixed && !i.is_pack)
                    .map(|i| i.slug.clone()),
            );
            let mut selections = BTreeMap::new();
            selections.insert(option.option.clone(), picked);
            item_selections = Some(selections);
        } else {
            for item in &option.items {
                if item.is_pack {
                    expected.extend(item.contents.iter().map(|c| c.slug.clone()));
                } else {
                    expected.push(item.slug.clone());
                }
            }
        }

        ctx.equipment_selections
            .insert(choice.choice_group().to_string(), expected);

        let response = self
            .api
            .submit_choice(
                subject_id,
                &choice.id,
                &[option.option.clone()],
                item_selections.as_ref(),
            )
            .await?;
        Ok(Some(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockSubjectClient;
    use crate::types::{Method, SubjectRequest, SubjectResponse};
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    type Posted = Arc<Mutex<Vec<(String, Value)>>>;

    /// Serves `pending` from pending-choices and `options` from any other GET;
    /// every POST is recorded and accepted.
    fn subject(pending: Value, options: Value) -> (SubjectApi, Posted) {
        let posted: Posted = Arc::default();
        let sink = Arc::clone(&posted);
        let mut mock = MockSubjectClient::new();
        mock.expect_send().returning(move |request: SubjectRequest| {
            let body = match request.method {
                Method::Get if request.path.ends_with("/pending-choices") => {
                    json!({ "data": { "choices": pending.clone() } })
                }
                Method::Get => json!({ "data": options.clone() }),
                _ => {
                    sink.lock().unwrap().push((request.path.clone(), request.body.clone()));
                    json!({ "data": { "choice": request.path } })
                }
            };
            Ok(SubjectResponse::ok(body))
        });
        (SubjectApi::new(Arc::new(mock)), posted)
    }

    fn language_choice(id: &str) -> Value {
        json!({
            "id": id,
            "type": "language",
            "required": true,
            "remaining": 1,
            "options": [{"slug": "elvish"}, {"slug": "dwarvish"}]
        })
    }

    fn selected(body: &Value) -> Vec<String> {
        serde_json::from_value(body["selected"].clone()).unwrap()
    }

    #[tokio::test]
    async fn sweep_stops_at_the_pass_limit_when_choices_never_clear() {
        let (api, posted) = subject(
            json!([language_choice("race-languages"), language_choice("background-languages")]),
            json!([]),
        );
        let resolver = ChoiceResolver::new(api, 10);

        let outcome = resolver
            .resolve_all_required(1, &mut Randomizer::new(5), &mut ExecutionContext::new())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SweepOutcome {
                passes: 10,
                resolved: 20,
                exhausted: true
            }
        );
        assert_eq!(posted.lock().unwrap().len(), 20);
    }

    #[tokio::test]
    async fn sweep_with_nothing_required_makes_no_passes() {
        let optional = json!([{
            "id": "bonus-language",
            "type": "language",
            "required": false,
            "remaining": 1,
            "options": [{"slug": "elvish"}]
        }]);
        let (api, posted) = subject(optional, json!([]));

        let outcome = ChoiceResolver::new(api, 10)
            .resolve_all_required(1, &mut Randomizer::new(5), &mut ExecutionContext::new())
            .await
            .unwrap();

        assert_eq!(outcome.passes, 0);
        assert!(!outcome.exhausted);
        assert!(posted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn choices_in_one_pass_never_share_a_value() {
        for seed in 1..=8 {
            let (api, posted) = subject(
                json!([language_choice("race-languages"), language_choice("background-languages")]),
                json!([]),
            );
            let resolved = ChoiceResolver::new(api, 10)
                .resolve(1, &ChoiceType::Language, &mut Randomizer::new(seed), &mut ExecutionContext::new())
                .await
                .unwrap();
            assert!(resolved.is_some());

            let posted = posted.lock().unwrap();
            assert_eq!(posted.len(), 2);
            let first = selected(&posted[0].1);
            let second = selected(&posted[1].1);
            assert_eq!(first.len(), 1);
            assert_eq!(second.len(), 1);
            assert_ne!(first, second, "seed {}", seed);
        }
    }

    #[tokio::test]
    async fn other_choice_types_are_left_alone() {
        let (api, posted) = subject(json!([language_choice("race-languages")]), json!([]));
        let resolved = ChoiceResolver::new(api, 10)
            .resolve(1, &ChoiceType::Spell, &mut Randomizer::new(1), &mut ExecutionContext::new())
            .await
            .unwrap();
        assert_eq!(resolved, None);
        assert!(posted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn options_are_fetched_from_the_endpoint_when_not_inlined() {
        let pending = json!([{
            "id": "wizard-cantrips",
            "type": "spell",
            "required": true,
            "remaining": 1,
            "options": [],
            "options_endpoint": "/classes/wizard/spells"
        }]);
        let (api, posted) = subject(pending, json!([{"slug": "fire-bolt", "name": "Fire Bolt"}]));

        ChoiceResolver::new(api, 10)
            .resolve(7, &ChoiceType::Spell, &mut Randomizer::new(3), &mut ExecutionContext::new())
            .await
            .unwrap();

        let posted = posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].0, "/characters/7/choices/wizard-cantrips");
        assert_eq!(selected(&posted[0].1), vec!["fire-bolt".to_string()]);
    }

    #[tokio::test]
    async fn equipment_selections_record_the_items_expected_on_the_sheet() {
        let pending = json!([
            {
                "id": "fighter-equipment-1",
                "type": "equipment",
                "required": true,
                "remaining": 1,
                "metadata": {"choice_group": "fighter-armor"},
                "options": [{
                    "option": "a",
                    "is_category": false,
                    "items": [
                        {"slug": "chain-mail"},
                        {"slug": "explorers-pack", "is_pack": true, "contents": [{"slug": "rope"}, {"slug": "torch"}]}
                    ]
                }]
            },
            {
                "id": "fighter-equipment-2",
                "type": "equipment",
                "required": true,
                "remaining": 1,
                "metadata": {"choice_group": "fighter-weapon"},
                "options": [{
                    "option": "a",
                    "is_category": true,
                    "items": [
                        {"slug": "shield", "is_fixed": true},
                        {"slug": "longsword"},
                        {"slug": "battleaxe"}
                    ]
                }]
            }
        ]);
        let (api, posted) = subject(pending, json!([]));
        let mut ctx = ExecutionContext::new();

        ChoiceResolver::new(api, 10)
            .resolve(1, &ChoiceType::Equipment, &mut Randomizer::new(11), &mut ctx)
            .await
            .unwrap();

        assert_eq!(
            ctx.equipment_selections["fighter-armor"],
            vec!["chain-mail".to_string(), "rope".to_string(), "torch".to_string()]
        );

        let weapon = &ctx.equipment_selections["fighter-weapon"];
        assert_eq!(weapon.len(), 2);
        assert!(weapon[0] == "longsword" || weapon[0] == "battleaxe");
        assert_eq!(weapon[1], "shield");

        let posted = posted.lock().unwrap();
        assert_eq!(posted.len(), 2);
        assert_eq!(selected(&posted[0].1), vec!["a".to_string()]);
        assert!(posted[0].1.get("item_selections").is_none());
        assert_eq!(posted[1].1["item_selections"], json!({ "a": [weapon[0].clone()] }));
    }
}
