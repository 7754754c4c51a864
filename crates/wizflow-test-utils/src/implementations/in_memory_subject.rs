//! In-memory implementation of the SubjectClient trait.
//!
//! Serves the character-creation wizard over the fixture [`World`], answering the
//! same routes and response shapes as the real subject. Enabled [`Fault`]s turn
//! individual behaviors into the defects the harness is meant to catch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

use wizflow_core::domain::payload::LeafOption;
use wizflow_core::{Catalog, CoreResult, Method, SubjectClient, SubjectRequest, SubjectResponse};

use super::character_sheet::{CharacterSheet, Rejection, SheetResult};
use crate::data_generators::world::{World, ABILITIES};
use crate::faults::{Fault, FaultSet};

const MIN_ABILITY_SCORE: i64 = 3;
const MAX_ABILITY_SCORE: i64 = 20;

impl From<serde_json::Error> for Rejection {
    fn from(err: serde_json::Error) -> Self {
        Self {
            status: 500,
            message: format!("Failed to encode response: {}", err),
            errors: json!({}),
        }
    }
}

#[derive(Debug, Default)]
struct SubjectState {
    next_id: u64,
    characters: BTreeMap<u64, CharacterSheet>,
    requests: Vec<SubjectRequest>,
}

#[derive(Debug, Deserialize)]
struct NewCharacter {
    public_id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClassRequest {
    class_slug: String,
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Deserialize)]
struct SubclassRequest {
    subclass_slug: String,
}

#[derive(Debug, Deserialize)]
struct ChoiceSubmission {
    #[serde(default)]
    selected: Vec<String>,
    #[serde(default)]
    item_selections: BTreeMap<String, Vec<String>>,
}

fn data<T: Serialize>(value: T) -> SheetResult<SubjectResponse> {
    Ok(SubjectResponse::ok(json!({ "data": serde_json::to_value(value)? })))
}

fn decode_body<T: for<'de> Deserialize<'de>>(body: &Value) -> SheetResult<T> {
    serde_json::from_value(body.clone())
        .map_err(|err| Rejection::invalid("body", format!("Malformed request body: {}", err)))
}

/// Path segments with the query string dropped
fn segments(path: &str) -> Vec<&str> {
    let path = path.split('?').next().unwrap_or_default();
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Thread-safe in-memory subject for tests and local runs.
#[derive(Clone)]
pub struct InMemorySubject {
    world: World,
    faults: FaultSet,
    state: Arc<Mutex<SubjectState>>,
}

impl fmt::Debug for InMemorySubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("InMemorySubject")
            .field("faults", &self.faults)
            .field("character_count", &state.characters.len())
            .field("request_count", &state.requests.len())
            .finish()
    }
}

impl Default for InMemorySubject {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySubject {
    /// A correct subject over the standard world.
    pub fn new() -> Self {
        Self::with_world(World::standard())
    }

    pub fn with_world(world: World) -> Self {
        Self {
            world,
            faults: FaultSet::none(),
            state: Arc::new(Mutex::new(SubjectState {
                next_id: 1,
                ..SubjectState::default()
            })),
        }
    }

    /// Enable `faults` on this subject.
    pub fn with_faults(mut self, faults: FaultSet) -> Self {
        self.faults = faults;
        self
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn faults(&self) -> &FaultSet {
        &self.faults
    }

    pub fn catalog(&self) -> Catalog {
        self.world.catalog()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Every request received, in arrival order.
    pub fn requests(&self) -> Vec<SubjectRequest> {
        self.lock().requests.clone()
    }

    pub fn character_count(&self) -> usize {
        self.lock().characters.len()
    }

    fn lock(&self) -> MutexGuard<'_, SubjectState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn route(&self, state: &mut SubjectState, request: &SubjectRequest) -> SheetResult<SubjectResponse> {
        let parts = segments(&request.path);
        match (request.method, parts.as_slice()) {
            (Method::Get, ["races"]) => data(self.world.race_entries()),
            (Method::Get, ["classes"]) => data(self.catalog().classes),
            (Method::Get, ["backgrounds"]) => data(self.catalog().backgrounds),
            (Method::Get, ["classes", slug, "spells"]) => self.class_spells(slug),
            (Method::Post, ["characters"]) => self.create_character(state, &request.body),
            (method, ["characters", id, rest @ ..]) => {
                let id: u64 = id
                    .parse()
                    .map_err(|_| Rejection::not_found(format!("Character {} not found", id)))?;
                let sheet = state
                    .characters
                    .get_mut(&id)
                    .ok_or_else(|| Rejection::not_found(format!("Character {} not found", id)))?;
                self.character_route(sheet, method, rest, &request.body)
            }
            _ => Err(Rejection::not_found(format!(
                "No route for {} {}",
                request.method, request.path
            ))),
        }
    }

    fn character_route(
        &self,
        sheet: &mut CharacterSheet,
        method: Method,
        rest: &[&str],
        body: &Value,
    ) -> SheetResult<SubjectResponse> {
        let world = &self.world;
        let faults = &self.faults;
        match (method, rest) {
            (Method::Get, []) => data(sheet.payload(world, faults)),
            (Method::Patch, []) => {
                self.update_character(sheet, body)?;
                data(sheet.payload(world, faults))
            }
            (Method::Get, ["stats"]) => data(sheet.stats()),
            (Method::Get, ["spells"]) => data(sheet.spells(world)),
            (Method::Get, ["features"]) => data(sheet.features(world, faults)),
            (Method::Get, ["languages"]) => data(sheet.languages(world)),
            (Method::Get, ["proficiencies"]) => data(sheet.proficiencies(world)),
            (Method::Get, ["equipment"]) => data(sheet.equipment(faults)),
            (Method::Get, ["validate"]) => data(sheet.validation(world, faults)),
            (Method::Get, ["pending-choices"]) => self.pending_choices(sheet),
            (Method::Post, ["classes"]) => {
                let request: ClassRequest = decode_body(body)?;
                if sheet.class_slug().is_some() && !request.force {
                    return Err(Rejection::conflict("Character already has a class"));
                }
                let class = world.class(&request.class_slug).ok_or_else(|| {
                    Rejection::invalid("class_slug", "The selected class slug is invalid.")
                })?;
                sheet.set_class(class, faults);
                data(sheet.payload(world, faults))
            }
            (Method::Put, ["classes", current]) => {
                if sheet.class_slug() != Some(*current) {
                    return Err(Rejection::not_found(format!(
                        "Class {} not found on character",
                        current
                    )));
                }
                let request: ClassRequest = decode_body(body)?;
                let class = world.class(&request.class_slug).ok_or_else(|| {
                    Rejection::invalid("class_slug", "The selected class slug is invalid.")
                })?;
                sheet.set_class(class, faults);
                data(sheet.payload(world, faults))
            }
            (Method::Put, ["classes", class_slug, "subclass"]) => {
                let request: SubclassRequest = decode_body(body)?;
                sheet.set_subclass(class_slug, &request.subclass_slug)?;
                data(sheet.payload(world, faults))
            }
            (Method::Post, ["choices", choice_id]) => {
                let submission: ChoiceSubmission = decode_body(body)?;
                sheet.submit_choice(
                    world,
                    choice_id,
                    submission.selected.clone(),
                    submission.item_selections,
                    faults,
                )?;
                data(json!({ "id": choice_id, "selected": submission.selected }))
            }
            _ => Err(Rejection::not_found(format!(
                "No route for {} /characters/{}/{}",
                method,
                sheet.id,
                rest.join("/")
            ))),
        }
    }

    fn class_spells(&self, slug: &str) -> SheetResult<SubjectResponse> {
        let class = self
            .world
            .class(slug)
            .ok_or_else(|| Rejection::not_found(format!("Class {} not found", slug)))?;
        let options: Vec<LeafOption> = class
            .cantrip_options
            .iter()
            .map(|s| LeafOption::new(*s))
            .collect();
        data(options)
    }

    fn create_character(&self, state: &mut SubjectState, body: &Value) -> SheetResult<SubjectResponse> {
        let request: NewCharacter = decode_body(body)?;
        if state
            .characters
            .values()
            .any(|c| c.public_id == request.public_id)
        {
            return Err(Rejection::invalid("public_id", "The public id has already been taken."));
        }
        let id = state.next_id;
        state.next_id += 1;
        state.characters.insert(
            id,
            CharacterSheet::new(id, request.public_id.clone(), request.name),
        );
        debug!(id, public_id = %request.public_id, "Created character");
        Ok(SubjectResponse::created(json!({
            "data": { "id": id, "public_id": request.public_id }
        })))
    }

    fn update_character(&self, sheet: &mut CharacterSheet, body: &Value) -> SheetResult<()> {
        let fields = body
            .as_object()
            .ok_or_else(|| Rejection::invalid("body", "Expected a JSON object."))?;

        let race = match fields.get("race_slug").and_then(Value::as_str) {
            Some(slug) => Some(self.world.race(slug).ok_or_else(|| {
                Rejection::invalid("race_slug", "The selected race slug is invalid.")
            })?),
            None => None,
        };
        let background = match fields.get("background_slug").and_then(Value::as_str) {
            Some(_) if self.faults.has(Fault::RejectBackgroundPatch) => {
                return Err(Rejection::invalid(
                    "background_slug",
                    "The selected background slug is invalid.",
                ));
            }
            Some(slug) => Some(self.world.background(slug).ok_or_else(|| {
                Rejection::invalid("background_slug", "The selected background slug is invalid.")
            })?),
            None => None,
        };
        let scores = ability_scores(fields)?;

        if let Some(name) = fields.get("name").and_then(Value::as_str) {
            sheet.set_name(name.to_string());
        }
        if let Some(alignment) = fields.get("alignment").and_then(Value::as_str) {
            sheet.set_alignment(alignment.to_string());
        }
        if let Some(race) = race {
            sheet.set_race(&self.world, race, &self.faults);
        }
        if let Some(background) = background {
            sheet.set_background(background, &self.faults);
        }
        if !scores.is_empty() {
            sheet.set_ability_scores(scores);
        }
        Ok(())
    }

    fn pending_choices(&self, sheet: &CharacterSheet) -> SheetResult<SubjectResponse> {
        let mut choices = serde_json::to_value(sheet.pending_choices(&self.world))?;
        if self.faults.has(Fault::MalformedPendingChoices) {
            if let Value::Array(entries) = &mut choices {
                for entry in entries.iter_mut().filter_map(Value::as_object_mut) {
                    entry.remove("required");
                }
            }
        }
        Ok(SubjectResponse::ok(json!({ "data": { "choices": choices } })))
    }
}

/// Ability scores present in a PATCH body, each within 3..=20
fn ability_scores(fields: &Map<String, Value>) -> SheetResult<BTreeMap<String, i32>> {
    let mut scores = BTreeMap::new();
    for ability in ABILITIES {
        let Some(value) = fields.get(ability) else {
            continue;
        };
        match value.as_i64() {
            Some(score) if (MIN_ABILITY_SCORE..=MAX_ABILITY_SCORE).contains(&score) => {
                scores.insert(ability.to_string(), score as i32);
            }
            _ => {
                return Err(Rejection::invalid(
                    ability,
                    format!(
                        "The {} must be between {} and {}.",
                        ability, MIN_ABILITY_SCORE, MAX_ABILITY_SCORE
                    ),
                ));
            }
        }
    }
    Ok(scores)
}

#[async_trait]
impl SubjectClient for InMemorySubject {
    async fn send(&self, request: SubjectRequest) -> CoreResult<SubjectResponse> {
        let mut state = self.lock();
        state.requests.push(request.clone());
        let response = match self.route(&mut state, &request) {
            Ok(response) => response,
            Err(rejection) => {
                debug!(
                    method = %request.method,
                    path = %request.path,
                    status = rejection.status,
                    message = %rejection.message,
                    "Rejected request"
                );
                SubjectResponse::error(rejection.status, rejection.message, rejection.errors)
            }
        };
        trace!(status = response.status, "Served request");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wizflow_core::{CoreError, SubjectApi};

    fn api(subject: &InMemorySubject) -> SubjectApi {
        SubjectApi::new(Arc::new(subject.clone()))
    }

    #[tokio::test]
    async fn serves_the_world_catalog() {
        let subject = InMemorySubject::new();
        let catalog = api(&subject).catalog().await.unwrap();
        assert_eq!(catalog, subject.catalog());
        assert_eq!(subject.request_count(), 3);
    }

    #[tokio::test]
    async fn creates_characters_with_increasing_ids() {
        let subject = InMemorySubject::new();
        let api = api(&subject);
        let first = api.create_character("calm-owl-0001", "Mira").await.unwrap();
        let second = api.create_character("calm-owl-0002", "Tobin").await.unwrap();
        assert_eq!((first.id, second.id), (1, 2));
        assert!(api.create_character("calm-owl-0001", "Again").await.is_err());
        assert_eq!(subject.character_count(), 2);
    }

    #[tokio::test]
    async fn unknown_character_is_not_found() {
        let subject = InMemorySubject::new();
        let response = subject
            .send(SubjectRequest::get("/characters/42/spells"))
            .await
            .unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn query_string_is_ignored_when_routing() {
        let subject = InMemorySubject::new();
        let response = subject
            .send(SubjectRequest::get("/classes?per_page=100"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn out_of_range_ability_score_is_rejected() {
        let subject = InMemorySubject::new();
        let api = api(&subject);
        let created = api.create_character("bold-fox-0001", "Ash").await.unwrap();
        let response = subject
            .send(SubjectRequest::patch(
                format!("/characters/{}", created.id),
                json!({ "strength": 25 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status, 422);
        assert!(response.body["errors"]["strength"].is_array());
    }

    #[tokio::test]
    async fn second_class_needs_force() {
        let subject = InMemorySubject::new();
        let created = api(&subject)
            .create_character("bold-fox-0002", "Ash")
            .await
            .unwrap();
        let path = format!("/characters/{}/classes", created.id);
        let first = subject
            .send(SubjectRequest::post(path.clone(), json!({ "class_slug": "rogue" })))
            .await
            .unwrap();
        assert_eq!(first.status, 200);
        let second = subject
            .send(SubjectRequest::post(path.clone(), json!({ "class_slug": "wizard" })))
            .await
            .unwrap();
        assert_eq!(second.status, 409);

        let replaced = subject
            .send(SubjectRequest::put(
                format!("{}/fighter", path),
                json!({ "class_slug": "wizard" }),
            ))
            .await
            .unwrap();
        assert_eq!(replaced.status, 404);
    }

    #[tokio::test]
    async fn rejected_background_patch_surfaces_field_errors() {
        let subject =
            InMemorySubject::new().with_faults(FaultSet::none().with(Fault::RejectBackgroundPatch));
        let api = api(&subject);
        let created = api.create_character("bold-fox-0003", "Ash").await.unwrap();
        let err = api
            .update_character(created.id, json!({ "background_slug": "sage" }))
            .await
            .unwrap_err();
        match err {
            CoreError::Boundary(boundary) => {
                assert_eq!(boundary.status, 422);
                assert!(boundary.errors["background_slug"].is_array());
            }
            other => panic!("expected a rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_pending_choices_fail_to_decode() {
        let subject =
            InMemorySubject::new().with_faults(FaultSet::none().with(Fault::MalformedPendingChoices));
        let api = api(&subject);
        let created = api.create_character("bold-fox-0004", "Ash").await.unwrap();
        api.add_class(created.id, "fighter").await.unwrap();
        assert!(api.pending_choices(created.id).await.is_err());

        let healthy = InMemorySubject::new();
        let api = SubjectApi::new(Arc::new(healthy));
        let created = api.create_character("bold-fox-0005", "Ash").await.unwrap();
        api.add_class(created.id, "fighter").await.unwrap();
        let choices = api.pending_choices(created.id).await.unwrap();
        assert!(choices.iter().any(|c| c.id == "equipment-mode" && c.required));
    }
}
