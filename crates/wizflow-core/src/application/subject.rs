//! The request interface to the subject system and a typed wrapper around it.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::domain::catalog::{BackgroundEntry, Catalog, ClassEntry, RaceEntry};
use crate::domain::payload::{
    CharacterPayload, CreatedCharacter, Envelope, EquipmentEntry, LeafOption, PendingChoice,
    PendingChoices, SourcedEntry, StatsPayload, ValidationPayload,
};
use crate::error::CoreResult;
use crate::types::{SubjectRequest, SubjectResponse};

/// Black-box request interface of the subject system.
///
/// `Err` means no response was obtained at all; a rejection is an `Ok` response
/// with a status of 400 or above.
#[async_trait]
pub trait SubjectClient: Send + Sync {
    async fn send(&self, request: SubjectRequest) -> CoreResult<SubjectResponse>;
}

/// Typed operations over a [`SubjectClient`]
#[derive(Clone)]
pub struct SubjectApi {
    client: Arc<dyn SubjectClient>,
}

impl std::fmt::Debug for SubjectApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubjectApi").finish_non_exhaustive()
    }
}

impl SubjectApi {
    pub fn new(client: Arc<dyn SubjectClient>) -> Self {
        Self { client }
    }

    async fn call<T: DeserializeOwned>(&self, request: SubjectRequest) -> CoreResult<T> {
        debug!(method = %request.method, path = %request.path, "Dispatching request");
        let response = self.client.send(request.clone()).await?;
        debug!(method = %request.method, path = %request.path, status = response.status, "Received response");
        response.decode(&request)
    }

    async fn data<T: DeserializeOwned>(&self, request: SubjectRequest) -> CoreResult<T> {
        let envelope: Envelope<T> = self.call(request).await?;
        Ok(envelope.data)
    }

    pub async fn create_character(&self, public_id: &str, name: &str) -> CoreResult<CreatedCharacter> {
        self.data(SubjectRequest::post(
            "/characters",
            json!({ "public_id": public_id, "name": name }),
        ))
        .await
    }

    /// `PATCH` top-level fields
    pub async fn update_character(&self, id: u64, fields: Value) -> CoreResult<Value> {
        self.data(SubjectRequest::patch(format!("/characters/{}", id), fields))
            .await
    }

    pub async fn add_class(&self, id: u64, class_slug: &str) -> CoreResult<Value> {
        self.data(SubjectRequest::post(
            format!("/characters/{}/classes", id),
            json!({ "class_slug": class_slug, "force": true }),
        ))
        .await
    }

    pub async fn replace_class(&self, id: u64, current: &str, class_slug: &str) -> CoreResult<Value> {
        self.data(SubjectRequest::put(
            format!("/characters/{}/classes/{}", id, current),
            json!({ "class_slug": class_slug }),
        ))
        .await
    }

    pub async fn set_subclass(&self, id: u64, class_slug: &str, subclass_slug: &str) -> CoreResult<Value> {
        self.data(SubjectRequest::put(
            format!("/characters/{}/classes/{}/subclass", id, class_slug),
            json!({ "subclass_slug": subclass_slug }),
        ))
        .await
    }

    pub async fn submit_choice(
        &self,
        id: u64,
        choice_id: &str,
        selected: &[String],
        item_selections: Option<&BTreeMap<String, Vec<String>>>,
    ) -> CoreResult<Value> {
        let mut body = json!({ "selected": selected });
        if let Some(items) = item_selections {
            body["item_selections"] = json!(items);
        }
        self.data(SubjectRequest::post(
            format!("/characters/{}/choices/{}", id, choice_id),
            body,
        ))
        .await
    }

    pub async fn character(&self, id: u64) -> CoreResult<CharacterPayload> {
        self.data(SubjectRequest::get(format!("/characters/{}", id)))
            .await
    }

    pub async fn stats(&self, id: u64) -> CoreResult<StatsPayload> {
        self.data(SubjectRequest::get(format!("/characters/{}/stats", id)))
            .await
    }

    pub async fn pending_choices(&self, id: u64) -> CoreResult<Vec<PendingChoice>> {
        let pending: PendingChoices = self
            .data(SubjectRequest::get(format!("/characters/{}/pending-choices", id)))
            .await?;
        Ok(pending.choices)
    }

    pub async fn spells(&self, id: u64) -> CoreResult<Vec<SourcedEntry>> {
        self.data(SubjectRequest::get(format!("/characters/{}/spells", id)))
            .await
    }

    pub async fn equipment(&self, id: u64) -> CoreResult<Vec<EquipmentEntry>> {
        self.data(SubjectRequest::get(format!("/characters/{}/equipment", id)))
            .await
    }

    pub async fn languages(&self, id: u64) -> CoreResult<Vec<SourcedEntry>> {
        self.data(SubjectRequest::get(format!("/characters/{}/languages", id)))
            .await
    }

    pub async fn proficiencies(&self, id: u64) -> CoreResult<Vec<SourcedEntry>> {
        self.data(SubjectRequest::get(format!("/characters/{}/proficiencies", id)))
            .await
    }

    pub async fn features(&self, id: u64) -> CoreResult<Vec<SourcedEntry>> {
        self.data(SubjectRequest::get(format!("/characters/{}/features", id)))
            .await
    }

    pub async fn validate(&self, id: u64) -> CoreResult<ValidationPayload> {
        self.data(SubjectRequest::get(format!("/characters/{}/validate", id)))
            .await
    }

    /// Options behind a choice's `options_endpoint`
    pub async fn options(&self, endpoint: &str) -> CoreResult<Vec<LeafOption>> {
        self.data(SubjectRequest::get(endpoint)).await
    }

    pub async fn catalog(&self) -> CoreResult<Catalog> {
        let races: Vec<RaceEntry> = self.data(SubjectRequest::get("/races")).await?;
        let classes: Vec<ClassEntry> = self.data(SubjectRequest::get("/classes")).await?;
        let backgrounds: Vec<BackgroundEntry> =
            self.data(SubjectRequest::get("/backgrounds")).await?;
        Ok(Catalog {
            races,
            classes,
            backgrounds,
        })
    }
}
