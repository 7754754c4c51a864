//! One character held by the in-memory subject.
//!
//! Only the selections are stored. Every read view (spells, features, equipment,
//! pending choices, completion) is derived from them on request, so clearing the
//! selections tied to a source is all a switch has to do. Faults add residue
//! that the derivation then reports alongside the legitimate grants.

use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

use wizflow_core::domain::payload::{
    source, CharacterClassEntry, CharacterPayload, ChoiceMetadata, ChoiceOption, ChoiceType,
    CustomDescription, EntityRef, EquipmentEntry, LeafOption, PendingChoice, SavingThrow,
    SourcedEntry, Spellcasting, StatsPayload, ValidationPayload, ValidationStatus,
    STARTING_GOLD_SLUG,
};
use wizflow_core::EquipmentMode;

use crate::data_generators::world::{
    BackgroundDef, ClassDef, EquipmentOptionDef, RaceDef, SubclassDef, World, ABILITIES,
    LANGUAGES,
};
use crate::faults::{Fault, FaultSet};

/// Level every character is created at
const CHARACTER_LEVEL: u32 = 1;
const PROFICIENCY_BONUS: i32 = 2;

const RACE_LANGUAGE: &str = "race-language";
const CLASS_PROFICIENCY: &str = "class-proficiency";
const CLASS_SPELL: &str = "class-spell";
const CLASS_SUBCLASS: &str = "class-subclass";
const CLASS_OPTIONAL_FEATURE: &str = "class-optional-feature";
const BACKGROUND_LANGUAGE: &str = "background-language";
const EQUIPMENT_MODE: &str = "equipment-mode";
const EQUIPMENT_PREFIX: &str = "equipment-";

/// A request the subject refuses
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub status: u16,
    pub message: String,
    pub errors: Value,
}

impl Rejection {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: 422,
            errors: json!({ field: [message.clone()] }),
            message: "The given data was invalid.".to_string(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: 404,
            message: message.into(),
            errors: json!({}),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: 409,
            message: message.into(),
            errors: json!({}),
        }
    }
}

pub type SheetResult<T> = Result<T, Rejection>;

/// Values submitted for one choice
#[derive(Debug, Clone, Default, PartialEq)]
struct Selection {
    values: Vec<String>,
    items: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct CharacterSheet {
    pub id: u64,
    pub public_id: String,
    name: Option<String>,
    alignment: Option<String>,
    race: Option<&'static RaceDef>,
    class: Option<&'static ClassDef>,
    subclass: Option<&'static SubclassDef>,
    background: Option<&'static BackgroundDef>,
    ability_scores: BTreeMap<String, i32>,
    equipment_mode: Option<EquipmentMode>,
    /// Choice id -> submitted values
    selections: BTreeMap<String, Selection>,
    leaked_spells: Vec<SourcedEntry>,
    leaked_features: Vec<SourcedEntry>,
    leaked_class_items: Vec<EquipmentEntry>,
    leaked_gold: Option<u32>,
    equipment_choices_withheld: bool,
}

fn sourced(slug: &str, source: &str) -> SourcedEntry {
    SourcedEntry {
        slug: slug.to_string(),
        name: None,
        source: source.to_string(),
        always_prepared: false,
        is_choice_option: false,
    }
}

fn equipment_entry(slug: &str, name: &str, source: &str, choice_group: Option<&str>) -> EquipmentEntry {
    EquipmentEntry {
        item_slug: Some(slug.to_string()),
        item: Some(EntityRef::new(slug, name)),
        quantity: 1,
        custom_description: Some(CustomDescription {
            source: Some(source.to_string()),
            choice_group: choice_group.map(str::to_string),
        }),
    }
}

fn starting_gold(amount: u32) -> EquipmentEntry {
    EquipmentEntry {
        quantity: amount,
        ..equipment_entry(STARTING_GOLD_SLUG, "Gold Pieces", source::STARTING_WEALTH, None)
    }
}

fn leaf_options<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<ChoiceOption> {
    values
        .into_iter()
        .map(|v| ChoiceOption::Leaf(LeafOption::new(v)))
        .collect()
}

fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// Items granted by picking `option`, tagged with their choice group
fn option_items(
    option: &EquipmentOptionDef,
    picked: &[String],
    group: &str,
) -> Vec<EquipmentEntry> {
    let mut granted = Vec::new();
    for item in option.items {
        let chosen = !option.is_category || item.is_fixed || picked.iter().any(|p| p == item.slug);
        if !chosen {
            continue;
        }
        if item.is_pack {
            granted.extend(
                item.contents
                    .iter()
                    .map(|(slug, name)| equipment_entry(slug, name, source::CLASS, Some(group))),
            );
        } else {
            granted.push(equipment_entry(item.slug, item.name, source::CLASS, Some(group)));
        }
    }
    granted
}

impl CharacterSheet {
    pub fn new(id: u64, public_id: String, name: Option<String>) -> Self {
        Self {
            id,
            public_id,
            name,
            alignment: None,
            race: None,
            class: None,
            subclass: None,
            background: None,
            ability_scores: BTreeMap::new(),
            equipment_mode: None,
            selections: BTreeMap::new(),
            leaked_spells: Vec::new(),
            leaked_features: Vec::new(),
            leaked_class_items: Vec::new(),
            leaked_gold: None,
            equipment_choices_withheld: false,
        }
    }

    pub fn class_slug(&self) -> Option<&'static str> {
        self.class.map(|c| c.slug)
    }

    fn clear_selections(&mut self, prefix: &str) {
        self.selections.retain(|id, _| !id.starts_with(prefix));
    }

    // ----- mutations -----

    pub fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }

    pub fn set_alignment(&mut self, alignment: String) {
        self.alignment = Some(alignment);
    }

    pub fn set_ability_scores(&mut self, scores: BTreeMap<String, i32>) {
        self.ability_scores.extend(scores);
    }

    pub fn set_race(&mut self, world: &World, race: &'static RaceDef, faults: &FaultSet) {
        if let Some(previous) = self.race.filter(|p| p.slug != race.slug) {
            let chain = world.race_chain(previous);
            if faults.has(Fault::LeakRacialSpells) {
                self.leaked_spells.extend(
                    chain
                        .iter()
                        .flat_map(|r| r.spells.iter())
                        .map(|s| sourced(s, source::RACE)),
                );
            }
            if faults.has(Fault::LeakRacialFeatures) {
                self.leaked_features.extend(
                    chain
                        .iter()
                        .flat_map(|r| r.features.iter())
                        .map(|f| sourced(f, source::RACE)),
                );
            }
        }
        self.clear_selections("race-");
        self.race = Some(race);
    }

    pub fn set_background(&mut self, background: &'static BackgroundDef, faults: &FaultSet) {
        if let Some(previous) = self.background.filter(|p| p.slug != background.slug) {
            if faults.has(Fault::LeakBackgroundFeatures) {
                self.leaked_features.extend(
                    previous
                        .features
                        .iter()
                        .map(|f| sourced(f, source::BACKGROUND)),
                );
            }
        }
        self.clear_selections("background-");
        self.background = Some(background);
    }

    /// Adds the first class or replaces the current one.
    pub fn set_class(&mut self, class: &'static ClassDef, faults: &FaultSet) {
        if let Some(previous) = self.class.filter(|p| p.slug != class.slug) {
            if faults.has(Fault::LeakClassFeatures) {
                self.leaked_features.extend(
                    previous
                        .features
                        .iter()
                        .map(|f| sourced(f, source::CLASS)),
                );
            }
        }
        self.clear_selections("class-");
        self.clear_selections(EQUIPMENT_PREFIX);
        self.equipment_choices_withheld = false;
        self.subclass = None;
        self.class = Some(class);
    }

    pub fn set_subclass(&mut self, class_slug: &str, subclass_slug: &str) -> SheetResult<()> {
        let class = self
            .class
            .filter(|c| c.slug == class_slug)
            .ok_or_else(|| Rejection::not_found(format!("Class {} not found on character", class_slug)))?;
        let subclass = class.subclass(subclass_slug).ok_or_else(|| {
            Rejection::invalid("subclass_slug", "The selected subclass slug is invalid.")
        })?;
        self.subclass = Some(subclass);
        Ok(())
    }

    pub fn set_equipment_mode(&mut self, mode: EquipmentMode, faults: &FaultSet) {
        let previous = self.equipment_mode;
        if previous == Some(mode) {
            return;
        }
        match mode {
            EquipmentMode::Gold => {
                if previous == Some(EquipmentMode::Equipment)
                    && faults.has(Fault::KeepClassEquipmentInGold)
                {
                    self.leaked_class_items = self.class_equipment();
                }
                self.clear_selections(EQUIPMENT_PREFIX);
            }
            EquipmentMode::Equipment => {
                self.leaked_class_items.clear();
                if previous == Some(EquipmentMode::Gold) {
                    if faults.has(Fault::KeepStartingGold) {
                        self.leaked_gold = Some(self.class.map_or(0, |c| c.starting_gold));
                    }
                    if faults.has(Fault::DropEquipmentChoices) {
                        self.equipment_choices_withheld = true;
                    }
                }
            }
        }
        self.equipment_mode = Some(mode);
    }

    /// Apply a submission for the pending choice `choice_id`.
    pub fn submit_choice(
        &mut self,
        world: &World,
        choice_id: &str,
        selected: Vec<String>,
        items: BTreeMap<String, Vec<String>>,
        faults: &FaultSet,
    ) -> SheetResult<()> {
        let choice = self
            .pending_choices(world)
            .into_iter()
            .find(|c| c.id == choice_id)
            .ok_or_else(|| Rejection::not_found(format!("Choice {} not found", choice_id)))?;

        if selected.is_empty() {
            return Err(Rejection::invalid("selected", "At least one value must be selected."));
        }

        match choice.choice_type {
            ChoiceType::EquipmentMode => {
                let mode = selected[0]
                    .parse::<EquipmentMode>()
                    .map_err(|_| Rejection::invalid("selected", "The selected equipment mode is invalid."))?;
                self.set_equipment_mode(mode, faults);
            }
            ChoiceType::Subclass => {
                let class_slug = self.class_slug().unwrap_or_default();
                self.set_subclass(class_slug, &selected[0])?;
            }
            ChoiceType::Equipment => {
                self.validate_equipment_submission(&choice, &selected, &items)?;
                self.selections.insert(
                    choice.id,
                    Selection {
                        values: vec![selected[0].clone()],
                        items,
                    },
                );
            }
            _ => {
                let allowed = self.leaf_values(&choice);
                let distinct: BTreeSet<&String> = selected.iter().collect();
                if distinct.len() != selected.len() {
                    return Err(Rejection::invalid("selected", "Selected values must be distinct."));
                }
                if selected.len() > choice.quantity.unwrap_or(1) as usize {
                    return Err(Rejection::invalid("selected", "Too many values selected."));
                }
                if let Some(bad) = selected.iter().find(|s| !allowed.contains(s.as_str())) {
                    return Err(Rejection::invalid(
                        "selected",
                        format!("The selected value {} is not an available option.", bad),
                    ));
                }
                self.selections.insert(
                    choice.id,
                    Selection {
                        values: selected,
                        items,
                    },
                );
            }
        }
        Ok(())
    }

    /// Values a leaf choice accepts: its inline options, or the class list behind its endpoint
    fn leaf_values(&self, choice: &PendingChoice) -> BTreeSet<String> {
        if choice.options_endpoint.is_some() {
            return self
                .class
                .map(|c| c.cantrip_options.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default();
        }
        choice
            .options
            .iter()
            .filter_map(ChoiceOption::as_leaf)
            .map(|l| l.slug.clone())
            .collect()
    }

    fn validate_equipment_submission(
        &self,
        choice: &PendingChoice,
        selected: &[String],
        items: &BTreeMap<String, Vec<String>>,
    ) -> SheetResult<()> {
        let option = choice
            .options
            .iter()
            .filter_map(ChoiceOption::as_equipment)
            .find(|o| o.option == selected[0])
            .ok_or_else(|| Rejection::invalid("selected", "The selected option is invalid."))?;
        if !option.is_category {
            return Ok(());
        }
        let picked = items.get(&option.option).filter(|p| !p.is_empty()).ok_or_else(|| {
            Rejection::invalid("item_selections", "An item must be selected for this option.")
        })?;
        let selectable: BTreeSet<&str> = option.selectable_items().map(|i| i.slug.as_str()).collect();
        match picked.iter().find(|p| !selectable.contains(p.as_str())) {
            Some(bad) => Err(Rejection::invalid(
                "item_selections",
                format!("The selected item {} is not part of option {}.", bad, option.option),
            )),
            None => Ok(()),
        }
    }

    // ----- derived views -----

    fn race_chain(&self, world: &World) -> Vec<&'static RaceDef> {
        self.race.map(|r| world.race_chain(r)).unwrap_or_default()
    }

    fn selected(&self, choice_id: &str) -> &[String] {
        self.selections
            .get(choice_id)
            .map(|s| s.values.as_slice())
            .unwrap_or(&[])
    }

    fn granted_subclass_entries<'a>(
        entries: &'a [(&'static str, u32)],
    ) -> impl Iterator<Item = &'static str> + 'a {
        entries
            .iter()
            .filter(|(_, level)| *level <= CHARACTER_LEVEL)
            .map(|(slug, _)| *slug)
    }

    pub fn spells(&self, world: &World) -> Vec<SourcedEntry> {
        let mut spells: Vec<SourcedEntry> = self
            .race_chain(world)
            .iter()
            .flat_map(|r| r.spells.iter())
            .map(|s| sourced(s, source::RACE))
            .collect();
        spells.extend(
            self.selected(CLASS_SPELL)
                .iter()
                .map(|s| sourced(s, source::CLASS)),
        );
        if let Some(subclass) = self.subclass {
            spells.extend(
                Self::granted_subclass_entries(subclass.spells).map(|s| SourcedEntry {
                    always_prepared: true,
                    ..sourced(s, source::SUBCLASS)
                }),
            );
        }
        spells.extend(self.leaked_spells.iter().cloned());
        spells
    }

    pub fn features(&self, world: &World, faults: &FaultSet) -> Vec<SourcedEntry> {
        let mut features: Vec<SourcedEntry> = self
            .race_chain(world)
            .iter()
            .flat_map(|r| r.features.iter())
            .map(|f| sourced(f, source::RACE))
            .collect();
        if let Some(class) = self.class {
            features.extend(class.features.iter().map(|f| sourced(f, source::CLASS)));
            features.extend(self.selected(CLASS_OPTIONAL_FEATURE).iter().map(|f| SourcedEntry {
                is_choice_option: true,
                ..sourced(f, source::CLASS)
            }));
        }
        if let Some(subclass) = self.subclass.filter(|_| !faults.has(Fault::SkipSubclassFeatures)) {
            features.extend(
                Self::granted_subclass_entries(subclass.features).map(|f| sourced(f, source::SUBCLASS)),
            );
        }
        if let Some(background) = self.background {
            features.extend(
                background
                    .features
                    .iter()
                    .map(|f| sourced(f, source::BACKGROUND)),
            );
        }
        features.extend(self.leaked_features.iter().cloned());
        features
    }

    pub fn languages(&self, world: &World) -> Vec<SourcedEntry> {
        let mut languages: Vec<SourcedEntry> = self
            .race_chain(world)
            .iter()
            .flat_map(|r| r.languages.iter())
            .map(|l| sourced(l, source::RACE))
            .collect();
        languages.extend(
            self.selected(RACE_LANGUAGE)
                .iter()
                .map(|l| sourced(l, source::RACE)),
        );
        languages.extend(
            self.selected(BACKGROUND_LANGUAGE)
                .iter()
                .map(|l| sourced(l, source::BACKGROUND)),
        );
        languages
    }

    pub fn proficiencies(&self, world: &World) -> Vec<SourcedEntry> {
        let mut proficiencies: Vec<SourcedEntry> = self
            .race_chain(world)
            .iter()
            .flat_map(|r| r.proficiencies.iter())
            .map(|p| sourced(p, source::RACE))
            .collect();
        proficiencies.extend(
            self.selected(CLASS_PROFICIENCY)
                .iter()
                .map(|p| sourced(p, source::CLASS)),
        );
        if let Some(subclass) = self.subclass {
            proficiencies.extend(
                Self::granted_subclass_entries(subclass.proficiencies)
                    .map(|p| sourced(p, source::SUBCLASS)),
            );
        }
        if let Some(background) = self.background {
            proficiencies.extend(
                background
                    .proficiencies
                    .iter()
                    .map(|p| sourced(p, source::BACKGROUND)),
            );
        }
        proficiencies
    }

    /// Items from resolved equipment choices, plus the fixed items once every group is chosen
    fn class_equipment(&self) -> Vec<EquipmentEntry> {
        let Some(class) = self.class else {
            return Vec::new();
        };
        let mut items = Vec::new();
        let mut all_chosen = true;
        for group in class.equipment_groups {
            let id = format!("{}{}", EQUIPMENT_PREFIX, group.group);
            let Some(selection) = self.selections.get(&id) else {
                all_chosen = false;
                continue;
            };
            let option = selection
                .values
                .first()
                .and_then(|chosen| group.options.iter().find(|o| o.option == chosen));
            if let Some(option) = option {
                let picked = selection.items.get(option.option).cloned().unwrap_or_default();
                items.extend(option_items(option, &picked, group.group));
            }
        }
        if all_chosen {
            items.extend(
                class
                    .fixed_equipment
                    .iter()
                    .map(|(slug, name)| equipment_entry(slug, name, source::CLASS, None)),
            );
        }
        items
    }

    pub fn equipment(&self, faults: &FaultSet) -> Vec<EquipmentEntry> {
        let mut equipment = Vec::new();
        if let Some(background) = self
            .background
            .filter(|_| !faults.has(Fault::SkipBackgroundEquipment))
        {
            equipment.extend(
                background
                    .equipment
                    .iter()
                    .map(|(slug, name)| equipment_entry(slug, name, source::BACKGROUND, None)),
            );
        }
        match self.equipment_mode {
            Some(EquipmentMode::Gold) => {
                equipment.push(starting_gold(self.class.map_or(0, |c| c.starting_gold)));
                equipment.extend(self.leaked_class_items.iter().cloned());
            }
            Some(EquipmentMode::Equipment) => {
                equipment.extend(self.class_equipment());
                if let Some(amount) = self.leaked_gold {
                    equipment.push(starting_gold(amount));
                }
            }
            None => {}
        }
        equipment
    }

    pub fn stats(&self) -> StatsPayload {
        let score = |ability: &str| self.ability_scores.get(ability).copied().unwrap_or(10);
        let saving_throws = ABILITIES
            .iter()
            .map(|ability| {
                let proficient = self
                    .class
                    .map_or(false, |c| c.saving_throws.contains(ability));
                let bonus = if proficient { PROFICIENCY_BONUS } else { 0 };
                (
                    ability.to_string(),
                    SavingThrow {
                        proficient,
                        modifier: ability_modifier(score(ability)) + bonus,
                    },
                )
            })
            .collect();
        let spellcasting = self
            .class
            .and_then(|c| c.spellcasting_ability)
            .map(|ability| Spellcasting {
                ability: ability.to_string(),
                spell_save_dc: Some(8 + PROFICIENCY_BONUS + ability_modifier(score(ability))),
            });
        let spell_slots = match spellcasting {
            Some(_) => BTreeMap::from([("1".to_string(), 2)]),
            None => BTreeMap::new(),
        };
        StatsPayload {
            saving_throws,
            spellcasting,
            spell_slots,
        }
    }

    fn known_languages(&self, world: &World, except: &str) -> BTreeSet<String> {
        let mut known: BTreeSet<String> = self
            .race_chain(world)
            .iter()
            .flat_map(|r| r.languages.iter())
            .map(|l| l.to_string())
            .collect();
        for (id, selection) in &self.selections {
            if id.ends_with("-language") && id != except {
                known.extend(selection.values.iter().cloned());
            }
        }
        known
    }

    fn leaf_choice(
        &self,
        id: &str,
        choice_type: ChoiceType,
        required: bool,
        quantity: u32,
        options: Vec<ChoiceOption>,
        origin: &str,
    ) -> PendingChoice {
        let remaining = if self.selections.contains_key(id) { 0 } else { quantity };
        PendingChoice {
            id: id.to_string(),
            choice_type,
            required,
            remaining,
            quantity: Some(quantity),
            options,
            options_endpoint: None,
            metadata: ChoiceMetadata {
                choice_group: None,
                source: Some(origin.to_string()),
            },
        }
    }

    /// Every choice the character currently offers, resolved ones with `remaining = 0`
    pub fn pending_choices(&self, world: &World) -> Vec<PendingChoice> {
        let mut choices = Vec::new();

        let race_languages: u32 = self.race_chain(world).iter().map(|r| r.language_choices).sum();
        if race_languages > 0 {
            let known = self.known_languages(world, RACE_LANGUAGE);
            let options = leaf_options(LANGUAGES.iter().copied().filter(|l| !known.contains(*l)));
            choices.push(self.leaf_choice(
                RACE_LANGUAGE,
                ChoiceType::Language,
                true,
                race_languages,
                options,
                source::RACE,
            ));
        }

        if let Some(class) = self.class {
            let other_proficiencies: BTreeSet<String> = self
                .proficiencies(world)
                .into_iter()
                .filter(|p| p.source != source::CLASS)
                .map(|p| p.slug)
                .collect();
            choices.push(self.leaf_choice(
                CLASS_PROFICIENCY,
                ChoiceType::Proficiency,
                true,
                class.skill_choices,
                leaf_options(
                    class
                        .skill_options
                        .iter()
                        .copied()
                        .filter(|s| !other_proficiencies.contains(*s)),
                ),
                source::CLASS,
            ));

            if class.cantrip_choices > 0 {
                let racial: BTreeSet<&str> = self
                    .race_chain(world)
                    .iter()
                    .flat_map(|r| r.spells.iter().copied())
                    .collect();
                let inline = if class.cantrips_by_endpoint {
                    Vec::new()
                } else {
                    leaf_options(
                        class
                            .cantrip_options
                            .iter()
                            .copied()
                            .filter(|s| !racial.contains(s)),
                    )
                };
                let mut spell = self.leaf_choice(
                    CLASS_SPELL,
                    ChoiceType::Spell,
                    true,
                    class.cantrip_choices,
                    inline,
                    source::CLASS,
                );
                if class.cantrips_by_endpoint {
                    spell.options_endpoint = Some(format!("/classes/{}/spells", class.slug));
                }
                choices.push(spell);
            }

            if class.subclass_level == CHARACTER_LEVEL && !class.subclasses.is_empty() {
                let mut subclass = self.leaf_choice(
                    CLASS_SUBCLASS,
                    ChoiceType::Subclass,
                    true,
                    1,
                    leaf_options(class.subclasses.iter().map(|s| s.slug)),
                    source::CLASS,
                );
                subclass.remaining = u32::from(self.subclass.is_none());
                choices.push(subclass);
            }

            if !class.optional_features.is_empty() {
                choices.push(self.leaf_choice(
                    CLASS_OPTIONAL_FEATURE,
                    ChoiceType::OptionalFeature,
                    false,
                    1,
                    leaf_options(class.optional_features.iter().copied()),
                    source::CLASS,
                ));
            }

            let mut mode = self.leaf_choice(
                EQUIPMENT_MODE,
                ChoiceType::EquipmentMode,
                true,
                1,
                leaf_options([EquipmentMode::Equipment.as_str(), EquipmentMode::Gold.as_str()]),
                source::CLASS,
            );
            mode.remaining = u32::from(self.equipment_mode.is_none());
            choices.push(mode);

            if self.equipment_mode == Some(EquipmentMode::Equipment) && !self.equipment_choices_withheld {
                for group in class.equipment_groups {
                    let id = format!("{}{}", EQUIPMENT_PREFIX, group.group);
                    let mut choice = self.leaf_choice(
                        &id,
                        ChoiceType::Equipment,
                        true,
                        1,
                        group
                            .options
                            .iter()
                            .map(|o| ChoiceOption::Equipment(o.to_option()))
                            .collect(),
                        source::CLASS,
                    );
                    choice.metadata.choice_group = Some(group.group.to_string());
                    choices.push(choice);
                }
            }
        }

        if let Some(background) = self.background.filter(|b| b.language_choices > 0) {
            let known = self.known_languages(world, BACKGROUND_LANGUAGE);
            choices.push(self.leaf_choice(
                BACKGROUND_LANGUAGE,
                ChoiceType::Language,
                true,
                background.language_choices,
                leaf_options(LANGUAGES.iter().copied().filter(|l| !known.contains(*l))),
                source::BACKGROUND,
            ));
        }

        choices
    }

    /// Requirements not yet met, in wizard order
    pub fn missing(&self, faults: &FaultSet) -> Vec<String> {
        let mut missing = Vec::new();
        let mut require = |absent: bool, field: &str| {
            if absent {
                missing.push(field.to_string());
            }
        };
        require(self.name.is_none(), "name");
        require(self.race.is_none(), "race");
        require(self.class.is_none(), "class");
        require(self.background.is_none(), "background");
        require(
            self.ability_scores.is_empty() || faults.has(Fault::StaleCompletion),
            "ability_scores",
        );
        missing
    }

    pub fn validation(&self, world: &World, faults: &FaultSet) -> ValidationPayload {
        let missing = self.missing(faults);
        let open_required = self
            .pending_choices(world)
            .iter()
            .any(|c| c.required && c.is_open());
        ValidationPayload {
            is_complete: missing.is_empty() && !open_required,
            missing,
        }
    }

    pub fn payload(&self, world: &World, faults: &FaultSet) -> CharacterPayload {
        let chain = self.race_chain(world);
        let speed = chain.iter().rev().find_map(|r| r.speed);
        let score = |ability: &str| self.ability_scores.get(ability).copied().unwrap_or(10);
        let hit_points = self
            .class
            .map(|c| c.hit_die + ability_modifier(score("constitution")));
        let validation = self.validation(world, faults);

        CharacterPayload {
            id: self.id,
            public_id: self.public_id.clone(),
            name: self.name.clone(),
            alignment: self.alignment.clone(),
            race: self.race.map(|r| EntityRef::new(r.slug, r.name)),
            background: self.background.map(|b| EntityRef::new(b.slug, b.name)),
            classes: self
                .class
                .map(|c| CharacterClassEntry {
                    class: EntityRef::new(c.slug, c.name),
                    subclass: self.subclass.map(|s| EntityRef::new(s.slug, s.name)),
                    level: CHARACTER_LEVEL,
                })
                .into_iter()
                .collect(),
            ability_scores: self.ability_scores.clone(),
            speed,
            size: self.race.map(|r| r.size.to_string()),
            equipment_mode: self.equipment_mode.map(|m| m.as_str().to_string()),
            max_hit_points: hit_points,
            current_hit_points: hit_points,
            armor_class: Some(10 + ability_modifier(score("dexterity"))),
            proficiency_bonus: Some(PROFICIENCY_BONUS),
            is_complete: validation.is_complete,
            validation_status: ValidationStatus {
                is_complete: validation.is_complete,
                missing: validation.missing,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn world() -> World {
        World::standard()
    }

    fn slugs(entries: &[SourcedEntry], source: &str) -> Vec<String> {
        entries
            .iter()
            .filter(|e| e.source == source)
            .map(|e| e.slug.clone())
            .collect()
    }

    fn sheet_with(race: &str, class: &str, background: &str) -> CharacterSheet {
        let world = world();
        let faults = FaultSet::none();
        let mut sheet = CharacterSheet::new(1, "brave-wolf-ab12".into(), Some("Aelan".into()));
        sheet.set_race(&world, world.race(race).unwrap(), &faults);
        sheet.set_class(world.class(class).unwrap(), &faults);
        sheet.set_background(world.background(background).unwrap(), &faults);
        sheet
    }

    #[test]
    fn subrace_grants_parent_and_own_features() {
        let sheet = sheet_with("high-elf", "wizard", "sage");
        let features = sheet.features(&world(), &FaultSet::none());
        assert_eq!(
            slugs(&features, source::RACE),
            vec!["fey-ancestry", "keen-senses", "trance", "elf-weapon-training", "high-elf-cantrip"]
        );
        assert_eq!(slugs(&sheet.spells(&world()), source::RACE), vec!["prestidigitation"]);
        assert_eq!(sheet.payload(&world(), &FaultSet::none()).speed, Some(30));
    }

    #[test]
    fn race_switch_drops_racial_grants_and_choices() {
        let world = world();
        let faults = FaultSet::none();
        let mut sheet = sheet_with("human", "fighter", "soldier");
        sheet
            .submit_choice(&world, RACE_LANGUAGE, vec!["giant".into()], BTreeMap::new(), &faults)
            .unwrap();
        assert!(sheet.languages(&world).iter().any(|l| l.slug == "giant"));

        sheet.set_race(&world, world.race("tiefling").unwrap(), &faults);
        let languages: Vec<String> = sheet.languages(&world).into_iter().map(|l| l.slug).collect();
        assert_eq!(languages, vec!["common", "infernal"]);
        assert!(sheet.pending_choices(&world).iter().all(|c| c.id != RACE_LANGUAGE));
    }

    #[test]
    fn leaking_fault_keeps_previous_racial_spells() {
        let world = world();
        let faults = FaultSet::none().with(Fault::LeakRacialSpells);
        let mut sheet = CharacterSheet::new(1, "x".into(), None);
        sheet.set_race(&world, world.race("tiefling").unwrap(), &faults);
        sheet.set_race(&world, world.race("dwarf").unwrap(), &faults);
        assert_eq!(slugs(&sheet.spells(&world), source::RACE), vec!["thaumaturgy"]);
    }

    #[test]
    fn fixed_class_equipment_waits_for_every_group() {
        let world = world();
        let faults = FaultSet::none();
        let mut sheet = sheet_with("dwarf", "fighter", "soldier");
        sheet.set_equipment_mode(EquipmentMode::Equipment, &faults);

        sheet
            .submit_choice(&world, "equipment-fighter-armor", vec!["a".into()], BTreeMap::new(), &faults)
            .unwrap();
        let items = BTreeMap::from([("a".to_string(), vec!["battleaxe".to_string()])]);
        sheet
            .submit_choice(&world, "equipment-fighter-weapon", vec!["a".into()], items, &faults)
            .unwrap();
        let slugs: Vec<String> = sheet
            .equipment(&faults)
            .iter()
            .filter_map(|e| e.slug().map(str::to_string))
            .collect();
        assert!(slugs.contains(&"battleaxe".to_string()));
        assert!(slugs.contains(&"shield".to_string()));
        assert!(!slugs.contains(&"javelin".to_string()));

        sheet
            .submit_choice(&world, "equipment-fighter-pack", vec!["b".into()], BTreeMap::new(), &faults)
            .unwrap();
        let slugs: Vec<String> = sheet
            .equipment(&faults)
            .iter()
            .filter_map(|e| e.slug().map(str::to_string))
            .collect();
        assert!(slugs.contains(&"javelin".to_string()));
        assert!(slugs.contains(&"bedroll".to_string()));
        assert!(!slugs.contains(&"explorers-pack".to_string()));
    }

    #[test]
    fn category_option_needs_a_selectable_item() {
        let world = world();
        let faults = FaultSet::none();
        let mut sheet = sheet_with("dwarf", "fighter", "soldier");
        sheet.set_equipment_mode(EquipmentMode::Equipment, &faults);
        let bad = BTreeMap::from([("a".to_string(), vec!["shield".to_string()])]);
        let rejection = sheet
            .submit_choice(&world, "equipment-fighter-weapon", vec!["a".into()], bad, &faults)
            .unwrap_err();
        assert_eq!(rejection.status, 422);
        assert!(sheet
            .submit_choice(&world, "equipment-fighter-weapon", vec!["a".into()], BTreeMap::new(), &faults)
            .is_err());
    }

    #[test]
    fn gold_mode_replaces_class_equipment_with_one_gold_entry() {
        let world = world();
        let faults = FaultSet::none();
        let mut sheet = sheet_with("human", "rogue", "acolyte");
        sheet.set_equipment_mode(EquipmentMode::Equipment, &faults);
        sheet
            .submit_choice(&world, "equipment-rogue-weapon", vec!["a".into()], BTreeMap::new(), &faults)
            .unwrap();
        sheet.set_equipment_mode(EquipmentMode::Gold, &faults);

        let equipment = sheet.equipment(&faults);
        assert_eq!(equipment.iter().filter(|e| e.is_starting_gold()).count(), 1);
        assert!(!equipment.iter().any(EquipmentEntry::is_class_sourced));
        assert_eq!(equipment.iter().filter(|e| e.is_background_sourced()).count(), 3);
        assert!(sheet
            .pending_choices(&world)
            .iter()
            .all(|c| c.choice_type != ChoiceType::Equipment));

        sheet.set_equipment_mode(EquipmentMode::Equipment, &faults);
        let open_groups = sheet
            .pending_choices(&world)
            .iter()
            .filter(|c| c.choice_type == ChoiceType::Equipment && c.is_open())
            .count();
        assert_eq!(open_groups, 3);
        assert!(!sheet.equipment(&faults).iter().any(EquipmentEntry::is_starting_gold));
    }

    #[test]
    fn completion_requires_every_required_choice() {
        let world = world();
        let faults = FaultSet::none();
        let mut sheet = sheet_with("dwarf", "fighter", "soldier");
        sheet.set_ability_scores(BTreeMap::from([("strength".to_string(), 15)]));
        let validation = sheet.validation(&world, &faults);
        assert!(validation.missing.is_empty());
        assert!(!validation.is_complete);

        sheet
            .submit_choice(
                &world,
                CLASS_PROFICIENCY,
                vec!["acrobatics".into(), "history".into()],
                BTreeMap::new(),
                &faults,
            )
            .unwrap();
        sheet
            .submit_choice(&world, EQUIPMENT_MODE, vec!["gold".into()], BTreeMap::new(), &faults)
            .unwrap();
        assert!(sheet.validation(&world, &faults).is_complete);
        assert!(!sheet.validation(&world, &FaultSet::none().with(Fault::StaleCompletion)).is_complete);
    }

    #[test]
    fn class_switch_clears_subclass_and_class_choices() {
        let world = world();
        let faults = FaultSet::none();
        let mut sheet = sheet_with("human", "cleric", "acolyte");
        sheet.set_subclass("cleric", "life-domain").unwrap();
        assert_eq!(slugs(&sheet.spells(&world), source::SUBCLASS), vec!["bless", "cure-wounds"]);
        assert_eq!(slugs(&sheet.proficiencies(&world), source::SUBCLASS), vec!["heavy-armor"]);

        sheet.set_class(world.class("wizard").unwrap(), &faults);
        assert!(slugs(&sheet.spells(&world), source::SUBCLASS).is_empty());
        let spell_choice = sheet
            .pending_choices(&world)
            .into_iter()
            .find(|c| c.id == CLASS_SPELL)
            .unwrap();
        assert_eq!(spell_choice.options_endpoint.as_deref(), Some("/classes/wizard/spells"));
        assert!(spell_choice.options.is_empty());
    }
}
