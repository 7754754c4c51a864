//! Static fixture world served by the in-memory subject.
//!
//! Feature and spell slugs are unique per race, class and background so a
//! leak across a switch can always be told apart from a legitimate grant.

use wizflow_core::domain::catalog::{
    BackgroundEntry, ClassEntry, LevelledEntry, RaceEntry, SubclassEntry, SubclassSpell,
    SubraceEntry,
};
use wizflow_core::domain::payload::{EntityRef, EquipmentOption, EquipmentOptionItem};
use wizflow_core::Catalog;

pub const ABILITIES: [&str; 6] = [
    "strength",
    "dexterity",
    "constitution",
    "intelligence",
    "wisdom",
    "charisma",
];

pub const LANGUAGES: [&str; 14] = [
    "common",
    "dwarvish",
    "elvish",
    "giant",
    "gnomish",
    "goblin",
    "halfling",
    "orc",
    "abyssal",
    "celestial",
    "draconic",
    "infernal",
    "sylvan",
    "undercommon",
];

/// `(slug, display name)`
pub type Named = (&'static str, &'static str);

#[derive(Debug)]
pub struct RaceDef {
    pub slug: &'static str,
    pub name: &'static str,
    /// Set for subraces
    pub parent: Option<&'static str>,
    /// `None` inherits the parent's speed
    pub speed: Option<u32>,
    pub size: &'static str,
    pub languages: &'static [&'static str],
    pub language_choices: u32,
    pub features: &'static [&'static str],
    pub spells: &'static [&'static str],
    pub proficiencies: &'static [&'static str],
}

#[derive(Debug)]
pub struct SubclassDef {
    pub slug: &'static str,
    pub name: &'static str,
    pub features: &'static [(&'static str, u32)],
    /// Always prepared once the level is reached
    pub spells: &'static [(&'static str, u32)],
    pub proficiencies: &'static [(&'static str, u32)],
}

#[derive(Debug)]
pub struct ItemDef {
    pub slug: &'static str,
    pub name: &'static str,
    pub is_fixed: bool,
    pub is_pack: bool,
    pub contents: &'static [Named],
}

#[derive(Debug)]
pub struct EquipmentOptionDef {
    pub option: &'static str,
    pub is_category: bool,
    pub items: &'static [ItemDef],
}

#[derive(Debug)]
pub struct EquipmentGroupDef {
    pub group: &'static str,
    pub options: &'static [EquipmentOptionDef],
}

#[derive(Debug)]
pub struct ClassDef {
    pub slug: &'static str,
    pub name: &'static str,
    pub spellcasting_ability: Option<&'static str>,
    pub hit_die: i32,
    pub saving_throws: &'static [&'static str],
    pub features: &'static [&'static str],
    pub skill_choices: u32,
    pub skill_options: &'static [&'static str],
    pub cantrip_choices: u32,
    pub cantrip_options: &'static [&'static str],
    /// Cantrip options are served from an options endpoint instead of inline
    pub cantrips_by_endpoint: bool,
    /// Offered as an optional choice
    pub optional_features: &'static [&'static str],
    pub subclass_level: u32,
    pub subclasses: &'static [SubclassDef],
    pub equipment_groups: &'static [EquipmentGroupDef],
    /// Granted once every equipment group is chosen
    pub fixed_equipment: &'static [Named],
    pub starting_gold: u32,
}

#[derive(Debug)]
pub struct BackgroundDef {
    pub slug: &'static str,
    pub name: &'static str,
    pub features: &'static [&'static str],
    pub proficiencies: &'static [&'static str],
    pub language_choices: u32,
    pub equipment: &'static [Named],
}

const fn item(slug: &'static str, name: &'static str) -> ItemDef {
    ItemDef { slug, name, is_fixed: false, is_pack: false, contents: &[] }
}

const fn fixed_item(slug: &'static str, name: &'static str) -> ItemDef {
    ItemDef { slug, name, is_fixed: true, is_pack: false, contents: &[] }
}

const fn pack(slug: &'static str, name: &'static str, contents: &'static [Named]) -> ItemDef {
    ItemDef { slug, name, is_fixed: false, is_pack: true, contents }
}

const fn fixed(option: &'static str, items: &'static [ItemDef]) -> EquipmentOptionDef {
    EquipmentOptionDef { option, is_category: false, items }
}

const fn category(option: &'static str, items: &'static [ItemDef]) -> EquipmentOptionDef {
    EquipmentOptionDef { option, is_category: true, items }
}

const EXPLORERS_PACK: ItemDef = pack(
    "explorers-pack",
    "Explorer's Pack",
    &[("bedroll", "Bedroll"), ("rope", "Hempen Rope"), ("waterskin", "Waterskin")],
);

static RACES: &[RaceDef] = &[
    RaceDef {
        slug: "human",
        name: "Human",
        parent: None,
        speed: Some(30),
        size: "Medium",
        languages: &["common"],
        language_choices: 1,
        features: &["human-versatility"],
        spells: &[],
        proficiencies: &[],
    },
    RaceDef {
        slug: "elf",
        name: "Elf",
        parent: None,
        speed: Some(30),
        size: "Medium",
        languages: &["common", "elvish"],
        language_choices: 0,
        features: &["fey-ancestry", "keen-senses", "trance"],
        spells: &[],
        proficiencies: &["perception"],
    },
    RaceDef {
        slug: "high-elf",
        name: "High Elf",
        parent: Some("elf"),
        speed: None,
        size: "Medium",
        languages: &[],
        language_choices: 1,
        features: &["elf-weapon-training", "high-elf-cantrip"],
        spells: &["prestidigitation"],
        proficiencies: &["longsword", "shortbow"],
    },
    RaceDef {
        slug: "wood-elf",
        name: "Wood Elf",
        parent: Some("elf"),
        speed: Some(35),
        size: "Medium",
        languages: &[],
        language_choices: 0,
        features: &["fleet-of-foot", "mask-of-the-wild"],
        spells: &[],
        proficiencies: &["longbow"],
    },
    RaceDef {
        slug: "dwarf",
        name: "Dwarf",
        parent: None,
        speed: Some(25),
        size: "Medium",
        languages: &["common", "dwarvish"],
        language_choices: 0,
        features: &["dwarven-resilience", "stonecunning"],
        spells: &[],
        proficiencies: &["battleaxe", "handaxe", "warhammer"],
    },
    RaceDef {
        slug: "hill-dwarf",
        name: "Hill Dwarf",
        parent: Some("dwarf"),
        speed: None,
        size: "Medium",
        languages: &[],
        language_choices: 0,
        features: &["dwarven-toughness"],
        spells: &[],
        proficiencies: &[],
    },
    RaceDef {
        slug: "tiefling",
        name: "Tiefling",
        parent: None,
        speed: Some(30),
        size: "Medium",
        languages: &["common", "infernal"],
        language_choices: 0,
        features: &["hellish-resistance", "infernal-legacy"],
        spells: &["thaumaturgy"],
        proficiencies: &[],
    },
    RaceDef {
        slug: "halfling",
        name: "Halfling",
        parent: None,
        speed: Some(25),
        size: "Small",
        languages: &["common", "halfling"],
        language_choices: 0,
        features: &["lucky", "brave", "halfling-nimbleness"],
        spells: &[],
        proficiencies: &[],
    },
];

static CLASSES: &[ClassDef] = &[
    ClassDef {
        slug: "fighter",
        name: "Fighter",
        spellcasting_ability: None,
        hit_die: 10,
        saving_throws: &["strength", "constitution"],
        features: &["second-wind"],
        skill_choices: 2,
        skill_options: &[
            "acrobatics", "animal-handling", "athletics", "history", "insight",
            "intimidation", "perception", "survival",
        ],
        cantrip_choices: 0,
        cantrip_options: &[],
        cantrips_by_endpoint: false,
        optional_features: &["archery", "defense", "dueling", "great-weapon-fighting"],
        subclass_level: 3,
        subclasses: &[SubclassDef {
            slug: "champion",
            name: "Champion",
            features: &[("improved-critical", 3)],
            spells: &[],
            proficiencies: &[],
        }],
        equipment_groups: &[
            EquipmentGroupDef {
                group: "fighter-armor",
                options: &[
                    fixed("a", &[item("chain-mail", "Chain Mail")]),
                    fixed("b", &[item("leather-armor", "Leather Armor"), item("longbow", "Longbow")]),
                ],
            },
            EquipmentGroupDef {
                group: "fighter-weapon",
                options: &[
                    category(
                        "a",
                        &[
                            item("longsword", "Longsword"),
                            item("battleaxe", "Battleaxe"),
                            item("warhammer", "Warhammer"),
                            fixed_item("shield", "Shield"),
                        ],
                    ),
                    fixed("b", &[item("handaxe", "Handaxe")]),
                ],
            },
            EquipmentGroupDef {
                group: "fighter-pack",
                options: &[
                    fixed(
                        "a",
                        &[pack(
                            "dungeoneers-pack",
                            "Dungeoneer's Pack",
                            &[("crowbar", "Crowbar"), ("hammer", "Hammer"), ("torch", "Torch")],
                        )],
                    ),
                    fixed("b", &[EXPLORERS_PACK]),
                ],
            },
        ],
        fixed_equipment: &[("javelin", "Javelin")],
        starting_gold: 150,
    },
    ClassDef {
        slug: "rogue",
        name: "Rogue",
        spellcasting_ability: None,
        hit_die: 8,
        saving_throws: &["dexterity", "intelligence"],
        features: &["expertise", "sneak-attack", "thieves-cant"],
        skill_choices: 4,
        skill_options: &[
            "acrobatics", "athletics", "deception", "insight", "intimidation", "investigation",
            "perception", "performance", "persuasion", "sleight-of-hand", "stealth",
        ],
        cantrip_choices: 0,
        cantrip_options: &[],
        cantrips_by_endpoint: false,
        optional_features: &[],
        subclass_level: 3,
        subclasses: &[SubclassDef {
            slug: "thief",
            name: "Thief",
            features: &[("fast-hands", 3), ("second-story-work", 3)],
            spells: &[],
            proficiencies: &[],
        }],
        equipment_groups: &[
            EquipmentGroupDef {
                group: "rogue-weapon",
                options: &[
                    fixed("a", &[item("rapier", "Rapier")]),
                    fixed("b", &[item("shortsword", "Shortsword")]),
                ],
            },
            EquipmentGroupDef {
                group: "rogue-ranged",
                options: &[
                    fixed("a", &[item("shortbow", "Shortbow"), item("arrows", "Arrows (20)")]),
                    fixed("b", &[item("hand-crossbow", "Hand Crossbow")]),
                ],
            },
            EquipmentGroupDef {
                group: "rogue-pack",
                options: &[
                    fixed(
                        "a",
                        &[pack(
                            "burglars-pack",
                            "Burglar's Pack",
                            &[("ball-bearings", "Ball Bearings"), ("string", "String"), ("bell", "Bell")],
                        )],
                    ),
                    fixed("b", &[EXPLORERS_PACK]),
                ],
            },
        ],
        fixed_equipment: &[
            ("leather-armor", "Leather Armor"),
            ("dagger", "Dagger"),
            ("thieves-tools", "Thieves' Tools"),
        ],
        starting_gold: 100,
    },
    ClassDef {
        slug: "wizard",
        name: "Wizard",
        spellcasting_ability: Some("intelligence"),
        hit_die: 6,
        saving_throws: &["intelligence", "wisdom"],
        features: &["arcane-recovery"],
        skill_choices: 2,
        skill_options: &["arcana", "history", "insight", "investigation", "medicine", "religion"],
        cantrip_choices: 3,
        cantrip_options: &[
            "fire-bolt", "mage-hand", "minor-illusion", "prestidigitation", "ray-of-frost",
            "shocking-grasp",
        ],
        cantrips_by_endpoint: true,
        optional_features: &[],
        subclass_level: 2,
        subclasses: &[SubclassDef {
            slug: "school-of-evocation",
            name: "School of Evocation",
            features: &[("evocation-savant", 2), ("sculpt-spells", 2)],
            spells: &[],
            proficiencies: &[],
        }],
        equipment_groups: &[
            EquipmentGroupDef {
                group: "wizard-weapon",
                options: &[
                    fixed("a", &[item("quarterstaff", "Quarterstaff")]),
                    fixed("b", &[item("dagger", "Dagger")]),
                ],
            },
            EquipmentGroupDef {
                group: "wizard-focus",
                options: &[
                    fixed("a", &[item("component-pouch", "Component Pouch")]),
                    category(
                        "b",
                        &[item("crystal", "Crystal"), item("orb", "Orb"), item("wand", "Wand")],
                    ),
                ],
            },
            EquipmentGroupDef {
                group: "wizard-pack",
                options: &[
                    fixed(
                        "a",
                        &[pack(
                            "scholars-pack",
                            "Scholar's Pack",
                            &[("book-of-lore", "Book of Lore"), ("ink", "Ink"), ("little-bag-of-sand", "Little Bag of Sand")],
                        )],
                    ),
                    fixed("b", &[EXPLORERS_PACK]),
                ],
            },
        ],
        fixed_equipment: &[("spellbook", "Spellbook")],
        starting_gold: 100,
    },
    ClassDef {
        slug: "cleric",
        name: "Cleric",
        spellcasting_ability: Some("wisdom"),
        hit_die: 8,
        saving_throws: &["wisdom", "charisma"],
        features: &["divine-domain"],
        skill_choices: 2,
        skill_options: &["history", "insight", "medicine", "persuasion", "religion"],
        cantrip_choices: 3,
        cantrip_options: &[
            "guidance", "light", "sacred-flame", "spare-the-dying", "thaumaturgy", "toll-the-dead",
        ],
        cantrips_by_endpoint: false,
        optional_features: &[],
        subclass_level: 1,
        subclasses: &[
            SubclassDef {
                slug: "life-domain",
                name: "Life Domain",
                features: &[("disciple-of-life", 1), ("preserve-life", 2)],
                spells: &[("bless", 1), ("cure-wounds", 1), ("lesser-restoration", 3)],
                proficiencies: &[("heavy-armor", 1)],
            },
            SubclassDef {
                slug: "light-domain",
                name: "Light Domain",
                features: &[("warding-flare", 1), ("radiance-of-the-dawn", 2)],
                spells: &[("burning-hands", 1), ("faerie-fire", 1)],
                proficiencies: &[],
            },
            SubclassDef {
                slug: "grave-domain",
                name: "Grave Domain",
                features: &[("path-to-the-grave", 2), ("sentinel-at-deaths-door", 6)],
                spells: &[("bane", 1), ("false-life", 1)],
                proficiencies: &[],
            },
        ],
        equipment_groups: &[
            EquipmentGroupDef {
                group: "cleric-weapon",
                options: &[
                    fixed("a", &[item("mace", "Mace")]),
                    fixed("b", &[item("warhammer", "Warhammer")]),
                ],
            },
            EquipmentGroupDef {
                group: "cleric-armor",
                options: &[
                    fixed("a", &[item("scale-mail", "Scale Mail")]),
                    fixed("b", &[item("leather-armor", "Leather Armor")]),
                    fixed("c", &[item("chain-mail", "Chain Mail")]),
                ],
            },
            EquipmentGroupDef {
                group: "cleric-pack",
                options: &[
                    fixed(
                        "a",
                        &[pack(
                            "priests-pack",
                            "Priest's Pack",
                            &[("alms-box", "Alms Box"), ("blanket", "Blanket"), ("candle", "Candle")],
                        )],
                    ),
                    fixed("b", &[EXPLORERS_PACK]),
                ],
            },
        ],
        fixed_equipment: &[("shield", "Shield"), ("holy-symbol", "Holy Symbol")],
        starting_gold: 125,
    },
];

static BACKGROUNDS: &[BackgroundDef] = &[
    BackgroundDef {
        slug: "acolyte",
        name: "Acolyte",
        features: &["shelter-of-the-faithful"],
        proficiencies: &["insight", "religion"],
        language_choices: 2,
        equipment: &[("prayer-book", "Prayer Book"), ("vestments", "Vestments"), ("incense", "Incense")],
    },
    BackgroundDef {
        slug: "soldier",
        name: "Soldier",
        features: &["military-rank"],
        proficiencies: &["athletics", "intimidation"],
        language_choices: 0,
        equipment: &[("insignia-of-rank", "Insignia of Rank"), ("bone-dice", "Set of Bone Dice")],
    },
    BackgroundDef {
        slug: "sage",
        name: "Sage",
        features: &["researcher"],
        proficiencies: &["arcana", "history"],
        language_choices: 2,
        equipment: &[("bottle-of-ink", "Bottle of Black Ink"), ("quill", "Quill"), ("small-knife", "Small Knife")],
    },
];

/// Everything the in-memory subject knows about
#[derive(Debug, Clone, Copy)]
pub struct World {
    pub races: &'static [RaceDef],
    pub classes: &'static [ClassDef],
    pub backgrounds: &'static [BackgroundDef],
}

impl Default for World {
    fn default() -> Self {
        Self::standard()
    }
}

impl World {
    /// Five races (two with subraces), four classes and three backgrounds
    pub fn standard() -> Self {
        Self {
            races: RACES,
            classes: CLASSES,
            backgrounds: BACKGROUNDS,
        }
    }

    /// A world with nothing in it
    pub fn empty() -> Self {
        Self {
            races: &[],
            classes: &[],
            backgrounds: &[],
        }
    }

    /// Race or subrace by slug
    pub fn race(&self, slug: &str) -> Option<&'static RaceDef> {
        self.races.iter().find(|r| r.slug == slug)
    }

    pub fn class(&self, slug: &str) -> Option<&'static ClassDef> {
        self.classes.iter().find(|c| c.slug == slug)
    }

    pub fn background(&self, slug: &str) -> Option<&'static BackgroundDef> {
        self.backgrounds.iter().find(|b| b.slug == slug)
    }

    /// Parent first, then the race itself
    pub fn race_chain(&self, race: &'static RaceDef) -> Vec<&'static RaceDef> {
        match race.parent.and_then(|p| self.race(p)) {
            Some(parent) => vec![parent, race],
            None => vec![race],
        }
    }

    /// The catalog view clients load through `/races`, `/classes` and `/backgrounds`
    pub fn catalog(&self) -> Catalog {
        Catalog {
            races: self.race_entries(),
            classes: self.classes.iter().map(ClassDef::entry).collect(),
            backgrounds: self.backgrounds.iter().map(BackgroundDef::entry).collect(),
        }
    }

    pub fn race_entries(&self) -> Vec<RaceEntry> {
        self.races
            .iter()
            .filter(|r| r.parent.is_none())
            .map(|race| RaceEntry {
                slug: race.slug.to_string(),
                name: race.name.to_string(),
                speed: race.speed.unwrap_or(30),
                size: race.size.to_string(),
                subraces: self
                    .races
                    .iter()
                    .filter(|sub| sub.parent == Some(race.slug))
                    .map(|sub| SubraceEntry {
                        slug: sub.slug.to_string(),
                        name: sub.name.to_string(),
                    })
                    .collect(),
            })
            .collect()
    }
}

impl ClassDef {
    pub fn subclass(&self, slug: &str) -> Option<&'static SubclassDef> {
        self.subclasses.iter().find(|s| s.slug == slug)
    }

    pub fn equipment_group(&self, group: &str) -> Option<&'static EquipmentGroupDef> {
        self.equipment_groups.iter().find(|g| g.group == group)
    }

    pub fn entry(&self) -> ClassEntry {
        ClassEntry {
            slug: self.slug.to_string(),
            name: self.name.to_string(),
            spellcaster: self.spellcasting_ability.is_some(),
            subclass_level: Some(self.subclass_level),
            subclasses: self.subclasses.iter().map(SubclassDef::entry).collect(),
            equipment_choice_groups: self
                .equipment_groups
                .iter()
                .map(|g| g.group.to_string())
                .collect(),
            fixed_equipment: self
                .fixed_equipment
                .iter()
                .map(|(slug, name)| EntityRef::new(*slug, *name))
                .collect(),
        }
    }
}

impl SubclassDef {
    pub fn entry(&self) -> SubclassEntry {
        let levelled = |entries: &[(&str, u32)]| -> Vec<LevelledEntry> {
            entries
                .iter()
                .map(|(slug, level)| LevelledEntry {
                    slug: slug.to_string(),
                    name: None,
                    level: *level,
                    is_choice_option: false,
                })
                .collect()
        };
        SubclassEntry {
            slug: self.slug.to_string(),
            name: self.name.to_string(),
            features: levelled(self.features),
            spells: self
                .spells
                .iter()
                .map(|(slug, level)| SubclassSpell {
                    slug: slug.to_string(),
                    level: *level,
                    always_prepared: true,
                })
                .collect(),
            proficiencies: levelled(self.proficiencies),
        }
    }
}

impl EquipmentOptionDef {
    pub fn to_option(&self) -> EquipmentOption {
        EquipmentOption {
            option: self.option.to_string(),
            is_category: self.is_category,
            items: self
                .items
                .iter()
                .map(|item| EquipmentOptionItem {
                    slug: item.slug.to_string(),
                    name: Some(item.name.to_string()),
                    is_fixed: item.is_fixed,
                    is_pack: item.is_pack,
                    contents: item
                        .contents
                        .iter()
                        .map(|(slug, name)| EntityRef::new(*slug, *name))
                        .collect(),
                })
                .collect(),
        }
    }
}

impl BackgroundDef {
    pub fn entry(&self) -> BackgroundEntry {
        BackgroundEntry {
            slug: self.slug.to_string(),
            name: self.name.to_string(),
            equipment: self
                .equipment
                .iter()
                .map(|(slug, name)| EntityRef::new(*slug, *name))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use wizflow_core::ClassType;

    #[test]
    fn catalog_nests_subraces_under_their_parent() {
        let catalog = World::standard().catalog();
        assert_eq!(catalog.races.len(), 5);
        let elf = catalog.race("elf").unwrap();
        let subraces: Vec<&str> = elf.subraces.iter().map(|s| s.slug.as_str()).collect();
        assert_eq!(subraces, vec!["high-elf", "wood-elf"]);
        assert!(catalog.race("high-elf").is_none());
    }

    #[test]
    fn both_class_types_have_alternatives() {
        let catalog = World::standard().catalog();
        assert_eq!(catalog.classes_matching(Some(ClassType::Spellcaster), None).len(), 2);
        assert_eq!(catalog.classes_matching(Some(ClassType::Martial), None).len(), 2);
        assert!(catalog.class("cleric").unwrap().selects_subclass_at_creation());
        assert!(!catalog.class("wizard").unwrap().selects_subclass_at_creation());
    }

    #[test]
    fn racial_and_class_grants_do_not_overlap() {
        let world = World::standard();
        let mut seen = BTreeSet::new();
        for race in world.races {
            for feature in race.features {
                assert!(seen.insert(*feature), "duplicate racial feature {}", feature);
            }
        }
        for class in world.classes {
            for feature in class.features {
                assert!(seen.insert(*feature), "duplicate class feature {}", feature);
            }
        }
        for background in world.backgrounds {
            for feature in background.features {
                assert!(seen.insert(*feature), "duplicate background feature {}", feature);
            }
        }
    }
}
