//! End-to-end runs of the harness against the in-memory subject.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use wizflow_core::domain::payload::ChoiceType;
use wizflow_core::{
    BatchRunner, ClassType, EquipmentMode, FlowExecutor, FlowGenerator, FlowStatus,
    HarnessConfig, Randomizer, StepAction, StepOutcome,
};
use wizflow_test_utils::assertions::{
    assert_fault_exposed, assert_flow_errored, assert_flow_passed, assert_pattern_reported,
};
use wizflow_test_utils::data_generators::{flow_exposing, linear_flow_with_mode, race_switch_flow};
use wizflow_test_utils::mocks::create_rejecting_subject_client;
use wizflow_test_utils::{Fault, FaultSet, InMemorySubject, World};

async fn executor_for(subject: &InMemorySubject) -> FlowExecutor {
    FlowExecutor::connect(Arc::new(subject.clone()), HarnessConfig::default())
        .await
        .expect("in-memory subject serves a catalog")
}

#[tokio::test]
async fn linear_flow_passes_for_every_class_and_mode() {
    let subject = InMemorySubject::new();
    let executor = executor_for(&subject).await;

    let mut iteration = 0;
    for class in World::standard().classes {
        for mode in EquipmentMode::ALL {
            for seed in 1..=3u64 {
                iteration += 1;
                let flow = linear_flow_with_mode(class.slug, mode);
                let mut randomizer = Randomizer::new(seed);
                let result = executor.execute(&flow, &mut randomizer, iteration).await;
                if let Err(err) = assert_flow_passed(&result) {
                    panic!("{} / {}: {}", class.slug, mode, err);
                }
            }
        }
    }
}

#[tokio::test]
async fn chaos_batch_passes_on_a_correct_subject() {
    let subject = InMemorySubject::new();
    let runner = BatchRunner::new(Arc::new(executor_for(&subject).await)).with_concurrency(4);
    let generator = FlowGenerator::new();

    let results = runner
        .run(1000, 30, |randomizer, _| generator.chaos(randomizer, 1, 3))
        .await
        .unwrap();

    assert_eq!(results.len(), 30);
    for (expected, result) in (1u32..).zip(&results) {
        assert_eq!(result.iteration(), expected);
        if let Err(err) = assert_flow_passed(result) {
            panic!("{}", err);
        }
    }
}

#[tokio::test]
async fn same_seed_replays_the_same_run() {
    let generator = FlowGenerator::new();
    let mut outcomes = Vec::new();
    for _ in 0..2 {
        let subject = InMemorySubject::new();
        let executor = executor_for(&subject).await;
        let mut randomizer = Randomizer::new(77);
        let flow = generator.chaos(&mut randomizer, 2, 4).unwrap();
        let result = executor.execute(&flow, &mut randomizer, 1).await;
        let steps: Vec<(StepAction, StepOutcome)> =
            result.steps().iter().map(|s| (s.action, s.outcome)).collect();
        outcomes.push((steps, result.randomizer_calls(), subject.request_count()));
    }
    assert_eq!(outcomes[0], outcomes[1]);
}

#[tokio::test]
async fn validate_step_completes_the_character() {
    let subject = InMemorySubject::new();
    let executor = executor_for(&subject).await;
    let generator = FlowGenerator::new();

    for seed in 1..=10u64 {
        let mut randomizer = Randomizer::new(seed);
        let result = executor.execute(&generator.linear(), &mut randomizer, 1).await;
        assert_flow_passed(&result).unwrap();

        let id = result.subject_id().unwrap();
        let api = wizflow_core::SubjectApi::new(Arc::new(subject.clone()));
        let report = api.validate(id).await.unwrap();
        let pending = api.pending_choices(id).await.unwrap();
        assert!(report.is_complete);
        assert!(!pending.iter().any(|c| c.required && c.is_open()));
    }
}

#[tokio::test]
async fn race_switch_leaves_no_racial_residue() {
    let subject = InMemorySubject::new();
    let executor = executor_for(&subject).await;

    for race in ["tiefling", "dwarf", "elf"] {
        let mut randomizer = Randomizer::new(5);
        let result = executor
            .execute(&race_switch_flow(race), &mut randomizer, 1)
            .await;
        assert_flow_passed(&result).unwrap();
        assert_eq!(result.outcome_of(StepAction::SwitchRace), vec![StepOutcome::Ok]);
    }
}

#[tokio::test]
async fn equipment_gold_equipment_toggle_restores_choice_groups() {
    let subject = InMemorySubject::new();
    let executor = executor_for(&subject).await;
    let generator = FlowGenerator::new();
    let flow = generator.force_class(
        generator.equipment_mode_toggle(&[
            EquipmentMode::Equipment,
            EquipmentMode::Gold,
            EquipmentMode::Equipment,
        ]),
        "fighter",
    );

    let mut randomizer = Randomizer::new(9);
    let result = executor.execute(&flow, &mut randomizer, 1).await;
    assert_flow_passed(&result).unwrap();
    assert_eq!(
        result.outcome_of(StepAction::SetEquipmentMode),
        vec![StepOutcome::Ok, StepOutcome::Ok, StepOutcome::Ok]
    );
    assert_eq!(
        result.outcome_of(StepAction::ResolveEquipmentChoices),
        vec![StepOutcome::Ok, StepOutcome::Skipped, StepOutcome::Ok]
    );
}

#[tokio::test]
async fn subclass_without_first_level_features_only_warns() {
    let subject = InMemorySubject::new();
    let executor = executor_for(&subject).await;
    let generator = FlowGenerator::new();
    let flow = generator.force_subclass(
        generator.force_class(generator.linear(), "cleric"),
        "grave-domain",
    );

    let mut randomizer = Randomizer::new(3);
    let result = executor.execute(&flow, &mut randomizer, 1).await;
    assert_flow_passed(&result).unwrap();
    let subclass_step = result
        .steps()
        .iter()
        .find(|s| s.action == StepAction::SetSubclass)
        .unwrap();
    assert!(subclass_step
        .warnings
        .iter()
        .any(|w| w.contains("no features at level 1")));
}

#[tokio::test]
async fn class_type_switch_passes_both_ways() {
    let subject = InMemorySubject::new();
    let executor = executor_for(&subject).await;
    let generator = FlowGenerator::new();

    for (from, to) in [
        (ClassType::Martial, ClassType::Spellcaster),
        (ClassType::Spellcaster, ClassType::Martial),
    ] {
        let mut randomizer = Randomizer::new(21);
        let result = executor
            .execute(&generator.class_type_switch(from, to), &mut randomizer, 1)
            .await;
        assert_flow_passed(&result).unwrap();
    }
}

#[tokio::test]
async fn every_fault_is_exposed_by_its_flow() {
    for fault in Fault::ALL {
        let subject = InMemorySubject::new().with_faults(FaultSet::none().with(fault));
        let executor = executor_for(&subject).await;
        let flow = flow_exposing(fault);

        let mut exposed = false;
        for seed in 1..=5u64 {
            let mut randomizer = Randomizer::new(seed);
            let result = executor.execute(&flow, &mut randomizer, 1).await;
            assert_ne!(result.status(), FlowStatus::Pass, "{} went unnoticed", fault);
            exposed |= assert_fault_exposed(&result, fault).is_ok();
        }
        assert!(exposed, "{} was not reported as {}", fault, fault.expected_pattern());
    }
}

#[tokio::test]
async fn rejected_background_is_recorded_as_http_error() {
    let subject =
        InMemorySubject::new().with_faults(FaultSet::none().with(Fault::RejectBackgroundPatch));
    let executor = executor_for(&subject).await;

    let mut randomizer = Randomizer::new(1);
    let result = executor
        .execute(&FlowGenerator::new().linear(), &mut randomizer, 1)
        .await;

    assert_flow_errored(&result, "rejected").unwrap();
    let error = result.error().unwrap();
    assert_eq!(error.action, StepAction::SetBackground);
    assert_eq!(error.status, Some(422));
    assert!(error.errors["background_slug"].is_array());
    assert_eq!(
        result.steps().last().map(|s| s.outcome),
        Some(StepOutcome::HttpError)
    );
}

#[tokio::test]
async fn malformed_pending_choices_abort_as_contract_violation() {
    let subject =
        InMemorySubject::new().with_faults(FaultSet::none().with(Fault::MalformedPendingChoices));
    let executor = executor_for(&subject).await;

    let mut randomizer = Randomizer::new(1);
    let result = executor
        .execute(&FlowGenerator::new().linear(), &mut randomizer, 1)
        .await;
    assert_flow_errored(&result, "contract_violation").unwrap();
    assert_eq!(result.error().unwrap().status, None);
    assert!(result
        .steps()
        .iter()
        .all(|s| s.outcome != StepOutcome::HttpError && s.status_code.is_none()));
}

#[tokio::test]
async fn leaked_racial_spells_are_reported_on_the_switch_step() {
    let subject =
        InMemorySubject::new().with_faults(FaultSet::none().with(Fault::LeakRacialSpells));
    let executor = executor_for(&subject).await;

    let mut randomizer = Randomizer::new(4);
    let result = executor
        .execute(&race_switch_flow("tiefling"), &mut randomizer, 1)
        .await;
    assert_pattern_reported(&result, "racial_spells_not_cleared").unwrap();
    let failure = &result.failures()[0];
    assert_eq!(failure.action, StepAction::SwitchRace);
    assert!(failure.validation.errors[0].contains("thaumaturgy"));
}

#[tokio::test]
async fn connect_fails_on_an_empty_world() {
    let subject = InMemorySubject::with_world(World::empty());
    let result = FlowExecutor::connect(Arc::new(subject), HarnessConfig::default()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn boundary_rejection_aborts_the_flow_at_create() {
    let subject = InMemorySubject::new();
    let catalog = Arc::new(subject.catalog());
    let executor = FlowExecutor::new(
        Arc::new(create_rejecting_subject_client(503)),
        catalog,
        HarnessConfig::default(),
    );

    let mut randomizer = Randomizer::new(1);
    let result = executor
        .execute(&FlowGenerator::new().linear(), &mut randomizer, 1)
        .await;
    assert_flow_errored(&result, "rejected").unwrap();
    assert_eq!(result.error().unwrap().action, StepAction::Create);
    assert_eq!(result.steps().len(), 1);
}

#[tokio::test]
async fn equipment_choices_carry_choice_groups() {
    let subject = InMemorySubject::new();
    let api = wizflow_core::SubjectApi::new(Arc::new(subject.clone()));
    let created = api.create_character("steady-elk-0001", "Brin").await.unwrap();
    api.add_class(created.id, "wizard").await.unwrap();
    api.submit_choice(created.id, "equipment-mode", &["equipment".to_string()], None)
        .await
        .unwrap();

    let groups: Vec<String> = api
        .pending_choices(created.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|c| c.choice_type == ChoiceType::Equipment)
        .map(|c| c.choice_group().to_string())
        .collect();
    assert_eq!(groups, vec!["wizard-weapon", "wizard-focus", "wizard-pack"]);
}
