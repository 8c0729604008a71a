use std::{collections::BTreeMap, sync::Arc, time::Duration};

use hotseat_back::{
    config::QuizConfig,
    dao::{
        remote_store::{
            Partition, RemoteStore,
            memory::{MemoryStore, MemoryStoreError},
        },
        storage::StoreError,
    },
    dto::{
        phase::VisibleGamePhase,
        setup::{PrizeStructureInput, TeamInput},
    },
    error::ServiceError,
    services::{
        auth::StaticAuth,
        config_sync::SyncOutcome,
        game_service, lifeline_service,
        question_bank::{LocalQuestionBank, QuestionSet},
        setup_service,
    },
    state::{
        AppState, SharedState,
        game::{
            AnswerOption, CompletionReason, GameState, GameStatus, LifelineKind, Question, Team,
        },
        lifeline_timer::Resolution,
        sync::SyncedSnapshot,
    },
};
use serde_json::json;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

fn question(n: u32) -> Question {
    Question {
        prompt: format!("Question {n}?"),
        options: AnswerOption::ALL
            .into_iter()
            .map(|option| (option, format!("{option} for {n}")))
            .collect(),
        correct_option: "B".into(),
    }
}

fn config() -> QuizConfig {
    QuizConfig {
        questions_per_team: 3,
        ..QuizConfig::default()
    }
}

fn state_with(auth: StaticAuth) -> SharedState {
    let bank = LocalQuestionBank::new([QuestionSet {
        id: "set-1".into(),
        checksum: "c0ffee".into(),
        uploaded_at: Some(1_700_000_000_000),
        questions: (1..=3).map(question).collect(),
    }]);
    AppState::new(config(), Arc::new(bank), Arc::new(auth))
}

async fn connect(state: &SharedState) -> MemoryStore {
    let store = MemoryStore::new();
    let shared: Arc<dyn RemoteStore> = Arc::new(store.clone());
    state.install_store(shared.clone()).await;
    state.sync().attach(shared).await;
    store
}

async fn write_team(store: &MemoryStore, id: &str, created_at: i64) {
    store
        .write(
            &Partition::Teams.child(id),
            json!({
                "name": format!("Team {id}"),
                "participants": ["Ada"],
                "contactPhone": "+33612345678",
                "createdAt": created_at,
            }),
        )
        .await
        .unwrap();
}

/// Two teams, a three-step ladder with a milestone on question 1 and the local set published.
async fn ready_match() -> (SharedState, MemoryStore) {
    let state = state_with(StaticAuth::new(Some("host-1".into())));
    let store = connect(&state).await;

    write_team(&store, "alpha", 1).await;
    write_team(&store, "beta", 2).await;
    setup_service::set_prize_structure(
        &state,
        PrizeStructureInput {
            values: vec![100, 200, 500],
            milestones: vec![1],
        },
    )
    .await
    .unwrap();
    setup_service::publish_question_sets(&state).await.unwrap();

    (state, store)
}

async fn stored_game(store: &MemoryStore) -> GameState {
    let value = store.read(Partition::GameState.path()).await.unwrap();
    serde_json::from_value(value.unwrap()).unwrap()
}

async fn stored_team(store: &MemoryStore, id: &str) -> Team {
    let value = store.read(&Partition::Teams.child(id)).await.unwrap();
    serde_json::from_value(value.unwrap()).unwrap()
}

async fn answer(state: &SharedState, option: &str) {
    game_service::show_question(state, None).await.unwrap();
    game_service::show_options(state, None).await.unwrap();
    game_service::select_option(state, option.into(), None)
        .await
        .unwrap();
    game_service::lock_answer(state, None).await.unwrap();
}

#[tokio::test]
async fn full_match_runs_until_the_queue_is_exhausted() {
    let (state, store) = ready_match().await;

    let started = game_service::start_match(&state, None).await.unwrap();
    assert!(started.applied);
    assert_eq!(started.to, VisibleGamePhase::AwaitingQuestion);
    assert_eq!(started.game.current_team_id.as_deref(), Some("alpha"));
    assert_eq!(started.game.current_question_number, 1);
    assert!(started.game.current_question.is_none());
    assert!(!started.game.question_visible);
    assert!(started.game.selected_option.is_none());
    assert_eq!(started.game.play_queue, vec!["alpha", "beta"]);

    // Alpha answers question 1 correctly, then misses question 2.
    answer(&state, " b ").await;
    assert_eq!(stored_team(&store, "alpha").await.prize_won, 100);
    game_service::advance_question(&state, None).await.unwrap();
    assert_eq!(stored_game(&store).await.current_question_number, 2);

    answer(&state, "a").await;
    let game = stored_game(&store).await;
    assert!(game.answer_revealed);
    assert_eq!(game.option_was_correct, Some(false));
    assert_eq!(game.correct_option, Some(AnswerOption::B));

    let advanced = game_service::advance_question(&state, None).await.unwrap();
    assert_eq!(advanced.game.current_team_id.as_deref(), Some("beta"));
    assert_eq!(advanced.game.current_question_number, 1);
    assert_eq!(advanced.game.play_queue, vec!["beta"]);
    // Milestone on question 1 is kept.
    assert_eq!(stored_team(&store, "alpha").await.prize_won, 100);

    // Beta misses straight away and the match completes.
    answer(&state, "c").await;
    let finished = game_service::advance_question(&state, None).await.unwrap();
    assert_eq!(finished.to, VisibleGamePhase::Completed);
    assert_eq!(finished.game.game_status, GameStatus::Completed);
    assert_eq!(
        finished.game.completion_reason,
        Some(CompletionReason::QueueExhausted)
    );
    assert!(finished.game.current_team_id.is_none());
    assert_eq!(stored_team(&store, "beta").await.prize_won, 0);
}

#[tokio::test]
async fn lock_before_options_changes_nothing() {
    let (state, store) = ready_match().await;
    game_service::start_match(&state, None).await.unwrap();
    game_service::show_question(&state, None).await.unwrap();
    let before = stored_game(&store).await;

    let err = game_service::lock_answer(&state, None).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)));
    assert_eq!(stored_game(&store).await, before);
}

#[tokio::test]
async fn phone_a_friend_cannot_be_used_twice_by_a_team() {
    let (state, store) = ready_match().await;
    game_service::start_match(&state, None).await.unwrap();
    game_service::show_question(&state, None).await.unwrap();
    game_service::show_options(&state, None).await.unwrap();

    let activated =
        lifeline_service::activate_lifeline(&state, LifelineKind::PhoneAFriend, None)
            .await
            .unwrap();
    assert_eq!(activated.to, VisibleGamePhase::PhoneAFriend);
    assert!(stored_team(&store, "alpha").await.lifelines.phone_a_friend);

    let resumed = lifeline_service::resume_from_lifeline(&state, None)
        .await
        .unwrap();
    assert!(resumed.applied);
    assert_eq!(resumed.timer, Some(Resolution::Cancelled));
    assert_eq!(resumed.to, VisibleGamePhase::OptionsShown);

    let err = lifeline_service::activate_lifeline(&state, LifelineKind::PhoneAFriend, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_activation_and_resume_never_orphan_the_countdown() {
    for _ in 0..50 {
        let (state, store) = ready_match().await;
        game_service::start_match(&state, None).await.unwrap();
        game_service::show_question(&state, None).await.unwrap();
        game_service::show_options(&state, None).await.unwrap();

        let activating = tokio::spawn({
            let state = state.clone();
            async move {
                lifeline_service::activate_lifeline(&state, LifelineKind::PhoneAFriend, None).await
            }
        });
        let resuming = tokio::spawn({
            let state = state.clone();
            async move { lifeline_service::resume_from_lifeline(&state, None).await }
        });
        activating.await.unwrap().unwrap();
        resuming.await.unwrap().unwrap();

        let active = stored_game(&store).await.active_lifeline;
        let running = lifeline_service::countdown_running(&state).await;
        assert_eq!(running, active == Some(LifelineKind::PhoneAFriend));
    }
}

#[tokio::test]
async fn overrides_stop_a_running_countdown() {
    let (state, store) = ready_match().await;
    game_service::start_match(&state, None).await.unwrap();
    game_service::show_question(&state, None).await.unwrap();
    game_service::show_options(&state, None).await.unwrap();
    lifeline_service::activate_lifeline(&state, LifelineKind::PhoneAFriend, None)
        .await
        .unwrap();
    assert!(lifeline_service::countdown_running(&state).await);

    let completed = game_service::complete_match(&state, None).await.unwrap();
    assert_eq!(completed.to, VisibleGamePhase::Completed);
    assert!(!lifeline_service::countdown_running(&state).await);
    assert!(stored_game(&store).await.active_lifeline.is_none());
}

#[tokio::test]
async fn fifty_fifty_hides_two_wrong_options() {
    let (state, _store) = ready_match().await;
    game_service::start_match(&state, None).await.unwrap();
    game_service::show_question(&state, None).await.unwrap();
    game_service::show_options(&state, None).await.unwrap();

    let activated = lifeline_service::activate_lifeline(&state, LifelineKind::FiftyFifty, None)
        .await
        .unwrap();
    let hidden = &activated.game.hidden_options;
    assert_eq!(hidden.len(), 2);
    assert!(!hidden.contains(&AnswerOption::B));

    let resumed = lifeline_service::resume_from_lifeline(&state, None)
        .await
        .unwrap();
    assert!(resumed.applied);
    assert!(resumed.timer.is_none());
    assert_eq!(resumed.game.hidden_options.len(), 2);
}

#[tokio::test]
async fn stale_observation_is_retried_against_fresh_state() {
    let (state, store) = ready_match().await;
    let started = game_service::start_match(&state, None).await.unwrap();
    assert!(started.game.last_updated > 0);

    // The host panel acted on a snapshot older than the start.
    let shown = game_service::show_question(&state, Some(0)).await.unwrap();
    assert!(shown.applied);
    assert!(shown.game.last_updated > started.game.last_updated);
    assert!(stored_game(&store).await.question_visible);
}

#[tokio::test]
async fn setup_is_frozen_once_the_match_started() {
    let (state, _store) = ready_match().await;
    let team = TeamInput {
        name: "Gamma".into(),
        participants: vec!["Lin".into()],
        contact_phone: Some("+33612345678".into()),
    };
    let created = setup_service::create_team(&state, team).await.unwrap();
    assert!(!created.id.is_empty());

    game_service::start_match(&state, None).await.unwrap();
    let err = setup_service::delete_team(&state, &created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn incomplete_setup_blocks_start_with_a_report() {
    let state = state_with(StaticAuth::anonymous());
    connect(&state).await;

    let err = game_service::start_match(&state, None).await.unwrap_err();
    let ServiceError::SetupIncomplete(report) = err else {
        panic!("expected a readiness failure, got {err:?}");
    };
    assert!(!report.is_ready);
    assert!(report.failed_checks().count() >= 2);
}

#[tokio::test]
async fn sync_layer_loads_every_partition_and_isolates_errors() {
    let state = state_with(StaticAuth::anonymous());
    assert!(state.sync().current().is_loading());

    let store = connect(&state).await;
    let loaded = timeout(WAIT, state.sync().loaded()).await.unwrap();
    assert!(!loaded.is_loading());

    store.inject_subscription_error(
        Partition::Teams.path(),
        StoreError::unavailable("stream reset".into(), MemoryStoreError::Offline),
    );
    write_team(&store, "alpha", 1).await;
    store
        .write(Partition::PrizeStructure.path(), json!({"values": [1, 2, 3]}))
        .await
        .unwrap();

    let mut rx = state.sync().subscribe();
    let snapshot: SyncedSnapshot = timeout(
        WAIT,
        rx.wait_for(|snapshot| {
            snapshot.prize_structure.is_some() && snapshot.teams.contains_key("alpha")
        }),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert_eq!(
        snapshot.prize_structure.map(|ladder| ladder.values),
        Some(vec![1, 2, 3])
    );
    // The good delivery after the error cleared it.
    assert!(!snapshot.errors.contains_key(&Partition::Teams));
}

#[tokio::test]
async fn config_reconciler_skips_when_not_permitted() {
    let state = state_with(StaticAuth::new(Some("host-1".into())));
    let store = connect(&state).await;

    store.deny(Partition::Config.path());
    let outcome = setup_service::sync_config(&state).await.unwrap();
    assert_eq!(
        outcome,
        SyncOutcome::Skipped {
            reason: "permission denied".into()
        }
    );

    store.allow(Partition::Config.path());
    let outcome = setup_service::sync_config(&state).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Initialized);
    let outcome = setup_service::sync_config(&state).await.unwrap();
    assert_eq!(outcome, SyncOutcome::NoChange);

    let anonymous = state_with(StaticAuth::anonymous());
    connect(&anonymous).await;
    let outcome = setup_service::sync_config(&anonymous).await.unwrap();
    assert!(matches!(outcome, SyncOutcome::Skipped { .. }));
}

#[tokio::test]
async fn required_sets_report_missing_local_content() {
    let (state, store) = ready_match().await;
    let before = setup_service::required_sets(&state).await.unwrap();
    assert!(before.report.is_none());

    // Advertise an extra set the local bank cannot serve.
    store
        .write(
            &Partition::QuestionSets.child("remote-only"),
            json!({"questionCount": 10, "checksum": "ff"}),
        )
        .await
        .unwrap();
    game_service::start_match(&state, None).await.unwrap();

    let report = setup_service::required_sets(&state)
        .await
        .unwrap()
        .report
        .unwrap();
    let assigned: BTreeMap<_, _> = stored_game(&store).await.question_set_assignments;
    assert_eq!(assigned.len(), 2);
    // Two usable sets for two teams: each team gets its own.
    assert!(!report.all_found);
    assert_eq!(report.missing_set_ids, vec!["remote-only".to_string()]);
    assert_eq!(report.found_set_ids, vec!["set-1".to_string()]);
}
