use std::{sync::Arc, time::Duration};

use serde_json::json;
use tokio::time::timeout;
use trivia_live_back::{
    dao::{
        live_game::LiveGameRepository, memory_store::MemoryStore, models::QuizEntity,
        shared_store::SharedStore,
    },
    services::slides::Slide,
    state::{
        game::GameState,
        master::MasterController,
        player::{PlayerAgent, PlayerView},
        presenter::PresenterProjection,
        state_machine::GamePhase,
    },
};

fn two_question_quiz() -> QuizEntity {
    serde_json::from_value(json!({
        "rounds": {
            "round0": {
                "title": "Warm-up",
                "questions": {
                    "q1": { "type": "text_input", "text": "Capital of France?", "answer": "Paris", "points": 10 },
                    "q2": { "type": "true_false", "text": "Fish can fly.", "answer": "true", "points": 10 }
                }
            }
        }
    }))
    .unwrap()
}

async fn wait_for_slide(
    rx: &mut tokio::sync::watch::Receiver<Slide>,
    matches: impl Fn(&Slide) -> bool,
) -> Slide {
    timeout(Duration::from_secs(2), async {
        loop {
            {
                let slide = rx.borrow_and_update();
                if matches(&slide) {
                    return slide.clone();
                }
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("presenter never showed the expected slide")
}

#[tokio::test]
async fn round_robin_game_commits_scores_and_ends() {
    let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
    let repo = LiveGameRepository::new(store.clone());
    repo.publish_quiz("friday", &two_question_quiz()).await.unwrap();

    let presenter = Arc::new(PresenterProjection::new(store.clone()));
    let mut slides = presenter.watch();
    tokio::spawn(presenter.clone().run(|_| {}));

    let master = MasterController::new(store.clone());

    let outcome = master.start().await.unwrap();
    assert_eq!(outcome.phase(), Some(GamePhase::Waiting));
    wait_for_slide(&mut slides, |slide| matches!(slide, Slide::Welcome { .. })).await;

    let alice = PlayerAgent::join(store.clone(), "Alice").await.unwrap();
    assert!(matches!(
        alice.current_view().await.unwrap(),
        PlayerView::Lobby { .. }
    ));

    let outcome = master.advance().await.unwrap();
    assert_eq!(outcome.state, Some(GameState::round_interstitial("round0")));
    wait_for_slide(&mut slides, |slide| matches!(slide, Slide::Round { .. })).await;

    let outcome = master.advance().await.unwrap();
    assert_eq!(outcome.state, Some(GameState::active("round0", "q1")));
    wait_for_slide(&mut slides, |slide| matches!(slide, Slide::Question { .. })).await;

    alice.submit_answer(json!("paris")).await.unwrap();
    assert!(alice.submit_answer(json!("Paris")).await.is_err());

    let outcome = master.reveal().await.unwrap();
    assert_eq!(outcome.phase(), Some(GamePhase::Moderating));
    assert_eq!(outcome.draft.get("Alice"), Some(10));
    wait_for_slide(&mut slides, |slide| matches!(slide, Slide::AnswerReveal { .. })).await;

    let outcome = master.advance().await.unwrap();
    assert_eq!(outcome.state, Some(GameState::active("round0", "q2")));
    let record = repo.player("Alice").await.unwrap().unwrap();
    assert_eq!(record.score, 10);
    assert!(record.answer.is_empty());

    alice.submit_answer(json!("false")).await.unwrap();

    let outcome = master.reveal().await.unwrap();
    assert_eq!(outcome.draft.get("Alice"), Some(0));

    let outcome = master.advance().await.unwrap();
    assert_eq!(outcome.phase(), Some(GamePhase::Ended));
    assert_eq!(repo.player("Alice").await.unwrap().unwrap().score, 10);

    let ended = repo.game_state().await.unwrap().unwrap();
    assert_eq!(ended, GameState::ended());
    assert!(matches!(
        alice.current_view().await.unwrap(),
        PlayerView::Ended { score: 10 }
    ));
    wait_for_slide(&mut slides, |slide| matches!(slide, Slide::Welcome { .. })).await;
}

#[tokio::test]
async fn restarting_clears_every_player() {
    let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
    let repo = LiveGameRepository::new(store.clone());
    repo.publish_quiz("friday", &two_question_quiz()).await.unwrap();
    let master = MasterController::new(store.clone());
    master.start().await.unwrap();

    for name in ["Alice", "Bob", "Carol"] {
        PlayerAgent::join(store.clone(), name).await.unwrap();
    }
    assert_eq!(repo.players().await.unwrap().len(), 3);

    master.start().await.unwrap();
    assert!(repo.players().await.unwrap().is_empty());
}
