use std::time::Duration;

use waystation::db::{Filter, Repository};
use waystation::models::{ActiveFlow, Flow, FlowHistory, FlowMatch, Match, MatchNote, NewMatch, SessionContext};

async fn open(dir: &tempfile::TempDir) -> Repository {
    let path = dir.path().join("waystation.db");
    Repository::new(path.to_str().unwrap()).await.unwrap()
}

#[tokio::test]
async fn saving_into_an_empty_store_creates_the_whole_chain() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open(&dir).await;
    let session = SessionContext::starting_now();

    let saved = repo
        .save_to_active_flow(session, NewMatch::new("x", "/a.py", Some(7)))
        .await
        .unwrap();

    let flows: Vec<Flow> = repo.list(Filter::all()).await.unwrap();
    let matches: Vec<Match> = repo.list(Filter::all()).await.unwrap();
    let occurrences: Vec<FlowMatch> = repo.list(Filter::all()).await.unwrap();
    let history: Vec<FlowHistory> = repo.list(Filter::all()).await.unwrap();

    assert_eq!((flows.len(), matches.len(), occurrences.len(), history.len()), (1, 1, 1, 1));
    assert_eq!(matches[0].file_name, "a.py");
    assert_eq!(occurrences[0].order_index, 0);
    assert_eq!(occurrences[0].match_id, saved.match_id);
    assert_eq!(history[0].flow_id, flows[0].id);
    assert_eq!(repo.get_active_flow_id(session).await.unwrap(), Some(flows[0].id));
}

#[tokio::test]
async fn flows_survive_a_restart_but_the_session_starts_clean() {
    let dir = tempfile::tempdir().unwrap();

    let (flow_id, occurrence) = {
        let repo = open(&dir).await;
        let session = SessionContext::starting_now();
        let saved = repo
            .save_to_active_flow(session, NewMatch::new("fn handler()", "/src/http.rs", Some(40)))
            .await
            .unwrap();
        repo.save_to_active_flow(session, NewMatch::new("fn route()", "/src/router.rs", Some(3)))
            .await
            .unwrap();
        repo.add_or_update_note(MatchNote::new(saved.flow_match_id, "entry point"))
            .await
            .unwrap();
        (saved.flow_id, saved.flow_match_id)
    };

    tokio::time::sleep(Duration::from_millis(5)).await;

    let repo = open(&dir).await;
    let fresh = SessionContext::starting_now();
    assert_eq!(repo.resolve_active_flow(fresh).await.unwrap(), ActiveFlow::Inactive);
    assert_eq!(
        repo.resolve_active_flow(SessionContext::persistent()).await.unwrap(),
        ActiveFlow::Active(flow_id)
    );

    let steps = repo.load_flow_steps(flow_id).await.unwrap();
    let lines: Vec<&str> = steps.iter().map(|s| s.matched.line.as_str()).collect();
    assert_eq!(lines, vec!["fn handler()", "fn route()"]);
    assert_eq!(steps[0].occurrence.id, occurrence);
    assert_eq!(steps[0].note.as_ref().unwrap().note, "entry point");

    // A save in the new session starts a second flow
    let saved = repo
        .save_to_active_flow(fresh, NewMatch::new("fn handler()", "/src/http.rs", Some(40)))
        .await
        .unwrap();
    assert!(saved.created_flow);
    assert_ne!(saved.flow_id, flow_id);
    assert_eq!(saved.match_id, steps[0].matched.id);

    let history = repo.get_flow_history(10).await.unwrap();
    let flow_ids: Vec<i64> = history.iter().map(|h| h.flow_id).collect();
    assert_eq!(flow_ids, vec![saved.flow_id, flow_id]);
}

#[tokio::test]
async fn reordering_persists_and_stays_dense() {
    let dir = tempfile::tempdir().unwrap();
    let flow_id = {
        let repo = open(&dir).await;
        let session = SessionContext::persistent();
        let mut flow_id = 0;
        for line in ["a", "b", "c", "d"] {
            let saved = repo
                .save_to_active_flow(session, NewMatch::new(line, format!("/{line}.rs"), Some(1)))
                .await
                .unwrap();
            flow_id = saved.flow_id;
        }
        repo.swap(flow_id, 0, 3).await.unwrap();
        let b = repo.get_flow_matches(flow_id).await.unwrap()[1].matched.id;
        repo.remove_occurrence(flow_id, b).await.unwrap();
        flow_id
    };

    let repo = open(&dir).await;
    let steps = repo.get_flow_matches(flow_id).await.unwrap();
    let order: Vec<(&str, i64)> = steps
        .iter()
        .map(|s| (s.matched.line.as_str(), s.occurrence.order_index))
        .collect();
    assert_eq!(order, vec![("d", 0), ("c", 1), ("a", 2)]);

    let err = repo.swap(flow_id, 0, 3).await.unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(repo.get_flow_matches(flow_id).await.unwrap().len(), 3);
}
