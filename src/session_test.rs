use super::*;
use crate::test_helpers::sample_user;

fn recorder() -> (Arc<Mutex<Vec<SessionState>>>, impl Fn(&SessionState) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |state: &SessionState| sink.lock().unwrap().push(state.clone()))
}

#[test]
fn default_is_unauthenticated() {
    let holder = SessionHolder::default();
    let state = holder.current();
    assert_eq!(state, SessionState::default());
    assert_eq!(state.phase(), SessionPhase::Unauthenticated);
    assert!(!state.loading);
    assert!(state.error.is_none());
}

#[test]
fn update_replaces_snapshot() {
    let holder = SessionHolder::default();
    let next = SessionState::authenticated(sample_user("alice"), "tok".into());
    holder.update(next.clone());
    assert_eq!(holder.current(), next);
    assert_eq!(holder.current().phase(), SessionPhase::Authenticated);
}

#[test]
fn subscribe_replays_current_state() {
    let holder = SessionHolder::new(SessionState { loading: true, ..SessionState::default() });
    let (seen, listener) = recorder();
    let _sub = holder.subscribe(listener);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].loading);
}

#[test]
fn subscriber_sees_every_transition_in_order() {
    let holder = SessionHolder::default();
    let (seen, listener) = recorder();
    let _sub = holder.subscribe(listener);

    holder.update(SessionState { loading: true, ..SessionState::default() });
    holder.update(SessionState::authenticated(sample_user("alice"), "tok".into()));
    holder.update(SessionState::default());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 4);
    assert!(!seen[0].loading);
    assert!(seen[1].loading);
    assert!(seen[2].is_authenticated);
    assert!(!seen[3].is_authenticated);
}

#[test]
fn dropping_subscription_detaches_listener() {
    let holder = SessionHolder::default();
    let (seen, listener) = recorder();
    let sub = holder.subscribe(listener);
    assert_eq!(holder.listener_count(), 1);

    sub.unsubscribe();
    assert_eq!(holder.listener_count(), 0);
    holder.update(SessionState { loading: true, ..SessionState::default() });
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn subscription_outliving_holder_is_harmless() {
    let holder = SessionHolder::default();
    let sub = holder.subscribe(|_| {});
    drop(holder);
    drop(sub);
}

#[test]
fn listener_may_read_holder_during_notification() {
    let holder = SessionHolder::default();
    let reader = holder.clone();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = holder.subscribe(move |_| sink.lock().unwrap().push(reader.current().is_authenticated));
    holder.update(SessionState::authenticated(sample_user("alice"), "tok".into()));
    assert_eq!(*seen.lock().unwrap(), vec![false, true]);
}

#[test]
fn invariant_violation_is_downgraded() {
    let holder = SessionHolder::default();
    holder.update(SessionState { is_authenticated: true, token: Some("tok".into()), ..SessionState::default() });
    let state = holder.current();
    assert!(!state.is_authenticated);
    assert_eq!(state.token.as_deref(), Some("tok"));
}

#[test]
fn has_role_reads_user_roles() {
    let state = SessionState::authenticated(sample_user("alice"), "tok".into());
    assert!(state.has_role("USER"));
    assert!(!state.has_role("ADMIN"));
    assert!(!SessionState::default().has_role("USER"));
}

#[tokio::test]
async fn watch_receiver_observes_latest_value() {
    let holder = SessionHolder::default();
    let mut rx = holder.watch();
    assert!(!rx.borrow().is_authenticated);

    holder.update(SessionState::authenticated(sample_user("alice"), "tok".into()));
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_authenticated);
}

#[test]
fn subscriber_racing_a_writer_still_sees_final_state() {
    for _ in 0..50 {
        let holder = SessionHolder::default();
        let writer = {
            let holder = holder.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    holder.update(SessionState { error: Some(i.to_string()), ..SessionState::default() });
                }
            })
        };
        let (seen, listener) = recorder();
        let _sub = holder.subscribe(listener);
        writer.join().unwrap();

        let last = holder.current();
        assert_eq!(last.error.as_deref(), Some("199"));
        assert!(seen.lock().unwrap().contains(&last), "final transition never delivered");
    }
}
