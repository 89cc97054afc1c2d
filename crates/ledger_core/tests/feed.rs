use ledger_core::{
    update, AppState, Effect, FeedPage, FeedRecord, FeedRequest, JobStatus, LinkedJob, Msg,
    ProbeMode, RemoteError, StatusReport,
};
use pretty_assertions::assert_eq;

fn attachment(id: &str, linked: Option<LinkedJob>) -> FeedRecord {
    FeedRecord {
        attachment_id: id.to_string(),
        filename: format!("{id}.pdf"),
        account_name: "Hartley & Sons".to_string(),
        availability: "available".to_string(),
        size_bytes: 1_024,
        linked_job: linked,
    }
}

fn linked(job_id: &str, status: JobStatus, progress: i64) -> LinkedJob {
    LinkedJob {
        job_id: job_id.to_string(),
        status: Some(status),
        step: status.as_str().to_string(),
        progress,
    }
}

/// Feed opened and first page loaded: A1 processing as J1, A2 completed as
/// J2, A3 unbound.
fn loaded_feed() -> AppState {
    let (state, _) = update(AppState::new(), Msg::FeedOpened);
    let (state, _) = update(
        state,
        Msg::FeedPageLoaded {
            generation: 1,
            offset: 0,
            result: Ok(FeedPage {
                items: vec![
                    attachment("A1", Some(linked("J1", JobStatus::Processing, 10))),
                    attachment("A2", Some(linked("J2", JobStatus::Completed, 100))),
                    attachment("A3", None),
                ],
                has_more: true,
                next_offset: Some(3),
            }),
        },
    );
    state
}

fn binding_polls(effects: &[Effect]) -> Vec<(String, String)> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::FetchBindingStatus {
                attachment_id,
                job_id,
            } => Some((attachment_id.clone(), job_id.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn opening_requests_first_page_with_defaults() {
    let (state, effects) = update(AppState::new(), Msg::FeedOpened);
    assert_eq!(
        effects,
        vec![Effect::FetchFeedPage {
            request: FeedRequest {
                limit: 25,
                offset: 0,
                probe: ProbeMode::Lazy,
            },
            generation: 1,
        }]
    );
    let view = state.view();
    assert!(view.feed.active);
    assert!(view.feed.loading);
}

#[test]
fn linked_jobs_become_bindings() {
    let state = loaded_feed();
    let view = state.view();
    assert_eq!(view.feed.items.len(), 3);
    assert!(!view.feed.loading);
    assert!(view.feed.has_more);

    let a1 = view.feed.items[0].binding.clone().expect("A1 bound");
    assert_eq!(a1.job_id.as_deref(), Some("J1"));
    assert_eq!(a1.status, JobStatus::Processing);
    assert_eq!(a1.progress, 10);
    assert!(!a1.creating);
    assert!(view.feed.items[2].binding.is_none());
}

#[test]
fn tick_polls_only_in_progress_bindings() {
    let state = loaded_feed();
    let (state, effects) = update(state, Msg::Tick { now: 2_499 });
    assert!(binding_polls(&effects).is_empty());

    let (_state, effects) = update(state, Msg::Tick { now: 2_500 });
    assert_eq!(
        binding_polls(&effects),
        vec![("A1".to_string(), "J1".to_string())]
    );
}

#[test]
fn unchanged_binding_status_does_not_mark_dirty() {
    let mut state = loaded_feed();
    state.consume_dirty();

    let (mut state, _) = update(
        state,
        Msg::BindingStatusReceived {
            attachment_id: "A1".to_string(),
            job_id: "J1".to_string(),
            result: Ok(StatusReport {
                status: Some(JobStatus::Processing),
                step: Some("processing".to_string()),
                progress: Some(10),
                ..StatusReport::default()
            }),
        },
    );
    assert!(!state.consume_dirty());

    let (mut state, _) = update(
        state,
        Msg::BindingStatusReceived {
            attachment_id: "A1".to_string(),
            job_id: "J1".to_string(),
            result: Ok(StatusReport {
                status: Some(JobStatus::Completed),
                progress: Some(100),
                ..StatusReport::default()
            }),
        },
    );
    assert!(state.consume_dirty());

    // Completed bindings drop out of the poll set.
    let (_state, effects) = update(state, Msg::Tick { now: 2_500 });
    assert!(binding_polls(&effects).is_empty());
}

#[test]
fn binding_poll_failures_are_silent() {
    let state = loaded_feed();
    let (state, effects) = update(
        state,
        Msg::BindingStatusReceived {
            attachment_id: "A1".to_string(),
            job_id: "J1".to_string(),
            result: Err(RemoteError::transient("connection reset")),
        },
    );
    assert!(effects.is_empty());
    assert!(state.view().notice.is_none());

    let (_state, effects) = update(state, Msg::Tick { now: 2_500 });
    assert_eq!(binding_polls(&effects).len(), 1);
}

#[test]
fn closing_stops_background_polling() {
    let state = loaded_feed();
    let (state, _) = update(state, Msg::FeedClosed);
    assert!(!state.view().feed.active);
    let (_state, effects) = update(state, Msg::Tick { now: 10_000 });
    assert!(effects.is_empty());
}

#[test]
fn begin_process_binds_optimistically_then_confirms() {
    let state = loaded_feed();
    let (state, effects) = update(
        state,
        Msg::BeginProcessClicked {
            attachment_id: "A3".to_string(),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::BeginProcess {
            attachment_id: "A3".to_string()
        }]
    );
    let pending = state.view().feed.items[2].binding.clone().expect("pending");
    assert!(pending.creating);

    // A second click while creating does nothing.
    let (state, effects) = update(
        state,
        Msg::BeginProcessClicked {
            attachment_id: "A3".to_string(),
        },
    );
    assert!(effects.is_empty());

    let (state, effects) = update(
        state,
        Msg::ProcessBegun {
            attachment_id: "A3".to_string(),
            result: Ok("J3".to_string()),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::PersistJobCache {
            records: state.job_cache().records().to_vec(),
        }]
    );
    let cached = &state.job_cache().records()[0];
    assert_eq!(cached.job_id, "J3");
    assert_eq!(cached.file_name, "A3.pdf");

    let bound = state.view().feed.items[2].binding.clone().expect("bound");
    assert_eq!(bound.job_id.as_deref(), Some("J3"));
    assert!(!bound.creating);

    let (_state, effects) = update(state, Msg::Tick { now: 2_500 });
    assert_eq!(
        binding_polls(&effects),
        vec![
            ("A1".to_string(), "J1".to_string()),
            ("A3".to_string(), "J3".to_string()),
        ]
    );
}

#[test]
fn failed_creation_rolls_back_the_binding() {
    let state = loaded_feed();
    let (state, _) = update(
        state,
        Msg::BeginProcessClicked {
            attachment_id: "A3".to_string(),
        },
    );
    let (state, effects) = update(
        state,
        Msg::ProcessBegun {
            attachment_id: "A3".to_string(),
            result: Err(RemoteError::transient("http status 500")),
        },
    );
    assert!(effects.is_empty());
    let view = state.view();
    assert!(view.feed.items[2].binding.is_none());
    assert!(view.notice.is_some());

    let (_state, effects) = update(
        state,
        Msg::BeginProcessClicked {
            attachment_id: "A3".to_string(),
        },
    );
    assert_eq!(effects.len(), 1);
}

#[test]
fn load_more_appends_and_refresh_replaces() {
    let state = loaded_feed();
    let (state, effects) = update(state, Msg::FeedLoadMore);
    assert_eq!(
        effects,
        vec![Effect::FetchFeedPage {
            request: FeedRequest {
                limit: 25,
                offset: 3,
                probe: ProbeMode::Lazy,
            },
            generation: 1,
        }]
    );
    // Only one page request at a time.
    let (state, effects) = update(state, Msg::FeedLoadMore);
    assert!(effects.is_empty());

    let (state, _) = update(
        state,
        Msg::FeedPageLoaded {
            generation: 1,
            offset: 3,
            result: Ok(FeedPage {
                items: vec![attachment("A4", None)],
                has_more: false,
                next_offset: None,
            }),
        },
    );
    let view = state.view();
    assert_eq!(view.feed.items.len(), 4);
    assert!(!view.feed.has_more);

    let (state, effects) = update(state, Msg::FeedLoadMore);
    assert!(effects.is_empty());

    let (state, _) = update(
        state,
        Msg::FeedPageLoaded {
            generation: 1,
            offset: 0,
            result: Ok(FeedPage {
                items: vec![attachment("A9", None)],
                has_more: false,
                next_offset: None,
            }),
        },
    );
    let ids: Vec<_> = state
        .view()
        .feed
        .items
        .iter()
        .map(|item| item.attachment_id.clone())
        .collect();
    assert_eq!(ids, vec!["A9"]);
}

#[test]
fn configured_page_size_is_clamped() {
    let state = AppState::new().with_feed_options(500, ProbeMode::Eager);
    let (_state, effects) = update(state, Msg::FeedOpened);
    assert_eq!(
        effects,
        vec![Effect::FetchFeedPage {
            request: FeedRequest {
                limit: 200,
                offset: 0,
                probe: ProbeMode::Eager,
            },
            generation: 1,
        }]
    );

    let state = AppState::new().with_feed_options(0, ProbeMode::Lazy);
    let (_state, effects) = update(state, Msg::FeedOpened);
    assert!(matches!(
        effects.as_slice(),
        [Effect::FetchFeedPage {
            request: FeedRequest { limit: 1, .. },
            ..
        }]
    ));
}

#[test]
fn page_from_before_a_refresh_is_dropped() {
    let state = loaded_feed();
    let (state, _) = update(state, Msg::FeedLoadMore);
    let (state, _) = update(state, Msg::FeedClosed);
    let (state, effects) = update(state, Msg::FeedOpened);
    assert!(matches!(
        effects.as_slice(),
        [Effect::FetchFeedPage { generation: 2, .. }]
    ));

    let (state, _) = update(
        state,
        Msg::FeedPageLoaded {
            generation: 2,
            offset: 0,
            result: Ok(FeedPage {
                items: vec![attachment("A1", None), attachment("A2", None)],
                has_more: true,
                next_offset: Some(2),
            }),
        },
    );
    // The load-more issued before the refresh lands late.
    let (state, _) = update(
        state,
        Msg::FeedPageLoaded {
            generation: 1,
            offset: 3,
            result: Ok(FeedPage {
                items: vec![attachment("A4", None)],
                has_more: false,
                next_offset: None,
            }),
        },
    );

    let view = state.view();
    let ids: Vec<_> = view
        .feed
        .items
        .iter()
        .map(|item| item.attachment_id.as_str())
        .collect();
    assert_eq!(ids, vec!["A1", "A2"]);
    assert!(view.feed.has_more);

    let (_state, effects) = update(state, Msg::FeedLoadMore);
    assert_eq!(
        effects,
        vec![Effect::FetchFeedPage {
            request: FeedRequest {
                limit: 25,
                offset: 2,
                probe: ProbeMode::Lazy,
            },
            generation: 2,
        }]
    );
}

#[test]
fn failure_from_an_older_generation_is_silent() {
    let state = loaded_feed();
    let (state, _) = update(state, Msg::FeedLoadMore);
    let (state, _) = update(state, Msg::FeedOpened);
    let (state, effects) = update(
        state,
        Msg::FeedPageLoaded {
            generation: 1,
            offset: 3,
            result: Err(RemoteError::transient("timed out")),
        },
    );
    assert!(effects.is_empty());
    let view = state.view();
    assert!(view.notice.is_none());
    assert!(view.feed.loading, "refresh still pending");
}

#[test]
fn refresh_forgets_bindings_of_records_no_longer_listed() {
    let state = loaded_feed();
    let (state, _) = update(
        state,
        Msg::BeginProcessClicked {
            attachment_id: "A3".to_string(),
        },
    );
    let (state, _) = update(
        state,
        Msg::FeedPageLoaded {
            generation: 1,
            offset: 0,
            result: Ok(FeedPage {
                items: vec![attachment(
                    "A2",
                    Some(linked("J2", JobStatus::Completed, 100)),
                )],
                has_more: false,
                next_offset: None,
            }),
        },
    );

    assert!(state.feed().binding("A1").is_none());
    assert!(state.feed().binding("A2").is_some());
    assert!(
        state
            .feed()
            .binding("A3")
            .is_some_and(|binding| binding.job_id.is_none()),
        "creation in flight keeps its binding"
    );
    let (_state, effects) = update(state, Msg::Tick { now: 2_500 });
    assert!(binding_polls(&effects).is_empty());
}
