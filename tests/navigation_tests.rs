use brrtnav::cache::DataCache;
use brrtnav::definition::RouteDefinition;
use brrtnav::loader::loader;
use brrtnav::navigation::{
    LeaveTarget, MemoryHistory, NavigateOptions, Navigation, Navigator, NavigatorOptions,
    RetryHandle, MAX_REDIRECTS,
};
use brrtnav::request::RequestScope;
use brrtnav::{ExecutionMode, Intent, LoadError, NavigationError, Router};
use futures::executor::block_on;
use futures::FutureExt;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

mod common;
use common::fixtures::{navigator, navigator_with, recording_loader, LoadLog};
use common::history::RecordingHistory;

fn go(nav: &Navigator, to: &str) {
    let result = nav.navigate(to, NavigateOptions::default()).unwrap();
    assert!(result.is_started(), "navigation to {to} did not start: {result:?}");
}

fn pages() -> Vec<RouteDefinition> {
    vec![
        RouteDefinition::new("/").handler("home"),
        RouteDefinition::new("/a").handler("a"),
        RouteDefinition::new("/b").handler("b"),
        RouteDefinition::new("/list").handler("list"),
    ]
}

#[test]
fn test_navigate_twice_is_noop() {
    let history = Arc::new(MemoryHistory::new());
    let nav = navigator(&pages(), history.clone());

    go(&nav, "/a");
    let again = nav.navigate("/a", NavigateOptions::default()).unwrap();
    assert!(matches!(again, Navigation::Unchanged));
    assert_eq!(history.entries(), vec!["/", "/a"]);
    assert!(!nav.is_routing());
}

#[test]
fn test_same_path_with_new_state_navigates() {
    let history = Arc::new(MemoryHistory::new());
    let nav = navigator(&pages(), history.clone());
    go(&nav, "/a");

    let with_state = NavigateOptions {
        state: Some(json!({ "from": "menu" })),
        ..NavigateOptions::default()
    };
    let result = nav.navigate("/a", with_state.clone()).unwrap();
    assert!(result.is_started());
    drop(result);
    assert_eq!(nav.location().state, Some(json!({ "from": "menu" })));
    assert!(matches!(
        nav.navigate("/a", with_state).unwrap(),
        Navigation::Unchanged
    ));
}

#[test]
fn test_before_leave_veto_keeps_location() {
    let history = Arc::new(RecordingHistory::new("/a"));
    let nav = navigator(&pages(), history.clone());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in = Arc::clone(&seen);
    let _guard = nav.on_before_leave(move |event| {
        seen_in
            .lock()
            .unwrap()
            .push((event.from.pathname.clone(), event.to.clone()));
        event.prevent_default();
    });

    let result = nav.navigate("/b", NavigateOptions::default()).unwrap();
    assert!(matches!(result, Navigation::Blocked));
    assert_eq!(nav.location().pathname, "/a");
    assert!(history.writes().is_empty());
    assert_eq!(
        seen.lock().unwrap().clone(),
        vec![("/a".to_string(), LeaveTarget::Path("/b".to_string()))]
    );
}

#[test]
fn test_unsubscribed_listener_no_longer_vetoes() {
    let history = Arc::new(MemoryHistory::new());
    let nav = navigator(&pages(), history.clone());
    let guard = nav.on_before_leave(|event| event.prevent_default());
    assert!(matches!(
        nav.navigate("/a", NavigateOptions::default()).unwrap(),
        Navigation::Blocked
    ));
    drop(guard);
    assert!(nav.before_leave().is_empty());
    go(&nav, "/a");
    assert_eq!(nav.location().pathname, "/a");
}

#[test]
fn test_forced_retry_skips_confirmation() {
    let history = Arc::new(MemoryHistory::new());
    let nav = navigator(&pages(), history.clone());
    let asked = Arc::new(AtomicUsize::new(0));
    let pending: Arc<Mutex<Option<RetryHandle>>> = Arc::new(Mutex::new(None));

    let asked_in = Arc::clone(&asked);
    let pending_in = Arc::clone(&pending);
    let _guard = nav.on_before_leave(move |event| {
        asked_in.fetch_add(1, Ordering::SeqCst);
        event.prevent_default();
        *pending_in.lock().unwrap() = Some(event.retry_handle());
    });

    assert!(matches!(
        nav.navigate("/b", NavigateOptions::default()).unwrap(),
        Navigation::Blocked
    ));
    let retry = pending.lock().unwrap().take().unwrap();
    retry.retry(true);

    assert_eq!(asked.load(Ordering::SeqCst), 1);
    assert_eq!(nav.location().pathname, "/b");
    assert_eq!(history.entries(), vec!["/", "/b"]);
}

#[test]
fn test_later_navigation_supersedes_pending_one() {
    let history = Arc::new(MemoryHistory::new());
    let nav = navigator(&pages(), history.clone());

    let Navigation::Started(first) = nav.navigate("/a", NavigateOptions::default()).unwrap()
    else {
        panic!("expected a started navigation");
    };
    let Navigation::Started(second) = nav.navigate("/b", NavigateOptions::default()).unwrap()
    else {
        panic!("expected a started navigation");
    };
    assert!(nav.is_routing());
    assert_eq!(nav.location().pathname, "/b");

    assert!(!first.settle());
    assert!(history.entries().len() == 1);
    assert!(second.settle());
    assert_eq!(history.entries(), vec!["/", "/b"]);
    assert!(!nav.is_routing());
}

#[test]
fn test_replace_option_of_first_navigation_wins() {
    let history = Arc::new(MemoryHistory::new());
    let nav = navigator(&pages(), history.clone());
    go(&nav, "/a");

    let replace = NavigateOptions {
        replace: true,
        ..NavigateOptions::default()
    };
    let Navigation::Started(outer) = nav.navigate("/b", replace).unwrap() else {
        panic!("expected a started navigation");
    };
    let inner = nav.navigate("/list", NavigateOptions::default()).unwrap();
    drop(inner);
    drop(outer);
    assert_eq!(history.entries(), vec!["/", "/list"]);
}

#[test]
fn test_redirect_loop_is_bounded() {
    // every redirect nests a navigate/commit/load frame set
    std::thread::Builder::new()
        .stack_size(32 * 1024 * 1024)
        .spawn(redirect_loop_scenario)
        .unwrap()
        .join()
        .unwrap();
}

fn redirect_loop_scenario() {
    let routes = vec![RouteDefinition::new("/r/:n").load(loader(|args| {
        let n: usize = args.params["n"].parse().unwrap();
        match args
            .context
            .navigate(format!("/r/{}", n + 1), NavigateOptions::default())
        {
            Ok(nav) => async move {
                let _held = nav;
                Ok(None)
            }
            .boxed(),
            Err(err) => futures::future::ready(Err(LoadError::from(err))).boxed(),
        }
    }))];
    let history = Arc::new(MemoryHistory::new());
    let nav = navigator(&routes, history.clone());

    let start = nav.navigate("/r/0", NavigateOptions::default()).unwrap();
    assert!(start.is_started());
    assert_eq!(nav.location().pathname, format!("/r/{}", MAX_REDIRECTS - 1));

    let last = nav.route_data(0).unwrap();
    assert_eq!(
        block_on(last),
        Err(LoadError::Navigation(NavigationError::TooManyRedirects {
            depth: MAX_REDIRECTS
        }))
    );

    drop(start);
    assert!(!nav.is_routing());
    assert_eq!(history.entries(), vec!["/".to_string(), format!("/r/{}", MAX_REDIRECTS - 1)]);
}

#[test]
fn test_loader_redirect_commits_final_location() {
    let routes = vec![
        RouteDefinition::new("/old").load(loader(|args| {
            let nav = args.context.navigate("/new", NavigateOptions::default());
            async move {
                drop(nav);
                Ok(None)
            }
            .boxed()
        })),
        RouteDefinition::new("/new").handler("new"),
    ];
    let history = Arc::new(MemoryHistory::new());
    let nav = navigator(&routes, history.clone());

    let result = nav.navigate("/old", NavigateOptions::default()).unwrap();
    assert_eq!(nav.location().pathname, "/new");
    drop(result);
    assert_eq!(history.entries(), vec!["/", "/new"]);
}

#[test]
fn test_back_veto_is_reverted() {
    let history = Arc::new(MemoryHistory::new());
    let nav = navigator(&pages(), history.clone());
    go(&nav, "/a");
    go(&nav, "/b");
    assert_eq!(history.index(), 2);

    let asked = Arc::new(Mutex::new(Vec::new()));
    let asked_in = Arc::clone(&asked);
    let _guard = nav.on_before_leave(move |event| {
        asked_in.lock().unwrap().push(event.to.clone());
        event.prevent_default();
    });

    history.back();
    assert_eq!(history.index(), 2);
    assert_eq!(nav.location().pathname, "/b");
    assert_eq!(asked.lock().unwrap().clone(), vec![LeaveTarget::Delta(-1)]);
}

#[test]
fn test_back_commits_with_native_intent() {
    let log = LoadLog::default();
    let routes = vec![
        RouteDefinition::new("/a").load(recording_loader("a", &log)),
        RouteDefinition::new("/b").load(recording_loader("b", &log)),
    ];
    let history = Arc::new(MemoryHistory::new());
    let nav = navigator(&routes, history.clone());
    go(&nav, "/a");
    go(&nav, "/b");

    history.back();
    assert_eq!(nav.location().pathname, "/a");
    assert_eq!(
        log.calls(),
        vec![
            ("/a".to_string(), Intent::Navigate),
            ("/b".to_string(), Intent::Navigate),
            ("/a".to_string(), Intent::Native),
        ]
    );
    assert_eq!(history.entries(), vec!["/", "/a", "/b"]);

    history.forward();
    assert_eq!(nav.location().pathname, "/b");
}

#[test]
fn test_delta_navigation() {
    let history = Arc::new(MemoryHistory::new());
    let nav = navigator(&pages(), history.clone());
    go(&nav, "/a");

    assert!(matches!(nav.navigate(0, NavigateOptions::default()).unwrap(), Navigation::Unchanged));
    assert!(matches!(nav.navigate(-1, NavigateOptions::default()).unwrap(), Navigation::Delta(-1)));
    assert_eq!(nav.location().pathname, "/");

    let recording = Arc::new(RecordingHistory::new("/"));
    let plain = navigator(&pages(), recording);
    assert!(matches!(
        plain.navigate(-1, NavigateOptions::default()).unwrap(),
        Navigation::Unchanged
    ));
}

#[test]
fn test_invalid_targets() {
    let nav = navigator(&pages(), Arc::new(MemoryHistory::new()));
    assert_eq!(
        nav.navigate("https://example.com/a", NavigateOptions::default()).unwrap_err(),
        NavigationError::InvalidPath {
            path: "https://example.com/a".to_string()
        }
    );
    assert!(nav.navigate("//cdn.example.com", NavigateOptions::default()).is_err());

    let err = Navigator::new(
        Arc::new(Router::new(&pages(), "")),
        Arc::new(MemoryHistory::new()),
        NavigatorOptions {
            base: "https://example.com".to_string(),
            cache: Some(DataCache::client()),
            ..NavigatorOptions::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, NavigationError::InvalidBasePath { .. }));
}

#[test]
fn test_unmatched_location_has_no_matches() {
    let nav = navigator(&pages(), Arc::new(MemoryHistory::new()));
    go(&nav, "/nowhere");
    assert_eq!(nav.location().pathname, "/nowhere");
    assert!(nav.matches().is_empty());
    assert!(nav.params().is_empty());
}

#[test]
fn test_base_path_resolution() {
    let routes = vec![RouteDefinition::new("/users/:id").handler("user")];
    let history = Arc::new(RecordingHistory::new(""));
    let nav = navigator_with(&routes, history.clone(), "/app");
    assert_eq!(nav.base_path(), "/app");
    assert_eq!(history.values(), vec!["/app"]);

    go(&nav, "/users/1");
    assert_eq!(nav.location().pathname, "/app/users/1");
    assert_eq!(nav.param("id").as_deref(), Some("1"));
    assert_eq!(history.values(), vec!["/app", "/app/users/1"]);

    let relative = nav
        .navigate_from(Some("/app/users"), "2", NavigateOptions::default())
        .unwrap();
    drop(relative);
    assert_eq!(nav.location().pathname, "/app/users/2");
}

#[test]
fn test_params_merge_and_refresh() {
    let routes = vec![RouteDefinition::new("/org/:org").children(vec![
        RouteDefinition::new("/team/:team").handler("team"),
    ])];
    let nav = navigator(&routes, Arc::new(MemoryHistory::new()));

    go(&nav, "/org/acme/team/core");
    let params = nav.params();
    assert_eq!(params.get("org").map(String::as_str), Some("acme"));
    assert_eq!(params.get("team").map(String::as_str), Some("core"));

    go(&nav, "/org/beta/team/core");
    assert_eq!(nav.param("org").as_deref(), Some("beta"));
    assert_eq!(nav.matches().len(), 2);
}

#[test]
fn test_search_params_update() {
    let history = Arc::new(RecordingHistory::new("/list?page=1"));
    let nav = navigator(&pages(), history.clone());
    assert_eq!(nav.location().query("page").as_deref(), Some("1"));

    let result = nav
        .set_search_params(&[("page", Some("2")), ("sort", Some("name"))])
        .unwrap();
    drop(result);
    let location = nav.location();
    assert_eq!(location.pathname, "/list");
    assert_eq!(location.search, "?page=2&sort=name");
    assert_eq!(location.query("sort").as_deref(), Some("name"));

    let write = history.writes().pop().unwrap();
    assert_eq!(write.value, "/list?page=2&sort=name");
    assert!(!write.scroll);

    drop(nav.set_search_params(&[("page", None)]).unwrap());
    assert_eq!(nav.location().search, "?sort=name");
}

#[test]
fn test_active_route_reuse() {
    let parent = LoadLog::default();
    let child = LoadLog::default();
    let routes = vec![RouteDefinition::new("/users")
        .load(recording_loader("users", &parent))
        .children(vec![
            RouteDefinition::new("/:id").load(recording_loader("user", &child))
        ])];
    let nav = navigator(&routes, Arc::new(MemoryHistory::new()));

    go(&nav, "/users/1");
    go(&nav, "/users/2");
    assert_eq!(parent.count(), 1);
    assert_eq!(child.count(), 2);

    let data = block_on(nav.route_data(1).unwrap()).unwrap();
    assert_eq!(data, Some(json!({ "name": "user", "params": { "id": "2" } })));

    go(&nav, "/users/2?tab=posts");
    assert_eq!(parent.count(), 2);
    assert_eq!(child.count(), 3);
    assert_eq!(nav.active_routes().len(), 2);
}

#[test]
fn test_preload_does_not_navigate() {
    let log = LoadLog::default();
    let routes = vec![RouteDefinition::new("/users")
        .load(recording_loader("users", &log))
        .children(vec![RouteDefinition::new("/:id").handler("user")])];
    let history = Arc::new(MemoryHistory::new());
    let nav = navigator(&routes, history.clone());

    let preload = nav.preload_route("/users/5", true).unwrap();
    assert_eq!(preload.matches.len(), 2);
    assert_eq!(preload.data.len(), 1);
    assert_eq!(log.calls(), vec![("/users/5".to_string(), Intent::Preload)]);
    assert_eq!(nav.location().pathname, "/");
    assert_eq!(history.entries(), vec!["/"]);

    let data = block_on(preload.data[0].clone()).unwrap();
    assert_eq!(data, Some(json!({ "name": "users", "params": {} })));

    let matches_only = nav.preload_route("/users/6", false).unwrap();
    assert!(matches_only.data.is_empty());
    assert_eq!(log.count(), 1);
}

#[test]
fn test_initial_commit_uses_initial_intent() {
    let log = LoadLog::default();
    let routes = vec![RouteDefinition::new("/start").load(recording_loader("start", &log))];
    let nav = navigator(&routes, Arc::new(MemoryHistory::with_entry("/start")));
    assert_eq!(log.calls(), vec![("/start".to_string(), Intent::Initial)]);
    assert_eq!(nav.matches().len(), 1);
}

#[test]
fn test_location_observers() {
    let nav = navigator(&pages(), Arc::new(MemoryHistory::new()));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in = Arc::clone(&seen);
    let subscription = nav.subscribe(move |location| {
        seen_in.lock().unwrap().push(location.pathname.clone());
    });

    go(&nav, "/a");
    go(&nav, "/b");
    drop(subscription);
    go(&nav, "/list");
    assert_eq!(seen.lock().unwrap().clone(), vec!["/a", "/b"]);
}

#[test]
fn test_finish_waits_for_loaders() {
    let log = LoadLog::default();
    let routes = vec![RouteDefinition::new("/a").load(recording_loader("a", &log))];
    let history = Arc::new(MemoryHistory::new());
    let nav = navigator(&routes, history.clone());

    let Navigation::Started(transition) = nav.navigate("/a", NavigateOptions::default()).unwrap()
    else {
        panic!("expected a started navigation");
    };
    assert_eq!(transition.target(), "/a");
    assert_eq!(transition.data().len(), 1);
    assert!(block_on(transition.finish()));
    assert_eq!(history.entries(), vec!["/", "/a"]);
}

#[test]
fn test_server_navigation_records_redirect() {
    let scope = RequestScope::new();
    let history = Arc::new(RecordingHistory::new("/start"));
    let routes = vec![
        RouteDefinition::new("/start").handler("start"),
        RouteDefinition::new("/login").handler("login"),
    ];
    let nav = Navigator::new(
        Arc::new(Router::new(&routes, "")),
        history.clone(),
        NavigatorOptions {
            mode: ExecutionMode::Server,
            request: Some(scope.clone()),
            ..NavigatorOptions::default()
        },
    )
    .unwrap();
    assert_eq!(nav.cache().mode(), ExecutionMode::Server);

    let result = nav.navigate("/login", NavigateOptions::default()).unwrap();
    assert!(matches!(result, Navigation::Redirected(ref to) if to == "/login"));
    assert_eq!(history.values(), vec!["/login"]);

    let response = scope.response().unwrap();
    assert_eq!(response.status.as_u16(), 302);
    assert_eq!(response.location(), Some("/login"));

    let manifest = scope.matches();
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest[0].path, "/start");
}
