use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use super::cache::WatchEntry;
use super::decision::Action;
use super::error::ActionError;
use super::library::memory::MemoryStore;
use super::library::{DocumentStore, Library, Provider, Settings, SettingsStore};
use super::orchestrator::{ActionReport, Orchestrator};
use super::prompt::{Answer, ScriptedPrompter};
use super::queue::{LinkBuilder, episode_from_command, is_directory_command};
use super::resolver::ConsumetClient;
use super::resolver::fake::FakeResolver;
use super::{AppContext, pick_hit, run_hit_action};
use crate::cli::HitArgs;
use crate::config::Config;
use crate::db::Database;
use crate::http::test_server::TestServer;

fn entry(name: &str, source: &str, episodes: &str) -> WatchEntry {
    WatchEntry {
        name: name.to_string(),
        source: source.to_string(),
        episodes: episodes.to_string(),
        img: String::new(),
        is_unread: false,
        updated_at: None,
    }
}

fn store_with(entries: &[WatchEntry]) -> MemoryStore {
    MemoryStore::with_library(Library {
        cache: entries.to_vec(),
        queue: Vec::new(),
    })
}

fn run<S: DocumentStore + SettingsStore>(
    store: &S,
    resolver: &FakeResolver,
    prompter: &mut ScriptedPrompter,
    target: &WatchEntry,
    action: Action,
) -> anyhow::Result<ActionReport> {
    let links = LinkBuilder::new("~/Documents");
    let mut orchestrator = Orchestrator::new(store, resolver, &links, Some(prompter));
    orchestrator.run_action(target, action)
}

fn action_error(err: &anyhow::Error) -> &ActionError {
    err.downcast_ref::<ActionError>()
        .expect("error should be an ActionError")
}

#[test]
fn continue_with_one_episode_left_queues_it_without_prompting() {
    let show = entry("Show", "s1", "9/10");
    let store = store_with(&[show.clone()]);
    let resolver = FakeResolver::with_series("Show", "s1", 10, &["-1080p", "-720p"]);
    let mut prompter = ScriptedPrompter::new(vec![], vec![]);

    let report = run(&store, &resolver, &mut prompter, &show, Action::Continue).expect("continue");

    let ActionReport::Queued {
        batch, progress, ..
    } = report
    else {
        panic!("expected a queued batch, got {report:?}");
    };
    assert_eq!(batch.to_string(), "10");
    assert_eq!(progress.to_string(), "10/10");
    assert_eq!(prompter.number_prompts(), 0);
    assert_eq!(prompter.quality_prompts(), 0);

    let library = store.snapshot();
    assert_eq!(library.queue.len(), 1);
    let item = &library.queue[0];
    assert_eq!(item.links.len(), 2);
    assert_eq!(item.links[0], "mkdir Show");
    assert_eq!(
        item.links[1],
        "ffmpeg -i \"https://cdn.test/s1-ep10-1080p.m3u8\" -c copy ~/Documents/Show/Show\\ -\\ 10.mp4"
    );
    assert_eq!(item.episodes.to_string(), "10");
    assert_eq!(library.cache[0].episodes, "10/10");
    assert!(!library.cache[0].is_unread);
    assert_eq!(store.saves(), 1);
}

#[test]
fn next_plays_the_following_episode_and_moves_the_entry_first() {
    let other = entry("Other", "o1", "1/2");
    let show = entry("Show", "s1", "3/12");
    let store = store_with(&[other, show.clone()]);
    let resolver = FakeResolver::with_series("Show", "s1", 12, &["-720p", "-1080p"]);
    let mut prompter = ScriptedPrompter::new(vec![], vec![]);

    let report = run(&store, &resolver, &mut prompter, &show, Action::Next).expect("next");
    let ActionReport::Played {
        episode, source, ..
    } = report
    else {
        panic!("expected playback, got {report:?}");
    };
    assert_eq!(episode, 4);
    assert_eq!(source, "https://cdn.test/s1-ep4-1080p.m3u8");

    let cache = store.snapshot().cache;
    assert_eq!(cache[0].name, "Show");
    assert_eq!(cache[0].episodes, "4/12");
    assert!(cache[0].is_unread);
    assert!(cache[0].updated_at.is_some());
    assert_eq!(cache[1].name, "Other");
}

#[test]
fn next_at_the_last_episode_reports_at_end_and_writes_nothing() {
    let show = entry("Show", "s1", "10/10");
    let store = store_with(&[show.clone()]);
    let resolver = FakeResolver::with_series("Show", "s1", 10, &["-1080p"]);
    let mut prompter = ScriptedPrompter::new(vec![], vec![]);

    let report = run(&store, &resolver, &mut prompter, &show, Action::Next).expect("next");
    assert_eq!(report, ActionReport::AtEnd);
    assert_eq!(store.saves(), 0);
    assert_eq!(resolver.source_lookups.get(), 0);
}

#[test]
fn add_registers_a_search_hit_with_no_progress() {
    let hit = entry("Show", "s1", "0");
    let store = MemoryStore::default();
    let resolver = FakeResolver::with_series("Show", "s1", 12, &["-1080p"]);
    let mut prompter = ScriptedPrompter::new(vec![], vec![]);

    let report = run(&store, &resolver, &mut prompter, &hit, Action::Add).expect("add");
    assert!(matches!(report, ActionReport::Registered { .. }));

    let library = store.snapshot();
    assert_eq!(library.cache.len(), 1);
    assert_eq!(library.cache[0].episodes, "0/12");
    assert!(library.cache[0].is_unread);
    assert_eq!(library.cache[0].img, "s1.jpg");
    assert!(library.queue.is_empty());
    assert_eq!(prompter.number_prompts(), 0);
}

#[test]
fn cancelling_the_episode_prompt_writes_nothing() {
    let show = entry("Show", "s1", "2/12");
    let store = store_with(&[show.clone()]);
    let before = store.snapshot();
    let resolver = FakeResolver::with_series("Show", "s1", 12, &["-1080p"]);
    let mut prompter = ScriptedPrompter::new(vec![Answer::Cancelled], vec![]);

    let report = run(&store, &resolver, &mut prompter, &show, Action::Choose).expect("choose");
    assert_eq!(report, ActionReport::Cancelled);
    assert_eq!(store.saves(), 0);
    assert_eq!(store.snapshot(), before);
}

#[test]
fn cancelling_the_quality_prompt_mid_batch_writes_nothing() {
    let show = entry("Show", "s1", "0/6");
    let store = store_with(&[show.clone()]);
    let resolver = FakeResolver::with_series("Show", "s1", 6, &["-900p", "-360x"]);
    let mut prompter = ScriptedPrompter::new(vec![Answer::Picked(4)], vec![Answer::Cancelled]);

    let report = run(&store, &resolver, &mut prompter, &show, Action::Continue).expect("continue");
    assert_eq!(report, ActionReport::Cancelled);
    assert_eq!(store.saves(), 0);
    assert_eq!(store.settings(), Settings::default());
}

#[test]
fn out_of_bounds_episode_aborts_without_writes() {
    let show = entry("Show", "s1", "2/10");
    let store = store_with(&[show.clone()]);
    let resolver = FakeResolver::with_series("Show", "s1", 10, &["-1080p"]);
    let mut prompter = ScriptedPrompter::new(vec![Answer::Picked(11)], vec![]);

    let err = run(&store, &resolver, &mut prompter, &show, Action::Choose)
        .expect_err("11 is past the last episode");
    assert!(matches!(
        action_error(&err),
        ActionError::OutOfBounds { value: 11, max: 10 }
    ));
    assert!(action_error(&err).is_selection());
    assert_eq!(store.saves(), 0);
    assert_eq!(resolver.source_lookups.get(), 0);
}

#[test]
fn jump_rejects_an_inverted_range() {
    let show = entry("Show", "s1", "2/10");
    let store = store_with(&[show.clone()]);
    let resolver = FakeResolver::with_series("Show", "s1", 10, &["-1080p"]);
    let mut prompter =
        ScriptedPrompter::new(vec![Answer::Picked(7), Answer::Picked(5)], vec![]);

    let err = run(&store, &resolver, &mut prompter, &show, Action::Jump)
        .expect_err("start after end");
    assert!(matches!(
        action_error(&err),
        ActionError::InvertedRange { start: 7, end: 5 }
    ));
    assert_eq!(store.saves(), 0);
}

#[test]
fn jump_queues_the_requested_range_and_resolves_each_episode_once() {
    let show = entry("Show", "s1", "1/12");
    let store = store_with(&[show.clone()]);
    let resolver = FakeResolver::with_series("Show", "s1", 12, &["-1080p"]);
    let mut prompter =
        ScriptedPrompter::new(vec![Answer::Picked(5), Answer::Picked(8)], vec![]);

    let report = run(&store, &resolver, &mut prompter, &show, Action::Jump).expect("jump");
    let ActionReport::Queued { batch, .. } = report else {
        panic!("expected a queued batch, got {report:?}");
    };
    assert_eq!(batch.to_string(), "5 to 8");
    assert_eq!(resolver.source_lookups.get(), 4);
    assert_eq!(
        resolver.lookups.borrow().as_slice(),
        ["s1-ep5", "s1-ep6", "s1-ep7", "s1-ep8"]
    );

    let library = store.snapshot();
    let item = &library.queue[0];
    assert_eq!(item.scanned_episodes(), item.episodes);
    assert_eq!(library.cache[0].episodes, "8/12");
}

#[test]
fn overlapping_downloads_merge_into_one_queue_item() {
    let hit = entry("Show", "s1", "0");
    let store = MemoryStore::default();
    let resolver = FakeResolver::with_series("Show", "s1", 12, &["-1080p"]);

    let mut prompter = ScriptedPrompter::new(vec![Answer::Picked(3)], vec![]);
    run(&store, &resolver, &mut prompter, &hit, Action::Download).expect("download");

    let registered = store.snapshot().cache[0].clone();
    assert_eq!(registered.episodes, "3/12");
    let mut prompter =
        ScriptedPrompter::new(vec![Answer::Picked(2), Answer::Picked(5)], vec![]);
    run(&store, &resolver, &mut prompter, &registered, Action::Jump).expect("jump");

    let library = store.snapshot();
    assert_eq!(library.queue.len(), 1);
    let item = &library.queue[0];
    assert_eq!(item.episodes.to_string(), "1 to 5");
    assert_eq!(
        item.links
            .iter()
            .filter(|command| is_directory_command(command))
            .count(),
        1
    );
    let numbers = item
        .episode_commands()
        .filter_map(|command| episode_from_command(command))
        .collect::<Vec<_>>();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    assert_eq!(library.cache[0].episodes, "5/12");
}

#[test]
fn manual_quality_pick_is_learned_only_after_commit() {
    let show = entry("Show", "s1", "0/3");
    let store = store_with(&[show.clone()]);
    let resolver = FakeResolver::with_series("Show", "s1", 3, &["-900p", "-360x"]);
    let mut prompter = ScriptedPrompter::new(vec![], vec![Answer::Picked("-900p".to_string())]);

    let report = run(&store, &resolver, &mut prompter, &show, Action::Next).expect("next");
    assert!(matches!(report, ActionReport::Played { episode: 1, .. }));

    let order = store.settings().quality_order;
    assert_eq!(order[2], "-900p");
    assert_eq!(order.len(), Settings::default().quality_order.len() + 1);
}

#[test]
fn failed_save_leaves_the_store_and_order_untouched() {
    let show = entry("Show", "s1", "0/3");
    let store = store_with(&[show.clone()]);
    store.fail_saves();
    let before = store.snapshot();
    let resolver = FakeResolver::with_series("Show", "s1", 3, &["-900p"]);
    let mut prompter = ScriptedPrompter::new(vec![], vec![Answer::Picked("-900p".to_string())]);

    let err = run(&store, &resolver, &mut prompter, &show, Action::Next)
        .expect_err("save should fail");
    assert!(format!("{err:#}").contains("disk full"));
    assert_eq!(store.snapshot(), before);
    assert_eq!(store.settings(), Settings::default());
}

#[test]
fn failed_batch_save_leaves_queue_and_progress_untouched() {
    let show = entry("Show", "s1", "2/6");
    let store = store_with(&[show.clone()]);
    store.fail_saves();
    let before = store.snapshot();
    let resolver = FakeResolver::with_series("Show", "s1", 6, &["-1080p"]);
    let mut prompter = ScriptedPrompter::new(vec![Answer::Picked(4)], vec![]);

    let err = run(&store, &resolver, &mut prompter, &show, Action::Download)
        .expect_err("save should fail");
    assert!(format!("{err:#}").contains("disk full"));
    assert_eq!(store.snapshot(), before);
    assert!(store.snapshot().queue.is_empty());
    assert_eq!(store.snapshot().cache[0].episodes, "2/6");
}

#[test]
fn auto_quality_off_asks_even_when_a_preferred_tag_exists() {
    let show = entry("Show", "s1", "0/3");
    let store = store_with(&[show.clone()]);
    store.set_settings(Settings {
        auto_quality: false,
        ..Settings::default()
    });
    let resolver = FakeResolver::with_series("Show", "s1", 3, &["-1080p", "-720p"]);
    let mut prompter = ScriptedPrompter::new(vec![], vec![Answer::Picked("-720p".to_string())]);

    let report = run(&store, &resolver, &mut prompter, &show, Action::Next).expect("next");
    let ActionReport::Played { source, .. } = report else {
        panic!("expected playback, got {report:?}");
    };
    assert_eq!(source, "https://cdn.test/s1-ep1-720p.m3u8");
    assert_eq!(prompter.quality_prompts(), 1);
}

#[test]
fn missing_quality_without_prompter_is_fatal() {
    let show = entry("Show", "s1", "0/3");
    let store = store_with(&[show.clone()]);
    let resolver = FakeResolver::with_series("Show", "s1", 3, &["-900p"]);
    let links = LinkBuilder::new("~/Documents");
    let mut orchestrator = Orchestrator::new(&store, &resolver, &links, None);

    let err = orchestrator
        .run_action(&show, Action::Next)
        .expect_err("no tag matches");
    assert!(matches!(
        action_error(&err),
        ActionError::MissingQuality { .. }
    ));
    assert_eq!(store.saves(), 0);
}

#[test]
fn malformed_progress_counts_as_nothing_watched() {
    let show = entry("Show", "s1", "garbage/12");
    let store = store_with(&[show.clone()]);
    let resolver = FakeResolver::with_series("Show", "s1", 12, &["-1080p"]);
    let mut prompter = ScriptedPrompter::new(vec![], vec![]);

    let report = run(&store, &resolver, &mut prompter, &show, Action::Next).expect("next");
    assert!(matches!(report, ActionReport::Played { episode: 1, .. }));
}

#[test]
fn actions_persist_through_sqlite() {
    let db = Database::open_in_memory().expect("open");
    db.migrate().expect("migrate");
    let hit = entry("Show", "s1", "0");
    let resolver = FakeResolver::with_series("Show", "s1", 4, &["-1080p"]);

    let mut prompter = ScriptedPrompter::new(vec![], vec![]);
    run(&db, &resolver, &mut prompter, &hit, Action::Add).expect("add");
    let registered = db.load().expect("load").cache[0].clone();

    let mut prompter = ScriptedPrompter::new(vec![Answer::Picked(2)], vec![]);
    run(&db, &resolver, &mut prompter, &registered, Action::Continue).expect("continue");

    let library = db.load().expect("load");
    assert_eq!(library.cache[0].episodes, "2/4");
    assert_eq!(library.queue[0].episodes.to_string(), "1 to 2");
    assert_eq!(library.queue[0].links.len(), 3);
}

#[test]
fn pick_hit_prefers_explicit_pick_then_exact_title() {
    let hits = vec![entry("Frieren 2", "f2", "0"), entry("Frieren", "f1", "0")];

    let picked = pick_hit(hits.clone(), "frieren", Some(1), None).expect("pick");
    assert_eq!(picked.map(|hit| hit.source), Some("f2".to_string()));

    let exact = pick_hit(hits.clone(), "Frieren", None, None).expect("pick");
    assert_eq!(exact.map(|hit| hit.source), Some("f1".to_string()));

    assert!(pick_hit(hits, "frieren", Some(3), None).is_err());
}

#[test]
fn pick_hit_asks_when_ambiguous() {
    let hits = vec![entry("One Piece", "op", "0"), entry("One Punch", "opm", "0")];
    assert!(pick_hit(hits.clone(), "one", None, None).is_err());

    let mut prompter = ScriptedPrompter::new(vec![Answer::Picked(2)], vec![]);
    let picked = pick_hit(hits.clone(), "one", None, Some(&mut prompter)).expect("pick");
    assert_eq!(picked.map(|hit| hit.name), Some("One Punch".to_string()));

    let mut prompter = ScriptedPrompter::new(vec![Answer::Cancelled], vec![]);
    assert_eq!(
        pick_hit(hits, "one", None, Some(&mut prompter)).expect("pick"),
        None
    );
}

const SHOW_SEARCH: &str = r#"{"results": [{"id": "42", "title": {"romaji": "Show"}, "image": "show.jpg"}]}"#;
const SHOW_INFO: &str = r#"{"id": "42", "title": {"romaji": "Show"}, "episodes": [
    {"id": "show-1", "number": 1},
    {"id": "show-2", "number": 2}
]}"#;

fn cli_context(base_url: &str, interactive: bool) -> AppContext {
    let db = Database::open_in_memory().expect("open");
    db.migrate().expect("migrate");
    AppContext {
        config: Config {
            db_path: PathBuf::from(":memory:"),
            log_path: PathBuf::from("aniqueue.log"),
            queue_script_path: PathBuf::from("queue.sh"),
            api_base: base_url.to_string(),
            download_dir: "~/Documents".to_string(),
            interactive,
        },
        db,
        resolver: ConsumetClient::new(base_url, Provider::Anilist),
        links: LinkBuilder::new("~/Documents"),
    }
}

#[test]
fn add_from_the_command_line_completes_with_and_without_prompts() {
    for interactive in [false, true] {
        let server = TestServer::spawn_routes(&[
            ("/meta/anilist/Show", SHOW_SEARCH),
            ("/meta/anilist/info/42?provider=animepahe", SHOW_INFO),
        ]);
        let ctx = cli_context(&server.base_url, interactive);
        let args = HitArgs {
            query: vec!["Show".to_string()],
            pick: None,
        };

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let result =
                run_hit_action(&ctx, &args, Action::Add).map_err(|err| format!("{err:#}"));
            let cache = ctx.db.load().map(|library| library.cache).unwrap_or_default();
            drop(server);
            let _ = tx.send((result, cache));
        });

        let (result, cache) = rx
            .recv_timeout(Duration::from_secs(10))
            .unwrap_or_else(|_| panic!("add blocked (interactive = {interactive})"));
        assert_eq!(result, Ok(()));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache[0].name, "Show");
        assert_eq!(cache[0].episodes, "0/2");
        assert_eq!(cache[0].img, "show.jpg");
    }
}
