//! End-to-end runs of the tutorial flow against scripted providers.

use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tutorflow::cache::JsonFileCache;
use tutorflow::config::TutorflowConfig;
use tutorflow::emit::FsEmitter;
use tutorflow::events::{self, CollectingEventSink};
use tutorflow::llm::{CallLog, GenerativeProvider, LlmGateway};
use tutorflow::pipeline::Flow;
use tutorflow::source::SourceFilters;
use tutorflow::testing::{
    assert_event_count, assert_stages_ran, assert_tutorial_consistent, sample_files, tutorial_provider,
    FailingProvider, InMemorySource,
};
use tutorflow::tutorial::{
    build_tutorial_flow, generate_tutorial, TutorialComponents, TutorialRequest, TutorialState,
    ANALYZE_RELATIONSHIPS, COMBINE_TUTORIAL, FETCH_REPO, IDENTIFY_ABSTRACTIONS, ORDER_CHAPTERS, WRITE_CHAPTERS,
};

const ALL_STAGES: [&str; 6] = [
    FETCH_REPO,
    IDENTIFY_ABSTRACTIONS,
    ANALYZE_RELATIONSHIPS,
    ORDER_CHAPTERS,
    WRITE_CHAPTERS,
    COMBINE_TUTORIAL,
];

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("tutorflow=debug")
            .try_init();
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn cache_path(&self) -> std::path::PathBuf {
        self.dir.path().join("llm_cache.json")
    }

    fn output_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("output")
    }

    fn log_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("logs")
    }

    fn flow(
        &self,
        provider: Arc<dyn GenerativeProvider>,
        config: &TutorflowConfig,
        sink: Arc<CollectingEventSink>,
    ) -> Flow<TutorialState> {
        let gateway = LlmGateway::new(provider)
            .with_cache(Arc::new(JsonFileCache::new(self.cache_path())))
            .with_call_log(CallLog::new(self.log_dir()));
        let components = TutorialComponents {
            source: Arc::new(InMemorySource::new("https://github.com/acme/widget", sample_files())),
            filters: SourceFilters::default(),
            gateway,
            emitter: Arc::new(FsEmitter::new(self.output_dir())),
        };
        build_tutorial_flow(components, config, sink).unwrap()
    }
}

fn fast_config() -> TutorflowConfig {
    TutorflowConfig::default().with_wait_seconds(0)
}

fn sorted_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_three_files_become_five_chapters() {
    let workspace = Workspace::new();
    let provider = Arc::new(tutorial_provider(5));
    let sink = Arc::new(CollectingEventSink::new());
    let flow = workspace.flow(provider.clone(), &fast_config(), sink.clone());

    let (state, report) = generate_tutorial(&flow, TutorialRequest::new()).await.unwrap();

    assert_stages_ran(&report, &ALL_STAGES);
    assert_eq!(state.files.len(), 3);
    assert_eq!(state.abstractions.len(), 5);
    assert_eq!(state.relationships.as_ref().unwrap().relationships.len(), 5);
    assert_eq!(state.chapter_order, vec![4, 3, 2, 1, 0]);
    assert_eq!(state.chapters.len(), 5);
    assert_tutorial_consistent(&state);

    // identify + relationships + order + one call per chapter
    assert_eq!(provider.calls(), 8);

    let out = workspace.output_dir().join("widget");
    assert_eq!(state.output_location, Some(out.display().to_string()));
    let names = sorted_names(&out);
    assert_eq!(names.len(), 6);
    assert!(names.contains(&"index.md".to_string()));
    for chapter in &state.chapters {
        assert!(names.contains(&chapter.filename));
    }
    assert_eq!(state.chapters[0].filename, "01_chapter_writer.md");

    let index = std::fs::read_to_string(out.join("index.md")).unwrap();
    assert!(index.starts_with("# Tutorial: widget\n"));
    assert!(index.contains("```mermaid\nflowchart TD\n"));
    assert!(index.contains("1. [Chapter Writer](01_chapter_writer.md)"));

    let first = std::fs::read_to_string(out.join("01_chapter_writer.md")).unwrap();
    assert!(first.starts_with("# Chapter 1: Chapter Writer\n"));

    assert_event_count(&sink, events::STAGE_COMPLETED, 6);
    assert_event_count(&sink, events::FLOW_COMPLETED, 1);
    assert_event_count(&sink, events::STAGE_RETRY, 0);
}

#[tokio::test]
async fn test_provider_outage_halts_after_three_attempts() {
    let workspace = Workspace::new();
    let provider = Arc::new(FailingProvider::new("service unavailable"));
    let sink = Arc::new(CollectingEventSink::new());
    let flow = workspace.flow(provider.clone(), &fast_config().with_max_attempts(3), sink.clone());

    let mut state = TutorialState::new(TutorialRequest::new());
    let err = flow.run(&mut state).await.unwrap_err();

    assert!(err.is_external_service());
    assert!(err.to_string().contains("service unavailable"));
    assert_eq!(provider.calls(), 3);

    assert!(state.abstractions.is_empty());
    assert!(state.chapters.is_empty());
    assert!(!workspace.output_dir().exists());

    let started: Vec<String> = sink
        .events_of_type(events::STAGE_STARTED)
        .into_iter()
        .filter_map(|(_, data)| data.and_then(|d| d["stage"].as_str().map(ToString::to_string)))
        .collect();
    assert_eq!(started, vec![FETCH_REPO, IDENTIFY_ABSTRACTIONS]);
    assert_event_count(&sink, events::STAGE_RETRY, 2);
    assert_event_count(&sink, events::FLOW_FAILED, 1);

    let log = std::fs::read_dir(workspace.log_dir()).unwrap().next().unwrap().unwrap().path();
    let log = std::fs::read_to_string(log).unwrap();
    assert_eq!(log.lines().filter(|l| l.contains(" - ERROR - ")).count(), 3);
}

#[tokio::test]
async fn test_warm_cache_rerun_is_identical() {
    let workspace = Workspace::new();
    let config = fast_config();

    let first_flow = workspace.flow(Arc::new(tutorial_provider(5)), &config, Arc::new(CollectingEventSink::new()));
    let (first, _) = generate_tutorial(&first_flow, TutorialRequest::new()).await.unwrap();
    let index_before = std::fs::read_to_string(workspace.output_dir().join("widget/index.md")).unwrap();

    // Every answer must now come from the cache.
    let offline = Arc::new(FailingProvider::new("offline"));
    let second_flow = workspace.flow(offline.clone(), &config, Arc::new(CollectingEventSink::new()));
    let (second, _) = generate_tutorial(&second_flow, TutorialRequest::new()).await.unwrap();

    assert_eq!(offline.calls(), 0);
    assert_eq!(first.chapters, second.chapters);
    assert_eq!(
        std::fs::read_to_string(workspace.output_dir().join("widget/index.md")).unwrap(),
        index_before
    );
}

#[tokio::test]
async fn test_answer_received_on_retry_is_cached() {
    let workspace = Workspace::new();
    let config = fast_config();

    // The first identify attempt hits an outage; the retry succeeds.
    let flaky = Arc::new(tutorial_provider(5).failing_first(1));
    let sink = Arc::new(CollectingEventSink::new());
    let flow = workspace.flow(flaky.clone(), &config, sink.clone());
    let (first, _) = generate_tutorial(&flow, TutorialRequest::new()).await.unwrap();

    assert_eq!(flaky.calls(), 9);
    assert_event_count(&sink, events::STAGE_RETRY, 1);
    assert_eq!(JsonFileCache::new(workspace.cache_path()).try_load().unwrap().len(), 8);

    let offline = Arc::new(FailingProvider::new("offline"));
    let flow = workspace.flow(offline.clone(), &config, Arc::new(CollectingEventSink::new()));
    let (second, _) = generate_tutorial(&flow, TutorialRequest::new()).await.unwrap();

    assert_eq!(offline.calls(), 0);
    assert_eq!(first.chapters, second.chapters);
}

#[tokio::test]
async fn test_no_cache_request_always_calls_provider() {
    let workspace = Workspace::new();
    let config = fast_config();

    let flow = workspace.flow(Arc::new(tutorial_provider(5)), &config, Arc::new(CollectingEventSink::new()));
    generate_tutorial(&flow, TutorialRequest::new()).await.unwrap();

    let provider = Arc::new(tutorial_provider(5));
    let flow = workspace.flow(provider.clone(), &config, Arc::new(CollectingEventSink::new()));
    generate_tutorial(&flow, TutorialRequest::new().with_cache(false)).await.unwrap();

    assert_eq!(provider.calls(), 8);
}

#[tokio::test]
async fn test_corrupt_cache_is_repaired() {
    let workspace = Workspace::new();
    std::fs::write(workspace.cache_path(), "{ not json").unwrap();

    let flow = workspace.flow(Arc::new(tutorial_provider(5)), &fast_config(), Arc::new(CollectingEventSink::new()));
    generate_tutorial(&flow, TutorialRequest::new()).await.unwrap();

    let repaired = JsonFileCache::new(workspace.cache_path()).try_load().unwrap();
    assert_eq!(repaired.len(), 8);
}

#[tokio::test]
async fn test_concurrent_chapters_match_sequential() {
    let sequential = Workspace::new();
    let flow = sequential.flow(Arc::new(tutorial_provider(5)), &fast_config(), Arc::new(CollectingEventSink::new()));
    let (expected, _) = generate_tutorial(&flow, TutorialRequest::new()).await.unwrap();

    let concurrent = Workspace::new();
    let config = fast_config().with_batch_concurrency(4);
    let flow = concurrent.flow(Arc::new(tutorial_provider(5)), &config, Arc::new(CollectingEventSink::new()));
    let (actual, report) = generate_tutorial(&flow, TutorialRequest::new()).await.unwrap();

    assert_eq!(actual.chapters, expected.chapters);
    assert_eq!(report.stage(WRITE_CHAPTERS).unwrap().items, Some(5));
}

#[tokio::test]
async fn test_translated_request_reaches_prompts() {
    let workspace = Workspace::new();
    let provider = Arc::new(tutorial_provider(2));
    let flow = workspace.flow(provider.clone(), &fast_config(), Arc::new(CollectingEventSink::new()));

    let request = TutorialRequest::new().with_language("german").with_project_name("Gadget");
    let (state, _) = generate_tutorial(&flow, request).await.unwrap();

    assert_eq!(state.project_name.as_deref(), Some("Gadget"));
    assert!(workspace.output_dir().join("Gadget/index.md").exists());
    assert!(provider.prompts().iter().all(|p| p.contains("German")));
}
