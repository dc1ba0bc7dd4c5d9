//! End-to-end tests for the fetcher against mock gateways

use super::*;
use crate::fetcher::core::digest_prefix_of;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const SECTOR_SIZE: u64 = 1024;

/// Helper struct to capture progress events during testing
#[derive(Debug, Default)]
struct ProgressCapture {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl ProgressCapture {
    fn new() -> Self {
        Self::default()
    }

    fn get_callback(&self) -> ProgressCallback {
        let events = self.events.clone();
        Arc::new(move |event| {
            events.lock().unwrap().push(event);
        })
    }

    fn count_events_of_type(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| match event {
                ProgressEvent::VerificationStarted { .. } => event_type == "verification_started",
                ProgressEvent::VerificationComplete { .. } => event_type == "verification_complete",
                ProgressEvent::DownloadStarted { .. } => event_type == "download_started",
                ProgressEvent::DownloadProgress { .. } => event_type == "download_progress",
                ProgressEvent::DownloadComplete { .. } => event_type == "download_complete",
                ProgressEvent::Warning { .. } => event_type == "warning",
                ProgressEvent::Error { .. } => event_type == "error",
            })
            .count()
    }
}

fn param_file(name: &str, content: &[u8], sector_size: u64) -> ParamFile {
    ParamFile {
        name: name.to_string(),
        cid: format!("Qm{}", name.replace('.', "")),
        digest: digest_prefix_of(content),
        sector_size,
    }
}

fn gateway_path(file: &ParamFile) -> String {
    format!("/ipfs/{}", file.cid)
}

fn config_for(dir: &Path, server: &MockServer) -> FetchConfig {
    FetchConfig::default()
        .with_param_dir(dir)
        .with_gateway(format!("{}/ipfs/", server.uri()))
}

async fn write_param(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    tokio::fs::write(&path, content).await.unwrap();
    path
}

/// Downloader double that records how many fetches overlap in time
#[derive(Default)]
struct FakeGateway {
    contents: HashMap<String, Vec<u8>>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeGateway {
    fn serving(files: &[(&ParamFile, &[u8])], delay: Duration) -> Self {
        Self {
            contents: files
                .iter()
                .map(|(file, content)| (file.cid.clone(), content.to_vec()))
                .collect(),
            delay,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ParamDownloader for FakeGateway {
    async fn fetch(
        &self,
        file: &ParamFile,
        dest: &Path,
        _progress_callback: Option<ProgressCallback>,
    ) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        let content = self.contents.get(&file.cid).cloned().unwrap_or_default();
        let written = tokio::fs::write(dest, &content).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        written.map_err(|e| ParamsError::FileSystem {
            path: dest.to_path_buf(),
            operation: FileOperation::Write,
            source: e,
        })?;
        Ok(content.len() as u64)
    }
}

fn expect_aggregate(result: Result<FetchSummary>) -> FetchErrors {
    match result {
        Err(ParamsError::Aggregate(errors)) => errors,
        other => panic!("Expected Aggregate error, got {:?}", other),
    }
}

#[cfg(test)]
mod verify_or_fetch_tests {
    use super::*;

    #[tokio::test]
    async fn valid_files_need_no_network() {
        let server = MockServer::start().await;
        let temp_dir: TempDir = tempdir().unwrap();
        let a = param_file("a.params", b"alpha params", SECTOR_SIZE);
        let b = param_file("b.vk", b"beta vk", SECTOR_SIZE);
        write_param(temp_dir.path(), "a.params", b"alpha params").await;
        write_param(temp_dir.path(), "b.vk", b"beta vk").await;

        let fetcher = ParamFetcher::new(config_for(temp_dir.path(), &server))
            .unwrap()
            .with_manifest(Manifest::from_entries(vec![a, b]));
        let summary = fetcher.ensure_params(SECTOR_SIZE, None).await.unwrap();

        assert_eq!(summary.already_valid, vec!["a.params", "b.vk"]);
        assert!(summary.fetched.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
        assert_eq!(fetcher.metrics().snapshot().fetches_started, 0);
    }

    #[tokio::test]
    async fn absent_file_is_fetched_once() {
        let server = MockServer::start().await;
        let content = b"freshly fetched parameters";
        let b = param_file("b.params", content, SECTOR_SIZE);

        Mock::given(method("GET"))
            .and(path(gateway_path(&b)))
            .and(header("range", "bytes=0-"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = tempdir().unwrap();
        let fetcher = ParamFetcher::new(config_for(temp_dir.path(), &server))
            .unwrap()
            .with_manifest(Manifest::from_entries(vec![b]));
        let progress = ProgressCapture::new();

        let summary = fetcher
            .ensure_params(SECTOR_SIZE, Some(progress.get_callback()))
            .await
            .unwrap();

        assert_eq!(summary.fetched, vec!["b.params"]);
        let on_disk = tokio::fs::read(temp_dir.path().join("b.params")).await.unwrap();
        assert_eq!(on_disk, content);

        // Initial check plus the check after fetching
        assert_eq!(progress.count_events_of_type("verification_complete"), 2);
        assert_eq!(progress.count_events_of_type("download_started"), 1);
        assert_eq!(progress.count_events_of_type("download_complete"), 1);

        let snapshot = fetcher.metrics().snapshot();
        assert_eq!(snapshot.fetches_completed, 1);
        assert_eq!(snapshot.bytes_downloaded, content.len() as u64);
    }

    #[tokio::test]
    async fn partial_file_resumes_from_its_length() {
        let server = MockServer::start().await;
        let content = b"0123456789abcdefghij";
        let file = param_file("resume.params", content, SECTOR_SIZE);

        Mock::given(method("GET"))
            .and(path(gateway_path(&file)))
            .and(header("range", "bytes=10-"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(content[10..].to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = tempdir().unwrap();
        write_param(temp_dir.path(), "resume.params", &content[..10]).await;

        let fetcher = ParamFetcher::new(config_for(temp_dir.path(), &server))
            .unwrap()
            .with_manifest(Manifest::from_entries(vec![file]));
        let summary = fetcher.ensure_params(SECTOR_SIZE, None).await.unwrap();

        assert_eq!(summary.fetched, vec!["resume.params"]);
        let on_disk = tokio::fs::read(temp_dir.path().join("resume.params")).await.unwrap();
        assert_eq!(on_disk, content);
    }

    #[tokio::test]
    async fn corrupt_file_is_removed_when_refetch_does_not_help() {
        let server = MockServer::start().await;
        let file = param_file("c.params", b"the correct content", SECTOR_SIZE);

        Mock::given(method("GET"))
            .and(path(gateway_path(&file)))
            .and(header("range", "bytes=8-"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(b"still wrong".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = tempdir().unwrap();
        let local = write_param(temp_dir.path(), "c.params", b"corrupt!").await;

        let fetcher = ParamFetcher::new(config_for(temp_dir.path(), &server))
            .unwrap()
            .with_manifest(Manifest::from_entries(vec![file]));
        let errors = expect_aggregate(fetcher.ensure_params(SECTOR_SIZE, None).await);

        assert_eq!(errors.len(), 1);
        let error = errors.iter().next().unwrap();
        match error {
            ParamsError::VerifyAfterFetch { path, source } => {
                assert_eq!(path, &local);
                assert!(matches!(**source, ParamsError::ChecksumMismatch { .. }));
            }
            other => panic!("Expected VerifyAfterFetch error, got {:?}", other),
        }
        assert!(!local.exists());

        let snapshot = fetcher.metrics().snapshot();
        assert_eq!(snapshot.verification_failures, 1);
        assert_eq!(snapshot.files_removed, 1);
    }

    /// Gateway that honors ranges: nothing lies past the end of the file
    async fn mount_range_honoring(server: &MockServer, file: &ParamFile, content: &[u8], local_len: usize) {
        Mock::given(method("GET"))
            .and(path(gateway_path(file)))
            .and(header("range", format!("bytes={}-", local_len).as_str()))
            .respond_with(ResponseTemplate::new(416))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(gateway_path(file)))
            .and(header("range", "bytes=0-"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn full_length_corrupt_file_is_repaired() {
        let server = MockServer::start().await;
        let content = b"0123456789";
        let file = param_file("c.params", content, SECTOR_SIZE);
        mount_range_honoring(&server, &file, content, 10).await;

        let temp_dir = tempdir().unwrap();
        write_param(temp_dir.path(), "c.params", b"9876543210").await;

        let fetcher = ParamFetcher::new(config_for(temp_dir.path(), &server))
            .unwrap()
            .with_manifest(Manifest::from_entries(vec![file]));

        let first = fetcher.ensure_params(SECTOR_SIZE, None).await.unwrap();
        assert_eq!(first.fetched, vec!["c.params"]);
        let on_disk = tokio::fs::read(temp_dir.path().join("c.params")).await.unwrap();
        assert_eq!(on_disk, content);

        // Repaired file needs no further requests
        let second = fetcher.ensure_params(SECTOR_SIZE, None).await.unwrap();
        assert_eq!(second.already_valid, vec!["c.params"]);
    }

    #[tokio::test]
    async fn oversized_corrupt_file_is_repaired() {
        let server = MockServer::start().await;
        let content = b"short";
        let file = param_file("long.vk", content, SECTOR_SIZE);
        let local = b"short plus trailing garbage";
        mount_range_honoring(&server, &file, content, local.len()).await;

        let temp_dir = tempdir().unwrap();
        write_param(temp_dir.path(), "long.vk", local).await;

        let fetcher = ParamFetcher::new(config_for(temp_dir.path(), &server))
            .unwrap()
            .with_manifest(Manifest::from_entries(vec![file]));
        let summary = fetcher.ensure_params(SECTOR_SIZE, None).await.unwrap();

        assert_eq!(summary.fetched, vec!["long.vk"]);
        let on_disk = tokio::fs::read(temp_dir.path().join("long.vk")).await.unwrap();
        assert_eq!(on_disk, content);
    }

    #[tokio::test]
    async fn gateway_failure_keeps_other_files_going() {
        let server = MockServer::start().await;
        let missing = param_file("missing.vk", b"never served", SECTOR_SIZE);
        let served_content = b"served fine";
        let served = param_file("served.vk", served_content, SECTOR_SIZE);

        Mock::given(method("GET"))
            .and(path(gateway_path(&missing)))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(gateway_path(&served)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(served_content.to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = tempdir().unwrap();
        let fetcher = ParamFetcher::new(config_for(temp_dir.path(), &server))
            .unwrap()
            .with_manifest(Manifest::from_entries(vec![missing, served]));
        let progress = ProgressCapture::new();
        let errors = expect_aggregate(
            fetcher
                .ensure_params(SECTOR_SIZE, Some(progress.get_callback()))
                .await,
        );

        assert_eq!(errors.len(), 1);
        match errors.iter().next().unwrap() {
            ParamsError::FetchFailed { path, source } => {
                assert!(path.ends_with("missing.vk"));
                assert!(matches!(**source, ParamsError::HttpStatus { .. }));
            }
            other => panic!("Expected FetchFailed error, got {:?}", other),
        }
        assert_eq!(progress.count_events_of_type("error"), 1);

        let served_on_disk = tokio::fs::read(temp_dir.path().join("served.vk")).await.unwrap();
        assert_eq!(served_on_disk, served_content);
    }

    #[tokio::test]
    async fn second_run_is_idempotent() {
        let server = MockServer::start().await;
        let content = b"fetch me once";
        let file = param_file("once.vk", content, SECTOR_SIZE);

        Mock::given(method("GET"))
            .and(path(gateway_path(&file)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = tempdir().unwrap();
        let fetcher = ParamFetcher::new(config_for(temp_dir.path(), &server))
            .unwrap()
            .with_manifest(Manifest::from_entries(vec![file]));

        let first = fetcher.ensure_params(SECTOR_SIZE, None).await.unwrap();
        let second = fetcher.ensure_params(SECTOR_SIZE, None).await.unwrap();

        assert_eq!(first.fetched, vec!["once.vk"]);
        assert_eq!(second.already_valid, vec!["once.vk"]);
        assert!(second.fetched.is_empty());
    }
}

#[cfg(test)]
mod selection_and_mode_tests {
    use super::*;

    #[tokio::test]
    async fn other_sector_sizes_are_not_fetched() {
        let server = MockServer::start().await;
        let small = param_file("small.params", b"small", SECTOR_SIZE);
        let large = param_file("large.params", b"large", 268435456);
        let shared = param_file("shared.vk", b"shared", 268435456);

        let temp_dir = tempdir().unwrap();
        write_param(temp_dir.path(), "small.params", b"small").await;
        write_param(temp_dir.path(), "shared.vk", b"shared").await;

        let fetcher = ParamFetcher::new(config_for(temp_dir.path(), &server))
            .unwrap()
            .with_manifest(Manifest::from_entries(vec![small, large, shared]));
        let summary = fetcher.ensure_params(SECTOR_SIZE, None).await.unwrap();

        assert_eq!(summary.already_valid, vec!["shared.vk", "small.params"]);
        assert!(server.received_requests().await.unwrap().is_empty());
        assert!(!temp_dir.path().join("large.params").exists());
    }

    #[tokio::test]
    async fn trust_mode_accepts_present_files_and_fetches_absent_ones() {
        let server = MockServer::start().await;
        let present = param_file("present.params", b"expected content", SECTOR_SIZE);
        let absent_content = b"absent content";
        let absent = param_file("absent.vk", absent_content, SECTOR_SIZE);

        Mock::given(method("GET"))
            .and(path(gateway_path(&present)))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(gateway_path(&absent)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(absent_content.to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = tempdir().unwrap();
        write_param(temp_dir.path(), "present.params", b"not what the manifest says").await;

        let config = config_for(temp_dir.path(), &server).with_trust_params(true);
        let fetcher = ParamFetcher::new(config)
            .unwrap()
            .with_manifest(Manifest::from_entries(vec![present, absent]));
        assert_eq!(fetcher.integrity_mode(), IntegrityMode::Trust);

        let progress = ProgressCapture::new();
        let summary = fetcher
            .ensure_params(SECTOR_SIZE, Some(progress.get_callback()))
            .await
            .unwrap();

        assert_eq!(summary.already_valid, vec!["present.params"]);
        assert_eq!(summary.fetched, vec!["absent.vk"]);
        assert!(progress.count_events_of_type("warning") >= 1);
    }
}

#[cfg(test)]
mod end_to_end_tests {
    use super::*;

    struct Scenario {
        server: MockServer,
        temp_dir: TempDir,
        manifest: Manifest,
    }

    /// A is valid on disk, B is absent, C has the wrong content on disk
    async fn scenario(c_served: &[u8]) -> Scenario {
        let server = MockServer::start().await;
        let a = param_file("a.params", b"content of a", SECTOR_SIZE);
        let b = param_file("b.vk", b"content of b", SECTOR_SIZE);
        let c = param_file("c.vk", b"content of c", SECTOR_SIZE);

        Mock::given(method("GET"))
            .and(path(gateway_path(&a)))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(gateway_path(&b)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"content of b".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        // The gateway ignores the range and sends the whole file
        Mock::given(method("GET"))
            .and(path(gateway_path(&c)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(c_served.to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = tempdir().unwrap();
        write_param(temp_dir.path(), "a.params", b"content of a").await;
        write_param(temp_dir.path(), "c.vk", b"rotten").await;

        Scenario {
            server,
            temp_dir,
            manifest: Manifest::from_entries(vec![a, b, c]),
        }
    }

    #[tokio::test]
    async fn all_files_end_valid_when_gateway_serves_correct_bytes() {
        let scenario = scenario(b"content of c").await;
        let fetcher = ParamFetcher::new(config_for(scenario.temp_dir.path(), &scenario.server))
            .unwrap()
            .with_manifest(scenario.manifest);

        let summary = fetcher.ensure_params(SECTOR_SIZE, None).await.unwrap();

        assert_eq!(summary.already_valid, vec!["a.params"]);
        assert_eq!(summary.fetched, vec!["b.vk", "c.vk"]);
        let c_on_disk = tokio::fs::read(scenario.temp_dir.path().join("c.vk")).await.unwrap();
        assert_eq!(c_on_disk, b"content of c");
    }

    #[tokio::test]
    async fn only_the_failing_file_is_reported() {
        let scenario = scenario(b"a different c").await;
        let fetcher = ParamFetcher::new(config_for(scenario.temp_dir.path(), &scenario.server))
            .unwrap()
            .with_manifest(scenario.manifest);

        let errors = expect_aggregate(fetcher.ensure_params(SECTOR_SIZE, None).await);

        assert_eq!(errors.len(), 1);
        let rendered = errors.to_string();
        assert!(rendered.contains("c.vk"), "{rendered}");
        assert!(!rendered.contains("b.vk"), "{rendered}");
        assert!(!scenario.temp_dir.path().join("c.vk").exists());
        assert!(scenario.temp_dir.path().join("b.vk").exists());
    }
}

#[cfg(test)]
mod concurrency_tests {
    use super::*;

    fn many_files(count: usize) -> Vec<(ParamFile, Vec<u8>)> {
        (0..count)
            .map(|i| {
                let content = format!("parameter file number {i}").into_bytes();
                (param_file(&format!("file{i}.vk"), &content, SECTOR_SIZE), content)
            })
            .collect()
    }

    fn fetcher_with(
        dir: &Path,
        files: &[(ParamFile, Vec<u8>)],
        max_concurrent_fetches: usize,
    ) -> (ParamFetcher, Arc<FakeGateway>) {
        let served: Vec<(&ParamFile, &[u8])> = files.iter().map(|(f, c)| (f, c.as_slice())).collect();
        let gateway = Arc::new(FakeGateway::serving(&served, Duration::from_millis(25)));
        let config = FetchConfig::default()
            .with_param_dir(dir)
            .with_max_concurrent_fetches(max_concurrent_fetches);
        let fetcher = ParamFetcher::with_downloader(config, gateway.clone())
            .unwrap()
            .with_manifest(Manifest::from_entries(files.iter().map(|(f, _)| f.clone())));
        (fetcher, gateway)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn fetches_never_overlap_by_default() {
        let temp_dir = tempdir().unwrap();
        let files = many_files(6);
        let (fetcher, gateway) = fetcher_with(temp_dir.path(), &files, 1);

        let summary = fetcher.ensure_params(SECTOR_SIZE, None).await.unwrap();

        assert_eq!(summary.fetched.len(), 6);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 6);
        assert_eq!(gateway.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn raised_limit_is_respected() {
        let temp_dir = tempdir().unwrap();
        let files = many_files(8);
        let (fetcher, gateway) = fetcher_with(temp_dir.path(), &files, 3);

        let summary = fetcher.ensure_params(SECTOR_SIZE, None).await.unwrap();

        assert_eq!(summary.fetched.len(), 8);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 8);
        assert!(gateway.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn directory_error_aborts_before_fetching() {
        let temp_dir = tempdir().unwrap();
        let blocker = temp_dir.path().join("params");
        tokio::fs::write(&blocker, b"in the way").await.unwrap();
        let files = many_files(2);
        let (fetcher, gateway) = fetcher_with(&blocker, &files, 1);

        match fetcher.ensure_params(SECTOR_SIZE, None).await {
            Err(error @ ParamsError::Directory { .. }) => assert!(error.is_fatal()),
            other => panic!("Expected Directory error, got {:?}", other),
        }
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zero_fetch_permits_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let config = FetchConfig::default()
            .with_param_dir(temp_dir.path())
            .with_max_concurrent_fetches(0);

        match ParamFetcher::new(config) {
            Err(ParamsError::Configuration { field, .. }) => {
                assert_eq!(field.as_deref(), Some("max_concurrent_fetches"));
            }
            Err(other) => panic!("Expected Configuration error, got {:?}", other),
            Ok(_) => panic!("Expected Configuration error"),
        }
    }
}
