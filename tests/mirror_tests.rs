//! Integration tests for a full mirror run
//!
//! These tests use wiremock to serve a small site and drive the archive
//! manager end-to-end against a real SQLite file and the local disk.

use static_mirror::archive::local_path_for;
use static_mirror::config::{parse_config, Config};
use static_mirror::storage::Storage;
use static_mirror::{Action, AppContext, ArchiveManager, ArchiveState, MirrorError, PageStatus};
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serves a four-page site with one redirect and one broken link
async fn mock_site() -> MockServer {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(format!(
                    r#"<html><head><link rel="stylesheet" href="{base}/style.css"></head>
                    <body>
                    <a href="{base}/about/">About</a>
                    <a href="/old">Old page</a>
                    <a href="missing.htm">Broken</a>
                    <a href="http://external.example/18.htm">Elsewhere</a>
                    <!-- <a href="/commented-out/">Hidden</a> -->
                    </body></html>"#
                )),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/about/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(format!(r#"<a href="{base}/">Home</a>"#)),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/style.css"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/css")
                .set_body_string("body { background: url( 'img/bg.png' ) }"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/img/bg.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new/"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<p>Moved here</p>"),
        )
        .mount(&server)
        .await;

    server
}

fn config_for(server: &MockServer, dir: &TempDir, extra_site: &str, extra_output: &str) -> Config {
    let temp = dir.path().join("tmp");
    std::fs::create_dir_all(&temp).unwrap();

    parse_config(&format!(
        r#"
[site]
origin-url = "{origin}"
destination-host = "static.example.com"
{extra_site}

[crawler]
batch-size = 3
concurrency = 2
request-timeout-secs = 5

[output]
database-path = "{db}"
temp-files-dir = "{temp}"
{extra_output}
"#,
        origin = server.uri(),
        db = dir.path().join("mirror.db").display(),
        temp = temp.display(),
    ))
    .expect("test config should parse")
}

/// Starts a run and continues it until it finishes
async fn run_to_completion(manager: &ArchiveManager) {
    manager.perform(Action::Start).await.expect("start");
    for _ in 0..50 {
        if manager.has_finished().unwrap() {
            return;
        }
        manager.perform(Action::Continue).await.expect("continue");
    }
    panic!("run did not finish");
}

fn read_zip_entry(zip_path: &Path, name: &str) -> String {
    let file = std::fs::File::open(zip_path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut contents = String::new();
    entry.read_to_string(&mut contents).unwrap();
    contents
}

#[tokio::test]
async fn test_full_run_produces_zip() {
    let server = mock_site().await;
    let dir = TempDir::new().unwrap();
    let config = config_for(&server, &dir, "", "");
    let base = server.uri();

    let manager = ArchiveManager::new(AppContext::open(config, None).unwrap());
    run_to_completion(&manager).await;

    let run = manager.run_state().unwrap();
    assert_eq!(run.state, ArchiveState::Done);
    let name = run.archive_name.clone().unwrap();

    let zip_path = Path::new(run.artifact_path.as_deref().unwrap()).to_path_buf();
    assert_eq!(zip_path, dir.path().join("tmp").join(format!("{}.zip", name)));
    assert!(zip_path.exists());

    // Working tree removed once packaged
    assert!(!dir.path().join("tmp").join(&name).exists());

    let home = read_zip_entry(&zip_path, &format!("{}/index.html", name));
    assert!(home.contains(r#"href="https://static.example.com/style.css""#));
    assert!(home.contains(r#"href="https://static.example.com/about/""#));
    assert!(!home.contains(&base));

    let about = read_zip_entry(&zip_path, &format!("{}/about/index.html", name));
    assert!(about.contains(r#"href="https://static.example.com/""#));

    let css = read_zip_entry(&zip_path, &format!("{}/style.css", name));
    assert!(css.contains("img/bg.png"));

    read_zip_entry(&zip_path, &format!("{}/img/bg.png", name));
    read_zip_entry(&zip_path, &format!("{}/new/index.html", name));

    let storage = manager.context().storage.lock().unwrap();
    let missing = storage
        .get_page_by_url(&format!("{}/missing.htm", base))
        .unwrap()
        .unwrap();
    assert_eq!(missing.status, PageStatus::CheckedError);
    assert_eq!(missing.http_status_code, Some(404));

    assert!(storage
        .get_page_by_url("http://external.example/18.htm")
        .unwrap()
        .is_none());
    assert!(storage
        .get_page_by_url(&format!("{}/commented-out/", base))
        .unwrap()
        .is_none());

    let redirected = storage
        .get_page_by_url(&format!("{}/new/", base))
        .unwrap()
        .unwrap();
    assert_eq!(redirected.status, PageStatus::CheckedSuccess);
    assert_eq!(redirected.found_on, Some(format!("{}/old", base)));

    // home, style.css, about/, old, missing.htm, img/bg.png, new/
    assert_eq!(storage.count_total().unwrap(), 7);
    assert_eq!(storage.count_by_status(PageStatus::Unchecked).unwrap(), 0);
}

#[tokio::test]
async fn test_local_delivery_with_relative_links() {
    let server = mock_site().await;
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("public");
    std::fs::create_dir_all(&out).unwrap();

    let config = config_for(
        &server,
        &dir,
        r#"link-style = "relative""#,
        &format!(
            "delivery-method = \"local\"\nlocal-dir = \"{}\"\ndelete-temp-files = false",
            out.display()
        ),
    );

    let manager = ArchiveManager::new(AppContext::open(config, None).unwrap());
    run_to_completion(&manager).await;

    let run = manager.run_state().unwrap();
    assert_eq!(run.state, ArchiveState::Done);
    assert_eq!(run.artifact_path.as_deref(), Some(out.display().to_string().as_str()));

    let home = std::fs::read_to_string(out.join("index.html")).unwrap();
    assert!(home.contains(r#"href="./about/""#));
    assert!(home.contains(r#"href="./style.css""#));

    let about = std::fs::read_to_string(out.join("about/index.html")).unwrap();
    assert!(about.contains(r#"href="../""#));

    assert_eq!(std::fs::read(out.join("img/bg.png")).unwrap(), b"\x89PNG");

    // Working tree kept
    let name = run.archive_name.unwrap();
    assert!(dir.path().join("tmp").join(name).join("index.html").exists());
}

#[tokio::test]
async fn test_additional_files_are_packaged() {
    let server = mock_site().await;
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("www");
    std::fs::create_dir_all(root.join("downloads")).unwrap();
    std::fs::write(root.join("downloads/manual.pdf"), b"%PDF").unwrap();

    let config = config_for(
        &server,
        &dir,
        &format!(
            "additional-files = [\"{}\"]\nallowed-file-roots = [\"{}\"]",
            root.join("downloads").display(),
            root.display()
        ),
        "",
    );

    let manager = ArchiveManager::new(AppContext::open(config, None).unwrap());
    run_to_completion(&manager).await;

    let run = manager.run_state().unwrap();
    let name = run.archive_name.unwrap();
    let zip_path = Path::new(run.artifact_path.as_deref().unwrap()).to_path_buf();
    assert_eq!(
        read_zip_entry(&zip_path, &format!("{}/downloads/manual.pdf", name)),
        "%PDF"
    );
}

#[tokio::test]
async fn test_cancel_mid_run() {
    let server = mock_site().await;
    let dir = TempDir::new().unwrap();
    let config = config_for(&server, &dir, "", "");

    let manager = ArchiveManager::new(AppContext::open(config, None).unwrap());
    manager.perform(Action::Start).await.unwrap();
    manager.perform(Action::Continue).await.unwrap();

    let pages_before = manager.context().storage.lock().unwrap().count_total().unwrap();
    assert!(pages_before > 1);

    let response = manager.perform(Action::Cancel).await.unwrap();
    assert_eq!(response.state_name, "CANCELLED");
    assert!(response.done);
    assert!(manager.has_finished().unwrap());

    let pages_after = manager.context().storage.lock().unwrap().count_total().unwrap();
    assert_eq!(pages_before, pages_after);

    let err = manager.perform(Action::Continue).await.unwrap_err();
    assert!(matches!(err, MirrorError::InvalidAction { .. }));
}

#[tokio::test]
async fn test_run_survives_reopen() {
    let server = mock_site().await;
    let dir = TempDir::new().unwrap();

    let first = ArchiveManager::new(
        AppContext::open(config_for(&server, &dir, "", ""), None).unwrap(),
    );
    first.perform(Action::Start).await.unwrap();
    first.perform(Action::Continue).await.unwrap();
    let archive_name = first.run_state().unwrap().archive_name;
    drop(first);

    let second = ArchiveManager::new(
        AppContext::open(config_for(&server, &dir, "", ""), None).unwrap(),
    );
    assert_eq!(second.state_name().unwrap(), "FETCHING");
    assert_eq!(second.run_state().unwrap().archive_name, archive_name);

    for _ in 0..50 {
        if second.has_finished().unwrap() {
            break;
        }
        second.continue_run().await.unwrap();
    }
    assert_eq!(second.run_state().unwrap().state, ArchiveState::Done);
}

#[tokio::test]
async fn test_start_refused_without_temp_dir() {
    let server = mock_site().await;
    let dir = TempDir::new().unwrap();
    let mut config = config_for(&server, &dir, "", "");
    config.output.temp_files_dir = dir.path().join("does-not-exist");

    let manager = ArchiveManager::new(AppContext::open(config, None).unwrap());
    let err = manager.perform(Action::Start).await.unwrap_err();

    match err {
        MirrorError::Requirements(report) => {
            assert_eq!(
                report.errors_for("temp_files_dir"),
                &[format!(
                    "Temporary files directory does not exist: {}",
                    dir.path().join("does-not-exist").display()
                )]
            );
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(manager.state_name().unwrap(), "NOT_STARTED");
}

#[tokio::test]
async fn test_run_with_every_fetch_failing_still_packages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = config_for(&server, &dir, "", "");

    let manager = ArchiveManager::new(AppContext::open(config, None).unwrap());
    run_to_completion(&manager).await;

    let run = manager.run_state().unwrap();
    assert_eq!(run.state, ArchiveState::Done, "error: {:?}", run.error_message);

    let zip_path = Path::new(run.artifact_path.as_deref().unwrap()).to_path_buf();
    let archive = zip::ZipArchive::new(std::fs::File::open(&zip_path).unwrap()).unwrap();
    assert_eq!(archive.len(), 0);

    let storage = manager.context().storage.lock().unwrap();
    let home = storage
        .get_page_by_url(&format!("{}/", server.uri()))
        .unwrap()
        .unwrap();
    assert_eq!(home.status, PageStatus::CheckedError);
    assert_eq!(home.http_status_code, Some(500));
}

#[tokio::test]
async fn test_kept_query_strings_link_to_saved_files() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(format!(
                    r#"<link rel="stylesheet" href="/style.css?v=2"><a href="{base}/about/">About</a>"#
                )),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/about/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<p>About</p>"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/style.css"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/css")
                .set_body_string("body { color: red }"),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = config_for(&server, &dir, "", "");
    config.crawler.keep_query_strings = true;

    let manager = ArchiveManager::new(AppContext::open(config, None).unwrap());
    run_to_completion(&manager).await;

    let run = manager.run_state().unwrap();
    assert_eq!(run.state, ArchiveState::Done);
    let name = run.archive_name.unwrap();
    let zip_path = Path::new(run.artifact_path.as_deref().unwrap()).to_path_buf();

    let style_url = url::Url::parse(&format!("{}/style.css?v=2", base)).unwrap();
    let style_file = local_path_for(&style_url);
    let style_file = style_file.to_str().unwrap().replace('\\', "/");
    assert_ne!(style_file, "style.css");

    let home = read_zip_entry(&zip_path, &format!("{}/index.html", name));
    assert!(
        home.contains(&format!(r#"href="https://static.example.com/{}""#, style_file)),
        "home page: {}",
        home
    );
    assert!(home.contains(r#"href="https://static.example.com/about/""#));

    assert_eq!(
        read_zip_entry(&zip_path, &format!("{}/{}", name, style_file)),
        "body { color: red }"
    );
}
