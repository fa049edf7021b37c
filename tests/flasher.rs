// Integration tests for the command surface: listing and flash sessions
mod common;

use std::time::Duration;

use acreetion_imager::images::LOAD_ERROR_LABEL;
use acreetion_imager::{FlashError, Flasher, FlasherEvent, ImageSource, StatusKind};
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DOWNLOAD_PAGE: &str = r#"
<html><body>
  <ul>
    <li>Stable <a href="/isos/acreetionos-2025.01.iso">Stable build</a></li>
    <li><a href="nightly/acreetionos-nightly.iso">acreetionos-nightly.iso</a></li>
    <li><a href="/isos/acreetionos-2025.01.iso.sha256">checksum</a></li>
  </ul>
</body></html>
"#;

fn page_flasher(server: &MockServer, dir: &std::path::Path) -> Flasher {
    let mut settings = common::test_settings(dir);
    settings.image_page_url = format!("{}/downloads/", server.uri());
    Flasher::new(settings).unwrap()
}

#[tokio::test]
async fn test_list_images_from_page() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/downloads/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(DOWNLOAD_PAGE, "text/html"))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let flasher = page_flasher(&mock_server, dir.path());
    let mut rx = flasher.subscribe();

    let images = flasher.list_images().await;
    assert_eq!(
        images,
        vec![
            ImageSource::new(
                "Stable build",
                format!("{}/isos/acreetionos-2025.01.iso", mock_server.uri())
            ),
            ImageSource::new(
                "acreetionos-nightly.iso",
                format!("{}/downloads/nightly/acreetionos-nightly.iso", mock_server.uri())
            ),
        ]
    );

    let statuses: Vec<(String, StatusKind)> = common::drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            FlasherEvent::Status { message, kind } => Some((message, kind)),
            _ => None,
        })
        .collect();
    assert_eq!(statuses.first().map(|s| s.1), Some(StatusKind::Loading));
    assert_eq!(
        statuses.last(),
        Some(&("Found 2 ISO images".to_string(), StatusKind::Success))
    );
}

#[tokio::test]
async fn test_page_without_isos_yields_sentinel() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/downloads/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html><a href=\"/a.zip\">zip</a></html>", "text/html"))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let images = page_flasher(&mock_server, dir.path()).list_images().await;

    assert_eq!(images.len(), 1);
    assert_eq!(images[0].url, "");
    assert_eq!(images[0].label, "No ISOs found on 127.0.0.1");
}

#[tokio::test]
async fn test_page_error_yields_error_sentinel() {
    let mock_server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let images = page_flasher(&mock_server, dir.path()).list_images().await;

    assert_eq!(images, vec![ImageSource::sentinel(LOAD_ERROR_LABEL)]);
}

#[tokio::test]
async fn test_invalid_request_has_no_side_effects() {
    let mock_server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let work_dir = dir.path().join("work");
    let flasher = Flasher::new(common::test_settings(&work_dir)).unwrap();

    let url = format!("{}/a.iso", mock_server.uri());
    let no_device = flasher.flash(&url, "  ").await;
    let no_image = flasher.flash("", "/dev/sdb").await;

    assert!(!no_device.success);
    assert!(!no_image.success);
    assert!(!work_dir.exists());
}

#[tokio::test]
async fn test_download_failure_cleans_up() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.iso"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let flasher = Flasher::new(common::test_settings(dir.path())).unwrap();

    let url = format!("{}/gone.iso", mock_server.uri());
    let result = flasher.flash(&url, "/dev/null").await;

    assert!(!result.success);
    assert_eq!(result.message, "HTTP 404: Not Found");
    assert!(common::dir_entries(dir.path()).is_empty());
    assert!(!flasher.session().is_active());
}

#[cfg(unix)]
mod with_writer {
    use super::*;
    use acreetion_imager::flash::{DirectCopy, FlashWriter};
    use acreetion_imager::session::Phase;
    use acreetion_imager::Settings;

    fn flasher_with_program(dir: &std::path::Path, program: &str) -> Flasher {
        let settings = Settings {
            copy_program: program.to_string(),
            ..common::test_settings(dir)
        };
        let writer = FlashWriter::DirectCopy(DirectCopy::new(&settings));
        Flasher::new(settings).unwrap().with_writer(writer)
    }

    /// Serve the image, expecting exactly one download
    async fn serve_image(server: &MockServer, delay: Duration) {
        Mock::given(method("GET"))
            .and(path("/isos/acreetionos.iso"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(common::create_test_data(64 * 1024))
                    .set_delay(delay),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    /// dd stand-in that takes a second before reading its `if=` argument
    fn slow_writer(dir: &std::path::Path) -> String {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("slow-dd.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\nsleep 1\nfor arg in \"$@\"; do\n  case \"$arg\" in\n    if=*) cat \"${arg#if=}\" > /dev/null || exit 1 ;;\n  esac\ndone\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script.to_string_lossy().to_string()
    }

    #[tokio::test]
    async fn test_successful_flash() {
        let mock_server = MockServer::start().await;
        serve_image(&mock_server, Duration::ZERO).await;

        let dir = tempfile::tempdir().unwrap();
        let flasher = flasher_with_program(dir.path(), "true");
        let mut rx = flasher.subscribe();

        let url = format!("{}/isos/acreetionos.iso", mock_server.uri());
        let result = flasher.flash(&url, "/dev/null").await;

        assert!(result.success, "flash failed: {}", result.message);
        assert!(!dir.path().join("acreetionos.iso").exists());
        assert!(common::dir_entries(dir.path()).is_empty());

        let events = common::drain(&mut rx);
        let progress = common::progress_values(&events);
        assert_eq!(progress.last(), Some(&100));
        // Write phase restarts from zero after the download
        assert!(progress.contains(&0));
        assert!(events.iter().any(|e| matches!(
            e,
            FlasherEvent::Status { kind: StatusKind::Success, .. }
        )));
        assert!(events
            .iter()
            .any(|e| matches!(e, FlasherEvent::LogLine { text } if text.starts_with("Executing: true"))));
    }

    #[tokio::test]
    async fn test_writer_failure_reports_exit_code() {
        let mock_server = MockServer::start().await;
        serve_image(&mock_server, Duration::ZERO).await;

        let dir = tempfile::tempdir().unwrap();
        let flasher = flasher_with_program(dir.path(), "false");
        let mut rx = flasher.subscribe();

        let url = format!("{}/isos/acreetionos.iso", mock_server.uri());
        let result = flasher.flash(&url, "/dev/null").await;

        assert!(!result.success);
        assert!(result.message.contains("failed"), "message: {}", result.message);
        assert_eq!(result.message, FlashError::WriteExit { code: 1 }.to_string());
        assert!(common::dir_entries(dir.path()).is_empty());
        assert!(common::drain(&mut rx).iter().any(|e| matches!(
            e,
            FlasherEvent::LogLine { text } if text.contains("writer output")
        )));
    }

    #[tokio::test]
    async fn test_missing_writer_is_spawn_failure() {
        let mock_server = MockServer::start().await;
        serve_image(&mock_server, Duration::ZERO).await;

        let dir = tempfile::tempdir().unwrap();
        let flasher = flasher_with_program(dir.path(), "/nonexistent/dd");

        let url = format!("{}/isos/acreetionos.iso", mock_server.uri());
        let result = flasher.flash(&url, "/dev/null").await;

        assert!(!result.success);
        assert!(result.message.starts_with("Failed to start flash process"));
        assert!(common::dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_flash_is_rejected() {
        let mock_server = MockServer::start().await;
        serve_image(&mock_server, Duration::from_millis(1500)).await;

        let dir = tempfile::tempdir().unwrap();
        let flasher = flasher_with_program(dir.path(), "true");
        let url = format!("{}/isos/acreetionos.iso", mock_server.uri());

        let first = {
            let flasher = flasher.clone();
            let url = url.clone();
            tokio::spawn(async move { flasher.flash(&url, "/dev/null").await })
        };

        let mut waited = 0;
        while !flasher.session().is_active() && waited < 200 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += 1;
        }
        assert!(flasher.session().is_active());

        let second = flasher.flash(&url, "/dev/zero").await;
        assert!(!second.success);
        assert_eq!(second.message, FlashError::SessionBusy.to_string());

        let first = first.await.unwrap();
        assert!(first.success, "first flash failed: {}", first.message);
        assert!(!flasher.session().is_active());
    }

    #[tokio::test]
    async fn test_second_instance_leaves_active_session_alone() {
        let mock_server = MockServer::start().await;
        serve_image(&mock_server, Duration::ZERO).await;

        let scripts = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let first = flasher_with_program(dir.path(), &slow_writer(scripts.path()));
        let url = format!("{}/isos/acreetionos.iso", mock_server.uri());

        let flashing = {
            let first = first.clone();
            let url = url.clone();
            tokio::spawn(async move { first.flash(&url, "/dev/null").await })
        };

        let mut waited = 0;
        while first.session().phase() != Phase::Writing && waited < 500 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += 1;
        }
        assert_eq!(first.session().phase(), Phase::Writing);
        assert!(dir.path().join("acreetionos.iso").exists());

        // Separate instance: no shared session slot, same working directory
        let second = Flasher::new(common::test_settings(dir.path())).unwrap();
        assert_eq!(second.purge_stale_artifacts(), 0);
        assert!(dir.path().join("acreetionos.iso").exists());

        let rejected = second.flash(&url, "/dev/zero").await;
        assert!(!rejected.success);
        assert_eq!(rejected.message, FlashError::SessionBusy.to_string());
        assert!(dir.path().join("acreetionos.iso").exists());

        let result = flashing.await.unwrap();
        assert!(result.success, "first flash failed: {}", result.message);
        assert!(common::dir_entries(dir.path()).is_empty());
        assert!(!second.session().is_active());
    }
}
