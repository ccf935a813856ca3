mod helper;

use std::sync::Arc;

use mockito::{Matcher, Server};

use helper::{FakeSource, RecordingMutator, package, versions};
use nuget_manager::manager::PackageManager;
use nuget_manager::version::calibrator::StatusCalibrator;
use nuget_manager::version::error::ResolveError;
use nuget_manager::version::ordering::VersionOrdering;
use nuget_manager::version::resolver::VersionResolver;
use nuget_manager::version::source::{StatusAuthority, VersionSource};
use nuget_manager::version::sources::{FlatContainerSource, RegistrationSource};
use nuget_manager::version::types::{SourceKind, SourceSelector, VersionRecord};

fn manager_with(resolver: VersionResolver) -> PackageManager {
    PackageManager::build(
        resolver,
        Arc::new(RecordingMutator::new()),
        SourceSelector::Comprehensive,
        false,
    )
}

#[tokio::test]
async fn comprehensive_keeps_first_seen_status_against_live_endpoints() {
    let mut server = Server::new_async().await;
    let flat = server
        .mock("GET", "/flat/contoso.widgets/index.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"versions": ["2.0.0", "1.0.0"]}"#)
        .create_async()
        .await;
    let registration = server
        .mock("GET", "/reg/contoso.widgets/index.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"items": [{"items": [{"catalogEntry": {"version": "1.0.0", "listed": false}}]}]}"#,
        )
        .create_async()
        .await;

    let sources: Vec<Arc<dyn VersionSource>> = vec![
        Arc::new(FlatContainerSource::new(&format!("{}/flat", server.url()))),
        Arc::new(RegistrationSource::new(&format!("{}/reg", server.url()))),
    ];
    let manager = manager_with(VersionResolver::new(sources));

    let resolution = manager.resolve(&package("Contoso.Widgets")).await.unwrap();

    flat.assert_async().await;
    registration.assert_async().await;
    assert_eq!(
        resolution.result.records(),
        &[VersionRecord::listed("2.0.0"), VersionRecord::listed("1.0.0")]
    );
    assert_eq!(resolution.reports.len(), 2);
    assert!(resolution.reports.iter().all(|r| !r.failed()));
}

#[tokio::test]
async fn registration_pages_linking_back_are_fetched_once() {
    let mut server = Server::new_async().await;
    let base = server.url();
    let index = server
        .mock("GET", "/reg/contoso/index.json")
        .with_status(200)
        .with_body(format!(r#"{{"items": [{{"@id": "{base}/reg/contoso/page/a.json"}}]}}"#))
        .expect(1)
        .create_async()
        .await;
    let page_a = server
        .mock("GET", "/reg/contoso/page/a.json")
        .with_status(200)
        .with_body(format!(
            r#"{{"items": [
                {{"catalogEntry": {{"version": "1.0.0"}}}},
                {{"@id": "{base}/reg/contoso/page/b.json"}}
            ]}}"#
        ))
        .expect(1)
        .create_async()
        .await;
    let page_b = server
        .mock("GET", "/reg/contoso/page/b.json")
        .with_status(200)
        .with_body(format!(
            r#"{{"items": [
                {{"catalogEntry": {{"version": "2.0.0", "listed": false}}}},
                {{"@id": "{base}/reg/contoso/page/a.json"}}
            ]}}"#
        ))
        .expect(1)
        .create_async()
        .await;

    let resolver = VersionResolver::new(vec![Arc::new(RegistrationSource::new(&format!(
        "{base}/reg"
    )))]);
    let manager = manager_with(resolver);

    let resolution = manager
        .resolve_with(&package("Contoso"), SourceSelector::RegistrationApi, false)
        .await
        .unwrap();

    index.assert_async().await;
    page_a.assert_async().await;
    page_b.assert_async().await;
    assert_eq!(
        resolution.result.records(),
        &[VersionRecord::unlisted("2.0.0"), VersionRecord::listed("1.0.0")]
    );
}

#[tokio::test]
async fn calibration_corrects_flat_container_status() {
    let mut server = Server::new_async().await;
    let _flat = server
        .mock("GET", "/flat/contoso/index.json")
        .with_status(200)
        .with_body(r#"{"versions": ["1.0.0", "1.1.0"]}"#)
        .create_async()
        .await;
    let _registration = server
        .mock("GET", Matcher::Regex(r"^/reg/contoso/index\.json$".to_string()))
        .with_status(200)
        .with_body(
            r#"{"items": [{"items": [
                {"catalogEntry": {"version": "1.0.0", "listed": false}},
                {"catalogEntry": {"version": "1.1.0", "listed": true}}
            ]}]}"#,
        )
        .create_async()
        .await;

    let registration = Arc::new(RegistrationSource::new(&format!("{}/reg", server.url())));
    let authorities: Vec<Arc<dyn StatusAuthority>> = vec![registration.clone()];
    let resolver = VersionResolver::new(vec![
        Arc::new(FlatContainerSource::new(&format!("{}/flat", server.url()))),
        registration,
    ])
    .with_calibrator(StatusCalibrator::new(authorities));
    let manager = manager_with(resolver);

    let listed = manager.listed_versions(&package("Contoso")).await.unwrap();

    assert_eq!(listed, vec!["1.1.0"]);
}

#[tokio::test]
async fn all_sources_failing_in_comprehensive_mode_is_an_error() {
    let mut server = Server::new_async().await;
    let _flat = server
        .mock("GET", "/flat/missing/index.json")
        .with_status(404)
        .create_async()
        .await;
    let _registration = server
        .mock("GET", "/reg/missing/index.json")
        .with_status(500)
        .create_async()
        .await;

    let manager = manager_with(VersionResolver::new(vec![
        Arc::new(FlatContainerSource::new(&format!("{}/flat", server.url()))),
        Arc::new(RegistrationSource::new(&format!("{}/reg", server.url()))),
    ]));

    let err = manager.resolve(&package("Missing")).await.unwrap_err();

    let ResolveError::AllSourcesFailed { failures, .. } = err;
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].0, SourceKind::FlatContainer);
    assert_eq!(failures[1].0, SourceKind::Registration);
}

#[tokio::test]
async fn ordering_choice_changes_result_order() {
    let records = vec![VersionRecord::listed("2.0.0"), VersionRecord::listed("10.0.0")];
    let source = || -> Arc<dyn VersionSource> {
        Arc::new(FakeSource::new(SourceKind::FlatContainer).with_versions("Contoso", records.clone()))
    };

    let ordinal = manager_with(VersionResolver::new(vec![source()]))
        .resolve_with(&package("Contoso"), SourceSelector::PackageBaseAddress, false)
        .await
        .unwrap();
    let semantic = manager_with(
        VersionResolver::new(vec![source()]).with_ordering(VersionOrdering::Semantic),
    )
    .resolve_with(&package("Contoso"), SourceSelector::PackageBaseAddress, false)
    .await
    .unwrap();

    let order = |r: &nuget_manager::version::resolver::Resolution| -> Vec<String> {
        r.result.records().iter().map(|r| r.version.clone()).collect()
    };
    assert_eq!(order(&ordinal), versions(&["2.0.0", "10.0.0"]));
    assert_eq!(order(&semantic), versions(&["10.0.0", "2.0.0"]));
}

#[tokio::test]
async fn plan_unlist_skips_versions_already_unlisted() {
    let manager = manager_with(VersionResolver::new(vec![
        Arc::new(
            FakeSource::new(SourceKind::FlatContainer)
                .with_versions("Contoso", vec![VersionRecord::listed("2.0.0")]),
        ),
        Arc::new(
            FakeSource::new(SourceKind::Registration)
                .with_versions("Contoso", vec![VersionRecord::unlisted("1.0.0")]),
        ),
    ]));

    let plan = manager
        .plan_unlist(&package("Contoso"), &versions(&["1.0.0", "2.0.0"]))
        .await
        .unwrap();

    assert_eq!(plan.targets, versions(&["2.0.0"]));
    assert_eq!(plan.already_unlisted, versions(&["1.0.0"]));
}
