use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use cohort::application::grouping::{Grouper, GroupingConfig, GroupingError};
use cohort::cache::{FileBackend, MemoryBackend, ResponseCache};
use cohort::infra::api::{ApiConfig, ApiError, Credentials, RestClient};
use cohort_api_types::UserRef;
use httpmock::{Method::GET, Method::POST, MockServer};
use serde_json::json;
use tempfile::TempDir;
use url::Url;

mod support;

use support::{ANCHORS, POWER_USER, SEED_NAME, mount_graph, user};

fn api_config(server: &MockServer) -> ApiConfig {
    ApiConfig::new(Url::parse(&server.url("/1.1/")).expect("mock url"))
}

fn memory_cache() -> Arc<ResponseCache> {
    Arc::new(ResponseCache::new(
        Arc::new(MemoryBackend::new()),
        Duration::from_secs(600),
    ))
}

fn grouping_config() -> GroupingConfig {
    GroupingConfig {
        correspondence_filter: 2,
        worker_pool_size: NonZeroUsize::new(3).expect("non-zero"),
        ..GroupingConfig::default()
    }
}

#[tokio::test]
async fn full_run_groups_shared_followers() {
    let server = MockServer::start();
    let mocks = mount_graph(&server);

    let client = RestClient::new(&api_config(&server)).expect("client");
    let grouper = Grouper::new(Arc::new(client), grouping_config());

    let report = grouper
        .generate(&UserRef::ScreenName(SEED_NAME.into()))
        .await
        .expect("report");

    assert_eq!(report.groups.len(), 1);
    let group = &report.groups[0];
    assert_eq!(group.similarity_ids, ANCHORS.to_vec());
    assert_eq!(
        group
            .similarities
            .iter()
            .map(|user| user.screen_name.as_str())
            .collect::<Vec<_>>(),
        ["tokio", "serde", "clap"]
    );
    assert_eq!(
        group.members.iter().map(|user| user.id).collect::<Vec<_>>(),
        [1, 2, 3, 4, 5]
    );
    assert_eq!(group.label, "Rustacean's Gardener Cyclist");

    assert_eq!(report.power_users.len(), 1);
    assert_eq!(report.power_users[0].id, POWER_USER);
    assert_eq!(report.expansion.dispatched, 5);
    assert_eq!(report.expansion.succeeded, 5);
    assert_eq!(report.expansion.failed, 0);

    mocks.assert_each_called(1);
}

#[tokio::test]
async fn second_run_is_served_from_cache() {
    let server = MockServer::start();
    let mocks = mount_graph(&server);

    let client = RestClient::new(&api_config(&server))
        .expect("client")
        .with_cache(memory_cache(), false);
    let grouper = Grouper::new(Arc::new(client), grouping_config());
    let target = UserRef::ScreenName(SEED_NAME.into());

    let first = grouper.generate(&target).await.expect("first run");
    let second = grouper.generate(&target).await.expect("second run");

    assert_eq!(first, second);
    mocks.assert_each_called(1);
}

#[tokio::test]
async fn file_cache_survives_a_new_client() {
    let server = MockServer::start();
    let mocks = mount_graph(&server);
    let dir = TempDir::new().expect("temp dir");
    let target = UserRef::ScreenName(SEED_NAME.into());

    for _ in 0..2 {
        let cache = Arc::new(ResponseCache::new(
            Arc::new(FileBackend::new(dir.path())),
            Duration::from_secs(600),
        ));
        let client = RestClient::new(&api_config(&server))
            .expect("client")
            .with_cache(cache, false);
        Grouper::new(Arc::new(client), grouping_config())
            .generate(&target)
            .await
            .expect("report");
    }

    mocks.assert_each_called(1);
}

#[tokio::test]
async fn failing_candidates_degrade_to_no_groups() {
    let server = MockServer::start();
    let seed = server.mock(|when, then| {
        when.method(GET)
            .path("/1.1/friends/ids.json")
            .query_param("screen_name", "seven");
        then.status(200).json_body(json!({"ids": [1, 2, 3]}));
    });
    let enrich = server.mock(|when, then| {
        when.method(GET).path("/1.1/users/lookup.json");
        then.status(200).json_body(json!([
            user(1, "a", 10, ""),
            user(2, "b", 10, ""),
            user(3, "c", 10, ""),
        ]));
    });
    let candidates = server.mock(|when, then| {
        when.method(GET)
            .path("/1.1/friends/ids.json")
            .query_param_exists("user_id");
        then.status(401).body("not authorized");
    });

    let client = RestClient::new(&api_config(&server)).expect("client");
    let report = Grouper::new(Arc::new(client), grouping_config())
        .generate(&UserRef::ScreenName("seven".into()))
        .await
        .expect("expansion failures do not abort");

    assert!(report.groups.is_empty());
    assert_eq!(report.expansion.dispatched, 3);
    assert_eq!(report.expansion.failed, 3);
    seed.assert();
    enrich.assert();
    candidates.assert_calls(3);
}

#[tokio::test]
async fn seed_failure_aborts_the_run() {
    let server = MockServer::start();
    let seed = server.mock(|when, then| {
        when.method(GET).path("/1.1/friends/ids.json");
        then.status(404).body(r#"{"errors":[{"code":34}]}"#);
    });

    let client = RestClient::new(&api_config(&server)).expect("client");
    let err = Grouper::new(Arc::new(client), grouping_config())
        .generate(&UserRef::ScreenName("nobody".into()))
        .await
        .expect_err("seed must fail");

    assert!(matches!(err, GroupingError::Seed { .. }));
    seed.assert();
}

#[tokio::test]
async fn user_details_are_chunked_in_order() {
    let server = MockServer::start();
    let ids: Vec<u64> = (1..=250).collect();
    let chunk_mocks: Vec<_> = ids
        .chunks(100)
        .map(|chunk| {
            let joined = chunk
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let body: Vec<_> = chunk
                .iter()
                .map(|id| user(*id, &format!("user{id}"), 1, ""))
                .collect();
            server.mock(|when, then| {
                when.method(GET)
                    .path("/1.1/users/lookup.json")
                    .query_param("user_id", joined);
                then.status(200).json_body(json!(body));
            })
        })
        .collect();

    let client = RestClient::new(&api_config(&server)).expect("client");
    let users = client.user_details(&ids).await.expect("details");

    assert_eq!(chunk_mocks.len(), 3);
    assert_eq!(users.iter().map(|user| user.id).collect::<Vec<_>>(), ids);
    for mock in &chunk_mocks {
        mock.assert();
    }
}

#[tokio::test]
async fn error_responses_are_not_cached_by_default() {
    let server = MockServer::start();
    let failing = server.mock(|when, then| {
        when.method(GET).path("/1.1/friends/ids.json");
        then.status(500).body("over capacity");
    });

    let client = RestClient::new(&api_config(&server))
        .expect("client")
        .with_cache(memory_cache(), false);
    let target = UserRef::Id(1);

    for _ in 0..2 {
        let err = client.following(&target).await.expect_err("server error");
        assert_eq!(err.status(), Some(500));
    }
    failing.assert_calls(2);
}

#[tokio::test]
async fn persisted_errors_are_replayed_from_cache() {
    let server = MockServer::start();
    let failing = server.mock(|when, then| {
        when.method(GET).path("/1.1/friends/ids.json");
        then.status(500).body("over capacity");
    });

    let client = RestClient::new(&api_config(&server))
        .expect("client")
        .with_cache(memory_cache(), true);
    let target = UserRef::Id(1);

    for _ in 0..2 {
        match client.following(&target).await {
            Err(ApiError::RemoteCall { status, body, .. }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "over capacity");
            }
            other => panic!("expected a replayed remote error, got {other:?}"),
        }
    }
    failing.assert_calls(1);
}

#[tokio::test]
async fn forget_forces_a_fresh_fetch() {
    let server = MockServer::start();
    let seed = server.mock(|when, then| {
        when.method(GET).path("/1.1/friends/ids.json");
        then.status(200).json_body(json!({"ids": [3, 2, 1]}));
    });

    let client = RestClient::new(&api_config(&server))
        .expect("client")
        .with_cache(memory_cache(), false);
    let target = UserRef::ScreenName("ada".into());

    assert_eq!(client.following(&target).await.expect("ids"), [3, 2, 1]);
    client
        .forget(
            "friends/ids.json",
            &[("screen_name", "ada".into()), ("cursor", "-1".into())],
        )
        .await
        .expect("forget");
    assert_eq!(client.following(&target).await.expect("ids"), [3, 2, 1]);

    seed.assert_calls(2);
}

#[tokio::test]
async fn credentials_are_sent_and_partition_the_cache() {
    let server = MockServer::start();
    let signed = server.mock(|when, then| {
        when.method(GET)
            .path("/1.1/friends/ids.json")
            .header("authorization", "Bearer tok");
        then.status(200).json_body(json!({"ids": [1]}));
    });
    let anonymous = server.mock(|when, then| {
        when.method(GET)
            .path("/1.1/friends/ids.json")
            .header_missing("authorization");
        then.status(200).json_body(json!({"ids": [2]}));
    });

    let cache = memory_cache();
    let with_creds = RestClient::new(
        &api_config(&server).with_credentials(Credentials::new("tok", "sec")),
    )
    .expect("client")
    .with_cache(cache.clone(), false);
    let without = RestClient::new(&api_config(&server))
        .expect("client")
        .with_cache(cache, false);
    let target = UserRef::Id(5);

    assert_eq!(with_creds.following(&target).await.expect("ids"), [1]);
    assert_eq!(without.following(&target).await.expect("ids"), [2]);
    assert_eq!(with_creds.following(&target).await.expect("ids"), [1]);

    signed.assert();
    anonymous.assert();
}

#[tokio::test]
async fn create_list_posts_form_and_adds_members_in_chunks() {
    let server = MockServer::start();
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/1.1/lists/create.json")
            .header("authorization", "Bearer tok")
            .header("content-type", "application/x-www-form-urlencoded")
            .body_includes("name=abcdefghijklmnopqrstuvwxy&");
        then.status(200)
            .json_body(json!({"id_str": "777", "name": "abcdefghijklmnopqrstuvwxy"}));
    });
    let members = server.mock(|when, then| {
        when.method(POST)
            .path("/1.1/lists/members/create_all.json")
            .body_includes("list_id=777");
        then.status(200).json_body(json!({"id_str": "777"}));
    });

    let cache = memory_cache();
    let client = RestClient::new(
        &api_config(&server).with_credentials(Credentials::new("tok", "sec")),
    )
    .expect("client")
    .with_cache(cache, true);
    let ids: Vec<u64> = (1..=150).collect();

    let list = client
        .create_list("abcdefghijklmnopqrstuvwxyz0123", "test list", &ids)
        .await
        .expect("list");
    assert_eq!(list.id_str, "777");

    // Mutating calls always reach the server.
    client
        .create_list("abcdefghijklmnopqrstuvwxyz0123", "test list", &[])
        .await
        .expect("list");

    create.assert_calls(2);
    members.assert_calls(2);
}

#[tokio::test]
async fn malformed_body_reports_the_full_url() {
    let server = MockServer::start();
    let garbled = server.mock(|when, then| {
        when.method(GET).path("/1.1/friends/ids.json");
        then.status(200).body("<html>not json</html>");
    });

    let client = RestClient::new(&api_config(&server)).expect("client");
    match client.following(&UserRef::Id(9)).await {
        Err(ApiError::Decode { url, .. }) => {
            assert!(
                url.starts_with(&server.url("/1.1/friends/ids.json")),
                "unexpected url {url}"
            );
        }
        other => panic!("expected a decode error, got {other:?}"),
    }
    garbled.assert();
}
