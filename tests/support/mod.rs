//! A small follow graph served by `httpmock`.
//!
//! `@ada` follows five ordinary accounts (1..=5) and one power user (99).
//! Accounts 1..=4 follow 10, 11 and 12; account 5 follows 10 and 11. With a
//! correspondence filter of 2 this yields one group anchored on 10, 11, 12.

#![allow(dead_code)]

use httpmock::{Method::GET, Mock, MockServer};
use serde_json::{Value, json};

pub const SEED_NAME: &str = "ada";
pub const CANDIDATES: [u64; 5] = [1, 2, 3, 4, 5];
pub const POWER_USER: u64 = 99;
pub const ANCHORS: [u64; 3] = [10, 11, 12];

pub struct GraphMocks<'a> {
    pub seed: Mock<'a>,
    pub enrich: Mock<'a>,
    pub candidates: Vec<Mock<'a>>,
    pub anchors: Mock<'a>,
}

impl GraphMocks<'_> {
    pub fn assert_each_called(&self, times: usize) {
        self.seed.assert_calls(times);
        self.enrich.assert_calls(times);
        for mock in &self.candidates {
            mock.assert_calls(times);
        }
        self.anchors.assert_calls(times);
    }
}

pub fn user(id: u64, name: &str, followers: u64, description: &str) -> Value {
    json!({
        "id": id,
        "screen_name": name,
        "followers_count": followers,
        "friends_count": 100,
        "description": description,
        "lang": "en"
    })
}

pub fn mount_graph(server: &MockServer) -> GraphMocks<'_> {
    let seed = server.mock(|when, then| {
        when.method(GET)
            .path("/1.1/friends/ids.json")
            .query_param("screen_name", SEED_NAME)
            .query_param("cursor", "-1");
        then.status(200)
            .header("content-type", "application/json; charset=utf-8")
            .json_body(json!({"ids": [1, 2, 3, 4, 5, 99], "next_cursor": 0}));
    });

    let enrich = server.mock(|when, then| {
        when.method(GET)
            .path("/1.1/users/lookup.json")
            .query_param("user_id", "1,2,3,4,5,99");
        then.status(200).json_body(json!([
            user(1, "ferris", 500, "Rustacean and baker"),
            user(2, "corro", 400, "Gardener, mostly"),
            user(3, "bors", 300, "Cyclist in the rain"),
            user(4, "clippy", 200, "Linter"),
            user(5, "miri", 100, "Interpreter"),
            user(POWER_USER, "famous", 5_000_000, "Household name"),
        ]));
    });

    let candidates = CANDIDATES
        .iter()
        .map(|id| {
            let followed: &[u64] = if *id == 5 { &[10, 11] } else { &ANCHORS };
            server.mock(|when, then| {
                when.method(GET)
                    .path("/1.1/friends/ids.json")
                    .query_param("user_id", id.to_string())
                    .query_param("cursor", "-1");
                then.status(200)
                    .json_body(json!({"ids": followed, "next_cursor": 0}));
            })
        })
        .collect();

    let anchors = server.mock(|when, then| {
        when.method(GET)
            .path("/1.1/users/lookup.json")
            .query_param("user_id", "10,11,12");
        then.status(200).json_body(json!([
            user(10, "tokio", 9_000, "Async runtime"),
            user(11, "serde", 8_000, "Serialization"),
            user(12, "clap", 7_000, "Argument parsing"),
        ]));
    });

    GraphMocks {
        seed,
        enrich,
        candidates,
        anchors,
    }
}
