// Copyright (C) 2019-2026 The gossipmap authors.
// This file is part of the gossipmap library.

// The gossipmap library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// The gossipmap library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with the gossipmap library. If not, see <https://www.gnu.org/licenses/>.

//! Text feed fetching for bogon lists and ASN allow-lists, behind a trait
//! matching `original_source/utils.py::http_get_txt`'s contract: network
//! failures are swallowed and yield an empty string rather than propagating,
//! since a stale policy list should never take the crawl down.

use std::sync::Arc;

use tracing::warn;

pub trait PolicyFeed: Send + Sync {
    fn fetch_text(&self, url: &str) -> String;
}

pub struct HttpPolicyFeed {
    client: reqwest::blocking::Client,
}

impl HttpPolicyFeed {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .user_agent("gossipmap")
                .build()
                .expect("building the static reqwest client cannot fail with these options"),
        }
    }
}

impl Default for HttpPolicyFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyFeed for HttpPolicyFeed {
    fn fetch_text(&self, url: &str) -> String {
        match self.client.get(url).send().and_then(|resp| resp.error_for_status()).and_then(|resp| resp.text()) {
            Ok(text) => text,
            Err(err) => {
                warn!(%url, %err, "policy feed fetch failed");
                String::new()
            }
        }
    }
}

pub type SharedPolicyFeed = Arc<dyn PolicyFeed>;

#[cfg(test)]
mod test {
    use super::*;

    struct Empty;
    impl PolicyFeed for Empty {
        fn fetch_text(&self, _url: &str) -> String {
            String::new()
        }
    }

    #[test]
    fn trait_object_is_usable() {
        let feed: SharedPolicyFeed = Arc::new(Empty);
        assert_eq!(feed.fetch_text("http://example.invalid"), "");
    }
}
