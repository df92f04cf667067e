use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::model::{LeagueEntry, LeagueList, MatchRecord, Summoner, decode, top_entries};

const DEFAULT_MAX_REQS_PER_2MIN: usize = 80;
const DEFAULT_MAX_REQS_PER_SEC: usize = 20;
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(10);

/// Read-only operations the pipeline needs from the game API.
///
/// `platform` is a platform routing value (`NA1`, `EUW1`, ...) and `region`
/// a regional one (`AMERICAS`, `EUROPE`, ...).
pub trait MatchSource {
    /// Challenger ladder entries, highest league points first.
    fn top_players(&self, platform: &str, count: usize) -> Result<Vec<LeagueEntry>, ApiError>;

    fn resolve_player_id(&self, platform: &str, summoner_id: &str) -> Result<String, ApiError>;

    fn recent_match_ids(
        &self,
        region: &str,
        puuid: &str,
        count: usize,
    ) -> Result<Vec<String>, ApiError>;

    fn match_by_id(&self, region: &str, match_id: &str) -> Result<MatchRecord, ApiError>;
}

fn build_headers(api_key: &str) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert("X-Riot-Token", HeaderValue::from_str(api_key)?);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Ok(headers)
}

pub fn base_url(routing: &str) -> String {
    format!("https://{}.api.riotgames.com", routing.to_ascii_lowercase())
}

pub struct RiotClient {
    client: Client,
    headers: HeaderMap,
    limiter: Mutex<RateLimiter>,
}

impl RiotClient {
    pub fn new(api_key: &str) -> Result<Self, ApiError> {
        Self::new_with_max(api_key, DEFAULT_MAX_REQS_PER_2MIN)
    }

    pub fn new_with_max(api_key: &str, max_reqs_per_2min: usize) -> Result<Self, ApiError> {
        Ok(Self {
            client: Client::new(),
            headers: build_headers(api_key)?,
            limiter: Mutex::new(RateLimiter::new(
                max_reqs_per_2min,
                DEFAULT_MAX_REQS_PER_SEC,
            )),
        })
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, resource: &str) -> Result<T, ApiError> {
        let response = self.request_with_retry(url)?;
        let body = response.bytes().map_err(|source| ApiError::Http {
            url: url.to_string(),
            source,
        })?;
        decode(resource, &body)
    }

    fn request_with_retry(&self, url: &str) -> Result<Response, ApiError> {
        const MAX_ATTEMPTS: usize = 2;
        let mut attempt = 0;

        loop {
            attempt += 1;

            self.wait_rate_limit();

            debug!(url, attempt, "GET");
            let response = self
                .client
                .get(url)
                .headers(self.headers.clone())
                .send()
                .map_err(|source| ApiError::Http {
                    url: url.to_string(),
                    source,
                })?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= MAX_ATTEMPTS {
                    return Err(ApiError::RateLimited {
                        url: url.to_string(),
                    });
                }

                let wait = parse_retry_after(&response).unwrap_or(DEFAULT_RETRY_AFTER);
                warn!(url, wait_secs = wait.as_secs(), "rate limited, retrying");
                sleep(wait);
                continue;
            }

            if !response.status().is_success() {
                return Err(ApiError::Status {
                    url: url.to_string(),
                    status: response.status(),
                });
            }

            return Ok(response);
        }
    }

    fn wait_rate_limit(&self) {
        self.limiter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .wait();
    }
}

impl MatchSource for RiotClient {
    fn top_players(&self, platform: &str, count: usize) -> Result<Vec<LeagueEntry>, ApiError> {
        let url = format!("{}/tft/league/v1/challenger", base_url(platform));
        let league: LeagueList = self.get_json(&url, "challenger league")?;

        Ok(top_entries(league.entries, count))
    }

    fn resolve_player_id(&self, platform: &str, summoner_id: &str) -> Result<String, ApiError> {
        let url = format!(
            "{}/tft/summoner/v1/summoners/{}",
            base_url(platform),
            summoner_id
        );
        let summoner: Summoner = self.get_json(&url, &format!("summoner {}", summoner_id))?;

        Ok(summoner.puuid)
    }

    fn recent_match_ids(
        &self,
        region: &str,
        puuid: &str,
        count: usize,
    ) -> Result<Vec<String>, ApiError> {
        let url = format!(
            "{}/tft/match/v1/matches/by-puuid/{}/ids?count={}",
            base_url(region),
            puuid,
            count
        );

        self.get_json(&url, &format!("match ids for {}", puuid))
    }

    fn match_by_id(&self, region: &str, match_id: &str) -> Result<MatchRecord, ApiError> {
        let url = format!("{}/tft/match/v1/matches/{}", base_url(region), match_id);

        self.get_json(&url, &format!("match {}", match_id))
    }
}

/// Sliding-window limiter for the per-second and per-two-minute quotas of a
/// development API key.
pub struct RateLimiter {
    max_reqs_per_2min: usize,
    max_reqs_per_sec: usize,
    timestamps_2min: VecDeque<Instant>,
    timestamps_1s: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_reqs_per_2min: usize, max_reqs_per_sec: usize) -> Self {
        Self {
            max_reqs_per_2min,
            max_reqs_per_sec,
            timestamps_2min: VecDeque::new(),
            timestamps_1s: VecDeque::new(),
        }
    }

    pub fn wait(&mut self) {
        while let Some(duration) = self.delay(Instant::now()) {
            sleep(duration);
        }

        let timestamp = Instant::now();
        self.timestamps_1s.push_back(timestamp);
        self.timestamps_2min.push_back(timestamp);
    }

    /// How long to hold off before the next request, if at all.
    fn delay(&mut self, now: Instant) -> Option<Duration> {
        self.prune(now);

        let window_delay = |timestamps: &VecDeque<Instant>, max: usize, window: Duration| {
            if timestamps.len() < max {
                return None;
            }
            timestamps
                .front()
                .map(|oldest| now.duration_since(*oldest))
                .filter(|elapsed| *elapsed < window)
                .map(|elapsed| window - elapsed)
        };

        window_delay(
            &self.timestamps_1s,
            self.max_reqs_per_sec,
            Duration::from_secs(1),
        )
        .or_else(|| {
            window_delay(
                &self.timestamps_2min,
                self.max_reqs_per_2min,
                Duration::from_secs(120),
            )
        })
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.timestamps_1s.front() {
            if now.duration_since(*front) > Duration::from_secs(1) {
                self.timestamps_1s.pop_front();
            } else {
                break;
            }
        }

        while let Some(front) = self.timestamps_2min.front() {
            if now.duration_since(*front) > Duration::from_secs(120) {
                self.timestamps_2min.pop_front();
            } else {
                break;
            }
        }
    }
}

fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_values_become_lowercase_hosts() {
        assert_eq!(base_url("NA1"), "https://na1.api.riotgames.com");
        assert_eq!(base_url("AMERICAS"), "https://americas.api.riotgames.com");
    }

    #[test]
    fn api_key_is_sent_as_riot_token() {
        let headers = build_headers("RGAPI-abc").unwrap();
        assert_eq!(headers.get("X-Riot-Token").unwrap(), "RGAPI-abc");
    }

    #[test]
    fn api_key_with_newline_is_rejected() {
        assert!(matches!(
            build_headers("RGAPI\nabc"),
            Err(ApiError::Header(_))
        ));
    }

    #[test]
    fn limiter_allows_requests_under_quota() {
        let mut limiter = RateLimiter::new(80, 2);
        let now = Instant::now();
        limiter.timestamps_1s.push_back(now);
        limiter.timestamps_2min.push_back(now);

        assert_eq!(limiter.delay(now), None);
    }

    #[test]
    fn limiter_holds_off_when_second_window_is_full() {
        let mut limiter = RateLimiter::new(80, 2);
        let now = Instant::now();
        for _ in 0..2 {
            limiter.timestamps_1s.push_back(now);
            limiter.timestamps_2min.push_back(now);
        }

        let delay = limiter.delay(now).unwrap();
        assert!(delay <= Duration::from_secs(1));
        assert!(delay > Duration::ZERO);
    }

    #[test]
    fn limiter_forgets_requests_outside_the_window() {
        let mut limiter = RateLimiter::new(80, 2);
        let start = Instant::now();
        for _ in 0..2 {
            limiter.timestamps_1s.push_back(start);
            limiter.timestamps_2min.push_back(start);
        }

        let later = start + Duration::from_secs(2);
        assert_eq!(limiter.delay(later), None);
        assert!(limiter.timestamps_1s.is_empty());
        assert_eq!(limiter.timestamps_2min.len(), 2);
    }
}
