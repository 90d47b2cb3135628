//! HTML scraper provider (spec §4.6, §8 property 8). Walks result
//! pages up to a cap, detects Cloudflare challenges and no-match pages,
//! and parses result containers with four fallback parser modes.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;

use crate::domain::{CaseCandidate, Classification, Court, RetrievalMeta};
use crate::error::{Error, Result};
use crate::providers::{BlockedKind, ProviderDebug, RetrievalProvider, SearchInput, SearchOutput, SharedCooldownMap};

struct DetectionPatterns {
    no_match: Regex,
    challenge: Regex,
}

fn patterns() -> &'static DetectionPatterns {
    static PATTERNS: OnceLock<DetectionPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| DetectionPatterns {
        no_match: Regex::new(r"(?i)no matching results").expect("compiles"),
        challenge: Regex::new(r"(?i)just a moment|cloudflare|cf-chl|attention required").expect("compiles"),
    })
}

/// True when the page body indicates no results (spec §8 property 8).
pub fn detects_no_match(body: &str) -> bool {
    patterns().no_match.is_match(body)
}

/// True when the page body indicates an anti-bot challenge (spec §8
/// property 8).
pub fn detects_challenge(body: &str) -> bool {
    patterns().challenge.is_match(body)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserMode {
    ResultListItems,
    ResultCards,
    TableRows,
    AnchorScan,
}

const PARSER_MODES: [ParserMode; 4] = [
    ParserMode::ResultListItems,
    ParserMode::ResultCards,
    ParserMode::TableRows,
    ParserMode::AnchorScan,
];

fn parser_mode_name(mode: ParserMode) -> &'static str {
    match mode {
        ParserMode::ResultListItems => "result_list_items",
        ParserMode::ResultCards => "result_cards",
        ParserMode::TableRows => "table_rows",
        ParserMode::AnchorScan => "anchor_scan",
    }
}

fn container_regex(mode: ParserMode) -> Regex {
    let pattern = match mode {
        ParserMode::ResultListItems => r#"(?s)<li[^>]*class="[^"]*result[^"]*"[^>]*>(.*?)</li>"#,
        ParserMode::ResultCards => r#"(?s)<div[^>]*class="[^"]*(?:card|doc)[^"]*"[^>]*>(.*?)</div>"#,
        ParserMode::TableRows => r#"(?s)<tr[^>]*>(.*?)</tr>"#,
        ParserMode::AnchorScan => r#"(?s)<a[^>]+href="([^"]+)"[^>]*>([^<]+)</a>"#,
    };
    Regex::new(pattern).expect("parser pattern compiles")
}

fn href_regex() -> &'static Regex {
    static HREF: OnceLock<Regex> = OnceLock::new();
    HREF.get_or_init(|| Regex::new(r#"href="([^"]+)""#).expect("compiles"))
}

fn text_only(fragment: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("compiles"));
    tag.replace_all(fragment, " ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Try each parser mode in order until one yields results, recording
/// which mode succeeded (spec §4.6 "four parser-mode fallbacks").
fn parse_with_fallbacks(body: &str) -> (ParserMode, Vec<(String, String)>) {
    for mode in PARSER_MODES {
        let re = container_regex(mode);
        let items: Vec<(String, String)> = if mode == ParserMode::AnchorScan {
            re.captures_iter(body)
                .map(|c| (c[1].to_string(), c[2].trim().to_string()))
                .collect()
        } else {
            re.captures_iter(body)
                .filter_map(|c| {
                    let fragment = &c[1];
                    let href = href_regex().captures(fragment)?[1].to_string();
                    Some((href, text_only(fragment)))
                })
                .collect()
        };
        if !items.is_empty() {
            return (mode, items);
        }
    }
    (ParserMode::AnchorScan, vec![])
}

pub struct HtmlProvider {
    http: reqwest::Client,
    base_url: String,
    cooldowns: SharedCooldownMap,
    max_pages: u32,
    page_budget: Duration,
    fetch_timeout: Duration,
}

impl HtmlProvider {
    pub fn new(
        base_url: impl Into<String>,
        cooldowns: SharedCooldownMap,
        max_pages: u32,
        page_budget: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            cooldowns,
            max_pages,
            page_budget,
            fetch_timeout,
        }
    }

    fn looks_like_statute_or_weak_title(title: &str) -> bool {
        let lower = title.to_lowercase();
        lower.len() < 8 || lower.contains(" act, ") || lower.contains("the constitution")
    }
}

#[async_trait]
impl RetrievalProvider for HtmlProvider {
    fn source_tag(&self) -> &'static str {
        "html_scraper"
    }

    async fn search(&self, input: SearchInput<'_>) -> Result<SearchOutput> {
        let scope = self.source_tag();
        if self.cooldowns.is_cooling_down(scope).await {
            return Err(Error::rate_limited(scope, None));
        }

        let mut debug = ProviderDebug {
            compiled_query: input.variant.phrase.clone(),
            source_tag: scope.to_string(),
            fetch_timeout_used: self.fetch_timeout,
            ..Default::default()
        };

        let started = Instant::now();
        let mut cases = Vec::new();
        let mut seen_urls = std::collections::HashSet::new();

        for page in 0..self.max_pages {
            if started.elapsed() > self.page_budget {
                break;
            }
            let url = format!("{}/search?q={}&page={}", self.base_url, input.variant.phrase, page);
            let resp = match tokio::time::timeout(self.fetch_timeout, self.http.get(&url).send()).await {
                Err(_) => {
                    debug.timed_out = true;
                    break;
                }
                Ok(r) => r.map_err(|e| Error::network(e.to_string()))?,
            };

            let status = resp.status();
            debug.http_status = Some(status.as_u16());
            if status.as_u16() == 429 {
                self.cooldowns.set_cooldown(scope, Duration::from_secs(60)).await;
                debug.rate_limited = true;
                debug.blocked_kind = Some(BlockedKind::RateLimit);
                return Err(Error::rate_limited(scope, None));
            }

            let body = resp.text().await.map_err(|e| Error::network(e.to_string()))?;

            if detects_challenge(&body) {
                self.cooldowns.set_cooldown(scope, Duration::from_secs(300)).await;
                debug.cloudflare = true;
                debug.blocked_kind = Some(BlockedKind::CloudflareChallenge);
                return Err(Error::challenged(scope));
            }
            if detects_no_match(&body) {
                debug.no_match = true;
                break;
            }

            let (mode, items) = parse_with_fallbacks(&body);
            debug.parser_mode = Some(parser_mode_name(mode));
            debug.pages_scanned += 1;
            debug.raw_count += items.len() as u32;

            if items.is_empty() {
                break;
            }

            for (url, title) in items {
                if Self::looks_like_statute_or_weak_title(&title) || !seen_urls.insert(url.clone()) {
                    continue;
                }
                cases.push(CaseCandidate {
                    source: scope.to_string(),
                    title,
                    url,
                    snippet: String::new(),
                    court: Court::Unknown,
                    court_text: None,
                    cites_count: None,
                    cited_by_count: None,
                    author: None,
                    bench: None,
                    full_document_url: None,
                    detail_text: None,
                    detail_artifact: None,
                    evidence_quality: None,
                    detail_hydration: None,
                    classification: Some(Classification::Case),
                    retrieval: RetrievalMeta {
                        source_tags: vec![scope.to_string()],
                        ..Default::default()
                    },
                });
                if cases.len() >= input.max_results {
                    break;
                }
            }
            if cases.len() >= input.max_results {
                break;
            }
        }

        debug.parsed_count = cases.len() as u32;
        Ok(SearchOutput { cases, debug })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_no_match_case_insensitively() {
        assert!(detects_no_match("We found No Matching Results for your query"));
        assert!(!detects_no_match("12 results found"));
    }

    #[test]
    fn detects_cloudflare_challenge_markers() {
        assert!(detects_challenge("<title>Just a moment...</title>"));
        assert!(detects_challenge("ray id cf-chl-123"));
        assert!(!detects_challenge("<div>ordinary result page</div>"));
    }

    #[test]
    fn parses_anchor_fallback_when_containers_absent() {
        let body = r#"<a href="/doc/1">State vs Accused</a><a href="/doc/2">Another Case</a>"#;
        let (mode, items) = parse_with_fallbacks(body);
        assert_eq!(mode, ParserMode::AnchorScan);
        assert_eq!(items.len(), 2);
    }
}
