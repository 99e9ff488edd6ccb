//! # Colo Detection
//!
//! Works out which CDN point of presence served a response from provider-specific
//! headers. The providers are tried in a fixed priority order and the first rule
//! whose headers are present decides, even when its header carries no usable code.
//! Fastly is the exception: an `x-served-by` without any code falls through.
//!
//! | Provider   | Header         | Example                         | Code  |
//! |------------|----------------|---------------------------------|-------|
//! | Cloudflare | `cf-ray`       | `7bd32409eda7b020-SJC`          | `SJC` |
//! | CDN77      | `x-77-pop`     | `frankfurtDE`                   | `DE`  |
//! | Bunny      | `server`       | `BunnyCDN-TW1-1121`             | `TW`  |
//! | CloudFront | `x-amz-cf-pop` | `SIN52-P1`                      | `SIN` |
//! | Fastly     | `x-served-by`  | `cache-fra-etou8220141-FRA, cache-hhr-khhr2060043-HHR` | `HHR` |
//! | Gcore      | `x-id-fe`      | `fr5-hw-edge-gc17`              | `FR`  |

use reqwest::header::{HeaderMap, SERVER};

struct ColoRule {
    provider: &'static str,
    applies: fn(&HeaderMap) -> bool,
    extract: fn(&HeaderMap) -> Option<String>,
}

const RULES: &[ColoRule] = &[
    ColoRule {
        provider: "cloudflare",
        applies: |h| server(h) == Some("cloudflare") && header(h, "cf-ray").is_some(),
        extract: |h| first_upper_run(header(h, "cf-ray")?, 3),
    },
    ColoRule {
        provider: "cdn77",
        applies: |h| server(h) == Some("CDN77-Turbo") && header(h, "x-77-pop").is_some(),
        extract: |h| first_upper_run(header(h, "x-77-pop")?, 2),
    },
    ColoRule {
        provider: "bunny",
        applies: |h| server(h).is_some_and(|s| s.contains(BUNNY_PREFIX)),
        extract: |h| {
            let server = server(h)?;
            first_upper_run(server.strip_prefix(BUNNY_PREFIX).unwrap_or(server), 2)
        },
    },
    ColoRule {
        provider: "cloudfront",
        applies: |h| header(h, "x-amz-cf-pop").is_some(),
        extract: |h| first_upper_run(header(h, "x-amz-cf-pop")?, 3),
    },
    ColoRule {
        provider: "fastly",
        applies: |h| header(h, "x-served-by").is_some_and(|v| !upper_runs(v, 3).is_empty()),
        // Multi-hop responses list every cache; the last one is the edge that answered.
        extract: |h| upper_runs(header(h, "x-served-by")?, 3).pop().map(str::to_string),
    },
    ColoRule {
        provider: "gcore",
        applies: |h| header(h, "x-id-fe").is_some(),
        extract: |h| {
            let id = header(h, "x-id-fe")?.as_bytes();
            (id.len() >= 2 && id[..2].iter().all(u8::is_ascii_lowercase))
                .then(|| String::from_utf8_lossy(&id[..2]).to_ascii_uppercase())
        },
    },
];

const BUNNY_PREFIX: &str = "BunnyCDN-";

/// Returns the colo code advertised by `headers`, if any provider rule matches.
pub fn detect_colo(headers: &HeaderMap) -> Option<String> {
    let rule = RULES.iter().find(|rule| (rule.applies)(headers))?;
    let colo = (rule.extract)(headers)?;
    tracing::trace!("colo {colo} from {} headers", rule.provider);
    Some(colo)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

fn server(headers: &HeaderMap) -> Option<&str> {
    header(headers, SERVER.as_str())
}

/// Non-overlapping runs of exactly `len` uppercase ASCII letters, left to right.
fn upper_runs(s: &str, len: usize) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut runs = Vec::new();
    let mut i = 0;
    while i + len <= bytes.len() {
        if bytes[i..i + len].iter().all(u8::is_ascii_uppercase) {
            runs.push(&s[i..i + len]);
            i += len;
        } else {
            i += 1;
        }
    }
    runs
}

fn first_upper_run(s: &str, len: usize) -> Option<String> {
    upper_runs(s, len).first().map(|run| run.to_string())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
