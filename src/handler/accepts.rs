//! Content negotiation over the synthetic `accept` header.
//!
//! # Example
//!
//! ```
//! use nsp_socket::handler::Accepts;
//!
//! let accepts = Accepts::parse(Some("text/html;q=0.5, application/json"));
//! assert_eq!(accepts.type_(&["html", "json"]), Some("json"));
//! assert_eq!(accepts.type_(&["image/png"]), None);
//! ```

use crate::protocol::Headers;

/// One entry of an accept header.
#[derive(Debug, Clone, PartialEq)]
struct MediaRange {
    kind: String,
    subtype: String,
    q: f32,
}

impl MediaRange {
    fn parse(item: &str) -> Option<Self> {
        let mut parts = item.split(';');
        let media = parts.next()?.trim();
        let (kind, subtype) = match media.split_once('/') {
            Some((k, s)) => (k.trim(), s.trim()),
            None if media == "*" => ("*", "*"),
            None => return None,
        };
        if kind.is_empty() || subtype.is_empty() {
            return None;
        }

        let mut q = 1.0;
        for param in parts {
            if let Some((key, value)) = param.split_once('=') {
                if key.trim().eq_ignore_ascii_case("q") {
                    q = value.trim().parse::<f32>().unwrap_or(0.0).clamp(0.0, 1.0);
                }
            }
        }

        Some(Self {
            kind: kind.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            q,
        })
    }

    /// 3 exact, 2 `type/*`, 1 `*/*`, 0 no match.
    fn specificity(&self, kind: &str, subtype: &str) -> u8 {
        if self.kind == "*" && self.subtype == "*" {
            1
        } else if self.kind == kind && self.subtype == "*" {
            2
        } else if self.kind == kind && self.subtype == subtype {
            3
        } else {
            0
        }
    }
}

/// Expand shorthand names (`json`, `html`, ...) to a full media type.
fn expand(offer: &str) -> String {
    if offer.contains('/') {
        return offer.to_ascii_lowercase();
    }
    match offer.to_ascii_lowercase().as_str() {
        "json" => "application/json".into(),
        "html" => "text/html".into(),
        "text" | "txt" => "text/plain".into(),
        "xml" => "application/xml".into(),
        "bin" | "binary" => "application/octet-stream".into(),
        other => format!("application/{other}"),
    }
}

/// Negotiated accept state for one request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Accepts {
    ranges: Vec<MediaRange>,
    present: bool,
}

impl Accepts {
    /// Parse an accept header value; `None` accepts anything.
    pub fn parse(header: Option<&str>) -> Self {
        let Some(header) = header else {
            return Self::default();
        };
        let mut ranges: Vec<MediaRange> = header.split(',').filter_map(MediaRange::parse).collect();
        // Stable: equal q keeps header order.
        ranges.sort_by(|a, b| b.q.total_cmp(&a.q));
        Self {
            ranges,
            present: true,
        }
    }

    /// Read the `accept` header (case-insensitive) from a header map.
    pub fn from_headers(headers: &Headers) -> Self {
        let value = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("accept"))
            .and_then(|(_, v)| v.as_str());
        Self::parse(value)
    }

    /// Accepted media types, most preferred first (q=0 excluded).
    pub fn types(&self) -> Vec<String> {
        self.ranges
            .iter()
            .filter(|r| r.q > 0.0)
            .map(|r| format!("{}/{}", r.kind, r.subtype))
            .collect()
    }

    /// Pick the best of `offers`, returned as given.
    pub fn type_<'a>(&self, offers: &[&'a str]) -> Option<&'a str> {
        if !self.present {
            return offers.first().copied();
        }

        let mut best: Option<(f32, u8, usize, usize)> = None;
        let mut chosen = None;
        for (offer_idx, offer) in offers.iter().enumerate() {
            let full = expand(offer);
            let Some((kind, subtype)) = full.split_once('/') else {
                continue;
            };
            let matched = self
                .ranges
                .iter()
                .enumerate()
                .filter_map(|(i, r)| {
                    let s = r.specificity(kind, subtype);
                    (s > 0).then_some((r.q, s, i))
                })
                .max_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)));

            let Some((q, spec, range_idx)) = matched else {
                continue;
            };
            if q <= 0.0 {
                continue;
            }
            let candidate = (q, spec, range_idx, offer_idx);
            let better = match best {
                None => true,
                Some((bq, bs, bi, _)) => {
                    q > bq || (q == bq && (spec > bs || (spec == bs && range_idx < bi)))
                }
            };
            if better {
                best = Some(candidate);
                chosen = Some(*offer);
            }
        }
        chosen
    }
}
