//! Price extraction from converter pages.
//!
//! A page is probed with a fixed cascade of heuristics; the first one that
//! yields a price wins and the pair's fallback price covers everything else,
//! so [`extract`] always returns a non-empty string.

use bigdecimal::BigDecimal;
use regex::Regex;
use scraper::{Html, Selector};
use std::str::FromStr;
use std::sync::LazyLock;

type Strategy = fn(&Html, &str) -> Option<String>;

const STRATEGIES: [(&str, Strategy); 3] = [
    ("label scan", label_scan),
    ("conversion input", conversion_input),
    ("numeric sweep", numeric_sweep),
];

pub const DEFAULT_FALLBACK_PRICE: &str = "0.00";

const FALLBACK_PRICES: [(&str, &str); 3] = [
    ("BTC/USDT", "94654.76"),
    ("USDT/ETH", "0.000276"),
    ("USDT/PHP", "57.25"),
];

const NON_TEXT_ELEMENTS: [&str; 4] = ["script", "style", "template", "noscript"];

static PRICE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[0-9,]+\.[0-9]+").ok());

pub fn extract(html: &str, pair: &str) -> String {
    let document = Html::parse_document(html);

    for (name, strategy) in STRATEGIES {
        if let Some(price) = strategy(&document, pair) {
            log::debug!("{pair}: price {price} found by {name}");
            return price;
        }
    }

    log::warn!("{pair}: no price found on page, using fallback");
    fallback_price(pair).to_string()
}

pub fn fallback_price(pair: &str) -> &'static str {
    FALLBACK_PRICES
        .iter()
        .find(|(known, _)| *known == pair)
        .map(|(_, price)| *price)
        .unwrap_or(DEFAULT_FALLBACK_PRICE)
}

/// Inline labels naming the compacted pair, such as `BTCUSDT / spot: 94,654.76`.
fn label_scan(document: &Html, pair: &str) -> Option<String> {
    let needle = pair.replace('/', "");
    if needle.is_empty() {
        return None;
    }

    document
        .root_element()
        .text()
        .filter(|text| text.contains('/'))
        .filter(|text| {
            text.chars()
                .filter(|c| *c != ' ')
                .collect::<String>()
                .contains(&needle)
        })
        .filter_map(|text| text.split(':').nth(1))
        .map(str::trim)
        .find(|price| !price.is_empty())
        .map(str::to_string)
}

/// The converter mirrors its live rate into a bound input field.
fn conversion_input(document: &Html, _pair: &str) -> Option<String> {
    let selector = Selector::parse(r#"[class*="ConversionInput"][value]"#).ok()?;

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("value"))
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// First decimal number in document order inside the plausible rate band.
fn numeric_sweep(document: &Html, _pair: &str) -> Option<String> {
    let pattern = PRICE_PATTERN.as_ref()?;
    let content = visible_text(document).collect::<String>();

    pattern
        .find_iter(&content)
        .map(|m| m.as_str())
        .find(|candidate| is_plausible_rate(candidate))
        .map(str::to_string)
}

/// Text nodes outside of script, style and template blocks.
fn visible_text(document: &Html) -> impl Iterator<Item = &str> {
    document.root_element().descendants().filter_map(|node| {
        let text = node.value().as_text()?;
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| NON_TEXT_ELEMENTS.contains(&element.name()))
        });

        (!hidden).then_some(&**text)
    })
}

fn is_plausible_rate(candidate: &str) -> bool {
    let mut digits = candidate.replace(',', "");
    if digits.starts_with('.') {
        digits.insert(0, '0');
    }

    let Ok(value) = BigDecimal::from_str(&digits) else {
        return false;
    };
    let min = BigDecimal::new(1.into(), 6);
    let max = BigDecimal::from(1_000_000);

    value >= min && value <= max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_scan() {
        let html = r#"<html><body>
            <p>Updated 3.5 minutes ago</p>
            <span>BTCUSDT / Tether: 94,720.10</span>
        </body></html>"#;

        assert_eq!(extract(html, "BTC/USDT"), "94,720.10");
    }

    #[test]
    fn test_slashed_label_is_left_to_sweep() {
        let html = r#"<p>rate 12.34</p><span>BTC/USDT: 94,720.10</span>"#;
        assert_eq!(extract(html, "BTC/USDT"), "12.34");

        assert_eq!(extract("<span>BTC/USDT: 94,720.10</span>", "BTC/USDT"), "94,720.10");
    }

    #[test]
    fn test_label_scan_ignores_other_pairs() {
        let html = r#"<div>
            <span>USDT/ETH: 0.000281</span>
            <span>Volume 12.50</span>
        </div>"#;

        assert_eq!(extract(html, "USDT/PHP"), "0.000281");
        assert_eq!(extract(html, "USDT/ETH"), "0.000281");
    }

    #[test]
    fn test_label_without_price_falls_through() {
        let html = r#"<div><span>BTCUSDT / spot:   </span><span>rate 57.30</span></div>"#;

        assert_eq!(extract(html, "BTC/USDT"), "57.30");
    }

    #[test]
    fn test_conversion_input() {
        let html = r#"<html><body>
            <p>Updated 3.5 minutes ago</p>
            <input class="cds-ConversionInput-abc123" value="0.000281" />
        </body></html>"#;

        assert_eq!(extract(html, "USDT/ETH"), "0.000281");
    }

    #[test]
    fn test_conversion_input_without_value() {
        let html = r#"<input class="ConversionInput" value="" /><p>57.30</p>"#;

        assert_eq!(extract(html, "USDT/PHP"), "57.30");
    }

    #[test]
    fn test_numeric_sweep_skips_implausible_values() {
        let html = r#"<html><body>
            <p>rendered at 2024 with 57.30 rate</p>
        </body></html>"#;
        assert_eq!(extract(html, "USDT/PHP"), "57.30");

        let html = r#"<p>cap 2,500,000.00</p><p>tiny 0.0000001</p><p>rate 1,234.5</p>"#;
        assert_eq!(extract(html, "USDT/PHP"), "1,234.5");
    }

    #[test]
    fn test_numeric_sweep_skips_scripts_and_styles() {
        let html = r#"<html>
            <head><style>.a{width:1.5em}</style></head>
            <body>
                <script>var v = 3.14;</script>
                <noscript>enable 2.0 scripts</noscript>
                <p>rate 57.30</p>
            </body>
        </html>"#;

        assert_eq!(extract(html, "USDT/PHP"), "57.30");
    }

    #[test]
    fn test_band_edges() {
        assert!(is_plausible_rate("0.000001"));
        assert!(is_plausible_rate("1,000,000.00"));
        assert!(is_plausible_rate(",.5"));
        assert!(!is_plausible_rate("0.0000009"));
        assert!(!is_plausible_rate("1,000,000.01"));
    }

    #[test]
    fn test_empty_html_uses_fallback() {
        assert_eq!(extract("", "BTC/USDT"), "94654.76");
        assert_eq!(extract("", "USDT/ETH"), "0.000276");
        assert_eq!(extract("", "USDT/PHP"), "57.25");
        assert_eq!(extract("", "DOGE/USDT"), DEFAULT_FALLBACK_PRICE);
    }

    #[test]
    fn test_malformed_html_never_empty() {
        let pages = [
            "<<<>>>",
            "<div class=\"ConversionInput\"",
            "<p>year 2024, width 1080</p>",
            "\u{0}\u{1}garbage/::",
            "<script>var x = '/:';</script>",
        ];

        for page in pages {
            for pair in ["BTC/USDT", "USDT/ETH", "USDT/PHP", "", "/"] {
                assert!(!extract(page, pair).is_empty(), "{page:?} {pair:?}");
            }
        }
    }
}
