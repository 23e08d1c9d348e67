use serde::Deserialize;

use crate::scraper::ScraperConfig;

/// Raw value returned by the in-page extraction script.
#[derive(Debug, Default, Deserialize)]
pub struct Extracted {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: String,
}

/// Builds the in-page readability script and post-processes its output.
pub struct ContentExtractor {
    config: ScraperConfig,
}

impl ContentExtractor {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    /// JavaScript run in the page after load.
    ///
    /// Strips boilerplate elements, scores every block container by the amount
    /// of paragraph text directly inside it, and returns the text of the
    /// best-scoring one. Link-heavy blocks are penalised.
    pub fn extraction_script(&self) -> String {
        let remove_selectors = self
            .config
            .remove_selectors
            .iter()
            .map(|s| format!("'{}'", s.replace('\'', "\\'")))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            r#"
            (() => {{
                for (const selector of [{remove_selectors}]) {{
                    document.querySelectorAll(selector).forEach(el => el.remove());
                }}

                const scores = new Map();
                for (const p of document.querySelectorAll('p, pre, blockquote')) {{
                    const text = p.innerText.trim();
                    if (text.length < 25) continue;
                    const parent = p.parentElement;
                    if (!parent) continue;
                    const score = 1 + text.split(',').length + Math.min(text.length / 100, 3);
                    scores.set(parent, (scores.get(parent) || 0) + score);
                    const grand = parent.parentElement;
                    if (grand) scores.set(grand, (scores.get(grand) || 0) + score / 2);
                }}

                let best = null;
                let bestScore = 0;
                for (const [el, raw] of scores) {{
                    const total = el.innerText.length || 1;
                    let linked = 0;
                    el.querySelectorAll('a').forEach(a => linked += a.innerText.length);
                    const score = raw * (1 - linked / total);
                    if (score > bestScore) {{
                        best = el;
                        bestScore = score;
                    }}
                }}

                const root = best || document.body;
                return {{
                    title: document.title || null,
                    text: root ? root.innerText : ''
                }};
            }})()
            "#
        )
    }

    /// Normalize extracted text, or `None` if too little is left to be worth keeping.
    pub fn finish(&self, extracted: Extracted) -> Option<String> {
        let text = clean_text(&extracted.text);
        (text.chars().count() >= self.config.min_content_length).then_some(text)
    }
}

/// Collapse runs of spaces inside lines and runs of blank lines between paragraphs.
pub fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;
    for line in raw.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        blank_run = 0;
    }
    out
}
