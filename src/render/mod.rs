//! Plain-text rendering of a dashboard page.

use crate::dashboard::{Page, ResultsView, Section, NO_BROKERS};
use crate::models::{CompanyOption, NewsDocument, SentimentTone};
use crate::reconcile::BROKER_HEADERS;
use crate::utils::PLACEHOLDER;
use std::fmt::Write;

const RULE: &str = "─────────────────────────────────────────────────────────────";
const GAUGE_WIDTH: usize = 20;

/// `raw` appends each announcement's stored document under its card.
pub fn page(page: &Page, raw: bool) -> String {
    let mut out = String::new();
    let title = page
        .option
        .as_ref()
        .map(CompanyOption::label)
        .unwrap_or_else(|| page.query.clone());

    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "  {}", title);
    let _ = writeln!(out, "{}", RULE);
    out.push_str(&news(&page.news, page.news_limit, raw));
    out.push('\n');
    out.push_str(&results(&page.results));
    out
}

// ── Announcements ─────────────────────────────────────────────────────────────

pub fn news(section: &Section<Vec<NewsDocument>>, limit: usize, raw: bool) -> String {
    let mut out = format!("Latest announcements (up to {})\n\n", limit);
    match section {
        Section::Ready(docs) => {
            for doc in docs {
                out.push_str(&news_card(doc, raw));
                out.push('\n');
            }
        }
        other => out.push_str(&placeholder(other)),
    }
    out
}

pub fn news_card(doc: &NewsDocument, raw: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "■ {}", doc.title());
    if let Some(filed) = &doc.dt_tm {
        let _ = writeln!(out, "  Filed: {}", filed);
    }

    let chips = chips(doc);
    if !chips.is_empty() {
        let _ = writeln!(out, "  {}", chips.join("  "));
    }

    let field = |v: &Option<String>| v.as_deref().unwrap_or(PLACEHOLDER).to_string();
    let marker = match doc.tone() {
        SentimentTone::Positive => "▲",
        SentimentTone::Negative => "▼",
        SentimentTone::Neutral => "●",
    };
    let _ = writeln!(
        out,
        "  Sentiment: {} {}  Sensitivity: {}  Timeline: {}",
        marker,
        field(&doc.sentiment),
        field(&doc.sensitivity),
        field(&doc.timelineflag)
    );

    let _ = writeln!(
        out,
        "  Impact score: {}/10  [{}] {}%",
        doc.impact_whole(),
        gauge(doc.impact_gauge()),
        doc.impact_gauge()
    );

    for (heading, body) in [
        ("Impact", &doc.impact),
        ("Impactscore Deduction", &doc.impactscore_deduction),
        ("Short Summary", &doc.shortsummary),
        ("Detailed Summary", &doc.summary),
    ] {
        if let Some(text) = body {
            let _ = writeln!(out, "  {}:", heading);
            for line in text.lines() {
                let _ = writeln!(out, "    {}", line);
            }
        }
    }

    let links: Vec<_> = [("Live PDF", &doc.pdf_link_live), ("Historical PDF", &doc.pdf_link)]
        .into_iter()
        .filter_map(|(name, url)| url.as_deref().map(|u| (name, u)))
        .collect();
    if !links.is_empty() {
        let _ = writeln!(out, "  PDF Links:");
        for (name, url) in links {
            let _ = writeln!(out, "    {}: {}", name, url);
        }
    }

    if raw {
        if let Some(body) = doc.raw.as_ref().and_then(|v| serde_json::to_string_pretty(v).ok()) {
            let _ = writeln!(out, "  Raw JSON:");
            for line in body.lines() {
                let _ = writeln!(out, "    {}", line);
            }
        }
    }
    out
}

fn chips(doc: &NewsDocument) -> Vec<String> {
    [
        ("NSE", &doc.symbolmap.nse),
        ("BSE", &doc.symbolmap.bse),
        ("ISIN", &doc.company),
        ("Category", &doc.category),
        ("Subcategory", &doc.subcategory),
    ]
    .into_iter()
    .filter_map(|(k, v)| v.as_deref().map(|v| format!("[{}: {}]", k, v)))
    .collect()
}

fn gauge(percent: u8) -> String {
    let filled = (usize::from(percent) * GAUGE_WIDTH + 50) / 100;
    format!("{}{}", "#".repeat(filled), ".".repeat(GAUGE_WIDTH - filled))
}

// ── Results ───────────────────────────────────────────────────────────────────

pub fn results(section: &Section<ResultsView>) -> String {
    let mut out = String::from("Predicted vs Actual\n\n");
    let view = match section {
        Section::Ready(view) => view,
        other => {
            out.push_str(&placeholder(other));
            return out;
        }
    };

    if let Some(name) = view.preview.company_display.as_deref().or(view.preview.company_id.as_deref()) {
        let _ = writeln!(out, "{}", name);
    }
    let _ = writeln!(out, "{}", view.caption);
    if let Some(note) = &view.actuals_note {
        let _ = writeln!(out, "⚠ {}", note);
    }

    let rows: Vec<Vec<String>> = view
        .rows
        .iter()
        .map(|r| vec![r.metric.clone(), r.predicted.clone(), r.actual.clone(), r.surprise.clone()])
        .collect();
    out.push_str(&table(&["Metric", "Predicted", "Actual", "Surprise %"], &rows));

    out.push_str("\nBroker estimates\n\n");
    if view.brokers.is_empty() {
        let _ = writeln!(out, "ℹ {}", NO_BROKERS);
    } else {
        let rows: Vec<Vec<String>> = view
            .brokers
            .iter()
            .map(|b| {
                let mut cells = b.cells().to_vec();
                if b.has_link() {
                    cells[8] = format!("↗ {}", cells[8]);
                }
                cells
            })
            .collect();
        out.push_str(&table(&BROKER_HEADERS, &rows));
    }
    out
}

// ── Options ───────────────────────────────────────────────────────────────────

pub fn options(options: &[CompanyOption]) -> String {
    if options.is_empty() {
        return "No companies — run `results-viewer load announcements <path>` first.\n".to_string();
    }
    let mut out = format!("{} companies:\n", options.len());
    for o in options {
        let _ = writeln!(out, "  {}", o.label());
    }
    out
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn placeholder<T>(section: &Section<T>) -> String {
    match section {
        Section::Ready(_) => String::new(),
        Section::Empty(msg) => format!("ℹ {}\n", msg),
        Section::Degraded(msg) => format!("⚠ {}\n", msg),
    }
}

/// Left-aligned columns padded to the widest cell, by character count.
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{}{}", c, " ".repeat(w - c.chars().count())))
            .collect();
        format!("| {} |\n", padded.join(" | "))
    };

    let mut out = line(headers.to_vec());
    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "|-{}-|", sep.join("-|-"));
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    out
}
