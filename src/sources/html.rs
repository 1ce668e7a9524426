//! Sources scraped from HTML tables
//!
//! These pages are already tabular, so records are built straight from the
//! table cells instead of going through the flattener.

use crate::export::{SourceContext, Table};
use crate::flatten::FlatRecord;
use crate::schema::KeySchema;
use crate::sources::{Source, LOTS_PROJECT, LOTS_PROJECT_ADDITIONAL};
use anyhow::{anyhow, bail, Result};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());
static HEADER_CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("th, td").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static DIV: Lazy<Selector> = Lazy::new(|| Selector::parse("div").unwrap());
static DETAIL_BLOCK: Lazy<Selector> = Lazy::new(|| Selector::parse("div.detail-container").unwrap());
static DETAIL_CONTENT: Lazy<Selector> = Lazy::new(|| Selector::parse("div.content").unwrap());
static SAMPLE_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a.link").unwrap());

/// All text below an element, trimmed
fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn first_href(element: ElementRef) -> Option<String> {
    element
        .select(&LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}

fn cells(row: ElementRef) -> Vec<ElementRef> {
    row.select(&CELL).collect()
}

const LOLAD_URL: &str = "https://lolad-project.github.io/";

/// Active Directory commands
pub struct LolAd;

/// Parse the LOLAD command table.
///
/// Column names come from the first row; the fourth column holds the link
/// of its first anchor.
pub fn parse_lolad(html: &str) -> Result<(Vec<FlatRecord>, KeySchema)> {
    let document = Html::parse_document(html);
    let mut rows = document.select(&ROW);

    let Some(header) = rows.next() else {
        bail!("LOLAD page has no table rows");
    };
    let keys: Vec<String> = header
        .select(&HEADER_CELL)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .map(|text| text.replace(' ', "_"))
        .collect();
    if keys.len() < 4 {
        bail!("LOLAD header has {} columns, expected 4", keys.len());
    }

    let mut records = Vec::new();
    for row in rows {
        let cols = cells(row);
        if cols.len() != 4 {
            continue;
        }
        let mut record = FlatRecord::new();
        for (key, col) in keys.iter().zip(&cols[..3]) {
            record.insert(key.as_str(), element_text(*col));
        }
        record.insert(keys[3].as_str(), first_href(cols[3]).unwrap_or_default());
        records.push(record);
    }

    Ok((records, keys.into_iter().collect()))
}

impl Source for LolAd {
    fn name(&self) -> &'static str {
        "lolad"
    }

    fn produce(&self, ctx: &SourceContext) -> Result<Vec<Table>> {
        let html = ctx
            .fetch(LOLAD_URL)
            .ok_or_else(|| anyhow!("Failed to fetch LOLAD data"))?;
        let (records, schema) = parse_lolad(&html)?;
        Ok(vec![Table::records("lolad.csv", records, schema)])
    }
}

const LOTWEBHOOKS_URL: &str = "https://lotwebhooks.github.io";
const LOTWEBHOOKS_KEYS: [&str; 4] = ["Webhook Name", "URL", "Type", "Reference"];

/// Webhook services abused for exfiltration and C2
pub struct LotWebhooks;

/// Parse the webhook table: four text columns per row
pub fn parse_lotwebhooks(html: &str) -> (Vec<FlatRecord>, KeySchema) {
    let document = Html::parse_document(html);
    let records = document
        .select(&ROW)
        .skip(1)
        .map(cells)
        .filter(|cols| cols.len() == 4)
        .map(|cols| {
            let mut record = FlatRecord::new();
            for (key, col) in LOTWEBHOOKS_KEYS.iter().zip(cols) {
                record.insert(*key, element_text(col));
            }
            record
        })
        .collect();

    (records, KeySchema::with_keys(LOTWEBHOOKS_KEYS))
}

impl Source for LotWebhooks {
    fn name(&self) -> &'static str {
        "lotwebhooks"
    }

    fn produce(&self, ctx: &SourceContext) -> Result<Vec<Table>> {
        let html = ctx
            .fetch(LOTWEBHOOKS_URL)
            .ok_or_else(|| anyhow!("Failed to fetch LOTWebhooks data"))?;
        let (records, schema) = parse_lotwebhooks(&html);
        Ok(vec![Table::records("lotwebhooks.csv", records, schema)])
    }
}

const LOTS_URL: &str = "https://lots-project.com";
const LOTS_KEYS: [&str; 4] = ["Website", "Tags", "Service Provider", "Info"];
const LOTS_EXTENDED_KEYS: [&str; 8] = [
    "Website",
    "Tags",
    "Service Provider",
    "Info_Phishing",
    "Info_C&C",
    "Info_Exfiltration",
    "Info_Download",
    "Info_Sample",
];

/// One row of the lots-project index table
#[derive(Debug, Clone, PartialEq)]
pub struct LotsEntry {
    pub website: String,
    pub tags: Vec<String>,
    pub provider: String,
    pub link: String,
}

/// Abuse details from a lots-project site page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LotsDetail {
    pub phishing: String,
    pub command_and_control: String,
    pub exfiltration: String,
    pub download: String,
    pub sample: String,
}

/// Parse the lots-project index; rows without exactly three cells are skipped
pub fn parse_lots_index(html: &str) -> Vec<LotsEntry> {
    let document = Html::parse_document(html);
    document
        .select(&ROW)
        .skip(1)
        .filter_map(|row| {
            let cols = cells(row);
            if cols.len() != 3 {
                return None;
            }
            let link = first_href(row)
                .map(|href| format!("{}{}", LOTS_URL, href))
                .unwrap_or_default();
            Some(LotsEntry {
                website: element_text(cols[0]),
                tags: cols[1].select(&DIV).map(element_text).collect(),
                provider: element_text(cols[2]),
                link: link.trim().to_string(),
            })
        })
        .collect()
}

/// Parse a site page's `detail-container` blocks
pub fn parse_lots_detail(html: &str) -> LotsDetail {
    let document = Html::parse_document(html);
    let mut detail = LotsDetail::default();

    for block in document.select(&DETAIL_BLOCK) {
        let text = element_text(block);
        let content = block.select(&DETAIL_CONTENT).next();
        if text.contains("Tags") {
            continue;
        }
        let Some(content) = content else {
            continue;
        };
        if text.contains("Phishing") {
            detail.phishing = element_text(content);
        } else if text.contains("Command and Control") {
            detail.command_and_control = element_text(content);
        } else if text.contains("Exfiltration") {
            detail.exfiltration = element_text(content);
        } else if text.contains("Download") {
            detail.download = element_text(content);
        } else if text.contains("Sample") {
            detail.sample = content
                .select(&SAMPLE_LINK)
                .next()
                .map(element_text)
                .unwrap_or_else(|| String::from("None"));
        }
    }

    detail
}

/// Legitimate sites abused by attackers; the extended variant also visits
/// every site's page
pub struct LotsProject {
    extended: bool,
}

impl LotsProject {
    pub fn basic() -> Self {
        LotsProject { extended: false }
    }

    pub fn extended() -> Self {
        LotsProject { extended: true }
    }

    fn basic_record(entry: LotsEntry) -> FlatRecord {
        let mut record = FlatRecord::new();
        record.insert(LOTS_KEYS[0], entry.website);
        record.insert(LOTS_KEYS[1], entry.tags);
        record.insert(LOTS_KEYS[2], entry.provider);
        record.insert(LOTS_KEYS[3], entry.link);
        record
    }

    fn extended_record(entry: LotsEntry, detail: LotsDetail) -> FlatRecord {
        let mut record = FlatRecord::new();
        record.insert(LOTS_EXTENDED_KEYS[0], entry.website);
        record.insert(LOTS_EXTENDED_KEYS[1], entry.tags);
        record.insert(LOTS_EXTENDED_KEYS[2], entry.provider);
        record.insert(LOTS_EXTENDED_KEYS[3], detail.phishing);
        record.insert(LOTS_EXTENDED_KEYS[4], detail.command_and_control);
        record.insert(LOTS_EXTENDED_KEYS[5], detail.exfiltration);
        record.insert(LOTS_EXTENDED_KEYS[6], detail.download);
        record.insert(LOTS_EXTENDED_KEYS[7], detail.sample);
        record
    }
}

impl Source for LotsProject {
    fn name(&self) -> &'static str {
        if self.extended {
            LOTS_PROJECT_ADDITIONAL
        } else {
            LOTS_PROJECT
        }
    }

    fn produce(&self, ctx: &SourceContext) -> Result<Vec<Table>> {
        let html = ctx
            .fetch(&format!("{}/", LOTS_URL))
            .ok_or_else(|| anyhow!("Failed to fetch Lots-Project data"))?;
        let entries = parse_lots_index(&html);

        if !self.extended {
            let records = entries.into_iter().map(Self::basic_record).collect();
            return Ok(vec![Table::records(
                "lots_project.csv",
                records,
                KeySchema::with_keys(LOTS_KEYS),
            )]);
        }

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            debug!(site = %entry.website, link = %entry.link, "Getting details");
            let Some(page) = ctx.fetch(&entry.link) else {
                warn!("Failed to fetch additional info for {}", entry.website);
                continue;
            };
            let detail = parse_lots_detail(&page);
            records.push(Self::extended_record(entry, detail));
        }

        Ok(vec![Table::records(
            "lots_project_additional.csv",
            records,
            KeySchema::with_keys(LOTS_EXTENDED_KEYS),
        )])
    }
}
