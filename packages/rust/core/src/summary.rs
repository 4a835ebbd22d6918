//! Presentation record for a resolved character.
//!
//! Pure data in, data out: the platform renderer turns a [`Summary`] into
//! whatever visual format the chat service uses.

use serde::Serialize;

use lodebot_shared::GrandCompany;

use crate::classify::ClassifiedJob;
use crate::pipeline::Resolved;

/// Grand company id → embed color.
const GRAND_COMPANY_COLORS: &[(u32, u32)] = &[
    (1, 0xB03A2E), // Maelstrom
    (2, 0xD4A017), // Order of the Twin Adder
    (3, 0x2B2B2B), // Immortal Flames
];

/// Renderer-ready character summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    /// `None` leaves the renderer's default color.
    pub color: Option<u32>,
    /// One field per non-empty role bucket, in display order.
    pub fields: Vec<SummaryField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryField {
    pub name: String,
    pub value: String,
}

/// Color for an affiliation, if it has one and the id is known.
pub fn grand_company_color(gc: Option<&GrandCompany>) -> Option<u32> {
    let id = gc?.id;
    GRAND_COMPANY_COLORS
        .iter()
        .find(|(gc_id, _)| *gc_id == id)
        .map(|&(_, color)| color)
}

/// Build the summary for a resolved character.
pub fn format_summary(resolved: &Resolved) -> Summary {
    let character = &resolved.character;

    let title = match &character.title {
        Some(t) => format!("{} «{t}»", character.name),
        None => character.name.clone(),
    };

    let mut description = format!(
        "Lv.{} {}\nNameday: {}",
        character.active_job.level, character.active_job.name, character.nameday
    );
    if let Some(gc) = &character.grand_company {
        description.push_str(&format!("\nGrand Company: {}", gc.name));
    }

    let fields = resolved
        .roles
        .iter()
        .filter(|(_, jobs)| !jobs.is_empty())
        .map(|(bucket, jobs)| SummaryField {
            name: bucket.label().to_string(),
            value: jobs.iter().map(job_line).collect::<Vec<_>>().join("\n"),
        })
        .collect();

    Summary {
        title,
        description,
        thumbnail_url: character.avatar_url.clone(),
        color: grand_company_color(character.grand_company.as_ref()),
        fields,
    }
}

/// `"<icon> Lv.<level>"`, or `"<icon> -"` for an unleveled entry.
fn job_line(job: &ClassifiedJob) -> String {
    if job.level == 0 {
        format!("{} -", job.icon)
    } else {
        format!("{} Lv.{}", job.icon, job.level)
    }
}

impl Summary {
    /// Render as plain text for terminal transports.
    pub fn to_plain_text(&self) -> String {
        let mut out = format!("{}\n{}\n", self.title, self.description);
        for field in &self.fields {
            out.push_str(&format!("\n[{}]\n{}\n", field.name, field.value));
        }
        out
    }
}
