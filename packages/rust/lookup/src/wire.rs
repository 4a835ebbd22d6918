//! Upstream JSON shapes and their conversion into domain types.
//!
//! Only the fields we read are modelled; everything else is ignored.

use serde::Deserialize;

use lodebot_shared::{ActiveJob, Character, CharacterId, GrandCompany, Job, SearchCandidate};

/// One page of `/character/search`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SearchPage {
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Pagination {
    #[serde(default)]
    pub page_next: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SearchHit {
    #[serde(rename = "ID")]
    pub id: u64,
    pub name: String,
}

impl From<SearchHit> for SearchCandidate {
    fn from(hit: SearchHit) -> Self {
        Self {
            id: CharacterId::from(hit.id),
            display_name: hit.name,
        }
    }
}

/// Envelope of `/character/{id}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CharacterEnvelope {
    pub character: CharacterDetail,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CharacterDetail {
    #[serde(rename = "ID")]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub title: Option<Named>,
    #[serde(default)]
    pub nameday: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub grand_company: Option<GrandCompanyDetail>,
    pub active_class_job: ClassJob,
    #[serde(default)]
    pub class_jobs: Vec<ClassJob>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Named {
    #[serde(rename = "ID", default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Extended grand company block. Affiliation is read from `Company` only.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct GrandCompanyDetail {
    #[serde(default)]
    pub company: Option<Named>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ClassJob {
    #[serde(rename = "ClassID", default)]
    pub class_id: u32,
    #[serde(rename = "JobID", default)]
    pub job_id: u32,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub unlocked_state: Option<Named>,
}

impl ClassJob {
    /// The job a class line evolves into; lines without a job report it as 0.
    fn classification_id(&self) -> u32 {
        if self.job_id != 0 {
            self.job_id
        } else {
            self.class_id
        }
    }

    fn display_name(&self) -> String {
        self.unlocked_state
            .as_ref()
            .and_then(|state| state.name.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or(self.name.as_str())
            .to_string()
    }
}

impl From<CharacterDetail> for Character {
    fn from(detail: CharacterDetail) -> Self {
        let grand_company = detail
            .grand_company
            .and_then(|gc| gc.company)
            .and_then(|company| match company.id {
                Some(id) if id != 0 => Some(GrandCompany {
                    id,
                    name: company.name.unwrap_or_default(),
                }),
                _ => None,
            });

        let active_job = ActiveJob {
            name: detail.active_class_job.display_name(),
            level: detail.active_class_job.level,
        };

        let jobs = detail
            .class_jobs
            .iter()
            .map(|cj| Job {
                class_id: cj.classification_id(),
                level: cj.level,
                name: cj.display_name(),
            })
            .collect();

        Self {
            id: CharacterId::from(detail.id),
            name: detail.name,
            title: detail
                .title
                .and_then(|t| t.name)
                .filter(|name| !name.is_empty()),
            nameday: detail.nameday,
            avatar_url: detail.avatar,
            grand_company,
            active_job,
            jobs,
        }
    }
}
