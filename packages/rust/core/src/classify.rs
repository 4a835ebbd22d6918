//! Role classification of a character's progression entries.
//!
//! Every class id maps to exactly one [`RoleBucket`] through an immutable
//! [`ClassTable`] built once at startup. An id missing from the table aborts
//! the whole classification: a stale table must be fixed in configuration,
//! never papered over by dropping the entry.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{error, instrument};

use lodebot_shared::RoleBucket::{
    Crafter, Gatherer, Healer, MeleeDps, RangedMagicalDps, RangedPhysicalDps, Tank,
};
use lodebot_shared::{ClassOverride, Job, LodebotError, Result, RoleBucket};

// ---------------------------------------------------------------------------
// Built-in table
// ---------------------------------------------------------------------------

/// `(class id, role, abbreviation)` for every class line the bot ships with.
const BUILTIN_CLASSES: &[(u32, RoleBucket, &str)] = &[
    // Base classes
    (1, Tank, "GLA"),
    (2, MeleeDps, "PGL"),
    (3, Tank, "MRD"),
    (4, MeleeDps, "LNC"),
    (5, RangedPhysicalDps, "ARC"),
    (6, Healer, "CNJ"),
    (7, RangedMagicalDps, "THM"),
    (26, RangedMagicalDps, "ACN"),
    (29, MeleeDps, "ROG"),
    // Disciples of the Hand
    (8, Crafter, "CRP"),
    (9, Crafter, "BSM"),
    (10, Crafter, "ARM"),
    (11, Crafter, "GSM"),
    (12, Crafter, "LTW"),
    (13, Crafter, "WVR"),
    (14, Crafter, "ALC"),
    (15, Crafter, "CUL"),
    // Disciples of the Land
    (16, Gatherer, "MIN"),
    (17, Gatherer, "BTN"),
    (18, Gatherer, "FSH"),
    // Jobs
    (19, Tank, "PLD"),
    (20, MeleeDps, "MNK"),
    (21, Tank, "WAR"),
    (22, MeleeDps, "DRG"),
    (23, RangedPhysicalDps, "BRD"),
    (24, Healer, "WHM"),
    (25, RangedMagicalDps, "BLM"),
    (27, RangedMagicalDps, "SMN"),
    (28, Healer, "SCH"),
    (30, MeleeDps, "NIN"),
    (31, RangedPhysicalDps, "MCH"),
    (32, Tank, "DRK"),
    (33, Healer, "AST"),
    (34, MeleeDps, "SAM"),
    (35, RangedMagicalDps, "RDM"),
    (36, RangedMagicalDps, "BLU"),
    (37, Tank, "GNB"),
    (38, RangedPhysicalDps, "DNC"),
    (39, MeleeDps, "RPR"),
    (40, Healer, "SGE"),
    (41, MeleeDps, "VPR"),
    (42, RangedMagicalDps, "PCT"),
];

/// Class ids the upstream service is known to report.
pub const KNOWN_UPSTREAM_CLASS_IDS: &[u32] = &[
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25,
    26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42,
];

/// Matches names like `"blue mage (limited job)"`.
static LIMITED_JOB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(.+?)\s*\(limited job\)\s*$").expect("limited job regex")
});

// ---------------------------------------------------------------------------
// ClassTable
// ---------------------------------------------------------------------------

/// One row of the class table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEntry {
    pub role: RoleBucket,
    pub abbreviation: String,
    pub icon: String,
}

/// Immutable class id → role/icon mapping.
#[derive(Debug, Clone)]
pub struct ClassTable {
    entries: HashMap<u32, ClassEntry>,
}

impl ClassTable {
    /// The table shipped with the bot. Icons default to the abbreviation.
    pub fn builtin() -> Self {
        let entries = BUILTIN_CLASSES
            .iter()
            .map(|&(id, role, abbr)| {
                (
                    id,
                    ClassEntry {
                        role,
                        abbreviation: abbr.to_string(),
                        icon: abbr.to_string(),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Apply operator overrides from `[[classes]]`, replacing or adding rows.
    pub fn with_overrides(mut self, overrides: &[ClassOverride]) -> Result<Self> {
        for o in overrides {
            let role = o.role.parse::<RoleBucket>().map_err(|_| {
                LodebotError::config(format!("class {}: unknown role '{}'", o.id, o.role))
            })?;
            let icon = o.icon.clone().unwrap_or_else(|| o.abbreviation.clone());
            self.entries.insert(
                o.id,
                ClassEntry {
                    role,
                    abbreviation: o.abbreviation.clone(),
                    icon,
                },
            );
        }
        Ok(self)
    }

    /// Look up a class id.
    pub fn get(&self, class_id: u32) -> Option<&ClassEntry> {
        self.entries.get(&class_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids from `known` that have no row, in ascending order.
    pub fn missing_ids(&self, known: &[u32]) -> Vec<u32> {
        let mut missing: Vec<u32> = known
            .iter()
            .copied()
            .filter(|id| !self.entries.contains_key(id))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        missing
    }

    /// Startup check: fail if any known upstream id is unmapped.
    pub fn validate_complete(&self, known: &[u32]) -> Result<()> {
        let missing = self.missing_ids(known);
        if missing.is_empty() {
            return Ok(());
        }
        Err(LodebotError::config(format!(
            "class table is missing upstream class ids {missing:?}; add them under [[classes]]"
        )))
    }

    /// Assign every job to its bucket, preserving input order within a bucket.
    ///
    /// Fails with [`LodebotError::DataIntegrity`] on the first unmapped id;
    /// no partial result is returned.
    #[instrument(skip_all, fields(jobs = jobs.len()))]
    pub fn classify(&self, jobs: &[Job]) -> Result<RoleBuckets> {
        let mut buckets = RoleBuckets::default();

        for job in jobs {
            let name = canonical_job_name(&job.name);
            let Some(entry) = self.get(job.class_id) else {
                error!(
                    class_id = job.class_id,
                    name = %name,
                    "class id missing from class table; configuration needs updating"
                );
                return Err(LodebotError::DataIntegrity {
                    class_id: job.class_id,
                    name,
                });
            };

            buckets.buckets[entry.role.index()].push(ClassifiedJob {
                class_id: job.class_id,
                name,
                abbreviation: entry.abbreviation.clone(),
                icon: entry.icon.clone(),
                level: job.level,
            });
        }

        Ok(buckets)
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Relabel `"<name> (limited job)"` to its title-cased short form. Other
/// names pass through unchanged.
pub fn canonical_job_name(name: &str) -> String {
    match LIMITED_JOB_RE.captures(name) {
        Some(caps) => title_case(&caps[1]),
        None => name.to_string(),
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// RoleBuckets
// ---------------------------------------------------------------------------

/// A job after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedJob {
    pub class_id: u32,
    pub name: String,
    pub abbreviation: String,
    pub icon: String,
    pub level: u32,
}

/// Classified jobs, one ordered list per bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleBuckets {
    buckets: [Vec<ClassifiedJob>; 7],
}

impl RoleBuckets {
    /// Jobs in `bucket`, in original order.
    pub fn get(&self, bucket: RoleBucket) -> &[ClassifiedJob] {
        &self.buckets[bucket.index()]
    }

    /// Buckets in display order, including empty ones.
    pub fn iter(&self) -> impl Iterator<Item = (RoleBucket, &[ClassifiedJob])> {
        RoleBucket::ALL
            .into_iter()
            .map(move |bucket| (bucket, self.get(bucket)))
    }

    /// Total number of classified jobs.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
