//! Local reference library: curated clinical summaries that need no network.
//!
//! Pinned entries are emitted for every request. Other entries are emitted
//! when one of their keywords occurs as a whole word in the input.
//!
//! Extra entries load from a TOML file:
//!
//! ```toml
//! [[entries]]
//! title = "KDIGO CKD Guideline"
//! summary = "2024 guideline for evaluation and management of chronic kidney disease."
//! url = "https://kdigo.org/guidelines/ckd-evaluation-and-management/"
//! keywords = ["ckd", "chronic kidney disease", "egfr"]
//! ```

use caduceus_core::{Error, EvidenceItem, EvidencePriority, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// One curated summary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReferenceEntry {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub pinned: bool,
}

impl ReferenceEntry {
    fn new(title: &str, summary: &str, url: &str, keywords: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            summary: summary.to_string(),
            url: Some(url.to_string()),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            pinned: false,
        }
    }

    fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    /// Whether any keyword occurs as a whole word in `lowered` input.
    pub fn matches(&self, lowered: &str) -> bool {
        self.keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .any(|k| !k.is_empty() && contains_word(lowered, &k))
    }

    fn to_evidence(&self) -> Option<EvidenceItem> {
        let priority = if self.pinned {
            EvidencePriority::Pinned
        } else {
            EvidencePriority::Reference
        };
        EvidenceItem::new(self.title.as_str(), &self.summary, self.url.clone(), priority)
    }
}

#[derive(Debug, Deserialize)]
struct ReferenceFile {
    #[serde(default)]
    entries: Vec<ReferenceEntry>,
}

/// An ordered set of [`ReferenceEntry`] values.
#[derive(Debug, Clone, Default)]
pub struct ReferenceLibrary {
    entries: Vec<ReferenceEntry>,
}

impl ReferenceLibrary {
    pub fn new(entries: Vec<ReferenceEntry>) -> Self {
        Self { entries }
    }

    /// The built-in cardiology, psychiatry and medication summaries.
    pub fn builtin() -> Self {
        Self::new(vec![
            ReferenceEntry::new(
                "AHA/ACC/HFSA Guideline",
                "2022 guideline for heart failure and arrhythmia management. Includes recommendations \
                 for acute and chronic AFib, rate/rhythm control, and anticoagulation. Class I, Level A \
                 evidence for immediate cardioversion in unstable patients.",
                "https://www.ahajournals.org/doi/10.1161/CIR.0000000000000941",
                &["heart failure", "afib", "arrhythmia"],
            )
            .pinned(),
            ReferenceEntry::new(
                "ESC Guidelines",
                "2021 European Society of Cardiology guideline for atrial fibrillation. Discusses risk \
                 stratification, anticoagulation, and management of AFib with chest pain. Class I, Level A \
                 evidence for anticoagulation based on CHA2DS2-VASc.",
                "https://www.escardio.org/Guidelines/Clinical-Practice-Guidelines/Atrial-Fibrillation-Management",
                &["atrial fibrillation", "afib", "a-fib", "palpitations", "anticoagulation", "cha2ds2-vasc"],
            ),
            ReferenceEntry::new(
                "DAPA-HF Trial",
                "Dapagliflozin in patients with heart failure and reduced ejection fraction.",
                "https://www.nejm.org/doi/full/10.1056/NEJMoa1911303",
                &["heart failure", "hfref", "ejection fraction", "dapagliflozin", "sglt2"],
            ),
            ReferenceEntry::new(
                "EMPEROR-Reduced Trial",
                "Empagliflozin in heart failure with reduced ejection fraction.",
                "https://www.nejm.org/doi/full/10.1056/NEJMoa2022190",
                &["heart failure", "hfref", "ejection fraction", "empagliflozin", "sglt2"],
            ),
            ReferenceEntry::new(
                "DSM-5: ADHD",
                "Attention-deficit/hyperactivity disorder is characterized by persistent inattention \
                 and/or hyperactivity-impulsivity that interferes with functioning.",
                "https://www.cdc.gov/ncbddd/adhd/index.html",
                &["adhd", "attention deficit", "hyperactivity", "inattention"],
            ),
            ReferenceEntry::new(
                "DSM-5: Major Depressive Disorder",
                "Major depressive disorder involves persistent sadness and loss of interest in \
                 activities once enjoyed.",
                "https://www.nimh.nih.gov/health/topics/depression",
                &["depression", "depressive", "mdd", "anhedonia", "low mood"],
            ),
            ReferenceEntry::new(
                "DSM-5: Generalized Anxiety Disorder",
                "Generalized anxiety disorder features excessive worry occurring more days than not \
                 for at least six months.",
                "https://www.nimh.nih.gov/health/topics/anxiety-disorders",
                &["anxiety", "gad", "worry"],
            ),
            ReferenceEntry::new(
                "Sertraline (Zoloft)",
                "SSRI antidepressant used for depression, anxiety, PTSD and OCD. Take with food to \
                 reduce stomach upset; effects may take several weeks. Monitor for mood changes, \
                 especially in young adults.",
                "https://medlineplus.gov/druginfo/meds/a697048.html",
                &["sertraline", "zoloft", "ssri"],
            ),
            ReferenceEntry::new(
                "Fluoxetine (Prozac)",
                "SSRI antidepressant used for depression, anxiety, OCD and panic disorder. Usually \
                 taken in the morning; full effect may take 4-6 weeks. Do not stop suddenly.",
                "https://medlineplus.gov/druginfo/meds/a689006.html",
                &["fluoxetine", "prozac", "ssri"],
            ),
        ])
    }

    /// Parse a TOML file of `[[entries]]`.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("Failed to read reference file {}: {e}", path.display()),
        })?;
        let file: ReferenceFile = toml::from_str(&content).map_err(|e| Error::Config {
            message: format!("Failed to parse reference file {}: {e}", path.display()),
        })?;
        info!(path = %path.display(), entries = file.entries.len(), "Loaded reference entries");
        Ok(Self::new(file.entries))
    }

    /// Append another library's entries after this one's.
    pub fn extend(&mut self, other: ReferenceLibrary) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evidence for `input`: all pinned entries first, then keyword matches,
    /// each group in library order.
    pub fn matching(&self, input: &str) -> Vec<EvidenceItem> {
        let lowered = input.to_lowercase();
        let pinned = self.entries.iter().filter(|e| e.pinned);
        let matched = self
            .entries
            .iter()
            .filter(|e| !e.pinned && e.matches(&lowered));

        let items: Vec<EvidenceItem> = pinned
            .chain(matched)
            .filter_map(ReferenceEntry::to_evidence)
            .collect();
        debug!(count = items.len(), "Reference library matches");
        items
    }
}

/// `needle` occurs in `haystack` with no alphanumeric char on either side.
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptions(items: &[EvidenceItem]) -> Vec<&str> {
        items.iter().map(|i| i.description()).collect()
    }

    #[test]
    fn pinned_guideline_always_present() {
        let library = ReferenceLibrary::builtin();
        for input in ["", "   ", "what is the capital of france"] {
            let items = library.matching(input);
            assert_eq!(descriptions(&items), vec!["AHA/ACC/HFSA Guideline"]);
            assert!(items[0].is_pinned());
        }
    }

    #[test]
    fn keyword_matches_follow_pinned() {
        let items = ReferenceLibrary::builtin().matching("Patient with HFrEF, EF 25%, on an SGLT2 inhibitor");
        assert_eq!(
            descriptions(&items),
            vec!["AHA/ACC/HFSA Guideline", "DAPA-HF Trial", "EMPEROR-Reduced Trial"]
        );
        assert_eq!(items[1].priority(), EvidencePriority::Reference);
    }

    #[test]
    fn keywords_match_whole_words_only() {
        let library = ReferenceLibrary::builtin();
        // "gad" inside "gadolinium" must not pull in the anxiety summary.
        let items = library.matching("gadolinium contrast reaction");
        assert_eq!(items.len(), 1);

        let items = library.matching("started on sertraline last week");
        assert_eq!(descriptions(&items)[1], "Sertraline (Zoloft)");
    }

    #[test]
    fn shared_keyword_emits_each_entry() {
        let items = ReferenceLibrary::builtin().matching("which SSRI is better tolerated?");
        assert_eq!(
            descriptions(&items)[1..],
            ["Sertraline (Zoloft)", "Fluoxetine (Prozac)"]
        );
    }

    #[test]
    fn loads_entries_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.toml");
        std::fs::write(
            &path,
            r#"
[[entries]]
title = "KDIGO CKD Guideline"
summary = "2024 guideline for chronic kidney disease."
keywords = ["ckd", "egfr"]

[[entries]]
title = "Local antibiogram"
summary = "Hospital resistance patterns, updated quarterly."
pinned = true
"#,
        )
        .unwrap();

        let mut library = ReferenceLibrary::builtin();
        library.extend(ReferenceLibrary::load_file(&path).unwrap());
        assert_eq!(library.len(), 11);

        let items = library.matching("falling eGFR in CKD stage 3");
        assert_eq!(
            descriptions(&items),
            vec!["AHA/ACC/HFSA Guideline", "Local antibiogram", "KDIGO CKD Guideline"]
        );
        assert_eq!(items[2].url(), None);
    }

    #[test]
    fn bad_reference_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.toml");
        std::fs::write(&path, "[[entries]]\ntitle = 3\n").unwrap();

        let err = ReferenceLibrary::load_file(&path).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let missing = ReferenceLibrary::load_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, Error::Config { .. }));
    }

    #[test]
    fn blank_summary_is_skipped() {
        let library = ReferenceLibrary::new(vec![ReferenceEntry {
            title: "Empty".into(),
            summary: "   ".into(),
            url: None,
            keywords: vec![],
            pinned: true,
        }]);
        assert!(library.matching("anything").is_empty());
    }
}
