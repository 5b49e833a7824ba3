use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const BUILTIN_DATASET: &str = include_str!("../data/blocklist.json");

/// Verdict status, shared by dataset groups and classifier output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    #[serde(alias = "RED")]
    Block,
    #[serde(alias = "YELLOW")]
    Review,
    #[serde(alias = "SAFE")]
    Green,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Block => "BLOCK",
            Status::Review => "REVIEW",
            Status::Green => "GREEN",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum GroupId {
    Text(String),
    Number(i64),
}

impl From<GroupId> for String {
    fn from(id: GroupId) -> Self {
        match id {
            GroupId::Text(s) => s,
            GroupId::Number(n) => n.to_string(),
        }
    }
}

/// One row of the keyword dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct LexiconGroup {
    #[serde(deserialize_with = "group_id")]
    pub id: String,
    pub category: String,
    pub display_name: String,
    pub status: Status,
    pub description: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub exceptions: Vec<String>,
}

fn group_id<'de, D>(d: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    GroupId::deserialize(d).map(String::from)
}

/// Group metadata every keyword of the group resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct LexiconEntry {
    pub id: String,
    pub category: String,
    pub display_name: String,
    pub status: Status,
    pub description: String,
}

/// Read-only keyword blocklist plus exception list, built once per process.
#[derive(Debug, Clone)]
pub struct Lexicon {
    entries: Vec<LexiconEntry>,
    blocklist: HashMap<String, usize>,
    /// Sorted longest first. Classification depends on this order.
    exceptions: Vec<String>,
}

pub struct LexiconStats {
    pub groups: usize,
    pub keywords: usize,
    pub exceptions: usize,
    pub per_category: BTreeMap<String, usize>,
}

impl Lexicon {
    pub fn from_groups(groups: Vec<LexiconGroup>) -> Result<Self> {
        let mut entries = Vec::with_capacity(groups.len());
        let mut blocklist = HashMap::new();
        let mut exceptions = Vec::new();

        for group in groups {
            let idx = entries.len();
            for keyword in &group.keywords {
                let key = keyword.trim().to_lowercase();
                if key.is_empty() {
                    bail!("group '{}' has a blank keyword", group.id);
                }
                match blocklist.insert(key.clone(), idx) {
                    Some(prev) if prev != idx => {
                        let prev: &LexiconEntry = &entries[prev];
                        debug!("keyword '{}' moved from group '{}' to '{}'", key, prev.id, group.id);
                    }
                    _ => {}
                }
            }
            exceptions.extend(
                group
                    .exceptions
                    .iter()
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty()),
            );
            entries.push(LexiconEntry {
                id: group.id,
                category: group.category,
                display_name: group.display_name,
                status: group.status,
                description: group.description,
            });
        }

        // Stable sort: equal lengths keep dataset order.
        exceptions.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));

        Ok(Self {
            entries,
            blocklist,
            exceptions,
        })
    }

    /// Parse a JSON array of groups. `source` names the dataset in errors.
    pub fn from_json(json: &str, source: &str) -> Result<Self> {
        let groups: Vec<LexiconGroup> = serde_json::from_str(json)
            .with_context(|| format!("Malformed lexicon dataset: {}", source))?;
        let lexicon = Self::from_groups(groups)
            .with_context(|| format!("Invalid lexicon dataset: {}", source))?;
        info!(
            "Loaded lexicon from {} ({} groups, {} keywords, {} exceptions)",
            source,
            lexicon.entries.len(),
            lexicon.blocklist.len(),
            lexicon.exceptions.len()
        );
        Ok(lexicon)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read lexicon {}", path.display()))?;
        Self::from_json(&json, &path.display().to_string())
    }

    /// The dataset compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_DATASET, "built-in blocklist")
    }

    pub fn lookup(&self, token: &str) -> Option<&LexiconEntry> {
        self.blocklist.get(token).map(|&idx| &self.entries[idx])
    }

    pub fn entries(&self) -> &[LexiconEntry] {
        &self.entries
    }

    pub fn exceptions(&self) -> &[String] {
        &self.exceptions
    }

    pub fn stats(&self) -> LexiconStats {
        let mut per_category = BTreeMap::new();
        for &idx in self.blocklist.values() {
            *per_category
                .entry(self.entries[idx].category.clone())
                .or_insert(0) += 1;
        }
        LexiconStats {
            groups: self.entries.len(),
            keywords: self.blocklist.len(),
            exceptions: self.exceptions.len(),
            per_category,
        }
    }
}

// ── Tests ──

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn group(
        id: &str,
        category: &str,
        status: Status,
        keywords: &[&str],
        exceptions: &[&str],
    ) -> LexiconGroup {
        LexiconGroup {
            id: id.to_string(),
            category: category.to_string(),
            display_name: category.to_string(),
            status,
            description: format!("{} ingredient", category),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            exceptions: exceptions.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn keywords_are_case_folded() {
        let lex = Lexicon::from_groups(vec![group("d", "Dairy", Status::Block, &["Milk"], &[])]).unwrap();
        assert_eq!(lex.lookup("milk").map(|e| e.category.as_str()), Some("Dairy"));
        assert!(lex.lookup("Milk").is_none());
    }

    #[test]
    fn exceptions_sorted_longest_first_across_groups() {
        let lex = Lexicon::from_groups(vec![
            group("a", "A", Status::Block, &["milk"], &["milk", "coconut milk"]),
            group("b", "B", Status::Block, &["butter"], &["coconut milk powder", "Cocoa Butter"]),
        ])
        .unwrap();
        assert_eq!(
            lex.exceptions(),
            &["coconut milk powder", "coconut milk", "cocoa butter", "milk"]
        );
    }

    #[test]
    fn colliding_keyword_last_group_wins() {
        let lex = Lexicon::from_groups(vec![
            group("a", "First", Status::Review, &["gelatin"], &[]),
            group("b", "Second", Status::Block, &["gelatin"], &[]),
        ])
        .unwrap();
        let entry = lex.lookup("gelatin").unwrap();
        assert_eq!(entry.id, "b");
        assert_eq!(entry.status, Status::Block);
    }

    #[test]
    fn missing_keywords_is_fatal() {
        let json = r#"[{"id": 1, "category": "Dairy", "display_name": "Dairy",
            "status": "BLOCK", "description": "x"}]"#;
        let err = Lexicon::from_json(json, "inline").unwrap_err();
        assert!(format!("{:#}", err).contains("keywords"), "{:#}", err);
    }

    #[test]
    fn blank_keyword_is_fatal() {
        assert!(Lexicon::from_groups(vec![group("a", "A", Status::Block, &["  "], &[])]).is_err());
    }

    #[test]
    fn numeric_ids_and_legacy_statuses() {
        let json = r#"[{"id": 7, "category": "Dairy", "display_name": "Dairy",
            "status": "RED", "description": "x", "keywords": ["milk"]},
            {"id": "h", "category": "Bee", "display_name": "Bee",
            "status": "YELLOW", "description": "y", "keywords": ["honey"]}]"#;
        let lex = Lexicon::from_json(json, "inline").unwrap();
        assert_eq!(lex.lookup("milk").unwrap().id, "7");
        assert_eq!(lex.lookup("milk").unwrap().status, Status::Block);
        assert_eq!(lex.lookup("honey").unwrap().status, Status::Review);
        assert!(lex.exceptions().is_empty());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexicon.json");
        std::fs::write(
            &path,
            r#"[{"id": "d", "category": "Dairy", "display_name": "Dairy",
                "status": "BLOCK", "description": "x", "keywords": ["whey"],
                "exceptions": ["Whey-free"]}]"#,
        )
        .unwrap();
        let lex = Lexicon::load(&path).unwrap();
        assert!(lex.lookup("whey").is_some());
        assert_eq!(lex.exceptions(), &["whey-free"]);
    }

    #[test]
    fn load_missing_file_names_path() {
        let err = Lexicon::load(Path::new("does/not/exist.json")).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.json"));
    }

    #[test]
    fn builtin_dataset_loads() {
        let lex = Lexicon::builtin().unwrap();
        let stats = lex.stats();
        assert!(stats.groups >= 5);
        assert_eq!(stats.keywords, stats.per_category.values().sum::<usize>());
        assert!(lex.lookup("whey").is_some());
        let exc = lex.exceptions();
        assert!(exc.windows(2).all(|w| w[0].chars().count() >= w[1].chars().count()));
    }
}
