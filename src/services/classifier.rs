use lazy_static::lazy_static;
use regex::Regex;

use crate::models::{ClassifiedEntry, RawEntry};
use crate::services::m3u_parser::{ExtinfLine, GROUP_ATTRIBUTE};

/// Category used when no named group matches
pub const DEFAULT_CATEGORY: &str = "General";

/// Outcome of a rule match
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleAction {
    /// Drop the entry (not a category called "none")
    Exclude,
    Assign(String),
}

/// Keyword group; a display name containing any keyword matches
#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub action: RuleAction,
    pattern: Regex,
}

impl CategoryRule {
    pub fn new(action: RuleAction, keywords: &[&str]) -> Self {
        let alternation = keywords
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        // Escaped literals always compile
        let pattern = Regex::new(&format!("(?i){}", alternation)).unwrap();
        Self { action, pattern }
    }

    pub fn exclude(keywords: &[&str]) -> Self {
        Self::new(RuleAction::Exclude, keywords)
    }

    pub fn assign(category: &str, keywords: &[&str]) -> Self {
        Self::new(RuleAction::Assign(category.to_string()), keywords)
    }

    pub fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

lazy_static! {
    // ============ DEFAULT RULES ============
    // Order is part of the output contract: first match wins.
    static ref DEFAULT_RULES: Vec<CategoryRule> = vec![
        CategoryRule::exclude(&["radio"]),
        CategoryRule::assign("Kurdish", &["kurd", "rudaw", "k24", "waartv", "ava"]),
        CategoryRule::assign("Iran", &["iran", "tehran", "fars", "shiraz", "mashhad"]),
        CategoryRule::assign("Iraq", &["iraq", "baghdad"]),
    ];
}

/// Ordered keyword classifier for channel names
#[derive(Debug, Clone)]
pub struct ChannelClassifier {
    rules: Vec<CategoryRule>,
    fallback: String,
}

impl Default for ChannelClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.clone(), DEFAULT_CATEGORY)
    }
}

impl ChannelClassifier {
    pub fn new(rules: Vec<CategoryRule>, fallback: &str) -> Self {
        Self {
            rules,
            fallback: fallback.to_string(),
        }
    }

    /// Category for a display name, `None` when the entry is excluded
    pub fn classify(&self, display_name: &str) -> Option<String> {
        match self.rules.iter().find(|rule| rule.matches(display_name)) {
            Some(CategoryRule {
                action: RuleAction::Exclude,
                ..
            }) => None,
            Some(CategoryRule {
                action: RuleAction::Assign(category),
                ..
            }) => Some(category.clone()),
            None => Some(self.fallback.clone()),
        }
    }

    /// Classify an entry and stamp its category on the metadata line
    ///
    /// Excluded entries keep their original line.
    pub fn classify_entry(&self, entry: RawEntry) -> ClassifiedEntry {
        let Some(mut extinf) = ExtinfLine::parse(&entry.metadata_line) else {
            return ClassifiedEntry {
                display_name: String::new(),
                category: None,
                metadata_line: entry.metadata_line,
                stream_url: entry.stream_url,
            };
        };

        let display_name = extinf.display_name();
        let category = self.classify(&display_name);

        let metadata_line = match &category {
            Some(group) => {
                extinf.set_attribute(GROUP_ATTRIBUTE, group);
                extinf.to_line()
            }
            None => entry.metadata_line,
        };

        ClassifiedEntry {
            metadata_line,
            stream_url: entry.stream_url,
            display_name,
            category,
        }
    }
}

/// Optional allowlist applied before classification
///
/// An empty allowlist lets everything through.
#[derive(Debug, Clone, Default)]
pub struct TargetFilter {
    targets: Vec<String>,
}

impl TargetFilter {
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets = targets
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { targets }
    }

    pub fn is_active(&self) -> bool {
        !self.targets.is_empty()
    }

    pub fn allows(&self, display_name: &str) -> bool {
        if self.targets.is_empty() {
            return true;
        }
        let lower = display_name.to_lowercase();
        self.targets.iter().any(|t| lower.contains(t.as_str()))
    }
}
