//! Prompt catalog
//!
//! Prompts live one per YAML file in the configured directory. An empty
//! directory is seeded with a default set on first load. Resolution rule:
//! an input with no whitespace that matches a loaded id resolves to that
//! prompt's content; anything else is treated as literal prompt text by
//! the caller.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use video_digest_common::PromptResolver;

/// One catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub content: String,
}

/// Loaded prompt catalog
pub struct PromptCatalog {
    prompts: HashMap<String, PromptDefinition>,
}

impl PromptCatalog {
    /// Load every `*.yaml` prompt file under `dir`, creating the directory
    /// and a default prompt set if it holds none.
    pub fn load(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create prompts directory {}", dir.display()))?;

        let mut prompts = HashMap::new();
        let mut files = prompt_files(dir)?;

        if files.is_empty() {
            info!("no prompt files in {}, writing defaults", dir.display());
            write_default_prompts(dir)?;
            files = prompt_files(dir)?;
        }

        for path in files {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read prompt file {}", path.display()))?;
            let prompt: PromptDefinition = serde_yaml::from_str(&contents)
                .with_context(|| format!("failed to parse prompt file {}", path.display()))?;

            if prompt.id.is_empty() {
                anyhow::bail!("prompt file {} has no id", path.display());
            }
            if prompt.content.is_empty() {
                anyhow::bail!("prompt '{}' has no content", prompt.id);
            }

            debug!("loaded prompt '{}' from {}", prompt.id, path.display());
            prompts.insert(prompt.id.clone(), prompt);
        }

        info!("prompt catalog loaded with {} prompt(s)", prompts.len());
        Ok(Self { prompts })
    }

    /// Catalog built directly from definitions (tests, embedded setups).
    #[must_use]
    pub fn from_definitions(definitions: Vec<PromptDefinition>) -> Self {
        Self {
            prompts: definitions
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect(),
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&PromptDefinition> {
        self.prompts.get(id)
    }

    /// All prompts, ordered by id for stable listings.
    #[must_use]
    pub fn all(&self) -> Vec<&PromptDefinition> {
        let mut all: Vec<&PromptDefinition> = self.prompts.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}

impl PromptResolver for PromptCatalog {
    fn resolve(&self, input: &str) -> Option<String> {
        // Identifiers carry no whitespace; anything else is literal text.
        if input.is_empty() || input.contains(char::is_whitespace) {
            return None;
        }
        self.get(input).map(|p| p.content.clone())
    }
}

fn prompt_files(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut files: Vec<std::path::PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to list prompts directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "yaml"))
        .collect();
    files.sort();
    Ok(files)
}

fn write_default_prompts(dir: &Path) -> Result<()> {
    for prompt in default_prompts() {
        let path = dir.join(format!("{}.yaml", prompt.id));
        let contents = serde_yaml::to_string(&prompt)
            .with_context(|| format!("failed to serialize default prompt '{}'", prompt.id))?;
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write default prompt {}", path.display()))?;
    }
    Ok(())
}

fn default_prompts() -> Vec<PromptDefinition> {
    vec![
        PromptDefinition {
            id: "general".to_string(),
            name: "General Summary".to_string(),
            description: "Creates a general, high-level summary of the content".to_string(),
            category: "summary".to_string(),
            content: "You are an expert at summarizing transcripts. Return a concise, \
                      high-level summary of the main content."
                .to_string(),
        },
        PromptDefinition {
            id: "key_points".to_string(),
            name: "Key Points".to_string(),
            description: "Extracts the most important key points from the content".to_string(),
            category: "extraction".to_string(),
            content: "You are an expert at extracting the most important key points from \
                      transcripts. Return a concise bullet list of the main points."
                .to_string(),
        },
        PromptDefinition {
            id: "timeline".to_string(),
            name: "Timeline".to_string(),
            description: "Creates a chronological timeline of events or topics".to_string(),
            category: "organization".to_string(),
            content: "You are an expert at creating timelines from transcripts. Return a \
                      chronological list of events or topics as they appear."
                .to_string(),
        },
        PromptDefinition {
            id: "action_items".to_string(),
            name: "Action Items".to_string(),
            description: "Identifies actionable tasks and recommendations".to_string(),
            category: "action".to_string(),
            content: "You are an expert at identifying action items from transcripts. Return \
                      a bullet list of actionable tasks or recommendations."
                .to_string(),
        },
        PromptDefinition {
            id: "educational".to_string(),
            name: "Educational Summary".to_string(),
            description: "Summarizes educational content with learning objectives".to_string(),
            category: "education".to_string(),
            content: "You are an expert at summarizing educational content. Focus on learning \
                      objectives, key concepts, and takeaways."
                .to_string(),
        },
        PromptDefinition {
            id: "meeting".to_string(),
            name: "Meeting Summary".to_string(),
            description: "Summarizes meeting content with decisions and next steps".to_string(),
            category: "meeting".to_string(),
            content: "You are an expert at summarizing meetings. Focus on decisions made, \
                      action items assigned, and key discussion points."
                .to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_empty_dir_is_seeded_with_defaults() {
        let dir = TempDir::new().unwrap();
        let catalog = PromptCatalog::load(dir.path()).unwrap();

        assert_eq!(catalog.len(), 6);
        assert!(catalog.get("general").is_some());
        assert!(catalog.get("key_points").is_some());
        assert!(dir.path().join("general.yaml").exists());

        // A second load reads the files it just wrote.
        let reloaded = PromptCatalog::load(dir.path()).unwrap();
        assert_eq!(reloaded.len(), 6);
    }

    #[test]
    fn test_custom_prompt_file_is_loaded() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("finance.yaml"),
            "id: finance\nname: Finance\ndescription: Finance digest\ncategory: finance\ncontent: Summarize for investors.\n",
        )
        .unwrap();

        let catalog = PromptCatalog::load(dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.get("finance").unwrap().content,
            "Summarize for investors."
        );
    }

    #[test]
    fn test_prompt_without_content_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("broken.yaml"),
            "id: broken\nname: Broken\ncontent: \"\"\n",
        )
        .unwrap();
        assert!(PromptCatalog::load(dir.path()).is_err());
    }

    #[test]
    fn test_resolution_rules() {
        let catalog = PromptCatalog::from_definitions(vec![PromptDefinition {
            id: "general".to_string(),
            name: "General".to_string(),
            description: String::new(),
            category: String::new(),
            content: "Summarize concisely.".to_string(),
        }]);

        // Known id resolves to its content.
        assert_eq!(
            catalog.resolve("general").as_deref(),
            Some("Summarize concisely.")
        );
        // Unknown id: no resolution, caller falls back to the literal.
        assert_eq!(catalog.resolve("nonexistent_id"), None);
        // Whitespace means literal text, even if a prefix matches an id.
        assert_eq!(catalog.resolve("general summary please"), None);
        assert_eq!(catalog.resolve(""), None);
    }

    #[test]
    fn test_all_is_sorted_by_id() {
        let dir = TempDir::new().unwrap();
        let catalog = PromptCatalog::load(dir.path()).unwrap();
        let ids: Vec<&str> = catalog.all().iter().map(|p| p.id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }
}
