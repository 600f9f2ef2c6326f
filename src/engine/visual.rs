//! Visual canon data: the per-story guide that keeps characters, settings,
//! and art style consistent across pages, and the collection-wide context
//! that keeps them consistent across a themed set of stories.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Canonical style/character/setting description for one story.
///
/// Built once per story and treated as immutable; attaching a reference
/// image produces a new value via [`VisualGuide::with_reference_image`].
/// Definition maps are ordered so formatted output is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualGuide {
    /// Free-text description of the story's art style.
    pub style_description: String,
    /// Character name to appearance description.
    pub character_definitions: BTreeMap<String, String>,
    /// Setting name to location description.
    pub setting_definitions: BTreeMap<String, String>,
    /// Set once a global reference sheet has been rendered for this story.
    pub reference_image_id: Option<String>,
}

impl VisualGuide {
    /// Copy of this guide pointing at a rendered reference sheet.
    pub fn with_reference_image(&self, reference_image_id: &str) -> Self {
        Self {
            reference_image_id: Some(reference_image_id.to_string()),
            ..self.clone()
        }
    }

    /// Prompt-ready textual block. Empty sections are omitted entirely;
    /// an all-empty guide formats to the empty string.
    pub fn formatted_block(&self) -> String {
        let mut sections: Vec<String> = Vec::new();

        if !self.style_description.is_empty() {
            sections.push(format!("ART STYLE: {}", self.style_description));
        }

        if !self.character_definitions.is_empty() {
            let mut block = String::from("CHARACTERS:");
            for (name, description) in &self.character_definitions {
                block.push_str(&format!("\n- {}: {}", name, description));
            }
            sections.push(block);
        }

        if !self.setting_definitions.is_empty() {
            let mut block = String::from("SETTINGS:");
            for (name, description) in &self.setting_definitions {
                block.push_str(&format!("\n- {}: {}", name, description));
            }
            sections.push(block);
        }

        sections.join("\n\n")
    }
}

/// Cross-story constraints for a themed collection.
///
/// Value type: field-wise equality, and every field survives a
/// serialization round trip, empty lists included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionVisualContext {
    pub collection_id: String,
    pub theme: String,
    /// Character names shared by every story. Order is significant; it
    /// drives round-robin character assignment across stories.
    pub shared_characters: Vec<String>,
    pub unified_art_style: String,
    pub developmental_focus: String,
    pub target_age_group: String,
    pub requires_character_consistency: bool,
    pub allows_style_variation: bool,
    pub shared_props: Vec<String>,
}

impl CollectionVisualContext {
    /// Round-robin shared-character pick for the story at `story_index`.
    pub fn character_for_story(&self, story_index: usize) -> Option<&str> {
        if self.shared_characters.is_empty() {
            return None;
        }
        let name = &self.shared_characters[story_index % self.shared_characters.len()];
        Some(name.as_str())
    }
}

/// Per-page visual planning emitted by story planning, consumed verbatim
/// by prompt composition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageVisualPlan {
    pub characters: Vec<String>,
    pub props: Vec<String>,
    pub visual_focus: Option<String>,
    pub emotional_tone: Option<String>,
}

/// Ordered per-page visual plans for a whole story.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryStructure {
    pub page_plans: Vec<PageVisualPlan>,
}

impl StoryStructure {
    pub fn plan_for_page(&self, page_index: usize) -> Option<&PageVisualPlan> {
        self.page_plans.get(page_index)
    }

    /// Union of props across all page plans, first mention first.
    pub fn all_props(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut props = Vec::new();
        for plan in &self.page_plans {
            for prop in &plan.props {
                if seen.insert(prop.clone()) {
                    props.push(prop.clone());
                }
            }
        }
        props
    }
}

/// The illustratable unit of story text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryPage {
    pub id: String,
    pub content: String,
}
