//! Prompt composition for the external image generator.
//!
//! Two pure builders: a one-time global reference-sheet prompt that
//! establishes canonical character appearance, and a per-page sequential
//! prompt that chains each illustration to the reference sheet and to its
//! predecessor. Section headers are contractual; downstream consumers and
//! tests match on them literally.

use super::visual::{CollectionVisualContext, StoryPage, StoryStructure, VisualGuide};

/// Header of the block tying a page to the rendered reference sheet.
pub const GLOBAL_REFERENCE_HEADER: &str = "GLOBAL REFERENCE USAGE";

/// Header of the block carrying continuity hints from the prior page.
pub const PREVIOUS_ILLUSTRATION_HEADER: &str = "PREVIOUS ILLUSTRATION CONTEXT";

/// Header of the collection block in the global reference prompt.
pub const COLLECTION_REQUIREMENTS_HEADER: &str = "COLLECTION CONSISTENCY REQUIREMENTS";

/// Header of the collection block in per-page prompts.
pub const COLLECTION_CONSISTENCY_HEADER: &str = "COLLECTION CONSISTENCY";

/// Closing directive appended to every prompt. The output is an
/// illustration, never a captioned slide, so this is never omitted.
pub const TEXT_EXCLUSION_DIRECTIVE: &str =
    "IMPORTANT: Include no text, letters, or written elements anywhere in the image.";

/// Build the one-time prompt for a story's global character reference sheet.
///
/// The sheet shows every character at multiple angles and expressions plus
/// key settings and props, so later per-page prompts can demand an exact
/// appearance match. Deterministic for identical inputs.
pub fn build_global_reference_prompt(
    guide: &VisualGuide,
    structure: Option<&StoryStructure>,
    story_title: &str,
    collection: Option<&CollectionVisualContext>,
) -> String {
    let mut sections: Vec<String> = Vec::new();

    sections.push(format!(
        "Create a global character reference sheet for the story \"{}\".",
        story_title
    ));

    if !guide.character_definitions.is_empty() {
        let mut lineup = String::from(
            "CHARACTER LINEUP (render every character side by side, at multiple angles and expressions):",
        );
        for (name, description) in &guide.character_definitions {
            lineup.push_str(&format!("\n- {}: {}", name, description));
        }
        sections.push(lineup);
    }

    let structure_props = structure.map(StoryStructure::all_props).unwrap_or_default();
    if !guide.setting_definitions.is_empty() || !structure_props.is_empty() {
        let mut block = String::from("KEY SETTINGS AND PROPS:");
        for (name, description) in &guide.setting_definitions {
            block.push_str(&format!("\n- {}: {}", name, description));
        }
        for prop in &structure_props {
            block.push_str(&format!("\n- {}", prop));
        }
        sections.push(block);
    }

    if let Some(context) = collection {
        // Empty shared lists still produce their lines; the generator must
        // see that the collection defines none, not that we forgot to say.
        sections.push(format!(
            "{}:\n\
             - Unified art style: {}\n\
             - Theme: {}\n\
             - Target age group: {}\n\
             - Shared props: {}\n\
             - Shared characters: {}\n\
             Every shared character, prop, and style element must recur unchanged in every story of this collection.",
            COLLECTION_REQUIREMENTS_HEADER,
            context.unified_art_style,
            context.theme,
            context.target_age_group,
            context.shared_props.join(", "),
            context.shared_characters.join(", "),
        ));
    }

    sections.push(TEXT_EXCLUSION_DIRECTIVE.to_string());

    sections.join("\n\n")
}

/// Build the prompt for one page's illustration.
///
/// The first page of a story is reference-establishing, never
/// continuity-dependent: for `page_index == 0` the previous-illustration
/// block is suppressed even when a handle is supplied.
pub fn build_sequential_illustration_prompt(
    page: &StoryPage,
    page_index: usize,
    guide: &VisualGuide,
    global_reference_image: Option<&str>,
    previous_illustration: Option<&str>,
    structure: Option<&StoryStructure>,
    collection: Option<&CollectionVisualContext>,
) -> String {
    let mut sections: Vec<String> = Vec::new();

    sections.push(format!(
        "Illustrate page {} of the story.\nPage text: \"{}\"",
        page_index + 1,
        page.content
    ));

    if let Some(reference) = global_reference_image {
        sections.push(format!(
            "{}:\nMatch every character's appearance exactly to the global reference sheet ({}).",
            GLOBAL_REFERENCE_HEADER, reference
        ));
    }

    let guide_block = guide.formatted_block();
    if !guide_block.is_empty() {
        sections.push(guide_block);
    }

    if page_index > 0 {
        if let Some(previous) = previous_illustration {
            sections.push(format!(
                "{}:\nMaintain the art style, lighting, and character appearance of the previous illustration ({}).",
                PREVIOUS_ILLUSTRATION_HEADER, previous
            ));
        }
    }

    if let Some(plan) = structure.and_then(|s| s.plan_for_page(page_index)) {
        let mut directives: Vec<String> = Vec::new();
        if !plan.characters.is_empty() {
            directives.push(format!(
                "Characters in this scene: {}.",
                plan.characters.join(", ")
            ));
        }
        if !plan.props.is_empty() {
            directives.push(format!("Props in this scene: {}.", plan.props.join(", ")));
        }
        if let Some(focus) = &plan.visual_focus {
            directives.push(format!("Visual focus: {}.", focus));
        }
        if let Some(tone) = &plan.emotional_tone {
            directives.push(format!("Emotional tone: {}.", tone));
        }
        if !directives.is_empty() {
            sections.push(directives.join("\n"));
        }
    }

    if let Some(context) = collection {
        sections.push(format!(
            "{}:\n- Unified art style: {}\n- Theme: {}",
            COLLECTION_CONSISTENCY_HEADER, context.unified_art_style, context.theme
        ));
    }

    sections.push(TEXT_EXCLUSION_DIRECTIVE.to_string());

    sections.join("\n\n")
}
