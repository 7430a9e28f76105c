// src/editorial/prompts.rs
//! Prompt text for each editorial stage. The article under edit is always
//! wrapped in `<article>` tags so the reply can be located reliably.

use crate::llm::{LlmRequest, ResponseFormat};
use crate::models::{Category, SourceItem, StyleProfile, Voice};

const EDIT_TEMPERATURE: f32 = 0.4;
const COPY_TEMPERATURE: f32 = 0.2;

fn category_list() -> String {
    Category::ALL
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn style_block(style: &StyleProfile) -> String {
    let mut s = format!(
        "Style: {}\n{}\nVoice guidelines: {}\nComedic approach: {}\n",
        style.name, style.description, style.voice_guidelines, style.comedic_approach
    );
    if let Some(h) = &style.example_headline {
        s.push_str(&format!("Example headline: {h}\n"));
    }
    if let Some(p) = &style.example_paragraph {
        s.push_str(&format!("Example paragraph: {p}\n"));
    }
    s
}

pub fn draft(voice: &Voice, style: &StyleProfile, source: &SourceItem, temperature: f32) -> LlmRequest {
    let prompt = format!(
        "Write a satirical news article based on the real story below.\n\
         You are writing as {name}.\n\n\
         {style}\n\
         Real story:\n\
         Headline: {title}\n\
         Summary: {summary}\n\n\
         Respond with ONE JSON object and nothing else, with these fields:\n\
         - \"title\": the satirical headline\n\
         - \"content\": the article body, 300-600 words, plain paragraphs\n\
         - \"category\": one of [{categories}]\n\
         - \"short_description\": one sentence teaser\n\
         - \"image_prompt\": a short description of a fitting illustration, no text in the image\n",
        name = voice.display_name,
        style = style_block(style),
        title = source.title,
        summary = if source.description.is_empty() {
            "(none)"
        } else {
            source.description.as_str()
        },
        categories = category_list(),
    );
    LlmRequest {
        system: Some(voice.system_prompt.clone()),
        prompt,
        format: ResponseFormat::Json,
        temperature,
    }
}

pub fn structural_edit(text: &str, source: &SourceItem) -> LlmRequest {
    let prompt = format!(
        "You are a structural editor at a satirical newspaper. Improve the flow, \
         pacing and context of the article below. Make sure a reader who missed \
         the real story ({title}) can follow it. Keep it between 300 and 600 words. \
         Do not change the author's voice or add new jokes.\n\
         Reply with the revised article only, wrapped in article tags like the input.\n\n\
         <article>\n{text}\n</article>",
        title = source.title,
    );
    LlmRequest {
        system: None,
        prompt,
        format: ResponseFormat::Text,
        temperature: EDIT_TEMPERATURE,
    }
}

pub fn humor_edit(text: &str, style: &StyleProfile) -> LlmRequest {
    let prompt = format!(
        "You are the humor editor. Sharpen comedic timing and punchlines in the \
         article below while staying true to this style:\n{style}\n\
         Cut jokes that fall flat rather than adding filler.\n\
         Reply with the revised article only, wrapped in article tags like the input.\n\n\
         <article>\n{text}\n</article>",
        style = style_block(style),
    );
    LlmRequest {
        system: None,
        prompt,
        format: ResponseFormat::Text,
        temperature: EDIT_TEMPERATURE,
    }
}

pub fn copy_edit(text: &str, style: &StyleProfile) -> LlmRequest {
    let prompt = format!(
        "You are the copy editor. Fix grammar, spelling and readability in the \
         article below. Do not alter jokes or tone ({name}).\n\
         Reply with the corrected article only, wrapped in article tags like the input.\n\n\
         <article>\n{text}\n</article>",
        name = style.name,
    );
    LlmRequest {
        system: None,
        prompt,
        format: ResponseFormat::Text,
        temperature: COPY_TEMPERATURE,
    }
}
