// src/seed.rs
//! Startup seeding of writer voices and style profiles. Both use idempotent
//! create, so reseeding on every boot is harmless; voices already stored get
//! their mutable fields refreshed from the file.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::{StyleProfile, Voice};
use crate::store::Repository;
use crate::style::StyleCatalog;

pub const DEFAULT_VOICES_PATH: &str = "config/voices.toml";

#[derive(Debug, Deserialize)]
struct VoicesFile {
    voices: Vec<Voice>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

pub fn voices_from_toml_str(s: &str) -> Result<Vec<Voice>> {
    let file: VoicesFile =
        toml::from_str(s).map_err(|e| Error::Config(format!("voices toml: {e}")))?;
    for v in &file.voices {
        if v.key.trim().is_empty() {
            return Err(Error::Config(format!(
                "voice `{}` has an empty key",
                v.display_name
            )));
        }
    }
    Ok(file.voices)
}

/// Load voices from `path`; a missing file yields the single house voice.
pub fn load_voices(path: &Path) -> Result<Vec<Voice>> {
    match fs::read_to_string(path) {
        Ok(s) => voices_from_toml_str(&s),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "no voices file, seeding the house voice only");
            Ok(vec![house_voice()])
        }
        Err(e) => Err(Error::Config(format!(
            "reading voices from {}: {e}",
            path.display()
        ))),
    }
}

pub fn house_voice() -> Voice {
    let now = chrono::Utc::now();
    Voice {
        key: "staff_writer".into(),
        display_name: "Staff Writer".into(),
        bio: "Has covered every beat at least once, mostly by accident.".into(),
        system_prompt: "You are a veteran satirical news writer. You never break character, \
                        never wink at the reader, and never punch down."
            .into(),
        profile_image_ref: String::new(),
        created_at: now,
        updated_at: now,
    }
}

pub fn seed_voices(repo: &Repository<Voice>, voices: Vec<Voice>) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    for mut v in voices {
        if repo.create(&mut v)? {
            report.created += 1;
        } else if repo.update(&v)? {
            report.updated += 1;
        } else {
            report.unchanged += 1;
        }
    }
    info!(
        created = report.created,
        updated = report.updated,
        unchanged = report.unchanged,
        "voices seeded"
    );
    Ok(report)
}

/// Mirror the catalog into storage. Stored styles are never overwritten.
pub fn seed_styles(repo: &Repository<StyleProfile>, catalog: &StyleCatalog) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    for p in catalog.profiles() {
        let mut p = p.clone();
        if repo.create(&mut p)? {
            report.created += 1;
        } else {
            report.unchanged += 1;
        }
    }
    info!(created = report.created, existing = report.unchanged, "styles mirrored");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryAdapter;

    const VOICES: &str = r#"
[[voices]]
key = "margaret"
display_name = "Margaret Thistlewood"
bio = "Forty years on the county beat."
system_prompt = "You write like a tired county reporter."

[[voices]]
key = "dex"
display_name = "Dex Ferro"
bio = "Tech columnist."
system_prompt = "You are a breathless tech columnist."
profile_image_ref = "images/dex.webp"
"#;

    #[test]
    fn parses_voices_with_defaults() {
        let v = voices_from_toml_str(VOICES).unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].profile_image_ref, "");
        assert_eq!(v[1].profile_image_ref, "images/dex.webp");
    }

    #[test]
    fn empty_key_rejected() {
        let bad = "[[voices]]\nkey = \" \"\ndisplay_name = \"x\"\nbio = \"\"\nsystem_prompt = \"\"\n";
        assert!(matches!(voices_from_toml_str(bad), Err(Error::Config(_))));
    }

    #[test]
    fn reseeding_is_idempotent_and_refreshes() {
        let repo: Repository<Voice> = Repository::new(MemoryAdapter::new());
        let first = seed_voices(&repo, voices_from_toml_str(VOICES).unwrap()).unwrap();
        assert_eq!(first.created, 2);

        let mut again = voices_from_toml_str(VOICES).unwrap();
        again[0].bio = "Forty-one years on the county beat.".into();
        let second = seed_voices(&repo, again).unwrap();
        assert_eq!(second, SeedReport { created: 0, updated: 1, unchanged: 1 });
        assert_eq!(repo.read_all().unwrap().len(), 2);
        assert_eq!(
            repo.read_by_key("margaret").unwrap().unwrap().bio,
            "Forty-one years on the county beat."
        );
    }

    #[test]
    fn styles_mirror_once() {
        let repo: Repository<StyleProfile> = Repository::new(MemoryAdapter::new());
        let cat = StyleCatalog::builtin();
        assert_eq!(seed_styles(&repo, &cat).unwrap().created, cat.len());
        assert_eq!(seed_styles(&repo, &cat).unwrap().created, 0);
    }
}
