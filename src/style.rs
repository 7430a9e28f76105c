// src/style.rs
//! Style catalog and the content-blind style selector.

use std::fs;
use std::path::Path;

use rand::Rng;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{SourceItem, StyleProfile};

pub const DEFAULT_STYLES_PATH: &str = "config/styles.toml";
pub const DEFAULT_SPECIAL_PROBABILITY: f64 = 0.10;

#[derive(Debug, Deserialize)]
struct StylesFile {
    styles: Vec<StyleProfile>,
}

/// Immutable after load; exactly one profile is the default.
#[derive(Debug, Clone)]
pub struct StyleCatalog {
    profiles: Vec<StyleProfile>,
    default_idx: usize,
}

impl StyleCatalog {
    pub fn new(profiles: Vec<StyleProfile>) -> Result<Self> {
        let defaults: Vec<usize> = profiles
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_default)
            .map(|(i, _)| i)
            .collect();
        if defaults.len() != 1 {
            return Err(Error::Config(format!(
                "style catalog needs exactly one default profile, found {}",
                defaults.len()
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for p in &profiles {
            if !seen.insert(p.style_key.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate style key `{}`",
                    p.style_key
                )));
            }
        }
        Ok(Self {
            default_idx: defaults[0],
            profiles,
        })
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: StylesFile =
            toml::from_str(s).map_err(|e| Error::Config(format!("styles toml: {e}")))?;
        Self::new(file.styles)
    }

    /// Load from `path`, or the built-in catalog when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(s) => {
                let cat = Self::from_toml_str(&s)?;
                info!(path = %path.display(), styles = cat.len(), "style catalog loaded");
                Ok(cat)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no style catalog file, using built-in styles");
                Ok(Self::builtin())
            }
            Err(e) => Err(Error::Config(format!(
                "reading styles from {}: {e}",
                path.display()
            ))),
        }
    }

    pub fn builtin() -> Self {
        let p = |key: &str, name: &str, desc: &str, guide: &str, approach: &str, default: bool| {
            StyleProfile {
                style_key: key.into(),
                name: name.into(),
                description: desc.into(),
                voice_guidelines: guide.into(),
                comedic_approach: approach.into(),
                example_headline: None,
                example_paragraph: None,
                is_default: default,
            }
        };
        let profiles = vec![
            p(
                "deadpan_wire",
                "Deadpan Wire",
                "Straight-faced wire-service reporting of absurd developments.",
                "Neutral AP register, short declarative sentences, attributed quotes.",
                "Play the absurdity completely straight; let the facts be the joke.",
                true,
            ),
            p(
                "breathless_press_release",
                "Breathless Press Release",
                "Corporate announcement voice drunk on its own synergy.",
                "Buzzwords, superlatives, forward-looking statements.",
                "Escalating corporate euphemism for mundane or grim events.",
                false,
            ),
            p(
                "local_desk_panic",
                "Local Desk Panic",
                "Small-town paper treating national news as a neighborhood crisis.",
                "Folksy, hyper-local framing, quotes from named residents.",
                "Scale mismatch between the event and the town's reaction.",
                false,
            ),
            p(
                "overeager_academic",
                "Overeager Academic",
                "A researcher who has a framework for everything.",
                "Hedged claims, footnote energy, invented studies.",
                "Over-theorizing the obvious with mounting confidence.",
                false,
            ),
        ];
        // The literal above has exactly one default and unique keys.
        Self {
            profiles,
            default_idx: 0,
        }
    }

    pub fn default_profile(&self) -> &StyleProfile {
        &self.profiles[self.default_idx]
    }

    pub fn default_key(&self) -> &str {
        &self.default_profile().style_key
    }

    pub fn get(&self, style_key: &str) -> Option<&StyleProfile> {
        self.profiles.iter().find(|p| p.style_key == style_key)
    }

    /// Looks up `style_key`, falling back to the default profile.
    pub fn get_or_default(&self, style_key: &str) -> &StyleProfile {
        self.get(style_key).unwrap_or_else(|| self.default_profile())
    }

    pub fn profiles(&self) -> &[StyleProfile] {
        &self.profiles
    }

    pub fn specials(&self) -> impl Iterator<Item = &StyleProfile> {
        self.profiles.iter().filter(|p| !p.is_default)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// With probability `special_probability`, a uniformly random non-default
    /// style; otherwise the default. Does not look at the item's content.
    pub fn select_style<R: Rng + ?Sized>(
        &self,
        source: &SourceItem,
        special_probability: f64,
        rng: &mut R,
    ) -> &str {
        let p = if special_probability.is_finite() {
            special_probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let specials: Vec<&StyleProfile> = self.specials().collect();
        if specials.is_empty() || !rng.random_bool(p) {
            return self.default_key();
        }
        let pick = specials[rng.random_range(0..specials.len())];
        debug!(target: "style", source = %source.id, style = %pick.style_key, "special style selected");
        &pick.style_key
    }
}
