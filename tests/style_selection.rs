// tests/style_selection.rs
mod common;

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use satire_desk::style::StyleCatalog;

#[test]
fn special_rate_tracks_probability() {
    let cat = StyleCatalog::load(std::path::Path::new("config/styles.toml")).unwrap();
    let item = common::source("n1", "Council votes on council");
    let mut rng = StdRng::seed_from_u64(2024);

    let draws = 10_000;
    let mut counts: HashMap<String, usize> = HashMap::new();
    for _ in 0..draws {
        *counts
            .entry(cat.select_style(&item, 0.10, &mut rng).to_string())
            .or_default() += 1;
    }

    let specials = draws - counts[cat.default_key()];
    let rate = specials as f64 / draws as f64;
    assert!((0.08..=0.12).contains(&rate), "special rate {rate}");

    // every non-default style shows up
    for p in cat.specials() {
        assert!(counts.get(&p.style_key).copied().unwrap_or(0) > 0, "{} never drawn", p.style_key);
    }
}

#[test]
fn catalog_file_matches_builtin_default() {
    let file = StyleCatalog::load(std::path::Path::new("config/styles.toml")).unwrap();
    assert_eq!(file.default_key(), StyleCatalog::builtin().default_key());
    assert_eq!(file.len(), 4);
}

#[test]
fn missing_file_uses_builtin() {
    let dir = tempfile::tempdir().unwrap();
    let cat = StyleCatalog::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cat.len(), StyleCatalog::builtin().len());
}

#[test]
fn bad_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("styles.toml");
    std::fs::write(&path, "[[styles]]\nstyle_key = \"x\"\n").unwrap();
    assert!(matches!(
        StyleCatalog::load(&path),
        Err(satire_desk::Error::Config(_))
    ));
}
