use retrieval_core::normalizer::{Language, Normalizer, NormalizerConfig, TextNormalizer};

#[test]
fn it_normalizes_and_stems() {
    let words = TextNormalizer::default().normalize("Running Runners RUN! The café's menu.");
    // Stemming to "run" should appear
    assert!(words.contains(&"run".to_string()));
    // Accent stripping: café -> cafe
    assert!(words.contains(&"cafe".to_string()));
}

#[test]
fn it_filters_stopwords() {
    let words = TextNormalizer::default().normalize("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
}

#[test]
fn spanish_pipeline_uses_spanish_resources() {
    let cfg = NormalizerConfig { language: Language::Spanish, ..NormalizerConfig::default() };
    let words = TextNormalizer::new(cfg).normalize("La protección de los bosques y las leyes");
    assert!(!words.iter().any(|w| w == "la" || w == "de" || w == "los" || w == "y"));
    assert!(words.iter().any(|w| w.starts_with("protecc")));
    assert!(words.iter().any(|w| w.starts_with("bosqu")));
}

#[test]
fn alphabetic_only_splits_on_digits() {
    let cfg = NormalizerConfig { alphabetic_only: true, ..NormalizerConfig::lowercase_only() };
    assert_eq!(TextNormalizer::new(cfg).normalize("covid19 act"), vec!["covid", "act"]);
}

#[test]
fn normalization_is_deterministic() {
    let n = TextNormalizer::default();
    let text = "Forests, rivers and wetlands are protected under the 2015 accord.";
    assert_eq!(n.normalize(text), n.normalize(text));
}

#[test]
fn config_round_trips_through_json() {
    let cfg = NormalizerConfig { language: Language::Spanish, stem: false, ..NormalizerConfig::default() };
    let json = serde_json::to_string(&cfg).unwrap();
    assert!(json.contains(r#""language":"spanish""#));
    let back: NormalizerConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cfg);
}
