/*!
 * Matching cascade, normalization and similarity property tests.
 */

use transbatch::app_config::MatchingConfig;
use transbatch::glossary::normalize::normalize;
use transbatch::glossary::similarity::{combined, jaccard, similarity};
use transbatch::glossary::{CandidateReason, DictionaryTerm, MatchType, TermMatcher};

fn dictionary(entries: &[(&str, &str)]) -> Vec<DictionaryTerm> {
    entries
        .iter()
        .map(|(s, t)| DictionaryTerm::new(*s, *t))
        .collect()
}

#[test]
fn test_normalize_shouldBeIdempotentOverVariedInputs() {
    let inputs = [
        "Ｇｏｏｇｌｅ",
        "  spaced   out  ",
        "データ〜ベース",
        "MIXED Ｃａｓｅ ｔｅｘｔ",
        "記号！＠＃を含む",
        "",
    ];
    for input in inputs {
        let once = normalize(input);
        assert_eq!(normalize(&once), once, "not idempotent for {:?}", input);
    }
}

#[test]
fn test_normalize_fullWidthGoogle_shouldFoldToAscii() {
    assert_eq!(normalize("Ｇｏｏｇｌｅ"), "google");
}

#[test]
fn test_similarity_selfSimilarity_shouldBeOne() {
    for input in ["a", "hello", "サーバー", ""] {
        assert!((similarity(input, input) - 1.0).abs() < f32::EPSILON);
        assert!((jaccard(input, input) - 1.0).abs() < f32::EPSILON);
    }
}

#[test]
fn test_jaccard_disjointSets_shouldBeZero() {
    assert_eq!(jaccard("abc", "xyz"), 0.0);
}

#[test]
fn test_combined_shouldStayWithinUnitInterval() {
    let pairs = [("abc", "abd"), ("", "x"), ("サーバ", "サーバー"), ("a", "a")];
    for (a, b) in pairs {
        let score = combined(a, b);
        assert!((0.0..=1.0).contains(&score), "{} vs {} -> {}", a, b, score);
    }
}

#[test]
fn test_matchTerms_googleDriveScenario_shouldSplitBuckets() {
    let matcher = TermMatcher::with_defaults();
    let dict = dictionary(&[("Google Drive", "グーグルドライブ")]);
    let terms = vec!["Google Drive".to_string(), "Unrelated123".to_string()];

    let result = matcher.match_terms(&terms, &dict);

    assert_eq!(result.confirmed_pairs.len(), 1);
    assert_eq!(result.confirmed_pairs[0].match_type, MatchType::Exact);
    assert_eq!(result.confirmed_pairs[0].source, "Google Drive");
    assert_eq!(result.new_candidates.len(), 1);
    assert_eq!(result.new_candidates[0].source, "Unrelated123");
    assert_eq!(result.new_candidates[0].reason, CandidateReason::NewTerm);
}

#[test]
fn test_matchTerms_eachInputTermAppearsExactlyOnce() {
    let matcher = TermMatcher::new(MatchingConfig {
        partial_min_length: 3,
        fuzzy_threshold: 0.7,
    });
    let dict = dictionary(&[
        ("Google Drive", "グーグルドライブ"),
        ("spreadsheet", "スプレッドシート"),
        ("サーバー", "server"),
    ]);
    let terms = vec![
        "Google Drive".to_string(),
        "google drive".to_string(),
        "spreadshet".to_string(),
        "サーバ".to_string(),
        "まったく別の言葉".to_string(),
        "Google Drive".to_string(), // duplicate input
    ];

    let result = matcher.match_terms(&terms, &dict);

    let confirmed: Vec<&str> = result
        .confirmed_pairs
        .iter()
        .map(|p| p.source.as_str())
        .collect();
    let candidates: Vec<&str> = result
        .new_candidates
        .iter()
        .map(|c| c.source.as_str())
        .collect();

    // 5 distinct inputs, each in exactly one bucket
    assert_eq!(confirmed.len() + candidates.len(), 5);
    for term in ["Google Drive", "google drive", "spreadshet", "サーバ", "まったく別の言葉"] {
        let in_confirmed = confirmed.contains(&term);
        let in_candidates = candidates.contains(&term);
        assert!(in_confirmed ^ in_candidates, "term {:?} misplaced", term);
    }
}

#[test]
fn test_matchTerms_cascadePrecedence_exactBeforeNormalizedBeforePartial() {
    let matcher = TermMatcher::with_defaults();
    let dict = dictionary(&[
        ("Term", "exact-target"),
        ("ｔｅｒｍ", "normalized-target"),
        ("Term Container", "partial-target"),
    ]);

    // Raw equality wins over everything else
    let result = matcher.match_terms(&["Term".to_string()], &dict);
    assert_eq!(result.confirmed_pairs[0].target, "exact-target");

    // No raw match: canonical equality comes next ("term" normalizes to the
    // first dictionary entry sharing that form, which is "Term" itself)
    let result = matcher.match_terms(&["term".to_string()], &dict);
    assert_eq!(result.confirmed_pairs[0].match_type, MatchType::Normalized);
    assert_eq!(result.confirmed_pairs[0].target, "exact-target");
}

#[test]
fn test_matchTerms_fuzzyScores_shouldBeSortedDescending() {
    let matcher = TermMatcher::new(MatchingConfig {
        partial_min_length: 3,
        fuzzy_threshold: 0.5,
    });
    let dict = dictionary(&[("translation", "翻訳")]);
    let terms = vec![
        "tronslation".to_string(),
        "translatiom".to_string(),
        "trxnslxtion".to_string(),
    ];

    let result = matcher.match_terms(&terms, &dict);

    let scores: Vec<f32> = result
        .new_candidates
        .iter()
        .filter_map(|c| c.similarity)
        .collect();
    assert!(scores.len() >= 2);
    for window in scores.windows(2) {
        assert!(window[0] >= window[1]);
    }
}
