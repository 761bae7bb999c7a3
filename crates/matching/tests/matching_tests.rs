use audioshelf_matching::*;
use std::time::{Duration, Instant};

#[test]
fn test_identical_pairs_are_never_suspicious() {
    let pairs = [
        ("Project Hail Mary", Some("Andy Weir")),
        ("The Way of Kings", Some("Brandon Sanderson")),
        ("1984", Some("George Orwell")),
        ("Les Misérables", None),
    ];
    for (title, author) in pairs {
        for threshold in [0.0, DEFAULT_SIMILARITY_THRESHOLD, 1.0] {
            assert!(
                !is_suspicious_change(title, title, author, author, threshold),
                "{} flagged at {}",
                title,
                threshold
            );
        }
    }
}

#[test]
fn test_zero_token_overlap_is_always_suspicious() {
    let pairs = [
        ("Dune", "Emma"),
        ("The Martian", "Pride and Prejudice"),
        ("Foundation", "Neuromancer"),
    ];
    for (old, new) in pairs {
        assert!(is_suspicious_change(
            old,
            new,
            Some("Same Author"),
            Some("Same Author"),
            DEFAULT_SIMILARITY_THRESHOLD
        ));
    }
}

#[test]
fn test_scores_stay_in_unit_interval() {
    let samples = ["", "a", "dune", "dune messiah", "the hobbit or there and back again"];
    for a in samples {
        for b in samples {
            let scores = compare(a, b);
            for value in [scores.ratio, scores.partial, scores.token_set] {
                assert!((0.0..=1.0).contains(&value), "{} vs {} -> {}", a, b, value);
            }
            assert!((0.0..=1.0).contains(&scores.blended(Blend::BALANCED)));
        }
    }
}

#[test]
fn test_duplicates_are_deterministic() {
    let entries: Vec<(String, Option<String>)> = (0..200)
        .map(|i| (format!("Series Book {}", i % 50), Some("Author".to_string())))
        .collect();
    let first = find_duplicates(&entries, DEFAULT_DUPLICATE_THRESHOLD);
    let second = find_duplicates(&entries, DEFAULT_DUPLICATE_THRESHOLD);
    assert_eq!(first, second);
    for group in &first {
        let mut sorted = group.members.clone();
        sorted.sort_unstable();
        assert_eq!(group.members, sorted);
        assert!(group.scores.iter().all(|s| s.score >= DEFAULT_DUPLICATE_THRESHOLD));
    }
}

const LEADS: [&str; 20] = [
    "shadow", "empire", "winter", "silent", "broken", "golden", "hidden", "last", "night",
    "crimson", "iron", "lost", "dark", "burning", "frozen", "wild", "ancient", "hollow",
    "fallen", "secret",
];

const WORDS: [&str; 30] = [
    "harbor", "lantern", "quartz", "meadow", "jukebox", "violin", "pyramid", "walrus",
    "cobweb", "zephyr", "blizzard", "kingdom", "orchard", "sphinx", "tundra", "galaxy",
    "monsoon", "vortex", "bramble", "yacht", "foxglove", "equinox", "plywood", "umbrella",
    "dynamo", "nutmeg", "haiku", "xylophone", "citadel", "wigwam",
];

const AUTHORS: [&str; 5] = [
    "Ursula Vance",
    "Marcus Oyelaran",
    "Ingrid Halvorsen",
    "Tomas Quill",
    "Priya Castellan",
];

#[test]
fn test_duplicates_at_library_scale() {
    let mut entries: Vec<(String, Option<String>)> = Vec::new();
    let mut twins = Vec::new();
    for i in 0..4000 {
        let title = format!(
            "{} {} {}",
            LEADS[i % LEADS.len()],
            WORDS[(i / LEADS.len()) % WORDS.len()],
            WORDS[(i / (LEADS.len() * WORDS.len())) % WORDS.len()]
        );
        let author = Some(AUTHORS[i % AUTHORS.len()].to_string());
        if i % 97 == 0 {
            twins.push((entries.len(), entries.len() + 1));
            entries.push((title.clone(), author.clone()));
            entries.push((format!("{} (Unabridged) [MP3]", title.to_uppercase()), author));
        } else {
            entries.push((title, author));
        }
    }

    let started = Instant::now();
    let groups = find_duplicates(&entries, DEFAULT_DUPLICATE_THRESHOLD);
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(10), "took {:?}", elapsed);
    for (original, twin) in twins {
        assert!(
            groups
                .iter()
                .any(|g| g.members.contains(&original) && g.members.contains(&twin)),
            "{:?} and {:?} not grouped",
            entries[original],
            entries[twin]
        );
    }
    assert!(groups
        .iter()
        .flat_map(|g| &g.scores)
        .all(|s| s.score >= DEFAULT_DUPLICATE_THRESHOLD));
}
