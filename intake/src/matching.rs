use chrono::NaiveDate;
use strsim::normalized_levenshtein;

use crate::clients::practice::ProviderPractice;
use crate::record::MatchedPractice;

/// Picks the practice registration whose name is closest to the organization
/// name the sender declared.
///
/// Only registrations that are active, whose validity window contains `today`
/// and that carry a name take part. Similarity is normalized edit distance
/// over the raw names, `(max_len - distance) / max_len`, and the highest
/// score wins; on a tie the earliest candidate in directory order is kept.
/// An empty field after filtering is a valid answer, not an error.
pub fn best_match(
    candidates: &[ProviderPractice],
    org_name: &str,
    today: NaiveDate,
) -> Option<MatchedPractice> {
    let mut best: Option<(f64, &ProviderPractice)> = None;
    for candidate in candidates
        .iter()
        .filter(|candidate| is_eligible(candidate, today))
    {
        let score = normalized_levenshtein(org_name, &candidate.name);
        match best {
            Some((top, _)) if score <= top => {}
            _ => best = Some((score, candidate)),
        }
    }
    best.map(|(_, practice)| MatchedPractice {
        practice_id: practice.practice_id.clone(),
        name: practice.name.clone(),
    })
}

fn is_eligible(candidate: &ProviderPractice, today: NaiveDate) -> bool {
    if !candidate.active || candidate.name.is_empty() {
        return false;
    }
    if candidate.valid_from.is_some_and(|from| from > today) {
        return false;
    }
    if candidate.valid_to.is_some_and(|to| to < today) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 21).unwrap()
    }

    fn practice(id: &str, name: &str) -> ProviderPractice {
        ProviderPractice {
            practice_id: id.to_owned(),
            name: name.to_owned(),
            active: true,
            valid_from: None,
            valid_to: None,
        }
    }

    #[test]
    fn exact_match_beats_a_close_one() {
        // "Acme Klinik" is distance 2 from the target, similarity 9/11
        let candidates = vec![
            practice("pr-1", "Acme Klinik"),
            practice("pr-2", "Acme Clinic"),
        ];

        let matched = best_match(&candidates, "Acme Clinic", today()).unwrap();
        assert_eq!(matched.practice_id, "pr-2");
        assert_eq!(matched.name, "Acme Clinic");
    }

    #[test]
    fn matching_is_case_sensitive() {
        let candidates = vec![
            practice("pr-1", "ACME CLINIC"),
            practice("pr-2", "Acme Clinic"),
        ];

        let matched = best_match(&candidates, "Acme Clinic", today()).unwrap();
        assert_eq!(matched.practice_id, "pr-2");
    }

    #[test]
    fn ties_keep_the_first_candidate() {
        let candidates = vec![
            practice("pr-1", "Acme Clinic"),
            practice("pr-2", "Acme Clinic"),
        ];

        let matched = best_match(&candidates, "Acme Clinic", today()).unwrap();
        assert_eq!(matched.practice_id, "pr-1");
    }

    #[test]
    fn inactive_and_unnamed_candidates_are_excluded() {
        let mut inactive = practice("pr-1", "Acme Clinic");
        inactive.active = false;
        let unnamed = practice("pr-2", "");

        assert_eq!(best_match(&[inactive, unnamed], "Acme Clinic", today()), None);
    }

    #[test]
    fn validity_window_must_contain_today() {
        let mut not_yet = practice("pr-1", "Acme Clinic");
        not_yet.valid_from = Some(NaiveDate::from_ymd_opt(2026, 9, 1).unwrap());
        let mut lapsed = practice("pr-2", "Acme Clinic");
        lapsed.valid_to = Some(NaiveDate::from_ymd_opt(2026, 8, 1).unwrap());
        let mut open = practice("pr-3", "Acme Clinic");
        open.valid_from = Some(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());

        let matched = best_match(&[not_yet, lapsed, open], "Acme Clinic", today()).unwrap();
        assert_eq!(matched.practice_id, "pr-3");
    }

    #[test]
    fn empty_candidate_set_yields_none() {
        assert_eq!(best_match(&[], "Acme Clinic", today()), None);
    }
}
