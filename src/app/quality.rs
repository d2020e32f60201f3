use std::collections::BTreeMap;

use tracing::{debug, info};

use super::error::ActionError;
use super::prompt::{Answer, Prompter};

/// Quality tag (e.g. `-1080p`) to playable source URL.
pub(crate) type QualityMap = BTreeMap<String, String>;

pub(crate) const DEFAULT_QUALITY_ORDER: [&str; 8] = [
    "-1080p BD",
    "-1080p",
    "-816p chi",
    "-720p",
    "-default",
    "-auto",
    "-480p",
    "-360p",
];

const LEARNED_TAG_SLOT: usize = 2;

pub(crate) fn default_quality_order() -> Vec<String> {
    DEFAULT_QUALITY_ORDER
        .iter()
        .map(|tag| (*tag).to_string())
        .collect()
}

/// Tags always carry a leading dash, as in `-1080p`.
pub(crate) fn normalize_tag(raw: &str) -> String {
    let tag = raw.trim();
    if tag.starts_with('-') {
        tag.to_string()
    } else {
        format!("-{tag}")
    }
}

pub(crate) fn select_auto<'a>(available: &'a QualityMap, order: &[String]) -> Option<&'a str> {
    order
        .iter()
        .find_map(|tag| available.get(tag))
        .map(String::as_str)
}

/// Moves a manually picked tag to the third slot. The first two entries are
/// the long-standing defaults and keep their place.
pub(crate) fn on_manual_pick(picked: &str, order: &[String]) -> Vec<String> {
    let mut next = order
        .iter()
        .filter(|tag| tag.as_str() != picked)
        .cloned()
        .collect::<Vec<_>>();
    let slot = LEARNED_TAG_SLOT.min(next.len());
    next.insert(slot, picked.to_string());
    next
}

/// Sorts tags for display, preferred tags first. Unknown tags follow, shorter
/// before longer, then alphabetically.
pub(crate) fn sort_best_first(tags: &[String], order: &[String]) -> Vec<String> {
    let rank = |tag: &str| {
        order
            .iter()
            .position(|known| known.eq_ignore_ascii_case(tag))
            .unwrap_or(order.len() + tag.len())
    };
    let mut sorted = tags.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted.sort_by(|left, right| rank(left).cmp(&rank(right)).then_with(|| left.cmp(right)));
    sorted
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PickMode {
    Single,
    Batch,
}

/// Quality decisions for the duration of one user action.
#[derive(Debug, Clone)]
pub(crate) struct QualitySession {
    order: Vec<String>,
    auto_quality: bool,
    mode: PickMode,
    batch_choice: Option<String>,
    learned: bool,
}

impl QualitySession {
    pub(crate) fn new(order: Vec<String>, auto_quality: bool, mode: PickMode) -> Self {
        Self {
            order,
            auto_quality,
            mode,
            batch_choice: None,
            learned: false,
        }
    }

    /// The updated order when a manual pick taught the policy something.
    pub(crate) fn learned_order(&self) -> Option<&[String]> {
        self.learned.then_some(self.order.as_slice())
    }

    pub(crate) fn choose(
        &mut self,
        available: &QualityMap,
        prompter: Option<&mut dyn Prompter>,
    ) -> Result<Answer<String>, ActionError> {
        if available.is_empty() {
            return Err(ActionError::Resolution(
                "no playable sources were returned".to_string(),
            ));
        }

        let try_auto = self.auto_quality || self.mode == PickMode::Batch;
        if try_auto && let Some(source) = select_auto(available, &self.order) {
            return Ok(Answer::Picked(source.to_string()));
        }

        if self.mode == PickMode::Batch
            && let Some(tag) = self.batch_choice.as_ref()
            && let Some(source) = available.get(tag)
        {
            debug!(tag = %tag, "reusing quality picked earlier in this batch");
            return Ok(Answer::Picked(source.clone()));
        }

        let Some(prompter) = prompter else {
            return Err(ActionError::MissingQuality {
                available: available.keys().cloned().collect(),
            });
        };

        let options = sort_best_first(&available.keys().cloned().collect::<Vec<_>>(), &self.order);
        let tag = match prompter.ask_quality("Which quality?", &options) {
            Answer::Picked(tag) => tag,
            Answer::Cancelled => return Ok(Answer::Cancelled),
        };
        let Some(source) = available.get(&tag) else {
            return Err(ActionError::MissingQuality {
                available: available.keys().cloned().collect(),
            });
        };

        if self.auto_quality {
            self.order = on_manual_pick(&tag, &self.order);
            self.learned = true;
            info!(tag = %tag, "learned quality preference");
        }
        if self.mode == PickMode::Batch {
            self.batch_choice = Some(tag);
        }
        Ok(Answer::Picked(source.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::prompt::ScriptedPrompter;

    fn order(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|tag| tag.to_string()).collect()
    }

    fn qualities(entries: &[(&str, &str)]) -> QualityMap {
        entries
            .iter()
            .map(|(tag, url)| (tag.to_string(), url.to_string()))
            .collect()
    }

    #[test]
    fn select_auto_returns_first_preferred_match() {
        let available = qualities(&[("-720p", "u1")]);
        assert_eq!(
            select_auto(&available, &order(&["-1080p", "-720p"])),
            Some("u1")
        );

        let available = qualities(&[("-720p", "u1"), ("-1080p", "u2")]);
        assert_eq!(
            select_auto(&available, &order(&["-1080p", "-720p"])),
            Some("u2")
        );
    }

    #[test]
    fn tags_are_normalized_with_a_dash() {
        assert_eq!(normalize_tag("1080p BD"), "-1080p BD");
        assert_eq!(normalize_tag(" -720p "), "-720p");
    }

    #[test]
    fn select_auto_without_overlap_is_none() {
        let available = qualities(&[("-360p", "u1")]);
        assert_eq!(select_auto(&available, &order(&["-1080p", "-720p"])), None);
    }

    #[test]
    fn manual_pick_lands_in_third_slot() {
        let before = order(&["a", "b", "c", "d", "e"]);
        assert_eq!(on_manual_pick("e", &before), order(&["a", "b", "e", "c", "d"]));
        assert_eq!(on_manual_pick("new", &before), order(&["a", "b", "new", "c", "d", "e"]));
    }

    #[test]
    fn manual_pick_of_a_front_tag_still_moves_it() {
        let before = order(&["a", "b", "c", "d"]);
        assert_eq!(on_manual_pick("a", &before), order(&["b", "c", "a", "d"]));
        assert_eq!(on_manual_pick("b", &before), order(&["a", "c", "b", "d"]));
    }

    #[test]
    fn manual_pick_on_short_order_appends() {
        assert_eq!(on_manual_pick("x", &order(&["a"])), order(&["a", "x"]));
        assert_eq!(on_manual_pick("x", &[]), order(&["x"]));
    }

    #[test]
    fn sort_best_first_puts_known_tags_first() {
        let tags = order(&["-zzz", "-720p", "-1080p", "-abcd"]);
        let sorted = sort_best_first(&tags, &default_quality_order());
        assert_eq!(sorted, order(&["-1080p", "-720p", "-zzz", "-abcd"]));
    }

    #[test]
    fn session_prompts_and_learns_on_a_miss() {
        let available = qualities(&[("-900p", "u9"), ("-360x", "u3")]);
        let mut prompter = ScriptedPrompter::new(vec![], vec![Answer::Picked("-900p".to_string())]);
        let mut session = QualitySession::new(order(&["a", "b", "c"]), true, PickMode::Single);

        let picked = session
            .choose(&available, Some(&mut prompter))
            .expect("choose should succeed");
        assert_eq!(picked, Answer::Picked("u9".to_string()));
        assert_eq!(
            session.learned_order(),
            Some(order(&["a", "b", "-900p", "c"]).as_slice())
        );
    }

    #[test]
    fn session_without_prompter_reports_missing_quality() {
        let available = qualities(&[("-900p", "u9")]);
        let mut session = QualitySession::new(order(&["-1080p"]), true, PickMode::Single);
        let err = session
            .choose(&available, None)
            .expect_err("no tag matches and nobody can be asked");
        assert!(matches!(err, ActionError::MissingQuality { .. }));
    }

    #[test]
    fn manual_mode_always_asks_and_does_not_learn() {
        let available = qualities(&[("-1080p", "u1"), ("-720p", "u2")]);
        let mut prompter = ScriptedPrompter::new(vec![], vec![Answer::Picked("-720p".to_string())]);
        let mut session = QualitySession::new(order(&["-1080p"]), false, PickMode::Single);

        let picked = session
            .choose(&available, Some(&mut prompter))
            .expect("choose should succeed");
        assert_eq!(picked, Answer::Picked("u2".to_string()));
        assert_eq!(session.learned_order(), None);
    }

    #[test]
    fn batch_reuses_the_first_manual_pick() {
        let available = qualities(&[("-900p", "u9")]);
        let mut prompter = ScriptedPrompter::new(vec![], vec![Answer::Picked("-900p".to_string())]);
        let mut session = QualitySession::new(order(&["-1080p"]), false, PickMode::Batch);

        for _ in 0..3 {
            let picked = session
                .choose(&available, Some(&mut prompter))
                .expect("choose should succeed");
            assert_eq!(picked, Answer::Picked("u9".to_string()));
        }
        assert_eq!(prompter.quality_prompts(), 1);
    }

    #[test]
    fn cancelled_quality_prompt_is_reported() {
        let available = qualities(&[("-900p", "u9")]);
        let mut prompter = ScriptedPrompter::new(vec![], vec![Answer::Cancelled]);
        let mut session = QualitySession::new(order(&["-1080p"]), true, PickMode::Single);
        let picked = session
            .choose(&available, Some(&mut prompter))
            .expect("cancel is not an error");
        assert_eq!(picked, Answer::Cancelled);
        assert_eq!(session.learned_order(), None);
    }
}
