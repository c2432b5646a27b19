mod engine;
pub mod rules;

pub use engine::{CorrectiveAction, Detection, HeuristicEngine};

pub fn active_rule_ids() -> &'static [&'static str] {
  rules::ACTIVE_RULE_IDS
}
