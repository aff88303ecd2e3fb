use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::rules::{rules_for, MercyRule, Rarity, MERCY_RULES, PRIMAL, PRIMAL_LEGENDARY, PRIMAL_MYTHICAL};
use super::UserRecord;
use crate::format::{
    calculate_percentage, category_label, format_number_with_commas, format_progress_bar,
    shard_emoji, BarStyle,
};

pub const NO_DATA_MESSAGE: &str = "No mercy data tracked yet. Use /open to start tracking!";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierStatus {
    pub active: bool,
    pub remaining: u64,
    pub progress_percent: f64,
    pub chance_increase: u64,
}

impl TierStatus {
    fn evaluate(rule: &MercyRule, count: u64) -> Self {
        let active = rule.is_active(count);
        Self {
            active,
            remaining: rule.remaining(count),
            progress_percent: if active {
                100.0
            } else {
                calculate_percentage(count, rule.start)
            },
            chance_increase: rule.bonus(count),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStatus {
    pub count: u64,
    pub mercy_status: BTreeMap<Rarity, TierStatus>,
}

/// Multi-line report of every tracked counter with data.
///
/// Sections follow the rule table order. The two primal sub-counters share
/// one "Primal Shards" section headed by the larger of the two counts.
/// Counters outside `tracked` are skipped even when stored.
pub fn render_status(record: &UserRecord, style: &BarStyle, tracked: &[String]) -> String {
    let count_of = |category: &str| {
        if is_tracked(tracked, category) {
            record.get(category)
        } else {
            0
        }
    };
    let mut sections: Vec<String> = Vec::new();

    for shard in MERCY_RULES {
        if shard.shard == PRIMAL {
            let legendary = count_of(PRIMAL_LEGENDARY);
            let mythical = count_of(PRIMAL_MYTHICAL);
            if legendary > 0 || mythical > 0 {
                let mut lines = vec![section_header(PRIMAL, legendary.max(mythical))];
                for (rarity, rule) in shard.tiers {
                    let (key, count) = match rarity {
                        Rarity::Legendary => (PRIMAL_LEGENDARY, legendary),
                        Rarity::Mythical => (PRIMAL_MYTHICAL, mythical),
                    };
                    if is_tracked(tracked, key) {
                        lines.push(tier_line(*rarity, rule, count, style));
                    }
                }
                sections.push(lines.join("\n"));
            }
        }

        // A plain "primal" counter drives both primal tiers with one count.
        let count = count_of(shard.shard);
        if count == 0 {
            continue;
        }
        let mut lines = vec![section_header(shard.shard, count)];
        for (rarity, rule) in shard.tiers {
            lines.push(tier_line(*rarity, rule, count, style));
        }
        sections.push(lines.join("\n"));
    }

    if sections.is_empty() {
        return NO_DATA_MESSAGE.to_string();
    }
    sections.join("\n\n")
}

fn is_tracked(tracked: &[String], category: &str) -> bool {
    tracked.iter().any(|c| c == category)
}

fn section_header(shard: &str, count: u64) -> String {
    format!(
        "{} Shards ({} total)",
        category_label(shard),
        format_number_with_commas(count)
    )
}

fn tier_line(rarity: Rarity, rule: &MercyRule, count: u64, style: &BarStyle) -> String {
    if rule.is_active(count) {
        format!(
            "└ {}: MERCY ACTIVE (+{}% chance)",
            rarity.label(),
            rule.bonus(count)
        )
    } else {
        format!(
            "└ {}: {} to mercy {} ({}/{})",
            rarity.label(),
            rule.remaining(count),
            format_progress_bar(rule.progress(count), style),
            count,
            rule.start
        )
    }
}

/// The static rule table as text. Independent of any user state.
pub fn render_rules_info() -> String {
    MERCY_RULES
        .iter()
        .map(|shard| {
            let mut lines = vec![format!("{} Shards:", category_label(shard.shard))];
            for (rarity, rule) in shard.tiers {
                lines.push(format!(
                    "└ {}: Mercy at {} summons (+{}% per summon after)",
                    rarity.label(),
                    rule.start,
                    rule.rate
                ));
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Structured counterpart of [`render_status`], keyed by counter name.
pub fn detailed_status(record: &UserRecord, tracked: &[String]) -> BTreeMap<String, CategoryStatus> {
    record
        .iter()
        .filter(|(category, count)| *count > 0 && is_tracked(tracked, category))
        .filter_map(|(category, count)| {
            let tiers = rules_for(category);
            if tiers.is_empty() {
                return None;
            }
            let mercy_status = tiers
                .iter()
                .map(|(rarity, rule)| (*rarity, TierStatus::evaluate(rule, count)))
                .collect();
            Some((
                category.to_string(),
                CategoryStatus {
                    count,
                    mercy_status,
                },
            ))
        })
        .collect()
}

/// One `"<emoji> <Label>: <count>"` line per stored counter.
pub fn summarize_record(record: &UserRecord) -> Vec<String> {
    record
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(category, count)| {
            format!("{} {}: {}", shard_emoji(category), category_label(category), count)
        })
        .collect()
}
