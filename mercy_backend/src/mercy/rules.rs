use serde::{Deserialize, Serialize};

pub const PRIMAL: &str = "primal";
pub const PRIMAL_LEGENDARY: &str = "primal_legendary";
pub const PRIMAL_MYTHICAL: &str = "primal_mythical";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Legendary,
    Mythical,
}

impl Rarity {
    pub fn as_str(self) -> &'static str {
        match self {
            Rarity::Legendary => "legendary",
            Rarity::Mythical => "mythical",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Rarity::Legendary => "Legendary",
            Rarity::Mythical => "Mythical",
        }
    }
}

/// Mercy kicks in once a counter reaches `start`; every pull beyond that
/// adds `rate` percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MercyRule {
    pub start: u64,
    pub rate: u64,
}

impl MercyRule {
    pub const fn new(start: u64, rate: u64) -> Self {
        Self { start, rate }
    }

    pub fn is_active(&self, count: u64) -> bool {
        count >= self.start
    }

    pub fn remaining(&self, count: u64) -> u64 {
        self.start.saturating_sub(count)
    }

    pub fn bonus(&self, count: u64) -> u64 {
        compute_mercy_bonus(count, self.start, self.rate)
    }

    /// Display-only fraction in 0..=1. A zero threshold counts as complete.
    pub fn progress(&self, count: u64) -> f64 {
        if self.start == 0 {
            return 1.0;
        }
        (count as f64 / self.start as f64).min(1.0)
    }
}

/// Bonus percentage: zero below the threshold, `(count - start) * rate` at or above it.
/// Unbounded above; saturates instead of wrapping.
pub fn compute_mercy_bonus(count: u64, start: u64, rate: u64) -> u64 {
    if count < start {
        return 0;
    }
    (count - start).saturating_mul(rate)
}

#[derive(Debug)]
pub struct ShardRules {
    pub shard: &'static str,
    pub tiers: &'static [(Rarity, MercyRule)],
}

pub const MERCY_RULES: &[ShardRules] = &[
    ShardRules {
        shard: "ancient",
        tiers: &[(Rarity::Legendary, MercyRule::new(200, 5))],
    },
    ShardRules {
        shard: "void",
        tiers: &[(Rarity::Legendary, MercyRule::new(200, 5))],
    },
    ShardRules {
        shard: "sacred",
        tiers: &[(Rarity::Legendary, MercyRule::new(12, 2))],
    },
    ShardRules {
        shard: PRIMAL,
        tiers: &[
            (Rarity::Legendary, MercyRule::new(75, 1)),
            (Rarity::Mythical, MercyRule::new(200, 10)),
        ],
    },
    ShardRules {
        shard: "remnant",
        tiers: &[(Rarity::Mythical, MercyRule::new(24, 1))],
    },
];

pub fn shard_rules(shard: &str) -> Option<&'static ShardRules> {
    MERCY_RULES.iter().find(|rules| rules.shard == shard)
}

/// The tiers a counter key drives. Primal sub-counters each drive one tier
/// of the primal table; untracked keys drive nothing.
pub fn rules_for(category: &str) -> &'static [(Rarity, MercyRule)] {
    match category {
        PRIMAL_LEGENDARY => single_tier(PRIMAL, Rarity::Legendary),
        PRIMAL_MYTHICAL => single_tier(PRIMAL, Rarity::Mythical),
        other => shard_rules(other).map(|rules| rules.tiers).unwrap_or(&[]),
    }
}

fn single_tier(shard: &str, rarity: Rarity) -> &'static [(Rarity, MercyRule)] {
    shard_rules(shard)
        .and_then(|rules| {
            rules
                .tiers
                .iter()
                .position(|(r, _)| *r == rarity)
                .map(|i| &rules.tiers[i..=i])
        })
        .unwrap_or(&[])
}
