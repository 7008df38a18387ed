//! The screening rule table.
//!
//! Checks run in table order and every check runs. Within a check the first
//! matching rule wins, so bands and mutually exclusive variants are expressed
//! as consecutive rules of one check. New checks are added by extending
//! [`CHECKS`].

use aml_sdk::objects::{RiskFlag, Transaction};
use rust_decimal::Decimal;
use smallvec::SmallVec;

pub const MEDIUM_AMOUNT: Decimal = Decimal::from_parts(500_000, 0, 0, false, 0);
pub const LARGE_AMOUNT: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);
pub const VERY_LARGE_AMOUNT: Decimal = Decimal::from_parts(5_000_000, 0, 0, false, 0);

const ROUND_TEN_THOUSAND: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);
const ROUND_HUNDRED_THOUSAND: Decimal = Decimal::from_parts(100_000, 0, 0, false, 0);

pub const MEDIUM_FREQUENCY: i64 = 5;
pub const HIGH_FREQUENCY: i64 = 10;

/// Everything a rule may look at: the transaction plus the fast-store
/// lookups made for it.
#[derive(Debug, Clone, Copy)]
pub struct ScreeningFacts<'a> {
    pub tx: &'a Transaction,
    /// Hour of `tx.timestamp` in UTC.
    pub hour: u8,
    pub high_risk_country: bool,
    pub blacklisted_counterparty: bool,
    /// The account's daily counter before this screening.
    pub daily_count: i64,
}

impl<'a> ScreeningFacts<'a> {
    fn amount(&self) -> Decimal {
        self.tx.amount
    }
}

pub struct Rule {
    pub when: fn(&ScreeningFacts<'_>) -> bool,
    pub weight: u32,
    pub flag: RiskFlag,
}

pub struct Check {
    pub name: &'static str,
    pub rules: &'static [Rule],
}

pub static CHECKS: &[Check] = &[
    Check {
        name: "amount",
        rules: &[
            Rule {
                when: |f| f.amount() >= VERY_LARGE_AMOUNT,
                weight: 50,
                flag: RiskFlag::VeryLargeAmount,
            },
            Rule {
                when: |f| f.amount() >= LARGE_AMOUNT,
                weight: 30,
                flag: RiskFlag::LargeAmount,
            },
            Rule {
                when: |f| f.amount() >= MEDIUM_AMOUNT,
                weight: 10,
                flag: RiskFlag::MediumAmount,
            },
        ],
    },
    Check {
        name: "country",
        rules: &[Rule {
            when: |f| f.high_risk_country,
            weight: 40,
            flag: RiskFlag::OffshoreCounterparty,
        }],
    },
    Check {
        name: "blacklist",
        rules: &[Rule {
            when: |f| f.blacklisted_counterparty,
            weight: 100,
            flag: RiskFlag::BlacklistedCounterparty,
        }],
    },
    Check {
        name: "time",
        rules: &[
            Rule {
                when: |f| f.hour < 6,
                weight: 15,
                flag: RiskFlag::UnusualTime,
            },
            Rule {
                when: |f| f.hour >= 22 || f.hour < 8,
                weight: 8,
                flag: RiskFlag::LateHours,
            },
        ],
    },
    Check {
        name: "frequency",
        rules: &[
            Rule {
                when: |f| f.daily_count >= HIGH_FREQUENCY,
                weight: 25,
                flag: RiskFlag::HighFrequency,
            },
            Rule {
                when: |f| f.daily_count >= MEDIUM_FREQUENCY,
                weight: 10,
                flag: RiskFlag::MediumFrequency,
            },
        ],
    },
    Check {
        name: "transaction_type",
        rules: &[
            Rule {
                when: |f| f.tx.transaction_type == "international_transfer",
                weight: 20,
                flag: RiskFlag::InternationalTransfer,
            },
            Rule {
                when: |f| f.tx.transaction_type == "withdrawal",
                weight: 5,
                flag: RiskFlag::Withdrawal,
            },
        ],
    },
    Check {
        name: "channel",
        rules: &[
            Rule {
                when: |f| f.tx.channel == "atm" && f.amount() >= MEDIUM_AMOUNT,
                weight: 12,
                flag: RiskFlag::LargeAtmTransaction,
            },
            Rule {
                when: |f| f.tx.channel == "atm",
                weight: 5,
                flag: RiskFlag::AtmTransaction,
            },
            Rule {
                when: |f| f.tx.channel == "mobile" && f.amount() >= LARGE_AMOUNT,
                weight: 8,
                flag: RiskFlag::LargeMobileTransaction,
            },
        ],
    },
    Check {
        name: "currency",
        rules: &[
            Rule {
                when: |f| f.tx.currency == "CHF",
                weight: 8,
                flag: RiskFlag::HighRiskCurrency,
            },
            Rule {
                when: |f| f.tx.currency == "JPY",
                weight: 5,
                flag: RiskFlag::HighRiskCurrency,
            },
        ],
    },
    Check {
        name: "round_amount",
        rules: &[Rule {
            when: |f| is_round_amount(f.amount()),
            weight: 5,
            flag: RiskFlag::RoundAmount,
        }],
    },
];

/// Whether `amount` is an exact multiple of the power-of-ten bucket it falls
/// in: 10 000 below 100 000, 100 000 below 1 000 000, 1 000 000 above.
/// Amounts under 10 000 are never round.
pub fn is_round_amount(amount: Decimal) -> bool {
    let bucket = if amount >= LARGE_AMOUNT {
        LARGE_AMOUNT
    } else if amount >= ROUND_HUNDRED_THOUSAND {
        ROUND_HUNDRED_THOUSAND
    } else if amount >= ROUND_TEN_THOUSAND {
        ROUND_TEN_THOUSAND
    } else {
        return false;
    };
    (amount % bucket).is_zero()
}

/// Score and flags produced by running [`CHECKS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub score: u32,
    pub flags: SmallVec<[RiskFlag; 8]>,
}

pub fn evaluate(facts: &ScreeningFacts<'_>) -> Evaluation {
    let mut score = 0;
    let mut flags = SmallVec::new();
    for check in CHECKS {
        if let Some(rule) = check.rules.iter().find(|r| (r.when)(facts)) {
            score += rule.weight;
            if !flags.contains(&rule.flag) {
                flags.push(rule.flag);
            }
        }
    }
    Evaluation { score, flags }
}
