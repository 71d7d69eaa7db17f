//! Rule-based compound polarity scorer for financial headlines.
//!
//! Word valences live on a -4..=4 scale and are combined with intensity
//! boosters, negations, capitalisation emphasis, a contrastive "but" rule and
//! exclamation emphasis before being squashed into [-1, 1].

use std::collections::HashMap;

use analysis_core::PolarityScorer;

const BOOSTER_INCR: f64 = 0.293;
const BOOSTER_DECR: f64 = -0.293;
const CAPS_INCR: f64 = 0.733;
const NEGATION_SCALAR: f64 = -0.74;
const EXCLAMATION_INCR: f64 = 0.292;
const MAX_EXCLAMATIONS: usize = 4;
const NORMALIZATION_ALPHA: f64 = 15.0;

/// How far back a booster or negation can reach
const MODIFIER_WINDOW: usize = 3;
/// Damping applied to a booster 1, 2 and 3 tokens before the word
const BOOSTER_DAMPING: [f64; MODIFIER_WINDOW] = [1.0, 0.95, 0.9];

const NEGATION_WORDS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "aren't",
    "wasn't", "weren't", "won't", "wouldn't", "couldn't", "shouldn't", "hardly",
    "barely", "neither", "nor", "without", "cannot", "nothing", "nobody",
];

const BOOSTERS: &[(&str, f64)] = &[
    ("very", BOOSTER_INCR),
    ("extremely", BOOSTER_INCR),
    ("highly", BOOSTER_INCR),
    ("hugely", BOOSTER_INCR),
    ("significantly", BOOSTER_INCR),
    ("substantially", BOOSTER_INCR),
    ("sharply", BOOSTER_INCR),
    ("strongly", BOOSTER_INCR),
    ("massively", BOOSTER_INCR),
    ("deeply", BOOSTER_INCR),
    ("incredibly", BOOSTER_INCR),
    ("remarkably", BOOSTER_INCR),
    ("exceptionally", BOOSTER_INCR),
    ("most", BOOSTER_INCR),
    ("more", BOOSTER_INCR),
    ("so", BOOSTER_INCR),
    ("totally", BOOSTER_INCR),
    ("completely", BOOSTER_INCR),
    ("slightly", BOOSTER_DECR),
    ("somewhat", BOOSTER_DECR),
    ("marginally", BOOSTER_DECR),
    ("modestly", BOOSTER_DECR),
    ("partly", BOOSTER_DECR),
    ("less", BOOSTER_DECR),
    ("little", BOOSTER_DECR),
    ("kinda", BOOSTER_DECR),
];

/// Default financial lexicon: (word, valence).
const LEXICON: &[(&str, f64)] = &[
    // Market direction
    ("bullish", 2.9),
    ("bearish", -2.9),
    ("rally", 2.4),
    ("rallies", 2.4),
    ("rallied", 2.4),
    ("surge", 2.6),
    ("surges", 2.6),
    ("surged", 2.6),
    ("soar", 2.8),
    ("soars", 2.8),
    ("soared", 2.8),
    ("jump", 1.8),
    ("jumps", 1.8),
    ("jumped", 1.8),
    ("climb", 1.5),
    ("climbs", 1.5),
    ("climbed", 1.5),
    ("rise", 1.3),
    ("rises", 1.3),
    ("rising", 1.3),
    ("rose", 1.3),
    ("gain", 1.9),
    ("gains", 1.9),
    ("gained", 1.9),
    ("advance", 1.4),
    ("advances", 1.4),
    ("rebound", 1.9),
    ("rebounds", 1.9),
    ("recovery", 1.8),
    ("recovers", 1.8),
    ("high", 0.9),
    ("higher", 1.1),
    ("record", 1.6),
    ("momentum", 1.2),
    ("upside", 1.7),
    ("tailwind", 1.6),
    ("tailwinds", 1.6),
    ("fall", -1.6),
    ("falls", -1.6),
    ("fell", -1.6),
    ("falling", -1.6),
    ("drop", -1.7),
    ("drops", -1.7),
    ("dropped", -1.7),
    ("decline", -1.8),
    ("declines", -1.8),
    ("declined", -1.8),
    ("slide", -1.7),
    ("slides", -1.7),
    ("slump", -2.4),
    ("slumps", -2.4),
    ("plunge", -2.9),
    ("plunges", -2.9),
    ("plunged", -2.9),
    ("tumble", -2.5),
    ("tumbles", -2.5),
    ("tumbled", -2.5),
    ("sink", -2.0),
    ("sinks", -2.0),
    ("crash", -3.2),
    ("crashes", -3.2),
    ("crashed", -3.2),
    ("selloff", -2.3),
    ("sell-off", -2.3),
    ("low", -0.9),
    ("lower", -1.1),
    ("retreat", -1.3),
    ("retreats", -1.3),
    ("downside", -1.7),
    ("headwind", -1.6),
    ("headwinds", -1.6),
    ("volatile", -1.0),
    ("volatility", -0.8),
    // Results and guidance
    ("beat", 1.9),
    ("beats", 1.9),
    ("exceed", 1.9),
    ("exceeds", 1.9),
    ("exceeded", 1.9),
    ("outperform", 2.1),
    ("outperforms", 2.1),
    ("outpacing", 1.6),
    ("profit", 1.8),
    ("profits", 1.8),
    ("profitable", 2.0),
    ("growth", 1.9),
    ("grow", 1.5),
    ("grows", 1.5),
    ("strong", 2.0),
    ("stronger", 2.1),
    ("robust", 2.0),
    ("solid", 1.5),
    ("accelerating", 1.4),
    ("expansion", 1.4),
    ("raised", 1.3),
    ("raises", 1.3),
    ("boost", 1.9),
    ("boosts", 1.9),
    ("improve", 1.7),
    ("improves", 1.7),
    ("improved", 1.7),
    ("success", 2.5),
    ("successful", 2.5),
    ("breakthrough", 2.6),
    ("innovation", 1.6),
    ("innovative", 1.7),
    ("win", 2.5),
    ("wins", 2.5),
    ("won", 2.4),
    ("miss", -1.9),
    ("misses", -1.9),
    ("missed", -1.9),
    ("underperform", -2.1),
    ("underperforms", -2.1),
    ("loss", -2.0),
    ("losses", -2.0),
    ("lose", -2.0),
    ("loses", -2.0),
    ("weak", -1.9),
    ("weaker", -2.0),
    ("weakness", -1.9),
    ("disappoint", -2.2),
    ("disappoints", -2.2),
    ("disappointing", -2.2),
    ("disappointed", -2.1),
    ("lowered", -1.3),
    ("cut", -1.4),
    ("cuts", -1.4),
    ("slowdown", -1.6),
    ("slowing", -1.2),
    ("shortfall", -2.0),
    ("fail", -2.5),
    ("fails", -2.5),
    ("failed", -2.5),
    ("failure", -2.6),
    ("worse", -2.1),
    ("worst", -3.1),
    ("warning", -1.9),
    ("warns", -1.9),
    // Analyst actions
    ("upgrade", 2.0),
    ("upgrades", 2.0),
    ("upgraded", 2.0),
    ("downgrade", -2.0),
    ("downgrades", -2.0),
    ("downgraded", -2.0),
    ("buy", 1.2),
    ("sell", -1.2),
    ("overweight", 1.3),
    ("underweight", -1.3),
    ("recommend", 1.5),
    ("optimistic", 2.2),
    ("optimism", 2.2),
    ("pessimistic", -2.2),
    ("pessimism", -2.2),
    ("confident", 2.0),
    ("confidence", 1.6),
    ("positive", 2.6),
    ("negative", -2.7),
    ("good", 1.9),
    ("great", 3.1),
    ("excellent", 3.2),
    ("bad", -2.5),
    ("terrible", -3.1),
    ("overvalued", -1.5),
    ("undervalued", 1.3),
    ("bubble", -1.6),
    // Capital actions
    ("dividend", 1.2),
    ("dividends", 1.2),
    ("buyback", 1.4),
    ("repurchase", 1.2),
    ("accretive", 1.4),
    ("dilution", -1.5),
    ("dilutive", -1.5),
    // Corporate distress
    ("lawsuit", -2.0),
    ("lawsuits", -2.0),
    ("litigation", -1.7),
    ("sued", -2.0),
    ("fraud", -3.3),
    ("scandal", -2.9),
    ("probe", -1.7),
    ("investigation", -1.6),
    ("recall", -1.8),
    ("recalls", -1.8),
    ("default", -2.4),
    ("bankruptcy", -3.3),
    ("bankrupt", -3.3),
    ("restructuring", -1.2),
    ("layoff", -2.0),
    ("layoffs", -2.0),
    ("suspended", -1.6),
    ("halt", -1.5),
    ("halted", -1.5),
    ("delay", -1.3),
    ("delays", -1.3),
    ("delayed", -1.3),
    ("risk", -1.1),
    ("risks", -1.1),
    ("risky", -1.4),
    ("concern", -1.4),
    ("concerns", -1.4),
    ("fear", -2.2),
    ("fears", -2.2),
    ("worry", -1.9),
    ("worries", -1.9),
    ("trouble", -2.0),
    ("crisis", -3.1),
    ("uncertainty", -1.4),
    ("threat", -2.2),
    ("threatens", -2.2),
    ("approval", 1.8),
    ("approved", 1.8),
    ("approves", 1.8),
    ("rejected", -2.0),
    ("rejects", -2.0),
    ("partnership", 1.1),
    ("deal", 0.8),
];

#[derive(Debug, Clone)]
struct Token {
    lower: String,
    is_upper: bool,
}

/// Lexicon-based compound scorer.
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    valences: HashMap<String, f64>,
    boosters: HashMap<&'static str, f64>,
}

impl LexiconScorer {
    pub fn new() -> Self {
        Self {
            valences: LEXICON.iter().map(|(w, v)| (w.to_string(), *v)).collect(),
            boosters: BOOSTERS.iter().copied().collect(),
        }
    }

    /// Add or override word valences; values are clamped to the -4..=4 scale.
    pub fn with_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        for (word, valence) in words {
            self.valences
                .insert(word.into().to_lowercase(), valence.clamp(-4.0, 4.0));
        }
        self
    }

    pub fn valence(&self, word: &str) -> Option<f64> {
        self.valences.get(&word.to_lowercase()).copied()
    }

    fn tokenize(text: &str) -> Vec<Token> {
        text.split_whitespace()
            .filter_map(|raw| {
                let trimmed = raw.trim_matches(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-'));
                let trimmed = trimmed.trim_matches(|c: char| c == '\'' || c == '-');
                if trimmed.is_empty() {
                    return None;
                }
                let has_alpha = trimmed.chars().any(|c| c.is_alphabetic());
                Some(Token {
                    lower: trimmed.to_lowercase(),
                    is_upper: has_alpha && trimmed.chars().all(|c| !c.is_lowercase()),
                })
            })
            .collect()
    }

    fn is_negation(word: &str) -> bool {
        NEGATION_WORDS.contains(&word) || word.ends_with("n't")
    }

    fn token_valence(&self, tokens: &[Token], i: usize, caps_differential: bool) -> f64 {
        let token = &tokens[i];
        if self.boosters.contains_key(token.lower.as_str()) {
            return 0.0;
        }
        let Some(&base) = self.valences.get(&token.lower) else {
            return 0.0;
        };

        let mut valence = base;
        if token.is_upper && caps_differential {
            valence += CAPS_INCR * base.signum();
        }

        let mut negated = false;
        for distance in 1..=MODIFIER_WINDOW.min(i) {
            let prior = &tokens[i - distance];
            if let Some(&boost) = self.boosters.get(prior.lower.as_str()) {
                let mut scalar = boost;
                if prior.is_upper && caps_differential {
                    scalar += CAPS_INCR * boost.signum();
                }
                valence += scalar * base.signum() * BOOSTER_DAMPING[distance - 1];
            }
            if Self::is_negation(&prior.lower) {
                negated = true;
            }
        }

        if negated {
            valence *= NEGATION_SCALAR;
        }
        valence
    }

    /// Raw (unnormalized) sentiment sum for the text.
    fn raw_sum(&self, text: &str) -> f64 {
        let tokens = Self::tokenize(text);
        if tokens.is_empty() {
            return 0.0;
        }

        let alpha_tokens = tokens.iter().filter(|t| t.lower.chars().any(char::is_alphabetic));
        let (upper, total) = alpha_tokens.fold((0usize, 0usize), |(u, n), t| (u + t.is_upper as usize, n + 1));
        let caps_differential = upper > 0 && upper < total;

        let mut valences: Vec<f64> = (0..tokens.len())
            .map(|i| self.token_valence(&tokens, i, caps_differential))
            .collect();

        if let Some(but_idx) = tokens.iter().position(|t| t.lower == "but") {
            for (i, v) in valences.iter_mut().enumerate() {
                if i < but_idx {
                    *v *= 0.5;
                } else if i > but_idx {
                    *v *= 1.5;
                }
            }
        }

        let mut sum: f64 = valences.iter().sum();
        if sum != 0.0 {
            let exclamations = text.chars().filter(|&c| c == '!').count().min(MAX_EXCLAMATIONS);
            sum += exclamations as f64 * EXCLAMATION_INCR * sum.signum();
        }
        sum
    }
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl PolarityScorer for LexiconScorer {
    fn polarity(&self, text: &str) -> f64 {
        let sum = self.raw_sum(text);
        if sum == 0.0 || !sum.is_finite() {
            return 0.0;
        }
        (sum / (sum * sum + NORMALIZATION_ALPHA).sqrt()).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(text: &str) -> f64 {
        LexiconScorer::new().polarity(text)
    }

    #[test]
    fn test_empty_and_unknown_text_is_neutral() {
        assert_eq!(score(""), 0.0);
        assert_eq!(score("   "), 0.0);
        assert_eq!(score("Company schedules annual meeting"), 0.0);
    }

    #[test]
    fn test_polarity_direction() {
        assert!(score("Tesla shares surge after strong deliveries") > 0.5);
        assert!(score("Bank shares plunge on fraud probe") < -0.5);
    }

    #[test]
    fn test_single_word_compound() {
        // 1.9 / sqrt(1.9^2 + 15)
        let expected = 1.9 / (1.9f64 * 1.9 + 15.0).sqrt();
        assert!((score("Earnings beat") - expected).abs() < 1e-12);
    }

    #[test]
    fn test_negation_flips_sign() {
        assert!(score("Results were good") > 0.0);
        assert!(score("Results were not good") < 0.0);
        assert!(score("Results weren't good") < 0.0);
    }

    #[test]
    fn test_booster_intensifies() {
        assert!(score("very strong quarter") > score("strong quarter"));
        assert!(score("slightly strong quarter") < score("strong quarter"));
        assert!(score("very weak quarter") < score("weak quarter"));
    }

    #[test]
    fn test_caps_emphasis_in_mixed_case() {
        assert!(score("Shares SURGE after earnings") > score("Shares surge after earnings"));
        // No differential when everything is upper case
        assert_eq!(score("SHARES SURGE"), score("shares surge"));
    }

    #[test]
    fn test_but_clause_dominates() {
        assert!(score("Revenue was weak but guidance is strong") > 0.0);
        assert!(score("Revenue was strong but guidance is weak") < 0.0);
    }

    #[test]
    fn test_exclamation_emphasis_capped() {
        assert!(score("Stock rallies!") > score("Stock rallies"));
        assert_eq!(score("Stock rallies!!!!"), score("Stock rallies!!!!!!!"));
        assert_eq!(score("Meeting today!!!"), 0.0);
    }

    #[test]
    fn test_scores_stay_bounded() {
        let text = "EXTREMELY great excellent record surge soar rally win success!!!!";
        let s = score(text);
        assert!(s > 0.9 && s <= 1.0);
        let s = score("worst crash crisis fraud bankruptcy plunge!!!!");
        assert!(s < -0.9 && s >= -1.0);
    }

    #[test]
    fn test_custom_words() {
        let scorer = LexiconScorer::new().with_words([("moonshot", 9.0)]);
        assert_eq!(scorer.valence("MOONSHOT"), Some(4.0));
        assert!(scorer.polarity("a moonshot") > 0.0);
    }
}
