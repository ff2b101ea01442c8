//! Prompt safety checks run before any quota is charged or provider called.
//!
//! Substring heuristics, not a classifier: the term lists cover English and
//! Indonesian since the product serves both. The fraud checks guard revision
//! prompts against bank-account tampering on donation posters.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

// Blocked terms, lowercase.
const NSFW_TERMS: &[&str] = &[
    // English
    "nude", "naked", "nsfw", "porn", "pornographic", "xxx", "sexual", "sexually",
    "erotic", "erotica", "hentai", "genitalia", "genital", "sex scene",
    "topless", "bottomless", "stripper", "strip club", "orgasm",
    "intercourse", "masturbat", "fetish", "bondage", "bdsm",
    "explicit content", "adult content", "obscene",
    // Indonesian
    "telanjang", "bugil", "porno", "pornografi", "cabul",
    "mesum", "asusila", "seksual", "bokep", "vulgar",
    "senonoh", "tidak senonoh", "tak senonoh", "jorok",
    "berbau seks", "dewasa 18+", "konten dewasa",
    // Violence / gore
    "gore", "gory", "mutilation", "dismember", "bloody murder",
    "decapitat", "torture", "violent death", "graphic violence",
    // Drugs
    "drug use", "crack cocaine", "methamphetamine", "heroin use",
    "inject drugs", "narkoba", "narkotika", "ganja",
    // Hate speech
    "hate speech", "racist", "racism", "nazi", "swastika",
    "kafir", "ujaran kebencian",
];

const FRAUD_PATTERNS: &[&str] = &[
    "transfer ke rekening", "transfer ke nomor",
    "kirim uang ke", "bayar ke rekening",
    "ganti nomor rekening", "ubah rekening",
    "ganti no rek", "ubah no rek",
    "change account number", "change bank account",
    "new account number", "different account",
];

const NAME_CHANGE_PATTERNS: &[&str] = &[
    "a/n ", "atas nama ", "nama rekening ", "account name ", "pemilik rekening ",
];

// Digit runs that look like bank account numbers.
static ACCOUNT_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{8,20}\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationKind {
    Nsfw,
    Fraud,
}

#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub reason: String,
}

/// Check a prompt for NSFW or otherwise blocked content.
pub fn check_prompt_safety(prompt: &str) -> Option<Violation> {
    let lower = prompt.trim().to_lowercase();
    for term in NSFW_TERMS {
        if lower.contains(term) {
            return Some(Violation {
                kind: ViolationKind::Nsfw,
                reason: format!("prompt contains blocked term \"{term}\""),
            });
        }
    }
    None
}

/// Detect attempts to redirect payments in poster revision prompts: known
/// transfer phrases, an account number differing from the original by more
/// than two digits, or a changed account holder name.
pub fn check_fraud_attempt(
    prompt: &str,
    original_account_number: Option<&str>,
    original_account_name: Option<&str>,
) -> Option<Violation> {
    let lower = prompt.trim().to_lowercase();

    for pattern in FRAUD_PATTERNS {
        if lower.contains(pattern) {
            return Some(Violation {
                kind: ViolationKind::Fraud,
                reason: "changing bank account details on a poster is not allowed".into(),
            });
        }
    }

    if let Some(original) = original_account_number {
        for matched in ACCOUNT_NUMBER.find_iter(&lower) {
            let candidate = matched.as_str();
            if candidate != original && digit_differences(candidate, original) > 2 {
                return Some(Violation {
                    kind: ViolationKind::Fraud,
                    reason: format!(
                        "account number in prompt ({candidate}) differs from the original by more than two digits"
                    ),
                });
            }
        }
    }

    if let Some(original) = original_account_name {
        let original_lower = original.to_lowercase();
        for pattern in NAME_CHANGE_PATTERNS {
            if let Some(idx) = lower.find(pattern) {
                let start = idx + pattern.len();
                let after: String = lower[start..].chars().take(50).collect();
                let after = after.trim();
                let first_word = after
                    .split(|c: char| c == ',' || c == '.' || c.is_whitespace())
                    .next()
                    .unwrap_or("");
                if after.len() > 2
                    && !after.contains(&original_lower)
                    && !original_lower.contains(first_word)
                {
                    return Some(Violation {
                        kind: ViolationKind::Fraud,
                        reason: "account holder name in prompt differs from the original".into(),
                    });
                }
            }
        }
    }

    None
}

/// Positional digit differences; a length gap over two digits means it is a
/// different number outright.
fn digit_differences(a: &str, b: &str) -> usize {
    let len_a = a.len();
    let len_b = b.len();
    if len_a.abs_diff(len_b) > 2 {
        return len_a.max(len_b);
    }
    let mut diffs = len_a.abs_diff(len_b);
    for (ca, cb) in a.chars().zip(b.chars()) {
        if ca != cb {
            diffs += 1;
        }
    }
    diffs
}
