//! Certificate scoring and verification
//!
//! Combines theory/practical/portfolio scores into a weighted final score
//! and grade, generates a human-unguessable certificate code, and binds it
//! to a server-held secret through an HMAC-SHA256 hash. Verification
//! recomputes the hash; the secret is injected, never read from the
//! environment.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{CoachError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Certificates are valid for two years from issuance
const VALIDITY_DAYS: i64 = 730;

/// Score below which no certificate is issued
const ELIGIBILITY_FLOOR: f64 = 60.0;

const THEORY_WEIGHT: f64 = 0.3;
const PRACTICAL_WEIGHT: f64 = 0.5;
const PORTFOLIO_WEIGHT: f64 = 0.2;

/// Unambiguous code alphabet (no 0/O, 1/I)
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_GROUPS: usize = 3;
const CODE_GROUP_LEN: usize = 4;

/// Letter grade, a deterministic step function of the final score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    APlus,
    A,
    BPlus,
    B,
    CPlus,
    C,
    D,
}

impl Grade {
    /// Grade for an eligible final score (>= 60)
    pub fn for_score(final_score: f64) -> Option<Self> {
        match final_score {
            s if s >= 90.0 => Some(Self::APlus),
            s if s >= 85.0 => Some(Self::A),
            s if s >= 80.0 => Some(Self::BPlus),
            s if s >= 75.0 => Some(Self::B),
            s if s >= 70.0 => Some(Self::CPlus),
            s if s >= 65.0 => Some(Self::C),
            s if s >= 60.0 => Some(Self::D),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::D => "D",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "A+" => Some(Self::APlus),
            "A" => Some(Self::A),
            "B+" => Some(Self::BPlus),
            "B" => Some(Self::B),
            "C+" => Some(Self::CPlus),
            "C" => Some(Self::C),
            "D" => Some(Self::D),
            _ => None,
        }
    }
}

/// An issued credential, immutable after issuance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub id: String,
    pub user_id: String,
    pub level: u32,
    pub theory_score: f64,
    pub practical_score: f64,
    pub portfolio_score: f64,
    pub final_score: f64,
    pub grade: Grade,
    /// Display code, e.g. "K7NF-Q2XH-9MRT"
    pub code: String,
    /// hex(HMAC-SHA256(secret, code)); the code itself is the only plaintext
    pub verification_hash: String,
    pub skills: Vec<String>,
    pub stats: serde_json::Value,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a verification check; the three cases are distinguishable to
/// the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Valid,
    Expired,
    /// Unknown code or hash mismatch; the two are deliberately not told apart
    Invalid,
}

/// Scores a certificate request and signs its code
pub struct CertificateScorer {
    secret: Vec<u8>,
}

impl CertificateScorer {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { secret: secret.into() }
    }

    /// Weighted final score: theory 30%, practical 50%, portfolio 20%
    pub fn final_score(theory: f64, practical: f64, portfolio: f64) -> f64 {
        theory * THEORY_WEIGHT + practical * PRACTICAL_WEIGHT + portfolio * PORTFOLIO_WEIGHT
    }

    /// Issue a certificate. Fails with `Validation` when a component score
    /// is out of range or the final score is below the eligibility floor.
    #[allow(clippy::too_many_arguments)]
    pub fn issue(
        &self,
        user_id: &str,
        level: u32,
        theory: f64,
        practical: f64,
        portfolio: f64,
        skills: Vec<String>,
        stats: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<Certificate> {
        for (name, score) in [("theory", theory), ("practical", practical), ("portfolio", portfolio)] {
            if !(0.0..=100.0).contains(&score) || score.is_nan() {
                return Err(CoachError::Validation(format!(
                    "{name} score {score} outside [0, 100]"
                )));
            }
        }

        let final_score = Self::final_score(theory, practical, portfolio);
        let grade = Grade::for_score(final_score).ok_or_else(|| {
            CoachError::Validation(format!(
                "final score {final_score:.1} below eligibility floor {ELIGIBILITY_FLOOR}"
            ))
        })?;

        let code = generate_code(&mut rand::thread_rng());
        Ok(Certificate {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            level,
            theory_score: theory,
            practical_score: practical,
            portfolio_score: portfolio,
            final_score,
            grade,
            verification_hash: self.hash_code(&code),
            code,
            skills,
            stats,
            issued_at: now,
            expires_at: now + Duration::days(VALIDITY_DAYS),
        })
    }

    /// One-way hash binding a code to the server secret
    pub fn hash_code(&self, code: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(code.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check a supplied code against a stored certificate at time `now`.
    ///
    /// Recomputes the hash rather than comparing codes, so a tampered store
    /// row fails the same way a tampered code does.
    pub fn check(&self, cert: &Certificate, code: &str, now: DateTime<Utc>) -> VerificationStatus {
        if self.hash_code(code) != cert.verification_hash {
            return VerificationStatus::Invalid;
        }
        if now >= cert.expires_at {
            return VerificationStatus::Expired;
        }
        VerificationStatus::Valid
    }
}

/// Fixed-format code: 3 groups of 4 unambiguous characters, '-'-separated
fn generate_code(rng: &mut impl Rng) -> String {
    (0..CODE_GROUPS)
        .map(|_| {
            (0..CODE_GROUP_LEN)
                .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("-")
}
