//! Media quality levels and select policies.
//!
//! A select policy names a target quality and the direction to fall back in
//! when the target is unavailable. With the audio levels `shq > hq > sq > lq`:
//!
//! | policy  | order                 |
//! |---------|-----------------------|
//! | `hq><`  | hq, sq, shq, lq       |
//! | `hq<>`  | hq, shq, sq, lq       |
//! | `sq<<>` | sq, hq, shq, lq       |
//! | `hq>><` | hq, sq, lq, shq       |
//! | `>>>`   | shq, hq, sq, lq       |
//! | `<<<`   | lq, sq, hq, shq       |
//!
//! `<` walks towards better quality, `>` towards worse.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LibraryError, Result};

/// Shared behaviour of [`AudioQuality`] and [`VideoQuality`].
pub trait QualityLevel: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Every level, best first.
    const LEVELS: &'static [Self];

    fn as_str(&self) -> &'static str;

    fn parse(name: &str) -> Option<Self> {
        Self::LEVELS.iter().copied().find(|q| q.as_str() == name)
    }

    fn best() -> Self {
        Self::LEVELS[0]
    }

    fn worst() -> Self {
        Self::LEVELS[Self::LEVELS.len() - 1]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    /// Super high quality, above 320kbps
    Shq,
    /// About 320kbps
    Hq,
    /// About 200kbps
    Sq,
    /// About 100kbps
    Lq,
}

impl QualityLevel for AudioQuality {
    const LEVELS: &'static [Self] = &[
        AudioQuality::Shq,
        AudioQuality::Hq,
        AudioQuality::Sq,
        AudioQuality::Lq,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            AudioQuality::Shq => "shq",
            AudioQuality::Hq => "hq",
            AudioQuality::Sq => "sq",
            AudioQuality::Lq => "lq",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoQuality {
    Fhd,
    Hd,
    Sd,
    Ld,
}

impl QualityLevel for VideoQuality {
    const LEVELS: &'static [Self] = &[
        VideoQuality::Fhd,
        VideoQuality::Hd,
        VideoQuality::Sd,
        VideoQuality::Ld,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            VideoQuality::Fhd => "fhd",
            VideoQuality::Hd => "hd",
            VideoQuality::Sd => "sd",
            VideoQuality::Ld => "ld",
        }
    }
}

macro_rules! quality_str_impls {
    ($($ty:ty),+) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl FromStr for $ty {
                type Err = LibraryError;

                fn from_str(s: &str) -> Result<Self> {
                    <$ty as QualityLevel>::parse(s)
                        .ok_or_else(|| LibraryError::InvalidPolicy(format!("unknown quality '{s}'")))
                }
            }
        )+
    };
}

quality_str_impls!(AudioQuality, VideoQuality);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    /// `Q><`
    WorseFirstAlternating,
    /// `Q<>`
    BetterFirstAlternating,
    /// `Q<<>`
    BetterThenWorse,
    /// `Q>><`
    WorseThenBetter,
    /// `>>>`
    BestToWorst,
    /// `<<<`
    WorstToBest,
}

/// A parsed select policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortPolicy {
    rule: Rule,
    target: Option<String>,
}

impl SortPolicy {
    pub fn parse(source: &str) -> Result<Self> {
        let source = source.trim();
        let invalid = || LibraryError::InvalidPolicy(source.to_string());

        // Longer suffixes first so `<<>` is not read as `<>`.
        const RULES: &[(&str, Rule)] = &[
            (">>>", Rule::BestToWorst),
            ("<<<", Rule::WorstToBest),
            ("<<>", Rule::BetterThenWorse),
            (">><", Rule::WorseThenBetter),
            ("><", Rule::WorseFirstAlternating),
            ("<>", Rule::BetterFirstAlternating),
        ];

        for (suffix, rule) in RULES {
            let Some(target) = source.strip_suffix(suffix) else {
                continue;
            };
            let absolute = matches!(rule, Rule::BestToWorst | Rule::WorstToBest);
            if target.is_empty() {
                return if absolute {
                    Ok(Self { rule: *rule, target: None })
                } else {
                    Err(invalid())
                };
            }
            if !target.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(invalid());
            }
            return Ok(Self {
                rule: *rule,
                target: Some(target.to_string()),
            });
        }
        Err(invalid())
    }

    /// Levels of `Q` in the order this policy visits them.
    pub fn apply<Q: QualityLevel>(&self, levels: &[Q]) -> Result<Vec<Q>> {
        match self.rule {
            Rule::BestToWorst => return Ok(levels.to_vec()),
            Rule::WorstToBest => return Ok(levels.iter().rev().copied().collect()),
            _ => {}
        }

        let target = self.target.as_deref().unwrap_or_default();
        let idx = levels
            .iter()
            .position(|q| q.as_str() == target)
            .ok_or_else(|| LibraryError::InvalidPolicy(format!("quality '{target}' not found")))?;

        // Closest first in both directions.
        let better: Vec<Q> = levels[..idx].iter().rev().copied().collect();
        let worse: Vec<Q> = levels[idx + 1..].to_vec();

        let mut ordered = vec![levels[idx]];
        match self.rule {
            Rule::WorseFirstAlternating => ordered.extend(cross_merge(&worse, &better)),
            Rule::BetterFirstAlternating => ordered.extend(cross_merge(&better, &worse)),
            Rule::BetterThenWorse => {
                ordered.extend(better);
                ordered.extend(worse);
            }
            Rule::WorseThenBetter => {
                ordered.extend(worse);
                ordered.extend(better);
            }
            Rule::BestToWorst | Rule::WorstToBest => {}
        }
        Ok(ordered)
    }
}

impl FromStr for SortPolicy {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        SortPolicy::parse(s)
    }
}

fn cross_merge<Q: Copy>(first: &[Q], second: &[Q]) -> Vec<Q> {
    let mut merged = Vec::with_capacity(first.len() + second.len());
    let mut a = first.iter();
    let mut b = second.iter();
    loop {
        match (a.next(), b.next()) {
            (None, None) => break,
            (x, y) => merged.extend(x.into_iter().chain(y).copied()),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(policy: &str) -> Vec<&'static str> {
        SortPolicy::parse(policy)
            .unwrap()
            .apply(AudioQuality::LEVELS)
            .unwrap()
            .iter()
            .map(|q| q.as_str())
            .collect()
    }

    #[test]
    fn test_audio_orders() {
        assert_eq!(audio("hq><"), ["hq", "sq", "shq", "lq"]);
        assert_eq!(audio("hq<>"), ["hq", "shq", "sq", "lq"]);
        assert_eq!(audio("sq<<>"), ["sq", "hq", "shq", "lq"]);
        assert_eq!(audio("hq>><"), ["hq", "sq", "lq", "shq"]);
        assert_eq!(audio(">>>"), ["shq", "hq", "sq", "lq"]);
        assert_eq!(audio("<<<"), ["lq", "sq", "hq", "shq"]);
        assert_eq!(audio("lq><"), ["lq", "sq", "hq", "shq"]);
    }

    #[test]
    fn test_video_order() {
        let order = SortPolicy::parse("sd<>")
            .unwrap()
            .apply(VideoQuality::LEVELS)
            .unwrap();
        assert_eq!(
            order,
            [VideoQuality::Sd, VideoQuality::Hd, VideoQuality::Ld, VideoQuality::Fhd]
        );
    }

    #[test]
    fn test_invalid_policies() {
        assert!(SortPolicy::parse("hq").is_err());
        assert!(SortPolicy::parse("<>").is_err());
        assert!(SortPolicy::parse("h q<>").is_err());
        let unknown = SortPolicy::parse("xq<>").unwrap();
        assert!(unknown.apply(AudioQuality::LEVELS).is_err());
    }

    #[test]
    fn test_best_worst() {
        assert_eq!(AudioQuality::best(), AudioQuality::Shq);
        assert_eq!(VideoQuality::worst(), VideoQuality::Ld);
        assert_eq!("hq".parse::<AudioQuality>().unwrap(), AudioQuality::Hq);
        assert!("4k".parse::<VideoQuality>().is_err());
    }
}
