//! Similarity scores used to pick standby songs and to rank keyword matches.

use crate::models::BriefSong;

/// Score of an exact match.
pub const FULL_SCORE: f64 = 10.0;

/// Minimum normalized score (`0..=1`) of an acceptable standby.
pub const STANDBY_DEFAULT_MIN_SCORE: f64 = 0.5;

/// Relative duration difference above which two songs are not the same take.
const DURATION_TOLERANCE: f64 = 0.1;

/// Score `candidate` against `origin` on the `0..=10` scale.
///
/// Artist and title mismatches weigh most. A missing album name or duration
/// on the origin cannot be compared, so it costs a little and widens the
/// uncertainty instead, which the final normalization divides out.
pub fn score_standby(origin: &BriefSong, candidate: &BriefSong) -> f64 {
    let mut score = FULL_SCORE;
    let mut unsure = 0.0;

    if origin.artists_name != candidate.artists_name {
        score -= 3.0;
    }
    if origin.title != candidate.title {
        score -= 2.0;
    }

    if !origin.album_name.is_empty() {
        if origin.album_name != candidate.album_name {
            score -= 2.0;
        }
    } else {
        score -= 1.0;
        unsure += 2.0;
    }

    match origin.duration() {
        Some(d_origin) => {
            let d_candidate = candidate.duration().unwrap_or(0);
            let diff = d_origin.abs_diff(d_candidate) as f64;
            if diff / (d_origin.max(1) as f64) > DURATION_TOLERANCE {
                score -= 3.0;
            }
        }
        None => {
            score -= 1.0;
            unsure += 3.0;
        }
    }

    (score - unsure) / (FULL_SCORE - unsure) * FULL_SCORE
}

/// [`score_standby`] scaled to `0..=1`.
pub fn normalized_standby_score(origin: &BriefSong, candidate: &BriefSong) -> f64 {
    score_standby(origin, candidate) / FULL_SCORE
}

/// Ratcliff/Obershelp similarity of two strings in `0..=1`.
///
/// Twice the number of matching characters divided by the total length,
/// where matches are found by recursively taking the longest common block.
pub fn text_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (start_a, start_b, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..start_a], &b[..start_b])
        + matching_chars(&a[start_a + len..], &b[start_b + len..])
}

fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    // lengths[j + 1] = length of the common suffix ending at a[i], b[j]
    let mut lengths = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut next = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                next[j + 1] = lengths[j] + 1;
                if next[j + 1] > best.2 {
                    best = (i + 1 - next[j + 1], j + 1 - next[j + 1], next[j + 1]);
                }
            }
        }
        lengths = next;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(title: &str, artists: &str, album: &str, duration: &str) -> BriefSong {
        BriefSong::new("x", title, title)
            .with_artists_name(artists)
            .with_album_name(album)
            .with_duration_ms(duration)
    }

    #[test]
    fn test_exact_match_scores_full() {
        let origin = song("Blue", "A", "Colors", "03:35");
        let candidate = song("Blue", "A", "Colors", "03:35");
        assert_eq!(score_standby(&origin, &candidate), FULL_SCORE);
    }

    #[test]
    fn test_mismatches_lower_score() {
        let origin = song("Blue", "A", "Colors", "03:35");
        let other_artist = song("Blue", "B", "Colors", "03:35");
        assert_eq!(score_standby(&origin, &other_artist), 7.0);

        let other_take = song("Blue", "A", "Colors", "05:00");
        assert_eq!(score_standby(&origin, &other_take), 7.0);

        let close_take = song("Blue", "A", "Colors", "03:40");
        assert_eq!(score_standby(&origin, &close_take), FULL_SCORE);
    }

    #[test]
    fn test_missing_origin_fields_are_uncertain() {
        let origin = song("Blue", "A", "", "");
        let candidate = song("Blue", "A", "Colors", "03:35");
        // score 8, unsure 5 -> (8 - 5) / (10 - 5) * 10
        assert!((score_standby(&origin, &candidate) - 6.0).abs() < 1e-9);
        assert!(normalized_standby_score(&origin, &candidate) >= STANDBY_DEFAULT_MIN_SCORE);
    }

    #[test]
    fn test_poor_candidate_rejected() {
        let origin = song("Blue", "A", "Colors", "03:35");
        let candidate = song("Red", "B", "Shapes", "01:00");
        assert!(normalized_standby_score(&origin, &candidate) < STANDBY_DEFAULT_MIN_SCORE);
    }

    #[test]
    fn test_text_ratio() {
        assert_eq!(text_ratio("", ""), 1.0);
        assert_eq!(text_ratio("abc", "abc"), 1.0);
        assert_eq!(text_ratio("abc", "xyz"), 0.0);
        // "abcd" vs "bcde": block "bcd" -> 2 * 3 / 8
        assert!((text_ratio("abcd", "bcde") - 0.75).abs() < 1e-9);
        assert!(text_ratio("晴天 周杰伦", "晴天") > text_ratio("晴天 周杰伦", "七里香"));
    }
}
