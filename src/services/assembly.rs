//! Difficulty-balanced random selection for automatically assembled exams.

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::db::models::Question;
use crate::db::types::DifficultyLevel;

#[derive(Debug, Error)]
pub(crate) enum AssemblyError {
    #[error("Not enough {difficulty} questions in the course bank. Required: {required}, available: {available}")]
    InsufficientPool { difficulty: DifficultyLevel, required: usize, available: usize },
    #[error("Assembled question set has {actual} questions, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BucketCounts {
    pub(crate) simple: usize,
    pub(crate) medium: usize,
    pub(crate) hard: usize,
}

/// Splits a requested total into per-difficulty bucket sizes. Simple and
/// hard each get a third (rounded down); medium absorbs the remainder.
pub(crate) fn bucket_counts(total: usize) -> BucketCounts {
    let third = total / 3;
    BucketCounts { simple: third, medium: total - 2 * third, hard: third }
}

/// Draws a balanced question set from the three difficulty pools.
///
/// Each pool is shuffled independently with the supplied generator and the
/// bucket-sized prefix is taken, so any eligible question is equally likely
/// to be picked. Pool deficits are reported per tier before any draw.
pub(crate) fn select_balanced<R: Rng + ?Sized>(
    rng: &mut R,
    mut simple_pool: Vec<Question>,
    mut medium_pool: Vec<Question>,
    mut hard_pool: Vec<Question>,
    total: usize,
) -> Result<Vec<Question>, AssemblyError> {
    let counts = bucket_counts(total);

    let deficits = [
        (DifficultyLevel::Simple, counts.simple, simple_pool.len()),
        (DifficultyLevel::Medium, counts.medium, medium_pool.len()),
        (DifficultyLevel::Hard, counts.hard, hard_pool.len()),
    ];
    for (difficulty, required, available) in deficits {
        if available < required {
            return Err(AssemblyError::InsufficientPool { difficulty, required, available });
        }
    }

    let mut selected = Vec::with_capacity(total);
    for (pool, count) in [
        (&mut simple_pool, counts.simple),
        (&mut medium_pool, counts.medium),
        (&mut hard_pool, counts.hard),
    ] {
        pool.shuffle(rng);
        selected.extend(pool.drain(..count));
    }

    if selected.len() != total {
        return Err(AssemblyError::SizeMismatch { expected: total, actual: selected.len() });
    }

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use time::macros::datetime;

    fn pool(difficulty: DifficultyLevel, size: usize) -> Vec<Question> {
        (0..size)
            .map(|n| Question {
                id: format!("{difficulty}-{n}"),
                course_id: "course-1".to_string(),
                instructor_id: "instructor-1".to_string(),
                title: format!("{difficulty} question {n}"),
                mark: 5,
                difficulty,
                is_deleted: false,
                created_at: datetime!(2025-01-01 09:00:00),
            })
            .collect()
    }

    #[test]
    fn bucket_counts_splits_evenly_divisible_totals() {
        assert_eq!(bucket_counts(9), BucketCounts { simple: 3, medium: 3, hard: 3 });
    }

    #[test]
    fn bucket_counts_gives_remainder_to_medium() {
        assert_eq!(bucket_counts(10), BucketCounts { simple: 3, medium: 4, hard: 3 });
        assert_eq!(bucket_counts(11), BucketCounts { simple: 3, medium: 5, hard: 3 });
    }

    #[test]
    fn bucket_counts_single_question_is_medium() {
        assert_eq!(bucket_counts(1), BucketCounts { simple: 0, medium: 1, hard: 0 });
    }

    #[test]
    fn selects_exact_bucket_sizes() {
        let mut rng = StdRng::seed_from_u64(7);
        let selected = select_balanced(
            &mut rng,
            pool(DifficultyLevel::Simple, 6),
            pool(DifficultyLevel::Medium, 6),
            pool(DifficultyLevel::Hard, 6),
            10,
        )
        .unwrap();

        assert_eq!(selected.len(), 10);
        let count = |d: DifficultyLevel| selected.iter().filter(|q| q.difficulty == d).count();
        assert_eq!(count(DifficultyLevel::Simple), 3);
        assert_eq!(count(DifficultyLevel::Medium), 4);
        assert_eq!(count(DifficultyLevel::Hard), 3);
    }

    #[test]
    fn selected_questions_are_distinct() {
        let mut rng = StdRng::seed_from_u64(7);
        let selected = select_balanced(
            &mut rng,
            pool(DifficultyLevel::Simple, 4),
            pool(DifficultyLevel::Medium, 4),
            pool(DifficultyLevel::Hard, 4),
            9,
        )
        .unwrap();

        let mut ids: Vec<&str> = selected.iter().map(|q| q.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 9);
    }

    #[test]
    fn deficient_tier_is_named_in_the_error() {
        let mut rng = StdRng::seed_from_u64(7);
        let err = select_balanced(
            &mut rng,
            pool(DifficultyLevel::Simple, 5),
            pool(DifficultyLevel::Medium, 5),
            pool(DifficultyLevel::Hard, 2),
            10,
        )
        .unwrap_err();

        match err {
            AssemblyError::InsufficientPool { difficulty, required, available } => {
                assert_eq!(difficulty, DifficultyLevel::Hard);
                assert_eq!(required, 3);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_total_selects_nothing() {
        let mut rng = StdRng::seed_from_u64(7);
        let selected = select_balanced(&mut rng, vec![], vec![], vec![], 0).unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn same_seed_produces_same_selection() {
        let draw = || {
            let mut rng = StdRng::seed_from_u64(42);
            select_balanced(
                &mut rng,
                pool(DifficultyLevel::Simple, 8),
                pool(DifficultyLevel::Medium, 8),
                pool(DifficultyLevel::Hard, 8),
                10,
            )
            .unwrap()
        };

        let first: Vec<String> = draw().into_iter().map(|q| q.id).collect();
        let second: Vec<String> = draw().into_iter().map(|q| q.id).collect();
        assert_eq!(first, second);
    }
}
