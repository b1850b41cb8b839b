//! Resolves one difficulty slot: generated content when possible, bank
//! content otherwise. Bank content gets its options shuffled.

use std::time::Duration;

use chrono::NaiveDate;
use rand::Rng;
use rand::seq::SliceRandom;

use super::generator::{ChallengeGenerator, GenerationRequest};
use super::rotation::RecentHistory;
use crate::models::challenge::{
    ChallengeSource, ChallengeTemplate, Difficulty, NewChallenge, OPTION_COUNT,
};

/// Number of recent titles the generator is told to avoid.
pub const AVOID_TITLES_SAMPLE: usize = 10;

pub struct SlotContext<'a> {
    pub date: NaiveDate,
    pub difficulty: Difficulty,
    /// Bank template chosen for this slot by the rotation.
    pub fallback: &'a ChallengeTemplate,
    pub recent: &'a RecentHistory,
    pub timeout: Duration,
}

/// Never fails: every generator problem ends in the bank template.
pub async fn resolve_slot(generator: Option<&dyn ChallengeGenerator>, ctx: &SlotContext<'_>) -> NewChallenge {
    let generated = match generator {
        Some(generator) => match try_generate(generator, ctx).await {
            Ok(template) => Some(template),
            Err(reason) => {
                tracing::warn!(difficulty = %ctx.difficulty, %reason, "Generator failed, using fallback");
                None
            }
        },
        None => {
            tracing::info!(difficulty = %ctx.difficulty, "No generator configured, using fallback");
            None
        }
    };

    match generated {
        Some(template) => {
            tracing::info!(difficulty = %ctx.difficulty, title = %template.title, "Generated challenge");
            into_new_challenge(template, ctx, ChallengeSource::Generated)
        }
        None => {
            let (options, correct_answer) = shuffle_options(
                &ctx.fallback.options,
                ctx.fallback.correct_answer,
                &mut rand::thread_rng(),
            );
            let template = ChallengeTemplate {
                options,
                correct_answer,
                ..ctx.fallback.clone()
            };
            into_new_challenge(template, ctx, ChallengeSource::Fallback)
        }
    }
}

async fn try_generate(
    generator: &dyn ChallengeGenerator,
    ctx: &SlotContext<'_>,
) -> Result<ChallengeTemplate, String> {
    let request = GenerationRequest {
        difficulty: ctx.difficulty,
        avoid_titles: ctx.recent.recent_titles(AVOID_TITLES_SAMPLE),
    };

    let template = tokio::time::timeout(ctx.timeout, generator.generate(&request))
        .await
        .map_err(|_| format!("generator timed out after {:?}", ctx.timeout))??;

    validate_generated(&template, ctx.recent)?;
    Ok(template)
}

/// Checks a generated challenge has the required shape and is new.
pub fn validate_generated(template: &ChallengeTemplate, recent: &RecentHistory) -> Result<(), String> {
    if template.title.trim().is_empty() {
        return Err("generated challenge has an empty title".to_string());
    }
    if template.question.trim().is_empty() {
        return Err("generated challenge has an empty question".to_string());
    }
    if template.options.len() != OPTION_COUNT {
        return Err(format!(
            "generated challenge has {} options, expected {}",
            template.options.len(),
            OPTION_COUNT
        ));
    }
    if template.options.iter().any(|o| o.trim().is_empty()) {
        return Err("generated challenge has an empty option".to_string());
    }
    if template.correct_answer >= OPTION_COUNT {
        return Err(format!(
            "generated correct_answer {} is out of range",
            template.correct_answer
        ));
    }
    if recent.contains_title(&template.title) {
        return Err(format!("generated title '{}' was served recently", template.title));
    }
    Ok(())
}

/// Fisher-Yates shuffle of `options`, returning the new index of the answer
/// that was at `correct`.
pub fn shuffle_options<R: Rng + ?Sized>(
    options: &[String],
    correct: usize,
    rng: &mut R,
) -> (Vec<String>, usize) {
    let mut order: Vec<usize> = (0..options.len()).collect();
    order.shuffle(rng);

    let shuffled = order.iter().map(|&i| options[i].clone()).collect();
    let new_correct = order.iter().position(|&i| i == correct).unwrap_or(correct);
    (shuffled, new_correct)
}

fn into_new_challenge(
    template: ChallengeTemplate,
    ctx: &SlotContext<'_>,
    source: ChallengeSource,
) -> NewChallenge {
    NewChallenge {
        title: template.title.trim().to_string(),
        description: template.description,
        question: template.question,
        options: template.options,
        correct_answer: template.correct_answer,
        explanation: template.explanation,
        hint: template.hint,
        difficulty: ctx.difficulty,
        points: ctx.difficulty.points(),
        date_assigned: ctx.date,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::models::challenge::HistoryRecord;

    fn template(title: &str) -> ChallengeTemplate {
        ChallengeTemplate {
            title: title.to_string(),
            description: "desc".to_string(),
            question: format!("Where does {} come from?", title),
            options: vec!["right".into(), "wrong 1".into(), "wrong 2".into(), "wrong 3".into()],
            correct_answer: 0,
            explanation: "because".to_string(),
            hint: "think".to_string(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    struct Fixed(Result<ChallengeTemplate, String>);

    #[async_trait]
    impl ChallengeGenerator for Fixed {
        async fn generate(&self, _request: &GenerationRequest) -> Result<ChallengeTemplate, String> {
            self.0.clone()
        }
    }

    struct Slow;

    #[async_trait]
    impl ChallengeGenerator for Slow {
        async fn generate(&self, _request: &GenerationRequest) -> Result<ChallengeTemplate, String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(template("Too Late"))
        }
    }

    fn ctx<'a>(
        difficulty: Difficulty,
        fallback: &'a ChallengeTemplate,
        recent: &'a RecentHistory,
    ) -> SlotContext<'a> {
        SlotContext {
            date: date(),
            difficulty,
            fallback,
            recent,
            timeout: Duration::from_millis(50),
        }
    }

    #[test]
    fn shuffle_keeps_correct_answer_content() {
        let options: Vec<String> = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            for correct in 0..4 {
                let (shuffled, new_correct) = shuffle_options(&options, correct, &mut rng);
                assert_eq!(shuffled[new_correct], options[correct]);
                let mut sorted = shuffled.clone();
                sorted.sort();
                assert_eq!(sorted, options);
            }
        }
    }

    #[test]
    fn shuffle_moves_the_answer_around() {
        let options: Vec<String> = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        let mut rng = StdRng::seed_from_u64(7);
        let positions: std::collections::HashSet<usize> = (0..100)
            .map(|_| shuffle_options(&options, 0, &mut rng).1)
            .collect();
        assert_eq!(positions.len(), 4);
    }

    #[tokio::test]
    async fn no_generator_uses_shuffled_fallback() {
        let fallback = template("Roman Heritage");
        let recent = RecentHistory::default();

        let resolved = resolve_slot(None, &ctx(Difficulty::Medium, &fallback, &recent)).await;

        assert_eq!(resolved.source, ChallengeSource::Fallback);
        assert_eq!(resolved.title, "Roman Heritage");
        assert_eq!(resolved.points, 20);
        assert_eq!(resolved.difficulty, Difficulty::Medium);
        assert_eq!(resolved.date_assigned, date());
        assert_eq!(resolved.options[resolved.correct_answer], "right");
    }

    #[tokio::test]
    async fn valid_generated_content_is_used_verbatim() {
        let fallback = template("Fallback");
        let mut generated = template("Fresh Words");
        generated.correct_answer = 3;
        let recent = RecentHistory::default();
        let generator = Fixed(Ok(generated.clone()));

        let resolved = resolve_slot(Some(&generator), &ctx(Difficulty::Hard, &fallback, &recent)).await;

        assert_eq!(resolved.source, ChallengeSource::Generated);
        assert_eq!(resolved.options, generated.options);
        assert_eq!(resolved.correct_answer, 3);
        assert_eq!(resolved.points, 30);
    }

    #[tokio::test]
    async fn generator_error_falls_back() {
        let fallback = template("Fallback");
        let recent = RecentHistory::default();
        let generator = Fixed(Err("generator HTTP 500".to_string()));

        let resolved = resolve_slot(Some(&generator), &ctx(Difficulty::Easy, &fallback, &recent)).await;

        assert_eq!(resolved.source, ChallengeSource::Fallback);
        assert_eq!(resolved.title, "Fallback");
        assert_eq!(resolved.points, 10);
    }

    #[tokio::test]
    async fn malformed_generated_content_falls_back() {
        let fallback = template("Fallback");
        let recent = RecentHistory::default();

        let mut three_options = template("Short");
        three_options.options.pop();
        let mut bad_index = template("Bad Index");
        bad_index.correct_answer = 4;
        let mut untitled = template("x");
        untitled.title = "   ".to_string();

        for bad in [three_options, bad_index, untitled] {
            let generator = Fixed(Ok(bad));
            let resolved =
                resolve_slot(Some(&generator), &ctx(Difficulty::Easy, &fallback, &recent)).await;
            assert_eq!(resolved.source, ChallengeSource::Fallback);
        }
    }

    #[tokio::test]
    async fn recently_served_generated_title_falls_back() {
        let fallback = template("Fallback");
        let records = vec![HistoryRecord {
            title: "Fresh Words".to_string(),
            question: "q".to_string(),
            date_assigned: date(),
        }];
        let recent = RecentHistory::from_records(&records);
        let generator = Fixed(Ok(template("  fresh words ")));

        let resolved = resolve_slot(Some(&generator), &ctx(Difficulty::Easy, &fallback, &recent)).await;
        assert_eq!(resolved.source, ChallengeSource::Fallback);
    }

    #[tokio::test]
    async fn slow_generator_times_out_to_fallback() {
        let fallback = template("Fallback");
        let recent = RecentHistory::default();

        let resolved = resolve_slot(Some(&Slow), &ctx(Difficulty::Hard, &fallback, &recent)).await;
        assert_eq!(resolved.source, ChallengeSource::Fallback);
        assert_eq!(resolved.points, 30);
    }
}
