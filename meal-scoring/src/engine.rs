//! Urgency Scoring Engine
//!
//! Scores a school from its issue history: deterministic factors first, then
//! an advisor call under a hard deadline, then the rule-based formula if the
//! advisor fails, hangs or answers free text. A score is always produced.
//!
//! Batches run in fixed-size groups; within a group schools are scored
//! concurrently and a failure stays with its own school.

use crate::advisor::AiAdvisor;
use crate::config::ScoringConfig;
use crate::factors::IssueFactors;
use crate::fallback::{rule_based_reasoning, rule_based_score};
use crate::parser::{parse_reply, AdvisorReply};
use crate::prompt::build_prompt;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use meal_core::logging::operations;
use meal_core::{Issue, MealResult, SchoolId, SchoolPriority, ScoreSource};
use meal_store::{IssueRepository, SchoolPriorityRepository};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Score of one school
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub school_id: SchoolId,
    /// 0 to 100
    pub score: u8,
    pub reasoning: String,
    pub factors: IssueFactors,
    pub source: ScoreSource,
    pub scored_at: DateTime<Utc>,
}

impl ScoreResult {
    /// Priority record to write back
    pub fn to_priority(&self) -> SchoolPriority {
        SchoolPriority {
            school_id: self.school_id.clone(),
            priority_score: f64::from(self.score),
            source: self.source,
            reasoning: self.reasoning.clone(),
            last_scored_at: self.scored_at,
        }
    }
}

/// Outcome of a batch run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BatchScoreReport {
    /// One entry per requested school
    pub results: HashMap<SchoolId, ScoreResult>,
    pub advisor_scored: usize,
    pub fallback_scored: usize,
    /// Schools whose issue lookup failed; scored as having no issues
    pub lookup_failed: Vec<SchoolId>,
    /// Priorities written back (store variant only)
    pub stored: usize,
    pub duration_ms: u64,
}

impl BatchScoreReport {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, school_id: &SchoolId) -> Option<&ScoreResult> {
        self.results.get(school_id)
    }
}

/// Urgency Scoring Engine
pub struct UrgencyScoringEngine {
    issues: Arc<dyn IssueRepository>,
    priorities: Arc<dyn SchoolPriorityRepository>,
    advisor: Option<Arc<dyn AiAdvisor>>,
    config: ScoringConfig,
}

impl UrgencyScoringEngine {
    pub fn new(
        issues: Arc<dyn IssueRepository>,
        priorities: Arc<dyn SchoolPriorityRepository>,
        advisor: Option<Arc<dyn AiAdvisor>>,
        config: ScoringConfig,
    ) -> Self {
        Self {
            issues,
            priorities,
            advisor,
            config,
        }
    }

    /// Engine over one store serving both issue reads and priority writes
    pub fn with_store<S>(
        store: Arc<S>,
        advisor: Option<Arc<dyn AiAdvisor>>,
        config: ScoringConfig,
    ) -> Self
    where
        S: IssueRepository + SchoolPriorityRepository + 'static,
    {
        Self::new(store.clone(), store, advisor, config)
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a school from the given issues
    ///
    /// With `use_ai` and an advisor configured, the advisor is consulted
    /// first; any advisor failure falls back to the rule-based score.
    pub async fn score(&self, school_id: &SchoolId, issues: &[Issue], use_ai: bool) -> ScoreResult {
        let now = Utc::now();
        let factors = IssueFactors::compute(issues, now, self.config.recent_window_days);

        if use_ai {
            if let Some(advisor) = &self.advisor {
                match self.consult(advisor.as_ref(), school_id, &factors, issues).await {
                    Ok((score, reasoning)) => {
                        debug!(school_id = %school_id, score = score, "Advisor score");
                        return ScoreResult {
                            school_id: school_id.clone(),
                            score,
                            reasoning: format!("AI advisor: {}", reasoning),
                            factors,
                            source: ScoreSource::Advisor,
                            scored_at: now,
                        };
                    }
                    Err(reason) => {
                        warn!(
                            school_id = %school_id,
                            error = %reason,
                            "Advisor unavailable, using rule-based score"
                        );
                    }
                }
            }
        }

        self.rule_based(school_id, factors, now)
    }

    /// Fetch a school's issues and score them
    pub async fn score_school(&self, school_id: &SchoolId, use_ai: bool) -> MealResult<ScoreResult> {
        let issues = self.issues.issues_for_school(school_id).await?;
        Ok(self.score(school_id, &issues, use_ai).await)
    }

    /// Fetch, score and write back one school's priority
    pub async fn score_and_store(
        &self,
        school_id: &SchoolId,
        use_ai: bool,
    ) -> MealResult<ScoreResult> {
        let result = self.score_school(school_id, use_ai).await?;
        self.priorities
            .put_school_priority(result.to_priority())
            .await?;

        info!(
            school_id = %school_id,
            score = result.score,
            source = result.source.as_str(),
            operation = operations::SCORE,
            "School priority updated"
        );
        Ok(result)
    }

    /// Score many schools in bounded concurrent groups
    ///
    /// Always yields one entry per distinct school id; repeats are scored
    /// once. A failed issue lookup scores that school as having no issues.
    pub async fn batch_score(&self, school_ids: &[SchoolId], use_ai: bool) -> BatchScoreReport {
        let started = Instant::now();
        let group_size = self.config.group_size.max(1);
        let progress_interval = self.config.progress_interval.max(1);

        let mut seen = HashSet::new();
        let school_ids: Vec<SchoolId> = school_ids
            .iter()
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect();
        let total = school_ids.len();

        let mut report = BatchScoreReport::default();
        let mut completed = 0usize;

        for group in school_ids.chunks(group_size) {
            let scored: Vec<(ScoreResult, bool)> = stream::iter(group.iter().cloned())
                .map(|school_id| {
                    let engine = self;
                    async move { engine.score_isolated(school_id, use_ai).await }
                })
                .buffer_unordered(group_size)
                .collect()
                .await;

            for (result, lookup_failed) in scored {
                if lookup_failed {
                    report.lookup_failed.push(result.school_id.clone());
                }
                match result.source {
                    ScoreSource::Advisor => report.advisor_scored += 1,
                    ScoreSource::RuleBased => report.fallback_scored += 1,
                }
                report.results.insert(result.school_id.clone(), result);

                completed += 1;
                if completed % progress_interval == 0 {
                    info!(
                        completed = completed,
                        total = total,
                        operation = operations::BATCH_SCORE,
                        "Batch scoring progress"
                    );
                }
            }
        }

        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            count = report.results.len(),
            advisor = report.advisor_scored,
            fallback = report.fallback_scored,
            lookup_failed = report.lookup_failed.len(),
            duration_ms = report.duration_ms,
            operation = operations::BATCH_SCORE,
            "Batch scoring finished"
        );
        report
    }

    /// Batch score and write back every successfully looked-up school
    ///
    /// Schools whose lookup failed keep their previous priority. Write
    /// failures are logged and skipped.
    pub async fn batch_score_and_store(
        &self,
        school_ids: &[SchoolId],
        use_ai: bool,
    ) -> BatchScoreReport {
        let mut report = self.batch_score(school_ids, use_ai).await;

        let failed: HashSet<&SchoolId> = report.lookup_failed.iter().collect();
        for (school_id, result) in &report.results {
            if failed.contains(school_id) {
                continue;
            }
            match self
                .priorities
                .put_school_priority(result.to_priority())
                .await
            {
                Ok(()) => report.stored += 1,
                Err(e) => warn!(
                    school_id = %school_id,
                    error = %e,
                    "Failed to store school priority"
                ),
            }
        }
        report
    }

    async fn score_isolated(&self, school_id: SchoolId, use_ai: bool) -> (ScoreResult, bool) {
        match self.issues.issues_for_school(&school_id).await {
            Ok(issues) => (self.score(&school_id, &issues, use_ai).await, false),
            Err(e) => {
                warn!(
                    school_id = %school_id,
                    error = %e,
                    "Issue lookup failed, scoring as no issues"
                );
                (
                    self.rule_based(&school_id, IssueFactors::default(), Utc::now()),
                    true,
                )
            }
        }
    }

    async fn consult(
        &self,
        advisor: &dyn AiAdvisor,
        school_id: &SchoolId,
        factors: &IssueFactors,
        issues: &[Issue],
    ) -> Result<(u8, String), String> {
        let prompt = build_prompt(school_id, factors, issues, self.config.max_prompt_issues);
        let deadline = Duration::from_millis(self.config.advisor_timeout_ms);

        let text = match tokio::time::timeout(
            deadline,
            advisor.complete(&prompt, self.config.advisor_max_tokens),
        )
        .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(e.to_string()),
            Err(_) => {
                return Err(format!(
                    "no reply within {}ms",
                    self.config.advisor_timeout_ms
                ))
            }
        };

        match parse_reply(&text) {
            AdvisorReply::Parsed { score, reasoning } => Ok((score, reasoning)),
            AdvisorReply::Unparseable => Err("reply had no SCORE or REASONING".to_string()),
        }
    }

    fn rule_based(
        &self,
        school_id: &SchoolId,
        factors: IssueFactors,
        now: DateTime<Utc>,
    ) -> ScoreResult {
        ScoreResult {
            school_id: school_id.clone(),
            score: rule_based_score(&factors),
            reasoning: rule_based_reasoning(&factors),
            factors,
            source: ScoreSource::RuleBased,
            scored_at: now,
        }
    }
}
