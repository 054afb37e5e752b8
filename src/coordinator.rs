//! Task routing.
//!
//! A free-form task is classified into one or both domains. Mixed tasks become
//! one sub-request per domain, ordered by where each domain is first mentioned.
//! Sub-requests run one after another and their outputs are only combined once
//! every one of them has finished.

pub use crate::broker::Domain;

use crate::config::CoordinatorSettings;
use crate::error::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

static CLAUSE_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*(?:[,;]|\band\b|\bthen\b|\be\b|\bdepois\b)\s*")
        .expect("valid clause regex")
});

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid word regex"));

/// One unit of work for a single domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubRequest {
    pub domain: Domain,
    pub task: String,
}

/// Ordered decomposition of a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub task: String,
    pub steps: Vec<SubRequest>,
}

impl Plan {
    pub fn is_mixed(&self) -> bool {
        self.steps.len() > 1
    }
}

/// Keyword classifier over the two domains.
#[derive(Debug, Clone)]
pub struct Classifier {
    relational: Vec<String>,
    vector: Vec<String>,
    default_domain: Domain,
}

impl Classifier {
    pub fn new(settings: &CoordinatorSettings) -> Self {
        let lower = |words: &[String]| -> Vec<String> { words.iter().map(|w| w.to_lowercase()).collect() };
        Self {
            relational: lower(&settings.relational_keywords),
            vector: lower(&settings.vector_keywords),
            default_domain: settings.default_domain,
        }
    }

    /// Domains signalled in `text`, ordered by first mention.
    pub fn classify(&self, text: &str) -> Vec<Domain> {
        let mut hits: Vec<(usize, Domain)> = [
            (Domain::Relational, &self.relational),
            (Domain::Vector, &self.vector),
        ]
        .into_iter()
        .filter_map(|(domain, keywords)| first_mention(text, keywords).map(|pos| (pos, domain)))
        .collect();
        hits.sort_by_key(|(pos, _)| *pos);
        hits.into_iter().map(|(_, domain)| domain).collect()
    }

    /// Split `task` into per-domain sub-requests.
    pub fn plan(&self, task: &str) -> Plan {
        let task = task.trim();
        let domains = self.classify(task);

        let steps = match domains.len() {
            0 => vec![SubRequest {
                domain: self.default_domain,
                task: task.to_string(),
            }],
            1 => vec![SubRequest {
                domain: domains[0],
                task: task.to_string(),
            }],
            _ => self.split(task, &domains),
        };

        debug!("Planned {} step(s) for task", steps.len());
        Plan {
            task: task.to_string(),
            steps,
        }
    }

    /// Assign each clause to the domains it mentions; unsignalled clauses follow
    /// the previous clause, or the first domain if they lead the task.
    fn split(&self, task: &str, domains: &[Domain]) -> Vec<SubRequest> {
        let mut parts: Vec<(Domain, Vec<&str>)> = domains.iter().map(|d| (*d, Vec::new())).collect();
        let mut previous: Vec<Domain> = vec![domains[0]];

        for clause in CLAUSE_BREAK.split(task).map(str::trim).filter(|c| !c.is_empty()) {
            let signalled = self.classify(clause);
            if !signalled.is_empty() {
                previous = signalled;
            }
            for (domain, clauses) in parts.iter_mut() {
                if previous.contains(domain) {
                    clauses.push(clause);
                }
            }
        }

        parts
            .into_iter()
            .map(|(domain, clauses)| SubRequest {
                domain,
                task: if clauses.is_empty() {
                    task.to_string()
                } else {
                    clauses.join(", ")
                },
            })
            .collect()
    }
}

/// Byte offset of the earliest keyword match in `text`.
///
/// Single words match whole words, or word prefixes when the keyword has at
/// least four characters ("record" matches "records"). Phrases match as
/// substrings.
fn first_mention(text: &str, keywords: &[String]) -> Option<usize> {
    let lower = text.to_lowercase();
    let mut best: Option<usize> = None;

    for keyword in keywords.iter().filter(|k| !k.is_empty()) {
        let pos = if keyword.contains(' ') {
            lower.find(keyword.as_str())
        } else {
            words(&lower).find_map(|(pos, word)| {
                let matched = word == keyword
                    || (keyword.chars().count() >= 4 && word.starts_with(keyword.as_str()));
                matched.then_some(pos)
            })
        };
        if let Some(pos) = pos {
            best = Some(best.map_or(pos, |b| b.min(pos)));
        }
    }
    best
}

fn words(text: &str) -> impl Iterator<Item = (usize, &str)> {
    WORD.find_iter(text).map(|m| (m.start(), m.as_str()))
}

/// Executes one sub-request.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, request: &SubRequest) -> Result<String>;
}

/// Output of one executed sub-request.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub domain: Domain,
    pub task: String,
    pub output: String,
}

/// Result of running a whole plan.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub plan: Plan,
    pub steps: Vec<StepOutcome>,
    pub combined: String,
}

/// Routes tasks and runs their sub-requests.
pub struct Coordinator {
    classifier: Classifier,
    handler: Arc<dyn TaskHandler>,
}

impl Coordinator {
    pub fn new(classifier: Classifier, handler: Arc<dyn TaskHandler>) -> Self {
        Self {
            classifier,
            handler,
        }
    }

    pub fn plan(&self, task: &str) -> Plan {
        self.classifier.plan(task)
    }

    /// Run every step in order. Any failure aborts the run before combining.
    pub async fn run(&self, task: &str) -> Result<Outcome> {
        let plan = self.plan(task);
        let mut steps = Vec::with_capacity(plan.steps.len());

        for (i, step) in plan.steps.iter().enumerate() {
            info!("Step {}/{}: {} task", i + 1, plan.steps.len(), step.domain);
            let output = self.handler.handle(step).await?;
            steps.push(StepOutcome {
                domain: step.domain,
                task: step.task.clone(),
                output,
            });
        }

        let combined = combine(&steps);
        Ok(Outcome {
            plan,
            steps,
            combined,
        })
    }
}

fn combine(steps: &[StepOutcome]) -> String {
    match steps {
        [single] => single.output.clone(),
        _ => steps
            .iter()
            .map(|s| format!("## {} ({})\n\n{}", s.task, s.domain, s.output.trim()))
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrokerError;
    use std::sync::Mutex;

    fn classifier() -> Classifier {
        Classifier::new(&CoordinatorSettings::default())
    }

    fn domains(plan: &Plan) -> Vec<Domain> {
        plan.steps.iter().map(|s| s.domain).collect()
    }

    #[test]
    fn test_single_domain_tasks() {
        let c = classifier();
        assert_eq!(
            domains(&c.plan("Create a record in the users table for Ana")),
            vec![Domain::Relational]
        );
        assert_eq!(
            domains(&c.plan("Search the documents for the travel policy")),
            vec![Domain::Vector]
        );
    }

    #[test]
    fn test_unsignalled_task_uses_default() {
        let plan = classifier().plan("How many vacation days do employees get?");
        assert_eq!(domains(&plan), vec![Domain::Vector]);
        assert_eq!(plan.steps[0].task, "How many vacation days do employees get?");
    }

    #[test]
    fn test_mixed_task_follows_mention_order() {
        let c = classifier();

        let plan = c.plan("search documents and record a summary");
        assert!(plan.is_mixed());
        assert_eq!(domains(&plan), vec![Domain::Vector, Domain::Relational]);
        assert_eq!(plan.steps[0].task, "search documents");
        assert_eq!(plan.steps[1].task, "record a summary");

        let plan = c.plan("Update the users table, then find the onboarding policy");
        assert_eq!(domains(&plan), vec![Domain::Relational, Domain::Vector]);
    }

    #[test]
    fn test_trailing_clause_follows_previous_domain() {
        let plan = classifier().plan("find the expense policy and summarize it, then save it in the table");
        assert_eq!(domains(&plan), vec![Domain::Vector, Domain::Relational]);
        assert_eq!(plan.steps[0].task, "find the expense policy, summarize it");
    }

    #[test]
    fn test_keyword_prefix_matching() {
        let c = classifier();
        assert_eq!(c.classify("list all documents"), vec![Domain::Vector]);
        assert_eq!(c.classify("registros na tabela"), vec![Domain::Relational]);
        assert!(c.classify("dbx").is_empty());
    }

    struct Recorder {
        seen: Mutex<Vec<Domain>>,
        fail_on: Option<Domain>,
    }

    #[async_trait]
    impl TaskHandler for Recorder {
        async fn handle(&self, request: &SubRequest) -> Result<String> {
            self.seen.lock().unwrap().push(request.domain);
            if self.fail_on == Some(request.domain) {
                return Err(BrokerError::Agent("boom".to_string()));
            }
            Ok(format!("done: {}", request.task))
        }
    }

    #[tokio::test]
    async fn test_run_executes_in_order_and_combines() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            fail_on: None,
        });
        let coordinator = Coordinator::new(classifier(), recorder.clone());

        let outcome = coordinator
            .run("search documents and record a summary")
            .await
            .unwrap();

        assert_eq!(*recorder.seen.lock().unwrap(), vec![Domain::Vector, Domain::Relational]);
        assert_eq!(outcome.steps.len(), 2);
        let first = outcome.combined.find("done: search documents").unwrap();
        let second = outcome.combined.find("done: record a summary").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_failure_yields_no_combined_output() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            fail_on: Some(Domain::Vector),
        });
        let coordinator = Coordinator::new(classifier(), recorder.clone());

        let result = coordinator.run("search documents and record a summary").await;
        assert!(matches!(result, Err(BrokerError::Agent(_))));
        assert_eq!(*recorder.seen.lock().unwrap(), vec![Domain::Vector]);
    }

    #[tokio::test]
    async fn test_single_step_output_is_passed_through() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            fail_on: None,
        });
        let coordinator = Coordinator::new(classifier(), recorder);
        let outcome = coordinator.run("list the tables").await.unwrap();
        assert_eq!(outcome.combined, "done: list the tables");
    }
}
