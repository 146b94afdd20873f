//! Scholarship matching: an oversized model-generated list, each entry checked
//! for a live application link and a deadline that has not passed.

use std::time::Duration;

use async_trait::async_trait;
use candidate_engine::{BatchGenerator, VerificationVerdict, Verifier};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::ChatClient;
use crate::error::Result as AdapterResult;
use crate::link_check::LinkVerifier;
use crate::parse::json_array;

/// Student profile used to tailor matches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudentProfile {
    pub major: String,
    pub gpa: Option<f32>,
    pub year: Option<String>,
    pub interests: Vec<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scholarship {
    pub name: String,
    #[serde(default)]
    pub amount: String,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub deadline: String,
    #[serde(alias = "applicationUrl", alias = "url")]
    pub application_url: String,
    #[serde(default)]
    pub eligibility: String,
}

/// Deadlines before `reference_date` are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScholarshipCriteria {
    pub reference_date: NaiveDate,
}

impl ScholarshipCriteria {
    pub fn today() -> Self {
        ScholarshipCriteria {
            reference_date: Utc::now().date_naive(),
        }
    }
}

const SYSTEM_PROMPT: &str = "You match students with real, currently open scholarships. \
Reply with a JSON array only. Each element: {\"name\": string, \"amount\": string, \
\"deadline\": \"YYYY-MM-DD\", \"application_url\": string, \"eligibility\": string}.";

fn user_prompt(profile: &StudentProfile, count: usize) -> String {
    let mut prompt = format!("List {count} scholarships for a {} student.", profile.major);
    if let Some(year) = &profile.year {
        prompt.push_str(&format!("\nYear: {year}"));
    }
    if let Some(gpa) = profile.gpa {
        prompt.push_str(&format!("\nGPA: {gpa:.2}"));
    }
    if let Some(state) = &profile.state {
        prompt.push_str(&format!("\nState of residence: {state}"));
    }
    if !profile.interests.is_empty() {
        prompt.push_str(&format!("\nInterests: {}", profile.interests.join(", ")));
    }
    prompt
}

pub fn parse_scholarships(reply: &str) -> AdapterResult<Vec<Scholarship>> {
    let entries: Vec<serde_json::Value> = json_array(reply)?;
    // Drop individual malformed entries rather than the whole batch.
    Ok(entries
        .into_iter()
        .filter_map(|v| serde_json::from_value::<Scholarship>(v).ok())
        .collect())
}

/// Checks that need no network: name present, deadline parseable and current.
pub fn check_fields(
    scholarship: &Scholarship,
    criteria: &ScholarshipCriteria,
) -> Option<VerificationVerdict> {
    if scholarship.name.trim().is_empty() {
        return Some(VerificationVerdict::invalid("missing name"));
    }
    let deadline = match NaiveDate::parse_from_str(scholarship.deadline.trim(), "%Y-%m-%d") {
        Ok(date) => date,
        Err(_) => {
            return Some(VerificationVerdict::invalid(format!(
                "unparseable deadline {:?}",
                scholarship.deadline
            )))
        }
    };
    if deadline < criteria.reference_date {
        return Some(VerificationVerdict::invalid(format!(
            "deadline {deadline} has passed"
        )));
    }
    None
}

pub struct ScholarshipGenerator {
    chat: ChatClient,
}

impl ScholarshipGenerator {
    pub fn new(chat: ChatClient) -> Self {
        ScholarshipGenerator { chat }
    }
}

#[async_trait]
impl BatchGenerator<StudentProfile, Scholarship> for ScholarshipGenerator {
    async fn generate_batch(
        &self,
        request: &StudentProfile,
        count: usize,
        timeout: Duration,
    ) -> candidate_engine::Result<Vec<Scholarship>> {
        let reply = self
            .chat
            .complete(SYSTEM_PROMPT, &user_prompt(request, count), timeout)
            .await
            .map_err(|e| e.into_generator())?;
        let mut batch = parse_scholarships(&reply).map_err(|e| e.into_generator())?;
        batch.truncate(count);
        Ok(batch)
    }
}

pub struct ScholarshipVerifier {
    links: LinkVerifier,
}

impl ScholarshipVerifier {
    pub fn new(links: LinkVerifier) -> Self {
        ScholarshipVerifier { links }
    }
}

#[async_trait]
impl Verifier<Scholarship, ScholarshipCriteria> for ScholarshipVerifier {
    async fn verify(
        &self,
        candidate: &Scholarship,
        criteria: &ScholarshipCriteria,
        timeout: Duration,
    ) -> candidate_engine::Result<VerificationVerdict> {
        if let Some(rejection) = check_fields(candidate, criteria) {
            return Ok(rejection);
        }
        self.links.check(&candidate.application_url, timeout).await
    }
}
