//! Study resource recommendations: one model-suggested link, verified reachable.

use std::time::Duration;

use async_trait::async_trait;
use candidate_engine::{Generator, VerificationVerdict, Verifier};
use serde::{Deserialize, Serialize};

use crate::chat::ChatClient;
use crate::error::Result as AdapterResult;
use crate::link_check::LinkVerifier;
use crate::parse::{is_null_reply, json_object};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTopic {
    pub topic: String,
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyResource {
    pub title: String,
    pub url: String,
}

const SYSTEM_PROMPT: &str = "You recommend free, publicly accessible study resources. \
Reply with a single JSON object {\"title\": string, \"url\": string} pointing at a page \
that exists today, or the bare word null if you know of none.";

fn user_prompt(topic: &ResourceTopic) -> String {
    match topic.level.as_deref() {
        Some(level) => format!("Topic: {}\nLevel: {}", topic.topic, level),
        None => format!("Topic: {}", topic.topic),
    }
}

/// Parse a model reply into a resource. `null` and blank fields mean no candidate.
pub fn parse_resource(reply: &str) -> AdapterResult<Option<StudyResource>> {
    if is_null_reply(reply) {
        return Ok(None);
    }
    let resource: StudyResource = json_object(reply)?;
    if resource.title.trim().is_empty() || resource.url.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(StudyResource {
        title: resource.title.trim().to_string(),
        url: resource.url.trim().to_string(),
    }))
}

pub struct ResourceGenerator {
    chat: ChatClient,
}

impl ResourceGenerator {
    pub fn new(chat: ChatClient) -> Self {
        ResourceGenerator { chat }
    }
}

#[async_trait]
impl Generator<ResourceTopic, StudyResource> for ResourceGenerator {
    async fn generate(
        &self,
        request: &ResourceTopic,
        timeout: Duration,
    ) -> candidate_engine::Result<Option<StudyResource>> {
        let reply = self
            .chat
            .complete(SYSTEM_PROMPT, &user_prompt(request), timeout)
            .await
            .map_err(|e| e.into_generator())?;
        parse_resource(&reply).map_err(|e| e.into_generator())
    }
}

#[async_trait]
impl Verifier<StudyResource> for LinkVerifier {
    async fn verify(
        &self,
        candidate: &StudyResource,
        _criteria: &(),
        timeout: Duration,
    ) -> candidate_engine::Result<VerificationVerdict> {
        self.check(&candidate.url, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_fenced_object() {
        let reply = concat!(
            "```json\n",
            "{\"title\": \" MIT OCW 18.06 \", \"url\": \"https://ocw.mit.edu/18-06\"}",
            "\n```"
        );
        let resource = parse_resource(reply).unwrap().unwrap();
        assert_eq!(resource.title, "MIT OCW 18.06");
        assert_eq!(resource.url, "https://ocw.mit.edu/18-06");
    }

    #[test]
    fn test_null_and_blank_mean_absent() {
        assert_eq!(parse_resource("null").unwrap(), None);
        assert_eq!(
            parse_resource(r#"{"title": "Notes", "url": ""}"#).unwrap(),
            None
        );
    }

    #[test]
    fn test_prose_without_json_is_an_error() {
        assert!(parse_resource("I'd suggest checking your library.").is_err());
    }

    #[test]
    fn test_prompt_mentions_level_when_given() {
        let topic = ResourceTopic {
            topic: "linear algebra".to_string(),
            level: Some("intro".to_string()),
        };
        assert!(user_prompt(&topic).contains("Level: intro"));
    }
}
