//! Letter avatars: an image model draws, a vision model judges.
//!
//! The judge is advisory. Callers run this path with the fail-open verifier
//! policy so a judge outage still yields an avatar.

use std::time::Duration;

use async_trait::async_trait;
use candidate_engine::{Generator, VerificationVerdict, Verifier};
use serde::{Deserialize, Serialize};

use crate::chat::ChatClient;
use crate::error::Result as AdapterResult;
use crate::parse::json_object;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarRequest {
    pub letter: char,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Avatar {
    pub image_url: String,
}

#[derive(Debug, Deserialize)]
struct Judgement {
    #[serde(rename = "isValid")]
    is_valid: bool,
    #[serde(default)]
    reasoning: String,
}

fn image_prompt(request: &AvatarRequest) -> String {
    let style = request
        .style
        .as_deref()
        .unwrap_or("flat, colorful, minimal");
    format!(
        "A square profile avatar showing only the single capital letter \"{}\" centered \
         on a plain background. Style: {style}. No other text.",
        request.letter.to_ascii_uppercase()
    )
}

fn judge_prompt(request: &AvatarRequest) -> String {
    format!(
        "Does this image clearly show the single letter \"{}\" with no other letters or \
         words? Reply with JSON only: {{\"isValid\": boolean, \"reasoning\": string}}.",
        request.letter.to_ascii_uppercase()
    )
}

pub fn parse_judgement(reply: &str) -> AdapterResult<VerificationVerdict> {
    let judgement: Judgement = json_object(reply)?;
    Ok(VerificationVerdict {
        is_valid: judgement.is_valid,
        reasoning: judgement.reasoning,
    })
}

pub struct AvatarGenerator {
    chat: ChatClient,
}

impl AvatarGenerator {
    pub fn new(chat: ChatClient) -> Self {
        AvatarGenerator { chat }
    }
}

#[async_trait]
impl Generator<AvatarRequest, Avatar> for AvatarGenerator {
    async fn generate(
        &self,
        request: &AvatarRequest,
        timeout: Duration,
    ) -> candidate_engine::Result<Option<Avatar>> {
        let url = self
            .chat
            .generate_image(&image_prompt(request), timeout)
            .await
            .map_err(|e| e.into_generator())?;
        Ok(url.map(|image_url| Avatar { image_url }))
    }
}

pub struct AvatarJudge {
    chat: ChatClient,
}

impl AvatarJudge {
    pub fn new(chat: ChatClient) -> Self {
        AvatarJudge { chat }
    }
}

#[async_trait]
impl Verifier<Avatar, AvatarRequest> for AvatarJudge {
    async fn verify(
        &self,
        candidate: &Avatar,
        criteria: &AvatarRequest,
        timeout: Duration,
    ) -> candidate_engine::Result<VerificationVerdict> {
        let reply = self
            .chat
            .describe_image(&judge_prompt(criteria), &candidate.image_url, timeout)
            .await
            .map_err(|e| e.into_verifier())?;
        parse_judgement(&reply).map_err(|e| e.into_verifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_judgement_parsing() {
        let verdict =
            parse_judgement(r#"{"isValid": true, "reasoning": "a bold red Q"}"#).unwrap();
        assert!(verdict.is_valid);
        assert_eq!(verdict.reasoning, "a bold red Q");

        let verdict = parse_judgement("```json\n{\"isValid\": false}\n```").unwrap();
        assert!(!verdict.is_valid);
        assert!(verdict.reasoning.is_empty());
    }

    #[test]
    fn test_judgement_without_flag_is_an_error() {
        assert!(parse_judgement(r#"{"valid": true}"#).is_err());
        assert!(parse_judgement("looks fine to me").is_err());
    }

    #[test]
    fn test_prompts_uppercase_the_letter() {
        let request = AvatarRequest {
            letter: 'k',
            style: None,
        };
        assert!(image_prompt(&request).contains("\"K\""));
        assert!(judge_prompt(&request).contains("\"K\""));
        assert!(image_prompt(&request).contains("flat, colorful, minimal"));
    }
}
