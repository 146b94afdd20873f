//! Adapters plugged into the engine, with fakes standing in for the network side.

use std::time::Duration;

use candidate_adapters::scholarships::check_fields;
use candidate_adapters::{
    LinkVerifier, Place, Scholarship, ScholarshipCriteria, StudyResource,
    DEFAULT_PLACE_CATEGORIES,
};
use candidate_engine::fakes::{
    FixedBatchGenerator, FnVerifier, GenStep, MapLookup, ScriptedGenerator, StaticExpander,
};
use candidate_engine::{
    request_deduped_search, request_single_verified_candidate, request_verified_batch,
    BatchPolicy, EngineError, RetryPolicy, SearchPolicy, VerificationVerdict,
};
use chrono::NaiveDate;

fn place(id: &str, category: &str, name: &str) -> Place {
    Place {
        place_id: id.to_string(),
        display_name: name.to_string(),
        category: category.to_string(),
        kind: "test".to_string(),
        lat: 0.0,
        lon: 0.0,
    }
}

#[tokio::test]
async fn test_non_http_resources_exhaust_the_retry_budget() {
    let generator = ScriptedGenerator::new(vec![
        GenStep::Candidate(StudyResource {
            title: "Local file".to_string(),
            url: "file:///etc/passwd".to_string(),
        }),
        GenStep::Absent,
        GenStep::Candidate(StudyResource {
            title: "Relative".to_string(),
            url: "/notes/week1".to_string(),
        }),
    ]);
    let verifier = LinkVerifier::new().unwrap();

    let err = request_single_verified_candidate(
        &generator,
        &verifier,
        &(),
        &(),
        RetryPolicy::default().with_call_timeout(Duration::from_secs(2)),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, EngineError::NoValidCandidate { attempts: 3 }));
    assert_eq!(generator.calls(), 3);
}

#[tokio::test]
async fn test_expired_scholarships_never_fill_a_batch() {
    let expired: Vec<Scholarship> = (0..10)
        .map(|i| Scholarship {
            name: format!("Award {i}"),
            amount: "$1,000".to_string(),
            deadline: "2019-09-01".to_string(),
            application_url: "https://example.org/apply".to_string(),
            eligibility: String::new(),
        })
        .collect();
    let generator = FixedBatchGenerator::single(expired);
    let criteria = ScholarshipCriteria {
        reference_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
    };
    let verifier = FnVerifier::new(move |s: &Scholarship, _i: usize| {
        Ok(check_fields(s, &criteria)
            .unwrap_or_else(|| VerificationVerdict::valid("fields ok")))
    });

    let outcome =
        request_verified_batch(&generator, &verifier, &(), &(), &BatchPolicy::default()).await;

    assert!(outcome.candidates.is_empty());
    assert!(outcome.is_below_minimum());
    assert_eq!(verifier.calls(), 10);
}

#[tokio::test]
async fn test_place_search_keeps_default_categories_and_dedups() {
    let expander = StaticExpander::queries(&["campus library", "study hall"]);
    let lookup = MapLookup::new()
        .with_results(
            "somewhere to study",
            vec![place("1", "amenity", "Main Library"), place("2", "highway", "Study Rd")],
        )
        .with_results("campus library", vec![place("1", "amenity", "Main Library")])
        .with_results("study hall", vec![place("3", "building", "Hall B")]);
    let policy =
        SearchPolicy::default().with_allowed_categories(DEFAULT_PLACE_CATEGORIES.iter().copied());

    let mut results =
        request_deduped_search(&expander, &lookup, "somewhere to study", &policy).await;
    results.sort_by(|a, b| a.place_id.cmp(&b.place_id));

    let ids: Vec<&str> = results.iter().map(|p| p.place_id.as_str()).collect();
    assert_eq!(ids, vec!["1", "3"]);
}
