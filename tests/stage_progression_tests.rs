// Stage progression through the tracker service against in-memory stores

mod fixtures;

use camp_tracker::stages::{MeasurementData, PIPELINE};
use camp_tracker::{PhotoKind, Step, StepPayload, TrackerError, TransitionError, TransitionOutcome, TransitionRules};
use fixtures::*;

#[tokio::test]
async fn test_before_photo_scenario() {
    let camp = camp().await;
    let b = register(&camp, "Asha Devi").await;
    assert_eq!(b.reg_number.as_str(), "REG-0001");

    let outcome = camp
        .tracker
        .advance(
            &camp.scope,
            &b.id,
            StepPayload::BeforePhoto {
                photo_url: "https://photos.example.org/x.jpg".to_string(),
            },
            None,
        )
        .await
        .unwrap();

    let row = outcome.beneficiary();
    assert_eq!(row.current_step, Step::Measurement);
    assert_eq!(row.before_photo_url.as_deref(), Some("https://photos.example.org/x.jpg"));
    assert!(row.completed_steps.contains(&Step::BeforePhoto));

    let waiting = camp.tracker.queue(&camp.scope, Step::BeforePhoto).await.unwrap();
    assert!(waiting.iter().all(|w| w.id != b.id));
    let next = camp.tracker.queue(&camp.scope, Step::Measurement).await.unwrap();
    assert_eq!(next.len(), 1);
}

#[tokio::test]
async fn test_full_journey_reaches_completed() {
    let camp = camp().await;
    let b = register(&camp, "Ramesh").await;

    camp.tracker
        .upload_photo(&camp.scope, &b.id, PhotoKind::Before, b"before", "jpg", None)
        .await
        .unwrap();
    camp.tracker
        .advance(&camp.scope, &b.id, measurement(), volunteer())
        .await
        .unwrap();
    camp.tracker
        .advance(&camp.scope, &b.id, fitment(), volunteer())
        .await
        .unwrap();
    camp.tracker
        .advance(&camp.scope, &b.id, extra_items(), volunteer())
        .await
        .unwrap();
    let outcome = camp
        .tracker
        .upload_photo(&camp.scope, &b.id, PhotoKind::After, b"after", "png", volunteer())
        .await
        .unwrap();

    let row = outcome.beneficiary();
    assert_eq!(row.current_step, Step::Completed);
    assert_eq!(row.completed_steps, PIPELINE[..6].to_vec());
    assert!(row.after_photo_url.as_deref().unwrap().ends_with(".png"));
    assert_eq!(row.step_volunteers.get(&Step::Fitment).map(String::as_str), Some(VOLUNTEER));
    assert_eq!(camp.objects.names().await.len(), 2);
}

#[tokio::test]
async fn test_incomplete_measurement_is_rejected_without_writes() {
    let camp = camp().await;
    let b = register(&camp, "Meena").await;
    camp.tracker
        .upload_photo(&camp.scope, &b.id, PhotoKind::Before, b"before", "jpg", None)
        .await
        .unwrap();
    let writes = camp.records.write_count();

    let err = camp
        .tracker
        .advance(
            &camp.scope,
            &b.id,
            StepPayload::Measurement(MeasurementData {
                length: "40 cm".to_string(),
                circumference: "  ".to_string(),
                notes: None,
            }),
            volunteer(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TrackerError::Transition(TransitionError::ValidationFailed {
            step: Step::Measurement,
            ..
        })
    ));
    assert_eq!(camp.records.write_count(), writes);
}

#[tokio::test]
async fn test_missing_volunteer_is_rejected() {
    let camp = camp().await;
    let b = register(&camp, "Meena").await;
    camp.tracker
        .upload_photo(&camp.scope, &b.id, PhotoKind::Before, b"before", "jpg", None)
        .await
        .unwrap();

    let err = camp
        .tracker
        .advance(&camp.scope, &b.id, measurement(), Some("   ".to_string()))
        .await
        .unwrap_err();
    assert!(err.is_rejection());
}

#[tokio::test]
async fn test_repeated_advance_is_a_no_op() {
    let camp = camp().await;
    let b = register(&camp, "Sunil").await;
    let photo = StepPayload::BeforePhoto {
        photo_url: "https://photos.example.org/a.jpg".to_string(),
    };

    camp.tracker
        .advance(&camp.scope, &b.id, photo.clone(), None)
        .await
        .unwrap();
    let writes = camp.records.write_count();

    let again = camp
        .tracker
        .advance(&camp.scope, &b.id, photo, None)
        .await
        .unwrap();
    assert!(matches!(
        again,
        TransitionOutcome::AlreadyApplied {
            step: Step::BeforePhoto,
            ..
        }
    ));
    assert_eq!(again.beneficiary().current_step, Step::Measurement);
    assert_eq!(camp.records.write_count(), writes);
}

#[tokio::test]
async fn test_complete_after_photo_without_photo() {
    let camp = camp().await;
    let b = register(&camp, "Kamla").await;
    camp.tracker
        .upload_photo(&camp.scope, &b.id, PhotoKind::Before, b"before", "jpg", None)
        .await
        .unwrap();
    for payload in [measurement(), fitment(), extra_items()] {
        camp.tracker
            .advance(&camp.scope, &b.id, payload, volunteer())
            .await
            .unwrap();
    }

    let outcome = camp
        .tracker
        .complete_without_payload(&camp.scope, &b.id, Step::AfterPhoto, volunteer())
        .await
        .unwrap();
    let row = outcome.beneficiary();
    assert_eq!(row.current_step, Step::Completed);
    assert!(row.after_photo_url.is_none());
    assert!(row.completed_steps.contains(&Step::AfterPhoto));
}

#[tokio::test]
async fn test_skipping_is_limited_to_configured_steps() {
    let strict = camp().await;
    let b = register(&strict, "Kamla").await;
    strict
        .tracker
        .upload_photo(&strict.scope, &b.id, PhotoKind::Before, b"before", "jpg", None)
        .await
        .unwrap();
    let err = strict
        .tracker
        .complete_without_payload(&strict.scope, &b.id, Step::Measurement, volunteer())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TrackerError::Transition(TransitionError::NotSkippable { step: Step::Measurement })
    ));

    let loose = camp_with(
        TransitionRules {
            require_volunteer: true,
            skippable_steps: vec![Step::Measurement, Step::AfterPhoto],
        },
        true,
    )
    .await;
    let b = register(&loose, "Kamla").await;
    loose
        .tracker
        .upload_photo(&loose.scope, &b.id, PhotoKind::Before, b"before", "jpg", None)
        .await
        .unwrap();
    let outcome = loose
        .tracker
        .complete_without_payload(&loose.scope, &b.id, Step::Measurement, volunteer())
        .await
        .unwrap();
    assert_eq!(outcome.beneficiary().current_step, Step::Fitment);
    assert!(outcome.beneficiary().measurement_data.is_none());
}

#[tokio::test]
async fn test_revert_from_extra_items_clears_payload() {
    let camp = camp().await;
    let b = register(&camp, "Gopal").await;
    camp.tracker
        .upload_photo(&camp.scope, &b.id, PhotoKind::Before, b"before", "jpg", None)
        .await
        .unwrap();
    for payload in [measurement(), fitment()] {
        camp.tracker
            .advance(&camp.scope, &b.id, payload, volunteer())
            .await
            .unwrap();
    }

    let reverted = camp
        .tracker
        .revert(&camp.scope, &b.id, Step::ExtraItems)
        .await
        .unwrap();
    let row = reverted.beneficiary();
    assert_eq!(row.current_step, Step::Fitment);
    assert!(row.extra_items.is_none());
    assert!(row.fitment_data.is_none());

    // Redoing the reopened desk brings the beneficiary back with fresh data
    let redone = camp
        .tracker
        .advance(&camp.scope, &b.id, fitment(), Some("Ravi".to_string()))
        .await
        .unwrap();
    let row = redone.beneficiary();
    assert_eq!(row.current_step, Step::ExtraItems);
    assert_eq!(row.step_volunteers.get(&Step::Fitment).map(String::as_str), Some("Ravi"));
    assert_eq!(
        row.completed_steps.iter().filter(|s| **s == Step::Fitment).count(),
        1
    );
}

#[tokio::test]
async fn test_cancelled_beneficiary_is_terminal() {
    let camp = camp().await;
    let b = register(&camp, "Lakshmi").await;

    let outcome = camp
        .tracker
        .cancel(&camp.scope, &b.id, Some("Did not attend fitment".to_string()))
        .await
        .unwrap();
    let row = outcome.beneficiary();
    assert_eq!(row.current_step, Step::Cancelled);
    assert_eq!(row.cancel_reason.as_deref(), Some("Did not attend fitment"));

    let writes = camp.records.write_count();
    let again = camp.tracker.cancel(&camp.scope, &b.id, None).await.unwrap_err();
    assert!(matches!(
        again,
        TrackerError::Transition(TransitionError::Terminal { .. })
    ));
    let photo = camp
        .tracker
        .upload_photo(&camp.scope, &b.id, PhotoKind::Before, b"before", "jpg", None)
        .await
        .unwrap_err();
    assert!(matches!(
        photo,
        TrackerError::Transition(TransitionError::Terminal { .. })
    ));
    assert_eq!(camp.records.write_count(), writes);
    assert!(camp.objects.names().await.is_empty());
}

#[tokio::test]
async fn test_completed_beneficiary_cannot_be_reverted() {
    let camp = camp().await;
    let b = register(&camp, "Farida").await;
    camp.tracker
        .upload_photo(&camp.scope, &b.id, PhotoKind::Before, b"before", "jpg", None)
        .await
        .unwrap();
    for payload in [measurement(), fitment(), extra_items()] {
        camp.tracker
            .advance(&camp.scope, &b.id, payload, volunteer())
            .await
            .unwrap();
    }
    camp.tracker
        .complete_without_payload(&camp.scope, &b.id, Step::AfterPhoto, volunteer())
        .await
        .unwrap();

    for step in [Step::Completed, Step::AfterPhoto] {
        let err = camp.tracker.revert(&camp.scope, &b.id, step).await.unwrap_err();
        assert!(matches!(
            err,
            TrackerError::Transition(TransitionError::Terminal { step: Step::Completed })
        ));
    }
}
