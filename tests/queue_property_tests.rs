//! Property tests for desk queues and stage ordering

mod fixtures;

use camp_tracker::stages::PIPELINE;
use camp_tracker::{PhotoKind, Step, StepPayload};
use fixtures::*;
use proptest::prelude::*;

fn payload_for(step: Step) -> Option<StepPayload> {
    match step {
        Step::Measurement => Some(measurement()),
        Step::Fitment => Some(fitment()),
        Step::ExtraItems => Some(extra_items()),
        _ => None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// However far each beneficiary gets, every one sits in exactly one queue,
    /// and each queue keeps registration order.
    #[test]
    fn every_beneficiary_is_in_exactly_one_queue(progress in prop::collection::vec(0usize..6, 1..8)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let camp = camp().await;
            let mut registered = Vec::new();

            for (i, steps) in progress.iter().enumerate() {
                let b = register(&camp, &format!("Beneficiary {i}")).await;
                for _ in 0..*steps {
                    let row = camp.tracker.find(&camp.scope, &camp_tracker::BeneficiaryRef::Id(b.id)).await.unwrap();
                    match row.current_step {
                        Step::BeforePhoto => {
                            camp.tracker.upload_photo(&camp.scope, &b.id, PhotoKind::Before, b"b", "jpg", None).await.unwrap();
                        }
                        Step::AfterPhoto => {
                            camp.tracker.upload_photo(&camp.scope, &b.id, PhotoKind::After, b"a", "jpg", volunteer()).await.unwrap();
                        }
                        step => {
                            let payload = payload_for(step).unwrap();
                            camp.tracker.advance(&camp.scope, &b.id, payload, volunteer()).await.unwrap();
                        }
                    }
                }
                registered.push((b.id, PIPELINE[1 + *steps]));
            }

            let mut seen = 0;
            for step in &PIPELINE[1..] {
                let queue = camp.tracker.queue(&camp.scope, *step).await.unwrap();
                seen += queue.len();
                for b in &queue {
                    let expected = registered.iter().find(|(id, _)| *id == b.id).map(|(_, s)| *s);
                    prop_assert_eq!(expected, Some(*step));
                }
                let created: Vec<_> = queue.iter().map(|b| b.created_at).collect();
                prop_assert!(created.windows(2).all(|w| w[0] <= w[1]));
            }
            prop_assert_eq!(seen, progress.len());
            Ok(())
        })?;
    }
}
