//! Reconciliation invariant tests.
//!
//! Property tests drive random interleavings of dosing, edits,
//! soft-deletes and restores, then check that the stored balance always
//! equals the balance derivable from the active log.

use proptest::prelude::*;

use vialtrack_core::db::Database;
use vialtrack_core::models::{
    AdministrationPatch, DoseEntry, NewBatch, NewPreparation, NewSupplier,
};
use vialtrack_core::reconcile::{Reconciler, VOLUME_EPSILON_ML};

fn seed_prep(volume_ml: f64) -> (Database, i64) {
    let db = Database::open_in_memory().unwrap();
    db.insert_supplier(&NewSupplier::named("Acme Labs")).unwrap();
    let batch_id = db
        .create_batch(&NewBatch::new(
            "Acme Labs",
            "BPC-157 10mg",
            100,
            10.0,
            vec![("BPC-157".into(), 10.0)],
        ))
        .unwrap();
    let prep_id = db
        .create_preparation(&NewPreparation::new(batch_id, 10, volume_ml, "2026-02-01"))
        .unwrap();
    (db, prep_id)
}

fn stored_remaining(db: &Database, prep_id: i64) -> f64 {
    db.get_preparation(prep_id)
        .unwrap()
        .unwrap()
        .volume_remaining_ml
}

/// Remaining volume derived straight from the active log.
fn derived_remaining(db: &Database, prep_id: i64, volume_ml: f64) -> f64 {
    let used: f64 = db
        .conn()
        .query_row(
            "SELECT COALESCE(SUM(dose_ml), 0) FROM administrations
             WHERE preparation_id = ? AND deleted_at IS NULL",
            [prep_id],
            |row| row.get(0),
        )
        .unwrap();
    volume_ml - used
}

#[test]
fn test_corruption_detected_with_signed_difference() {
    let (db, prep_id) = seed_prep(2.0);
    for _ in 0..3 {
        db.use_preparation(prep_id, &DoseEntry::of(0.5)).unwrap();
    }
    db.conn()
        .execute(
            "UPDATE preparations SET volume_remaining_ml = 0.3 WHERE id = ?",
            [prep_id],
        )
        .unwrap();

    let reconciler = Reconciler::new(&db);
    let report = reconciler.check_integrity().unwrap();
    assert_eq!(report.drifts.len(), 1);
    let drift = &report.drifts[0];
    assert_eq!(drift.current_ml, 0.3);
    assert_eq!(drift.expected_ml, 0.5);
    assert!((drift.difference_ml + 0.2).abs() < 1e-9);
    assert_eq!(drift.product_name.as_deref(), Some("BPC-157 10mg"));

    let stats = reconciler.reconcile(None).unwrap();
    assert_eq!(stats.fixed, 1);
    assert_eq!(stored_remaining(&db, prep_id), 0.5);

    // Second run finds nothing left to fix
    assert_eq!(reconciler.reconcile(None).unwrap().fixed, 0);
}

#[test]
fn test_dose_edits_leave_no_audit_findings() {
    let (db, prep_id) = seed_prep(5.0);
    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(
            db.use_preparation(prep_id, &DoseEntry::of(0.5))
                .unwrap()
                .administration_id,
        );
    }

    db.update_administration(
        ids[0],
        &AdministrationPatch {
            dose_ml: Some(0.25),
            ..Default::default()
        },
    )
    .unwrap();
    db.soft_delete_administration(ids[2]).unwrap();
    db.restore_administration(ids[2]).unwrap();
    db.delete_administration(ids[3], true).unwrap();

    let report = Reconciler::new(&db).check_integrity().unwrap();
    assert!(report.is_consistent(), "unexpected drift: {:?}", report.drifts);
    assert!((stored_remaining(&db, prep_id) - 3.75).abs() <= VOLUME_EPSILON_ML);
}

#[derive(Debug, Clone)]
enum Op {
    Dose(f64),
    SoftDelete(usize),
    Restore(usize),
    EditDose(usize, f64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u32..=50).prop_map(|hundredths| Op::Dose(hundredths as f64 / 100.0)),
        (0usize..8).prop_map(Op::SoftDelete),
        (0usize..8).prop_map(Op::Restore),
        ((0usize..8), (1u32..=50))
            .prop_map(|(i, hundredths)| Op::EditDose(i, hundredths as f64 / 100.0)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever interleaving of doses, voids, restores and edits is
    /// applied, the stored balance stays within tolerance of the balance
    /// derived from the active log, and the auditor finds nothing.
    #[test]
    fn stored_balance_tracks_active_log(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let volume_ml = 50.0;
        let (db, prep_id) = seed_prep(volume_ml);
        let mut dose_ids: Vec<i64> = Vec::new();

        for op in ops {
            match op {
                Op::Dose(ml) => {
                    // Overdraws are allowed to fail; they must not corrupt state
                    if let Ok(receipt) = db.use_preparation(prep_id, &DoseEntry::of(ml)) {
                        dose_ids.push(receipt.administration_id);
                    }
                }
                Op::SoftDelete(i) => {
                    if let Some(&id) = dose_ids.get(i) {
                        let _ = db.soft_delete_administration(id);
                    }
                }
                Op::Restore(i) => {
                    if let Some(&id) = dose_ids.get(i) {
                        let _ = db.restore_administration(id);
                    }
                }
                Op::EditDose(i, ml) => {
                    if let Some(&id) = dose_ids.get(i) {
                        db.update_administration(id, &AdministrationPatch {
                            dose_ml: Some(ml),
                            ..Default::default()
                        }).unwrap();
                    }
                }
            }

            let stored = stored_remaining(&db, prep_id);
            let derived = derived_remaining(&db, prep_id, volume_ml);
            prop_assert!(
                (stored - derived).abs() <= VOLUME_EPSILON_ML,
                "stored {} drifted from derived {}",
                stored,
                derived
            );
        }

        let report = Reconciler::new(&db).check_integrity().unwrap();
        prop_assert!(report.is_consistent(), "drift found: {:?}", report.drifts);
    }

    /// Voiding and restoring the same dose is a numeric no-op, whatever
    /// other doses happen in between.
    #[test]
    fn soft_delete_restore_round_trip(
        doses in proptest::collection::vec(1u32..=30, 2..10),
        target in 0usize..10,
        interleaved in 1u32..=30,
    ) {
        let (db, prep_id) = seed_prep(100.0);
        let mut ids = Vec::new();
        for hundredths in &doses {
            ids.push(
                db.use_preparation(prep_id, &DoseEntry::of(*hundredths as f64 / 100.0))
                    .unwrap()
                    .administration_id,
            );
        }
        let target = target % ids.len();

        let before = stored_remaining(&db, prep_id);
        db.soft_delete_administration(ids[target]).unwrap();
        db.use_preparation(prep_id, &DoseEntry::of(interleaved as f64 / 100.0)).unwrap();
        db.restore_administration(ids[target]).unwrap();
        let after = stored_remaining(&db, prep_id);

        let expected = before - interleaved as f64 / 100.0;
        prop_assert!(
            (after - expected).abs() <= VOLUME_EPSILON_ML,
            "round trip moved balance: before {}, after {}",
            before,
            after
        );
    }
}
