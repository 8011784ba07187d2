// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use ndarray::prelude::*;

use super::*;
use crate::tests::fake_observation;

#[test]
fn test_detdata_create_and_get() {
    let mut obs = fake_observation(100);
    assert!(obs.detdata("signal").is_ok());
    assert!(matches!(
        obs.detdata("nonexistent"),
        Err(ObsError::MissingDetData { .. })
    ));

    obs.ensure_detdata("scratch");
    let arr = obs.detdata("scratch").unwrap();
    assert_eq!(arr.dim(), (4, 100));
    assert!(arr.iter().all(|&v| v == 0.0));

    // ensure_detdata must not clobber existing contents.
    obs.detdata_mut("scratch").unwrap()[(0, 0)] = 7.0;
    obs.ensure_detdata("scratch");
    assert_eq!(obs.detdata("scratch").unwrap()[(0, 0)], 7.0);
}

#[test]
fn test_insert_detdata_enforces_shape() {
    let mut obs = fake_observation(100);
    let bad = Array2::zeros((4, 99));
    assert!(matches!(
        obs.insert_detdata("bad", bad),
        Err(ObsError::ShapeMismatch { .. })
    ));
    let good = Array2::ones((4, 100));
    obs.insert_detdata("good", good).unwrap();
    assert_eq!(obs.detdata("good").unwrap()[(3, 99)], 1.0);
}

#[test]
fn test_copy_and_remove_detdata() {
    let mut obs = fake_observation(10);
    obs.detdata_mut("signal").unwrap()[(1, 5)] = 3.5;
    obs.copy_detdata("signal", "copy").unwrap();
    assert_eq!(obs.detdata("copy").unwrap()[(1, 5)], 3.5);

    // The copy is independent of the original.
    obs.detdata_mut("copy").unwrap()[(1, 5)] = -1.0;
    assert_eq!(obs.detdata("signal").unwrap()[(1, 5)], 3.5);

    obs.remove_detdata("copy");
    assert!(obs.detdata("copy").is_err());
}

#[test]
fn test_sample_flagging() {
    let mut obs = fake_observation(10);
    assert!(obs.sample_ok(0, 0, DEFAULT_FLAG_MASK));
    obs.flags[(0, 0)] = 0b0000_0010;
    assert!(!obs.sample_ok(0, 0, DEFAULT_FLAG_MASK));
    // A mask that ignores that bit keeps the sample valid.
    assert!(obs.sample_ok(0, 0, 0b0000_0001));
}

#[test]
fn test_dataset_product_lookup() {
    let data = Dataset::new(vec![fake_observation(10)]);
    assert!(matches!(data.map("x"), Err(ObsError::MissingMap { .. })));
    assert!(matches!(data.hitmap("x"), Err(ObsError::MissingHits { .. })));
    assert!(matches!(data.cov("x"), Err(ObsError::MissingCov { .. })));
}
